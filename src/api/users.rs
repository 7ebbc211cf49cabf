use reqwest::Method;

use super::ApiClient;
use crate::{
    error::AppError,
    models::{UpdateUserForm, User},
};

pub struct UsersApi<'a> {
    api: &'a ApiClient,
}

impl<'a> UsersApi<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn get(&self, id: &str) -> Result<User, AppError> {
        self.api
            .send_json(self.api.request(Method::GET, &format!("/api/users/{id}")))
            .await
    }

    pub async fn update(&self, id: &str, form: &UpdateUserForm) -> Result<User, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::PUT, &format!("/api/users/{id}"))
                    .json(form),
            )
            .await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<User>, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, "/api/users/search")
                    .query(&[("q", query)]),
            )
            .await
    }

    pub async fn in_room(&self, room_id: &str) -> Result<Vec<User>, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, &format!("/api/users/room/{room_id}")),
            )
            .await
    }
}
