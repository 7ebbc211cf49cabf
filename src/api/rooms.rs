use reqwest::Method;

use super::{ApiClient, page_query};
use crate::{
    error::AppError,
    forms::prepare_room_form,
    models::{ChatRoom, CreateRoomForm, Page, RoomMember},
};

pub const ROOM_PAGE_SIZE: u32 = 20;

pub struct RoomsApi<'a> {
    api: &'a ApiClient,
}

impl<'a> RoomsApi<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn public(&self, page: u32, size: u32) -> Result<Page<ChatRoom>, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, "/api/rooms/public")
                    .query(&page_query(page, size)),
            )
            .await
    }

    pub async fn mine(&self) -> Result<Vec<ChatRoom>, AppError> {
        self.api
            .send_json(self.api.request(Method::GET, "/api/rooms/my"))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<ChatRoom, AppError> {
        self.api
            .send_json(self.api.request(Method::GET, &format!("/api/rooms/{id}")))
            .await
    }

    /// Validates the form locally before it reaches the server.
    pub async fn create(&self, form: CreateRoomForm) -> Result<ChatRoom, AppError> {
        let form = prepare_room_form(form)?;
        let room: ChatRoom = self
            .api
            .send_json(self.api.request(Method::POST, "/api/rooms").json(&form))
            .await?;
        tracing::info!(room_id = %room.id, name = %room.name, "room created");
        Ok(room)
    }

    pub async fn update(&self, id: &str, form: CreateRoomForm) -> Result<ChatRoom, AppError> {
        let form = prepare_room_form(form)?;
        self.api
            .send_json(
                self.api
                    .request(Method::PUT, &format!("/api/rooms/{id}"))
                    .json(&form),
            )
            .await
    }

    pub async fn join(&self, id: &str) -> Result<(), AppError> {
        self.api
            .send(self.api.request(Method::POST, &format!("/api/rooms/{id}/join")))
            .await?;
        Ok(())
    }

    pub async fn leave(&self, id: &str) -> Result<(), AppError> {
        self.api
            .send(self.api.request(Method::POST, &format!("/api/rooms/{id}/leave")))
            .await?;
        Ok(())
    }

    pub async fn members(&self, id: &str) -> Result<Vec<RoomMember>, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, &format!("/api/rooms/{id}/members")),
            )
            .await
    }

    pub async fn search(
        &self,
        query: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<ChatRoom>, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, "/api/rooms/search")
                    .query(&[("q", query)])
                    .query(&page_query(page, size)),
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.api
            .send(self.api.request(Method::DELETE, &format!("/api/rooms/{id}")))
            .await?;
        tracing::info!(room_id = %id, "room deleted");
        Ok(())
    }
}
