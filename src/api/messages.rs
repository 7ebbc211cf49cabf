use reqwest::Method;
use serde_json::Value;

use super::{ApiClient, page_query};
use crate::{
    error::AppError,
    models::{Message, Page},
};

pub const HISTORY_PAGE_SIZE: u32 = 50;
const HISTORY_SORT: &str = "createdAt,desc";

pub struct MessagesApi<'a> {
    api: &'a ApiClient,
}

impl<'a> MessagesApi<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// One page of room history, newest first.
    pub async fn history(
        &self,
        room_id: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<Message>, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, &format!("/api/messages/room/{room_id}"))
                    .query(&page_query(page, size))
                    .query(&[("sort", HISTORY_SORT)]),
            )
            .await
    }

    pub async fn recent(&self, room_id: &str, since: &str) -> Result<Vec<Message>, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, &format!("/api/messages/room/{room_id}/recent"))
                    .query(&[("since", since)]),
            )
            .await
    }

    pub async fn search(
        &self,
        room_id: &str,
        query: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<Message>, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, &format!("/api/messages/room/{room_id}/search"))
                    .query(&[("q", query)])
                    .query(&page_query(page, size)),
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.api
            .send(self.api.request(Method::DELETE, &format!("/api/messages/{id}")))
            .await?;
        Ok(())
    }

    /// Per-room counters; the server does not fix their shape.
    pub async fn stats(&self, room_id: &str) -> Result<Value, AppError> {
        self.api
            .send_json(
                self.api
                    .request(Method::GET, &format!("/api/messages/room/{room_id}/stats")),
            )
            .await
    }
}
