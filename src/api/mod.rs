//! REST client for the chat backend.
//!
//! [`ApiClient`] owns the HTTP client and the session store. Each resource
//! group is reached through a short-lived accessor (`auth()`, `rooms()`,
//! ...) that borrows it.

mod auth;
mod files;
mod messages;
mod rooms;
mod users;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode, header};
use serde::de::DeserializeOwned;

pub use auth::{AuthApi, OAUTH_EXCHANGE_PATH};
pub use files::FilesApi;
pub use messages::{HISTORY_PAGE_SIZE, MessagesApi};
pub use rooms::{ROOM_PAGE_SIZE, RoomsApi};
pub use users::UsersApi;

use crate::{config::ApiConfig, error::AppError, session::SessionStore};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    sessions: Arc<dyn SessionStore>,
}

impl ApiClient {
    pub fn new(cfg: &ApiConfig, sessions: Arc<dyn SessionStore>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|err| AppError::internal(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim().trim_end_matches('/').to_string(),
            sessions,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(self)
    }

    pub fn rooms(&self) -> RoomsApi<'_> {
        RoomsApi::new(self)
    }

    pub fn messages(&self) -> MessagesApi<'_> {
        MessagesApi::new(self)
    }

    pub fn files(&self) -> FilesApi<'_> {
        FilesApi::new(self)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    /// Sends with the stored bearer token and decodes a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, AppError> {
        let body = self.send(request).await?;
        decode(&body)
    }

    /// Sends with the stored bearer token and returns the raw body.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<String, AppError> {
        let request = match self.sessions.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        self.execute(request).await
    }

    /// Sends as-is, without attaching the session token.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<String, AppError> {
        let request = request
            .header(header::ACCEPT, "application/json")
            .build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%method, %path, status = status.as_u16(), "api request");

        if status.is_success() {
            return Ok(body);
        }

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(%path, "session rejected by server; signing out");
            if let Err(err) = self.sessions.clear().await {
                tracing::warn!(error = %err, "failed to clear session");
            }
        }
        Err(AppError::from_status(status, &body))
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, AppError> {
    Ok(serde_json::from_str(body)?)
}

/// Spring paging parameters.
pub(crate) fn page_query(page: u32, size: u32) -> [(&'static str, String); 2] {
    [("page", page.to_string()), ("size", size.to_string())]
}
