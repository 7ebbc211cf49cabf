use reqwest::Method;
use serde_json::json;

use super::{ApiClient, decode};
use crate::{
    error::AppError,
    models::{AuthResponse, AuthUser, LoginRequest, RegisterRequest, TokenResponse, TokenValidation},
    session::{OAuthCallback, Session},
};

/// Exchange endpoint for a Google access token.
pub const OAUTH_EXCHANGE_PATH: &str = "/oauth2/authorization/google";

pub struct AuthApi<'a> {
    api: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Registers and signs in with the returned token.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AppError> {
        let body = self
            .api
            .execute(self.api.request(Method::POST, "/api/auth/register").json(request))
            .await?;
        let response: AuthResponse = decode(&body)?;
        self.remember(&response).await?;
        tracing::info!(user_id = %response.user.id, "registered");
        Ok(response)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let body = self
            .api
            .execute(self.api.request(Method::POST, "/api/auth/login").json(&request))
            .await?;
        let response: AuthResponse = decode(&body)?;
        self.remember(&response).await?;
        tracing::info!(user_id = %response.user.id, "signed in");
        Ok(response)
    }

    pub async fn me(&self) -> Result<AuthUser, AppError> {
        self.api
            .send_json(self.api.request(Method::GET, "/api/auth/me"))
            .await
    }

    pub async fn validate(&self, token: &str) -> Result<TokenValidation, AppError> {
        let body = self
            .api
            .execute(
                self.api
                    .request(Method::POST, "/api/auth/validate")
                    .json(&json!({ "token": token })),
            )
            .await?;
        decode(&body)
    }

    /// Swaps the stored token for a fresh one, keeping the cached user.
    pub async fn refresh(&self) -> Result<String, AppError> {
        let current = self
            .api
            .sessions()
            .load()
            .await?
            .ok_or_else(|| AppError::unauthorized("not signed in"))?;
        let response: TokenResponse = self
            .api
            .send_json(self.api.request(Method::POST, "/api/auth/refresh"))
            .await?;
        self.api
            .sessions()
            .save(&Session::new(response.token.clone(), current.user))
            .await?;
        Ok(response.token)
    }

    /// Tells the server and forgets the local session even if the call fails.
    pub async fn logout(&self) -> Result<(), AppError> {
        let result = self
            .api
            .send(self.api.request(Method::POST, "/api/auth/logout"))
            .await;
        self.api.sessions().clear().await?;
        match result {
            Err(err) if !err.is_unauthorized() => {
                tracing::warn!(error = %err, "server logout failed; local session cleared");
            }
            _ => {}
        }
        Ok(())
    }

    /// Trades an OAuth provider access token for a backend token.
    pub async fn exchange_oauth(&self, provider_token: &str) -> Result<String, AppError> {
        let body = self
            .api
            .execute(
                self.api
                    .request(Method::POST, OAUTH_EXCHANGE_PATH)
                    .bearer_auth(provider_token),
            )
            .await?;
        let response: TokenResponse = decode(&body)?;
        Ok(response.token)
    }

    /// Finishes the browser redirect flow: validates the token and stores it
    /// together with the user it belongs to.
    pub async fn complete_oauth(&self, callback: &OAuthCallback) -> Result<Session, AppError> {
        let validation = self.validate(&callback.token).await?;
        if !validation.valid {
            return Err(AppError::unauthorized("token is not valid"));
        }
        let user = validation.user().or_else(|| {
            Some(AuthUser {
                id: callback.user_id.clone(),
                email: String::new(),
                name: String::new(),
                picture: None,
            })
        });

        let session = Session::new(callback.token.clone(), user);
        self.api.sessions().save(&session).await?;
        tracing::info!(user_id = %callback.user_id, "signed in with oauth");
        Ok(session)
    }

    async fn remember(&self, response: &AuthResponse) -> Result<(), AppError> {
        self.api
            .sessions()
            .save(&Session::new(
                response.token.clone(),
                Some(response.user.clone()),
            ))
            .await
    }
}
