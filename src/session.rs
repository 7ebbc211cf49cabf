use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::AuthUser};

/// What the client remembers between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: Option<AuthUser>) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    pub fn claims(&self) -> Result<TokenClaims, AppError> {
        TokenClaims::inspect(&self.token)
    }

    /// User id from the cached user, falling back to the token subject.
    pub fn user_id(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|user| user.id.clone())
            .or_else(|| self.claims().ok().and_then(|claims| claims.user_id()))
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, AppError>;
    async fn save(&self, session: &Session) -> Result<(), AppError>;
    async fn clear(&self) -> Result<(), AppError>;

    async fn token(&self) -> Result<Option<String>, AppError> {
        Ok(self.load().await?.map(|session| session.token))
    }
}

/// JSON file store, `$HOME/.chat-client/session.json` by default.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>, AppError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(AppError::session(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_slice::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                AppError::session(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let body = serde_json::to_vec_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|err| AppError::session(format!("failed to write {}: {err}", tmp.display())))?;
        restrict_permissions(&tmp).await;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|err| {
            AppError::session(format!("failed to write {}: {err}", self.path.display()))
        })?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::session(format!(
                "failed to remove {}: {err}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(err) =
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
    {
        tracing::warn!(path = %path.display(), error = %err, "could not restrict session file");
    }
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) {}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>, AppError> {
        Ok(self.slot().clone())
    }

    async fn save(&self, session: &Session) -> Result<(), AppError> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Claims read from a backend token. The signature is not checked: the
/// client has no key and only uses these for display and expiry hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn inspect(token: &str) -> Result<Self, AppError> {
        let header = decode_header(token)?;

        let mut validation = Validation::new(header.alg);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Self>(token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(data.claims)
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.clone().or_else(|| self.sub.clone())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Result of the browser OAuth redirect back to `/auth/callback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCallback {
    pub token: String,
    pub user_id: String,
}

impl OAuthCallback {
    /// Accepts a full callback URL or just its query string.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let input = input.trim();
        let url = Url::parse(input)
            .or_else(|_| {
                let query = input.trim_start_matches('?');
                Url::parse(&format!("http://localhost/auth/callback?{query}"))
            })
            .map_err(|err| AppError::bad_request(format!("invalid callback url: {err}")))?;

        let mut token = None;
        let mut user_id = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "error" => {
                    return Err(AppError::unauthorized(format!(
                        "authentication failed: {value}"
                    )));
                }
                "token" => token = Some(value.into_owned()),
                "userId" => user_id = Some(value.into_owned()),
                _ => {}
            }
        }

        match (
            token.filter(|t| !t.is_empty()),
            user_id.filter(|u| !u.is_empty()),
        ) {
            (Some(token), Some(user_id)) => Ok(Self { token, user_id }),
            _ => Err(AppError::bad_request(
                "callback is missing token or userId",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    fn token_with(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .expect("token should encode")
    }

    #[test]
    fn claims_are_read_without_the_key() {
        let token = token_with(json!({
            "sub": "u-42",
            "email": "alice@example.com",
            "name": "Alice",
            "iat": 1_700_000_000,
            "exp": 1_700_086_400
        }));

        let claims = TokenClaims::inspect(&token).unwrap();
        assert_eq!(claims.user_id().as_deref(), Some("u-42"));
        assert_eq!(claims.name.as_deref(), Some("Alice"));
        assert_eq!(
            claims.expires_at(),
            DateTime::from_timestamp(1_700_086_400, 0)
        );
        assert!(claims.is_expired());
    }

    #[test]
    fn expiry_is_relative_to_now() {
        let claims = TokenClaims {
            exp: Some(2_000),
            ..TokenClaims::default()
        };
        let before = DateTime::from_timestamp(1_000, 0).unwrap();
        let after = DateTime::from_timestamp(3_000, 0).unwrap();
        assert!(!claims.is_expired_at(before));
        assert!(claims.is_expired_at(after));
        assert!(!TokenClaims::default().is_expired());
    }

    #[test]
    fn garbage_token_is_a_session_error() {
        let err = TokenClaims::inspect("not-a-token").unwrap_err();
        assert!(matches!(err, AppError::Session(_)));
    }

    #[test]
    fn session_user_id_prefers_cached_user() {
        let token = token_with(json!({"sub": "from-token"}));
        let bare = Session::new(token.clone(), None);
        assert_eq!(bare.user_id().as_deref(), Some("from-token"));

        let cached = Session::new(
            token,
            Some(AuthUser {
                id: "cached".to_string(),
                email: String::new(),
                name: "Alice".to_string(),
                picture: None,
            }),
        );
        assert_eq!(cached.user_id().as_deref(), Some("cached"));
    }

    #[test]
    fn oauth_callback_parses_token_and_user() {
        let callback =
            OAuthCallback::parse("http://localhost:3000/auth/callback?token=abc.def&userId=u1")
                .unwrap();
        assert_eq!(callback.token, "abc.def");
        assert_eq!(callback.user_id, "u1");

        let bare = OAuthCallback::parse("?token=t&userId=u2").unwrap();
        assert_eq!(bare.user_id, "u2");
    }

    #[test]
    fn oauth_callback_reports_provider_error() {
        let err = OAuthCallback::parse("http://localhost/auth/callback?error=access_denied")
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err.message().contains("access_denied"));

        let err = OAuthCallback::parse("http://localhost/auth/callback?token=t").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.token().await.unwrap(), None);

        store.save(&Session::new("t1", None)).await.unwrap();
        assert_eq!(store.token().await.unwrap().as_deref(), Some("t1"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let store = FileSessionStore::new(&path);

        assert_eq!(store.load().await.unwrap(), None);
        store.save(&Session::new("t1", None)).await.unwrap();
        assert!(path.exists());

        let reopened = FileSessionStore::new(&path);
        assert_eq!(reopened.token().await.unwrap().as_deref(), Some("t1"));

        reopened.clear().await.unwrap();
        reopened.clear().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_session_file_reads_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileSessionStore::new(&path);
        assert_eq!(store.load().await.unwrap(), None);
    }
}
