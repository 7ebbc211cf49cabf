//! Mock chat backend shared by the integration tests.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use chat_client::{api::ApiClient, config::ApiConfig, session::SessionStore};

pub const TOKEN: &str = "tok-alice";
pub const PASSWORD: &str = "correct horse";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub bearer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub len: usize,
}

#[derive(Clone, Default)]
pub struct Backend {
    pub requests: Arc<Mutex<Vec<Recorded>>>,
    pub uploads: Arc<Mutex<Vec<Upload>>>,
}

impl Backend {
    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

pub fn router(backend: Backend) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/auth/validate", post(validate))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/rooms/public", get(public_rooms))
        .route("/api/rooms/{id}", get(room))
        .route("/api/messages/room/{id}", get(history))
        .route("/api/upload/image", post(upload))
        .layer(middleware::from_fn_with_state(backend.clone(), record))
        .with_state(backend)
}

pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn api_client(addr: SocketAddr, sessions: Arc<dyn SessionStore>) -> ApiClient {
    let cfg = ApiConfig {
        base_url: format!("http://{addr}/"),
        timeout_secs: 5,
    };
    ApiClient::new(&cfg, sessions).unwrap()
}

pub fn user_json(id: &str, name: &str) -> Value {
    json!({ "id": id, "email": format!("{id}@chat.test"), "name": name })
}

pub fn room_json(id: &str) -> Value {
    json!({ "id": id, "name": format!("Room {id}"), "isPrivate": false, "memberCount": 2 })
}

pub fn message_json(id: &str, room_id: &str) -> Value {
    json!({
        "id": id,
        "room": room_json(room_id),
        "user": user_json("u-bob", "Bob"),
        "content": format!("message {id}"),
        "messageType": "TEXT",
        "createdAt": "2024-05-01T09:00:00"
    })
}

pub fn page_json(content: Vec<Value>, last: bool) -> Value {
    json!({
        "content": content,
        "totalElements": 3,
        "totalPages": 2,
        "first": !last,
        "last": last,
        "numberOfElements": content.len()
    })
}

async fn record(State(backend): State<Backend>, request: Request, next: Next) -> Response {
    let bearer = bearer(request.headers());
    backend.requests.lock().unwrap().push(Recorded {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().unwrap_or_default().to_string(),
        bearer,
    });
    next.run(request).await
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return unauthorized("Invalid credentials");
    }
    Json(json!({ "token": TOKEN, "user": user_json("u-alice", "Alice") })).into_response()
}

async fn me(headers: HeaderMap) -> Response {
    match bearer(&headers).as_deref() {
        Some(TOKEN) => Json(user_json("u-alice", "Alice")).into_response(),
        _ => unauthorized("Invalid token"),
    }
}

async fn validate(Json(body): Json<Value>) -> Json<Value> {
    if body["token"] == TOKEN {
        Json(json!({
            "valid": true,
            "userId": "u-alice",
            "email": "u-alice@chat.test",
            "name": "Alice",
            "picture": null
        }))
    } else {
        Json(json!({ "valid": false }))
    }
}

async fn refresh(headers: HeaderMap) -> Response {
    match bearer(&headers).as_deref() {
        Some(TOKEN) => Json(json!({ "token": "tok-refreshed" })).into_response(),
        _ => unauthorized("Invalid token"),
    }
}

async fn logout() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "logout failed" })),
    )
        .into_response()
}

async fn public_rooms() -> Json<Value> {
    Json(page_json(vec![room_json("room-1"), room_json("room-2")], true))
}

async fn room(Path(id): Path<String>) -> Response {
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Room not found" })),
        )
            .into_response();
    }
    Json(room_json(&id)).into_response()
}

/// Three messages, newest first, two per page.
async fn history(
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let page = query.get("page").map(String::as_str).unwrap_or("0");
    if page == "0" {
        Json(page_json(
            vec![message_json("m3", &id), message_json("m2", &id)],
            false,
        ))
    } else {
        Json(page_json(vec![message_json("m1", &id)], true))
    }
}

async fn upload(State(backend): State<Backend>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let Ok(bytes) = field.bytes().await else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        backend.uploads.lock().unwrap().push(Upload {
            file_name: file_name.clone(),
            content_type: content_type.clone(),
            len: bytes.len(),
        });
        return Json(json!({
            "url": format!("/uploads/{file_name}"),
            "filename": file_name,
            "originalName": file_name,
            "size": bytes.len(),
            "contentType": content_type
        }))
        .into_response();
    }
    StatusCode::BAD_REQUEST.into_response()
}
