use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// The canned answer returned by `POST /graphql`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub body: String,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: default_content_type(),
            body: r#"{"data":null}"#.to_string(),
        }
    }
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// Everything the server saw of one `POST /graphql`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub id: Uuid,
    /// Header name/value pairs in arrival order, one entry per value.
    pub headers: Vec<(String, String)>,
    pub payload: Payload,
}

impl RecordedRequest {
    /// Every value sent for `name`, compared case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Any non-multipart body, kept verbatim.
    Raw { body: String },
    Multipart { parts: Vec<FormPart> },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: String,
}

#[derive(Default)]
struct Inner {
    reply: RwLock<Reply>,
    log: RwLock<Vec<RecordedRequest>>,
}

/// Shared server state: the scripted reply and the request log.
#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<Inner>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond_with(&self, reply: Reply) {
        *self.inner.reply.write().await = reply;
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.log.read().await.clone()
    }
}

pub fn app(state: MockState) -> Router {
    Router::new()
        .route("/graphql", post(graphql))
        .route("/requests", get(list_requests).delete(clear_requests))
        .route("/reply", get(get_reply).put(set_reply))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn graphql(State(state): State<MockState>, request: Request) -> Result<Response, Response> {
    let headers = header_pairs(request.headers());
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let payload = if is_multipart {
        read_multipart(request, &state).await?
    } else {
        let body = Bytes::from_request(request, &state)
            .await
            .map_err(IntoResponse::into_response)?;
        Payload::Raw {
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    };

    let recorded = RecordedRequest {
        id: Uuid::new_v4(),
        headers,
        payload,
    };
    tracing::info!(id = %recorded.id, multipart = is_multipart, "recorded graphql request");
    let id = recorded.id.to_string();
    state.inner.log.write().await.push(recorded);

    let reply = state.inner.reply.read().await.clone();
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((
        status,
        [
            (header::CONTENT_TYPE, reply.content_type),
            (header::HeaderName::from_static("x-request-id"), id),
        ],
        reply.body,
    )
        .into_response())
}

async fn read_multipart(request: Request, state: &MockState) -> Result<Payload, Response> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(IntoResponse::into_response)?;

    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(IntoResponse::into_response)?;
        parts.push(FormPart {
            name,
            file_name,
            content_type,
            data: String::from_utf8_lossy(&data).into_owned(),
        });
    }
    Ok(Payload::Multipart { parts })
}

async fn list_requests(State(state): State<MockState>) -> Json<Vec<RecordedRequest>> {
    Json(state.requests().await)
}

async fn clear_requests(State(state): State<MockState>) -> StatusCode {
    state.inner.log.write().await.clear();
    StatusCode::NO_CONTENT
}

async fn get_reply(State(state): State<MockState>) -> Json<Reply> {
    Json(state.inner.reply.read().await.clone())
}

async fn set_reply(State(state): State<MockState>, Json(reply): Json<Reply>) -> StatusCode {
    state.respond_with(reply).await;
    StatusCode::NO_CONTENT
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
