//! Topic Routes
//!
//! - GET /topics - Every cached topic and its latest payload
//! - GET /topics/*topic - Latest payload of one topic, as plain text
//! - POST /topics/*topic - Publish a payload to the broker

use axum::{
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::dto::PublishRequest;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// GET /topics
///
/// Snapshot of the topic cache as a JSON object.
pub async fn list_topics(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, String>> {
    let snapshot = state
        .cache()
        .snapshot()
        .await
        .into_iter()
        .map(|(topic, payload)| (topic, String::from_utf8_lossy(&payload).into_owned()))
        .collect();

    Json(snapshot)
}

/// GET /topics/*topic
pub async fn get_topic(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
) -> Response {
    match state.cache().get(&topic).await {
        Some(payload) => ([(header::CONTENT_TYPE, TEXT_PLAIN)], payload).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, TEXT_PLAIN)],
            "Topic Not Found",
        )
            .into_response(),
    }
}

/// POST /topics/*topic
///
/// Accepts the payload as JSON (`{"payload": "on"}`), as a form field
/// (`payload=on`) or as the raw body.
pub async fn publish_topic(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
    request: Request,
) -> ApiResult<StatusCode> {
    let payload = extract_payload(request).await?;

    state.relay.publish(&topic, payload).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Pull the payload out of a publish request body
async fn extract_payload(request: Request) -> ApiResult<Bytes> {
    let mime = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "application/json" => {
            let Json(req) = Json::<PublishRequest>::from_request(request, &()).await?;
            Ok(Bytes::from(req.into_payload()))
        }
        "application/x-www-form-urlencoded" => {
            let Form(req) = Form::<PublishRequest>::from_request(request, &()).await?;
            Ok(Bytes::from(req.into_payload()))
        }
        _ => Bytes::from_request(request, &())
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text())),
    }
}
