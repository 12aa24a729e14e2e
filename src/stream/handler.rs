//! Event Stream Handler
//!
//! `GET /update-stream` registers the browser with the hub and streams its
//! frame queue as the response body. The stream has no timeout; it ends when
//! the browser goes away (the body, and with it the connection, is dropped)
//! or when the hub drops the connection.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::{ApiResult, AppState};

static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Event stream handler
pub async fn stream_handler(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let connection = state.hub().register()?;
    tracing::debug!(connection_id = connection.id(), "Opening event stream");

    let body = Body::from_stream(connection.into_stream());

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING.clone(), "no"),
        ],
        body,
    )
        .into_response())
}
