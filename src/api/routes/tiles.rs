//! Tile Routes
//!
//! - GET /tiles - Current tile layout
//! - POST /tiles, PUT /tiles - Replace the whole layout

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::tiles::TileDefinition;

/// GET /tiles
pub async fn list_tiles(State(state): State<Arc<AppState>>) -> Json<Vec<TileDefinition>> {
    Json(state.tiles.list().await)
}

/// POST /tiles, PUT /tiles
///
/// The body is the complete new layout; anything not in it is removed.
pub async fn replace_tiles(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<TileDefinition>>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(tiles) = body?;

    state.tiles.replace(tiles).await?;

    Ok(StatusCode::NO_CONTENT)
}
