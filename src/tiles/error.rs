//! Tile store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the tile store
#[derive(Error, Debug)]
pub enum TileError {
    /// The layout document exists but could not be read or parsed
    #[error("Failed to load tile layout from {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// Writing the layout document failed; the stored layout is unchanged
    #[error("Failed to write tile layout to {path:?}: {reason}")]
    Persist { path: PathBuf, reason: String },

    /// A definition in a replacement layout is malformed
    #[error("Invalid tile at index {index}: {reason}")]
    Invalid { index: usize, reason: String },
}

/// Result type alias for tile store operations
pub type TileResult<T> = Result<T, TileError>;
