//! Error types for framewire-core

use crate::router::FrameId;
use framewire_fetch::FetchError;
use thiserror::Error;

/// Result type alias using the core Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The frame, or its content window, is not present in the page.
    #[error("Frame {0} is not available")]
    MissingFrameTarget(FrameId),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Invalid document URL: {0}")]
    InvalidDocument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
