//! Error types for the coordination layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Remote Error Enum ==
/// Failures reported by a remote key-value store.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// No configured address could be reached
    #[error("Remote connection failed: {0}")]
    Connection(String),

    /// A command was sent but the store answered with an error
    #[error("Remote command failed: {0}")]
    Command(String),
}

impl From<redis::RedisError> for RemoteError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            RemoteError::Connection(err.to_string())
        } else {
            RemoteError::Command(err.to_string())
        }
    }
}

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in either tier
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A live entry already holds the key
    #[error("Item {0} already exists")]
    AlreadyExists(String),

    /// No live entry holds the key
    #[error("Item {0} doesn't exist")]
    DoesNotExist(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The background sweeper was already stopped
    #[error("Sweeper already stopped")]
    SweeperStopped,

    /// Remote store failure, surfaced verbatim
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

// == Worker Error Enum ==
/// Errors raised while claiming a worker id.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Every index of the id space is held by a live process
    #[error("All worker ids [0-{max}] are occupied, extend the worker id bit length")]
    Exhausted { max: u16 },

    /// Bit length outside the supported range
    #[error("Worker id bit length must be within 1..=16, got {0}")]
    InvalidBitLength(u8),

    /// Fixed worker id does not fit the configured id space
    #[error("Worker id {id} exceeds the maximum {max}")]
    OverrideOutOfRange { id: u16, max: u16 },

    /// Remote store failure while claiming
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

// == Config Error Enum ==
/// Startup configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is missing or empty
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// A variable could not be parsed
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) | CacheError::DoesNotExist(_) => StatusCode::NOT_FOUND,
            CacheError::AlreadyExists(_) => StatusCode::CONFLICT,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Remote(_) => StatusCode::BAD_GATEWAY,
            CacheError::SweeperStopped => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
