use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum WavecastError {
    /// The client sent a chunk the writer cannot accept (empty payload,
    /// unrepresentable PCM parameters). No state was changed.
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    /// A well-formed byte range that cannot be served against the current
    /// container size.
    #[error("Range {start}-{end:?} not satisfiable against size {size}")]
    RangeNotSatisfiable {
        start: u64,
        end: Option<u64>,
        size: u64,
    },

    /// No active stream: nothing has been ingested since start or the last
    /// reset. Callers should retry after the next ingestion.
    #[error("No active stream")]
    StreamNotFound,

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WavecastError>;

impl IntoResponse for WavecastError {
    fn into_response(self) -> Response {
        let status = match &self {
            WavecastError::InvalidChunk(_) => StatusCode::BAD_REQUEST,
            WavecastError::StreamNotFound => StatusCode::NOT_FOUND,
            WavecastError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            WavecastError::IOError(_) | WavecastError::Internal(_) => {
                error!("Request failed: {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
