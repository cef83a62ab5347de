use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

static ERROR_LOGGER: AtomicBool = AtomicBool::new(true);

/// Turn logging of failed writes on or off (on by default).
pub fn debug_error_enabled(enabled: bool) {
    ERROR_LOGGER.store(enabled, Ordering::Relaxed);
}

/// Log an error and each of its causes as warnings.
///
/// Accepts an `anyhow::Error` through `err.as_ref()`.
pub fn debug_error(err: &(dyn std::error::Error + 'static)) {
    if ERROR_LOGGER.load(Ordering::Relaxed) {
        tracing::warn!("{}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            tracing::warn!("caused by: {}", cause);
            source = cause.source();
        }
    }
}

/// Why a batch was not written. No variant implies anything was retried.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to encode write request: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("failed to compress write request body: {0}")]
    Compress(#[from] snap::Error),
    #[error("error during remote write: {0}")]
    Transport(surf::Error),
    #[error("remote write timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote write got status code: {status}, response body: {body}")]
    Rejected { status: u16, body: String },
}

impl WriteError {
    /// The HTTP status of a rejected write.
    pub fn status(&self) -> Option<u16> {
        match self {
            WriteError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
