//! Error types for the sync core.
//!
//! Each boundary gets its own error enum: `StoreError` for the durable
//! key-value store, `FetchError` for the remote source, `AssetError` for the
//! asset cache worker. The consumer-facing sync API never surfaces these -
//! `refresh` and `check_for_updates` resolve every failure to a boolean.

use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failures from the durable local store.
///
/// Callers treat any `StoreError` on read as "no cache available" and any
/// `StoreError` on write as a logged, non-fatal event. A full store never
/// crashes a refresh cycle.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the remote collection source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("unauthorized - credentials may be expired")]
    Unauthorized,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limited - retry later")]
    RateLimited,

    #[error("server error: {0}")]
    ServerError(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        // Back off to a char boundary so multi-byte bodies don't panic.
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        )
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => FetchError::Unauthorized,
            404 => FetchError::NotFound(truncated),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::InvalidResponse(format!("status {}: {}", status, truncated)),
        }
    }
}

/// Failures from the asset cache worker.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("asset fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("asset cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("install aborted for version {version}: {reason}")]
    InstallAborted { version: String, reason: String },

    #[error("asset cache worker is no longer running")]
    WorkerGone,
}
