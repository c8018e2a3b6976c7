//! Error types for collaborator calls and startup configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for collaborator calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors returned by any external backend call.
///
/// Every variant is transient from the loop's point of view: the stage
/// that saw it logs it and yields its no-op result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("{call} timed out after {after:?}")]
    Timeout { call: &'static str, after: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by backend: {0}")]
    Rejected(String),
}

/// Longest response body kept in a `BackendError::Status`, in bytes.
pub const MAX_ERROR_BODY: usize = 512;

impl BackendError {
    /// A non-2xx answer. `body` is cut to at most [`MAX_ERROR_BODY`]
    /// bytes on a character boundary.
    pub fn status(code: u16, mut body: String) -> Self {
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        BackendError::Status { code, body }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Errors raised while loading or validating configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_status_body_is_kept() {
        assert_eq!(
            BackendError::status(503, "overloaded".to_string()),
            BackendError::Status {
                code: 503,
                body: "overloaded".to_string()
            }
        );
    }

    #[test]
    fn long_status_body_is_cut_on_a_char_boundary() {
        // "€" is three bytes and straddles the byte limit.
        let body = format!("{}€tail", "x".repeat(MAX_ERROR_BODY - 1));

        match BackendError::status(500, body) {
            BackendError::Status { code, body } => {
                assert_eq!(code, 500);
                assert_eq!(body, "x".repeat(MAX_ERROR_BODY - 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ascii_body_is_cut_at_the_limit() {
        match BackendError::status(500, "y".repeat(4 * MAX_ERROR_BODY)) {
            BackendError::Status { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY),
            other => panic!("unexpected {other:?}"),
        }
    }
}
