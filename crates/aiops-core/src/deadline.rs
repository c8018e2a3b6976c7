//! Per-call deadline.
//!
//! Every external call made by a stage goes through [`with_deadline`], so
//! a hung backend costs at most one timeout and never blocks later ticks.

use std::future::Future;
use std::time::Duration;

use crate::error::{BackendError, BackendResult};

/// Run `fut`, failing with [`BackendError::Timeout`] after `limit`.
pub async fn with_deadline<T, F>(call: &'static str, limit: Duration, fut: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout { call, after: limit }),
    }
}
