// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Bounded retry for `network` store errors only; conflict and
//! validation errors are never retried by the adapter itself.

use sched_core::StoreError;
use std::future::Future;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(200);

/// Retries `f` up to [`MAX_ATTEMPTS`] times with exponential backoff, but
/// only when the error is [`StoreError::is_retryable`].
pub async fn with_network_retry<T, F, Fut>(mut f: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
                tracing::warn!(attempt, error = %e, backoff_ms = backoff.as_millis() as u64, "retrying store call");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
