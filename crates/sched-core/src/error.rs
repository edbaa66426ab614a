// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Shared error taxonomy for the store adapter.

use thiserror::Error;

/// Errors the store adapter can return. Every store method fails with one
/// of these — retries and recovery are the caller's responsibility.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no matching task available")]
    NotAvailable,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("optimistic lock conflict (expected version {expected}, store has {actual})")]
    Conflict { expected: u64, actual: u64 },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("network error: {0}")]
    Network(String),
}

impl StoreError {
    /// Whether a bounded retry is plausibly worthwhile: conflict/network
    /// are locally recoverable; validation is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Network(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
