// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pool entry '{name}' has a malformed record: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("pool entry filename '{0}' is not '<blueprint>-<pid>'")]
    BadFileName(String),
}
