// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Errors returned by parameter stores and readers.
///
/// A corrupt snapshot is never reported: it reads as an empty store.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("parameter not found: {0}")]
    NotFound(String),

    #[error("parameter already exists and overwrite was not requested: {0}")]
    AlreadyExists(String),

    #[error("snapshot would be {size} bytes, limit is {limit}")]
    CapacityExceeded { size: usize, limit: usize },

    #[error("no discovery reply within {0:?}")]
    Timeout(Duration),

    #[error("socket error: {0}")]
    Connection(#[source] std::io::Error),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("remote parameter store error: {0}")]
    Remote(String),
}
