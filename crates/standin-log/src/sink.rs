// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The remote log sink seam.
//!
//! A sink stores records in named streams grouped under a log group. Appends to a stream are
//! ordered by a sequence token: every successful append returns the token the next append must
//! present.

use async_trait::async_trait;

use crate::record::LogRecord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Transient failure; the same call may be retried after a pause.
    #[error("sink throttled the request: {0}")]
    Throttled(String),

    /// The sink cannot be reached any more (e.g. name resolution failed).
    #[error("sink unreachable: {0}")]
    Unrecoverable(String),
}

#[async_trait]
pub trait LogSink: Send + Sync {
    /// Creates the group if it does not exist yet.
    async fn ensure_group(&self, group: &str) -> Result<(), SinkError>;

    /// Creates the stream if it does not exist yet.
    ///
    /// Returns the stream's current sequence token when the stream already existed and has
    /// received appends before.
    async fn ensure_stream(&self, group: &str, stream: &str) -> Result<Option<String>, SinkError>;

    /// Appends one record and returns the next sequence token.
    ///
    /// `sequence_token` is `None` only for the first append to a fresh stream.
    async fn append(
        &self,
        group: &str,
        stream: &str,
        record: &LogRecord,
        sequence_token: Option<&str>,
    ) -> Result<String, SinkError>;
}
