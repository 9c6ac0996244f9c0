// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory log sink for exercising the delivery pipeline.

use async_trait::async_trait;
use standin_log::record::LogRecord;
use standin_log::sink::{LogSink, SinkError};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One call to `append` as the sink saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub text: String,
    pub token: Option<String>,
}

/// Sink that hands out `token-1`, `token-2`, ... on successful appends.
///
/// Failures can be scripted per append attempt; attempts without a scripted failure succeed.
#[derive(Default)]
pub struct StubSink {
    existing_token: Option<String>,
    failures: Mutex<VecDeque<Option<SinkError>>>,
    attempts: Mutex<Vec<Attempt>>,
    issued: Mutex<Vec<String>>,
    groups_created: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl StubSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose stream already exists with `token` as its current sequence token.
    pub fn with_existing_stream(token: &str) -> Self {
        Self {
            existing_token: Some(token.to_string()),
            ..Self::default()
        }
    }

    /// Scripts the outcome of the next attempts, in order; `None` means success.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Option<SinkError>>) {
        self.failures.lock().unwrap().extend(outcomes);
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    pub fn groups_created(&self) -> Vec<String> {
        self.groups_created.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogSink for StubSink {
    async fn ensure_group(&self, group: &str) -> Result<(), SinkError> {
        self.groups_created.lock().unwrap().push(group.to_string());
        Ok(())
    }

    async fn ensure_stream(&self, _group: &str, _stream: &str) -> Result<Option<String>, SinkError> {
        Ok(self.existing_token.clone())
    }

    async fn append(
        &self,
        _group: &str,
        _stream: &str,
        record: &LogRecord,
        sequence_token: Option<&str>,
    ) -> Result<String, SinkError> {
        self.attempts.lock().unwrap().push(Attempt {
            text: record.text().to_string(),
            token: sequence_token.map(str::to_string),
        });
        if let Some(Some(failure)) = self.failures.lock().unwrap().pop_front() {
            return Err(failure);
        }
        let mut issued = self.issued.lock().unwrap();
        let token = format!("token-{}", issued.len() + 1);
        issued.push(token.clone());
        Ok(token)
    }
}
