// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ordering state for appends to one remote stream.
//!
//! ```text
//!   Uninitialized -> GroupEnsured -> StreamEnsured -> Delivering <-> Delivering
//!         |               |               |               |
//!         +---------------+---------------+---------------+--> Terminated
//! ```
//!
//! The session is owned by the delivery worker alone, so there is never more than one append in
//! flight and the token is only advanced after the sink confirms an append.

use std::time::Duration;

use tracing::{debug, warn};

use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    GroupEnsured,
    StreamEnsured,
    Delivering,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSinkSession {
    group: String,
    stream: String,
    sequence_token: Option<String>,
    state: SessionState,
}

impl LogSinkSession {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
            sequence_token: None,
            state: SessionState::Uninitialized,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Token the next append will present; `None` before the first append to a fresh stream.
    pub fn sequence_token(&self) -> Option<&str> {
        self.sequence_token.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Makes sure the group and stream exist and picks up the stream's token.
    ///
    /// Throttled calls are retried after `backoff`; an unrecoverable error is returned as is.
    pub async fn establish(
        &mut self,
        sink: &dyn LogSink,
        backoff: Duration,
    ) -> Result<(), SinkError> {
        loop {
            match sink.ensure_group(&self.group).await {
                Ok(()) => break,
                Err(SinkError::Throttled(msg)) => {
                    warn!("Creating log group {} throttled, backing off: {}", self.group, msg);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
        self.state = SessionState::GroupEnsured;

        let token = loop {
            match sink.ensure_stream(&self.group, &self.stream).await {
                Ok(token) => break token,
                Err(SinkError::Throttled(msg)) => {
                    warn!("Creating log stream {} throttled, backing off: {}", self.stream, msg);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        };
        self.sequence_token = token;
        self.state = SessionState::StreamEnsured;
        debug!(
            "Log stream {}/{} ready, sequence token: {:?}",
            self.group, self.stream, self.sequence_token
        );
        Ok(())
    }

    /// Appends `record`, retrying for as long as the sink keeps throttling.
    pub async fn deliver(
        &mut self,
        sink: &dyn LogSink,
        record: &LogRecord,
        backoff: Duration,
    ) -> Result<(), SinkError> {
        loop {
            let appended = sink
                .append(
                    &self.group,
                    &self.stream,
                    record,
                    self.sequence_token.as_deref(),
                )
                .await;
            match appended {
                Ok(next_token) => {
                    self.sequence_token = Some(next_token);
                    self.state = SessionState::Delivering;
                    return Ok(());
                }
                Err(SinkError::Throttled(msg)) => {
                    warn!("Log delivery told to back off: {}", msg);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn terminate(&mut self) {
        self.state = SessionState::Terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tracing::Level;

    /// Replays scripted results and records every token it was handed.
    #[derive(Default)]
    struct ScriptedSink {
        group_results: Mutex<VecDeque<Result<(), SinkError>>>,
        stream_results: Mutex<VecDeque<Result<Option<String>, SinkError>>>,
        append_results: Mutex<VecDeque<Result<String, SinkError>>>,
        tokens_seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl LogSink for ScriptedSink {
        async fn ensure_group(&self, _group: &str) -> Result<(), SinkError> {
            self.group_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn ensure_stream(
            &self,
            _group: &str,
            _stream: &str,
        ) -> Result<Option<String>, SinkError> {
            self.stream_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }

        async fn append(
            &self,
            _group: &str,
            _stream: &str,
            _record: &LogRecord,
            sequence_token: Option<&str>,
        ) -> Result<String, SinkError> {
            self.tokens_seen
                .lock()
                .unwrap()
                .push(sequence_token.map(str::to_string));
            self.append_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("next".to_string()))
        }
    }

    fn record() -> LogRecord {
        LogRecord::with_timestamp(0, Level::INFO, "app", "hello")
    }

    const BACKOFF: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_establish_new_stream_has_no_token() {
        let sink = ScriptedSink::default();
        let mut session = LogSinkSession::new("group", "stream");
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.establish(&sink, BACKOFF).await.unwrap();

        assert_eq!(session.state(), SessionState::StreamEnsured);
        assert_eq!(session.sequence_token(), None);
    }

    #[tokio::test]
    async fn test_establish_existing_stream_recovers_token() {
        let sink = ScriptedSink::default();
        sink.stream_results
            .lock()
            .unwrap()
            .push_back(Ok(Some("existing".to_string())));
        let mut session = LogSinkSession::new("group", "stream");

        session.establish(&sink, BACKOFF).await.unwrap();
        session.deliver(&sink, &record(), BACKOFF).await.unwrap();

        assert_eq!(
            *sink.tokens_seen.lock().unwrap(),
            vec![Some("existing".to_string())]
        );
    }

    #[tokio::test]
    async fn test_establish_retries_throttled_group() {
        let sink = ScriptedSink::default();
        sink.group_results
            .lock()
            .unwrap()
            .extend([Err(SinkError::Throttled("slow down".to_string())), Ok(())]);
        let mut session = LogSinkSession::new("group", "stream");

        session.establish(&sink, BACKOFF).await.unwrap();

        assert_eq!(session.state(), SessionState::StreamEnsured);
    }

    #[tokio::test]
    async fn test_establish_stops_on_unrecoverable() {
        let sink = ScriptedSink::default();
        sink.stream_results
            .lock()
            .unwrap()
            .push_back(Err(SinkError::Unrecoverable("dns".to_string())));
        let mut session = LogSinkSession::new("group", "stream");

        let result = session.establish(&sink, BACKOFF).await;

        assert_eq!(result, Err(SinkError::Unrecoverable("dns".to_string())));
        assert_eq!(session.state(), SessionState::GroupEnsured);
    }

    #[tokio::test]
    async fn test_deliver_retries_with_same_token() {
        let sink = ScriptedSink::default();
        sink.append_results.lock().unwrap().extend([
            Ok("t1".to_string()),
            Err(SinkError::Throttled("busy".to_string())),
            Err(SinkError::Throttled("busy".to_string())),
            Ok("t2".to_string()),
        ]);
        let mut session = LogSinkSession::new("group", "stream");
        session.establish(&sink, BACKOFF).await.unwrap();

        session.deliver(&sink, &record(), BACKOFF).await.unwrap();
        session.deliver(&sink, &record(), BACKOFF).await.unwrap();

        assert_eq!(
            *sink.tokens_seen.lock().unwrap(),
            vec![
                None,
                Some("t1".to_string()),
                Some("t1".to_string()),
                Some("t1".to_string()),
            ]
        );
        assert_eq!(session.sequence_token(), Some("t2"));
        assert_eq!(session.state(), SessionState::Delivering);
    }

    #[tokio::test]
    async fn test_deliver_keeps_token_on_unrecoverable() {
        let sink = ScriptedSink::default();
        sink.append_results.lock().unwrap().extend([
            Ok("t1".to_string()),
            Err(SinkError::Unrecoverable("dns".to_string())),
        ]);
        let mut session = LogSinkSession::new("group", "stream");
        session.establish(&sink, BACKOFF).await.unwrap();
        session.deliver(&sink, &record(), BACKOFF).await.unwrap();

        let result = session.deliver(&sink, &record(), BACKOFF).await;

        assert!(matches!(result, Err(SinkError::Unrecoverable(_))));
        assert_eq!(session.sequence_token(), Some("t1"));
    }
}
