// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background delivery of log records to a remote sink.
//!
//! Producers hold a cloneable [`DeliveryHandle`] and push records onto an unbounded channel;
//! a single [`DeliveryService`] task drains it in order and owns the [`LogSinkSession`].
//!
//! ```text
//!    ┌──────────────┐
//!    │   Handles    │ (many producers, never block)
//!    └──────┬───────┘
//!           │ DeliveryCommand
//!           v
//!    ┌──────────────┐
//!    │   Service    │ (one task, one append in flight)
//!    └──────┬───────┘
//!           v
//!       LogSink
//! ```
//!
//! `Shutdown` is queued behind any records already sent, so every earlier record is attempted
//! before the task exits. An unrecoverable sink error stops the task for good.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::constants::RETRY_BACKOFF;
use crate::record::LogRecord;
use crate::session::{LogSinkSession, SessionState};
use crate::sink::LogSink;

#[derive(Debug)]
pub enum DeliveryCommand {
    Record(LogRecord),
    /// Stop after everything queued before it has been handled.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub group: String,
    pub stream: String,
    pub retry_backoff: Duration,
}

impl DeliveryConfig {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
            retry_backoff: RETRY_BACKOFF,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeliveryHandle {
    tx: mpsc::UnboundedSender<DeliveryCommand>,
}

impl DeliveryHandle {
    /// Queues a record for delivery. Fails only once the service has stopped.
    pub fn enqueue(
        &self,
        record: LogRecord,
    ) -> Result<(), mpsc::error::SendError<DeliveryCommand>> {
        self.tx.send(DeliveryCommand::Record(record))
    }

    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<DeliveryCommand>> {
        self.tx.send(DeliveryCommand::Shutdown)
    }
}

pub struct DeliveryService {
    sink: Arc<dyn LogSink>,
    session: LogSinkSession,
    retry_backoff: Duration,
    rx: mpsc::UnboundedReceiver<DeliveryCommand>,
}

impl DeliveryService {
    pub fn new(config: DeliveryConfig, sink: Arc<dyn LogSink>) -> (Self, DeliveryHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            sink,
            session: LogSinkSession::new(config.group, config.stream),
            retry_backoff: config.retry_backoff,
            rx,
        };
        (service, DeliveryHandle { tx })
    }

    /// Delivers queued records until shutdown or an unrecoverable sink error.
    ///
    /// Returns the session in its final state.
    pub async fn run(mut self) -> LogSinkSession {
        debug!(
            "Log delivery started for {}/{}",
            self.session.group(),
            self.session.stream()
        );

        while let Some(command) = self.rx.recv().await {
            let record = match command {
                DeliveryCommand::Shutdown => {
                    debug!("Log delivery shutting down");
                    break;
                }
                DeliveryCommand::Record(record) => record,
            };

            if self.session.state() == SessionState::Uninitialized {
                if let Err(e) = self
                    .session
                    .establish(self.sink.as_ref(), self.retry_backoff)
                    .await
                {
                    error!("Could not set up log stream, delivery stopped: {}", e);
                    self.abandon(1);
                    break;
                }
            }

            if let Err(e) = self
                .session
                .deliver(self.sink.as_ref(), &record, self.retry_backoff)
                .await
            {
                error!("Log delivery failed, delivery stopped: {}", e);
                self.abandon(1);
                break;
            }
        }

        self.session.terminate();
        debug!("Log delivery stopped");
        self.session
    }

    // Closes the queue so producers stop feeding a task that will never read again.
    fn abandon(&mut self, in_flight: usize) {
        self.rx.close();
        let mut dropped = in_flight;
        while let Ok(command) = self.rx.try_recv() {
            if matches!(command, DeliveryCommand::Record(_)) {
                dropped += 1;
            }
        }
        error!("{} log records were not delivered", dropped);
    }
}
