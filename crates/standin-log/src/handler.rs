// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer-facing side of the pipeline.
//!
//! [`LogHandler::emit`] filters a record, prints it, and when a remote sink is configured queues
//! it for the delivery task. It never waits on the network and never reports delivery failures;
//! stdout always gets every line that passed the filters, even after delivery has stopped.
//! The pipeline's own notices (back-off, fail-stop) are printed but never queued.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{error, Level};

use crate::constants::{EXCLUDED_LOGGER_PREFIXES, PIPELINE_LOGGER_PREFIX};
use crate::delivery_service::{DeliveryConfig, DeliveryHandle, DeliveryService};
use crate::record::LogRecord;
use crate::session::LogSinkSession;
use crate::sink::LogSink;

/// Where formatted lines are printed.
pub type Console = Arc<Mutex<dyn Write + Send>>;

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Records whose text contains any of these substrings are dropped
    pub blacklist: Vec<String>,
    /// Most verbose level that is still emitted
    pub max_level: Level,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            blacklist: Vec::new(),
            max_level: Level::INFO,
        }
    }
}

pub struct LogHandler {
    config: HandlerConfig,
    console: Console,
    delivery: Option<DeliveryHandle>,
    worker: Mutex<Option<JoinHandle<LogSinkSession>>>,
}

impl LogHandler {
    /// A handler that only prints.
    pub fn stdout_only(config: HandlerConfig) -> Self {
        Self {
            config,
            console: Arc::new(Mutex::new(std::io::stdout())),
            delivery: None,
            worker: Mutex::new(None),
        }
    }

    /// A handler that prints and ships every record to `sink`.
    ///
    /// Spawns the delivery task, so it must be called from within a tokio runtime.
    pub fn with_sink(
        config: HandlerConfig,
        delivery_config: DeliveryConfig,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let (service, handle) = DeliveryService::new(delivery_config, sink);
        let worker = tokio::spawn(service.run());
        Self {
            config,
            console: Arc::new(Mutex::new(std::io::stdout())),
            delivery: Some(handle),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Prints to `console` instead of stdout.
    #[must_use]
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn max_level(&self) -> Level {
        self.config.max_level
    }

    /// Whether records are shipped to a remote sink as well as printed.
    pub fn is_delivering(&self) -> bool {
        self.delivery.is_some()
    }

    pub fn emit(&self, record: LogRecord) {
        if !self.accepts(&record) {
            return;
        }

        {
            let mut console = lock(&self.console);
            let _ = writeln!(console, "{}", record.text());
        }

        if let Some(delivery) = &self.delivery {
            if has_prefix(record.logger_name(), PIPELINE_LOGGER_PREFIX) {
                return;
            }
            // Fails only after a fail-stop; the line is already on stdout.
            let _ = delivery.enqueue(record);
        }
    }

    fn accepts(&self, record: &LogRecord) -> bool {
        record.level() <= self.config.max_level
            && !EXCLUDED_LOGGER_PREFIXES
                .iter()
                .any(|prefix| has_prefix(record.logger_name(), prefix))
            && !self
                .config
                .blacklist
                .iter()
                .any(|needle| record.text().contains(needle.as_str()))
    }

    /// Queues a shutdown and waits for every record queued before it to be attempted.
    ///
    /// Returns the final sink session, or `None` for a print-only handler or a second call.
    pub async fn stop(&self) -> Option<LogSinkSession> {
        let delivery = self.delivery.as_ref()?;
        // The task may already be gone after a fail-stop; joining it still works.
        let _ = delivery.shutdown();

        let worker = lock(&self.worker).take()?;
        match worker.await {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Log delivery task failed: {}", e);
                None
            }
        }
    }
}

// `prefix` itself or one of its submodules.
fn has_prefix(logger_name: &str, prefix: &str) -> bool {
    logger_name
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
