// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::UNIX_EPOCH;

use tracing::Level;

use crate::constants::LEVEL_WIDTH;

/// A single log line on its way to stdout and, possibly, a remote sink.
///
/// The text form (`LEVEL    message`) is built once here and reused for filtering, printing and
/// delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    timestamp_millis: i64,
    level: Level,
    logger_name: String,
    message: String,
    text: String,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn new(level: Level, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        let now: i64 = UNIX_EPOCH
            .elapsed()
            .map(|elapsed| elapsed.as_millis().try_into().unwrap_or(i64::MAX))
            .unwrap_or_default();
        Self::with_timestamp(now, level, logger_name, message)
    }

    pub fn with_timestamp(
        timestamp_millis: i64,
        level: Level,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let text = format!("{:<width$} {}", level.as_str(), message, width = LEVEL_WIDTH);
        Self {
            timestamp_millis,
            level,
            logger_name: logger_name.into(),
            message,
            text,
        }
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The formatted line, without a trailing newline.
    pub fn text(&self) -> &str {
        &self.text
    }
}
