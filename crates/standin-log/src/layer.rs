// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration.
//!
//! [`DeliveryLayer`] turns every event into a [`LogRecord`] (target as logger name, `message`
//! field as message, remaining fields appended as `key=value`) and hands it to a [`LogHandler`].
//!
//! ```rust,ignore
//! use tracing_subscriber::prelude::*;
//!
//! let handler = Arc::new(LogHandler::stdout_only(HandlerConfig::default()));
//! tracing_subscriber::registry()
//!     .with(DeliveryLayer::new(Arc::clone(&handler)))
//!     .init();
//! ```

use std::fmt::{self, Write};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing_core::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::handler::LogHandler;
use crate::record::LogRecord;

pub struct DeliveryLayer {
    handler: Arc<LogHandler>,
}

impl DeliveryLayer {
    pub fn new(handler: Arc<LogHandler>) -> Self {
        Self { handler }
    }
}

impl<S> Layer<S> for DeliveryLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.handler.emit(LogRecord::new(
            *metadata.level(),
            metadata.target(),
            visitor.finish(),
        ));
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(mut self) -> String {
        if self.message.is_empty() {
            return self.fields.trim_start().to_string();
        }
        self.message.push_str(&self.fields);
        self.message
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
