// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::mocks::{Attempt, StubSink};
use standin_log::{
    delivery_service::DeliveryConfig,
    handler::{Console, HandlerConfig, LogHandler},
    layer::DeliveryLayer,
    record::LogRecord,
    session::SessionState,
    sink::SinkError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::prelude::*;

fn delivery_config() -> DeliveryConfig {
    DeliveryConfig {
        group: "standin".to_string(),
        stream: "default/i-0123456789".to_string(),
        retry_backoff: Duration::from_millis(10),
    }
}

fn start_handler(blacklist: &[&str], sink: Arc<StubSink>) -> (LogHandler, Arc<Mutex<Vec<u8>>>) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let handler = LogHandler::with_sink(
        HandlerConfig {
            blacklist: blacklist.iter().map(|s| s.to_string()).collect(),
            max_level: Level::DEBUG,
        },
        delivery_config(),
        sink,
    )
    .with_console(Arc::clone(&buffer) as Console);
    (handler, buffer)
}

fn printed(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
}

fn record(message: &str) -> LogRecord {
    LogRecord::new(Level::INFO, "app", message)
}

#[tokio::test]
async fn records_are_attempted_in_order_and_token_tracks_sink() {
    let sink = Arc::new(StubSink::new());
    let (handler, _buffer) = start_handler(&[], Arc::clone(&sink));

    for n in 0..5 {
        handler.emit(record(&format!("message {n}")));
    }
    let session = handler.stop().await.expect("worker should report its session");

    let attempts = sink.attempts();
    let texts: Vec<&str> = attempts.iter().map(|a| a.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "INFO     message 0",
            "INFO     message 1",
            "INFO     message 2",
            "INFO     message 3",
            "INFO     message 4",
        ]
    );
    assert_eq!(attempts[0].token, None);
    assert_eq!(attempts[1].token.as_deref(), Some("token-1"));
    assert_eq!(attempts[4].token.as_deref(), Some("token-4"));
    assert_eq!(session.sequence_token(), Some("token-5"));
    assert_eq!(sink.issued().last().map(String::as_str), Some("token-5"));
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(sink.groups_created(), vec!["standin".to_string()]);
}

#[tokio::test]
async fn blacklisted_records_are_neither_printed_nor_queued() {
    let sink = Arc::new(StubSink::new());
    let (handler, buffer) = start_handler(&["secret"], Arc::clone(&sink));

    handler.emit(record("the secret handshake"));
    handler.emit(record("public news"));
    handler.stop().await;

    assert_eq!(printed(&buffer), "INFO     public news\n");
    assert_eq!(
        sink.attempts(),
        vec![Attempt {
            text: "INFO     public news".to_string(),
            token: None,
        }]
    );
}

#[tokio::test]
async fn throttled_record_is_retried_until_accepted() {
    let sink = Arc::new(StubSink::new());
    sink.script([
        None,
        Some(SinkError::Throttled("rate exceeded".to_string())),
        Some(SinkError::Throttled("rate exceeded".to_string())),
    ]);
    let (handler, _buffer) = start_handler(&[], Arc::clone(&sink));

    handler.emit(record("first"));
    handler.emit(record("second"));
    handler.emit(record("third"));
    let session = handler.stop().await.unwrap();

    let tokens: Vec<Option<String>> = sink.attempts().into_iter().map(|a| a.token).collect();
    assert_eq!(
        tokens,
        vec![
            None,
            Some("token-1".to_string()),
            Some("token-1".to_string()),
            Some("token-1".to_string()),
            Some("token-2".to_string()),
        ]
    );
    assert_eq!(sink.attempts()[4].text, "INFO     third");
    assert_eq!(session.sequence_token(), Some("token-3"));
}

#[tokio::test]
async fn existing_stream_token_is_used_for_first_append() {
    let sink = Arc::new(StubSink::with_existing_stream("resume-here"));
    let (handler, _buffer) = start_handler(&[], Arc::clone(&sink));

    handler.emit(record("hello again"));
    handler.stop().await;

    assert_eq!(sink.attempts()[0].token.as_deref(), Some("resume-here"));
}

#[tokio::test]
async fn unrecoverable_error_stops_delivery_but_not_printing() {
    let sink = Arc::new(StubSink::new());
    sink.script([
        None,
        Some(SinkError::Unrecoverable("name resolution failed".to_string())),
    ]);
    let (handler, buffer) = start_handler(&[], Arc::clone(&sink));

    handler.emit(record("delivered"));
    handler.emit(record("lost"));
    // Give the worker time to hit the failure before more records arrive.
    tokio::time::sleep(Duration::from_millis(100)).await;
    handler.emit(record("printed only"));
    let session = handler.stop().await.unwrap();

    assert_eq!(sink.attempts().len(), 2);
    assert_eq!(session.sequence_token(), Some("token-1"));
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(
        printed(&buffer),
        "INFO     delivered\nINFO     lost\nINFO     printed only\n"
    );
}

#[tokio::test]
async fn stop_is_idempotent() {
    let sink = Arc::new(StubSink::new());
    let (handler, _buffer) = start_handler(&[], sink);

    assert!(handler.is_delivering());
    assert!(handler.stop().await.is_some());
    assert!(handler.stop().await.is_none());
}

// Current-thread runtime: the worker runs on the test thread, under the scoped subscriber.
#[tokio::test]
async fn fail_stop_is_reported_on_the_console() {
    let sink = Arc::new(StubSink::new());
    sink.script([Some(SinkError::Unrecoverable(
        "name resolution failed".to_string(),
    ))]);
    let (handler, buffer) = start_handler(&[], Arc::clone(&sink));
    let handler = Arc::new(handler);
    let subscriber = tracing_subscriber::registry().with(DeliveryLayer::new(Arc::clone(&handler)));
    let _guard = tracing::subscriber::set_default(subscriber);

    tracing::info!(target: "app", "lost");
    handler.stop().await;

    let printed = printed(&buffer);
    assert!(printed.starts_with("INFO     lost\n"), "{printed}");
    assert!(
        printed.contains("ERROR    Log delivery failed, delivery stopped: sink unreachable: name resolution failed"),
        "{printed}"
    );
    assert!(
        printed.contains("ERROR    1 log records were not delivered"),
        "{printed}"
    );
    assert_eq!(sink.attempts().len(), 1);
}

#[tokio::test]
async fn back_off_notices_are_printed_but_not_shipped() {
    let sink = Arc::new(StubSink::new());
    sink.script([Some(SinkError::Throttled("rate exceeded".to_string()))]);
    let (handler, buffer) = start_handler(&[], Arc::clone(&sink));
    let handler = Arc::new(handler);
    let subscriber = tracing_subscriber::registry().with(DeliveryLayer::new(Arc::clone(&handler)));
    let _guard = tracing::subscriber::set_default(subscriber);

    tracing::info!(target: "app", "first");
    handler.stop().await;

    assert!(printed(&buffer).contains("WARN     Log delivery told to back off: rate exceeded"));
    let texts: Vec<String> = sink.attempts().into_iter().map(|a| a.text).collect();
    assert_eq!(texts, vec!["INFO     first", "INFO     first"]);
}
