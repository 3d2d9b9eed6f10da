//! End-to-end tests for the notification pipeline.
//!
//! Each test watches a temporary directory, creates files in it and checks
//! what reaches a mock webhook and the log buffer.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use hookwatch_monitor::log_sink::LogBuffer;
use hookwatch_monitor::pipeline::{
    NotificationPipeline, PipelineError, PipelineOptions, PipelineState,
};
use hookwatch_monitor::settings::WatchSettings;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

const WAIT_LIMIT: Duration = Duration::from_secs(10);

fn test_pipeline() -> NotificationPipeline {
    NotificationPipeline::new(PipelineOptions {
        timeout: Duration::from_secs(5),
        settle_delay: Duration::from_millis(200),
    })
}

/// Polls the log until a message starting with `prefix` appears.
async fn wait_for(log: &LogBuffer, prefix: &str) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if log.messages().iter().any(|m| m.starts_with(prefix)) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn count_starting_with(log: &LogBuffer, prefix: &str) -> usize {
    log.messages().iter().filter(|m| m.starts_with(prefix)).count()
}

// =============================================================================
// Delivery Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_file_is_posted_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_json(serde_json::json!({
            "content": "File: a.txt Size: 10 B"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let log = Arc::new(LogBuffer::default());
    let pipeline = test_pipeline();
    let settings = WatchSettings::new(
        format!("{}/hook", server.uri()),
        dir.path(),
        "File: {filename} Size: {filesize}",
    );

    pipeline.start(settings, log.clone()).unwrap();
    fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();

    assert!(wait_for(&log, "✓ Sent: a.txt").await, "log: {:?}", log.lines());

    pipeline.stop();
    assert_eq!(count_starting_with(&log, "✓ Sent:"), 1);
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_files_in_new_subdirectory_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(serde_json::json!({ "content": "deep.txt in nested" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let log = Arc::new(LogBuffer::default());
    let pipeline = test_pipeline();
    let settings = WatchSettings::new(server.uri(), dir.path(), "{filename} in {foldername}");

    pipeline.start(settings, log.clone()).unwrap();

    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    // Give the recursive watch time to register the new directory.
    tokio::time::sleep(Duration::from_millis(300)).await;
    fs::write(nested.join("deep.txt"), b"x").unwrap();

    assert!(wait_for(&log, "✓ Sent: deep.txt").await, "log: {:?}", log.lines());

    pipeline.stop();
    assert_eq!(count_starting_with(&log, "✓ Sent:"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_delivery_keeps_running() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let log = Arc::new(LogBuffer::default());
    let pipeline = test_pipeline();
    let settings = WatchSettings::new(server.uri(), dir.path(), "{filename}");

    pipeline.start(settings, log.clone()).unwrap();
    fs::write(dir.path().join("first.txt"), b"1").unwrap();

    assert!(wait_for(&log, "✗ Failed: 404").await, "log: {:?}", log.lines());
    assert!(pipeline.is_running());

    fs::write(dir.path().join("second.txt"), b"2").unwrap();
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while count_starting_with(&log, "✗ Failed: 404") < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(count_starting_with(&log, "✗ Failed: 404"), 2);

    pipeline.stop();
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_start_is_rejected_without_duplicates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let log = Arc::new(LogBuffer::default());
    let pipeline = test_pipeline();
    let settings = WatchSettings::new(server.uri(), dir.path(), "{filename}");

    pipeline.start(settings.clone(), log.clone()).unwrap();
    let err = pipeline.start(settings, log.clone()).unwrap_err();

    assert!(matches!(err, PipelineError::AlreadyRunning));
    assert!(log.messages().iter().any(|m| m.contains("Already running")));
    assert_eq!(pipeline.state(), PipelineState::Running);

    fs::write(dir.path().join("once.txt"), b"x").unwrap();
    assert!(wait_for(&log, "✓ Sent: once.txt").await, "log: {:?}", log.lines());

    // Allow a duplicate, if any, to arrive before counting.
    tokio::time::sleep(Duration::from_millis(500)).await;
    pipeline.stop();

    assert_eq!(count_starting_with(&log, "✓ Sent:"), 1);
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_does_not_duplicate_deliveries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let log = Arc::new(LogBuffer::default());
    let pipeline = test_pipeline();
    let settings = WatchSettings::new(server.uri(), dir.path(), "{filename}");

    pipeline.start(settings.clone(), log.clone()).unwrap();
    pipeline.stop();
    assert_eq!(pipeline.state(), PipelineState::Stopped);

    pipeline.start(settings, log.clone()).unwrap();
    fs::write(dir.path().join("after.txt"), b"x").unwrap();
    assert!(wait_for(&log, "✓ Sent: after.txt").await, "log: {:?}", log.lines());

    tokio::time::sleep(Duration::from_millis(500)).await;
    pipeline.stop();

    assert_eq!(count_starting_with(&log, "✓ Sent:"), 1);
    assert_eq!(count_starting_with(&log, "✓ Monitoring started!"), 2);
    assert_eq!(count_starting_with(&log, "✓ Monitoring stopped"), 2);
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_waits_for_in_flight_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(1500)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let log = Arc::new(LogBuffer::default());
    let pipeline = test_pipeline();
    let settings = WatchSettings::new(server.uri(), dir.path(), "{filename}");

    pipeline.start(settings, log.clone()).unwrap();
    fs::write(dir.path().join("a.txt"), b"x").unwrap();

    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while server.received_requests().await.unwrap_or_default().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "request never arrived");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let stop_started = std::time::Instant::now();
    tokio::task::block_in_place(|| pipeline.stop());

    assert!(stop_started.elapsed() >= Duration::from_millis(500));
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(
        log.messages(),
        vec!["✓ Monitoring started!", "✓ Sent: a.txt", "✓ Monitoring stopped"]
    );
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_files_created_while_stopped_are_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let log = Arc::new(LogBuffer::default());
    let pipeline = test_pipeline();
    let settings = WatchSettings::new(server.uri(), dir.path(), "{filename}");

    pipeline.start(settings, log.clone()).unwrap();
    pipeline.stop();

    fs::write(dir.path().join("late.txt"), b"x").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(count_starting_with(&log, "✓ Sent:"), 0);
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_log_lines_carry_time_prefix() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(LogBuffer::default());
    let pipeline = test_pipeline();
    let settings = WatchSettings::new("http://127.0.0.1:9", dir.path(), "{filename}");

    pipeline.start(settings, log.clone()).unwrap();
    pipeline.stop();

    let lines = log.lines();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        // "[HH:MM:SS] " prefix
        assert_eq!(line.as_bytes()[0], b'[');
        assert_eq!(&line[9..11], "] ");
    }
    assert!(lines[0].ends_with("✓ Monitoring started!"));
}
