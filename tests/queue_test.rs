mod common;

use common::{HOST, RecordingAdapter, beacon_with, enabled_options};
use parking_lot::Mutex;
use rask_beacon::domain::{AckKind, FieldValue};
use rask_beacon::buffer::FLUSH_QUIET_WINDOW;
use rask_beacon::{AckAdapter, Beacon, Record, SubmitOutcome};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_flush_delivers_in_submission_order() {
    let adapter = RecordingAdapter::new();
    let beacon = beacon_with(&adapter, enabled_options().sample(1));

    beacon.ack_log("first");
    beacon.ack_count("second");
    beacon.ack_statistic("third", 3.5);
    beacon.ack_error("fourth", Some("biz"), None);

    assert_eq!(beacon.flush(), 4);

    let kinds: Vec<AckKind> = adapter.records().iter().map(Record::kind).collect();
    assert_eq!(
        kinds,
        vec![AckKind::Log, AckKind::Count, AckKind::Statistic, AckKind::Error]
    );
    assert!(adapter.hosts().iter().all(|host| host == HOST));
}

#[tokio::test]
async fn test_single_pending_flush_for_many_submissions() {
    let adapter = RecordingAdapter::new();
    let beacon = beacon_with(&adapter, enabled_options());

    assert!(!beacon.queue().has_pending_flush());
    for i in 0..50 {
        beacon.ack_log(&format!("line {i}"));
    }
    assert!(beacon.queue().has_pending_flush());
    assert_eq!(beacon.queue().len(), 50);

    settle().await;

    assert_eq!(adapter.sent_count(), 50);
    assert!(!beacon.queue().has_pending_flush());
    assert_eq!(beacon.stats().flushes, 1);
}

#[tokio::test]
async fn test_explicit_flush_cancels_scheduled_flush() {
    let adapter = RecordingAdapter::new();
    let beacon = beacon_with(&adapter, enabled_options());

    beacon.ack_log("only");
    assert_eq!(beacon.flush(), 1);
    assert!(!beacon.queue().has_pending_flush());
    assert_eq!(beacon.flush(), 0);

    settle().await;

    assert_eq!(adapter.sent_count(), 1);
    assert_eq!(beacon.stats().flushes, 1);
}

#[tokio::test]
async fn test_flush_on_empty_queue_is_noop() {
    let adapter = RecordingAdapter::new();
    let beacon = beacon_with(&adapter, enabled_options());

    assert_eq!(beacon.flush(), 0);
    assert_eq!(adapter.sent_count(), 0);
    assert_eq!(beacon.stats().flushes, 0);
}

#[tokio::test]
async fn test_flush_uses_host_at_flush_time() {
    let adapter = RecordingAdapter::new();
    let beacon = beacon_with(&adapter, enabled_options());

    beacon.ack_log("moved");
    beacon.set_options(rask_beacon::OptionsPatch::new().host("http://other.test/b.gif?"));
    beacon.flush();

    assert_eq!(adapter.hosts(), vec!["http://other.test/b.gif?".to_string()]);
}

/// Submits a follow-up record from inside `send`.
#[derive(Default)]
struct ResubmittingAdapter {
    beacon: OnceLock<Beacon>,
    sent: Mutex<Vec<String>>,
}

impl AckAdapter for ResubmittingAdapter {
    fn ack_ready(&self, _beacon: &Beacon) {}

    fn send(&self, record: &Record, _host: &str) {
        let msg = match record.field("msg") {
            Some(FieldValue::Str(msg)) => msg,
            _ => return,
        };
        if msg == "first" {
            if let Some(beacon) = self.beacon.get() {
                assert_eq!(beacon.ack_log("follow-up"), SubmitOutcome::Queued);
            }
        }
        self.sent.lock().push(msg);
    }
}

#[tokio::test]
async fn test_record_submitted_during_flush_waits_for_next_cycle() {
    let adapter = Arc::new(ResubmittingAdapter::default());
    let beacon = Beacon::new(enabled_options(), adapter.clone()).unwrap();
    adapter.beacon.set(beacon.clone()).unwrap();

    beacon.ack_log("first");
    assert_eq!(beacon.flush(), 1);

    assert_eq!(*adapter.sent.lock(), vec!["first".to_string()]);
    assert_eq!(beacon.queue().len(), 1);
    assert!(beacon.queue().has_pending_flush());

    settle().await;

    assert_eq!(
        *adapter.sent.lock(),
        vec!["first".to_string(), "follow-up".to_string()]
    );
    assert!(beacon.queue().is_empty());
}

#[tokio::test]
async fn test_full_queue_evicts_oldest() {
    let adapter = RecordingAdapter::new();
    let beacon = Beacon::builder()
        .options(enabled_options())
        .capacity(Some(2))
        .build(adapter.clone())
        .unwrap();

    beacon.ack_log("a");
    beacon.ack_log("b");
    beacon.ack_log("c");
    beacon.flush();

    let messages: Vec<String> = adapter
        .records()
        .iter()
        .filter_map(|record| record.message().map(str::to_string))
        .collect();
    assert_eq!(messages, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(beacon.stats().evicted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_multi_thread_burst_is_flushed_after_producer_finishes() {
    let adapter = RecordingAdapter::new();
    let beacon = beacon_with(&adapter, enabled_options());

    for i in 0..5_000 {
        beacon.ack_log(&format!("line {i}"));
    }
    assert_eq!(adapter.sent_count(), 0);
    assert!(beacon.queue().has_pending_flush());

    let deadline = Instant::now() + Duration::from_secs(2);
    while adapter.sent_count() < 5_000 && Instant::now() < deadline {
        tokio::time::sleep(FLUSH_QUIET_WINDOW).await;
    }

    assert_eq!(adapter.sent_count(), 5_000);
    assert_eq!(beacon.stats().flushes, 1);
    assert!(!beacon.queue().has_pending_flush());
}
