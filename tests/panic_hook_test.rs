use parking_lot::Mutex;
use rask_beacon::domain::FieldValue;
use rask_beacon::probe::install_panic_hook;
use rask_beacon::{AckAdapter, Beacon, OptionsPatch, Record};
use std::sync::Arc;

/// Records sent messages and panics when asked to send "explode".
#[derive(Default)]
struct FragileAdapter {
    sent: Mutex<Vec<Record>>,
}

impl AckAdapter for FragileAdapter {
    fn ack_ready(&self, _beacon: &Beacon) {}

    fn send(&self, record: &Record, _host: &str) {
        if record.message() == Some("explode") {
            panic!("adapter failure");
        }
        self.sent.lock().push(record.clone());
    }
}

// The panic hook is process-global, so everything runs in one test.
#[tokio::test]
async fn test_panics_are_reported_as_system_errors() {
    let adapter = Arc::new(FragileAdapter::default());
    let beacon = Beacon::new(
        OptionsPatch::new().app("shop").host("http://collector.test/a.png?"),
        adapter.clone(),
    )
    .unwrap();
    install_panic_hook(beacon.clone());

    let joined = std::thread::spawn(|| panic!("kaboom")).join();
    assert!(joined.is_err());

    {
        let sent = adapter.sent.lock();
        assert_eq!(sent.len(), 1);
        let report = &sent[0];
        assert!(report.is_system_error());
        assert_eq!(report.message(), Some("kaboom"));
        match report.field("file") {
            Some(FieldValue::Str(file)) => assert!(file.ends_with("panic_hook_test.rs")),
            other => panic!("expected file field, got {other:?}"),
        }
    }

    beacon.ack_log("explode");
    assert_eq!(beacon.flush(), 1);
    assert_eq!(beacon.stats().adapter_panics, 1);
    assert_eq!(adapter.sent.lock().len(), 1);

    let _ = std::panic::take_hook();
}
