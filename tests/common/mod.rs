#![allow(dead_code)]

use parking_lot::Mutex;
use rask_beacon::ack::TimingSpan;
use rask_beacon::{AckAdapter, Beacon, OptionsPatch, ReadyReport, Record};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const HOST: &str = "http://collector.test/a.png?";

/// Captures every record handed to the adapter together with the host it was sent to.
#[derive(Default)]
pub struct RecordingAdapter {
    sent: Mutex<Vec<(Record, String)>>,
    ready_calls: AtomicUsize,
}

impl RecordingAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<Record> {
        self.sent.lock().iter().map(|(record, _)| record.clone()).collect()
    }

    pub fn hosts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, host)| host.clone()).collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn ready_calls(&self) -> usize {
        self.ready_calls.load(Ordering::SeqCst)
    }
}

impl AckAdapter for RecordingAdapter {
    fn ack_ready(&self, beacon: &Beacon) {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        let mut report = ReadyReport::new();
        report.record(TimingSpan::RoundTrip, 1_000, 1_250);
        beacon.ack_ready(report.with_network("wifi"));
    }

    fn send(&self, record: &Record, host: &str) {
        self.sent.lock().push((record.clone(), host.to_string()));
    }
}

pub fn enabled_options() -> OptionsPatch {
    OptionsPatch::new().app("shop").host(HOST)
}

pub fn beacon_with(adapter: &Arc<RecordingAdapter>, options: OptionsPatch) -> Beacon {
    Beacon::new(options, adapter.clone()).expect("beacon requires a runtime")
}
