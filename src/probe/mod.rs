//! Environment probe for a Rust process: startup milestones, the panic hook,
//! and the adapter that ties them to a transport.

pub mod panic;

pub use panic::{install_panic_hook, panic_message, report_panic};

use crate::ack::{AckAdapter, Beacon, Milestone, ReadyReport};
use crate::domain::Record;
use crate::sender::{HttpSender, StdoutSender};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Records when startup milestones were reached.
///
/// `FetchStart` is taken when the probe is created.
#[derive(Debug)]
pub struct ProcessProbe {
    marks: Mutex<BTreeMap<Milestone, i64>>,
    network: Option<String>,
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe {
    pub fn new() -> Self {
        Self::starting_at(now_ms())
    }

    pub fn starting_at(fetch_start_ms: i64) -> Self {
        Self {
            marks: Mutex::new(BTreeMap::from([(Milestone::FetchStart, fetch_start_ms)])),
            network: None,
        }
    }

    /// Network type reported as `NT` in the READY record.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn mark(&self, milestone: Milestone) {
        self.mark_at(milestone, now_ms());
    }

    pub fn mark_at(&self, milestone: Milestone, epoch_ms: i64) {
        self.marks.lock().insert(milestone, epoch_ms);
    }

    pub fn milestone(&self, milestone: Milestone) -> Option<i64> {
        self.marks.lock().get(&milestone).copied()
    }

    pub fn report(&self) -> ReadyReport {
        let report = ReadyReport::from_milestones(&self.marks.lock());
        match &self.network {
            Some(network) => report.with_network(network.clone()),
            None => report,
        }
    }
}

pub enum Transport {
    Http(HttpSender),
    Stdout(StdoutSender),
}

/// Adapter for a plain process: readiness comes from a [`ProcessProbe`],
/// delivery from the configured [`Transport`].
pub struct ProcessAdapter {
    probe: ProcessProbe,
    transport: Transport,
}

impl ProcessAdapter {
    pub fn new(probe: ProcessProbe, transport: Transport) -> Self {
        Self { probe, transport }
    }

    pub fn probe(&self) -> &ProcessProbe {
        &self.probe
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Waits for outstanding HTTP requests; other transports are always idle.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        match &self.transport {
            Transport::Http(sender) => sender.wait_idle(timeout).await,
            Transport::Stdout(_) => true,
        }
    }
}

impl AckAdapter for ProcessAdapter {
    fn ack_ready(&self, beacon: &Beacon) {
        for milestone in [Milestone::ContentLoaded, Milestone::LoadComplete] {
            if self.probe.milestone(milestone).is_none() {
                self.probe.mark(milestone);
            }
        }
        beacon.ack_ready(self.probe.report());
    }

    fn send(&self, record: &Record, host: &str) {
        match &self.transport {
            Transport::Http(sender) => sender.send(record, host),
            Transport::Stdout(sender) => sender.send(record, host),
        }
    }
}
