//! Public submission surface of the beacon.

pub mod adapter;
pub mod ready;

pub use adapter::AckAdapter;
pub use ready::{MAX_SPAN_MS, Milestone, ReadyReport, TimingSpan};

use crate::buffer::{
    AckQueue, Delivery, QueueConfig, QueueStatsSnapshot, RandomSampler, Sampler, SubmitOutcome,
};
use crate::domain::{ApiCall, BeaconError, ErrorParams, Options, OptionsPatch, Record};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Builds well-formed records for each event kind and routes them to the queue.
///
/// Every operation is a silent no-op while no `app` is configured. Cloning is
/// cheap; clones share one queue.
#[derive(Clone)]
pub struct Beacon {
    queue: AckQueue,
    adapter: Arc<dyn AckAdapter>,
    ready_fired: Arc<AtomicBool>,
}

pub struct BeaconBuilder {
    options: OptionsPatch,
    sampler: Arc<dyn Sampler>,
    queue_config: QueueConfig,
    runtime: Option<Handle>,
}

impl Default for BeaconBuilder {
    fn default() -> Self {
        Self {
            options: OptionsPatch::default(),
            sampler: Arc::new(RandomSampler),
            queue_config: QueueConfig::default(),
            runtime: None,
        }
    }
}

impl BeaconBuilder {
    pub fn options(mut self, options: OptionsPatch) -> Self {
        self.options = options;
        self
    }

    pub fn sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_config.capacity = capacity;
        self
    }

    /// Runtime the flush task is spawned on. Defaults to the current one.
    ///
    /// A current-thread runtime flushes on its next turn. A multi-thread
    /// runtime must have its time driver enabled; see [`AckQueue::new`].
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self, adapter: Arc<dyn AckAdapter>) -> Result<Beacon, BeaconError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| BeaconError::Runtime(e.to_string()))?,
        };

        let queue = AckQueue::with_parts(
            Options::from_patch(self.options),
            Arc::clone(&adapter),
            self.sampler,
            runtime,
            self.queue_config,
        );

        Ok(Beacon {
            queue,
            adapter,
            ready_fired: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Beacon {
    pub fn builder() -> BeaconBuilder {
        BeaconBuilder::default()
    }

    /// Creates a beacon with `options` merged over the defaults, on the current runtime.
    pub fn new(options: OptionsPatch, adapter: Arc<dyn AckAdapter>) -> Result<Self, BeaconError> {
        Self::builder().options(options).build(adapter)
    }

    pub fn set_options(&self, patch: OptionsPatch) {
        self.queue.set_options(patch);
    }

    pub fn options(&self) -> Options {
        self.queue.options()
    }

    /// Reports an error. `error_type` defaults to `"sys"`; consecutive identical
    /// system errors collapse into one.
    pub fn ack_error(
        &self,
        message: &str,
        error_type: Option<&str>,
        params: Option<ErrorParams>,
    ) -> SubmitOutcome {
        self.queue
            .submit(Record::error(message, error_type, params), Delivery::ALWAYS)
    }

    pub fn ack_api(&self, call: ApiCall) -> SubmitOutcome {
        self.queue.submit(Record::api(call), Delivery::ALWAYS)
    }

    pub fn ack_count(&self, name: &str) -> SubmitOutcome {
        self.queue.submit(Record::count(name), Delivery::SAMPLED)
    }

    pub fn ack_statistic(&self, name: &str, value: f64) -> SubmitOutcome {
        self.queue
            .submit(Record::statistic(name, value), Delivery::SAMPLED)
    }

    pub fn ack_log(&self, message: &str) -> SubmitOutcome {
        self.queue.submit(Record::log(message), Delivery::ALWAYS)
    }

    /// Sends readiness measurements right away, bypassing the queue.
    pub fn ack_ready(&self, report: ReadyReport) -> SubmitOutcome {
        self.queue.submit(Record::ready(report), Delivery::Immediate)
    }

    /// Signals that the host finished starting up. The adapter's readiness hook
    /// runs on the first call only; later calls return `false`.
    pub fn ready(&self) -> bool {
        if self.ready_fired.swap(true, Ordering::AcqRel) {
            debug!("ready already signalled, ignoring");
            return false;
        }
        if catch_unwind(AssertUnwindSafe(|| self.adapter.ack_ready(self))).is_err() {
            warn!("readiness probe panicked, no READY record sent");
        }
        true
    }

    /// Drains all buffered records to the adapter now. Safe to call at any time.
    pub fn flush(&self) -> usize {
        self.queue.flush()
    }

    pub fn queue(&self) -> &AckQueue {
        &self.queue
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.queue.stats()
    }
}

impl fmt::Debug for Beacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Beacon")
            .field("options", &self.options())
            .field("queued", &self.queue.len())
            .field("ready_fired", &self.ready_fired.load(Ordering::Relaxed))
            .finish()
    }
}
