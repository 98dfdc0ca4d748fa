use super::metrics::{QueueStats, QueueStatsSnapshot};
use super::sampling::{RandomSampler, Sampler, accepts};
use crate::ack::adapter::AckAdapter;
use crate::domain::{BeaconError, Options, OptionsPatch, Record, Stamp};
use parking_lot::{Mutex, RwLock};
use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// On a multi-thread runtime the scheduled flush waits until no record has
/// been queued for this long.
pub const FLUSH_QUIET_WINDOW: Duration = Duration::from_millis(5);

thread_local! {
    static INSIDE_QUEUE: Cell<bool> = const { Cell::new(false) };
}

/// True while this thread is running queue internals: submission, a flush,
/// or an adapter `send` call.
pub fn inside_queue() -> bool {
    INSIDE_QUEUE.with(Cell::get)
}

/// Marks the current thread as inside the queue until dropped.
struct QueueSection {
    previous: bool,
}

impl QueueSection {
    fn enter() -> Self {
        Self {
            previous: INSIDE_QUEUE.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for QueueSection {
    fn drop(&mut self) {
        INSIDE_QUEUE.with(|flag| flag.set(self.previous));
    }
}

/// How a submitted record reaches the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Straight to the adapter: no queue, no dedup, no sampling.
    Immediate,
    /// Through the queue. `sample` overrides the configured denominator.
    Batched { sample: Option<u32> },
}

impl Delivery {
    pub const SAMPLED: Delivery = Delivery::Batched { sample: None };
    pub const ALWAYS: Delivery = Delivery::Batched { sample: Some(1) };
}

/// What `submit` did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Disabled,
    Sent,
    Deduplicated,
    SampledOut,
    Queued,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum queued records; the oldest is evicted when full. `None` is unbounded.
    pub capacity: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: Some(DEFAULT_QUEUE_CAPACITY),
        }
    }
}

/// Buffers records between flushes and applies dedup and sampling policy.
///
/// Cloning is cheap and every clone shares the same queue.
#[derive(Clone)]
pub struct AckQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    options: RwLock<Options>,
    state: Mutex<QueueState>,
    adapter: Arc<dyn AckAdapter>,
    sampler: Arc<dyn Sampler>,
    runtime: Handle,
    quiet_window: Option<Duration>,
    config: QueueConfig,
    stats: QueueStats,
}

#[derive(Default)]
struct QueueState {
    records: VecDeque<Record>,
    pending: Option<PendingFlush>,
    generation: u64,
    enqueued: u64,
}

struct PendingFlush {
    generation: u64,
    handle: JoinHandle<()>,
}

impl AckQueue {
    /// Creates a queue bound to the current tokio runtime.
    ///
    /// The scheduled flush runs once the submitting code stops queueing. On a
    /// current-thread runtime that is the next turn of the scheduler. On a
    /// multi-thread runtime, where the flush task can run beside the producer,
    /// it waits for [`FLUSH_QUIET_WINDOW`] without new records, which needs the
    /// runtime's time driver.
    pub fn new(options: Options, adapter: Arc<dyn AckAdapter>) -> Result<Self, BeaconError> {
        let runtime = Handle::try_current().map_err(|e| BeaconError::Runtime(e.to_string()))?;
        Ok(Self::with_parts(
            options,
            adapter,
            Arc::new(RandomSampler),
            runtime,
            QueueConfig::default(),
        ))
    }

    pub fn with_parts(
        options: Options,
        adapter: Arc<dyn AckAdapter>,
        sampler: Arc<dyn Sampler>,
        runtime: Handle,
        config: QueueConfig,
    ) -> Self {
        let quiet_window = match runtime.runtime_flavor() {
            RuntimeFlavor::CurrentThread => None,
            _ => Some(FLUSH_QUIET_WINDOW),
        };
        Self {
            inner: Arc::new(QueueInner {
                options: RwLock::new(options),
                state: Mutex::new(QueueState::default()),
                adapter,
                sampler,
                runtime,
                quiet_window,
                config,
                stats: QueueStats::new(),
            }),
        }
    }

    pub fn options(&self) -> Options {
        self.inner.options.read().clone()
    }

    pub fn set_options(&self, patch: OptionsPatch) {
        self.inner.options.write().merge(patch);
    }

    pub fn submit(&self, mut record: Record, delivery: Delivery) -> SubmitOutcome {
        let _section = QueueSection::enter();
        let (stamp, denominator, immediate_host) = {
            let options = self.inner.options.read();
            if !options.is_enabled() {
                self.inner.stats.record_disabled();
                trace!(kind = %record.kind(), "no app configured, dropping record");
                return SubmitOutcome::Disabled;
            }
            match delivery {
                Delivery::Immediate => (Stamp::now(&options), 1, Some(options.host.clone())),
                Delivery::Batched { sample } => {
                    (Stamp::now(&options), options.sample_denominator(sample), None)
                }
            }
        };
        record.set_stamp(stamp);

        if let Some(host) = immediate_host {
            self.inner.stats.record_immediate();
            self.inner.dispatch(&record, &host);
            return SubmitOutcome::Sent;
        }

        let mut state = self.inner.state.lock();

        let duplicate = record.is_system_error()
            && state
                .records
                .back()
                .is_some_and(|last| last.is_system_error() && last.message() == record.message());
        if duplicate {
            self.inner.stats.record_deduplicated();
            trace!("collapsing repeated system error");
            return SubmitOutcome::Deduplicated;
        }

        let accepted = catch_unwind(AssertUnwindSafe(|| {
            accepts(self.inner.sampler.as_ref(), denominator)
        }));
        let accepted = match accepted {
            Ok(accepted) => accepted,
            Err(_) => {
                self.inner.stats.record_sampler_panic();
                warn!(kind = %record.kind(), "sampler panicked, record dropped");
                false
            }
        };
        if !accepted {
            self.inner.stats.record_sampled_out();
            trace!(kind = %record.kind(), denominator, "record sampled out");
            return SubmitOutcome::SampledOut;
        }

        if let Some(capacity) = self.inner.config.capacity {
            if state.records.len() >= capacity.max(1) {
                if let Some(evicted) = state.records.pop_front() {
                    self.inner.stats.record_evicted();
                    debug!(kind = %evicted.kind(), capacity, "ack queue full, evicting oldest record");
                }
            }
        }

        state.records.push_back(record);
        state.enqueued = state.enqueued.wrapping_add(1);
        self.inner.stats.record_queued();

        if state.pending.is_none() {
            state.generation = state.generation.wrapping_add(1);
            let generation = state.generation;
            let handle = self.spawn_flush(generation);
            state.pending = Some(PendingFlush { generation, handle });
        }

        SubmitOutcome::Queued
    }

    /// Drains the queue now and cancels any pending scheduled flush.
    ///
    /// Returns the number of records handed to the adapter.
    pub fn flush(&self) -> usize {
        let _section = QueueSection::enter();
        let (records, pending) = {
            let mut state = self.inner.state.lock();
            (std::mem::take(&mut state.records), state.pending.take())
        };
        if let Some(pending) = pending {
            pending.handle.abort();
        }
        self.deliver(records)
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().records.is_empty()
    }

    pub fn has_pending_flush(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.inner.stats.snapshot()
    }

    fn spawn_flush(&self, generation: u64) -> JoinHandle<()> {
        let queue = self.clone();
        self.inner.runtime.spawn(async move {
            // Let the submitting call stack unwind before draining.
            tokio::task::yield_now().await;
            if let Some(window) = queue.inner.quiet_window {
                queue.wait_for_quiet(window).await;
            }
            queue.run_scheduled_flush(generation);
        })
    }

    async fn wait_for_quiet(&self, window: Duration) {
        let mut seen = self.inner.state.lock().enqueued;
        loop {
            tokio::time::sleep(window).await;
            let current = self.inner.state.lock().enqueued;
            if current == seen {
                return;
            }
            seen = current;
        }
    }

    fn run_scheduled_flush(&self, generation: u64) {
        let _section = QueueSection::enter();
        let records = {
            let mut state = self.inner.state.lock();
            let current = state
                .pending
                .as_ref()
                .is_some_and(|pending| pending.generation == generation);
            if !current {
                // Superseded by an explicit flush.
                return;
            }
            state.pending = None;
            std::mem::take(&mut state.records)
        };
        self.deliver(records);
    }

    fn deliver(&self, records: VecDeque<Record>) -> usize {
        let count = records.len();
        if count == 0 {
            return 0;
        }

        let host = self.inner.options.read().host.clone();
        for record in &records {
            self.inner.dispatch(record, &host);
        }

        self.inner.stats.record_flush(count);
        debug!(records = count, "flushed ack queue");
        count
    }
}

impl QueueInner {
    fn dispatch(&self, record: &Record, host: &str) {
        let section = QueueSection::enter();
        let result = catch_unwind(AssertUnwindSafe(|| self.adapter.send(record, host)));
        drop(section);
        if result.is_err() {
            self.stats.record_adapter_panic();
            warn!(kind = %record.kind(), "adapter panicked while sending record, dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::Beacon;
    use crate::ack::adapter::MockAckAdapter;
    use crate::buffer::sampling::SeededSampler;
    use crate::domain::AckKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn enabled() -> Options {
        Options::from_patch(OptionsPatch::new().app("shop").host("http://collector/a.png?"))
    }

    fn queue_with(adapter: MockAckAdapter, options: Options) -> AckQueue {
        AckQueue::with_parts(
            options,
            Arc::new(adapter),
            Arc::new(SeededSampler::new(7)),
            Handle::current(),
            QueueConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_disabled_queue_never_calls_adapter() {
        let mut adapter = MockAckAdapter::new();
        adapter.expect_send().times(0);

        let queue = queue_with(adapter, Options::default());
        assert_eq!(queue.submit(Record::log("a"), Delivery::Immediate), SubmitOutcome::Disabled);
        assert_eq!(queue.submit(Record::count("b"), Delivery::ALWAYS), SubmitOutcome::Disabled);
        assert!(queue.is_empty());
        assert!(!queue.has_pending_flush());
        assert_eq!(queue.flush(), 0);
        assert_eq!(queue.stats().disabled, 2);
    }

    #[tokio::test]
    async fn test_immediate_bypasses_queue_with_current_host() {
        let mut adapter = MockAckAdapter::new();
        adapter
            .expect_send()
            .withf(|record, host| {
                record.kind() == AckKind::Log
                    && record.app() == Some("shop")
                    && host == "http://collector/a.png?"
            })
            .times(1)
            .return_const(());

        let queue = queue_with(adapter, enabled());
        assert_eq!(queue.submit(Record::log("now"), Delivery::Immediate), SubmitOutcome::Sent);
        assert!(queue.is_empty());
        assert!(!queue.has_pending_flush());
    }

    /// Panics on the first record it is asked to send.
    #[derive(Default)]
    struct PanicsOnce {
        calls: AtomicUsize,
    }

    impl AckAdapter for PanicsOnce {
        fn ack_ready(&self, _beacon: &Beacon) {}

        fn send(&self, _record: &Record, _host: &str) {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("transport exploded");
            }
        }
    }

    #[tokio::test]
    async fn test_adapter_panic_does_not_stop_remaining_records() {
        let adapter = Arc::new(PanicsOnce::default());
        let queue = AckQueue::with_parts(
            enabled(),
            adapter.clone(),
            Arc::new(RandomSampler),
            Handle::current(),
            QueueConfig::default(),
        );
        queue.submit(Record::count("first"), Delivery::ALWAYS);
        queue.submit(Record::count("second"), Delivery::ALWAYS);

        assert_eq!(queue.flush(), 2);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.stats().adapter_panics, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let mut adapter = MockAckAdapter::new();
        let mut seq = mockall::Sequence::new();
        for expected in ["b", "c"] {
            adapter
                .expect_send()
                .withf(move |record, _| {
                    record.field("name").map(|v| v.to_string()) == Some(expected.to_string())
                })
                .times(1)
                .in_sequence(&mut seq)
                .return_const(());
        }

        let queue = AckQueue::with_parts(
            enabled(),
            Arc::new(adapter),
            Arc::new(RandomSampler),
            Handle::current(),
            QueueConfig { capacity: Some(2) },
        );
        for name in ["a", "b", "c"] {
            queue.submit(Record::count(name), Delivery::ALWAYS);
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().evicted, 1);
        assert_eq!(queue.flush(), 2);
    }

    struct ExplodingSampler;

    impl Sampler for ExplodingSampler {
        fn draw(&self, _denominator: u32) -> u32 {
            panic!("sampler exploded");
        }
    }

    #[tokio::test]
    async fn test_sampler_panic_drops_record() {
        let mut adapter = MockAckAdapter::new();
        adapter.expect_send().times(1).return_const(());

        let queue = AckQueue::with_parts(
            enabled(),
            Arc::new(adapter),
            Arc::new(ExplodingSampler),
            Handle::current(),
            QueueConfig::default(),
        );

        assert_eq!(queue.submit(Record::count("c"), Delivery::SAMPLED), SubmitOutcome::SampledOut);
        assert_eq!(queue.stats().sampler_panics, 1);
        assert!(!inside_queue());

        assert_eq!(queue.submit(Record::log("still works"), Delivery::ALWAYS), SubmitOutcome::Queued);
        assert_eq!(queue.flush(), 1);
    }

    #[tokio::test]
    async fn test_adapter_runs_inside_queue_section() {
        let mut adapter = MockAckAdapter::new();
        adapter
            .expect_send()
            .withf(|_, _| inside_queue())
            .times(1)
            .return_const(());

        let queue = queue_with(adapter, enabled());
        assert!(!inside_queue());
        queue.submit(Record::log("a"), Delivery::Immediate);
        assert!(!inside_queue());
    }

    #[test]
    fn test_new_requires_runtime() {
        let adapter = MockAckAdapter::new();
        let result = AckQueue::new(enabled(), Arc::new(adapter));
        assert!(matches!(result, Err(BeaconError::Runtime(_))));
    }
}
