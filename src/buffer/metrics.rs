use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for every submission decision the queue makes.
#[derive(Debug, Default)]
pub struct QueueStats {
    disabled: AtomicU64,
    sent_immediately: AtomicU64,
    deduplicated: AtomicU64,
    sampled_out: AtomicU64,
    queued: AtomicU64,
    evicted: AtomicU64,
    flushed: AtomicU64,
    flushes: AtomicU64,
    adapter_panics: AtomicU64,
    sampler_panics: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatsSnapshot {
    pub disabled: u64,
    pub sent_immediately: u64,
    pub deduplicated: u64,
    pub sampled_out: u64,
    pub queued: u64,
    pub evicted: u64,
    pub flushed: u64,
    pub flushes: u64,
    pub adapter_panics: u64,
    pub sampler_panics: u64,
}

impl QueueStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_disabled(&self) {
        self.disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_immediate(&self) {
        self.sent_immediately.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sampled_out(&self) {
        self.sampled_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, records: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_adapter_panic(&self) {
        self.adapter_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sampler_panic(&self) {
        self.sampler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            disabled: self.disabled.load(Ordering::Relaxed),
            sent_immediately: self.sent_immediately.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            sampled_out: self.sampled_out.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            adapter_panics: self.adapter_panics.load(Ordering::Relaxed),
            sampler_panics: self.sampler_panics.load(Ordering::Relaxed),
        }
    }
}
