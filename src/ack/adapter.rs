use super::Beacon;
use crate::domain::Record;

#[cfg(test)]
use mockall::automock;

/// The environment-specific half of a beacon.
///
/// The beacon never inspects which adapter it holds; it only calls these two hooks.
#[cfg_attr(test, automock)]
pub trait AckAdapter: Send + Sync {
    /// Gather readiness measurements and submit them with [`Beacon::ack_ready`].
    fn ack_ready(&self, beacon: &Beacon);

    /// Deliver one record to the collector at `host`.
    ///
    /// Fire-and-forget: must not block the caller, and any failure is dropped
    /// inside the adapter.
    fn send(&self, record: &Record, host: &str);
}
