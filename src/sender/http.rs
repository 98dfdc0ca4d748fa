use super::encoder::encode_query;
use crate::domain::{BeaconError, Record};
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, trace};
use url::Url;

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(5),
            user_agent: format!("rask-beacon/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SenderStatsSnapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub dropped: u64,
    pub in_flight: usize,
}

#[derive(Debug, Default)]
pub struct SenderStats {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    in_flight: AtomicUsize,
}

impl SenderStats {
    fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    fn record_completion(&self, success: bool) {
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SenderStatsSnapshot {
        SenderStatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }
}

/// Delivers each record as a GET of `host + query`, ignoring the response body.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: Client,
    runtime: Handle,
    stats: Arc<SenderStats>,
}

impl HttpSender {
    /// Must be called from within a tokio runtime; requests are spawned on it.
    pub fn new(config: SenderConfig) -> Result<Self, BeaconError> {
        let runtime = Handle::try_current().map_err(|e| BeaconError::Runtime(e.to_string()))?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| BeaconError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            runtime,
            stats: Arc::new(SenderStats::default()),
        })
    }

    pub fn build_url(host: &str, record: &Record) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{host}{}", encode_query(record)))
    }

    /// Fires the request and returns immediately.
    pub fn send(&self, record: &Record, host: &str) {
        let url = match Self::build_url(host, record) {
            Ok(url) => url,
            Err(e) => {
                self.stats.record_dropped();
                debug!(kind = %record.kind(), host, error = %e, "invalid collector URL, record dropped");
                return;
            }
        };

        self.stats.record_dispatch();
        let client = self.client.clone();
        let stats = Arc::clone(&self.stats);
        let kind = record.kind();

        self.runtime.spawn(async move {
            let start = Instant::now();
            match client.get(url).send().await {
                Ok(response) => {
                    let success = response.status().is_success();
                    stats.record_completion(success);
                    trace!(%kind, status = response.status().as_u16(), latency = ?start.elapsed(), "beacon delivered");
                }
                Err(e) => {
                    stats.record_completion(false);
                    debug!(%kind, error = %e, "beacon request failed");
                }
            }
        });
    }

    pub fn stats(&self) -> SenderStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::Acquire)
    }

    /// Waits until no request is outstanding or `timeout` elapses.
    ///
    /// Returns `true` when every request completed in time.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.in_flight() > 0 && start.elapsed() < timeout {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.in_flight() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_appends_query_to_host() {
        let url = HttpSender::build_url("http://collector:9600/a.png?", &Record::count("x")).unwrap();
        assert_eq!(url.path(), "/a.png");
        assert_eq!(url.query(), Some("_ack=cnt&name=x"));
    }

    #[test]
    fn test_build_url_rejects_relative_host() {
        assert!(HttpSender::build_url("/a.png?", &Record::count("x")).is_err());
    }

    #[tokio::test]
    async fn test_invalid_host_counts_drop() {
        let sender = HttpSender::new(SenderConfig::default()).unwrap();
        sender.send(&Record::count("x"), "not a url ");
        let stats = sender.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.dispatched, 0);
        assert!(sender.wait_idle(Duration::from_millis(10)).await);
    }
}
