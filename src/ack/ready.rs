use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// Spans longer than a day are treated as clock garbage and discarded.
pub const MAX_SPAN_MS: i64 = 86_400_000;

/// Points in the host's startup timeline, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Milestone {
    FetchStart,
    DomainLookupStart,
    DomainLookupEnd,
    ConnectStart,
    ConnectEnd,
    RequestStart,
    ResponseStart,
    ContentLoaded,
    LoadComplete,
}

/// A measured interval between two milestones, keyed on the wire by a short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimingSpan {
    RoundTrip,
    Dns,
    Connect,
    TimeToFirstByte,
    ContentLoaded,
    FullLoad,
}

impl TimingSpan {
    pub const ALL: [TimingSpan; 6] = [
        TimingSpan::RoundTrip,
        TimingSpan::Dns,
        TimingSpan::Connect,
        TimingSpan::TimeToFirstByte,
        TimingSpan::ContentLoaded,
        TimingSpan::FullLoad,
    ];

    pub fn key(self) -> &'static str {
        match self {
            // Collector-side spelling.
            TimingSpan::RoundTrip => "RRT",
            TimingSpan::Dns => "DNS",
            TimingSpan::Connect => "CNT",
            TimingSpan::TimeToFirstByte => "TTFB",
            TimingSpan::ContentLoaded => "DLD",
            TimingSpan::FullLoad => "FLD",
        }
    }

    pub fn bounds(self) -> (Milestone, Milestone) {
        match self {
            TimingSpan::RoundTrip => (Milestone::RequestStart, Milestone::ResponseStart),
            TimingSpan::Dns => (Milestone::DomainLookupStart, Milestone::DomainLookupEnd),
            TimingSpan::Connect => (Milestone::ConnectStart, Milestone::ConnectEnd),
            TimingSpan::TimeToFirstByte => (Milestone::FetchStart, Milestone::ResponseStart),
            TimingSpan::ContentLoaded => (Milestone::FetchStart, Milestone::ContentLoaded),
            TimingSpan::FullLoad => (Milestone::FetchStart, Milestone::LoadComplete),
        }
    }
}

/// Readiness measurements carried by a READY record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadyReport {
    spans: BTreeMap<TimingSpan, u64>,
    network: Option<String>,
}

impl ReadyReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every span whose two milestones were observed.
    pub fn from_milestones(marks: &BTreeMap<Milestone, i64>) -> Self {
        let mut report = Self::new();
        for span in TimingSpan::ALL {
            let (start, end) = span.bounds();
            if let (Some(&start_ms), Some(&end_ms)) = (marks.get(&start), marks.get(&end)) {
                report.record(span, start_ms, end_ms);
            }
        }
        report
    }

    /// Stores `end - start` unless either bound is zero or the result falls
    /// outside `[0, MAX_SPAN_MS)`. Returns whether the span was kept.
    pub fn record(&mut self, span: TimingSpan, start_ms: i64, end_ms: i64) -> bool {
        if start_ms == 0 || end_ms == 0 {
            return false;
        }
        let elapsed = end_ms - start_ms;
        if !(0..MAX_SPAN_MS).contains(&elapsed) {
            return false;
        }
        self.spans.insert(span, elapsed as u64);
        true
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn span(&self, span: TimingSpan) -> Option<u64> {
        self.spans.get(&span).copied()
    }

    pub fn spans(&self) -> impl Iterator<Item = (TimingSpan, u64)> + '_ {
        self.spans.iter().map(|(span, millis)| (*span, *millis))
    }

    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }
}

impl Serialize for ReadyReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.spans.len() + usize::from(self.network.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (span, millis) in &self.spans {
            map.serialize_entry(span.key(), millis)?;
        }
        if let Some(network) = &self.network {
            map.serialize_entry("NT", network)?;
        }
        map.end()
    }
}
