//! Request-scoped events emitted by the analysis.

use serde::Serialize;

use super::record::EventKind;

/// What a [`CausalEvent`] records.
///
/// Mirrors [`EventKind`] for events taken straight from the trace, plus the
/// kinds the analysis synthesizes: mutex-holder samples and scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CausalKind {
    TagSet,
    TagUnset,
    TagBlock,
    TagClear,
    StackSample,
    MutexWait,
    MutexLock,
    MutexUnlock,
    JoinWait,
    JoinJoined,
    ThreadCreate,
    ThreadExit,
    /// A sample from another thread holding a mutex the request waited on
    MholderStackSample,
    SchedSwitch,
    SchedWaking,
    SchedMigrate,
}

impl CausalKind {
    /// The causal kind a raw trace event maps to, when emitted as-is.
    pub fn from_event(kind: EventKind) -> Self {
        match kind {
            EventKind::StackSample => CausalKind::StackSample,
            EventKind::TagSet => CausalKind::TagSet,
            EventKind::TagBlock => CausalKind::TagBlock,
            EventKind::TagUnset => CausalKind::TagUnset,
            EventKind::TagClear => CausalKind::TagClear,
            EventKind::MutexWait => CausalKind::MutexWait,
            EventKind::MutexLock => CausalKind::MutexLock,
            EventKind::MutexUnlock => CausalKind::MutexUnlock,
            EventKind::JoinWait => CausalKind::JoinWait,
            EventKind::JoinJoined => CausalKind::JoinJoined,
            EventKind::ThreadCreate => CausalKind::ThreadCreate,
            EventKind::ThreadExit => CausalKind::ThreadExit,
        }
    }

    /// Sampled events carry a duration and become timeline bars.
    pub fn is_sample(self) -> bool {
        matches!(
            self,
            CausalKind::StackSample | CausalKind::MholderStackSample
        )
    }

    pub fn is_sched(self) -> bool {
        matches!(
            self,
            CausalKind::SchedSwitch | CausalKind::SchedWaking | CausalKind::SchedMigrate
        )
    }
}

/// One event in a reconstructed request timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CausalEvent {
    /// Microseconds; for samples this is when the sample was taken (its end)
    pub timestamp: f64,
    pub thread_id: u32,
    pub kind: CausalKind,
    pub detail: String,
    /// Call-site address (already bias-corrected) for sampled events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<u64>,
    /// Sample duration in microseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
    /// Symbolizer output for `address`, verbatim (`???` when unresolved)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl CausalEvent {
    pub fn new(timestamp: f64, thread_id: u32, kind: CausalKind, detail: impl Into<String>) -> Self {
        Self {
            timestamp,
            thread_id,
            kind,
            detail: detail.into(),
            address: None,
            latency: None,
            symbol: None,
        }
    }

    pub fn with_sample(mut self, address: u64, latency: f64) -> Self {
        self.address = Some(address);
        self.latency = Some(latency);
        self
    }

    /// When the work this event describes began.
    pub fn start(&self) -> f64 {
        self.timestamp - self.latency.unwrap_or(0.0)
    }
}

/// Stable sort by timestamp; ties keep arrival order.
pub fn sort_by_timestamp(events: &mut [CausalEvent]) {
    events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
}
