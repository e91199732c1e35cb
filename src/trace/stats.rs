//! Whole-trace statistics: where sampled time goes, per code address.
//!
//! Unlike the analyzer, which follows one request, these views aggregate every
//! stack sample in the trace, or the samples of a set of requests picked by
//! [`super::latency::latency_band`].
//!
//! Addresses are keyed after subtracting the return-address bias, so they name
//! the call site, the same way the analyzer reports them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;
use strum::IntoEnumIterator;

use super::record::{EventKind, TraceRecord};
use super::symbolize::{Symbol, Symbolizer};

/// The value at rank `⌊(n − 1) · q⌋` of an ascending slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (last as f64 * q.clamp(0.0, 1.0)) as usize;
    sorted.get(rank).copied()
}

/// Latency distribution of the samples taken at one address, in µs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PcStats {
    pub address: u64,
    pub symbol: Option<String>,
    pub num_samples: usize,
    pub min: f64,
    pub median: f64,
    pub p90: f64,
    pub p99: f64,
    pub p999: f64,
    pub max: f64,
    pub sum: f64,
}

impl PcStats {
    fn from_latencies(address: u64, mut latencies: Vec<f64>) -> Option<Self> {
        latencies.sort_by(f64::total_cmp);
        let max = *latencies.last()?;
        // Only zero-latency samples here; nothing to rank
        if max == 0.0 {
            return None;
        }
        Some(Self {
            address,
            symbol: None,
            num_samples: latencies.len(),
            min: latencies[0],
            median: percentile(&latencies, 0.5)?,
            p90: percentile(&latencies, 0.9)?,
            p99: percentile(&latencies, 0.99)?,
            p999: percentile(&latencies, 0.999)?,
            max,
            sum: latencies.iter().sum(),
        })
    }
}

/// Sample latencies grouped by call-site address.
#[derive(Debug)]
pub struct SampleStats {
    return_addr_bias: u64,
    by_address: HashMap<u64, Vec<f64>>,
}

impl SampleStats {
    pub fn new(return_addr_bias: u64) -> Self {
        Self {
            return_addr_bias,
            by_address: HashMap::new(),
        }
    }

    pub fn add(&mut self, record: &TraceRecord) {
        let address = record.arg2.wrapping_sub(self.return_addr_bias);
        self.by_address
            .entry(address)
            .or_default()
            .push(record.sample_latency_us());
    }

    /// Every stack sample in the trace.
    pub fn collect_all(
        records: impl IntoIterator<Item = TraceRecord>,
        return_addr_bias: u64,
    ) -> Self {
        let mut stats = Self::new(return_addr_bias);
        for record in records {
            if record.kind() == Some(EventKind::StackSample) {
                stats.add(&record);
            }
        }
        stats
    }

    /// Stack samples from threads while they carry one of `tags`.
    ///
    /// A thread joins on `TagSet` of a selected tag and leaves on re-tag,
    /// on `TagBlock`/`TagUnset` of the tag it carries, and on `TagClear`.
    /// There is no grace window: a sample is in or out by its own timestamp.
    pub fn collect_for_tags(
        records: impl IntoIterator<Item = TraceRecord>,
        tags: &HashSet<u64>,
        return_addr_bias: u64,
    ) -> Self {
        let mut records: Vec<TraceRecord> = records.into_iter().collect();
        records.sort_by(|a, b| a.timestamp_us().total_cmp(&b.timestamp_us()));

        let mut stats = Self::new(return_addr_bias);
        let mut carrying: HashMap<u32, u64> = HashMap::new();
        for record in &records {
            let tid = record.thread_id;
            match record.kind() {
                Some(EventKind::StackSample) if carrying.contains_key(&tid) => stats.add(record),
                Some(EventKind::TagSet) if tags.contains(&record.arg1) => {
                    carrying.insert(tid, record.arg1);
                }
                Some(EventKind::TagSet | EventKind::TagClear) => {
                    carrying.remove(&tid);
                }
                Some(EventKind::TagBlock | EventKind::TagUnset)
                    if carrying.get(&tid) == Some(&record.arg1) =>
                {
                    carrying.remove(&tid);
                }
                _ => {}
            }
        }
        stats
    }

    /// Per-address statistics, highest 99.9th percentile first.
    pub fn by_tail_latency(self) -> Vec<PcStats> {
        let mut stats = self.finish();
        stats.sort_by(|a, b| b.p999.total_cmp(&a.p999).then(a.address.cmp(&b.address)));
        stats
    }

    /// Per-address statistics, most total time first.
    pub fn by_total_time(self) -> Vec<PcStats> {
        let mut stats = self.finish();
        stats.sort_by(|a, b| b.sum.total_cmp(&a.sum).then(a.address.cmp(&b.address)));
        stats
    }

    fn finish(self) -> Vec<PcStats> {
        self.by_address
            .into_iter()
            .filter_map(|(address, latencies)| PcStats::from_latencies(address, latencies))
            .collect()
    }
}

/// Fill in `symbol` for every entry in one batch.
pub fn symbolize(stats: &mut [PcStats], symbolizer: &dyn Symbolizer) {
    let addresses: BTreeSet<u64> = stats.iter().map(|s| s.address).collect();
    let symbols = symbolizer.resolve(&addresses);
    for entry in stats {
        let symbol = symbols.get(&entry.address).unwrap_or(&Symbol::Unresolved);
        entry.symbol = Some(symbol.to_string());
    }
}

/// How many records of each kind a trace holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventCounts {
    pub known: BTreeMap<u32, usize>,
    /// Records whose `event_type` isn't a known kind, by raw code
    pub unknown: BTreeMap<u32, usize>,
}

impl EventCounts {
    pub fn collect(records: impl IntoIterator<Item = TraceRecord>) -> Self {
        let mut counts = Self {
            known: EventKind::iter().map(|kind| (kind.code(), 0)).collect(),
            unknown: BTreeMap::new(),
        };
        for record in records {
            let bucket = match record.kind() {
                Some(_) => &mut counts.known,
                None => &mut counts.unknown,
            };
            *bucket.entry(record.event_type).or_default() += 1;
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.known.values().chain(self.unknown.values()).sum()
    }
}
