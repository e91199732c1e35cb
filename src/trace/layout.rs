//! Stack overlapping samples into lanes.

use serde::Serialize;

use super::event::CausalEvent;

/// A sampled span of work on one thread, placed in a lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineBar {
    pub start: f64,
    pub end: f64,
    /// 1-based; lane 1 is nearest the axis
    pub lane: usize,
    /// Symbol for the sampled address, or `???`
    pub label: String,
}

impl TimelineBar {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Half-open overlap: bars that merely touch don't overlap.
    pub fn overlaps(&self, other: &TimelineBar) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Give each bar the lowest lane not taken by an earlier bar it overlaps.
///
/// Bars are placed in slice order, so the same input always yields the same
/// layout. O(n²), which is fine for one request's worth of samples. Returns the
/// highest lane used (0 for no bars).
pub fn assign_lanes(bars: &mut [TimelineBar]) -> usize {
    let mut max_lane = 0;
    let mut taken = Vec::new();

    for i in 0..bars.len() {
        let (placed, rest) = bars.split_at_mut(i);
        let bar = &mut rest[0];

        taken.clear();
        taken.extend(placed.iter().filter(|p| p.overlaps(bar)).map(|p| p.lane));
        taken.sort_unstable();

        let mut lane = 1;
        for used in &taken {
            if *used == lane {
                lane += 1;
            } else if *used > lane {
                break;
            }
        }

        bar.lane = lane;
        max_lane = max_lane.max(lane);
    }

    max_lane
}

/// Bars for one thread's sampled events, laid out.
///
/// Events without a positive duration have no extent and get no bar.
pub fn bars_for<'a>(events: impl IntoIterator<Item = &'a CausalEvent>) -> (Vec<TimelineBar>, usize) {
    let mut bars: Vec<TimelineBar> = events
        .into_iter()
        .filter(|e| e.kind.is_sample() && e.latency.is_some_and(|l| l > 0.0))
        .map(|e| TimelineBar {
            start: e.start(),
            end: e.timestamp,
            lane: 0,
            label: e.symbol.clone().unwrap_or_else(|| "???".to_string()),
        })
        .collect();
    let max_lane = assign_lanes(&mut bars);
    (bars, max_lane)
}
