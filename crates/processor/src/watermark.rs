//! Input watermarks
//!
//! A watermark records which source files a run consumed and the event-time
//! range of the metric entries among them. The ledger keeps every committed
//! watermark so a run can tell whether its input was already covered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Boundary of the input processed by one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputWatermark {
    pub source_files: BTreeSet<String>,
    pub min_event_time: Option<DateTime<Utc>>,
    pub max_event_time: Option<DateTime<Utc>>,
}

impl InputWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source_file: impl Into<String>) {
        self.source_files.insert(source_file.into());
    }

    /// Widen the event-time range to include `at`
    pub fn observe(&mut self, at: DateTime<Utc>) {
        self.min_event_time = Some(self.min_event_time.map_or(at, |t| t.min(at)));
        self.max_event_time = Some(self.max_event_time.map_or(at, |t| t.max(at)));
    }

    pub fn is_empty(&self) -> bool {
        self.source_files.is_empty()
    }
}

/// All watermarks committed so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkLedger {
    covered: BTreeSet<String>,
    runs: u64,
}

impl WatermarkLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every source file of `watermark` was already committed
    pub fn is_replay(&self, watermark: &InputWatermark) -> bool {
        !watermark.is_empty()
            && watermark
                .source_files
                .iter()
                .all(|file| self.covered.contains(file))
    }

    pub fn commit(&mut self, watermark: &InputWatermark) {
        self.covered.extend(watermark.source_files.iter().cloned());
        self.runs += 1;
    }

    pub fn covered(&self) -> &BTreeSet<String> {
        &self.covered
    }

    /// Number of committed runs
    pub fn runs(&self) -> u64 {
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_observe_tracks_range() {
        let mut wm = InputWatermark::new();
        let late = Utc.with_ymd_and_hms(2024, 5, 9, 0, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        wm.observe(late);
        wm.observe(early);
        assert_eq!(wm.min_event_time, Some(early));
        assert_eq!(wm.max_event_time, Some(late));
    }

    #[test]
    fn test_replay_detection() {
        let mut ledger = WatermarkLedger::new();
        let mut first = InputWatermark::new();
        first.add_source("assets.json");
        first.add_source("metric_entries.json");
        assert!(!ledger.is_replay(&first));

        ledger.commit(&first);
        assert!(ledger.is_replay(&first));
        assert_eq!(ledger.runs(), 1);

        let mut partial = InputWatermark::new();
        partial.add_source("assets.json");
        partial.add_source("metric_entries_2024_06.json");
        assert!(!ledger.is_replay(&partial));

        assert!(!ledger.is_replay(&InputWatermark::new()));
    }
}
