//! Run reports

use chrono::{DateTime, Utc};
use medallion_types::{DimensionKind, EntityType, QuarantineEntry, ReasonCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::run_state::RunState;
use crate::aggregation::AggregationStats;
use crate::conformer::ConformStats;
use crate::fact::FactBuildStats;
use crate::normalizer::NormalizeStats;
use crate::watermark::InputWatermark;

/// Counts of every stage of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageCounts {
    pub ingest: BTreeMap<EntityType, NormalizeStats>,
    pub conform: BTreeMap<DimensionKind, ConformStats>,
    pub facts: FactBuildStats,
    pub aggregation: AggregationStats,
}

impl StageCounts {
    pub fn ingested(&self) -> NormalizeStats {
        self.ingest
            .values()
            .fold(NormalizeStats::default(), |acc, s| NormalizeStats {
                accepted: acc.accepted + s.accepted,
                quarantined: acc.quarantined + s.quarantined,
            })
    }

    pub fn conformed(&self) -> ConformStats {
        let mut total = ConformStats::default();
        for stats in self.conform.values() {
            total.absorb(*stats);
        }
        total
    }
}

/// Outcome of one pipeline run, serializable to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub watermark: InputWatermark,
    /// Every input file was already covered by an earlier run
    pub replay: bool,
    pub state: RunState,
    pub counts: StageCounts,
    pub quarantine: Vec<QuarantineEntry>,
    pub reason_histogram: BTreeMap<ReasonCode, u64>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            started_at: Utc::now(),
            finished_at: None,
            watermark: InputWatermark::new(),
            replay: false,
            state: RunState::Idle,
            counts: StageCounts::default(),
            quarantine: Vec::new(),
            reason_histogram: BTreeMap::new(),
            error: None,
        }
    }

    pub fn quarantine(&mut self, entries: impl IntoIterator<Item = QuarantineEntry>) {
        for entry in entries {
            *self.reason_histogram.entry(entry.reason).or_insert(0) += 1;
            self.quarantine.push(entry);
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn finish(&mut self, state: RunState, error: Option<String>) {
        self.state = state;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medallion_types::QuarantineStage;

    fn entry(reason: ReasonCode) -> QuarantineEntry {
        QuarantineEntry {
            entity_type: EntityType::MetricEntry,
            source_file: "metric_entries.json".to_string(),
            row_ordinal: 0,
            stage: QuarantineStage::FactBuild,
            reason,
            detail: "detail".to_string(),
            row: Default::default(),
        }
    }

    #[test]
    fn test_histogram_and_json() {
        let mut report = RunReport::new("medallion");
        report.quarantine([
            entry(ReasonCode::UnresolvedDimension),
            entry(ReasonCode::UnresolvedDimension),
            entry(ReasonCode::MissingField),
        ]);
        report.counts.conform.insert(
            DimensionKind::Asset,
            ConformStats { inserted: 2, updated: 1, unchanged: 0 },
        );
        report.finish(RunState::Completed, None);

        assert_eq!(report.reason_histogram[&ReasonCode::UnresolvedDimension], 2);
        assert!(report.is_success());

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["reason_histogram"]["unresolved_dimension"], 2);
        assert_eq!(json["counts"]["conform"]["asset"]["inserted"], 2);
        assert_eq!(report.counts.conformed().total(), 3);
    }
}
