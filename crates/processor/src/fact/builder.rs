//! Silver fact builder
//!
//! Resolves each metric-entry record against the conformed dimensions.
//! A record with any unresolvable foreign key is quarantined; a record whose
//! fingerprint is already known is an idempotent skip.

use chrono::{DateTime, Utc};
use medallion_types::{
    DimensionKeys, DimensionKind, EntityType, FactFingerprint, Measures, MetricEntryFact,
    QuarantineEntry, QuarantineStage, RawRecord, RawRow, SurrogateKey,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::fingerprint::{fingerprint, source_record_id};
use super::table::FactTable;
use crate::conformer::calendar::date_natural_key;
use crate::conformer::DimensionLookups;
use crate::error::{RowError, RowResult};
use crate::schema::{EVENT_TIME, PROFILE_NAME};

/// Foreign natural-key column of every required dimension
pub const FOREIGN_KEYS: [(DimensionKind, &str); 9] = [
    (DimensionKind::Asset, "serial_number"),
    (DimensionKind::CostCenter, "center_code"),
    (DimensionKind::Environment, "env_name"),
    (DimensionKind::Provider, "provider_name"),
    (DimensionKind::Region, "region_code"),
    (DimensionKind::SecurityTier, "tier_name"),
    (DimensionKind::ServiceType, "service_name"),
    (DimensionKind::Status, "status_name"),
    (DimensionKind::Team, "team_name"),
];

const CPU_CAP: f64 = 100.0;

/// Batch-level counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactBuildStats {
    pub accepted: u64,
    pub skipped: u64,
    pub quarantined: u64,
}

/// Output of one fact build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactBuildResult {
    pub accepted: Vec<MetricEntryFact>,
    /// Fingerprints already known, skipped as re-run no-ops
    pub skipped: Vec<FactFingerprint>,
    pub quarantined: Vec<QuarantineEntry>,
    pub stats: FactBuildStats,
}

/// Builds facts from normalized metric-entry records
#[derive(Debug, Clone, Copy, Default)]
pub struct FactBuilder;

impl FactBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build facts from `records`, resolving against `lookups`
    ///
    /// `existing` is consulted for idempotent skips but never modified.
    pub fn build(
        &self,
        mut records: Vec<RawRecord>,
        lookups: &DimensionLookups,
        existing: &FactTable,
    ) -> FactBuildResult {
        records.sort_by(|a, b| a.provenance.merge_order().cmp(&b.provenance.merge_order()));

        let mut result = FactBuildResult::default();
        let mut seen: HashSet<FactFingerprint> = HashSet::new();

        for record in records {
            if record.entity_type() != EntityType::MetricEntry {
                warn!(
                    entity_type = %record.entity_type(),
                    locator = %record.provenance.locator(),
                    "non metric record passed to fact builder"
                );
                continue;
            }

            let fact = match resolve(&record, lookups) {
                Ok(fact) => fact,
                Err(err) => {
                    warn!(
                        locator = %record.provenance.locator(),
                        reason = %err.reason(),
                        detail = %err,
                        "metric entry quarantined"
                    );
                    result.quarantined.push(quarantine(&record, err));
                    continue;
                }
            };

            if existing.contains(&fact.fingerprint) || !seen.insert(fact.fingerprint.clone()) {
                debug!(fingerprint = %fact.fingerprint, "fact already present, skipping");
                result.skipped.push(fact.fingerprint);
                continue;
            }
            result.accepted.push(fact);
        }

        result.stats = FactBuildStats {
            accepted: result.accepted.len() as u64,
            skipped: result.skipped.len() as u64,
            quarantined: result.quarantined.len() as u64,
        };
        info!(
            accepted = result.stats.accepted,
            skipped = result.stats.skipped,
            quarantined = result.stats.quarantined,
            "facts built"
        );
        result
    }
}

fn required_key(
    record: &RawRecord,
    lookups: &DimensionLookups,
    kind: DimensionKind,
    column: &str,
) -> RowResult<SurrogateKey> {
    let natural_key = record.text(column).ok_or_else(|| RowError::MissingField {
        field: column.to_string(),
    })?;
    lookups
        .resolve(kind, &natural_key)
        .ok_or(RowError::UnresolvedDimension {
            dimension: kind,
            natural_key,
        })
}

fn event_time(record: &RawRecord) -> RowResult<DateTime<Utc>> {
    record
        .get(EVENT_TIME)
        .and_then(|v| v.as_timestamp())
        .ok_or_else(|| RowError::MissingField {
            field: EVENT_TIME.to_string(),
        })
}

fn measure(record: &RawRecord, field: &str) -> RowResult<f64> {
    record
        .get(field)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RowError::MissingField {
            field: field.to_string(),
        })
}

fn resolve(record: &RawRecord, lookups: &DimensionLookups) -> RowResult<MetricEntryFact> {
    let event_time = event_time(record)?;

    let mut keys = [SurrogateKey(0); 9];
    for (slot, (kind, column)) in keys.iter_mut().zip(FOREIGN_KEYS) {
        *slot = required_key(record, lookups, kind, column)?;
    }

    let date_natural_key = date_natural_key(event_time.date_naive());
    let date = lookups
        .resolve(DimensionKind::Date, &date_natural_key)
        .ok_or(RowError::UnresolvedDimension {
            dimension: DimensionKind::Date,
            natural_key: date_natural_key,
        })?;

    let hardware_profile = match record.text(PROFILE_NAME) {
        Some(name) => Some(
            lookups
                .resolve(DimensionKind::HardwareProfile, &name)
                .ok_or(RowError::UnresolvedDimension {
                    dimension: DimensionKind::HardwareProfile,
                    natural_key: name,
                })?,
        ),
        None => None,
    };

    let [asset, cost_center, environment, provider, region, security_tier, service_type, status, team] =
        keys;

    let uptime_seconds = record
        .get("uptime_seconds")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RowError::MissingField {
            field: "uptime_seconds".to_string(),
        })?;

    let measures = Measures {
        cpu_usage_avg: measure(record, "cpu_usage_avg")?.min(CPU_CAP),
        memory_usage_avg: measure(record, "memory_usage_avg")?,
        hourly_cost: round4(measure(record, "hourly_cost")?),
        uptime_seconds,
    };

    let source_record_id = source_record_id(record);
    Ok(MetricEntryFact {
        fingerprint: fingerprint(&source_record_id, event_time),
        source_record_id,
        event_time,
        keys: DimensionKeys {
            asset,
            cost_center,
            environment,
            provider,
            region,
            security_tier,
            service_type,
            status,
            team,
            date,
            hardware_profile,
        },
        measures,
        source_file: record.provenance.source_file.clone(),
        ingested_at: record.provenance.ingested_at,
    })
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn quarantine(record: &RawRecord, err: RowError) -> QuarantineEntry {
    let row: RawRow = record
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_raw()))
        .collect();
    QuarantineEntry {
        entity_type: record.entity_type(),
        source_file: record.provenance.source_file.clone(),
        row_ordinal: record.provenance.row_ordinal,
        stage: QuarantineStage::FactBuild,
        reason: err.reason(),
        detail: err.to_string(),
        row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use medallion_types::{FieldValue, Provenance, ReasonCode};
    use std::collections::BTreeMap;

    fn lookups() -> DimensionLookups {
        let mut lookups = DimensionLookups::default();
        for (i, (kind, _)) in FOREIGN_KEYS.iter().enumerate() {
            lookups.insert(*kind, format!("{}-1", kind), SurrogateKey(i as u64 + 1));
        }
        lookups.insert(DimensionKind::Date, "2024-05-03".to_string(), SurrogateKey(20240503));
        lookups.insert(DimensionKind::HardwareProfile, "m5.large".to_string(), SurrogateKey(1));
        lookups
    }

    fn metric(row: u64, overrides: &[(&str, FieldValue)]) -> RawRecord {
        let mut fields: BTreeMap<String, FieldValue> = FOREIGN_KEYS
            .iter()
            .map(|(kind, column)| (column.to_string(), FieldValue::Text(format!("{}-1", kind))))
            .collect();
        fields.insert(
            EVENT_TIME.to_string(),
            FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 5, 3, 10, 0, 0).unwrap()),
        );
        fields.insert("cpu_usage_avg".to_string(), FieldValue::Number(40.0));
        fields.insert("memory_usage_avg".to_string(), FieldValue::Number(8.0));
        fields.insert("hourly_cost".to_string(), FieldValue::Number(0.123456));
        fields.insert("uptime_seconds".to_string(), FieldValue::Integer(3600));
        for (k, v) in overrides {
            fields.insert(k.to_string(), v.clone());
        }
        RawRecord {
            provenance: Provenance {
                source_file: "metric_entries.json".to_string(),
                ingested_at: Utc.with_ymd_and_hms(2024, 5, 4, 0, 0, 0).unwrap(),
                entity_type: EntityType::MetricEntry,
                row_ordinal: row,
            },
            fields,
        }
    }

    #[test]
    fn test_builds_fact_with_measure_hygiene() {
        let result = FactBuilder::new().build(
            vec![metric(0, &[("cpu_usage_avg", FieldValue::Number(130.0))])],
            &lookups(),
            &FactTable::new(),
        );
        assert_eq!(result.stats.accepted, 1);
        let fact = &result.accepted[0];
        assert_eq!(fact.measures.cpu_usage_avg, 100.0);
        assert_eq!(fact.measures.hourly_cost, 0.1235);
        assert_eq!(fact.keys.date, SurrogateKey(20240503));
        assert_eq!(fact.keys.hardware_profile, None);
        assert_eq!(fact.source_record_id, "metric_entries.json#0");
    }

    #[test]
    fn test_unresolved_dimension_is_quarantined() {
        let result = FactBuilder::new().build(
            vec![metric(0, &[("serial_number", FieldValue::Text("srv-unknown".into()))])],
            &lookups(),
            &FactTable::new(),
        );
        assert!(result.accepted.is_empty());
        assert_eq!(result.stats.quarantined, 1);
        let entry = &result.quarantined[0];
        assert_eq!(entry.reason, ReasonCode::UnresolvedDimension);
        assert_eq!(entry.stage, QuarantineStage::FactBuild);
        assert!(entry.detail.contains("srv-unknown"));
    }

    #[test]
    fn test_optional_hardware_profile() {
        let builder = FactBuilder::new();
        let known = builder.build(
            vec![metric(0, &[(PROFILE_NAME, FieldValue::Text("m5.large".into()))])],
            &lookups(),
            &FactTable::new(),
        );
        assert_eq!(known.accepted[0].keys.hardware_profile, Some(SurrogateKey(1)));

        let unknown = builder.build(
            vec![metric(0, &[(PROFILE_NAME, FieldValue::Text("x9.huge".into()))])],
            &lookups(),
            &FactTable::new(),
        );
        assert_eq!(unknown.stats.quarantined, 1);
    }

    #[test]
    fn test_duplicate_fingerprints_are_skipped() {
        let builder = FactBuilder::new();
        let id = FieldValue::Text("m-1".into());
        let first = builder.build(
            vec![metric(0, &[("entry_id", id.clone())]), metric(1, &[("entry_id", id.clone())])],
            &lookups(),
            &FactTable::new(),
        );
        assert_eq!(first.stats, FactBuildStats { accepted: 1, skipped: 1, quarantined: 0 });

        let mut table = FactTable::new();
        for fact in first.accepted {
            table.insert(fact);
        }
        let rerun = builder.build(vec![metric(0, &[("entry_id", id)])], &lookups(), &table);
        assert_eq!(rerun.stats, FactBuildStats { accepted: 0, skipped: 1, quarantined: 0 });
    }
}
