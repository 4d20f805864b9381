//! Bronze raw record normalizer
//!
//! Validates a single raw row against its entity schema, coerces every value to
//! the declared shape and tags the result with provenance. Failures never
//! abort the batch: the row is diverted to quarantine with a reason code.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use medallion_types::{
    EntityType, FieldKind, FieldValue, Provenance, QuarantineEntry, QuarantineStage, RawBatch,
    RawRecord, RawRow, RawValue, ReasonCode,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::error::{RowError, RowResult};
use crate::schema::{normalize_column, EntitySchema, FieldSpec};

/// Outcome of normalizing one row
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(RawRecord),
    Quarantined(QuarantineEntry),
}

/// Records and quarantine entries produced from one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<RawRecord>,
    pub quarantined: Vec<QuarantineEntry>,
}

/// Per-batch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub accepted: u64,
    pub quarantined: u64,
}

impl NormalizedBatch {
    pub fn stats(&self) -> NormalizeStats {
        NormalizeStats {
            accepted: self.records.len() as u64,
            quarantined: self.quarantined.len() as u64,
        }
    }

    /// Quarantine counts by reason
    pub fn reason_histogram(&self) -> HashMap<ReasonCode, u64> {
        let mut histogram = HashMap::new();
        for entry in &self.quarantined {
            *histogram.entry(entry.reason).or_insert(0) += 1;
        }
        histogram
    }
}

/// Stateless row normalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordNormalizer;

impl RecordNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize one raw row
    pub fn normalize(&self, provenance: Provenance, row: &RawRow) -> Normalized {
        let schema = EntitySchema::for_entity(provenance.entity_type);
        match coerce_row(&schema, row) {
            Ok(fields) => Normalized::Record(RawRecord { provenance, fields }),
            Err(err) => {
                warn!(
                    entity_type = %provenance.entity_type,
                    source_file = %provenance.source_file,
                    row = provenance.row_ordinal,
                    reason = %err.reason(),
                    "row quarantined during normalization"
                );
                Normalized::Quarantined(QuarantineEntry {
                    entity_type: provenance.entity_type,
                    source_file: provenance.source_file,
                    row_ordinal: provenance.row_ordinal,
                    stage: QuarantineStage::Normalize,
                    reason: err.reason(),
                    detail: err.to_string(),
                    row: row.clone(),
                })
            }
        }
    }

    /// Normalize every row of a batch; the batch entity type must resolve
    pub fn normalize_batch(&self, batch: &RawBatch) -> medallion_types::Result<NormalizedBatch> {
        let entity_type = batch.resolve_entity_type()?;
        Ok(self.normalize_rows(entity_type, batch))
    }

    /// Normalize every row of a batch as `entity_type`
    pub fn normalize_rows(&self, entity_type: EntityType, batch: &RawBatch) -> NormalizedBatch {
        let mut out = NormalizedBatch::default();
        for (ordinal, row) in batch.rows.iter().enumerate() {
            let provenance = Provenance {
                source_file: batch.source_file.clone(),
                ingested_at: batch.ingested_at,
                entity_type,
                row_ordinal: ordinal as u64,
            };
            match self.normalize(provenance, row) {
                Normalized::Record(record) => out.records.push(record),
                Normalized::Quarantined(entry) => out.quarantined.push(entry),
            }
        }
        debug!(
            entity_type = %entity_type,
            source_file = %batch.source_file,
            accepted = out.records.len(),
            quarantined = out.quarantined.len(),
            "batch normalized"
        );
        out
    }
}

fn coerce_row(schema: &EntitySchema, row: &RawRow) -> RowResult<BTreeMap<String, FieldValue>> {
    let columns: BTreeMap<String, &RawValue> = row
        .iter()
        .map(|(name, value)| (normalize_column(name), value))
        .collect();

    let mut fields = BTreeMap::new();
    for spec in schema.fields {
        match columns.get(spec.name) {
            Some(value) if !value.is_blank() => {
                fields.insert(spec.name.to_string(), coerce(spec, value)?);
            }
            _ if spec.required => {
                return Err(RowError::MissingField {
                    field: spec.name.to_string(),
                })
            }
            _ => {}
        }
    }

    for (name, value) in &columns {
        if schema.field(name).is_some() || value.is_blank() {
            continue;
        }
        if let Some(inferred) = infer(value) {
            fields.insert(name.clone(), inferred);
        }
    }

    Ok(fields)
}

fn infer(value: &RawValue) -> Option<FieldValue> {
    match value {
        RawValue::Null => None,
        RawValue::Bool(b) => Some(FieldValue::Bool(*b)),
        RawValue::Integer(i) => Some(FieldValue::Integer(*i)),
        RawValue::Float(f) => Some(FieldValue::Number(*f)),
        RawValue::Text(s) => Some(FieldValue::Text(s.trim().to_string())),
    }
}

/// Coerce a non-blank raw value to the declared shape
pub fn coerce(spec: &FieldSpec, value: &RawValue) -> RowResult<FieldValue> {
    let mismatch = || RowError::TypeMismatch {
        field: spec.name.to_string(),
        expected: spec.kind.to_string(),
        actual: value.shape().to_string(),
    };
    let unparseable = |text: String| RowError::Unparseable {
        field: spec.name.to_string(),
        expected: spec.kind.to_string(),
        value: text,
    };

    match (spec.kind, value) {
        (_, RawValue::Null) => Err(RowError::MissingField {
            field: spec.name.to_string(),
        }),

        (FieldKind::Text, RawValue::Text(s)) => Ok(FieldValue::Text(s.trim().to_string())),
        (FieldKind::Text, RawValue::Integer(i)) => Ok(FieldValue::Text(i.to_string())),
        (FieldKind::Text, RawValue::Float(f)) => Ok(FieldValue::Text(f.to_string())),
        (FieldKind::Text, RawValue::Bool(b)) => Ok(FieldValue::Text(b.to_string())),

        (FieldKind::Number, RawValue::Integer(i)) => Ok(FieldValue::Number(*i as f64)),
        (FieldKind::Number, RawValue::Float(f)) => Ok(FieldValue::Number(*f)),
        (FieldKind::Number, RawValue::Text(s)) => parse_number(s)
            .map(FieldValue::Number)
            .ok_or_else(|| unparseable(s.clone())),
        (FieldKind::Number, RawValue::Bool(_)) => Err(mismatch()),

        (FieldKind::Integer, RawValue::Integer(i)) => Ok(FieldValue::Integer(*i)),
        (FieldKind::Integer, RawValue::Float(f)) => integral(*f)
            .map(FieldValue::Integer)
            .ok_or_else(|| unparseable(f.to_string())),
        (FieldKind::Integer, RawValue::Text(s)) => parse_integer(s)
            .map(FieldValue::Integer)
            .ok_or_else(|| unparseable(s.clone())),
        (FieldKind::Integer, RawValue::Bool(_)) => Err(mismatch()),

        (FieldKind::Boolean, RawValue::Bool(b)) => Ok(FieldValue::Bool(*b)),
        (FieldKind::Boolean, RawValue::Integer(0)) => Ok(FieldValue::Bool(false)),
        (FieldKind::Boolean, RawValue::Integer(1)) => Ok(FieldValue::Bool(true)),
        (FieldKind::Boolean, RawValue::Integer(i)) => Err(unparseable(i.to_string())),
        (FieldKind::Boolean, RawValue::Text(s)) => parse_bool(s)
            .map(FieldValue::Bool)
            .ok_or_else(|| unparseable(s.clone())),
        (FieldKind::Boolean, RawValue::Float(_)) => Err(mismatch()),

        (FieldKind::Date, RawValue::Text(s)) => parse_date(s)
            .map(FieldValue::Date)
            .ok_or_else(|| unparseable(s.clone())),
        (FieldKind::Date, _) => Err(mismatch()),

        (FieldKind::Timestamp, RawValue::Text(s)) => parse_timestamp(s)
            .map(FieldValue::Timestamp)
            .ok_or_else(|| unparseable(s.clone())),
        (FieldKind::Timestamp, _) => Err(mismatch()),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| parse_number(trimmed).and_then(integral))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|ts| ts.with_timezone(&Utc).date_naive())
        })
}

/// RFC 3339, naive date-time (UTC assumed) or a bare date at midnight UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(pairs: &[(&str, RawValue)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn provenance(entity_type: EntityType) -> Provenance {
        Provenance {
            source_file: "bronze.json".to_string(),
            ingested_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            entity_type,
            row_ordinal: 7,
        }
    }

    fn quarantined(outcome: Normalized) -> QuarantineEntry {
        match outcome {
            Normalized::Quarantined(entry) => entry,
            Normalized::Record(record) => panic!("expected quarantine, got {:?}", record),
        }
    }

    fn accepted(outcome: Normalized) -> RawRecord {
        match outcome {
            Normalized::Record(record) => record,
            Normalized::Quarantined(entry) => panic!("expected record, got {:?}", entry),
        }
    }

    #[test]
    fn test_normalizes_asset_with_extra_columns() {
        let raw = row(&[
            ("Serial Number", RawValue::from(" srv-1 ")),
            ("resource_name", RawValue::from("web")),
            ("is_active", RawValue::from("yes")),
            ("team", RawValue::from("platform")),
            ("rack", RawValue::Integer(4)),
        ]);
        let record = accepted(RecordNormalizer::new().normalize(provenance(EntityType::Asset), &raw));

        assert_eq!(record.text("serial_number").as_deref(), Some("srv-1"));
        assert_eq!(record.get("is_active"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.get("team"), Some(&FieldValue::Text("platform".into())));
        assert_eq!(record.get("rack"), Some(&FieldValue::Integer(4)));
        assert_eq!(record.provenance.row_ordinal, 7);
    }

    #[test]
    fn test_missing_required_field() {
        let raw = row(&[("serial_number", RawValue::from("   "))]);
        let entry = quarantined(RecordNormalizer::new().normalize(provenance(EntityType::Asset), &raw));
        assert_eq!(entry.reason, ReasonCode::MissingField);
        assert_eq!(entry.stage, QuarantineStage::Normalize);
        assert_eq!(entry.row, raw);
    }

    #[test]
    fn test_type_mismatch_and_unparseable() {
        let spec = FieldSpec {
            name: "hourly_cost",
            kind: FieldKind::Number,
            required: true,
        };
        assert!(matches!(
            coerce(&spec, &RawValue::Bool(true)),
            Err(RowError::TypeMismatch { .. })
        ));
        assert!(matches!(
            coerce(&spec, &RawValue::from("abc")),
            Err(RowError::Unparseable { .. })
        ));
        assert_eq!(
            coerce(&spec, &RawValue::from("0.25")).unwrap(),
            FieldValue::Number(0.25)
        );

        let date = FieldSpec {
            name: "created_at",
            kind: FieldKind::Date,
            required: false,
        };
        assert!(matches!(
            coerce(&date, &RawValue::from("2024-13-45")),
            Err(RowError::Unparseable { .. })
        ));
        assert!(matches!(
            coerce(&date, &RawValue::Integer(20240101)),
            Err(RowError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_integer_and_boolean_coercion() {
        let int = FieldSpec {
            name: "uptime_seconds",
            kind: FieldKind::Integer,
            required: true,
        };
        assert_eq!(coerce(&int, &RawValue::Float(3600.0)).unwrap(), FieldValue::Integer(3600));
        assert_eq!(coerce(&int, &RawValue::from("42")).unwrap(), FieldValue::Integer(42));
        assert!(coerce(&int, &RawValue::Float(1.5)).is_err());

        let flag = FieldSpec {
            name: "is_billable",
            kind: FieldKind::Boolean,
            required: false,
        };
        assert_eq!(coerce(&flag, &RawValue::Integer(0)).unwrap(), FieldValue::Bool(false));
        assert_eq!(coerce(&flag, &RawValue::from("N")).unwrap(), FieldValue::Bool(false));
        assert!(matches!(
            coerce(&flag, &RawValue::from("maybe")),
            Err(RowError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 3, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-03T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-03T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-03 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-03T10:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-03"),
            Some(Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(
            parse_date("2024-05-03T23:59:59Z"),
            NaiveDate::from_ymd_opt(2024, 5, 3)
        );
    }

    #[test]
    fn test_optional_blank_field_is_dropped() {
        let raw = row(&[
            ("team_name", RawValue::from("platform")),
            ("department", RawValue::Null),
        ]);
        let record = accepted(RecordNormalizer::new().normalize(provenance(EntityType::Team), &raw));
        assert!(record.get("department").is_none());
    }

    #[test]
    fn test_normalize_batch_keeps_going_past_bad_rows() {
        let batch = RawBatch {
            source_file: "teams_2024_q1.json".to_string(),
            ingested_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            entity_type: None,
            rows: vec![
                row(&[("team_name", RawValue::from("platform"))]),
                row(&[("department", RawValue::from("Engineering"))]),
                row(&[("team_name", RawValue::from("infra"))]),
            ],
        };
        let out = RecordNormalizer::new().normalize_batch(&batch).unwrap();
        assert_eq!(out.stats(), NormalizeStats { accepted: 2, quarantined: 1 });
        assert_eq!(out.quarantined[0].row_ordinal, 1);
        assert_eq!(out.reason_histogram()[&ReasonCode::MissingField], 1);
        assert_eq!(out.records[1].provenance.row_ordinal, 2);
    }
}
