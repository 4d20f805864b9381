//! Content fingerprints of metric entries

use chrono::{DateTime, SecondsFormat, Utc};
use medallion_types::{FactFingerprint, RawRecord};
use sha2::{Digest, Sha256};

use crate::schema::ENTRY_ID;

/// Source record id of a metric entry
///
/// The `entry_id` column when present, otherwise `<source_file>#<row_ordinal>`.
pub fn source_record_id(record: &RawRecord) -> String {
    record
        .text(ENTRY_ID)
        .unwrap_or_else(|| record.provenance.locator())
}

/// SHA-256 over the source record id and the RFC 3339 event time
pub fn fingerprint(source_record_id: &str, event_time: DateTime<Utc>) -> FactFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(source_record_id.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(
        event_time
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
            .as_bytes(),
    );
    FactFingerprint::from_string(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use medallion_types::{EntityType, FieldValue, Provenance};
    use std::collections::BTreeMap;

    fn record(entry_id: Option<&str>) -> RawRecord {
        let mut fields = BTreeMap::new();
        if let Some(id) = entry_id {
            fields.insert(ENTRY_ID.to_string(), FieldValue::Text(id.to_string()));
        }
        RawRecord {
            provenance: Provenance {
                source_file: "metric_entries_2024_q2.json".to_string(),
                ingested_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
                entity_type: EntityType::MetricEntry,
                row_ordinal: 12,
            },
            fields,
        }
    }

    #[test]
    fn test_source_record_id() {
        assert_eq!(source_record_id(&record(Some("m-77"))), "m-77");
        assert_eq!(
            source_record_id(&record(None)),
            "metric_entries_2024_q2.json#12"
        );
    }

    #[test]
    fn test_fingerprint_is_stable_and_discriminating() {
        let at = Utc.with_ymd_and_hms(2024, 5, 3, 10, 0, 0).unwrap();
        let a = fingerprint("m-1", at);
        assert_eq!(a, fingerprint("m-1", at));
        assert_eq!(a.as_str().len(), 64);
        assert_ne!(a, fingerprint("m-2", at));
        assert_ne!(a, fingerprint("m-1", at + chrono::Duration::seconds(1)));
    }
}
