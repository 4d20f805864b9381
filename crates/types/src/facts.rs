//! The metric-entry fact

use crate::dimensions::SurrogateKey;
use crate::entity::DimensionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content fingerprint identifying a fact across runs
///
/// Hex-encoded digest of the source record id and event timestamp. Stable:
/// the same source row always produces the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactFingerprint(String);

impl FactFingerprint {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FactFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolved foreign keys of a fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionKeys {
    pub asset: SurrogateKey,
    pub cost_center: SurrogateKey,
    pub environment: SurrogateKey,
    pub provider: SurrogateKey,
    pub region: SurrogateKey,
    pub security_tier: SurrogateKey,
    pub service_type: SurrogateKey,
    pub status: SurrogateKey,
    pub team: SurrogateKey,
    pub date: SurrogateKey,
    pub hardware_profile: Option<SurrogateKey>,
}

impl DimensionKeys {
    /// Every populated foreign key with its dimension
    pub fn iter(&self) -> impl Iterator<Item = (DimensionKind, SurrogateKey)> {
        let required = [
            (DimensionKind::Asset, self.asset),
            (DimensionKind::CostCenter, self.cost_center),
            (DimensionKind::Environment, self.environment),
            (DimensionKind::Provider, self.provider),
            (DimensionKind::Region, self.region),
            (DimensionKind::SecurityTier, self.security_tier),
            (DimensionKind::ServiceType, self.service_type),
            (DimensionKind::Status, self.status),
            (DimensionKind::Team, self.team),
            (DimensionKind::Date, self.date),
        ];
        let optional = self
            .hardware_profile
            .map(|key| (DimensionKind::HardwareProfile, key));
        required.into_iter().chain(optional)
    }

    pub fn get(&self, kind: DimensionKind) -> Option<SurrogateKey> {
        match kind {
            DimensionKind::Asset => Some(self.asset),
            DimensionKind::CostCenter => Some(self.cost_center),
            DimensionKind::Environment => Some(self.environment),
            DimensionKind::HardwareProfile => self.hardware_profile,
            DimensionKind::Provider => Some(self.provider),
            DimensionKind::Region => Some(self.region),
            DimensionKind::SecurityTier => Some(self.security_tier),
            DimensionKind::ServiceType => Some(self.service_type),
            DimensionKind::Status => Some(self.status),
            DimensionKind::Team => Some(self.team),
            DimensionKind::Date => Some(self.date),
        }
    }

    pub fn references(&self, kind: DimensionKind, key: SurrogateKey) -> bool {
        self.get(kind) == Some(key)
    }
}

/// Numeric measures observed by a metric entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measures {
    /// Percent, capped at 100
    pub cpu_usage_avg: f64,
    pub memory_usage_avg: f64,
    /// Rounded to 4 decimal places
    pub hourly_cost: f64,
    pub uptime_seconds: i64,
}

impl Measures {
    /// Cost incurred over the observed uptime
    pub fn cost(&self) -> f64 {
        self.hourly_cost * self.uptime_seconds as f64 / 3600.0
    }
}

/// One row of the Silver fact table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntryFact {
    pub fingerprint: FactFingerprint,
    /// `entry_id` from the source, or `<source_file>#<row_ordinal>`
    pub source_record_id: String,
    pub event_time: DateTime<Utc>,
    pub keys: DimensionKeys,
    pub measures: Measures,
    pub source_file: String,
    pub ingested_at: DateTime<Utc>,
}
