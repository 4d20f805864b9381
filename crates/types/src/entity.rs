//! Entity and dimension identifiers

use crate::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type tag carried by every raw row
///
/// Each variant corresponds to one Bronze source (`assets`, `metric_entries`, ...).
/// Serialized in singular snake_case; the plural source names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "asset", alias = "assets")]
    Asset,
    #[serde(rename = "cost_center", alias = "cost_centers")]
    CostCenter,
    #[serde(rename = "environment", alias = "environments")]
    Environment,
    #[serde(rename = "hardware_profile", alias = "hardware_profiles")]
    HardwareProfile,
    #[serde(rename = "metric_entry", alias = "metric_entries")]
    MetricEntry,
    #[serde(rename = "provider", alias = "providers")]
    Provider,
    #[serde(rename = "region", alias = "regions")]
    Region,
    #[serde(rename = "security_tier", alias = "security_tiers")]
    SecurityTier,
    #[serde(rename = "service_type", alias = "service_types")]
    ServiceType,
    #[serde(rename = "status", alias = "statuses")]
    Status,
    #[serde(rename = "team", alias = "teams")]
    Team,
}

impl EntityType {
    /// Every entity type, in Bronze landing order
    pub const ALL: [EntityType; 11] = [
        EntityType::Asset,
        EntityType::CostCenter,
        EntityType::Environment,
        EntityType::HardwareProfile,
        EntityType::MetricEntry,
        EntityType::Provider,
        EntityType::Region,
        EntityType::SecurityTier,
        EntityType::ServiceType,
        EntityType::Status,
        EntityType::Team,
    ];

    /// Singular identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Asset => "asset",
            EntityType::CostCenter => "cost_center",
            EntityType::Environment => "environment",
            EntityType::HardwareProfile => "hardware_profile",
            EntityType::MetricEntry => "metric_entry",
            EntityType::Provider => "provider",
            EntityType::Region => "region",
            EntityType::SecurityTier => "security_tier",
            EntityType::ServiceType => "service_type",
            EntityType::Status => "status",
            EntityType::Team => "team",
        }
    }

    /// Plural Bronze source name
    pub fn source_name(&self) -> &'static str {
        match self {
            EntityType::Asset => "assets",
            EntityType::CostCenter => "cost_centers",
            EntityType::Environment => "environments",
            EntityType::HardwareProfile => "hardware_profiles",
            EntityType::MetricEntry => "metric_entries",
            EntityType::Provider => "providers",
            EntityType::Region => "regions",
            EntityType::SecurityTier => "security_tiers",
            EntityType::ServiceType => "service_types",
            EntityType::Status => "statuses",
            EntityType::Team => "teams",
        }
    }

    /// The dimension this entity conforms into, `None` for the fact source
    pub fn dimension_kind(&self) -> Option<DimensionKind> {
        match self {
            EntityType::Asset => Some(DimensionKind::Asset),
            EntityType::CostCenter => Some(DimensionKind::CostCenter),
            EntityType::Environment => Some(DimensionKind::Environment),
            EntityType::HardwareProfile => Some(DimensionKind::HardwareProfile),
            EntityType::MetricEntry => None,
            EntityType::Provider => Some(DimensionKind::Provider),
            EntityType::Region => Some(DimensionKind::Region),
            EntityType::SecurityTier => Some(DimensionKind::SecurityTier),
            EntityType::ServiceType => Some(DimensionKind::ServiceType),
            EntityType::Status => Some(DimensionKind::Status),
            EntityType::Team => Some(DimensionKind::Team),
        }
    }

    /// Derive the entity type from a landed file name
    ///
    /// Source files are named `<source>[_<yyyy>_<suffix>].<ext>`, e.g.
    /// `metric_entries_2024_q2.json`; everything from the first `_<4 digits>_`
    /// onwards is ignored.
    pub fn from_file_name(file_name: &str) -> Result<Self, ModelError> {
        let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
        let stem = match base.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => base,
        };
        let table = strip_year_suffix(stem).to_lowercase();
        table
            .parse()
            .map_err(|_| ModelError::UnknownEntityType(file_name.to_string()))
    }
}

fn strip_year_suffix(stem: &str) -> &str {
    let bytes = stem.as_bytes();
    for start in 0..bytes.len() {
        if bytes[start] != b'_' || start + 6 > bytes.len() {
            continue;
        }
        let digits = &bytes[start + 1..start + 5];
        if digits.iter().all(u8::is_ascii_digit) && bytes[start + 5] == b'_' {
            return &stem[..start];
        }
    }
    stem
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == needle || t.source_name() == needle)
            .ok_or_else(|| ModelError::UnknownEntityType(s.to_string()))
    }
}

/// Silver dimension tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    Asset,
    CostCenter,
    Environment,
    HardwareProfile,
    Provider,
    Region,
    SecurityTier,
    ServiceType,
    Status,
    Team,
    Date,
}

impl DimensionKind {
    /// Every dimension, the date dimension last
    pub const ALL: [DimensionKind; 11] = [
        DimensionKind::Asset,
        DimensionKind::CostCenter,
        DimensionKind::Environment,
        DimensionKind::HardwareProfile,
        DimensionKind::Provider,
        DimensionKind::Region,
        DimensionKind::SecurityTier,
        DimensionKind::ServiceType,
        DimensionKind::Status,
        DimensionKind::Team,
        DimensionKind::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionKind::Asset => "asset",
            DimensionKind::CostCenter => "cost_center",
            DimensionKind::Environment => "environment",
            DimensionKind::HardwareProfile => "hardware_profile",
            DimensionKind::Provider => "provider",
            DimensionKind::Region => "region",
            DimensionKind::SecurityTier => "security_tier",
            DimensionKind::ServiceType => "service_type",
            DimensionKind::Status => "status",
            DimensionKind::Team => "team",
            DimensionKind::Date => "date",
        }
    }

    /// Silver table name, e.g. `dim_cost_center`
    pub fn table_name(&self) -> String {
        format!("dim_{}", self.as_str())
    }

    /// The entity type feeding this dimension; the date dimension is generated
    pub fn entity_type(&self) -> Option<EntityType> {
        match self {
            DimensionKind::Asset => Some(EntityType::Asset),
            DimensionKind::CostCenter => Some(EntityType::CostCenter),
            DimensionKind::Environment => Some(EntityType::Environment),
            DimensionKind::HardwareProfile => Some(EntityType::HardwareProfile),
            DimensionKind::Provider => Some(EntityType::Provider),
            DimensionKind::Region => Some(EntityType::Region),
            DimensionKind::SecurityTier => Some(EntityType::SecurityTier),
            DimensionKind::ServiceType => Some(EntityType::ServiceType),
            DimensionKind::Status => Some(EntityType::Status),
            DimensionKind::Team => Some(EntityType::Team),
            DimensionKind::Date => None,
        }
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DimensionKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        let needle = needle.strip_prefix("dim_").unwrap_or(&needle);
        DimensionKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == needle)
            .ok_or_else(|| ModelError::UnknownDimension(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_from_file_name() {
        assert_eq!(
            EntityType::from_file_name("metric_entries_2024_q2.json").unwrap(),
            EntityType::MetricEntry
        );
        assert_eq!(
            EntityType::from_file_name("bronze/Assets.csv").unwrap(),
            EntityType::Asset
        );
        assert_eq!(
            EntityType::from_file_name("statuses_2023_export.pdf").unwrap(),
            EntityType::Status
        );
        assert!(EntityType::from_file_name("invoices.csv").is_err());
    }

    #[test]
    fn test_entity_type_serde_aliases() {
        let parsed: EntityType = serde_json::from_str("\"cost_centers\"").unwrap();
        assert_eq!(parsed, EntityType::CostCenter);
        assert_eq!(
            serde_json::to_string(&EntityType::CostCenter).unwrap(),
            "\"cost_center\""
        );
    }

    #[test]
    fn test_dimension_kind_mapping() {
        assert_eq!(
            EntityType::SecurityTier.dimension_kind(),
            Some(DimensionKind::SecurityTier)
        );
        assert_eq!(EntityType::MetricEntry.dimension_kind(), None);
        assert_eq!(DimensionKind::Date.entity_type(), None);
        assert_eq!(DimensionKind::Team.table_name(), "dim_team");
        assert_eq!("dim_region".parse::<DimensionKind>().unwrap(), DimensionKind::Region);
    }
}
