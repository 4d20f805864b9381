//! Per-entity field schemas
//!
//! Every Bronze source has a natural-key column plus typed required and
//! optional fields. Columns outside the schema are carried through with an
//! inferred shape.

use medallion_types::{EntityType, FieldKind};

/// One declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

/// Column carrying the dimension's active flag
pub const IS_ACTIVE: &str = "is_active";

/// Metric-entry column holding the source record id
pub const ENTRY_ID: &str = "entry_id";

/// Metric-entry column holding the event timestamp
pub const EVENT_TIME: &str = "event_time";

/// Metric-entry column naming the optional hardware profile
pub const PROFILE_NAME: &str = "profile_name";

const ASSET: &[FieldSpec] = &[
    required("serial_number", FieldKind::Text),
    optional("resource_name", FieldKind::Text),
    optional("description", FieldKind::Text),
    optional("created_at", FieldKind::Date),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const COST_CENTER: &[FieldSpec] = &[
    required("center_code", FieldKind::Text),
    optional("department", FieldKind::Text),
    optional("budget_limit", FieldKind::Number),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const ENVIRONMENT: &[FieldSpec] = &[
    required("env_name", FieldKind::Text),
    optional("tier", FieldKind::Text),
    optional("is_ephemeral", FieldKind::Boolean),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const HARDWARE_PROFILE: &[FieldSpec] = &[
    required("profile_name", FieldKind::Text),
    optional("cpu_count", FieldKind::Integer),
    optional("ram_gb", FieldKind::Integer),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const PROVIDER: &[FieldSpec] = &[
    required("provider_name", FieldKind::Text),
    optional("provider_type", FieldKind::Text),
    optional("support_contact", FieldKind::Text),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const REGION: &[FieldSpec] = &[
    required("region_code", FieldKind::Text),
    optional("display_name", FieldKind::Text),
    optional("continent", FieldKind::Text),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const SECURITY_TIER: &[FieldSpec] = &[
    required("tier_name", FieldKind::Text),
    optional("encryption_required", FieldKind::Boolean),
    optional("compliance_standard", FieldKind::Text),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const SERVICE_TYPE: &[FieldSpec] = &[
    required("service_name", FieldKind::Text),
    optional("category", FieldKind::Text),
    optional("is_managed", FieldKind::Boolean),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const STATUS: &[FieldSpec] = &[
    required("status_name", FieldKind::Text),
    optional("is_billable", FieldKind::Boolean),
    optional("description", FieldKind::Text),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const TEAM: &[FieldSpec] = &[
    required("team_name", FieldKind::Text),
    optional("department", FieldKind::Text),
    optional("lead_email", FieldKind::Text),
    optional(IS_ACTIVE, FieldKind::Boolean),
];

const METRIC_ENTRY: &[FieldSpec] = &[
    optional(ENTRY_ID, FieldKind::Text),
    required("serial_number", FieldKind::Text),
    required("center_code", FieldKind::Text),
    required("env_name", FieldKind::Text),
    required("provider_name", FieldKind::Text),
    required("region_code", FieldKind::Text),
    required("tier_name", FieldKind::Text),
    required("service_name", FieldKind::Text),
    required("status_name", FieldKind::Text),
    required("team_name", FieldKind::Text),
    optional(PROFILE_NAME, FieldKind::Text),
    required(EVENT_TIME, FieldKind::Timestamp),
    required("cpu_usage_avg", FieldKind::Number),
    required("memory_usage_avg", FieldKind::Number),
    required("hourly_cost", FieldKind::Number),
    required("uptime_seconds", FieldKind::Integer),
];

/// Field schema of one entity type
#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    pub entity_type: EntityType,
    /// Natural-key column; `None` for the fact source
    pub natural_key: Option<&'static str>,
    pub fields: &'static [FieldSpec],
}

impl EntitySchema {
    pub fn for_entity(entity_type: EntityType) -> Self {
        let (natural_key, fields) = match entity_type {
            EntityType::Asset => (Some("serial_number"), ASSET),
            EntityType::CostCenter => (Some("center_code"), COST_CENTER),
            EntityType::Environment => (Some("env_name"), ENVIRONMENT),
            EntityType::HardwareProfile => (Some("profile_name"), HARDWARE_PROFILE),
            EntityType::MetricEntry => (None, METRIC_ENTRY),
            EntityType::Provider => (Some("provider_name"), PROVIDER),
            EntityType::Region => (Some("region_code"), REGION),
            EntityType::SecurityTier => (Some("tier_name"), SECURITY_TIER),
            EntityType::ServiceType => (Some("service_name"), SERVICE_TYPE),
            EntityType::Status => (Some("status_name"), STATUS),
            EntityType::Team => (Some("team_name"), TEAM),
        };
        Self {
            entity_type,
            natural_key,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Standardise a Bronze column name: trimmed, lower-cased, spaces and dashes to `_`
pub fn normalize_column(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_dimension_schema_requires_its_natural_key() {
        for entity_type in EntityType::ALL {
            let schema = EntitySchema::for_entity(entity_type);
            if let Some(key) = schema.natural_key {
                let spec = schema.field(key).unwrap();
                assert!(spec.required, "{} natural key must be required", entity_type);
                assert_eq!(spec.kind, FieldKind::Text);
            } else {
                assert_eq!(entity_type, EntityType::MetricEntry);
            }
        }
    }

    #[test]
    fn test_metric_entry_schema() {
        let schema = EntitySchema::for_entity(EntityType::MetricEntry);
        assert_eq!(schema.field(EVENT_TIME).unwrap().kind, FieldKind::Timestamp);
        assert!(!schema.field(PROFILE_NAME).unwrap().required);
        assert!(!schema.field(ENTRY_ID).unwrap().required);
    }

    #[test]
    fn test_normalize_column() {
        assert_eq!(normalize_column(" Serial Number "), "serial_number");
        assert_eq!(normalize_column("CPU-Usage Avg"), "cpu_usage_avg");
    }
}
