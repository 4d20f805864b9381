//! Read-only inputs shared by every strategy during one aggregation

use medallion_config::{EfficiencyConfig, PostureConfig};
use medallion_types::{DimensionKind, DimensionRow, MetricEntryFact, SurrogateKey};
use std::collections::BTreeMap;

use crate::conformer::DimensionTable;

/// Frozen copy of the dimension tables
#[derive(Debug, Clone, Default)]
pub struct DimensionView {
    tables: BTreeMap<DimensionKind, DimensionTable>,
}

impl DimensionView {
    pub fn new(tables: BTreeMap<DimensionKind, DimensionTable>) -> Self {
        Self { tables }
    }

    pub fn row(&self, kind: DimensionKind, key: SurrogateKey) -> Option<&DimensionRow> {
        self.tables.get(&kind).and_then(|t| t.get(key))
    }

    /// Natural key of a referenced row, empty when unknown
    pub fn natural_key(&self, kind: DimensionKind, key: SurrogateKey) -> String {
        self.row(kind, key)
            .map(|r| r.natural_key.clone())
            .unwrap_or_default()
    }

    /// Rendered attribute of a referenced row, empty when unknown
    pub fn attribute(&self, kind: DimensionKind, key: SurrogateKey, name: &str) -> String {
        self.row(kind, key)
            .map(|r| r.display(name))
            .unwrap_or_default()
    }

    /// `resource_name` of the fact's asset, falling back to its serial number
    pub fn resource_name(&self, fact: &MetricEntryFact) -> String {
        let name = self.attribute(DimensionKind::Asset, fact.keys.asset, "resource_name");
        if name.is_empty() {
            self.natural_key(DimensionKind::Asset, fact.keys.asset)
        } else {
            name
        }
    }

    /// `"<profile> (<cpu> vCPU / <ram> GB)"`, empty without a profile
    pub fn hardware_spec(&self, fact: &MetricEntryFact) -> String {
        let Some(row) = fact
            .keys
            .hardware_profile
            .and_then(|key| self.row(DimensionKind::HardwareProfile, key))
        else {
            return String::new();
        };
        match (row.attribute("cpu_count"), row.attribute("ram_gb")) {
            (Some(cpu), Some(ram)) => format!(
                "{} ({} vCPU / {} GB)",
                row.natural_key,
                cpu.render(),
                ram.render()
            ),
            _ => row.natural_key.clone(),
        }
    }
}

/// Everything a reducer may read besides the partition's facts
#[derive(Debug, Clone, Default)]
pub struct ReduceContext {
    pub dimensions: DimensionView,
    pub efficiency: EfficiencyConfig,
    pub posture: PostureConfig,
}

impl ReduceContext {
    pub fn new(
        dimensions: DimensionView,
        efficiency: EfficiencyConfig,
        posture: PostureConfig,
    ) -> Self {
        Self {
            dimensions,
            efficiency,
            posture,
        }
    }
}
