//! The closed set of Gold aggregation strategies
//!
//! Each strategy pairs a partition-key extractor with a pure reducer. Rows
//! are always replaced whole per partition; nothing is adjusted in place.

use chrono::{DateTime, Datelike, Utc};
use medallion_config::EfficiencyConfig;
use medallion_types::{
    AssetMetricsRow, AssetUtilizationDailyRow, DimensionKind, FactFingerprint, GoldRow, GoldTable,
    MetricEntryFact, PartitionKey, ResourceEfficiencyRow, SecurityPostureRow, TeamCostMonthlyRow,
    WasteIndex,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::context::ReduceContext;
use super::reducer::{LatestReducer, MeanReducer, Reducer, SumReducer};
use crate::conformer::calendar::month_name;

/// Gold aggregation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    AssetMetrics,
    AssetUtilizationDaily,
    ResourceEfficiency,
    TeamCostsMonthly,
    SecurityPosture,
}

impl AggregationStrategy {
    pub const ALL: [AggregationStrategy; 5] = [
        AggregationStrategy::AssetMetrics,
        AggregationStrategy::AssetUtilizationDaily,
        AggregationStrategy::ResourceEfficiency,
        AggregationStrategy::TeamCostsMonthly,
        AggregationStrategy::SecurityPosture,
    ];

    pub fn table(&self) -> GoldTable {
        match self {
            AggregationStrategy::AssetMetrics => GoldTable::FactAssetMetrics,
            AggregationStrategy::AssetUtilizationDaily => GoldTable::FactAssetUtilizationDaily,
            AggregationStrategy::ResourceEfficiency => GoldTable::AggResourceEfficiency,
            AggregationStrategy::TeamCostsMonthly => GoldTable::AggTeamCostsMonthly,
            AggregationStrategy::SecurityPosture => GoldTable::ViewSecurityCompliancePosture,
        }
    }

    /// Partition a fact belongs to under this strategy
    pub fn partition_of(&self, fact: &MetricEntryFact) -> PartitionKey {
        match self {
            AggregationStrategy::AssetMetrics => PartitionKey::Fact(fact.fingerprint.clone()),
            AggregationStrategy::AssetUtilizationDaily => PartitionKey::AssetDay {
                asset: fact.keys.asset,
                date: fact.keys.date,
            },
            AggregationStrategy::ResourceEfficiency | AggregationStrategy::SecurityPosture => {
                PartitionKey::Asset(fact.keys.asset)
            }
            AggregationStrategy::TeamCostsMonthly => PartitionKey::TeamMonth {
                team: fact.keys.team,
                year: fact.event_time.year(),
                month: fact.event_time.month(),
            },
        }
    }

    /// Reduce the facts of one partition into its Gold row
    ///
    /// `facts` must be in fingerprint order. An empty partition has no row.
    pub fn reduce(
        &self,
        partition: &PartitionKey,
        facts: &[&MetricEntryFact],
        ctx: &ReduceContext,
    ) -> Option<GoldRow> {
        if facts.is_empty() {
            return None;
        }
        match (self, partition) {
            (AggregationStrategy::AssetMetrics, PartitionKey::Fact(_)) => {
                facts.first().map(|fact| GoldRow::AssetMetrics(asset_metrics(fact, ctx)))
            }
            (AggregationStrategy::AssetUtilizationDaily, _) => {
                Some(GoldRow::AssetUtilizationDaily(utilization_daily(facts, ctx)?))
            }
            (AggregationStrategy::ResourceEfficiency, _) => {
                Some(GoldRow::ResourceEfficiency(resource_efficiency(facts, ctx)?))
            }
            (AggregationStrategy::TeamCostsMonthly, PartitionKey::TeamMonth { year, month, .. }) => {
                Some(GoldRow::TeamCostMonthly(team_costs(facts, *year, *month, ctx)?))
            }
            (AggregationStrategy::SecurityPosture, _) => {
                Some(GoldRow::SecurityPosture(security_posture(facts, ctx)?))
            }
            _ => None,
        }
    }
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// Latest fact of a partition: greatest event time, then greatest fingerprint
fn latest<'a>(facts: &[&'a MetricEntryFact]) -> Option<&'a MetricEntryFact> {
    let mut reducer: LatestReducer<(DateTime<Utc>, FactFingerprint), &MetricEntryFact> =
        LatestReducer::new();
    for fact in facts {
        reducer.update(((fact.event_time, fact.fingerprint.clone()), *fact));
    }
    reducer.finalize()
}

fn asset_metrics(fact: &MetricEntryFact, ctx: &ReduceContext) -> AssetMetricsRow {
    let dims = &ctx.dimensions;
    let keys = &fact.keys;
    AssetMetricsRow {
        fingerprint: fact.fingerprint.clone(),
        source_record_id: fact.source_record_id.clone(),
        event_time: fact.event_time,
        cpu_usage_avg: fact.measures.cpu_usage_avg,
        memory_usage_avg: fact.measures.memory_usage_avg,
        hourly_cost: fact.measures.hourly_cost,
        uptime_seconds: fact.measures.uptime_seconds,
        resource_name: dims.resource_name(fact),
        serial_number: dims.natural_key(DimensionKind::Asset, keys.asset),
        provider_name: dims.natural_key(DimensionKind::Provider, keys.provider),
        hardware_spec: dims.hardware_spec(fact),
        region_code: dims.natural_key(DimensionKind::Region, keys.region),
        team_name: dims.natural_key(DimensionKind::Team, keys.team),
        service_name: dims.natural_key(DimensionKind::ServiceType, keys.service_type),
        service_category: dims.attribute(DimensionKind::ServiceType, keys.service_type, "category"),
        department: dims.attribute(DimensionKind::Team, keys.team, "department"),
        env_name: dims.natural_key(DimensionKind::Environment, keys.environment),
        status_name: dims.natural_key(DimensionKind::Status, keys.status),
        center_code: dims.natural_key(DimensionKind::CostCenter, keys.cost_center),
        security_tier: dims.natural_key(DimensionKind::SecurityTier, keys.security_tier),
        full_date: dims
            .row(DimensionKind::Date, keys.date)
            .and_then(|row| row.attribute("full_date"))
            .and_then(|v| v.as_date())
            .unwrap_or_else(|| fact.event_time.date_naive()),
    }
}

/// Mean cpu, mean memory and summed cost over a partition
struct UsageTotals {
    cpu: f64,
    memory: f64,
    cost: f64,
    count: u64,
}

fn usage_totals(facts: &[&MetricEntryFact]) -> Option<UsageTotals> {
    let mut cpu = MeanReducer::new();
    let mut memory = MeanReducer::new();
    let mut cost = SumReducer::new();
    for fact in facts {
        cpu.update(fact.measures.cpu_usage_avg);
        memory.update(fact.measures.memory_usage_avg);
        cost.update(fact.measures.cost());
    }
    Some(UsageTotals {
        cpu: cpu.finalize()?,
        memory: memory.finalize()?,
        cost: cost.finalize()?,
        count: cpu.count(),
    })
}

fn utilization_daily(
    facts: &[&MetricEntryFact],
    ctx: &ReduceContext,
) -> Option<AssetUtilizationDailyRow> {
    let totals = usage_totals(facts)?;
    let last = latest(facts)?;
    let dims = &ctx.dimensions;
    Some(AssetUtilizationDailyRow {
        asset_key: last.keys.asset,
        date_key: last.keys.date,
        full_date: last.event_time.date_naive(),
        serial_number: dims.natural_key(DimensionKind::Asset, last.keys.asset),
        resource_name: dims.resource_name(last),
        team_name: dims.natural_key(DimensionKind::Team, last.keys.team),
        env_name: dims.natural_key(DimensionKind::Environment, last.keys.environment),
        avg_cpu: totals.cpu,
        avg_memory: totals.memory,
        daily_cost: totals.cost,
        fact_count: totals.count,
    })
}

/// Waste classification of an asset's average cpu and total cost
pub fn classify_waste(avg_cpu: f64, total_cost: f64, thresholds: &EfficiencyConfig) -> WasteIndex {
    if avg_cpu < thresholds.high_waste_cpu_below && total_cost > thresholds.high_waste_cost_above {
        WasteIndex::HighWaste
    } else if avg_cpu < thresholds.potential_waste_cpu_below {
        WasteIndex::PotentialWaste
    } else if avg_cpu > thresholds.optimized_cpu_above {
        WasteIndex::Optimized
    } else {
        WasteIndex::Normal
    }
}

/// Average cpu per unit of cost; zero when nothing was spent
pub fn efficiency_score(avg_cpu: f64, total_cost: f64) -> f64 {
    if total_cost == 0.0 {
        0.0
    } else {
        avg_cpu / total_cost
    }
}

fn resource_efficiency(
    facts: &[&MetricEntryFact],
    ctx: &ReduceContext,
) -> Option<ResourceEfficiencyRow> {
    let totals = usage_totals(facts)?;
    let last = latest(facts)?;
    let dims = &ctx.dimensions;
    Some(ResourceEfficiencyRow {
        asset_key: last.keys.asset,
        serial_number: dims.natural_key(DimensionKind::Asset, last.keys.asset),
        resource_name: dims.resource_name(last),
        team_name: dims.natural_key(DimensionKind::Team, last.keys.team),
        avg_cpu: totals.cpu,
        avg_memory: totals.memory,
        total_cost: totals.cost,
        efficiency_score: efficiency_score(totals.cpu, totals.cost),
        waste_index: classify_waste(totals.cpu, totals.cost, &ctx.efficiency),
        fact_count: totals.count,
    })
}

fn team_costs(
    facts: &[&MetricEntryFact],
    year: i32,
    month: u32,
    ctx: &ReduceContext,
) -> Option<TeamCostMonthlyRow> {
    let totals = usage_totals(facts)?;
    let team = latest(facts)?.keys.team;
    let dims = &ctx.dimensions;
    Some(TeamCostMonthlyRow {
        team_key: team,
        team_name: dims.natural_key(DimensionKind::Team, team),
        department: dims.attribute(DimensionKind::Team, team, "department"),
        year,
        month,
        month_name: month_name(month).to_string(),
        total_monthly_cost: totals.cost,
        avg_cpu_efficiency: totals.cpu / 100.0,
        fact_count: totals.count,
    })
}

fn security_posture(facts: &[&MetricEntryFact], ctx: &ReduceContext) -> Option<SecurityPostureRow> {
    let last = latest(facts)?;
    let dims = &ctx.dimensions;
    let tier = dims.natural_key(DimensionKind::SecurityTier, last.keys.security_tier);
    let env_name = ctx
        .posture
        .normalize_environment(&dims.natural_key(DimensionKind::Environment, last.keys.environment));
    let status_name = dims.natural_key(DimensionKind::Status, last.keys.status);
    let posture = ctx.posture.classify(&tier, &env_name, &status_name);
    Some(SecurityPostureRow {
        asset_key: last.keys.asset,
        serial_number: dims.natural_key(DimensionKind::Asset, last.keys.asset),
        resource_name: dims.resource_name(last),
        security_tier: tier,
        env_name,
        status_name,
        last_seen: last.event_time,
        posture,
    })
}
