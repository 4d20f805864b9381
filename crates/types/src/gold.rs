//! Gold aggregate shapes
//!
//! Every Gold row is a pure function of one partition of the fact table plus
//! the joined dimension attributes. Rows carry no identity beyond their
//! [`PartitionKey`].

use crate::dimensions::SurrogateKey;
use crate::errors::ModelError;
use crate::facts::FactFingerprint;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of Gold tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldTable {
    FactAssetMetrics,
    FactAssetUtilizationDaily,
    AggResourceEfficiency,
    AggTeamCostsMonthly,
    ViewSecurityCompliancePosture,
}

impl GoldTable {
    pub const ALL: [GoldTable; 5] = [
        GoldTable::FactAssetMetrics,
        GoldTable::FactAssetUtilizationDaily,
        GoldTable::AggResourceEfficiency,
        GoldTable::AggTeamCostsMonthly,
        GoldTable::ViewSecurityCompliancePosture,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GoldTable::FactAssetMetrics => "fact_asset_metrics",
            GoldTable::FactAssetUtilizationDaily => "fact_asset_utilization_daily",
            GoldTable::AggResourceEfficiency => "agg_resource_efficiency",
            GoldTable::AggTeamCostsMonthly => "agg_team_costs_monthly",
            GoldTable::ViewSecurityCompliancePosture => "view_security_compliance_posture",
        }
    }
}

impl fmt::Display for GoldTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for GoldTable {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        GoldTable::ALL
            .iter()
            .copied()
            .find(|t| t.name() == needle)
            .ok_or_else(|| ModelError::UnknownTable(s.to_string()))
    }
}

/// Key of one independently recomputed Gold partition
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartitionKey {
    Fact(FactFingerprint),
    AssetDay {
        asset: SurrogateKey,
        date: SurrogateKey,
    },
    Asset(SurrogateKey),
    TeamMonth {
        team: SurrogateKey,
        year: i32,
        month: u32,
    },
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Fact(fp) => write!(f, "fact:{}", fp),
            PartitionKey::AssetDay { asset, date } => write!(f, "asset:{}/date:{}", asset, date),
            PartitionKey::Asset(asset) => write!(f, "asset:{}", asset),
            PartitionKey::TeamMonth { team, year, month } => {
                write!(f, "team:{}/{:04}-{:02}", team, year, month)
            }
        }
    }
}

/// Waste classification of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteIndex {
    #[serde(rename = "High Waste")]
    HighWaste,
    #[serde(rename = "Potential Waste")]
    PotentialWaste,
    #[serde(rename = "Optimized")]
    Optimized,
    #[serde(rename = "Normal")]
    Normal,
}

impl WasteIndex {
    pub fn label(&self) -> &'static str {
        match self {
            WasteIndex::HighWaste => "High Waste",
            WasteIndex::PotentialWaste => "Potential Waste",
            WasteIndex::Optimized => "Optimized",
            WasteIndex::Normal => "Normal",
        }
    }
}

impl fmt::Display for WasteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// `fact_asset_metrics`: one enriched row per fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetricsRow {
    pub fingerprint: FactFingerprint,
    pub source_record_id: String,
    pub event_time: DateTime<Utc>,
    pub cpu_usage_avg: f64,
    pub memory_usage_avg: f64,
    pub hourly_cost: f64,
    pub uptime_seconds: i64,
    pub resource_name: String,
    pub serial_number: String,
    pub provider_name: String,
    pub hardware_spec: String,
    pub region_code: String,
    pub team_name: String,
    pub service_name: String,
    pub service_category: String,
    pub department: String,
    pub env_name: String,
    pub status_name: String,
    pub center_code: String,
    pub security_tier: String,
    pub full_date: NaiveDate,
}

/// `fact_asset_utilization_daily`: per asset per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetUtilizationDailyRow {
    pub asset_key: SurrogateKey,
    pub date_key: SurrogateKey,
    pub full_date: NaiveDate,
    pub serial_number: String,
    pub resource_name: String,
    pub team_name: String,
    pub env_name: String,
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub daily_cost: f64,
    pub fact_count: u64,
}

/// `agg_resource_efficiency`: per asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEfficiencyRow {
    pub asset_key: SurrogateKey,
    pub serial_number: String,
    pub resource_name: String,
    pub team_name: String,
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub total_cost: f64,
    pub efficiency_score: f64,
    pub waste_index: WasteIndex,
    pub fact_count: u64,
}

/// `agg_team_costs_monthly`: per team per calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamCostMonthlyRow {
    pub team_key: SurrogateKey,
    pub team_name: String,
    pub department: String,
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub total_monthly_cost: f64,
    pub avg_cpu_efficiency: f64,
    pub fact_count: u64,
}

/// `view_security_compliance_posture`: per asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityPostureRow {
    pub asset_key: SurrogateKey,
    pub serial_number: String,
    pub resource_name: String,
    pub security_tier: String,
    pub env_name: String,
    pub status_name: String,
    pub last_seen: DateTime<Utc>,
    pub posture: String,
}

/// A row of any Gold table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldRow {
    AssetMetrics(AssetMetricsRow),
    AssetUtilizationDaily(AssetUtilizationDailyRow),
    ResourceEfficiency(ResourceEfficiencyRow),
    TeamCostMonthly(TeamCostMonthlyRow),
    SecurityPosture(SecurityPostureRow),
}

impl GoldRow {
    pub fn table(&self) -> GoldTable {
        match self {
            GoldRow::AssetMetrics(_) => GoldTable::FactAssetMetrics,
            GoldRow::AssetUtilizationDaily(_) => GoldTable::FactAssetUtilizationDaily,
            GoldRow::ResourceEfficiency(_) => GoldTable::AggResourceEfficiency,
            GoldRow::TeamCostMonthly(_) => GoldTable::AggTeamCostsMonthly,
            GoldRow::SecurityPosture(_) => GoldTable::ViewSecurityCompliancePosture,
        }
    }

    pub fn partition_key(&self) -> PartitionKey {
        match self {
            GoldRow::AssetMetrics(row) => PartitionKey::Fact(row.fingerprint.clone()),
            GoldRow::AssetUtilizationDaily(row) => PartitionKey::AssetDay {
                asset: row.asset_key,
                date: row.date_key,
            },
            GoldRow::ResourceEfficiency(row) => PartitionKey::Asset(row.asset_key),
            GoldRow::TeamCostMonthly(row) => PartitionKey::TeamMonth {
                team: row.team_key,
                year: row.year,
                month: row.month,
            },
            GoldRow::SecurityPosture(row) => PartitionKey::Asset(row.asset_key),
        }
    }

    /// Row without the variant tag, for table dumps
    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            GoldRow::AssetMetrics(row) => serde_json::to_value(row),
            GoldRow::AssetUtilizationDaily(row) => serde_json::to_value(row),
            GoldRow::ResourceEfficiency(row) => serde_json::to_value(row),
            GoldRow::TeamCostMonthly(row) => serde_json::to_value(row),
            GoldRow::SecurityPosture(row) => serde_json::to_value(row),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}
