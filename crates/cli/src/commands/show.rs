//! Show command - print one warehouse table from the persisted checkpoint

use clap::Args;
use medallion_config::MedallionConfig;
use medallion_processor::{FactTable, PipelineBuilder, Warehouse};
use medallion_types::{DimensionKind, DimensionRow, GoldRow, GoldTable};
use serde_json::{json, Value};
use std::path::PathBuf;

use super::open_backend;

/// Arguments of `medallion show`
#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Table name, e.g. `dim_asset`, `fact_metric_entry` or `agg_team_costs_monthly`
    #[arg(long, short, value_name = "NAME")]
    table: String,

    /// Warehouse directory written by `medallion run`
    #[arg(long, value_name = "DIR")]
    state_dir: PathBuf,
}

impl ShowArgs {
    pub async fn execute(&self, config: MedallionConfig) -> anyhow::Result<()> {
        let backend = open_backend(Some(self.state_dir.as_path())).await?;
        let pipeline = PipelineBuilder::new()
            .with_config(config)
            .with_backend(backend)
            .recover()
            .await?;

        let rows = table_rows(pipeline.warehouse(), &self.table).await?;
        println!("{}", serde_json::to_string_pretty(&rows)?);
        Ok(())
    }
}

async fn table_rows(warehouse: &Warehouse, name: &str) -> anyhow::Result<Vec<Value>> {
    if let Ok(table) = name.parse::<GoldTable>() {
        return Ok(warehouse.gold().rows(table).map(GoldRow::to_json).collect());
    }

    if name.trim().eq_ignore_ascii_case(FactTable::NAME) {
        return warehouse
            .facts()
            .iter()
            .map(|fact| serde_json::to_value(fact).map_err(Into::into))
            .collect();
    }

    match name.parse::<DimensionKind>() {
        Ok(kind) => {
            let table = warehouse.dimensions().lock(kind).await;
            Ok(table.rows().map(dimension_json).collect())
        }
        Err(_) => anyhow::bail!("unknown table '{}'", name),
    }
}

fn dimension_json(row: &DimensionRow) -> Value {
    let attributes: serde_json::Map<String, Value> = row
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), json!(value.to_raw())))
        .collect();

    json!({
        "surrogate_key": row.surrogate_key.0,
        "natural_key": row.natural_key,
        "is_active": row.is_active,
        "attributes": attributes,
        "source_file": row.source_file,
        "source_timestamp": row.source_timestamp,
    })
}
