//! End-to-end pipeline tests over realistic Bronze batches

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use medallion_processor::conformer::calendar::date_key;
use medallion_processor::error::{ProcessorError, StageFatalError, StateError, StateResult};
use medallion_processor::pipeline::{PipelineBuilder, PipelineOrchestrator, RunState};
use medallion_processor::state::{MemoryStateBackend, SledConfig, SledStateBackend, StateBackend};
use medallion_types::{
    DimensionKind, EntityType, GoldRow, GoldTable, PartitionKey, RawBatch, RawRow, ReasonCode,
    SurrogateKey,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn rows(value: Value) -> Vec<RawRow> {
    serde_json::from_value(value).unwrap()
}

fn landed(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()
}

fn batch(source_file: &str, entity_type: EntityType, day: u32, value: Value) -> RawBatch {
    RawBatch::new(source_file, landed(day), entity_type, rows(value))
}

fn reference_batches() -> Vec<RawBatch> {
    vec![
        batch(
            "assets_2024_06.json",
            EntityType::Asset,
            1,
            json!([
                {"serial_number": "srv-1", "resource_name": "web-01", "team": "platform"},
                {"serial_number": "srv-2", "resource_name": "db-01"}
            ]),
        ),
        batch(
            "cost_centers.json",
            EntityType::CostCenter,
            1,
            json!([{"center_code": "CC-100", "department": "Engineering"}]),
        ),
        batch(
            "environments.json",
            EntityType::Environment,
            1,
            json!([{"env_name": "Production"}]),
        ),
        batch(
            "hardware_profiles.json",
            EntityType::HardwareProfile,
            1,
            json!([{"profile_name": "m5.large", "cpu_count": 2, "ram_gb": 8}]),
        ),
        batch("providers.json", EntityType::Provider, 1, json!([{"provider_name": "aws"}])),
        batch("regions.json", EntityType::Region, 1, json!([{"region_code": "us-east-1"}])),
        batch(
            "security_tiers.json",
            EntityType::SecurityTier,
            1,
            json!([{"tier_name": "Critical"}]),
        ),
        batch(
            "service_types.json",
            EntityType::ServiceType,
            1,
            json!([{"service_name": "compute", "category": "IaaS"}]),
        ),
        batch("statuses.json", EntityType::Status, 1, json!([{"status_name": "Active"}])),
        batch(
            "teams.json",
            EntityType::Team,
            1,
            json!([
                {"team_name": "platform", "department": "Engineering"},
                {"team_name": "infra", "department": "Operations"}
            ]),
        ),
    ]
}

fn metric(entry_id: &str, serial: &str, event_time: &str, cpu: f64, hourly_cost: f64) -> Value {
    json!({
        "entry_id": entry_id,
        "serial_number": serial,
        "center_code": "CC-100",
        "env_name": "Production",
        "provider_name": "aws",
        "region_code": "us-east-1",
        "tier_name": "Critical",
        "service_name": "compute",
        "status_name": "Active",
        "team_name": "platform",
        "profile_name": "m5.large",
        "event_time": event_time,
        "cpu_usage_avg": cpu,
        "memory_usage_avg": 60.0,
        "hourly_cost": hourly_cost,
        "uptime_seconds": 3600
    })
}

fn metric_batch(source_file: &str, day: u32, entries: Vec<Value>) -> RawBatch {
    batch(source_file, EntityType::MetricEntry, day, Value::Array(entries))
}

fn full_input() -> Vec<RawBatch> {
    let mut batches = reference_batches();
    batches.push(metric_batch(
        "metric_entries_2024_05.json",
        1,
        vec![
            metric("m-1", "srv-1", "2024-05-03T10:00:00Z", 40.0, 0.5),
            metric("m-2", "srv-1", "2024-05-05 08:30:00", 20.0, 1.5),
            metric("m-3", "srv-2", "2024-05-04T12:00:00Z", 80.0, 2.0),
        ],
    ));
    batches
}

fn memory_pipeline() -> PipelineOrchestrator {
    PipelineBuilder::new().build().unwrap()
}

async fn silver_gold_bytes(pipeline: &PipelineOrchestrator) -> Vec<u8> {
    let snapshot = pipeline.warehouse().snapshot().await;
    bincode::serialize(&(&snapshot.dimensions, &snapshot.facts, &snapshot.gold)).unwrap()
}

#[tokio::test]
async fn test_full_run_builds_star_schema() {
    let mut pipeline = memory_pipeline();
    let report = pipeline.run(full_input()).await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert!(!report.replay);
    assert_eq!(report.counts.facts.accepted, 3);
    assert!(report.quarantine.is_empty());
    assert_eq!(
        report.watermark.min_event_time,
        Some(Utc.with_ymd_and_hms(2024, 5, 3, 10, 0, 0).unwrap())
    );

    let warehouse = pipeline.warehouse();
    let gold = warehouse.gold();
    assert_eq!(warehouse.facts().len(), 3);
    assert_eq!(gold.len(GoldTable::FactAssetMetrics), 3);
    assert_eq!(gold.len(GoldTable::FactAssetUtilizationDaily), 3);
    assert_eq!(gold.len(GoldTable::AggResourceEfficiency), 2);
    assert_eq!(gold.len(GoldTable::AggTeamCostsMonthly), 1);
    assert_eq!(gold.len(GoldTable::ViewSecurityCompliancePosture), 2);
    assert!(warehouse.pending().is_empty());

    let metrics: Vec<_> = gold.rows(GoldTable::FactAssetMetrics).collect();
    let GoldRow::AssetMetrics(row) = metrics
        .iter()
        .find(|row| matches!(row, GoldRow::AssetMetrics(r) if r.source_record_id == "m-1"))
        .unwrap()
    else {
        panic!("unexpected row");
    };
    assert_eq!(row.resource_name, "web-01");
    assert_eq!(row.hardware_spec, "m5.large (2 vCPU / 8 GB)");
    assert_eq!(row.service_category, "IaaS");
    assert_eq!(row.department, "Engineering");
}

#[tokio::test]
async fn test_every_fact_key_resolves() {
    let mut pipeline = memory_pipeline();
    pipeline.run(full_input()).await.unwrap();

    let warehouse = pipeline.warehouse();
    for fact in warehouse.facts().iter() {
        for (kind, key) in fact.keys.iter() {
            let row = warehouse.dimensions().row(kind, key).await;
            assert!(row.is_some(), "{} key {} of {} dangling", kind, key, fact.fingerprint);
        }
    }
}

#[tokio::test]
async fn test_date_dimension_covers_event_range() {
    let mut pipeline = memory_pipeline();
    let report = pipeline.run(full_input()).await.unwrap();
    assert_eq!(report.counts.conform[&DimensionKind::Date].inserted, 3);

    let dims = pipeline.warehouse().dimensions();
    for day in 3..=5 {
        let date = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        let row = dims.row(DimensionKind::Date, date_key(date)).await.unwrap();
        assert_eq!(row.natural_key, date.format("%Y-%m-%d").to_string());
    }
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let mut pipeline = memory_pipeline();
    pipeline.run(full_input()).await.unwrap();
    let first = silver_gold_bytes(&pipeline).await;

    let report = pipeline.run(full_input()).await.unwrap();
    let second = silver_gold_bytes(&pipeline).await;

    assert!(report.replay);
    assert_eq!(report.counts.facts.accepted, 0);
    assert_eq!(report.counts.facts.skipped, 3);
    assert_eq!(report.counts.conformed().updated, 0);
    assert_eq!(first, second);
    assert_eq!(pipeline.warehouse().ledger().runs(), 2);
}

#[tokio::test]
async fn test_attribute_drift_keeps_surrogate_key() {
    let mut pipeline = memory_pipeline();
    pipeline.run(reference_batches()).await.unwrap();

    let drift = batch(
        "assets_2024_07.json",
        EntityType::Asset,
        2,
        json!([{"serial_number": "srv-1", "team": "infra"}]),
    );
    let report = pipeline.run(vec![drift]).await.unwrap();
    assert_eq!(report.counts.conform[&DimensionKind::Asset].updated, 1);

    let row = pipeline
        .warehouse()
        .dimensions()
        .row(DimensionKind::Asset, SurrogateKey(1))
        .await
        .unwrap();
    assert_eq!(row.natural_key, "srv-1");
    assert_eq!(row.display("team"), "infra");
    // absent attributes keep their stored value
    assert_eq!(row.display("resource_name"), "web-01");
    assert_eq!(row.source_file, "assets_2024_07.json");
}

#[tokio::test]
async fn test_unseen_asset_is_quarantined() {
    let mut pipeline = memory_pipeline();
    let mut batches = reference_batches();
    batches.push(metric_batch(
        "metric_entries.json",
        1,
        vec![metric("m-9", "srv-404", "2024-05-03T10:00:00Z", 10.0, 1.0)],
    ));

    let report = pipeline.run(batches).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.counts.facts.accepted, 0);
    assert_eq!(report.reason_histogram[&ReasonCode::UnresolvedDimension], 1);
    assert!(report.quarantine[0].detail.contains("srv-404"));
    assert!(pipeline.warehouse().facts().is_empty());
}

#[tokio::test]
async fn test_malformed_rows_do_not_block_batch() {
    let mut pipeline = memory_pipeline();
    let mut batches = reference_batches();
    let mut bad = metric("m-5", "srv-1", "2024-05-03T10:00:00Z", 10.0, 1.0);
    bad["cpu_usage_avg"] = json!("abc");
    let mut missing = metric("m-6", "srv-1", "2024-05-03T11:00:00Z", 10.0, 1.0);
    missing["serial_number"] = Value::Null;
    batches.push(metric_batch(
        "metric_entries.json",
        1,
        vec![bad, missing, metric("m-7", "srv-1", "2024-05-03T12:00:00Z", 10.0, 1.0)],
    ));

    let report = pipeline.run(batches).await.unwrap();
    assert_eq!(report.counts.facts.accepted, 1);
    assert_eq!(report.reason_histogram[&ReasonCode::Unparseable], 1);
    assert_eq!(report.reason_histogram[&ReasonCode::MissingField], 1);
}

#[tokio::test]
async fn test_monthly_partition_is_replaced_after_new_fact() {
    let mut pipeline = memory_pipeline();
    pipeline.run(full_input()).await.unwrap();

    let team = pipeline
        .warehouse()
        .dimensions()
        .lookups()
        .await
        .resolve(DimensionKind::Team, "platform")
        .unwrap();
    let key = PartitionKey::TeamMonth { team, year: 2024, month: 5 };
    let total = |pipeline: &PipelineOrchestrator| match pipeline
        .warehouse()
        .gold()
        .get(GoldTable::AggTeamCostsMonthly, &key)
    {
        Some(GoldRow::TeamCostMonthly(row)) => (row.fact_count, row.total_monthly_cost),
        other => panic!("unexpected row {:?}", other),
    };
    assert_eq!(total(&pipeline), (3, 4.0));

    let more = metric_batch(
        "metric_entries_2024_05_late.json",
        3,
        vec![metric("m-4", "srv-2", "2024-05-20T00:00:00Z", 50.0, 1.0)],
    );
    let report = pipeline.run(vec![more]).await.unwrap();
    assert_eq!(report.counts.facts.accepted, 1);
    assert_eq!(total(&pipeline), (4, 5.0));
}

#[tokio::test]
async fn test_entity_type_from_file_name() {
    let mut pipeline = memory_pipeline();
    let mut batch = batch(
        "regions_2024_q2.json",
        EntityType::Region,
        1,
        json!([{"Region Code": "eu-west-1"}]),
    );
    batch.entity_type = None;
    let report = pipeline.run(vec![batch]).await.unwrap();
    assert_eq!(report.counts.conform[&DimensionKind::Region].inserted, 1);

    let unknown = RawBatch {
        source_file: "widgets.json".to_string(),
        ingested_at: landed(1),
        entity_type: None,
        rows: Vec::new(),
    };
    let err = pipeline.run(vec![unknown]).await.unwrap_err();
    assert!(matches!(err, ProcessorError::Model(_)));
}

#[tokio::test]
async fn test_recover_from_sled_checkpoint() {
    let dir = TempDir::new().unwrap();
    let backend: Arc<dyn StateBackend> = Arc::new(
        SledStateBackend::open(SledConfig::new(dir.path().join("state")))
            .await
            .unwrap(),
    );

    let before = {
        let mut pipeline = PipelineBuilder::new()
            .with_backend(Arc::clone(&backend))
            .build()
            .unwrap();
        pipeline.run(full_input()).await.unwrap();
        silver_gold_bytes(&pipeline).await
    };

    let mut recovered = PipelineBuilder::new()
        .with_backend(backend)
        .recover()
        .await
        .unwrap();
    assert_eq!(silver_gold_bytes(&recovered).await, before);

    let report = recovered.run(full_input()).await.unwrap();
    assert!(report.replay);
    assert_eq!(report.counts.facts.skipped, 3);
}

/// Memory backend whose writes start failing after a budget is spent
struct FlakyBackend {
    inner: MemoryStateBackend,
    puts_left: AtomicUsize,
}

impl FlakyBackend {
    fn new(inner: MemoryStateBackend, puts: usize) -> Self {
        Self {
            inner,
            puts_left: AtomicUsize::new(puts),
        }
    }
}

#[async_trait]
impl StateBackend for FlakyBackend {
    async fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()> {
        let left = self.puts_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StateError::StorageError {
                backend_type: "flaky".to_string(),
                details: "disk unavailable".to_string(),
            });
        }
        self.puts_left.store(left - 1, Ordering::SeqCst);
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> StateResult<()> {
        self.inner.delete(key).await
    }

    async fn list_keys(&self, prefix: &[u8]) -> StateResult<Vec<Vec<u8>>> {
        self.inner.list_keys(prefix).await
    }
}

#[tokio::test]
async fn test_failed_aggregation_keeps_committed_stages() {
    let memory = MemoryStateBackend::new();
    // ingest, conform and fact-build checkpoints succeed; the aggregation one fails
    let flaky = Arc::new(FlakyBackend::new(memory.clone(), 3));
    let mut pipeline = PipelineBuilder::new().with_backend(flaky).build().unwrap();

    let err = pipeline.run(full_input()).await.unwrap_err();
    assert_eq!(err.stage(), Some(RunState::Aggregating));
    assert!(matches!(
        err,
        ProcessorError::Stage { source: StageFatalError::StorageUnavailable { .. }, .. }
    ));
    let report = pipeline.last_report().unwrap();
    assert_eq!(report.state, RunState::Failed);
    assert!(report.error.as_deref().unwrap_or_default().contains("disk unavailable"));

    let mut recovered = PipelineBuilder::new()
        .with_backend(Arc::new(memory))
        .recover()
        .await
        .unwrap();
    assert_eq!(recovered.warehouse().facts().len(), 3);
    assert!(!recovered.warehouse().pending().is_empty());
    assert_eq!(recovered.warehouse().gold().total_rows(), 0);

    let report = recovered.run(Vec::new()).await.unwrap();
    assert!(report.is_success());
    assert!(recovered.warehouse().pending().is_empty());
    assert_eq!(recovered.warehouse().gold().len(GoldTable::FactAssetMetrics), 3);
    assert_eq!(recovered.warehouse().ledger().runs(), 1);
}

fn renamed_asset() -> Vec<RawBatch> {
    vec![batch(
        "assets_2024_07.json",
        EntityType::Asset,
        2,
        json!([{"serial_number": "srv-1", "resource_name": "web-99"}]),
    )]
}

#[tokio::test]
async fn test_drift_survives_failure_after_conform_checkpoint() {
    let memory = MemoryStateBackend::new();
    let mut pipeline = PipelineBuilder::new()
        .with_backend(Arc::new(memory.clone()))
        .build()
        .unwrap();
    pipeline.run(full_input()).await.unwrap();

    // ingest and conform checkpoints succeed; the fact-build one fails
    let flaky = Arc::new(FlakyBackend::new(memory.clone(), 2));
    let mut failing = PipelineBuilder::new().with_backend(flaky).recover().await.unwrap();
    let err = failing.run(renamed_asset()).await.unwrap_err();
    assert_eq!(err.stage(), Some(RunState::FactBuilding));

    let mut retry = PipelineBuilder::new()
        .with_backend(Arc::new(memory))
        .recover()
        .await
        .unwrap();
    assert!(!retry.warehouse().pending().is_empty());

    let report = retry.run(renamed_asset()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.counts.conform[&DimensionKind::Asset].updated, 0);
    assert!(retry.warehouse().pending().is_empty());

    let renamed: Vec<String> = retry
        .warehouse()
        .gold()
        .rows(GoldTable::FactAssetMetrics)
        .filter_map(|row| match row {
            GoldRow::AssetMetrics(row) if row.serial_number == "srv-1" => {
                Some(row.resource_name.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(renamed, vec!["web-99".to_string(), "web-99".to_string()]);
}
