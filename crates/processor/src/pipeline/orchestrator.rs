//! Pipeline orchestrator
//!
//! Drives one run through `Ingesting → Conforming → FactBuilding →
//! Aggregating`, checkpointing the warehouse after every stage. Row-scoped
//! failures end up in the report; a fatal error halts the run, leaves the
//! committed stages in place and surfaces wrapped with the failing stage.

use chrono::{DateTime, Utc};
use medallion_config::MedallionConfig;
use medallion_types::{DimensionKind, EntityType, RawBatch, RawRecord, SurrogateKey};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::report::RunReport;
use super::run_state::RunState;
use crate::aggregation::{
    affected_partitions, AggregationEngine, DimensionView, ReduceContext,
};
use crate::conformer::{DimensionConformer, MergeResolver};
use crate::error::{ProcessorError, Result, StageFatalError, StageResult};
use crate::fact::FactBuilder;
use crate::normalizer::RecordNormalizer;
use crate::schema::EVENT_TIME;
use crate::state::StateBackend;
use crate::warehouse::Warehouse;
use crate::watermark::InputWatermark;

/// Normalized records of one run, grouped by entity type
type Ingested = BTreeMap<EntityType, Vec<RawRecord>>;

/// Surrogate keys whose attributes changed this run, per dimension
type ChangedRows = BTreeMap<DimensionKind, BTreeSet<SurrogateKey>>;

/// Sequences the components over one warehouse
pub struct PipelineOrchestrator {
    config: MedallionConfig,
    backend: Arc<dyn StateBackend>,
    warehouse: Warehouse,
    normalizer: RecordNormalizer,
    fact_builder: FactBuilder,
    engine: AggregationEngine,
    last_report: Option<RunReport>,
}

impl PipelineOrchestrator {
    /// Orchestrator over an empty warehouse
    pub fn new(config: MedallionConfig, backend: Arc<dyn StateBackend>) -> Self {
        Self::with_warehouse(config, backend, Warehouse::new())
    }

    pub(crate) fn with_warehouse(
        config: MedallionConfig,
        backend: Arc<dyn StateBackend>,
        warehouse: Warehouse,
    ) -> Self {
        Self {
            config,
            backend,
            warehouse,
            normalizer: RecordNormalizer::new(),
            fact_builder: FactBuilder::new(),
            engine: AggregationEngine::new(),
            last_report: None,
        }
    }

    /// Orchestrator over the last checkpoint in `backend`, or an empty warehouse
    pub async fn recover(config: MedallionConfig, backend: Arc<dyn StateBackend>) -> Result<Self> {
        let key = config.pipeline.checkpoint_key.clone();
        let warehouse = match Warehouse::restore(backend.as_ref(), &key).await? {
            Some(warehouse) => {
                if !warehouse.pending().is_empty() {
                    warn!(
                        pending = warehouse.pending().len(),
                        "recovered warehouse has gold partitions awaiting recomputation"
                    );
                }
                warehouse
            }
            None => {
                info!(key = %key, "no checkpoint found, starting empty");
                Warehouse::new()
            }
        };
        Ok(Self::with_warehouse(config, backend, warehouse))
    }

    pub fn config(&self) -> &MedallionConfig {
        &self.config
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Report of the most recent run, failed runs included
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Execute one run over `batches`
    ///
    /// Every batch must carry or imply an entity type. On a fatal stage error
    /// the failed report stays available through [`Self::last_report`].
    pub async fn run(&mut self, batches: Vec<RawBatch>) -> Result<RunReport> {
        let mut typed = Vec::with_capacity(batches.len());
        for batch in batches {
            let entity_type = batch.resolve_entity_type()?;
            typed.push((entity_type, batch));
        }

        let mut report = RunReport::new(self.config.pipeline.name.as_str());
        let mut state = RunState::Idle;
        info!(run_id = %report.run_id, batches = typed.len(), "run started");

        match self.execute(typed, &mut report, &mut state).await {
            Ok(()) => {
                report.finish(RunState::Completed, None);
                info!(
                    run_id = %report.run_id,
                    replay = report.replay,
                    facts = report.counts.facts.accepted,
                    skipped = report.counts.facts.skipped,
                    quarantined = report.quarantine.len(),
                    "run completed"
                );
                self.last_report = Some(report.clone());
                Ok(report)
            }
            Err(source) => {
                error!(
                    run_id = %report.run_id,
                    stage = %state,
                    error = %source,
                    "run failed"
                );
                report.finish(RunState::Failed, Some(source.to_string()));
                self.last_report = Some(report);
                Err(ProcessorError::Stage { stage: state, source })
            }
        }
    }

    async fn execute(
        &mut self,
        batches: Vec<(EntityType, RawBatch)>,
        report: &mut RunReport,
        state: &mut RunState,
    ) -> StageResult<()> {
        advance(state, RunState::Ingesting, report)?;
        let mut ingested = self.ingest(&batches, report);
        self.checkpoint().await?;

        advance(state, RunState::Conforming, report)?;
        let changed = self.conform(&mut ingested, report).await?;
        // drifted rows and the partitions they invalidate commit together
        let invalidated = affected_partitions(&[], &changed, self.warehouse.facts());
        debug!(
            run_id = %report.run_id,
            partitions = invalidated.len(),
            "gold partitions invalidated by dimension drift"
        );
        self.warehouse.mark_pending(invalidated);
        self.checkpoint().await?;

        advance(state, RunState::FactBuilding, report)?;
        let metrics = ingested.remove(&EntityType::MetricEntry).unwrap_or_default();
        self.build_facts(metrics, report).await;
        self.checkpoint().await?;

        advance(state, RunState::Aggregating, report)?;
        self.aggregate(report).await?;
        self.warehouse.commit_watermark(&report.watermark);
        self.checkpoint().await?;

        advance(state, RunState::Completed, report)?;
        Ok(())
    }

    fn ingest(&self, batches: &[(EntityType, RawBatch)], report: &mut RunReport) -> Ingested {
        let mut ingested = Ingested::new();
        let mut watermark = InputWatermark::new();

        for (entity_type, batch) in batches {
            watermark.add_source(batch.source_file.as_str());
            let normalized = self.normalizer.normalize_rows(*entity_type, batch);

            let counts = report.counts.ingest.entry(*entity_type).or_default();
            counts.accepted += normalized.records.len() as u64;
            counts.quarantined += normalized.quarantined.len() as u64;
            report.quarantine(normalized.quarantined);

            if *entity_type == EntityType::MetricEntry {
                for at in normalized.records.iter().filter_map(event_time) {
                    watermark.observe(at);
                }
            }
            ingested
                .entry(*entity_type)
                .or_default()
                .extend(normalized.records);
        }

        report.replay = self.warehouse.ledger().is_replay(&watermark);
        if report.replay {
            warn!(
                run_id = %report.run_id,
                files = watermark.source_files.len(),
                "input already covered by an earlier run, replaying"
            );
        }
        report.watermark = watermark;

        let totals = report.counts.ingested();
        info!(
            run_id = %report.run_id,
            stage = %RunState::Ingesting,
            accepted = totals.accepted,
            quarantined = totals.quarantined,
            "ingest finished"
        );
        ingested
    }

    async fn conform(
        &mut self,
        ingested: &mut Ingested,
        report: &mut RunReport,
    ) -> StageResult<ChangedRows> {
        let conformer = DimensionConformer::new(
            Arc::clone(self.warehouse.dimensions()),
            MergeResolver::new(self.config.merge.policy.clone()),
        );
        let permits = Arc::new(Semaphore::new(self.config.pipeline.parallelism.max(1)));

        let dimension_types: Vec<EntityType> = ingested
            .keys()
            .copied()
            .filter(|t| t.dimension_kind().is_some())
            .collect();

        let mut handles = Vec::with_capacity(dimension_types.len() + 1);
        for entity_type in dimension_types {
            let records = ingested.remove(&entity_type).unwrap_or_default();
            let conformer = conformer.clone();
            let permits = Arc::clone(&permits);
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|e| {
                    StageFatalError::WorkerFailed {
                        details: e.to_string(),
                    }
                })?;
                conformer.conform(entity_type, records).await
            }));
        }

        let event_times: Vec<DateTime<Utc>> = ingested
            .get(&EntityType::MetricEntry)
            .map(|records| records.iter().filter_map(event_time).collect())
            .unwrap_or_default();
        let calendar = conformer.clone();
        handles.push(tokio::spawn(async move {
            calendar.conform_calendar(event_times).await
        }));

        let mut changed = ChangedRows::new();
        for result in join_in_order(handles).await? {
            let Some(kind) = result.kind else {
                continue;
            };
            report.counts.conform.entry(kind).or_default().absorb(result.stats);
            if !result.changed.is_empty() {
                changed.entry(kind).or_default().extend(result.changed);
            }
        }

        let totals = report.counts.conformed();
        info!(
            run_id = %report.run_id,
            stage = %RunState::Conforming,
            inserted = totals.inserted,
            updated = totals.updated,
            unchanged = totals.unchanged,
            "conformance finished"
        );
        Ok(changed)
    }

    async fn build_facts(&mut self, metrics: Vec<RawRecord>, report: &mut RunReport) {
        let lookups = self.warehouse.dimensions().lookups().await;
        let built = self
            .fact_builder
            .build(metrics, &lookups, self.warehouse.facts());
        report.counts.facts = built.stats;
        report.quarantine(built.quarantined);

        self.warehouse.append_facts(built.accepted.iter().cloned());
        let affected =
            affected_partitions(&built.accepted, &ChangedRows::new(), self.warehouse.facts());
        debug!(
            run_id = %report.run_id,
            partitions = affected.len(),
            "gold partitions invalidated by new facts"
        );
        self.warehouse.mark_pending(affected);

        info!(
            run_id = %report.run_id,
            stage = %RunState::FactBuilding,
            accepted = built.stats.accepted,
            skipped = built.stats.skipped,
            quarantined = built.stats.quarantined,
            facts = self.warehouse.facts().len(),
            "fact build finished"
        );
    }

    async fn aggregate(&mut self, report: &mut RunReport) -> StageResult<()> {
        let pending = self.warehouse.pending().clone();
        if pending.is_empty() {
            debug!(run_id = %report.run_id, "no gold partitions to recompute");
            return Ok(());
        }

        let context = ReduceContext::new(
            DimensionView::new(self.warehouse.dimensions().snapshot().await),
            self.config.efficiency.clone(),
            self.config.posture.clone(),
        );
        let output = self
            .engine
            .aggregate(
                Arc::new(self.warehouse.facts().clone()),
                Arc::new(context),
                &pending,
            )
            .await?;
        report.counts.aggregation = output.stats;
        self.warehouse.apply_gold(output.updates);

        info!(
            run_id = %report.run_id,
            stage = %RunState::Aggregating,
            recomputed = output.stats.recomputed,
            removed = output.stats.removed,
            "aggregation finished"
        );
        Ok(())
    }

    /// Persist the warehouse when checkpointing is enabled
    pub async fn checkpoint(&self) -> StageResult<()> {
        if !self.config.pipeline.checkpoint_enabled {
            return Ok(());
        }
        self.warehouse
            .checkpoint(self.backend.as_ref(), &self.config.pipeline.checkpoint_key)
            .await
    }
}

fn advance(state: &mut RunState, to: RunState, report: &mut RunReport) -> StageResult<()> {
    *state = state.transition(to)?;
    report.state = *state;
    debug!(run_id = %report.run_id, stage = %to, "stage entered");
    Ok(())
}

/// Await workers in spawn order; the first failure aborts the rest
async fn join_in_order<T>(handles: Vec<JoinHandle<StageResult<T>>>) -> StageResult<Vec<T>> {
    let mut results = Vec::with_capacity(handles.len());
    let mut remaining = handles.into_iter();
    while let Some(handle) = remaining.next() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                remaining.for_each(|h| h.abort());
                return Err(e);
            }
        }
    }
    Ok(results)
}

fn event_time(record: &RawRecord) -> Option<DateTime<Utc>> {
    record.get(EVENT_TIME).and_then(|v| v.as_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_join_in_order_preserves_spawn_order() {
        let handles: Vec<JoinHandle<StageResult<u32>>> = (0..4u32)
            .map(|i| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(u64::from(4 - i))).await;
                    Ok(i)
                })
            })
            .collect();
        assert_eq!(join_in_order(handles).await.unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_worker_aborts_remaining_workers() {
        let (tx, rx) = oneshot::channel::<()>();
        let failing: JoinHandle<StageResult<()>> = tokio::spawn(async {
            Err(StageFatalError::WorkerFailed {
                details: "dimension table poisoned".to_string(),
            })
        });
        let stalled: JoinHandle<StageResult<()>> = tokio::spawn(async move {
            let _held = tx;
            std::future::pending::<()>().await;
            Ok(())
        });

        let err = join_in_order(vec![failing, stalled]).await.unwrap_err();
        assert!(matches!(err, StageFatalError::WorkerFailed { .. }));

        // the aborted worker drops its sender
        let dropped = tokio::time::timeout(Duration::from_secs(1), rx).await;
        assert!(matches!(dropped, Ok(Err(_))));
    }
}
