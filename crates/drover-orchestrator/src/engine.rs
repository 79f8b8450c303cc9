//! The run loop: pull, select, pipeline, record, repeat.

use crate::backlog::Backlog;
use crate::pipeline::{ItemOutcome, Pipeline, PipelineConfig};
use crate::session::SessionStatsAggregator;
use drover_agent::{AgentInvoker, AgentRunner, RetryPolicy};
use drover_bridge::EventEmitter;
use drover_core::{
    AgentKind, DroverConfig, DroverResult, ItemStatus, LogEntry, LogStyle,
    ModelCompletionRecord, ProgressState, WorkItem,
};
use drover_models::{ModelPerformanceStore, ModelSelector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How long a run keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Process at most one item, then stop.
    SingleShot,
    /// Process items until the backlog is empty, then stop.
    Drain,
    /// Drain the backlog, then keep polling it until cancelled.
    Continuous,
}

/// Summary of a finished orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Items pulled from the backlog and driven to a terminal state.
    pub items_processed: u64,
    /// Items that completed the full pipeline.
    pub items_done: u64,
    /// Items that ended in `Failed`.
    pub items_failed: u64,
    /// Wall-clock duration of the run, in seconds.
    pub elapsed_seconds: f64,
}

/// The backlog-draining engine.
///
/// Pulls items one at a time, anchors each to a model chosen from the
/// recorded performance history, drives it through the pipeline, and
/// records the terminal outcome exactly once in the session stats, the
/// performance store, and the selector's recent-health window.
pub struct Orchestrator {
    backlog: Arc<dyn Backlog>,
    store: Arc<dyn ModelPerformanceStore>,
    selector: Arc<ModelSelector>,
    pipeline: Pipeline,
    stats: Arc<SessionStatsAggregator>,
    emitter: EventEmitter,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl Orchestrator {
    /// Wires an engine from configuration and its collaborators.
    pub fn new(
        config: &DroverConfig,
        backlog: Arc<dyn Backlog>,
        invoker: Arc<dyn AgentInvoker>,
        store: Arc<dyn ModelPerformanceStore>,
        emitter: EventEmitter,
        cancel: CancellationToken,
    ) -> Self {
        let runner = Arc::new(AgentRunner::new(
            invoker,
            RetryPolicy::from(&config.pipeline),
            config.models.fallback.clone(),
        ));
        let stats = Arc::new(SessionStatsAggregator::new());
        let pipeline = Pipeline::new(
            PipelineConfig::from(&config.pipeline),
            runner,
            stats.clone(),
            emitter.clone(),
        );
        let selector = Arc::new(ModelSelector::new(
            config.models.clone(),
            config.selection.clone(),
        ));

        Self {
            backlog,
            store,
            selector,
            pipeline,
            stats,
            emitter,
            cancel,
            poll_interval: Duration::from_secs(config.pipeline.poll_interval_secs),
        }
    }

    /// The session counters, shared with the bridge.
    pub fn stats(&self) -> &Arc<SessionStatsAggregator> {
        &self.stats
    }

    /// The event emitter feeding the bridge.
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Runs until the mode's stop condition or cancellation.
    pub async fn run(&self, mode: RunMode) -> DroverResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        info!(run_id = %run_id, mode = ?mode, "Starting run");
        self.emitter.log(LogEntry::orchestrator(
            LogStyle::Info,
            format!("run {run_id} started"),
        ));

        let mut items_processed: u64 = 0;
        let mut items_done: u64 = 0;
        let mut items_failed: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                info!(run_id = %run_id, "Run cancelled");
                self.emitter.log(LogEntry::orchestrator(
                    LogStyle::Warning,
                    format!("run {run_id} cancelled"),
                ));
                break;
            }

            match self.backlog.next_item().await? {
                Some(mut item) => {
                    let outcome = self.process_item(&mut item).await;
                    items_processed += 1;
                    if outcome.status == ItemStatus::Done {
                        items_done += 1;
                    } else {
                        items_failed += 1;
                    }
                    if mode == RunMode::SingleShot {
                        break;
                    }
                }
                None => match mode {
                    RunMode::Continuous => {
                        tokio::select! {
                            () = self.cancel.cancelled() => {}
                            () = tokio::time::sleep(self.poll_interval) => {}
                        }
                    }
                    RunMode::SingleShot | RunMode::Drain => break,
                },
            }
        }

        self.emitter.set_progress(ProgressState::idle());

        let report = RunReport {
            run_id,
            items_processed,
            items_done,
            items_failed,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            run_id = %run_id,
            processed = report.items_processed,
            done = report.items_done,
            failed = report.items_failed,
            "Run complete"
        );
        self.emitter.log(LogEntry::orchestrator(
            LogStyle::Info,
            format!(
                "run complete: {items_processed} processed, {items_done} done, {items_failed} failed"
            ),
        ));

        Ok(report)
    }

    /// Drives one item to a terminal state and records the outcome.
    async fn process_item(&self, item: &mut WorkItem) -> ItemOutcome {
        // The model chosen here anchors the whole item; only a fallback
        // substitution inside a stage run can change the attribution.
        let history = self.store.load_all().await;
        let model = self.selector.select(AgentKind::Work, &history);

        info!(item = %item.item_id, title = %item.title, model = %model, "Processing item");
        self.emitter.log(LogEntry::orchestrator(
            LogStyle::Info,
            format!("{}: starting \"{}\" under {model}", item.item_id, item.title),
        ));

        let outcome = self.pipeline.run_item(item, model, &self.cancel).await;

        let record = ModelCompletionRecord::new(
            item.item_id.clone(),
            outcome.model.clone(),
            outcome.duration_seconds,
            outcome.gate,
        )
        .with_retries(outcome.retries);

        self.stats.record_completion(record.clone()).await;
        self.selector.note_outcome(&record);
        if let Err(e) = self.store.record(&record).await {
            warn!(item = %item.item_id, error = %e, "Performance record not persisted");
            self.emitter.log(LogEntry::orchestrator(
                LogStyle::Warning,
                format!("{}: performance record not persisted: {e}", item.item_id),
            ));
        }

        if outcome.status == ItemStatus::Done {
            info!(
                item = %item.item_id,
                model = %outcome.model,
                duration_s = outcome.duration_seconds,
                "Item done"
            );
            self.emitter.log(LogEntry::orchestrator(
                LogStyle::Success,
                format!(
                    "{}: done in {:.1}s under {}",
                    item.item_id, outcome.duration_seconds, outcome.model
                ),
            ));
        } else {
            error!(item = %item.item_id, gate = %outcome.gate, "Item failed");
            self.emitter.log(LogEntry::orchestrator(
                LogStyle::Error,
                format!("{}: failed (gate {})", item.item_id, outcome.gate),
            ));
        }
        self.emitter.set_progress(ProgressState::idle());

        outcome
    }
}

// ─────────────────────────── Tests ───────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backlog::InMemoryBacklog;
    use async_trait::async_trait;
    use drover_agent::SimulatedInvoker;
    use drover_core::DroverError;
    use drover_models::{MemoryPerformanceStore, ModelPerformanceSummary};
    use std::collections::HashMap;

    fn test_config() -> DroverConfig {
        let mut config = DroverConfig::default();
        config.pipeline.poll_interval_secs = 1;
        config
    }

    fn engine(
        backlog: Arc<dyn Backlog>,
        store: Arc<dyn ModelPerformanceStore>,
    ) -> (Orchestrator, CancellationToken) {
        let cancel = CancellationToken::new();
        let invoker = Arc::new(SimulatedInvoker::new().with_step_delay(Duration::ZERO));
        let orchestrator = Orchestrator::new(
            &test_config(),
            backlog,
            invoker,
            store,
            EventEmitter::default(),
            cancel.clone(),
        );
        (orchestrator, cancel)
    }

    /// A store whose disk is permanently gone.
    struct FailingStore;

    #[async_trait]
    impl ModelPerformanceStore for FailingStore {
        async fn record(
            &self,
            _record: &ModelCompletionRecord,
        ) -> DroverResult<ModelPerformanceSummary> {
            Err(DroverError::Store("disk offline".to_string()))
        }

        async fn load(&self, model: &str) -> ModelPerformanceSummary {
            ModelPerformanceSummary::empty(model)
        }

        async fn load_all(&self) -> HashMap<String, ModelPerformanceSummary> {
            HashMap::new()
        }
    }

    #[tokio::test]
    async fn drain_empties_the_backlog() {
        let backlog = Arc::new(InMemoryBacklog::from_titles([
            "add pagination",
            "fix login test",
            "update deps",
        ]));
        let store = Arc::new(MemoryPerformanceStore::new());
        let (orchestrator, _) = engine(backlog.clone(), store.clone());

        let report = orchestrator.run(RunMode::Drain).await.unwrap();

        assert_eq!(report.items_processed, 3);
        assert_eq!(report.items_done, 3);
        assert_eq!(report.items_failed, 0);
        assert!(backlog.is_empty().await);

        // Every terminal item left exactly one record in the store.
        let history = store.load_all().await;
        let attempted: u64 = history.values().map(|s| s.total_items_attempted).sum();
        assert_eq!(attempted, 3);
    }

    #[tokio::test]
    async fn single_shot_processes_one_item() {
        let backlog = Arc::new(InMemoryBacklog::from_titles(["first", "second"]));
        let store = Arc::new(MemoryPerformanceStore::new());
        let (orchestrator, _) = engine(backlog.clone(), store);

        let report = orchestrator.run(RunMode::SingleShot).await.unwrap();

        assert_eq!(report.items_processed, 1);
        assert_eq!(backlog.len().await, 1);
    }

    #[tokio::test]
    async fn store_failure_does_not_fail_the_run() {
        let backlog = Arc::new(InMemoryBacklog::from_titles(["only item"]));
        let (orchestrator, _) = engine(backlog, Arc::new(FailingStore));

        let report = orchestrator.run(RunMode::Drain).await.unwrap();

        assert_eq!(report.items_processed, 1);
        assert_eq!(report.items_done, 1);
        // The session counters keep the completion even when the disk lost it.
        let snap = orchestrator.stats().snapshot().await;
        assert_eq!(snap.items_completed(), 1);
    }

    #[tokio::test]
    async fn continuous_mode_runs_until_cancelled() {
        let backlog = Arc::new(InMemoryBacklog::from_titles(["one item"]));
        let store = Arc::new(MemoryPerformanceStore::new());
        let (orchestrator, cancel) = engine(backlog, store);
        let orchestrator = Arc::new(orchestrator);
        let stats = orchestrator.stats().clone();

        let handle = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run(RunMode::Continuous).await })
        };

        // Wait until the item completes, then stop the poll loop.
        for _ in 0..400 {
            if stats.snapshot().await.items_completed() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.items_processed, 1);
    }
}
