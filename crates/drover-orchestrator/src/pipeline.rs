//! The stage machine: one item, nine stages, bounded rework.

use crate::session::SessionStatsAggregator;
use drover_agent::{AgentRunner, InvokeError};
use drover_bridge::EventEmitter;
use drover_core::{
    AgentKind, GateOutcome, ItemStatus, LogEntry, LogStyle, PipelineSettings, ProgressState,
    WorkItem,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bounds for the stage machine.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// How many times the gate may run for one item before a rejection
    /// becomes terminal.
    pub max_gate_cycles: u32,
    /// How many times a recoverable stage failure is re-entered before the
    /// item fails.
    pub max_stage_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_gate_cycles: 3,
            max_stage_retries: 2,
        }
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            max_gate_cycles: settings.max_gate_cycles,
            max_stage_retries: settings.max_stage_retries,
        }
    }
}

/// Terminal result of driving one item through the pipeline.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// Terminal status the item landed in (`Done` or `Failed`).
    pub status: ItemStatus,
    /// The model that performed the work, after any fallback substitution.
    pub model: String,
    /// Wall-clock duration of the whole pipeline run, in seconds.
    pub duration_seconds: f64,
    /// Final gate verdict for the item.
    pub gate: GateOutcome,
    /// Total retries consumed across all stages, re-entries included.
    pub retries: u32,
}

/// Drives one work item through the fixed stage order.
///
/// Each stage is one logical agent run. The gate stage may send the item
/// back to work up to `max_gate_cycles` times; a recoverable stage failure
/// re-enters the same stage up to `max_stage_retries` times. Every stage
/// execution emits one progress update and one log entry, with further
/// entries for in-run recoveries, fallback substitution, and verdicts.
pub struct Pipeline {
    config: PipelineConfig,
    runner: Arc<AgentRunner>,
    stats: Arc<SessionStatsAggregator>,
    emitter: EventEmitter,
}

impl Pipeline {
    /// Creates a pipeline over the given runner.
    pub fn new(
        config: PipelineConfig,
        runner: Arc<AgentRunner>,
        stats: Arc<SessionStatsAggregator>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            config,
            runner,
            stats,
            emitter,
        }
    }

    /// Runs `item` to a terminal state under `model`.
    ///
    /// The returned outcome carries everything the caller needs to build the
    /// item's completion record; the item itself ends in `Done` or `Failed`.
    pub async fn run_item(
        &self,
        item: &mut WorkItem,
        model: String,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        let started = Instant::now();
        let mut model = model;
        let mut total_retries: u32 = 0;
        let mut gate_cycles: u32 = 0;
        let mut stage_reentries: u32 = 0;
        let mut reached_gate = false;
        let mut stage = AgentKind::Work;

        let status = loop {
            if cancel.is_cancelled() {
                info!(item = %item.item_id, stage = %stage, "Cancelled between stages");
                self.emitter.log(LogEntry::orchestrator(
                    LogStyle::Warning,
                    format!("{}: cancelled before {stage}", item.item_id),
                ));
                break ItemStatus::Failed;
            }

            item.advance(ItemStatus::Active(stage));
            if stage == AgentKind::Gate {
                reached_gate = true;
            }

            let step = if stage == AgentKind::Gate {
                format!(
                    "{}: {stage} (cycle {}/{})",
                    item.item_id,
                    gate_cycles + 1,
                    self.config.max_gate_cycles
                )
            } else {
                format!("{}: {stage}", item.item_id)
            };
            self.emitter.set_progress(ProgressState::working(step.clone()));
            self.emitter.log(LogEntry::agent(LogStyle::Info, step));
            self.stats.record_run(stage).await;

            match self.runner.invoke(item, stage, &model, cancel).await {
                Ok(report) => {
                    total_retries += report.stats.retries;
                    stage_reentries = 0;
                    if report.stats.retries > 0 {
                        self.emitter.log(LogEntry::agent(
                            LogStyle::Warning,
                            format!(
                                "{}: {stage} recovered after {} retr{}",
                                item.item_id,
                                report.stats.retries,
                                if report.stats.retries == 1 { "y" } else { "ies" }
                            ),
                        ));
                    }
                    if report.model_used != model {
                        self.emitter.log(LogEntry::agent(
                            LogStyle::Warning,
                            format!("{}: {stage} fell back to {}", item.item_id, report.model_used),
                        ));
                    }
                    model = report.model_used.clone();
                    info!(
                        item = %item.item_id,
                        stage = %stage,
                        model = %report.model_used,
                        wall_ms = report.stats.wall_time_ms,
                        "Stage complete"
                    );

                    if stage == AgentKind::Gate {
                        gate_cycles += 1;
                        // A gate run without a verdict counts as a rejection.
                        let passed = report.gate_passed.unwrap_or(false);
                        if passed {
                            self.emitter.log(LogEntry::agent(
                                LogStyle::Success,
                                format!("{}: gate passed", item.item_id),
                            ));
                        } else if gate_cycles >= self.config.max_gate_cycles {
                            warn!(
                                item = %item.item_id,
                                cycles = gate_cycles,
                                "Gate rejected at cycle bound"
                            );
                            self.emitter.log(LogEntry::agent(
                                LogStyle::Error,
                                format!(
                                    "{}: gate rejected {gate_cycles} times, giving up",
                                    item.item_id
                                ),
                            ));
                            break ItemStatus::Failed;
                        } else {
                            info!(
                                item = %item.item_id,
                                cycle = gate_cycles,
                                "Gate rejected, returning to work"
                            );
                            self.emitter.log(LogEntry::agent(
                                LogStyle::Warning,
                                format!("{}: gate rejected, sending back to work", item.item_id),
                            ));
                            stage = AgentKind::Work;
                            continue;
                        }
                    }

                    match stage.next() {
                        Some(next) => stage = next,
                        None => break ItemStatus::Done,
                    }
                }
                Err(stage_failure) => {
                    total_retries += stage_failure.stats.retries;
                    model = stage_failure.model_used.clone();

                    if matches!(stage_failure.error, InvokeError::Cancelled)
                        || cancel.is_cancelled()
                    {
                        info!(item = %item.item_id, stage = %stage, "Run cancelled mid-stage");
                        self.emitter.log(LogEntry::agent(
                            LogStyle::Warning,
                            format!("{}: {stage} cancelled", item.item_id),
                        ));
                        break ItemStatus::Failed;
                    }

                    let recoverable = stage_failure.error.is_transient()
                        || stage_failure.error.is_start_failure();
                    if recoverable && stage_reentries < self.config.max_stage_retries {
                        stage_reentries += 1;
                        total_retries += 1;
                        warn!(
                            item = %item.item_id,
                            stage = %stage,
                            reentry = stage_reentries,
                            error = %stage_failure.error,
                            "Stage failed, re-entering"
                        );
                        self.emitter.log(LogEntry::agent(
                            LogStyle::Warning,
                            format!(
                                "{}: {stage} failed ({}), re-entering {}/{}",
                                item.item_id,
                                stage_failure.error,
                                stage_reentries,
                                self.config.max_stage_retries
                            ),
                        ));
                        continue;
                    }

                    error!(
                        item = %item.item_id,
                        stage = %stage,
                        error = %stage_failure.error,
                        "Stage failed permanently"
                    );
                    self.emitter.log(LogEntry::agent(
                        LogStyle::Error,
                        format!("{}: {stage} failed: {}", item.item_id, stage_failure.error),
                    ));
                    break ItemStatus::Failed;
                }
            }
        };

        item.advance(status);
        let gate = match status {
            ItemStatus::Done => GateOutcome::Passed,
            _ if reached_gate => GateOutcome::Failed,
            _ => GateOutcome::Unknown,
        };

        ItemOutcome {
            status,
            model,
            duration_seconds: started.elapsed().as_secs_f64(),
            gate,
            retries: total_retries,
        }
    }
}

// ─────────────────────────── Tests ───────────────────────────
