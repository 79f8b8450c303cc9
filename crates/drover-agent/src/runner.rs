//! Bounded retry and fallback substitution around a single stage run.

use crate::invoker::{AgentInvoker, InvokeError};
use drover_core::{AgentKind, AgentStats, PipelineSettings, WorkItem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
>;

/// Configures in-place retry behaviour for transient invocation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries per stage run before escalating.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

impl From<&PipelineSettings> for RetryPolicy {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            max_retries: settings.invoke_max_retries,
            backoff_base_ms: settings.backoff_base_ms,
            backoff_max_ms: settings.backoff_max_ms,
        }
    }
}

/// Computes the backoff delay for a given attempt using exponential backoff
/// capped at `backoff_max_ms`.
fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// A stage run that completed.
#[derive(Debug, Clone)]
pub struct AgentReport {
    /// The model that actually performed the run (the fallback when it was
    /// substituted).
    pub model_used: String,
    /// Effort metrics aggregated across all attempts of this run.
    pub stats: AgentStats,
    /// Gate verdict; only the gate stage reports one.
    pub gate_passed: Option<bool>,
}

/// A stage run that exhausted its attempts.
///
/// Carries the stats of the failed run so the item's terminal record still
/// accounts for the retries and tool calls it consumed.
#[derive(Debug)]
pub struct StageFailure {
    /// The error of the final attempt.
    pub error: InvokeError,
    /// The model in use when the run gave up.
    pub model_used: String,
    /// Effort metrics across all attempts of this run.
    pub stats: AgentStats,
}

/// Drives one logical stage run: invoke, classify, retry, substitute.
///
/// Transient failures are retried in place with exponential backoff. A
/// model start failure substitutes the configured fallback within the same
/// run, counted as one retry; a second start failure escalates. Other
/// failures escalate immediately without touching the retry budget.
pub struct AgentRunner {
    invoker: Arc<dyn AgentInvoker>,
    policy: RetryPolicy,
    fallback: Option<String>,
    /// Injectable sleep function for testing (allows skipping real delays).
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl AgentRunner {
    /// Creates a runner over the given invoker.
    pub fn new(invoker: Arc<dyn AgentInvoker>, policy: RetryPolicy, fallback: Option<String>) -> Self {
        Self {
            invoker,
            policy,
            fallback,
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    /// Perform a sleep for the given duration in milliseconds.
    async fn do_sleep(&self, ms: u64) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(ms).await;
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }

    /// Runs `kind` against `item`, starting from `model`.
    ///
    /// Returns the report of the attempt that succeeded, or the failure of
    /// the attempt the run gave up on. In both cases `stats.retries` counts
    /// the attempts beyond the first and `stats.tool_calls` covers every
    /// attempt, failed ones included.
    pub async fn invoke(
        &self,
        item: &WorkItem,
        kind: AgentKind,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentReport, StageFailure> {
        let started = Instant::now();
        let mut current_model = model.to_string();
        let mut retries: u32 = 0;
        let mut failed_attempts: u32 = 0;
        let mut fallback_taken = false;

        loop {
            match self.invoker.invoke(item, kind, &current_model, cancel).await {
                Ok(output) => {
                    let mut stats = output.stats;
                    stats.retries = retries;
                    stats.tool_calls += failed_attempts;
                    stats.wall_time_ms = started.elapsed().as_millis() as u64;
                    return Ok(AgentReport {
                        model_used: current_model,
                        stats,
                        gate_passed: output.gate_passed,
                    });
                }
                Err(e) if matches!(e, InvokeError::Cancelled) || cancel.is_cancelled() => {
                    return Err(failure(e, current_model, retries, failed_attempts, started));
                }
                Err(e) if e.is_start_failure() => {
                    failed_attempts += 1;
                    match &self.fallback {
                        Some(fb) if !fallback_taken && *fb != current_model => {
                            warn!(
                                item = %item.item_id,
                                stage = %kind,
                                model = %current_model,
                                fallback = %fb,
                                error = %e,
                                "Model failed to start; substituting fallback"
                            );
                            retries += 1;
                            current_model = fb.clone();
                            fallback_taken = true;
                        }
                        _ => {
                            warn!(
                                item = %item.item_id,
                                stage = %kind,
                                model = %current_model,
                                error = %e,
                                "Model failed to start and no fallback applies"
                            );
                            return Err(failure(e, current_model, retries, failed_attempts, started));
                        }
                    }
                }
                Err(e) if e.is_transient() => {
                    failed_attempts += 1;
                    if retries < self.policy.max_retries {
                        let delay = compute_backoff(&self.policy, retries);
                        info!(
                            item = %item.item_id,
                            stage = %kind,
                            attempt = retries,
                            delay_ms = delay,
                            error = %e,
                            "Transient agent failure, backing off"
                        );
                        retries += 1;
                        tokio::select! {
                            () = cancel.cancelled() => {
                                return Err(failure(
                                    InvokeError::Cancelled,
                                    current_model,
                                    retries,
                                    failed_attempts,
                                    started,
                                ));
                            }
                            () = self.do_sleep(delay) => {}
                        }
                    } else {
                        warn!(
                            item = %item.item_id,
                            stage = %kind,
                            retries,
                            error = %e,
                            "Retry budget exhausted"
                        );
                        return Err(failure(e, current_model, retries, failed_attempts, started));
                    }
                }
                Err(e) => {
                    warn!(
                        item = %item.item_id,
                        stage = %kind,
                        error = %e,
                        "Non-retryable agent failure"
                    );
                    failed_attempts += 1;
                    return Err(failure(e, current_model, retries, failed_attempts, started));
                }
            }
        }
    }
}

fn failure(
    error: InvokeError,
    model_used: String,
    retries: u32,
    failed_attempts: u32,
    started: Instant,
) -> StageFailure {
    StageFailure {
        error,
        model_used,
        stats: AgentStats {
            wall_time_ms: started.elapsed().as_millis() as u64,
            retries,
            tool_calls: failed_attempts,
            ..AgentStats::default()
        },
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
