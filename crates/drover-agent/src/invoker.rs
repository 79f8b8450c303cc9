//! The invocation seam: one bounded run of an agent against a work item.

use async_trait::async_trait;
use drover_core::{AgentKind, AgentStats, WorkItem};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Failure classes for a single invocation attempt.
///
/// The runner's recovery depends on the class: [`InvokeError::Timeout`] and
/// [`InvokeError::Tool`] are transient and retried in place,
/// [`InvokeError::ModelStart`] triggers fallback substitution, and the rest
/// fail the attempt immediately.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The attempt exceeded its time budget.
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    /// A tool call inside the attempt failed.
    #[error("tool call failed: {0}")]
    Tool(String),

    /// The model could not be started for this attempt.
    #[error("model failed to start: {0}")]
    ModelStart(String),

    /// The invocation was rejected before running.
    #[error("invalid invocation: {0}")]
    Invalid(String),

    /// The orchestrator cancelled the run.
    #[error("invocation cancelled")]
    Cancelled,
}

impl InvokeError {
    /// Whether the error is worth retrying in place.
    pub fn is_transient(&self) -> bool {
        matches!(self, InvokeError::Timeout(_) | InvokeError::Tool(_))
    }

    /// Whether the model itself failed to start, making the configured
    /// fallback applicable.
    pub fn is_start_failure(&self) -> bool {
        matches!(self, InvokeError::ModelStart(_))
    }
}

/// Result of one successful invocation attempt.
#[derive(Debug, Clone)]
pub struct InvokeOutput {
    /// Effort metrics for this attempt.
    pub stats: AgentStats,
    /// Gate verdict; only the gate stage reports one.
    pub gate_passed: Option<bool>,
}

/// One bounded invocation of a specialized agent.
///
/// Implementations wrap whatever transport actually runs the model; the
/// orchestrator only sequences calls, classifies failures, and accounts for
/// the results.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Runs `kind` against `item` using `model`, honoring `cancel`
    /// cooperatively.
    async fn invoke(
        &self,
        item: &WorkItem,
        kind: AgentKind,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<InvokeOutput, InvokeError>;
}

/// Deterministic invoker for dry runs and UI development.
///
/// Produces plausible stats derived from the item and stage so repeated
/// runs are stable; the gate always passes. No model is contacted.
pub struct SimulatedInvoker {
    step_delay: Duration,
}

impl SimulatedInvoker {
    /// Creates a simulator with a short per-stage delay so progress is
    /// visible in an attached UI.
    pub fn new() -> Self {
        Self {
            step_delay: Duration::from_millis(150),
        }
    }

    /// Overrides the per-stage delay.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

impl Default for SimulatedInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentInvoker for SimulatedInvoker {
    async fn invoke(
        &self,
        item: &WorkItem,
        kind: AgentKind,
        _model: &str,
        cancel: &CancellationToken,
    ) -> Result<InvokeOutput, InvokeError> {
        tokio::select! {
            () = cancel.cancelled() => return Err(InvokeError::Cancelled),
            () = tokio::time::sleep(self.step_delay) => {}
        }

        let mut hasher = DefaultHasher::new();
        item.item_id.hash(&mut hasher);
        kind.hash(&mut hasher);
        let seed = hasher.finish();

        let stats = AgentStats {
            wall_time_ms: self.step_delay.as_millis() as u64,
            api_time_ms: self.step_delay.as_millis() as u64 / 2,
            input_tokens: 800 + seed % 1200,
            output_tokens: 200 + seed % 600,
            lines_added: seed % 120,
            lines_removed: seed % 40,
            premium_requests: (seed % 2) as u32,
            retries: 0,
            tool_calls: 1 + (seed % 5) as u32,
        };

        Ok(InvokeOutput {
            stats,
            gate_passed: (kind == AgentKind::Gate).then_some(true),
        })
    }
}
