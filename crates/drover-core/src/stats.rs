//! Run metrics, gate outcomes, and per-model completion records.

use crate::item::AgentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Effort metrics for one logical stage run.
///
/// Produced once per run and immutable afterwards. `retries` counts the
/// in-place attempts beyond the first; `tool_calls` counts every attempt,
/// including failed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Wall-clock duration across all attempts, in milliseconds.
    pub wall_time_ms: u64,
    /// Time spent waiting on the model API, in milliseconds.
    pub api_time_ms: u64,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
    /// Lines added to the tree by this run.
    pub lines_added: u64,
    /// Lines removed from the tree by this run.
    pub lines_removed: u64,
    /// Billed premium requests.
    pub premium_requests: u32,
    /// Attempts beyond the first (k attempts yield `retries == k - 1`).
    pub retries: u32,
    /// Tool invocations across all attempts.
    pub tool_calls: u32,
}

/// Verdict of the quality gate for a finished item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// The gate approved the work.
    Passed,
    /// The gate rejected the work, or the item failed after reaching the gate.
    Failed,
    /// The item finished without ever reaching the gate stage (e.g. aborted).
    Unknown,
}

impl std::fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateOutcome::Passed => write!(f, "passed"),
            GateOutcome::Failed => write!(f, "failed"),
            GateOutcome::Unknown => write!(f, "unknown"),
        }
    }
}

/// One terminal attempt of a work item under a specific model.
///
/// Exactly one record exists per item that reached a terminal state; the
/// record is attributed to the model that actually performed the work,
/// which may be the configured fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCompletionRecord {
    /// The item this record belongs to.
    pub item_id: String,
    /// The model that performed the work.
    pub model: String,
    /// Wall-clock pipeline duration for the item, in seconds.
    pub duration_seconds: f64,
    /// Final gate verdict for the item.
    pub gate_passed: GateOutcome,
    /// Total in-place retries consumed across all stages of the item.
    pub retries: u32,
    /// UTC timestamp of when the item reached its terminal state.
    pub completed_at: DateTime<Utc>,
}

impl ModelCompletionRecord {
    /// Creates a record completed now with zero retries.
    pub fn new(
        item_id: impl Into<String>,
        model: impl Into<String>,
        duration_seconds: f64,
        gate_passed: GateOutcome,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            model: model.into(),
            duration_seconds,
            gate_passed,
            retries: 0,
            completed_at: Utc::now(),
        }
    }

    /// Sets the total retries consumed by the item.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Cross-item aggregates for the current process lifetime.
///
/// Never persisted; a restart starts a fresh session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// UTC timestamp of when the session started.
    pub started_at: DateTime<Utc>,
    /// Seconds elapsed since the session started.
    pub elapsed_seconds: f64,
    /// Logical runs per stage kind (re-entries count, in-place retries do not).
    pub runs: BTreeMap<AgentKind, u64>,
    /// Completion records in the order items finished.
    pub completions: Vec<ModelCompletionRecord>,
}

impl SessionStats {
    /// Total logical stage runs across all kinds.
    pub fn total_runs(&self) -> u64 {
        self.runs.values().sum()
    }

    /// Number of items that reached a terminal state this session.
    pub fn items_completed(&self) -> usize {
        self.completions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default_is_zeroed() {
        let stats = AgentStats::default();
        assert_eq!(stats.retries, 0);
        assert_eq!(stats.tool_calls, 0);
        assert_eq!(stats.wall_time_ms, 0);
    }

    #[test]
    fn test_record_builder() {
        let rec = ModelCompletionRecord::new("W-9", "claude-sonnet-4-5", 12.5, GateOutcome::Passed)
            .with_retries(2);
        assert_eq!(rec.retries, 2);
        assert_eq!(rec.gate_passed, GateOutcome::Passed);
        assert!((rec.duration_seconds - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gate_outcome_serialization() {
        let json = serde_json::to_string(&GateOutcome::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
        let parsed: GateOutcome = serde_json::from_str("\"passed\"").unwrap();
        assert_eq!(parsed, GateOutcome::Passed);
    }

    #[test]
    fn test_session_totals() {
        let mut runs = BTreeMap::new();
        runs.insert(AgentKind::Work, 3u64);
        runs.insert(AgentKind::Gate, 3u64);
        let stats = SessionStats {
            started_at: Utc::now(),
            elapsed_seconds: 1.0,
            runs,
            completions: vec![ModelCompletionRecord::new(
                "W-1",
                "m",
                0.5,
                GateOutcome::Passed,
            )],
        };
        assert_eq!(stats.total_runs(), 6);
        assert_eq!(stats.items_completed(), 1);
    }
}
