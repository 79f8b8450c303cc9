//! Lifetime performance aggregates, one document per model.

use chrono::{DateTime, Utc};
use drover_core::{GateOutcome, ModelCompletionRecord};
use serde::{Deserialize, Serialize};

/// Rolling aggregate of every completion attributed to one model.
///
/// `total_items_attempted == total_items_succeeded + total_items_failed`
/// holds after every fold; a record counts as succeeded only when its gate
/// verdict is [`GateOutcome::Passed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformanceSummary {
    /// Model name (authoritative; file names are only sanitized derivations).
    pub model: String,
    /// Items that reached a terminal state under this model.
    pub total_items_attempted: u64,
    /// Items whose gate verdict was `passed`.
    pub total_items_succeeded: u64,
    /// Items whose gate verdict was `failed` or `unknown`.
    pub total_items_failed: u64,
    /// Summed item durations, in seconds.
    pub total_duration_seconds: f64,
    /// Summed in-place retries across all items.
    pub total_retries: u64,
    /// `total_duration_seconds / total_items_attempted`, 0.0 when unattempted.
    pub average_duration_seconds: f64,
    /// `total_items_succeeded / total_items_attempted` in [0, 1], 0.0 when
    /// unattempted.
    pub success_rate: f64,
    /// Completion time of the most recent record, if any.
    pub last_used: Option<DateTime<Utc>>,
}

impl ModelPerformanceSummary {
    /// A zero-valued summary for a model with no recorded completions.
    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            total_items_attempted: 0,
            total_items_succeeded: 0,
            total_items_failed: 0,
            total_duration_seconds: 0.0,
            total_retries: 0,
            average_duration_seconds: 0.0,
            success_rate: 0.0,
            last_used: None,
        }
    }

    /// Folds one completion record into the aggregate and recomputes the
    /// derived fields.
    pub fn apply(&mut self, record: &ModelCompletionRecord) {
        self.total_items_attempted += 1;
        match record.gate_passed {
            GateOutcome::Passed => self.total_items_succeeded += 1,
            GateOutcome::Failed | GateOutcome::Unknown => self.total_items_failed += 1,
        }
        self.total_duration_seconds += record.duration_seconds;
        self.total_retries += u64::from(record.retries);
        let attempted = self.total_items_attempted as f64;
        self.average_duration_seconds = self.total_duration_seconds / attempted;
        self.success_rate = self.total_items_succeeded as f64 / attempted;
        self.last_used = Some(record.completed_at);
    }

    /// `1.0 - success_rate`, 0.0 when unattempted.
    pub fn failure_rate(&self) -> f64 {
        if self.total_items_attempted == 0 {
            0.0
        } else {
            self.total_items_failed as f64 / self.total_items_attempted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gate: GateOutcome, duration: f64, retries: u32) -> ModelCompletionRecord {
        ModelCompletionRecord::new("W-1", "m", duration, gate).with_retries(retries)
    }

    #[test]
    fn test_empty_summary_is_zeroed() {
        let summary = ModelPerformanceSummary::empty("m");
        assert_eq!(summary.total_items_attempted, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.average_duration_seconds, 0.0);
        assert!(summary.last_used.is_none());
    }

    #[test]
    fn test_apply_maintains_attempt_invariant() {
        let mut summary = ModelPerformanceSummary::empty("m");
        summary.apply(&record(GateOutcome::Passed, 10.0, 0));
        summary.apply(&record(GateOutcome::Failed, 20.0, 2));
        summary.apply(&record(GateOutcome::Unknown, 6.0, 1));

        assert_eq!(summary.total_items_attempted, 3);
        assert_eq!(
            summary.total_items_attempted,
            summary.total_items_succeeded + summary.total_items_failed
        );
        assert_eq!(summary.total_items_succeeded, 1);
        assert_eq!(summary.total_items_failed, 2);
        assert_eq!(summary.total_retries, 3);
    }

    #[test]
    fn test_derived_fields() {
        let mut summary = ModelPerformanceSummary::empty("m");
        summary.apply(&record(GateOutcome::Passed, 10.0, 0));
        summary.apply(&record(GateOutcome::Failed, 30.0, 0));

        assert!((summary.average_duration_seconds - 20.0).abs() < f64::EPSILON);
        assert!((summary.success_rate - 0.5).abs() < f64::EPSILON);
        assert!((summary.failure_rate() - 0.5).abs() < f64::EPSILON);
        assert!(summary.success_rate >= 0.0 && summary.success_rate <= 1.0);
    }

    #[test]
    fn test_last_used_tracks_latest_record() {
        let mut summary = ModelPerformanceSummary::empty("m");
        let rec = record(GateOutcome::Passed, 1.0, 0);
        summary.apply(&rec);
        assert_eq!(summary.last_used, Some(rec.completed_at));
    }
}
