//! Model selection: prefer the default, rotate candidates when it degrades.

use crate::summary::ModelPerformanceSummary;
use drover_core::{AgentKind, GateOutcome, ModelCompletionRecord, ModelsConfig, SelectionSettings};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct RecentOutcome {
    ok: bool,
    duration_seconds: f64,
}

/// Chooses the model for an item's run.
///
/// The configured default wins while it stays healthy. Health is judged on
/// a short in-process window of recent outcomes, not on lifetime
/// aggregates, so one bad afternoon does not condemn a model forever and an
/// old reputation does not shield a currently failing one. When the default
/// is unhealthy, selection rotates through `candidate_models`, favoring the
/// candidate with the fewest lifetime attempts so A/B samples stay
/// comparable. The fallback model is never chosen as a primary.
pub struct ModelSelector {
    models: ModelsConfig,
    settings: SelectionSettings,
    recent: Mutex<HashMap<String, VecDeque<RecentOutcome>>>,
}

impl ModelSelector {
    /// Creates a selector over the configured model pool.
    pub fn new(models: ModelsConfig, settings: SelectionSettings) -> Self {
        Self {
            models,
            settings,
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Picks the model for the given stage kind.
    ///
    /// `history` is the lifetime summary map as served by the performance
    /// store; models absent from it count as never attempted.
    pub fn select(
        &self,
        kind: AgentKind,
        history: &HashMap<String, ModelPerformanceSummary>,
    ) -> String {
        let candidates: Vec<&String> = self
            .models
            .candidate_models
            .iter()
            .filter(|name| Some(name.as_str()) != self.models.fallback.as_deref())
            .collect();

        if candidates.is_empty() || !self.is_unhealthy(&self.models.default) {
            debug!(kind = %kind, model = %self.models.default, "Selected default model");
            return self.models.default.clone();
        }

        let mut best: Option<(usize, ModelPerformanceSummary)> = None;
        for (idx, name) in candidates.iter().enumerate() {
            let summary = history
                .get(name.as_str())
                .cloned()
                .unwrap_or_else(|| ModelPerformanceSummary::empty(name.as_str()));
            let replace = match &best {
                None => true,
                Some((_, current)) => candidate_order(&summary, current) == Ordering::Less,
            };
            if replace {
                best = Some((idx, summary));
            }
        }

        match best {
            Some((idx, summary)) => {
                info!(
                    kind = %kind,
                    model = %summary.model,
                    attempts = summary.total_items_attempted,
                    "Default model unhealthy; rotating to candidate"
                );
                candidates[idx].clone()
            }
            None => self.models.default.clone(),
        }
    }

    /// Feeds one finished item into the recent-health window of the model
    /// that ran it.
    pub fn note_outcome(&self, record: &ModelCompletionRecord) {
        let outcome = RecentOutcome {
            ok: record.gate_passed == GateOutcome::Passed,
            duration_seconds: record.duration_seconds,
        };
        let mut recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = recent.entry(record.model.clone()).or_default();
        window.push_back(outcome);
        while window.len() > self.settings.recent_window {
            window.pop_front();
        }
    }

    fn is_unhealthy(&self, model: &str) -> bool {
        let recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(window) = recent.get(model) else {
            return false;
        };
        if window.len() < self.settings.min_recent_samples {
            return false;
        }
        let total = window.len() as f64;
        let failures = window.iter().filter(|o| !o.ok).count() as f64;
        let avg_duration: f64 = window.iter().map(|o| o.duration_seconds).sum::<f64>() / total;

        failures / total > self.settings.failure_rate_threshold
            || avg_duration > self.settings.latency_threshold_secs
    }
}

/// Rotation order: fewest attempts, then higher success rate, then least
/// recently used. `Less` means "select first".
fn candidate_order(a: &ModelPerformanceSummary, b: &ModelPerformanceSummary) -> Ordering {
    a.total_items_attempted
        .cmp(&b.total_items_attempted)
        .then_with(|| {
            b.success_rate
                .partial_cmp(&a.success_rate)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.last_used.cmp(&b.last_used))
}
