//! Process-lifetime run counters, served to the UI as session statistics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drover_bridge::StatsSource;
use drover_core::{AgentKind, ModelCompletionRecord, SessionStats};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::RwLock;

struct SessionState {
    started_at: DateTime<Utc>,
    runs: BTreeMap<AgentKind, u64>,
    completions: Vec<ModelCompletionRecord>,
}

/// Accumulates per-session counters: agent runs by kind and completion
/// records for every item that reached a terminal state.
///
/// Counters reset when the aggregator is dropped; nothing here is
/// persisted. Durable model history lives in the performance store.
pub struct SessionStatsAggregator {
    started: Instant,
    state: RwLock<SessionState>,
}

impl SessionStatsAggregator {
    /// Starts a fresh session clocked from now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            state: RwLock::new(SessionState {
                started_at: Utc::now(),
                runs: BTreeMap::new(),
                completions: Vec::new(),
            }),
        }
    }

    /// Record one agent run. Called once per runner invocation, so a
    /// stage that is re-entered counts again while in-run retries do not.
    pub async fn record_run(&self, kind: AgentKind) {
        let mut state = self.state.write().await;
        *state.runs.entry(kind).or_insert(0) += 1;
    }

    /// Record the terminal outcome of an item.
    pub async fn record_completion(&self, record: ModelCompletionRecord) {
        let mut state = self.state.write().await;
        state.completions.push(record);
    }

    /// Point-in-time copy of the session counters.
    pub async fn snapshot(&self) -> SessionStats {
        let state = self.state.read().await;
        SessionStats {
            started_at: state.started_at,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            runs: state.runs.clone(),
            completions: state.completions.clone(),
        }
    }
}

impl Default for SessionStatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatsSource for SessionStatsAggregator {
    async fn snapshot(&self) -> SessionStats {
        SessionStatsAggregator::snapshot(self).await
    }
}

// ─────────────────────────── Tests ───────────────────────────
