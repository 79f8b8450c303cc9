//! The synchronous in-process query surface consumed by the desktop UI.

use crate::emitter::EventEmitter;
use async_trait::async_trait;
use drover_core::{DroverConfig, LogEntry, ProgressState, SessionStats};
use drover_models::{ModelPerformanceStore, ModelPerformanceSummary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::BroadcastStream;

/// Live session statistics, served by whoever aggregates them.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// A point-in-time snapshot of the running session.
    async fn snapshot(&self) -> SessionStats;
}

/// The effective configuration as exposed to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    /// Path the configuration was loaded from (or would be).
    pub path: PathBuf,
    /// The configuration with defaults applied.
    pub config: DroverConfig,
    /// Whether the file existed; `false` means built-in defaults are active.
    pub exists: bool,
}

/// In-process bridge between the orchestrator and a locally attached UI.
///
/// There is no network listener and no protocol: the UI holds this struct
/// and calls into it. Streams never replay history; queries are snapshots
/// at call time.
pub struct DesktopBridge {
    emitter: EventEmitter,
    stats: Arc<dyn StatsSource>,
    performance: Arc<dyn ModelPerformanceStore>,
    config: ConfigResponse,
}

impl DesktopBridge {
    /// Wires the bridge to the pipeline's emitter and data sources.
    pub fn new(
        emitter: EventEmitter,
        stats: Arc<dyn StatsSource>,
        performance: Arc<dyn ModelPerformanceStore>,
        config: ConfigResponse,
    ) -> Self {
        Self {
            emitter,
            stats,
            performance,
            config,
        }
    }

    /// Live log stream, starting at the subscription point.
    ///
    /// The stream stays open for the whole session; a consumer that falls
    /// behind receives a lag marker and resumes at the newest entries.
    pub fn subscribe_logs(&self) -> BroadcastStream<LogEntry> {
        BroadcastStream::new(self.emitter.subscribe_logs())
    }

    /// Watch handle over the progress indicator.
    pub fn watch_progress(&self) -> watch::Receiver<ProgressState> {
        self.emitter.watch_progress()
    }

    /// The latest progress state.
    pub fn progress(&self) -> ProgressState {
        self.emitter.progress()
    }

    /// Snapshot of the current session's statistics.
    pub async fn session_stats(&self) -> SessionStats {
        self.stats.snapshot().await
    }

    /// Lifetime performance summary for one model (zero-valued if unseen).
    pub async fn model_performance(&self, model: &str) -> ModelPerformanceSummary {
        self.performance.load(model).await
    }

    /// Lifetime performance summaries for every known model.
    pub async fn all_model_performance(&self) -> HashMap<String, ModelPerformanceSummary> {
        self.performance.load_all().await
    }

    /// The active configuration and where it came from.
    pub fn config(&self) -> &ConfigResponse {
        &self.config
    }
}
