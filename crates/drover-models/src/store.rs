//! Durable per-model performance storage.

use crate::summary::ModelPerformanceSummary;
use async_trait::async_trait;
use drover_core::{DroverError, DroverResult, ModelCompletionRecord};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Storage for per-model completion history.
///
/// Implementations serialize all access internally; callers share them
/// behind an `Arc`.
#[async_trait]
pub trait ModelPerformanceStore: Send + Sync {
    /// Folds one completion record into the model's summary.
    ///
    /// The in-memory update always takes effect; an `Err` means only that
    /// durable persistence failed and will be retried on the next record.
    async fn record(
        &self,
        record: &ModelCompletionRecord,
    ) -> DroverResult<ModelPerformanceSummary>;

    /// The summary for one model, zero-valued if the model was never seen.
    async fn load(&self, model: &str) -> ModelPerformanceSummary;

    /// All known summaries keyed by model name.
    async fn load_all(&self) -> HashMap<String, ModelPerformanceSummary>;
}

struct StoreState {
    cache: HashMap<String, ModelPerformanceSummary>,
    /// Models whose latest summary has not been flushed to disk yet.
    dirty: HashSet<String>,
}

/// File-backed store: one JSON document per model under a single directory.
///
/// Every flush rewrites the whole summary through a temp-file rename, so a
/// crash mid-write leaves the previous document intact. The in-memory cache
/// is the session's source of truth; flush failures are non-fatal and heal
/// on the next successful record.
pub struct FileModelPerformanceStore {
    dir: PathBuf,
    state: RwLock<StoreState>,
}

impl FileModelPerformanceStore {
    /// Opens the store, folding any summaries already on disk into the cache.
    pub async fn open(dir: impl Into<PathBuf>) -> DroverResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut cache = HashMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<ModelPerformanceSummary>(&data) {
                Ok(summary) => {
                    cache.insert(summary.model.clone(), summary);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable performance summary");
                }
            }
        }
        debug!(models = cache.len(), dir = %dir.display(), "Performance store opened");

        Ok(Self {
            dir,
            state: RwLock::new(StoreState {
                cache,
                dirty: HashSet::new(),
            }),
        })
    }

    fn summary_path(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_model_name(model)))
    }

    /// Atomic whole-document overwrite: write a sibling temp file, then
    /// rename over the target.
    async fn flush_one(&self, summary: &ModelPerformanceSummary) -> DroverResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.summary_path(&summary.model);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl ModelPerformanceStore for FileModelPerformanceStore {
    async fn record(
        &self,
        record: &ModelCompletionRecord,
    ) -> DroverResult<ModelPerformanceSummary> {
        let (updated, to_flush) = {
            let mut state = self.state.write().await;
            let summary = state
                .cache
                .entry(record.model.clone())
                .or_insert_with(|| ModelPerformanceSummary::empty(&record.model));
            summary.apply(record);
            let updated = summary.clone();
            state.dirty.insert(record.model.clone());

            // Flush everything pending, not just this model, so one
            // successful record heals earlier failures.
            let to_flush: Vec<ModelPerformanceSummary> = state
                .dirty
                .iter()
                .filter_map(|name| state.cache.get(name).cloned())
                .collect();
            (updated, to_flush)
        };

        let mut flush_err = None;
        for summary in &to_flush {
            match self.flush_one(summary).await {
                Ok(()) => {
                    let mut state = self.state.write().await;
                    state.dirty.remove(&summary.model);
                }
                Err(e) => {
                    warn!(model = %summary.model, error = %e, "Failed to persist performance summary; will retry");
                    flush_err = Some(e);
                }
            }
        }

        match flush_err {
            None => Ok(updated),
            Some(e) => Err(DroverError::Store(format!(
                "performance summary for '{}' updated in memory but not persisted: {e}",
                record.model
            ))),
        }
    }

    async fn load(&self, model: &str) -> ModelPerformanceSummary {
        let state = self.state.read().await;
        state
            .cache
            .get(model)
            .cloned()
            .unwrap_or_else(|| ModelPerformanceSummary::empty(model))
    }

    async fn load_all(&self) -> HashMap<String, ModelPerformanceSummary> {
        self.state.read().await.cache.clone()
    }
}

/// In-memory store for tests and headless runs that need no durability.
#[derive(Default)]
pub struct MemoryPerformanceStore {
    cache: RwLock<HashMap<String, ModelPerformanceSummary>>,
}

impl MemoryPerformanceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelPerformanceStore for MemoryPerformanceStore {
    async fn record(
        &self,
        record: &ModelCompletionRecord,
    ) -> DroverResult<ModelPerformanceSummary> {
        let mut cache = self.cache.write().await;
        let summary = cache
            .entry(record.model.clone())
            .or_insert_with(|| ModelPerformanceSummary::empty(&record.model));
        summary.apply(record);
        Ok(summary.clone())
    }

    async fn load(&self, model: &str) -> ModelPerformanceSummary {
        self.cache
            .read()
            .await
            .get(model)
            .cloned()
            .unwrap_or_else(|| ModelPerformanceSummary::empty(model))
    }

    async fn load_all(&self) -> HashMap<String, ModelPerformanceSummary> {
        self.cache.read().await.clone()
    }
}

fn sanitize_model_name(model: &str) -> String {
    model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
