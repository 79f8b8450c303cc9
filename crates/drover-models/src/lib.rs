//! Per-model performance tracking and model selection.
//!
//! Every work item that reaches a terminal state contributes one completion
//! record; this crate folds those records into durable per-model summaries
//! and uses them, together with a short recent-health window, to pick the
//! model for each run.
//!
//! # Main types
//!
//! - [`ModelPerformanceSummary`] — Lifetime aggregates for one model.
//! - [`ModelPerformanceStore`] — Storage trait for summaries.
//! - [`FileModelPerformanceStore`] — Durable JSON-per-model implementation.
//! - [`MemoryPerformanceStore`] — Volatile implementation for tests.
//! - [`ModelSelector`] — Default-first selection with candidate rotation.

/// Model selection policy.
pub mod selector;
/// Performance store trait and implementations.
pub mod store;
/// Per-model aggregate summaries.
pub mod summary;

pub use selector::ModelSelector;
pub use store::{FileModelPerformanceStore, MemoryPerformanceStore, ModelPerformanceStore};
pub use summary::ModelPerformanceSummary;
