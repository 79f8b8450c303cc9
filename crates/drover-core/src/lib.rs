//! Core types and error definitions shared across the drover workspace.
//!
//! This crate provides the foundational vocabulary of the orchestrator:
//! work items and their stage pipeline, run metrics, per-model completion
//! records, UI-facing events, and the configuration document.
//!
//! # Main types
//!
//! - [`DroverError`] — Unified error enum for all drover subsystems.
//! - [`DroverResult`] — Convenience alias for `Result<T, DroverError>`.
//! - [`WorkItem`] / [`ItemStatus`] — A backlog item and its lifecycle state.
//! - [`AgentKind`] — The specialized agents, in pipeline order.
//! - [`AgentStats`] — Effort metrics for one logical stage run.
//! - [`ModelCompletionRecord`] — One terminal item attempt under a model.
//! - [`SessionStats`] — Process-lifetime aggregates.
//! - [`LogEntry`] / [`ProgressState`] — Events streamed to the attached UI.
//! - [`DroverConfig`] — The TOML-sourced configuration document.

/// Configuration document and its typed sections.
pub mod config;
/// Workspace-wide error and result types.
pub mod error;
/// Log and progress events for the UI bridge.
pub mod event;
/// Work items and pipeline stage kinds.
pub mod item;
/// Run metrics and per-model completion records.
pub mod stats;

pub use config::{DroverConfig, ModelsConfig, PipelineSettings, SelectionSettings};
pub use error::{DroverError, DroverResult};
pub use event::{LogEntry, LogStyle, LogTarget, ProgressState};
pub use item::{AgentKind, ItemStatus, WorkItem};
pub use stats::{AgentStats, GateOutcome, ModelCompletionRecord, SessionStats};
