//! In-process bridge between the orchestrator and a locally attached
//! desktop UI.
//!
//! The pipeline pushes [`drover_core::LogEntry`] and
//! [`drover_core::ProgressState`] values through an [`EventEmitter`];
//! emission is fire-and-forget, so a slow or absent UI can never stall a
//! run. The UI pulls everything else (session statistics, per-model
//! performance, configuration) through [`DesktopBridge`] queries.
//!
//! # Main types
//!
//! - [`EventEmitter`] — Bounded, non-blocking log and progress fan-out.
//! - [`DesktopBridge`] — The query surface the UI holds.
//! - [`StatsSource`] — Where live session statistics come from.
//! - [`ConfigResponse`] — The effective configuration and its provenance.

/// Bridge query surface.
pub mod bridge;
/// Event fan-out channels.
pub mod emitter;

pub use bridge::{ConfigResponse, DesktopBridge, StatsSource};
pub use emitter::EventEmitter;
