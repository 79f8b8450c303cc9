//! The drover engine: pulls work items from a backlog, anchors each to a
//! model, and drives it through the fixed agent pipeline to a terminal
//! state while streaming progress to the bridge.
//!
//! The pieces compose bottom-up: a [`Backlog`] supplies items, the
//! [`Pipeline`] runs the stage machine for one item, the
//! [`SessionStatsAggregator`] counts what happened, and the
//! [`Orchestrator`] ties them together under a [`RunMode`].

/// Work item sources.
pub mod backlog;
/// The backlog-draining run loop.
pub mod engine;
/// The per-item stage machine.
pub mod pipeline;
/// Session-lifetime counters.
pub mod session;

pub use backlog::{Backlog, InMemoryBacklog};
pub use engine::{Orchestrator, RunMode, RunReport};
pub use pipeline::{ItemOutcome, Pipeline, PipelineConfig};
pub use session::SessionStatsAggregator;
