//! Events streamed to the attached UI: log lines and progress updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Emitted by the orchestration loop itself.
    Orchestrator,
    /// Emitted on behalf of a stage agent.
    Agent,
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogTarget::Orchestrator => write!(f, "orchestrator"),
            LogTarget::Agent => write!(f, "agent"),
        }
    }
}

/// Rendering hint for the UI log pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStyle {
    /// Routine progress.
    Info,
    /// A step completed successfully.
    Success,
    /// Degraded but recoverable (retry, fallback, store flush failure).
    Warning,
    /// Terminal failure.
    Error,
    /// Low-importance detail.
    Muted,
}

/// One line in the UI activity feed.
///
/// Entries exist only for the lifetime of the stream; there is no replayable
/// history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Display text.
    pub message: String,
    /// Origin of the line.
    pub target: LogTarget,
    /// Rendering hint.
    pub style: LogStyle,
    /// UTC timestamp of emission.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Creates an entry timestamped now.
    pub fn new(target: LogTarget, style: LogStyle, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            target,
            style,
            timestamp: Utc::now(),
        }
    }

    /// Creates an orchestrator-originated entry.
    pub fn orchestrator(style: LogStyle, message: impl Into<String>) -> Self {
        Self::new(LogTarget::Orchestrator, style, message)
    }

    /// Creates an agent-originated entry.
    pub fn agent(style: LogStyle, message: impl Into<String>) -> Self {
        Self::new(LogTarget::Agent, style, message)
    }
}

/// Coarse activity indicator for the UI, overwritten on every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Whether the orchestrator is actively processing an item.
    pub active: bool,
    /// Short human-readable description of the current step.
    pub status: String,
}

impl ProgressState {
    /// The quiescent state shown when no item is in flight.
    pub fn idle() -> Self {
        Self {
            active: false,
            status: "idle".to_string(),
        }
    }

    /// An active state with the given step description.
    pub fn working(status: impl Into<String>) -> Self {
        Self {
            active: true,
            status: status.into(),
        }
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::idle()
    }
}
