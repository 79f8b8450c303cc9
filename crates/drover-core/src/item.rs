//! Work items and the fixed stage pipeline they move through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Specialized agent kinds, declared in pipeline order.
///
/// Every item that enters the pipeline visits these stages in sequence;
/// the gate stage may send an item back to [`AgentKind::Work`] for rework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Implements the work item.
    Work,
    /// Quality gate: reviews the produced work and passes or rejects it.
    Gate,
    /// Pays down technical debt introduced by the work stage.
    TechDebt,
    /// Routine repository upkeep.
    Janitor,
    /// Prunes stale or superseded backlog entries.
    BacklogCleanup,
    /// Removes scratch files and temporary artifacts.
    Cleanup,
    /// Exercises the result the way an end user would.
    BetaTester,
    /// Final code review pass.
    CodeReview,
    /// Tears down working trees and other run infrastructure.
    WorktreeCleanup,
}

impl AgentKind {
    /// All stage kinds, in the order the pipeline runs them.
    pub const PIPELINE: [AgentKind; 9] = [
        AgentKind::Work,
        AgentKind::Gate,
        AgentKind::TechDebt,
        AgentKind::Janitor,
        AgentKind::BacklogCleanup,
        AgentKind::Cleanup,
        AgentKind::BetaTester,
        AgentKind::CodeReview,
        AgentKind::WorktreeCleanup,
    ];

    /// The stage that follows this one, or `None` after the last stage.
    pub fn next(self) -> Option<AgentKind> {
        let idx = Self::PIPELINE.iter().position(|k| *k == self)?;
        Self::PIPELINE.get(idx + 1).copied()
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Work => write!(f, "work"),
            AgentKind::Gate => write!(f, "gate"),
            AgentKind::TechDebt => write!(f, "tech_debt"),
            AgentKind::Janitor => write!(f, "janitor"),
            AgentKind::BacklogCleanup => write!(f, "backlog_cleanup"),
            AgentKind::Cleanup => write!(f, "cleanup"),
            AgentKind::BetaTester => write!(f, "beta_tester"),
            AgentKind::CodeReview => write!(f, "code_review"),
            AgentKind::WorktreeCleanup => write!(f, "worktree_cleanup"),
        }
    }
}

/// Lifecycle state of a work item.
///
/// `Done` and `Failed` are terminal; once reached, the item never
/// transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting in the backlog.
    Pending,
    /// Currently being processed by the named stage.
    Active(AgentKind),
    /// Completed the full pipeline.
    Done,
    /// Permanently failed; will not be retried by the orchestrator.
    Failed,
}

impl ItemStatus {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Active(kind) => write!(f, "{kind}"),
            ItemStatus::Done => write!(f, "done"),
            ItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A discrete unit of pending work drawn from the backlog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique, stable identifier (e.g. `"W-42"`).
    pub item_id: String,
    /// Human-readable description of the work.
    pub title: String,
    /// Current lifecycle state.
    pub status: ItemStatus,
    /// UTC timestamp of when the item was created.
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    /// Creates a pending item with the given id and title.
    pub fn new(item_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
            status: ItemStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Moves the item to `next`, refusing to leave a terminal state.
    ///
    /// Returns `true` if the transition was applied.
    pub fn advance(&mut self, next: ItemStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }

    /// The stage currently processing this item, if any.
    pub fn stage(&self) -> Option<AgentKind> {
        match self.status {
            ItemStatus::Active(kind) => Some(kind),
            _ => None,
        }
    }
}
