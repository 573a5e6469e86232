//! Tracking of backend tool invocations during a turn.
//!
//! The tracker applies `tool.*` lifecycle events as they arrive, keyed by
//! the backend-assigned id, in arrival order for display. Status moves
//! forward only; terminal states absorb every later event, and such
//! regressions are logged as protocol violations rather than applied.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Lifecycle status of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl ToolStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            ToolStatus::Pending => 0,
            ToolStatus::Running => 1,
            ToolStatus::Completed | ToolStatus::Error => 2,
        }
    }
}

/// One tool invocation reported by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct ToolExecution {
    pub id: String,
    pub name: String,
    pub status: ToolStatus,
    pub args: Option<serde_json::Value>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Per-status counts for UI summaries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub errored: usize,
}

/// Insertion-ordered collection of tool executions for the current turn.
#[derive(Debug, Default)]
pub struct ToolExecutionTracker {
    executions: Vec<ToolExecution>,
    index: HashMap<String, usize>,
}

impl ToolExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `tool.started` event. Returns `false` (and logs) if the
    /// id was already announced.
    pub fn start(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        args: Option<serde_json::Value>,
    ) -> bool {
        let id = id.into();
        if self.index.contains_key(&id) {
            warn!("tool.started for already-known id {id} ignored");
            return false;
        }
        self.index.insert(id.clone(), self.executions.len());
        self.executions.push(ToolExecution {
            id,
            name: name.into(),
            status: ToolStatus::Pending,
            args,
            result: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        });
        true
    }

    /// Record a `tool.progress` event: pending → running.
    pub fn progress(&mut self, id: &str) -> bool {
        self.advance(id, ToolStatus::Running, None, None)
    }

    /// Record a `tool.completed` event with its optional result.
    pub fn complete(&mut self, id: &str, result: Option<String>) -> bool {
        self.advance(id, ToolStatus::Completed, result, None)
    }

    /// Record a `tool.error` event with its error text.
    pub fn fail(&mut self, id: &str, error: impl Into<String>) -> bool {
        self.advance(id, ToolStatus::Error, None, Some(error.into()))
    }

    fn advance(
        &mut self,
        id: &str,
        to: ToolStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> bool {
        let Some(&slot) = self.index.get(id) else {
            warn!("tool event for unknown id {id} ignored");
            return false;
        };
        let execution = &mut self.executions[slot];

        // Repeated progress heartbeats are a no-op, not a violation
        if to == execution.status && !to.is_terminal() {
            return true;
        }

        if execution.status.is_terminal() || to.rank() <= execution.status.rank() {
            warn!(
                "tool {id} status regression {:?} -> {:?} ignored",
                execution.status, to
            );
            return false;
        }

        execution.status = to;
        if to.is_terminal() {
            execution.finished_at = Some(Utc::now());
            execution.result = result;
            execution.error = error;
        }
        true
    }

    /// All executions in arrival order of their `tool.started` events.
    pub fn executions(&self) -> &[ToolExecution] {
        &self.executions
    }

    pub fn get(&self, id: &str) -> Option<&ToolExecution> {
        self.index.get(id).map(|&slot| &self.executions[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Counts by status.
    pub fn summary(&self) -> ToolSummary {
        let mut summary = ToolSummary::default();
        for execution in &self.executions {
            match execution.status {
                ToolStatus::Pending => summary.pending += 1,
                ToolStatus::Running => summary.running += 1,
                ToolStatus::Completed => summary.completed += 1,
                ToolStatus::Error => summary.errored += 1,
            }
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }

    /// Drop all entries; called at the start of a new turn.
    pub fn clear(&mut self) {
        self.executions.clear();
        self.index.clear();
    }
}
