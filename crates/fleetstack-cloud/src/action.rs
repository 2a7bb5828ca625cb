//! Action log for an apply run

use chrono::{DateTime, Utc};
use fleetstack_core::{Layer, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of action performed on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Build and push an image
    Build,
    /// Create a cloud resource
    Create,
    /// Resource already exists
    Exists,
    /// Apply a cluster application
    Apply,
    /// Delete a resource or application
    Delete,
    /// Left in place (image not rebuilt, skip-delete)
    Retain,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionType::Build => "build",
            ActionType::Create => "create",
            ActionType::Exists => "exists",
            ActionType::Apply => "apply",
            ActionType::Delete => "delete",
            ActionType::Retain => "retain",
        };
        f.write_str(s)
    }
}

/// Result of a single action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub node: NodeId,
    pub layer: Layer,
    pub action_type: ActionType,
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

/// Result of an `up` or `down` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub started_at: DateTime<Utc>,
    pub succeeded: Vec<ActionResult>,
    pub failed: Vec<ActionResult>,
    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(
        &mut self,
        node: &NodeId,
        layer: Layer,
        action_type: ActionType,
        message: impl Into<String>,
    ) {
        self.succeeded.push(ActionResult {
            node: node.clone(),
            layer,
            action_type,
            success: true,
            message: message.into(),
            error: None,
        });
    }

    pub fn add_failure(
        &mut self,
        node: &NodeId,
        layer: Layer,
        action_type: ActionType,
        error: impl fmt::Display,
    ) {
        self.failed.push(ActionResult {
            node: node.clone(),
            layer,
            action_type,
            success: false,
            message: String::new(),
            error: Some(error.to_string()),
        });
    }

    /// Actions of one type, in execution order
    pub fn actions(&self, action_type: ActionType) -> impl Iterator<Item = &ActionResult> {
        self.succeeded
            .iter()
            .filter(move |a| a.action_type == action_type)
    }

    pub fn summary(&self) -> ApplySummary {
        let count = |t| self.actions(t).count();
        ApplySummary {
            built: count(ActionType::Build),
            created: count(ActionType::Create) + count(ActionType::Exists),
            applied: count(ActionType::Apply),
            deleted: count(ActionType::Delete),
            retained: count(ActionType::Retain),
            failed: self.failed.len(),
        }
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of an apply run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub built: usize,
    pub created: usize,
    pub applied: usize,
    pub deleted: usize,
    pub retained: usize,
    pub failed: usize,
}

impl fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} built, {} provisioned, {} applied, {} deleted, {} retained, {} failed",
            self.built, self.created, self.applied, self.deleted, self.retained, self.failed
        )
    }
}
