//! Collaborative task-plan (project) values.

use crate::ids::{AgentId, ProjectId, RoomId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Unassigned,
    Assigned,
    InProgress,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    /// Lower value = higher priority; dispatch order is (priority asc,
    /// creation-order asc).
    pub priority: i32,
    pub status: TaskStatus,
    pub assignee_id: Option<AgentId>,
    pub artifacts: Vec<String>,
    pub created_at_ms: i64,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub error: Option<String>,
    /// Monotonic creation sequence, the tie-breaker for dispatch ordering.
    pub sequence: u64,
}

impl Task {
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        created_at_ms: i64,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            priority,
            status: TaskStatus::Unassigned,
            assignee_id: None,
            artifacts: Vec::new(),
            created_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
            error: None,
            sequence,
        }
    }

    /// Invariant (d): a task marked done has a completion timestamp and a
    /// (possibly empty) artifact list.
    pub fn mark_done(&mut self, completed_at_ms: i64, artifacts: Vec<String>) {
        self.status = TaskStatus::Done;
        self.completed_at_ms = Some(completed_at_ms);
        self.artifacts = artifacts;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    Idle,
    Planning,
    Building,
    Reviewing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub id: ProjectId,
    pub name: String,
    pub goal: String,
    pub room_id: RoomId,
    pub phase: ProjectPhase,
    pub tasks: Vec<Task>,
    pub active_builders: BTreeSet<AgentId>,
    pub completed_builders: BTreeSet<AgentId>,
    pub turn_count: u32,
    pub max_turns: u32,
    pub next_task_sequence: u64,
    pub budget_exhausted: bool,
}

impl ProjectState {
    pub fn new(
        id: ProjectId,
        name: impl Into<String>,
        goal: impl Into<String>,
        room_id: RoomId,
        max_turns: u32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            goal: goal.into(),
            room_id,
            phase: ProjectPhase::Idle,
            tasks: Vec::new(),
            active_builders: BTreeSet::new(),
            completed_builders: BTreeSet::new(),
            turn_count: 0,
            max_turns,
            next_task_sequence: 0,
            budget_exhausted: false,
        }
    }

    pub fn all_tasks_done(&self) -> bool {
        !self.tasks.is_empty()
            && self
                .tasks
                .iter()
                .all(|t| matches!(t.status, TaskStatus::Done | TaskStatus::Failed))
    }
}
