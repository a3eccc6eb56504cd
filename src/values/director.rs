//! Director values — the director holds only identity/metadata, never the
//! full room/agent/project state.

use crate::ids::{AgentId, ProjectId, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub name: String,
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhaseSummary {
    Idle,
    Planning,
    Building,
    Reviewing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub room_id: RoomId,
    pub phase: ProjectPhaseSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorState {
    pub rooms: BTreeMap<String, RoomSummary>,
    pub agents: BTreeMap<String, AgentSummary>,
    pub projects: BTreeMap<String, ProjectSummary>,
}

impl DirectorState {
    pub fn new() -> Self {
        Self::default()
    }
}
