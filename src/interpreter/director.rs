//! Director interpreter — the top-level supervisor.
//!
//! The director never holds room/agent/project state beyond identity and
//! metadata; the rooms/agents/projects themselves are separate actors
//! spawned via actor-control effects.

use crate::effect::Effect;
use crate::ids::{AgentId, ProjectId, ReplyTag, RoomId};
use crate::interpreter::{no_change, state_only, with_effects};
use crate::values::director::{AgentSummary, ProjectPhaseSummary, ProjectSummary, RoomSummary};
use crate::values::{AgentConfig, DirectorState, ProjectState, RoomConfig};

#[derive(Debug, Clone)]
pub enum DirectorMessage {
    CreateRoom {
        config: RoomConfig,
    },
    DeleteRoom {
        room_id: RoomId,
    },
    RegisterAgent {
        config: AgentConfig,
    },
    UnregisterAgent {
        agent_id: AgentId,
    },
    MoveAgentToRoom {
        agent_id: AgentId,
        room_id: Option<RoomId>,
    },
    StartNewProject {
        project_id: ProjectId,
        room_id: RoomId,
        name: String,
        goal: String,
        max_turns: u32,
    },
    StopProject {
        project_id: ProjectId,
    },
    AgentsLoaded {
        agents: Vec<AgentSummary>,
    },
    RoomsLoaded {
        rooms: Vec<RoomSummary>,
    },
    GetStatus {
        reply_to: crate::ids::ActorAddress,
        reply_tag: ReplyTag,
    },
    /// The correlated reply to `GetStatus`, enqueued back to `reply_to` by
    /// the `GetStatus` arm itself (this director never dispatches it to
    /// another actor kind). Carries `reply_tag` so the requester can match
    /// it against the `GetStatus` it sent.
    StatusReply {
        reply_tag: ReplyTag,
        status: DirectorState,
    },
}

pub fn interpret(mut state: DirectorState, message: DirectorMessage) -> (DirectorState, Vec<Effect>) {
    match message {
        DirectorMessage::CreateRoom { config } => {
            state.rooms.insert(
                config.id.to_string(),
                RoomSummary { id: config.id.clone(), name: config.name.clone() },
            );
            with_effects(
                state,
                vec![Effect::UpsertRoomConfig { config: config.clone() }, Effect::SpawnRoomActor { config }],
            )
        }

        DirectorMessage::DeleteRoom { room_id } => {
            state.rooms.remove(room_id.as_str());
            for summary in state.agents.values_mut() {
                if summary.room_id.as_ref() == Some(&room_id) {
                    summary.room_id = None;
                }
            }
            with_effects(
                state,
                vec![Effect::StopActor { address: crate::ids::ActorAddress::room(&room_id) }],
            )
        }

        DirectorMessage::RegisterAgent { config } => {
            state.agents.insert(
                config.id.to_string(),
                AgentSummary { id: config.id.clone(), name: config.name.clone(), room_id: None },
            );
            with_effects(state, vec![Effect::SpawnAgentActor { config }])
        }

        DirectorMessage::UnregisterAgent { agent_id } => {
            state.agents.remove(agent_id.as_str());
            with_effects(
                state,
                vec![Effect::StopActor { address: crate::ids::ActorAddress::agent(&agent_id) }],
            )
        }

        DirectorMessage::MoveAgentToRoom { agent_id, room_id } => {
            let Some(summary) = state.agents.get_mut(agent_id.as_str()) else {
                return no_change(state);
            };
            summary.room_id = room_id.clone();
            let message = match room_id {
                Some(room_id) => crate::interpreter::agent::AgentMessage::JoinRoom { room_id },
                None => crate::interpreter::agent::AgentMessage::LeaveRoom,
            };
            with_effects(
                state,
                vec![Effect::SendToActor {
                    to: crate::ids::ActorAddress::agent(&agent_id),
                    message: crate::effect::ActorMessageEnvelope::Agent(message),
                }],
            )
        }

        DirectorMessage::StartNewProject { project_id, room_id, name, goal, max_turns } => {
            state.projects.insert(
                project_id.to_string(),
                ProjectSummary { id: project_id.clone(), room_id: room_id.clone(), phase: ProjectPhaseSummary::Idle },
            );
            let project = ProjectState::new(project_id, name, goal, room_id, max_turns);
            with_effects(state, vec![Effect::SpawnProjectActor { project }])
        }

        DirectorMessage::StopProject { project_id } => {
            if let Some(summary) = state.projects.get_mut(project_id.as_str()) {
                summary.phase = ProjectPhaseSummary::Done;
            }
            with_effects(
                state,
                vec![Effect::StopActor { address: crate::ids::ActorAddress::project(&project_id) }],
            )
        }

        DirectorMessage::AgentsLoaded { agents } => {
            state.agents = agents.into_iter().map(|a| (a.id.to_string(), a)).collect();
            state_only(state)
        }

        DirectorMessage::RoomsLoaded { rooms } => {
            state.rooms = rooms.into_iter().map(|r| (r.id.to_string(), r)).collect();
            state_only(state)
        }

        DirectorMessage::GetStatus { reply_to, reply_tag } => {
            let status = state.clone();
            with_effects(
                state,
                vec![Effect::SendToActor {
                    to: reply_to,
                    message: crate::effect::ActorMessageEnvelope::Director(DirectorMessage::StatusReply {
                        reply_tag,
                        status,
                    }),
                }],
            )
        }

        DirectorMessage::StatusReply { .. } => no_change(state),
    }
}
