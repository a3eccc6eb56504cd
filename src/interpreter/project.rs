//! Project interpreter — the collaborative task-plan actor.

use crate::effect::{ActorMessageEnvelope, BroadcastEvent, Effect};
use crate::ids::{AgentId, ProjectId, TaskId};
use crate::interpreter::{no_change, state_only, with_effects};
use crate::values::project::{Task, TaskStatus};
use crate::values::{ProjectPhase, ProjectState};

#[derive(Debug, Clone)]
pub enum ProjectMessage {
    StartProject {
        goal: String,
    },
    AddTask {
        id: TaskId,
        title: String,
        description: String,
        priority: i32,
        created_at_ms: i64,
    },
    AssignTask {
        task_id: TaskId,
        agent_id: AgentId,
    },
    TaskStarted {
        task_id: TaskId,
        started_at_ms: i64,
    },
    TaskCompleted {
        task_id: TaskId,
        artifacts: Vec<String>,
        completed_at_ms: i64,
    },
    TaskFailed {
        task_id: TaskId,
        error: String,
        completed_at_ms: i64,
    },
    SetPhase {
        phase: ProjectPhase,
    },
    /// `idle_agents` is the snapshot of currently-idle room members the
    /// runtime took at tick time, used for task dispatch fan-out.
    ProjectTick {
        now_ms: i64,
        idle_agents: Vec<AgentId>,
    },
    AgentTurnComplete {
        agent_id: AgentId,
    },
    CancelProject,
    PlanningComplete {
        tasks: Vec<(TaskId, String, String, i32, i64)>,
    },
}

fn upsert_task_effect(project_room_id: &crate::ids::RoomId, task: &Task) -> Effect {
    Effect::UpsertTask { project_room_id: project_room_id.clone(), task: task.clone() }
}

fn progress_event(state: &ProjectState) -> Effect {
    let done = state.tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    Effect::BroadcastToRoom {
        room_id: state.room_id.clone(),
        event: BroadcastEvent {
            kind: "build_progress".to_string(),
            room_id: Some(state.room_id.clone()),
            payload: serde_json::json!({
                "projectId": state.id,
                "phase": state.phase,
                "tasksDone": done,
                "tasksTotal": state.tasks.len(),
            }),
        },
    }
}

fn dispatch_task(task_id: &TaskId, agent_id: &AgentId) -> Effect {
    Effect::SendToActor {
        to: crate::ids::ActorAddress::agent(agent_id),
        message: ActorMessageEnvelope::Agent(super::agent::AgentMessage::StartTask { task_id: task_id.clone() }),
    }
}

fn assign_ready_tasks(state: &mut ProjectState, idle_agents: &[AgentId]) -> Vec<Effect> {
    let mut unassigned: Vec<usize> = state
        .tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.status == TaskStatus::Unassigned)
        .map(|(i, _)| i)
        .collect();
    unassigned.sort_by_key(|&i| (state.tasks[i].priority, state.tasks[i].sequence));

    let mut effects = Vec::new();
    for (slot, agent_id) in idle_agents.iter().enumerate() {
        let Some(&task_idx) = unassigned.get(slot) else { break };
        let task = &mut state.tasks[task_idx];
        task.status = TaskStatus::Assigned;
        task.assignee_id = Some(agent_id.clone());
        state.active_builders.insert(agent_id.clone());
        effects.push(upsert_task_effect(&state.room_id, task));
        effects.push(dispatch_task(&task.id, agent_id));
    }
    effects
}

pub fn interpret(mut state: ProjectState, message: ProjectMessage) -> (ProjectState, Vec<Effect>) {
    match message {
        ProjectMessage::StartProject { goal } => {
            state.goal = goal;
            state.phase = ProjectPhase::Planning;
            state_only(state)
        }

        ProjectMessage::AddTask { id, title, description, priority, created_at_ms } => {
            let sequence = state.next_task_sequence;
            state.next_task_sequence += 1;
            let task = Task::new(id, title, description, priority, created_at_ms, sequence);
            let effect = upsert_task_effect(&state.room_id, &task);
            state.tasks.push(task);
            with_effects(state, vec![effect])
        }

        ProjectMessage::PlanningComplete { tasks } => {
            let mut effects = Vec::new();
            for (id, title, description, priority, created_at_ms) in tasks {
                let sequence = state.next_task_sequence;
                state.next_task_sequence += 1;
                let task = Task::new(id, title, description, priority, created_at_ms, sequence);
                effects.push(upsert_task_effect(&state.room_id, &task));
                state.tasks.push(task);
            }
            state.phase = ProjectPhase::Building;
            with_effects(state, effects)
        }

        ProjectMessage::AssignTask { task_id, agent_id } => {
            let Some(task) = state.tasks.iter_mut().find(|t| t.id == task_id) else {
                return no_change(state);
            };
            task.status = TaskStatus::Assigned;
            task.assignee_id = Some(agent_id.clone());
            let effect = upsert_task_effect(&state.room_id, task);
            state.active_builders.insert(agent_id.clone());
            let send = dispatch_task(&task_id, &agent_id);
            with_effects(state, vec![effect, send])
        }

        ProjectMessage::TaskStarted { task_id, started_at_ms } => {
            let Some(task) = state.tasks.iter_mut().find(|t| t.id == task_id) else {
                return no_change(state);
            };
            task.status = TaskStatus::InProgress;
            task.started_at_ms = Some(started_at_ms);
            let effect = upsert_task_effect(&state.room_id, task);
            with_effects(state, vec![effect])
        }

        ProjectMessage::TaskCompleted { task_id, artifacts, completed_at_ms } => {
            let Some(task_pos) = state.tasks.iter().position(|t| t.id == task_id) else {
                return no_change(state);
            };
            let assignee = state.tasks[task_pos].assignee_id.clone();
            state.tasks[task_pos].mark_done(completed_at_ms, artifacts);

            if let Some(agent_id) = assignee {
                state.active_builders.remove(&agent_id);
                state.completed_builders.insert(agent_id);
            }

            let mut effects = vec![upsert_task_effect(&state.room_id, &state.tasks[task_pos]), progress_event(&state)];
            if state.all_tasks_done() {
                state.phase = ProjectPhase::Reviewing;
                effects.push(progress_event(&state));
            }
            with_effects(state, effects)
        }

        ProjectMessage::TaskFailed { task_id, error, completed_at_ms } => {
            let Some(task) = state.tasks.iter_mut().find(|t| t.id == task_id) else {
                return no_change(state);
            };
            task.status = TaskStatus::Failed;
            task.error = Some(error);
            task.completed_at_ms = Some(completed_at_ms);
            let effect = upsert_task_effect(&state.room_id, task);
            with_effects(state, vec![effect, progress_event(&state)])
        }

        ProjectMessage::SetPhase { phase } => {
            state.phase = phase;
            let effect = progress_event(&state);
            with_effects(state, vec![effect])
        }

        ProjectMessage::ProjectTick { now_ms: _, idle_agents } => {
            if state.phase != ProjectPhase::Building {
                return no_change(state);
            }
            if state.all_tasks_done() {
                state.phase = ProjectPhase::Reviewing;
                let effect = progress_event(&state);
                return with_effects(state, vec![effect]);
            }
            if state.turn_count >= state.max_turns {
                state.phase = ProjectPhase::Done;
                state.budget_exhausted = true;
                let effect = progress_event(&state);
                return with_effects(state, vec![effect]);
            }
            let effects = assign_ready_tasks(&mut state, &idle_agents);
            if effects.is_empty() {
                no_change(state)
            } else {
                with_effects(state, effects)
            }
        }

        ProjectMessage::AgentTurnComplete { agent_id: _ } => {
            state.turn_count += 1;
            if state.turn_count >= state.max_turns && state.phase == ProjectPhase::Building {
                state.phase = ProjectPhase::Done;
                state.budget_exhausted = true;
                let effect = progress_event(&state);
                return with_effects(state, vec![effect]);
            }
            state_only(state)
        }

        ProjectMessage::CancelProject => {
            state.phase = ProjectPhase::Done;
            let effect = Effect::BroadcastToRoom {
                room_id: state.room_id.clone(),
                event: BroadcastEvent {
                    kind: "system_notification".to_string(),
                    room_id: Some(state.room_id.clone()),
                    payload: serde_json::json!({
                        "severity": crate::error::Severity::Info,
                        "message": format!("project {} cancelled", state.id),
                    }),
                },
            };
            with_effects(state, vec![effect])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RoomId;

    fn project() -> ProjectState {
        ProjectState::new(ProjectId::new("p1"), "build it", "ship a widget", RoomId::new("r1"), 10)
    }

    #[test]
    fn task_completion_moves_builder_and_emits_progress() {
        let mut state = project();
        state.tasks.push(Task::new(TaskId::new("t1"), "do thing", "", 0, 0, 0));
        state.tasks[0].status = TaskStatus::InProgress;
        state.tasks[0].assignee_id = Some(AgentId::new("a"));
        state.active_builders.insert(AgentId::new("a"));

        let (next, effects) = interpret(
            state,
            ProjectMessage::TaskCompleted {
                task_id: TaskId::new("t1"),
                artifacts: vec!["out.txt".to_string()],
                completed_at_ms: 5_000,
            },
        );

        assert_eq!(next.tasks[0].status, TaskStatus::Done);
        assert!(next.active_builders.is_empty());
        assert!(next.completed_builders.contains(&AgentId::new("a")));
        assert_eq!(next.phase, ProjectPhase::Reviewing);
        assert!(effects.iter().any(|e| matches!(e, Effect::UpsertTask { .. })));
    }

    #[test]
    fn tick_dispatches_unassigned_tasks_by_priority() {
        let mut state = project();
        state.phase = ProjectPhase::Building;
        state.tasks.push(Task::new(TaskId::new("low"), "low prio", "", 5, 0, 0));
        state.tasks.push(Task::new(TaskId::new("high"), "high prio", "", 1, 0, 1));

        let (next, effects) = interpret(
            state,
            ProjectMessage::ProjectTick { now_ms: 1_000, idle_agents: vec![AgentId::new("a")] },
        );

        let high = next.tasks.iter().find(|t| t.id == TaskId::new("high")).unwrap();
        assert_eq!(high.status, TaskStatus::Assigned);
        let low = next.tasks.iter().find(|t| t.id == TaskId::new("low")).unwrap();
        assert_eq!(low.status, TaskStatus::Unassigned);
        assert!(effects.iter().any(|e| matches!(e, Effect::SendToActor { .. })));
    }

    #[test]
    fn turn_budget_exhaustion_marks_done() {
        let mut state = project();
        state.phase = ProjectPhase::Building;
        state.max_turns = 1;
        state.turn_count = 0;

        let (next, _effects) = interpret(state, ProjectMessage::AgentTurnComplete { agent_id: AgentId::new("a") });

        assert_eq!(next.phase, ProjectPhase::Done);
        assert!(next.budget_exhausted);
    }
}
