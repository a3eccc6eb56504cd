//! Tool executor.
//!
//! Runs a batch of tool calls sequentially, in request order, against an
//! agent's sandboxed workspace directory — two calls in the same batch can
//! target the same file (e.g. a `create` followed by a `str_replace`), so
//! ordering is preserved rather than fanning the batch out concurrently.
//! Once the batch finishes it re-enters the system with `ToolResults` tagged
//! the same `reply_tag` the calls were requested under. Cancellation aborts
//! the whole in-flight batch; individual calls are not cancellable.

use crate::effect::{ActorMessageEnvelope, ToolCallOutcome, ToolCallRequest};
use crate::ids::{AgentId, ReplyTag, RoomId};
use crate::interpreter::agent::AgentMessage;
use crate::runtime::RuntimeHandle;
use crate::tools::{bash, edit, memory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// Mirrors [`crate::config::Config`]'s `workspace_root`/`shared_workspace`:
/// every agent gets its own subdirectory under the former, and all agents
/// share one directory tree under the latter.
pub struct WorkspaceLayout {
    workspace_root: PathBuf,
    shared_workspace: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(workspace_root: impl Into<PathBuf>, shared_workspace: impl Into<PathBuf>) -> Self {
        Self { workspace_root: workspace_root.into(), shared_workspace: shared_workspace.into() }
    }

    fn agent_workspace(&self, agent_id: &AgentId) -> PathBuf {
        self.workspace_root.join(&agent_id.0)
    }

    fn shared_workspace(&self) -> PathBuf {
        self.shared_workspace.clone()
    }
}

pub struct SandboxedToolExecutor {
    layout: WorkspaceLayout,
    persistence: Arc<dyn super::PersistenceExecutor>,
    handle: Arc<dyn RuntimeHandle>,
    in_flight: Mutex<HashMap<String, AbortHandle>>,
}

impl SandboxedToolExecutor {
    pub fn new(
        layout: WorkspaceLayout,
        persistence: Arc<dyn super::PersistenceExecutor>,
        handle: Arc<dyn RuntimeHandle>,
    ) -> Self {
        Self { layout, persistence, handle, in_flight: Mutex::new(HashMap::new()) }
    }
}

async fn run_one(
    call: ToolCallRequest,
    workspace_root: PathBuf,
    shared_workspace: PathBuf,
    room_id: Option<RoomId>,
    agent_id: AgentId,
    persistence: Arc<dyn super::PersistenceExecutor>,
) -> ToolCallOutcome {
    let outcome = match call.tool_name.as_str() {
        "bash" => {
            let command = call.parameters.get("command").and_then(|v| v.as_str()).unwrap_or("");
            let result = bash::run(command, &workspace_root, None).await;
            (
                result.is_error,
                serde_json::json!({
                    "stdout": result.stdout,
                    "stderr": result.stderr,
                    "exit_code": result.exit_code,
                    "duration_ms": result.duration_ms,
                }),
            )
        }
        "str_replace_based_edit_tool" => {
            let args = edit::EditArgs {
                command: call.parameters.get("command").and_then(|v| v.as_str()).unwrap_or(""),
                path: call.parameters.get("path").and_then(|v| v.as_str()).unwrap_or(""),
                file_text: call.parameters.get("file_text").and_then(|v| v.as_str()),
                old_str: call.parameters.get("old_str").and_then(|v| v.as_str()),
                new_str: call.parameters.get("new_str").and_then(|v| v.as_str()),
                insert_line: call.parameters.get("insert_line").and_then(|v| v.as_i64()),
            };
            match edit::run(args, &workspace_root, &shared_workspace) {
                Ok(output) => (false, serde_json::json!({"output": output})),
                Err(error) => (true, serde_json::json!({"error": error})),
            }
        }
        "memory" => {
            let room_id = match room_id.clone() {
                Some(room_id) => room_id,
                None => return error_outcome(&call, "memory tool requires an active room"),
            };
            let args = memory::MemoryArgs {
                command: call.parameters.get("command").and_then(|v| v.as_str()).unwrap_or(""),
                path: call.parameters.get("path").and_then(|v| v.as_str()).unwrap_or(""),
                file_text: call.parameters.get("file_text").and_then(|v| v.as_str()),
                old_str: call.parameters.get("old_str").and_then(|v| v.as_str()),
                new_str: call.parameters.get("new_str").and_then(|v| v.as_str()),
                insert_line: call.parameters.get("insert_line").and_then(|v| v.as_i64()),
                new_path: call.parameters.get("new_path").and_then(|v| v.as_str()),
            };
            match memory::run(args, room_id, agent_id.as_str(), persistence.as_ref()).await {
                Ok(output) => (false, serde_json::json!({"output": output})),
                Err(error) => (true, serde_json::json!({"error": error})),
            }
        }
        other => return error_outcome(&call, &format!("unknown tool: {other}")),
    };

    ToolCallOutcome { call_id: call.call_id, tool_name: call.tool_name, is_error: outcome.0, output: outcome.1 }
}

fn error_outcome(call: &ToolCallRequest, message: &str) -> ToolCallOutcome {
    ToolCallOutcome {
        call_id: call.call_id.clone(),
        tool_name: call.tool_name.clone(),
        is_error: true,
        output: serde_json::json!({"error": message}),
    }
}

#[async_trait]
impl super::ToolExecutor for SandboxedToolExecutor {
    async fn execute_batch(
        &self,
        agent_id: AgentId,
        room_id: Option<RoomId>,
        calls: Vec<ToolCallRequest>,
        reply_tag: ReplyTag,
    ) {
        let workspace_root = self.layout.agent_workspace(&agent_id);
        let shared_workspace = self.layout.shared_workspace();
        let handle = self.handle.clone();
        let persistence = self.persistence.clone();
        let tag_for_task = reply_tag.clone();
        let agent_for_task = agent_id.clone();

        let join = tokio::spawn(async move {
            if let Err(e) = tokio::fs::create_dir_all(&workspace_root).await {
                log::warn!("could not create workspace for {agent_for_task}: {e}");
            }

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(
                    run_one(
                        call,
                        workspace_root.clone(),
                        shared_workspace.clone(),
                        room_id.clone(),
                        agent_for_task.clone(),
                        persistence.clone(),
                    )
                    .await,
                );
            }

            handle
                .send(
                    crate::ids::ActorAddress::agent(&agent_for_task),
                    ActorMessageEnvelope::Agent(AgentMessage::ToolResults { results, reply_tag: tag_for_task }),
                    None,
                )
                .await;
        });

        let mut in_flight = self.in_flight.lock().await;
        in_flight.insert(reply_tag.0, join.abort_handle());
    }

    async fn cancel(&self, reply_tag: ReplyTag) {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(handle) = in_flight.remove(&reply_tag.0) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::persistence::SqlitePersistence;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingHandle {
        sent: Mutex<Vec<AgentMessage>>,
        count: AtomicUsize,
    }

    #[async_trait]
    impl RuntimeHandle for RecordingHandle {
        async fn send(
            &self,
            _to: crate::ids::ActorAddress,
            message: ActorMessageEnvelope,
            _from: Option<crate::ids::ActorAddress>,
        ) {
            self.count.fetch_add(1, Ordering::SeqCst);
            if let ActorMessageEnvelope::Agent(msg) = message {
                self.sent.lock().await.push(msg);
            }
        }
    }

    #[tokio::test]
    async fn bash_call_runs_and_reports_results() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path(), shared.path());
        let persistence: Arc<dyn super::super::PersistenceExecutor> =
            Arc::new(SqlitePersistence::open_in_memory().unwrap());
        let handle = Arc::new(RecordingHandle { sent: Mutex::new(Vec::new()), count: AtomicUsize::new(0) });
        let executor = SandboxedToolExecutor::new(layout, persistence, handle.clone());

        let reply_tag = ReplyTag::new();
        let calls = vec![ToolCallRequest {
            call_id: "c1".to_string(),
            tool_name: "bash".to_string(),
            parameters: serde_json::json!({"command": "echo hi"}),
        }];
        executor.execute_batch(AgentId::new("a1"), Some(RoomId::new("r1")), calls, reply_tag.clone()).await;

        for _ in 0..50 {
            if handle.count.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let sent = handle.sent.lock().await;
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            AgentMessage::ToolResults { results, reply_tag: tag } => {
                assert_eq!(*tag, reply_tag);
                assert_eq!(results.len(), 1);
                assert!(!results[0].is_error);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_name_reports_error_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path(), shared.path());
        let persistence: Arc<dyn super::super::PersistenceExecutor> =
            Arc::new(SqlitePersistence::open_in_memory().unwrap());
        let handle = Arc::new(RecordingHandle { sent: Mutex::new(Vec::new()), count: AtomicUsize::new(0) });
        let executor = SandboxedToolExecutor::new(layout, persistence, handle.clone());

        let reply_tag = ReplyTag::new();
        let calls = vec![ToolCallRequest {
            call_id: "c1".to_string(),
            tool_name: "not_a_real_tool".to_string(),
            parameters: serde_json::json!({}),
        }];
        executor.execute_batch(AgentId::new("a1"), None, calls, reply_tag).await;

        for _ in 0..50 {
            if handle.count.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let sent = handle.sent.lock().await;
        match &sent[0] {
            AgentMessage::ToolResults { results, .. } => assert!(results[0].is_error),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
