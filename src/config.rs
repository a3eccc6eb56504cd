//! Process configuration.
//!
//! Constructed once at startup and passed explicitly into the runtime and
//! executors — no implicit singletons.

use crate::error::RuntimeError;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the upstream LLM service. Required; process refuses to
    /// start without it (a fatal condition).
    pub llm_api_key: String,
    pub listen_port: u16,
    pub data_dir: PathBuf,
    pub workspace_root: PathBuf,
    pub shared_workspace: PathBuf,
    pub scheduler_tick: Duration,
    pub max_tool_calls_per_response: u32,
    /// Fan-out cap and tendency threshold for responder selection
    /// (resolved default: threshold 0.3, cap 3).
    pub responder_tendency_threshold: f64,
    pub responder_fanout_cap: usize,
    pub pending_responder_timeout: Duration,
    pub context_window_messages: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, RuntimeError> {
        let llm_api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            RuntimeError::Fatal("ANTHROPIC_API_KEY must be set".to_string())
        })?;
        if llm_api_key.trim().is_empty() {
            return Err(RuntimeError::Fatal("ANTHROPIC_API_KEY is empty".to_string()));
        }

        let listen_port = env_or_default("PORT", 8888u16)?;
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        let workspace_root =
            std::env::var("WORKSPACE_ROOT").unwrap_or_else(|_| "./workspaces".to_string());
        let shared_workspace =
            std::env::var("SHARED_WORKSPACE").unwrap_or_else(|_| "./shared".to_string());
        let scheduler_tick_ms = env_or_default("SCHEDULER_TICK_MS", 100u64)?;
        let max_tool_calls_per_response = env_or_default("MAX_TOOL_CALLS", 50u32)?;

        Ok(Self {
            llm_api_key,
            listen_port,
            data_dir: PathBuf::from(data_dir),
            workspace_root: PathBuf::from(workspace_root),
            shared_workspace: PathBuf::from(shared_workspace),
            scheduler_tick: Duration::from_millis(scheduler_tick_ms),
            max_tool_calls_per_response,
            responder_tendency_threshold: 0.3,
            responder_fanout_cap: 3,
            pending_responder_timeout: Duration::from_secs(30),
            context_window_messages: 20,
        })
    }
}

fn env_or_default<T>(key: &str, default: T) -> Result<T, RuntimeError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| RuntimeError::Fatal(format!("{key} is not a valid value"))),
        Err(_) => Ok(default),
    }
}
