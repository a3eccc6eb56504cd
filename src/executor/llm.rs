//! Anthropic LLM executor.
//!
//! Opens one HTTPS request per call against the Messages API. Cancellation
//! is tracked by `replyTag -> AbortHandle`; a superseded call is aborted
//! in-flight rather than merely ignored, so its HTTP connection is actually
//! torn down.

use crate::effect::LlmRequest;
use crate::ids::{AgentId, ReplyTag};
use crate::interpreter::agent::{AgentMessage, ContentBlock, StopReason};
use crate::runtime::RuntimeHandle;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicLlmExecutor {
    http: reqwest::Client,
    api_key: String,
    handle: Arc<dyn RuntimeHandle>,
    in_flight: Mutex<HashMap<String, AbortHandle>>,
}

impl AnthropicLlmExecutor {
    pub fn new(api_key: String, handle: Arc<dyn RuntimeHandle>) -> Self {
        Self { http: reqwest::Client::new(), api_key, handle, in_flight: Mutex::new(HashMap::new()) }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum AnthropicBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ServerToolUse { id: String, name: String, input: serde_json::Value },
    WebSearchToolResult { tool_use_id: String, content: serde_json::Value },
    #[serde(other)]
    Unknown,
}

fn to_content_blocks(blocks: Vec<AnthropicBlock>) -> Vec<ContentBlock> {
    blocks
        .into_iter()
        .map(|b| match b {
            AnthropicBlock::Text { text } => ContentBlock::Text { text },
            AnthropicBlock::ToolUse { id, name, input } => ContentBlock::ToolUse { id, name, input },
            AnthropicBlock::ServerToolUse { id, name, input } => ContentBlock::ServerToolUse { id, name, input },
            AnthropicBlock::WebSearchToolResult { tool_use_id, content } => {
                ContentBlock::WebSearchToolResult { tool_use_id, content }
            }
            AnthropicBlock::Unknown => ContentBlock::Text {
                text: "[unrecognised content block omitted]".to_string(),
            },
        })
        .collect()
}

fn request_body(request: &LlmRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| {
            let role = match m.role {
                crate::effect::LlmRole::User => "user",
                crate::effect::LlmRole::Assistant => "assistant",
                crate::effect::LlmRole::Tool => "user",
            };
            serde_json::json!({ "role": role, "content": m.content })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "system": request.system,
        "messages": messages,
        "temperature": request.temperature,
    });
    if !request.tools.is_empty() {
        let tools: Vec<serde_json::Value> = request
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": crate::tool_protocol::parameters_to_json_schema(&t.parameters),
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
    }
    body
}

#[async_trait]
impl super::LlmExecutor for AnthropicLlmExecutor {
    async fn call(&self, agent_id: AgentId, request: LlmRequest, reply_tag: ReplyTag) {
        let http = self.http.clone();
        let api_key = self.api_key.clone();
        let handle = self.handle.clone();
        let body = request_body(&request);
        let tag_for_task = reply_tag.clone();

        let join = tokio::spawn(async move {
            let result = http
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await;

            let message = match result {
                Ok(response) if response.status().is_success() => {
                    match response.json::<AnthropicResponse>().await {
                        Ok(parsed) => {
                            let stop_reason = match parsed.stop_reason.as_deref() {
                                Some("tool_use") => StopReason::ToolUse,
                                _ => StopReason::EndTurn,
                            };
                            let usage = parsed.usage.map(|u| crate::values::TokenUsage {
                                input_tokens: u.input_tokens,
                                output_tokens: u.output_tokens,
                            });
                            AgentMessage::ApiResponse {
                                content: to_content_blocks(parsed.content),
                                stop_reason,
                                usage: usage.unwrap_or_default(),
                                reply_tag: tag_for_task.clone(),
                                response_message_id: crate::ids::MessageId::new(crate::ids::new_id("msg")),
                                now_ms: chrono::Utc::now().timestamp_millis(),
                            }
                        }
                        Err(e) => AgentMessage::ApiError {
                            message: format!("failed to decode Anthropic response: {e}"),
                            transient: true,
                            reply_tag: tag_for_task.clone(),
                        },
                    }
                }
                Ok(response) => {
                    let status = response.status();
                    let transient = status.is_server_error() || status.as_u16() == 429;
                    let body_text = response.text().await.unwrap_or_default();
                    log::warn!("Anthropic API returned {status}: {body_text}");
                    AgentMessage::ApiError {
                        message: format!("Anthropic API error {status}: {body_text}"),
                        transient,
                        reply_tag: tag_for_task.clone(),
                    }
                }
                Err(e) => {
                    log::error!("Anthropic API request failed: {e}");
                    AgentMessage::ApiError {
                        message: format!("request failed: {e}"),
                        transient: true,
                        reply_tag: tag_for_task.clone(),
                    }
                }
            };

            handle
                .send(
                    crate::ids::ActorAddress::agent(&agent_id),
                    crate::effect::ActorMessageEnvelope::Agent(message),
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

