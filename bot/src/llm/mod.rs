//! Chat completion provider. Rebuilds a rig agent per request from the
//! compiled generation parameters, reads token usage off every round to
//! price the call, and executes requested tool calls synchronously until the
//! model stops asking for them.

pub mod pricing;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use rig::client::CompletionClient;
use rig::completion::Completion;
use rig::message::{AssistantContent, ImageDetail, Message as RigMessage, ToolCall, ToolResultContent, UserContent};
use rig::providers::openai;
use rig::tool::Tool;
use rig::OneOrMany;
use thiserror::Error;

use crate::ledger::Ledger;
use crate::prompt::{CompiledPrompt, Role, Turn};
use tools::{GetUserNameTool, UpdateUserMemoryTool, UpdateUserNameTool};

pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound on tool round-trips within one completion.
const MAX_TOOL_ROUNDS: usize = 8;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    #[error("model response timed out")]
    Timeout,
    #[error("tool `{0}` failed: {1}")]
    Tool(String, String),
    #[error("model kept requesting tools after {0} rounds")]
    ToolLoop(usize),
}

pub struct ChatOutcome {
    pub text: String,
    /// Image bytes when the provider produces one alongside text.
    pub image: Option<Vec<u8>>,
    /// Total measured cost across all rounds, for the credit debit.
    pub cost: f64,
}

pub struct ChatProvider {
    client: openai::Client,
    memory_tool: UpdateUserMemoryTool,
    name_tool: UpdateUserNameTool,
    lookup_tool: GetUserNameTool,
}

impl ChatProvider {
    pub fn new(api_key: &str, ledger: Arc<Ledger>) -> Self {
        ChatProvider {
            client: openai::Client::new(api_key),
            memory_tool: UpdateUserMemoryTool {
                ledger: ledger.clone(),
            },
            name_tool: UpdateUserNameTool {
                ledger: ledger.clone(),
            },
            lookup_tool: GetUserNameTool { ledger },
        }
    }

    pub async fn complete(&self, prompt: &CompiledPrompt) -> Result<ChatOutcome, ProviderError> {
        let agent = self
            .client
            .agent(&prompt.params.model)
            .preamble(&prompt.system)
            .temperature(prompt.params.temperature)
            .additional_params(serde_json::json!({ "top_p": prompt.params.top_p }))
            .tool(self.memory_tool.clone())
            .tool(self.name_tool.clone())
            .tool(self.lookup_tool.clone())
            .build();

        let mut history: Vec<RigMessage> = prompt.turns.iter().map(turn_to_message).collect();
        let mut next = history.pop().unwrap_or_else(|| RigMessage::user(""));
        let mut cost = 0.0;

        for _ in 0..MAX_TOOL_ROUNDS {
            let request = agent.completion(next.clone(), history.clone()).await?;
            let response = tokio::time::timeout(PROVIDER_TIMEOUT, request.send())
                .await
                .map_err(|_| ProviderError::Timeout)??;

            if let Some(usage) = &response.raw_response.usage {
                let output_tokens = usage.total_tokens.saturating_sub(usage.prompt_tokens);
                cost += pricing::completion_cost(
                    &prompt.params.model,
                    usage.prompt_tokens as u64,
                    output_tokens as u64,
                );
            } else {
                tracing::warn!("Provider response carried no usage data");
            }

            let mut text = String::new();
            let mut tool_calls: Vec<ToolCall> = vec![];
            for content in response.choice.iter() {
                match content {
                    AssistantContent::Text(part) => text.push_str(&part.text),
                    AssistantContent::ToolCall(call) => tool_calls.push(call.clone()),
                }
            }

            if tool_calls.is_empty() {
                return Ok(ChatOutcome {
                    text,
                    image: None,
                    cost,
                });
            }

            history.push(next);
            history.push(RigMessage::Assistant {
                content: response.choice.clone(),
            });

            let mut results = vec![];
            for call in &tool_calls {
                let output = self.dispatch(call).await;
                results.push(UserContent::tool_result(
                    call.id.clone(),
                    OneOrMany::one(ToolResultContent::text(output)),
                ));
            }
            let content = OneOrMany::many(results).map_err(|_| {
                ProviderError::Tool("tool_results".into(), "no tool results produced".into())
            })?;
            next = RigMessage::User { content };
        }

        Err(ProviderError::ToolLoop(MAX_TOOL_ROUNDS))
    }

    /// Execute one requested call. Tool failures are reported back to the
    /// model as results instead of aborting the completion.
    async fn dispatch(&self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        let args = call.function.arguments.clone();
        let result = match name {
            UpdateUserMemoryTool::NAME => match serde_json::from_value(args) {
                Ok(args) => self
                    .memory_tool
                    .call(args)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|out| serde_json::to_string(&out).map_err(|e| e.to_string())),
                Err(e) => Err(e.to_string()),
            },
            UpdateUserNameTool::NAME => match serde_json::from_value(args) {
                Ok(args) => self
                    .name_tool
                    .call(args)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|out| serde_json::to_string(&out).map_err(|e| e.to_string())),
                Err(e) => Err(e.to_string()),
            },
            GetUserNameTool::NAME => match serde_json::from_value(args) {
                Ok(args) => self
                    .lookup_tool
                    .call(args)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|out| serde_json::to_string(&out).map_err(|e| e.to_string())),
                Err(e) => Err(e.to_string()),
            },
            _ => Err(format!("unknown tool `{name}`")),
        };

        match result {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Tool `{name}` failed: {e}");
                format!("{{\"status\": \"error\", \"message\": \"{e}\"}}")
            }
        }
    }
}

fn turn_to_message(turn: &Turn) -> RigMessage {
    match turn.role {
        Role::Assistant => RigMessage::assistant(turn.text.clone()),
        Role::User => {
            if turn.images.is_empty() {
                return RigMessage::user(turn.text.clone());
            }
            let mut parts = vec![UserContent::text(turn.text.clone())];
            for url in &turn.images {
                parts.push(UserContent::image(
                    url.clone(),
                    None,
                    None,
                    Some(ImageDetail::Auto),
                ));
            }
            match OneOrMany::many(parts) {
                Ok(content) => RigMessage::User { content },
                // Fallback to text-only if the content list is empty
                Err(_) => RigMessage::user(turn.text.clone()),
            }
        }
    }
}
