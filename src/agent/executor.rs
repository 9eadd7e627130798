//! The Agent Executor
//!
//! Runs one user request to completion: call the model through the proxy,
//! execute any tool calls it returns, feed the results back, and repeat
//! until the model stops, the proxy blocks, or a bound is hit.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::proxy::ProxyError;
use crate::types::{
    AgentConfig, AgentRun, ChatClient, ChatOptions, RunEnd, TokenUsage, ToolCallResult,
    ToolContext,
};

use super::context::{assistant_message, initial_messages, tool_result_message};
use super::system_prompt::SYSTEM_PROMPT;
use super::tools::{create_builtin_tools, execute_tool, tools_to_chat_format, BuiltinTool};

/// Maximum chat rounds for a single request.
const MAX_ROUNDS: usize = 8;

/// Maximum tool calls executed across a single request.
const MAX_TOOL_CALLS_PER_REQUEST: usize = 10;

/// Consecutive failing tool calls before the request is abandoned.
const MAX_CONSECUTIVE_TOOL_ERRORS: usize = 5;

pub struct AgentExecutor {
    client: Arc<dyn ChatClient>,
    tools: Vec<BuiltinTool>,
    tool_context: ToolContext,
}

impl AgentExecutor {
    pub fn new(client: Arc<dyn ChatClient>, config: AgentConfig) -> Self {
        Self {
            client,
            tools: create_builtin_tools(),
            tool_context: ToolContext::new(config),
        }
    }

    /// Run a single user request through the agent and return the full
    /// transcript. Policy blocks and failures are outcomes, not errors: the
    /// harness needs them intact for classification.
    pub async fn invoke(&self, prompt: &str) -> AgentRun {
        let started_at = Utc::now().to_rfc3339();
        let run_id = Uuid::new_v4().to_string();

        let mut messages = initial_messages(SYSTEM_PROMPT, prompt);
        let mut executed: Vec<ToolCallResult> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut final_text = String::new();

        let options = ChatOptions {
            tools: Some(tools_to_chat_format(&self.tools)),
            ..Default::default()
        };

        let mut end = RunEnd::Failed {
            message: format!("round limit reached ({MAX_ROUNDS})"),
        };
        let mut consecutive_errors = 0usize;

        'rounds: for round in 0..MAX_ROUNDS {
            info!(round, model = %self.client.default_model(), "calling model");

            let response = match self.client.chat(messages.clone(), Some(options.clone())).await {
                Ok(r) => r,
                Err(ProxyError::PolicyBlocked { rule, message }) => {
                    warn!(rule = ?rule.map(|r| r.to_string()), "proxy blocked the request");
                    end = RunEnd::Blocked { rule, message };
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "model call failed");
                    end = RunEnd::Failed {
                        message: err.to_string(),
                    };
                    break;
                }
            };

            usage.add(&response.usage);
            messages.push(assistant_message(&response));

            let tool_calls = response.tool_calls.clone().unwrap_or_default();
            if tool_calls.is_empty() {
                if !response.message.content.is_empty() {
                    final_text = response.message.content.clone();
                }
                if response.finish_reason == "stop" {
                    end = RunEnd::Completed;
                    break;
                }
                continue;
            }

            for tc in &tool_calls {
                if executed.len() >= MAX_TOOL_CALLS_PER_REQUEST {
                    warn!("tool call budget exhausted ({MAX_TOOL_CALLS_PER_REQUEST})");
                    break;
                }

                let args: serde_json::Value =
                    serde_json::from_str(&tc.function.arguments).unwrap_or_default();
                info!(tool = %tc.function.name, args = %preview(&args.to_string(), 100), "executing tool");

                let mut result =
                    execute_tool(&tc.function.name, &args, &self.tools, &self.tool_context).await;
                // Model-assigned call IDs repeat across responses, so they
                // ride along instead of replacing the generated result ID.
                result.call_id = Some(tc.id.clone());

                let summary = result
                    .error
                    .as_deref()
                    .map(|e| format!("ERROR: {e}"))
                    .unwrap_or_else(|| preview(&result.result, 200));
                info!(tool = %result.name, result = %summary, "tool finished");

                if result.error.is_some() {
                    consecutive_errors += 1;
                } else {
                    consecutive_errors = 0;
                }

                messages.push(tool_result_message(&tc.id, &result));
                executed.push(result);

                if consecutive_errors >= MAX_CONSECUTIVE_TOOL_ERRORS {
                    warn!("too many consecutive tool errors ({MAX_CONSECUTIVE_TOOL_ERRORS})");
                    end = RunEnd::Failed {
                        message: format!(
                            "too many consecutive tool errors ({MAX_CONSECUTIVE_TOOL_ERRORS})"
                        ),
                    };
                    break 'rounds;
                }
            }
        }

        AgentRun {
            id: run_id,
            prompt: prompt.to_string(),
            final_text,
            tool_calls: executed,
            usage,
            end,
            started_at,
            finished_at: Utc::now().to_rfc3339(),
        }
    }
}

fn preview(s: &str, max: usize) -> String {
    if s.len() > max {
        let cut = s
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &s[..cut])
    } else {
        s.to_string()
    }
}
