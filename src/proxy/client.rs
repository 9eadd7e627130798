//! Chat-completions client for the PRAQTOR X proxy.
//!
//! Speaks the OpenAI wire format against `{proxy_url}/v1/chat/completions`,
//! tagging every request with the agent's `X-Praqtor-Agent-ID` header so the
//! proxy can attribute tool and prompt activity to this agent.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::ProxyError;
use crate::rules::extract_rule_ids;
use crate::types::{
    ChatClient, ChatMessage, ChatOptions, ChatResponse, ChatRole, ChatToolCall,
    ChatToolCallFunction, TokenUsage,
};

/// Header used by the proxy to identify the calling agent.
const AGENT_ID_HEADER: &str = "X-Praqtor-Agent-ID";

pub struct ProxyChatClient {
    base_url: String,
    api_key: String,
    agent_id: String,
    default_model: String,
    max_tokens: u32,
    http: Client,
}

impl ProxyChatClient {
    /// Create a new client.
    ///
    /// * `base_url` - Proxy base URL without the `/v1` suffix
    ///   (e.g. `https://praqtorx-proxy.fly.dev`).
    /// * `agent_id` - Value for the `X-Praqtor-Agent-ID` header.
    pub fn new(
        base_url: String,
        api_key: String,
        agent_id: String,
        default_model: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            agent_id,
            default_model,
            max_tokens,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl ChatClient for ProxyChatClient {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<ChatOptions>,
    ) -> Result<ChatResponse, ProxyError> {
        let model = options
            .as_ref()
            .and_then(|o| o.model.as_deref())
            .unwrap_or(&self.default_model)
            .to_string();

        let token_limit = options
            .as_ref()
            .and_then(|o| o.max_tokens)
            .unwrap_or(self.max_tokens);

        let formatted_messages: Vec<Value> = messages.iter().map(format_message).collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": formatted_messages,
            "max_tokens": token_limit,
            "stream": false,
        });

        if let Some(ref opts) = options {
            if let Some(temp) = opts.temperature {
                body["temperature"] = serde_json::json!(temp);
            }
            if let Some(ref tools) = opts.tools {
                if !tools.is_empty() {
                    body["tools"] = serde_json::json!(tools);
                    body["tool_choice"] = serde_json::json!("auto");
                }
            }
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(url = %url, model = %model, "sending chat completion request");

        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header(AGENT_ID_HEADER, &self.agent_id)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_error_body(status.as_u16(), &text));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| ProxyError::Malformed(e.to_string()))?;
        parse_response(&data, &model)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }
}

/// Decide whether a non-2xx proxy response is a policy block.
///
/// The proxy signals blocks with an error body naming the matched rule
/// (e.g. "Blocked by PRAQTOR X rule P1-01"). Anything that names a rule ID
/// or carries a praqtor/policy marker counts; everything else is a plain
/// upstream error.
pub fn classify_error_body(status: u16, body: &str) -> ProxyError {
    let rules = extract_rule_ids(body);
    let lowered = body.to_lowercase();
    let has_marker = lowered.contains("praqtor") || lowered.contains("policy violation");

    if !rules.is_empty() || has_marker {
        let message = extract_error_message(body).unwrap_or_else(|| body.trim().to_string());
        return ProxyError::PolicyBlocked {
            rule: rules.first().copied(),
            message,
        };
    }

    ProxyError::Http {
        status,
        body: body.trim().to_string(),
    }
}

/// Pull the `error.message` field out of an OpenAI-style error body.
fn extract_error_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed["error"]["message"]
        .as_str()
        .or_else(|| parsed["message"].as_str())
        .map(|s| s.to_string())
}

/// Parse a chat-completion body into a `ChatResponse`, tolerating missing
/// optional fields.
pub fn parse_response(data: &Value, requested_model: &str) -> Result<ChatResponse, ProxyError> {
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| ProxyError::Malformed("no completion choice returned".to_string()))?;

    let message = &choice["message"];

    let usage = TokenUsage {
        prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: data["usage"]["total_tokens"].as_u64().unwrap_or(0),
    };

    let tool_calls: Option<Vec<ChatToolCall>> = message["tool_calls"].as_array().map(|tcs| {
        tcs.iter()
            .map(|tc| ChatToolCall {
                id: tc["id"].as_str().unwrap_or("").to_string(),
                call_type: "function".to_string(),
                function: ChatToolCallFunction {
                    name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                    arguments: tc["function"]["arguments"]
                        .as_str()
                        .unwrap_or("{}")
                        .to_string(),
                },
            })
            .collect()
    });

    let role = match message["role"].as_str().unwrap_or("assistant") {
        "system" => ChatRole::System,
        "user" => ChatRole::User,
        "tool" => ChatRole::Tool,
        _ => ChatRole::Assistant,
    };

    let response_message = ChatMessage {
        role,
        content: message["content"].as_str().unwrap_or("").to_string(),
        tool_calls: tool_calls.clone(),
        tool_call_id: message["tool_call_id"].as_str().map(|s| s.to_string()),
    };

    Ok(ChatResponse {
        id: data["id"].as_str().unwrap_or("").to_string(),
        model: data["model"].as_str().unwrap_or(requested_model).to_string(),
        message: response_message,
        tool_calls,
        usage,
        finish_reason: choice["finish_reason"].as_str().unwrap_or("stop").to_string(),
    })
}

/// Format a ChatMessage into the JSON structure expected by the API.
fn format_message(msg: &ChatMessage) -> Value {
    let mut formatted = serde_json::json!({
        "role": msg.role,
        "content": msg.content,
    });

    if let Some(ref tool_calls) = msg.tool_calls {
        let tc_json: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": tc.call_type,
                    "function": {
                        "name": tc.function.name,
                        "arguments": tc.function.arguments,
                    }
                })
            })
            .collect();
        formatted["tool_calls"] = serde_json::json!(tc_json);
    }

    if let Some(ref tool_call_id) = msg.tool_call_id {
        formatted["tool_call_id"] = serde_json::json!(tool_call_id);
    }

    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{PROMPT_INJECTION, SHELL_EXECUTION};

    #[test]
    fn test_block_body_with_rule_id() {
        let body = r#"{"error":{"message":"Request blocked by PRAQTOR X: rule P1-01 matched (injection attack)"}}"#;
        let err = classify_error_body(403, body);
        assert!(err.is_policy_block());
        assert_eq!(err.blocked_rule(), Some(PROMPT_INJECTION));
    }

    #[test]
    fn test_block_body_with_marker_but_no_rule() {
        let body = r#"{"error":{"message":"Policy violation: request denied"}}"#;
        let err = classify_error_body(403, body);
        assert!(err.is_policy_block());
        assert_eq!(err.blocked_rule(), None);
    }

    #[test]
    fn test_behavior_rule_in_plain_text_body() {
        let err = classify_error_body(422, "tool call denied under B2-01");
        assert_eq!(err.blocked_rule(), Some(SHELL_EXECUTION));
    }

    #[test]
    fn test_plain_server_error_is_not_a_block() {
        let err = classify_error_body(500, "internal server error");
        assert!(!err.is_policy_block());
        match err {
            ProxyError::Http { status, .. } => assert_eq!(status, 500),
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_block_message_prefers_error_message_field() {
        let body = r#"{"error":{"message":"Blocked: P6-01"},"noise":true}"#;
        match classify_error_body(403, body) {
            ProxyError::PolicyBlocked { message, .. } => {
                assert_eq!(message, "Blocked: P6-01");
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let data = serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "get_account_balance",
                            "arguments": "{\"account_id\":\"ACC-001\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
        });

        let resp = parse_response(&data, "gpt-4o-mini").unwrap();
        assert_eq!(resp.finish_reason, "tool_calls");
        let calls = resp.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_account_balance");
        assert_eq!(resp.usage.total_tokens, 120);
    }

    #[test]
    fn test_parse_response_without_choices_is_malformed() {
        let data = serde_json::json!({"id": "x", "choices": []});
        assert!(parse_response(&data, "gpt-4o-mini").is_err());
    }

    #[test]
    fn test_format_message_includes_tool_result_fields() {
        let msg = ChatMessage {
            role: ChatRole::Tool,
            content: "Account ACC-001 balance: $10000.00".to_string(),
            tool_calls: None,
            tool_call_id: Some("call_1".to_string()),
        };
        let v = format_message(&msg);
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "call_1");
    }
}
