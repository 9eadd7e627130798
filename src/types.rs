//! PRAQTOR X Test Agent - Type Definitions
//!
//! Shared types for the demo agent and the policy-proxy test harness.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::rules::RuleId;

// ─── Configuration ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Value of the `X-Praqtor-Agent-ID` header on every model call.
    pub agent_id: String,
    /// Base URL of the PRAQTOR X proxy (no trailing `/v1`).
    pub proxy_url: String,
    /// Upstream provider API key, forwarded through the proxy.
    pub api_key: String,
    pub model: String,
    pub max_tokens_per_turn: u32,
    pub db_path: String,
    /// Directory where `generate_report` writes files.
    pub report_dir: String,
    /// Endpoint the `send_notification` tool posts to.
    pub notification_url: String,
    pub log_level: LogLevel,
    pub version: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Default configuration matching the original test-agent setup:
/// gpt-4o-mini behind `praqtorx-proxy.fly.dev`.
pub fn default_config() -> AgentConfig {
    AgentConfig {
        agent_id: "financial_transfer_agent".to_string(),
        proxy_url: "https://praqtorx-proxy.fly.dev".to_string(),
        api_key: String::new(),
        model: "gpt-4o-mini".to_string(),
        max_tokens_per_turn: 4096,
        db_path: "~/.praqtor-agent/runs.db".to_string(),
        report_dir: "/tmp".to_string(),
        notification_url: "https://api.notifications.example.com/send".to_string(),
        log_level: LogLevel::Info,
        version: "0.1.0".to_string(),
    }
}

// ─── Chat Wire Types ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ChatToolCallFunction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatToolCallFunction {
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    pub usage: TokenUsage,
    pub finish_reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub def_type: String,
    pub function: ToolDefinitionFunction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinitionFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// ─── Chat Client Interface ───────────────────────────────────────

/// A chat-completions backend. The production implementation talks to the
/// PRAQTOR X proxy; tests substitute scripted clients.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<ChatOptions>,
    ) -> Result<ChatResponse, crate::proxy::ProxyError>;

    fn default_model(&self) -> String;
}

// ─── Tool Execution ──────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub id: String,
    /// Call ID assigned by the model, if this result answers a model tool
    /// call. Model-assigned IDs are only unique within one response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: String,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runtime context handed to every tool invocation.
pub struct ToolContext {
    pub config: AgentConfig,
    pub http: reqwest::Client,
}

impl ToolContext {
    pub fn new(config: AgentConfig) -> Self {
        ToolContext {
            config,
            http: reqwest::Client::new(),
        }
    }
}

// ─── Agent Runs ──────────────────────────────────────────────────

/// How a single agent request ended.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RunEnd {
    /// The model produced a final text answer.
    Completed,
    /// The proxy refused a model call on policy grounds.
    Blocked {
        #[serde(skip_serializing_if = "Option::is_none")]
        rule: Option<RuleId>,
        message: String,
    },
    /// A non-policy failure (transport, provider error, iteration bound).
    Failed { message: String },
}

/// Full transcript of one user request through the agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRun {
    pub id: String,
    pub prompt: String,
    pub final_text: String,
    pub tool_calls: Vec<ToolCallResult>,
    pub usage: TokenUsage,
    pub end: RunEnd,
    pub started_at: String,
    pub finished_at: String,
}
