//! Conversation Assembly
//!
//! Builds the OpenAI message array for tool-calling rounds: system prompt,
//! user input, assistant turns with their tool calls, and tool results keyed
//! back to the call IDs.

use crate::types::{ChatMessage, ChatResponse, ChatRole, ToolCallResult};

/// Messages for the first round of a request: system prompt + user input.
pub fn initial_messages(system_prompt: &str, user_input: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_input),
    ]
}

/// The assistant's reply as a history message, preserving its tool calls so
/// the next round can reference them.
pub fn assistant_message(response: &ChatResponse) -> ChatMessage {
    ChatMessage {
        role: ChatRole::Assistant,
        content: response.message.content.clone(),
        tool_calls: response.tool_calls.clone(),
        tool_call_id: None,
    }
}

/// A tool result as a `tool`-role message. Errors are surfaced to the model
/// as text so it can recover or explain.
pub fn tool_result_message(call_id: &str, result: &ToolCallResult) -> ChatMessage {
    let content = if let Some(ref err) = result.error {
        format!("Error: {}", err)
    } else {
        result.result.clone()
    };

    ChatMessage {
        role: ChatRole::Tool,
        content,
        tool_calls: None,
        tool_call_id: Some(call_id.to_string()),
    }
}
