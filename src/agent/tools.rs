//! Demo Tool System
//!
//! The six single-action tools exposed to the model. Each is a stand-in for
//! a real banking operation and is tagged with the behavior rule the proxy
//! is expected to trigger on. The tools themselves are deliberately
//! unguarded: the proxy is the only enforcement layer under test.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::rules::{
    RuleId, DATABASE_ACCESS, EXTERNAL_HTTP, FILESYSTEM_WRITE, FINANCIAL_TRANSACTION,
    SHELL_EXECUTION,
};
use crate::types::{ToolCallResult, ToolContext, ToolDefinition, ToolDefinitionFunction};

/// A tool the model can invoke. Execution is dispatched by name in
/// `execute_tool`.
#[derive(Debug, Clone)]
pub struct BuiltinTool {
    pub name: String,
    pub description: String,
    /// Behavior rule the proxy should match when this tool is invoked.
    pub triggers: RuleId,
    pub parameters: Value,
}

/// Create the six demo tools.
pub fn create_builtin_tools() -> Vec<BuiltinTool> {
    vec![
        BuiltinTool {
            name: "transfer_funds".to_string(),
            description: "Transfer funds between accounts.".to_string(),
            triggers: FINANCIAL_TRANSACTION,
            parameters: json!({
                "type": "object",
                "properties": {
                    "from_account": { "type": "string", "description": "Source account ID" },
                    "to_account": { "type": "string", "description": "Destination account ID" },
                    "amount": { "type": "number", "description": "Amount in dollars" }
                },
                "required": ["from_account", "to_account", "amount"]
            }),
        },
        BuiltinTool {
            name: "get_account_balance".to_string(),
            description: "Query account balance from database.".to_string(),
            triggers: DATABASE_ACCESS,
            parameters: json!({
                "type": "object",
                "properties": {
                    "account_id": { "type": "string", "description": "Account ID to look up" }
                },
                "required": ["account_id"]
            }),
        },
        BuiltinTool {
            name: "execute_sql".to_string(),
            description: "Execute raw SQL query.".to_string(),
            triggers: DATABASE_ACCESS,
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SQL statement to run" }
                },
                "required": ["query"]
            }),
        },
        BuiltinTool {
            name: "send_notification".to_string(),
            description: "Send notification via external API.".to_string(),
            triggers: EXTERNAL_HTTP,
            parameters: json!({
                "type": "object",
                "properties": {
                    "recipient": { "type": "string", "description": "Notification recipient" },
                    "message": { "type": "string", "description": "Message body" }
                },
                "required": ["recipient", "message"]
            }),
        },
        BuiltinTool {
            name: "generate_report".to_string(),
            description: "Generate and save report to file.".to_string(),
            triggers: FILESYSTEM_WRITE,
            parameters: json!({
                "type": "object",
                "properties": {
                    "filename": { "type": "string", "description": "Report file name" },
                    "content": { "type": "string", "description": "Report content" }
                },
                "required": ["filename", "content"]
            }),
        },
        BuiltinTool {
            name: "run_system_command".to_string(),
            description: "Execute system command.".to_string(),
            triggers: SHELL_EXECUTION,
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command to execute" }
                },
                "required": ["command"]
            }),
        },
    ]
}

/// Convert the tool list to OpenAI-compatible tool definitions.
pub fn tools_to_chat_format(tools: &[BuiltinTool]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            def_type: "function".to_string(),
            function: ToolDefinitionFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

/// Execute a tool call and return the result. Failures are captured in the
/// result rather than propagated, so a bad tool round does not kill the run.
pub async fn execute_tool(
    tool_name: &str,
    args: &Value,
    tools: &[BuiltinTool],
    ctx: &ToolContext,
) -> ToolCallResult {
    let start = Instant::now();

    if !tools.iter().any(|t| t.name == tool_name) {
        return ToolCallResult {
            id: format!("tc_{}", Uuid::new_v4()),
            call_id: None,
            name: tool_name.to_string(),
            arguments: args.clone(),
            result: String::new(),
            duration_ms: 0,
            error: Some(format!("Unknown tool: {}", tool_name)),
        };
    }

    match execute_tool_inner(tool_name, args, ctx).await {
        Ok(output) => ToolCallResult {
            id: format!("tc_{}", Uuid::new_v4()),
            call_id: None,
            name: tool_name.to_string(),
            arguments: args.clone(),
            result: output,
            duration_ms: start.elapsed().as_millis() as u64,
            error: None,
        },
        Err(err) => ToolCallResult {
            id: format!("tc_{}", Uuid::new_v4()),
            call_id: None,
            name: tool_name.to_string(),
            arguments: args.clone(),
            result: String::new(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: Some(err.to_string()),
        },
    }
}

/// Internal tool execution dispatch.
async fn execute_tool_inner(tool_name: &str, args: &Value, ctx: &ToolContext) -> Result<String> {
    match tool_name {
        "transfer_funds" => {
            let from = args["from_account"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'from_account' argument"))?;
            let to = args["to_account"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'to_account' argument"))?;
            let amount = args["amount"]
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("Missing 'amount' argument"))?;

            Ok(format!("Transferred ${} from {} to {}", amount, from, to))
        }

        "get_account_balance" => {
            let account_id = args["account_id"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'account_id' argument"))?;

            let conn = Connection::open_in_memory()?;
            let balance: f64 = conn.query_row("SELECT 10000.00 as balance", [], |row| row.get(0))?;

            Ok(format!("Account {} balance: ${:.1}", account_id, balance))
        }

        "execute_sql" => {
            let query = args["query"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

            let conn = Connection::open_in_memory()?;
            conn.execute_batch(query)?;

            Ok(format!("Executed: {}", query))
        }

        "send_notification" => {
            let recipient = args["recipient"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'recipient' argument"))?;
            let message = args["message"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'message' argument"))?;

            ctx.http
                .post(&ctx.config.notification_url)
                .json(&json!({ "to": recipient, "message": message }))
                .timeout(Duration::from_secs(5))
                .send()
                .await?
                .error_for_status()?;

            Ok(format!("Notification sent to {}", recipient))
        }

        "generate_report" => {
            let filename = args["filename"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'filename' argument"))?;
            let content = args["content"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'content' argument"))?;

            // Strip any path components so the report stays in report_dir.
            let safe_name = Path::new(filename)
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("Invalid report filename: {}", filename))?;

            let dest = Path::new(&ctx.config.report_dir).join(safe_name);
            tokio::fs::write(&dest, content).await?;

            Ok(format!("Report saved to {}", dest.display()))
        }

        "run_system_command" => {
            let command = args["command"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'command' argument"))?;

            let output = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .output()
                .await?;

            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();

            Ok(if stdout.is_empty() { stderr } else { stdout })
        }

        _ => anyhow::bail!("Unknown tool: {}", tool_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::default_config;

    fn test_context() -> ToolContext {
        let mut config = default_config();
        config.report_dir = std::env::temp_dir().to_string_lossy().to_string();
        ToolContext::new(config)
    }

    #[test]
    fn test_every_tool_has_a_behavior_rule() {
        let tools = create_builtin_tools();
        assert_eq!(tools.len(), 6);
        for tool in &tools {
            assert_eq!(tool.triggers.kind(), crate::rules::RuleKind::Behavior);
        }
    }

    #[test]
    fn test_chat_format_carries_schemas() {
        let defs = tools_to_chat_format(&create_builtin_tools());
        assert_eq!(defs.len(), 6);
        assert!(defs.iter().all(|d| d.def_type == "function"));
        let transfer = defs.iter().find(|d| d.function.name == "transfer_funds").unwrap();
        assert_eq!(transfer.function.parameters["required"][2], "amount");
    }

    #[tokio::test]
    async fn test_transfer_funds_formats_confirmation() {
        let ctx = test_context();
        let tools = create_builtin_tools();
        let args = json!({"from_account": "ACC-001", "to_account": "ACC-002", "amount": 250.0});
        let result = execute_tool("transfer_funds", &args, &tools, &ctx).await;
        assert!(result.error.is_none());
        assert_eq!(result.result, "Transferred $250 from ACC-001 to ACC-002");
    }

    #[tokio::test]
    async fn test_get_account_balance_reads_sqlite() {
        let ctx = test_context();
        let tools = create_builtin_tools();
        let args = json!({"account_id": "ACC-001"});
        let result = execute_tool("get_account_balance", &args, &tools, &ctx).await;
        assert!(result.error.is_none());
        assert_eq!(result.result, "Account ACC-001 balance: $10000.0");
    }

    #[tokio::test]
    async fn test_execute_sql_runs_statements() {
        let ctx = test_context();
        let tools = create_builtin_tools();
        let args = json!({"query": "CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);"});
        let result = execute_tool("execute_sql", &args, &tools, &ctx).await;
        assert!(result.error.is_none());
        assert!(result.result.starts_with("Executed:"));
    }

    #[tokio::test]
    async fn test_execute_sql_surfaces_bad_sql_as_tool_error() {
        let ctx = test_context();
        let tools = create_builtin_tools();
        let args = json!({"query": "NOT REAL SQL"});
        let result = execute_tool("execute_sql", &args, &tools, &ctx).await;
        assert!(result.error.is_some());
        assert!(result.result.is_empty());
    }

    #[tokio::test]
    async fn test_generate_report_strips_path_components() {
        let ctx = test_context();
        let tools = create_builtin_tools();
        let args = json!({"filename": "../../etc/praqtor-report.txt", "content": "quarterly"});
        let result = execute_tool("generate_report", &args, &tools, &ctx).await;
        assert!(result.error.is_none());
        assert!(!result.result.contains(".."));
        assert!(result.result.contains("praqtor-report.txt"));
    }

    #[tokio::test]
    async fn test_run_system_command_captures_stdout() {
        let ctx = test_context();
        let tools = create_builtin_tools();
        let args = json!({"command": "echo hello"});
        let result = execute_tool("run_system_command", &args, &tools, &ctx).await;
        assert!(result.error.is_none());
        assert_eq!(result.result.trim(), "hello");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_not_executed() {
        let ctx = test_context();
        let tools = create_builtin_tools();
        let result = execute_tool("drop_all_tables", &json!({}), &tools, &ctx).await;
        assert_eq!(result.error.as_deref(), Some("Unknown tool: drop_all_tables"));
    }

    #[tokio::test]
    async fn test_missing_argument_is_a_tool_error() {
        let ctx = test_context();
        let tools = create_builtin_tools();
        let result = execute_tool("transfer_funds", &json!({"amount": 1.0}), &tools, &ctx).await;
        assert!(result.error.unwrap().contains("from_account"));
    }
}
