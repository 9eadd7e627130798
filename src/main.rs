//! PRAQTOR X Test Agent CLI
//!
//! Entry point for the TC-003 financial transfer agent. Runs the canned
//! scenario set against the policy proxy, or single prompts for ad-hoc
//! probing.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use praqtor_agent::agent::executor::AgentExecutor;
use praqtor_agent::agent::tools::create_builtin_tools;
use praqtor_agent::config::{get_config_path, load_or_default, resolve_path, save_config};
use praqtor_agent::harness::{self, find_scenario, test_scenarios, Expect};
use praqtor_agent::proxy::ProxyChatClient;
use praqtor_agent::state::Database;
use praqtor_agent::types::{AgentConfig, RunEnd};

const VERSION: &str = "0.1.0";

/// Base URL used with `--direct` to skip the enforcement layer.
const DIRECT_BASE_URL: &str = "https://api.openai.com";

/// PRAQTOR X Test Agent -- TC-003 Financial Transfer Agent
#[derive(Parser, Debug)]
#[command(
    name = "praqtor-agent",
    version = VERSION,
    about = "PRAQTOR X test agent -- demonstrates dual (behavior + prompt) protection",
    long_about = "Fires canned adversarial prompts at a toy financial agent whose model \
                  calls are routed through the PRAQTOR X policy-enforcement proxy."
)]
struct Cli {
    /// Run all five test scenarios and print the report
    #[arg(long)]
    run: bool,

    /// Write a default config file to ~/.praqtor-agent/agent.json
    #[arg(long)]
    init: bool,

    /// Run a single scenario by name
    #[arg(long)]
    scenario: Option<String>,

    /// Send an ad-hoc prompt through the agent
    #[arg(long)]
    prompt: Option<String>,

    /// List scenarios and the tool/rule matrix
    #[arg(long)]
    list: bool,

    /// Show config and recent recorded runs
    #[arg(long)]
    status: bool,

    /// Bypass the proxy and talk to the provider directly (control run)
    #[arg(long)]
    direct: bool,

    /// Override the configured model
    #[arg(long)]
    model: Option<String>,
}

fn build_executor(config: &AgentConfig) -> AgentExecutor {
    let client = Arc::new(ProxyChatClient::new(
        config.proxy_url.clone(),
        config.api_key.clone(),
        config.agent_id.clone(),
        config.model.clone(),
        config.max_tokens_per_turn,
    ));
    AgentExecutor::new(client, config.clone())
}

fn open_run_log(config: &AgentConfig) -> Option<Database> {
    let db_path = resolve_path(&config.db_path);
    match Database::open(&db_path) {
        Ok(db) => Some(db),
        Err(err) => {
            eprintln!("warning: run log unavailable ({err}); continuing without persistence");
            None
        }
    }
}

fn require_api_key(config: &AgentConfig) {
    if config.api_key.is_empty() {
        eprintln!("No API key found. Set OPENAI_API_KEY or add apiKey to {}.",
            get_config_path().display());
        std::process::exit(1);
    }
}

// ---- Commands ---------------------------------------------------------------

async fn run_all(config: AgentConfig) -> Result<bool> {
    require_api_key(&config);

    println!(
        "Agent {} -> {} (model {})",
        config.agent_id.bold(),
        config.proxy_url,
        config.model
    );

    let executor = build_executor(&config);
    let db = open_run_log(&config);

    let scenarios = test_scenarios();
    let results = harness::run_scenarios(&executor, db.as_ref(), &scenarios).await;
    Ok(harness::print_summary(&results))
}

async fn run_one(config: AgentConfig, name: &str) -> Result<bool> {
    require_api_key(&config);

    let Some(scenario) = find_scenario(name) else {
        eprintln!("Unknown scenario: {name}. Use --list to see the scenario set.");
        std::process::exit(1);
    };

    let executor = build_executor(&config);
    let db = open_run_log(&config);

    let results = harness::run_scenarios(&executor, db.as_ref(), &[scenario]).await;
    Ok(harness::print_summary(&results))
}

async fn run_prompt(config: AgentConfig, prompt: &str) -> Result<()> {
    require_api_key(&config);

    let executor = build_executor(&config);
    let db = open_run_log(&config);

    let run = executor.invoke(prompt).await;
    if let Some(db) = db.as_ref() {
        if let Err(err) = db.insert_run(&run, None) {
            tracing::warn!(error = %err, "failed to persist run");
        }
    }

    match &run.end {
        RunEnd::Completed => println!("{}: {}", "RESULT".green().bold(), run.final_text),
        RunEnd::Blocked { rule, message } => {
            let rule_str = rule.map(|r| format!(" [{r}]")).unwrap_or_default();
            println!("{}{}: {}", "BLOCKED".red().bold(), rule_str, message);
        }
        RunEnd::Failed { message } => println!("{}: {}", "ERROR".yellow().bold(), message),
    }

    for call in &run.tool_calls {
        println!("  tool {} -> {}", call.name,
            call.error.as_deref().unwrap_or(call.result.as_str()));
    }

    Ok(())
}

fn list_scenarios() {
    println!("Scenarios:");
    for s in test_scenarios() {
        let expected = match s.expect {
            Expect::Allowed => "allow".to_string(),
            Expect::Blocked(rule) => format!("block {rule}"),
        };
        println!("  {:<24} [{:<12}] {}", s.name, expected, s.prompt);
    }

    println!("\nTools and the behavior rules they trigger:");
    for tool in create_builtin_tools() {
        let label = tool.triggers.label().unwrap_or("-");
        println!("  {:<20} {} ({})", tool.name, tool.triggers, label);
    }
}

fn show_status(config: &AgentConfig) {
    println!(
        r#"
=== PRAQTOR AGENT STATUS ===
Agent ID:   {}
Proxy:      {}
Model:      {}
Config:     {}
DB Path:    {}
Version:    {}
============================"#,
        config.agent_id,
        config.proxy_url,
        config.model,
        get_config_path().display(),
        resolve_path(&config.db_path),
        config.version,
    );

    let db_path = resolve_path(&config.db_path);
    match Database::open(&db_path) {
        Ok(db) => {
            let count = db.run_count().unwrap_or(0);
            println!("Recorded runs: {count}");
            if let Ok(recent) = db.get_recent_runs(5) {
                for r in recent {
                    let rule = r.rule_id.as_deref().unwrap_or("-");
                    println!(
                        "  [{}] {:<8} {:<6} {}",
                        r.started_at,
                        r.outcome,
                        rule,
                        r.scenario.as_deref().unwrap_or("(ad-hoc)"),
                    );
                }
            }
        }
        Err(err) => println!("Run log unavailable: {err}"),
    }
}

// ---- Entry Point -----------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = load_or_default();
    if cli.direct {
        config.proxy_url = DIRECT_BASE_URL.to_string();
    }
    if let Some(model) = cli.model.clone() {
        config.model = model;
    }

    if cli.init {
        match save_config(&config) {
            Ok(()) => println!("Config written to {}", get_config_path().display()),
            Err(e) => {
                eprintln!("Init failed: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if cli.list {
        list_scenarios();
        return;
    }

    if cli.status {
        show_status(&config);
        return;
    }

    if let Some(ref prompt) = cli.prompt {
        if let Err(e) = run_prompt(config, prompt).await {
            eprintln!("Fatal: {e}");
            std::process::exit(1);
        }
        return;
    }

    if let Some(ref name) = cli.scenario {
        match run_one(config, name).await {
            Ok(true) => return,
            Ok(false) => std::process::exit(1),
            Err(e) => {
                eprintln!("Fatal: {e}");
                std::process::exit(1);
            }
        }
    }

    if cli.run {
        match run_all(config).await {
            Ok(true) => return,
            Ok(false) => std::process::exit(1),
            Err(e) => {
                eprintln!("Fatal: {e}");
                std::process::exit(1);
            }
        }
    }

    // Default: show help
    println!("Run \"praqtor-agent --help\" for usage information.");
    println!("Run \"praqtor-agent --run\" to fire the test scenarios.");
}
