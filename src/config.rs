//! Agent Configuration
//!
//! Loads and saves the harness configuration from `~/.praqtor-agent/agent.json`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::types::{default_config, AgentConfig};

/// Config file name within the agent directory.
const CONFIG_FILENAME: &str = "agent.json";

/// Returns the agent's config directory: `~/.praqtor-agent`.
pub fn get_agent_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/root"))
        .join(".praqtor-agent")
}

/// Returns the full path to the config file: `~/.praqtor-agent/agent.json`.
pub fn get_config_path() -> PathBuf {
    get_agent_dir().join(CONFIG_FILENAME)
}

/// Load the agent config from disk.
///
/// Reads `~/.praqtor-agent/agent.json`, merges missing fields with defaults,
/// and falls back to the `OPENAI_API_KEY` environment variable if the file
/// does not specify `apiKey`.
///
/// Returns `None` if the config file does not exist or cannot be parsed.
pub fn load_config() -> Option<AgentConfig> {
    let config_path = get_config_path();
    if !config_path.exists() {
        return None;
    }

    let contents = fs::read_to_string(&config_path).ok()?;
    let mut config: AgentConfig = serde_json::from_str(&contents).ok()?;
    Some(apply_defaults(&mut config).clone())
}

/// Load the config file if present, otherwise start from defaults. Either
/// way the API key falls back to the environment.
pub fn load_or_default() -> AgentConfig {
    load_config().unwrap_or_else(|| {
        let mut config = default_config();
        apply_defaults(&mut config).clone()
    })
}

fn apply_defaults(config: &mut AgentConfig) -> &mut AgentConfig {
    let defaults = default_config();

    if config.agent_id.is_empty() {
        config.agent_id = defaults.agent_id;
    }
    if config.proxy_url.is_empty() {
        config.proxy_url = defaults.proxy_url;
    }
    if config.model.is_empty() {
        config.model = defaults.model;
    }
    if config.max_tokens_per_turn == 0 {
        config.max_tokens_per_turn = defaults.max_tokens_per_turn;
    }
    if config.db_path.is_empty() {
        config.db_path = defaults.db_path;
    }
    if config.report_dir.is_empty() {
        config.report_dir = defaults.report_dir;
    }
    if config.notification_url.is_empty() {
        config.notification_url = defaults.notification_url;
    }
    if config.version.is_empty() {
        config.version = defaults.version;
    }

    if config.api_key.is_empty() {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.api_key = key;
        }
    }

    config
}

/// Save the agent config to disk at `~/.praqtor-agent/agent.json`.
///
/// Creates the agent directory with mode 0o700 if it does not exist.
/// The config file is written with mode 0o600 since it may contain API keys.
pub fn save_config(config: &AgentConfig) -> Result<()> {
    let dir = get_agent_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create agent directory")?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
    }

    let config_path = get_config_path();
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(&config_path, &json).context("Failed to write config file")?;
    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

/// Resolve a path that may start with `~` to an absolute path.
pub fn resolve_path(p: &str) -> String {
    if let Some(rest) = p.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        home.join(rest).to_string_lossy().to_string()
    } else {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;

    #[test]
    fn test_resolve_path_with_tilde() {
        let resolved = resolve_path("~/some/path");
        assert!(!resolved.starts_with('~'));
        assert!(resolved.ends_with("some/path"));
    }

    #[test]
    fn test_resolve_path_without_tilde() {
        let path = "/absolute/path/to/file";
        assert_eq!(resolve_path(path), path);
    }

    #[test]
    fn test_defaults_match_original_fixture() {
        let config = default_config();
        assert_eq!(config.agent_id, "financial_transfer_agent");
        assert_eq!(config.proxy_url, "https://praqtorx-proxy.fly.dev");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.report_dir, "/tmp");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_apply_defaults_fills_empty_fields() {
        let mut config = default_config();
        config.model = String::new();
        config.proxy_url = String::new();
        apply_defaults(&mut config);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.proxy_url, "https://praqtorx-proxy.fly.dev");
    }
}
