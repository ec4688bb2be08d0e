//! Config loader — reads `~/.taskpilot/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.taskpilot/config.json`
//! 3. Environment variables `TASKPILOT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the given path (or the default one) + env vars.
///
/// Never fails: a missing, unreadable, or invalid file falls back to defaults.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;
    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Read `TASKPILOT_<key>` as a string.
fn env_string(key: &str) -> Option<String> {
    std::env::var(format!("TASKPILOT_{key}")).ok()
}

/// Read and parse `TASKPILOT_<key>`; unparsable values are ignored with a warning.
fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid value for TASKPILOT_{}: {}", key, raw);
            None
        }
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| v == "true" || v == "1")
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `TASKPILOT_<SECTION>__<FIELD>` (double underscore as delimiter),
/// e.g. `TASKPILOT_LLM__API_KEY`, `TASKPILOT_AGENT__MAX_STEPS`,
/// `TASKPILOT_SANDBOX__IMAGE`, `TASKPILOT_EVENTS__HEARTBEAT_SECS`.
fn apply_env_overrides(mut config: Config) -> Config {
    // Agent
    if let Some(n) = env_parsed("AGENT__MAX_STEPS") {
        config.agent.max_steps = n;
    }
    if let Some(n) = env_parsed("AGENT__MAX_OBSERVE") {
        config.agent.max_observe = n;
    }
    if let Some(b) = env_bool("AGENT__SHOULD_PLAN") {
        config.agent.should_plan = b;
    }
    if let Some(v) = env_string("AGENT__LANGUAGE") {
        config.agent.language = Some(v);
    }
    if let Some(n) = env_parsed("AGENT__TOOL_TIMEOUT_SECS") {
        config.agent.tool_timeout_secs = Some(n);
    }

    // LLM
    if let Some(v) = env_string("LLM__MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = env_string("LLM__API_KEY") {
        config.llm.api_key = v;
    }
    if let Some(v) = env_string("LLM__API_BASE") {
        config.llm.api_base = Some(v);
    }
    if let Some(n) = env_parsed("LLM__MAX_TOKENS") {
        config.llm.max_tokens = n;
    }
    if let Some(t) = env_parsed("LLM__TEMPERATURE") {
        config.llm.temperature = t;
    }
    if let Some(n) = env_parsed("LLM__MAX_INPUT_TOKENS") {
        config.llm.max_input_tokens = Some(n);
    }

    // Sandbox
    if let Some(v) = env_string("SANDBOX__IMAGE") {
        config.sandbox.image = v;
    }
    if let Some(v) = env_string("SANDBOX__HOST_WORKSPACE_ROOT") {
        config.sandbox.host_workspace_root = v;
    }
    if let Some(v) = env_string("SANDBOX__MEMORY_LIMIT") {
        config.sandbox.memory_limit = v;
    }
    if let Some(c) = env_parsed("SANDBOX__CPU_LIMIT") {
        config.sandbox.cpu_limit = c;
    }
    if let Some(b) = env_bool("SANDBOX__NETWORK_ENABLED") {
        config.sandbox.network_enabled = b;
    }
    if let Some(n) = env_parsed("SANDBOX__COMMAND_TIMEOUT_SECS") {
        config.sandbox.command_timeout_secs = n;
    }

    // Events
    if let Some(n) = env_parsed("EVENTS__QUEUE_CAPACITY") {
        config.events.queue_capacity = n;
    }
    if let Some(n) = env_parsed("EVENTS__HEARTBEAT_SECS") {
        config.events.heartbeat_secs = n;
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
