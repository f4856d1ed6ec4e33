// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Daemon configuration: a TOML file merged with environment overrides.
//!
//! Load order (spec §2 ambient additions): defaults, then the TOML file at
//! `PM_CONFIG` (or `~/.config/project-m/daemon.toml`) if it exists, then
//! individual `PM_*` environment variables. A missing file is not an error.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("could not determine home directory for default config path")]
    NoHomeDir,
}

/// On-disk shape of `daemon.toml`. Every field is optional: absence means
/// "use the built-in default", same as an absent env var.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    listen_addr: Option<String>,
    workspaces_root: Option<PathBuf>,
    hook_token: Option<String>,
    operator_token: Option<String>,
    hook_timeout_secs: Option<u64>,
    shallow_clone: Option<bool>,
    clone_timeout_secs: Option<u64>,
    agent_command: Option<String>,
    agent_args: Option<Vec<String>>,
    approval_tools: Option<Vec<String>>,
    input_tools: Option<Vec<String>>,
    strip_env: Option<Vec<String>>,
    escalation_offsets_secs: Option<Vec<u64>>,
    log_path: Option<PathBuf>,
}

/// Fully resolved daemon configuration, consumed by `main` to build the
/// kernel and the HTTP transport.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP+WebSocket server binds to. Local-only by default
    /// (spec §9 design note: the hook endpoint and operator API are not
    /// meant to be reachable off-box without a reverse proxy).
    pub listen_addr: String,
    /// Root directory under which each run gets its own workspace directory.
    pub workspaces_root: PathBuf,
    /// Bearer token the hook script must present at
    /// `POST /api/internal/interaction-request`.
    pub hook_token: String,
    /// Bearer token operator clients (`pm-cli`, dashboards) must present on
    /// every other route.
    pub operator_token: Option<String>,
    /// Deadline a blocked hook request waits before the Interaction
    /// Coordinator resolves it as a timeout (spec §4.6, §9 Open Question).
    pub hook_timeout: Duration,
    pub shallow_clone: bool,
    pub clone_timeout: Duration,
    pub agent_command: String,
    pub agent_args: Vec<String>,
    pub approval_tools: Vec<String>,
    pub input_tools: Vec<String>,
    /// Credential-bearing env vars stripped from the agent subprocess's
    /// inherited environment (spec §4.4).
    pub strip_env: Vec<String>,
    /// Escalation Tracker notification tier offsets, capped at 3 (spec §4.8).
    pub escalation_offsets: Vec<Duration>,
    pub log_path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            listen_addr: None,
            workspaces_root: None,
            hook_token: None,
            operator_token: None,
            hook_timeout_secs: None,
            shallow_clone: None,
            clone_timeout_secs: None,
            agent_command: None,
            agent_args: None,
            approval_tools: None,
            input_tools: None,
            strip_env: None,
            escalation_offsets_secs: None,
            log_path: None,
        }
    }
}

impl Config {
    /// Resolve the config file path: `PM_CONFIG` if set, else
    /// `~/.config/project-m/daemon.toml`.
    fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("PM_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoHomeDir)?;
        Ok(PathBuf::from(home).join(".config/project-m/daemon.toml"))
    }

    /// Load the file (if present), then layer environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        let file = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.clone(), source })?
        } else {
            FileConfig::default()
        };

        let state_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("project-m");

        Ok(Self {
            listen_addr: env_string("PM_LISTEN_ADDR")
                .or(file.listen_addr)
                .unwrap_or_else(|| "127.0.0.1:4777".to_string()),
            workspaces_root: env_string("PM_WORKSPACES_ROOT")
                .map(PathBuf::from)
                .or(file.workspaces_root)
                .unwrap_or_else(|| state_dir.join("workspaces")),
            hook_token: env_string("PM_HOOK_TOKEN").or(file.hook_token).unwrap_or_default(),
            operator_token: env_string("PM_OPERATOR_TOKEN").or(file.operator_token),
            hook_timeout: env_secs("PM_HOOK_TIMEOUT_SECS")
                .or(file.hook_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(300)),
            shallow_clone: file.shallow_clone.unwrap_or(true),
            clone_timeout: file
                .clone_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(60)),
            agent_command: file.agent_command.unwrap_or_else(|| "claude".to_string()),
            agent_args: file.agent_args.unwrap_or_default(),
            approval_tools: file
                .approval_tools
                .unwrap_or_else(|| vec!["Bash".to_string(), "Edit".to_string(), "Write".to_string()]),
            input_tools: file.input_tools.unwrap_or_else(|| vec!["AskUser".to_string()]),
            strip_env: file
                .strip_env
                .unwrap_or_else(|| vec!["ANTHROPIC_API_KEY".to_string(), "OPENAI_API_KEY".to_string()]),
            escalation_offsets: file
                .escalation_offsets_secs
                .unwrap_or_else(|| vec![0, 900, 3600])
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            log_path: file.log_path.unwrap_or_else(|| state_dir.join("daemon.log")),
        })
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_secs(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_defaults_to_all_absent() {
        let f = FileConfig::default();
        assert!(f.listen_addr.is_none());
        assert!(f.hook_timeout_secs.is_none());
    }

    #[test]
    fn env_secs_ignores_unparseable_values() {
        std::env::set_var("PM_TEST_BOGUS_SECS", "not-a-number");
        assert_eq!(env_secs("PM_TEST_BOGUS_SECS"), None);
        std::env::remove_var("PM_TEST_BOGUS_SECS");
    }
}
