//! Configuration – reads/writes `~/.gcs/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted configuration stored in `~/.gcs/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket URL of the vision pipeline.
    #[serde(default = "default_perception_url")]
    pub perception_url: String,

    /// WebSocket URL of the experiment's logging server.
    #[serde(default = "default_game_url")]
    pub game_url: String,

    /// Port the status WebSocket server listens on.
    #[serde(default = "default_status_port")]
    pub status_port: u16,

    /// Condition to activate at startup (`ryan`, `ivan`, or `carl`).
    /// Absent means the session starts with every toggle off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_condition: Option<String>,
}

fn default_perception_url() -> String {
    "ws://127.0.0.1:8766".to_string()
}
fn default_game_url() -> String {
    "ws://127.0.0.1:8765".to_string()
}
fn default_status_port() -> u16 {
    8787
}

impl Default for Config {
    fn default() -> Self {
        Self {
            perception_url: default_perception_url(),
            game_url: default_game_url(),
            status_port: default_status_port(),
            initial_condition: None,
        }
    }
}

/// Return the path to `~/.gcs/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gcs").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `GCS_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `GCS_PERCEPTION_URL` | `perception_url` |
/// | `GCS_GAME_URL` | `game_url` |
/// | `GCS_STATUS_PORT` | `status_port` |
/// | `GCS_CONDITION` | `initial_condition` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("GCS_PERCEPTION_URL") {
        cfg.perception_url = v;
    }
    if let Ok(v) = std::env::var("GCS_GAME_URL") {
        cfg.game_url = v;
    }
    if let Ok(v) = std::env::var("GCS_STATUS_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.status_port = port;
    }
    if let Ok(v) = std::env::var("GCS_CONDITION") {
        cfg.initial_condition = Some(v);
    }
}

/// Save the config to disk, creating `~/.gcs/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
