//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.scene-relay/config.json`) and environment.
//! Every field has a default, so a missing file or `{}` yields a working relay.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Env var overriding the listen port.
pub const PORT_ENV: &str = "RELAY_PORT";
/// Port variable read by earlier deployments of the relay; used when RELAY_PORT is unset.
pub const LEGACY_PORT_ENV: &str = "FASTAPI_PORT";
/// Env var overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG_PATH";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Relay server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Listener bind, port, and WebSocket path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for HTTP and WebSocket (default 8000). Overridden by RELAY_PORT (or FASTAPI_PORT) env.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,

    /// WebSocket route (default "/ws").
    #[serde(default = "default_ws_path")]
    pub path: String,
}

fn default_port() -> u16 {
    8000
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            path: default_ws_path(),
        }
    }
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Parse a port override read from `var`; blank or invalid values yield None.
fn parse_port(var: &str, value: &str) -> Option<u16> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    match v.parse::<u16>() {
        Ok(p) => Some(p),
        Err(_) => {
            log::warn!("ignoring invalid {} value: {:?}", var, v);
            None
        }
    }
}

fn env_port(var: &str) -> Option<u16> {
    std::env::var(var).ok().and_then(|v| parse_port(var, &v))
}

/// Apply environment overrides on top of the file config: RELAY_PORT, else FASTAPI_PORT.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(port) = env_port(PORT_ENV).or_else(|| env_port(LEGACY_PORT_ENV)) {
        config.server.port = port;
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".scene-relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or RELAY_CONFIG_PATH / default). Missing file => default config.
/// Environment overrides are applied after the file is read.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_env_overrides(&mut config);
    Ok((config, path))
}
