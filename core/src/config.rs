// Flowgraph configuration
//
// Defaults, overridden by environment variables, overridden by an optional
// TOML file (path via FLOWGRAPH_CONFIG or ./flowgraph.toml).

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

const DEFAULT_AGENT_URL: &str = "http://127.0.0.1:12345";
const DEFAULT_WINDOW_SECONDS: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("window must be at least 1 second")]
    ZeroWindow,

    #[error("agent URL must not be empty")]
    EmptyAgentUrl,

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Connection and overlay settings for one graph view
#[derive(Clone, Debug, PartialEq)]
pub struct FlowgraphConfig {
    /// Base URL of the agent's HTTP server
    pub agent_url: String,
    /// Module whose subgraph is shown; `Some("")` is the root module
    pub module_scope: Option<String>,
    /// Server-side aggregation window
    pub window_seconds: u32,
    /// Timeout for topology requests. The live stream is not bounded by it.
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub user_agent: String,
    /// Whether the live overlay starts enabled
    pub enabled: bool,
    /// List components of the remotely managed configuration instead of the local one
    pub remotecfg: bool,
}

impl Default for FlowgraphConfig {
    fn default() -> Self {
        Self {
            agent_url: DEFAULT_AGENT_URL.to_string(),
            module_scope: Some(String::new()),
            window_seconds: DEFAULT_WINDOW_SECONDS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            user_agent: format!("flowgraph/{}", env!("CARGO_PKG_VERSION")),
            enabled: true,
            remotecfg: false,
        }
    }
}

/// Partial TOML overlay; every field is optional
#[derive(Debug, Default, Deserialize)]
struct FlowgraphToml {
    agent_url: Option<String>,
    module: Option<String>,
    window_seconds: Option<u32>,
    request_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    user_agent: Option<String>,
    live: Option<bool>,
    remotecfg: Option<bool>,
}

impl FlowgraphToml {
    fn overlay(self, mut base: FlowgraphConfig) -> FlowgraphConfig {
        if let Some(v) = self.agent_url {
            base.agent_url = v;
        }
        if let Some(v) = self.module {
            base.module_scope = Some(v);
        }
        if let Some(v) = self.window_seconds {
            base.window_seconds = v;
        }
        if let Some(v) = self.request_timeout_ms {
            base.request_timeout_ms = v;
        }
        if let Some(v) = self.connect_timeout_ms {
            base.connect_timeout_ms = v;
        }
        if let Some(v) = self.user_agent {
            base.user_agent = v;
        }
        if let Some(v) = self.live {
            base.enabled = v;
        }
        if let Some(v) = self.remotecfg {
            base.remotecfg = v;
        }
        base
    }
}

impl FlowgraphConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(url) = env_non_empty("FLOWGRAPH_AGENT_URL") {
            cfg.agent_url = url;
        }
        if let Ok(module) = std::env::var("FLOWGRAPH_MODULE") {
            cfg.module_scope = Some(module);
        }
        if let Some(window) = env_parse("FLOWGRAPH_WINDOW_SECONDS") {
            cfg.window_seconds = window;
        }
        if let Some(timeout) = env_parse("FLOWGRAPH_REQUEST_TIMEOUT_MS") {
            cfg.request_timeout_ms = timeout;
        }
        if let Some(live) = env_parse("FLOWGRAPH_LIVE") {
            cfg.enabled = live;
        }
        if let Some(remotecfg) = env_parse("FLOWGRAPH_REMOTECFG") {
            cfg.remotecfg = remotecfg;
        }
        cfg
    }

    /// Environment-driven defaults with the TOML file (if any) overlaid, validated.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("FLOWGRAPH_CONFIG").unwrap_or_else(|_| "flowgraph.toml".to_string());
        let base = Self::from_env();
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "config", path = %path, "No TOML config found; using defaults/env");
            base.validate()?;
            return Ok(base);
        }
        Self::from_file(p, base)
    }

    /// Overlay the TOML file at `path` onto `base`
    pub fn from_file(path: &Path, base: Self) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let cfg = Self::from_toml_str(&text, base).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        tracing::info!(target: "config", path = %shown, "Loaded TOML config");
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_toml_str(text: &str, base: Self) -> Result<Self, toml::de::Error> {
        let overlay: FlowgraphToml = toml::from_str(text)?;
        Ok(overlay.overlay(base))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.agent_url.trim().is_empty() {
            return Err(ConfigError::EmptyAgentUrl);
        }
        Ok(())
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
