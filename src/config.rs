use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::usecase;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the inference server (default: "http://127.0.0.1:11434")
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Timeout for generation calls in seconds (default: 30)
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,

    /// Timeout for listing/connectivity calls in seconds (default: 5)
    #[serde(default = "default_tags_timeout")]
    pub tags_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            proxy: ProxyConfig::default(),
            chat_timeout_secs: default_chat_timeout(),
            tags_timeout_secs: default_tags_timeout(),
        }
    }
}

impl EndpointConfig {
    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn tags_timeout(&self) -> Duration {
        Duration::from_secs(self.tags_timeout_secs)
    }
}

/// Proxy URLs passed through to the HTTP layer unchanged.
/// When both are unset, the HTTP client falls back to the proxy environment
/// variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub http: Option<String>,
    #[serde(default)]
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Route both schemes through the same proxy.
    pub fn both(url: &str) -> Self {
        Self {
            http: Some(url.to_string()),
            https: Some(url.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Use case to run (default: "scheme-fibonacci")
    #[serde(default = "default_use_case")]
    pub use_case: String,

    /// Models to test, in order
    #[serde(default = "default_models")]
    pub models: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            use_case: default_use_case(),
            models: default_models(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Whether to run executable artifacts at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override the use case's interpreter (e.g. "/usr/local/bin/guile3.0")
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Wall-clock bound per harness run in seconds (default: 5)
    #[serde(default = "default_exec_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interpreter: None,
            timeout_secs: default_exec_timeout(),
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_host() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_chat_timeout() -> u64 {
    30
}

fn default_tags_timeout() -> u64 {
    5
}

fn default_use_case() -> String {
    usecase::SCHEME_FIBONACCI.to_string()
}

fn default_models() -> Vec<String> {
    [
        "codellama:latest",
        "phi3:latest",
        "llama3.2:latest",
        "llama3.1:latest",
        "zephyr:latest",
        "hf.co/MaziyarPanahi/Qwen2.5-7B-Instruct-abliterated-v2-GGUF:Q5_K_M",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_exec_timeout() -> u64 {
    crate::executor::DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load config from the working directory or user config directory
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Load configuration from a specific path, or use default search paths
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        // An explicit path must exist and parse
        if let Some(config_path) = path {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path)
                .with_context(|| format!("Failed to load config from {}", config_path));
        }

        if let Ok(config) = Self::load_from_path("schemacheck.toml") {
            debug!("Loaded config from ./schemacheck.toml");
            return Ok(config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("schemacheck").join("config.toml");
            if let Ok(config) = Self::load_from_path(&config_path) {
                debug!("Loaded config from {:?}", config_path);
                return Ok(config);
            }
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
