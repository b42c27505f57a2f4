use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_ENV: &str = "KUBEMEND_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubemendConfig {
    pub cluster: ClusterConfig,
    pub monitoring: MonitoringConfig,
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub namespaces: Vec<String>,
    pub interval_secs: u64,
    pub tail_lines: i64,
    pub manual_tail_lines: i64,
    pub auto_fix: bool,
    pub auto_apply: bool,
    pub events_limit: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            namespaces: vec!["default".to_string()],
            interval_secs: 30,
            tail_lines: 10,
            manual_tail_lines: 200,
            auto_fix: false,
            auto_apply: false,
            events_limit: 50,
        }
    }
}

impl MonitoringConfig {
    /// Pause between sweeps; a zero `interval_secs` is raised to one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama3-8b-8192".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl AssistantConfig {
    /// Read the credential from the environment variable named by `api_key_env`.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl KubemendConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// `$KUBEMEND_CONFIG_PATH`, then `~/.kubemend/config.yaml`, then `./kubemend-config.yaml`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }

        if let Ok(home) = env::var("HOME") {
            return Path::new(&home).join(".kubemend").join("config.yaml");
        }

        PathBuf::from("kubemend-config.yaml")
    }
}
