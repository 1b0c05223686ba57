use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

const DEFAULT_ALLOWED_LIBRARIES: &[&str] = &[
    "requests",
    "bs4",
    "pandas",
    "numpy",
    "matplotlib",
    "io",
    "base64",
    "json",
    "os",
    "sys",
    "re",
];

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalystConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_inference_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_script_name")]
    pub script_name: String,
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_max_code_chars")]
    pub max_code_chars: usize,
    #[serde(default)]
    pub accept_empty_output: bool,
    #[serde(default = "default_allowed_libraries")]
    pub allowed_libraries: Vec<String>,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

/// Values supplied on the command line or through the environment. These win
/// over anything read from the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub inference_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_dir: Option<String>,
}

/// Command-line / environment flags shared by every binary.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Path to a JSON config file
    #[arg(long, env = "ANALYST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the chat-completions service
    #[arg(long, env = "ANALYST_INFERENCE_URL")]
    pub inference_url: Option<String>,

    /// Bearer token for the chat-completions service
    #[arg(long, env = "ANALYST_INFERENCE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name sent with every completion request
    #[arg(long, env = "ANALYST_INFERENCE_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "ANALYST_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "ANALYST_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "ANALYST_LOG_DIR")]
    pub log_dir: Option<String>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<AnalystConfig> {
        AnalystConfig::resolve(self.config.as_deref(), self.overrides())
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            inference_url: self.inference_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            host: self.host.clone(),
            port: self.port,
            log_dir: self.log_dir.clone(),
        }
    }
}

impl AnalystConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config at {}: {}", path.display(), e))?;
        let config: AnalystConfig = serde_json::from_str(&data)
            .map_err(|e| anyhow!("Failed to parse config JSON at {}: {}", path.display(), e))?;
        Ok(config.normalized())
    }

    /// Resolve the process-wide configuration: defaults, then the optional
    /// config file, then explicit overrides.
    pub fn resolve(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(overrides).normalized())
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(url) = overrides.inference_url {
            self.inference.url = Some(url);
        }
        if let Some(key) = overrides.api_key {
            self.inference.api_key = Some(key);
        }
        if let Some(model) = overrides.model {
            self.inference.model = model;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_dir) = overrides.log_dir {
            self.server.log_dir = log_dir;
        }
        self
    }

    fn normalized(mut self) -> Self {
        self.server.host = non_empty_or(self.server.host.trim(), default_host);
        self.server.log_dir = non_empty_or(self.server.log_dir.trim(), default_log_dir);

        self.inference.url = trimmed_option(self.inference.url)
            .map(|url| url.trim_end_matches('/').to_string());
        self.inference.api_key = trimmed_option(self.inference.api_key);
        self.inference.model = non_empty_or(self.inference.model.trim(), default_model);
        if self.inference.timeout_secs == 0 {
            self.inference.timeout_secs = default_inference_timeout_secs();
        }

        let exec = &mut self.execution;
        exec.interpreter = non_empty_or(exec.interpreter.trim(), default_interpreter);
        exec.script_name = non_empty_or(exec.script_name.trim(), default_script_name);
        if exec.script_timeout_secs == 0 {
            exec.script_timeout_secs = default_script_timeout_secs();
        }
        exec.max_attempts = exec.max_attempts.max(1);
        exec.allowed_libraries = exec
            .allowed_libraries
            .iter()
            .map(|lib| lib.trim().to_string())
            .filter(|lib| !lib.is_empty())
            .collect();
        if exec.allowed_libraries.is_empty() {
            exec.allowed_libraries = default_allowed_libraries();
        }
        self
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ExecutionConfig {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            model: default_model(),
            timeout_secs: default_inference_timeout_secs(),
            temperature: 0.0,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script_name: default_script_name(),
            script_timeout_secs: default_script_timeout_secs(),
            max_attempts: default_max_attempts(),
            max_code_chars: default_max_code_chars(),
            accept_empty_output: false,
            allowed_libraries: default_allowed_libraries(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

fn trimmed_option(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty_or(value: &str, fallback: fn() -> String) -> String {
    if value.is_empty() {
        fallback()
    } else {
        value.to_string()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_log_dir() -> String {
    "/tmp/analyst/logs".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_inference_timeout_secs() -> u64 {
    60
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_name() -> String {
    "task_script.py".to_string()
}

fn default_script_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_code_chars() -> usize {
    4000
}

fn default_max_image_bytes() -> usize {
    100_000
}

fn default_allowed_libraries() -> Vec<String> {
    DEFAULT_ALLOWED_LIBRARIES
        .iter()
        .map(|lib| lib.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = AnalystConfig::default();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.inference.model, "gpt-4o-mini");
        assert_eq!(config.inference.url, None);
        assert_eq!(config.execution.max_attempts, 3);
        assert_eq!(config.execution.max_code_chars, 4000);
        assert_eq!(config.execution.script_timeout(), Duration::from_secs(120));
        assert!(!config.execution.accept_empty_output);
        assert!(config
            .execution
            .allowed_libraries
            .iter()
            .any(|lib| lib == "pandas"));
    }

    #[test]
    fn file_values_are_normalized() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "inference": {{ "url": " https://proxy.example.com/ ", "api_key": "  " }},
                "execution": {{ "max_attempts": 0, "interpreter": "" }}
            }}"#
        )
        .unwrap();

        let config = AnalystConfig::load_from_path(file.path()).unwrap();
        assert_eq!(
            config.inference.url.as_deref(),
            Some("https://proxy.example.com")
        );
        assert_eq!(config.inference.api_key, None);
        assert_eq!(config.execution.max_attempts, 1);
        assert_eq!(config.execution.interpreter, "python3");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "inference": {{ "url": "http://from-file", "model": "file-model" }} }}"#
        )
        .unwrap();

        let overrides = ConfigOverrides {
            inference_url: Some("http://from-env/".to_string()),
            port: Some(8181),
            ..Default::default()
        };
        let config = AnalystConfig::resolve(Some(file.path()), overrides).unwrap();
        assert_eq!(config.inference.url.as_deref(), Some("http://from-env"));
        assert_eq!(config.inference.model, "file-model");
        assert_eq!(config.server.port, 8181);
    }

    #[test]
    fn args_without_file_use_defaults_plus_flags() {
        let args = ConfigArgs {
            inference_url: Some("http://localhost:8080".to_string()),
            model: Some("local-model".to_string()),
            ..Default::default()
        };
        let config = args.load().unwrap();
        assert_eq!(config.inference.url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.inference.model, "local-model");
        assert_eq!(config.execution.interpreter, "python3");
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = AnalystConfig::load_from_path(Path::new("/nonexistent/analyst.json"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("/nonexistent/analyst.json"));
    }
}
