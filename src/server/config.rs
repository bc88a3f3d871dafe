//! Word Vector Server Configuration
//!
//! Read from `config.toml`, then overridden by the `W2V_*` environment
//! variables the service has always honoured.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use crate::models::{LanguageConfig, ModelsConfig, VectorError, VectorResult};

/// Path of the vector file for the default language
pub const ENV_VECTOR_FILE: &str = "W2V_VECTOR_FILE";
/// Prefix of per-language vector files, e.g. `W2V_VECTOR_FILE_DE`
pub const ENV_VECTOR_FILE_PREFIX: &str = "W2V_VECTOR_FILE_";
pub const ENV_SERVER_PORT: &str = "W2V_SERVER_PORT";
pub const ENV_DEFAULT_LANGUAGE: &str = "W2V_DEFAULT_LANGUAGE";
pub const ENV_UNKNOWN_WORDS: &str = "W2V_UNKNOWN_WORDS";
pub const ENV_NORMALIZE_NUMBERS: &str = "W2V_NORMALIZE_NUMBERS";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    /// Log timings for every request
    pub enable_detailed_logging: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9090".to_string(),
            max_body_bytes: 5242880,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_detailed_logging: false,
        }
    }
}

impl MonitoringConfig {
    /// Default `EnvFilter` directive for `log_level`; unknown levels mean info
    pub fn log_filter(&self) -> &'static str {
        match self.log_level.to_lowercase().as_str() {
            "trace" => "word_vector_server=trace,trace",
            "debug" => "word_vector_server=debug,debug",
            "warn" => "word_vector_server=warn,warn",
            "error" => "word_vector_server=error,error",
            _ => "word_vector_server=info,info",
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> VectorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> VectorResult<Self> {
        let config: ServerConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `path` if it exists (defaults otherwise), apply the process
    /// environment and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> VectorResult<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        let vars: HashMap<String, String> = std::env::vars().collect();
        config.apply_env(&vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `W2V_*` overrides from `vars`
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> VectorResult<()> {
        if let Some(language) = vars.get(ENV_DEFAULT_LANGUAGE) {
            self.models.default_language = Some(language.clone());
        }

        if let Some(port) = vars.get(ENV_SERVER_PORT) {
            let port: u16 = port.trim().parse().map_err(|_| VectorError::ConfigError {
                message: format!("{} must be a port number, got '{}'", ENV_SERVER_PORT, port),
            })?;
            let mut addr = self.bind_addr()?;
            addr.set_port(port);
            self.network.bind_address = addr.to_string();
        }

        if let Some(policy) = vars.get(ENV_UNKNOWN_WORDS) {
            self.models.unknown_words = policy.parse()?;
        }

        if let Some(flag) = vars.get(ENV_NORMALIZE_NUMBERS) {
            self.models.normalize_numbers = parse_flag(ENV_NORMALIZE_NUMBERS, flag)?;
        }

        for (key, path) in vars {
            if let Some(language) = key.strip_prefix(ENV_VECTOR_FILE_PREFIX) {
                if !language.is_empty() {
                    self.set_language_path(&language.to_lowercase(), path);
                }
            }
        }

        if let Some(path) = vars.get(ENV_VECTOR_FILE) {
            let language = self
                .models
                .resolved_default_language()
                .unwrap_or_else(|| "en".to_string());
            self.set_language_path(&language, path);
        }

        Ok(())
    }

    fn set_language_path(&mut self, language: &str, path: &str) {
        let entry = self
            .models
            .languages
            .entry(language.to_string())
            .or_insert_with(|| LanguageConfig::new(path));
        if entry.path != path {
            entry.path = path.to_string();
            entry.format = None;
        }
        entry.enabled = true;
    }

    pub fn bind_addr(&self) -> VectorResult<SocketAddr> {
        self.network
            .bind_address
            .parse()
            .map_err(|_| VectorError::ConfigError {
                message: format!("Invalid bind address '{}'", self.network.bind_address),
            })
    }

    pub fn validate(&self) -> VectorResult<()> {
        self.bind_addr()?;
        self.models.validate()
    }
}

fn parse_flag(key: &str, value: &str) -> VectorResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(VectorError::ConfigError {
            message: format!("{} must be true or false, got '{}'", key, value),
        }),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut models = ModelsConfig::default();
        models.languages.insert(
            "en".to_string(),
            LanguageConfig::new("/datasets/GoogleNews-vectors-negative300.bin"),
        );

        Self {
            network: NetworkConfig::default(),
            models,
            monitoring: MonitoringConfig::default(),
        }
    }
}
