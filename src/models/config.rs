//! Configuration for the served language models
//!
//! This is the `[models]` section of `config.toml`: which vector file backs
//! each language, which language is the default, and how unknown words are
//! answered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::loaders::VectorFormat;
use crate::models::{VectorError, VectorResult};

/// How a lookup answers a word missing from the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownWordPolicy {
    /// Map the word to `null`
    #[default]
    Null,
    /// Map the word to a random vector scaled to the store's mean norm
    Fallback,
    /// Leave the word out of the response
    Omit,
}

impl FromStr for UnknownWordPolicy {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "null" | "none" => Ok(UnknownWordPolicy::Null),
            "fallback" | "random" => Ok(UnknownWordPolicy::Fallback),
            "omit" | "skip" => Ok(UnknownWordPolicy::Omit),
            other => Err(VectorError::ConfigError {
                message: format!("Unknown word policy '{}' (expected null, fallback or omit)", other),
            }),
        }
    }
}

/// Vector source for one language
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LanguageConfig {
    /// Path of the vector file
    pub path: String,
    /// File format; detected from the path when absent
    #[serde(default)]
    pub format: Option<VectorFormat>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl LanguageConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ModelsConfig {
    /// Language served when a request names none
    #[serde(default)]
    pub default_language: Option<String>,
    /// Answer for out-of-vocabulary words
    #[serde(default)]
    pub unknown_words: UnknownWordPolicy,
    /// Look up tokens that parse as numbers under the `NUM` key
    #[serde(default)]
    pub normalize_numbers: bool,
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageConfig>,
}

impl ModelsConfig {
    /// Load configuration from string
    pub fn from_str(content: &str) -> VectorResult<Self> {
        let config: ModelsConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// All enabled languages, in name order
    pub fn enabled_languages(&self) -> Vec<(&str, &LanguageConfig)> {
        self.languages
            .iter()
            .filter(|(_, language)| language.enabled)
            .map(|(name, language)| (name.as_str(), language))
            .collect()
    }

    pub fn get_language(&self, name: &str) -> Option<&LanguageConfig> {
        self.languages.get(name)
    }

    /// Default language: the configured one, or the only enabled language
    pub fn resolved_default_language(&self) -> Option<String> {
        if let Some(language) = &self.default_language {
            return Some(language.clone());
        }
        match self.enabled_languages().as_slice() {
            [(name, _)] => Some(name.to_string()),
            _ => None,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> VectorResult<()> {
        if self.enabled_languages().is_empty() {
            return Err(VectorError::ConfigError {
                message: "No enabled languages configured".to_string(),
            });
        }

        if let Some(default_language) = &self.default_language {
            match self.languages.get(default_language) {
                None => {
                    return Err(VectorError::ConfigError {
                        message: format!("Default language '{}' not found in languages", default_language),
                    });
                }
                Some(language) if !language.enabled => {
                    return Err(VectorError::ConfigError {
                        message: format!("Default language '{}' is not enabled", default_language),
                    });
                }
                Some(_) => {}
            }
        }

        for (name, language) in &self.languages {
            if language.path.trim().is_empty() {
                return Err(VectorError::ConfigError {
                    message: format!("Language '{}' has an empty vector path", name),
                });
            }
        }

        Ok(())
    }
}
