//! Word vector models
//!
//! Loaded embedding stores, the per-language registry that serves them,
//! and the generator used for out-of-vocabulary words.

pub mod config;
pub mod fallback;
pub mod registry;
pub mod store;

// Re-exports
pub use config::{LanguageConfig, ModelsConfig, UnknownWordPolicy};
pub use fallback::FallbackVectorGenerator;
pub use registry::ModelRegistry;
pub use store::{EmbeddingStore, StoreInfo};

/// Word vector type
pub type Vector = Vec<f32>;

/// Result type for word vector operations
pub type VectorResult<T> = Result<T, VectorError>;

/// Errors that can occur while loading or serving word vectors
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("No model loaded for language '{language}'")]
    NotLoaded { language: String },

    #[error("Failed to load vectors from {source_path}: {error}")]
    LoadError { source_path: String, error: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("IO error: {error}")]
    IoError { error: std::io::Error },

    #[error("TOML parsing error: {error}")]
    TomlError { error: toml::de::Error },
}

impl VectorError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        VectorError::BadRequest { message: message.into() }
    }

    pub fn load_error(source_path: impl Into<String>, error: impl Into<String>) -> Self {
        VectorError::LoadError {
            source_path: source_path.into(),
            error: error.into(),
        }
    }
}

impl From<std::io::Error> for VectorError {
    fn from(error: std::io::Error) -> Self {
        VectorError::IoError { error }
    }
}

impl From<toml::de::Error> for VectorError {
    fn from(error: toml::de::Error) -> Self {
        VectorError::TomlError { error }
    }
}
