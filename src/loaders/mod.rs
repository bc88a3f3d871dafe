//! Embedding loaders
//!
//! An `EmbeddingLoader` turns a vector source into a finished word to vector
//! mapping. `FileLoader` reads the on-disk formats on a blocking thread;
//! `MemoryLoader` serves prebuilt mappings and is what tests inject.

pub mod text;
pub mod word2vec;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{Vector, VectorError, VectorResult};

/// Word to vector mapping produced by a loader
pub type WordVectors = HashMap<String, Vector>;

/// Supported embedding file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorFormat {
    /// word2vec binary (`GoogleNews-vectors-negative300.bin`)
    Word2Vec,
    /// GloVe text, no header
    Glove,
    /// fastText text (`wiki.en.vec`), count/dimension header
    FastText,
}

impl VectorFormat {
    /// Guess the format from a file name
    pub fn detect(path: &str) -> VectorResult<Self> {
        let file_name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let extension = Path::new(path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if file_name.contains("glove") {
            Ok(VectorFormat::Glove)
        } else if file_name.contains("googlenews") || extension == "bin" {
            Ok(VectorFormat::Word2Vec)
        } else if file_name.contains("wiki") || extension == "vec" {
            Ok(VectorFormat::FastText)
        } else if extension == "txt" {
            Ok(VectorFormat::Glove)
        } else {
            Err(VectorError::load_error(
                path,
                "cannot detect vector format from file name, set `format` explicitly",
            ))
        }
    }

    /// Parse a whole file. Blocking.
    pub fn read_file(self, path: &str) -> VectorResult<WordVectors> {
        let file = File::open(path).map_err(|e| VectorError::load_error(path, e.to_string()))?;
        let reader = BufReader::new(file);

        let parsed = match self {
            VectorFormat::Word2Vec => word2vec::read_binary(reader),
            VectorFormat::Glove => text::read_glove(reader),
            VectorFormat::FastText => text::read_fasttext(reader),
        };
        parsed.map_err(|error| VectorError::load_error(path, error))
    }
}

/// Describes where a store's vectors come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorSource {
    pub path: String,
    /// Explicit format; detected from `path` when absent
    pub format: Option<VectorFormat>,
}

impl VectorSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: Option<VectorFormat>) -> Self {
        self.format = format;
        self
    }
}

/// Produces the word to vector mapping for a source
#[async_trait]
pub trait EmbeddingLoader: Send + Sync {
    async fn load(&self, source: &VectorSource) -> VectorResult<WordVectors>;
}

/// Reads vector files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmbeddingLoader for FileLoader {
    async fn load(&self, source: &VectorSource) -> VectorResult<WordVectors> {
        let format = match source.format {
            Some(format) => format,
            None => VectorFormat::detect(&source.path)?,
        };
        info!("📂 Reading {:?} vectors from {}", format, source.path);

        let path = source.path.clone();
        tokio::task::spawn_blocking(move || format.read_file(&path))
            .await
            .map_err(|e| VectorError::Internal {
                message: format!("vector loading task failed: {}", e),
            })?
    }
}

/// Serves prebuilt mappings keyed by source path
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, WordVectors>,
    delay: Option<Duration>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, path: impl Into<String>, vectors: WordVectors) -> Self {
        self.sources.insert(path.into(), vectors);
        self
    }

    /// Make every load take at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl EmbeddingLoader for MemoryLoader {
    async fn load(&self, source: &VectorSource) -> VectorResult<WordVectors> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        debug!("Loading in-memory vectors for {}", source.path);
        self.sources
            .get(&source.path)
            .cloned()
            .ok_or_else(|| VectorError::load_error(&source.path, "no such source"))
    }
}
