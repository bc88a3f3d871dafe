//! HTTP REST API Protocol
//!
//! Request and response bodies for the word vector endpoints:
//! - `POST /words`      {"words": [...]} -> {"vectors": {word: [...] | null}}
//! - `POST /unk_words`  {"words": [...]} -> {"unk_words": [...]}
//! - `POST /reload`     {"language": "..", "path": ".."}
//! - `GET  /health`

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

use crate::models::{StoreInfo, UnknownWordPolicy, Vector, VectorError, VectorResult};

/// Body of `POST /words` and `POST /unk_words`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordsRequest {
    /// Words to look up (required)
    #[serde(default)]
    pub words: Option<Vec<String>>,

    /// Language model to query; the default language when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Per-request override of the unknown word policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown: Option<UnknownWordPolicy>,
}

impl WordsRequest {
    pub fn new(words: Vec<String>) -> Self {
        Self {
            words: Some(words),
            language: None,
            unknown: None,
        }
    }

    /// Parse a JSON body. Anything but an object whose `words` is a list of
    /// strings is a bad request.
    pub fn from_slice(body: &[u8]) -> VectorResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| VectorError::bad_request(format!("Invalid request body: {}", e)))
    }

    /// The requested words, or a bad request when the field is missing
    pub fn words(&self) -> VectorResult<&[String]> {
        self.words
            .as_deref()
            .ok_or_else(|| VectorError::bad_request("Missing required field: words"))
    }
}

/// Word to vector mapping that serializes in insertion order.
///
/// Inserting a word that is already present replaces its value and keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedVectors {
    entries: Vec<(String, Option<Vector>)>,
    index: HashMap<String, usize>,
}

impl OrderedVectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: String, vector: Option<Vector>) {
        match self.index.get(&word) {
            Some(&position) => self.entries[position].1 = vector,
            None => {
                self.index.insert(word.clone(), self.entries.len());
                self.entries.push((word, vector));
            }
        }
    }

    /// `None` if the word is absent, `Some(None)` if it maps to null
    pub fn get(&self, word: &str) -> Option<Option<&Vector>> {
        self.index
            .get(word)
            .map(|&position| self.entries[position].1.as_ref())
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(word, _)| word.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for OrderedVectors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (word, vector) in &self.entries {
            map.serialize_entry(word, vector)?;
        }
        map.end()
    }
}

/// Response of `POST /words`
#[derive(Debug, Clone, Serialize)]
pub struct VectorsResponse {
    pub vectors: OrderedVectors,
}

/// Response of `GET /words/{word}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordVectorResponse {
    pub word: String,
    pub vectors: Option<Vector>,
}

/// Response of `POST /unk_words`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownWordsResponse {
    pub unk_words: Vec<String>,
}

/// Body of `POST /reload`; both fields are optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReloadRequest {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl ReloadRequest {
    /// Parse a JSON body; an empty body reloads the default language
    pub fn from_slice(body: &[u8]) -> VectorResult<Self> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| VectorError::bad_request(format!("Invalid request body: {}", e)))
    }

    /// Parse `language=..&path=..` from a query string
    pub fn from_query(query: &str) -> VectorResult<Self> {
        Ok(Self {
            language: query_param(query, "language")?,
            path: query_param(query, "path")?,
        })
    }
}

/// First value of `name` in a form-encoded query string, with `+` read as a
/// space and percent escapes decoded
pub fn query_param(query: &str, name: &str) -> VectorResult<Option<String>> {
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == name {
            let spaced = value.replace('+', " ");
            let value = urlencoding::decode(&spaced)
                .map_err(|e| VectorError::bad_request(format!("Invalid query string: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// HTTP Error Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error message
    pub error: String,

    /// Error code (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Additional details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details: None,
        }
    }

    /// Create error with code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Create error with details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found() -> Self {
        Self::new("Not Found").with_code("NOT_FOUND")
    }

    pub fn body_too_large(limit: usize) -> Self {
        Self::new(format!("Request body exceeds {} bytes", limit)).with_code("BODY_TOO_LARGE")
    }

    /// Map a handler error to the body returned to the client.
    /// Internal details are never included.
    pub fn from_error(error: &VectorError) -> Self {
        match error {
            VectorError::BadRequest { message } => Self::new(message.clone()).with_code("BAD_REQUEST"),
            VectorError::NotLoaded { language } => {
                Self::new("Word vectors are still loading, please try again later")
                    .with_code("MODEL_NOT_READY")
                    .with_details(format!("language: {}", language))
            }
            VectorError::LoadError { error, .. } => {
                Self::new("Failed to load word vectors, the previous model is still active")
                    .with_code("LOAD_FAILED")
                    .with_details(error.clone())
            }
            _ => Self::new("Internal server error").with_code("INTERNAL_ERROR"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub default_language: Option<String>,
    pub models: Vec<StoreInfo>,
}

impl HealthResponse {
    pub fn healthy(default_language: Option<String>, models: Vec<StoreInfo>) -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            default_language,
            models,
        }
    }
}
