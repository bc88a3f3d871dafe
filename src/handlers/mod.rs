//! Request handlers
//!
//! Transport-independent logic behind every endpoint. Handlers read the
//! active store from the [`ModelRegistry`] once per request and never mutate
//! shared state except through [`ModelRegistry::reload`].

use std::sync::Arc;
use tracing::{debug, info};

use crate::loaders::VectorSource;
use crate::models::{
    EmbeddingStore, FallbackVectorGenerator, ModelRegistry, ModelsConfig, UnknownWordPolicy,
    Vector, VectorError, VectorResult,
};
use crate::protocol::http::{
    HealthResponse, OrderedVectors, ReloadRequest, UnknownWordsResponse, VectorsResponse,
    WordVectorResponse, WordsRequest,
};

/// Vocabulary key numeric tokens are looked up under when number
/// normalization is on
pub const NUMBER_KEY: &str = "NUM";

pub struct RequestHandlers {
    registry: Arc<ModelRegistry>,
    fallback: FallbackVectorGenerator,
    unknown_words: UnknownWordPolicy,
    normalize_numbers: bool,
}

impl RequestHandlers {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            fallback: FallbackVectorGenerator::new(),
            unknown_words: UnknownWordPolicy::default(),
            normalize_numbers: false,
        }
    }

    /// Handlers using the lookup switches of `config`
    pub fn from_config(registry: Arc<ModelRegistry>, config: &ModelsConfig) -> Self {
        Self::new(registry)
            .with_unknown_words(config.unknown_words)
            .with_number_normalization(config.normalize_numbers)
    }

    pub fn with_unknown_words(mut self, policy: UnknownWordPolicy) -> Self {
        self.unknown_words = policy;
        self
    }

    pub fn with_number_normalization(mut self, enabled: bool) -> Self {
        self.normalize_numbers = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn unknown_word_policy(&self) -> UnknownWordPolicy {
        self.unknown_words
    }

    /// Vectors for every requested word, in request order
    pub async fn lookup_many(&self, request: &WordsRequest) -> VectorResult<VectorsResponse> {
        let words = request.words()?;
        let store = self.registry.get(request.language.as_deref()).await?;
        let policy = request.unknown.unwrap_or(self.unknown_words);

        info!("Request for {} words ({})", words.len(), store.language());

        let mut vectors = OrderedVectors::new();
        for word in words {
            match self.lookup(&store, word) {
                Some(vector) => vectors.insert(word.clone(), Some(vector.clone())),
                None => match policy {
                    UnknownWordPolicy::Null => {
                        info!("Requested vectors for word '{}' - not found", word);
                        vectors.insert(word.clone(), None);
                    }
                    UnknownWordPolicy::Fallback => {
                        debug!("Generating fallback vector for '{}'", word);
                        vectors.insert(word.clone(), Some(self.fallback.generate_for(&store)));
                    }
                    UnknownWordPolicy::Omit => {
                        debug!("Omitting unknown word '{}'", word);
                    }
                },
            }
        }

        Ok(VectorsResponse { vectors })
    }

    /// Vector for a single word; `null` when unknown regardless of policy
    pub async fn lookup_one(
        &self,
        word: &str,
        language: Option<&str>,
    ) -> VectorResult<WordVectorResponse> {
        let store = self.registry.get(language).await?;
        let vectors = self.lookup(&store, word).cloned();
        if vectors.is_none() {
            info!("Requested vectors for word '{}' - not found", word);
        }

        Ok(WordVectorResponse {
            word: word.to_string(),
            vectors,
        })
    }

    /// Requested words missing from the vocabulary, in request order
    pub async fn unknown_words(&self, request: &WordsRequest) -> VectorResult<UnknownWordsResponse> {
        let words = request.words()?;
        let store = self.registry.get(request.language.as_deref()).await?;

        let unk_words: Vec<String> = words
            .iter()
            .filter(|word| self.lookup(&store, word).is_none())
            .cloned()
            .collect();
        info!(
            "{} of {} words unknown ({})",
            unk_words.len(),
            words.len(),
            store.language()
        );

        Ok(UnknownWordsResponse { unk_words })
    }

    /// Load a new store and make it active
    pub async fn reload(&self, request: &ReloadRequest) -> VectorResult<()> {
        let language = match request.language.as_deref().or(self.registry.default_language()) {
            Some(language) => language.to_string(),
            None => {
                return Err(VectorError::bad_request(
                    "No language given and no default language configured",
                ))
            }
        };

        let source = match &request.path {
            Some(path) => VectorSource::new(path.clone()),
            None => self.registry.source_for(&language).cloned().ok_or_else(|| {
                VectorError::bad_request(format!(
                    "No vector path given and none configured for language '{}'",
                    language
                ))
            })?,
        };

        self.registry.reload(&language, source).await
    }

    /// Healthy once any store has loaded
    pub async fn health(&self) -> VectorResult<HealthResponse> {
        if !self.registry.is_ready().await {
            return Err(VectorError::NotLoaded {
                language: self
                    .registry
                    .default_language()
                    .unwrap_or("<any>")
                    .to_string(),
            });
        }

        Ok(HealthResponse::healthy(
            self.registry.default_language().map(str::to_string),
            self.registry.store_infos().await,
        ))
    }

    fn lookup<'a>(&self, store: &'a EmbeddingStore, word: &str) -> Option<&'a Vector> {
        if self.normalize_numbers && is_number(word) {
            return store.lookup(NUMBER_KEY);
        }
        store.lookup(word)
    }
}

/// Whether the whole token parses as a number. Words like "inf" or "NaN"
/// that only parse as special floats are not numbers.
pub fn is_number(token: &str) -> bool {
    token.bytes().any(|b| b.is_ascii_digit()) && token.parse::<f64>().is_ok()
}
