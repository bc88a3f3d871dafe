//! Model registry for the active store of each language
//!
//! Readers take the read lock only long enough to clone the current
//! `Arc<EmbeddingStore>`. A reload builds the replacement store without any
//! lock held on the map and then swaps the reference under the write lock,
//! so a request sees either the old store or the new one, never a mix.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::loaders::{EmbeddingLoader, VectorSource};
use crate::models::{EmbeddingStore, ModelsConfig, StoreInfo, VectorError, VectorResult};

/// Holds the currently active store per language
pub struct ModelRegistry {
    /// Active stores
    stores: RwLock<HashMap<String, Arc<EmbeddingStore>>>,
    /// Configured vector source per language, used when a reload names no path
    sources: HashMap<String, VectorSource>,
    /// Language served when a request names none
    default_language: Option<String>,
    loader: Arc<dyn EmbeddingLoader>,
    /// Serializes reloads; at most one store is built at a time
    reload_lock: Mutex<()>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new(loader: Arc<dyn EmbeddingLoader>, default_language: Option<String>) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            sources: HashMap::new(),
            default_language,
            loader,
            reload_lock: Mutex::new(()),
        }
    }

    /// Create a registry for the enabled languages of `config`. Nothing is
    /// loaded yet; call [`ModelRegistry::load_from_config`].
    pub fn from_config(loader: Arc<dyn EmbeddingLoader>, config: &ModelsConfig) -> Self {
        let mut registry = Self::new(loader, config.resolved_default_language());
        for (name, language) in config.enabled_languages() {
            registry.sources.insert(
                name.to_string(),
                VectorSource::new(language.path.clone()).with_format(language.format),
            );
        }
        registry
    }

    /// Load every configured language
    pub async fn load_from_config(&self) -> VectorResult<()> {
        let mut languages: Vec<(&String, &VectorSource)> = self.sources.iter().collect();
        languages.sort_by(|a, b| a.0.cmp(b.0));

        for (language, source) in languages {
            self.reload(language, source.clone()).await?;
        }
        Ok(())
    }

    pub fn default_language(&self) -> Option<&str> {
        self.default_language.as_deref()
    }

    /// Configured source for a language
    pub fn source_for(&self, language: &str) -> Option<&VectorSource> {
        self.sources.get(language)
    }

    /// Language a request is served from: the requested one or the default
    pub fn resolve_language(&self, language: Option<&str>) -> VectorResult<String> {
        match language.or(self.default_language.as_deref()) {
            Some(language) => Ok(language.to_string()),
            None => Err(VectorError::NotLoaded {
                language: "<default>".to_string(),
            }),
        }
    }

    /// Current store for `language`, or for the default language when `None`
    pub async fn get(&self, language: Option<&str>) -> VectorResult<Arc<EmbeddingStore>> {
        let language = self.resolve_language(language)?;
        self.stores
            .read()
            .await
            .get(&language)
            .cloned()
            .ok_or(VectorError::NotLoaded { language })
    }

    /// Build a new store from `source` and publish it for `language`.
    ///
    /// On failure the previously active store stays in place.
    pub async fn reload(&self, language: &str, source: VectorSource) -> VectorResult<()> {
        let _guard = self.reload_lock.lock().await;

        info!("🔄 Loading vectors for '{}' from {}", language, source.path);
        let started = Instant::now();

        let store = match self.build_store(language, &source).await {
            Ok(store) => store,
            Err(e) => {
                error!("❌ Loading vectors for '{}' failed: {}", language, e);
                return Err(e);
            }
        };

        info!(
            "✅ Loaded {} vectors ({} dimensions, mean norm {:.4}) for '{}' in {:?}",
            store.len(),
            store.dimension(),
            store.mean_norm(),
            language,
            started.elapsed()
        );

        let previous = self
            .stores
            .write()
            .await
            .insert(language.to_string(), Arc::new(store));
        if previous.is_some() {
            info!("Replaced previous store for '{}'", language);
        }

        Ok(())
    }

    async fn build_store(&self, language: &str, source: &VectorSource) -> VectorResult<EmbeddingStore> {
        let vectors = self.loader.load(source).await?;
        EmbeddingStore::new(language, source.path.clone(), vectors)
    }

    /// Whether at least one store has finished loading
    pub async fn is_ready(&self) -> bool {
        !self.stores.read().await.is_empty()
    }

    /// Languages with an active store, sorted
    pub async fn loaded_languages(&self) -> Vec<String> {
        let languages: BTreeSet<String> = self.stores.read().await.keys().cloned().collect();
        languages.into_iter().collect()
    }

    /// Summary of every active store, sorted by language
    pub async fn store_infos(&self) -> Vec<StoreInfo> {
        let mut infos: Vec<StoreInfo> = self
            .stores
            .read()
            .await
            .values()
            .map(|store| store.info())
            .collect();
        infos.sort_by(|a, b| a.language.cmp(&b.language));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::{MemoryLoader, WordVectors};
    use crate::models::LanguageConfig;
    use std::time::Duration;

    fn vectors(entries: &[(&str, [f32; 2])]) -> WordVectors {
        entries
            .iter()
            .map(|(word, vector)| (word.to_string(), vector.to_vec()))
            .collect()
    }

    fn loader() -> MemoryLoader {
        MemoryLoader::new()
            .with_source("en-v1", vectors(&[("cat", [1.0, 0.0]), ("dog", [0.0, 1.0])]))
            .with_source("en-v2", vectors(&[("cat", [2.0, 0.0]), ("bird", [0.0, 2.0])]))
            .with_source("de-v1", vectors(&[("Katze", [1.0, 1.0])]))
            .with_source("empty", WordVectors::new())
    }

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = ModelRegistry::new(Arc::new(loader()), Some("en".to_string()));
        assert!(!registry.is_ready().await);
        assert!(registry.loaded_languages().await.is_empty());
        assert!(matches!(
            registry.get(None).await,
            Err(VectorError::NotLoaded { .. })
        ));
    }

    #[tokio::test]
    async fn test_reload_publishes_store() {
        let registry = ModelRegistry::new(Arc::new(loader()), Some("en".to_string()));
        registry.reload("en", VectorSource::new("en-v1")).await.unwrap();

        assert!(registry.is_ready().await);
        let store = registry.get(None).await.unwrap();
        assert_eq!(store.lookup("cat"), Some(&vec![1.0, 0.0]));

        registry.reload("en", VectorSource::new("en-v2")).await.unwrap();
        let store = registry.get(Some("en")).await.unwrap();
        assert_eq!(store.lookup("cat"), Some(&vec![2.0, 0.0]));
        assert!(!store.contains("dog"));
    }

    #[tokio::test]
    async fn test_held_reference_survives_reload() {
        let registry = ModelRegistry::new(Arc::new(loader()), Some("en".to_string()));
        registry.reload("en", VectorSource::new("en-v1")).await.unwrap();

        let old = registry.get(None).await.unwrap();
        registry.reload("en", VectorSource::new("en-v2")).await.unwrap();

        assert!(old.contains("dog"));
        assert!(!registry.get(None).await.unwrap().contains("dog"));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_store() {
        let registry = ModelRegistry::new(Arc::new(loader()), Some("en".to_string()));
        registry.reload("en", VectorSource::new("en-v1")).await.unwrap();

        let missing = registry.reload("en", VectorSource::new("corrupt")).await;
        assert!(matches!(missing, Err(VectorError::LoadError { .. })));
        let empty = registry.reload("en", VectorSource::new("empty")).await;
        assert!(matches!(empty, Err(VectorError::LoadError { .. })));

        let store = registry.get(None).await.unwrap();
        assert_eq!(store.source(), "en-v1");
        assert_eq!(store.lookup("dog"), Some(&vec![0.0, 1.0]));
    }

    #[tokio::test]
    async fn test_unloaded_language() {
        let registry = ModelRegistry::new(Arc::new(loader()), Some("en".to_string()));
        registry.reload("en", VectorSource::new("en-v1")).await.unwrap();

        match registry.get(Some("de")).await {
            Err(VectorError::NotLoaded { language }) => assert_eq!(language, "de"),
            other => panic!("expected NotLoaded, got {:?}", other.map(|s| s.info())),
        }
    }

    #[tokio::test]
    async fn test_no_default_language() {
        let registry = ModelRegistry::new(Arc::new(loader()), None);
        registry.reload("en", VectorSource::new("en-v1")).await.unwrap();

        assert!(registry.get(None).await.is_err());
        assert!(registry.get(Some("en")).await.is_ok());
    }

    #[tokio::test]
    async fn test_legacy_single_language_mode() {
        let mut config = ModelsConfig::default();
        config.languages.insert("en".to_string(), LanguageConfig::new("en-v1"));

        let registry = ModelRegistry::from_config(Arc::new(loader()), &config);
        assert_eq!(registry.default_language(), Some("en"));
        registry.load_from_config().await.unwrap();

        assert!(registry.get(None).await.unwrap().contains("cat"));
    }

    #[tokio::test]
    async fn test_multi_language_mode() {
        let mut config = ModelsConfig::default();
        config.languages.insert("en".to_string(), LanguageConfig::new("en-v1"));
        config.languages.insert("de".to_string(), LanguageConfig::new("de-v1"));

        let registry = ModelRegistry::from_config(Arc::new(loader()), &config);
        assert_eq!(registry.default_language(), None);
        registry.load_from_config().await.unwrap();

        assert_eq!(registry.loaded_languages().await, vec!["de", "en"]);
        assert!(registry.get(Some("de")).await.unwrap().contains("Katze"));
        assert!(!registry.get(Some("en")).await.unwrap().contains("Katze"));
        assert_eq!(registry.store_infos().await.len(), 2);
        assert_eq!(registry.source_for("de").unwrap().path, "de-v1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lookups_during_reload_see_one_store() {
        let slow_loader = loader().with_delay(Duration::from_millis(50));
        let registry = Arc::new(ModelRegistry::new(Arc::new(slow_loader), Some("en".to_string())));
        registry.reload("en", VectorSource::new("en-v1")).await.unwrap();

        let reloader = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.reload("en", VectorSource::new("en-v2")).await })
        };

        let mut readers = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            readers.push(tokio::spawn(async move {
                let mut saw_new = false;
                for _ in 0..200 {
                    let store = registry.get(None).await.unwrap();
                    let cat = store.lookup("cat").cloned();
                    match store.source() {
                        "en-v1" => {
                            assert_eq!(cat, Some(vec![1.0, 0.0]));
                            assert!(store.contains("dog") && !store.contains("bird"));
                        }
                        "en-v2" => {
                            assert_eq!(cat, Some(vec![2.0, 0.0]));
                            assert!(store.contains("bird") && !store.contains("dog"));
                            saw_new = true;
                        }
                        other => panic!("unexpected store {}", other),
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                saw_new
            }));
        }

        reloader.await.unwrap().unwrap();
        let mut any_saw_new = false;
        for reader in readers {
            any_saw_new |= reader.await.unwrap();
        }
        assert!(any_saw_new, "no reader observed the reloaded store");
        assert_eq!(registry.get(None).await.unwrap().source(), "en-v2");
    }
}
