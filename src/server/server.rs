//! Word Vector Server
//!
//! Wires the registry, the handlers and the HTTP listener together. The
//! listener comes up before the vectors are loaded so `/health` can report
//! 503 during startup; a failed initial load stops the server.

use std::sync::Arc;
use tracing::{error, info};

use crate::handlers::RequestHandlers;
use crate::loaders::{EmbeddingLoader, FileLoader};
use crate::models::ModelRegistry;
use crate::server::config::ServerConfig;
use crate::server::hyper_server::start_hyper_http_server;

pub struct WordVectorServer {
    config: Arc<ServerConfig>,
    registry: Arc<ModelRegistry>,
    handlers: Arc<RequestHandlers>,
}

impl WordVectorServer {
    /// Create a server reading vector files from disk
    pub fn new(config: ServerConfig) -> Self {
        Self::with_loader(config, Arc::new(FileLoader::new()))
    }

    pub fn with_loader(config: ServerConfig, loader: Arc<dyn EmbeddingLoader>) -> Self {
        info!("🚀 Initializing Word Vector Server");

        let registry = Arc::new(ModelRegistry::from_config(loader, &config.models));
        let handlers = Arc::new(RequestHandlers::from_config(
            Arc::clone(&registry),
            &config.models,
        ));

        match registry.default_language() {
            Some(language) => info!("🌐 Default language: {}", language),
            None => info!("🌐 No default language, requests must name one"),
        }

        Self {
            config: Arc::new(config),
            registry,
            handlers,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn handlers(&self) -> &Arc<RequestHandlers> {
        &self.handlers
    }

    /// Serve until shutdown. Returns an error if the initial load fails.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        let serve = start_hyper_http_server(Arc::clone(&self.config), Arc::clone(&self.handlers));
        tokio::pin!(serve);

        let load = self.registry.load_from_config();
        tokio::select! {
            result = &mut serve => return result,
            result = load => {
                if let Err(e) = result {
                    error!("❌ Initial vector load failed: {}", e);
                    return Err(e.into());
                }
                info!(
                    "✅ Word vectors loaded for {:?}, ready to serve",
                    self.registry.loaded_languages().await
                );
            }
        }

        serve.await
    }
}
