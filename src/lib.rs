//! Word Vector Server Library
//!
//! HTTP server for precomputed word embeddings, with per-language models,
//! unknown word handling and hot reload.

pub mod handlers;
pub mod loaders;
pub mod models;
pub mod protocol;
pub mod server;

// Re-exports
pub use handlers::RequestHandlers;
pub use loaders::{EmbeddingLoader, FileLoader, VectorFormat, VectorSource};
pub use models::{EmbeddingStore, ModelRegistry, Vector, VectorError, VectorResult};
pub use protocol::{VectorsResponse, WordsRequest};
pub use server::{start_hyper_http_server, ServerConfig, WordVectorServer};
