//! Wire protocol
//!
//! JSON bodies exchanged over HTTP. The handlers produce and consume these
//! types directly; only `server::hyper_server` knows about HTTP itself.

pub mod http;

pub use http::{
    HealthResponse, HttpErrorResponse, OrderedVectors, ReloadRequest, UnknownWordsResponse,
    VectorsResponse, WordVectorResponse, WordsRequest,
};
