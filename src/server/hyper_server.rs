//! Hyper-based HTTP Server
//!
//! Plain Hyper with a single `match` for routing. Every handler error is
//! logged with the request id here and turned into a JSON error body.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hyper::body::to_bytes;
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use tokio::net::TcpSocket;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::handlers::RequestHandlers;
use crate::models::VectorError;
use crate::protocol::http::{query_param, HttpErrorResponse, ReloadRequest, WordsRequest};
use crate::server::config::ServerConfig;

/// Shared state for Hyper server
#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) handlers: Arc<RequestHandlers>,
    pub(crate) config: Arc<ServerConfig>,
}

/// Start the Hyper HTTP server; returns when the server stops
pub async fn start_hyper_http_server(
    config: Arc<ServerConfig>,
    handlers: Arc<RequestHandlers>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = config.bind_addr()?;

    info!("🚀 Starting Word Vector HTTP Server");
    info!("📡 Binding to {}", addr);

    let state = ServerState { handlers, config };

    // Create service factory
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                handle_request(req, state)
            }))
        }
    });

    let socket = if addr.is_ipv6() {
        TcpSocket::new_v6()?
    } else {
        TcpSocket::new_v4()?
    };

    // Small JSON responses; don't let Nagle hold them back
    socket.set_nodelay(true)?;
    socket.set_reuseaddr(true)?;

    socket.bind(addr)?;
    let listener = socket.listen(1024)?;

    let server = Server::from_tcp(listener.into_std()?)?
        .http1_keepalive(true)
        .tcp_nodelay(true)
        .tcp_sleep_on_accept_errors(true)
        .serve(make_svc)
        .with_graceful_shutdown(shutdown_signal());

    info!("✅ HTTP server listening on {}", addr);
    info!("📍 Endpoints:");
    info!("   POST /words         - Vectors for a list of words");
    info!("   GET  /words/{{word}}  - Vector for one word");
    info!("   POST /unk_words     - Words missing from the vocabulary");
    info!("   POST /reload        - Load a new model");
    info!("   GET  /health        - Health check");
    info!("   GET  /              - Server info");

    server.await?;

    info!("🛑 HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}

/// Main request handler
pub(crate) async fn handle_request(
    req: Request<Body>,
    state: ServerState,
) -> Result<Response<Body>, Infallible> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    let origin = req
        .headers()
        .get("origin")
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let result = match (&method, path.as_str()) {
        (&Method::POST, "/words") => handle_words(req, &state).await,
        (&Method::GET, word_path) if word_path.starts_with("/words/") => {
            handle_single_word(&word_path["/words/".len()..], &query, &state).await
        }
        (&Method::POST, "/unk_words") => handle_unknown_words(req, &state).await,
        (&Method::POST, "/reload") => handle_reload(req, &state).await,
        (&Method::GET, "/reload") => handle_reload_query(&query, &state).await,
        (&Method::GET, "/health") => handle_health(&state).await,
        (&Method::GET, "/") => Ok(handle_root(&state).await),
        (&Method::OPTIONS, _) => Ok(handle_options()),
        _ => Ok(json_response(StatusCode::NOT_FOUND, &HttpErrorResponse::not_found())),
    };

    let mut response = match result {
        Ok(response) => response,
        Err(e) => error_response(request_id, &method, &path, &e),
    };

    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", origin);
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );

    if state.config.monitoring.enable_detailed_logging {
        info!(
            "⏱️  {} {} -> {} in {:?} [{}]",
            method,
            path,
            response.status(),
            started.elapsed(),
            request_id
        );
    }

    Ok(response)
}

/// Failures that reach the client as a status other than 200
enum RouteError {
    Vector(VectorError),
    BodyTooLarge(usize),
}

impl From<VectorError> for RouteError {
    fn from(error: VectorError) -> Self {
        RouteError::Vector(error)
    }
}

type RouteResult = Result<Response<Body>, RouteError>;

/// Read the whole body, refusing anything over `max_body_bytes`
async fn read_body(req: Request<Body>, state: &ServerState) -> Result<Vec<u8>, RouteError> {
    let limit = state.config.network.max_body_bytes;

    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if matches!(declared, Some(length) if length > limit) {
        return Err(RouteError::BodyTooLarge(limit));
    }

    let bytes = to_bytes(req.into_body())
        .await
        .map_err(|e| VectorError::bad_request(format!("Failed to read request body: {}", e)))?;
    if bytes.len() > limit {
        return Err(RouteError::BodyTooLarge(limit));
    }
    Ok(bytes.to_vec())
}

async fn handle_words(req: Request<Body>, state: &ServerState) -> RouteResult {
    let body = read_body(req, state).await?;
    let request = WordsRequest::from_slice(&body)?;
    let response = state.handlers.lookup_many(&request).await?;
    Ok(json_response(StatusCode::OK, &response))
}

async fn handle_single_word(encoded: &str, query: &str, state: &ServerState) -> RouteResult {
    let word = urlencoding::decode(encoded)
        .map_err(|e| VectorError::bad_request(format!("Invalid word in path: {}", e)))?;
    let language = query_param(query, "language")?;

    let response = state
        .handlers
        .lookup_one(&word, language.as_deref())
        .await?;
    Ok(json_response(StatusCode::OK, &response))
}

async fn handle_unknown_words(req: Request<Body>, state: &ServerState) -> RouteResult {
    let body = read_body(req, state).await?;
    let request = WordsRequest::from_slice(&body)?;
    let response = state.handlers.unknown_words(&request).await?;
    Ok(json_response(StatusCode::OK, &response))
}

async fn handle_reload(req: Request<Body>, state: &ServerState) -> RouteResult {
    let body = read_body(req, state).await?;
    let request = ReloadRequest::from_slice(&body)?;
    reload(&request, state).await
}

async fn handle_reload_query(query: &str, state: &ServerState) -> RouteResult {
    let request = ReloadRequest::from_query(query)?;
    reload(&request, state).await
}

async fn reload(request: &ReloadRequest, state: &ServerState) -> RouteResult {
    info!(
        "🔄 Reload requested (language: {:?}, path: {:?})",
        request.language, request.path
    );
    state.handlers.reload(request).await?;
    Ok(empty_response(StatusCode::OK))
}

/// Health check endpoint
async fn handle_health(state: &ServerState) -> RouteResult {
    debug!("🏥 Health check requested");
    let response = state.handlers.health().await?;
    Ok(json_response(StatusCode::OK, &response))
}

/// Root endpoint - server info
async fn handle_root(state: &ServerState) -> Response<Body> {
    let registry = state.handlers.registry();
    let info = serde_json::json!({
        "name": "Word Vector Server",
        "version": env!("CARGO_PKG_VERSION"),
        "default_language": registry.default_language(),
        "unknown_words": state.handlers.unknown_word_policy(),
        "models": registry.store_infos().await,
        "endpoints": {
            "words": { "method": "POST", "path": "/words" },
            "word": { "method": "GET", "path": "/words/{word}" },
            "unk_words": { "method": "POST", "path": "/unk_words" },
            "reload": { "method": "POST", "path": "/reload" },
            "health": { "method": "GET", "path": "/health" }
        }
    });

    json_response(StatusCode::OK, &info)
}

/// OPTIONS handler for CORS preflight
fn handle_options() -> Response<Body> {
    empty_response(StatusCode::NO_CONTENT)
}

fn error_response(request_id: Uuid, method: &Method, path: &str, error: &RouteError) -> Response<Body> {
    let error = match error {
        RouteError::BodyTooLarge(limit) => {
            info!("Rejected {} {}: body over {} bytes [{}]", method, path, limit, request_id);
            return json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                &HttpErrorResponse::body_too_large(*limit),
            );
        }
        RouteError::Vector(error) => error,
    };

    let status = match error {
        VectorError::BadRequest { .. } => {
            info!("Bad request {} {}: {} [{}]", method, path, error, request_id);
            StatusCode::BAD_REQUEST
        }
        VectorError::NotLoaded { .. } => {
            warn!("⚠️  {} {}: {} [{}]", method, path, error, request_id);
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => {
            error!("❌ {} {} failed: {} [{}]", method, path, error, request_id);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    json_response(status, &HttpErrorResponse::from_error(error))
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            error!("❌ Failed to serialize response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"Internal server error","code":"INTERNAL_ERROR"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::{MemoryLoader, VectorSource, WordVectors};
    use crate::models::ModelRegistry;

    fn state() -> ServerState {
        let mut vectors = WordVectors::new();
        vectors.insert("cat".to_string(), vec![0.25, -0.5, 1.0]);
        vectors.insert("dog".to_string(), vec![1.0, 0.0, 0.0]);
        vectors.insert("New York".to_string(), vec![0.0, 1.0, 0.0]);

        let loader = MemoryLoader::new().with_source("en.bin", vectors);
        let registry = Arc::new(ModelRegistry::new(Arc::new(loader), Some("en".to_string())));

        ServerState {
            handlers: Arc::new(RequestHandlers::new(registry)),
            config: Arc::new(ServerConfig::default()),
        }
    }

    async fn loaded_state() -> ServerState {
        let state = state();
        state
            .handlers
            .registry()
            .reload("en", VectorSource::new("en.bin"))
            .await
            .unwrap();
        state
    }

    fn post(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    async fn call(state: &ServerState, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = handle_request(req, state.clone()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[test]
    fn test_error_responses() {
        let error = RouteError::Vector(VectorError::bad_request("Missing required field: words"));
        let response = error_response(Uuid::new_v4(), &Method::POST, "/words", &error);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error = RouteError::Vector(VectorError::NotLoaded { language: "en".to_string() });
        let response = error_response(Uuid::new_v4(), &Method::POST, "/words", &error);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let error = RouteError::Vector(VectorError::load_error("x.bin", "corrupt"));
        let response = error_response(Uuid::new_v4(), &Method::POST, "/reload", &error);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = error_response(Uuid::new_v4(), &Method::POST, "/words", &RouteError::BodyTooLarge(10));
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_before_and_after_load() {
        let state = state();
        let (status, body) = call(&state, get("/health")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "MODEL_NOT_READY");

        state
            .handlers
            .registry()
            .reload("en", VectorSource::new("en.bin"))
            .await
            .unwrap();
        let (status, body) = call(&state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["models"][0]["dimension"], 3);
    }

    #[tokio::test]
    async fn test_words_while_loading() {
        let state = state();
        let (status, _) = call(&state, post("/words", r#"{"words": ["cat"]}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_words() {
        let state = loaded_state().await;
        let (status, body) = call(&state, post("/words", r#"{"words": ["cat", "frobble"]}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vectors"]["cat"], serde_json::json!([0.25, -0.5, 1.0]));
        assert!(body["vectors"]["frobble"].is_null());
        assert_eq!(body["vectors"].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_words_missing_field() {
        let state = loaded_state().await;
        let (status, body) = call(&state, post("/words", r#"{"language": "en"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let (status, _) = call(&state, post("/words", r#"{"words": [1, 2]}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, post("/words", "not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_words_duplicates() {
        let state = loaded_state().await;
        let (status, body) = call(&state, post("/words", r#"{"words": ["x", "x"]}"#)).await;

        assert_eq!(status, StatusCode::OK);
        let vectors = body["vectors"].as_object().unwrap();
        assert_eq!(vectors.len(), 1);
        assert!(vectors["x"].is_null());
    }

    #[tokio::test]
    async fn test_words_response_order() {
        let state = loaded_state().await;
        let response = handle_request(post("/words", r#"{"words": ["dog", "cat"]}"#), state.clone())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        let dog = text.find("\"dog\"").unwrap();
        let cat = text.find("\"cat\"").unwrap();
        assert!(dog < cat);
    }

    #[tokio::test]
    async fn test_unknown_words() {
        let state = loaded_state().await;
        let (status, body) = call(&state, post("/unk_words", r#"{"words": ["cat", "zzzqx"]}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unk_words"], serde_json::json!(["zzzqx"]));

        let (status, _) = call(&state, post("/unk_words", r#"{}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_single_word() {
        let state = loaded_state().await;
        let (status, body) = call(&state, get("/words/New%20York")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["word"], "New York");
        assert_eq!(body["vectors"], serde_json::json!([0.0, 1.0, 0.0]));

        let (status, body) = call(&state, get("/words/frobble?language=en")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["vectors"].is_null());

        let (status, _) = call(&state, get("/words/cat?language=de")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_query_language_decoding() {
        let state = loaded_state().await;
        let (status, body) = call(&state, get("/words/cat?language=pt+br")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["details"], "language: pt br");

        let (status, body) = call(&state, get("/words/cat?language=pt%20br")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["details"], "language: pt br");
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_serving() {
        let state = loaded_state().await;
        let (status, body) = call(&state, post("/reload", r#"{"path": "corrupt.bin"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "LOAD_FAILED");

        let (status, body) = call(&state, post("/words", r#"{"words": ["cat"]}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vectors"]["cat"], serde_json::json!([0.25, -0.5, 1.0]));
    }

    #[tokio::test]
    async fn test_reload() {
        let state = state();
        let (status, body) = call(&state, post("/reload", r#"{"language": "en", "path": "en.bin"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());

        let (status, _) = call(&state, get("/reload?language=en&path=en.bin")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&state, post("/reload", "{")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let mut config = ServerConfig::default();
        config.network.max_body_bytes = 16;
        let state = ServerState {
            config: Arc::new(config),
            ..loaded_state().await
        };

        let (status, body) = call(&state, post("/words", r#"{"words": ["cat", "dog", "bird"]}"#)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "BODY_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_root_not_found_and_options() {
        let state = loaded_state().await;

        let (status, body) = call(&state, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["default_language"], "en");
        assert_eq!(body["unknown_words"], "null");

        let (status, _) = call(&state, get("/nothing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&state, get("/words")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let options = Request::builder()
            .method(Method::OPTIONS)
            .uri("/words")
            .body(Body::empty())
            .unwrap();
        let response = handle_request(options, state).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
