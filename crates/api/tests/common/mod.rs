#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{self, post};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use zimage_api::config::ServerConfig;
use zimage_api::router::build_app_router;
use zimage_api::state::AppState;

/// Build a test `ServerConfig` pointing at `upstream` (or unconfigured).
pub fn test_config(upstream: Option<&str>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        comfy_base_url: zimage_api::config::normalize_base_url(upstream.map(str::to_string)),
        request_timeout_secs: 30,
        upstream_timeout_secs: 5,
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack.
pub fn build_test_app(upstream: Option<&str>) -> Router {
    let config = test_config(upstream);
    let state = AppState::new(config.clone()).unwrap();
    build_app_router(state, &config)
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, json: &Value) -> Response {
    send(app, Method::POST, uri, Body::from(json.to_string())).await
}

pub async fn options(app: Router, uri: &str) -> Response {
    send(app, Method::OPTIONS, uri, Body::empty()).await
}

/// Assert the permissive cross-origin header set is present.
pub fn assert_cors(response: &Response) {
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");
}

// ---------------------------------------------------------------------------
// Stub upstream engine
// ---------------------------------------------------------------------------

/// Answers of the stub engine.
#[derive(Clone)]
pub struct EngineConfig {
    pub prompt: (StatusCode, String),
    pub history: (StatusCode, String),
    pub view: (StatusCode, Option<&'static str>, Vec<u8>),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prompt: (
                StatusCode::OK,
                json!({"prompt_id": "abc123", "number": 3, "node_errors": {}}).to_string(),
            ),
            history: (
                StatusCode::OK,
                json!({"abc123": {
                    "outputs": {"9": {"images": [
                        {"filename": "Z-Image_00001_.png", "subfolder": "", "type": "output"}
                    ]}},
                    "status": {"status_str": "success", "completed": true, "messages": []}
                }})
                .to_string(),
            ),
            view: (StatusCode::OK, Some("image/png"), vec![0x89, b'P', b'N', b'G']),
        }
    }
}

/// What the stub engine saw.
#[derive(Default)]
pub struct EngineRecorder {
    pub calls: AtomicUsize,
    pub last_prompt_body: Mutex<Option<Bytes>>,
    pub last_history_id: Mutex<Option<String>>,
    pub last_view_query: Mutex<Option<HashMap<String, String>>>,
    /// Path and query of every request, in arrival order.
    pub uris: Mutex<Vec<String>>,
}

impl EngineRecorder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    fn record(&self, uri: &Uri) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let seen = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
        self.uris.lock().unwrap().push(seen);
    }
}

#[derive(Clone)]
struct EngineState {
    config: EngineConfig,
    recorder: Arc<EngineRecorder>,
}

pub struct StubEngine {
    pub base_url: String,
    pub recorder: Arc<EngineRecorder>,
}

impl StubEngine {
    /// Serve a stub engine on an ephemeral local port.
    pub async fn spawn(config: EngineConfig) -> Self {
        let recorder = Arc::new(EngineRecorder::default());
        let state = EngineState {
            config,
            recorder: Arc::clone(&recorder),
        };

        let app = Router::new()
            .route("/prompt", post(engine_prompt))
            .route("/history/{id}", routing::get(engine_history))
            .route("/view", routing::get(engine_view))
            .fallback(engine_fallback)
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            // Trailing slash on purpose: the relay must strip it.
            base_url: format!("http://{addr}/"),
            recorder,
        }
    }
}

async fn engine_prompt(State(state): State<EngineState>, uri: Uri, body: Bytes) -> Response {
    state.recorder.record(&uri);
    *state.recorder.last_prompt_body.lock().unwrap() = Some(body);
    let (status, body) = state.config.prompt.clone();
    (status, [(CONTENT_TYPE, "application/json")], body).into_response()
}

async fn engine_history(
    State(state): State<EngineState>,
    uri: Uri,
    Path(id): Path<String>,
) -> Response {
    state.recorder.record(&uri);
    *state.recorder.last_history_id.lock().unwrap() = Some(id);
    let (status, body) = state.config.history.clone();
    (status, [(CONTENT_TYPE, "application/json")], body).into_response()
}

async fn engine_view(
    State(state): State<EngineState>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.recorder.record(&uri);
    *state.recorder.last_view_query.lock().unwrap() = Some(query);
    let (status, content_type, bytes) = state.config.view.clone();
    let mut builder = Response::builder().status(status);
    if let Some(ct) = content_type {
        builder = builder.header(CONTENT_TYPE, ct);
    }
    builder.body(Body::from(bytes)).unwrap()
}

/// Any other engine endpoint. The relay must never reach it.
async fn engine_fallback(State(state): State<EngineState>, uri: Uri) -> Response {
    state.recorder.record(&uri);
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        json!({"unrouted": true}).to_string(),
    )
        .into_response()
}
