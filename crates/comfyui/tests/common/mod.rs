#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use zimage_comfyui::api::RelayApi;
use zimage_comfyui::log::{JobLog, MemorySink};
use zimage_comfyui::poll::PollPolicy;

/// Computes the history answer for the n-th (1-based) history request.
pub type HistoryFn = Arc<dyn Fn(usize, &str) -> (StatusCode, String) + Send + Sync>;

/// Canned answers of a stub relay.
#[derive(Clone)]
pub struct StubConfig {
    pub health: (StatusCode, String),
    pub submit: (StatusCode, String),
    pub history: HistoryFn,
    pub view: (StatusCode, Option<&'static str>, Vec<u8>),
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            health: (StatusCode::OK, r#"{"ok":true}"#.to_string()),
            submit: (
                StatusCode::OK,
                r#"{"prompt_id":"abc123","number":1,"node_errors":{}}"#.to_string(),
            ),
            history: ready_after(0, "Z-Image_00001_.png"),
            view: (StatusCode::OK, Some("image/png"), png_bytes()),
        }
    }
}

/// Request counters and captured inputs of a running stub relay.
#[derive(Default)]
pub struct StubRecorder {
    pub health_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub view_calls: AtomicUsize,
    pub last_submit: Mutex<Option<Value>>,
    pub last_view_query: Mutex<Option<HashMap<String, String>>>,
}

impl StubRecorder {
    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn view_calls(&self) -> usize {
        self.view_calls.load(Ordering::SeqCst)
    }

    pub fn last_submit(&self) -> Option<Value> {
        self.last_submit.lock().unwrap().clone()
    }

    pub fn last_view_query(&self) -> Option<HashMap<String, String>> {
        self.last_view_query.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct StubState {
    config: StubConfig,
    recorder: Arc<StubRecorder>,
}

/// A stub relay listening on an ephemeral local port.
pub struct StubRelay {
    pub base_url: String,
    pub recorder: Arc<StubRecorder>,
}

impl StubRelay {
    pub async fn spawn(config: StubConfig) -> Self {
        let recorder = Arc::new(StubRecorder::default());
        let state = StubState {
            config,
            recorder: Arc::clone(&recorder),
        };

        let app = Router::new()
            .route("/api/health", get(health))
            .route("/api/prompt", post(submit))
            .route("/api/history/{id}", get(history))
            .route("/api/view", get(view))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            recorder,
        }
    }

    /// Relay client with a memory sink attached.
    pub fn api(&self) -> (RelayApi, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let api = RelayApi::new(&self.base_url).with_log(JobLog::new(Some(sink.clone())));
        (api, sink)
    }
}

async fn health(State(state): State<StubState>) -> Response {
    state.recorder.health_calls.fetch_add(1, Ordering::SeqCst);
    let (status, body) = state.config.health.clone();
    (status, body).into_response()
}

async fn submit(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    state.recorder.submit_calls.fetch_add(1, Ordering::SeqCst);
    *state.recorder.last_submit.lock().unwrap() = Some(body);
    let (status, body) = state.config.submit.clone();
    (status, [(CONTENT_TYPE, "application/json")], body).into_response()
}

async fn history(State(state): State<StubState>, Path(id): Path<String>) -> Response {
    let n = state.recorder.history_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let (status, body) = (state.config.history)(n, &id);
    (status, [(CONTENT_TYPE, "application/json")], body).into_response()
}

async fn view(
    State(state): State<StubState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.recorder.view_calls.fetch_add(1, Ordering::SeqCst);
    *state.recorder.last_view_query.lock().unwrap() = Some(query);
    let (status, content_type, bytes) = state.config.view.clone();
    let mut builder = Response::builder().status(status);
    if let Some(ct) = content_type {
        builder = builder.header(CONTENT_TYPE, ct);
    }
    builder.body(Body::from(bytes)).unwrap()
}

// ---------------------------------------------------------------------------
// Canned history answers
// ---------------------------------------------------------------------------

/// History record for `id` whose single output node holds `filename`.
pub fn record_with_image(id: &str, filename: &str) -> String {
    json!({
        id: {
            "outputs": {
                "9": {"images": [{"filename": filename, "subfolder": "", "type": "output"}]}
            },
            "status": {"status_str": "success", "completed": true, "messages": []}
        }
    })
    .to_string()
}

/// Empty history for `pending` attempts, then a record with one image.
pub fn ready_after(pending: usize, filename: &'static str) -> HistoryFn {
    Arc::new(move |n: usize, id: &str| {
        if n <= pending {
            (StatusCode::OK, "{}".to_string())
        } else {
            (StatusCode::OK, record_with_image(id, filename))
        }
    })
}

/// History that never produces outputs.
pub fn never_ready() -> HistoryFn {
    Arc::new(|_: usize, _: &str| (StatusCode::OK, "{}".to_string()))
}

/// Fast poll policy keeping the default attempt bound.
pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        ..PollPolicy::default()
    }
}

/// The 8-byte PNG signature followed by a few payload bytes.
pub fn png_bytes() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3, 4]
}
