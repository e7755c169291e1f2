//! Mock AI Gateway endpoint for integration tests
//!
//! Accepts any POST, records what arrived and answers with a canned body

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// One request received by the mock
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl Recorded {
    /// Body parsed as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// Header value as text, if present
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Canned answer returned for every request
#[derive(Debug, Clone)]
pub enum Reply {
    Json(StatusCode, serde_json::Value),
    EventStream(&'static str),
}

struct MockState {
    requests: Mutex<Vec<Recorded>>,
    reply: Reply,
}

/// Mock gateway that records incoming requests
pub struct MockGateway {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockGateway {
    /// Start a mock answering `{"ok": true}`
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(Reply::Json(StatusCode::OK, serde_json::json!({"ok": true}))).await
    }

    /// Start a mock with a custom reply
    pub async fn start_with(reply: Reply) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            requests: Mutex::new(Vec::new()),
            reply,
        });

        let app = Router::new()
            .route("/{*path}", routing::any(handle))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL to point a fetcher at
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// The only request received; panics otherwise
    pub fn single_request(&self) -> Recorded {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request, got {requests:?}");
        requests.into_iter().next().unwrap()
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(Recorded {
        method,
        path: uri.to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    match &state.reply {
        Reply::Json(status, value) => (*status, axum::Json(value.clone())).into_response(),
        Reply::EventStream(events) => ([(header::CONTENT_TYPE, "text/event-stream")], *events).into_response(),
    }
}
