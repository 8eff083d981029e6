/*!
Stub introspection daemon for tests without a Hadoop cluster

Serves whatever `StubBehavior` is currently set on every path (`/jmx`,
`/ws/v1/cluster/apps?...`) from an ephemeral port on 127.0.0.1, and records
each request target for assertions.
*/

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the stub answers with.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// 200 with this JSON body.
    Json(Value),
    /// 200 with a raw body, for malformed payloads.
    Raw(String),
    /// Bare status code, no body.
    Status(u16),
    /// 307 to this location, like a standby ResourceManager.
    Redirect(String),
    /// Sleep before answering `{}`; longer than the client timeout means a timeout.
    Hang(Duration),
}

#[derive(Clone)]
struct StubState {
    behavior: Arc<Mutex<StubBehavior>>,
    requests: Arc<Mutex<Vec<String>>>,
}

pub struct StubDaemon {
    addr: SocketAddr,
    state: StubState,
    server: JoinHandle<()>,
}

impl StubDaemon {
    pub async fn start(behavior: StubBehavior) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = StubState {
            behavior: Arc::new(Mutex::new(behavior)),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new().fallback(answer).with_state(state.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::warn!("[STUB] server stopped: {e}");
            }
        });
        log::info!("[STUB] introspection daemon on {addr}");
        Ok(Self { addr, state, server })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `127.0.0.1:<port>`, ready for a site file address value.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn set_behavior(&self, behavior: StubBehavior) {
        *self.state.behavior.lock().unwrap() = behavior;
    }

    /// Request targets (path and query) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

impl Drop for StubDaemon {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn answer(State(state): State<StubState>, uri: Uri) -> Response {
    state.requests.lock().unwrap().push(uri.to_string());
    let behavior = state.behavior.lock().unwrap().clone();
    match behavior {
        StubBehavior::Json(body) => Json(body).into_response(),
        StubBehavior::Raw(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        StubBehavior::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        StubBehavior::Redirect(location) => (
            StatusCode::TEMPORARY_REDIRECT,
            [(header::LOCATION, location)],
            "This is standby RM. Redirecting to the current active RM",
        )
            .into_response(),
        StubBehavior::Hang(delay) => {
            tokio::time::sleep(delay).await;
            Json(Value::Object(Default::default())).into_response()
        }
    }
}
