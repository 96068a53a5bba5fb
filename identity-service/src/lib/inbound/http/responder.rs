//! Per-request response guard.
//!
//! `SafeResponder` commits a status exactly once and refuses every write
//! once the owning request has been cancelled or has passed its deadline.
//! `track_response` runs each request through one and logs what was sent.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use axum::body::to_bytes;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use tokio::time::Instant;

use super::handlers::messages;
use super::handlers::ApiResponseBody;
use super::router::HttpSettings;

/// Destination of a committed response.
pub trait ResponseSink: Send {
    fn send_status(&mut self, status: StatusCode);

    /// Returns the number of bytes accepted.
    fn send_body(&mut self, chunk: &[u8]) -> usize;
}

/// Sink that keeps the response in memory.
#[derive(Debug, Default)]
pub struct BufferedSink {
    status: Option<StatusCode>,
    body: Vec<u8>,
}

impl BufferedSink {
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl ResponseSink for BufferedSink {
    fn send_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn send_body(&mut self, chunk: &[u8]) -> usize {
        self.body.extend_from_slice(chunk);
        chunk.len()
    }
}

/// Cancellation flag and optional deadline of one request.
#[derive(Debug)]
pub struct RequestScope {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl RequestScope {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            deadline: timeout.and_then(|timeout| Instant::now().checked_add(timeout)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Cancels the scope when dropped, including when the request future is
/// dropped because the client went away.
#[derive(Debug)]
pub struct CancelOnDrop(Arc<RequestScope>);

impl CancelOnDrop {
    pub fn new(scope: Arc<RequestScope>) -> Self {
        Self(scope)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

struct ResponderState<S> {
    sink: S,
    status: StatusCode,
    committed: bool,
    bytes_written: usize,
}

/// Response writer safe to share between tasks of one request.
pub struct SafeResponder<S: ResponseSink> {
    state: Mutex<ResponderState<S>>,
    scope: Arc<RequestScope>,
}

impl<S: ResponseSink> SafeResponder<S> {
    pub fn new(sink: S, scope: Arc<RequestScope>) -> Self {
        Self {
            state: Mutex::new(ResponderState {
                sink,
                status: StatusCode::OK,
                committed: false,
                bytes_written: 0,
            }),
            scope,
        }
    }

    /// Commit `status`. Ignored once a status has been committed or the
    /// request is done.
    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.lock();

        if self.scope.is_done() {
            tracing::debug!(status = status.as_u16(), "Status set on finished request");
            return;
        }

        if state.committed {
            tracing::debug!(
                status = status.as_u16(),
                committed = state.status.as_u16(),
                "Superfluous status write"
            );
            return;
        }

        state.status = status;
        state.sink.send_status(status);
        state.committed = true;
    }

    /// Write a body chunk, committing an implicit 200 first if no status was
    /// set. Returns 0 without writing once the request is done.
    pub fn write(&self, chunk: &[u8]) -> usize {
        let mut state = self.lock();

        if self.scope.is_done() {
            return 0;
        }

        if !state.committed {
            let status = state.status;
            state.sink.send_status(status);
            state.committed = true;
        }

        let written = state.sink.send_body(chunk);
        state.bytes_written += written;
        written
    }

    pub fn status(&self) -> StatusCode {
        self.lock().status
    }

    pub fn bytes_written(&self) -> usize {
        self.lock().bytes_written
    }

    pub fn is_committed(&self) -> bool {
        self.lock().committed
    }

    pub fn into_sink(self) -> S {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
    }

    fn lock(&self) -> MutexGuard<'_, ResponderState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run the request under a timeout-bound scope, commit the handler's response
/// through a `SafeResponder` and log the outcome.
pub async fn track_response(
    State(settings): State<HttpSettings>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let remote = remote_addr(&req);

    let scope = Arc::new(RequestScope::new(Some(settings.request_timeout)));
    let _guard = CancelOnDrop::new(Arc::clone(&scope));
    let responder = SafeResponder::new(BufferedSink::default(), Arc::clone(&scope));

    let outcome = tokio::time::timeout(settings.request_timeout, next.run(req)).await;
    let (response, bytes) = match outcome {
        Ok(response) => commit(responder, response).await,
        Err(_) => {
            scope.cancel();
            timed_out()
        }
    };

    tracing::info!(
        method = %method,
        uri = %uri,
        remote = %remote,
        status = response.status().as_u16(),
        bytes = bytes,
        latency_ms = started.elapsed().as_millis(),
        "Request served"
    );

    response
}

async fn commit(responder: SafeResponder<BufferedSink>, response: Response) -> (Response, usize) {
    let (mut parts, body) = response.into_parts();

    responder.set_status(parts.status);
    match to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            responder.write(&bytes);
        }
        Err(e) => tracing::error!(error = %e, "Failed to read response body"),
    }

    if !responder.is_committed() {
        return timed_out();
    }

    let status = responder.status();
    let bytes = responder.bytes_written();
    let body = responder.into_sink().into_body();

    parts.status = status;
    parts.headers.remove(header::CONTENT_LENGTH);

    (Response::from_parts(parts, Body::from(body)), bytes)
}

fn timed_out() -> (Response, usize) {
    let body = serde_json::to_vec(&ApiResponseBody::message(messages::REQUEST_TIMEOUT))
        .unwrap_or_default();
    let bytes = body.len();

    let response = (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response();

    (response, bytes)
}

/// Client address: `X-Real-IP`, then the first `X-Forwarded-For` entry, then
/// the peer address, else "unknown".
pub fn remote_addr(req: &Request) -> String {
    forwarded_for(req.headers())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    header_value("x-real-ip")
        .or_else(|| {
            header_value("x-forwarded-for")
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .map(str::to_string)
}
