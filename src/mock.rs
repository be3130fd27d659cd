//! A fake transport for testing code built on `sling`.
//!
//! [`Transport`] replaces the network: it records the request it is given
//! and replays a configured response. Its `assert_*` methods panic with a
//! descriptive message when the recorded request does not match, so they can
//! be used directly inside `#[test]` functions.
//!
//! A transport is designed for a single request/response cycle. Sending
//! again overwrites the recorded request.
//!
//! This module is available in this crate's own tests and, for downstream
//! crates, with the `mock` feature.
//!
//! ```
//! # #[tokio::main]
//! # async fn main() {
//! use sling::{mock, JsonRequest};
//!
//! let (client, transport) = mock::new_http("http://example.com/api");
//! transport.set_response_body(r#"{"id": 7}"#);
//!
//! let document = client
//!     .send(&JsonRequest::get("/items/7").success::<serde_json::Value>())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(document["id"], 7);
//! transport.assert_request_path("/api/items/7");
//! transport.assert_response_body_closed();
//! # }
//! ```

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use http::HeaderMap;
use reqwest::{Body, Method, Request, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::{ConnectionPool, ErrorKind, Executor, HttpClient, PoolConfig, Result};

/// A valid URL which does not point anywhere, for when a URL must parse
pub const DEFAULT_URL: &str = "http://httpmock.default.url.tld";

/// A document every JSON parser rejects
const INVALID_JSON: &str = "{[";

/// Error returned by [`Transport::set_response_error`]
const TRANSPORT_ERROR: &str = "Fake HTTP transport error";

/// Returns a connection pool whose clients send every request to the
/// returned transport.
#[must_use]
pub fn connection_pool() -> (ConnectionPool, Transport) {
    let transport = Transport::new();
    let pool = ConnectionPool::with_executor(PoolConfig::default(), transport.clone());
    (pool, transport)
}

/// Returns a client for `base_url` with its own connection pool, sending
/// every request to the returned transport.
///
/// `base_url` is not validated.
#[must_use]
pub fn new_http(base_url: &str) -> (HttpClient, Transport) {
    let (pool, transport) = connection_pool();
    (pool.http(base_url), transport)
}

/// A fake [`Executor`] replaying a configured response.
///
/// Clones share their state, so a clone can be handed to a pool while the
/// original is kept for configuration and assertions.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    request: Option<RecordedRequest>,
    status: Option<StatusCode>,
    body: Option<String>,
    fail: bool,
    body_closed: Option<Arc<AtomicBool>>,
}

/// The parts of a request the transport keeps for assertions
#[derive(Debug, Clone)]
struct RecordedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl From<&Request> for RecordedRequest {
    fn from(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body: request.body().and_then(Body::as_bytes).map(<[u8]>::to_vec),
        }
    }
}

/// Response body which remembers whether it was dropped
struct ClosableBody {
    chunk: Option<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl Stream for ClosableBody {
    type Item = std::io::Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunk.take().map(Ok))
    }
}

impl Drop for ClosableBody {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Executor for Transport {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut state = self.state();
        state.request = Some(RecordedRequest::from(&request));
        if state.fail {
            return Err(ErrorKind::Transport(
                std::io::Error::other(TRANSPORT_ERROR).into(),
            ));
        }

        let closed = Arc::new(AtomicBool::new(false));
        state.body_closed = Some(Arc::clone(&closed));
        let body = ClosableBody {
            chunk: Some(state.body.clone().unwrap_or_default().into_bytes()),
            closed,
        };

        let response = http::Response::builder()
            .status(state.status.unwrap_or(StatusCode::OK))
            .body(Body::wrap_stream(body))
            .map_err(|e| ErrorKind::Transport(e.into()))?;
        Ok(Response::from(response))
    }
}

impl Transport {
    /// Creates a transport answering `200 OK` with an empty body
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking assertion poisons the lock, the state is still usable.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn request(&self) -> RecordedRequest {
        self.state()
            .request
            .clone()
            .unwrap_or_else(|| panic!("No HTTP requests were made."))
    }

    /// Sets the status code of the response.
    ///
    /// # Panics
    ///
    /// Panics if `status` is not a valid status code.
    pub fn set_response_status_code(&self, status: u16) {
        let status = StatusCode::from_u16(status)
            .unwrap_or_else(|_| panic!("Invalid HTTP status code {status}"));
        self.state().status = Some(status);
    }

    /// Sets the response body
    pub fn set_response_body(&self, body: &str) {
        self.state().body = Some(body.to_owned());
    }

    /// Sets the response body to `data` encoded as JSON.
    ///
    /// # Panics
    ///
    /// Panics if `data` cannot be encoded.
    pub fn set_response_body_json<T: Serialize + ?Sized>(&self, data: &T) {
        match serde_json::to_string(data) {
            Ok(body) => self.set_response_body(&body),
            Err(e) => panic!("Failed to set response body JSON: {e}"),
        }
    }

    /// Sets the response body to a document every JSON parser rejects
    pub fn set_response_body_invalid_json(&self) {
        self.set_response_body(INVALID_JSON);
    }

    /// Makes the transport fail the request, as if the connection broke
    pub fn set_response_error(&self) {
        self.state().fail = true;
    }

    /// Returns `true` once a request was passed to the transport
    #[must_use]
    pub fn request_made(&self) -> bool {
        self.state().request.is_some()
    }

    /// Asserts that the request used `method`.
    ///
    /// # Panics
    ///
    /// Panics if no request was made or the method differs. The same goes for
    /// all other `assert_*` methods.
    pub fn assert_request_method(&self, method: &Method) {
        let actual = self.request().method;
        assert!(
            actual == method,
            "Expected HTTP request to be made with method {method}, but was {actual}"
        );
    }

    /// Asserts that the requested URL used the `http` scheme
    pub fn assert_request_protocol_is_http(&self) {
        let url = self.request().url;
        assert!(
            url.scheme() == "http",
            "Expected HTTP request to have been made with protocol 'http', but was '{}'",
            url.scheme()
        );
    }

    /// Asserts that the requested URL has the given host
    pub fn assert_request_host(&self, host: &str) {
        let url = self.request().url;
        let actual = url.host_str().unwrap_or_default();
        assert!(
            actual == host,
            "Expected HTTP request to have been made to host '{host}', but was '{actual}'"
        );
    }

    /// Asserts that the requested URL has the given path
    pub fn assert_request_path(&self, path: &str) {
        let url = self.request().url;
        assert!(
            url.path() == path,
            "Expected HTTP request to have path '{path}', but was '{}'",
            url.path()
        );
    }

    /// Asserts that the first value of the `name` header equals `value`
    pub fn assert_request_header(&self, name: &str, value: &str) {
        let headers = self.request().headers;
        let actual = headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        assert!(
            actual == value,
            "Expected request to have value \"{value}\" for the \"{name}\" header, but was \"{actual}\""
        );
    }

    /// Asserts that the `Content-Type` header equals `content_type`
    pub fn assert_request_content_type(&self, content_type: &str) {
        self.assert_request_header(http::header::CONTENT_TYPE.as_str(), content_type);
    }

    /// Asserts that the request accepts responses of `content_type`.
    ///
    /// The `Accept` header must equal `content_type` exactly. Lists of media
    /// types and parameters are not understood.
    pub fn assert_request_accepts(&self, content_type: &str) {
        self.assert_request_header(http::header::ACCEPT.as_str(), content_type);
    }

    /// Decodes the request body as JSON and passes it to `check` for further
    /// assertions.
    pub fn assert_request_body_json<T, F>(&self, check: F)
    where
        T: DeserializeOwned,
        F: FnOnce(T),
    {
        let Some(body) = self.request().body else {
            panic!("HTTP request was made without a body");
        };
        match serde_json::from_slice(&body) {
            Ok(json) => check(json),
            Err(e) => panic!("HTTP request body is not the expected JSON: {e}"),
        }
    }

    /// Asserts that the code under test closed the response body
    pub fn assert_response_body_closed(&self) {
        let closed = self
            .state()
            .body_closed
            .as_ref()
            .is_some_and(|closed| closed.load(Ordering::SeqCst));
        assert!(closed, "HTTP response body was not closed");
    }
}
