use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use reqwest::{Method, Request, Response, StatusCode, Url};

use crate::{ErrorKind, Executor, Result};

/// Builds a raw response with the given status and body
pub(crate) fn response(status: u16, body: &str) -> Response {
    let response = http::Response::builder()
        .status(status)
        .body(body.to_owned())
        .expect("Expected valid test response");
    Response::from(response)
}

/// Builds a `GET` request for `path` on `http://example.com`
pub(crate) fn request_to(path: &str) -> Request {
    let url = Url::parse("http://example.com")
        .and_then(|base| base.join(path))
        .expect("Expected valid test URL");
    Request::new(Method::GET, url)
}

/// Executor which answers every request with `200 OK` after a fixed delay and
/// records how many requests were in flight at the same time
#[derive(Debug)]
pub(crate) struct ConcurrencyProbe {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl ConcurrencyProbe {
    pub(crate) const fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    /// Highest number of simultaneous requests observed so far
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of requests executed so far
    pub(crate) fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for ConcurrencyProbe {
    async fn execute(&self, _request: Request) -> Result<Response> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(response(200, ""))
    }
}

/// What a [`SequenceRecorder`] saw of a request
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
}

/// Executor recording requests in the order they complete.
///
/// A request carrying an `x-delay-ms` header is held for that long before
/// it is recorded.
#[derive(Debug, Clone, Default)]
pub(crate) struct SequenceRecorder {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl SequenceRecorder {
    pub(crate) fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    pub(crate) fn last(&self) -> Option<Recorded> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Executor for SequenceRecorder {
    async fn execute(&self, request: Request) -> Result<Response> {
        let delay = request
            .headers()
            .get("x-delay-ms")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        self.requests.lock().unwrap().push(Recorded {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
        });
        Ok(response(StatusCode::OK.as_u16(), ""))
    }
}

/// Executor which fails every request as if the connection was refused
#[derive(Debug)]
pub(crate) struct FailingExecutor;

#[async_trait]
impl Executor for FailingExecutor {
    async fn execute(&self, _request: Request) -> Result<Response> {
        Err(ErrorKind::Transport(
            std::io::Error::other("connection refused").into(),
        ))
    }
}
