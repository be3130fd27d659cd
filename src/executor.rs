//! Request execution.
//!
//! [`Executor`] is the seam between this crate and the transport which
//! actually talks to the network. [`ThrottledExecutor`] wraps any executor
//! and admits at most a fixed number of requests at once.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::gate::AdmissionGate;
use crate::{ErrorKind, Result};

/// Something that can turn a request into a response.
///
/// Implemented for [`reqwest::Client`]. Implement it yourself to route
/// requests through a test double or an instrumented transport.
#[async_trait]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Sends the request and returns the raw response.
    ///
    /// HTTP error statuses are not errors at this level.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if no response could be obtained.
    async fn execute(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl Executor for reqwest::Client {
    async fn execute(&self, request: Request) -> Result<Response> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(ErrorKind::NetworkRequest)
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, request: Request) -> Result<Response> {
        (**self).execute(request).await
    }
}

/// Wraps an [`Executor`], holding a permit of an [`AdmissionGate`] for the
/// duration of every call.
///
/// Requests and responses pass through untouched. Nothing is retried and
/// status codes are not interpreted.
#[derive(Debug)]
pub struct ThrottledExecutor<E> {
    gate: AdmissionGate,
    inner: E,
}

impl<E: Executor> ThrottledExecutor<E> {
    /// Wraps `inner`, allowing at most `max_requests` calls to it at a time.
    ///
    /// Zero falls back to [`DEFAULT_POOL_SIZE`](crate::DEFAULT_POOL_SIZE).
    #[must_use]
    pub fn new(inner: E, max_requests: usize) -> Self {
        Self {
            gate: AdmissionGate::new(max_requests),
            inner,
        }
    }

    /// The gate guarding the wrapped executor
    #[must_use]
    pub const fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// The wrapped executor
    #[must_use]
    pub const fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: Executor> Executor for ThrottledExecutor<E> {
    async fn execute(&self, request: Request) -> Result<Response> {
        let _permit = self.gate.acquire().await?;
        self.inner.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use reqwest::Method;
    use rstest::rstest;

    use super::*;
    use crate::test_utils::{request_to, ConcurrencyProbe, SequenceRecorder};

    #[rstest]
    #[case(1, 5)]
    #[case(2, 10)]
    #[case(4, 16)]
    #[case(8, 3)]
    #[tokio::test]
    async fn test_concurrency_never_exceeds_pool_size(
        #[case] pool_size: usize,
        #[case] requests: usize,
    ) {
        let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(10)));
        let executor = Arc::new(ThrottledExecutor::new(Arc::clone(&probe), pool_size));

        let calls = (0..requests).map(|i| {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor
                    .execute(request_to(&format!("/{i}")))
                    .await
                    .map(|_| ())
            })
        });
        for result in join_all(calls).await {
            result.unwrap().unwrap();
        }

        assert_eq!(probe.total(), requests);
        assert!(probe.peak() <= pool_size);
        assert_eq!(probe.peak(), pool_size.min(requests));
        assert_eq!(executor.gate().available(), pool_size);
    }

    #[tokio::test]
    async fn test_queued_request_runs_after_slow_ones() {
        let recorder = SequenceRecorder::default();
        let executor = Arc::new(ThrottledExecutor::new(recorder.clone(), 1));

        let mut handles = Vec::new();
        for (path, delay) in [("/first", 100), ("/second", 100), ("/last", 0)] {
            let executor = Arc::clone(&executor);
            let mut request = request_to(path);
            request
                .headers_mut()
                .insert("x-delay-ms", delay.to_string().parse().unwrap());
            handles.push(tokio::spawn(async move { executor.execute(request).await }));
            // let the task queue up before spawning the next one
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(recorder.paths(), vec!["/first", "/second", "/last"]);
    }

    #[tokio::test]
    async fn test_errors_pass_through_and_release_permit() {
        let executor = ThrottledExecutor::new(crate::test_utils::FailingExecutor, 1);

        for _ in 0..3 {
            let err = executor.execute(request_to("/")).await.unwrap_err();
            assert_eq!(err.to_string(), "connection refused");
        }
        assert_eq!(executor.gate().available(), 1);
    }

    #[tokio::test]
    async fn test_request_is_not_modified() {
        let recorder = SequenceRecorder::default();
        let executor = ThrottledExecutor::new(recorder.clone(), 2);

        let mut request = Request::new(
            Method::PATCH,
            "http://example.com/doc/item".parse().unwrap(),
        );
        request
            .headers_mut()
            .insert("x-custom", "value".parse().unwrap());
        let response = executor.execute(request).await.unwrap();

        assert_eq!(response.status(), 200);
        let seen = recorder.last().unwrap();
        assert_eq!(seen.method, Method::PATCH);
        assert_eq!(seen.url.as_str(), "http://example.com/doc/item");
        assert_eq!(seen.headers["x-custom"], "value");
    }
}
