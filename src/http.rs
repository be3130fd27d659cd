//! Client handles bound to a base URL.
//!
//! A request/response cycle is split into two roles: a [`Requestable`]
//! produces the concrete request for a base URL together with a
//! [`Responder`], which later turns the raw response into a result. The
//! [`HttpClient`] connects the two through an [`Executor`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Request, Response};
use url::Url;

use crate::{ErrorKind, Executor, Result};

/// A value that can produce a concrete request against a base URL.
pub trait Requestable {
    /// Handler for the response to the produced request
    type Responder: Responder;

    /// Resolves the request against `base_url`.
    ///
    /// Resolution must be a pure function of `self` and `base_url`; calling
    /// it twice yields identical requests.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if no valid request can be built. No network call
    /// must be attempted in that case.
    fn http_request(&self, base_url: &Url) -> Result<(Request, Self::Responder)>;
}

/// A value that turns a raw response into the terminal result of a request.
#[async_trait]
pub trait Responder: Send + Sized {
    /// What a successful response resolves to
    type Output: Send;

    /// Consumes the response, including its body.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the response is deemed a failure.
    async fn on_http_response(self, response: Response) -> Result<Self::Output>;
}

/// Sends requests relative to a fixed base URL through a shared executor.
///
/// Cloning is cheap and clones share the executor, and therefore its
/// admission limit.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: std::result::Result<Url, url::ParseError>,
    executor: Arc<dyn Executor>,
}

impl HttpClient {
    /// Creates a client, validating `base_url` eagerly.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `base_url` is not an absolute URL, or if its
    /// scheme is neither `http` nor `https`.
    pub fn new(base_url: &str, executor: Arc<dyn Executor>) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ErrorKind::UnsupportedScheme(base_url.scheme().to_string()));
        }

        Ok(Self {
            base_url: Ok(with_trailing_slash(base_url)),
            executor,
        })
    }

    /// Creates a client without validating `base_url`.
    ///
    /// An unparsable URL is remembered and reported by [`HttpClient::send`].
    #[must_use]
    pub fn permissive(base_url: &str, executor: Arc<dyn Executor>) -> Self {
        Self {
            base_url: Url::parse(base_url).map(with_trailing_slash),
            executor,
        }
    }

    /// The base URL requests are resolved against, if it could be parsed
    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref().ok()
    }

    /// Runs a full request/response cycle.
    ///
    /// The request is resolved against the base URL, passed to the executor
    /// and the response handed to the responder.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if
    /// - the base URL of this client could not be parsed,
    /// - the request cannot be resolved,
    /// - the executor fails, or
    /// - the responder rejects the response.
    pub async fn send<R: Requestable>(
        &self,
        requestable: &R,
    ) -> Result<<R::Responder as Responder>::Output> {
        let base_url = self.base_url.as_ref().map_err(|e| ErrorKind::MalformedUrl(*e))?;
        let (request, responder) = requestable.http_request(base_url)?;

        let method = request.method().clone();
        let url = request.url().clone();
        log::debug!("Sending {method} {url}");

        let response = self.executor.execute(request).await?;
        log::debug!("{method} {url} returned status {}", response.status());

        responder.on_http_response(response).await
    }
}

/// Appends `/` to the path of `url` unless it already ends with one, so that
/// relative paths resolve below it.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::test_utils::{FailingExecutor, SequenceRecorder};

    fn executor() -> Arc<dyn Executor> {
        Arc::new(SequenceRecorder::default())
    }

    #[test]
    fn test_new_fails_for_malformed_urls() {
        let error = HttpClient::new(":/", executor()).unwrap_err();
        assert!(matches!(error, ErrorKind::MalformedUrl(_)));
        assert!(error.to_string().starts_with("malformed URL"));
    }

    #[rstest]
    #[case("ftp://example.com")]
    #[case("file:///etc/hosts")]
    #[case("mailto:someone@example.com")]
    fn test_new_fails_for_invalid_protocols(#[case] url: &str) {
        let error = HttpClient::new(url, executor()).unwrap_err();
        assert_eq!(error.to_string(), "Only http and https are supported");
    }

    #[rstest]
    #[case("http://example.com", "http://example.com/")]
    #[case("https://example.com/", "https://example.com/")]
    #[case("http://example.com/doc", "http://example.com/doc/")]
    #[case("http://example.com/doc/", "http://example.com/doc/")]
    #[case("http://example.com/doc?q=1", "http://example.com/doc/?q=1")]
    fn test_new_ensures_base_url_has_a_trailing_slash(#[case] url: &str, #[case] expected: &str) {
        let client = HttpClient::new(url, executor()).unwrap();
        assert_eq!(client.base_url().unwrap().as_str(), expected);
    }

    #[tokio::test]
    async fn test_permissive_client_fails_on_use() {
        let recorder = SequenceRecorder::default();
        let client = HttpClient::permissive("not a url", Arc::new(recorder.clone()));
        assert!(client.base_url().is_none());

        let error = client.send(&crate::JsonRequest::get("")).await.unwrap_err();
        assert!(matches!(error, ErrorKind::MalformedUrl(_)));
        assert!(recorder.paths().is_empty());
    }

    #[test]
    fn test_permissive_client_accepts_any_scheme() {
        let client = HttpClient::permissive("ftp://example.com", executor());
        assert_eq!(client.base_url().unwrap().as_str(), "ftp://example.com/");
    }

    #[tokio::test]
    async fn test_send_propagates_transport_errors() {
        let client = HttpClient::new("http://example.com", Arc::new(FailingExecutor)).unwrap();
        let error = client.send(&crate::JsonRequest::get("")).await.unwrap_err();
        assert!(matches!(error, ErrorKind::Transport(_)));
        assert_eq!(error.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn test_clients_share_executor() {
        let recorder = SequenceRecorder::default();
        let executor: Arc<dyn Executor> = Arc::new(recorder.clone());
        let docs = HttpClient::new("http://example.com/doc", Arc::clone(&executor)).unwrap();
        let api = HttpClient::new("http://example.com/api", executor).unwrap();

        docs.send(&crate::JsonRequest::get("index")).await.unwrap();
        api.send(&crate::JsonRequest::get("/v1/items")).await.unwrap();

        assert_eq!(recorder.paths(), vec!["/doc/index", "/api/v1/items"]);
    }
}
