//! Fluent construction of JSON request/response exchanges.
//!
//! A [`JsonRequest`] collects the method, path, headers and body of a
//! request, the types its responses decode into, and errors to return for
//! specific status codes. Handing it to
//! [`HttpClient::send`](crate::HttpClient::send) resolves it against the
//! client's base URL and decodes the response.
//!
//! # Error resolution
//!
//! A response with a status below 400 decodes into the success type, if one
//! was registered. For any other status the first match of the following
//! wins:
//!
//! 1. an error registered with [`JsonRequest::status_error`] for exactly
//!    this status, in which case the body is never read,
//! 2. a failure type registered with [`JsonRequest::failure`] or
//!    [`JsonRequest::errorable_response`], decoded from the body and
//!    converted with [`Errorable::into_error`],
//! 3. [`ErrorKind::Status`], naming the method, the URL and the status.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Request, Response, StatusCode};
use serde::{
    de::{DeserializeOwned, IgnoredAny},
    Serialize,
};
use url::Url;

use crate::types::{BoxError, SerializeError, SharedError};
use crate::{ErrorKind, Requestable, Responder, Result};

/// Media type sent in the `Content-Type` and `Accept` headers
pub const APPLICATION_JSON: &str = "application/json";

/// Conversion of a decoded failure body into the error returned to the
/// caller.
///
/// Every error type is `Errorable` and returns itself. Implement it for
/// response types which are not errors themselves, e.g. when one type
/// describes all responses of an API, or when failures should map onto
/// error constants.
///
/// ```
/// use serde::Deserialize;
/// use sling::{BoxError, Errorable};
///
/// #[derive(Deserialize)]
/// struct ApiFailure {
///     message: String,
/// }
///
/// impl Errorable for ApiFailure {
///     fn into_error(self) -> BoxError {
///         self.message.into()
///     }
/// }
/// ```
pub trait Errorable {
    /// Converts the decoded body into an error
    fn into_error(self) -> BoxError;
}

impl<E: std::error::Error + Send + Sync + 'static> Errorable for E {
    fn into_error(self) -> BoxError {
        Box::new(self)
    }
}

/// Decodes a failure body, yielding the error it stands for if it has one
type FailureDecoder = fn(&[u8]) -> serde_json::Result<Option<BoxError>>;

/// How successful responses are turned into the output of a request
enum Target<S> {
    /// Leave the body alone
    Ignore(fn() -> S),
    /// Decode the body as JSON
    Json(fn(&[u8]) -> serde_json::Result<S>),
}

impl<S> Clone for Target<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Target<S> {}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(body)
}

fn decode_errorable<F: DeserializeOwned + Errorable>(
    body: &[u8],
) -> serde_json::Result<Option<BoxError>> {
    serde_json::from_slice::<F>(body).map(|failure| Some(failure.into_error()))
}

fn decode_discarding<T: DeserializeOwned>(body: &[u8]) -> serde_json::Result<Option<BoxError>> {
    serde_json::from_slice::<T>(body).map(|_| None)
}

/// Builder for a request whose response is a JSON document.
///
/// `S` is the type successful responses decode into, `()` until
/// [`JsonRequest::success`] or [`JsonRequest::response`] is called.
///
/// ```no_run
/// use serde::Deserialize;
/// use sling::{new_http, JsonRequest, PoolConfig, Result};
///
/// #[derive(Deserialize)]
/// struct Document {
///     title: String,
/// }
///
/// # async fn run() -> Result<()> {
/// let client = new_http("https://example.com/api", PoolConfig::default())?;
/// let document = client
///     .send(&JsonRequest::get("/documents/7").success::<Document>())
///     .await?;
/// println!("{}", document.title);
/// # Ok(())
/// # }
/// ```
pub struct JsonRequest<S = ()> {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<std::result::Result<Vec<u8>, SerializeError>>,
    success: Target<S>,
    failure: Option<FailureDecoder>,
    status_errors: HashMap<StatusCode, SharedError>,
}

impl JsonRequest {
    /// Creates a builder for a request with the given method and path.
    ///
    /// The path is resolved relative to the base URL of the client sending
    /// the request, even when it starts with `/`.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            success: Target::Ignore(|| ()),
            failure: None,
            status_errors: HashMap::new(),
        }
    }

    /// Creates a builder for a `GET` request
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a builder for a `POST` request
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a builder for a `PUT` request
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a builder for a `PATCH` request
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Creates a builder for a `DELETE` request
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }
}

impl<S> JsonRequest<S> {
    /// Adds a request header.
    ///
    /// Headers are never replaced: adding a name twice sends both values,
    /// in the order they were added. `Content-Type` and `Accept` are always
    /// sent as `application/json`, whatever is set here.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request body to `body` encoded as JSON.
    ///
    /// The body is encoded right away. If that fails, the error is reported
    /// when the request is sent and nothing goes over the wire.
    #[must_use]
    pub fn body<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = Some(serde_json::to_vec(body).map_err(SerializeError::from));
        self
    }

    /// Decodes successful and unsuccessful responses into `T`.
    ///
    /// Failure bodies are only decoded to validate them, a valid one still
    /// fails with [`ErrorKind::Status`]. Use
    /// [`JsonRequest::errorable_response`] when `T` can stand for an error.
    #[must_use]
    pub fn response<T: DeserializeOwned>(self) -> JsonRequest<T> {
        let mut request = self.success::<T>();
        request.failure = Some(decode_discarding::<T>);
        request
    }

    /// Decodes successful and unsuccessful responses into `T`, which
    /// describes every response of an API.
    ///
    /// A decoded failure body is converted with [`Errorable::into_error`]
    /// and returned as the error.
    #[must_use]
    pub fn errorable_response<T: DeserializeOwned + Errorable>(self) -> JsonRequest<T> {
        self.success::<T>().failure::<T>()
    }

    /// Decodes responses with a status below 400 into `T`, which becomes the
    /// output of the request.
    #[must_use]
    pub fn success<T: DeserializeOwned>(self) -> JsonRequest<T> {
        JsonRequest {
            method: self.method,
            path: self.path,
            headers: self.headers,
            body: self.body,
            success: Target::Json(decode_json::<T>),
            failure: self.failure,
            status_errors: self.status_errors,
        }
    }

    /// Decodes responses with a status of 400 or above into `F` and returns
    /// the error it converts into.
    #[must_use]
    pub fn failure<F: DeserializeOwned + Errorable>(mut self) -> Self {
        self.failure = Some(decode_errorable::<F>);
        self
    }

    /// Returns `error` for responses with the given status, without looking
    /// at the body.
    ///
    /// This takes precedence over [`JsonRequest::failure`]. Only statuses of
    /// 400 and above are ever treated as failures, errors registered for
    /// other statuses are never returned.
    #[must_use]
    pub fn status_error(mut self, status: StatusCode, error: impl Into<BoxError>) -> Self {
        if status.as_u16() < 400 {
            log::debug!("Error registered for status {status} will never be returned");
        }
        let error: BoxError = error.into();
        self.status_errors.insert(status, Arc::from(error));
        self
    }

    /// The method of the request
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The path of the request, relative to the base URL
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<S> fmt::Debug for JsonRequest<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .field("decodes_success", &matches!(self.success, Target::Json(_)))
            .field("decodes_failure", &self.failure.is_some())
            .field("status_errors", &self.status_errors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S: Send + 'static> Requestable for JsonRequest<S> {
    type Responder = JsonResponder<S>;

    fn http_request(&self, base_url: &Url) -> Result<(Request, JsonResponder<S>)> {
        let url = base_url
            .join(self.path.trim_start_matches('/'))
            .map_err(|source| ErrorKind::InvalidPath {
                base: base_url.clone(),
                path: self.path.clone(),
                source,
            })?;

        let mut request = Request::new(self.method.clone(), url.clone());
        if let Some(body) = &self.body {
            *request.body_mut() = Some(body.clone()?.into());
        }

        let headers = request.headers_mut();
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ErrorKind::InvalidHeaderName(name.clone(), e))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ErrorKind::InvalidHeaderValue(name.clone(), e))?;
            headers.append(header_name, header_value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

        let responder = JsonResponder {
            method: self.method.clone(),
            url,
            success: self.success,
            failure: self.failure,
            status_errors: self.status_errors.clone(),
        };
        Ok((request, responder))
    }
}

/// Response handler of a resolved [`JsonRequest`]
pub struct JsonResponder<S> {
    method: Method,
    url: Url,
    success: Target<S>,
    failure: Option<FailureDecoder>,
    status_errors: HashMap<StatusCode, SharedError>,
}

impl<S> JsonResponder<S> {
    /// The method of the resolved request
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The fully resolved URL of the request
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl<S> fmt::Debug for JsonResponder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonResponder")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: Send + 'static> Responder for JsonResponder<S> {
    type Output = S;

    async fn on_http_response(self, response: Response) -> Result<S> {
        let status = response.status();

        if status.as_u16() < 400 {
            return match self.success {
                Target::Ignore(empty) => Ok(empty()),
                Target::Json(decode) => decode_body(response, decode).await,
            };
        }

        if let Some(error) = self.status_errors.get(&status) {
            return Err(ErrorKind::Application(Arc::clone(error)));
        }

        if let Some(decode) = self.failure {
            if let Some(error) = decode_body(response, decode).await? {
                return Err(ErrorKind::Application(Arc::from(error)));
            }
        }

        Err(ErrorKind::Status {
            method: self.method,
            url: self.url,
            status,
        })
    }
}

/// Reads the whole body, closing it, and decodes it
async fn decode_body<T>(
    response: Response,
    decode: fn(&[u8]) -> serde_json::Result<T>,
) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(ErrorKind::ReadResponseBody)?;
    // Malformed documents fail as syntax errors, whatever the target type
    serde_json::from_slice::<IgnoredAny>(&body)?;
    Ok(decode(&body)?)
}
