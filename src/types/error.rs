use std::sync::Arc;

use http::{Method, StatusCode};
use thiserror::Error;
use url::Url;

/// An error supplied by the caller, e.g. through
/// [`JsonRequest::status_error`](crate::JsonRequest::status_error).
///
/// It is reference counted so that one registered error can be returned by
/// every response it matches.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// A boxed error produced by a custom [`Executor`](crate::Executor) or an
/// [`Errorable`](crate::Errorable) failure body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Possible errors when interacting with `sling`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The base URL of a client could not be parsed as an absolute URL
    #[error("malformed URL: {0}")]
    MalformedUrl(#[source] url::ParseError),
    /// The base URL of a client uses a scheme other than `http` or `https`
    #[error("Only http and https are supported")]
    UnsupportedScheme(String),
    /// The request path could not be resolved against the base URL
    #[error("Cannot resolve path `{path}` against `{base}`")]
    InvalidPath {
        /// The base URL of the client
        base: Url,
        /// The requested path
        path: String,
        /// Reason for the failure
        #[source]
        source: url::ParseError,
    },
    /// The request client could not be created
    #[error("Error creating request client: {0}")]
    BuildClient(#[source] reqwest::Error),
    /// The pool configuration could not be parsed
    #[error("Cannot read pool configuration: {0}")]
    InvalidConfig(#[from] toml::de::Error),
    /// The request body could not be encoded as JSON
    #[error("Cannot encode request body as JSON: {0}")]
    SerializeBody(#[source] Arc<serde_json::Error>),
    /// A request header name is not a valid HTTP header name
    #[error("Invalid header name `{0}`")]
    InvalidHeaderName(String, #[source] http::header::InvalidHeaderName),
    /// A request header value is not a valid HTTP header value
    #[error("Invalid value for header `{0}`")]
    InvalidHeaderValue(String, #[source] http::header::InvalidHeaderValue),
    /// The admission gate was closed while waiting for a permit
    #[error("Admission gate was closed")]
    GateClosed,
    /// Network error while executing a request via reqwest
    #[error("Network error: {0}")]
    NetworkRequest(#[source] reqwest::Error),
    /// Any other failure reported by a custom executor
    #[error(transparent)]
    Transport(BoxError),
    /// The response body could not be read
    #[error("Error reading response body: {0}")]
    ReadResponseBody(#[source] reqwest::Error),
    /// The response body is not the expected JSON document
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    /// The error registered for the response status, or the error carried
    /// by the decoded failure body
    #[error(transparent)]
    Application(SharedError),
    /// The server answered with an error status and nothing more specific
    /// was registered for it
    #[error("request {method} {url} as JSON returned status {}", .status.as_u16())]
    Status {
        /// Method of the failed request
        method: Method,
        /// Fully resolved URL of the failed request
        url: Url,
        /// Status code returned by the server
        status: StatusCode,
    },
}

impl ErrorKind {
    /// The HTTP status code attached to this error, if the server answered
    /// with an error status that was not mapped to an application error.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The caller supplied error, if this is an application error.
    #[must_use]
    pub fn application_error(&self) -> Option<&SharedError> {
        match self {
            Self::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the error was caused by a JSON document which is not
    /// syntactically valid.
    #[must_use]
    pub fn is_json_syntax(&self) -> bool {
        matches!(self, Self::Decode(e) if e.is_syntax())
    }
}

impl From<url::ParseError> for ErrorKind {
    fn from(e: url::ParseError) -> Self {
        Self::MalformedUrl(e)
    }
}

/// A JSON encoding failure captured while building a request, surfaced as
/// [`ErrorKind::SerializeBody`] every time the request is resolved.
#[derive(Debug, Clone)]
pub(crate) struct SerializeError(Arc<serde_json::Error>);

impl From<serde_json::Error> for SerializeError {
    fn from(e: serde_json::Error) -> Self {
        Self(Arc::new(e))
    }
}

impl From<SerializeError> for ErrorKind {
    fn from(e: SerializeError) -> Self {
        Self::SerializeBody(e.0)
    }
}
