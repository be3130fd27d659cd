//! `sling` is a throttled HTTP client with a fluent builder for JSON
//! requests.
//!
//! A [`ConnectionPool`] owns a transport and admits at most a fixed number of
//! requests at once. [`HttpClient`] handles created from the pool resolve
//! requests against a base URL and share the pool's limit. A
//! [`JsonRequest`] describes one JSON request and how its response is
//! decoded.
//!
//! ```no_run
//! use serde::Deserialize;
//! use sling::{ConnectionPool, JsonRequest, PoolConfig};
//!
//! #[derive(Deserialize)]
//! struct Repository {
//!     full_name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = ConnectionPool::new(PoolConfig::builder().pool_size(4).build())?;
//!     let github = pool.try_http("https://api.github.com")?;
//!
//!     let repository = github
//!         .send(&JsonRequest::get("/repos/rust-lang/rust").response::<Repository>())
//!         .await?;
//!     println!("{}", repository.full_name);
//!     Ok(())
//! }
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

#[cfg(test)]
mod test_utils;

mod executor;
mod gate;
mod http;
mod json;
mod pool;
mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use crate::{
    executor::{Executor, ThrottledExecutor},
    gate::{AdmissionGate, Permit, DEFAULT_POOL_SIZE},
    http::{HttpClient, Requestable, Responder},
    json::{Errorable, JsonRequest, JsonResponder, APPLICATION_JSON},
    pool::{new_http, ConnectionPool, PoolConfig},
    types::{BoxError, ErrorKind, Result, SharedError},
};
