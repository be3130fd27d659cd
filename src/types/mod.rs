#![allow(unreachable_pub)]

mod error;

pub(crate) use error::SerializeError;
pub use error::{BoxError, ErrorKind, SharedError};

/// The `sling` `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
