//! Unified error type.

use thiserror::Error;

/// The error type returned by the crate's fallible operations.
///
/// Application-level outcomes (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, and the access-log path never
/// fails a request. This type surfaces what can go wrong while *setting up*:
/// binding a port, accepting a connection, compiling an exclusion pattern.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid exclusion pattern: {0}")]
    Pattern(#[from] regex::Error),
}
