//! Server errors.

use thiserror::Error;

/// Errors starting the HTTP listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested `host:port`.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
