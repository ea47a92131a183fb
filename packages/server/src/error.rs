//! Server-level error definitions.

use thiserror::Error;

/// Errors that stop the relay server
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an I/O error
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}
