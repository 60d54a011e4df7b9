//! Error types for the adapter.
//!
//! # Design
//! Only configuration problems surface as `Err`. Everything that happens on
//! the wire (transport errors, timeouts, status >= 300) is reported through
//! the request's failure callback as a `CanonicalResponse`, never here.

use thiserror::Error;

/// Errors returned synchronously by the adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// `execute` was called before an underlying HTTP client was bound.
    /// Fatal: retrying cannot help until the adapter is initialized.
    #[error("no underlying HTTP client is bound to the ajax adapter")]
    ClientUnavailable,

    /// Adapter defaults could not be deserialized.
    #[error("invalid adapter defaults: {0}")]
    InvalidDefaults(#[from] serde_json::Error),
}
