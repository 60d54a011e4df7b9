//! Pluggable AJAX transport adapter.
//!
//! # Overview
//! Lets a data-access framework issue HTTP calls through any underlying
//! client while always receiving the same [`CanonicalResponse`] shape. The
//! core performs no I/O: an [`HttpClient`] implementation (blocking thread,
//! event loop, FFI host) executes the round-trip and reports back through a
//! [`Completion`].
//!
//! # Design
//! - [`AjaxAdapter::execute`] composes [`CallParameters`] from the adapter
//!   defaults and the request (two merge passes: shallow, then headers),
//!   runs the optional interceptor, and delegates exactly one call.
//! - [`normalize`] turns the client's success or failure report into a
//!   canonical response and routes it by status: 300 and above always goes
//!   to `on_failure`, including statuses reported through the
//!   `X-Responded-JSON` override header.
//! - Each call's callbacks sit behind a first-wins guard, so a client that
//!   reports twice still settles the request exactly once.

pub mod adapter;
pub mod config;
pub mod error;
pub mod headers;
pub mod http;
pub mod normalize;
pub mod types;

#[cfg(test)]
mod testing;

pub use adapter::{AjaxAdapter, Dispatch, InterceptorOptions, RequestContext};
pub use config::{merge_headers, AdapterDefaults, CallParameters};
pub use error::AdapterError;
pub use headers::{HeaderAccessor, ServerHeaderOverride, OVERRIDE_HEADER};
pub use http::{ClientHandle, Headers, HttpClient, HttpMethod};
pub use normalize::{Completion, TransportFailure, TransportSuccess};
pub use types::{AjaxRequest, CanonicalResponse, RequestDescriptor};
