//! Transport-facing types: what the adapter needs from an underlying client.
//!
//! # Design
//! The core never touches the network. An [`HttpClient`] receives fully
//! composed [`CallParameters`] plus a [`Completion`], performs the round-trip
//! however it likes (blocking thread, event loop, FFI host), and later reports
//! the outcome through the completion. The finished exchange is described by
//! a [`ClientHandle`], which the normalizer reads status and headers from.
//!
//! All types are `Send + Sync` because a client may complete on a different
//! thread than the one that called `execute`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CallParameters;
use crate::normalize::Completion;

/// Header name → value. Ordered so formatted header blocks are deterministic.
pub type Headers = BTreeMap<String, String>;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished (or aborted) exchange as seen by the underlying client.
///
/// Status `0` means no response was ever received (timeout, abort, network
/// error); implementations are not expected to report headers in that case.
pub trait ClientHandle: Send + Sync {
    fn status(&self) -> u16;

    fn status_text(&self) -> String;

    /// Value of one response header, `None` when absent.
    fn response_header(&self, name: &str) -> Option<String>;

    /// All response headers as one `name: value` block, CRLF separated.
    fn all_response_headers(&self) -> String;

    /// Raw response body, if the client kept one.
    fn response_text(&self) -> Option<String>;

    /// Drop any completion hook the client still holds for this exchange so
    /// late transport events cannot fire it again.
    fn detach(&self) {}
}

/// The underlying HTTP client the adapter delegates to.
pub trait HttpClient: Send + Sync {
    /// Short identifier used in log output, e.g. `"ureq"`.
    fn name(&self) -> &str;

    /// Issue exactly one call. Must not block the caller; the outcome is
    /// reported later through `completion`.
    fn issue_call(&self, params: CallParameters, completion: Completion);
}
