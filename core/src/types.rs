//! Framework-facing types: the request descriptor going in and the canonical
//! response coming out.
//!
//! # Design
//! A descriptor is split into plain data ([`AjaxRequest`]) and the two
//! one-shot callbacks. The data half is shared via `Arc` so every
//! [`CanonicalResponse`] can echo back the request that produced it after the
//! callbacks themselves have been consumed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::headers::HeaderAccessor;
use crate::http::{Headers, HttpMethod};

/// One HTTP call as described by the data-access framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AjaxRequest {
    #[serde(rename = "type")]
    pub method: HttpMethod,
    pub url: String,
    /// Query or form parameters. Takes precedence over `data` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Expected response format, e.g. `"json"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_domain: Option<bool>,
    #[serde(default)]
    pub headers: Headers,
}

impl AjaxRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: None,
            data: None,
            data_type: None,
            content_type: None,
            cross_domain: None,
            headers: Headers::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn cross_domain(mut self, cross_domain: bool) -> Self {
        self.cross_domain = Some(cross_domain);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Callback receiving the normalized outcome of a call.
pub type ResponseCallback = Box<dyn FnOnce(CanonicalResponse) + Send>;

/// A request plus the two callbacks the adapter must settle exactly once.
pub struct RequestDescriptor {
    pub request: AjaxRequest,
    pub on_success: ResponseCallback,
    pub on_failure: ResponseCallback,
}

impl RequestDescriptor {
    pub fn new<S, F>(request: AjaxRequest, on_success: S, on_failure: F) -> Self
    where
        S: FnOnce(CanonicalResponse) + Send + 'static,
        F: FnOnce(CanonicalResponse) + Send + 'static,
    {
        Self {
            request,
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        }
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// The single response shape handed back to the framework, whichever client
/// performed the call and however it ended.
#[derive(Debug, Clone)]
pub struct CanonicalResponse {
    /// The request this response answers.
    pub request: Arc<AjaxRequest>,
    /// Parsed body on success, raw response text on transport failure.
    pub data: Value,
    pub status: u16,
    pub status_text: String,
    /// Set only on failures.
    pub error: Option<String>,
    pub headers: HeaderAccessor,
}

impl CanonicalResponse {
    /// Whether the status alone marks this response as a failure. Transport
    /// failures (status 0) reach `on_failure` regardless.
    pub fn has_failure_status(&self) -> bool {
        is_failure_status(self.status)
    }
}

/// Status codes at or above 300 are failures, no matter how the transport
/// classified the exchange.
pub fn is_failure_status(status: u16) -> bool {
    status >= 300
}
