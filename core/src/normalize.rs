//! Response normalization: one [`CanonicalResponse`] per call, whichever way
//! the transport finished.
//!
//! # Design
//! A client reports its outcome through a [`Completion`]. The completion
//! owns the descriptor's callbacks behind a first-wins guard: the first
//! `succeed` or `fail` takes them, builds the canonical response with the
//! matching normalizer and routes it; any later report is logged and
//! dropped. Either way the handle is detached afterwards.
//!
//! Routing is by status. A transport success whose effective status is 300
//! or above (typically reported through `X-Responded-JSON`) goes to
//! `on_failure`; a transport failure always goes to `on_failure`.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::headers::{HeaderAccessor, ServerHeaderOverride};
use crate::http::ClientHandle;
use crate::types::{is_failure_status, AjaxRequest, CanonicalResponse, RequestDescriptor, ResponseCallback};

/// What a client reports when the transport considers the call successful.
pub struct TransportSuccess {
    /// Body as parsed by the client.
    pub data: Value,
    pub status_text: String,
    pub handle: Arc<dyn ClientHandle>,
}

/// What a client reports when the transport considers the call failed
/// (non-success status, network error, timeout, abort, parse error).
pub struct TransportFailure {
    pub handle: Arc<dyn ClientHandle>,
    pub status_text: String,
    pub error: Option<String>,
}

pub type SuccessNormalizer =
    Arc<dyn Fn(Arc<AjaxRequest>, TransportSuccess) -> CanonicalResponse + Send + Sync>;
pub type FailureNormalizer =
    Arc<dyn Fn(Arc<AjaxRequest>, TransportFailure) -> CanonicalResponse + Send + Sync>;

pub fn default_success_normalizer() -> SuccessNormalizer {
    Arc::new(normalize_success)
}

pub fn default_failure_normalizer() -> FailureNormalizer {
    Arc::new(normalize_failure)
}

/// Build the canonical response for a transport success, honoring a server
/// override header when one is present and well formed.
pub fn normalize_success(request: Arc<AjaxRequest>, outcome: TransportSuccess) -> CanonicalResponse {
    let TransportSuccess {
        data,
        status_text,
        handle,
    } = outcome;

    let Some(server_override) = ServerHeaderOverride::from_handle(handle.as_ref()) else {
        return CanonicalResponse {
            request,
            data,
            status: handle.status(),
            status_text,
            error: None,
            headers: HeaderAccessor::from_transport(handle),
        };
    };

    let status = server_override.status.unwrap_or_else(|| handle.status());
    // Error text comes from the body only.
    let error = if is_failure_status(status) {
        body_message(&data)
    } else {
        None
    };
    let headers = match server_override.headers {
        _ if status == 0 => HeaderAccessor::empty(),
        Some(extra) => HeaderAccessor::merged(handle, extra),
        None => HeaderAccessor::from_transport(handle),
    };

    CanonicalResponse {
        request,
        data,
        status,
        status_text,
        error,
        headers,
    }
}

/// Build the canonical response for a transport failure. The body is the raw
/// response text, if any.
pub fn normalize_failure(request: Arc<AjaxRequest>, outcome: TransportFailure) -> CanonicalResponse {
    let TransportFailure {
        handle,
        status_text,
        error,
    } = outcome;

    let error = error
        .filter(|e| !e.is_empty())
        .or_else(|| non_empty(&status_text));

    CanonicalResponse {
        request,
        data: handle.response_text().map(Value::String).unwrap_or(Value::Null),
        status: handle.status(),
        status_text,
        error,
        headers: HeaderAccessor::from_transport(handle),
    }
}

/// Error message carried in a JSON error body (`Message` or `message`).
fn body_message(data: &Value) -> Option<String> {
    ["Message", "message"]
        .iter()
        .find_map(|key| data.get(key))
        .and_then(|message| match message {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

struct Callbacks {
    on_success: ResponseCallback,
    on_failure: ResponseCallback,
}

struct CompletionInner {
    request: Arc<AjaxRequest>,
    success: SuccessNormalizer,
    failure: FailureNormalizer,
    pending: Mutex<Option<Callbacks>>,
}

/// Completion handlers for one in-flight call.
///
/// Cheap to clone; all clones share the same guard, so the descriptor's
/// callbacks fire at most once no matter how many times or from which
/// threads the client reports.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

impl Completion {
    pub fn new(
        descriptor: RequestDescriptor,
        success: SuccessNormalizer,
        failure: FailureNormalizer,
    ) -> Self {
        let RequestDescriptor {
            request,
            on_success,
            on_failure,
        } = descriptor;
        Self {
            inner: Arc::new(CompletionInner {
                request: Arc::new(request),
                success,
                failure,
                pending: Mutex::new(Some(Callbacks {
                    on_success,
                    on_failure,
                })),
            }),
        }
    }

    pub fn request(&self) -> &AjaxRequest {
        &self.inner.request
    }

    /// Whether a descriptor callback has already been invoked.
    pub fn is_settled(&self) -> bool {
        self.lock().is_none()
    }

    /// Report a transport success.
    pub fn succeed(&self, data: Value, status_text: impl Into<String>, handle: Arc<dyn ClientHandle>) {
        let Some(callbacks) = self.take("success") else {
            handle.detach();
            return;
        };
        let outcome = TransportSuccess {
            data,
            status_text: status_text.into(),
            handle: Arc::clone(&handle),
        };
        let response = (self.inner.success)(Arc::clone(&self.inner.request), outcome);
        if is_failure_status(response.status) {
            tracing::debug!(url = %response.request.url, status = response.status, "transport success reclassified as failure");
            (callbacks.on_failure)(response);
        } else {
            tracing::debug!(url = %response.request.url, status = response.status, "request succeeded");
            (callbacks.on_success)(response);
        }
        handle.detach();
    }

    /// Report a transport failure.
    pub fn fail(&self, handle: Arc<dyn ClientHandle>, status_text: impl Into<String>, error: Option<String>) {
        let Some(callbacks) = self.take("failure") else {
            handle.detach();
            return;
        };
        let outcome = TransportFailure {
            handle: Arc::clone(&handle),
            status_text: status_text.into(),
            error,
        };
        let response = (self.inner.failure)(Arc::clone(&self.inner.request), outcome);
        tracing::debug!(
            url = %response.request.url,
            status = response.status,
            error = response.error.as_deref().unwrap_or_default(),
            "request failed"
        );
        (callbacks.on_failure)(response);
        handle.detach();
    }

    fn take(&self, event: &str) -> Option<Callbacks> {
        let callbacks = self.lock().take();
        if callbacks.is_none() {
            tracing::warn!(url = %self.inner.request.url, event, "ignoring completion for an already settled request");
        }
        callbacks
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Callbacks>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("request", &self.inner.request)
            .field("settled", &self.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::mpsc;

    use serde_json::json;

    use super::*;
    use crate::testing::StubHandle;

    fn request() -> Arc<AjaxRequest> {
        Arc::new(AjaxRequest::get("/api/items"))
    }

    /// Completion whose callbacks report `(routed_to_success, response)`.
    fn completion() -> (Completion, mpsc::Receiver<(bool, CanonicalResponse)>) {
        let (tx, rx) = mpsc::channel();
        let tx_fail = tx.clone();
        let descriptor = RequestDescriptor::new(
            AjaxRequest::get("/api/items"),
            move |r| tx.send((true, r)).unwrap(),
            move |r| tx_fail.send((false, r)).unwrap(),
        );
        let completion = Completion::new(
            descriptor,
            default_success_normalizer(),
            default_failure_normalizer(),
        );
        (completion, rx)
    }

    #[test]
    fn success_without_override_is_verbatim() {
        let handle = Arc::new(StubHandle::new(200).with_header("ETag", "1"));
        let response = normalize_success(
            request(),
            TransportSuccess {
                data: json!([1, 2]),
                status_text: "success".to_string(),
                handle,
            },
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "success");
        assert_eq!(response.data, json!([1, 2]));
        assert_eq!(response.error, None);
        assert_eq!(response.headers.get("ETag").as_deref(), Some("1"));
        assert_eq!(response.request.url, "/api/items");
    }

    #[test]
    fn override_status_and_headers_win() {
        let handle = Arc::new(
            StubHandle::new(200)
                .with_header("Content-Type", "application/json")
                .with_header("X-Responded-JSON", r#"{"status":404,"headers":{"X-Extra":"v"}}"#),
        );
        let response = normalize_success(
            request(),
            TransportSuccess {
                data: json!({"Message": "No such item"}),
                status_text: "success".to_string(),
                handle,
            },
        );
        assert_eq!(response.status, 404);
        assert_eq!(response.error.as_deref(), Some("No such item"));
        assert_eq!(response.headers.get("X-Extra").as_deref(), Some("v"));
        assert_eq!(
            response.headers.get("Content-Type").as_deref(),
            Some("application/json")
        );
        assert!(response.headers.all().contains("X-Extra: v"));
    }

    #[test]
    fn override_without_status_keeps_transport_status() {
        let handle = Arc::new(
            StubHandle::new(201).with_header("X-Responded-JSON", r#"{"headers":{"Location":"/x/1"}}"#),
        );
        let response = normalize_success(
            request(),
            TransportSuccess {
                data: Value::Null,
                status_text: "success".to_string(),
                handle,
            },
        );
        assert_eq!(response.status, 201);
        assert_eq!(response.error, None);
        assert_eq!(response.headers.get("location").as_deref(), Some("/x/1"));
    }

    #[test]
    fn override_failure_without_body_message_has_no_error() {
        let handle = Arc::new(StubHandle::new(200).with_header("X-Responded-JSON", r#"{"status":401}"#));
        let response = normalize_success(
            request(),
            TransportSuccess {
                data: json!({"detail": "denied"}),
                status_text: "success".to_string(),
                handle,
            },
        );
        assert_eq!(response.status, 401);
        assert_eq!(response.status_text, "success");
        assert_eq!(response.error, None);
    }

    #[test]
    fn override_status_zero_hides_headers() {
        let handle = Arc::new(
            StubHandle::new(200)
                .with_header("Content-Type", "application/json")
                .with_header("X-Responded-JSON", r#"{"status":0,"headers":{"X-Extra":"v"}}"#),
        );
        let response = normalize_success(
            request(),
            TransportSuccess {
                data: Value::Null,
                status_text: "success".to_string(),
                handle,
            },
        );
        assert_eq!(response.status, 0);
        assert_eq!(response.headers.get("Content-Type").as_deref(), Some(""));
        assert_eq!(response.headers.get("X-Extra").as_deref(), Some(""));
        assert_eq!(response.headers.all(), "");
        assert!(response.headers.map().is_empty());
    }

    #[test]
    fn malformed_override_falls_back_to_transport() {
        let handle = Arc::new(StubHandle::new(200).with_header("X-Responded-JSON", "{status:"));
        let response = normalize_success(
            request(),
            TransportSuccess {
                data: Value::Null,
                status_text: "success".to_string(),
                handle,
            },
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.error, None);
    }

    #[test]
    fn failure_carries_raw_body_and_error() {
        let handle = Arc::new(StubHandle::new(500).with_body("boom").with_header("Retry-After", "3"));
        let response = normalize_failure(
            request(),
            TransportFailure {
                handle,
                status_text: "error".to_string(),
                error: Some("Internal Server Error".to_string()),
            },
        );
        assert_eq!(response.status, 500);
        assert_eq!(response.data, json!("boom"));
        assert_eq!(response.error.as_deref(), Some("Internal Server Error"));
        assert_eq!(response.headers.get("Retry-After").as_deref(), Some("3"));
    }

    #[test]
    fn timeout_failure_has_empty_headers() {
        let handle = Arc::new(StubHandle::new(0));
        let response = normalize_failure(
            request(),
            TransportFailure {
                handle,
                status_text: "timeout".to_string(),
                error: None,
            },
        );
        assert_eq!(response.status, 0);
        assert_eq!(response.data, Value::Null);
        assert_eq!(response.error.as_deref(), Some("timeout"));
        assert_eq!(response.headers.get("Content-Type").as_deref(), Some(""));
        assert!(response.headers.map().is_empty());
    }

    #[test]
    fn success_below_300_routes_to_success() {
        let (completion, rx) = completion();
        completion.succeed(json!({"ok": true}), "success", Arc::new(StubHandle::new(204)));
        let (routed_to_success, response) = rx.try_recv().unwrap();
        assert!(routed_to_success);
        assert_eq!(response.status, 204);
    }

    #[test]
    fn transport_success_with_high_status_routes_to_failure() {
        let (completion, rx) = completion();
        completion.succeed(Value::Null, "notmodified", Arc::new(StubHandle::new(304)));
        let (routed_to_success, response) = rx.try_recv().unwrap();
        assert!(!routed_to_success);
        assert_eq!(response.status, 304);
    }

    #[test]
    fn override_reclassifies_success_as_failure() {
        let (completion, rx) = completion();
        let handle = StubHandle::new(200)
            .with_header("X-Responded-JSON", r#"{"status":401,"headers":{"X-Extra":"v"}}"#);
        completion.succeed(json!({"message": "denied"}), "success", Arc::new(handle));
        let (routed_to_success, response) = rx.try_recv().unwrap();
        assert!(!routed_to_success);
        assert_eq!(response.status, 401);
        assert_eq!(response.error.as_deref(), Some("denied"));
    }

    #[test]
    fn override_cannot_turn_failure_into_success() {
        let (completion, rx) = completion();
        let handle = StubHandle::new(500).with_header("X-Responded-JSON", r#"{"status":200}"#);
        completion.fail(Arc::new(handle), "error", None);
        let (routed_to_success, response) = rx.try_recv().unwrap();
        assert!(!routed_to_success);
        assert_eq!(response.status, 500);
    }

    #[test]
    fn only_first_completion_is_delivered() {
        let (completion, rx) = completion();
        let first = Arc::new(StubHandle::new(200));
        let second = Arc::new(StubHandle::new(500));

        completion.succeed(Value::Null, "success", first.clone());
        completion.clone().fail(second.clone(), "error", None);
        completion.succeed(Value::Null, "success", first.clone());

        let (routed_to_success, _) = rx.try_recv().unwrap();
        assert!(routed_to_success);
        assert!(rx.try_recv().is_err());
        assert!(completion.is_settled());
        assert_eq!(first.detached.load(Ordering::SeqCst), 2);
        assert_eq!(second.detached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_normalizer_is_used() {
        let (tx, rx) = mpsc::channel();
        let descriptor = RequestDescriptor::new(
            AjaxRequest::get("/x"),
            move |r| tx.send(r).unwrap(),
            |_| panic!("unexpected failure"),
        );
        let success: SuccessNormalizer = Arc::new(|request: Arc<AjaxRequest>, outcome: TransportSuccess| {
            let mut response = normalize_success(request, outcome);
            response.data = json!("rewritten");
            response
        });
        let completion = Completion::new(descriptor, success, default_failure_normalizer());
        completion.succeed(json!("original"), "success", Arc::new(StubHandle::new(200)));
        assert_eq!(rx.try_recv().unwrap().data, json!("rewritten"));
    }
}
