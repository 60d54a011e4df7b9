//! The adapter: turns a [`RequestDescriptor`] into one call on the bound
//! [`HttpClient`].
//!
//! # Design
//! `AjaxAdapter` keeps two pieces of configuration, the call defaults and an
//! optional request interceptor. Both live in `arc-swap` cells so they can be
//! replaced through `&self` while calls are in flight; a call works on the
//! snapshot it loaded when it started.
//!
//! Per call, `execute` composes [`CallParameters`], wraps everything the call
//! needs in a [`RequestContext`], gives the interceptor a chance to rewrite
//! (or drop) it, and finally hands the parameters and a [`Completion`] to the
//! client. The client reports back through the completion; the adapter
//! itself never waits.

use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::config::{AdapterDefaults, CallParameters};
use crate::error::AdapterError;
use crate::http::HttpClient;
use crate::normalize::{
    default_failure_normalizer, default_success_normalizer, Completion, FailureNormalizer,
    SuccessNormalizer,
};
use crate::types::RequestDescriptor;

/// Everything about one call that an interceptor may inspect or replace
/// before the call is issued.
///
/// Setting `call` to `None` suppresses the request: no call is issued and
/// neither descriptor callback will ever run.
pub struct RequestContext<'a> {
    pub adapter: &'a AjaxAdapter,
    pub call: Option<CallParameters>,
    pub descriptor: RequestDescriptor,
    pub success: SuccessNormalizer,
    pub failure: FailureNormalizer,
}

impl fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("call", &self.call)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

type InterceptorFn = dyn Fn(&mut RequestContext<'_>) + Send + Sync;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptorOptions {
    /// Remove the interceptor after it has run once.
    pub one_time: bool,
}

impl InterceptorOptions {
    pub fn one_time() -> Self {
        Self { one_time: true }
    }
}

struct RequestInterceptor {
    hook: Box<InterceptorFn>,
    one_time: bool,
}

/// Outcome of a successful `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The call was handed to the client.
    Issued,
    /// The interceptor cleared the call parameters; nothing was sent.
    Suppressed,
}

/// Adapter between a data-access framework and an arbitrary HTTP client.
pub struct AjaxAdapter {
    client: Option<Arc<dyn HttpClient>>,
    defaults: ArcSwap<AdapterDefaults>,
    interceptor: ArcSwapOption<RequestInterceptor>,
}

impl AjaxAdapter {
    /// An adapter with no client bound yet. `execute` fails until
    /// [`initialize`](Self::initialize) is called.
    pub fn new() -> Self {
        Self {
            client: None,
            defaults: ArcSwap::from_pointee(AdapterDefaults::default()),
            interceptor: ArcSwapOption::empty(),
        }
    }

    pub fn with_client(client: Arc<dyn HttpClient>) -> Self {
        let mut adapter = Self::new();
        adapter.initialize(client);
        adapter
    }

    /// Bind the underlying HTTP client.
    pub fn initialize(&mut self, client: Arc<dyn HttpClient>) {
        tracing::debug!(client = client.name(), "ajax adapter initialized");
        self.client = Some(client);
    }

    /// Name of the bound client, if any.
    pub fn name(&self) -> Option<&str> {
        self.client.as_deref().map(|client| client.name())
    }

    /// Replace the adapter-wide call defaults.
    pub fn configure(&self, defaults: AdapterDefaults) {
        self.defaults.store(Arc::new(defaults));
    }

    pub fn defaults(&self) -> Arc<AdapterDefaults> {
        self.defaults.load_full()
    }

    /// Install `hook` to run on every subsequent call (or only the next one,
    /// with [`InterceptorOptions::one_time`]). Replaces any previous hook.
    pub fn set_interceptor<F>(&self, hook: F, options: InterceptorOptions)
    where
        F: Fn(&mut RequestContext<'_>) + Send + Sync + 'static,
    {
        self.interceptor.store(Some(Arc::new(RequestInterceptor {
            hook: Box::new(hook),
            one_time: options.one_time,
        })));
    }

    pub fn clear_interceptor(&self) {
        self.interceptor.store(None);
    }

    pub fn has_interceptor(&self) -> bool {
        self.interceptor.load().is_some()
    }

    /// Issue the call described by `descriptor`.
    ///
    /// Returns once the call is handed to the client (or suppressed). The
    /// descriptor's callbacks run later, from whichever thread the client
    /// completes on. The only error is a missing client, which is reported
    /// here and never through the callbacks.
    pub fn execute(&self, descriptor: RequestDescriptor) -> Result<Dispatch, AdapterError> {
        let client = self.client.as_ref().ok_or(AdapterError::ClientUnavailable)?;

        let call = CallParameters::compose(&self.defaults.load(), &descriptor.request);
        let mut context = RequestContext {
            adapter: self,
            call: Some(call),
            descriptor,
            success: default_success_normalizer(),
            failure: default_failure_normalizer(),
        };

        if let Some(interceptor) = self.claim_interceptor() {
            (interceptor.hook)(&mut context);
        }

        let RequestContext {
            call,
            descriptor,
            success,
            failure,
            ..
        } = context;

        let Some(call) = call else {
            tracing::debug!(url = %descriptor.request.url, "request suppressed by interceptor");
            return Ok(Dispatch::Suppressed);
        };

        tracing::debug!(
            client = client.name(),
            method = %call.method,
            url = %call.url,
            "dispatching request"
        );
        let completion = Completion::new(descriptor, success, failure);
        client.issue_call(call, completion);
        Ok(Dispatch::Issued)
    }

    /// The interceptor this call should run, if any. A one-time interceptor
    /// is removed before it runs, and only the call that removed it gets it.
    fn claim_interceptor(&self) -> Option<Arc<RequestInterceptor>> {
        let current = self.interceptor.load_full();
        let interceptor = current.as_ref()?;
        if !interceptor.one_time {
            return Some(Arc::clone(interceptor));
        }
        let previous = self
            .interceptor
            .compare_and_swap(&current, None::<Arc<RequestInterceptor>>);
        match &*previous {
            Some(previous) if Arc::ptr_eq(previous, interceptor) => Some(Arc::clone(interceptor)),
            _ => None,
        }
    }
}

impl Default for AjaxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AjaxAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AjaxAdapter")
            .field("client", &self.name())
            .field("defaults", &self.defaults())
            .field("interceptor", &self.has_interceptor())
            .finish()
    }
}
