//! Adapter defaults and the per-call parameter set derived from them.
//!
//! # Design
//! Composition happens in two explicit passes:
//!
//! 1. A shallow merge: start from the defaults and let every field the
//!    request sets replace the default outright. This includes `headers`,
//!    which the request always carries, so the default header map is
//!    shadowed wholesale at this point.
//! 2. A header merge: the union of default and request headers, with the
//!    request winning on a name collision.
//!
//! A single deep merge would give the same answer for headers but would also
//! start merging any other nested default (e.g. an object-valued `data`),
//! which must instead be replaced by the request's value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AdapterError;
use crate::http::{Headers, HttpMethod};
use crate::types::AjaxRequest;

/// Keys the request always owns. Defaults may not smuggle them in through
/// the free-form `extra` map.
const REQUEST_KEYS: [&str; 8] = [
    "type",
    "url",
    "data",
    "dataType",
    "contentType",
    "crossDomain",
    "headers",
    "params",
];

/// Adapter-wide call defaults, e.g. default headers or a client timeout.
///
/// Any key other than the well-known ones lands in `extra` and is passed to
/// the client untouched.
///
/// ```
/// use ajax_core::AdapterDefaults;
///
/// let defaults = AdapterDefaults::from_json(
///     r#"{"headers": {"X-Api-Key": "k"}, "timeout": 5000}"#,
/// ).unwrap();
/// assert_eq!(defaults.headers["X-Api-Key"], "k");
/// assert_eq!(defaults.extra["timeout"], 5000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_domain: Option<bool>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdapterDefaults {
    pub fn from_json(raw: &str) -> Result<Self, AdapterError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_value(value: Value) -> Result<Self, AdapterError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set a client-specific key such as `timeout`.
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
            && self.data_type.is_none()
            && self.content_type.is_none()
            && self.cross_domain.is_none()
            && self.headers.is_empty()
            && self.extra.is_empty()
    }
}

/// Client-specific parameters for exactly one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParameters {
    #[serde(rename = "type")]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_domain: Option<bool>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallParameters {
    /// The request's client-relevant fields alone. `params` takes precedence
    /// over `data`.
    pub fn from_request(request: &AjaxRequest) -> Self {
        Self {
            method: request.method,
            url: request.url.clone(),
            data: request.params.clone().or_else(|| request.data.clone()),
            data_type: request.data_type.clone(),
            content_type: request.content_type.clone(),
            cross_domain: request.cross_domain,
            headers: request.headers.clone(),
            extra: Map::new(),
        }
    }

    /// Layer `request` over `defaults`.
    pub fn compose(defaults: &AdapterDefaults, request: &AjaxRequest) -> Self {
        let own = Self::from_request(request);
        if defaults.is_empty() {
            return own;
        }

        let mut extra = defaults.extra.clone();
        extra.retain(|key, _| !REQUEST_KEYS.contains(&key.as_str()));

        let mut params = Self {
            method: own.method,
            url: own.url,
            data: own.data.or_else(|| defaults.data.clone()),
            data_type: own.data_type.or_else(|| defaults.data_type.clone()),
            content_type: own.content_type.or_else(|| defaults.content_type.clone()),
            cross_domain: own.cross_domain.or(defaults.cross_domain),
            headers: own.headers,
            extra,
        };
        params.headers = merge_headers(&defaults.headers, &request.headers);
        params
    }

    /// Client-specific key carried over from the adapter defaults.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Union of two header maps; `overlay` wins on a name collision.
pub fn merge_headers(base: &Headers, overlay: &Headers) -> Headers {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
