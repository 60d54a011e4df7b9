//! Response header access and the `X-Responded-JSON` override side channel.
//!
//! # Design
//! Some servers (or intermediaries in front of them) rewrite the real HTTP
//! status, for example answering 200 where the application produced a 401,
//! and report the original outcome in a JSON header instead:
//!
//! ```text
//! X-Responded-JSON: {"status": 401, "headers": {"location": "/login"}}
//! ```
//!
//! Both fields are optional and the payload comes from a remote server, so
//! it is parsed as a loose `serde_json::Value` and validated field by field.
//! Anything that is not a JSON object is ignored.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::http::{ClientHandle, Headers};

/// Transport header carrying a [`ServerHeaderOverride`] payload.
pub const OVERRIDE_HEADER: &str = "X-Responded-JSON";

/// Status and headers a server reported out of band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerHeaderOverride {
    pub status: Option<u16>,
    pub headers: Option<Headers>,
}

impl ServerHeaderOverride {
    /// Read the override header from a finished exchange.
    ///
    /// Returns `None` when the header is missing or its payload is unusable;
    /// a malformed payload is logged and otherwise treated as absent.
    pub fn from_handle(handle: &dyn ClientHandle) -> Option<Self> {
        let raw = handle.response_header(OVERRIDE_HEADER)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(header = OVERRIDE_HEADER, error = %e, "ignoring unparsable override payload");
                return None;
            }
        };
        let Value::Object(fields) = value else {
            tracing::warn!(header = OVERRIDE_HEADER, "ignoring override payload that is not a JSON object");
            return None;
        };

        let status = fields.get("status").and_then(parse_status);
        let headers = match fields.get("headers") {
            Some(Value::Object(map)) => Some(
                map.iter()
                    .filter_map(|(name, value)| header_value(value).map(|v| (name.clone(), v)))
                    .collect(),
            ),
            Some(Value::Null) | None => None,
            Some(other) => {
                tracing::warn!(header = OVERRIDE_HEADER, headers = %other, "ignoring non-object override headers");
                None
            }
        };

        Some(Self { status, headers })
    }
}

fn parse_status(value: &Value) -> Option<u16> {
    let status = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        Value::Null => return None,
        _ => None,
    };
    if status.is_none() {
        tracing::warn!(header = OVERRIDE_HEADER, status = %value, "ignoring invalid override status");
    }
    status
}

fn header_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Uniform read access to a response's headers.
///
/// Built once per response. When the transport never received a response
/// (status 0) every lookup yields the empty string and the full listing is
/// empty. Otherwise lookups go to the transport first and fall back to any
/// headers supplied through the override payload.
#[derive(Clone)]
pub struct HeaderAccessor {
    transport: Option<Arc<dyn ClientHandle>>,
    extra: Headers,
}

impl HeaderAccessor {
    /// Accessor with no headers at all, as for an aborted exchange.
    pub fn empty() -> Self {
        Self {
            transport: None,
            extra: Headers::new(),
        }
    }

    pub fn from_transport(handle: Arc<dyn ClientHandle>) -> Self {
        Self::merged(handle, Headers::new())
    }

    /// Transport headers with `extra` layered underneath: a transport value
    /// always wins, and `extra` entries are appended to the full listing.
    pub fn merged(handle: Arc<dyn ClientHandle>, extra: Headers) -> Self {
        if handle.status() == 0 {
            return Self::empty();
        }
        Self {
            transport: Some(handle),
            extra,
        }
    }

    /// Value of the named header. `None` when the header is absent; the empty
    /// string when no headers were ever received.
    pub fn get(&self, name: &str) -> Option<String> {
        let Some(transport) = &self.transport else {
            return Some(String::new());
        };
        if name.is_empty() {
            return None;
        }
        transport.response_header(name).or_else(|| {
            self.extra
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        })
    }

    /// Every header as one formatted `name: value` block.
    pub fn all(&self) -> String {
        let Some(transport) = &self.transport else {
            return String::new();
        };
        let mut block = transport.all_response_headers();
        for (name, value) in &self.extra {
            let trimmed = block.trim();
            block = if trimmed.is_empty() {
                format!("{name}: {value}")
            } else {
                format!("{trimmed}\n{name}: {value}")
            };
        }
        block
    }

    /// Every header as a map. On duplicate names the first occurrence wins,
    /// so transport values shadow override values.
    pub fn map(&self) -> Headers {
        let mut headers = Headers::new();
        for line in self.all().lines() {
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    headers
                        .entry(name.to_string())
                        .or_insert_with(|| value.trim().to_string());
                }
            }
        }
        headers
    }
}

impl fmt::Debug for HeaderAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderAccessor")
            .field("received", &self.transport.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}
