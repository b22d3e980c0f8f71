//! Message shapes exchanged through the `onesdk_host` imports.
//!
//! Every import takes one request value and answers with a result envelope
//! (`{"Ok": ...}` / `{"Err": HostFailure}`). The types here are the typed
//! views of those values; both sides convert with [`to_message`] and
//! [`from_message`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// Header or query multi-map. Multiple values for one key are kept apart.
pub type MultiMap = BTreeMap<String, Vec<String>>;

/// `http_call` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// HTTP method, used as-is.
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: MultiMap,
    #[serde(default)]
    pub query: MultiMap,
    #[serde(default)]
    pub body: Option<String>,
}

/// `http_call` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: MultiMap,
    #[serde(default)]
    pub body: String,
}

/// `clock_now` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockReading {
    pub unix_ms: u64,
}

/// `random_bytes` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomRequest {
    pub len: usize,
}

/// Severity of a core log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// `log` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRequest {
    pub level: LogLevel,
    pub message: String,
}

/// `asset_read` request. `path` is relative to the assets location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    pub path: String,
}

/// Payload of an `Err` import response: the host effect failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFailure {
    /// Stable machine-readable kind, e.g. `network` or `asset_not_found`.
    pub code: String,
    pub message: String,
}

/// Convert a message into a structured value.
pub fn to_message<T: Serialize>(message: &T) -> Value {
    // Every message type here serializes to a plain value; maps have string keys.
    serde_json::to_value(message).unwrap_or(Value::Null)
}

/// Parse a structured value as a message.
pub fn from_message<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(|e| CodecError::Shape(e.to_string()))
}
