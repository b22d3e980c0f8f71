//! Execution boundary types: the perform request and the result envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CodecError;

/// Envelope key of a successful result.
pub const ENVELOPE_OK: &str = "Ok";
/// Envelope key of an application-level error.
pub const ENVELOPE_ERR: &str = "Err";

/// One perform request, passed to `onesdk_perform`.
///
/// Immutable once built; serialized as a mapping with one key per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Profile identifier, `scope/name` or `name`.
    pub profile: String,
    /// Usecase name within the profile.
    pub usecase: String,
    /// Usecase input.
    pub input: Value,
    /// Provider identifier.
    pub provider: String,
    /// Integration parameters, string to string.
    pub parameters: Value,
    /// Security values, scheme name to credential fields.
    pub security: Value,
    /// Registry the core may resolve missing assets from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,
    /// Credential for the registry, sent only with `registry_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_token: Option<String>,
}

impl ExecutionRequest {
    /// Build a request with empty parameters and security.
    pub fn new(
        profile: impl Into<String>,
        usecase: impl Into<String>,
        input: Value,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            profile: profile.into(),
            usecase: usecase.into(),
            input,
            provider: provider.into(),
            parameters: Value::Object(Map::new()),
            security: Value::Object(Map::new()),
            registry_url: None,
            registry_token: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_security(mut self, security: Value) -> Self {
        self.security = security;
        self
    }

    pub fn with_registry_url(mut self, registry_url: Option<String>) -> Self {
        self.registry_url = registry_url;
        self
    }

    pub fn with_registry_token(mut self, registry_token: Option<String>) -> Self {
        self.registry_token = registry_token;
        self
    }

    /// Convert to the structured value handed to the codec.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("profile".into(), Value::String(self.profile.clone()));
        map.insert("usecase".into(), Value::String(self.usecase.clone()));
        map.insert("input".into(), self.input.clone());
        map.insert("provider".into(), Value::String(self.provider.clone()));
        map.insert("parameters".into(), self.parameters.clone());
        map.insert("security".into(), self.security.clone());
        if let Some(url) = &self.registry_url {
            map.insert("registry_url".into(), Value::String(url.clone()));
        }
        if let Some(token) = &self.registry_token {
            map.insert("registry_token".into(), Value::String(token.clone()));
        }
        Value::Object(map)
    }

    /// Parse a request received by the core.
    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        serde_json::from_value(value).map_err(|e| CodecError::Shape(e.to_string()))
    }
}

/// Wrap a usecase result into the result envelope.
pub fn encode_result_envelope(result: Result<Value, Value>) -> Value {
    let mut map = Map::new();
    match result {
        Ok(value) => map.insert(ENVELOPE_OK.into(), value),
        Err(error) => map.insert(ENVELOPE_ERR.into(), error),
    };
    Value::Object(map)
}

/// Unwrap a result envelope: `{"Ok": v}` or `{"Err": e}`, nothing else.
pub fn decode_result_envelope(value: Value) -> Result<Result<Value, Value>, CodecError> {
    let Value::Object(map) = value else {
        return Err(CodecError::Shape("result envelope must be a mapping".into()));
    };
    if map.len() != 1 {
        return Err(CodecError::Shape(format!(
            "result envelope must have exactly one key, got {}",
            map.len()
        )));
    }
    let Some((key, inner)) = map.into_iter().next() else {
        return Err(CodecError::Shape("empty result envelope".into()));
    };
    match key.as_str() {
        ENVELOPE_OK => Ok(Ok(inner)),
        ENVELOPE_ERR => Ok(Err(inner)),
        other => Err(CodecError::Shape(format!(
            "unknown result envelope key {:?}",
            other
        ))),
    }
}
