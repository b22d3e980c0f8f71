//! Public error contract of the client.
//!
//! Resolution failures are [`ClientError`]. A perform fails with
//! [`PerformError`], which keeps the two failure classes apart:
//! `Application` carries the structured payload the usecase produced,
//! `Unexpected` means the core itself misbehaved and carries only a message.

use onesdk_primitives::Value;

/// Failure resolving a profile or usecase, or building the config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A usecase-level failure produced deliberately by the core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("application error: {payload}")]
pub struct ApplicationError {
    payload: Value,
}

impl ApplicationError {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// The structured error as the usecase reported it.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// `code` field of the payload, when it has one.
    pub fn code(&self) -> Option<&str> {
        self.payload.get("code").and_then(Value::as_str)
    }
}

/// The core faulted; the operation's outcome is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected error: {message}")]
pub struct UnexpectedError {
    message: String,
}

impl UnexpectedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure of [`UseCase::perform`](crate::UseCase::perform).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PerformError {
    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error(transparent)]
    Unexpected(#[from] UnexpectedError),
}

impl PerformError {
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Unexpected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_application_error_code() {
        let err = ApplicationError::new(json!({ "code": "NotFound", "message": "no such user" }));
        assert_eq!(err.code(), Some("NotFound"));
        assert_eq!(ApplicationError::new(json!("plain")).code(), None);
    }

    #[test]
    fn test_display() {
        let err = PerformError::from(UnexpectedError::new("core trapped"));
        assert_eq!(err.to_string(), "unexpected error: core trapped");
        assert!(err.is_unexpected());

        let err = ClientError::NotFound {
            kind: "profile",
            name: "wasm-sdk/missing".into(),
        };
        assert_eq!(err.to_string(), "profile not found: wasm-sdk/missing");

        let err = PerformError::from(ApplicationError::new(json!({ "code": "NotFound" })));
        assert_eq!(err.to_string(), r#"application error: {"code":"NotFound"}"#);
        assert!(!err.is_unexpected());
        let source: &dyn std::error::Error = &ApplicationError::new(json!(null));
        assert!(source.source().is_none());
    }
}
