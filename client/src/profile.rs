//! Profile and usecase handles.

use std::sync::Arc;

use onesdk_primitives::{ExecutionRequest, Value};

use crate::client::ClientInner;
use crate::error::{ClientError, PerformError};

/// A resolved profile. Holds its client alive.
#[derive(Clone)]
pub struct Profile {
    client: Arc<ClientInner>,
    name: String,
}

impl Profile {
    pub(crate) fn new(client: Arc<ClientInner>, name: String) -> Self {
        Self { client, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle for usecase `name` of this profile.
    ///
    /// Only the name's shape is checked here; whether the profile defines
    /// the usecase surfaces as an application error from `perform`.
    pub fn get_usecase(&self, name: &str) -> Result<UseCase, ClientError> {
        if !is_identifier(name) {
            return Err(ClientError::NotFound {
                kind: "usecase",
                name: format!("{}/{}", self.name, name),
            });
        }
        Ok(UseCase {
            client: Arc::clone(&self.client),
            profile: self.name.clone(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile").field("name", &self.name).finish()
    }
}

#[derive(Clone)]
pub struct UseCase {
    client: Arc<ClientInner>,
    profile: String,
    name: String,
}

impl UseCase {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Perform the usecase against `provider`.
    ///
    /// `Value::Null` for `parameters` or `security` means none.
    pub fn perform(
        &self,
        input: Value,
        provider: &str,
        parameters: Value,
        security: Value,
    ) -> Result<Value, PerformError> {
        let request = ExecutionRequest::new(&self.profile, &self.name, input, provider)
            .with_parameters(or_empty_map(parameters))
            .with_security(or_empty_map(security));
        self.client.perform(request)
    }
}

impl std::fmt::Debug for UseCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UseCase")
            .field("profile", &self.profile)
            .field("name", &self.name)
            .finish()
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn or_empty_map(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert!(is_identifier("Example"));
        assert!(is_identifier("CORE_PERFORM_TRUE"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("get-user"));
        assert!(!is_identifier("a b"));
    }

    #[test]
    fn test_null_means_empty_map() {
        assert_eq!(or_empty_map(Value::Null), serde_json::json!({}));
        assert_eq!(
            or_empty_map(serde_json::json!({ "k": 1 })),
            serde_json::json!({ "k": 1 })
        );
    }
}
