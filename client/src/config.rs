//! Client configuration.
//!
//! `ClientConfig` is a plain struct with builder-style setters. Nothing here
//! touches the filesystem or the network; the core is compiled on the first
//! perform.

use std::path::PathBuf;
use std::time::Duration;

use onesdk_hostapi::HostConfig;
use onesdk_sandbox::SandboxConfig;

use crate::error::ClientError;

pub const DEFAULT_ASSETS_PATH: &str = "superface";
pub const DEFAULT_REGISTRY_URL: &str = "https://superface.ai";
/// Core file looked up under the assets location when no core is configured.
pub const DEFAULT_CORE_FILE: &str = "core.wasm";

pub const ENV_ASSETS_PATH: &str = "ONESDK_ASSETS_PATH";
pub const ENV_REGISTRY_URL: &str = "SUPERFACE_API_URL";
pub const ENV_REGISTRY_TOKEN: &str = "SUPERFACE_SDK_TOKEN";
pub const ENV_CORE_PATH: &str = "ONESDK_CORE_PATH";
pub const ENV_HTTP_TIMEOUT_MS: &str = "ONESDK_HTTP_TIMEOUT_MS";

/// Where the core module comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreSource {
    /// A `.wasm` file.
    Path(PathBuf),
    /// Module bytes (binary or text) held in memory.
    Bytes(Vec<u8>),
}

/// When a poisoned or destroyed core instance is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecreatePolicy {
    /// Rebuild it transparently on the next perform.
    #[default]
    OnNextPerform,
    /// Fail every perform until [`OneClient::reset`](crate::OneClient::reset).
    Manual,
}

/// Configuration for a [`OneClient`](crate::OneClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding profiles, provider definitions and maps.
    pub assets_path: PathBuf,
    /// Registry endpoint handed to the core with every request.
    pub registry_url: String,
    /// Optional credential for the registry.
    pub registry_token: Option<String>,
    pub core: CoreSource,
    pub recreate_policy: RecreatePolicy,
    pub sandbox: SandboxConfig,
    pub host: HostConfig,
}

impl ClientConfig {
    /// Config with the core at `<assets_path>/core.wasm` and default limits.
    pub fn new(assets_path: impl Into<PathBuf>, registry_url: impl Into<String>) -> Self {
        let assets_path = assets_path.into();
        Self {
            core: CoreSource::Path(assets_path.join(DEFAULT_CORE_FILE)),
            assets_path,
            registry_url: registry_url.into(),
            registry_token: None,
            recreate_policy: RecreatePolicy::default(),
            sandbox: SandboxConfig::default(),
            host: HostConfig::default(),
        }
    }

    pub fn with_registry_token(mut self, token: impl Into<String>) -> Self {
        self.registry_token = Some(token.into());
        self
    }

    pub fn with_core(mut self, core: CoreSource) -> Self {
        self.core = core;
        self
    }

    pub fn with_recreate_policy(mut self, policy: RecreatePolicy) -> Self {
        self.recreate_policy = policy;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_host(mut self, host: HostConfig) -> Self {
        self.host = host;
        self
    }

    /// Build a config from the process environment.
    ///
    /// Reads `ONESDK_ASSETS_PATH`, `SUPERFACE_API_URL`, `SUPERFACE_SDK_TOKEN`,
    /// `ONESDK_CORE_PATH` and `ONESDK_HTTP_TIMEOUT_MS`; unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let assets_path = lookup(ENV_ASSETS_PATH).unwrap_or_else(|| DEFAULT_ASSETS_PATH.to_string());
        let registry_url = lookup(ENV_REGISTRY_URL).unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
        let mut config = Self::new(assets_path, registry_url);
        config.registry_token = lookup(ENV_REGISTRY_TOKEN).filter(|token| !token.trim().is_empty());

        if let Some(core_path) = lookup(ENV_CORE_PATH) {
            config.core = CoreSource::Path(core_path.into());
        }
        if let Some(timeout) = lookup(ENV_HTTP_TIMEOUT_MS) {
            let millis: u64 = timeout.trim().parse().map_err(|_| {
                ClientError::Config(format!("{} must be milliseconds, got {:?}", ENV_HTTP_TIMEOUT_MS, timeout))
            })?;
            config.host.http_timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("assets", "superface.localhost");
        assert_eq!(config.core, CoreSource::Path(PathBuf::from("assets/core.wasm")));
        assert_eq!(config.recreate_policy, RecreatePolicy::OnNextPerform);
        assert_eq!(config.registry_url, "superface.localhost");
    }

    #[test]
    fn test_from_empty_env() {
        let config = ClientConfig::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(config.assets_path, PathBuf::from(DEFAULT_ASSETS_PATH));
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.registry_token, None);
        assert_eq!(config.host, HostConfig::default());
    }

    #[test]
    fn test_from_env_overrides() {
        let config = ClientConfig::from_lookup(lookup_in(&[
            (ENV_ASSETS_PATH, "/srv/assets"),
            (ENV_REGISTRY_URL, "https://registry.test"),
            (ENV_REGISTRY_TOKEN, "sfs_token"),
            (ENV_CORE_PATH, "/opt/core.wasm"),
            (ENV_HTTP_TIMEOUT_MS, "1500"),
        ]))
        .unwrap();
        assert_eq!(config.assets_path, PathBuf::from("/srv/assets"));
        assert_eq!(config.registry_url, "https://registry.test");
        assert_eq!(config.registry_token.as_deref(), Some("sfs_token"));
        assert_eq!(config.core, CoreSource::Path(PathBuf::from("/opt/core.wasm")));
        assert_eq!(config.host.http_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_blank_token_is_unset() {
        let config = ClientConfig::from_lookup(lookup_in(&[(ENV_REGISTRY_TOKEN, "  ")])).unwrap();
        assert_eq!(config.registry_token, None);
        let config = ClientConfig::new("assets", DEFAULT_REGISTRY_URL).with_registry_token("sfs_token");
        assert_eq!(config.registry_token.as_deref(), Some("sfs_token"));
    }

    #[test]
    fn test_bad_timeout() {
        let err = ClientConfig::from_lookup(lookup_in(&[(ENV_HTTP_TIMEOUT_MS, "soon")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
