//! Host-side configuration types.
//!
//! `HostConfig` bundles the limits applied by the host while serving
//! imports for the core.

use std::time::Duration;

/// Limits and settings for the host effects behind the imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Per-request timeout for provider HTTP calls.
    pub http_timeout: Duration,
    /// `User-Agent` sent with provider HTTP calls.
    pub user_agent: String,
    /// Largest `random_bytes` request served.
    pub max_random_bytes: usize,
    /// Core log lines longer than this are truncated.
    pub max_log_line_len: usize,
    /// Largest asset `asset_read` will return.
    pub max_asset_bytes: u64,
    /// Largest provider response body `http_call` will accept.
    pub max_response_bytes: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            user_agent: concat!("onesdk-rust/", env!("CARGO_PKG_VERSION")).to_string(),
            max_random_bytes: 4096,
            max_log_line_len: 4096,
            max_asset_bytes: 16 * 1024 * 1024, // 16 MiB
            max_response_bytes: 8 * 1024 * 1024,
        }
    }
}
