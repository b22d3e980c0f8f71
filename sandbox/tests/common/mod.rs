//! Shared test helpers for integration tests.
//!
//! Provides sandbox factories over the scripted test core, request
//! builders, and a reader for the core's own allocation counter.

#![allow(dead_code)]

use onesdk_hostapi::MemHost;
use onesdk_primitives::ExecutionRequest;
use onesdk_sandbox::testing::{self, EXPORT_LIVE_ALLOCATIONS};
use onesdk_sandbox::{CoreModule, SandboxConfig, SandboxInstance};
use serde_json::json;

pub const PROFILE: &str = "wasm-sdk/example";
pub const PROVIDER: &str = "localhost";

/// Compile the scripted core.
pub fn test_module() -> CoreModule {
    testing::core_module().expect("scripted core must compile")
}

/// Load an instance with `config` backed by `host`.
pub fn load_with(host: &MemHost, config: SandboxConfig) -> SandboxInstance {
    SandboxInstance::load(&test_module(), Box::new(host.clone()), &config)
        .expect("scripted core must load")
}

/// Load an instance with the default config; returns the shared host handle.
pub fn load_instance() -> (SandboxInstance, MemHost) {
    let host = MemHost::new();
    let instance = load_with(&host, SandboxConfig::default());
    (instance, host)
}

/// A request for `usecase` with the canonical example arguments.
pub fn make_request(usecase: &str) -> ExecutionRequest {
    ExecutionRequest::new(PROFILE, usecase, json!({ "id": 1 }), PROVIDER)
        .with_parameters(json!({ "PARAM": "parameter_value" }))
        .with_security(json!({
            "basic_auth": { "username": "username", "password": "password" }
        }))
}

/// Regions the core has handed out and not had back.
pub fn core_live_allocations(instance: &mut SandboxInstance) -> i32 {
    instance
        .call_i32(EXPORT_LIVE_ALLOCATIONS, &[])
        .expect("allocation counter must be callable")
}
