//! Shared fixtures for client tests: a temporary assets directory and
//! clients wired to the scripted core or the built guest core.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use onesdk::{ClientConfig, CoreSource, HostFactory, OneClient, RecreatePolicy};
use onesdk_hostapi::{HostApi, MemHost};
use onesdk_sandbox::testing;
use tempfile::TempDir;

pub const PROFILE: &str = "wasm-sdk/example";
pub const PROVIDER: &str = "localhost";
pub const REGISTRY_URL: &str = "superface.localhost";

pub const PROFILE_DOCUMENT: &str = r#"name = "wasm-sdk/example"
version = "1.0.0"

usecase Example {
  input { id! number! }
  result { url! string! }
}
"#;

pub const PROVIDER_DOCUMENT: &str = r#"{
  "name": "localhost",
  "services": [{ "id": "default", "baseUrl": "http://localhost:8000" }],
  "defaultService": "default",
  "securitySchemes": [{ "id": "basic_auth", "type": "http", "scheme": "basic" }],
  "parameters": [{ "name": "PARAM" }]
}"#;

/// Built guest core, present only after building `core-guest` for
/// `wasm32-unknown-unknown`.
pub const GUEST_CORE_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../core-guest/target/wasm32-unknown-unknown/release/onesdk_core_guest.wasm"
);

/// Assets directory holding the example profile.
pub fn assets_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("wasm-sdk.example.profile"), PROFILE_DOCUMENT).unwrap();
    std::fs::write(dir.path().join("localhost.provider.json"), PROVIDER_DOCUMENT).unwrap();
    dir
}

/// A `MemHost` serving the provider document, plus a factory that hands
/// out clones of it.
pub fn mem_host() -> (MemHost, HostFactory) {
    let host = MemHost::new();
    host.insert_asset("localhost.provider.json", PROVIDER_DOCUMENT);
    let shared = host.clone();
    let factory: HostFactory =
        Arc::new(move |_| Ok(Box::new(shared.clone()) as Box<dyn HostApi>));
    (host, factory)
}

pub fn scripted_config(assets: &TempDir, policy: RecreatePolicy) -> ClientConfig {
    ClientConfig::new(assets.path(), REGISTRY_URL)
        .with_core(CoreSource::Bytes(testing::core_wat().into_bytes()))
        .with_recreate_policy(policy)
}

/// Client over the scripted core with the default recreation policy.
pub fn scripted_client(assets: &TempDir) -> (OneClient, MemHost) {
    let (host, factory) = mem_host();
    let client =
        OneClient::with_host_factory(scripted_config(assets, RecreatePolicy::default()), factory);
    (client, host)
}

/// Client over the built guest core, or `None` when it has not been built.
pub fn guest_client(assets: &TempDir) -> Option<(OneClient, MemHost)> {
    let path = PathBuf::from(GUEST_CORE_PATH);
    if !path.exists() {
        eprintln!("skipping: guest core not built at {}", path.display());
        return None;
    }
    let (host, factory) = mem_host();
    let config = ClientConfig::new(assets.path(), REGISTRY_URL).with_core(CoreSource::Path(path));
    Some((OneClient::with_host_factory(config, factory), host))
}
