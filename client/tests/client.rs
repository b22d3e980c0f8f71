//! End-to-end behavior of the client facade.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use onesdk::{ClientConfig, ClientError, CoreSource, OneClient, PerformError, RecreatePolicy};
use onesdk_hostapi::HostError;
use onesdk_primitives::{HttpResponse, MultiMap};
use onesdk_sandbox::testing::{
    HTTP_ECHO_URL, UNKNOWN_USECASE_CODE, USECASE_HTTP_ECHO, USECASE_PANIC, USECASE_TRUE,
};
use onesdk_sandbox::INVALID_REQUEST_CODE;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::*;

fn basic_auth() -> serde_json::Value {
    json!({ "basic_auth": { "username": "username", "password": "password" } })
}

fn perform(client: &OneClient, usecase: &str) -> Result<serde_json::Value, PerformError> {
    client
        .get_profile(PROFILE)
        .unwrap()
        .get_usecase(usecase)
        .unwrap()
        .perform(
            json!({ "id": 1 }),
            PROVIDER,
            json!({ "PARAM": "parameter_value" }),
            basic_auth(),
        )
}

// ── Built guest core ──

#[test]
fn test_basic_use() {
    let assets = assets_dir();
    let Some((client, host)) = guest_client(&assets) else {
        return;
    };

    let result = perform(&client, "Example").unwrap();
    assert!(result["url"].as_str().unwrap().contains("/api/1"), "{}", result);

    let requests = host.http_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://localhost:8000/api/1");
    assert!(requests[0].headers.contains_key("authorization"));
}

#[test]
fn test_guest_panic_then_recovery() {
    let assets = assets_dir();
    let Some((client, _host)) = guest_client(&assets) else {
        return;
    };

    let err = perform(&client, USECASE_PANIC).unwrap_err();
    assert!(err.is_unexpected(), "{}", err);
    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));
}

// ── Scripted core ──

#[test]
fn test_destroy_without_setup() {
    let assets = assets_dir();
    let config = ClientConfig::new(assets.path(), REGISTRY_URL)
        .with_core(CoreSource::Path(PathBuf::from("/nonexistent/core.wasm")));
    let client = OneClient::new(config);
    client.destroy();
    client.destroy();

    // The missing core only shows up once something needs it
    let err = perform(&client, USECASE_TRUE).unwrap_err();
    assert!(err.is_unexpected(), "{}", err);
}

#[test]
fn test_panicked_core() {
    let assets = assets_dir();
    let (client, _host) = scripted_client(&assets);

    let err = perform(&client, USECASE_PANIC).unwrap_err();
    assert!(matches!(err, PerformError::Unexpected(_)), "{:?}", err);
    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));
}

#[test]
fn test_manual_policy_waits_for_reset() {
    let assets = assets_dir();
    let (_host, factory) = mem_host();
    let client =
        OneClient::with_host_factory(scripted_config(&assets, RecreatePolicy::Manual), factory);

    assert!(perform(&client, USECASE_PANIC).unwrap_err().is_unexpected());
    let err = perform(&client, USECASE_TRUE).unwrap_err();
    assert!(err.to_string().contains("reset()"), "{}", err);

    client.reset();
    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));
}

#[test]
fn test_destroy_then_perform() {
    let assets = assets_dir();
    let (client, _host) = scripted_client(&assets);
    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));

    client.destroy();
    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));

    let (_host, factory) = mem_host();
    let manual =
        OneClient::with_host_factory(scripted_config(&assets, RecreatePolicy::Manual), factory);
    assert_eq!(perform(&manual, USECASE_TRUE).unwrap(), json!(true));
    manual.destroy();
    assert!(perform(&manual, USECASE_TRUE).unwrap_err().is_unexpected());
    manual.reset();
    assert_eq!(perform(&manual, USECASE_TRUE).unwrap(), json!(true));
}

#[test]
fn test_unknown_usecase_is_application_error() {
    let assets = assets_dir();
    let (client, _host) = scripted_client(&assets);

    match perform(&client, "Missing").unwrap_err() {
        PerformError::Application(err) => assert_eq!(err.code(), Some(UNKNOWN_USECASE_CODE)),
        other => panic!("expected application error, got {:?}", other),
    }
    // An application error leaves the core healthy
    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));
}

#[test]
fn test_too_deep_input_is_application_error() {
    let assets = assets_dir();
    let (host, factory) = mem_host();
    let client =
        OneClient::with_host_factory(scripted_config(&assets, RecreatePolicy::Manual), factory);
    let input = (0..200).fold(json!(1), |inner, _| json!([inner]));

    let err = client
        .get_profile(PROFILE)
        .unwrap()
        .get_usecase(USECASE_TRUE)
        .unwrap()
        .perform(input, PROVIDER, json!({}), json!({}))
        .unwrap_err();
    match err {
        PerformError::Application(err) => assert_eq!(err.code(), Some(INVALID_REQUEST_CODE)),
        other => panic!("expected application error, got {:?}", other),
    }
    assert!(host.calls().is_empty());
    // The instance was never poisoned, so no reset is needed under Manual
    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));
}

#[test]
fn test_response_too_large_for_core_is_application_error() {
    let assets = assets_dir();
    let (host, factory) = mem_host();
    let mut config = scripted_config(&assets, RecreatePolicy::Manual);
    config.sandbox.max_memory_pages = 4;
    let client = OneClient::with_host_factory(config, factory);

    host.push_response(Ok(HttpResponse {
        status: 200,
        headers: MultiMap::new(),
        body: "x".repeat(300_000),
    }));
    match perform(&client, USECASE_HTTP_ECHO).unwrap_err() {
        PerformError::Application(err) => assert_eq!(err.code(), Some("response_too_large")),
        other => panic!("expected application error, got {:?}", other),
    }
    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));
}

#[test]
fn test_http_through_host() {
    let assets = assets_dir();
    let (client, host) = scripted_client(&assets);

    let result = perform(&client, USECASE_HTTP_ECHO).unwrap();
    assert_eq!(result["status"], 200);
    assert!(result["body"].as_str().unwrap().contains("/api/1"));
    assert_eq!(host.http_requests()[0].url, HTTP_ECHO_URL);

    host.push_response(Err(HostError::Timeout(30_000)));
    match perform(&client, USECASE_HTTP_ECHO).unwrap_err() {
        PerformError::Application(err) => assert_eq!(err.code(), Some("timeout")),
        other => panic!("expected application error, got {:?}", other),
    }
}

#[test]
fn test_concurrent_performs_are_serialized() {
    let assets = assets_dir();
    let (client, _host) = scripted_client(&assets);
    let client = Arc::new(client);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for _ in 0..10 {
                    assert_eq!(perform(&client, USECASE_TRUE).unwrap(), json!(true));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_periodic() {
    let assets = assets_dir();
    let (client, _host) = scripted_client(&assets);
    // Nothing to tick before the first perform
    client.periodic().unwrap();

    perform(&client, USECASE_TRUE).unwrap();
    client.periodic().unwrap();
    client.periodic().unwrap();
}

// ── Resolution ──

#[test]
fn test_get_profile_not_found() {
    let assets = assets_dir();
    let (client, _host) = scripted_client(&assets);

    for name in ["wasm-sdk/missing", "other/example", "../wasm-sdk.example", ""] {
        match client.get_profile(name).unwrap_err() {
            ClientError::NotFound { kind, name: got } => {
                assert_eq!(kind, "profile");
                assert_eq!(got, name);
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }
}

#[test]
fn test_get_usecase_checks_name() {
    let assets = assets_dir();
    let (client, _host) = scripted_client(&assets);
    let profile = client.get_profile(PROFILE).unwrap();
    assert_eq!(profile.name(), PROFILE);

    let usecase = profile.get_usecase("Example").unwrap();
    assert_eq!(usecase.profile(), PROFILE);
    assert_eq!(usecase.name(), "Example");

    assert!(matches!(
        profile.get_usecase("not-an-identifier"),
        Err(ClientError::NotFound { kind: "usecase", .. })
    ));
    assert!(profile.get_usecase("").is_err());
}

#[test]
fn test_profile_outlives_client_handle() {
    let assets = assets_dir();
    let (client, _host) = scripted_client(&assets);
    let usecase = client
        .get_profile(PROFILE)
        .unwrap()
        .get_usecase(USECASE_TRUE)
        .unwrap();
    drop(client);

    let result = usecase.perform(json!(null), PROVIDER, json!(null), json!(null));
    assert_eq!(result.unwrap(), json!(true));
}
