//! Usecase dispatch.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

use onesdk_primitives::{ExecutionRequest, HostFailure, HttpRequest, LogLevel, MultiMap};

use crate::imports;

/// Run `request`: `Ok` is the usecase result, `Err` its error payload.
pub fn perform(request: &ExecutionRequest) -> Result<Value, Value> {
    match request.usecase.as_str() {
        "CORE_PERFORM_TRUE" => Ok(Value::Bool(true)),
        "CORE_PERFORM_PANIC" => panic!("requested panic"),
        "Example" => example(request),
        other => Err(error(
            "unknown_usecase",
            format!("{} has no usecase {}", request.profile, other),
        )),
    }
}

fn error(code: &str, message: impl Into<String>) -> Value {
    json!({ "code": code, "message": message.into() })
}

fn host_error(failure: HostFailure) -> Value {
    error(&failure.code, failure.message)
}

fn example(request: &ExecutionRequest) -> Result<Value, Value> {
    let base_url = provider_base_url(&request.provider, &request.parameters)?;
    let id = match &request.input["id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Err(error("invalid_input", "input.id must be a number or string")),
    };
    let url = format!("{}/api/{}", base_url.trim_end_matches('/'), id);

    let mut headers = MultiMap::new();
    headers.insert("accept".into(), vec!["application/json".into()]);
    if let Some(authorization) = basic_auth(&request.security) {
        headers.insert("authorization".into(), vec![authorization]);
    }

    let started = imports::now_ms().unwrap_or(0);
    let response = imports::http(&HttpRequest {
        method: "GET".into(),
        url: url.clone(),
        headers,
        query: MultiMap::new(),
        body: None,
    })
    .map_err(host_error)?;
    let elapsed = imports::now_ms().unwrap_or(started).saturating_sub(started);
    imports::write_log(
        LogLevel::Debug,
        format!("GET {} -> {} in {}ms", url, response.status, elapsed),
    );

    let body = serde_json::from_str(&response.body).unwrap_or(Value::String(response.body));
    Ok(json!({ "url": url, "status": response.status, "body": body }))
}

/// Base URL of the provider's default service, with `{NAME}` placeholders
/// filled from `parameters`.
fn provider_base_url(provider: &str, parameters: &Value) -> Result<String, Value> {
    let document = imports::read_asset(&format!("{}.provider.json", provider)).map_err(host_error)?;
    let document: Value = serde_json::from_str(&document)
        .map_err(|e| error("invalid_provider", format!("{}: {}", provider, e)))?;

    let services = document["services"].as_array().cloned().unwrap_or_default();
    let default_service = document["defaultService"].as_str();
    let service = services
        .iter()
        .find(|s| default_service.is_some() && s["id"].as_str() == default_service)
        .or_else(|| services.first())
        .ok_or_else(|| error("invalid_provider", format!("{} defines no services", provider)))?;
    let mut base_url = service["baseUrl"]
        .as_str()
        .ok_or_else(|| error("invalid_provider", format!("{} service has no baseUrl", provider)))?
        .to_string();

    if let Value::Object(parameters) = parameters {
        for (name, value) in parameters {
            if let Some(value) = value.as_str() {
                base_url = base_url.replace(&format!("{{{}}}", name), value);
            }
        }
    }
    Ok(base_url)
}

fn basic_auth(security: &Value) -> Option<String> {
    let credentials = security.as_object()?.values().find(|v| v.get("username").is_some())?;
    let username = credentials["username"].as_str()?;
    let password = credentials["password"].as_str().unwrap_or("");
    Some(format!("Basic {}", BASE64.encode(format!("{}:{}", username, password))))
}
