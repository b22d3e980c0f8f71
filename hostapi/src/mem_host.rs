//! In-memory host for testing.
//!
//! `MemHost` implements [`HostApi`] without any I/O: assets live in a map,
//! the clock is fixed, randomness is a counter, and HTTP calls are answered
//! from a queue of canned responses or, when the queue is empty, by echoing
//! the request back as a JSON body. Every call is recorded in order.
//!
//! `MemHost` is cheaply cloneable; clones share state, so a test can keep a
//! handle while the sandbox owns another.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use onesdk_primitives::{HttpRequest, HttpResponse, LogLevel, MultiMap};
use serde_json::json;

use crate::assets::resolve_asset_path;
use crate::error::HostError;
use crate::traits::HostApi;

/// One recorded host call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Http(HttpRequest),
    Clock,
    Random(usize),
    Log(LogLevel, String),
    Asset(String),
}

#[derive(Debug, Default)]
struct MemHostState {
    assets: BTreeMap<String, Vec<u8>>,
    responses: VecDeque<Result<HttpResponse, HostError>>,
    now_ms: u64,
    random_counter: u8,
    calls: Vec<HostCall>,
}

/// In-memory [`HostApi`].
#[derive(Debug, Clone, Default)]
pub struct MemHost {
    state: Arc<Mutex<MemHostState>>,
}

impl MemHost {
    /// Create a new host with no assets and the clock at the epoch.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemHostState> {
        // A panicking test thread must not hide the recorded calls.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an asset readable through `read_asset`.
    pub fn insert_asset(&self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.lock().assets.insert(path.into(), contents.into());
    }

    /// Queue a response for the next `http_call`.
    pub fn push_response(&self, response: Result<HttpResponse, HostError>) {
        self.lock().responses.push_back(response);
    }

    /// Set the fixed clock reading.
    pub fn set_time_ms(&self, now_ms: u64) {
        self.lock().now_ms = now_ms;
    }

    /// All calls recorded so far, in call order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    /// Only the HTTP requests recorded so far.
    pub fn http_requests(&self) -> Vec<HttpRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Http(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

/// Echo a request back: the body describes what was received.
fn echo_response(request: &HttpRequest) -> HttpResponse {
    let mut url = request.url.clone();
    let query: Vec<String> = request
        .query
        .iter()
        .flat_map(|(key, values)| values.iter().map(move |v| format!("{}={}", key, v)))
        .collect();
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }

    let body = json!({
        "method": request.method,
        "url": url,
        "headers": request.headers,
        "body": request.body,
    });

    let mut headers = MultiMap::new();
    headers.insert("content-type".into(), vec!["application/json".into()]);
    HttpResponse {
        status: 200,
        headers,
        body: body.to_string(),
    }
}

impl HostApi for MemHost {
    fn http_call(&mut self, request: &HttpRequest) -> Result<HttpResponse, HostError> {
        let mut state = self.lock();
        state.calls.push(HostCall::Http(request.clone()));
        match state.responses.pop_front() {
            Some(canned) => canned,
            None => Ok(echo_response(request)),
        }
    }

    fn unix_time_ms(&self) -> u64 {
        let mut state = self.lock();
        state.calls.push(HostCall::Clock);
        state.now_ms
    }

    fn random_bytes(&mut self, len: usize) -> Result<Vec<u8>, HostError> {
        let mut state = self.lock();
        state.calls.push(HostCall::Random(len));
        let mut buf = Vec::with_capacity(len);
        for _ in 0..len {
            buf.push(state.random_counter);
            state.random_counter = state.random_counter.wrapping_add(1);
        }
        Ok(buf)
    }

    fn log(&mut self, level: LogLevel, message: &str) {
        self.lock().calls.push(HostCall::Log(level, message.to_string()));
    }

    fn read_asset(&self, path: &str) -> Result<Vec<u8>, HostError> {
        let mut state = self.lock();
        state.calls.push(HostCall::Asset(path.to_string()));
        // Same path rules as the filesystem host; the root is irrelevant here.
        resolve_asset_path(std::path::Path::new(""), path)?;
        let key = path.trim_start_matches("./");
        state
            .assets
            .get(key)
            .cloned()
            .ok_or_else(|| HostError::AssetNotFound(path.to_string()))
    }
}
