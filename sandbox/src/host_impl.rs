//! Per-instance mutable state held in the Wasmtime Store.
//!
//! `HostState` owns the `HostApi` implementation serving the core's imports,
//! the store limits, and the per-session bookkeeping of in-flight imports.
//! It lives inside `Store<HostState>` for the lifetime of one instance.

use onesdk_hostapi::{HostApi, HostError};
use onesdk_primitives::exchange::{from_message, to_message};
use onesdk_primitives::types::{
    IMPORT_ASSET_READ, IMPORT_CLOCK_NOW, IMPORT_HTTP_CALL, IMPORT_LOG, IMPORT_RANDOM_BYTES,
};
use onesdk_primitives::{
    encode_result_envelope, AssetRequest, ClockReading, CodecError, HttpRequest, LogRequest,
    RandomRequest, Value,
};
use tracing::debug;
use wasmtime::{StoreLimits, StoreLimitsBuilder};

use crate::config::SandboxConfig;

/// An import the core has issued and the host has not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHostCall {
    /// Position of the call within the current session.
    pub seq: u64,
    pub import: &'static str,
}

/// Mutable state held in the Wasmtime `Store`.
pub struct HostState {
    host: Box<dyn HostApi>,
    /// Memory ceiling enforced through `Store::limiter`.
    pub(crate) limits: StoreLimits,
    forward_logs: bool,
    pending: Vec<PendingHostCall>,
    next_seq: u64,
}

impl HostState {
    pub fn new(host: Box<dyn HostApi>, config: &SandboxConfig) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes())
            .instances(1)
            .build();
        Self {
            host,
            limits,
            forward_logs: config.enable_guest_logs,
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    /// Reset per-session bookkeeping before a new session starts.
    pub fn begin_session(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                dropped = self.pending.len(),
                "dropping host calls left pending by the previous session"
            );
        }
        self.pending.clear();
        self.next_seq = 0;
    }

    /// Register an in-flight import; returns its sequence number.
    pub fn begin_call(&mut self, import: &'static str) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(PendingHostCall { seq, import });
        seq
    }

    /// Mark an import as answered.
    pub fn finish_call(&mut self, seq: u64) {
        self.pending.retain(|call| call.seq != seq);
    }

    pub fn pending_calls(&self) -> &[PendingHostCall] {
        &self.pending
    }

    /// Number of imports issued in the current session.
    pub fn calls_in_session(&self) -> u64 {
        self.next_seq
    }

    /// Serve one import.
    ///
    /// Returns the response envelope to hand back to the core. A host effect
    /// failure is an `Err` envelope; a request that does not fit the import's
    /// message shape is returned as `Err(CodecError)` and traps the core.
    pub fn dispatch(&mut self, import: &str, request: Value) -> Result<Value, CodecError> {
        let outcome = match import {
            IMPORT_HTTP_CALL => {
                let request: HttpRequest = from_message(request)?;
                debug!(import, method = %request.method, url = %request.url, "host call");
                self.host.http_call(&request).map(|r| to_message(&r))
            }
            IMPORT_CLOCK_NOW => {
                if !request.is_null() {
                    return Err(CodecError::Shape("clock_now takes no arguments".into()));
                }
                let reading = ClockReading {
                    unix_ms: self.host.unix_time_ms(),
                };
                Ok(to_message(&reading))
            }
            IMPORT_RANDOM_BYTES => {
                let request: RandomRequest = from_message(request)?;
                self.host
                    .random_bytes(request.len)
                    .map(|bytes| Value::Array(bytes.into_iter().map(Value::from).collect()))
            }
            IMPORT_LOG => {
                let request: LogRequest = from_message(request)?;
                if self.forward_logs {
                    self.host.log(request.level, &request.message);
                }
                Ok(Value::Null)
            }
            IMPORT_ASSET_READ => {
                let request: AssetRequest = from_message(request)?;
                debug!(import, path = %request.path, "host call");
                self.host.read_asset(&request.path).and_then(|bytes| {
                    String::from_utf8(bytes)
                        .map(Value::String)
                        .map_err(|_| {
                            HostError::InvalidRequest(format!("asset {} is not UTF-8", request.path))
                        })
                })
            }
            other => return Err(CodecError::Shape(format!("unknown import {}", other))),
        };

        Ok(match outcome {
            Ok(value) => encode_result_envelope(Ok(value)),
            Err(err) => {
                debug!(import, code = err.code(), "host call failed: {}", err);
                encode_result_envelope(Err(to_message(&err.to_failure())))
            }
        })
    }
}
