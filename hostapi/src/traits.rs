//! Host API trait: the host effects the core may request.
//!
//! Each method backs one import of the `onesdk_host` module. Pointer
//! validation and message decoding happen in the sandbox; this trait works
//! with typed requests, not raw WASM pointers.

use onesdk_primitives::{HttpRequest, HttpResponse, LogLevel};

use crate::error::HostError;

/// Host-side implementation of the core's imports.
///
/// The sandbox owns one implementation per instance and calls it
/// synchronously from inside the import, in the order the core issues
/// the calls. Every method must finish (or time out) before returning:
/// the core is blocked for the duration.
pub trait HostApi: Send {
    /// Perform an HTTP request against a provider.
    ///
    /// Transport failures are returned as `Err`, a non-2xx status is a
    /// normal response.
    fn http_call(&mut self, request: &HttpRequest) -> Result<HttpResponse, HostError>;

    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn unix_time_ms(&self) -> u64;

    /// Produce `len` random bytes.
    fn random_bytes(&mut self, len: usize) -> Result<Vec<u8>, HostError>;

    /// Emit a log line on behalf of the core.
    ///
    /// Best-effort; the core must not branch on it.
    fn log(&mut self, level: LogLevel, message: &str);

    /// Read an asset by path relative to the assets location.
    fn read_asset(&self, path: &str) -> Result<Vec<u8>, HostError>;
}
