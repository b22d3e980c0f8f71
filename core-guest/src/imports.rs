//! `onesdk_host` imports and their safe wrappers.
//!
//! Every import takes an encoded request and answers through two out-slots
//! with a buffer this core allocated (via `onesdk_alloc`) and must free.
//! Native builds have no `onesdk_host` to link against; there the imports
//! are answered by a handler installed with [`stub::install`].

use onesdk_primitives::exchange::{from_message, to_message};
use onesdk_primitives::{
    AssetRequest, ClockReading, HostFailure, HttpRequest, HttpResponse, LogLevel, LogRequest,
    Value,
};

/// The host function a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Import {
    Http,
    Clock,
    Log,
    Asset,
}

fn failure(code: &str, message: impl Into<String>) -> HostFailure {
    HostFailure {
        code: code.to_string(),
        message: message.into(),
    }
}

#[cfg(target_arch = "wasm32")]
use self::wasm::exchange;

#[cfg(not(target_arch = "wasm32"))]
use self::stub::exchange;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use onesdk_primitives::exchange::from_message;
    use onesdk_primitives::{codec, decode_result_envelope, HostFailure, Value};

    use super::{failure, Import};
    use crate::exports::release;

    #[link(wasm_import_module = "onesdk_host")]
    extern "C" {
        fn http_call(req_ptr: i32, req_len: i32, out_ptr_ptr: i32, out_len_ptr: i32) -> i32;
        fn clock_now(req_ptr: i32, req_len: i32, out_ptr_ptr: i32, out_len_ptr: i32) -> i32;
        fn log(req_ptr: i32, req_len: i32, out_ptr_ptr: i32, out_len_ptr: i32) -> i32;
        fn asset_read(req_ptr: i32, req_len: i32, out_ptr_ptr: i32, out_len_ptr: i32) -> i32;
    }

    type RawImport = unsafe extern "C" fn(i32, i32, i32, i32) -> i32;

    /// One request/response round trip through `import`.
    pub(super) fn exchange(import: Import, request: &Value) -> Result<Value, HostFailure> {
        let function: RawImport = match import {
            Import::Http => http_call,
            Import::Clock => clock_now,
            Import::Log => log,
            Import::Asset => asset_read,
        };
        let encoded = codec::encode(request).map_err(|e| failure("encoding", e.to_string()))?;
        let mut out_ptr: u32 = 0;
        let mut out_len: u32 = 0;

        let status = unsafe {
            function(
                encoded.as_ptr() as i32,
                encoded.len() as i32,
                &mut out_ptr as *mut u32 as i32,
                &mut out_len as *mut u32 as i32,
            )
        };
        if status != 0 {
            return Err(failure("host_status", format!("host returned status {}", status)));
        }

        let response =
            unsafe { std::slice::from_raw_parts(out_ptr as *const u8, out_len as usize) }.to_vec();
        release(out_ptr, out_len);

        let envelope = codec::decode(&response).map_err(|e| failure("encoding", e.to_string()))?;
        match decode_result_envelope(envelope).map_err(|e| failure("encoding", e.to_string()))? {
            Ok(value) => Ok(value),
            Err(payload) => {
                Err(from_message(payload).unwrap_or_else(|e| failure("encoding", e.to_string())))
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) mod stub {
    use std::cell::RefCell;

    use onesdk_primitives::{codec, HostFailure, Value};

    use super::{failure, Import};

    type Handler = Box<dyn FnMut(Import, &Value) -> Result<Value, HostFailure>>;

    thread_local! {
        static HANDLER: RefCell<Option<Handler>> = RefCell::new(None);
    }

    /// Answer this thread's imports with `handler`.
    pub fn install(handler: impl FnMut(Import, &Value) -> Result<Value, HostFailure> + 'static) {
        HANDLER.with(|slot| *slot.borrow_mut() = Some(Box::new(handler)));
    }

    /// Requests still go through the codec so encoding limits apply.
    pub(super) fn exchange(import: Import, request: &Value) -> Result<Value, HostFailure> {
        let encoded = codec::encode(request).map_err(|e| failure("encoding", e.to_string()))?;
        let request = codec::decode(&encoded).map_err(|e| failure("encoding", e.to_string()))?;
        HANDLER.with(|slot| match slot.borrow_mut().as_mut() {
            Some(handler) => handler(import, &request),
            None => Err(failure("unavailable", format!("no host for {:?}", import))),
        })
    }
}

pub fn http(request: &HttpRequest) -> Result<HttpResponse, HostFailure> {
    let value = exchange(Import::Http, &to_message(request))?;
    from_message(value).map_err(|e| failure("encoding", e.to_string()))
}

pub fn now_ms() -> Result<u64, HostFailure> {
    let value = exchange(Import::Clock, &Value::Null)?;
    let reading: ClockReading = from_message(value).map_err(|e| failure("encoding", e.to_string()))?;
    Ok(reading.unix_ms)
}

/// Log through the host. Dropped silently if the host refuses.
pub fn write_log(level: LogLevel, message: impl Into<String>) {
    let request = LogRequest {
        level,
        message: message.into(),
    };
    let _ = exchange(Import::Log, &to_message(&request));
}

pub fn read_asset(path: &str) -> Result<String, HostFailure> {
    let request = AssetRequest { path: path.to_string() };
    match exchange(Import::Asset, &to_message(&request))? {
        Value::String(contents) => Ok(contents),
        other => Err(failure("encoding", format!("asset {} is not text: {}", path, other))),
    }
}
