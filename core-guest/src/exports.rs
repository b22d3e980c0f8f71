//! Core ABI exports.
//!
//! Buffers handed across the boundary are raw `u8` allocations with
//! alignment 1, so `onesdk_free(ptr, size)` can rebuild the exact layout.

use std::alloc::{alloc, dealloc, Layout};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use onesdk_primitives::types::API_VERSION;
use serde_json::json;
use onesdk_primitives::{codec, encode_result_envelope, ErrorCode, ExecutionRequest, LogLevel};

use crate::imports;
use crate::usecases;

static READY: AtomicBool = AtomicBool::new(false);
static PERIODIC_TICKS: AtomicU32 = AtomicU32::new(0);

/// Allocate `size` bytes. Returns 0 when `size` is not positive or the
/// allocator fails.
#[no_mangle]
pub extern "C" fn onesdk_alloc(size: i32) -> i32 {
    if size <= 0 {
        return 0;
    }
    match Layout::from_size_align(size as usize, 1) {
        Ok(layout) => unsafe { alloc(layout) as i32 },
        Err(_) => 0,
    }
}

/// Release a region from `onesdk_alloc`. `size` must be the requested size.
#[no_mangle]
pub extern "C" fn onesdk_free(ptr: i32, size: i32) {
    if ptr <= 0 || size <= 0 {
        return;
    }
    release(ptr as u32, size as u32);
}

pub(crate) fn release(ptr: u32, size: u32) {
    if ptr == 0 || size == 0 {
        return;
    }
    if let Ok(layout) = Layout::from_size_align(size as usize, 1) {
        unsafe { dealloc(ptr as *mut u8, layout) }
    }
}

/// Copy `data` into a fresh `onesdk_alloc` region the host will free.
fn hand_over(data: &[u8]) -> Option<(u32, u32)> {
    let ptr = onesdk_alloc(data.len() as i32);
    if ptr == 0 {
        return None;
    }
    unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len()) };
    Some((ptr as u32, data.len() as u32))
}

#[no_mangle]
pub extern "C" fn onesdk_setup(api_version: i32) -> i32 {
    if api_version as u32 != API_VERSION {
        return ErrorCode::VersionMismatch.as_i32();
    }
    READY.store(true, Ordering::SeqCst);
    ErrorCode::Ok.as_i32()
}

#[no_mangle]
pub extern "C" fn onesdk_teardown() {
    READY.store(false, Ordering::SeqCst);
}

#[no_mangle]
pub extern "C" fn onesdk_periodic() {
    let ticks = PERIODIC_TICKS.fetch_add(1, Ordering::SeqCst) + 1;
    imports::write_log(LogLevel::Trace, format!("periodic tick {}", ticks));
}

/// Run one execution request and hand back the encoded result envelope.
#[no_mangle]
pub extern "C" fn onesdk_perform(
    req_ptr: i32,
    req_len: i32,
    out_ptr_ptr: i32,
    out_len_ptr: i32,
) -> i32 {
    if !READY.load(Ordering::SeqCst) {
        return ErrorCode::Internal.as_i32();
    }
    if req_ptr <= 0 || req_len <= 0 || out_ptr_ptr <= 0 || out_len_ptr <= 0 {
        return ErrorCode::BadPointer.as_i32();
    }

    let request_bytes = unsafe { std::slice::from_raw_parts(req_ptr as *const u8, req_len as usize) };
    let request = match codec::decode(request_bytes).and_then(ExecutionRequest::from_value) {
        Ok(request) => request,
        Err(_) => return ErrorCode::InvalidEncoding.as_i32(),
    };

    let envelope = encode_result_envelope(usecases::perform(&request));
    let encoded = match codec::encode(&envelope) {
        Ok(encoded) => encoded,
        Err(err) => {
            let fallback = encode_result_envelope(Err(json!({
                "code": "unencodable_result",
                "message": err.to_string(),
            })));
            match codec::encode(&fallback) {
                Ok(encoded) => encoded,
                Err(_) => return ErrorCode::Internal.as_i32(),
            }
        }
    };
    let Some((ptr, len)) = hand_over(&encoded) else {
        return ErrorCode::Internal.as_i32();
    };
    unsafe {
        std::ptr::write(out_ptr_ptr as *mut u32, ptr);
        std::ptr::write(out_len_ptr as *mut u32, len);
    }
    ErrorCode::Ok.as_i32()
}
