//! Host function registration via Wasmtime linker.
//!
//! Registers every `onesdk_host` import with the Wasmtime `Linker`. All
//! imports share one exchange shape; each call:
//! 1. Reads and decodes the request from guest memory
//! 2. Validates the out-slot pointers
//! 3. Dispatches to `HostState::dispatch` by import name
//! 4. Allocates the response buffer through the core's `onesdk_alloc`
//! 5. Writes the encoded response and its pointer/length, returns 0
//!
//! When the core has no room for the response it gets a small
//! `response_too_large` `Err` response instead. Any contract violation
//! returns an error from the closure, which traps the core.

use anyhow::{anyhow, Context};
use tracing::warn;
use wasmtime::{Caller, Linker, Memory};

use onesdk_hostapi::HostError;
use onesdk_primitives::codec;
use onesdk_primitives::exchange::to_message;
use onesdk_primitives::types::{EXPORT_ALLOC, EXPORT_MEMORY, HOST_IMPORTS, HOST_MODULE};
use onesdk_primitives::{encode_result_envelope, CodecError, ErrorCode};

use crate::error::SandboxError;
use crate::host_impl::HostState;
use crate::memory;

/// Get the guest's exported memory from a Caller.
fn get_memory(caller: &mut Caller<'_, HostState>) -> anyhow::Result<Memory> {
    caller
        .get_export(EXPORT_MEMORY)
        .and_then(|e| e.into_memory())
        .ok_or_else(|| anyhow!("core does not export {}", EXPORT_MEMORY))
}

/// Allocate `size` bytes through the core's own allocator.
///
/// This is a nested call back into the core while it is blocked in an import.
fn guest_alloc(caller: &mut Caller<'_, HostState>, size: usize) -> anyhow::Result<u32> {
    let alloc = caller
        .get_export(EXPORT_ALLOC)
        .and_then(|e| e.into_func())
        .ok_or_else(|| anyhow!("core does not export {}", EXPORT_ALLOC))?
        .typed::<i32, i32>(&*caller)?;
    let requested = i32::try_from(size).map_err(|_| SandboxError::OutOfMemory { requested: size })?;
    let ptr = alloc.call(&mut *caller, requested)?;
    if ptr <= 0 {
        return Err(SandboxError::OutOfMemory { requested: size }.into());
    }
    Ok(ptr as u32)
}

fn is_out_of_memory(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<SandboxError>(),
        Some(SandboxError::OutOfMemory { .. })
    )
}

/// `Err` envelope standing in for a response the core could not allocate.
fn too_large_response(len: usize) -> Result<Vec<u8>, CodecError> {
    let failure = HostError::ResponseTooLarge(len as u64).to_failure();
    codec::encode(&encode_result_envelope(Err(to_message(&failure))))
}

fn write_response(
    data: &mut [u8],
    ptr: u32,
    encoded: &[u8],
    out_ptr_ptr: u32,
    out_len_ptr: u32,
) -> Result<(), SandboxError> {
    memory::write_bytes(data, ptr, encoded)?;
    memory::write_u32(data, out_ptr_ptr, ptr)?;
    memory::write_u32(data, out_len_ptr, encoded.len() as u32)
}

/// Register all `onesdk_host` functions with the linker.
pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    for &import in HOST_IMPORTS {
        register_exchange(linker, import)?;
    }
    Ok(())
}

fn register_exchange(linker: &mut Linker<HostState>, import: &'static str) -> Result<(), SandboxError> {
    linker
        .func_wrap(
            HOST_MODULE,
            import,
            move |mut caller: Caller<'_, HostState>,
                  req_ptr: i32,
                  req_len: i32,
                  out_ptr_ptr: i32,
                  out_len_ptr: i32|
                  -> anyhow::Result<i32> {
                let (req_ptr, req_len) = (req_ptr as u32, req_len as u32);
                let (out_ptr_ptr, out_len_ptr) = (out_ptr_ptr as u32, out_len_ptr as u32);
                let mem = get_memory(&mut caller)?;

                let request_bytes = memory::read_bytes(mem.data(&caller), req_ptr, req_len)
                    .with_context(|| format!("{}: request", import))?;

                // Validate output pointer locations before doing any work
                {
                    let size = mem.data_size(&caller);
                    memory::checked_range(size, out_ptr_ptr, 4)
                        .and_then(|_| memory::checked_range(size, out_len_ptr, 4))
                        .with_context(|| format!("{}: out slots", import))?;
                }

                let request = codec::decode(&request_bytes)
                    .with_context(|| format!("{}: request encoding", import))?;

                let seq = caller.data_mut().begin_call(import);
                let response = caller
                    .data_mut()
                    .dispatch(import, request)
                    .with_context(|| format!("{}: request shape", import))?;
                let mut encoded = codec::encode(&response)
                    .with_context(|| format!("{}: response encoding", import))?;

                let ptr = match guest_alloc(&mut caller, encoded.len()) {
                    Ok(ptr) => ptr,
                    Err(err) if is_out_of_memory(&err) => {
                        // The core cannot hold the payload; answer with a small Err instead
                        warn!(import, len = encoded.len(), "response does not fit in core memory");
                        encoded = too_large_response(encoded.len())
                            .with_context(|| format!("{}: response encoding", import))?;
                        guest_alloc(&mut caller, encoded.len())?
                    }
                    Err(err) => return Err(err),
                };

                // The allocation may have grown memory; take a fresh view
                write_response(mem.data_mut(&mut caller), ptr, &encoded, out_ptr_ptr, out_len_ptr)
                    .with_context(|| format!("{}: response", import))?;

                caller.data_mut().finish_call(seq);
                Ok(ErrorCode::Ok.as_i32())
            },
        )
        .map_err(|e| SandboxError::Load(format!("registering {}: {}", import, e)))?;
    Ok(())
}
