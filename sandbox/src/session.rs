//! Execution session: one perform request in, one outcome out.
//!
//! The session writes the encoded request into core memory, calls
//! `onesdk_perform`, reads and releases the result buffer, and classifies
//! the result. Every host allocation it makes is released through
//! [`SandboxInstance::with_allocation`], on the trap path as well.

use serde_json::json;
use tracing::{debug, info_span, warn};

use onesdk_primitives::codec;
use onesdk_primitives::types::EXPORT_PERFORM;
use onesdk_primitives::{decode_result_envelope, ErrorCode, ExecutionRequest, Value};

use crate::error::SandboxError;
use crate::instance::SandboxInstance;

/// `code` of the application error for a request too deeply nested to encode.
pub const INVALID_REQUEST_CODE: &str = "invalid_request";

/// The classified result of one session.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The usecase succeeded with this result.
    Success(Value),
    /// The usecase deliberately failed with this structured payload.
    ApplicationError(Value),
    /// The core faulted or broke its output contract. The instance is
    /// poisoned; the string is a diagnostic only.
    UnexpectedFault(String),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Runs exactly one request on a borrowed instance.
pub struct ExecutionSession<'i> {
    instance: &'i mut SandboxInstance,
}

impl<'i> ExecutionSession<'i> {
    pub fn new(instance: &'i mut SandboxInstance) -> Self {
        Self { instance }
    }

    /// Run `request` to completion.
    ///
    /// A request the codec cannot carry is answered with an
    /// `ApplicationError` coded [`INVALID_REQUEST_CODE`] before the core sees
    /// it. Any error after that becomes `UnexpectedFault` and poisons the
    /// instance.
    pub fn run(self, request: &ExecutionRequest) -> ExecutionOutcome {
        let span = info_span!(
            "perform",
            profile = %request.profile,
            usecase = %request.usecase,
            provider = %request.provider
        );
        let _entered = span.enter();

        let request_bytes = match codec::encode(&request.to_value()) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!("request rejected before reaching the core: {}", err);
                return ExecutionOutcome::ApplicationError(json!({
                    "code": INVALID_REQUEST_CODE,
                    "message": err.to_string(),
                }));
            }
        };

        match execute(self.instance, &request_bytes) {
            Ok(Ok(result)) => {
                debug!("usecase succeeded");
                ExecutionOutcome::Success(result)
            }
            Ok(Err(payload)) => {
                debug!("usecase returned an application error");
                ExecutionOutcome::ApplicationError(payload)
            }
            Err(err) => {
                warn!("unexpected core fault: {}", err);
                self.instance.poison();
                ExecutionOutcome::UnexpectedFault(err.to_string())
            }
        }
    }
}

fn execute(
    instance: &mut SandboxInstance,
    request_bytes: &[u8],
) -> Result<Result<Value, Value>, SandboxError> {
    instance.host_state_mut()?.begin_session();

    let (result_ptr, result_len) = instance.with_allocation(request_bytes, |inst, req| {
        // Two out-slots: result pointer, then result length
        inst.with_allocation(&[0u8; 8], |inst, slots| {
            let status = inst.call_i32(
                EXPORT_PERFORM,
                &[
                    req.ptr() as i32,
                    req.len() as i32,
                    slots.ptr() as i32,
                    (slots.ptr() + 4) as i32,
                ],
            )?;
            if status != ErrorCode::Ok.as_i32() {
                return Err(SandboxError::EntryStatus(status));
            }
            Ok((inst.read_u32(slots.ptr())?, inst.read_u32(slots.ptr() + 4)?))
        })
    })?;

    // The result buffer belongs to the core; release it once copied out
    let result_bytes = instance.read(result_ptr, result_len)?;
    instance.free_core_buffer(result_ptr, result_len)?;

    let value = codec::decode(&result_bytes)?;
    Ok(decode_result_envelope(value)?)
}
