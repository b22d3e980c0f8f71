//! `onesdk-sandbox`: Wasmtime sandbox hosting the OneSDK core.
//!
//! This crate loads, validates, and drives the core module inside a
//! Wasmtime sandbox. It provides:
//!
//! - **ABI validation:** required exports and `onesdk_host` imports checked at load
//! - **Instance lifecycle:** ready, poisoned after a trap, destroyed
//! - **Bounds-checked memory:** every read and write re-checks the current size
//! - **Scoped allocation:** host regions in core memory are always released
//! - **Host imports:** synchronous, in-order dispatch to a `HostApi`
//! - **Resource limits:** bounded linear memory, optional fuel per call
//!
//! The primary entry points are [`SandboxInstance::load`] and
//! [`ExecutionSession::run`]. The `testing` feature adds a scripted core
//! for exercising the sandbox without a compiled guest.

pub mod error;
pub mod config;
pub mod memory;
pub mod host_impl;
pub mod validation;
pub mod linker;
pub mod instance;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::SandboxError;
pub use config::SandboxConfig;
pub use instance::{CoreModule, GuestAllocation, InstanceStatus, SandboxInstance};
pub use session::{ExecutionOutcome, ExecutionSession, INVALID_REQUEST_CODE};
