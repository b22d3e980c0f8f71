//! `onesdk-primitives`: types shared by the OneSDK host bridge and core.
//!
//! This crate provides the structured value codec, the core ABI constants,
//! the perform request and result envelope, and the message shapes of the
//! host imports. It is compiled into both the host and the core module.

pub mod types;
pub mod error;
pub mod codec;
pub mod execution;
pub mod exchange;

// Re-export commonly used types at the crate root for convenience.
pub use serde_json::Value;
pub use types::API_VERSION;
pub use error::{CodecError, ErrorCode};
pub use execution::{
    ExecutionRequest, decode_result_envelope, encode_result_envelope,
};
pub use exchange::{
    AssetRequest, ClockReading, HostFailure, HttpRequest, HttpResponse, LogLevel, LogRequest,
    MultiMap, RandomRequest,
};
