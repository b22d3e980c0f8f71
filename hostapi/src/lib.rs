//! `onesdk-hostapi`: host effects exposed to the OneSDK core.
//!
//! This crate defines the host-side interface the sandbox calls when the
//! core issues an import. It provides:
//!
//! - `HostApi` trait: one method per `onesdk_host` import
//! - `StdHost`: reqwest, filesystem, system clock, OS randomness
//! - `MemHost`: in-memory `HostApi` for testing
//! - `HostConfig`: timeouts and limits for the host effects
//! - `HostError`: failures handed back to the core as `Err` responses

pub mod error;
pub mod types;
pub mod assets;
pub mod traits;
pub mod std_host;
pub mod mem_host;

// Re-export commonly used types at the crate root.
pub use error::HostError;
pub use types::HostConfig;
pub use traits::HostApi;
pub use std_host::StdHost;
pub use mem_host::{HostCall, MemHost};
