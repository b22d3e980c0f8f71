//! Sandbox error types.

use onesdk_primitives::CodecError;

/// Top-level error type for the sandbox crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    /// Engine setup, compilation, ABI validation, instantiation or
    /// `onesdk_setup` failed.
    #[error("load error: {0}")]
    Load(String),

    /// The core could not provide the requested region.
    #[error("core is out of memory (requested {requested} bytes)")]
    OutOfMemory { requested: usize },

    /// A range outside the current linear memory.
    #[error("memory access out of bounds: {len} bytes at {ptr:#x}")]
    OutOfBounds { ptr: u32, len: u32 },

    /// The core trapped.
    #[error("core trapped in {export}: {message}")]
    Trapped { export: String, message: String },

    /// The core ran out of instruction fuel.
    #[error("core exhausted its fuel in {export}")]
    FuelExhausted { export: String },

    /// The instance trapped earlier and accepts no more calls.
    #[error("instance is poisoned by an earlier trap")]
    Poisoned,

    #[error("instance has been destroyed")]
    InstanceDestroyed,

    #[error("core does not export {0}")]
    MissingExport(String),

    /// Arguments that do not match the export's signature. Nothing ran.
    #[error("bad arguments for {export}: {message}")]
    BadArguments { export: String, message: String },

    /// `onesdk_perform` returned a non-zero status.
    #[error("core entry point returned status {0}")]
    EntryStatus(i32),

    /// A buffer produced by the core failed to decode.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(#[from] CodecError),
}

impl SandboxError {
    /// True for errors that mean the core itself faulted during a call.
    pub fn is_trap(&self) -> bool {
        matches!(self, Self::Trapped { .. } | Self::FuelExhausted { .. })
    }
}
