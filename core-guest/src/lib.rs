//! `onesdk-core-guest`: a reference core for the OneSDK sandbox.
//!
//! Compiles to a `.wasm` artifact exporting the core ABI (`onesdk_alloc`,
//! `onesdk_free`, `onesdk_setup`, `onesdk_teardown`, `onesdk_perform`,
//! `onesdk_periodic`). Everything that touches the outside world goes
//! through the `onesdk_host` imports.
//!
//! Usecases:
//!
//! - `Example`: reads `<provider>.provider.json`, calls
//!   `GET {baseUrl}/api/{input.id}` with basic auth from `security`
//!   and returns the URL, status and body.
//! - `CORE_PERFORM_TRUE`: returns `true`.
//! - `CORE_PERFORM_PANIC`: panics, which traps the instance.
//!
//! Anything else is an application error.
//!
//! Built for a native target the imports are answered by a per-thread stub,
//! which is how the usecases are unit tested.

mod exports;
mod imports;
mod usecases;

pub use exports::{
    onesdk_alloc, onesdk_free, onesdk_perform, onesdk_periodic, onesdk_setup, onesdk_teardown,
};
