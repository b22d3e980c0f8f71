//! ABI constants for the OneSDK core module.

/// ABI version passed to `onesdk_setup`. Bumped on any incompatible change
/// to exports, imports or message shapes.
pub const API_VERSION: u32 = 1;

/// WebAssembly page size in bytes.
pub const WASM_PAGE_SIZE: usize = 65536;

/// Name of the exported linear memory.
pub const EXPORT_MEMORY: &str = "memory";
/// `(size) -> ptr`
pub const EXPORT_ALLOC: &str = "onesdk_alloc";
/// `(ptr, size)`
pub const EXPORT_FREE: &str = "onesdk_free";
/// `(api_version) -> status`
pub const EXPORT_SETUP: &str = "onesdk_setup";
/// `()`
pub const EXPORT_TEARDOWN: &str = "onesdk_teardown";
/// `(req_ptr, req_len, out_ptr_ptr, out_len_ptr) -> status`
pub const EXPORT_PERFORM: &str = "onesdk_perform";
/// Optional. `()`
pub const EXPORT_PERIODIC: &str = "onesdk_periodic";

/// Import module under which all host functions live.
pub const HOST_MODULE: &str = "onesdk_host";

pub const IMPORT_HTTP_CALL: &str = "http_call";
pub const IMPORT_CLOCK_NOW: &str = "clock_now";
pub const IMPORT_RANDOM_BYTES: &str = "random_bytes";
pub const IMPORT_LOG: &str = "log";
pub const IMPORT_ASSET_READ: &str = "asset_read";

/// Every host import. All share the signature
/// `(req_ptr, req_len, out_ptr_ptr, out_len_ptr) -> status`.
pub const HOST_IMPORTS: &[&str] = &[
    IMPORT_HTTP_CALL,
    IMPORT_CLOCK_NOW,
    IMPORT_RANDOM_BYTES,
    IMPORT_LOG,
    IMPORT_ASSET_READ,
];
