//! A small scripted core for tests.
//!
//! [`core_wat`] renders a WebAssembly text module that implements the core
//! ABI without a compiled guest. It picks its behavior by searching the
//! encoded perform request for one of the `USECASE_*` markers, so the
//! usecase name selects what it does. Payloads it answers with are encoded
//! by the real codec and embedded as data segments.
//!
//! Besides the ABI exports it exports `live_allocations` (regions handed out
//! by `onesdk_alloc` and not yet freed) and `periodic_ticks`.

use serde_json::json;

use onesdk_primitives::codec::encode;
use onesdk_primitives::exchange::to_message;
use onesdk_primitives::{HttpRequest, MultiMap, Value, API_VERSION};

use crate::error::SandboxError;
use crate::instance::CoreModule;

/// Answers `{"Ok": true}`.
pub const USECASE_TRUE: &str = "CORE_PERFORM_TRUE";
/// Traps with `unreachable`.
pub const USECASE_PANIC: &str = "CORE_PERFORM_PANIC";
/// Spins until fuel runs out.
pub const USECASE_LOOP: &str = "CORE_PERFORM_LOOP";
/// Answers bytes that are not a valid encoding.
pub const USECASE_MALFORMED: &str = "CORE_PERFORM_MALFORMED";
/// Returns status `ERR_INTERNAL` without a result.
pub const USECASE_BAD_STATUS: &str = "CORE_PERFORM_BAD_STATUS";
/// Calls `http_call` with an out-of-bounds request pointer.
pub const USECASE_BAD_POINTER: &str = "CORE_PERFORM_BAD_POINTER";
/// Issues `GET HTTP_ECHO_URL` and answers with the import response as-is.
pub const USECASE_HTTP_ECHO: &str = "CORE_PERFORM_HTTP_ECHO";
/// Logs "first", reads the clock, logs "second", answers `{"Ok": true}`.
pub const USECASE_ORDERED: &str = "CORE_PERFORM_ORDERED";

/// `code` of the application error answered for any other usecase.
pub const UNKNOWN_USECASE_CODE: &str = "unknown_usecase";
pub const HTTP_ECHO_URL: &str = "http://localhost/api/1";

pub const EXPORT_LIVE_ALLOCATIONS: &str = "live_allocations";
pub const EXPORT_PERIODIC_TICKS: &str = "periodic_ticks";

/// First byte of the data segments; 8..16 hold scratch out-slots.
const DATA_BASE: usize = 256;
const MIN_HEAP_BASE: usize = 4096;

struct Segments {
    next: usize,
    rendered: String,
}

impl Segments {
    fn new() -> Self {
        Self {
            next: DATA_BASE,
            rendered: String::new(),
        }
    }

    /// Place `bytes` in a data segment; returns `(i32.const ptr) (i32.const len)`.
    fn add(&mut self, bytes: &[u8]) -> String {
        let ptr = self.next;
        let escaped: String = bytes.iter().map(|b| format!("\\{:02x}", b)).collect();
        self.rendered
            .push_str(&format!("  (data (i32.const {}) \"{}\")\n", ptr, escaped));
        self.next = (ptr + bytes.len() + 7) & !7;
        format!("(i32.const {}) (i32.const {})", ptr, bytes.len())
    }

    fn heap_base(&self) -> usize {
        self.next.max(MIN_HEAP_BASE)
    }
}

/// Encode a fixed payload. Every payload here is a few levels deep.
fn fixture(value: &Value) -> Vec<u8> {
    encode(value).unwrap_or_default()
}

/// Render the scripted core as WebAssembly text.
pub fn core_wat() -> String {
    let mut seg = Segments::new();

    let panic = seg.add(USECASE_PANIC.as_bytes());
    let spin = seg.add(USECASE_LOOP.as_bytes());
    let malformed = seg.add(USECASE_MALFORMED.as_bytes());
    let bad_status = seg.add(USECASE_BAD_STATUS.as_bytes());
    let bad_pointer = seg.add(USECASE_BAD_POINTER.as_bytes());
    let http_echo = seg.add(USECASE_HTTP_ECHO.as_bytes());
    let ordered = seg.add(USECASE_ORDERED.as_bytes());
    let truthy = seg.add(USECASE_TRUE.as_bytes());

    let ok_true = seg.add(&fixture(&json!({ "Ok": true })));
    let err_unknown = seg.add(&fixture(&json!({
        "Err": {
            "code": UNKNOWN_USECASE_CODE,
            "message": "usecase is not defined by this core"
        }
    })));
    let garbage = seg.add(&[0xff, 0x00, 0x13]);
    let http_request = seg.add(&fixture(&to_message(&HttpRequest {
        method: "GET".into(),
        url: HTTP_ECHO_URL.into(),
        headers: MultiMap::new(),
        query: MultiMap::new(),
        body: None,
    })));
    let log_first = seg.add(&fixture(&json!({ "level": "info", "message": "first" })));
    let log_second = seg.add(&fixture(&json!({ "level": "info", "message": "second" })));
    let null = seg.add(&fixture(&Value::Null));

    let heap_base = seg.heap_base();
    let data = seg.rendered;

    format!(
        r#"(module
  (import "onesdk_host" "http_call" (func $http_call (param i32 i32 i32 i32) (result i32)))
  (import "onesdk_host" "clock_now" (func $clock_now (param i32 i32 i32 i32) (result i32)))
  (import "onesdk_host" "log" (func $log (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const {heap_base}))
  (global $live (mut i32) (i32.const 0))
  (global $ticks (mut i32) (i32.const 0))
{data}
  (func $alloc (export "onesdk_alloc") (param $size i32) (result i32)
    (local $ptr i32) (local $end i32) (local $have i32)
    (local.set $ptr (global.get $heap))
    (local.set $end
      (i32.and (i32.add (i32.add (local.get $ptr) (local.get $size)) (i32.const 7)) (i32.const -8)))
    (local.set $have (i32.shl (memory.size) (i32.const 16)))
    (if (i32.gt_u (local.get $end) (local.get $have))
      (then
        (if (i32.eq
              (memory.grow
                (i32.add (i32.shr_u (i32.sub (local.get $end) (local.get $have)) (i32.const 16))
                         (i32.const 1)))
              (i32.const -1))
          (then (return (i32.const 0))))))
    (global.set $heap (local.get $end))
    (global.set $live (i32.add (global.get $live) (i32.const 1)))
    (local.get $ptr))

  (func $free (export "onesdk_free") (param i32 i32)
    (global.set $live (i32.sub (global.get $live) (i32.const 1))))

  (func (export "onesdk_setup") (param $version i32) (result i32)
    (if (result i32) (i32.eq (local.get $version) (i32.const {api_version}))
      (then (i32.const 0))
      (else (i32.const 3))))

  (func (export "onesdk_teardown"))

  (func (export "onesdk_periodic")
    (global.set $ticks (i32.add (global.get $ticks) (i32.const 1))))

  (func (export "{live_export}") (result i32) (global.get $live))
  (func (export "{ticks_export}") (result i32) (global.get $ticks))

  ;; 1 when bytes [$n, $n+$nl) occur within [$h, $h+$hl)
  (func $contains (param $h i32) (param $hl i32) (param $n i32) (param $nl i32) (result i32)
    (local $i i32) (local $j i32)
    (if (i32.gt_u (local.get $nl) (local.get $hl)) (then (return (i32.const 0))))
    (block $done
      (loop $outer
        (br_if $done (i32.gt_u (local.get $i) (i32.sub (local.get $hl) (local.get $nl))))
        (local.set $j (i32.const 0))
        (block $mismatch
          (loop $inner
            (if (i32.eq (local.get $j) (local.get $nl)) (then (return (i32.const 1))))
            (br_if $mismatch
              (i32.ne
                (i32.load8_u (i32.add (local.get $h) (i32.add (local.get $i) (local.get $j))))
                (i32.load8_u (i32.add (local.get $n) (local.get $j)))))
            (local.set $j (i32.add (local.get $j) (i32.const 1)))
            (br $inner)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $outer)))
    (i32.const 0))

  ;; Copy a payload into a fresh allocation and publish it as the result
  (func $respond (param $out_ptr i32) (param $out_len i32) (param $src i32) (param $n i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (call $alloc (local.get $n)))
    (if (i32.eqz (local.get $ptr)) (then (return (i32.const 4))))
    (memory.copy (local.get $ptr) (local.get $src) (local.get $n))
    (i32.store (local.get $out_ptr) (local.get $ptr))
    (i32.store (local.get $out_len) (local.get $n))
    (i32.const 0))

  ;; Free the import response left in the scratch slots
  (func $release_scratch
    (call $free (i32.load (i32.const 8)) (i32.load (i32.const 12))))

  (func (export "onesdk_perform")
    (param $req i32) (param $len i32) (param $out_ptr i32) (param $out_len i32) (result i32)
    (if (call $contains (local.get $req) (local.get $len) {panic})
      (then unreachable))
    (if (call $contains (local.get $req) (local.get $len) {spin})
      (then (loop $spin (br $spin))))
    (if (call $contains (local.get $req) (local.get $len) {malformed})
      (then (return (call $respond (local.get $out_ptr) (local.get $out_len) {garbage}))))
    (if (call $contains (local.get $req) (local.get $len) {bad_status})
      (then (return (i32.const 4))))
    (if (call $contains (local.get $req) (local.get $len) {bad_pointer})
      (then (drop (call $http_call (i32.const -16) (i32.const 16) (i32.const 8) (i32.const 12)))))
    (if (call $contains (local.get $req) (local.get $len) {http_echo})
      (then
        (drop (call $http_call {http_request} (local.get $out_ptr) (local.get $out_len)))
        (return (i32.const 0))))
    (if (call $contains (local.get $req) (local.get $len) {ordered})
      (then
        (drop (call $log {log_first} (i32.const 8) (i32.const 12)))
        (call $release_scratch)
        (drop (call $clock_now {null} (i32.const 8) (i32.const 12)))
        (call $release_scratch)
        (drop (call $log {log_second} (i32.const 8) (i32.const 12)))
        (call $release_scratch)
        (return (call $respond (local.get $out_ptr) (local.get $out_len) {ok_true}))))
    (if (call $contains (local.get $req) (local.get $len) {truthy})
      (then (return (call $respond (local.get $out_ptr) (local.get $out_len) {ok_true}))))
    (call $respond (local.get $out_ptr) (local.get $out_len) {err_unknown}))
)
"#,
        api_version = API_VERSION,
        live_export = EXPORT_LIVE_ALLOCATIONS,
        ticks_export = EXPORT_PERIODIC_TICKS,
    )
}

/// Compile the scripted core.
pub fn core_module() -> Result<CoreModule, SandboxError> {
    CoreModule::new(core_wat().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_compiles_and_validates() {
        core_module().unwrap();
    }

    #[test]
    fn test_data_stays_below_heap() {
        let wat = core_wat();
        assert!(wat.contains(&format!("(global $heap (mut i32) (i32.const {}))", MIN_HEAP_BASE)));
    }

    #[test]
    fn test_segments_are_aligned() {
        let mut seg = Segments::new();
        assert_eq!(seg.add(b"abc"), "(i32.const 256) (i32.const 3)");
        assert_eq!(seg.add(b"de"), "(i32.const 264) (i32.const 2)");
        assert!(seg.rendered.contains(r#"(data (i32.const 256) "\61\62\63")"#));
    }
}
