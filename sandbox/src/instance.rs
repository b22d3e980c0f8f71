//! Core module loading and the sandbox instance lifecycle.
//!
//! `CoreModule` compiles and validates the core once. `SandboxInstance`
//! owns one instantiated copy of it, mediates every access to its linear
//! memory, and tracks its lifecycle:
//!
//! ```text
//! load ─► Ready ─► (call in progress) ─► Ready
//!           │                │
//!           │              trap ─► Poisoned ─► destroy ─► Destroyed
//!           └──────────────────────────────────► destroy ─► Destroyed
//! ```
//!
//! A call in progress holds `&mut SandboxInstance`, so no second call can
//! be issued on the same instance until it returns.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};
use wasmtime::{Config, Engine, Instance, Linker, Memory, Module, Store, Trap, Val, ValType};

use onesdk_hostapi::HostApi;
use onesdk_primitives::types::{
    API_VERSION, EXPORT_ALLOC, EXPORT_FREE, EXPORT_MEMORY, EXPORT_SETUP, EXPORT_TEARDOWN,
};
use onesdk_primitives::ErrorCode;

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::host_impl::HostState;
use crate::linker::register_host_functions;
use crate::memory;
use crate::validation::validate_module;

/// A compiled, validated core module.
///
/// Compilation is the expensive step; keep one `CoreModule` and load as
/// many instances from it as needed.
#[derive(Clone)]
pub struct CoreModule {
    engine: Engine,
    module: Module,
}

impl CoreModule {
    /// Compile a core from WASM bytecode (or WAT text).
    ///
    /// Validates the module's exports and imports before accepting.
    pub fn new(bytes: &[u8]) -> Result<Self, SandboxError> {
        let engine = create_engine()?;
        let module =
            Module::new(&engine, bytes).map_err(|e| SandboxError::Load(format!("compile: {e:#}")))?;
        validate_module(&module)?;
        Ok(Self { engine, module })
    }

    /// Load from a `.wasm` file path.
    pub fn from_file(path: &Path) -> Result<Self, SandboxError> {
        let engine = create_engine()?;
        let module = Module::from_file(&engine, path)
            .map_err(|e| SandboxError::Load(format!("{}: {e:#}", path.display())))?;
        validate_module(&module)?;
        Ok(Self { engine, module })
    }

    /// Whether the core exports `name`.
    pub fn exports(&self, name: &str) -> bool {
        self.module.exports().any(|e| e.name() == name)
    }
}

impl std::fmt::Debug for CoreModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreModule")
            .field("name", &self.module.name())
            .finish_non_exhaustive()
    }
}

/// Create the Wasmtime engine shared by every instance of a core.
fn create_engine() -> Result<Engine, SandboxError> {
    let mut wasm_config = Config::new();

    // Fuel is always metered; unlimited instances get `u64::MAX` per call
    wasm_config.consume_fuel(true);

    // Single-threaded, single-memory cores only
    wasm_config.wasm_threads(false);
    wasm_config.wasm_multi_memory(false);

    Engine::new(&wasm_config).map_err(|e| SandboxError::Load(format!("engine: {e:#}")))
}

/// Observable lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Ready,
    Poisoned,
    Destroyed,
}

/// A region of core memory allocated by the host.
///
/// Move-only: the only way to release it is to hand it back to
/// [`SandboxInstance::free`], which consumes it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a guest allocation must be released with SandboxInstance::free"]
pub struct GuestAllocation {
    ptr: u32,
    len: u32,
}

impl GuestAllocation {
    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

struct Live {
    store: Store<HostState>,
    instance: Instance,
    memory: Memory,
}

enum State {
    Ready(Live),
    Poisoned(Live),
    Destroyed,
}

/// One instantiated copy of the core.
pub struct SandboxInstance {
    state: State,
    fuel_limit: Option<u64>,
    /// Host allocations not yet freed: pointer to requested size.
    ledger: BTreeMap<u32, u32>,
}

impl SandboxInstance {
    /// Instantiate `module`, wire the host imports to `host` and run
    /// `onesdk_setup`.
    pub fn load(
        module: &CoreModule,
        host: Box<dyn HostApi>,
        config: &SandboxConfig,
    ) -> Result<Self, SandboxError> {
        let mut store = Store::new(&module.engine, HostState::new(host, config));
        store.limiter(|state| &mut state.limits);

        let mut linker = Linker::new(&module.engine);
        register_host_functions(&mut linker)?;

        let fuel = config.fuel_limit.unwrap_or(u64::MAX);
        store
            .set_fuel(fuel)
            .map_err(|e| SandboxError::Load(format!("fuel: {e:#}")))?;

        let instance = linker
            .instantiate(&mut store, &module.module)
            .map_err(|e| SandboxError::Load(format!("instantiate: {e:#}")))?;
        let memory = instance
            .get_memory(&mut store, EXPORT_MEMORY)
            .ok_or_else(|| SandboxError::Load(format!("no {} export", EXPORT_MEMORY)))?;

        let mut sandbox = Self {
            state: State::Ready(Live {
                store,
                instance,
                memory,
            }),
            fuel_limit: config.fuel_limit,
            ledger: BTreeMap::new(),
        };

        let status = match sandbox.call_i32(EXPORT_SETUP, &[API_VERSION as i32]) {
            Ok(status) => status,
            Err(e) => {
                sandbox.destroy();
                return Err(SandboxError::Load(format!("{}: {}", EXPORT_SETUP, e)));
            }
        };
        if status != ErrorCode::Ok.as_i32() {
            sandbox.destroy();
            let name = ErrorCode::from_i32(status)
                .map(|c| c.to_string())
                .unwrap_or_else(|| status.to_string());
            return Err(SandboxError::Load(format!(
                "{} returned {} for api version {}",
                EXPORT_SETUP, name, API_VERSION
            )));
        }

        debug!(api_version = API_VERSION, "core instance ready");
        Ok(sandbox)
    }

    pub fn status(&self) -> InstanceStatus {
        match self.state {
            State::Ready(_) => InstanceStatus::Ready,
            State::Poisoned(_) => InstanceStatus::Poisoned,
            State::Destroyed => InstanceStatus::Destroyed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == InstanceStatus::Ready
    }

    /// Number of host allocations not yet released.
    pub fn outstanding_allocations(&self) -> usize {
        self.ledger.len()
    }

    /// Whether the instantiated core exports `name`.
    pub fn has_export(&mut self, name: &str) -> bool {
        match &mut self.state {
            State::Ready(live) | State::Poisoned(live) => {
                live.instance.get_export(&mut live.store, name).is_some()
            }
            State::Destroyed => false,
        }
    }

    fn live(&self) -> Result<&Live, SandboxError> {
        match &self.state {
            State::Ready(live) => Ok(live),
            State::Poisoned(_) => Err(SandboxError::Poisoned),
            State::Destroyed => Err(SandboxError::InstanceDestroyed),
        }
    }

    fn live_mut(&mut self) -> Result<&mut Live, SandboxError> {
        match &mut self.state {
            State::Ready(live) => Ok(live),
            State::Poisoned(_) => Err(SandboxError::Poisoned),
            State::Destroyed => Err(SandboxError::InstanceDestroyed),
        }
    }

    /// Mark a ready instance as poisoned. No effect in any other state.
    pub fn poison(&mut self) {
        if let State::Ready(_) = self.state {
            if let State::Ready(live) = std::mem::replace(&mut self.state, State::Destroyed) {
                warn!("core instance poisoned");
                self.state = State::Poisoned(live);
            }
        }
    }

    /// Invoke an exported function.
    ///
    /// A trap poisons the instance; every later call fails with
    /// [`SandboxError::Poisoned`].
    pub fn call(&mut self, export: &str, args: &[Val]) -> Result<Vec<Val>, SandboxError> {
        let fuel = self.fuel_limit.unwrap_or(u64::MAX);
        let live = self.live_mut()?;

        let func = live
            .instance
            .get_func(&mut live.store, export)
            .ok_or_else(|| SandboxError::MissingExport(export.to_string()))?;
        let ty = func.ty(&live.store);
        check_arguments(export, &ty.params().collect::<Vec<_>>(), args)?;
        let mut results: Vec<Val> = ty.results().map(default_val).collect();

        live.store
            .set_fuel(fuel)
            .map_err(|e| SandboxError::Load(format!("fuel: {e:#}")))?;

        match func.call(&mut live.store, args, &mut results) {
            Ok(()) => Ok(results),
            Err(err) => {
                let error = classify_trap(export, err);
                warn!(export, "core call failed: {}", error);
                self.poison();
                Err(error)
            }
        }
    }

    /// Call an export taking i32 arguments and returning one i32.
    pub fn call_i32(&mut self, export: &str, args: &[i32]) -> Result<i32, SandboxError> {
        let args: Vec<Val> = args.iter().map(|&a| Val::I32(a)).collect();
        let results = self.call(export, &args)?;
        match results.as_slice() {
            [Val::I32(v)] => Ok(*v),
            _ => Err(SandboxError::BadArguments {
                export: export.to_string(),
                message: "expected a single i32 result".into(),
            }),
        }
    }

    /// Acquire `size` bytes inside the core's memory.
    pub fn allocate(&mut self, size: u32) -> Result<GuestAllocation, SandboxError> {
        // Zero-sized requests still get a distinct region
        let request = size.max(1);
        let requested = i32::try_from(request).map_err(|_| SandboxError::OutOfMemory {
            requested: size as usize,
        })?;
        let ptr = self.call_i32(EXPORT_ALLOC, &[requested])?;
        if ptr <= 0 {
            return Err(SandboxError::OutOfMemory {
                requested: size as usize,
            });
        }
        let ptr = ptr as u32;

        let live = self.live()?;
        memory::checked_range(live.memory.data_size(&live.store), ptr, request)?;

        self.ledger.insert(ptr, request);
        Ok(GuestAllocation { ptr, len: size })
    }

    /// Release an allocation.
    ///
    /// On a poisoned instance the core is not re-entered: the ledger entry
    /// is settled and the region is reclaimed when the instance is destroyed.
    pub fn free(&mut self, allocation: GuestAllocation) -> Result<(), SandboxError> {
        let size = match self.ledger.remove(&allocation.ptr) {
            Some(size) => size,
            None => {
                return match self.state {
                    State::Destroyed => Err(SandboxError::InstanceDestroyed),
                    _ => Err(SandboxError::OutOfBounds {
                        ptr: allocation.ptr,
                        len: allocation.len,
                    }),
                }
            }
        };
        match self.state {
            State::Ready(_) => {
                self.call(EXPORT_FREE, &[Val::I32(allocation.ptr as i32), Val::I32(size as i32)])?;
                Ok(())
            }
            State::Poisoned(_) => Ok(()),
            State::Destroyed => Err(SandboxError::InstanceDestroyed),
        }
    }

    /// Release a buffer the core allocated and handed to the host.
    pub fn free_core_buffer(&mut self, ptr: u32, len: u32) -> Result<(), SandboxError> {
        self.call(EXPORT_FREE, &[Val::I32(ptr as i32), Val::I32(len as i32)])?;
        Ok(())
    }

    /// Copy `data` into core memory at `ptr`.
    pub fn write(&mut self, ptr: u32, data: &[u8]) -> Result<(), SandboxError> {
        let live = self.live_mut()?;
        memory::write_bytes(live.memory.data_mut(&mut live.store), ptr, data)
    }

    /// Copy `len` bytes out of core memory at `ptr`.
    pub fn read(&self, ptr: u32, len: u32) -> Result<Vec<u8>, SandboxError> {
        let live = self.live()?;
        memory::read_bytes(live.memory.data(&live.store), ptr, len)
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32, SandboxError> {
        let live = self.live()?;
        memory::read_u32(live.memory.data(&live.store), ptr)
    }

    /// Allocate a region, fill it with `data`, run `f`, and release the
    /// region on every path.
    ///
    /// An error from `f` takes precedence over an error while releasing.
    pub fn with_allocation<R>(
        &mut self,
        data: &[u8],
        f: impl FnOnce(&mut Self, &GuestAllocation) -> Result<R, SandboxError>,
    ) -> Result<R, SandboxError> {
        let len = u32::try_from(data.len()).map_err(|_| SandboxError::OutOfMemory {
            requested: data.len(),
        })?;
        let allocation = self.allocate(len)?;

        let result = match self.write(allocation.ptr, data) {
            Ok(()) => f(self, &allocation),
            Err(e) => Err(e),
        };
        let released = self.free(allocation);

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                debug!("release after failure also failed: {}", release_err);
                Err(e)
            }
        }
    }

    /// Give mutable access to the host state of a live instance.
    pub(crate) fn host_state_mut(&mut self) -> Result<&mut HostState, SandboxError> {
        Ok(self.live_mut()?.store.data_mut())
    }

    /// Tear the instance down. Idempotent.
    ///
    /// `onesdk_teardown` runs only on a healthy instance; a trap there is
    /// logged and otherwise ignored.
    pub fn destroy(&mut self) {
        match std::mem::replace(&mut self.state, State::Destroyed) {
            State::Ready(live) => {
                self.state = State::Ready(live);
                if let Err(e) = self.call(EXPORT_TEARDOWN, &[]) {
                    warn!("core teardown failed: {}", e);
                }
                self.state = State::Destroyed;
                debug!("core instance destroyed");
            }
            State::Poisoned(_) => debug!("poisoned core instance destroyed"),
            State::Destroyed => {}
        }
        if !self.ledger.is_empty() {
            debug!(
                outstanding = self.ledger.len(),
                "reclaiming host allocations with the instance"
            );
            self.ledger.clear();
        }
    }
}

/// Zero value used to size the results buffer.
fn default_val(ty: ValType) -> Val {
    match ty {
        ValType::I64 => Val::I64(0),
        ValType::F32 => Val::F32(0),
        ValType::F64 => Val::F64(0),
        _ => Val::I32(0),
    }
}

fn check_arguments(export: &str, params: &[ValType], args: &[Val]) -> Result<(), SandboxError> {
    let bad = |message: String| SandboxError::BadArguments {
        export: export.to_string(),
        message,
    };
    if params.len() != args.len() {
        return Err(bad(format!("expected {} arguments, got {}", params.len(), args.len())));
    }
    for (i, (param, arg)) in params.iter().zip(args).enumerate() {
        let matches = matches!(
            (param, arg),
            (ValType::I32, Val::I32(_))
                | (ValType::I64, Val::I64(_))
                | (ValType::F32, Val::F32(_))
                | (ValType::F64, Val::F64(_))
        );
        if !matches {
            return Err(bad(format!("argument {} does not match {}", i, param)));
        }
    }
    Ok(())
}

/// Convert a failed call into a sandbox error.
///
/// Fuel exhaustion → `SandboxError::FuelExhausted`
/// Other traps and host-import contract violations → `SandboxError::Trapped`
fn classify_trap(export: &str, err: anyhow::Error) -> SandboxError {
    match err.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => SandboxError::FuelExhausted {
            export: export.to_string(),
        },
        _ => SandboxError::Trapped {
            export: export.to_string(),
            message: format!("{err:#}"),
        },
    }
}
