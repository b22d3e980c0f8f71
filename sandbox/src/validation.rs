//! WASM module validation: core ABI compatibility checks.
//!
//! Validates that a compiled module meets the OneSDK core ABI before any
//! instance is created from it. Checks:
//!
//! 1. `memory` export present
//! 2. Required function exports present with correct signatures
//! 3. Optional `onesdk_periodic` export, if present, has the right signature
//! 4. No WASI imports
//! 5. Every import is a known `onesdk_host` function with the exchange signature

use wasmtime::{ExternType, FuncType, Module, ValType};

use onesdk_primitives::types::{
    EXPORT_ALLOC, EXPORT_FREE, EXPORT_MEMORY, EXPORT_PERFORM, EXPORT_PERIODIC, EXPORT_SETUP,
    EXPORT_TEARDOWN, HOST_IMPORTS, HOST_MODULE,
};

use crate::error::SandboxError;

/// Expected export: (name, param_count_of_i32, result_count_of_i32).
/// All params and results are i32 in the core ABI.
const REQUIRED_EXPORTS: &[(&str, usize, usize)] = &[
    (EXPORT_ALLOC, 1, 1),
    (EXPORT_FREE, 2, 0),
    (EXPORT_SETUP, 1, 1),
    (EXPORT_TEARDOWN, 0, 0),
    (EXPORT_PERFORM, 4, 1),
];

const PERIODIC_SIGNATURE: (usize, usize) = (0, 0);

/// Every host import takes `(req_ptr, req_len, out_ptr_ptr, out_len_ptr)`.
const IMPORT_SIGNATURE: (usize, usize) = (4, 1);

/// Validate that a module meets the core ABI.
pub fn validate_module(module: &Module) -> Result<(), SandboxError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

fn invalid(message: String) -> SandboxError {
    SandboxError::Load(message)
}

/// Check a function type against an all-i32 signature.
fn check_signature(
    what: &str,
    ty: &FuncType,
    (param_count, result_count): (usize, usize),
) -> Result<(), SandboxError> {
    let params: Vec<ValType> = ty.params().collect();
    let results: Vec<ValType> = ty.results().collect();

    if params.len() != param_count || !params.iter().all(|t| matches!(t, ValType::I32)) {
        return Err(invalid(format!(
            "{} has wrong param signature: expected {} i32 params, got {} params",
            what,
            param_count,
            params.len()
        )));
    }
    if results.len() != result_count || !results.iter().all(|t| matches!(t, ValType::I32)) {
        return Err(invalid(format!(
            "{} has wrong result signature: expected {} i32 results, got {} results",
            what,
            result_count,
            results.len()
        )));
    }
    Ok(())
}

fn validate_exports(module: &Module) -> Result<(), SandboxError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == EXPORT_MEMORY && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(invalid(format!("module must export '{}'", EXPORT_MEMORY)));
    }

    for &(name, params, results) in REQUIRED_EXPORTS {
        let export = module
            .exports()
            .find(|e| e.name() == name)
            .ok_or_else(|| invalid(format!("missing required export: {}", name)))?;
        match export.ty() {
            ExternType::Func(ty) => check_signature(&format!("export '{}'", name), &ty, (params, results))?,
            _ => return Err(invalid(format!("export '{}' must be a function", name))),
        }
    }

    if let Some(export) = module.exports().find(|e| e.name() == EXPORT_PERIODIC) {
        match export.ty() {
            ExternType::Func(ty) => {
                check_signature(&format!("export '{}'", EXPORT_PERIODIC), &ty, PERIODIC_SIGNATURE)?
            }
            _ => return Err(invalid(format!("export '{}' must be a function", EXPORT_PERIODIC))),
        }
    }

    Ok(())
}

fn validate_imports(module: &Module) -> Result<(), SandboxError> {
    for import in module.imports() {
        let module_name = import.module();
        let name = import.name();

        if module_name.starts_with("wasi") {
            return Err(invalid(format!(
                "WASI import not allowed: {}::{}",
                module_name, name
            )));
        }

        if module_name != HOST_MODULE {
            return Err(invalid(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name, HOST_MODULE, name
            )));
        }

        if !HOST_IMPORTS.contains(&name) {
            return Err(invalid(format!("unknown host import: {}::{}", module_name, name)));
        }

        match import.ty() {
            ExternType::Func(ty) => {
                check_signature(&format!("import '{}'", name), &ty, IMPORT_SIGNATURE)?
            }
            _ => {
                return Err(invalid(format!(
                    "non-function import not allowed: {}::{}",
                    module_name, name
                )))
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::Engine;

    /// Required exports with trivial bodies; `extra` is spliced into the module.
    fn core_with(extra: &str) -> String {
        format!(
            r#"
            (module
                {extra}
                (memory (export "memory") 1)
                (func (export "onesdk_alloc") (param i32) (result i32) i32.const 8)
                (func (export "onesdk_free") (param i32 i32))
                (func (export "onesdk_setup") (param i32) (result i32) i32.const 0)
                (func (export "onesdk_teardown"))
                (func (export "onesdk_perform") (param i32 i32 i32 i32) (result i32)
                    i32.const 0)
            )
            "#
        )
    }

    fn validate_wat(wat: &str) -> Result<(), SandboxError> {
        let engine = Engine::default();
        let module = Module::new(&engine, wat).unwrap();
        validate_module(&module)
    }

    #[test]
    fn test_validate_minimal_valid_module() {
        validate_wat(&core_with("")).unwrap();
    }

    #[test]
    fn test_accept_host_imports_and_periodic() {
        let wat = core_with(
            r#"
            (import "onesdk_host" "http_call" (func (param i32 i32 i32 i32) (result i32)))
            (import "onesdk_host" "log" (func (param i32 i32 i32 i32) (result i32)))
            (func (export "onesdk_periodic"))
            "#,
        );
        validate_wat(&wat).unwrap();
    }

    #[test]
    fn test_reject_missing_export() {
        let wat = r#"
            (module
                (memory (export "memory") 1)
                (func (export "onesdk_setup") (param i32) (result i32) i32.const 0)
            )
        "#;
        let err = validate_wat(wat).unwrap_err();
        assert!(matches!(err, SandboxError::Load(ref m) if m.contains("onesdk_alloc")));
    }

    #[test]
    fn test_reject_missing_memory() {
        let wat = core_with("").replace(r#"(memory (export "memory") 1)"#, "(memory 1)");
        let err = validate_wat(&wat).unwrap_err();
        assert!(matches!(err, SandboxError::Load(ref m) if m.contains("memory")));
    }

    #[test]
    fn test_reject_wrong_export_signature() {
        let wat = core_with("").replace(
            r#"(func (export "onesdk_setup") (param i32) (result i32) i32.const 0)"#,
            r#"(func (export "onesdk_setup") (result i32) i32.const 0)"#,
        );
        assert!(matches!(validate_wat(&wat), Err(SandboxError::Load(_))));
    }

    #[test]
    fn test_reject_wrong_periodic_signature() {
        let wat = core_with(r#"(func (export "onesdk_periodic") (param i32))"#);
        assert!(matches!(validate_wat(&wat), Err(SandboxError::Load(_))));
    }

    #[test]
    fn test_reject_wasi_import() {
        let wat = core_with(
            r#"(import "wasi_snapshot_preview1" "fd_write"
                (func (param i32 i32 i32 i32) (result i32)))"#,
        );
        let err = validate_wat(&wat).unwrap_err();
        assert!(matches!(err, SandboxError::Load(ref m) if m.contains("WASI")));
    }

    #[test]
    fn test_reject_unknown_module_import() {
        let wat = core_with(r#"(import "env" "some_func" (func (result i32)))"#);
        assert!(matches!(validate_wat(&wat), Err(SandboxError::Load(_))));
    }

    #[test]
    fn test_reject_unknown_host_import() {
        let wat = core_with(
            r#"(import "onesdk_host" "spawn_process" (func (param i32 i32 i32 i32) (result i32)))"#,
        );
        let err = validate_wat(&wat).unwrap_err();
        assert!(matches!(err, SandboxError::Load(ref m) if m.contains("spawn_process")));
    }

    #[test]
    fn test_reject_wrong_import_signature() {
        let wat = core_with(r#"(import "onesdk_host" "clock_now" (func (result i64)))"#);
        assert!(matches!(validate_wat(&wat), Err(SandboxError::Load(_))));
    }
}
