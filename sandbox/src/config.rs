//! Sandbox configuration.

/// Configuration for one sandbox instance.
///
/// Controls memory limits, instruction fuel, and core log forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Wasmtime fuel granted to every call into the core.
    /// `None` leaves calls unmetered.
    pub fuel_limit: Option<u64>,

    /// Whether `log` imports are forwarded to the host.
    pub enable_guest_logs: bool,
}

impl SandboxConfig {
    /// Linear memory ceiling in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_pages as usize * onesdk_primitives::types::WASM_PAGE_SIZE
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256, // 16 MiB
            fuel_limit: None,
            enable_guest_logs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.max_memory_pages, 256);
        assert_eq!(config.max_memory_bytes(), 16 * 1024 * 1024);
        assert_eq!(config.fuel_limit, None);
        assert!(config.enable_guest_logs);
    }
}
