//! The client facade: owns the single core instance and serializes
//! every perform through it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use onesdk_hostapi::{HostApi, HostError, StdHost};
use onesdk_primitives::types::EXPORT_PERIODIC;
use onesdk_primitives::{ExecutionRequest, Value};
use onesdk_sandbox::{CoreModule, ExecutionOutcome, ExecutionSession, SandboxInstance};

use crate::config::{ClientConfig, CoreSource, RecreatePolicy};
use crate::error::{ApplicationError, ClientError, PerformError, UnexpectedError};
use crate::profile::Profile;

pub const PROFILE_EXTENSION: &str = "profile";

/// Builds the host a new core instance talks to.
pub type HostFactory =
    Arc<dyn Fn(&ClientConfig) -> Result<Box<dyn HostApi>, HostError> + Send + Sync>;

/// Entry point for performing usecases.
///
/// Cheap to share across threads: performs on one client are serialized
/// over a single core instance.
pub struct OneClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: ClientConfig,
    host_factory: HostFactory,
    slot: Mutex<CoreSlot>,
}

#[derive(Default)]
struct CoreSlot {
    module: Option<CoreModule>,
    instance: Option<SandboxInstance>,
    /// Set once `destroy` took a live instance away.
    retired: bool,
}

impl OneClient {
    /// Create a client. Neither the core nor the network is touched until
    /// the first perform.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_host_factory(config, Arc::new(std_host))
    }

    /// Create a client whose core instances talk to hosts built by `factory`.
    pub fn with_host_factory(config: ClientConfig, factory: HostFactory) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                host_factory: factory,
                slot: Mutex::new(CoreSlot::default()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Resolve a profile by `scope/name` or `name`.
    pub fn get_profile(&self, name: &str) -> Result<Profile, ClientError> {
        let not_found = || ClientError::NotFound {
            kind: "profile",
            name: name.to_string(),
        };
        let path = profile_path(&self.inner.config.assets_path, name).ok_or_else(not_found)?;
        if !path.is_file() {
            debug!(profile = name, path = %path.display(), "profile document missing");
            return Err(not_found());
        }
        Ok(Profile::new(Arc::clone(&self.inner), name.to_string()))
    }

    /// Tear down the core instance if there is one. Idempotent.
    pub fn destroy(&self) {
        let mut slot = self.inner.lock_slot_for_cleanup();
        if let Some(mut instance) = slot.instance.take() {
            instance.destroy();
            slot.retired = true;
            info!("core instance destroyed");
        }
    }

    /// Drop the current instance, healthy or not, and allow the next perform
    /// to create a fresh one under either recreation policy.
    pub fn reset(&self) {
        let mut slot = self.inner.lock_slot_for_cleanup();
        if let Some(mut instance) = slot.instance.take() {
            instance.destroy();
        }
        slot.retired = false;
        debug!("core instance reset");
    }

    /// Run the core's periodic export when an instance is live and has one.
    pub fn periodic(&self) -> Result<(), PerformError> {
        let mut slot = self.inner.lock_slot()?;
        let Some(instance) = slot.instance.as_mut() else {
            return Ok(());
        };
        if !instance.is_ready() || !instance.has_export(EXPORT_PERIODIC) {
            return Ok(());
        }
        instance.call(EXPORT_PERIODIC, &[]).map(|_| ()).map_err(|e| {
            error!("periodic call failed: {}", e);
            UnexpectedError::new(e.to_string()).into()
        })
    }
}

impl ClientInner {
    fn lock_slot(&self) -> Result<std::sync::MutexGuard<'_, CoreSlot>, UnexpectedError> {
        self.slot
            .lock()
            .map_err(|_| UnexpectedError::new("client lock poisoned by a panicking perform"))
    }

    fn lock_slot_for_cleanup(&self) -> std::sync::MutexGuard<'_, CoreSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one usecase through the core.
    pub(crate) fn perform(&self, request: ExecutionRequest) -> Result<Value, PerformError> {
        let request = request
            .with_registry_url(Some(self.config.registry_url.clone()))
            .with_registry_token(self.config.registry_token.clone());
        let mut slot = self.lock_slot()?;
        let instance = self.ensure_instance(&mut slot)?;

        match ExecutionSession::new(instance).run(&request) {
            ExecutionOutcome::Success(result) => Ok(result),
            ExecutionOutcome::ApplicationError(payload) => {
                debug!(usecase = %request.usecase, "usecase returned an error");
                Err(ApplicationError::new(payload).into())
            }
            ExecutionOutcome::UnexpectedFault(message) => {
                error!(usecase = %request.usecase, provider = %request.provider, "core fault: {}", message);
                Err(UnexpectedError::new(message).into())
            }
        }
    }

    /// Hand out the live instance, creating or replacing it per policy.
    fn ensure_instance<'s>(
        &self,
        slot: &'s mut CoreSlot,
    ) -> Result<&'s mut SandboxInstance, UnexpectedError> {
        let policy = self.config.recreate_policy;
        let unhealthy = slot.instance.as_ref().map(|i| !i.is_ready());

        match (unhealthy, policy) {
            (Some(true), RecreatePolicy::OnNextPerform) => {
                if let Some(mut old) = slot.instance.take() {
                    old.destroy();
                }
                info!("replacing faulted core instance");
            }
            (Some(true), RecreatePolicy::Manual) => {
                return Err(UnexpectedError::new(
                    "core instance faulted; call reset() before performing again",
                ));
            }
            (None, RecreatePolicy::Manual) if slot.retired => {
                return Err(UnexpectedError::new(
                    "core instance destroyed; call reset() before performing again",
                ));
            }
            _ => {}
        }

        if slot.instance.is_none() {
            let module = match &slot.module {
                Some(module) => module.clone(),
                None => {
                    let module = self.compile_core()?;
                    slot.module = Some(module.clone());
                    module
                }
            };
            let host = (self.host_factory)(&self.config)
                .map_err(|e| UnexpectedError::new(format!("host: {}", e)))?;
            let instance = SandboxInstance::load(&module, host, &self.config.sandbox)
                .map_err(|e| UnexpectedError::new(e.to_string()))?;
            slot.instance = Some(instance);
            slot.retired = false;
            debug!("core instance created");
        }

        slot.instance
            .as_mut()
            .ok_or_else(|| UnexpectedError::new("no core instance"))
    }

    fn compile_core(&self) -> Result<CoreModule, UnexpectedError> {
        let module = match &self.config.core {
            CoreSource::Path(path) => {
                info!(path = %path.display(), "compiling core");
                CoreModule::from_file(path)
            }
            CoreSource::Bytes(bytes) => {
                info!(len = bytes.len(), "compiling core");
                CoreModule::new(bytes)
            }
        };
        module.map_err(|e| {
            warn!("core unavailable: {}", e);
            UnexpectedError::new(e.to_string())
        })
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(mut instance) = slot.instance.take() {
            instance.destroy();
        }
    }
}

fn std_host(config: &ClientConfig) -> Result<Box<dyn HostApi>, HostError> {
    Ok(Box::new(StdHost::new(&config.assets_path, config.host.clone())?))
}

fn is_name_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Location of the profile document for `name`, or `None` for a name that
/// cannot be one.
pub(crate) fn profile_path(assets: &Path, name: &str) -> Option<PathBuf> {
    let file = match name.split_once('/') {
        Some((scope, base)) if is_name_segment(scope) && is_name_segment(base) => {
            format!("{}.{}.{}", scope, base, PROFILE_EXTENSION)
        }
        None if is_name_segment(name) => format!("{}.{}", name, PROFILE_EXTENSION),
        _ => return None,
    };
    Some(assets.join(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_path() {
        let assets = Path::new("assets");
        assert_eq!(
            profile_path(assets, "wasm-sdk/example"),
            Some(PathBuf::from("assets/wasm-sdk.example.profile"))
        );
        assert_eq!(
            profile_path(assets, "example"),
            Some(PathBuf::from("assets/example.profile"))
        );
    }

    #[test]
    fn test_profile_path_rejects_bad_names() {
        let assets = Path::new("assets");
        for name in ["", "/example", "scope/", "a/b/c", "../etc", "sco pe/x", "x.y"] {
            assert_eq!(profile_path(assets, name), None, "{:?}", name);
        }
    }
}
