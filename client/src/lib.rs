//! OneSDK client.
//!
//! Resolves profiles from an assets directory and performs their usecases
//! inside the sandboxed core. Usecase failures come back as
//! [`PerformError::Application`]; anything that goes wrong inside the core
//! itself is [`PerformError::Unexpected`], after which the core instance is
//! replaced according to the configured [`RecreatePolicy`].
//!
//! ```no_run
//! use onesdk::{ClientConfig, OneClient};
//! use serde_json::json;
//!
//! let client = OneClient::new(ClientConfig::new("superface", "https://superface.ai"));
//! let result = client
//!     .get_profile("wasm-sdk/example")?
//!     .get_usecase("Example")?
//!     .perform(json!({ "id": 1 }), "localhost", json!(null), json!(null));
//! # Ok::<(), onesdk::ClientError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod profile;

pub use client::{HostFactory, OneClient};
pub use config::{ClientConfig, CoreSource, RecreatePolicy};
pub use error::{ApplicationError, ClientError, PerformError, UnexpectedError};
pub use profile::{Profile, UseCase};

pub use onesdk_primitives::Value;
