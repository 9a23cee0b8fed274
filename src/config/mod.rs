//! Layered configuration for the control plane.
//!
//! Sources, lowest priority first:
//! 1. Hardcoded defaults
//! 2. File named by `CONFIG_PATH` (or passed to [`Settings::with_override_config`])
//! 3. Environment variables prefixed `SHARD__`, with `__` as the section separator
//!
//! Loading never validates; call [`Settings::validate`] once all sources are
//! merged.

mod bootstrap;
mod discovery;
mod monitoring;
mod server;
pub use bootstrap::*;
pub use discovery::*;
pub use monitoring::*;
pub use server::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "SHARD";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Listener and HTTP/2 transport parameters
    #[serde(default)]
    pub server: ServerConfig,
    /// Discovery stream behaviour
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Metrics endpoint
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Configuration published once at startup
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl Settings {
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Layers the file at `path` over `self`; environment variables still win.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn validate(self) -> Result<Self> {
        self.server.validate()?;
        self.discovery.validate()?;
        self.monitoring.validate()?;
        self.bootstrap.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
