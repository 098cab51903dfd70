//! # ratevakt Configuration
//!
//! Layered configuration for the rate monitor. Every section validates its
//! own ranges; [`RatevaktConfig::load`] refuses to hand out an invalid value.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod capture;
mod error;
mod monitor;
mod prevention;
mod telemetry;
mod validation;

pub use capture::CaptureConfig;
pub use error::ConfigError;
pub use monitor::MonitorConfig;
pub use prevention::{FirewallBackendKind, FirewallConfig, PreventionConfig};
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/ratevakt.yaml";
const ENV_PREFIX: &str = "RATEVAKT_";

#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct RatevaktConfig {
    #[validate(nested)]
    #[serde(default)]
    pub capture: CaptureConfig,

    #[validate(nested)]
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[validate(nested)]
    #[serde(default)]
    pub prevention: PreventionConfig,

    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl RatevaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/ratevakt.yaml`, if present
    /// 3. `config/<RATEVAKT_ENV>.yaml` (default `production`), if present
    /// 4. `RATEVAKT_*` environment variables, `__` separating sections
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(RatevaktConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("RATEVAKT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{env}.yaml");
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::finish(figment)
    }

    /// Defaults, then `path`, then environment. The file must exist.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment =
            Figment::from(Serialized::defaults(RatevaktConfig::default())).merge(Yaml::file(path));
        Self::finish(figment)
    }

    /// Re-validates after programmatic changes such as CLI overrides.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        Ok(())
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.check()?;
                Ok(config)
            })
    }
}
