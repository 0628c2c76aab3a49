use crate::error::{AppError, ConfigError};
use crate::metrics::MetricsSettings;
use crate::performance::{FrameThrottle, GovernorSettings, ThrottleSettings};
use crate::stabilizer::{StabilizerConfig, ValiditySettings};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides, e.g. `LIFTSENSE__THROTTLE__TARGET_FPS=24`
pub const ENV_PREFIX: &str = "LIFTSENSE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub stabilizer: ValiditySettings,
    pub throttle: ThrottleSettings,
    pub governor: GovernorSettings,
    pub metrics: MetricsSettings,
}

impl Settings {
    /// Load settings from an optional file, then environment overrides.
    /// Missing keys fall back to their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment when given
    fn load_with_env(path: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(env);
        let settings: Settings = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        tracing::info!("Loaded settings for {}", settings.metrics.exercise);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        StabilizerConfig::try_from(self.stabilizer)?;
        FrameThrottle::new(self.throttle)?;
        self.governor.validate()?;
        self.metrics.validate()
    }
}
