//! # Binding Configuration
//!
//! Settings that control when deferred native releases are drained and how
//! the binding layer logs.
//!
//! ## Configuration Categories
//!
//! - **Release Config**: drain cadence, backlog warnings, shutdown behavior
//! - **Logging Config**: default log filter and whether to install a logger
//!
//! Both sections have defaults, so a config file only needs the values it
//! overrides:
//!
//! ```toml
//! [release]
//! drain_interval_frames = 2
//!
//! [logging]
//! level = "debug"
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Upper bound on the drain cadence; past this a deferred texture can
/// outlive several seconds of frames.
pub const MAX_DRAIN_INTERVAL_FRAMES: u32 = 600;

/// # Release Configuration
///
/// Controls how often the process-wide pending-release queue is drained by
/// [`NativeRuntime::end_frame`](crate::NativeRuntime::end_frame).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Drain every N frames (1 = every frame)
    pub drain_interval_frames: u32,
    /// Warn when this many releases are waiting at drain time (0 disables)
    pub pending_warn_threshold: usize,
    /// Drain whatever is left when the runtime shuts down
    pub drain_on_shutdown: bool,
}

impl ReleaseConfig {
    /// Create a release configuration with defaults
    pub fn new() -> Self {
        Self {
            drain_interval_frames: 1,
            pending_warn_threshold: 256,
            drain_on_shutdown: true,
        }
    }

    /// Set the drain cadence in frames
    pub fn with_drain_interval(mut self, frames: u32) -> Self {
        self.drain_interval_frames = frames;
        self
    }

    /// Set the backlog warning threshold
    pub fn with_warn_threshold(mut self, pending: usize) -> Self {
        self.pending_warn_threshold = pending;
        self
    }

    /// Enable or disable the final drain on shutdown
    pub fn with_drain_on_shutdown(mut self, enabled: bool) -> Self {
        self.drain_on_shutdown = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.drain_interval_frames == 0 {
            return Err("Drain interval must be at least 1 frame".to_string());
        }

        if self.drain_interval_frames > MAX_DRAIN_INTERVAL_FRAMES {
            return Err(format!(
                "Drain interval should not exceed {} frames",
                MAX_DRAIN_INTERVAL_FRAMES
            ));
        }

        Ok(())
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Logging Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (`error` .. `trace`, or `off`)
    pub level: String,
    /// Install `env_logger` when the runtime starts
    pub init_logger: bool,
}

impl LoggingConfig {
    /// Create a logging configuration with defaults
    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
            init_logger: true,
        }
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enable or disable logger installation
    pub fn with_init_logger(mut self, enabled: bool) -> Self {
        self.init_logger = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        log::LevelFilter::from_str(&self.level)
            .map(|_| ())
            .map_err(|_| format!("Unknown log level: {}", self.level))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Binding Configuration
///
/// Top-level configuration handed to [`NativeRuntime::new`](crate::NativeRuntime::new).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Deferred release scheduling
    pub release: ReleaseConfig,
    /// Logging setup
    pub logging: LoggingConfig,
}

impl BindingConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        self.release.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Config for BindingConfig {}
