//! # Core Module
//!
//! Shared settings used across the binding layer.
//!
//! ## Organization
//!
//! - **Config**: release scheduling and logging configuration consumed by
//!   [`NativeRuntime`](crate::NativeRuntime)

pub mod config;

pub use config::{BindingConfig, LoggingConfig, ReleaseConfig};

// Re-export the file loading trait alongside the types that implement it
pub use crate::config::{Config, ConfigError};
