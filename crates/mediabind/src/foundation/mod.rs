//! Foundation module - Core utilities
//!
//! This module provides utilities used throughout the binding layer:
//! - Logging setup

pub mod logging;
