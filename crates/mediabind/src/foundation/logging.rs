//! Logging utilities

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// `RUST_LOG` wins over `default_level` when set. Returns `false` when a
/// logger was already installed, which is not an error: hosts often set up
/// their own logger before creating the runtime.
pub fn init(default_level: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
