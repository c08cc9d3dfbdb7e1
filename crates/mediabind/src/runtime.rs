//! Host-side driver for deferred releases

use thiserror::Error;

use crate::{
    config::ConfigError,
    core::config::BindingConfig,
    foundation::logging,
    handle::{DrainReport, PendingReleaseQueue, ReleaseContext},
};

/// Drives the process-wide pending-release queue from the host's frame loop.
///
/// Create it on the thread that talks to the native library (usually the
/// main thread). For its whole lifetime that thread is inside a
/// [`ReleaseContext`], so wrappers dropped there are released immediately,
/// while wrappers dropped on other threads are queued and freed by
/// [`end_frame`](Self::end_frame).
pub struct NativeRuntime {
    config: BindingConfig,
    queue: &'static PendingReleaseQueue,
    frame: u64,
    lifetime: DrainReport,
    shut_down: bool,
    _context: ReleaseContext,
}

impl NativeRuntime {
    /// Create a runtime on the current thread
    pub fn new(config: BindingConfig) -> Result<Self, RuntimeError> {
        config.validate().map_err(RuntimeError::InvalidConfig)?;

        if config.logging.init_logger && !logging::init(&config.logging.level) {
            log::debug!("Logger already installed, keeping the existing one");
        }

        log::info!(
            "Native runtime started (drain every {} frame(s))",
            config.release.drain_interval_frames
        );

        Ok(Self {
            config,
            queue: PendingReleaseQueue::global(),
            frame: 0,
            lifetime: DrainReport::default(),
            shut_down: false,
            _context: ReleaseContext::enter(),
        })
    }

    /// Load the configuration from a TOML or RON file and create a runtime.
    ///
    /// A file that parses but holds invalid values fails with
    /// [`ConfigError::Invalid`].
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> Result<Self, RuntimeError> {
        use crate::config::Config;

        let config = BindingConfig::load_from_file(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Self::new(config)
    }

    /// Per-frame hook: drains the pending queue on every
    /// `drain_interval_frames`-th frame.
    pub fn end_frame(&mut self) -> DrainReport {
        self.frame += 1;

        if self.frame % u64::from(self.config.release.drain_interval_frames) != 0 {
            return DrainReport::default();
        }

        self.drain_now()
    }

    /// Drain the pending queue immediately
    pub fn drain_now(&mut self) -> DrainReport {
        let pending = self.queue.len();
        let threshold = self.config.release.pending_warn_threshold;
        if threshold > 0 && pending >= threshold {
            log::warn!(
                "{} native releases were waiting at frame {} (threshold {})",
                pending,
                self.frame,
                threshold
            );
        }

        let report = self.queue.drain();
        self.lifetime += report;
        report
    }

    /// Number of releases currently waiting
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Frames ended so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Everything drained since the runtime started
    pub fn lifetime_report(&self) -> DrainReport {
        self.lifetime
    }

    /// Active configuration
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Shut down, draining leftovers if configured. Returns the lifetime
    /// report.
    pub fn shutdown(mut self) -> DrainReport {
        self.finish();
        self.lifetime
    }

    fn finish(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.config.release.drain_on_shutdown {
            self.drain_now();
        } else if !self.queue.is_empty() {
            log::warn!("Shutting down with {} native releases still queued", self.queue.len());
        }

        log::info!(
            "Native runtime stopped after {} frames ({} released, {} failed)",
            self.frame,
            self.lifetime.released,
            self.lifetime.failed
        );
    }
}

impl Drop for NativeRuntime {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for NativeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRuntime")
            .field("frame", &self.frame)
            .field("pending", &self.pending())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Runtime errors
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
