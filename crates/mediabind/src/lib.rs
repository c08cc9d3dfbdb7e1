//! # mediabind
//!
//! Lifetime management for handles owned by a native multimedia library.
//!
//! Every wrapper type in a binding layer (textures, sounds, windows, ...)
//! holds exactly one opaque token handed out by the native library. This
//! crate owns that token on the wrapper's behalf and guarantees it is
//! released exactly once, even when the wrapper is dropped on a thread
//! where calling back into the native library is unsafe.
//!
//! ## Features
//!
//! - **Exactly-once release**: [`NativeHandle`] invalidates its token on the
//!   first release, every later release is a no-op
//! - **Borrowed handles**: tokens obtained by reference are never destroyed
//! - **Deferred release**: drops outside a [`ReleaseContext`] are queued on
//!   the process-wide [`PendingReleaseQueue`] and freed on the next drain
//! - **Host integration**: [`NativeRuntime`] drains once per frame
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediabind::prelude::*;
//! use mediabind::mock::{self, MockTexture};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runtime = NativeRuntime::new(BindingConfig::default())?;
//!
//!     let texture = NativeHandle::<MockTexture>::acquire(|| mock::create(MockTexture::KIND))?;
//!     std::thread::spawn(move || drop(texture)).join().ok();
//!
//!     // Frees the texture dropped on the other thread
//!     let report = runtime.end_frame();
//!     assert_eq!(report.released, 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod handle;
#[cfg(feature = "mock")]
pub mod mock;

mod runtime;

pub use handle::{
    drain_pending_releases, DrainReport, HandleError, HandleState, NativeError, NativeHandle,
    NativeObject, NativeResource, OwnerId, Ownership, PendingReleaseQueue, QueueTotals, RawToken,
    ReleaseContext,
};
pub use runtime::{NativeRuntime, RuntimeError};

/// Common imports for binding authors
pub mod prelude {
    pub use crate::{
        core::config::{BindingConfig, LoggingConfig, ReleaseConfig},
        config::Config,
        drain_pending_releases, DrainReport, HandleError, HandleState, NativeError, NativeHandle,
        NativeObject, NativeResource, NativeRuntime, PendingReleaseQueue, RawToken,
        ReleaseContext, RuntimeError,
    };
}
