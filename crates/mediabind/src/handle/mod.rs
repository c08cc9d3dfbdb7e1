//! Native handle lifetime and deferred release.
//!
//! Wrappers around a native multimedia library each own one opaque token.
//! This module makes sure that token is released exactly once, and never
//! from a thread where calling the native library is unsafe.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  NativeHandle<R>                                            │
//! │  ├── Owns (or borrows) one RawToken                         │
//! │  ├── release_now()  → R::destroy on this thread             │
//! │  └── Drop           → release_now inside a ReleaseContext,  │
//! │                       otherwise queue the release           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PendingReleaseQueue (process-wide)                         │
//! │  ├── Thread-safe, insertion ordered                         │
//! │  └── drain(): swap out, then destroy each entry             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ReleaseContext (RAII, thread-local)                        │
//! │  └── Marks threads where native calls are safe              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Writing a wrapper
//!
//! ```ignore
//! pub struct Texture {
//!     handle: NativeHandle<TextureResource>,
//! }
//!
//! impl Texture {
//!     pub fn new(width: u32, height: u32) -> Result<Self, HandleError> {
//!         let handle = NativeHandle::acquire(|| unsafe { ffi::texture_create(width, height) })?;
//!         Ok(Self { handle })
//!     }
//! }
//!
//! impl NativeObject for Texture {
//!     type Resource = TextureResource;
//!
//!     fn native_handle(&self) -> &NativeHandle<TextureResource> {
//!         &self.handle
//!     }
//! }
//! ```

mod context;
mod error;
mod native_handle;
mod pending;
mod resource;
mod token;

pub use context::ReleaseContext;
pub use error::HandleError;
pub use native_handle::{HandleState, NativeHandle, Ownership};
pub use pending::{drain_pending_releases, DrainReport, PendingRelease, PendingReleaseQueue, QueueTotals};
pub use resource::{DestroyFn, NativeError, NativeResource};
pub use token::{OwnerId, RawToken};

/// A wrapper type backed by a single native handle.
pub trait NativeObject {
    /// Kind of native object wrapped
    type Resource: NativeResource;

    /// The handle owning the native object
    fn native_handle(&self) -> &NativeHandle<Self::Resource>;

    /// Token to pass to native calls
    fn raw_token(&self) -> RawToken {
        self.native_handle().token()
    }
}
