//! Per-type native destructors

use std::panic::{self, AssertUnwindSafe};

use super::token::{OwnerId, RawToken};

/// Signature of a native destructor
pub type DestroyFn = fn(RawToken) -> Result<(), NativeError>;

/// A kind of resource owned by the native library.
///
/// Implemented once per wrapped type (texture, sound buffer, window, ...).
/// Allocation is supplied per call to
/// [`NativeHandle::acquire`](super::NativeHandle::acquire); only the
/// destructor is tied to the type, so a queued release can run long after
/// the wrapper is gone.
pub trait NativeResource: 'static {
    /// Name used in log lines and errors
    const KIND: &'static str;

    /// Release the native object behind `token`.
    ///
    /// Called at most once per valid token.
    fn destroy(token: RawToken) -> Result<(), NativeError>;
}

/// Errors reported by the native library
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The library reported a failure code
    #[error("{kind} call failed with code {code}")]
    Failed {
        /// Resource kind
        kind: &'static str,
        /// Library-specific error code
        code: i32,
    },

    /// The library does not recognise the token
    #[error("unknown native token {0}")]
    UnknownToken(RawToken),

    /// The destructor panicked
    #[error("native destructor panicked: {0}")]
    Panicked(String),
}

/// Run a destructor, turning panics into errors and logging failures.
///
/// Release failures never propagate past this point.
pub(crate) fn invoke_destructor(
    destroy: DestroyFn,
    token: RawToken,
    owner: OwnerId,
    kind: &'static str,
) -> Result<(), NativeError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| destroy(token)))
        .unwrap_or_else(|payload| Err(NativeError::Panicked(panic_message(payload.as_ref()))));

    match &result {
        Ok(()) => log::trace!("Released {} {} owned by {}", kind, token, owner),
        Err(e) => log::error!("Failed to release {} {} owned by {}: {}", kind, token, owner, e),
    }

    result
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
