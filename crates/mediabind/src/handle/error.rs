//! Handle construction errors

use super::HandleState;

/// Errors raised while creating or binding a [`NativeHandle`](super::NativeHandle).
///
/// Release never fails from the caller's point of view: destructor errors
/// are logged and swallowed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// The native allocator returned the invalid sentinel
    #[error("failed to allocate native {kind}")]
    AllocationFailed {
        /// Resource kind
        kind: &'static str,
    },

    /// A handle can only be pointed at a token once
    #[error("native {kind} handle is already {state:?}")]
    AlreadyBound {
        /// Resource kind
        kind: &'static str,
        /// State the handle was in
        state: HandleState,
    },

    /// A borrowed handle was given the invalid sentinel
    #[error("cannot borrow an invalid native {kind} token")]
    InvalidToken {
        /// Resource kind
        kind: &'static str,
    },
}
