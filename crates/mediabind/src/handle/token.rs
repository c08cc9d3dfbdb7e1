//! Opaque native tokens and owner identities

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier handed out by the native library.
///
/// The binding layer never dereferences a token; it only passes it back to
/// the library that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RawToken(usize);

impl RawToken {
    /// Reserved sentinel: returned by allocators on failure and stored in a
    /// handle once its resource has been released.
    pub const INVALID: Self = Self(0);

    /// Wrap a raw value returned by the native library
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw value to pass back to the native library
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// Whether this token refers to a live resource
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "RawToken({:#x})", self.0)
        } else {
            f.write_str("RawToken(INVALID)")
        }
    }
}

impl fmt::Display for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Diagnostic identity of the wrapper that owns a handle.
///
/// Only used in log lines so a failed or leaked release can be traced back
/// to the object that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId {
    id: u64,
    label: &'static str,
}

impl OwnerId {
    /// Allocate a fresh process-unique owner id
    pub fn next(label: &'static str) -> Self {
        Self {
            id: NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed),
            label,
        }
    }

    /// Numeric id
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Human-readable owner label
    pub const fn label(&self) -> &'static str {
        self.label
    }

    pub(crate) fn relabel(&mut self, label: &'static str) {
        self.label = label;
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.id)
    }
}
