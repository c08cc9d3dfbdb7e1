//! ReleaseContext - RAII marker for threads that may call native destructors.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    /// Number of live contexts on this thread (contexts nest).
    static CONTEXT_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// RAII guard declaring that the current thread may call into the native
/// library.
///
/// While a context exists on a thread, dropping a [`NativeHandle`] there
/// releases it immediately. Without one, the drop is treated as an
/// uncontrolled reclamation and the release is queued on the process-wide
/// [`PendingReleaseQueue`] instead.
///
/// Contexts nest; the thread stays marked until the outermost one is
/// dropped. The guard is tied to its thread and is neither `Send` nor
/// `Sync`.
///
/// # Example
///
/// ```
/// use mediabind::ReleaseContext;
///
/// assert!(!ReleaseContext::is_active());
/// {
///     let _context = ReleaseContext::enter();
///     assert!(ReleaseContext::is_active());
/// }
/// assert!(!ReleaseContext::is_active());
/// ```
///
/// [`NativeHandle`]: super::NativeHandle
/// [`PendingReleaseQueue`]: super::PendingReleaseQueue
#[must_use = "the thread is only marked while the context is alive"]
pub struct ReleaseContext {
    _not_send: PhantomData<*const ()>,
}

impl ReleaseContext {
    /// Mark the current thread as safe for native calls.
    pub fn enter() -> Self {
        let depth = CONTEXT_DEPTH.with(|d| {
            let depth = d.get() + 1;
            d.set(depth);
            depth
        });
        log::trace!("Entered release context (depth {})", depth);

        Self {
            _not_send: PhantomData,
        }
    }

    /// Whether the current thread is inside a release context.
    pub fn is_active() -> bool {
        CONTEXT_DEPTH.with(|d| d.get() > 0)
    }
}

impl Drop for ReleaseContext {
    fn drop(&mut self) {
        CONTEXT_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

impl std::fmt::Debug for ReleaseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseContext")
            .field("depth", &CONTEXT_DEPTH.with(Cell::get))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_contexts_nest() {
        assert!(!ReleaseContext::is_active());

        let outer = ReleaseContext::enter();
        let inner = ReleaseContext::enter();
        drop(inner);
        assert!(ReleaseContext::is_active());

        drop(outer);
        assert!(!ReleaseContext::is_active());
    }

    #[test]
    fn test_context_is_per_thread() {
        let _context = ReleaseContext::enter();
        assert!(ReleaseContext::is_active());

        let other = thread::spawn(ReleaseContext::is_active).join().unwrap();
        assert!(!other);
    }
}
