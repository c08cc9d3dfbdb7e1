//! Pending-release queue for native handles.
//!
//! ## Problem
//!
//! Native multimedia objects (GPU textures, audio buffers, OS windows) must
//! not be destroyed from whatever thread happens to drop their wrapper: the
//! native library may hold a global lock on another thread, or only accept
//! calls from the thread that owns its context.
//!
//! ## Solution
//!
//! A drop outside a [`ReleaseContext`](super::ReleaseContext) only records
//! the release here. The host calls [`drain_pending_releases`] from a safe
//! point (once per frame), which swaps the queue out and runs every
//! destructor.
//!
//! ## Usage
//!
//! ```ignore
//! // Any thread: the wrapper goes out of scope without a release context
//! drop(texture);
//!
//! // Main thread, once per frame
//! let report = mediabind::drain_pending_releases();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::resource::{invoke_destructor, DestroyFn, NativeError};
use super::token::{OwnerId, RawToken};

static GLOBAL_QUEUE: OnceLock<PendingReleaseQueue> = OnceLock::new();

/// A release recorded for later.
///
/// Carries the destructor alongside the token so the release can run after
/// the wrapper that requested it is gone.
pub struct PendingRelease {
    token: RawToken,
    owner: OwnerId,
    kind: &'static str,
    destroy: DestroyFn,
    /// Shared with the originating handle so it can observe completion
    completed: Arc<AtomicBool>,
}

impl PendingRelease {
    pub(crate) fn new(
        token: RawToken,
        owner: OwnerId,
        kind: &'static str,
        destroy: DestroyFn,
        completed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            token,
            owner,
            kind,
            destroy,
            completed,
        }
    }

    /// Token awaiting release
    pub fn token(&self) -> RawToken {
        self.token
    }

    /// Owner that requested the release
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Resource kind
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Run the destructor. The entry is terminal afterwards whether or not
    /// the native call succeeded.
    fn release_now(self) -> Result<(), NativeError> {
        let result = invoke_destructor(self.destroy, self.token, self.owner, self.kind);
        self.completed.store(true, Ordering::Release);
        result
    }
}

impl std::fmt::Debug for PendingRelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRelease")
            .field("token", &self.token)
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Outcome of a drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Destructors that completed
    pub released: usize,
    /// Destructors that returned an error or panicked
    pub failed: usize,
}

impl DrainReport {
    /// Number of destructors that were called
    pub fn attempted(&self) -> usize {
        self.released + self.failed
    }

    /// Whether the drain found nothing to do
    pub fn is_empty(&self) -> bool {
        self.attempted() == 0
    }
}

impl std::ops::AddAssign for DrainReport {
    fn add_assign(&mut self, other: Self) {
        self.released += other.released;
        self.failed += other.failed;
    }
}

/// Lifetime counters of a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueTotals {
    /// Entries ever enqueued
    pub enqueued: u64,
    /// Entries whose destructor succeeded
    pub released: u64,
    /// Entries whose destructor failed
    pub failed: u64,
}

/// Thread-safe queue of releases waiting for a safe point.
///
/// Enqueue and drain are mutually exclusive, so an entry pushed while a
/// drain is running lands in the fresh queue and is picked up by the next
/// drain.
pub struct PendingReleaseQueue {
    /// Entries in insertion order
    entries: Mutex<Vec<PendingRelease>>,

    /// Fast check for pending entries (avoids the lock on the hot path)
    pending_count: AtomicUsize,

    enqueued_total: AtomicU64,
    released_total: AtomicU64,
    failed_total: AtomicU64,
}

impl Default for PendingReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingReleaseQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(8)),
            pending_count: AtomicUsize::new(0),
            enqueued_total: AtomicU64::new(0),
            released_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
        }
    }

    /// The process-wide queue, created on first use.
    pub fn global() -> &'static Self {
        GLOBAL_QUEUE.get_or_init(Self::new)
    }

    // Entries are plain data, a panic elsewhere cannot leave them torn.
    fn lock(&self) -> MutexGuard<'_, Vec<PendingRelease>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a release. Safe to call from any thread.
    pub(crate) fn push(&self, entry: PendingRelease) {
        log::trace!(
            "Deferred release of {} {} owned by {}",
            entry.kind,
            entry.token,
            entry.owner
        );

        let mut entries = self.lock();
        entries.push(entry);
        self.pending_count.fetch_add(1, Ordering::Release);
        self.enqueued_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether any release is waiting (lock-free)
    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending_count.load(Ordering::Acquire) > 0
    }

    /// Number of releases waiting
    #[inline]
    pub fn len(&self) -> usize {
        self.pending_count.load(Ordering::Acquire)
    }

    /// Check if the queue is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Lifetime counters
    pub fn totals(&self) -> QueueTotals {
        QueueTotals {
            enqueued: self.enqueued_total.load(Ordering::Relaxed),
            released: self.released_total.load(Ordering::Relaxed),
            failed: self.failed_total.load(Ordering::Relaxed),
        }
    }

    /// Release everything queued so far.
    ///
    /// Must be called from a thread where native calls are safe. A failing
    /// destructor is logged and the remaining entries are still released.
    pub fn drain(&self) -> DrainReport {
        if !self.has_pending() {
            return DrainReport::default();
        }

        let entries = {
            let mut queue = self.lock();
            let taken = std::mem::take(&mut *queue);
            self.pending_count.fetch_sub(taken.len(), Ordering::Release);
            taken
        };

        let mut report = DrainReport::default();
        for entry in entries {
            match entry.release_now() {
                Ok(()) => report.released += 1,
                Err(_) => report.failed += 1,
            }
        }

        self.released_total
            .fetch_add(report.released as u64, Ordering::Relaxed);
        self.failed_total
            .fetch_add(report.failed as u64, Ordering::Relaxed);

        if !report.is_empty() {
            log::debug!(
                "Drained {} deferred releases ({} failed)",
                report.attempted(),
                report.failed
            );
        }

        report
    }
}

impl Drop for PendingReleaseQueue {
    fn drop(&mut self) {
        let leaked = self.len();
        if leaked > 0 {
            log::warn!(
                "Pending release queue dropped with {} undrained entries; native objects leaked",
                leaked
            );
        }
    }
}

impl std::fmt::Debug for PendingReleaseQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReleaseQueue")
            .field("pending_count", &self.len())
            .field("totals", &self.totals())
            .finish()
    }
}

/// Drain the process-wide queue.
///
/// Call periodically (once per frame or tick) from a thread where calling
/// into the native library is safe.
pub fn drain_pending_releases() -> DrainReport {
    PendingReleaseQueue::global().drain()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    static DESTROYED: AtomicUsize = AtomicUsize::new(0);

    fn counting_destroy(_: RawToken) -> Result<(), NativeError> {
        DESTROYED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn failing_destroy(token: RawToken) -> Result<(), NativeError> {
        if token.as_raw() == 2 {
            Err(NativeError::Failed { kind: "Test", code: -1 })
        } else {
            Ok(())
        }
    }

    fn noop_destroy(_: RawToken) -> Result<(), NativeError> {
        Ok(())
    }

    fn entry(raw: usize, destroy: DestroyFn) -> (PendingRelease, Arc<AtomicBool>) {
        let completed = Arc::new(AtomicBool::new(false));
        let pending = PendingRelease::new(
            RawToken::from_raw(raw),
            OwnerId::next("Test"),
            "Test",
            destroy,
            Arc::clone(&completed),
        );
        (pending, completed)
    }

    #[test]
    fn test_queue_creation() {
        let queue = PendingReleaseQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(!queue.has_pending());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_drain_releases_each_entry_once() {
        let queue = PendingReleaseQueue::new();
        let before = DESTROYED.load(Ordering::SeqCst);

        let mut tickets = Vec::new();
        for raw in 1..=5 {
            let (pending, completed) = entry(raw, counting_destroy);
            queue.push(pending);
            tickets.push(completed);
        }
        assert_eq!(queue.len(), 5);

        let report = queue.drain();
        assert_eq!(report, DrainReport { released: 5, failed: 0 });
        assert_eq!(DESTROYED.load(Ordering::SeqCst) - before, 5);
        assert!(queue.is_empty());
        assert!(tickets.iter().all(|t| t.load(Ordering::Acquire)));

        // Nothing left for a second drain
        assert!(queue.drain().is_empty());
        assert_eq!(DESTROYED.load(Ordering::SeqCst) - before, 5);
    }

    #[test]
    fn test_failed_release_does_not_stop_drain() {
        let queue = PendingReleaseQueue::new();
        let mut tickets = Vec::new();
        for raw in 1..=3 {
            let (pending, completed) = entry(raw, failing_destroy);
            queue.push(pending);
            tickets.push(completed);
        }

        let report = queue.drain();
        assert_eq!(report, DrainReport { released: 2, failed: 1 });
        assert!(tickets.iter().all(|t| t.load(Ordering::Acquire)));
        assert!(queue.is_empty());

        let totals = queue.totals();
        assert_eq!(totals.enqueued, 3);
        assert_eq!(totals.released, 2);
        assert_eq!(totals.failed, 1);
    }

    #[test]
    fn test_enqueue_during_drain_is_not_lost() {
        let queue = Arc::new(PendingReleaseQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        let (pending, _) = entry(p * 1000 + i + 1, noop_destroy);
                        queue.push(pending);
                    }
                })
            })
            .collect();

        let mut report = DrainReport::default();
        while producers.iter().any(|p| !p.is_finished()) {
            report += queue.drain();
        }
        for producer in producers {
            producer.join().unwrap();
        }
        report += queue.drain();

        assert_eq!(report.released, 1000);
        assert_eq!(report.failed, 0);
        assert!(queue.is_empty());
        assert_eq!(queue.totals().enqueued, 1000);
    }

    #[test]
    fn test_report_arithmetic() {
        let mut total = DrainReport { released: 2, failed: 1 };
        total += DrainReport { released: 3, failed: 0 };
        assert_eq!(total.attempted(), 6);
        assert!(!total.is_empty());
    }
}
