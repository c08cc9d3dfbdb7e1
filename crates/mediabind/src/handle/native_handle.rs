//! Ownership of a single native token

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::context::ReleaseContext;
use super::error::HandleError;
use super::pending::{PendingRelease, PendingReleaseQueue};
use super::resource::{invoke_destructor, NativeResource};
use super::token::{OwnerId, RawToken};

/// Where a handle is in its lifetime.
///
/// ```text
/// Uninitialized -> Valid -> ReleasedNow
///                        \-> ReleasePending -> ReleasedAfterDrain
/// ```
///
/// `ReleasedNow` and `ReleasedAfterDrain` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// Placeholder waiting for its token
    Uninitialized,
    /// Owns (or borrows) a live token
    Valid,
    /// Released synchronously
    ReleasedNow,
    /// Release queued, waiting for a drain
    ReleasePending,
    /// Released by a drain
    ReleasedAfterDrain,
}

impl HandleState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ReleasedNow | Self::ReleasedAfterDrain)
    }
}

/// Who is responsible for destroying the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Allocated by this handle; destroyed exactly once
    Owned,
    /// Obtained by reference from the native library; never destroyed
    Borrowed,
}

/// Owner of one native token.
///
/// Every wrapper type holds one of these. The token is released exactly
/// once: explicitly through [`release_now`](Self::release_now), through a
/// queued release drained later, or on drop.
///
/// Dropping a still-valid handle inside a [`ReleaseContext`] releases it
/// immediately; anywhere else the release is deferred to the process-wide
/// [`PendingReleaseQueue`].
///
/// # Example
///
/// ```
/// use mediabind::{NativeHandle, NativeResource, NativeError, RawToken};
///
/// struct Font;
///
/// impl NativeResource for Font {
///     const KIND: &'static str = "Font";
///
///     fn destroy(_token: RawToken) -> Result<(), NativeError> {
///         Ok(())
///     }
/// }
///
/// let mut font = NativeHandle::<Font>::acquire(|| RawToken::from_raw(0x2a)).unwrap();
/// assert!(font.is_valid());
///
/// font.release_now();
/// font.release_now(); // no-op
/// assert!(!font.is_valid());
/// ```
pub struct NativeHandle<R: NativeResource> {
    token: RawToken,
    state: HandleState,
    ownership: Ownership,
    owner: OwnerId,
    /// Set once the release is queued; flips when a drain has run it
    drained: Option<Arc<AtomicBool>>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: NativeResource> NativeHandle<R> {
    /// Allocate a native object and take ownership of its token.
    ///
    /// `allocate` performs the native call and returns its token, or
    /// [`RawToken::INVALID`] on failure. On failure no handle is built, so
    /// no destructor can ever run for that attempt.
    pub fn acquire<F>(allocate: F) -> Result<Self, HandleError>
    where
        F: FnOnce() -> RawToken,
    {
        let mut handle = Self::unbound();
        handle.bind(allocate())?;
        Ok(handle)
    }

    /// Create a placeholder to be pointed at its real token later with
    /// [`bind`](Self::bind).
    pub fn unbound() -> Self {
        Self {
            token: RawToken::INVALID,
            state: HandleState::Uninitialized,
            ownership: Ownership::Owned,
            owner: OwnerId::next(R::KIND),
            drained: None,
            _resource: PhantomData,
        }
    }

    /// Wrap a token the native library lends out (e.g. a glyph cache
    /// texture). The token is never destroyed through this handle.
    pub fn borrowed(token: RawToken) -> Result<Self, HandleError> {
        if !token.is_valid() {
            return Err(HandleError::InvalidToken { kind: R::KIND });
        }

        Ok(Self {
            token,
            state: HandleState::Valid,
            ownership: Ownership::Borrowed,
            owner: OwnerId::next(R::KIND),
            drained: None,
            _resource: PhantomData,
        })
    }

    /// Replace the owner label used in log lines
    pub fn with_owner_label(mut self, label: &'static str) -> Self {
        self.owner.relabel(label);
        self
    }

    /// Point a placeholder at its token. Only allowed once, from
    /// [`HandleState::Uninitialized`].
    pub fn bind(&mut self, token: RawToken) -> Result<(), HandleError> {
        if self.state != HandleState::Uninitialized {
            return Err(HandleError::AlreadyBound {
                kind: R::KIND,
                state: self.state(),
            });
        }

        if !token.is_valid() {
            return Err(HandleError::AllocationFailed { kind: R::KIND });
        }

        self.token = token;
        self.state = HandleState::Valid;
        log::trace!("Acquired {} {} for {}", R::KIND, token, self.owner);
        Ok(())
    }

    /// Release the native object on the calling thread.
    ///
    /// No-op once the token is invalid. Destructor failures are logged and
    /// swallowed; the token is invalidated either way.
    pub fn release_now(&mut self) {
        if !self.token.is_valid() {
            return;
        }

        let token = std::mem::replace(&mut self.token, RawToken::INVALID);
        self.state = HandleState::ReleasedNow;

        match self.ownership {
            Ownership::Owned => {
                let _ = invoke_destructor(R::destroy, token, self.owner, R::KIND);
            }
            Ownership::Borrowed => {
                log::trace!("Let go of borrowed {} {} held by {}", R::KIND, token, self.owner);
            }
        }
    }

    /// Queue the release on the process-wide queue instead of calling the
    /// native library from this thread.
    pub fn release_deferred(&mut self) {
        self.defer_release_to(PendingReleaseQueue::global());
    }

    /// Queue the release on `queue`.
    ///
    /// Borrowed handles are only invalidated; nothing is queued for them.
    pub fn defer_release_to(&mut self, queue: &PendingReleaseQueue) {
        if !self.token.is_valid() {
            return;
        }

        let token = std::mem::replace(&mut self.token, RawToken::INVALID);

        if self.ownership == Ownership::Borrowed {
            self.state = HandleState::ReleasedNow;
            log::trace!("Let go of borrowed {} {} held by {}", R::KIND, token, self.owner);
            return;
        }

        let drained = Arc::new(AtomicBool::new(false));
        queue.push(PendingRelease::new(
            token,
            self.owner,
            R::KIND,
            R::destroy,
            Arc::clone(&drained),
        ));
        self.drained = Some(drained);
        self.state = HandleState::ReleasePending;
    }

    /// The current token, [`RawToken::INVALID`] once released
    pub fn token(&self) -> RawToken {
        self.token
    }

    /// Current lifetime state
    pub fn state(&self) -> HandleState {
        match &self.drained {
            Some(done) if done.load(Ordering::Acquire) => HandleState::ReleasedAfterDrain,
            _ => self.state,
        }
    }

    /// Whether the handle still refers to a live token
    pub fn is_valid(&self) -> bool {
        self.token.is_valid()
    }

    /// Who destroys the token
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Whether the token was lent by the native library
    pub fn is_externally_owned(&self) -> bool {
        self.ownership == Ownership::Borrowed
    }

    /// Diagnostic owner identity
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Resource kind name
    pub fn kind(&self) -> &'static str {
        R::KIND
    }
}

impl<R: NativeResource> Drop for NativeHandle<R> {
    fn drop(&mut self) {
        if !self.token.is_valid() {
            return;
        }

        if ReleaseContext::is_active() {
            self.release_now();
        } else {
            self.release_deferred();
        }
    }
}

impl<R: NativeResource> std::fmt::Debug for NativeHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &R::KIND)
            .field("token", &self.token)
            .field("state", &self.state())
            .field("ownership", &self.ownership)
            .field("owner", &self.owner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::NativeError;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(1);
    static DESTROY_CALLS: Mutex<Option<HashMap<usize, usize>>> = Mutex::new(None);

    fn allocate() -> RawToken {
        RawToken::from_raw(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    fn record_destroy(token: RawToken) {
        let mut calls = DESTROY_CALLS.lock().unwrap();
        *calls
            .get_or_insert_with(HashMap::new)
            .entry(token.as_raw())
            .or_insert(0) += 1;
    }

    fn destroy_calls(token: RawToken) -> usize {
        DESTROY_CALLS
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|calls| calls.get(&token.as_raw()).copied())
            .unwrap_or(0)
    }

    struct TestTexture;

    impl NativeResource for TestTexture {
        const KIND: &'static str = "TestTexture";

        fn destroy(token: RawToken) -> Result<(), NativeError> {
            record_destroy(token);
            Ok(())
        }
    }

    struct BrokenDevice;

    impl NativeResource for BrokenDevice {
        const KIND: &'static str = "BrokenDevice";

        fn destroy(token: RawToken) -> Result<(), NativeError> {
            record_destroy(token);
            Err(NativeError::Failed { kind: Self::KIND, code: -4 })
        }
    }

    #[test]
    fn test_release_now_is_idempotent() {
        let mut handle = NativeHandle::<TestTexture>::acquire(allocate).unwrap();
        let token = handle.token();
        assert_eq!(handle.state(), HandleState::Valid);

        handle.release_now();
        handle.release_now();
        handle.release_now();

        assert_eq!(destroy_calls(token), 1);
        assert_eq!(handle.state(), HandleState::ReleasedNow);
        assert_eq!(handle.token(), RawToken::INVALID);
    }

    #[test]
    fn test_failed_allocation() {
        let mut allocator_calls = 0;
        let result = NativeHandle::<TestTexture>::acquire(|| {
            allocator_calls += 1;
            RawToken::INVALID
        });

        assert_eq!(allocator_calls, 1);
        assert_eq!(result.unwrap_err(), HandleError::AllocationFailed { kind: "TestTexture" });
        assert_eq!(destroy_calls(RawToken::INVALID), 0);
    }

    #[test]
    fn test_borrowed_handle_is_never_destroyed() {
        let queue = PendingReleaseQueue::new();
        let lent = allocate();

        let mut handle = NativeHandle::<TestTexture>::borrowed(lent).unwrap();
        assert!(handle.is_externally_owned());
        handle.release_now();
        assert_eq!(handle.state(), HandleState::ReleasedNow);

        let mut deferred = NativeHandle::<TestTexture>::borrowed(lent).unwrap();
        deferred.defer_release_to(&queue);
        assert!(queue.is_empty());
        assert_eq!(deferred.state(), HandleState::ReleasedNow);

        {
            let _context = ReleaseContext::enter();
            drop(NativeHandle::<TestTexture>::borrowed(lent).unwrap());
        }

        assert_eq!(destroy_calls(lent), 0);
    }

    #[test]
    fn test_borrowing_invalid_token() {
        let result = NativeHandle::<TestTexture>::borrowed(RawToken::INVALID);
        assert_eq!(result.unwrap_err(), HandleError::InvalidToken { kind: "TestTexture" });
    }

    #[test]
    fn test_bind_only_once() {
        let mut handle = NativeHandle::<TestTexture>::unbound();
        assert_eq!(handle.state(), HandleState::Uninitialized);
        assert!(!handle.is_valid());

        // Releasing a placeholder does nothing and keeps it bindable
        handle.release_now();
        assert_eq!(handle.state(), HandleState::Uninitialized);

        assert_eq!(
            handle.bind(RawToken::INVALID),
            Err(HandleError::AllocationFailed { kind: "TestTexture" })
        );
        assert_eq!(handle.state(), HandleState::Uninitialized);

        let token = allocate();
        handle.bind(token).unwrap();
        assert_eq!(handle.token(), token);

        let second = allocate();
        assert_eq!(
            handle.bind(second),
            Err(HandleError::AlreadyBound { kind: "TestTexture", state: HandleState::Valid })
        );
        assert_eq!(handle.token(), token);

        handle.release_now();
        assert!(handle.bind(second).is_err());
        assert_eq!(destroy_calls(token), 1);
        assert_eq!(destroy_calls(second), 0);
    }

    #[test]
    fn test_deferred_release_round_trip() {
        let queue = PendingReleaseQueue::new();
        let mut handles: Vec<_> = (0..5)
            .map(|_| NativeHandle::<TestTexture>::acquire(allocate).unwrap())
            .collect();
        let tokens: Vec<_> = handles.iter().map(NativeHandle::token).collect();

        for handle in &mut handles {
            handle.defer_release_to(&queue);
            assert_eq!(handle.state(), HandleState::ReleasePending);
            assert!(!handle.is_valid());
        }
        assert_eq!(queue.len(), 5);
        assert!(tokens.iter().all(|t| destroy_calls(*t) == 0));

        let report = queue.drain();
        assert_eq!(report.released, 5);
        assert_eq!(queue.len(), 0);

        for handle in &mut handles {
            assert_eq!(handle.state(), HandleState::ReleasedAfterDrain);
            handle.release_now();
            handle.defer_release_to(&queue);
        }
        assert!(queue.is_empty());
        assert!(tokens.iter().all(|t| destroy_calls(*t) == 1));
    }

    #[test]
    fn test_drop_inside_context_releases_immediately() {
        let _context = ReleaseContext::enter();
        let handle = NativeHandle::<TestTexture>::acquire(allocate).unwrap();
        let token = handle.token();

        drop(handle);
        assert_eq!(destroy_calls(token), 1);
    }

    #[test]
    fn test_failing_destructor_is_swallowed() {
        let mut handle = NativeHandle::<BrokenDevice>::acquire(allocate).unwrap();
        let token = handle.token();

        handle.release_now();
        handle.release_now();

        assert_eq!(destroy_calls(token), 1);
        assert_eq!(handle.state(), HandleState::ReleasedNow);
    }

    #[test]
    fn test_owner_label() {
        let handle = NativeHandle::<TestTexture>::unbound().with_owner_label("Sprite");
        assert_eq!(handle.owner().label(), "Sprite");
        assert_eq!(handle.kind(), "TestTexture");
    }
}
