//! In-process stand-in for the wrapped native library.
//!
//! Objects live in a [`SlotMap`]; a token is the FFI encoding of the slot
//! key, so it is never zero and a stale token is detected by its version.
//! Every destructor call is counted per token, which is what the lifetime
//! tests assert on.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use slotmap::{DefaultKey, Key, KeyData, SlotMap};

use crate::handle::{NativeError, NativeResource, RawToken};

/// Largest texture edge the mock accepts
pub const MAX_TEXTURE_SIZE: u32 = 8192;

/// Error code reported for a destroy call of the wrong kind
pub const KIND_MISMATCH: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DestroyBehavior {
    Succeed,
    Fail(i32),
    Panic,
}

#[derive(Debug)]
struct MockObject {
    kind: &'static str,
    on_destroy: DestroyBehavior,
}

#[derive(Default)]
struct Library {
    objects: SlotMap<DefaultKey, MockObject>,
    destroy_calls: HashMap<RawToken, usize>,
    /// Texture owned by the library itself, lent out by reference
    glyph_page: Option<DefaultKey>,
}

static LIBRARY: OnceLock<Mutex<Library>> = OnceLock::new();

fn library() -> MutexGuard<'static, Library> {
    LIBRARY
        .get_or_init(|| Mutex::new(Library::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Slot keys encode index and version in 64 bits and never encode to
/// zero. A key that does not fit in a `usize` maps to the sentinel, so the
/// version is never truncated away.
fn token_from_ffi(ffi: u64) -> RawToken {
    usize::try_from(ffi).map_or(RawToken::INVALID, RawToken::from_raw)
}

fn token_of(key: DefaultKey) -> RawToken {
    token_from_ffi(key.data().as_ffi())
}

fn key_of(token: RawToken) -> DefaultKey {
    KeyData::from_ffi(u64::try_from(token.as_raw()).unwrap_or(0)).into()
}

impl Library {
    /// Insert `object`; it is taken back out if its key has no token.
    fn insert(&mut self, object: MockObject) -> Option<DefaultKey> {
        let key = self.objects.insert(object);
        if token_of(key).is_valid() {
            Some(key)
        } else {
            log::warn!("mock: slot key {:?} does not fit a native token", key);
            self.objects.remove(key);
            None
        }
    }
}

/// Allocate an object of `kind`
pub fn create(kind: &'static str) -> RawToken {
    library()
        .insert(MockObject {
            kind,
            on_destroy: DestroyBehavior::Succeed,
        })
        .map_or(RawToken::INVALID, token_of)
}

/// Allocate a texture; fails with the invalid sentinel on a zero or
/// oversized dimension.
pub fn create_texture(width: u32, height: u32) -> RawToken {
    if width == 0 || height == 0 || width > MAX_TEXTURE_SIZE || height > MAX_TEXTURE_SIZE {
        log::debug!("mock: rejecting {}x{} texture", width, height);
        return RawToken::INVALID;
    }
    create(MockTexture::KIND)
}

/// Allocate a sound buffer; fails on empty sample data.
pub fn create_sound(samples: &[i16]) -> RawToken {
    if samples.is_empty() {
        return RawToken::INVALID;
    }
    create(MockSound::KIND)
}

/// The library-owned glyph page texture, created on first request.
///
/// Callers must only ever borrow this token.
pub fn glyph_texture() -> RawToken {
    let mut lib = library();
    if let Some(key) = lib.glyph_page {
        return token_of(key);
    }

    lib.glyph_page = lib.insert(MockObject {
        kind: MockTexture::KIND,
        on_destroy: DestroyBehavior::Fail(-1),
    });
    lib.glyph_page.map_or(RawToken::INVALID, token_of)
}

/// Destroy the object behind `token`, checking it is of `kind`.
///
/// Every call is counted, including failing ones.
pub fn destroy(kind: &'static str, token: RawToken) -> Result<(), NativeError> {
    let behavior = {
        let mut lib = library();
        *lib.destroy_calls.entry(token).or_insert(0) += 1;

        let key = key_of(token);
        let object = lib
            .objects
            .get(key)
            .ok_or(NativeError::UnknownToken(token))?;

        if object.kind != kind {
            return Err(NativeError::Failed {
                kind,
                code: KIND_MISMATCH,
            });
        }

        let behavior = object.on_destroy;
        if behavior == DestroyBehavior::Succeed {
            lib.objects.remove(key);
        }
        behavior
    };

    match behavior {
        DestroyBehavior::Succeed => Ok(()),
        DestroyBehavior::Fail(code) => Err(NativeError::Failed { kind, code }),
        DestroyBehavior::Panic => panic!("mock: {} {} destroyed during device loss", kind, token),
    }
}

/// Make every destroy of `token` fail with `code`
pub fn fail_destroy(token: RawToken, code: i32) {
    if let Some(object) = library().objects.get_mut(key_of(token)) {
        object.on_destroy = DestroyBehavior::Fail(code);
    }
}

/// Make every destroy of `token` panic
pub fn panic_on_destroy(token: RawToken) {
    if let Some(object) = library().objects.get_mut(key_of(token)) {
        object.on_destroy = DestroyBehavior::Panic;
    }
}

/// How many times `destroy` was called for `token`
pub fn destroy_calls(token: RawToken) -> usize {
    library().destroy_calls.get(&token).copied().unwrap_or(0)
}

/// Whether `token` still refers to a live object
pub fn is_alive(token: RawToken) -> bool {
    token.is_valid() && library().objects.contains_key(key_of(token))
}

/// Number of live objects across all kinds
pub fn live_objects() -> usize {
    library().objects.len()
}

macro_rules! mock_resource {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name;

        impl NativeResource for $name {
            const KIND: &'static str = $kind;

            fn destroy(token: RawToken) -> Result<(), NativeError> {
                destroy(Self::KIND, token)
            }
        }
    };
}

mock_resource!(
    /// Mock GPU texture
    MockTexture,
    "Texture"
);
mock_resource!(
    /// Mock audio sound buffer
    MockSound,
    "SoundBuffer"
);
mock_resource!(
    /// Mock OS window
    MockWindow,
    "Window"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let token = create(MockWindow::KIND);
        assert!(token.is_valid());
        assert!(is_alive(token));

        assert!(MockWindow::destroy(token).is_ok());
        assert!(!is_alive(token));
        assert_eq!(destroy_calls(token), 1);

        // Stale token is reported, and still counted
        assert_eq!(MockWindow::destroy(token), Err(NativeError::UnknownToken(token)));
        assert_eq!(destroy_calls(token), 2);
    }

    #[test]
    fn test_token_keeps_slot_version() {
        let token = create(MockTexture::KIND);
        assert_eq!(usize::try_from(key_of(token).data().as_ffi()).unwrap(), token.as_raw());
        assert!(MockTexture::destroy(token).is_ok());

        // The slot is reused with a new version, so the old token stays stale
        let reused = create(MockTexture::KIND);
        assert_ne!(reused, token);
        assert!(!is_alive(token));
        assert!(is_alive(reused));

        // Keys wider than a native token never truncate into a live one
        let wide = u64::MAX;
        assert_eq!(token_from_ffi(wide).is_valid(), usize::try_from(wide).is_ok());
        assert_eq!(token_from_ffi(0), RawToken::INVALID);
    }

    #[test]
    fn test_texture_dimensions() {
        assert_eq!(create_texture(0, 64), RawToken::INVALID);
        assert_eq!(create_texture(64, MAX_TEXTURE_SIZE + 1), RawToken::INVALID);

        let token = create_texture(64, 64);
        assert!(is_alive(token));
        assert!(MockTexture::destroy(token).is_ok());
    }

    #[test]
    fn test_kind_mismatch() {
        let token = create_sound(&[0, 1, 2]);
        assert_eq!(
            MockTexture::destroy(token),
            Err(NativeError::Failed { kind: "Texture", code: KIND_MISMATCH })
        );
        assert!(is_alive(token));
        assert!(MockSound::destroy(token).is_ok());
    }

    #[test]
    fn test_injected_failure_keeps_object() {
        let token = create(MockTexture::KIND);
        fail_destroy(token, 7);

        assert_eq!(
            MockTexture::destroy(token),
            Err(NativeError::Failed { kind: "Texture", code: 7 })
        );
        assert!(is_alive(token));
    }

    #[test]
    fn test_glyph_texture_is_stable() {
        let first = glyph_texture();
        assert_eq!(glyph_texture(), first);
        assert!(is_alive(first));
    }
}
