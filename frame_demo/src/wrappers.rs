//! Thin proxies over mock native objects.
//!
//! Each wrapper holds exactly one `NativeHandle` and forwards to the native
//! library. None of them implement `Drop`: the handle releases the object.

use mediabind::mock::{self, MockSound, MockTexture};
use mediabind::{HandleError, NativeHandle, NativeObject, RawToken};

/// GPU texture
#[derive(Debug)]
pub struct Texture {
    handle: NativeHandle<MockTexture>,
    size: (u32, u32),
}

impl Texture {
    /// Allocate a texture of the given size
    pub fn new(width: u32, height: u32) -> Result<Self, HandleError> {
        let handle = NativeHandle::acquire(|| mock::create_texture(width, height))?
            .with_owner_label("Texture");
        Ok(Self {
            handle,
            size: (width, height),
        })
    }

    /// Texture size in pixels
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Free the texture now instead of waiting for drop
    pub fn dispose(&mut self) {
        self.handle.release_now();
    }
}

impl NativeObject for Texture {
    type Resource = MockTexture;

    fn native_handle(&self) -> &NativeHandle<MockTexture> {
        &self.handle
    }
}

/// Audio sample buffer
#[derive(Debug)]
pub struct SoundBuffer {
    handle: NativeHandle<MockSound>,
    sample_count: usize,
}

impl SoundBuffer {
    /// Upload samples to the audio device
    pub fn from_samples(samples: &[i16]) -> Result<Self, HandleError> {
        let handle = NativeHandle::acquire(|| mock::create_sound(samples))?
            .with_owner_label("SoundBuffer");
        Ok(Self {
            handle,
            sample_count: samples.len(),
        })
    }

    /// Number of samples uploaded
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}

impl NativeObject for SoundBuffer {
    type Resource = MockSound;

    fn native_handle(&self) -> &NativeHandle<MockSound> {
        &self.handle
    }
}

/// Glyph page owned by the font cache; only borrowed here
#[derive(Debug)]
pub struct GlyphPage {
    handle: NativeHandle<MockTexture>,
}

impl GlyphPage {
    /// Borrow the font's current glyph page
    pub fn current() -> Result<Self, HandleError> {
        let handle = NativeHandle::borrowed(mock::glyph_texture())?.with_owner_label("GlyphPage");
        Ok(Self { handle })
    }

    /// Token of the borrowed texture
    pub fn token(&self) -> RawToken {
        self.raw_token()
    }
}

impl NativeObject for GlyphPage {
    type Resource = MockTexture;

    fn native_handle(&self) -> &NativeHandle<MockTexture> {
        &self.handle
    }
}
