//! Frame loop demo
//!
//! Simulates a host application on top of the binding layer: every frame
//! allocates textures and sounds, disposes some explicitly, drops some on
//! the main thread, and hands the rest to a reclaimer thread that drops
//! them outside any release context. `end_frame` frees what the reclaimer
//! dropped.
//!
//! Usage: `frame_demo [config.toml|config.ron]`

mod wrappers;

use std::path::Path;
use std::sync::mpsc;
use std::thread;

use rand::Rng;
use thiserror::Error;

use mediabind::config::{Config, ConfigError};
use mediabind::core::BindingConfig;
use mediabind::mock;
use mediabind::{HandleError, NativeRuntime, RuntimeError};

use wrappers::{GlyphPage, SoundBuffer, Texture};

const FRAMES: u64 = 120;
const TEXTURES_PER_FRAME: usize = 6;

#[derive(Error, Debug)]
enum DemoError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Native object error: {0}")]
    Handle(#[from] HandleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Objects shipped to the reclaimer thread
enum Garbage {
    Texture(Texture),
    Sound(SoundBuffer),
}

impl Garbage {
    fn kind(&self) -> &'static str {
        match self {
            Self::Texture(_) => "texture",
            Self::Sound(_) => "sound buffer",
        }
    }
}

fn main() {
    let result = load_config(std::env::args().nth(1)).and_then(|config| {
        init_logging(&config.logging.level);
        run(config)
    });

    if let Err(e) = result {
        log::error!("frame_demo failed: {}", e);
        eprintln!("frame_demo failed: {}", e);
        std::process::exit(1);
    }
}

/// Read the optional config file. The demo installs its own logger, so the
/// runtime is told not to.
fn load_config(path: Option<impl AsRef<Path>>) -> Result<BindingConfig, DemoError> {
    let mut config = match path {
        Some(path) => BindingConfig::load_from_file(path)?,
        None => BindingConfig::default(),
    };
    config.logging.init_logger = false;
    Ok(config)
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

/// Send `garbage` to the reclaimer thread. If the reclaimer is gone the
/// object comes back and is dropped here, on the frame thread.
fn hand_off(sender: &mpsc::Sender<Garbage>, garbage: Garbage) -> bool {
    match sender.send(garbage) {
        Ok(()) => true,
        Err(mpsc::SendError(garbage)) => {
            log::warn!(
                "Reclaimer thread is gone, dropping {} on the frame thread",
                garbage.kind()
            );
            false
        }
    }
}

fn run(config: BindingConfig) -> Result<(), DemoError> {
    let mut runtime = NativeRuntime::new(config)?;

    let (sender, receiver) = mpsc::channel::<Garbage>();
    let reclaimer = thread::Builder::new()
        .name("reclaimer".to_string())
        .spawn(move || {
            let mut dropped = 0usize;
            for garbage in receiver {
                match garbage {
                    Garbage::Texture(texture) => drop(texture),
                    Garbage::Sound(sound) => drop(sound),
                }
                dropped += 1;
            }
            dropped
        })?;

    let mut rng = rand::thread_rng();
    let glyphs = GlyphPage::current()?;
    log::info!("Borrowed glyph page {}", glyphs.token());

    for frame in 0..FRAMES {
        for _ in 0..TEXTURES_PER_FRAME {
            let edge = rng.gen_range(0..=256);
            let mut texture = match Texture::new(edge, edge) {
                Ok(texture) => texture,
                Err(e) => {
                    log::debug!("frame {}: {}", frame, e);
                    continue;
                }
            };
            log::trace!("frame {}: texture {:?}", frame, texture.size());

            match rng.gen_range(0..3) {
                0 => texture.dispose(),
                1 => drop(texture),
                _ => {
                    hand_off(&sender, Garbage::Texture(texture));
                }
            }
        }

        let samples: Vec<i16> = (0..rng.gen_range(0..64)).map(|_| rng.gen()).collect();
        if let Ok(sound) = SoundBuffer::from_samples(&samples) {
            log::trace!("frame {}: {} samples", frame, sound.sample_count());
            hand_off(&sender, Garbage::Sound(sound));
        }

        let report = runtime.end_frame();
        if !report.is_empty() {
            log::debug!(
                "frame {}: released {} deferred objects ({} failed)",
                frame,
                report.released,
                report.failed
            );
        }
    }

    drop(sender);
    let reclaimed = reclaimer.join().unwrap_or_else(|_| {
        log::error!("reclaimer thread panicked");
        0
    });
    drop(glyphs);

    let lifetime = runtime.shutdown();
    log::info!(
        "Reclaimer dropped {} objects; {} deferred releases completed, {} failed",
        reclaimed,
        lifetime.released,
        lifetime.failed
    );
    log::info!("Live native objects at exit: {} (glyph page stays)", mock::live_objects());

    Ok(())
}
