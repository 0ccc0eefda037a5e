//! Shared types for the sound crates: the effect and music data model, the
//! device modes, and the `SoundServer` control surface every output backend
//! implements.

use std::{
    error::Error,
    fmt::Display,
    str::FromStr,
    sync::Arc,
    thread::sleep,
    time::{Duration, Instant},
};

use log::warn;

mod sounds;
pub use sounds::*;
mod music;
pub use music::*;
mod cache;
pub use cache::*;

/// How long `wait_sound_done` polls before giving up
pub const WAIT_SOUND_LIMIT: Duration = Duration::from_secs(30);
const WAIT_SOUND_POLL: Duration = Duration::from_millis(1);

/// The device sound effects are played on
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SoundMode {
    #[default]
    Off,
    PcSpeaker,
    AdLib,
}

impl FromStr for SoundMode {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "pc" | "speaker" | "pcspeaker" => Ok(Self::PcSpeaker),
            "adlib" | "fm" => Ok(Self::AdLib),
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "Invalid sound mode",
            )),
        }
    }
}

impl Display for SoundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::PcSpeaker => "pc",
            Self::AdLib => "adlib",
        })
    }
}

/// The device music is played on
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MusicMode {
    #[default]
    Off,
    AdLib,
}

impl FromStr for MusicMode {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "adlib" | "fm" => Ok(Self::AdLib),
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "Invalid music mode",
            )),
        }
    }
}

impl Display for MusicMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::AdLib => "adlib",
        })
    }
}

#[derive(Debug)]
pub enum AudioError {
    /// A chunk ended before its declared contents
    Truncated { needed: usize, found: usize },
    /// An effect chunk declaring no samples
    ZeroLength,
    /// An FM effect whose instrument can not sound
    BadInstrument(SoundId),
    /// The output device could not be opened
    Device(String),
}

impl Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { needed, found } => {
                write!(f, "chunk truncated: needed {needed} bytes, found {found}")
            }
            Self::ZeroLength => f.write_str("zero length sound"),
            Self::BadInstrument(id) => write!(f, "bad instrument in sound {id}"),
            Self::Device(e) => write!(f, "audio device: {e}"),
        }
    }
}

impl Error for AudioError {}

/// Control surface of a sound backend. Every call runs on the control thread
/// and completes before returning; none of them blocks except
/// `wait_sound_done`.
pub trait SoundServer {
    /// Select the effects device. Returns the mode actually in use, which
    /// falls back to the PC speaker when FM hardware is missing.
    fn set_sound_mode(&mut self, mode: SoundMode) -> SoundMode;

    fn sound_mode(&mut self) -> SoundMode;

    /// Select the music device. Returns the mode actually in use.
    fn set_music_mode(&mut self, mode: MusicMode) -> MusicMode;

    fn music_mode(&mut self) -> MusicMode;

    /// Pick modes for the detected hardware, honouring `requested` where the
    /// hardware allows it
    fn set_defaults(&mut self, requested: Option<(SoundMode, MusicMode)>);

    /// Play an effect unless one of strictly higher priority is sounding.
    /// Returns `true` if the effect was started.
    fn start_sound(&mut self, sfx: &Arc<SoundEffect>) -> bool;

    /// Play the variant of `id` cached for the current effects device.
    ///
    /// # Panics
    ///
    /// If that variant was never loaded.
    fn play_sound_id(&mut self, cache: &SoundCache, id: SoundId) -> bool {
        let mode = self.sound_mode();
        if mode == SoundMode::Off {
            return false;
        }
        let Some(sfx) = cache.get(id, mode) else {
            panic!("play_sound: uncached sound {id} for {mode}");
        };
        self.start_sound(sfx)
    }

    fn stop_sound(&mut self);

    fn sound_playing(&mut self) -> Option<SoundId>;

    /// Poll until the current effect finishes, giving up after
    /// `WAIT_SOUND_LIMIT`
    fn wait_sound_done(&mut self) {
        let start = Instant::now();
        while let Some(id) = self.sound_playing() {
            if start.elapsed() >= WAIT_SOUND_LIMIT {
                warn!("Gave up waiting for sound {id} to finish");
                return;
            }
            sleep(WAIT_SOUND_POLL);
        }
    }

    /// Start `music` from its beginning, replacing any current track
    fn start_music(&mut self, music: MusicTrack);

    /// Silence and pause the current track
    fn stop_music(&mut self);

    /// Continue a paused track where it stopped
    fn resume_music(&mut self);

    fn fade_out_music(&mut self);

    fn music_playing(&mut self) -> bool;

    /// Stop all sound and release the sound device
    fn shutdown_sound(&mut self);
}
