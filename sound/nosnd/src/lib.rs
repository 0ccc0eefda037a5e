//! A sound server for when no output device could be opened. Every device
//! reports as off and every call is a no-op.

use std::sync::Arc;

use log::{debug, info};
use sound_traits::{MusicMode, MusicTrack, SoundEffect, SoundId, SoundMode, SoundServer};

#[derive(Debug, Default)]
pub struct Snd;

impl Snd {
    pub fn new() -> Self {
        info!("Sound is disabled");
        Self
    }
}

impl SoundServer for Snd {
    fn set_sound_mode(&mut self, mode: SoundMode) -> SoundMode {
        if mode != SoundMode::Off {
            debug!("No sound device for {mode}");
        }
        SoundMode::Off
    }

    fn sound_mode(&mut self) -> SoundMode {
        SoundMode::Off
    }

    fn set_music_mode(&mut self, _: MusicMode) -> MusicMode {
        MusicMode::Off
    }

    fn music_mode(&mut self) -> MusicMode {
        MusicMode::Off
    }

    fn set_defaults(&mut self, _: Option<(SoundMode, MusicMode)>) {}

    fn start_sound(&mut self, _: &Arc<SoundEffect>) -> bool {
        false
    }

    fn stop_sound(&mut self) {}

    fn sound_playing(&mut self) -> Option<SoundId> {
        None
    }

    fn start_music(&mut self, _: MusicTrack) {}

    fn stop_music(&mut self) {}

    fn resume_music(&mut self) {}

    fn fade_out_music(&mut self) {}

    fn music_playing(&mut self) -> bool {
        false
    }

    fn shutdown_sound(&mut self) {
        info!("Shutdown sound server");
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use sound_traits::SoundCache;

    use super::*;

    #[test]
    fn everything_is_off() {
        let mut snd = Snd::new();
        snd.set_defaults(None);
        assert_eq!(snd.set_sound_mode(SoundMode::AdLib), SoundMode::Off);
        assert_eq!(snd.set_music_mode(MusicMode::AdLib), MusicMode::Off);
        let sfx = Arc::new(SoundEffect::tone(SoundId(1), 1, vec![1]));
        assert!(!snd.start_sound(&sfx));
        assert_eq!(snd.sound_playing(), None);
        snd.start_music(MusicTrack::from_events(vec![0xa0, 1, 0, 0]));
        assert!(!snd.music_playing());
        snd.shutdown_sound();
    }

    #[test]
    fn uncached_sound_is_ignored_while_off() {
        let mut snd = Snd::new();
        assert!(!snd.play_sound_id(&SoundCache::new(), SoundId(4)));
    }

    #[test]
    fn wait_returns_at_once() {
        let mut snd = Snd::new();
        let start = Instant::now();
        snd.wait_sound_done();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
