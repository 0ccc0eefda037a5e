//! SDL2 output for the sound engine.
//!
//! The engine is moved into the audio device's callback, which pulls mono
//! 16 bit samples from it. Control calls lock the device, which keeps the
//! callback from running until they return.

use std::sync::Arc;

use log::info;
use sdl2::AudioSubsystem;
use sdl2::audio::{AudioCallback, AudioDevice, AudioDeviceLockGuard, AudioSpecDesired};
use sound_engine::{Chip, EngineConfig, SoundEngine};
use sound_traits::{AudioError, MusicMode, MusicTrack, SoundEffect, SoundId, SoundMode, SoundServer};

#[cfg(test)]
mod test_sdl2;

/// Samples per device buffer if none is asked for
pub const DEFAULT_BUFFER: u16 = 512;

pub struct EngineCallback {
    engine: SoundEngine<Chip>,
}

impl AudioCallback for EngineCallback {
    type Channel = i16;

    fn callback(&mut self, out: &mut [i16]) {
        self.engine.produce(out);
    }
}

pub struct Snd {
    _audio: AudioSubsystem,
    device: AudioDevice<EngineCallback>,
}

impl Snd {
    /// Open the default output device and start the engine on it. The engine
    /// runs at whatever rate the device gives, which may differ from
    /// `config.sample_rate`.
    pub fn new(
        audio: AudioSubsystem,
        config: EngineConfig,
        buffer: Option<u16>,
    ) -> Result<Self, AudioError> {
        let desired = AudioSpecDesired {
            freq: Some(config.sample_rate as i32),
            channels: Some(1),
            samples: Some(buffer.unwrap_or(DEFAULT_BUFFER)),
        };
        let mut device = audio
            .open_playback(None, &desired, |spec| {
                let config = EngineConfig {
                    sample_rate: spec.freq as u32,
                    ..config
                };
                EngineCallback {
                    engine: SoundEngine::with_opl(config),
                }
            })
            .map_err(AudioError::Device)?;

        info!("Using sound driver: {}", audio.current_audio_driver());
        let spec = device.spec();
        info!(
            "Opened audio device at {} Hz, {} channel, {} sample buffer",
            spec.freq, spec.channels, spec.samples
        );
        let rate = device.lock().engine.sample_rate();
        if rate != config.sample_rate {
            info!("Asked for {} Hz, the engine runs at {} Hz", config.sample_rate, rate);
        }
        device.resume();
        Ok(Self {
            _audio: audio,
            device,
        })
    }

    /// Hold the device lock for the life of the guard
    fn engine(&mut self) -> AudioDeviceLockGuard<'_, EngineCallback> {
        self.device.lock()
    }
}

impl SoundServer for Snd {
    fn set_sound_mode(&mut self, mode: SoundMode) -> SoundMode {
        self.engine().engine.set_sound_mode(mode)
    }

    fn sound_mode(&mut self) -> SoundMode {
        self.engine().engine.sound_mode()
    }

    fn set_music_mode(&mut self, mode: MusicMode) -> MusicMode {
        self.engine().engine.set_music_mode(mode)
    }

    fn music_mode(&mut self) -> MusicMode {
        self.engine().engine.music_mode()
    }

    fn set_defaults(&mut self, requested: Option<(SoundMode, MusicMode)>) {
        self.engine().engine.set_defaults(requested);
    }

    fn start_sound(&mut self, sfx: &Arc<SoundEffect>) -> bool {
        self.engine().engine.play_sound(sfx)
    }

    fn stop_sound(&mut self) {
        self.engine().engine.stop_sound();
    }

    fn sound_playing(&mut self) -> Option<SoundId> {
        self.engine().engine.sound_playing()
    }

    fn start_music(&mut self, music: MusicTrack) {
        self.engine().engine.start_music(music);
    }

    fn stop_music(&mut self) {
        self.engine().engine.music_off();
    }

    fn resume_music(&mut self) {
        self.engine().engine.music_on();
    }

    fn fade_out_music(&mut self) {
        self.engine().engine.fade_out_music();
    }

    fn music_playing(&mut self) -> bool {
        self.engine().engine.music_playing()
    }

    fn shutdown_sound(&mut self) {
        info!("Shutdown sound server");
        self.engine().engine.shutdown();
        self.device.pause();
    }
}
