//! The sound driver: speaker tones, FM effects and FM music, serviced from a
//! virtual timer that is driven by the audio output callback.
//!
//! Everything lives in one [`SoundEngine`]. The output device calls
//! [`SoundEngine::produce`] for every buffer it needs; before each part of
//! [`ServiceTimer::samples_per_part`] samples a tick runs the sequencer and
//! the effect player, then the chip renders the part and the speaker is mixed
//! over it. Control calls (`play_sound`, `start_music`, mode changes) must not
//! overlap `produce`, so a backend either owns the engine on one thread or
//! locks the output device around them.
//!
//! ```
//! use std::sync::Arc;
//! use sound_engine::{EngineConfig, SoundEngine};
//! use sound_traits::{SoundEffect, SoundId, SoundMode};
//!
//! let mut engine = SoundEngine::with_opl(EngineConfig::default());
//! engine.set_sound_mode(SoundMode::PcSpeaker);
//! let beep = Arc::new(SoundEffect::tone(SoundId(0), 1, vec![40; 20]));
//! assert!(engine.play_sound(&beep));
//!
//! let mut buf = [0i16; 512];
//! engine.produce(&mut buf);
//! assert_eq!(engine.sound_playing(), Some(SoundId(0)));
//! ```

use std::sync::Arc;

use log::{debug, info};
use sound_traits::{MusicMode, MusicTrack, SoundEffect, SoundId, SoundMode};

mod adlib;
mod playback;
#[cfg(test)]
mod recorder;
mod sequencer;
mod speaker;
mod timer;

pub use adlib::{AdLib, OplChip};
pub use opl2_emulator::Chip;
pub use playback::SoundPlayer;
pub use sequencer::Sequencer;
pub use speaker::PcSpeaker;
pub use timer::{samples_per_part, ServiceTimer, TickPlan, TimerState};

/// Clock of the programmable interval timer that drove the speaker and the
/// service interrupt
pub const PIT_RATE: u32 = 1_193_182;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Output rate in samples per second
    pub sample_rate: u32,
    /// Probe for the FM chip. Without the probe the chip counts as missing.
    pub adlib_check: bool,
    /// Play FM effects quieter so they sit under the music
    pub quiet_fm_effects: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: opl2_emulator::OPLRATE.round() as u32,
            adlib_check: true,
            quiet_fm_effects: false,
        }
    }
}

pub struct SoundEngine<C> {
    adlib: AdLib<C>,
    speaker: PcSpeaker,
    player: SoundPlayer,
    sequencer: Sequencer,
    timer: ServiceTimer,
    sound_mode: SoundMode,
    music_mode: MusicMode,
    adlib_present: bool,
    sample_rate: u32,
    /// Length of the part being rendered, latched when it began
    part_len: usize,
    part_offset: usize,
}

impl SoundEngine<Chip> {
    /// An engine on the emulated OPL2
    pub fn with_opl(config: EngineConfig) -> Self {
        let mut chip = Chip::new();
        chip.setup(config.sample_rate);
        Self::new(chip, config)
    }
}

impl<C: OplChip> SoundEngine<C> {
    /// Start up with both devices off and the timer running
    pub fn new(chip: C, config: EngineConfig) -> Self {
        let mut engine = Self {
            adlib: AdLib::new(chip, config.quiet_fm_effects),
            speaker: PcSpeaker::new(config.sample_rate),
            player: SoundPlayer::new(),
            sequencer: Sequencer::new(),
            timer: ServiceTimer::new(config.sample_rate),
            sound_mode: SoundMode::Off,
            music_mode: MusicMode::Off,
            adlib_present: false,
            sample_rate: config.sample_rate,
            part_len: 0,
            part_offset: 0,
        };
        if config.adlib_check {
            engine.adlib_present = engine.adlib.detect();
        }
        engine.timer.arm();
        info!(
            "Sound engine at {} Hz, AdLib {}",
            config.sample_rate,
            if engine.adlib_present { "present" } else { "not found" }
        );
        engine
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn adlib_present(&self) -> bool {
        self.adlib_present
    }

    pub fn timer(&self) -> &ServiceTimer {
        &self.timer
    }

    pub fn chip(&self) -> &C {
        self.adlib.chip()
    }

    pub fn chip_mut(&mut self) -> &mut C {
        self.adlib.chip_mut()
    }

    /// Priority of the current effect, `0` when none
    pub fn sound_priority(&self) -> u16 {
        self.player.priority()
    }

    pub fn sound_mode(&self) -> SoundMode {
        self.sound_mode
    }

    pub fn music_mode(&self) -> MusicMode {
        self.music_mode
    }

    /// Switch the effects device. Asking for AdLib without the chip gets the
    /// PC speaker instead. Returns the mode now in use.
    pub fn set_sound_mode(&mut self, mode: SoundMode) -> SoundMode {
        self.stop_sound();
        let mode = if mode == SoundMode::AdLib && !self.adlib_present {
            info!("No AdLib for sound effects, using the PC speaker");
            SoundMode::PcSpeaker
        } else {
            mode
        };
        if mode != self.sound_mode {
            self.shut_device();
            self.sound_mode = mode;
            self.start_device();
            info!("Sound effects on {mode}");
        }
        self.update_timer();
        self.sound_mode
    }

    /// Switch the music device, stopping the current track. Asking for AdLib
    /// without the chip turns music off. Returns the mode now in use.
    pub fn set_music_mode(&mut self, mode: MusicMode) -> MusicMode {
        self.fade_out_music();
        let mode = if mode == MusicMode::AdLib && !self.adlib_present {
            info!("No AdLib for music, music is off");
            MusicMode::Off
        } else {
            mode
        };
        if mode != self.music_mode {
            info!("Music on {mode}");
        }
        self.music_mode = mode;
        self.update_timer();
        self.music_mode
    }

    /// Pick the best modes for the hardware found. A `requested` pair, as
    /// read from a config file, is kept where the hardware allows it.
    pub fn set_defaults(&mut self, requested: Option<(SoundMode, MusicMode)>) {
        let sound = match requested {
            Some((SoundMode::AdLib, _)) if !self.adlib_present => None,
            Some((mode, _)) => Some(mode),
            None => None,
        }
        .unwrap_or(if self.adlib_present {
            SoundMode::AdLib
        } else {
            SoundMode::PcSpeaker
        });
        if sound != self.sound_mode {
            self.set_sound_mode(sound);
        }

        let music = match requested {
            Some((_, MusicMode::AdLib)) if !self.adlib_present => None,
            Some((_, mode)) => Some(mode),
            None => None,
        }
        .unwrap_or(if self.adlib_present {
            MusicMode::AdLib
        } else {
            MusicMode::Off
        });
        if music != self.music_mode {
            self.set_music_mode(music);
        }
    }

    /// Play `sfx` on the effects device unless a higher priority effect is
    /// sounding. Returns `true` if it started.
    ///
    /// # Panics
    ///
    /// On an effect with no samples, or an FM effect whose instrument can not
    /// sound.
    pub fn play_sound(&mut self, sfx: &Arc<SoundEffect>) -> bool {
        self.player
            .play(sfx, self.sound_mode, &mut self.speaker, &mut self.adlib)
    }

    pub fn stop_sound(&mut self) {
        self.player
            .stop(self.sound_mode, &mut self.speaker, &mut self.adlib);
    }

    /// The effect still sounding on the current device
    pub fn sound_playing(&self) -> Option<SoundId> {
        self.player.playing(self.sound_mode)
    }

    /// Stop the current track and play `track` from the start. Without an
    /// FM music device the track is ignored.
    pub fn start_music(&mut self, track: MusicTrack) {
        if self.music_mode == MusicMode::AdLib {
            debug!("Starting music, {} events", track.len());
            self.sequencer.start(track, &mut self.adlib);
        } else {
            self.sequencer.pause();
        }
        self.update_timer();
    }

    /// Silence music, keeping the position
    pub fn music_off(&mut self) {
        if self.music_mode == MusicMode::AdLib {
            self.sequencer.stop(&mut self.adlib);
        } else {
            self.sequencer.pause();
        }
        self.update_timer();
    }

    /// Continue the current track
    pub fn music_on(&mut self) {
        if self.music_mode == MusicMode::AdLib {
            self.sequencer.resume();
        }
        self.update_timer();
    }

    /// The chip has no volume ramp, fading out stops at once
    pub fn fade_out_music(&mut self) {
        if self.music_mode == MusicMode::AdLib {
            self.music_off();
        }
    }

    pub fn music_playing(&self) -> bool {
        self.sequencer.is_playing()
    }

    /// Silence everything and stop the timer. `produce` outputs silence from
    /// here on.
    pub fn shutdown(&mut self) {
        self.music_off();
        let fm_in_use = self.sound_mode == SoundMode::AdLib || self.music_mode == MusicMode::AdLib;
        self.shut_device();
        if fm_in_use {
            self.adlib.clean();
        }
        self.music_mode = MusicMode::Off;
        self.timer.disarm();
        info!("Sound engine shut down");
    }

    fn shut_device(&mut self) {
        match self.sound_mode {
            SoundMode::Off => {}
            SoundMode::PcSpeaker => self.speaker.off(),
            SoundMode::AdLib => self.adlib.shut(),
        }
        self.player.clear();
        self.sound_mode = SoundMode::Off;
    }

    fn start_device(&mut self) {
        if self.sound_mode == SoundMode::AdLib {
            self.adlib.start();
        }
        self.player.clear();
    }

    fn update_timer(&mut self) {
        let active = self.music_mode == MusicMode::AdLib && self.sequencer.is_playing();
        self.timer.set_music_active(active);
    }

    /// One timer interrupt
    pub fn service_tick(&mut self) {
        let plan = self.timer.next_tick();
        if plan.music {
            self.sequencer.tick(&mut self.adlib);
        }
        if plan.effects {
            match self.sound_mode {
                SoundMode::Off => {}
                SoundMode::PcSpeaker => self.player.service_tone(&mut self.speaker),
                SoundMode::AdLib => self.player.service_fm(&mut self.adlib),
            }
        }
    }

    /// Fill `out` with the next mono samples, running a tick at every part
    /// boundary. Any length works; a part may span several calls.
    ///
    /// Called from the output device's callback: it must not block, allocate
    /// or log.
    pub fn produce(&mut self, out: &mut [i16]) {
        if self.timer.state() == TimerState::Idle {
            out.fill(0);
            return;
        }
        let mut done = 0;
        while done < out.len() {
            if self.part_offset == 0 {
                self.part_len = self.timer.samples_per_part();
                self.service_tick();
            }
            let left = self
                .part_len
                .checked_sub(self.part_offset)
                .unwrap_or_else(|| {
                    panic!(
                        "part offset {} past part length {}",
                        self.part_offset, self.part_len
                    )
                });
            let n = left.min(out.len() - done);
            let chunk = &mut out[done..done + n];
            self.adlib.generate(chunk);
            self.speaker.mix_into(chunk);

            done += n;
            self.part_offset += n;
            if self.part_offset >= self.part_len {
                self.part_offset = 0;
            }
        }
    }
}
