//! Sound effect playback with priority arbitration. One effect sounds at a
//! time; the effects device decides whether it is a speaker tone or an FM
//! note on channel 0.

use std::sync::Arc;

use log::debug;
use sound_traits::{EffectKind, SoundEffect, SoundId, SoundMode};

use crate::{
    adlib::{AdLib, OplChip, REG_FREQ_HIGH, REG_FREQ_LOW},
    speaker::PcSpeaker,
};

/// Key-on bit of register `0xB0`
const KEY_ON: u8 = 0x20;

/// One unit taken from an effect
#[derive(Debug, Clone, Copy)]
struct Unit {
    value: u8,
    changed: bool,
    last: bool,
}

/// Cursor over the effect playing on one device. The effect is only released
/// from the control thread; running out just clears `active`.
#[derive(Default)]
struct EffectChannel {
    effect: Option<Arc<SoundEffect>>,
    cursor: usize,
    active: bool,
    last_value: Option<u8>,
}

impl EffectChannel {
    fn start(&mut self, sfx: &Arc<SoundEffect>) {
        self.effect = Some(Arc::clone(sfx));
        self.cursor = 0;
        self.active = true;
        // Forces the first unit through
        self.last_value = None;
    }

    fn stop(&mut self) {
        self.active = false;
        self.effect = None;
    }

    fn advance(&mut self) -> Option<Unit> {
        if !self.active {
            return None;
        }
        let effect = self.effect.as_ref()?;
        let Some(&value) = effect.data().get(self.cursor) else {
            self.active = false;
            return None;
        };
        self.cursor += 1;
        let changed = self.last_value != Some(value);
        self.last_value = Some(value);
        let last = self.cursor >= effect.len();
        if last {
            self.active = false;
        }
        Some(Unit {
            value,
            changed,
            last,
        })
    }
}

#[derive(Default)]
pub struct SoundPlayer {
    number: Option<SoundId>,
    priority: u16,
    tone: EffectChannel,
    fm: EffectChannel,
    /// Register `0xB0` value keying the current FM effect on
    fm_block: u8,
}

impl SoundPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Priority of the current effect, `0` when nothing plays
    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// Start `sfx` on the device for `mode` unless a strictly higher
    /// priority effect is playing.
    ///
    /// # Panics
    ///
    /// An effect with no samples, or an FM effect with an instrument that can
    /// not sound, means the audio data was loaded wrong.
    pub fn play<C: OplChip>(
        &mut self,
        sfx: &Arc<SoundEffect>,
        mode: SoundMode,
        speaker: &mut PcSpeaker,
        adlib: &mut AdLib<C>,
    ) -> bool {
        let fits = match (mode, sfx.kind()) {
            (SoundMode::Off, _) => return false,
            (SoundMode::PcSpeaker, EffectKind::Tone) => true,
            (SoundMode::AdLib, EffectKind::Fm { .. }) => true,
            _ => false,
        };
        if !fits {
            debug!("Sound {} can not play on {mode}", sfx.id());
            return false;
        }
        if sfx.is_empty() {
            panic!("play_sound: zero length sound {}", sfx.id());
        }
        if let EffectKind::Fm { instrument, .. } = sfx.kind() {
            if !instrument.is_valid() {
                panic!("play_sound: bad instrument in sound {}", sfx.id());
            }
        }
        if sfx.priority() < self.priority {
            debug!(
                "Sound {} (priority {}) rejected, {:?} has {}",
                sfx.id(),
                sfx.priority(),
                self.number,
                self.priority
            );
            return false;
        }

        self.stop(mode, speaker, adlib);
        match sfx.kind() {
            EffectKind::Tone => self.tone.start(sfx),
            EffectKind::Fm { instrument, block } => {
                self.fm.start(sfx);
                self.fm_block = ((block & 7) << 2) | KEY_ON;
                adlib.set_fx_instrument(instrument);
            }
        }
        self.number = Some(sfx.id());
        self.priority = sfx.priority();
        true
    }

    /// Silence the device for `mode` and forget the current effect
    pub fn stop<C: OplChip>(
        &mut self,
        mode: SoundMode,
        speaker: &mut PcSpeaker,
        adlib: &mut AdLib<C>,
    ) {
        match mode {
            SoundMode::Off => {}
            SoundMode::PcSpeaker => {
                self.tone.stop();
                speaker.off();
            }
            SoundMode::AdLib => {
                self.fm.stop();
                adlib.out(REG_FREQ_HIGH, 0);
            }
        }
        self.number = None;
        self.priority = 0;
    }

    /// Forget every effect without touching the hardware
    pub fn clear(&mut self) {
        self.tone.stop();
        self.fm.stop();
        self.number = None;
        self.priority = 0;
    }

    /// The current effect while its device still plays it
    pub fn playing(&self, mode: SoundMode) -> Option<SoundId> {
        let active = match mode {
            SoundMode::Off => false,
            SoundMode::PcSpeaker => self.tone.active,
            SoundMode::AdLib => self.fm.active,
        };
        if active { self.number } else { None }
    }

    /// Play the next unit of a speaker effect
    pub fn service_tone(&mut self, speaker: &mut PcSpeaker) {
        let Some(unit) = self.tone.advance() else {
            return;
        };
        if unit.changed {
            speaker.set_tone(unit.value);
        }
        if unit.last {
            speaker.off();
            self.number = None;
            self.priority = 0;
        }
    }

    /// Play the next unit of an FM effect
    pub fn service_fm<C: OplChip>(&mut self, adlib: &mut AdLib<C>) {
        let Some(unit) = self.fm.advance() else {
            return;
        };
        if unit.changed {
            if unit.value == 0 {
                adlib.out(REG_FREQ_HIGH, 0);
            } else {
                adlib.out(REG_FREQ_LOW, unit.value);
                adlib.out(REG_FREQ_HIGH, self.fm_block);
            }
        }
        if unit.last {
            adlib.out(REG_FREQ_HIGH, 0);
            self.number = None;
            self.priority = 0;
        }
    }
}
