//! # Chip Implementation
//!
//! Register decoding, the LFO, the noise generator and block generation.
//! Register writes take effect immediately and in the order they are made.

use crate::channel::generate_rhythm;
use crate::*;

/// Operator register offsets `0x00..=0x15` map onto channel and operator
/// with gaps at `0x06`, `0x07`, `0x0E` and `0x0F`
fn operator_slot(reg: u32) -> Option<(usize, usize)> {
    let index = (reg & 0x1f) as usize;
    let group = index >> 3;
    let within = index & 7;
    if group > 2 || within > 5 {
        return None;
    }
    Some((group * 3 + within % 3, within / 3))
}

fn channel_slot(reg: u32) -> Option<usize> {
    let index = (reg & 0xf) as usize;
    (index < NUM_CHANNELS).then_some(index)
}

impl Noise {
    /// Advances the generator at the chip rate and returns the current value
    pub(crate) fn forward(&mut self) -> u32 {
        self.counter = self.counter.wrapping_add(self.add);
        let count = self.counter >> LFO_SH;
        self.counter &= (1 << LFO_SH) - 1;
        for _ in 0..count {
            self.value ^= 0x800302 & 0u32.wrapping_sub(self.value & 1);
            self.value >>= 1;
        }
        self.value
    }
}

impl Default for Chip {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip {
    /// A chip with every register cleared. Call `setup` before generating.
    pub fn new() -> Self {
        init_tables();
        let mut chan: [Channel; NUM_CHANNELS] = std::array::from_fn(|_| Channel::default());
        for ch in chan[6..].iter_mut() {
            ch.set_rhythm_capable(true);
        }
        Self {
            lfo_counter: 0,
            lfo_add: 0,
            noise: Noise {
                counter: 0,
                add: 0,
                value: 1,
            },
            rates: Rates::default(),
            lfo: Lfo::default(),
            chan,
            reg08: 0,
            reg_bd: 0,
            vibrato_index: 0,
            tremolo_index: 0,
            vibrato_strength: 0,
            tremolo_strength: 0,
            wave_form_mask: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn channel(&self, index: usize) -> &Channel {
        &self.chan[index]
    }

    /// Last value written to the rhythm register
    #[cfg(test)]
    pub(crate) fn reg_bd(&self) -> u8 {
        self.reg_bd
    }

    /// Builds the rate tables for output at `rate` Hz and clears every
    /// register.
    pub fn setup(&mut self, rate: u32) {
        let scale = OPLRATE / rate.max(1) as f64;

        self.noise.add = (0.5 + scale * (1 << LFO_SH) as f64) as u32;
        self.noise.counter = 0;
        self.noise.value = 1;
        self.lfo_add = (0.5 + scale * (1 << LFO_SH) as f64) as u32;
        self.lfo_counter = 0;
        self.vibrato_index = 0;
        self.tremolo_index = 0;

        // One less than the wave shift, the create table is doubled
        let freq_scale = (0.5 + scale * (1u32 << (WAVE_SH - 1 - 10)) as f64) as u32;
        for (mul, create) in self.rates.freq_mul.iter_mut().zip(FREQ_CREATE_TABLE) {
            *mul = freq_scale * create as u32;
        }

        // Three less since the real envelope takes eight steps per value
        for i in 0..76u8 {
            let (index, shift) = envelope_select(i);
            self.rates.linear_rates[i as usize] = (scale
                * ((ENVELOPE_INCREASE_TABLE[index] as u32) << (RATE_SH + ENV_EXTRA - shift - 3))
                    as f64) as u32;
        }
        for i in 0..62u8 {
            self.rates.attack_rates[i as usize] = best_attack_add(i, scale);
        }
        for i in 62..76 {
            // Instant
            self.rates.attack_rates[i] = 8 << RATE_SH;
        }

        for reg in 0..0x100 {
            self.write_reg(reg, 0xff);
            self.write_reg(reg, 0x00);
        }
    }

    /// Writes `val` to register `reg`. Unmapped registers are ignored.
    pub fn write_reg(&mut self, reg: u32, val: u8) {
        match (reg & 0xf0) >> 4 {
            0x0 => {
                if reg == 0x01 {
                    self.wave_form_mask = if val & 0x20 != 0 { 0x7 } else { 0x0 };
                } else if reg == 0x08 {
                    self.reg08 = val;
                }
            }
            0x2 | 0x3 => {
                if let Some((ch, op)) = operator_slot(reg) {
                    self.chan[ch].op[op].write_20(&self.rates, val);
                }
            }
            0x4 | 0x5 => {
                if let Some((ch, op)) = operator_slot(reg) {
                    self.chan[ch].op[op].write_40(val);
                }
            }
            0x6 | 0x7 => {
                if let Some((ch, op)) = operator_slot(reg) {
                    self.chan[ch].op[op].write_60(&self.rates, val);
                }
            }
            0x8 | 0x9 => {
                if let Some((ch, op)) = operator_slot(reg) {
                    self.chan[ch].op[op].write_80(&self.rates, val);
                }
            }
            0xa => {
                if let Some(ch) = channel_slot(reg) {
                    self.chan[ch].write_a0(&self.rates, self.reg08, val);
                }
            }
            0xb => {
                if reg == 0xbd {
                    self.write_bd(val);
                } else if let Some(ch) = channel_slot(reg) {
                    self.chan[ch].write_b0(&self.rates, self.reg08, val);
                }
            }
            0xc => {
                let rhythm = self.reg_bd & 0x20 != 0;
                if let Some(ch) = channel_slot(reg) {
                    self.chan[ch].write_c0(rhythm, val);
                }
            }
            0xe | 0xf => {
                if let Some((ch, op)) = operator_slot(reg) {
                    self.chan[ch].op[op].write_e0(self.wave_form_mask, val);
                }
            }
            _ => {}
        }
    }

    /// Tremolo and vibrato depth, rhythm mode and the five rhythm key bits
    fn write_bd(&mut self, val: u8) {
        let change = self.reg_bd ^ val;
        if change == 0 {
            return;
        }
        self.reg_bd = val;
        self.vibrato_strength = if val & 0x40 != 0 { 0x00 } else { 0x01 };
        self.tremolo_strength = if val & 0x80 != 0 { 0x00 } else { 0x02 };

        if val & 0x20 != 0 {
            if change & 0x20 != 0 {
                for ch in self.chan[6..].iter_mut() {
                    ch.update_synth(true);
                }
            }
            // Bass drum
            self.chan[6].key_on_rhythm(0, val & 0x10 != 0);
            self.chan[6].key_on_rhythm(1, val & 0x10 != 0);
            // Hi-hat
            self.chan[7].key_on_rhythm(0, val & 0x01 != 0);
            // Snare
            self.chan[7].key_on_rhythm(1, val & 0x08 != 0);
            // Tom-tom
            self.chan[8].key_on_rhythm(0, val & 0x04 != 0);
            // Cymbal
            self.chan[8].key_on_rhythm(1, val & 0x02 != 0);
        } else if change & 0x20 != 0 {
            for ch in self.chan[6..].iter_mut() {
                ch.update_synth(false);
                ch.key_on_rhythm(0, false);
                ch.key_on_rhythm(1, false);
            }
        }
    }

    /// Latches the LFO outputs and returns how many samples can be generated
    /// before they next change, at most `samples`
    fn forward_lfo(&mut self, samples: u32) -> u32 {
        let vibrato = VIBRATO_TABLE[(self.vibrato_index >> 2) as usize];
        self.lfo.vibrato_sign = (vibrato >> 7) as i32;
        self.lfo.vibrato_shift = (vibrato & 7) as u8 + self.vibrato_strength;
        self.lfo.tremolo_value =
            tables().tremolo[self.tremolo_index as usize] >> self.tremolo_strength;

        let todo = LFO_MAX - self.lfo_counter;
        let mut count = todo.div_ceil(self.lfo_add.max(1));
        if count > samples {
            count = samples;
            self.lfo_counter += count * self.lfo_add;
        } else {
            self.lfo_counter += count * self.lfo_add;
            self.lfo_counter &= LFO_MAX - 1;
            self.vibrato_index = (self.vibrato_index + 1) & 31;
            if (self.tremolo_index as usize) + 1 < TREMOLO_TABLE {
                self.tremolo_index += 1;
            } else {
                self.tremolo_index = 0;
            }
        }
        count
    }

    /// Adds the raw output of every channel into `output`, which must hold at
    /// most `MAX_BLOCK` samples
    fn generate_block(&mut self, output: &mut [i32]) {
        let mut done = 0;
        while done < output.len() {
            let samples = self.forward_lfo((output.len() - done) as u32) as usize;
            let block = &mut output[done..done + samples];
            block.fill(0);
            let mut ch = 0;
            while ch < NUM_CHANNELS {
                if self.chan[ch].synth == Synth::Percussion {
                    generate_rhythm(&mut self.chan[ch..], &self.lfo, &mut self.noise, block);
                    break;
                }
                self.chan[ch].generate(&self.lfo, block);
                ch += 1;
            }
            done += samples;
        }
    }

    /// Fills `out` with mono samples clamped to the 14 bit range
    /// `-8192..=8191`, leaving headroom for mixing with other sources.
    pub fn generate(&mut self, out: &mut [i16]) {
        let mut mix = [0i32; MAX_BLOCK];
        for chunk in out.chunks_mut(MAX_BLOCK) {
            let raw = &mut mix[..chunk.len()];
            self.generate_block(raw);
            for (o, &s) in chunk.iter_mut().zip(raw.iter()) {
                *o = s.clamp(-8192, 8191) as i16;
            }
        }
    }
}

/// Searches for the attack increment whose curve takes as many samples as
/// the chip's own attack at rate `i`
fn best_attack_add(i: u8, scale: f64) -> u32 {
    let (index, shift) = envelope_select(i);
    let original = ((((ATTACK_SAMPLES_TABLE[index] as u32) << shift) as f64 / scale) as i32).max(1);
    let mut guess_add =
        (scale * ((ENVELOPE_INCREASE_TABLE[index] as u32) << (RATE_SH - shift - 3)) as f64) as u32;
    let mut best_add = guess_add;
    let mut best_diff = 1u32 << 30;
    for _ in 0..16 {
        let mut volume = ENV_MAX;
        let mut samples = 0i32;
        let mut count = 0u32;
        while volume > 0 && samples < original * 2 {
            count = count.wrapping_add(guess_add);
            let change = (count >> RATE_SH) as i32;
            count &= RATE_MASK;
            if change != 0 {
                volume += (!volume * change) >> 3;
            }
            samples += 1;
        }
        let diff = original - samples;
        let l_diff = diff.unsigned_abs();
        if l_diff < best_diff {
            best_diff = l_diff;
            best_add = guess_add;
            if best_diff == 0 {
                break;
            }
        }
        let correct = (original - diff) as f64 / original as f64;
        guess_add = (guess_add as f64 * correct) as u32;
        if diff < 0 {
            guess_add += 1;
        }
    }
    best_add
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_voice(chip: &mut Chip, ch: u32, slot: u32) {
        chip.write_reg(0x20 + slot, 0x21);
        chip.write_reg(0x23 + slot, 0x21);
        chip.write_reg(0x40 + slot, 0x3f);
        chip.write_reg(0x43 + slot, 0x00);
        chip.write_reg(0x60 + slot, 0xF0);
        chip.write_reg(0x63 + slot, 0xF0);
        chip.write_reg(0x80 + slot, 0x07);
        chip.write_reg(0x83 + slot, 0x07);
        chip.write_reg(0xA0 + ch, 0x98);
        chip.write_reg(0xB0 + ch, 0x31);
    }

    #[test]
    fn operator_slots_follow_register_layout() {
        assert_eq!(operator_slot(0x00), Some((0, 0)));
        assert_eq!(operator_slot(0x03), Some((0, 1)));
        assert_eq!(operator_slot(0x02), Some((2, 0)));
        assert_eq!(operator_slot(0x05), Some((2, 1)));
        assert_eq!(operator_slot(0x08), Some((3, 0)));
        assert_eq!(operator_slot(0x0B), Some((3, 1)));
        assert_eq!(operator_slot(0x12), Some((8, 0)));
        assert_eq!(operator_slot(0x15), Some((8, 1)));
        assert_eq!(operator_slot(0x06), None);
        assert_eq!(operator_slot(0x0F), None);
        assert_eq!(operator_slot(0x16), None);
    }

    #[test]
    fn setup_builds_rates() {
        let mut chip = Chip::new();
        chip.setup(49_716);
        assert!(chip.lfo_add > 0);
        assert!(chip.noise.add > 0);
        assert_eq!(chip.rates.freq_mul[1], 2 * chip.rates.freq_mul[0]);
        assert_eq!(chip.rates.attack_rates[62], 8 << RATE_SH);
        // Faster rates step the envelope more often
        assert!(chip.rates.linear_rates[8] < chip.rates.linear_rates[40]);
        assert!(chip.rates.attack_rates[8] < chip.rates.attack_rates[40]);
    }

    #[test]
    fn silent_after_setup() {
        let mut chip = Chip::new();
        chip.setup(49_716);
        let mut out = [1i16; 1000];
        chip.generate(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn keyed_voice_is_audible_and_clamped() {
        let mut chip = Chip::new();
        chip.setup(49_716);
        sine_voice(&mut chip, 0, 0);
        let mut out = [0i16; 2048];
        chip.generate(&mut out);
        assert!(out.iter().any(|&s| s > 1000));
        assert!(out.iter().any(|&s| s < -1000));
        assert!(out.iter().all(|&s| (-8192..=8191).contains(&s)));
    }

    #[test]
    fn chunking_does_not_change_output() {
        let mut a = Chip::new();
        let mut b = Chip::new();
        for chip in [&mut a, &mut b] {
            chip.setup(49_716);
            sine_voice(chip, 4, 0x09);
        }
        let mut whole = [0i16; 1500];
        a.generate(&mut whole);

        let mut parts = [0i16; 1500];
        let mut offset = 0;
        for len in [1usize, 88, 354, 7, 600, 450] {
            b.generate(&mut parts[offset..offset + len]);
            offset += len;
        }
        assert_eq!(offset, 1500);
        assert_eq!(whole, parts);
    }

    #[test]
    fn key_off_fades_to_silence() {
        let mut chip = Chip::new();
        chip.setup(49_716);
        sine_voice(&mut chip, 2, 0x02);
        let mut out = [0i16; 512];
        chip.generate(&mut out);
        chip.write_reg(0xB2, 0x11);
        assert!(!chip.channel(2).key_on());
        // Release rate 7 is well under a second
        let mut tail = [0i16; 49_716];
        chip.generate(&mut tail);
        assert!(tail[tail.len() - 512..].iter().all(|&s| s == 0));
    }

    #[test]
    fn rhythm_mode_switches_channels() {
        let mut chip = Chip::new();
        chip.setup(49_716);
        chip.write_reg(0xBD, 0x20);
        assert_eq!(chip.reg_bd(), 0x20);
        assert_eq!(chip.channel(5).synth(), Synth::Fm);
        for ch in 6..9 {
            assert_eq!(chip.channel(ch).synth(), Synth::Percussion);
        }
        chip.write_reg(0xBD, 0x00);
        for ch in 6..9 {
            assert_eq!(chip.channel(ch).synth(), Synth::Fm);
        }
    }

    #[test]
    fn bass_drum_sounds() {
        let mut chip = Chip::new();
        chip.setup(49_716);
        chip.write_reg(0x30, 0x01);
        chip.write_reg(0x33, 0x01);
        chip.write_reg(0x53, 0x00);
        chip.write_reg(0x70, 0xF4);
        chip.write_reg(0x73, 0xF4);
        chip.write_reg(0x90, 0x05);
        chip.write_reg(0x93, 0x05);
        chip.write_reg(0xA6, 0x57);
        chip.write_reg(0xB6, 0x09);
        chip.write_reg(0xBD, 0x30);
        let mut out = [0i16; 1024];
        chip.generate(&mut out);
        assert!(out.iter().any(|&s| s != 0));
    }
}
