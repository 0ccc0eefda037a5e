//! # Operator Implementation
//!
//! An operator is a phase generator driving a waveform lookup, scaled by an
//! envelope generator. Two of them make up a channel: the modulator, whose
//! output can be fed into the phase of the carrier, and the carrier.

use crate::*;

impl Default for Operator {
    fn default() -> Self {
        Self {
            wave_base: WAVE_BASE_TABLE[0] as usize,
            wave_mask: WAVE_MASK_TABLE[0] as u32,
            wave_start: (WAVE_START_TABLE[0] as u32) << WAVE_SH,
            wave_index: 0,
            wave_add: 0,
            wave_current: 0,
            chan_data: 0,
            freq_mul: 0,
            vibrato: 0,
            sustain_level: ENV_MAX,
            total_level: ENV_MAX,
            current_level: ENV_MAX as u32,
            volume: ENV_MAX,
            attack_add: 0,
            decay_add: 0,
            release_add: 0,
            rate_index: 0,
            rate_zero: EnvelopeState::Off.bit(),
            key_on: 0,
            reg20: 0,
            reg40: 0,
            reg60: 0,
            reg80: 0,
            reg_e0: 0,
            state: EnvelopeState::Off,
            tremolo_mask: 0,
            vib_strength: 0,
            ksr: 0,
        }
    }
}

impl Operator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Current envelope attenuation, `0` is loudest
    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub(crate) fn set_chan_data(&mut self, data: u32) {
        self.chan_data = data;
    }

    fn set_state(&mut self, state: EnvelopeState) {
        self.state = state;
    }

    pub(crate) fn update_attenuation(&mut self) {
        let ksl_base = (self.chan_data >> SHIFT_KSLBASE) & 0xff;
        let tl = (self.reg40 & 0x3f) as i32;
        let ksl_shift = KSL_SHIFT_TABLE[(self.reg40 >> 6) as usize];
        self.total_level = tl << (ENV_BITS - 7);
        self.total_level += ((ksl_base << ENV_EXTRA) >> ksl_shift) as i32;
    }

    pub(crate) fn update_frequency(&mut self) {
        let freq = self.chan_data & ((1 << 10) - 1);
        let block = (self.chan_data >> 10) & 0xff;
        self.wave_add = (freq << block).wrapping_mul(self.freq_mul);
        if self.reg20 & MASK_VIBRATO != 0 {
            self.vib_strength = (freq >> 7) as u8;
            self.vibrato = ((self.vib_strength as u32) << block).wrapping_mul(self.freq_mul);
        } else {
            self.vib_strength = 0;
            self.vibrato = 0;
        }
    }

    /// Key scale rate follows the key code, only the top two bits of it unless
    /// KSR is set
    pub(crate) fn update_rates(&mut self, rates: &Rates) {
        let mut new_ksr = ((self.chan_data >> SHIFT_KEYCODE) & 0xff) as u8;
        if self.reg20 & MASK_KSR == 0 {
            new_ksr >>= 2;
        }
        if self.ksr == new_ksr {
            return;
        }
        self.ksr = new_ksr;
        self.update_attack(rates);
        self.update_decay(rates);
        self.update_release(rates);
    }

    fn update_attack(&mut self, rates: &Rates) {
        let rate = self.reg60 >> 4;
        if rate != 0 {
            let val = (rate << 2) + self.ksr;
            self.attack_add = rates.attack_rates[val as usize];
            self.rate_zero &= !EnvelopeState::Attack.bit();
        } else {
            self.attack_add = 0;
            self.rate_zero |= EnvelopeState::Attack.bit();
        }
    }

    fn update_decay(&mut self, rates: &Rates) {
        let rate = self.reg60 & 0xf;
        if rate != 0 {
            let val = (rate << 2) + self.ksr;
            self.decay_add = rates.linear_rates[val as usize];
            self.rate_zero &= !EnvelopeState::Decay.bit();
        } else {
            self.decay_add = 0;
            self.rate_zero |= EnvelopeState::Decay.bit();
        }
    }

    fn update_release(&mut self, rates: &Rates) {
        let rate = self.reg80 & 0xf;
        if rate != 0 {
            let val = (rate << 2) + self.ksr;
            self.release_add = rates.linear_rates[val as usize];
            self.rate_zero &= !EnvelopeState::Release.bit();
            if self.reg20 & MASK_SUSTAIN == 0 {
                self.rate_zero &= !EnvelopeState::Sustain.bit();
            }
        } else {
            self.release_add = 0;
            self.rate_zero |= EnvelopeState::Release.bit();
            if self.reg20 & MASK_SUSTAIN == 0 {
                self.rate_zero |= EnvelopeState::Sustain.bit();
            }
        }
    }

    fn rate_forward(&mut self, add: u32) -> i32 {
        self.rate_index = self.rate_index.wrapping_add(add);
        let ret = (self.rate_index >> RATE_SH) as i32;
        self.rate_index &= RATE_MASK;
        ret
    }

    /// Steps the envelope one sample and returns the attenuation
    fn envelope(&mut self) -> i32 {
        let mut vol = self.volume;
        match self.state {
            EnvelopeState::Off => return ENV_MAX,
            EnvelopeState::Attack => {
                let change = self.rate_forward(self.attack_add);
                if change == 0 {
                    return vol;
                }
                vol += (!vol * change) >> 3;
                if vol < ENV_MIN {
                    self.volume = ENV_MIN;
                    self.rate_index = 0;
                    self.set_state(EnvelopeState::Decay);
                    return ENV_MIN;
                }
            }
            EnvelopeState::Decay => {
                vol += self.rate_forward(self.decay_add);
                if vol >= self.sustain_level {
                    if vol >= ENV_MAX {
                        self.volume = ENV_MAX;
                        self.set_state(EnvelopeState::Off);
                        return ENV_MAX;
                    }
                    self.rate_index = 0;
                    self.set_state(EnvelopeState::Sustain);
                }
            }
            EnvelopeState::Sustain if self.reg20 & MASK_SUSTAIN != 0 => return vol,
            // Not sustaining, so release
            EnvelopeState::Sustain | EnvelopeState::Release => {
                vol += self.rate_forward(self.release_add);
                if vol >= ENV_MAX {
                    self.volume = ENV_MAX;
                    self.set_state(EnvelopeState::Off);
                    return ENV_MAX;
                }
            }
        }
        self.volume = vol;
        vol
    }

    /// An operator is silent when it is inaudible and its current envelope
    /// phase can not change that
    pub(crate) fn silent(&self) -> bool {
        env_silent(self.total_level + self.volume) && self.rate_zero & self.state.bit() != 0
    }

    pub(crate) fn prepare(&mut self, lfo: &Lfo) {
        self.current_level =
            (self.total_level + (lfo.tremolo_value & self.tremolo_mask) as i32) as u32;
        self.wave_current = self.wave_add;
        if self.vib_strength >> lfo.vibrato_shift != 0 {
            let mut add = (self.vibrato >> lfo.vibrato_shift) as i32;
            let neg = lfo.vibrato_sign;
            add = (add ^ neg) - neg;
            self.wave_current = self.wave_current.wrapping_add(add as u32);
        }
    }

    pub(crate) fn key_on(&mut self, mask: u8) {
        if self.key_on == 0 {
            self.wave_index = self.wave_start;
            self.rate_index = 0;
            self.set_state(EnvelopeState::Attack);
        }
        self.key_on |= mask;
    }

    pub(crate) fn key_off(&mut self, mask: u8) {
        self.key_on &= !mask;
        if self.key_on == 0 && self.state != EnvelopeState::Off {
            self.set_state(EnvelopeState::Release);
        }
    }

    #[inline]
    pub(crate) fn forward_volume(&mut self) -> u32 {
        (self.current_level as i32 + self.envelope()) as u32
    }

    #[inline]
    pub(crate) fn forward_wave(&mut self) -> u32 {
        self.wave_index = self.wave_index.wrapping_add(self.wave_current);
        self.wave_index >> WAVE_SH
    }

    #[inline]
    pub(crate) fn wave(&self, index: u32, vol: u32) -> i32 {
        let t = tables();
        let sample = t.wave[self.wave_base + (index & self.wave_mask) as usize] as i32;
        (sample * t.mul[(vol >> ENV_EXTRA) as usize] as i32) >> MUL_SH
    }

    /// One output sample, phase modulated by `modulation`
    #[inline]
    pub(crate) fn sample(&mut self, modulation: i32) -> i32 {
        let vol = self.forward_volume();
        if env_silent(vol as i32) {
            self.wave_index = self.wave_index.wrapping_add(self.wave_current);
            0
        } else {
            let index = self.forward_wave().wrapping_add(modulation as u32);
            self.wave(index, vol)
        }
    }

    /// AM, VIB, EG type, KSR and multiplier
    pub(crate) fn write_20(&mut self, rates: &Rates, val: u8) {
        let change = self.reg20 ^ val;
        if change == 0 {
            return;
        }
        self.reg20 = val;
        // All ones when the tremolo bit is set
        self.tremolo_mask = ((val as i8) >> 7) as u8;
        self.tremolo_mask &= !((1u8 << ENV_EXTRA) - 1);
        if change & MASK_KSR != 0 {
            self.update_rates(rates);
        }
        if self.reg20 & MASK_SUSTAIN != 0 || self.release_add == 0 {
            self.rate_zero |= EnvelopeState::Sustain.bit();
        } else {
            self.rate_zero &= !EnvelopeState::Sustain.bit();
        }
        if change & (0xf | MASK_VIBRATO) != 0 {
            self.freq_mul = rates.freq_mul[(val & 0xf) as usize];
            self.update_frequency();
        }
    }

    /// Key scale level and total level
    pub(crate) fn write_40(&mut self, val: u8) {
        if self.reg40 ^ val == 0 {
            return;
        }
        self.reg40 = val;
        self.update_attenuation();
    }

    /// Attack and decay rates
    pub(crate) fn write_60(&mut self, rates: &Rates, val: u8) {
        let change = self.reg60 ^ val;
        self.reg60 = val;
        if change & 0x0f != 0 {
            self.update_decay(rates);
        }
        if change & 0xf0 != 0 {
            self.update_attack(rates);
        }
    }

    /// Sustain level and release rate
    pub(crate) fn write_80(&mut self, rates: &Rates, val: u8) {
        let change = self.reg80 ^ val;
        if change == 0 {
            return;
        }
        self.reg80 = val;
        let mut sustain = val >> 4;
        // 0xf becomes 0x1f
        sustain |= (sustain + 1) & 0x10;
        self.sustain_level = (sustain as i32) << (ENV_BITS - 5);
        if change & 0x0f != 0 {
            self.update_release(rates);
        }
    }

    /// Waveform select, limited to sine unless register 1 enables the others
    pub(crate) fn write_e0(&mut self, wave_form_mask: u8, val: u8) {
        if self.reg_e0 ^ val == 0 {
            return;
        }
        let wave_form = (val & 0x3 & wave_form_mask) as usize;
        self.reg_e0 = val;
        self.wave_base = WAVE_BASE_TABLE[wave_form] as usize;
        self.wave_start = (WAVE_START_TABLE[wave_form] as u32) << WAVE_SH;
        self.wave_mask = WAVE_MASK_TABLE[wave_form] as u32;
    }
}
