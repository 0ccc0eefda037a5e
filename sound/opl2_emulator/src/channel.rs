//! # Channel Implementation
//!
//! A channel pairs a modulator and a carrier under one frequency number,
//! block and key-on bit. With rhythm mode enabled channels 6 to 8 stop being
//! melodic and their six operators render the five percussion voices.

use crate::*;

impl Default for Channel {
    fn default() -> Self {
        Self {
            op: [Operator::default(), Operator::default()],
            synth: Synth::Fm,
            chan_data: 0,
            old: [0, 0],
            feedback: 31,
            reg_b0: 0,
            reg_c0: 0,
            rhythm_capable: false,
        }
    }
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synth(&self) -> Synth {
        self.synth
    }

    pub fn op(&self, index: usize) -> &Operator {
        &self.op[index & 1]
    }

    /// True while the key-on bit of register `0xB0` is set
    pub fn key_on(&self) -> bool {
        self.reg_b0 & 0x20 != 0
    }

    pub(crate) fn set_rhythm_capable(&mut self, capable: bool) {
        self.rhythm_capable = capable;
    }

    fn set_chan_data(&mut self, rates: &Rates, data: u32) {
        let change = self.chan_data ^ data;
        self.chan_data = data;
        for op in self.op.iter_mut() {
            op.set_chan_data(data);
            op.update_frequency();
        }
        if change & (0xff << SHIFT_KSLBASE) != 0 {
            for op in self.op.iter_mut() {
                op.update_attenuation();
            }
        }
        if change & (0xff << SHIFT_KEYCODE) != 0 {
            for op in self.op.iter_mut() {
                op.update_rates(rates);
            }
        }
    }

    /// Derives key scale level and key code from the frequency number and
    /// block and stores them above the frequency bits of `chan_data`
    fn update_frequency(&mut self, rates: &Rates, reg08: u8) {
        let mut data = self.chan_data & 0xffff;
        let ksl_base = tables().ksl[(data >> 6) as usize] as u32;
        let mut key_code = (data & 0x1c00) >> 9;
        if reg08 & 0x40 != 0 {
            key_code |= (data & 0x100) >> 8;
        } else {
            key_code |= (data & 0x200) >> 9;
        }
        data |= (key_code << SHIFT_KEYCODE) | (ksl_base << SHIFT_KSLBASE);
        self.set_chan_data(rates, data);
    }

    /// Frequency number, low eight bits
    pub(crate) fn write_a0(&mut self, rates: &Rates, reg08: u8, val: u8) {
        let change = (self.chan_data ^ val as u32) & 0xff;
        if change != 0 {
            self.chan_data ^= change;
            self.update_frequency(rates, reg08);
        }
    }

    /// Frequency number high bits, block and key on
    pub(crate) fn write_b0(&mut self, rates: &Rates, reg08: u8, val: u8) {
        let change = (self.chan_data ^ ((val as u32) << 8)) & 0x1f00;
        if change != 0 {
            self.chan_data ^= change;
            self.update_frequency(rates, reg08);
        }
        let key_change = (val ^ self.reg_b0) & 0x20 != 0;
        self.reg_b0 = val;
        if !key_change {
            return;
        }
        if val & 0x20 != 0 {
            self.op[0].key_on(0x1);
            self.op[1].key_on(0x1);
        } else {
            self.op[0].key_off(0x1);
            self.op[1].key_off(0x1);
        }
    }

    /// Feedback and connection
    pub(crate) fn write_c0(&mut self, rhythm: bool, val: u8) {
        if val ^ self.reg_c0 == 0 {
            return;
        }
        self.reg_c0 = val;
        self.feedback = (val >> 1) & 7;
        self.feedback = if self.feedback != 0 {
            // Shift the summed output down to the 10 bit wave index range
            9 - self.feedback
        } else {
            31
        };
        self.update_synth(rhythm);
    }

    pub(crate) fn update_synth(&mut self, rhythm: bool) {
        self.synth = if self.rhythm_capable && rhythm {
            Synth::Percussion
        } else if self.reg_c0 & 1 != 0 {
            Synth::Am
        } else {
            Synth::Fm
        };
    }

    pub(crate) fn key_on_rhythm(&mut self, op: usize, on: bool) {
        if on {
            self.op[op].key_on(0x2);
        } else {
            self.op[op].key_off(0x2);
        }
    }

    /// Feedback is an unsigned shift so a shift of 31 drops all but the sign
    #[inline]
    fn feedback_mod(&self) -> i32 {
        (self.old[0].wrapping_add(self.old[1]) as u32 >> self.feedback) as i32
    }

    /// Adds this channel's output to every sample of `output`
    pub(crate) fn generate(&mut self, lfo: &Lfo, output: &mut [i32]) {
        match self.synth {
            Synth::Am if self.op[0].silent() && self.op[1].silent() => {
                self.old = [0, 0];
                return;
            }
            Synth::Fm if self.op[1].silent() => {
                self.old = [0, 0];
                return;
            }
            _ => {}
        }
        self.op[0].prepare(lfo);
        self.op[1].prepare(lfo);
        for out in output.iter_mut() {
            let modulation = self.feedback_mod();
            self.old[0] = self.old[1];
            self.old[1] = self.op[0].sample(modulation);
            let out0 = self.old[0];
            *out += match self.synth {
                Synth::Am => out0 + self.op[1].sample(0),
                _ => self.op[1].sample(out0),
            };
        }
    }
}

/// Renders bass drum, hi-hat, snare, tom-tom and cymbal from channels 6, 7
/// and 8 into `output`
pub(crate) fn generate_rhythm(
    chans: &mut [Channel],
    lfo: &Lfo,
    noise: &mut Noise,
    output: &mut [i32],
) {
    let [bd, hs, tc] = chans else {
        return;
    };
    for op in bd.op.iter_mut().chain(hs.op.iter_mut()).chain(tc.op.iter_mut()) {
        op.prepare(lfo);
    }

    for out in output.iter_mut() {
        let modulation = bd.feedback_mod();
        bd.old[0] = bd.old[1];
        bd.old[1] = bd.op[0].sample(modulation);
        // In AM mode the bass drum modulator is ignored
        let modulation = if bd.reg_c0 & 1 != 0 { 0 } else { bd.old[0] };
        let mut sample = bd.op[1].sample(modulation);

        let noise_bit = noise.forward() & 1;
        let c2 = hs.op[0].forward_wave();
        let c5 = tc.op[1].forward_wave();
        let phase_bit = if ((c2 & 0x88) ^ ((c2 << 5) & 0x80)) | ((c5 ^ (c5 << 2)) & 0x20) != 0 {
            0x02
        } else {
            0x00
        };

        // Hi-hat
        let hh_vol = hs.op[0].forward_volume();
        if !env_silent(hh_vol as i32) {
            let hh_index = (phase_bit << 8) | (0x34 << (phase_bit ^ (noise_bit << 1)));
            sample += hs.op[0].wave(hh_index, hh_vol);
        }
        // Snare
        let sd_vol = hs.op[1].forward_volume();
        if !env_silent(sd_vol as i32) {
            let sd_index = (0x100 + (c2 & 0x100)) ^ (noise_bit << 8);
            sample += hs.op[1].wave(sd_index, sd_vol);
        }
        // Tom-tom
        sample += tc.op[0].sample(0);
        // Cymbal
        let tc_vol = tc.op[1].forward_volume();
        if !env_silent(tc_vol as i32) {
            let tc_index = (1 + phase_bit) << 8;
            sample += tc.op[1].wave(tc_index, tc_vol);
        }
        *out += sample << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> Rates {
        let mut chip = Chip::new();
        chip.setup(49_716);
        chip.rates
    }

    #[test]
    fn feedback_from_c0() {
        let mut ch = Channel::new();
        ch.write_c0(false, 0x0E);
        assert_eq!(ch.feedback, 2);
        assert_eq!(ch.synth(), Synth::Fm);
        ch.write_c0(false, 0x01);
        assert_eq!(ch.feedback, 31);
        assert_eq!(ch.synth(), Synth::Am);
    }

    #[test]
    fn only_rhythm_channels_turn_percussive() {
        let mut melodic = Channel::new();
        melodic.update_synth(true);
        assert_eq!(melodic.synth(), Synth::Fm);

        let mut drum = Channel::new();
        drum.set_rhythm_capable(true);
        drum.update_synth(true);
        assert_eq!(drum.synth(), Synth::Percussion);
        drum.update_synth(false);
        assert_eq!(drum.synth(), Synth::Fm);
    }

    #[test]
    fn block_and_frequency_land_in_chan_data() {
        let rates = rates();
        let mut ch = Channel::new();
        ch.write_a0(&rates, 0, 0x98);
        ch.write_b0(&rates, 0, 0x31);
        assert_eq!(ch.chan_data & 0x3ff, 0x198);
        assert_eq!((ch.chan_data >> 10) & 7, 4);
        // Key code is block * 2 plus the frequency number's top bit
        assert_eq!(ch.chan_data >> SHIFT_KEYCODE, 8);
        assert!(ch.key_on());
        assert_eq!(ch.op(0).state(), EnvelopeState::Attack);
        assert_eq!(ch.op(1).state(), EnvelopeState::Attack);
    }

    #[test]
    fn key_off_releases_both_operators() {
        let rates = rates();
        let mut ch = Channel::new();
        ch.write_b0(&rates, 0, 0x20);
        ch.write_b0(&rates, 0, 0x00);
        assert!(!ch.key_on());
        assert_eq!(ch.op(0).state(), EnvelopeState::Release);
        assert_eq!(ch.op(1).state(), EnvelopeState::Release);
    }
}
