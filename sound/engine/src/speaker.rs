//! PC speaker emulation. The speaker is a square wave whose half period is
//! counted in timer (PIT) ticks, sampled at the output rate.

use crate::PIT_RATE;

/// Output level of the high half of the wave, kept low enough that mixing
/// with clamped FM output can not overflow
const BEEP_LEVEL: i16 = 8191;
/// PIT ticks per period table step
const PERIOD_STEP: u32 = 60;

pub struct PcSpeaker {
    sample_rate: u32,
    periods: [u32; 256],
    on: bool,
    beep: i16,
    counter: u64,
    bound: u64,
}

impl PcSpeaker {
    pub fn new(sample_rate: u32) -> Self {
        let mut periods = [0; 256];
        for (i, p) in periods.iter_mut().enumerate() {
            *p = i as u32 * PERIOD_STEP;
        }
        Self {
            sample_rate,
            periods,
            on: false,
            beep: 0,
            counter: 0,
            bound: 0,
        }
    }

    /// Sound the period for `value`, or go quiet for `0`. The wave restarts
    /// on its low half.
    pub fn set_tone(&mut self, value: u8) {
        if value == 0 {
            self.off();
            return;
        }
        self.on = true;
        self.beep = 0;
        self.counter = 0;
        self.bound = self.sample_rate as u64 * self.periods[value as usize] as u64;
    }

    pub fn off(&mut self) {
        self.on = false;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Average the wave into `out`
    pub fn mix_into(&mut self, out: &mut [i16]) {
        if !self.on {
            return;
        }
        for s in out.iter_mut() {
            *s = ((*s as i32 + self.beep as i32) / 2) as i16;
            self.counter += 2 * PIT_RATE as u64;
            if self.counter >= self.bound {
                self.counter %= self.bound;
                self.beep = BEEP_LEVEL - self.beep;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_by_default_and_leaves_output_alone() {
        let mut spk = PcSpeaker::new(49_716);
        assert!(!spk.is_on());
        let mut out = [300i16; 16];
        spk.mix_into(&mut out);
        assert_eq!(out, [300; 16]);
    }

    #[test]
    fn half_cycle_length_follows_period() {
        // 44_100 * 600 / (2 * 1_193_182) is a little over 11 samples
        let mut spk = PcSpeaker::new(44_100);
        spk.set_tone(10);
        let mut out = [0i16; 40];
        spk.mix_into(&mut out);
        let first_high = out.iter().position(|&s| s != 0).unwrap();
        assert_eq!(first_high, 12);
        assert_eq!(out[first_high], BEEP_LEVEL / 2);
        assert!(out[first_high..first_high + 11].iter().all(|&s| s == BEEP_LEVEL / 2));
        assert_eq!(out[first_high + 11], 0);
    }

    #[test]
    fn new_tone_restarts_low() {
        let mut spk = PcSpeaker::new(49_716);
        spk.set_tone(1);
        let mut out = [0i16; 8];
        spk.mix_into(&mut out);
        assert!(out.iter().any(|&s| s != 0));
        spk.set_tone(200);
        let mut out = [0i16; 1];
        spk.mix_into(&mut out);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn zero_silences() {
        let mut spk = PcSpeaker::new(49_716);
        spk.set_tone(40);
        assert!(spk.is_on());
        spk.set_tone(0);
        assert!(!spk.is_on());
    }

    #[test]
    fn mixing_averages_with_input() {
        let mut spk = PcSpeaker::new(49_716);
        spk.set_tone(255);
        let mut out = [-8192i16, 8191];
        spk.mix_into(&mut out);
        assert_eq!(out, [-4096, 4095]);
    }
}
