//! Register level access to the FM chip.

use opl2_emulator::Chip;
use sound_traits::Instrument;

/// Key-on, block and frequency high bits of channel 0
pub(crate) const REG_FREQ_HIGH: u8 = 0xb0;
/// Frequency low bits of channel 0
pub(crate) const REG_FREQ_LOW: u8 = 0xa0;
/// Rhythm mode and percussion key bits
pub(crate) const REG_EFFECTS: u8 = 0xbd;

const REG_CHAR: u8 = 0x20;
const REG_SCALE: u8 = 0x40;
const REG_ATTACK: u8 = 0x60;
const REG_SUS: u8 = 0x80;
const REG_WAVE: u8 = 0xe0;

/// Operator slots of the effects channel
const FX_MODULATOR: u8 = 0;
const FX_CARRIER: u8 = 3;

/// An FM synthesis core driven by register writes
pub trait OplChip: Send {
    fn write(&mut self, reg: u8, val: u8);

    /// Overwrite `out` with the next samples
    fn generate(&mut self, out: &mut [i16]);
}

impl OplChip for Chip {
    fn write(&mut self, reg: u8, val: u8) {
        self.write_reg(reg as u32, val);
    }

    fn generate(&mut self, out: &mut [i16]) {
        Chip::generate(self, out);
    }
}

/// The chip as the sound driver sees it. Writes reach the chip one at a time
/// in the order issued.
pub struct AdLib<C> {
    chip: C,
    quiet_fx: bool,
}

impl<C: OplChip> AdLib<C> {
    /// `quiet_fx` lowers the carrier level of every effect instrument
    pub fn new(chip: C, quiet_fx: bool) -> Self {
        Self { chip, quiet_fx }
    }

    pub fn chip(&self) -> &C {
        &self.chip
    }

    pub fn chip_mut(&mut self) -> &mut C {
        &mut self.chip
    }

    #[inline]
    pub fn out(&mut self, reg: u8, val: u8) {
        self.chip.write(reg, val);
    }

    pub fn generate(&mut self, out: &mut [i16]) {
        self.chip.generate(out);
    }

    /// Program the effects channel with `inst`
    pub fn set_fx_instrument(&mut self, inst: &Instrument) {
        let m = FX_MODULATOR;
        let c = FX_CARRIER;
        self.out(m + REG_CHAR, inst.m_char);
        self.out(m + REG_SCALE, inst.m_scale);
        self.out(m + REG_ATTACK, inst.m_attack);
        self.out(m + REG_SUS, inst.m_sus);
        self.out(m + REG_WAVE, inst.m_wave);

        self.out(c + REG_CHAR, inst.c_char);
        let scale = if self.quiet_fx {
            quieten(inst.c_scale)
        } else {
            inst.c_scale
        };
        self.out(c + REG_SCALE, scale);
        self.out(c + REG_ATTACK, inst.c_attack);
        self.out(c + REG_SUS, inst.c_sus);
        self.out(c + REG_WAVE, inst.c_wave);
    }

    /// Probe for the chip and put it in a known state. The probe has no
    /// status register to read back from, so the chip is always found.
    pub fn detect(&mut self) -> bool {
        // Reset both timers, then the IRQ flag
        self.out(4, 0x60);
        self.out(4, 0x80);
        self.out(2, 0xff);
        // Start timer 1
        self.out(4, 0x21);
        self.out(4, 0x60);
        self.out(4, 0x80);

        for reg in 1..=0xf5 {
            self.out(reg, 0);
        }
        // Waveform select enable
        self.out(1, 0x20);
        // CSM off
        self.out(8, 0);
        true
    }

    pub fn start(&mut self) {
        self.out(REG_EFFECTS, 0);
        self.set_fx_instrument(&Instrument::ZERO);
    }

    pub fn shut(&mut self) {
        self.out(REG_EFFECTS, 0);
        self.out(REG_FREQ_HIGH, 0);
        self.set_fx_instrument(&Instrument::ZERO);
    }

    pub fn clean(&mut self) {
        self.out(REG_EFFECTS, 0);
        for reg in 1..0xf5 {
            self.out(reg, 0);
        }
    }
}

/// Scale the attenuation headroom of a carrier down to three quarters
fn quieten(scale: u8) -> u8 {
    let c = 0x3f - (scale & 0x3f);
    let c = (c >> 1) + (c >> 2);
    (scale & 0xc0) | (0x3f - c)
}
