//! # OPL2 Emulator
//!
//! An integer emulation of the Yamaha YM3812 (OPL2) FM synthesis chip as
//! found on the AdLib and Sound Blaster cards.
//!
//! The chip exposes nine two-operator channels, or six channels plus five
//! rhythm voices (bass drum, snare, tom-tom, cymbal and hi-hat) when rhythm
//! mode is enabled through register `0xBD`.
//!
//! ## Architecture
//!
//! - **Chip**: register decoding, the LFO and noise generator, rate tables
//! - **Channel**: frequency/block/key state and the connection of two operators
//! - **Operator**: phase generator, envelope generator and waveform lookup
//!
//! ## Usage
//!
//! ```rust
//! use opl2_emulator::Chip;
//!
//! let mut chip = Chip::new();
//! chip.setup(49_716);
//!
//! chip.write_reg(0x20, 0x01); // modulator: multiplier 1
//! chip.write_reg(0x23, 0x01); // carrier: multiplier 1
//! chip.write_reg(0x40, 0x10); // modulator level
//! chip.write_reg(0x43, 0x00); // carrier level, loudest
//! chip.write_reg(0x60, 0xF0); // attack/decay
//! chip.write_reg(0x63, 0xF0);
//! chip.write_reg(0x80, 0x77); // sustain/release
//! chip.write_reg(0x83, 0x77);
//! chip.write_reg(0xA0, 0x98); // frequency low byte
//! chip.write_reg(0xB0, 0x31); // block 4, key on
//!
//! let mut out = [0i16; 512];
//! chip.generate(&mut out);
//! ```
//!
//! ## Registers
//!
//! | Register | Holds |
//! |----------|-------|
//! | `0x01` | waveform select enable (bit 5) |
//! | `0x08` | keyboard split (bit 6) |
//! | `0x20+op` | tremolo, vibrato, sustain flag, KSR, multiplier |
//! | `0x40+op` | key scale level and total level |
//! | `0x60+op` | attack and decay rates |
//! | `0x80+op` | sustain level and release rate |
//! | `0xA0+ch` | frequency number, low byte |
//! | `0xB0+ch` | key on, block, frequency number high bits |
//! | `0xBD` | LFO depths, rhythm mode, drum keys |
//! | `0xC0+ch` | feedback and connection |
//! | `0xE0+op` | waveform |

use std::f64::consts::PI;
use std::sync::OnceLock;

pub mod channel;
pub mod chip;
pub mod operator;

/// The native sample rate of the chip in Hz (approximately 49.716 kHz)
pub const OPLRATE: f64 = 14318180.0 / 288.0;

/// Number of melodic channels
pub const NUM_CHANNELS: usize = 9;

/// Largest block generated in one pass through the channels
pub const MAX_BLOCK: usize = 512;

const TREMOLO_TABLE: usize = 52;

const WAVE_BITS: u32 = 10;
const WAVE_SH: u32 = 32 - WAVE_BITS;

const LFO_SH: u32 = WAVE_SH - 10;
const LFO_MAX: u32 = 256 << LFO_SH;

const ENV_BITS: u32 = 9;
const ENV_MIN: i32 = 0;
const ENV_EXTRA: u32 = ENV_BITS - 9;
const ENV_MAX: i32 = 511 << ENV_EXTRA;
const ENV_LIMIT: i32 = (12 * 256) >> (3 - ENV_EXTRA);

const RATE_SH: u32 = 24;
const RATE_MASK: u32 = (1 << RATE_SH) - 1;
const MUL_SH: u32 = 16;

const SHIFT_KSLBASE: u32 = 16;
const SHIFT_KEYCODE: u32 = 24;

const MASK_KSR: u8 = 0x10;
const MASK_SUSTAIN: u8 = 0x20;
const MASK_VIBRATO: u8 = 0x40;

/// Envelope generator phase of an operator. The discriminant doubles as the
/// bit index in an operator's `rate_zero` mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Off = 0,
    Release = 1,
    Sustain = 2,
    Decay = 3,
    Attack = 4,
}

impl EnvelopeState {
    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// How the two operators of a channel are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synth {
    /// Modulator output feeds the carrier phase
    Fm,
    /// Both operators are summed
    Am,
    /// Channels 6 to 8 render the five rhythm voices
    Percussion,
}

/// True once the attenuation is past the audible range
#[inline]
pub(crate) fn env_silent(x: i32) -> bool {
    x >= ENV_LIMIT
}

static KSL_CREATE_TABLE: [u8; 16] = [64, 32, 24, 19, 16, 12, 11, 10, 8, 6, 5, 4, 3, 2, 1, 0];

/// Multipliers times two, so `0.5` is representable
static FREQ_CREATE_TABLE: [u8; 16] = [1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30];

static ATTACK_SAMPLES_TABLE: [u8; 13] = [69, 55, 46, 40, 35, 29, 23, 20, 19, 15, 11, 10, 9];

static ENVELOPE_INCREASE_TABLE: [u8; 13] = [4, 5, 6, 7, 8, 10, 12, 14, 16, 20, 24, 28, 32];

static VIBRATO_TABLE: [i8; 8] = [1, 0, 1, 30, -127, -128, -127, -98];

static KSL_SHIFT_TABLE: [u8; 4] = [31, 1, 2, 0];

static WAVE_BASE_TABLE: [u16; 8] = [0x000, 0x200, 0x200, 0x800, 0xa00, 0xc00, 0x100, 0x400];

static WAVE_MASK_TABLE: [u16; 8] = [1023, 1023, 511, 511, 1023, 1023, 512, 1023];

static WAVE_START_TABLE: [u16; 8] = [512, 0, 0, 0, 0, 512, 512, 256];

pub(crate) struct Tables {
    pub(crate) mul: [u16; 384],
    pub(crate) wave: [i16; 8 * 512],
    pub(crate) ksl: [u8; 8 * 16],
    pub(crate) tremolo: [u8; TREMOLO_TABLE],
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Builds the shared lookup tables. Called by `Chip::new`, and cheap to call
/// again.
pub fn init_tables() {
    tables();
}

pub(crate) fn tables() -> &'static Tables {
    TABLES.get_or_init(|| {
        let mut mul = [0u16; 384];
        for (i, m) in mul.iter_mut().enumerate() {
            let s = (i * 8) as f64;
            *m = (0.5 + 2.0_f64.powf(-1.0 + (255.0 - s) / 256.0) * (1 << MUL_SH) as f64) as u16;
        }

        let mut wave = [0i16; 8 * 512];
        for i in 0..512 {
            let val = (((i as f64 + 0.5) * (PI / 512.0)).sin() * 4084.0) as i16;
            wave[0x200 + i] = val;
            wave[i] = -val;
        }
        for i in 0..256 {
            let s = (i * 8) as f64;
            let val = (0.5 + 2.0_f64.powf(-1.0 + (255.0 - s) / 256.0) * 4085.0) as i16;
            wave[0x700 + i] = val;
            wave[0x6ff - i] = -val;
        }
        for i in 0..256 {
            // Silent gaps between half waves
            wave[0x400 + i] = wave[0];
            wave[0x500 + i] = wave[0];
            wave[0x900 + i] = wave[0];
            wave[0xc00 + i] = wave[0];
            wave[0xd00 + i] = wave[0];
            wave[0x800 + i] = wave[0x200 + i];
            // Double speed sines
            wave[0xa00 + i] = wave[0x200 + i * 2];
            wave[0xb00 + i] = wave[i * 2];
            wave[0xe00 + i] = wave[0x200 + i * 2];
            wave[0xf00 + i] = wave[0x200 + i * 2];
        }

        let mut ksl = [0u8; 8 * 16];
        for oct in 0..8 {
            let base: usize = oct * 8;
            for i in 0..16 {
                let val = base.saturating_sub(KSL_CREATE_TABLE[i] as usize);
                ksl[oct * 16 + i] = (val * 4) as u8;
            }
        }

        let mut tremolo = [0u8; TREMOLO_TABLE];
        for i in 0..TREMOLO_TABLE / 2 {
            let val = (i << ENV_EXTRA) as u8;
            tremolo[i] = val;
            tremolo[TREMOLO_TABLE - 1 - i] = val;
        }

        Tables {
            mul,
            wave,
            ksl,
            tremolo,
        }
    })
}

/// Splits a rate value into an increase table index and a shift
fn envelope_select(val: u8) -> (usize, u32) {
    if val < 13 * 4 {
        // rates 0 - 12
        ((val & 3) as usize, 12 - (val >> 2) as u32)
    } else if val < 15 * 4 {
        // rates 13 - 14
        ((val - 12 * 4) as usize, 0)
    } else {
        (12, 0)
    }
}

/// Rate dependent state shared by every operator, computed once per sample
/// rate in `Chip::setup`.
pub(crate) struct Rates {
    pub(crate) freq_mul: [u32; 16],
    pub(crate) linear_rates: [u32; 76],
    pub(crate) attack_rates: [u32; 76],
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            freq_mul: [0; 16],
            linear_rates: [0; 76],
            attack_rates: [0; 76],
        }
    }
}

/// Per block modulation values the operators sample in `prepare`
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Lfo {
    pub(crate) vibrato_sign: i32,
    pub(crate) vibrato_shift: u8,
    pub(crate) tremolo_value: u8,
}

/// A single FM operator: phase generator, envelope and waveform
#[derive(Debug, Clone)]
pub struct Operator {
    wave_base: usize,
    wave_mask: u32,
    wave_start: u32,
    wave_index: u32,
    wave_add: u32,
    wave_current: u32,
    chan_data: u32,
    freq_mul: u32,
    vibrato: u32,
    sustain_level: i32,
    total_level: i32,
    current_level: u32,
    volume: i32,
    attack_add: u32,
    decay_add: u32,
    release_add: u32,
    rate_index: u32,
    rate_zero: u8,
    key_on: u8,
    reg20: u8,
    reg40: u8,
    reg60: u8,
    reg80: u8,
    reg_e0: u8,
    state: EnvelopeState,
    tremolo_mask: u8,
    vib_strength: u8,
    ksr: u8,
}

/// Two operators with a shared frequency and connection
#[derive(Debug, Clone)]
pub struct Channel {
    op: [Operator; 2],
    synth: Synth,
    chan_data: u32,
    old: [i32; 2],
    feedback: u8,
    reg_b0: u8,
    reg_c0: u8,
    /// Only channels 6 to 8 can become rhythm channels
    rhythm_capable: bool,
}

/// Pseudo random bit source for the hi-hat, snare and cymbal
#[derive(Debug, Clone, Copy)]
pub(crate) struct Noise {
    pub(crate) counter: u32,
    pub(crate) add: u32,
    pub(crate) value: u32,
}

/// The emulated chip
pub struct Chip {
    lfo_counter: u32,
    lfo_add: u32,
    noise: Noise,
    rates: Rates,
    lfo: Lfo,
    chan: [Channel; NUM_CHANNELS],
    reg08: u8,
    reg_bd: u8,
    vibrato_index: u8,
    tremolo_index: u8,
    vibrato_strength: u8,
    tremolo_strength: u8,
    wave_form_mask: u8,
}
