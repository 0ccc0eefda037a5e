use std::fmt::Display;

use crate::AudioError;

/// Index of a sound in the game's audio tables
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SoundId(pub u16);

impl Display for SoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The FM voice of an effect, as stored in the AdLib sound chunks. `m_` bytes
/// go to the modulator, `c_` bytes to the carrier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub m_char: u8,
    pub c_char: u8,
    pub m_scale: u8,
    pub c_scale: u8,
    pub m_attack: u8,
    pub c_attack: u8,
    pub m_sus: u8,
    pub c_sus: u8,
    pub m_wave: u8,
    pub c_wave: u8,
    pub n_conn: u8,
    pub voice: u8,
    pub mode: u8,
}

impl Instrument {
    /// Serialised size, including three bytes of padding
    pub const SIZE: usize = 16;

    /// Silences the effect channel when programmed
    pub const ZERO: Self = Self {
        m_char: 0,
        c_char: 0,
        m_scale: 0,
        c_scale: 0,
        m_attack: 0,
        c_attack: 0,
        m_sus: 0,
        c_sus: 0,
        m_wave: 0,
        c_wave: 0,
        n_conn: 0,
        voice: 0,
        mode: 0,
    };

    pub fn from_bytes(b: &[u8; Self::SIZE]) -> Self {
        Self {
            m_char: b[0],
            c_char: b[1],
            m_scale: b[2],
            c_scale: b[3],
            m_attack: b[4],
            c_attack: b[5],
            m_sus: b[6],
            c_sus: b[7],
            m_wave: b[8],
            c_wave: b[9],
            n_conn: b[10],
            voice: b[11],
            mode: b[12],
        }
    }

    /// An instrument with no sustain/release on either operator can never be
    /// heard and marks a broken asset
    pub fn is_valid(&self) -> bool {
        self.m_sus | self.c_sus != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Each byte indexes the speaker period table, `0` is silence
    Tone,
    /// Each byte is an FM frequency number for the effect channel, `0` keys
    /// the channel off
    Fm { instrument: Instrument, block: u8 },
}

/// A loaded sound effect. Immutable once built, shared with the playback
/// controller through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundEffect {
    id: SoundId,
    priority: u16,
    kind: EffectKind,
    data: Box<[u8]>,
}

/// `length: u32` then `priority: u16`, both little-endian
const COMMON_HEADER: usize = 6;

impl SoundEffect {
    pub fn tone(id: SoundId, priority: u16, data: impl Into<Box<[u8]>>) -> Self {
        Self {
            id,
            priority,
            kind: EffectKind::Tone,
            data: data.into(),
        }
    }

    pub fn fm(
        id: SoundId,
        priority: u16,
        instrument: Instrument,
        block: u8,
        data: impl Into<Box<[u8]>>,
    ) -> Self {
        Self {
            id,
            priority,
            kind: EffectKind::Fm { instrument, block },
            data: data.into(),
        }
    }

    /// Decode a PC speaker chunk: the common header followed by `length`
    /// period bytes
    pub fn from_pc_chunk(id: SoundId, chunk: &[u8]) -> Result<Self, AudioError> {
        let (length, priority) = read_common(chunk)?;
        let data = sample_data(chunk, COMMON_HEADER, length)?;
        Ok(Self::tone(id, priority, data))
    }

    /// Decode an AdLib chunk: the common header, the instrument, the block
    /// byte, then `length` frequency bytes
    pub fn from_adlib_chunk(id: SoundId, chunk: &[u8]) -> Result<Self, AudioError> {
        let (length, priority) = read_common(chunk)?;
        let inst_end = COMMON_HEADER + Instrument::SIZE;
        let Some(inst_bytes) = chunk.get(COMMON_HEADER..inst_end) else {
            return Err(AudioError::Truncated {
                needed: inst_end + 1,
                found: chunk.len(),
            });
        };
        let mut raw = [0u8; Instrument::SIZE];
        raw.copy_from_slice(inst_bytes);
        let instrument = Instrument::from_bytes(&raw);
        if !instrument.is_valid() {
            return Err(AudioError::BadInstrument(id));
        }
        let Some(&block) = chunk.get(inst_end) else {
            return Err(AudioError::Truncated {
                needed: inst_end + 1,
                found: chunk.len(),
            });
        };
        let data = sample_data(chunk, inst_end + 1, length)?;
        Ok(Self::fm(id, priority, instrument, block, data))
    }

    pub fn id(&self) -> SoundId {
        self.id
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn kind(&self) -> &EffectKind {
        &self.kind
    }

    pub fn is_tone(&self) -> bool {
        matches!(self.kind, EffectKind::Tone)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of timer ticks the effect lasts
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn read_common(chunk: &[u8]) -> Result<(usize, u16), AudioError> {
    if chunk.len() < COMMON_HEADER {
        return Err(AudioError::Truncated {
            needed: COMMON_HEADER,
            found: chunk.len(),
        });
    }
    let length = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
    let priority = u16::from_le_bytes([chunk[4], chunk[5]]);
    if length == 0 {
        return Err(AudioError::ZeroLength);
    }
    Ok((length, priority))
}

fn sample_data(chunk: &[u8], start: usize, length: usize) -> Result<Vec<u8>, AudioError> {
    let end = start.saturating_add(length);
    chunk
        .get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or(AudioError::Truncated {
            needed: end,
            found: chunk.len(),
        })
}
