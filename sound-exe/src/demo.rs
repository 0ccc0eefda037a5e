//! Built-in sounds played when no chunks are given on the command line.

use sound_traits::{Instrument, MusicEvent, MusicTrack, SoundCache, SoundEffect, SoundId};

pub const SWEEP: SoundId = SoundId(0);
pub const CHIME: SoundId = SoundId(1);

/// A falling whistle on the speaker and a bell on the FM chip. Both ids get a
/// speaker and an FM rendition so either effects device has something to play.
pub fn cache_effects(cache: &mut SoundCache) -> Vec<SoundId> {
    let sweep: Vec<u8> = (10..=60).rev().collect();
    cache.insert(SoundEffect::tone(SWEEP, 10, sweep.clone()));
    cache.insert(SoundEffect::fm(SWEEP, 10, chime(), 4, sweep_fnums()));

    let ding: Vec<u8> = [0x30, 0x28, 0x20, 0x18, 0x10, 0x0c].repeat(6);
    cache.insert(SoundEffect::tone(CHIME, 20, ding));
    let mut bell = vec![0x81; 40];
    bell.extend([0; 8]);
    cache.insert(SoundEffect::fm(CHIME, 20, chime(), 5, bell));

    vec![SWEEP, CHIME]
}

fn chime() -> Instrument {
    Instrument {
        m_char: 0x07,
        c_char: 0x01,
        m_scale: 0x1a,
        c_scale: 0x00,
        m_attack: 0xf4,
        c_attack: 0xf2,
        m_sus: 0x25,
        c_sus: 0x34,
        ..Instrument::ZERO
    }
}

fn sweep_fnums() -> Vec<u8> {
    (0..51).map(|i| 0xf0 - i * 3).collect()
}

/// Channel 1 settings, then a pentatonic phrase at block 4
pub fn tune() -> MusicTrack {
    const C: u16 = 0x159;
    const D: u16 = 0x183;
    const E: u16 = 0x1b3;
    const G: u16 = 0x205;
    const A: u16 = 0x244;

    let mut events = vec![
        MusicEvent::new(0x21, 0x01, 0),
        MusicEvent::new(0x24, 0x01, 0),
        MusicEvent::new(0x41, 0x10, 0),
        MusicEvent::new(0x44, 0x00, 0),
        MusicEvent::new(0x61, 0xf2, 0),
        MusicEvent::new(0x64, 0xf3, 0),
        MusicEvent::new(0x81, 0x57, 0),
        MusicEvent::new(0x84, 0x57, 0),
        MusicEvent::new(0xc1, 0x06, 0),
    ];
    for fnum in [C, D, E, G, A, G, E, D] {
        let lo = (fnum & 0xff) as u8;
        let hi = (fnum >> 8) as u8 & 3;
        events.push(MusicEvent::new(0xa1, lo, 0));
        events.push(MusicEvent::new(0xb1, 0x30 | hi, 140));
        events.push(MusicEvent::new(0xb1, 0x10 | hi, 28));
    }
    MusicTrack::compose(&events)
}
