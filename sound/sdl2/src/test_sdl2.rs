use std::sync::Arc;
use std::time::Duration;

use sound_engine::EngineConfig;
use sound_traits::{
    Instrument, MusicEvent, MusicMode, MusicTrack, SoundEffect, SoundId, SoundMode, SoundServer,
};

use crate::Snd;

fn chime() -> Arc<SoundEffect> {
    let inst = Instrument {
        m_char: 0x07,
        c_char: 0x01,
        m_scale: 0x1a,
        m_attack: 0xf4,
        c_attack: 0xf2,
        m_sus: 0x25,
        c_sus: 0x34,
        ..Instrument::ZERO
    };
    Arc::new(SoundEffect::fm(SoundId(1), 10, inst, 5, vec![0x81; 70]))
}

#[test]
#[ignore = "SDL2 can only initialise once (and CI doesn't have sound)"]
fn play_speaker_and_fm_effects() {
    let sdl = sdl2::init().unwrap();
    let mut snd = Snd::new(sdl.audio().unwrap(), EngineConfig::default(), None).unwrap();
    snd.set_defaults(None);
    assert_eq!(snd.sound_mode(), SoundMode::AdLib);

    assert!(snd.start_sound(&chime()));
    assert_eq!(snd.sound_playing(), Some(SoundId(1)));
    snd.wait_sound_done();
    assert_eq!(snd.sound_playing(), None);

    assert_eq!(snd.set_sound_mode(SoundMode::PcSpeaker), SoundMode::PcSpeaker);
    let sweep: Vec<u8> = (10..70).rev().collect();
    assert!(snd.start_sound(&Arc::new(SoundEffect::tone(SoundId(2), 1, sweep))));
    snd.wait_sound_done();
    snd.shutdown_sound();
}

#[test]
#[ignore = "SDL2 can only initialise once (and CI doesn't have sound)"]
fn music_loops_until_stopped() {
    let sdl = sdl2::init().unwrap();
    let mut snd = Snd::new(sdl.audio().unwrap(), EngineConfig::default(), Some(1024)).unwrap();
    assert_eq!(snd.set_music_mode(MusicMode::AdLib), MusicMode::AdLib);

    let track = MusicTrack::compose(&[
        MusicEvent::new(0x21, 0x01, 0),
        MusicEvent::new(0x24, 0x01, 0),
        MusicEvent::new(0x44, 0x00, 0),
        MusicEvent::new(0x64, 0xf3, 0),
        MusicEvent::new(0x84, 0x57, 0),
        MusicEvent::new(0xa1, 0x59, 0),
        MusicEvent::new(0xb1, 0x31, 140),
        MusicEvent::new(0xb1, 0x11, 28),
    ]);
    snd.start_music(track);
    assert!(snd.music_playing());
    std::thread::sleep(Duration::from_millis(1500));
    assert!(snd.music_playing());
    snd.stop_music();
    assert!(!snd.music_playing());
    snd.shutdown_sound();
}
