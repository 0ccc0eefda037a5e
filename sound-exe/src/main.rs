//! `keen-sound` opens the audio device, loads effect and music chunks and
//! plays them through the emulated PC speaker and AdLib.

mod cli;
mod config;
mod demo;

use cli::*;
use log::{info, warn};
use mimalloc::MiMalloc;
use simplelog::TermLogger;
use sound_traits::{AudioError, MusicTrack, SoundCache, SoundId, SoundMode, SoundServer};
use std::error::Error;
use std::fs;
use std::thread::sleep;
use std::time::Duration;

use crate::config::UserConfig;

const BASE_DIR: &str = "keen-sound/";

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<(), Box<dyn Error>> {
    let mut options: CLIOptions = argh::from_env();

    TermLogger::init(
        options.verbose.unwrap_or(log::LevelFilter::Info),
        simplelog::ConfigBuilder::default()
            .set_time_level(log::LevelFilter::Trace)
            .build(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let mut user_config = UserConfig::load();
    user_config.sync_cli(&mut options);
    user_config.write();

    let mut snd = open_sound(&user_config);
    apply_modes(snd.as_mut(), &user_config);
    info!(
        "Sound effects on {}, music on {}",
        snd.sound_mode(),
        snd.music_mode()
    );

    let use_demo = options.sfx.is_empty() && options.music.is_none();
    let mut cache = SoundCache::new();
    let effects = if use_demo {
        demo::cache_effects(&mut cache)
    } else {
        load_effects(&mut cache, &options.sfx, snd.sound_mode())?
    };
    info!("{} sound effects cached", cache.cached());
    for id in effects {
        if snd.play_sound_id(&cache, id) {
            snd.wait_sound_done();
        }
    }

    let music = match &options.music {
        Some(path) => Some(MusicTrack::from_chunk(&fs::read(path)?)?),
        None if use_demo => Some(demo::tune()),
        None => None,
    };
    if let Some(track) = music {
        info!("Playing {} music events for {}s", track.len(), options.seconds);
        snd.start_music(track);
        sleep(Duration::from_secs(options.seconds));
        snd.fade_out_music();
    }

    snd.shutdown_sound();
    Ok(())
}

/// The SDL2 server if an output device opens, otherwise the silent one
fn open_sound(config: &UserConfig) -> Box<dyn SoundServer> {
    let snd = sdl2::init()
        .and_then(|sdl| sdl.audio())
        .map_err(AudioError::Device)
        .and_then(|audio| {
            sound_sdl2::Snd::new(audio, config.engine_config(), Some(config.buffer_size))
        });
    match snd {
        Ok(snd) => Box::new(snd),
        Err(e) => {
            warn!("Could not set up sound server: {e}");
            Box::new(sound_nosnd::Snd::new())
        }
    }
}

/// `Auto` devices take the defaults for the hardware found, anything else is
/// requested as given
fn apply_modes(snd: &mut dyn SoundServer, config: &UserConfig) {
    match (config.sound_mode.mode(), config.music_mode.mode()) {
        (Some(sound), Some(music)) => snd.set_defaults(Some((sound, music))),
        (sound, music) => {
            snd.set_defaults(None);
            if let Some(sound) = sound {
                snd.set_sound_mode(sound);
            }
            if let Some(music) = music {
                snd.set_music_mode(music);
            }
        }
    }
}

/// Effect files are read as the chunk format of the current effects device
/// and numbered in the order given
fn load_effects(
    cache: &mut SoundCache,
    files: &[String],
    mode: SoundMode,
) -> Result<Vec<SoundId>, Box<dyn Error>> {
    let mut ids = Vec::with_capacity(files.len());
    for (n, path) in files.iter().enumerate() {
        let id = SoundId(n as u16);
        let chunk = fs::read(path)?;
        match mode {
            SoundMode::PcSpeaker => {
                cache.load_pc_chunk(id, &chunk)?;
            }
            SoundMode::AdLib => {
                cache.load_adlib_chunk(id, &chunk)?;
            }
            SoundMode::Off => {
                warn!("Sound effects are off, skipping {path}");
                continue;
            }
        }
        info!("Loaded {path} as sound {id}");
        ids.push(id);
    }
    Ok(ids)
}
