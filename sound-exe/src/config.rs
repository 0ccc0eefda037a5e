//! User configuration options.

use crate::{BASE_DIR, CLIOptions};
use dirs::config_dir;
use log::{error, info, warn};
use nanoserde::{DeRon, SerRon};
use sound_engine::EngineConfig;
use sound_traits::{MusicMode, SoundMode};
use std::{
    fs::{create_dir_all, read_to_string, write},
    io::ErrorKind,
    path::PathBuf,
    str::FromStr,
};

const LOG_TAG: &str = "UserConfig";

fn get_cfg_file() -> Option<PathBuf> {
    let mut dir = config_dir()?;
    dir.push(BASE_DIR);
    if !dir.exists() {
        if let Err(e) = create_dir_all(&dir) {
            error!(target: LOG_TAG, "Couldn't create {:?}: {}", dir, e);
            return None;
        }
    }
    dir.push("user.ron");
    Some(dir)
}

/// Effects device as stored in the config. `Auto` picks by the hardware found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeRon, SerRon)]
pub enum SoundDevice {
    Auto,
    Off,
    PcSpeaker,
    AdLib,
}

impl SoundDevice {
    pub fn mode(self) -> Option<SoundMode> {
        match self {
            Self::Auto => None,
            Self::Off => Some(SoundMode::Off),
            Self::PcSpeaker => Some(SoundMode::PcSpeaker),
            Self::AdLib => Some(SoundMode::AdLib),
        }
    }
}

impl From<SoundMode> for SoundDevice {
    fn from(mode: SoundMode) -> Self {
        match mode {
            SoundMode::Off => Self::Off,
            SoundMode::PcSpeaker => Self::PcSpeaker,
            SoundMode::AdLib => Self::AdLib,
        }
    }
}

impl FromStr for SoundDevice {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<SoundMode>().map(Self::from)
    }
}

/// Music device as stored in the config. `Auto` picks by the hardware found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeRon, SerRon)]
pub enum MusicDevice {
    Auto,
    Off,
    AdLib,
}

impl MusicDevice {
    pub fn mode(self) -> Option<MusicMode> {
        match self {
            Self::Auto => None,
            Self::Off => Some(MusicMode::Off),
            Self::AdLib => Some(MusicMode::AdLib),
        }
    }
}

impl From<MusicMode> for MusicDevice {
    fn from(mode: MusicMode) -> Self {
        match mode {
            MusicMode::Off => Self::Off,
            MusicMode::AdLib => Self::AdLib,
        }
    }
}

impl FromStr for MusicDevice {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<MusicMode>().map(Self::from)
    }
}

#[derive(Debug, Clone, PartialEq, DeRon, SerRon)]
pub struct UserConfig {
    pub sound_mode: SoundDevice,
    pub music_mode: MusicDevice,
    pub quiet_sfx: bool,
    pub adlib_check: bool,
    pub sample_rate: u32,
    pub buffer_size: u16,
}

impl Default for UserConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            sound_mode: SoundDevice::Auto,
            music_mode: MusicDevice::Auto,
            quiet_sfx: engine.quiet_fm_effects,
            adlib_check: engine.adlib_check,
            sample_rate: engine.sample_rate,
            buffer_size: sound_sdl2::DEFAULT_BUFFER,
        }
    }
}

impl UserConfig {
    /// `load` reads the config, or creates a default one if it is missing or
    /// unreadable
    pub fn load() -> Self {
        let Some(path) = get_cfg_file() else {
            warn!(target: LOG_TAG, "No user config dir, using defaults");
            return UserConfig::default();
        };
        match read_to_string(&path) {
            Ok(buf) if !buf.trim().is_empty() => match UserConfig::deserialize_ron(&buf) {
                Ok(data) => {
                    info!(target: LOG_TAG, "Loaded user config file");
                    return data;
                }
                Err(e) => warn!("Could not deserialise {:?} ({}), recreating config", path, e),
            },
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not read {:?}: {}", path, e),
        }
        let config = UserConfig::default();
        config.write();
        info!("Created default user config file");
        config
    }

    pub fn write(&self) {
        let Some(path) = get_cfg_file() else {
            return;
        };
        match write(&path, self.serialize_ron()) {
            Ok(()) => info!(target: LOG_TAG, "Saved user config to {:?}", path),
            Err(err) => error!("Could not write config: {}", err),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sample_rate: self.sample_rate,
            adlib_check: self.adlib_check,
            quiet_fm_effects: self.quiet_sfx,
        }
    }

    /// Sync the CLI options and UserOptions with each other
    pub fn sync_cli(&mut self, cli: &mut CLIOptions) {
        info!(target: LOG_TAG, "Checking CLI options");

        if let Some(mode) = cli.sound_mode {
            if mode != self.sound_mode {
                self.sound_mode = mode;
                info!("Sound mode changed to: {:?}", mode);
            }
        } else {
            cli.sound_mode = Some(self.sound_mode);
        }

        if let Some(mode) = cli.music_mode {
            if mode != self.music_mode {
                self.music_mode = mode;
                info!("Music mode changed to: {:?}", mode);
            }
        } else {
            cli.music_mode = Some(self.music_mode);
        }

        if let Some(f) = cli.quiet_sfx {
            self.quiet_sfx = f;
        } else {
            cli.quiet_sfx = Some(self.quiet_sfx);
        }

        if let Some(f) = cli.adlib_check {
            self.adlib_check = f;
        } else {
            cli.adlib_check = Some(self.adlib_check);
        }

        if cli.rate != 0 && cli.rate != self.sample_rate {
            self.sample_rate = cli.rate;
        } else {
            cli.rate = self.sample_rate;
        }
    }
}

#[cfg(test)]
mod tests {
    use argh::FromArgs;

    use super::*;

    fn cli(args: &[&str]) -> CLIOptions {
        CLIOptions::from_args(&["keen-sound"], args).unwrap()
    }

    #[test]
    fn cli_overrides_config() {
        let mut config = UserConfig::default();
        let mut opts = cli(&["--sound-mode", "pc", "--rate", "44100", "--quiet-sfx", "true"]);
        config.sync_cli(&mut opts);
        assert_eq!(config.sound_mode, SoundDevice::PcSpeaker);
        assert_eq!(config.sample_rate, 44_100);
        assert!(config.quiet_sfx);
        // Unset options take the config's values
        assert_eq!(opts.music_mode, Some(MusicDevice::Auto));
        assert_eq!(opts.adlib_check, Some(true));
    }

    #[test]
    fn devices_parse_auto_and_modes() {
        assert_eq!("Auto".parse::<SoundDevice>().unwrap(), SoundDevice::Auto);
        assert_eq!("adlib".parse::<SoundDevice>().unwrap(), SoundDevice::AdLib);
        assert_eq!("off".parse::<MusicDevice>().unwrap(), MusicDevice::Off);
        assert!("pc".parse::<MusicDevice>().is_err());
        assert_eq!(SoundDevice::Auto.mode(), None);
        assert_eq!(MusicDevice::AdLib.mode(), Some(MusicMode::AdLib));
    }

    #[test]
    fn config_survives_ron() {
        let config = UserConfig {
            sound_mode: SoundDevice::AdLib,
            music_mode: MusicDevice::Off,
            quiet_sfx: true,
            ..UserConfig::default()
        };
        let ron = config.serialize_ron();
        assert_eq!(UserConfig::deserialize_ron(&ron).unwrap(), config);
    }
}
