use argh::FromArgs;

use crate::config::{MusicDevice, SoundDevice};

/// Play sound effect and music chunks on an emulated PC speaker and AdLib.
/// With no chunks given a short demo plays.
#[derive(Debug, Clone, FromArgs)]
pub struct CLIOptions {
    /// verbose level: off, error, warn, info, debug, trace
    #[argh(option)]
    pub verbose: Option<log::LevelFilter>,
    /// sound effects device <auto, off, pc, adlib>
    #[argh(option)]
    pub sound_mode: Option<SoundDevice>,
    /// music device <auto, off, adlib>
    #[argh(option)]
    pub music_mode: Option<MusicDevice>,
    /// play AdLib effects quieter so they sit under the music
    #[argh(option)]
    pub quiet_sfx: Option<bool>,
    /// look for an AdLib. Without one only the PC speaker is available
    #[argh(option)]
    pub adlib_check: Option<bool>,
    /// output sample rate in Hz
    #[argh(option, default = "0")]
    pub rate: u32,
    /// sound effect chunk to play, may be given more than once
    #[argh(option)]
    pub sfx: Vec<String>,
    /// music chunk to play
    #[argh(option)]
    pub music: Option<String>,
    /// how long to play music for, in seconds
    #[argh(option, default = "5")]
    pub seconds: u64,
}
