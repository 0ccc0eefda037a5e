//! The virtual timer interrupt. The sound service once ran from the PC's
//! timer 0 interrupt at 140 Hz, raised to 560 Hz while music played. Here a
//! tick fires at the start of every "part", a block of output samples as
//! long as one interrupt period.

use crate::PIT_RATE;

/// Tick rate with effects only
pub const EFFECTS_RATE: u32 = 140;
/// Music ticks per effects tick
pub const MUSIC_RATE_MULTIPLIER: u32 = 4;
/// The divisor base the timer was programmed with, slightly off from the PIT
/// clock itself
const DIVISOR_BASE: u32 = 1_192_030;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not started, or shut down
    Idle,
    EffectsOnly,
    MusicActive,
}

/// What one tick services
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    pub music: bool,
    pub effects: bool,
}

pub struct ServiceTimer {
    sample_rate: u32,
    armed: bool,
    music_active: bool,
    samples_per_part: usize,
    count: u32,
}

impl ServiceTimer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            armed: false,
            music_active: false,
            samples_per_part: samples_per_part(sample_rate, EFFECTS_RATE),
            count: 0,
        }
    }

    pub fn state(&self) -> TimerState {
        match (self.armed, self.music_active) {
            (false, _) => TimerState::Idle,
            (true, false) => TimerState::EffectsOnly,
            (true, true) => TimerState::MusicActive,
        }
    }

    /// Ticks per second
    pub fn rate(&self) -> u32 {
        if self.music_active {
            EFFECTS_RATE * MUSIC_RATE_MULTIPLIER
        } else {
            EFFECTS_RATE
        }
    }

    pub fn samples_per_part(&self) -> usize {
        self.samples_per_part
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Switch between the effects and music rates. Entering the music rate
    /// restarts the effects divider.
    pub fn set_music_active(&mut self, active: bool) {
        if active && !self.music_active {
            self.count = 0;
        }
        self.music_active = active;
        self.samples_per_part = samples_per_part(self.sample_rate, self.rate());
    }

    /// Advance one tick. At the music rate every tick runs the sequencer and
    /// every fourth also runs the effects.
    pub fn next_tick(&mut self) -> TickPlan {
        match self.state() {
            TimerState::Idle => TickPlan::default(),
            TimerState::EffectsOnly => TickPlan {
                music: false,
                effects: true,
            },
            TimerState::MusicActive => {
                self.count = (self.count + 1) % MUSIC_RATE_MULTIPLIER;
                TickPlan {
                    music: true,
                    effects: self.count == 0,
                }
            }
        }
    }
}

/// Output samples per tick as the PIT would time them: the programmed
/// divisor in PIT clocks converted to samples, truncated
pub fn samples_per_part(sample_rate: u32, rate: u32) -> usize {
    let divisor = (DIVISOR_BASE / rate.max(1)) & 0xffff;
    let samples = divisor as u64 * sample_rate as u64 / PIT_RATE as u64;
    (samples as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_sizes_at_opl_rate() {
        assert_eq!(samples_per_part(49_716, 140), 354);
        assert_eq!(samples_per_part(49_716, 560), 88);
        assert_eq!(samples_per_part(44_100, 140), 314);
        assert_eq!(samples_per_part(1, 560), 1);
    }

    #[test]
    fn idle_until_armed() {
        let mut timer = ServiceTimer::new(49_716);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.next_tick(), TickPlan::default());
        timer.arm();
        assert_eq!(timer.state(), TimerState::EffectsOnly);
        timer.disarm();
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn rate_follows_music() {
        let mut timer = ServiceTimer::new(49_716);
        timer.arm();
        assert_eq!(timer.rate(), 140);
        assert_eq!(timer.samples_per_part(), 354);
        timer.set_music_active(true);
        assert_eq!(timer.state(), TimerState::MusicActive);
        assert_eq!(timer.rate(), 560);
        assert_eq!(timer.samples_per_part(), 88);
        timer.set_music_active(false);
        assert_eq!(timer.samples_per_part(), 354);
    }

    #[test]
    fn effects_every_fourth_music_tick() {
        let mut timer = ServiceTimer::new(49_716);
        timer.arm();
        timer.set_music_active(true);
        let plans: Vec<_> = (0..12).map(|_| timer.next_tick()).collect();
        assert!(plans.iter().all(|p| p.music));
        let effects: Vec<_> = plans.iter().map(|p| p.effects).collect();
        assert_eq!(
            effects,
            [false, false, false, true, false, false, false, true, false, false, false, true]
        );

        timer.set_music_active(false);
        for _ in 0..5 {
            assert_eq!(
                timer.next_tick(),
                TickPlan {
                    music: false,
                    effects: true
                }
            );
        }
    }

    #[test]
    fn divider_restarts_when_music_starts() {
        let mut timer = ServiceTimer::new(49_716);
        timer.arm();
        timer.set_music_active(true);
        timer.next_tick();
        timer.next_tick();
        timer.set_music_active(false);
        timer.set_music_active(true);
        let effects: Vec<_> = (0..4).map(|_| timer.next_tick().effects).collect();
        assert_eq!(effects, [false, false, false, true]);
    }
}
