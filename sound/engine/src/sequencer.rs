//! Music playback. A track is a list of register writes, each followed by
//! the number of ticks to wait before the next. Tracks loop forever.

use sound_traits::MusicTrack;

use crate::adlib::{AdLib, OplChip, REG_EFFECTS, REG_FREQ_HIGH};

/// Music owns the melodic channels above the effects channel
const MUSIC_CHANNELS: u8 = 8;

#[derive(Default)]
pub struct Sequencer {
    track: Option<MusicTrack>,
    cursor: usize,
    /// Tick at which the event under the cursor is due
    next_time: u32,
    time_count: u32,
    active: bool,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.active
    }

    /// Silence whatever played and start `track` from its first event
    pub fn start<C: OplChip>(&mut self, track: MusicTrack, adlib: &mut AdLib<C>) {
        self.stop(adlib);
        self.track = Some(track);
        self.rewind();
        self.active = true;
    }

    /// Key off every music channel and pause. The position is kept.
    pub fn stop<C: OplChip>(&mut self, adlib: &mut AdLib<C>) {
        adlib.out(REG_EFFECTS, 0);
        for ch in 1..=MUSIC_CHANNELS {
            adlib.out(REG_FREQ_HIGH + ch, 0);
        }
        self.active = false;
    }

    /// Pause without touching the chip
    pub fn pause(&mut self) {
        self.active = false;
    }

    /// Continue the loaded track, if there is one
    pub fn resume(&mut self) {
        self.active = self.track.is_some();
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.next_time = 0;
        self.time_count = 0;
    }

    /// Write every event that is due, then count the tick
    pub fn tick<C: OplChip>(&mut self, adlib: &mut AdLib<C>) {
        if !self.active {
            return;
        }
        let Some(track) = self.track.as_ref() else {
            return;
        };
        while self.next_time <= self.time_count {
            let Some(event) = track.event(self.cursor) else {
                break;
            };
            self.next_time = self.time_count.saturating_add(event.delay as u32);
            adlib.out(event.reg, event.val);
            self.cursor += 1;
        }
        self.time_count += 1;
        if self.cursor >= track.len() {
            self.rewind();
        }
    }
}

#[cfg(test)]
mod tests {
    use sound_traits::MusicEvent;

    use super::*;
    use crate::recorder::Recorder;

    fn adlib() -> AdLib<Recorder> {
        AdLib::new(Recorder::default(), false)
    }

    /// The writes of each of `ticks` ticks
    fn trace(seq: &mut Sequencer, al: &mut AdLib<Recorder>, ticks: usize) -> Vec<Vec<(u8, u8)>> {
        (0..ticks)
            .map(|_| {
                al.chip_mut().writes.clear();
                seq.tick(al);
                al.chip().writes.clone()
            })
            .collect()
    }

    #[test]
    fn delays_schedule_the_next_event() {
        let mut al = adlib();
        let mut seq = Sequencer::new();
        let track = MusicTrack::compose(&[
            MusicEvent::new(0xa1, 1, 2),
            MusicEvent::new(0xa2, 2, 0),
            MusicEvent::new(0xa3, 3, 3),
            MusicEvent::new(0xa4, 4, 1),
        ]);
        seq.start(track, &mut al);
        let t = trace(&mut seq, &mut al, 6);
        assert_eq!(t[0], vec![(0xa1, 1)]);
        assert!(t[1].is_empty());
        assert_eq!(t[2], vec![(0xa2, 2), (0xa3, 3)]);
        assert!(t[3].is_empty());
        assert!(t[4].is_empty());
        // Last event, then the loop restarts on the next tick
        assert_eq!(t[5], vec![(0xa4, 4)]);
        assert_eq!(seq.cursor, 0);
        assert_eq!(seq.time_count, 0);
    }

    #[test]
    fn loops_with_an_identical_trace() {
        let mut al = adlib();
        let mut seq = Sequencer::new();
        let track = MusicTrack::compose(&[
            MusicEvent::new(0x20, 0x01, 1),
            MusicEvent::new(0xa1, 0x44, 3),
            MusicEvent::new(0xb1, 0x31, 2),
            MusicEvent::new(0xb1, 0x11, 5),
        ]);
        seq.start(track, &mut al);
        // One pass is 1 + 3 + 2 + 1 ticks, the last delay is never waited
        let period = 7;
        let t = trace(&mut seq, &mut al, period * 3);
        assert_eq!(t[..period], t[period..2 * period]);
        assert_eq!(t[..period], t[2 * period..]);
        let events: usize = t[..period].iter().map(Vec::len).sum();
        assert_eq!(events, 4);
    }

    #[test]
    fn stop_keys_off_music_channels_and_is_idempotent() {
        let mut al = adlib();
        let mut seq = Sequencer::new();
        seq.start(MusicTrack::compose(&[MusicEvent::new(0xb2, 0x31, 0)]), &mut al);
        seq.tick(&mut al);
        assert_eq!(al.chip().regs[0xb2], 0x31);

        al.chip_mut().writes.clear();
        seq.stop(&mut al);
        let once = al.chip().regs;
        let first = al.chip().writes.clone();
        assert_eq!(
            first,
            vec![
                (0xbd, 0),
                (0xb1, 0),
                (0xb2, 0),
                (0xb3, 0),
                (0xb4, 0),
                (0xb5, 0),
                (0xb6, 0),
                (0xb7, 0),
                (0xb8, 0)
            ]
        );
        seq.stop(&mut al);
        assert_eq!(al.chip().regs, once);
        assert!(!seq.is_playing());
    }

    #[test]
    fn stopped_sequencer_writes_nothing() {
        let mut al = adlib();
        let mut seq = Sequencer::new();
        seq.tick(&mut al);
        seq.resume();
        assert!(!seq.is_playing());
        seq.start(MusicTrack::compose(&[MusicEvent::new(0xa5, 9, 1)]), &mut al);
        seq.pause();
        al.chip_mut().writes.clear();
        for _ in 0..4 {
            seq.tick(&mut al);
        }
        assert!(al.chip().writes.is_empty());
        seq.resume();
        seq.tick(&mut al);
        assert_eq!(al.chip().writes, vec![(0xa5, 9)]);
    }

    #[test]
    fn empty_track_is_harmless() {
        let mut al = adlib();
        let mut seq = Sequencer::new();
        seq.start(MusicTrack::from_events(Vec::new()), &mut al);
        al.chip_mut().writes.clear();
        seq.tick(&mut al);
        seq.tick(&mut al);
        assert!(al.chip().writes.is_empty());
        assert!(seq.is_playing());
    }
}
