use std::sync::Arc;

use crate::AudioError;

/// One register write of a music track and the number of timer ticks to wait
/// before the next one
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MusicEvent {
    pub reg: u8,
    pub val: u8,
    pub delay: u16,
}

impl MusicEvent {
    pub const SIZE: usize = 4;

    pub const fn new(reg: u8, val: u8, delay: u16) -> Self {
        Self { reg, val, delay }
    }

    fn from_le(b: &[u8]) -> Self {
        Self {
            reg: b[0],
            val: b[1],
            delay: u16::from_le_bytes([b[2], b[3]]),
        }
    }
}

/// A packed stream of music events. Cloning shares the event buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicTrack {
    events: Arc<[u8]>,
}

impl MusicTrack {
    /// Wraps raw little-endian events. A trailing partial event is dropped.
    pub fn from_events(mut data: Vec<u8>) -> Self {
        data.truncate(data.len() - data.len() % MusicEvent::SIZE);
        Self {
            events: data.into(),
        }
    }

    /// Decode a music chunk: a `u16` byte length followed by the events
    pub fn from_chunk(chunk: &[u8]) -> Result<Self, AudioError> {
        let Some(len) = chunk.get(..2) else {
            return Err(AudioError::Truncated {
                needed: 2,
                found: chunk.len(),
            });
        };
        let len = u16::from_le_bytes([len[0], len[1]]) as usize;
        let Some(data) = chunk.get(2..2 + len) else {
            return Err(AudioError::Truncated {
                needed: 2 + len,
                found: chunk.len(),
            });
        };
        Ok(Self::from_events(data.to_vec()))
    }

    pub fn compose(events: &[MusicEvent]) -> Self {
        let data = events
            .iter()
            .flat_map(|e| {
                let [d0, d1] = e.delay.to_le_bytes();
                [e.reg, e.val, d0, d1]
            })
            .collect();
        Self::from_events(data)
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len() / MusicEvent::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event(&self, index: usize) -> Option<MusicEvent> {
        let start = index.checked_mul(MusicEvent::SIZE)?;
        self.events
            .get(start..start + MusicEvent::SIZE)
            .map(MusicEvent::from_le)
    }

    pub fn events(&self) -> impl Iterator<Item = MusicEvent> + '_ {
        self.events.chunks_exact(MusicEvent::SIZE).map(MusicEvent::from_le)
    }

    /// Every track loops until stopped
    pub fn looping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_little_endian() {
        let track = MusicTrack::from_events(vec![0xa1, 0x44, 0x34, 0x12, 0xb1, 0x31, 0, 0]);
        assert_eq!(track.len(), 2);
        assert_eq!(track.event(0), Some(MusicEvent::new(0xa1, 0x44, 0x1234)));
        assert_eq!(track.event(1), Some(MusicEvent::new(0xb1, 0x31, 0)));
        assert_eq!(track.event(2), None);
    }

    #[test]
    fn partial_event_is_dropped() {
        let track = MusicTrack::from_events(vec![1, 2, 3, 0, 9, 9]);
        assert_eq!(track.len(), 1);
        assert_eq!(track.events().count(), 1);
    }

    #[test]
    fn chunk_length_is_in_bytes() {
        let chunk = [8, 0, 0x20, 1, 2, 0, 0x40, 0x10, 0, 0, 0xee];
        let track = MusicTrack::from_chunk(&chunk).unwrap();
        assert_eq!(
            track.events().collect::<Vec<_>>(),
            vec![MusicEvent::new(0x20, 1, 2), MusicEvent::new(0x40, 0x10, 0)]
        );
        assert!(matches!(
            MusicTrack::from_chunk(&[8, 0, 1]),
            Err(AudioError::Truncated { needed: 10, found: 3 })
        ));
    }

    #[test]
    fn compose_round_trips_and_shares() {
        let events = [MusicEvent::new(0xa0, 0x98, 3), MusicEvent::new(0xb0, 0x31, 300)];
        let track = MusicTrack::compose(&events);
        let other = track.clone();
        assert!(Arc::ptr_eq(&track.events, &other.events));
        assert_eq!(other.events().collect::<Vec<_>>(), events);
        assert!(track.looping());
    }
}
