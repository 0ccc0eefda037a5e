use std::sync::Arc;

use log::debug;

use crate::{AudioError, EffectKind, SoundEffect, SoundId, SoundMode};

/// Loaded effects, one table per effects device, indexed by `SoundId`
#[derive(Debug, Default)]
pub struct SoundCache {
    pc: Vec<Option<Arc<SoundEffect>>>,
    adlib: Vec<Option<Arc<SoundEffect>>>,
}

impl SoundCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `sfx` in the table for its kind, replacing any effect with the
    /// same id
    pub fn insert(&mut self, sfx: SoundEffect) -> Arc<SoundEffect> {
        let table = match sfx.kind() {
            EffectKind::Tone => &mut self.pc,
            EffectKind::Fm { .. } => &mut self.adlib,
        };
        let index = sfx.id().0 as usize;
        if table.len() <= index {
            table.resize(index + 1, None);
        }
        let sfx = Arc::new(sfx);
        table[index] = Some(Arc::clone(&sfx));
        sfx
    }

    pub fn load_pc_chunk(
        &mut self,
        id: SoundId,
        chunk: &[u8],
    ) -> Result<Arc<SoundEffect>, AudioError> {
        let sfx = SoundEffect::from_pc_chunk(id, chunk)?;
        debug!("Cached PC sound {id}, {} ticks", sfx.len());
        Ok(self.insert(sfx))
    }

    pub fn load_adlib_chunk(
        &mut self,
        id: SoundId,
        chunk: &[u8],
    ) -> Result<Arc<SoundEffect>, AudioError> {
        let sfx = SoundEffect::from_adlib_chunk(id, chunk)?;
        debug!("Cached AdLib sound {id}, {} ticks", sfx.len());
        Ok(self.insert(sfx))
    }

    /// The variant of `id` for the `mode` device
    pub fn get(&self, id: SoundId, mode: SoundMode) -> Option<&Arc<SoundEffect>> {
        let table = match mode {
            SoundMode::Off => return None,
            SoundMode::PcSpeaker => &self.pc,
            SoundMode::AdLib => &self.adlib,
        };
        table.get(id.0 as usize)?.as_ref()
    }

    /// Number of cached effects over both tables
    pub fn cached(&self) -> usize {
        self.pc.iter().chain(self.adlib.iter()).flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Instrument;

    fn voice() -> Instrument {
        Instrument {
            c_sus: 1,
            ..Instrument::ZERO
        }
    }

    #[test]
    fn variants_are_kept_per_device() {
        let mut cache = SoundCache::new();
        cache.insert(SoundEffect::tone(SoundId(3), 1, vec![5]));
        cache.insert(SoundEffect::fm(SoundId(3), 2, voice(), 1, vec![6]));
        assert_eq!(cache.cached(), 2);
        assert_eq!(cache.get(SoundId(3), SoundMode::PcSpeaker).unwrap().priority(), 1);
        assert_eq!(cache.get(SoundId(3), SoundMode::AdLib).unwrap().priority(), 2);
        assert!(cache.get(SoundId(3), SoundMode::Off).is_none());
        assert!(cache.get(SoundId(0), SoundMode::PcSpeaker).is_none());
        assert!(cache.get(SoundId(99), SoundMode::AdLib).is_none());
    }

    #[test]
    fn insert_replaces_same_id() {
        let mut cache = SoundCache::new();
        cache.insert(SoundEffect::tone(SoundId(0), 1, vec![5]));
        let held = cache.insert(SoundEffect::tone(SoundId(0), 4, vec![6]));
        let got = cache.get(SoundId(0), SoundMode::PcSpeaker).unwrap();
        assert!(Arc::ptr_eq(&held, got));
        assert_eq!(cache.cached(), 1);
    }

    #[test]
    fn chunks_load_into_the_cache() {
        let mut cache = SoundCache::new();
        let chunk = [2, 0, 0, 0, 9, 0, 40, 41];
        let sfx = cache.load_pc_chunk(SoundId(1), &chunk).unwrap();
        assert_eq!(sfx.priority(), 9);
        assert!(cache.get(SoundId(1), SoundMode::PcSpeaker).is_some());
        assert!(cache.load_adlib_chunk(SoundId(2), &chunk).is_err());
        assert_eq!(cache.cached(), 1);
    }
}
