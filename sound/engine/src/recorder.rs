//! A chip stand-in for tests: keeps every register write and emits a
//! constant level.

use crate::OplChip;

pub(crate) struct Recorder {
    pub writes: Vec<(u8, u8)>,
    pub regs: [u8; 256],
    pub level: i16,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            writes: Vec::new(),
            regs: [0; 256],
            level: 100,
        }
    }
}

impl Recorder {
    pub fn writes_to(&self, reg: u8) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl OplChip for Recorder {
    fn write(&mut self, reg: u8, val: u8) {
        self.writes.push((reg, val));
        self.regs[reg as usize] = val;
    }

    fn generate(&mut self, out: &mut [i16]) {
        out.fill(self.level);
    }
}
