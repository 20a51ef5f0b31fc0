use crate::nes::state::{Persist, StateError, StateReader, StateWriter};

#[rustfmt::skip]
const COUNT_LOOKUP: [u8; 32] = [
    10, 254, 20,  2, 40,  4, 80,  6,
    160,  8, 60, 10, 14, 12, 26, 14,
    12,  16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Channel length counter. Reload writes racing a half-frame clock in the
/// same CPU cycle lose: the decrement has already happened and the write
/// is dropped, which is what the `clocked_this_cycle` latch tracks.
#[derive(Default)]
pub struct LengthCounter {
    enabled: bool,
    halted: bool,
    value: u8,
    clocked_this_cycle: bool,
}

impl LengthCounter {
    pub fn new() -> LengthCounter {
        LengthCounter::default()
    }

    /// Called at the top of every CPU cycle, before any register write of
    /// that cycle can land.
    pub fn begin_cycle(&mut self) {
        self.clocked_this_cycle = false;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.value = 0;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_halt(&mut self, halted: bool) {
        self.halted = halted;
    }

    pub fn load_index(&mut self, index: u8) {
        if !self.enabled {
            return;
        }
        if self.clocked_this_cycle {
            // write and length clock collided; hardware keeps the clock
            return;
        }
        self.value = COUNT_LOOKUP[(index & 0b1_1111) as usize];
    }

    /// Half-frame clock.
    pub fn clock(&mut self) {
        if self.value > 0 && !self.halted {
            self.value -= 1;
            self.clocked_this_cycle = true;
        }
    }

    pub fn output(&self) -> u8 {
        self.value
    }
}

impl Persist for LengthCounter {
    fn save(&self, w: &mut StateWriter) {
        w.push_bool(self.enabled);
        w.push_bool(self.halted);
        w.push_u8(self.value);
        w.push_bool(self.clocked_this_cycle);
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        self.enabled = r.read_bool()?;
        self.halted = r.read_bool()?;
        self.value = r.read_u8()?;
        self.clocked_this_cycle = r.read_bool()?;
        Ok(())
    }
}
