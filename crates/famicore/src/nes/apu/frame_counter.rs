use crate::nes::config::Region;
use crate::nes::state::{Persist, StateError, StateReader, StateWriter};

/*
   mode 0:    mode 1:       function
   ---------  -----------  -----------------------------
    - - - f    - - - - -    IRQ (if bit 6 is clear)
    - l - l    - l - - l    Length counter and sweep
    e e e e    e e e - e    Envelope and linear counter
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClock {
    None,
    Quarter,
    QuarterAndHalf,
}

impl FrameClock {
    pub fn is_quarter(&self) -> bool {
        matches!(self, FrameClock::Quarter | FrameClock::QuarterAndHalf)
    }

    pub fn is_half(&self) -> bool {
        matches!(self, FrameClock::QuarterAndHalf)
    }
}

/// The shared clock divider. Step boundaries come from a per-region delay
/// table; the two 1-cycle entries at the end of mode 0 are what make the
/// frame IRQ assert on three consecutive CPU cycles.
pub struct FrameCounter {
    region: Region,
    mode: usize, // 0 = 4-step, 1 = 5-step
    step: usize,
    delay: u16,
    irq_inhibit: bool,

    pending_write: Option<u8>,
    write_delay: u8,

    pub frame_irq: bool,
    /// The $4015 read race: an IRQ raised in the same cycle as the read
    /// reports as set but survives the read's clear.
    pub irq_set_this_cycle: bool,
}

impl FrameCounter {
    pub fn new(region: Region) -> FrameCounter {
        FrameCounter {
            region,
            mode: 0,
            step: 0,
            delay: region.frame_counter_steps()[0][0],
            irq_inhibit: false,
            pending_write: None,
            write_delay: 0,
            frame_irq: false,
            irq_set_this_cycle: false,
        }
    }

    pub fn reset(&mut self) {
        *self = FrameCounter::new(self.region);
    }

    /// $4017 write. The mode change lands 3 or 4 cycles later depending on
    /// write parity; IRQ inhibit applies immediately.
    pub fn write(&mut self, value: u8, odd_cycle: bool) {
        self.pending_write = Some(value);
        self.write_delay = if odd_cycle { 3 } else { 4 };

        self.irq_inhibit = value & 0x40 != 0;
        if self.irq_inhibit {
            self.frame_irq = false;
        }
    }

    /// Advance one CPU cycle.
    pub fn clock(&mut self) -> FrameClock {
        self.irq_set_this_cycle = false;
        let mut result = FrameClock::None;

        self.delay -= 1;
        if self.delay == 0 {
            result = self.step_boundary();
        }

        if let Some(value) = self.pending_write {
            self.write_delay -= 1;
            if self.write_delay == 0 {
                self.pending_write = None;
                self.mode = (value >> 7) as usize & 1;
                self.step = 0;
                self.delay = self.region.frame_counter_steps()[self.mode][0];
                if self.mode == 1 {
                    // entering 5-step mode strobes every unit once
                    result = FrameClock::QuarterAndHalf;
                }
            }
        }

        result
    }

    fn step_boundary(&mut self) -> FrameClock {
        let clock = match (self.mode, self.step) {
            (_, 0) | (_, 2) => FrameClock::Quarter,
            (_, 1) => FrameClock::QuarterAndHalf,
            (0, 3) => {
                self.raise_irq();
                FrameClock::None
            }
            (0, 4) => {
                self.raise_irq();
                FrameClock::QuarterAndHalf
            }
            (0, 5) => {
                self.raise_irq();
                FrameClock::None
            }
            (1, 3) | (1, 5) => FrameClock::None,
            (1, 4) => FrameClock::QuarterAndHalf,
            _ => unreachable!(),
        };

        self.step = (self.step + 1) % 6;
        self.delay = self.region.frame_counter_steps()[self.mode][self.step];
        clock
    }

    fn raise_irq(&mut self) {
        if !self.irq_inhibit {
            self.frame_irq = true;
            self.irq_set_this_cycle = true;
        }
    }
}

impl Persist for FrameCounter {
    fn save(&self, w: &mut StateWriter) {
        w.push_u8(self.mode as u8);
        w.push_u8(self.step as u8);
        w.push_u16(self.delay);
        w.push_bool(self.irq_inhibit);
        w.push_u8(self.pending_write.map_or(0, |_| 1));
        w.push_u8(self.pending_write.unwrap_or(0));
        w.push_u8(self.write_delay);
        w.push_bool(self.frame_irq);
        w.push_bool(self.irq_set_this_cycle);
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        self.mode = r.read_u8()? as usize & 1;
        self.step = r.read_u8()? as usize % 6;
        self.delay = r.read_u16()?;
        self.irq_inhibit = r.read_bool()?;
        let has_write = r.read_u8()? != 0;
        let write_value = r.read_u8()?;
        self.pending_write = has_write.then_some(write_value);
        self.write_delay = r.read_u8()?;
        self.frame_irq = r.read_bool()?;
        self.irq_set_this_cycle = r.read_bool()?;
        if self.delay == 0 {
            return Err(StateError::InvalidField("frame counter delay"));
        }
        if self.pending_write.is_some() && self.write_delay == 0 {
            return Err(StateError::InvalidField("frame counter write delay"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fc: &mut FrameCounter, cycles: u32) -> Vec<(u32, FrameClock)> {
        let mut events = Vec::new();
        for i in 0..cycles {
            let clock = fc.clock();
            if clock != FrameClock::None {
                events.push((i + 1, clock));
            }
        }
        events
    }

    #[test]
    fn four_step_boundaries_and_loop() {
        let mut fc = FrameCounter::new(Region::Ntsc);
        let events = run(&mut fc, 29830);
        assert_eq!(
            events,
            vec![
                (7457, FrameClock::Quarter),
                (14913, FrameClock::QuarterAndHalf),
                (22371, FrameClock::Quarter),
                (29829, FrameClock::QuarterAndHalf),
            ]
        );
        // wrapped: next quarter comes 7457 cycles into the next pass
        let next = run(&mut fc, 7457);
        assert_eq!(next, vec![(7457, FrameClock::Quarter)]);
    }

    #[test]
    fn four_step_irq_asserts_three_consecutive_cycles() {
        let mut fc = FrameCounter::new(Region::Ntsc);
        let mut raised = Vec::new();
        for i in 0..29831u32 {
            fc.clock();
            if fc.irq_set_this_cycle {
                raised.push(i + 1);
            }
        }
        assert_eq!(raised, vec![29828, 29829, 29830]);
        assert!(fc.frame_irq);
    }

    #[test]
    fn five_step_mode_raises_no_irq() {
        let mut fc = FrameCounter::new(Region::Ntsc);
        fc.write(0x80, false);
        for _ in 0..80_000 {
            fc.clock();
        }
        assert!(!fc.frame_irq);
    }

    #[test]
    fn five_step_write_strobes_units_after_the_write_delay() {
        let mut fc = FrameCounter::new(Region::Ntsc);
        fc.write(0x80, false); // even cycle: applies after 4 cycles

        assert_eq!(fc.clock(), FrameClock::None);
        assert_eq!(fc.clock(), FrameClock::None);
        assert_eq!(fc.clock(), FrameClock::None);
        assert_eq!(fc.clock(), FrameClock::QuarterAndHalf);
    }

    #[test]
    fn irq_inhibit_clears_flag_immediately() {
        let mut fc = FrameCounter::new(Region::Ntsc);
        for _ in 0..29830 {
            fc.clock();
        }
        assert!(fc.frame_irq);
        fc.write(0x40, true);
        assert!(!fc.frame_irq);
    }
}
