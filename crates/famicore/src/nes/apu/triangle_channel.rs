use super::frame_counter::FrameClock;
use super::units::length_counter::LengthCounter;
use super::units::timer::Timer;
use crate::nes::state::{Persist, StateError, StateReader, StateWriter};

#[rustfmt::skip]
const SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10,  9,  8,  7,  6,  5,  4,  3,  2,  1,  0,
     0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 11, 12, 13, 14, 15,
];

pub struct TriangleChannel {
    timer: Timer,
    pub length_counter: LengthCounter,

    sequence_pos: u8,
    linear_control: bool,
    linear_reload_value: u8,
    linear_value: u8,
    linear_reload_flag: bool,
}

impl TriangleChannel {
    pub fn new() -> TriangleChannel {
        TriangleChannel {
            timer: Timer::new(),
            length_counter: LengthCounter::new(),
            sequence_pos: 0,
            linear_control: false,
            linear_reload_value: 0,
            linear_value: 0,
            linear_reload_flag: false,
        }
    }

    /// $4008: CRRR.RRRR — control doubles as the length counter halt
    pub fn write_linear(&mut self, value: u8) {
        self.linear_control = value & 0x80 != 0;
        self.linear_reload_value = value & 0x7F;
        self.length_counter.set_halt(self.linear_control);
    }

    /// $400A
    pub fn write_timer_low(&mut self, value: u8) {
        self.timer.set_reload_low(value);
    }

    /// $400B: length load + timer high; arms the linear counter reload
    pub fn write_timer_high(&mut self, value: u8) {
        self.length_counter.load_index(value >> 3);
        self.timer.set_reload_high(value & 0b111);
        self.linear_reload_flag = true;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.length_counter.set_enabled(enabled);
    }

    pub fn length_active(&self) -> bool {
        self.length_counter.output() > 0
    }

    /// Timer runs at full CPU rate, unlike the pulse channels.
    pub fn clock(&mut self, frame: &FrameClock) {
        let fired = self.timer.clock();
        if fired
            && self.linear_value > 0
            && self.length_counter.output() > 0
            && self.timer.reload() >= 2
        {
            // ultrasonic periods are left frozen rather than clicking
            self.sequence_pos = (self.sequence_pos + 1) & 31;
        }

        if frame.is_quarter() {
            if self.linear_reload_flag {
                self.linear_value = self.linear_reload_value;
            } else if self.linear_value > 0 {
                self.linear_value -= 1;
            }
            if !self.linear_control {
                self.linear_reload_flag = false;
            }
        }

        if frame.is_half() {
            self.length_counter.clock();
        }
    }

    pub fn output(&self) -> u8 {
        // the sequencer holds its last value when halted, it does not snap
        // to zero
        SEQUENCE[self.sequence_pos as usize]
    }
}

impl Persist for TriangleChannel {
    fn save(&self, w: &mut StateWriter) {
        self.timer.save(w);
        self.length_counter.save(w);
        w.push_u8(self.sequence_pos);
        w.push_bool(self.linear_control);
        w.push_u8(self.linear_reload_value);
        w.push_u8(self.linear_value);
        w.push_bool(self.linear_reload_flag);
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        self.timer.load(r)?;
        self.length_counter.load(r)?;
        self.sequence_pos = r.read_u8()? & 31;
        self.linear_control = r.read_bool()?;
        self.linear_reload_value = r.read_u8()?;
        self.linear_value = r.read_u8()?;
        self.linear_reload_flag = r.read_bool()?;
        Ok(())
    }
}
