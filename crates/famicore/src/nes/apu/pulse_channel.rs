use super::frame_counter::FrameClock;
use super::units::envelope::Envelope;
use super::units::length_counter::LengthCounter;
use super::units::sweep::{Sweep, SweepNegate};
use super::units::timer::Timer;
use crate::nes::state::{Persist, StateError, StateReader, StateWriter};

#[rustfmt::skip]
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0], // 12.5%
    [0, 1, 1, 0, 0, 0, 0, 0], // 25%
    [0, 1, 1, 1, 1, 0, 0, 0], // 50%
    [1, 0, 0, 1, 1, 1, 1, 1], // 25% negated
];

pub struct PulseChannel {
    timer: Timer,
    pub length_counter: LengthCounter,
    envelope: Envelope,
    sweep: Sweep,

    duty: u8,
    duty_pos: u8,
}

impl PulseChannel {
    pub fn new(negate_mode: SweepNegate) -> PulseChannel {
        PulseChannel {
            timer: Timer::new(),
            length_counter: LengthCounter::new(),
            envelope: Envelope::new(),
            sweep: Sweep::new(negate_mode),
            duty: 0,
            duty_pos: 0,
        }
    }

    /// $4000/$4004: DDLC.VVVV
    pub fn write_control(&mut self, value: u8) {
        self.duty = value >> 6;
        self.length_counter.set_halt(value & 0x20 != 0);
        self.envelope.write_control(value);
    }

    /// $4001/$4005: EPPP.NSSS
    pub fn write_sweep(&mut self, value: u8) {
        self.sweep.write_control(value);
    }

    /// $4002/$4006: timer low bits
    pub fn write_timer_low(&mut self, value: u8) {
        self.timer.set_reload_low(value);
    }

    /// $4003/$4007: LLLL.LTTT — length load + timer high, restarts the
    /// envelope and resets the duty phase
    pub fn write_timer_high(&mut self, value: u8) {
        self.length_counter.load_index(value >> 3);
        self.timer.set_reload_high(value & 0b111);
        self.envelope.restart();
        self.timer.reset();
        self.duty_pos = 0;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.length_counter.set_enabled(enabled);
    }

    pub fn length_active(&self) -> bool {
        self.length_counter.output() > 0
    }

    /// `timer_tick` is true every second CPU cycle; the frame clocks come
    /// straight from the sequencer.
    pub fn clock(&mut self, frame: &FrameClock, timer_tick: bool) {
        if timer_tick && self.timer.clock() {
            self.duty_pos = (self.duty_pos + 1) & 7;
        }

        if frame.is_quarter() {
            self.envelope.clock();
        }

        if frame.is_half() {
            self.length_counter.clock();
            let mut reload = self.timer.reload();
            self.sweep.clock(&mut reload);
            self.timer.set_reload(reload);
        }
    }

    pub fn output(&self) -> u8 {
        let reload = self.timer.reload();
        let active = DUTY_TABLE[self.duty as usize][self.duty_pos as usize] != 0;
        if !active || self.length_counter.output() == 0 || reload < 8 || self.sweep.is_muting(reload)
        {
            0
        } else {
            self.envelope.output()
        }
    }
}

impl Persist for PulseChannel {
    fn save(&self, w: &mut StateWriter) {
        self.timer.save(w);
        self.length_counter.save(w);
        self.envelope.save(w);
        self.sweep.save(w);
        w.push_u8(self.duty);
        w.push_u8(self.duty_pos);
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        self.timer.load(r)?;
        self.length_counter.load(r)?;
        self.envelope.load(r)?;
        self.sweep.load(r)?;
        self.duty = r.read_u8()? & 3;
        self.duty_pos = r.read_u8()? & 7;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_pulse(duty: u8) -> PulseChannel {
        let mut p = PulseChannel::new(SweepNegate::OnesComplement);
        p.set_enabled(true);
        p.write_control((duty << 6) | 0b0001_1111); // constant volume 15
        p.write_timer_low(8);
        p.write_timer_high(0b0001_1000); // length index 3
        p
    }

    fn advance_one_duty_step(p: &mut PulseChannel) {
        let reload = p.timer.reload();
        for _ in 0..=reload {
            p.clock(&FrameClock::None, true);
        }
    }

    #[test]
    fn silent_until_configured() {
        let p = PulseChannel::new(SweepNegate::OnesComplement);
        assert_eq!(p.output(), 0);
    }

    #[test]
    fn duty_sequence_produces_expected_bits() {
        let mut p = constant_pulse(2); // 50%: 0,1,1,1,1,0,0,0
        let mut bits = Vec::new();
        for _ in 0..8 {
            bits.push((p.output() > 0) as u8);
            advance_one_duty_step(&mut p);
        }
        assert_eq!(bits, vec![0, 1, 1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn retrigger_resets_duty_phase() {
        let mut p = constant_pulse(2);
        advance_one_duty_step(&mut p);
        assert!(p.output() > 0, "should be in the high part of the duty");

        p.write_timer_high(0b0001_1000);
        assert_eq!(p.output(), 0, "retrigger resets to duty step 0");
    }

    #[test]
    fn timer_reload_below_8_silences() {
        let mut p = constant_pulse(3);
        p.write_timer_low(7);
        p.write_timer_high(0b0001_1000);
        assert_eq!(p.output(), 0);
    }

    #[test]
    fn length_counter_expiry_silences() {
        let mut p = constant_pulse(3);
        // length index 3 => 2 half-frame clocks to run dry
        p.clock(&FrameClock::QuarterAndHalf, false);
        p.length_counter.begin_cycle();
        p.clock(&FrameClock::QuarterAndHalf, false);
        assert_eq!(p.output(), 0);
    }
}
