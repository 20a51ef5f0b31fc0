use crate::nes::state::{Persist, StateError, StateReader, StateWriter};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u8 {
        const A      = 0b0000_0001;
        const B      = 0b0000_0010;
        const SELECT = 0b0000_0100;
        const START  = 0b0000_1000;
        const UP     = 0b0001_0000;
        const DOWN   = 0b0010_0000;
        const LEFT   = 0b0100_0000;
        const RIGHT  = 0b1000_0000;
    }
}

/// Standard controller: 8-bit shift register behind a strobe line.
/// While strobe is high the register keeps reloading, so reads return the
/// live A button; after strobe drops, 8 reads walk the buttons and further
/// reads return 1.
#[derive(Default)]
pub struct Joypad {
    strobe: bool,
    shift: u8,
    buttons: Buttons,
}

impl Joypad {
    pub fn new() -> Joypad {
        Joypad::default()
    }

    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.buttons = buttons;
    }

    pub fn write(&mut self, value: u8) {
        let strobe = value & 1 != 0;
        if self.strobe && !strobe {
            self.shift = self.buttons.bits();
        }
        self.strobe = strobe;
    }

    pub fn read(&mut self) -> u8 {
        if self.strobe {
            return self.buttons.bits() & 1;
        }
        let bit = self.shift & 1;
        self.shift = (self.shift >> 1) | 0x80;
        bit
    }
}

impl Persist for Joypad {
    fn save(&self, w: &mut StateWriter) {
        w.push_bool(self.strobe);
        w.push_u8(self.shift);
        w.push_u8(self.buttons.bits());
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        self.strobe = r.read_bool()?;
        self.shift = r.read_u8()?;
        self.buttons = Buttons::from_bits_truncate(r.read_u8()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strobe_then_read_walks_buttons() {
        let mut pad = Joypad::new();
        pad.set_buttons(Buttons::A | Buttons::START);

        pad.write(1);
        pad.write(0);

        let bits: Vec<u8> = (0..8).map(|_| pad.read()).collect();
        assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 0, 0]);

        // shifted out; further reads return 1
        assert_eq!(pad.read(), 1);
        assert_eq!(pad.read(), 1);
    }

    #[test]
    fn strobe_high_pins_reads_to_a() {
        let mut pad = Joypad::new();
        pad.set_buttons(Buttons::A);
        pad.write(1);
        for _ in 0..20 {
            assert_eq!(pad.read(), 1);
        }
    }
}
