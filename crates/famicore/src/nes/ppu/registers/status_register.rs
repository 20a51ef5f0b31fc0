bitflags::bitflags! {
    /// $2002 PPUSTATUS (bits 4-0 are open bus)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusRegister: u8 {
        const SPRITE_OVERFLOW = 0b0010_0000;
        const SPRITE_ZERO_HIT = 0b0100_0000;
        const VBLANK_STARTED  = 0b1000_0000;
    }
}

impl StatusRegister {
    pub fn new() -> StatusRegister {
        StatusRegister::empty()
    }

    pub fn vblank_active(&self) -> bool {
        self.contains(StatusRegister::VBLANK_STARTED)
    }

    pub fn set_vblank(&mut self, active: bool) {
        self.set(StatusRegister::VBLANK_STARTED, active);
    }

    pub fn set_sprite_zero_hit(&mut self, hit: bool) {
        self.set(StatusRegister::SPRITE_ZERO_HIT, hit);
    }

    pub fn set_sprite_overflow(&mut self, overflow: bool) {
        self.set(StatusRegister::SPRITE_OVERFLOW, overflow);
    }
}

impl Default for StatusRegister {
    fn default() -> Self {
        Self::new()
    }
}
