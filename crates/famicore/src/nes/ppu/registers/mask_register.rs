bitflags::bitflags! {
    /// $2001 PPUMASK
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaskRegister: u8 {
        const GRAYSCALE           = 0b0000_0001;
        const LEFTMOST_BACKGROUND = 0b0000_0010;
        const LEFTMOST_SPRITES    = 0b0000_0100;
        const SHOW_BACKGROUND     = 0b0000_1000;
        const SHOW_SPRITES        = 0b0001_0000;
        const EMPHASIZE_RED       = 0b0010_0000;
        const EMPHASIZE_GREEN     = 0b0100_0000;
        const EMPHASIZE_BLUE      = 0b1000_0000;
    }
}

impl MaskRegister {
    pub fn new() -> MaskRegister {
        MaskRegister::empty()
    }

    pub fn update(&mut self, value: u8) {
        *self = MaskRegister::from_bits_truncate(value);
    }

    pub fn show_background(&self) -> bool {
        self.contains(MaskRegister::SHOW_BACKGROUND)
    }

    pub fn show_sprites(&self) -> bool {
        self.contains(MaskRegister::SHOW_SPRITES)
    }

    pub fn rendering_enabled(&self) -> bool {
        self.intersects(MaskRegister::SHOW_BACKGROUND | MaskRegister::SHOW_SPRITES)
    }

    pub fn leftmost_background(&self) -> bool {
        self.contains(MaskRegister::LEFTMOST_BACKGROUND)
    }

    pub fn leftmost_sprites(&self) -> bool {
        self.contains(MaskRegister::LEFTMOST_SPRITES)
    }

    /// Color-index mask applied to every output pixel.
    pub fn grayscale_mask(&self) -> u16 {
        if self.contains(MaskRegister::GRAYSCALE) {
            0x30
        } else {
            0x3F
        }
    }

    /// Emphasis bits packed above the 6-bit color index in the frame
    /// buffer.
    pub fn emphasis_bits(&self) -> u16 {
        ((self.bits() >> 5) as u16) << 6
    }
}

impl Default for MaskRegister {
    fn default() -> Self {
        Self::new()
    }
}
