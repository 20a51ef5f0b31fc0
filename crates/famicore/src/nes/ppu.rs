use crate::nes::cartridge::CartridgeSlot;
use crate::nes::config::{EmuConfig, Region};
use crate::nes::state::{Persist, StateError, StateReader, StateWriter};
use registers::control_register::ControlRegister;
use registers::mask_register::MaskRegister;
use registers::open_bus::PpuOpenBus;
use registers::scroll_register::ScrollRegister;
use registers::status_register::StatusRegister;

use super::cartridge::rom::Mirroring;

mod background;
pub mod registers;
mod sprites;

pub const FRAME_WIDTH: usize = 256;
pub const FRAME_HEIGHT: usize = 240;

const NAMETABLE_RAM_SIZE: usize = 0x1000; // four 1KB logical pages
const PALETTE_SIZE: usize = 32;
const OAM_SIZE: usize = 256;
const SECONDARY_OAM_SIZE: usize = 32;
const DOTS_PER_LINE: u16 = 341;

pub struct Ppu {
    region: Region,

    pub scanline: u16,
    pub dot: u16,
    pub frame: u32,
    frame_is_odd: bool,

    // effective line numbers after overclock lines are inserted
    nmi_scanline: u16,
    prerender_line: u16,
    oc_before: u16,
    oc_after: u16,
    base_scanline_count: u16,

    prerender_rendering_enabled: bool,
    prevent_vblank: bool,

    nametable_ram: [u8; NAMETABLE_RAM_SIZE],
    palette_ram: [u8; PALETTE_SIZE],
    pub oam: [u8; OAM_SIZE],
    pub secondary_oam: [u8; SECONDARY_OAM_SIZE],
    pub oam_addr: u8,

    pub ctrl: ControlRegister,
    pub mask: MaskRegister,
    pub status: StatusRegister,
    pub scroll: ScrollRegister,
    open_bus: PpuOpenBus,
    read_buffer: u8,

    // background pipeline (two tiles ahead of the emitted pixel)
    bg_pattern_shift_low: u16,
    bg_pattern_shift_high: u16,
    bg_attr_shift_low: u16,
    bg_attr_shift_high: u16,
    next_tile_id: u8,
    next_tile_attr: u8,
    next_tile_low: u8,
    next_tile_high: u8,

    // sprite evaluation state machine
    oam_copy_buffer: u8,
    eval_done: bool,
    eval_copy_left: u8,
    eval_sec_index: u8,
    sprites_found: u8,
    sprite0_added: bool,
    sprite0_visible: bool,

    // sprite output units for the line being drawn
    sprite_count: u8,
    sprite_pattern_low: [u8; 8],
    sprite_pattern_high: [u8; 8],
    sprite_attributes: [u8; 8],
    sprite_x_counter: [u8; 8],
    fetch_sprite_y: u8,
    fetch_sprite_tile: u8,
    fetch_sprite_attr: u8,
    fetch_sprite_x: u8,

    /// 6-bit color index | emphasis bits << 6, one entry per dot.
    pub frame_buffer: Box<[u16; FRAME_WIDTH * FRAME_HEIGHT]>,
}

impl Ppu {
    pub fn new(config: &EmuConfig) -> Ppu {
        let region = config.region;
        let oc_before = config.extra_scanlines_before_nmi;
        let oc_after = config.extra_scanlines_after_nmi;
        Ppu {
            region,
            scanline: 0,
            dot: 0,
            frame: 0,
            frame_is_odd: false,
            nmi_scanline: region.nmi_scanline() + oc_before,
            prerender_line: region.scanline_count() - 1 + oc_before + oc_after,
            oc_before,
            oc_after,
            base_scanline_count: region.scanline_count(),
            prerender_rendering_enabled: false,
            prevent_vblank: false,
            nametable_ram: [0; NAMETABLE_RAM_SIZE],
            palette_ram: [0; PALETTE_SIZE],
            oam: [0; OAM_SIZE],
            secondary_oam: [0; SECONDARY_OAM_SIZE],
            oam_addr: 0,
            ctrl: ControlRegister::new(),
            mask: MaskRegister::new(),
            status: StatusRegister::new(),
            scroll: ScrollRegister::new(),
            open_bus: PpuOpenBus::new(),
            read_buffer: 0,
            bg_pattern_shift_low: 0,
            bg_pattern_shift_high: 0,
            bg_attr_shift_low: 0,
            bg_attr_shift_high: 0,
            next_tile_id: 0,
            next_tile_attr: 0,
            next_tile_low: 0,
            next_tile_high: 0,
            oam_copy_buffer: 0,
            eval_done: false,
            eval_copy_left: 0,
            eval_sec_index: 0,
            sprites_found: 0,
            sprite0_added: false,
            sprite0_visible: false,
            sprite_count: 0,
            sprite_pattern_low: [0; 8],
            sprite_pattern_high: [0; 8],
            sprite_attributes: [0; 8],
            sprite_x_counter: [0xFF; 8],
            fetch_sprite_y: 0,
            fetch_sprite_tile: 0,
            fetch_sprite_attr: 0,
            fetch_sprite_x: 0,
            frame_buffer: Box::new([0; FRAME_WIDTH * FRAME_HEIGHT]),
        }
    }

    pub fn reset(&mut self, config: &EmuConfig) {
        *self = Ppu::new(config);
    }

    /// True while the PPU is running an inserted overclock scanline;
    /// APU/DMA/mapper clocks are skipped there.
    pub fn in_overclock_line(&self) -> bool {
        let oc_before_start = 241;
        if self.oc_before > 0
            && self.scanline >= oc_before_start
            && self.scanline < oc_before_start + self.oc_before
        {
            return true;
        }
        if self.oc_after > 0 {
            let start = self.base_scanline_count - 1 + self.oc_before;
            return self.scanline >= start && self.scanline < start + self.oc_after;
        }
        false
    }

    /// Level of the PPU's NMI output line.
    pub fn nmi_line(&self) -> bool {
        self.status.vblank_active() && self.ctrl.nmi_enabled()
    }

    fn rendering_line(&self) -> bool {
        self.scanline < 240 || self.scanline == self.prerender_line
    }

    // ------------------------------------------------------------------
    // CPU-visible registers
    // ------------------------------------------------------------------

    pub fn read_register(&mut self, cart: &mut CartridgeSlot, addr: u16) -> u8 {
        match addr & 7 {
            2 => {
                // one dot before the flag would rise: reading now keeps it
                // (and the NMI) from happening at all this frame
                if self.scanline == self.nmi_scanline && self.dot == 1 {
                    self.prevent_vblank = true;
                }

                let status_bits = self.status.bits();
                let result = (status_bits & 0xE0) | (self.open_bus.read(self.frame) & 0x1F);

                self.status.set_vblank(false);
                self.scroll.reset_latch();
                self.open_bus.refresh(0xE0, status_bits, self.frame);
                result
            }
            4 => {
                let value = self.read_oam_data();
                self.open_bus.refresh(0xFF, value, self.frame);
                value
            }
            7 => {
                let v = self.scroll.v & 0x3FFF;
                let result = if v >= 0x3F00 {
                    // palette reads bypass the buffer; the buffer still
                    // picks up the nametable byte underneath
                    let palette = self.read_palette(v);
                    self.read_buffer = self.read_nametable(cart, v & 0x2FFF);
                    let result = (self.open_bus.read(self.frame) & 0xC0) | (palette & 0x3F);
                    self.open_bus.refresh(0x3F, result, self.frame);
                    result
                } else {
                    let result = self.read_buffer;
                    self.read_buffer = self.read_vram(cart, v);
                    self.open_bus.refresh(0xFF, result, self.frame);
                    result
                };
                self.increment_vram_addr(cart);
                result
            }
            // write-only registers float
            _ => self.open_bus.read(self.frame),
        }
    }

    pub fn write_register(&mut self, cart: &mut CartridgeSlot, addr: u16, value: u8) {
        self.open_bus.refresh(0xFF, value, self.frame);
        match addr & 7 {
            0 => {
                self.ctrl.update(value);
                self.scroll.write_nametable_select(value);
            }
            1 => self.mask.update(value),
            2 => { /* read-only */ }
            3 => self.oam_addr = value,
            4 => self.write_oam_data(value),
            5 => self.scroll.write_scroll(value),
            6 => {
                if self.scroll.write_addr(value) {
                    cart.ppu_bus_access(self.scroll.v);
                }
            }
            7 => {
                self.write_vram(cart, self.scroll.v & 0x3FFF, value);
                self.increment_vram_addr(cart);
            }
            _ => unreachable!(),
        }
    }

    fn read_oam_data(&self) -> u8 {
        // while secondary OAM is being cleared, reads see the $FF fill
        if self.mask.rendering_enabled()
            && self.rendering_line()
            && (1..=64).contains(&self.dot)
        {
            return 0xFF;
        }
        let value = self.oam[self.oam_addr as usize];
        if self.oam_addr & 3 == 2 {
            value & 0xE3
        } else {
            value
        }
    }

    fn write_oam_data(&mut self, value: u8) {
        if self.mask.rendering_enabled() && self.rendering_line() {
            // writes during rendering don't land; the address still takes
            // the documented bump of its high six bits
            self.oam_addr = self.oam_addr.wrapping_add(4);
            return;
        }
        let value = if self.oam_addr & 3 == 2 {
            value & 0xE3
        } else {
            value
        };
        self.oam[self.oam_addr as usize] = value;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    fn increment_vram_addr(&mut self, cart: &mut CartridgeSlot) {
        if self.mask.rendering_enabled() && self.rendering_line() {
            // $2007 access mid-render runs both scroll adders at once
            self.scroll.increment_x();
            self.scroll.increment_y();
        } else {
            self.scroll.increment_addr(self.ctrl.vram_increment());
        }
        cart.ppu_bus_access(self.scroll.v);
    }

    // ------------------------------------------------------------------
    // VRAM routing
    // ------------------------------------------------------------------

    pub(super) fn read_vram(&mut self, cart: &mut CartridgeSlot, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        cart.ppu_bus_access(addr);
        match addr {
            0x0000..=0x1FFF => cart.read_chr(addr),
            _ => self.read_nametable(cart, addr),
        }
    }

    fn write_vram(&mut self, cart: &mut CartridgeSlot, addr: u16, value: u8) {
        let addr = addr & 0x3FFF;
        cart.ppu_bus_access(addr);
        match addr {
            0x0000..=0x1FFF => cart.write_chr(addr, value),
            0x3F00..=0x3FFF => {
                self.palette_ram[Self::palette_index(addr)] = value;
            }
            _ => {
                let (page, offset) = self.resolve_nametable(cart, addr);
                self.nametable_ram[page * 0x400 + offset] = value;
            }
        }
    }

    fn resolve_nametable(&self, cart: &CartridgeSlot, addr: u16) -> (usize, usize) {
        let block = ((addr as usize) >> 10) & 3;
        let offset = (addr as usize) & 0x3FF;
        let page = match cart.mirroring() {
            Mirroring::Horizontal => [0, 0, 1, 1][block],
            Mirroring::Vertical => [0, 1, 0, 1][block],
            Mirroring::SingleScreenA => 0,
            Mirroring::SingleScreenB => 1,
            Mirroring::FourScreen => block,
            Mirroring::Custom => cart.custom_mirroring_page(block) & 3,
        };
        (page, offset)
    }

    fn read_nametable(&mut self, cart: &mut CartridgeSlot, addr: u16) -> u8 {
        let (page, offset) = self.resolve_nametable(cart, addr);
        if cart.use_custom_nametable(page) {
            return cart.read_custom_nametable(page, addr & 0x3FF);
        }
        self.nametable_ram[page * 0x400 + offset]
    }

    fn palette_index(addr: u16) -> usize {
        let index = (addr as usize - 0x3F00) % 0x20;
        match index {
            0x10 | 0x14 | 0x18 | 0x1C => index - 0x10,
            _ => index,
        }
    }

    fn read_palette(&self, addr: u16) -> u8 {
        self.palette_ram[Self::palette_index(addr)]
    }

    // ------------------------------------------------------------------
    // Dot pipeline
    // ------------------------------------------------------------------

    /// Advance exactly one PPU dot.
    pub fn tick_dot(&mut self, cart: &mut CartridgeSlot) {
        let scanline = self.scanline;
        let dot = self.dot;
        let prerender = scanline == self.prerender_line;
        let visible = scanline < 240;

        if prerender && dot == 0 {
            self.prerender_rendering_enabled = self.mask.rendering_enabled();
        }

        if prerender && dot == 1 {
            self.status.set_vblank(false);
            self.status.set_sprite_zero_hit(false);
            self.status.set_sprite_overflow(false);
        }

        if scanline == self.nmi_scanline && dot == 1 {
            if !self.prevent_vblank {
                self.status.set_vblank(true);
            }
            self.prevent_vblank = false;
        }

        if self.mask.rendering_enabled() && (visible || prerender) {
            self.render_dot(cart, scanline, dot, visible, prerender);
        } else if visible && (1..=256).contains(&dot) {
            // rendering off: the backdrop (or the palette entry v points
            // at) fills the line
            let color = self.backdrop_color() as u16;
            self.frame_buffer[scanline as usize * FRAME_WIDTH + (dot - 1) as usize] =
                (color & self.mask.grayscale_mask()) | self.mask.emphasis_bits();
        }

        self.advance_dot(prerender);
    }

    fn render_dot(
        &mut self,
        cart: &mut CartridgeSlot,
        scanline: u16,
        dot: u16,
        visible: bool,
        prerender: bool,
    ) {
        let bg_fetch_window = (1..=256).contains(&dot) || (321..=336).contains(&dot);

        if visible && (1..=256).contains(&dot) {
            self.emit_pixel(scanline, dot);
        }

        if bg_fetch_window {
            self.shift_background_registers();
            if visible && (1..=256).contains(&dot) {
                self.shift_sprite_registers();
            }

            match dot % 8 {
                1 => self.fetch_nametable_byte(cart),
                3 => self.fetch_attribute_byte(cart),
                5 => self.fetch_tile_low_byte(cart),
                7 => self.fetch_tile_high_byte(cart),
                0 => {
                    self.load_background_registers();
                    self.scroll.increment_x();
                }
                _ => {}
            }
        }

        // dummy nametable fetches; scanline-counting chips depend on them
        if dot == 337 || dot == 339 {
            self.fetch_nametable_byte(cart);
        }

        if dot == 256 {
            self.scroll.increment_y();
        }
        if dot == 257 {
            self.scroll.copy_horizontal_bits();
            self.sprite_count = self.sprites_found.min(8);
            self.sprite0_visible = self.sprite0_added;
        }
        if prerender && (280..=304).contains(&dot) {
            self.scroll.copy_vertical_bits();
        }

        // sprite machinery
        if visible {
            if (1..=64).contains(&dot) && dot % 2 == 0 {
                self.secondary_oam[((dot - 1) / 2) as usize] = 0xFF;
            }
            if dot == 65 {
                self.reset_sprite_evaluation();
            }
            if (65..=256).contains(&dot) {
                if dot % 2 == 1 {
                    self.sprite_evaluation_read();
                } else {
                    self.sprite_evaluation_write(scanline);
                }
            }
        }

        if (257..=320).contains(&dot) {
            self.oam_addr = 0;
            let sprite = ((dot - 257) / 8) as usize;
            // fetches target the line below the one just evaluated
            let fetch_line = if prerender { 0 } else { scanline + 1 };
            match (dot - 257) % 8 {
                0 => self.sprite_fetch_latch(sprite),
                4 => self.sprite_fetch_low(cart, sprite, fetch_line),
                6 => self.sprite_fetch_high(cart, sprite, fetch_line),
                _ => {}
            }
        }
    }

    fn emit_pixel(&mut self, scanline: u16, dot: u16) {
        let x = (dot - 1) as usize;
        let (bg_palette, bg_pixel) = self.background_pixel();
        let (spr_palette, spr_pixel, spr_in_front, sprite_zero) = self.sprite_pixel();

        // sprite 0 hit needs both pixels opaque; never triggers at x=255
        if sprite_zero
            && bg_pixel != 0
            && x < 255
            && self.mask.show_background()
            && !self.status.contains(StatusRegister::SPRITE_ZERO_HIT)
        {
            self.status.set_sprite_zero_hit(true);
        }

        let color_addr = if spr_pixel != 0 && (bg_pixel == 0 || spr_in_front) {
            0x3F10 + ((spr_palette as u16) << 2) + spr_pixel as u16
        } else if bg_pixel != 0 {
            0x3F00 + ((bg_palette as u16) << 2) + bg_pixel as u16
        } else {
            0x3F00
        };

        let color = self.read_palette(color_addr) as u16;
        self.frame_buffer[scanline as usize * FRAME_WIDTH + x] =
            (color & self.mask.grayscale_mask()) | self.mask.emphasis_bits();
    }

    fn backdrop_color(&self) -> u8 {
        // with rendering disabled and v parked in palette space, the PPU
        // shows that entry instead of the universal backdrop
        let v = self.scroll.v & 0x3FFF;
        if v >= 0x3F00 {
            self.read_palette(v)
        } else {
            self.read_palette(0x3F00)
        }
    }

    fn advance_dot(&mut self, prerender: bool) {
        self.dot += 1;

        // NTSC odd frames drop the last pre-render dot while rendering
        let skip_dot = prerender
            && self.region.has_odd_frame_skip()
            && self.frame_is_odd
            && self.prerender_rendering_enabled;
        let line_len = if skip_dot {
            DOTS_PER_LINE - 1
        } else {
            DOTS_PER_LINE
        };

        if self.dot >= line_len {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline > self.prerender_line {
                self.scanline = 0;
                self.frame = self.frame.wrapping_add(1);
                self.frame_is_odd = !self.frame_is_odd;
            }
        }
    }
}

impl Persist for Ppu {
    fn save(&self, w: &mut StateWriter) {
        w.push_u16(self.scanline);
        w.push_u16(self.dot);
        w.push_u32(self.frame);
        w.push_bool(self.frame_is_odd);
        w.push_bool(self.prerender_rendering_enabled);
        w.push_bool(self.prevent_vblank);

        w.push_bytes(&self.nametable_ram);
        w.push_bytes(&self.palette_ram);
        w.push_bytes(&self.oam);
        w.push_bytes(&self.secondary_oam);
        w.push_u8(self.oam_addr);

        w.push_u8(self.ctrl.bits());
        w.push_u8(self.mask.bits());
        w.push_u8(self.status.bits());
        self.scroll.save(w);
        self.open_bus.save(w);
        w.push_u8(self.read_buffer);

        w.push_u16(self.bg_pattern_shift_low);
        w.push_u16(self.bg_pattern_shift_high);
        w.push_u16(self.bg_attr_shift_low);
        w.push_u16(self.bg_attr_shift_high);
        w.push_u8(self.next_tile_id);
        w.push_u8(self.next_tile_attr);
        w.push_u8(self.next_tile_low);
        w.push_u8(self.next_tile_high);

        w.push_u8(self.oam_copy_buffer);
        w.push_bool(self.eval_done);
        w.push_u8(self.eval_copy_left);
        w.push_u8(self.eval_sec_index);
        w.push_u8(self.sprites_found);
        w.push_bool(self.sprite0_added);
        w.push_bool(self.sprite0_visible);

        w.push_u8(self.sprite_count);
        w.push_bytes(&self.sprite_pattern_low);
        w.push_bytes(&self.sprite_pattern_high);
        w.push_bytes(&self.sprite_attributes);
        w.push_bytes(&self.sprite_x_counter);
        w.push_u8(self.fetch_sprite_y);
        w.push_u8(self.fetch_sprite_tile);
        w.push_u8(self.fetch_sprite_attr);
        w.push_u8(self.fetch_sprite_x);

        for pixel in self.frame_buffer.iter() {
            w.push_u16(*pixel);
        }
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        self.scanline = r.read_u16()?;
        self.dot = r.read_u16()?;
        if self.scanline > self.prerender_line || self.dot >= DOTS_PER_LINE {
            return Err(StateError::InvalidField("ppu scanline/dot"));
        }
        self.frame = r.read_u32()?;
        self.frame_is_odd = r.read_bool()?;
        self.prerender_rendering_enabled = r.read_bool()?;
        self.prevent_vblank = r.read_bool()?;

        r.read_bytes(&mut self.nametable_ram)?;
        r.read_bytes(&mut self.palette_ram)?;
        r.read_bytes(&mut self.oam)?;
        r.read_bytes(&mut self.secondary_oam)?;
        self.oam_addr = r.read_u8()?;

        self.ctrl.update(r.read_u8()?);
        self.mask.update(r.read_u8()?);
        self.status = StatusRegister::from_bits_truncate(r.read_u8()?);
        self.scroll.load(r)?;
        self.open_bus.load(r)?;
        self.read_buffer = r.read_u8()?;

        self.bg_pattern_shift_low = r.read_u16()?;
        self.bg_pattern_shift_high = r.read_u16()?;
        self.bg_attr_shift_low = r.read_u16()?;
        self.bg_attr_shift_high = r.read_u16()?;
        self.next_tile_id = r.read_u8()?;
        self.next_tile_attr = r.read_u8()?;
        self.next_tile_low = r.read_u8()?;
        self.next_tile_high = r.read_u8()?;

        self.oam_copy_buffer = r.read_u8()?;
        self.eval_done = r.read_bool()?;
        self.eval_copy_left = r.read_u8()?;
        self.eval_sec_index = r.read_u8()?;
        self.sprites_found = r.read_u8()?;
        self.sprite0_added = r.read_bool()?;
        self.sprite0_visible = r.read_bool()?;

        self.sprite_count = r.read_u8()?;
        r.read_bytes(&mut self.sprite_pattern_low)?;
        r.read_bytes(&mut self.sprite_pattern_high)?;
        r.read_bytes(&mut self.sprite_attributes)?;
        r.read_bytes(&mut self.sprite_x_counter)?;
        self.fetch_sprite_y = r.read_u8()?;
        self.fetch_sprite_tile = r.read_u8()?;
        self.fetch_sprite_attr = r.read_u8()?;
        self.fetch_sprite_x = r.read_u8()?;

        for pixel in self.frame_buffer.iter_mut() {
            *pixel = r.read_u16()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nes::cartridge::nrom::Nrom;

    fn ppu_with_cart() -> (Ppu, CartridgeSlot) {
        let ppu = Ppu::new(&EmuConfig::default());
        let mut slot = CartridgeSlot::new();
        slot.insert(Box::new(Nrom::new(
            vec![0; 0x4000],
            vec![],
            Mirroring::Vertical,
        )));
        (ppu, slot)
    }

    fn run_dots(ppu: &mut Ppu, cart: &mut CartridgeSlot, n: usize) {
        for _ in 0..n {
            ppu.tick_dot(cart);
        }
    }

    fn run_to(ppu: &mut Ppu, cart: &mut CartridgeSlot, scanline: u16, dot: u16) {
        let mut guard = 0u32;
        while !(ppu.scanline == scanline && ppu.dot == dot) {
            ppu.tick_dot(cart);
            guard += 1;
            assert!(guard < 500_000, "never reached ({scanline}, {dot})");
        }
    }

    #[test]
    fn vblank_flag_sets_at_241_dot_1() {
        let (mut ppu, mut cart) = ppu_with_cart();
        run_to(&mut ppu, &mut cart, 241, 1);
        assert!(!ppu.status.vblank_active());
        ppu.tick_dot(&mut cart);
        assert!(ppu.status.vblank_active());
    }

    #[test]
    fn vblank_flag_clears_on_prerender() {
        let (mut ppu, mut cart) = ppu_with_cart();
        run_to(&mut ppu, &mut cart, 261, 1);
        ppu.tick_dot(&mut cart);
        assert!(!ppu.status.vblank_active());
    }

    #[test]
    fn status_read_clears_vblank_and_latch() {
        let (mut ppu, mut cart) = ppu_with_cart();
        run_to(&mut ppu, &mut cart, 242, 0);
        assert!(ppu.status.vblank_active());
        let value = ppu.read_register(&mut cart, 0x2002);
        assert_eq!(value & 0x80, 0x80);
        assert!(!ppu.status.vblank_active());
    }

    #[test]
    fn status_read_one_dot_early_suppresses_the_flag() {
        let (mut ppu, mut cart) = ppu_with_cart();
        run_to(&mut ppu, &mut cart, 241, 1); // dot 0 just executed
        let value = ppu.read_register(&mut cart, 0x2002);
        assert_eq!(value & 0x80, 0);
        // the set point passes without the flag appearing
        run_dots(&mut ppu, &mut cart, 10);
        assert!(!ppu.status.vblank_active());
    }

    #[test]
    fn nmi_line_follows_flag_and_enable() {
        let (mut ppu, mut cart) = ppu_with_cart();
        ppu.write_register(&mut cart, 0x2000, 0x80);
        run_to(&mut ppu, &mut cart, 242, 0);
        assert!(ppu.nmi_line());

        ppu.write_register(&mut cart, 0x2000, 0x00);
        assert!(!ppu.nmi_line());
        ppu.write_register(&mut cart, 0x2000, 0x80);
        assert!(ppu.nmi_line());
    }

    #[test]
    fn odd_frames_skip_one_prerender_dot_when_rendering() {
        let (mut ppu, mut cart) = ppu_with_cart();
        ppu.write_register(&mut cart, 0x2001, 0x08); // background on

        // frame 0 (even): full-length pre-render line
        run_to(&mut ppu, &mut cart, 261, 0);
        let mut dots = 0;
        while ppu.scanline == 261 {
            ppu.tick_dot(&mut cart);
            dots += 1;
        }
        assert_eq!(dots, 341);

        // frame 1 (odd): one dot shorter
        run_to(&mut ppu, &mut cart, 261, 0);
        let mut dots = 0;
        while ppu.scanline == 261 {
            ppu.tick_dot(&mut cart);
            dots += 1;
        }
        assert_eq!(dots, 340);
    }

    #[test]
    fn even_frames_are_full_length_with_rendering_disabled() {
        let (mut ppu, mut cart) = ppu_with_cart();
        for _ in 0..3 {
            run_to(&mut ppu, &mut cart, 261, 0);
            let mut dots = 0;
            while ppu.scanline == 261 {
                ppu.tick_dot(&mut cart);
                dots += 1;
            }
            assert_eq!(dots, 341);
        }
    }

    #[test]
    fn oam_write_during_rendering_bumps_addr_without_storing() {
        let (mut ppu, mut cart) = ppu_with_cart();
        ppu.write_register(&mut cart, 0x2001, 0x08);
        run_to(&mut ppu, &mut cart, 10, 100);

        let before = ppu.oam;
        ppu.oam_addr = 0x10;
        ppu.write_register(&mut cart, 0x2004, 0xAB);
        assert_eq!(ppu.oam, before, "no OAM byte may change");
        assert_eq!(ppu.oam_addr, 0x14, "address still takes the glitch bump");
    }

    #[test]
    fn oam_write_outside_rendering_stores_normally() {
        let (mut ppu, mut cart) = ppu_with_cart();
        run_to(&mut ppu, &mut cart, 245, 0); // vblank
        ppu.oam_addr = 0x10;
        ppu.write_register(&mut cart, 0x2004, 0xAB);
        assert_eq!(ppu.oam[0x10], 0xAB);
        assert_eq!(ppu.oam_addr, 0x11);
    }

    #[test]
    fn oam_attribute_bytes_mask_unimplemented_bits() {
        let (mut ppu, mut cart) = ppu_with_cart();
        run_to(&mut ppu, &mut cart, 245, 0);
        ppu.oam_addr = 0x02; // byte 2 of sprite 0
        ppu.write_register(&mut cart, 0x2004, 0xFF);
        assert_eq!(ppu.oam[0x02], 0xE3);
    }

    #[test]
    fn palette_reads_bypass_the_read_buffer() {
        let (mut ppu, mut cart) = ppu_with_cart();
        run_to(&mut ppu, &mut cart, 245, 0);
        ppu.palette_ram[1] = 0x2A;

        ppu.write_register(&mut cart, 0x2006, 0x3F);
        ppu.write_register(&mut cart, 0x2006, 0x01);
        let value = ppu.read_register(&mut cart, 0x2007);
        assert_eq!(value & 0x3F, 0x2A);
    }

    #[test]
    fn vram_reads_are_buffered_one_behind() {
        let (mut ppu, mut cart) = ppu_with_cart();
        run_to(&mut ppu, &mut cart, 245, 0);

        ppu.write_register(&mut cart, 0x2006, 0x20);
        ppu.write_register(&mut cart, 0x2006, 0x00);
        ppu.write_register(&mut cart, 0x2007, 0x55);
        ppu.write_register(&mut cart, 0x2007, 0x66);

        ppu.write_register(&mut cart, 0x2006, 0x20);
        ppu.write_register(&mut cart, 0x2006, 0x00);
        let stale = ppu.read_register(&mut cart, 0x2007);
        let first = ppu.read_register(&mut cart, 0x2007);
        let second = ppu.read_register(&mut cart, 0x2007);
        let _ = stale;
        assert_eq!(first, 0x55);
        assert_eq!(second, 0x66);
    }

    #[test]
    fn secondary_oam_clear_fills_ff_and_reads_ff() {
        let (mut ppu, mut cart) = ppu_with_cart();
        ppu.write_register(&mut cart, 0x2001, 0x18);
        ppu.secondary_oam = [0; 32];
        run_to(&mut ppu, &mut cart, 5, 70);
        assert!(ppu.secondary_oam.iter().all(|&b| b == 0xFF));

        run_to(&mut ppu, &mut cart, 6, 30);
        assert_eq!(ppu.read_register(&mut cart, 0x2004), 0xFF);
    }

    #[test]
    fn sprite_evaluation_finds_in_range_sprites() {
        let (mut ppu, mut cart) = ppu_with_cart();
        ppu.write_register(&mut cart, 0x2001, 0x18);

        // sprite 0 on line 21..28, sprite 1 far away
        ppu.oam[0] = 20;
        ppu.oam[1] = 0x42;
        ppu.oam[2] = 0x01;
        ppu.oam[3] = 99;
        ppu.oam[4] = 200;

        run_to(&mut ppu, &mut cart, 24, 260);
        assert_eq!(ppu.sprite_count, 1);
        assert_eq!(ppu.secondary_oam[0], 20);
        assert_eq!(ppu.secondary_oam[1], 0x42);
        assert_eq!(ppu.secondary_oam[3], 99);
        assert!(ppu.sprite0_visible);
    }

    #[test]
    fn nine_in_range_sprites_raise_overflow() {
        let (mut ppu, mut cart) = ppu_with_cart();
        ppu.write_register(&mut cart, 0x2001, 0x18);

        for i in 0..9 {
            ppu.oam[i * 4] = 50;
            ppu.oam[i * 4 + 1] = i as u8;
            ppu.oam[i * 4 + 3] = (i * 8) as u8;
        }

        run_to(&mut ppu, &mut cart, 55, 260);
        assert!(ppu.status.contains(StatusRegister::SPRITE_OVERFLOW));
        assert_eq!(ppu.sprite_count, 8);
    }

    #[test]
    fn eight_or_fewer_sprites_do_not_overflow() {
        let (mut ppu, mut cart) = ppu_with_cart();
        ppu.write_register(&mut cart, 0x2001, 0x18);
        for i in 0..8 {
            ppu.oam[i * 4] = 50;
        }
        for i in 8..64 {
            ppu.oam[i * 4] = 220;
        }
        run_to(&mut ppu, &mut cart, 55, 260);
        assert!(!ppu.status.contains(StatusRegister::SPRITE_OVERFLOW));
    }

    #[test]
    fn overclock_lines_report_and_delay_vblank() {
        let config = EmuConfig {
            extra_scanlines_before_nmi: 10,
            ..EmuConfig::default()
        };
        let mut ppu = Ppu::new(&config);
        let mut cart = CartridgeSlot::new();

        run_to(&mut ppu, &mut cart, 245, 0);
        assert!(ppu.in_overclock_line());
        assert!(!ppu.status.vblank_active());

        run_to(&mut ppu, &mut cart, 251, 2);
        assert!(!ppu.in_overclock_line());
        assert!(ppu.status.vblank_active());
    }

    #[test]
    fn dendy_vblank_waits_for_line_291() {
        let config = EmuConfig {
            region: Region::Dendy,
            ..EmuConfig::default()
        };
        let mut ppu = Ppu::new(&config);
        let mut cart = CartridgeSlot::new();

        run_to(&mut ppu, &mut cart, 250, 0);
        assert!(!ppu.status.vblank_active());
        run_to(&mut ppu, &mut cart, 291, 2);
        assert!(ppu.status.vblank_active());
        run_to(&mut ppu, &mut cart, 311, 2);
        assert!(!ppu.status.vblank_active());
    }
}
