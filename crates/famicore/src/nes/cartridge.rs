use crate::nes::state::{Persist, StateError, StateReader, StateWriter};

pub mod nrom;
pub mod rom;
pub mod uxrom;

use rom::Mirroring;

/// Capability contract every cartridge chip satisfies. The bus router and
/// orchestrator only ever talk to this trait; concrete banking behavior
/// lives entirely behind it.
pub trait Mapper {
    /// iNES mapper number this chip answers to.
    fn id(&self) -> u8;

    /// CPU read, $4020-$5FFF register window and $8000-$FFFF PRG space.
    /// `None` means the chip does not drive the bus (open bus).
    fn read_prg(&mut self, addr: u16) -> Option<u8>;

    /// CPU write, $4020-$5FFF and $8000-$FFFF.
    fn write_prg(&mut self, addr: u16, value: u8);

    /// PPU read, $0000-$1FFF.
    fn read_chr(&mut self, addr: u16) -> u8;

    /// PPU write, $0000-$1FFF.
    fn write_chr(&mut self, addr: u16, value: u8);

    /// CPU read, $6000-$7FFF.
    fn read_save_ram(&mut self, _addr: u16) -> Option<u8> {
        None
    }

    /// CPU write, $6000-$7FFF.
    fn write_save_ram(&mut self, _addr: u16, _value: u8) {}

    /// Nametable arrangement.
    fn mirroring(&self) -> Mirroring;

    /// For `Mirroring::Custom`: which of the four 1KB pages backs `block`.
    fn custom_mirroring_page(&self, block: usize) -> usize {
        block & 1
    }

    /// Chips that carry their own nametable memory answer `true` here and
    /// serve those pages through `read_custom_nametable`.
    fn use_custom_nametable(&self, _index: usize) -> bool {
        false
    }

    fn read_custom_nametable(&mut self, _index: usize, _addr: u16) -> u8 {
        0
    }

    /// Clocked once per CPU cycle (mapper IRQ counters tick here).
    fn cycle(&mut self) {}

    /// Level of the cartridge IRQ line.
    fn irq_pending(&self) -> bool {
        false
    }

    /// PPU address line 12, reported on every PPU bus access. Scanline
    /// counters keyed to pattern-table fetches watch the rising edge.
    fn set_a12(&mut self, _high: bool) {}

    /// Bank-register state only; ROM contents are reconstructed from the
    /// cartridge itself on load.
    fn save_state(&self, _w: &mut StateWriter) {}

    fn load_state(&mut self, _r: &mut StateReader) -> Result<(), StateError> {
        Ok(())
    }
}

/// Fixed no-op chip handed out for unrecognized mapper IDs.
pub struct DummyMapper {
    id: u8,
}

impl DummyMapper {
    pub fn new(id: u8) -> DummyMapper {
        DummyMapper { id }
    }
}

impl Mapper for DummyMapper {
    fn id(&self) -> u8 {
        self.id
    }
    fn read_prg(&mut self, _addr: u16) -> Option<u8> {
        None
    }
    fn write_prg(&mut self, _addr: u16, _value: u8) {}
    fn read_chr(&mut self, _addr: u16) -> u8 {
        0
    }
    fn write_chr(&mut self, _addr: u16, _value: u8) {}
    fn mirroring(&self) -> Mirroring {
        Mirroring::Horizontal
    }
}

/// The console's cartridge connector. Empty slot floats the bus.
#[derive(Default)]
pub struct CartridgeSlot {
    mapper: Option<Box<dyn Mapper>>,
}

impl CartridgeSlot {
    pub fn new() -> CartridgeSlot {
        CartridgeSlot { mapper: None }
    }

    pub fn insert(&mut self, mapper: Box<dyn Mapper>) {
        self.mapper = Some(mapper);
    }

    pub fn eject(&mut self) {
        self.mapper = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.mapper.is_some()
    }

    pub fn mapper_id(&self) -> Option<u8> {
        self.mapper.as_ref().map(|m| m.id())
    }

    pub fn read_prg(&mut self, addr: u16) -> Option<u8> {
        self.mapper.as_mut().and_then(|m| m.read_prg(addr))
    }

    pub fn write_prg(&mut self, addr: u16, value: u8) {
        if let Some(m) = &mut self.mapper {
            m.write_prg(addr, value);
        }
    }

    pub fn read_save_ram(&mut self, addr: u16) -> Option<u8> {
        self.mapper.as_mut().and_then(|m| m.read_save_ram(addr))
    }

    pub fn write_save_ram(&mut self, addr: u16, value: u8) {
        if let Some(m) = &mut self.mapper {
            m.write_save_ram(addr, value);
        }
    }

    /// Every PPU bus access lands here first so A12-watching chips see
    /// their edges even for nametable traffic.
    pub fn ppu_bus_access(&mut self, addr: u16) {
        if let Some(m) = &mut self.mapper {
            m.set_a12(addr & 0x1000 != 0);
        }
    }

    pub fn read_chr(&mut self, addr: u16) -> u8 {
        match &mut self.mapper {
            Some(m) => m.read_chr(addr),
            None => 0,
        }
    }

    pub fn write_chr(&mut self, addr: u16, value: u8) {
        if let Some(m) = &mut self.mapper {
            m.write_chr(addr, value);
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        match &self.mapper {
            Some(m) => m.mirroring(),
            None => Mirroring::Horizontal,
        }
    }

    pub fn custom_mirroring_page(&self, block: usize) -> usize {
        match &self.mapper {
            Some(m) => m.custom_mirroring_page(block),
            None => block & 1,
        }
    }

    pub fn use_custom_nametable(&self, index: usize) -> bool {
        match &self.mapper {
            Some(m) => m.use_custom_nametable(index),
            None => false,
        }
    }

    pub fn read_custom_nametable(&mut self, index: usize, addr: u16) -> u8 {
        match &mut self.mapper {
            Some(m) => m.read_custom_nametable(index, addr),
            None => 0,
        }
    }

    pub fn cycle(&mut self) {
        if let Some(m) = &mut self.mapper {
            m.cycle();
        }
    }

    pub fn irq_pending(&self) -> bool {
        match &self.mapper {
            Some(m) => m.irq_pending(),
            None => false,
        }
    }
}


impl Persist for CartridgeSlot {
    fn save(&self, w: &mut StateWriter) {
        match &self.mapper {
            Some(m) => {
                w.push_u8(1);
                w.push_u8(m.id());
                m.save_state(w);
            }
            None => w.push_u8(0),
        }
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        let loaded = r.read_u8()? != 0;
        match (&mut self.mapper, loaded) {
            (Some(m), true) => {
                let id = r.read_u8()?;
                if id != m.id() {
                    return Err(StateError::CartridgeMismatch {
                        expected: m.id(),
                        found: id,
                    });
                }
                m.load_state(r)
            }
            (None, false) => Ok(()),
            (current, _) => Err(StateError::CartridgeMismatch {
                expected: current.as_ref().map(|m| m.id()).unwrap_or(0xFF),
                found: 0xFF,
            }),
        }
    }
}
