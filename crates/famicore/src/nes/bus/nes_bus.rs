use super::consts::*;
use crate::nes::apu::Apu;
use crate::nes::cartridge::CartridgeSlot;
use crate::nes::config::{EmuConfig, Region};
use crate::nes::controller::Joypad;
use crate::nes::cpu::CpuBus;
use crate::nes::dma::DmaEngine;
use crate::nes::ppu::Ppu;
use crate::nes::state::{Persist, StateError, StateReader, StateWriter};

/// Decodes the 16-bit address space and owns every non-CPU component.
/// One call to `clock_components` is one CPU cycle's worth of the rest of
/// the machine, in the fixed micro-order the timing depends on.
pub struct NesBus {
    pub ram: [u8; CPU_RAM_SIZE],
    pub ppu: Ppu,
    pub apu: Apu,
    pub dma: DmaEngine,
    pub cart: CartridgeSlot,
    pub joypads: [Joypad; 2],

    /// Last value driven onto the CPU data bus; unmapped reads return it.
    pub open_bus: u8,

    region: Region,
    pal_dot_counter: u8,
}

impl NesBus {
    pub fn new(config: &EmuConfig) -> NesBus {
        NesBus {
            ram: [0; CPU_RAM_SIZE],
            ppu: Ppu::new(config),
            apu: Apu::new(config.region),
            dma: DmaEngine::new(),
            cart: CartridgeSlot::new(),
            joypads: [Joypad::new(), Joypad::new()],
            open_bus: 0,
            region: config.region,
            pal_dot_counter: 0,
        }
    }

    pub fn reset_components(&mut self, config: &EmuConfig) {
        self.ram = [0; CPU_RAM_SIZE];
        self.ppu.reset(config);
        self.apu.reset();
        self.dma.reset();
        self.joypads = [Joypad::new(), Joypad::new()];
        self.open_bus = 0;
        self.pal_dot_counter = 0;
    }
}

impl CpuBus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            CPU_RAM_START..=CPU_RAM_END => self.ram[(addr & 0x07FF) as usize],
            PPU_REGISTERS_START..=PPU_REGISTERS_END => {
                self.ppu.read_register(&mut self.cart, addr)
            }
            APU_STATUS => self.apu.read_status(),
            CONTROLLER_1 => (self.joypads[0].read() & 0x1F) | (self.open_bus & 0xE0),
            CONTROLLER_2 => (self.joypads[1].read() & 0x1F) | (self.open_bus & 0xE0),
            // the DMA trigger and the rest of $40xx are write-only
            APU_REGISTERS_START..=OAM_DMA_TRIGGER | 0x4018..=0x401F => self.open_bus,
            MAPPER_WINDOW_START..=MAPPER_WINDOW_END | PRG_START..=PRG_END => {
                self.cart.read_prg(addr).unwrap_or(self.open_bus)
            }
            SAVE_RAM_START..=SAVE_RAM_END => {
                self.cart.read_save_ram(addr).unwrap_or(self.open_bus)
            }
        };
        self.open_bus = value;
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.open_bus = value;
        match addr {
            CPU_RAM_START..=CPU_RAM_END => self.ram[(addr & 0x07FF) as usize] = value,
            PPU_REGISTERS_START..=PPU_REGISTERS_END => {
                self.ppu.write_register(&mut self.cart, addr, value)
            }
            OAM_DMA_TRIGGER => self.dma.request_oam(value),
            CONTROLLER_1 => {
                // strobe line is shared by both ports
                self.joypads[0].write(value);
                self.joypads[1].write(value);
            }
            APU_REGISTERS_START..=APU_REGISTERS_END | APU_STATUS | CONTROLLER_2 => {
                self.apu.write(addr, value)
            }
            0x4018..=0x401F => { /* open bus */ }
            MAPPER_WINDOW_START..=MAPPER_WINDOW_END | PRG_START..=PRG_END => {
                self.cart.write_prg(addr, value)
            }
            SAVE_RAM_START..=SAVE_RAM_END => self.cart.write_save_ram(addr, value),
        }
    }

    fn clock_components(&mut self) {
        let overclocked = self.ppu.in_overclock_line();

        // APU first; a sample-fetch request it raises joins the DMA
        // arbitration before the CPU's own access happens
        if !overclocked {
            self.apu.cycle();
            if let Some((addr, is_reload)) = self.apu.take_dmc_fetch() {
                self.dma.request_dmc(addr, is_reload);
            }
        }

        // three dots per CPU cycle
        for _ in 0..3 {
            self.ppu.tick_dot(&mut self.cart);
        }

        // mapper IRQ counters tick once per CPU cycle
        if !overclocked {
            self.cart.cycle();
        }

        // PAL: one extra dot every fifth cycle (3.2 dots per cycle)
        if self.region == Region::Pal {
            self.pal_dot_counter += 1;
            if self.pal_dot_counter == 5 {
                self.pal_dot_counter = 0;
                self.ppu.tick_dot(&mut self.cart);
            }
        }
    }

    fn nmi_line(&mut self) -> bool {
        self.ppu.nmi_line()
    }

    fn irq_line(&mut self) -> bool {
        self.apu.irq_line() || self.cart.irq_pending()
    }

    fn dma(&mut self) -> &mut DmaEngine {
        &mut self.dma
    }

    fn dmc_read_complete(&mut self, value: u8) {
        self.apu.dmc_read_complete(value);
    }
}

impl Persist for NesBus {
    fn save(&self, w: &mut StateWriter) {
        w.push_bytes(&self.ram);
        w.push_u8(self.open_bus);
        w.push_u8(self.pal_dot_counter);
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        r.read_bytes(&mut self.ram)?;
        self.open_bus = r.read_u8()?;
        self.pal_dot_counter = r.read_u8()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_with_ram() -> NesBus {
        NesBus::new(&EmuConfig::default())
    }

    #[test]
    fn internal_ram_mirrors_every_0x800() {
        let mut bus = bus_with_ram();
        bus.write(0x0005, 0x42);
        assert_eq!(bus.read(0x0005), 0x42);
        assert_eq!(bus.read(0x0805), 0x42);
        assert_eq!(bus.read(0x1005), 0x42);
        assert_eq!(bus.read(0x1805), 0x42);
    }

    #[test]
    fn unmapped_reads_return_open_bus() {
        let mut bus = bus_with_ram();
        bus.write(0x0000, 0x5A);
        let _ = bus.read(0x0000); // drives the bus with 0x5A
        assert_eq!(bus.read(0x4018), 0x5A);
        // no cartridge: the whole upper space floats too
        assert_eq!(bus.read(0x8000), 0x5A);
        assert_eq!(bus.read(0x5000), 0x5A);
    }

    #[test]
    fn controller_reads_mix_in_open_bus_upper_bits() {
        let mut bus = bus_with_ram();
        bus.write(0x0000, 0xFF);
        let _ = bus.read(0x0000);
        let value = bus.read(0x4016);
        assert_eq!(value & 0xE0, 0xE0);
    }

    #[test]
    fn oam_dma_write_arms_the_engine() {
        let mut bus = bus_with_ram();
        bus.write(0x4014, 0x02);
        assert!(bus.dma.need_halt());
    }

    #[test]
    fn ppu_registers_mirror_every_8_bytes() {
        let mut bus = bus_with_ram();
        bus.write(0x2006, 0x21);
        bus.write(0x3FFE, 0x55); // mirror of $2006
        assert_eq!(bus.ppu.scroll.v, 0x2155);
    }
}
