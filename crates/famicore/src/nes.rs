use std::collections::VecDeque;

use thiserror::Error;

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod config;
pub mod controller;
pub mod cpu;
pub mod dma;
pub mod ppu;
pub mod state;

use bus::nes_bus::NesBus;
use cartridge::rom::{Rom, RomError};
use config::EmuConfig;
use controller::Buttons;
use cpu::Cpu;
use state::{Persist, StateError, StateReader, StateWriter};

const STATE_MAGIC: &[u8; 4] = b"FCST";
const STATE_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("CPU jammed on opcode {opcode:02X} at {pc:04X}")]
    CpuJam { opcode: u8, pc: u16 },

    #[error("no cartridge loaded")]
    NoCartridge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

/// The whole machine. Owns the CPU, which owns the bus, which owns every
/// other component; one `step_instruction` call advances everything in
/// lock-step because the CPU's own memory accesses drive the clock.
pub struct Nes {
    pub cpu: Cpu<NesBus>,
    pub run_state: RunState,
    config: EmuConfig,
    rewind: VecDeque<Vec<u8>>,
}

impl Nes {
    pub fn new(config: EmuConfig) -> Nes {
        let bus = NesBus::new(&config);
        Nes {
            cpu: Cpu::new(bus),
            run_state: RunState::Running,
            config,
            rewind: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &EmuConfig {
        &self.config
    }

    /// Parse and insert a ROM image, then power-cycle. Any error leaves
    /// the machine exactly as it was (including still-unloaded).
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<(), RomError> {
        let rom = Rom::parse(bytes)?;
        let mapper = rom.into_mapper()?;
        self.cpu.bus.cart.insert(mapper);
        self.power_on();
        Ok(())
    }

    pub fn eject_cartridge(&mut self) {
        self.cpu.bus.cart.eject();
        self.power_on();
    }

    pub fn is_loaded(&self) -> bool {
        self.cpu.bus.cart.is_loaded()
    }

    /// Full power cycle: every component back to its initial state, then
    /// the CPU's 7-cycle reset sequence.
    fn power_on(&mut self) {
        let config = self.config.clone();
        self.cpu.bus.reset_components(&config);

        self.cpu.program_counter = 0;
        self.cpu.stack_pointer = 0;
        self.cpu.register_a = 0;
        self.cpu.register_x = 0;
        self.cpu.register_y = 0;
        self.cpu.status = cpu::Flags::empty();
        self.cpu.cycle_count = 0;
        self.cpu.current_opcode = 0;

        if self.is_loaded() {
            self.cpu.reset();
        }
        self.rewind.clear();
        self.run_state = RunState::Running;
    }

    /// Soft reset (the console's reset button).
    pub fn reset(&mut self) {
        if self.is_loaded() {
            self.cpu.reset();
            self.run_state = RunState::Running;
        }
    }

    /// Run one CPU instruction; every other component advances underneath
    /// it. Returns cycles consumed.
    pub fn step_instruction(&mut self) -> Result<u64, EmuError> {
        if !self.is_loaded() {
            return Err(EmuError::NoCartridge);
        }

        let cycles = self.cpu.run_instruction();
        if self.cpu.jammed {
            self.run_state = RunState::Paused;
            log::warn!(
                "CPU jammed on opcode {:02X} at {:04X}",
                self.cpu.current_opcode,
                self.cpu.program_counter
            );
            return Err(EmuError::CpuJam {
                opcode: self.cpu.current_opcode,
                pc: self.cpu.program_counter,
            });
        }
        Ok(cycles)
    }

    /// Run until the PPU finishes the current frame.
    pub fn run_frame(&mut self) -> Result<(), EmuError> {
        let frame = self.cpu.bus.ppu.frame;
        while self.cpu.bus.ppu.frame == frame {
            self.step_instruction()?;
        }
        self.cpu.bus.apu.end_audio_frame();
        self.push_rewind_snapshot();
        Ok(())
    }

    pub fn frame_buffer(&self) -> &[u16] {
        &self.cpu.bus.ppu.frame_buffer[..]
    }

    pub fn set_buttons(&mut self, port: usize, buttons: Buttons) {
        if let Some(pad) = self.cpu.bus.joypads.get_mut(port) {
            pad.set_buttons(buttons);
        }
    }

    // ------------------------------------------------------------------
    // Audio host surface
    // ------------------------------------------------------------------

    pub fn set_audio_sample_rate(&mut self, sample_rate: u32) {
        self.cpu.bus.apu.mixer.set_sample_rate(sample_rate);
    }

    pub fn audio_samples_available(&self) -> usize {
        self.cpu.bus.apu.mixer.samples_available()
    }

    pub fn read_audio_samples(&mut self, out: &mut [f32]) -> usize {
        self.cpu.bus.apu.mixer.read_samples_f32(out)
    }

    // ------------------------------------------------------------------
    // Save states and rewind
    // ------------------------------------------------------------------

    /// Linear, type-ordered byte stream: CPU, cartridge, PPU, APU,
    /// internal RAM, controllers, timing settings, DMA.
    pub fn save_state(&self) -> Vec<u8> {
        let mut w = StateWriter::new();
        w.push_bytes(STATE_MAGIC);
        w.push_u16(STATE_VERSION);

        self.cpu.save(&mut w);
        self.cpu.bus.cart.save(&mut w);
        self.cpu.bus.ppu.save(&mut w);
        self.cpu.bus.apu.save(&mut w);
        self.cpu.bus.save(&mut w);
        self.cpu.bus.joypads[0].save(&mut w);
        self.cpu.bus.joypads[1].save(&mut w);
        self.config.region.save(&mut w);
        w.push_u16(self.config.extra_scanlines_before_nmi);
        w.push_u16(self.config.extra_scanlines_after_nmi);
        self.cpu.bus.dma.save(&mut w);

        w.into_bytes()
    }

    /// Restore a snapshot. On any error the machine is left exactly as it
    /// was (the load runs against a scratch restore point).
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let restore_point = self.save_state();
        match self.apply_state(data) {
            Ok(()) => Ok(()),
            Err(err) => {
                // the restore point came from save_state, it always parses
                let _ = self.apply_state(&restore_point);
                Err(err)
            }
        }
    }

    fn apply_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let mut r = StateReader::new(data);

        let mut magic = [0u8; 4];
        r.read_bytes(&mut magic)?;
        if &magic != STATE_MAGIC {
            return Err(StateError::BadMagic);
        }
        let version = r.read_u16()?;
        if version != STATE_VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }

        self.cpu.load(&mut r)?;
        self.cpu.bus.cart.load(&mut r)?;
        self.cpu.bus.ppu.load(&mut r)?;
        self.cpu.bus.apu.load(&mut r)?;
        self.cpu.bus.load(&mut r)?;
        self.cpu.bus.joypads[0].load(&mut r)?;
        self.cpu.bus.joypads[1].load(&mut r)?;

        let mut region = self.config.region;
        region.load(&mut r)?;
        let before_nmi = r.read_u16()?;
        let after_nmi = r.read_u16()?;
        if region != self.config.region
            || before_nmi != self.config.extra_scanlines_before_nmi
            || after_nmi != self.config.extra_scanlines_after_nmi
        {
            return Err(StateError::InvalidField("timing settings"));
        }

        self.cpu.bus.dma.load(&mut r)?;
        Ok(())
    }

    fn push_rewind_snapshot(&mut self) {
        if self.config.rewind_capacity == 0 {
            return;
        }
        if self.rewind.len() >= self.config.rewind_capacity {
            self.rewind.pop_front();
        }
        self.rewind.push_back(self.save_state());
    }

    /// Step one frame back in time. Returns false when the ring is empty.
    pub fn rewind(&mut self) -> bool {
        match self.rewind.pop_back() {
            Some(snapshot) => {
                // snapshots in the ring always parse; a failure here would
                // mean the ring was corrupted, so surface it loudly
                if let Err(err) = self.load_state(&snapshot) {
                    log::error!("rewind snapshot failed to load: {err}");
                    return false;
                }
                self.run_state = RunState::Running;
                true
            }
            None => false,
        }
    }
}
