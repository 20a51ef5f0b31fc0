use crate::nes::dma::{DmaEngine, DmaOp};
use crate::nes::state::{Persist, StateError, StateReader, StateWriter};

pub mod interrupts;
pub mod opcodes;
mod processor;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        const CARRY             = 0b0000_0001;
        const ZERO              = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL_MODE      = 0b0000_1000;
        const BREAK             = 0b0001_0000;
        const BREAK2            = 0b0010_0000;
        const OVERFLOW          = 0b0100_0000;
        const NEGATIVE          = 0b1000_0000;
    }
}

/// Everything the CPU can see. Every `read`/`write` is one bus access
/// inside one CPU cycle; `clock_components` advances the rest of the
/// machine for that cycle in the fixed micro-order.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);

    fn clock_components(&mut self) {}

    /// Level of the NMI line (PPU).
    fn nmi_line(&mut self) -> bool {
        false
    }

    /// Level of the IRQ line (APU frame/DMC + cartridge).
    fn irq_line(&mut self) -> bool {
        false
    }

    fn dma(&mut self) -> &mut DmaEngine;

    /// Deliver a DMA-fetched sample byte to the audio unit.
    fn dmc_read_complete(&mut self, _value: u8) {}
}

/// 6502 core. The instruction stepper never runs ahead of the bus: each
/// memory access it makes is itself a full machine cycle, so DMA stalls,
/// PPU dots and APU clocks all land mid-instruction exactly where the
/// hardware puts them.
pub struct Cpu<B: CpuBus> {
    pub bus: B,

    pub program_counter: u16,
    pub stack_pointer: u8,
    pub register_a: u8,
    pub register_x: u8,
    pub register_y: u8,
    pub status: Flags,

    pub cycle_count: u64,
    pub current_opcode: u8,
    pub jammed: bool,

    // NMI edge detector: the line is sampled every phi2; the latch pair
    // delays the result so the value that decides an instruction's fate
    // is the one from its second-to-last cycle.
    prev_nmi_level: bool,
    need_nmi: bool,
    prev_need_nmi: bool,

    // level-sensitive IRQ, same one-cycle-delayed pair
    run_irq: bool,
    prev_run_irq: bool,
}

impl<B: CpuBus> Cpu<B> {
    pub fn new(bus: B) -> Cpu<B> {
        Cpu {
            bus,
            program_counter: 0,
            stack_pointer: 0,
            register_a: 0,
            register_x: 0,
            register_y: 0,
            status: Flags::empty(),
            cycle_count: 0,
            current_opcode: 0,
            jammed: false,
            prev_nmi_level: false,
            need_nmi: false,
            prev_need_nmi: false,
            run_irq: false,
            prev_run_irq: false,
        }
    }

    /// Power-on / reset sequence: 7 cycles, ending on the vector fetch.
    pub fn reset(&mut self) {
        self.status.insert(Flags::INTERRUPT_DISABLE);
        self.stack_pointer = self.stack_pointer.wrapping_sub(3);
        self.jammed = false;
        self.need_nmi = false;
        self.prev_need_nmi = false;
        self.prev_nmi_level = false;
        self.run_irq = false;
        self.prev_run_irq = false;

        for _ in 0..5 {
            self.idle_cycle();
        }
        let lo = self.read(interrupts::RESET_VECTOR) as u16;
        let hi = self.read(interrupts::RESET_VECTOR + 1) as u16;
        self.program_counter = (hi << 8) | lo;
    }

    // ------------------------------------------------------------------
    // Cycle plumbing
    // ------------------------------------------------------------------

    fn start_cycle(&mut self) {
        self.cycle_count = self.cycle_count.wrapping_add(1);
        // phi1: the latched decisions age by one cycle
        self.prev_need_nmi = self.need_nmi;
        self.prev_run_irq = self.run_irq;
        self.bus.clock_components();
    }

    fn end_cycle(&mut self) {
        // phi2: sample the interrupt lines
        let nmi_level = self.bus.nmi_line();
        if !self.prev_nmi_level && nmi_level {
            self.need_nmi = true;
        }
        self.prev_nmi_level = nmi_level;
        self.run_irq = self.bus.irq_line() && !self.status.contains(Flags::INTERRUPT_DISABLE);
    }

    fn idle_cycle(&mut self) {
        self.start_cycle();
        self.end_cycle();
    }

    pub(super) fn read(&mut self, addr: u16) -> u8 {
        self.process_pending_dma(addr);
        self.start_cycle();
        let value = self.bus.read(addr);
        self.end_cycle();
        value
    }

    pub(super) fn write(&mut self, addr: u16, value: u8) {
        self.start_cycle();
        self.bus.write(addr, value);
        self.end_cycle();
    }

    // ------------------------------------------------------------------
    // DMA servicing
    // ------------------------------------------------------------------

    /// The DMA engine owns the bus from the CPU's next read cycle until it
    /// drains. Stolen cycles are real cycles: the PPU, APU and mapper all
    /// keep advancing underneath, and a sample fetch requested by the APU
    /// mid-transfer joins the arbitration on the fly.
    fn process_pending_dma(&mut self, read_addr: u16) {
        if !self.bus.dma().need_halt() {
            return;
        }

        // halt cycle: the CPU re-runs the read it was attempting
        self.start_cycle();
        let _ = self.bus.read(read_addr);
        self.end_cycle();
        self.bus.dma().begin();

        let mut latch = 0u8;
        while self.bus.dma().in_progress() {
            let get_cycle = (self.cycle_count + 1) & 1 == 0;
            match self.bus.dma().next_op(get_cycle) {
                DmaOp::OamRead(addr) => latch = self.dma_read(addr),
                DmaOp::OamWrite => self.dma_write(0x2004, latch),
                DmaOp::DmcRead(addr) => {
                    let value = self.dma_read(addr);
                    self.bus.dmc_read_complete(value);
                }
                DmaOp::Dummy => {
                    let _ = self.dma_read(read_addr);
                }
            }
        }
    }

    fn dma_read(&mut self, addr: u16) -> u8 {
        self.start_cycle();
        let value = self.bus.read(addr);
        self.end_cycle();
        value
    }

    fn dma_write(&mut self, addr: u16, value: u8) {
        self.start_cycle();
        self.bus.write(addr, value);
        self.end_cycle();
    }

    // ------------------------------------------------------------------
    // Interrupt machinery
    // ------------------------------------------------------------------

    pub(super) fn interrupt_pending(&self) -> bool {
        self.prev_run_irq || self.prev_need_nmi
    }

    /// 7-cycle hardware interrupt sequence. The vector is chosen after
    /// the PC pushes, so a late NMI hijacks an in-flight IRQ.
    pub(super) fn interrupt_sequence(&mut self) {
        self.dummy_read_pc();
        self.dummy_read_pc();
        self.stack_push((self.program_counter >> 8) as u8);
        self.stack_push(self.program_counter as u8);

        let take_nmi = self.need_nmi;
        if take_nmi {
            self.need_nmi = false;
        }

        self.stack_push((self.status | Flags::BREAK2).bits());
        self.status.insert(Flags::INTERRUPT_DISABLE);

        let vector = if take_nmi {
            interrupts::NMI_VECTOR
        } else {
            interrupts::IRQ_VECTOR
        };
        let lo = self.read(vector) as u16;
        let hi = self.read(vector + 1) as u16;
        self.program_counter = (hi << 8) | lo;
    }

    pub(super) fn clear_branch_irq(&mut self) {
        // a taken non-page-crossing branch ignores an IRQ raised on its
        // final cycle; the next instruction runs first
        if self.run_irq && !self.prev_run_irq {
            self.run_irq = false;
        }
    }

    pub(super) fn suppress_post_brk_nmi(&mut self) {
        self.prev_need_nmi = false;
    }

    pub(super) fn take_nmi_hijack(&mut self) -> bool {
        let take = self.need_nmi;
        if take {
            self.need_nmi = false;
        }
        take
    }

    // ------------------------------------------------------------------
    // Small bus helpers
    // ------------------------------------------------------------------

    pub(super) fn dummy_read_pc(&mut self) {
        let pc = self.program_counter;
        let _ = self.read(pc);
    }

    pub(super) fn consume_pc(&mut self) -> u8 {
        let byte = self.read(self.program_counter);
        self.program_counter = self.program_counter.wrapping_add(1);
        byte
    }

    pub(super) fn consume_pc_word(&mut self) -> u16 {
        let lo = self.consume_pc() as u16;
        let hi = self.consume_pc() as u16;
        (hi << 8) | lo
    }

    pub(super) fn stack_push(&mut self, value: u8) {
        self.write(0x0100 + self.stack_pointer as u16, value);
        self.stack_pointer = self.stack_pointer.wrapping_sub(1);
    }

    pub(super) fn stack_pop(&mut self) -> u8 {
        self.stack_pointer = self.stack_pointer.wrapping_add(1);
        self.read(0x0100 + self.stack_pointer as u16)
    }

    pub(super) fn dummy_stack_read(&mut self) {
        let _ = self.read(0x0100 + self.stack_pointer as u16);
    }
}

impl<B: CpuBus> Persist for Cpu<B> {
    fn save(&self, w: &mut StateWriter) {
        w.push_u16(self.program_counter);
        w.push_u8(self.stack_pointer);
        w.push_u8(self.register_a);
        w.push_u8(self.register_x);
        w.push_u8(self.register_y);
        w.push_u8(self.status.bits());
        w.push_u64(self.cycle_count);
        w.push_u8(self.current_opcode);
        w.push_bool(self.jammed);
        w.push_bool(self.prev_nmi_level);
        w.push_bool(self.need_nmi);
        w.push_bool(self.prev_need_nmi);
        w.push_bool(self.run_irq);
        w.push_bool(self.prev_run_irq);
    }

    fn load(&mut self, r: &mut StateReader) -> Result<(), StateError> {
        self.program_counter = r.read_u16()?;
        self.stack_pointer = r.read_u8()?;
        self.register_a = r.read_u8()?;
        self.register_x = r.read_u8()?;
        self.register_y = r.read_u8()?;
        self.status = Flags::from_bits_truncate(r.read_u8()?);
        self.cycle_count = r.read_u64()?;
        self.current_opcode = r.read_u8()?;
        self.jammed = r.read_bool()?;
        self.prev_nmi_level = r.read_bool()?;
        self.need_nmi = r.read_bool()?;
        self.prev_need_nmi = r.read_bool()?;
        self.run_irq = r.read_bool()?;
        self.prev_run_irq = r.read_bool()?;
        Ok(())
    }
}
