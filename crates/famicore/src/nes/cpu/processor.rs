use super::opcodes::{self, AddressingMode, Op, Opcode};
use super::{Cpu, CpuBus, Flags};

impl<B: CpuBus> Cpu<B> {
    /// Run one instruction (or one interrupt sequence latched behind it).
    /// Returns the number of CPU cycles consumed.
    pub fn run_instruction(&mut self) -> u64 {
        let start = self.cycle_count;

        if self.jammed {
            // dead CPU, live machine: burn a cycle so PPU/APU advance
            self.dummy_read_pc();
            return self.cycle_count - start;
        }

        let code = self.read(self.program_counter);
        self.program_counter = self.program_counter.wrapping_add(1);
        self.current_opcode = code;

        match opcodes::lookup(code) {
            Some(op) => self.exec(op),
            // table holes behave like the jam encodings
            None => self.jammed = true,
        }

        if self.interrupt_pending() && !self.jammed {
            self.interrupt_sequence();
        }

        self.cycle_count - start
    }

    fn exec(&mut self, op: &'static Opcode) {
        use AddressingMode as M;

        if matches!(op.mode, M::Imp | M::Acc) {
            self.dummy_read_pc();
        }

        match op.op {
            // loads / stores
            Op::Lda => {
                let v = self.fetch_operand(op.mode);
                self.set_a(v);
            }
            Op::Ldx => {
                let v = self.fetch_operand(op.mode);
                self.set_x(v);
            }
            Op::Ldy => {
                let v = self.fetch_operand(op.mode);
                self.set_y(v);
            }
            Op::Sta => {
                let addr = self.operand_addr(op.mode);
                let a = self.register_a;
                self.write(addr, a);
            }
            Op::Stx => {
                let addr = self.operand_addr(op.mode);
                let x = self.register_x;
                self.write(addr, x);
            }
            Op::Sty => {
                let addr = self.operand_addr(op.mode);
                let y = self.register_y;
                self.write(addr, y);
            }

            // transfers
            Op::Tax => self.set_x(self.register_a),
            Op::Tay => self.set_y(self.register_a),
            Op::Tsx => self.set_x(self.stack_pointer),
            Op::Txa => self.set_a(self.register_x),
            Op::Txs => self.stack_pointer = self.register_x,
            Op::Tya => self.set_a(self.register_y),

            // arithmetic / logic
            Op::Adc => {
                let v = self.fetch_operand(op.mode);
                self.adc(v);
            }
            Op::Sbc => {
                let v = self.fetch_operand(op.mode);
                self.adc(v ^ 0xFF);
            }
            Op::And => {
                let v = self.fetch_operand(op.mode);
                self.set_a(self.register_a & v);
            }
            Op::Eor => {
                let v = self.fetch_operand(op.mode);
                self.set_a(self.register_a ^ v);
            }
            Op::Ora => {
                let v = self.fetch_operand(op.mode);
                self.set_a(self.register_a | v);
            }
            Op::Bit => {
                let v = self.fetch_operand(op.mode);
                self.status.set(Flags::ZERO, self.register_a & v == 0);
                self.status.set(Flags::NEGATIVE, v & 0x80 != 0);
                self.status.set(Flags::OVERFLOW, v & 0x40 != 0);
            }
            Op::Cmp => {
                let v = self.fetch_operand(op.mode);
                self.compare(self.register_a, v);
            }
            Op::Cpx => {
                let v = self.fetch_operand(op.mode);
                self.compare(self.register_x, v);
            }
            Op::Cpy => {
                let v = self.fetch_operand(op.mode);
                self.compare(self.register_y, v);
            }

            // shifts / rotates / inc / dec
            Op::Asl => self.modify(op.mode, Self::asl_value),
            Op::Lsr => self.modify(op.mode, Self::lsr_value),
            Op::Rol => self.modify(op.mode, Self::rol_value),
            Op::Ror => self.modify(op.mode, Self::ror_value),
            Op::Inc => self.modify(op.mode, Self::inc_value),
            Op::Dec => self.modify(op.mode, Self::dec_value),
            Op::Inx => self.set_x(self.register_x.wrapping_add(1)),
            Op::Iny => self.set_y(self.register_y.wrapping_add(1)),
            Op::Dex => self.set_x(self.register_x.wrapping_sub(1)),
            Op::Dey => self.set_y(self.register_y.wrapping_sub(1)),

            // flags
            Op::Clc => self.status.remove(Flags::CARRY),
            Op::Cld => self.status.remove(Flags::DECIMAL_MODE),
            Op::Cli => self.status.remove(Flags::INTERRUPT_DISABLE),
            Op::Clv => self.status.remove(Flags::OVERFLOW),
            Op::Sec => self.status.insert(Flags::CARRY),
            Op::Sed => self.status.insert(Flags::DECIMAL_MODE),
            Op::Sei => self.status.insert(Flags::INTERRUPT_DISABLE),

            // stack
            Op::Pha => {
                let a = self.register_a;
                self.stack_push(a);
            }
            Op::Php => {
                let bits = (self.status | Flags::BREAK | Flags::BREAK2).bits();
                self.stack_push(bits);
            }
            Op::Pla => {
                self.dummy_stack_read();
                let v = self.stack_pop();
                self.set_a(v);
            }
            Op::Plp => {
                self.dummy_stack_read();
                let v = self.stack_pop();
                self.set_status_from_stack(v);
            }

            // control flow
            Op::Jmp => {
                let addr = self.operand_addr(op.mode);
                self.program_counter = addr;
            }
            Op::Jsr => {
                let lo = self.consume_pc() as u16;
                self.dummy_stack_read();
                let pc = self.program_counter;
                self.stack_push((pc >> 8) as u8);
                self.stack_push(pc as u8);
                let hi = self.read(self.program_counter) as u16;
                self.program_counter = (hi << 8) | lo;
            }
            Op::Rts => {
                self.dummy_stack_read();
                let lo = self.stack_pop() as u16;
                let hi = self.stack_pop() as u16;
                self.dummy_read_pc();
                self.program_counter = ((hi << 8) | lo).wrapping_add(1);
            }
            Op::Rti => {
                self.dummy_stack_read();
                let flags = self.stack_pop();
                self.set_status_from_stack(flags);
                let lo = self.stack_pop() as u16;
                let hi = self.stack_pop() as u16;
                self.program_counter = (hi << 8) | lo;
            }
            Op::Brk => self.brk(),

            Op::Bcc => self.branch(!self.status.contains(Flags::CARRY)),
            Op::Bcs => self.branch(self.status.contains(Flags::CARRY)),
            Op::Beq => self.branch(self.status.contains(Flags::ZERO)),
            Op::Bmi => self.branch(self.status.contains(Flags::NEGATIVE)),
            Op::Bne => self.branch(!self.status.contains(Flags::ZERO)),
            Op::Bpl => self.branch(!self.status.contains(Flags::NEGATIVE)),
            Op::Bvc => self.branch(!self.status.contains(Flags::OVERFLOW)),
            Op::Bvs => self.branch(self.status.contains(Flags::OVERFLOW)),

            Op::Nop => {
                if !matches!(op.mode, M::Imp) {
                    let _ = self.fetch_operand(op.mode);
                }
            }

            // unofficial composites: shift and logic share the one RMW
            Op::Slo => self.modify_then(op.mode, Self::asl_value, |cpu, v| {
                cpu.set_a(cpu.register_a | v)
            }),
            Op::Rla => self.modify_then(op.mode, Self::rol_value, |cpu, v| {
                cpu.set_a(cpu.register_a & v)
            }),
            Op::Sre => self.modify_then(op.mode, Self::lsr_value, |cpu, v| {
                cpu.set_a(cpu.register_a ^ v)
            }),
            Op::Rra => self.modify_then(op.mode, Self::ror_value, Self::adc),
            Op::Dcp => self.modify_then(op.mode, Self::dec_value, |cpu, v| {
                cpu.compare(cpu.register_a, v)
            }),
            Op::Isb => self.modify_then(op.mode, Self::inc_value, |cpu, v| cpu.adc(v ^ 0xFF)),

            Op::Lax => {
                let v = self.fetch_operand(op.mode);
                self.set_a(v);
                self.set_x(v);
            }
            Op::Lxa => {
                let v = self.fetch_operand(op.mode);
                self.set_a(v);
                self.set_x(v);
            }
            Op::Sax => {
                let addr = self.operand_addr(op.mode);
                let v = self.register_a & self.register_x;
                self.write(addr, v);
            }

            Op::Anc => {
                let v = self.fetch_operand(op.mode);
                self.set_a(self.register_a & v);
                self.status
                    .set(Flags::CARRY, self.register_a & 0x80 != 0);
            }
            Op::Alr => {
                let v = self.fetch_operand(op.mode);
                let and = self.register_a & v;
                let shifted = self.lsr_value(and);
                self.set_a(shifted);
            }
            Op::Arr => {
                let v = self.fetch_operand(op.mode);
                let and = self.register_a & v;
                let carry_in = (self.status.contains(Flags::CARRY) as u8) << 7;
                let result = (and >> 1) | carry_in;
                self.set_a(result);
                self.status.set(Flags::CARRY, result & 0x40 != 0);
                self.status
                    .set(Flags::OVERFLOW, ((result >> 6) ^ (result >> 5)) & 1 != 0);
            }
            Op::Sbx => {
                let v = self.fetch_operand(op.mode);
                let and = self.register_a & self.register_x;
                self.status.set(Flags::CARRY, and >= v);
                self.set_x(and.wrapping_sub(v));
            }
            Op::Xaa => {
                let v = self.fetch_operand(op.mode);
                self.set_a(self.register_x & v);
            }
            Op::Las => {
                let v = self.fetch_operand(op.mode);
                let result = v & self.stack_pointer;
                self.stack_pointer = result;
                self.set_a(result);
                self.set_x(result);
            }

            Op::Sha => {
                let value = self.register_a & self.register_x;
                self.high_corrupt_store(op.mode, value);
            }
            Op::Shx => {
                let value = self.register_x;
                self.high_corrupt_store(op.mode, value);
            }
            Op::Shy => {
                let value = self.register_y;
                self.high_corrupt_store(op.mode, value);
            }
            Op::Tas => {
                self.stack_pointer = self.register_a & self.register_x;
                let value = self.register_a & self.register_x;
                self.high_corrupt_store(op.mode, value);
            }

            Op::Jam => {
                self.dummy_read_pc();
                self.program_counter = self.program_counter.wrapping_sub(1);
                self.jammed = true;
            }
        }
    }

    // ------------------------------------------------------------------
    // Operand fetch (each bus access below is one CPU cycle)
    // ------------------------------------------------------------------

    fn fetch_operand(&mut self, mode: AddressingMode) -> u8 {
        match mode {
            AddressingMode::Imm => self.consume_pc(),
            _ => {
                let addr = self.operand_addr(mode);
                self.read(addr)
            }
        }
    }

    fn operand_addr(&mut self, mode: AddressingMode) -> u16 {
        use AddressingMode as M;
        match mode {
            M::Zero => self.consume_pc() as u16,
            M::ZeroX => {
                let base = self.consume_pc();
                let _ = self.read(base as u16);
                base.wrapping_add(self.register_x) as u16
            }
            M::ZeroY => {
                let base = self.consume_pc();
                let _ = self.read(base as u16);
                base.wrapping_add(self.register_y) as u16
            }
            M::Abs => self.consume_pc_word(),
            M::AbsX => {
                let base = self.consume_pc_word();
                self.index(base, self.register_x, false)
            }
            M::AbsXW => {
                let base = self.consume_pc_word();
                self.index(base, self.register_x, true)
            }
            M::AbsY => {
                let base = self.consume_pc_word();
                self.index(base, self.register_y, false)
            }
            M::AbsYW => {
                let base = self.consume_pc_word();
                self.index(base, self.register_y, true)
            }
            M::Ind => {
                // JMP ($xxFF) wraps inside the page
                let ptr = self.consume_pc_word();
                let lo = self.read(ptr) as u16;
                let hi_addr = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
                let hi = self.read(hi_addr) as u16;
                (hi << 8) | lo
            }
            M::IndX => {
                let base = self.consume_pc();
                let _ = self.read(base as u16);
                let ptr = base.wrapping_add(self.register_x);
                self.read_zero_page_word(ptr)
            }
            M::IndY => {
                let ptr = self.consume_pc();
                let base = self.read_zero_page_word(ptr);
                self.index(base, self.register_y, false)
            }
            M::IndYW => {
                let ptr = self.consume_pc();
                let base = self.read_zero_page_word(ptr);
                self.index(base, self.register_y, true)
            }
            M::None | M::Imp | M::Acc | M::Imm | M::Rel => unreachable!(),
        }
    }

    /// Add an index register to a base address. The dummy read hits the
    /// address with the un-carried high byte, exactly what the bus sees.
    fn index(&mut self, base: u16, index: u8, force_dummy: bool) -> u16 {
        let addr = base.wrapping_add(index as u16);
        let crossed = (base & 0xFF00) != (addr & 0xFF00);
        if crossed || force_dummy {
            let dummy = (base & 0xFF00) | (addr & 0x00FF);
            let _ = self.read(dummy);
        }
        addr
    }

    fn read_zero_page_word(&mut self, ptr: u8) -> u16 {
        let lo = self.read(ptr as u16) as u16;
        let hi = self.read(ptr.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    /// Read-modify-write: the unmodified value is written back first.
    fn modify(&mut self, mode: AddressingMode, f: fn(&mut Self, u8) -> u8) {
        if mode == AddressingMode::Acc {
            let a = self.register_a;
            let result = f(self, a);
            self.set_a_keep_flags(result);
            return;
        }
        let addr = self.operand_addr(mode);
        let value = self.read(addr);
        self.write(addr, value);
        let result = f(self, value);
        self.write(addr, result);
    }

    /// RMW plus a follow-up ALU step on the written value (the combined
    /// unofficial ops).
    fn modify_then(
        &mut self,
        mode: AddressingMode,
        f: fn(&mut Self, u8) -> u8,
        then: fn(&mut Self, u8),
    ) {
        let addr = self.operand_addr(mode);
        let value = self.read(addr);
        self.write(addr, value);
        let result = f(self, value);
        self.write(addr, result);
        then(self, result);
    }

    /// The SHA/SHX/SHY/TAS family: the stored value is gated by the high
    /// address byte + 1, and on a page cross that value replaces the high
    /// byte of the target.
    fn high_corrupt_store(&mut self, mode: AddressingMode, value: u8) {
        let addr = self.operand_addr(mode);
        let hi = (addr >> 8) as u8;
        let stored = value & hi.wrapping_add(1);
        let target = ((stored as u16) << 8) | (addr & 0x00FF);
        self.write(target, stored);
    }

    fn branch(&mut self, condition: bool) {
        let offset = self.consume_pc() as i8;
        if condition {
            self.clear_branch_irq();
            self.dummy_read_pc();
            let target = self.program_counter.wrapping_add(offset as u16);
            if target & 0xFF00 != self.program_counter & 0xFF00 {
                self.dummy_read_pc();
            }
            self.program_counter = target;
        }
    }

    fn brk(&mut self) {
        let _ = self.consume_pc(); // padding byte
        let pc = self.program_counter;
        self.stack_push((pc >> 8) as u8);
        self.stack_push(pc as u8);

        // an NMI landing during the pushes steals the vector
        let hijacked = self.take_nmi_hijack();
        let bits = (self.status | Flags::BREAK | Flags::BREAK2).bits();
        self.stack_push(bits);
        self.status.insert(Flags::INTERRUPT_DISABLE);

        let vector = if hijacked {
            super::interrupts::NMI_VECTOR
        } else {
            super::interrupts::IRQ_VECTOR
        };
        let lo = self.read(vector) as u16;
        let hi = self.read(vector + 1) as u16;
        self.program_counter = (hi << 8) | lo;

        self.suppress_post_brk_nmi();
    }

    // ------------------------------------------------------------------
    // ALU helpers
    // ------------------------------------------------------------------

    fn set_nz(&mut self, value: u8) {
        self.status.set(Flags::ZERO, value == 0);
        self.status.set(Flags::NEGATIVE, value & 0x80 != 0);
    }

    fn set_a(&mut self, value: u8) {
        self.register_a = value;
        self.set_nz(value);
    }

    fn set_a_keep_flags(&mut self, value: u8) {
        // shift helpers already set NZ on the result
        self.register_a = value;
    }

    fn set_x(&mut self, value: u8) {
        self.register_x = value;
        self.set_nz(value);
    }

    fn set_y(&mut self, value: u8) {
        self.register_y = value;
        self.set_nz(value);
    }

    fn set_status_from_stack(&mut self, bits: u8) {
        self.status = Flags::from_bits_truncate(bits) - Flags::BREAK - Flags::BREAK2;
    }

    fn adc(&mut self, value: u8) {
        let a = self.register_a;
        let carry = self.status.contains(Flags::CARRY) as u16;
        let sum = a as u16 + value as u16 + carry;
        let result = sum as u8;

        self.status.set(Flags::CARRY, sum > 0xFF);
        self.status
            .set(Flags::OVERFLOW, (!(a ^ value) & (a ^ result) & 0x80) != 0);
        self.set_a(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.status.set(Flags::CARRY, register >= value);
        self.set_nz(register.wrapping_sub(value));
    }

    fn asl_value(&mut self, value: u8) -> u8 {
        self.status.set(Flags::CARRY, value & 0x80 != 0);
        let result = value << 1;
        self.set_nz(result);
        result
    }

    fn lsr_value(&mut self, value: u8) -> u8 {
        self.status.set(Flags::CARRY, value & 1 != 0);
        let result = value >> 1;
        self.set_nz(result);
        result
    }

    fn rol_value(&mut self, value: u8) -> u8 {
        let carry_in = self.status.contains(Flags::CARRY) as u8;
        self.status.set(Flags::CARRY, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.set_nz(result);
        result
    }

    fn ror_value(&mut self, value: u8) -> u8 {
        let carry_in = (self.status.contains(Flags::CARRY) as u8) << 7;
        self.status.set(Flags::CARRY, value & 1 != 0);
        let result = (value >> 1) | carry_in;
        self.set_nz(result);
        result
    }

    fn inc_value(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.set_nz(result);
        result
    }

    fn dec_value(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.set_nz(result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nes::bus::simple_bus::SimpleBus;
    use crate::nes::cpu::Cpu;

    fn cpu_with(program: &[u8], origin: u16) -> Cpu<SimpleBus> {
        let mut bus = SimpleBus::new();
        bus.load(origin, program);
        let mut cpu = Cpu::new(bus);
        cpu.program_counter = origin;
        cpu
    }

    #[test]
    fn lda_immediate_takes_two_cycles_and_sets_flags() {
        let mut cpu = cpu_with(&[0xA9, 0x00], 0x0200);
        assert_eq!(cpu.run_instruction(), 2);
        assert_eq!(cpu.register_a, 0);
        assert!(cpu.status.contains(Flags::ZERO));

        let mut cpu = cpu_with(&[0xA9, 0x80], 0x0200);
        cpu.run_instruction();
        assert!(cpu.status.contains(Flags::NEGATIVE));
    }

    #[test]
    fn absolute_indexed_read_pays_for_page_cross_only() {
        // LDA $02F0,X with X=0x05: no cross, 4 cycles
        let mut cpu = cpu_with(&[0xBD, 0xF0, 0x02], 0x0200);
        cpu.register_x = 0x05;
        assert_eq!(cpu.run_instruction(), 4);

        // X=0x20 crosses into $0310: 5 cycles
        let mut cpu = cpu_with(&[0xBD, 0xF0, 0x02], 0x0200);
        cpu.register_x = 0x20;
        assert_eq!(cpu.run_instruction(), 5);
    }

    #[test]
    fn indexed_store_always_pays_the_dummy_read() {
        let mut cpu = cpu_with(&[0x9D, 0xF0, 0x02], 0x0200);
        cpu.register_x = 0x05;
        cpu.register_a = 0xAA;
        assert_eq!(cpu.run_instruction(), 5);
        assert_eq!(cpu.bus.ram[0x02F5], 0xAA);
    }

    #[test]
    fn page_cross_dummy_read_hits_the_wrong_address() {
        // LDA $02F0,X with X=0x20 reads $0210 (uncarried) before $0310
        let mut cpu = cpu_with(&[0xBD, 0xF0, 0x02], 0x0200);
        cpu.register_x = 0x20;
        cpu.run_instruction();
        assert!(cpu.bus.reads.contains(&0x0210));
        assert!(cpu.bus.reads.contains(&0x0310));
    }

    #[test]
    fn rmw_performs_the_double_write() {
        // INC $10 (value 7): writes 7 then 8
        let mut cpu = cpu_with(&[0xE6, 0x10], 0x0200);
        cpu.bus.ram[0x10] = 7;
        assert_eq!(cpu.run_instruction(), 5);
        assert_eq!(cpu.bus.writes, vec![(0x0010, 7), (0x0010, 8)]);
        assert_eq!(cpu.bus.ram[0x10], 8);
    }

    #[test]
    fn zero_page_indexed_wraps_within_the_page() {
        let mut cpu = cpu_with(&[0xB5, 0xF8], 0x0200); // LDA $F8,X
        cpu.register_x = 0x10;
        cpu.bus.ram[0x08] = 0x42;
        cpu.run_instruction();
        assert_eq!(cpu.register_a, 0x42);
    }

    #[test]
    fn jmp_indirect_wraps_inside_the_page() {
        let mut cpu = cpu_with(&[0x6C, 0xFF, 0x02], 0x0400);
        cpu.bus.ram[0x02FF] = 0x34;
        cpu.bus.ram[0x0200] = 0x12; // high byte from $0200, not $0300
        assert_eq!(cpu.run_instruction(), 5);
        assert_eq!(cpu.program_counter, 0x1234);
    }

    #[test]
    fn branch_cycle_counts() {
        // not taken: 2
        let mut cpu = cpu_with(&[0xD0, 0x10], 0x0200); // BNE
        cpu.status.insert(Flags::ZERO);
        assert_eq!(cpu.run_instruction(), 2);

        // taken, same page: 3
        let mut cpu = cpu_with(&[0xD0, 0x10], 0x0200);
        assert_eq!(cpu.run_instruction(), 3);
        assert_eq!(cpu.program_counter, 0x0212);

        // taken, page cross: 4
        let mut cpu = cpu_with(&[0xD0, 0x7F], 0x0290);
        assert_eq!(cpu.run_instruction(), 4);
        assert_eq!(cpu.program_counter, 0x0311);
    }

    #[test]
    fn jsr_rts_round_trip() {
        let mut cpu = cpu_with(&[0x20, 0x00, 0x03], 0x0200); // JSR $0300
        cpu.bus.ram[0x0300] = 0x60; // RTS
        cpu.stack_pointer = 0xFD;

        assert_eq!(cpu.run_instruction(), 6);
        assert_eq!(cpu.program_counter, 0x0300);
        assert_eq!(cpu.run_instruction(), 6);
        assert_eq!(cpu.program_counter, 0x0203);
        assert_eq!(cpu.stack_pointer, 0xFD);
    }

    #[test]
    fn adc_sets_carry_and_overflow() {
        let mut cpu = cpu_with(&[0x69, 0x50], 0x0200);
        cpu.register_a = 0x50;
        cpu.run_instruction();
        assert_eq!(cpu.register_a, 0xA0);
        assert!(cpu.status.contains(Flags::OVERFLOW));
        assert!(!cpu.status.contains(Flags::CARRY));

        let mut cpu = cpu_with(&[0x69, 0x01], 0x0200);
        cpu.register_a = 0xFF;
        cpu.run_instruction();
        assert_eq!(cpu.register_a, 0x00);
        assert!(cpu.status.contains(Flags::CARRY));
        assert!(cpu.status.contains(Flags::ZERO));
    }

    #[test]
    fn sbc_borrow_semantics() {
        let mut cpu = cpu_with(&[0xE9, 0x30], 0x0200);
        cpu.register_a = 0x50;
        cpu.status.insert(Flags::CARRY);
        cpu.run_instruction();
        assert_eq!(cpu.register_a, 0x20);
        assert!(cpu.status.contains(Flags::CARRY));
    }

    #[test]
    fn unofficial_lax_loads_both_registers() {
        let mut cpu = cpu_with(&[0xA7, 0x10], 0x0200);
        cpu.bus.ram[0x10] = 0x5A;
        assert_eq!(cpu.run_instruction(), 3);
        assert_eq!(cpu.register_a, 0x5A);
        assert_eq!(cpu.register_x, 0x5A);
    }

    #[test]
    fn unofficial_slo_shifts_and_ors_in_one_instruction() {
        let mut cpu = cpu_with(&[0x07, 0x10], 0x0200);
        cpu.bus.ram[0x10] = 0b0100_0001;
        cpu.register_a = 0b0000_0001;
        assert_eq!(cpu.run_instruction(), 5);
        assert_eq!(cpu.bus.ram[0x10], 0b1000_0010);
        assert_eq!(cpu.register_a, 0b1000_0011);
        assert!(!cpu.status.contains(Flags::CARRY));
    }

    #[test]
    fn unofficial_dcp_decrements_then_compares() {
        let mut cpu = cpu_with(&[0xC7, 0x10], 0x0200);
        cpu.bus.ram[0x10] = 0x41;
        cpu.register_a = 0x40;
        cpu.run_instruction();
        assert_eq!(cpu.bus.ram[0x10], 0x40);
        assert!(cpu.status.contains(Flags::ZERO));
        assert!(cpu.status.contains(Flags::CARRY));
    }

    #[test]
    fn unofficial_sbx_subtracts_from_a_and_x() {
        let mut cpu = cpu_with(&[0xCB, 0x02], 0x0200);
        cpu.register_a = 0x0F;
        cpu.register_x = 0x07;
        cpu.run_instruction();
        assert_eq!(cpu.register_x, 0x05);
        assert!(cpu.status.contains(Flags::CARRY));
    }

    #[test]
    fn jam_freezes_the_cpu_without_crashing() {
        let mut cpu = cpu_with(&[0x02, 0xA9, 0x42], 0x0200);
        cpu.run_instruction();
        assert!(cpu.jammed);
        let pc = cpu.program_counter;
        cpu.run_instruction();
        cpu.run_instruction();
        assert_eq!(cpu.program_counter, pc);
        assert_eq!(cpu.register_a, 0x00);
    }

    #[test]
    fn nmi_fires_after_current_instruction() {
        let mut cpu = cpu_with(&[0xEA, 0xEA], 0x0200);
        cpu.bus.ram[0xFFFA] = 0x00;
        cpu.bus.ram[0xFFFB] = 0x80;

        cpu.bus.nmi_level = true;
        // the edge lands on the NOP's first cycle, so its own second-to-
        // last-cycle poll already sees it: NOP + 7-cycle sequence
        let cycles = cpu.run_instruction();
        assert_eq!(cycles, 2 + 7);
        assert_eq!(cpu.program_counter, 0x8000);
        assert!(cpu.status.contains(Flags::INTERRUPT_DISABLE));
    }

    #[test]
    fn nmi_is_edge_sensitive_not_level_sensitive() {
        let mut cpu = cpu_with(&[0xEA; 8], 0x0200);
        cpu.bus.ram[0xFFFA] = 0x00;
        cpu.bus.ram[0xFFFB] = 0x80;
        cpu.bus.ram[0x8000] = 0xEA;

        cpu.bus.nmi_level = true;
        cpu.run_instruction(); // NOP + NMI
        assert_eq!(cpu.program_counter, 0x8000);

        // line still high: no second NMI
        cpu.run_instruction();
        assert_eq!(cpu.program_counter, 0x8001);
    }

    #[test]
    fn irq_respects_interrupt_disable() {
        let mut cpu = cpu_with(&[0xEA, 0xEA, 0xEA], 0x0200);
        cpu.bus.ram[0xFFFE] = 0x00;
        cpu.bus.ram[0xFFFF] = 0x90;
        cpu.status.insert(Flags::INTERRUPT_DISABLE);

        cpu.bus.irq_level = true;
        cpu.run_instruction();
        cpu.run_instruction();
        assert_eq!(cpu.program_counter, 0x0202, "masked IRQ must not fire");
    }

    #[test]
    fn cli_takes_effect_one_instruction_late() {
        // CLI, NOP: the NOP after CLI still runs before the IRQ is taken
        let mut cpu = cpu_with(&[0x58, 0xEA, 0xEA], 0x0200);
        cpu.bus.ram[0xFFFE] = 0x00;
        cpu.bus.ram[0xFFFF] = 0x90;
        cpu.bus.ram[0x9000] = 0xEA;
        cpu.status.insert(Flags::INTERRUPT_DISABLE);
        cpu.bus.irq_level = true;

        cpu.run_instruction(); // CLI
        cpu.run_instruction(); // NOP still executes
        assert_eq!(cpu.program_counter, 0x9000, "IRQ taken after the NOP");
    }

    #[test]
    fn brk_pushes_break_flag_and_vectors_through_fffe() {
        let mut cpu = cpu_with(&[0x00, 0xFF], 0x0200);
        cpu.bus.ram[0xFFFE] = 0x00;
        cpu.bus.ram[0xFFFF] = 0x70;
        cpu.stack_pointer = 0xFD;

        assert_eq!(cpu.run_instruction(), 7);
        assert_eq!(cpu.program_counter, 0x7000);
        // pushed status has both break bits
        let pushed = cpu.bus.ram[0x01FB];
        assert_eq!(pushed & 0x30, 0x30);
        // pushed return address skips the padding byte
        assert_eq!(cpu.bus.ram[0x01FD], 0x02);
        assert_eq!(cpu.bus.ram[0x01FC], 0x02);
    }

    #[test]
    fn reset_takes_seven_cycles_and_loads_the_vector() {
        let mut bus = SimpleBus::new();
        bus.ram[0xFFFC] = 0x34;
        bus.ram[0xFFFD] = 0x12;
        let mut cpu = Cpu::new(bus);
        cpu.reset();
        assert_eq!(cpu.cycle_count, 7);
        assert_eq!(cpu.program_counter, 0x1234);
        assert_eq!(cpu.stack_pointer, 0xFD);
        assert!(cpu.status.contains(Flags::INTERRUPT_DISABLE));
    }
}
