use once_cell::sync::Lazy;
use std::collections::HashMap;

/// The 17 operand-fetch shapes. The `W` variants are the write/modify
/// forms that always burn a dummy read on the partially-carried address;
/// the plain indexed forms only do so when the index crosses a page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    None, // jam opcodes
    Imp,
    Acc,
    Imm,
    Rel,
    Zero,
    ZeroX,
    ZeroY,
    Abs,
    AbsX,
    AbsXW,
    AbsY,
    AbsYW,
    Ind,
    IndX,
    IndY,
    IndYW,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Op {
    // official
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx,
    Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp,
    Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay,
    Tsx, Txa, Txs, Tya,
    // unofficial
    Slo, Rla, Sre, Rra, Sax, Lax, Lxa, Dcp, Isb, Anc, Alr, Arr, Sbx,
    Xaa, Sha, Shx, Shy, Tas, Las, Jam,
}

#[derive(Debug)]
pub struct Opcode {
    pub code: u8,
    pub name: &'static str,
    pub mode: AddressingMode,
    pub op: Op,
    /// Base cycle count (page-cross penalties excluded); emerges from the
    /// bus accesses at run time, kept here for the timing tests.
    pub cycles: u8,
}

impl Opcode {
    pub const fn new(code: u8, name: &'static str, mode: AddressingMode, op: Op, cycles: u8) -> Self {
        Self { code, name, mode, op, cycles }
    }
}

#[rustfmt::skip]
pub const OPCODES: &[Opcode] = &[
    // Software interrupt
    Opcode::new(0x00, "BRK", AddressingMode::Imm, Op::Brk, 7),

    // Loads
    Opcode::new(0xA9, "LDA", AddressingMode::Imm,  Op::Lda, 2),
    Opcode::new(0xA5, "LDA", AddressingMode::Zero, Op::Lda, 3),
    Opcode::new(0xB5, "LDA", AddressingMode::ZeroX, Op::Lda, 4),
    Opcode::new(0xAD, "LDA", AddressingMode::Abs,  Op::Lda, 4),
    Opcode::new(0xBD, "LDA", AddressingMode::AbsX, Op::Lda, 4), // +1 on page cross
    Opcode::new(0xB9, "LDA", AddressingMode::AbsY, Op::Lda, 4), // +1 on page cross
    Opcode::new(0xA1, "LDA", AddressingMode::IndX, Op::Lda, 6),
    Opcode::new(0xB1, "LDA", AddressingMode::IndY, Op::Lda, 5), // +1 on page cross

    Opcode::new(0xA2, "LDX", AddressingMode::Imm,  Op::Ldx, 2),
    Opcode::new(0xA6, "LDX", AddressingMode::Zero, Op::Ldx, 3),
    Opcode::new(0xB6, "LDX", AddressingMode::ZeroY, Op::Ldx, 4),
    Opcode::new(0xAE, "LDX", AddressingMode::Abs,  Op::Ldx, 4),
    Opcode::new(0xBE, "LDX", AddressingMode::AbsY, Op::Ldx, 4), // +1 on page cross

    Opcode::new(0xA0, "LDY", AddressingMode::Imm,  Op::Ldy, 2),
    Opcode::new(0xA4, "LDY", AddressingMode::Zero, Op::Ldy, 3),
    Opcode::new(0xB4, "LDY", AddressingMode::ZeroX, Op::Ldy, 4),
    Opcode::new(0xAC, "LDY", AddressingMode::Abs,  Op::Ldy, 4),
    Opcode::new(0xBC, "LDY", AddressingMode::AbsX, Op::Ldy, 4), // +1 on page cross

    // Stores
    Opcode::new(0x85, "STA", AddressingMode::Zero,  Op::Sta, 3),
    Opcode::new(0x95, "STA", AddressingMode::ZeroX, Op::Sta, 4),
    Opcode::new(0x8D, "STA", AddressingMode::Abs,   Op::Sta, 4),
    Opcode::new(0x9D, "STA", AddressingMode::AbsXW, Op::Sta, 5),
    Opcode::new(0x99, "STA", AddressingMode::AbsYW, Op::Sta, 5),
    Opcode::new(0x81, "STA", AddressingMode::IndX,  Op::Sta, 6),
    Opcode::new(0x91, "STA", AddressingMode::IndYW, Op::Sta, 6),

    Opcode::new(0x86, "STX", AddressingMode::Zero,  Op::Stx, 3),
    Opcode::new(0x96, "STX", AddressingMode::ZeroY, Op::Stx, 4),
    Opcode::new(0x8E, "STX", AddressingMode::Abs,   Op::Stx, 4),

    Opcode::new(0x84, "STY", AddressingMode::Zero,  Op::Sty, 3),
    Opcode::new(0x94, "STY", AddressingMode::ZeroX, Op::Sty, 4),
    Opcode::new(0x8C, "STY", AddressingMode::Abs,   Op::Sty, 4),

    // Transfers
    Opcode::new(0xAA, "TAX", AddressingMode::Imp, Op::Tax, 2),
    Opcode::new(0xA8, "TAY", AddressingMode::Imp, Op::Tay, 2),
    Opcode::new(0xBA, "TSX", AddressingMode::Imp, Op::Tsx, 2),
    Opcode::new(0x8A, "TXA", AddressingMode::Imp, Op::Txa, 2),
    Opcode::new(0x9A, "TXS", AddressingMode::Imp, Op::Txs, 2),
    Opcode::new(0x98, "TYA", AddressingMode::Imp, Op::Tya, 2),

    // Arithmetic
    Opcode::new(0x69, "ADC", AddressingMode::Imm,  Op::Adc, 2),
    Opcode::new(0x65, "ADC", AddressingMode::Zero, Op::Adc, 3),
    Opcode::new(0x75, "ADC", AddressingMode::ZeroX, Op::Adc, 4),
    Opcode::new(0x6D, "ADC", AddressingMode::Abs,  Op::Adc, 4),
    Opcode::new(0x7D, "ADC", AddressingMode::AbsX, Op::Adc, 4), // +1 on page cross
    Opcode::new(0x79, "ADC", AddressingMode::AbsY, Op::Adc, 4), // +1 on page cross
    Opcode::new(0x61, "ADC", AddressingMode::IndX, Op::Adc, 6),
    Opcode::new(0x71, "ADC", AddressingMode::IndY, Op::Adc, 5), // +1 on page cross

    Opcode::new(0xE9, "SBC", AddressingMode::Imm,  Op::Sbc, 2),
    Opcode::new(0xE5, "SBC", AddressingMode::Zero, Op::Sbc, 3),
    Opcode::new(0xF5, "SBC", AddressingMode::ZeroX, Op::Sbc, 4),
    Opcode::new(0xED, "SBC", AddressingMode::Abs,  Op::Sbc, 4),
    Opcode::new(0xFD, "SBC", AddressingMode::AbsX, Op::Sbc, 4), // +1 on page cross
    Opcode::new(0xF9, "SBC", AddressingMode::AbsY, Op::Sbc, 4), // +1 on page cross
    Opcode::new(0xE1, "SBC", AddressingMode::IndX, Op::Sbc, 6),
    Opcode::new(0xF1, "SBC", AddressingMode::IndY, Op::Sbc, 5), // +1 on page cross

    // Logic
    Opcode::new(0x29, "AND", AddressingMode::Imm,  Op::And, 2),
    Opcode::new(0x25, "AND", AddressingMode::Zero, Op::And, 3),
    Opcode::new(0x35, "AND", AddressingMode::ZeroX, Op::And, 4),
    Opcode::new(0x2D, "AND", AddressingMode::Abs,  Op::And, 4),
    Opcode::new(0x3D, "AND", AddressingMode::AbsX, Op::And, 4), // +1 on page cross
    Opcode::new(0x39, "AND", AddressingMode::AbsY, Op::And, 4), // +1 on page cross
    Opcode::new(0x21, "AND", AddressingMode::IndX, Op::And, 6),
    Opcode::new(0x31, "AND", AddressingMode::IndY, Op::And, 5), // +1 on page cross

    Opcode::new(0x49, "EOR", AddressingMode::Imm,  Op::Eor, 2),
    Opcode::new(0x45, "EOR", AddressingMode::Zero, Op::Eor, 3),
    Opcode::new(0x55, "EOR", AddressingMode::ZeroX, Op::Eor, 4),
    Opcode::new(0x4D, "EOR", AddressingMode::Abs,  Op::Eor, 4),
    Opcode::new(0x5D, "EOR", AddressingMode::AbsX, Op::Eor, 4), // +1 on page cross
    Opcode::new(0x59, "EOR", AddressingMode::AbsY, Op::Eor, 4), // +1 on page cross
    Opcode::new(0x41, "EOR", AddressingMode::IndX, Op::Eor, 6),
    Opcode::new(0x51, "EOR", AddressingMode::IndY, Op::Eor, 5), // +1 on page cross

    Opcode::new(0x09, "ORA", AddressingMode::Imm,  Op::Ora, 2),
    Opcode::new(0x05, "ORA", AddressingMode::Zero, Op::Ora, 3),
    Opcode::new(0x15, "ORA", AddressingMode::ZeroX, Op::Ora, 4),
    Opcode::new(0x0D, "ORA", AddressingMode::Abs,  Op::Ora, 4),
    Opcode::new(0x1D, "ORA", AddressingMode::AbsX, Op::Ora, 4), // +1 on page cross
    Opcode::new(0x19, "ORA", AddressingMode::AbsY, Op::Ora, 4), // +1 on page cross
    Opcode::new(0x01, "ORA", AddressingMode::IndX, Op::Ora, 6),
    Opcode::new(0x11, "ORA", AddressingMode::IndY, Op::Ora, 5), // +1 on page cross

    Opcode::new(0x24, "BIT", AddressingMode::Zero, Op::Bit, 3),
    Opcode::new(0x2C, "BIT", AddressingMode::Abs,  Op::Bit, 4),

    // Compares
    Opcode::new(0xC9, "CMP", AddressingMode::Imm,  Op::Cmp, 2),
    Opcode::new(0xC5, "CMP", AddressingMode::Zero, Op::Cmp, 3),
    Opcode::new(0xD5, "CMP", AddressingMode::ZeroX, Op::Cmp, 4),
    Opcode::new(0xCD, "CMP", AddressingMode::Abs,  Op::Cmp, 4),
    Opcode::new(0xDD, "CMP", AddressingMode::AbsX, Op::Cmp, 4), // +1 on page cross
    Opcode::new(0xD9, "CMP", AddressingMode::AbsY, Op::Cmp, 4), // +1 on page cross
    Opcode::new(0xC1, "CMP", AddressingMode::IndX, Op::Cmp, 6),
    Opcode::new(0xD1, "CMP", AddressingMode::IndY, Op::Cmp, 5), // +1 on page cross

    Opcode::new(0xE0, "CPX", AddressingMode::Imm,  Op::Cpx, 2),
    Opcode::new(0xE4, "CPX", AddressingMode::Zero, Op::Cpx, 3),
    Opcode::new(0xEC, "CPX", AddressingMode::Abs,  Op::Cpx, 4),

    Opcode::new(0xC0, "CPY", AddressingMode::Imm,  Op::Cpy, 2),
    Opcode::new(0xC4, "CPY", AddressingMode::Zero, Op::Cpy, 3),
    Opcode::new(0xCC, "CPY", AddressingMode::Abs,  Op::Cpy, 4),

    // Shifts and rotates
    Opcode::new(0x0A, "ASL", AddressingMode::Acc,   Op::Asl, 2),
    Opcode::new(0x06, "ASL", AddressingMode::Zero,  Op::Asl, 5),
    Opcode::new(0x16, "ASL", AddressingMode::ZeroX, Op::Asl, 6),
    Opcode::new(0x0E, "ASL", AddressingMode::Abs,   Op::Asl, 6),
    Opcode::new(0x1E, "ASL", AddressingMode::AbsXW, Op::Asl, 7),

    Opcode::new(0x4A, "LSR", AddressingMode::Acc,   Op::Lsr, 2),
    Opcode::new(0x46, "LSR", AddressingMode::Zero,  Op::Lsr, 5),
    Opcode::new(0x56, "LSR", AddressingMode::ZeroX, Op::Lsr, 6),
    Opcode::new(0x4E, "LSR", AddressingMode::Abs,   Op::Lsr, 6),
    Opcode::new(0x5E, "LSR", AddressingMode::AbsXW, Op::Lsr, 7),

    Opcode::new(0x2A, "ROL", AddressingMode::Acc,   Op::Rol, 2),
    Opcode::new(0x26, "ROL", AddressingMode::Zero,  Op::Rol, 5),
    Opcode::new(0x36, "ROL", AddressingMode::ZeroX, Op::Rol, 6),
    Opcode::new(0x2E, "ROL", AddressingMode::Abs,   Op::Rol, 6),
    Opcode::new(0x3E, "ROL", AddressingMode::AbsXW, Op::Rol, 7),

    Opcode::new(0x6A, "ROR", AddressingMode::Acc,   Op::Ror, 2),
    Opcode::new(0x66, "ROR", AddressingMode::Zero,  Op::Ror, 5),
    Opcode::new(0x76, "ROR", AddressingMode::ZeroX, Op::Ror, 6),
    Opcode::new(0x6E, "ROR", AddressingMode::Abs,   Op::Ror, 6),
    Opcode::new(0x7E, "ROR", AddressingMode::AbsXW, Op::Ror, 7),

    // Increments / decrements
    Opcode::new(0xE6, "INC", AddressingMode::Zero,  Op::Inc, 5),
    Opcode::new(0xF6, "INC", AddressingMode::ZeroX, Op::Inc, 6),
    Opcode::new(0xEE, "INC", AddressingMode::Abs,   Op::Inc, 6),
    Opcode::new(0xFE, "INC", AddressingMode::AbsXW, Op::Inc, 7),
    Opcode::new(0xE8, "INX", AddressingMode::Imp,   Op::Inx, 2),
    Opcode::new(0xC8, "INY", AddressingMode::Imp,   Op::Iny, 2),

    Opcode::new(0xC6, "DEC", AddressingMode::Zero,  Op::Dec, 5),
    Opcode::new(0xD6, "DEC", AddressingMode::ZeroX, Op::Dec, 6),
    Opcode::new(0xCE, "DEC", AddressingMode::Abs,   Op::Dec, 6),
    Opcode::new(0xDE, "DEC", AddressingMode::AbsXW, Op::Dec, 7),
    Opcode::new(0xCA, "DEX", AddressingMode::Imp,   Op::Dex, 2),
    Opcode::new(0x88, "DEY", AddressingMode::Imp,   Op::Dey, 2),

    // Flags
    Opcode::new(0x18, "CLC", AddressingMode::Imp, Op::Clc, 2),
    Opcode::new(0xD8, "CLD", AddressingMode::Imp, Op::Cld, 2),
    Opcode::new(0x58, "CLI", AddressingMode::Imp, Op::Cli, 2),
    Opcode::new(0xB8, "CLV", AddressingMode::Imp, Op::Clv, 2),
    Opcode::new(0x38, "SEC", AddressingMode::Imp, Op::Sec, 2),
    Opcode::new(0xF8, "SED", AddressingMode::Imp, Op::Sed, 2),
    Opcode::new(0x78, "SEI", AddressingMode::Imp, Op::Sei, 2),

    // Stack
    Opcode::new(0x48, "PHA", AddressingMode::Imp, Op::Pha, 3),
    Opcode::new(0x08, "PHP", AddressingMode::Imp, Op::Php, 3),
    Opcode::new(0x68, "PLA", AddressingMode::Imp, Op::Pla, 4),
    Opcode::new(0x28, "PLP", AddressingMode::Imp, Op::Plp, 4),

    // Jumps and returns
    Opcode::new(0x4C, "JMP", AddressingMode::Abs, Op::Jmp, 3),
    Opcode::new(0x6C, "JMP", AddressingMode::Ind, Op::Jmp, 5),
    Opcode::new(0x20, "JSR", AddressingMode::Abs, Op::Jsr, 6),
    Opcode::new(0x40, "RTI", AddressingMode::Imp, Op::Rti, 6),
    Opcode::new(0x60, "RTS", AddressingMode::Imp, Op::Rts, 6),

    // Branches (+1 when taken, +2 when crossing a page)
    Opcode::new(0x90, "BCC", AddressingMode::Rel, Op::Bcc, 2),
    Opcode::new(0xB0, "BCS", AddressingMode::Rel, Op::Bcs, 2),
    Opcode::new(0xF0, "BEQ", AddressingMode::Rel, Op::Beq, 2),
    Opcode::new(0x30, "BMI", AddressingMode::Rel, Op::Bmi, 2),
    Opcode::new(0xD0, "BNE", AddressingMode::Rel, Op::Bne, 2),
    Opcode::new(0x10, "BPL", AddressingMode::Rel, Op::Bpl, 2),
    Opcode::new(0x50, "BVC", AddressingMode::Rel, Op::Bvc, 2),
    Opcode::new(0x70, "BVS", AddressingMode::Rel, Op::Bvs, 2),

    Opcode::new(0xEA, "NOP", AddressingMode::Imp, Op::Nop, 2),

    // Unofficial: combined shift + logic RMW ops
    Opcode::new(0x07, "SLO", AddressingMode::Zero,  Op::Slo, 5),
    Opcode::new(0x17, "SLO", AddressingMode::ZeroX, Op::Slo, 6),
    Opcode::new(0x0F, "SLO", AddressingMode::Abs,   Op::Slo, 6),
    Opcode::new(0x1F, "SLO", AddressingMode::AbsXW, Op::Slo, 7),
    Opcode::new(0x1B, "SLO", AddressingMode::AbsYW, Op::Slo, 7),
    Opcode::new(0x03, "SLO", AddressingMode::IndX,  Op::Slo, 8),
    Opcode::new(0x13, "SLO", AddressingMode::IndYW, Op::Slo, 8),

    Opcode::new(0x27, "RLA", AddressingMode::Zero,  Op::Rla, 5),
    Opcode::new(0x37, "RLA", AddressingMode::ZeroX, Op::Rla, 6),
    Opcode::new(0x2F, "RLA", AddressingMode::Abs,   Op::Rla, 6),
    Opcode::new(0x3F, "RLA", AddressingMode::AbsXW, Op::Rla, 7),
    Opcode::new(0x3B, "RLA", AddressingMode::AbsYW, Op::Rla, 7),
    Opcode::new(0x23, "RLA", AddressingMode::IndX,  Op::Rla, 8),
    Opcode::new(0x33, "RLA", AddressingMode::IndYW, Op::Rla, 8),

    Opcode::new(0x47, "SRE", AddressingMode::Zero,  Op::Sre, 5),
    Opcode::new(0x57, "SRE", AddressingMode::ZeroX, Op::Sre, 6),
    Opcode::new(0x4F, "SRE", AddressingMode::Abs,   Op::Sre, 6),
    Opcode::new(0x5F, "SRE", AddressingMode::AbsXW, Op::Sre, 7),
    Opcode::new(0x5B, "SRE", AddressingMode::AbsYW, Op::Sre, 7),
    Opcode::new(0x43, "SRE", AddressingMode::IndX,  Op::Sre, 8),
    Opcode::new(0x53, "SRE", AddressingMode::IndYW, Op::Sre, 8),

    Opcode::new(0x67, "RRA", AddressingMode::Zero,  Op::Rra, 5),
    Opcode::new(0x77, "RRA", AddressingMode::ZeroX, Op::Rra, 6),
    Opcode::new(0x6F, "RRA", AddressingMode::Abs,   Op::Rra, 6),
    Opcode::new(0x7F, "RRA", AddressingMode::AbsXW, Op::Rra, 7),
    Opcode::new(0x7B, "RRA", AddressingMode::AbsYW, Op::Rra, 7),
    Opcode::new(0x63, "RRA", AddressingMode::IndX,  Op::Rra, 8),
    Opcode::new(0x73, "RRA", AddressingMode::IndYW, Op::Rra, 8),

    Opcode::new(0xC7, "DCP", AddressingMode::Zero,  Op::Dcp, 5),
    Opcode::new(0xD7, "DCP", AddressingMode::ZeroX, Op::Dcp, 6),
    Opcode::new(0xCF, "DCP", AddressingMode::Abs,   Op::Dcp, 6),
    Opcode::new(0xDF, "DCP", AddressingMode::AbsXW, Op::Dcp, 7),
    Opcode::new(0xDB, "DCP", AddressingMode::AbsYW, Op::Dcp, 7),
    Opcode::new(0xC3, "DCP", AddressingMode::IndX,  Op::Dcp, 8),
    Opcode::new(0xD3, "DCP", AddressingMode::IndYW, Op::Dcp, 8),

    Opcode::new(0xE7, "ISB", AddressingMode::Zero,  Op::Isb, 5),
    Opcode::new(0xF7, "ISB", AddressingMode::ZeroX, Op::Isb, 6),
    Opcode::new(0xEF, "ISB", AddressingMode::Abs,   Op::Isb, 6),
    Opcode::new(0xFF, "ISB", AddressingMode::AbsXW, Op::Isb, 7),
    Opcode::new(0xFB, "ISB", AddressingMode::AbsYW, Op::Isb, 7),
    Opcode::new(0xE3, "ISB", AddressingMode::IndX,  Op::Isb, 8),
    Opcode::new(0xF3, "ISB", AddressingMode::IndYW, Op::Isb, 8),

    // Unofficial: loads/stores
    Opcode::new(0xA7, "LAX", AddressingMode::Zero,  Op::Lax, 3),
    Opcode::new(0xB7, "LAX", AddressingMode::ZeroY, Op::Lax, 4),
    Opcode::new(0xAF, "LAX", AddressingMode::Abs,   Op::Lax, 4),
    Opcode::new(0xBF, "LAX", AddressingMode::AbsY,  Op::Lax, 4), // +1 on page cross
    Opcode::new(0xA3, "LAX", AddressingMode::IndX,  Op::Lax, 6),
    Opcode::new(0xB3, "LAX", AddressingMode::IndY,  Op::Lax, 5), // +1 on page cross
    Opcode::new(0xAB, "LXA", AddressingMode::Imm,   Op::Lxa, 2),

    Opcode::new(0x87, "SAX", AddressingMode::Zero,  Op::Sax, 3),
    Opcode::new(0x97, "SAX", AddressingMode::ZeroY, Op::Sax, 4),
    Opcode::new(0x8F, "SAX", AddressingMode::Abs,   Op::Sax, 4),
    Opcode::new(0x83, "SAX", AddressingMode::IndX,  Op::Sax, 6),

    // Unofficial: immediate ALU oddities
    Opcode::new(0x0B, "ANC", AddressingMode::Imm, Op::Anc, 2),
    Opcode::new(0x2B, "ANC", AddressingMode::Imm, Op::Anc, 2),
    Opcode::new(0x4B, "ALR", AddressingMode::Imm, Op::Alr, 2),
    Opcode::new(0x6B, "ARR", AddressingMode::Imm, Op::Arr, 2),
    Opcode::new(0xCB, "SBX", AddressingMode::Imm, Op::Sbx, 2),
    Opcode::new(0xEB, "SBC", AddressingMode::Imm, Op::Sbc, 2),
    Opcode::new(0x8B, "XAA", AddressingMode::Imm, Op::Xaa, 2),

    // Unofficial: address-high corrupting stores
    Opcode::new(0x9F, "SHA", AddressingMode::AbsYW, Op::Sha, 5),
    Opcode::new(0x93, "SHA", AddressingMode::IndYW, Op::Sha, 6),
    Opcode::new(0x9E, "SHX", AddressingMode::AbsYW, Op::Shx, 5),
    Opcode::new(0x9C, "SHY", AddressingMode::AbsXW, Op::Shy, 5),
    Opcode::new(0x9B, "TAS", AddressingMode::AbsYW, Op::Tas, 5),
    Opcode::new(0xBB, "LAS", AddressingMode::AbsY,  Op::Las, 4), // +1 on page cross

    // Unofficial NOPs
    Opcode::new(0x1A, "NOP", AddressingMode::Imp, Op::Nop, 2),
    Opcode::new(0x3A, "NOP", AddressingMode::Imp, Op::Nop, 2),
    Opcode::new(0x5A, "NOP", AddressingMode::Imp, Op::Nop, 2),
    Opcode::new(0x7A, "NOP", AddressingMode::Imp, Op::Nop, 2),
    Opcode::new(0xDA, "NOP", AddressingMode::Imp, Op::Nop, 2),
    Opcode::new(0xFA, "NOP", AddressingMode::Imp, Op::Nop, 2),
    Opcode::new(0x80, "NOP", AddressingMode::Imm, Op::Nop, 2),
    Opcode::new(0x82, "NOP", AddressingMode::Imm, Op::Nop, 2),
    Opcode::new(0x89, "NOP", AddressingMode::Imm, Op::Nop, 2),
    Opcode::new(0xC2, "NOP", AddressingMode::Imm, Op::Nop, 2),
    Opcode::new(0xE2, "NOP", AddressingMode::Imm, Op::Nop, 2),
    Opcode::new(0x04, "NOP", AddressingMode::Zero, Op::Nop, 3),
    Opcode::new(0x44, "NOP", AddressingMode::Zero, Op::Nop, 3),
    Opcode::new(0x64, "NOP", AddressingMode::Zero, Op::Nop, 3),
    Opcode::new(0x14, "NOP", AddressingMode::ZeroX, Op::Nop, 4),
    Opcode::new(0x34, "NOP", AddressingMode::ZeroX, Op::Nop, 4),
    Opcode::new(0x54, "NOP", AddressingMode::ZeroX, Op::Nop, 4),
    Opcode::new(0x74, "NOP", AddressingMode::ZeroX, Op::Nop, 4),
    Opcode::new(0xD4, "NOP", AddressingMode::ZeroX, Op::Nop, 4),
    Opcode::new(0xF4, "NOP", AddressingMode::ZeroX, Op::Nop, 4),
    Opcode::new(0x0C, "NOP", AddressingMode::Abs,  Op::Nop, 4),
    Opcode::new(0x1C, "NOP", AddressingMode::AbsX, Op::Nop, 4), // +1 on page cross
    Opcode::new(0x3C, "NOP", AddressingMode::AbsX, Op::Nop, 4),
    Opcode::new(0x5C, "NOP", AddressingMode::AbsX, Op::Nop, 4),
    Opcode::new(0x7C, "NOP", AddressingMode::AbsX, Op::Nop, 4),
    Opcode::new(0xDC, "NOP", AddressingMode::AbsX, Op::Nop, 4),
    Opcode::new(0xFC, "NOP", AddressingMode::AbsX, Op::Nop, 4),

    // The bus-deadlock opcodes: the CPU freezes, the rest keeps going
    Opcode::new(0x02, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0x12, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0x22, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0x32, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0x42, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0x52, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0x62, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0x72, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0x92, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0xB2, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0xD2, "JAM", AddressingMode::None, Op::Jam, 0),
    Opcode::new(0xF2, "JAM", AddressingMode::None, Op::Jam, 0),
];

pub static OPCODES_MAP: Lazy<HashMap<u8, &'static Opcode>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for opcode in OPCODES {
        let previous = map.insert(opcode.code, opcode);
        debug_assert!(previous.is_none(), "duplicate opcode {:02X}", opcode.code);
    }
    map
});

pub fn lookup(code: u8) -> Option<&'static Opcode> {
    OPCODES_MAP.get(&code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_all_256_encodings() {
        assert_eq!(OPCODES.len(), 256);
        assert_eq!(OPCODES_MAP.len(), 256);
        for code in 0u16..=255 {
            assert!(
                lookup(code as u8).is_some(),
                "missing opcode {:02X}",
                code
            );
        }
    }

    #[test]
    fn official_entries_spot_check() {
        let lda = lookup(0xA9).unwrap();
        assert_eq!(lda.name, "LDA");
        assert_eq!(lda.mode, AddressingMode::Imm);
        assert_eq!(lda.cycles, 2);

        let sta = lookup(0x9D).unwrap();
        assert_eq!(sta.mode, AddressingMode::AbsXW);
        assert_eq!(sta.cycles, 5);

        let jmp = lookup(0x6C).unwrap();
        assert_eq!(jmp.mode, AddressingMode::Ind);
    }

    #[test]
    fn jam_encodings_are_all_there() {
        for code in [0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2] {
            assert_eq!(lookup(code).unwrap().op, Op::Jam);
        }
    }
}
