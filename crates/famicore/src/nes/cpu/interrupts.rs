// See: https://www.nesdev.org/wiki/CPU_interrupts

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE; // shared with BRK
