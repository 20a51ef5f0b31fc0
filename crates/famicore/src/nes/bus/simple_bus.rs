use crate::nes::cpu::CpuBus;
use crate::nes::dma::DmaEngine;

/// Flat 64KB bus with access logging. CPU-only tests run against this
/// instead of the full machine.
pub struct SimpleBus {
    pub ram: Vec<u8>,
    pub dma: DmaEngine,
    pub nmi_level: bool,
    pub irq_level: bool,
    pub reads: Vec<u16>,
    pub writes: Vec<(u16, u8)>,
}

impl SimpleBus {
    pub fn new() -> SimpleBus {
        SimpleBus {
            ram: vec![0; 0x10000],
            dma: DmaEngine::new(),
            nmi_level: false,
            irq_level: false,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn load(&mut self, origin: u16, program: &[u8]) {
        let start = origin as usize;
        self.ram[start..start + program.len()].copy_from_slice(program);
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBus for SimpleBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.reads.push(addr);
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.writes.push((addr, value));
        self.ram[addr as usize] = value;
    }

    fn nmi_line(&mut self) -> bool {
        self.nmi_level
    }

    fn irq_line(&mut self) -> bool {
        self.irq_level
    }

    fn dma(&mut self) -> &mut DmaEngine {
        &mut self.dma
    }
}
