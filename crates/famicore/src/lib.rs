// Cycle-accurate console core
pub mod nes;

// Re-exports
pub use nes::Nes;

pub use nes::cartridge::Mapper;
pub use nes::cartridge::rom::{Rom, RomError};
pub use nes::config::{EmuConfig, Region};
pub use nes::state::StateError;
pub use nes::EmuError;
