use super::nrom::Nrom;
use super::uxrom::UxRom;
use super::Mapper;
use thiserror::Error;

const INES_MAGIC_BYTES: &[u8; 4] = b"NES\x1A";
const PRG_ROM_PAGE_SIZE: usize = 0x4000;
const CHR_ROM_PAGE_SIZE: usize = 0x2000;

#[derive(Debug, Error)]
pub enum RomError {
    #[error("{0}")]
    InvalidFormat(String),

    #[error("unsupported ROM version: v{0}")]
    UnsupportedVersion(u8),

    #[error("unsupported mapper: {0}")]
    UnsupportedMapper(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenA,
    SingleScreenB,
    FourScreen,
    /// Chip decides per 1KB block through `Mapper::custom_mirroring_page`.
    Custom,
}

pub struct Rom {
    pub prg_rom: Vec<u8>,
    pub chr_rom: Vec<u8>,
    pub mapper: u8,
    pub mirroring: Mirroring,
    pub has_battery: bool,
}

impl Rom {
    pub fn parse(raw: &[u8]) -> Result<Rom, RomError> {
        if raw.len() < 16 || &raw[0..4] != INES_MAGIC_BYTES {
            return Err(RomError::InvalidFormat("not an iNES file".into()));
        }

        let mapper = (raw[7] & 0b1111_0000) | (raw[6] >> 4);

        let ines_ver = (raw[7] >> 2) & 0b11;
        if ines_ver != 0 {
            return Err(RomError::UnsupportedVersion(2));
        }

        let four_screen = raw[6] & 0b1000 != 0;
        let vertical = raw[6] & 0b1 != 0;
        let mirroring = match (four_screen, vertical) {
            (true, _) => Mirroring::FourScreen,
            (false, true) => Mirroring::Vertical,
            (false, false) => Mirroring::Horizontal,
        };

        let has_battery = raw[6] & 0b10 != 0;
        let prg_rom_size = raw[4] as usize * PRG_ROM_PAGE_SIZE;
        let chr_rom_size = raw[5] as usize * CHR_ROM_PAGE_SIZE;

        let skip_trainer = raw[6] & 0b100 != 0;
        let prg_rom_start = 16 + if skip_trainer { 512 } else { 0 };
        let chr_rom_start = prg_rom_start + prg_rom_size;

        if raw.len() < chr_rom_start + chr_rom_size {
            return Err(RomError::InvalidFormat("file shorter than header claims".into()));
        }

        Ok(Rom {
            prg_rom: raw[prg_rom_start..prg_rom_start + prg_rom_size].to_vec(),
            chr_rom: raw[chr_rom_start..chr_rom_start + chr_rom_size].to_vec(),
            mapper,
            mirroring,
            has_battery,
        })
    }

    pub fn into_mapper(self) -> Result<Box<dyn Mapper>, RomError> {
        log::debug!(
            "cartridge: mapper {} prg={}K chr={}K mirroring={:?}",
            self.mapper,
            self.prg_rom.len() / 1024,
            self.chr_rom.len() / 1024,
            self.mirroring
        );
        match self.mapper {
            0 => Ok(Box::new(Nrom::new(self.prg_rom, self.chr_rom, self.mirroring))),
            2 => Ok(Box::new(UxRom::new(self.prg_rom, self.chr_rom, self.mirroring))),
            id => Err(RomError::UnsupportedMapper(id)),
        }
    }
}

/// Assemble a minimal mapper-0 image in memory. Tests feed hand-built
/// programs through this instead of shipping ROM files.
pub fn build_nrom(prg: &[u8], chr: &[u8], vertical: bool) -> Vec<u8> {
    let prg_pages = prg.len().div_ceil(PRG_ROM_PAGE_SIZE).max(1);
    let chr_pages = chr.len().div_ceil(CHR_ROM_PAGE_SIZE);

    let mut out = vec![0u8; 16];
    out[0..4].copy_from_slice(INES_MAGIC_BYTES);
    out[4] = prg_pages as u8;
    out[5] = chr_pages as u8;
    out[6] = vertical as u8;

    let mut prg_data = prg.to_vec();
    prg_data.resize(prg_pages * PRG_ROM_PAGE_SIZE, 0);
    out.extend_from_slice(&prg_data);

    let mut chr_data = chr.to_vec();
    chr_data.resize(chr_pages * CHR_ROM_PAGE_SIZE, 0);
    out.extend_from_slice(&chr_data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let raw = vec![0u8; 32];
        assert!(matches!(Rom::parse(&raw), Err(RomError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_truncated_file() {
        let mut raw = build_nrom(&[0xEA; 0x4000], &[], false);
        raw.truncate(100);
        assert!(matches!(Rom::parse(&raw), Err(RomError::InvalidFormat(_))));
    }

    #[test]
    fn parses_header_fields() {
        let raw = build_nrom(&[0xEA; 0x4000], &[0x11; 0x2000], true);
        let rom = Rom::parse(&raw).unwrap();
        assert_eq!(rom.mapper, 0);
        assert_eq!(rom.mirroring, Mirroring::Vertical);
        assert_eq!(rom.prg_rom.len(), 0x4000);
        assert_eq!(rom.chr_rom.len(), 0x2000);
    }

    #[test]
    fn unknown_mapper_is_reported() {
        let mut raw = build_nrom(&[0xEA; 0x4000], &[], false);
        raw[6] |= 0xF0; // mapper 15 in the low nibble position
        let rom = Rom::parse(&raw).unwrap();
        assert_eq!(rom.mapper, 15);
        assert!(matches!(
            rom.into_mapper(),
            Err(RomError::UnsupportedMapper(15))
        ));
    }
}
