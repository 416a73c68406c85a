//! Cartridge header decoding (spec §3 "Cartridge header fields", §4.5).

use crate::error::CoreError;

pub const HEADER_START: usize = 0x0100;
pub const TITLE_START: usize = 0x0134;
pub const CGB_FLAG: usize = 0x0143;
pub const CART_TYPE: usize = 0x0147;
pub const ROM_SIZE_CODE: usize = 0x0148;
pub const RAM_SIZE_CODE: usize = 0x0149;
pub const HEADER_CHECKSUM: usize = 0x014D;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeType {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
    Unknown(u8),
}

impl CartridgeType {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => CartridgeType::RomOnly,
            0x01..=0x03 => CartridgeType::Mbc1,
            0x05..=0x06 => CartridgeType::Mbc2,
            0x0F..=0x13 => CartridgeType::Mbc3,
            0x19..=0x1E => CartridgeType::Mbc5,
            other => CartridgeType::Unknown(other),
        }
    }
}

/// Raw ROM bytes plus the fields decoded from the 0x0100–0x014F header.
#[derive(Debug, Clone)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub title: String,
    pub cart_type: CartridgeType,
    pub rom_size_kb: u32,
    pub ram_size_kb: u32,
    pub is_cgb: bool,
    pub checksum_ok: bool,
}

impl Cartridge {
    /// Parses the header out of a raw ROM image. `rom.len()` should be a
    /// multiple of 0x4000 (spec §6); shorter images are rejected outright
    /// since the header itself would not fit.
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self, CoreError> {
        if rom.len() < 0x150 {
            return Err(CoreError::DecodeError(format!(
                "ROM is {} bytes, too short to contain a header (need >= 0x150)",
                rom.len()
            )));
        }

        let is_cgb = matches!(rom[CGB_FLAG], 0x80 | 0xC0);
        let title_end = if is_cgb { TITLE_START + 11 } else { TITLE_START + 16 };
        let title = String::from_utf8_lossy(&rom[TITLE_START..title_end])
            .trim_end_matches('\0')
            .to_string();

        let cart_type = CartridgeType::from_code(rom[CART_TYPE]);
        let rom_size_kb = 32u32 << rom[ROM_SIZE_CODE];
        let ram_size_kb = match rom[RAM_SIZE_CODE] {
            0x02 => 8,
            0x03 => 32,
            0x04 => 128,
            0x05 => 64,
            _ => 0,
        };

        let mut computed: u8 = 0;
        for &b in &rom[TITLE_START..=0x014C] {
            computed = computed.wrapping_sub(b).wrapping_sub(1);
        }
        let checksum_ok = computed == rom[HEADER_CHECKSUM];

        Ok(Cartridge {
            rom,
            title,
            cart_type,
            rom_size_kb,
            ram_size_kb,
            is_cgb,
            checksum_ok,
        })
    }
}

impl std::fmt::Display for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "title:      {}", self.title)?;
        writeln!(f, "type:       {:?}", self.cart_type)?;
        writeln!(f, "rom size:   {} KiB", self.rom_size_kb)?;
        writeln!(f, "ram size:   {} KiB", self.ram_size_kb)?;
        writeln!(f, "cgb:        {}", self.is_cgb)?;
        write!(f, "checksum:   {}", if self.checksum_ok { "ok" } else { "mismatch" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_header(title: &[u8], cgb: bool) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        for (i, &b) in title.iter().enumerate() {
            rom[TITLE_START + i] = b;
        }
        rom[CGB_FLAG] = if cgb { 0xC0 } else { 0x00 };
        let mut checksum: u8 = 0;
        for &b in &rom[TITLE_START..=0x014C] {
            checksum = checksum.wrapping_sub(b).wrapping_sub(1);
        }
        rom[HEADER_CHECKSUM] = checksum;
        rom
    }

    #[test]
    fn parses_title_and_checksum() {
        let rom = rom_with_header(b"TESTROM", false);
        let cart = Cartridge::from_bytes(rom).unwrap();
        assert_eq!(cart.title, "TESTROM");
        assert!(cart.checksum_ok);
    }

    #[test]
    fn detects_checksum_mismatch() {
        let mut rom = rom_with_header(b"BADROM", false);
        rom[HEADER_CHECKSUM] ^= 0xFF;
        let cart = Cartridge::from_bytes(rom).unwrap();
        assert!(!cart.checksum_ok);
    }

    #[test]
    fn rejects_short_rom() {
        let err = Cartridge::from_bytes(vec![0u8; 16]).unwrap_err();
        assert!(matches!(err, CoreError::DecodeError(_)));
    }

    #[test]
    fn cgb_title_is_11_bytes() {
        let rom = rom_with_header(b"LONGTITLEABC", true);
        let cart = Cartridge::from_bytes(rom).unwrap();
        assert_eq!(cart.title, "LONGTITLEAB");
    }
}
