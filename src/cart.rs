//! Cartridge
//!
//! ROM image loading and header parsing. The header (0x0134-0x014F) selects
//! the memory bank controller and describes the ROM/RAM bank counts; both
//! checksums are verified but a mismatch is only reported, never fatal.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::common::Byte;
use crate::error::{Error, Result};

/// ROM header offsets
const HEADER_TITLE_START: usize = 0x134;
const HEADER_TITLE_END: usize = 0x143;
const HEADER_MANUFACTURER: usize = 0x13F;
const HEADER_CGB: usize = 0x143;
const HEADER_NEW_LIC_CODE: usize = 0x144;
const HEADER_SGB: usize = 0x146;
const HEADER_CART_TYPE: usize = 0x147;
const HEADER_ROM_SIZE: usize = 0x148;
const HEADER_RAM_SIZE: usize = 0x149;
const HEADER_DESTINATION: usize = 0x14A;
const HEADER_LIC_CODE: usize = 0x14B;
const HEADER_VERSION: usize = 0x14C;
const HEADER_CHECKSUM: usize = 0x14D;
const HEADER_GLOBAL_CHECKSUM: usize = 0x14E;

/// Smallest image that still contains a full header
pub const HEADER_END: usize = 0x150;

/// Market the cartridge was sold in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Japanese,
    Overseas,
}

/// A stored checksum and whether the computed value matched it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum<T> {
    pub value: T,
    pub passed: bool,
}

/// ROM header information
#[derive(Debug, Clone)]
pub struct CartridgeHeader {
    /// Game title (up to 16 characters)
    pub title: String,
    /// Four-character manufacturer code (newer cartridges only)
    pub manufacturer_code: String,
    /// CGB support flag
    pub cgb: Byte,
    /// SGB support flag
    pub sgb: Byte,
    /// New licensee code (two ASCII characters)
    pub new_licensee: [Byte; 2],
    /// Cartridge type (MBC type)
    pub cart_type: Byte,
    /// ROM size code
    pub rom_size: Byte,
    /// RAM size code
    pub ram_size: Byte,
    pub destination: Destination,
    /// Old licensee code; 0x33 means the new code is used instead
    pub old_licensee: Byte,
    /// Mask ROM version number
    pub version: Byte,
    pub header_checksum: Checksum<Byte>,
    pub global_checksum: Checksum<u16>,
}

impl CartridgeHeader {
    /// Parse the header out of a full ROM image
    pub fn parse(rom_data: &[Byte]) -> Result<Self> {
        if rom_data.len() < HEADER_END {
            return Err(Error::RomTooShort(rom_data.len()));
        }

        // Extract title (null-terminated string)
        let title = rom_data[HEADER_TITLE_START..=HEADER_TITLE_END]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        let manufacturer_code = rom_data[HEADER_MANUFACTURER..HEADER_MANUFACTURER + 4]
            .iter()
            .map(|&b| b as char)
            .collect();

        let header_checksum = rom_data[HEADER_CHECKSUM];
        let global_checksum = u16::from_be_bytes([
            rom_data[HEADER_GLOBAL_CHECKSUM],
            rom_data[HEADER_GLOBAL_CHECKSUM + 1],
        ]);

        Ok(Self {
            title,
            manufacturer_code,
            cgb: rom_data[HEADER_CGB],
            sgb: rom_data[HEADER_SGB],
            new_licensee: [rom_data[HEADER_NEW_LIC_CODE], rom_data[HEADER_NEW_LIC_CODE + 1]],
            cart_type: rom_data[HEADER_CART_TYPE],
            rom_size: rom_data[HEADER_ROM_SIZE],
            ram_size: rom_data[HEADER_RAM_SIZE],
            destination: match rom_data[HEADER_DESTINATION] {
                0x00 => Destination::Japanese,
                _ => Destination::Overseas,
            },
            old_licensee: rom_data[HEADER_LIC_CODE],
            version: rom_data[HEADER_VERSION],
            header_checksum: Checksum {
                value: header_checksum,
                passed: calculate_header_checksum(rom_data) == header_checksum,
            },
            global_checksum: Checksum {
                value: global_checksum,
                passed: calculate_global_checksum(rom_data) == global_checksum,
            },
        })
    }

    /// Number of 16KB ROM banks
    pub fn rom_banks(&self) -> usize {
        match self.rom_size {
            0x00..=0x08 => 2 << self.rom_size as usize,
            0x52 => 72,
            0x53 => 80,
            0x54 => 96,
            _ => 2,
        }
    }

    /// Number of 8KB external RAM banks
    pub fn ram_banks(&self) -> usize {
        match self.ram_size {
            1 | 2 => 1,
            3 => 4,
            4 => 16,
            5 => 8,
            _ => 0,
        }
    }

    /// Get cartridge type name
    pub fn cart_type_name(&self) -> &'static str {
        cart_type_name(self.cart_type)
    }
}

/// Human-readable name for a cartridge type byte
pub fn cart_type_name(cart_type: Byte) -> &'static str {
    match cart_type {
        0x00 => "ROM ONLY",
        0x01 => "MBC1",
        0x02 => "MBC1+RAM",
        0x03 => "MBC1+RAM+BATTERY",
        0x05 => "MBC2",
        0x06 => "MBC2+BATTERY",
        0x08 => "ROM+RAM",
        0x09 => "ROM+RAM+BATTERY",
        0x0B => "MMM01",
        0x0F => "MBC3+TIMER+BATTERY",
        0x10 => "MBC3+TIMER+RAM+BATTERY",
        0x11 => "MBC3",
        0x12 => "MBC3+RAM",
        0x13 => "MBC3+RAM+BATTERY",
        0x19 => "MBC5",
        0x1A => "MBC5+RAM",
        0x1B => "MBC5+RAM+BATTERY",
        0x1C => "MBC5+RUMBLE",
        0xFC => "POCKET CAMERA",
        0xFE => "HuC3",
        0xFF => "HuC1+RAM+BATTERY",
        _ => "UNKNOWN",
    }
}

/// Rolling `x = x - byte - 1` over 0x0134..=0x014C
pub fn calculate_header_checksum(rom_data: &[Byte]) -> Byte {
    rom_data[HEADER_TITLE_START..HEADER_CHECKSUM]
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}

/// 16-bit sum of every byte except the two global checksum bytes
pub fn calculate_global_checksum(rom_data: &[Byte]) -> u16 {
    rom_data
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != HEADER_GLOBAL_CHECKSUM && i != HEADER_GLOBAL_CHECKSUM + 1)
        .fold(0u16, |x, (_, &b)| x.wrapping_add(b as u16))
}

/// A loaded cartridge image and its parsed header
#[derive(Debug, Clone)]
pub struct Cartridge {
    pub header: CartridgeHeader,
    pub rom: Vec<Byte>,
}

impl Cartridge {
    /// Build a cartridge from an in-memory ROM image
    pub fn from_bytes(rom: Vec<Byte>) -> Result<Self> {
        let header = CartridgeHeader::parse(&rom)?;

        info!(
            "Cartridge: \"{}\" type {} ({}), {} ROM banks, {} RAM banks",
            header.title,
            header.cart_type,
            header.cart_type_name(),
            header.rom_banks(),
            header.ram_banks()
        );
        if !header.header_checksum.passed {
            warn!("ROM header checksum mismatch (stored 0x{:02X})", header.header_checksum.value);
        }
        if !header.global_checksum.passed {
            warn!("ROM global checksum mismatch (stored 0x{:04X})", header.global_checksum.value);
        }

        Ok(Self { header, rom })
    }

    /// Load a cartridge from a ROM file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let rom = fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(rom)
    }
}
