//! Memory bank controllers
//!
//! Translates bus accesses in 0x0000-0x7FFF and 0xA000-0xBFFF into the
//! cartridge's ROM and external RAM. Writes to the ROM area never reach ROM
//! storage; they program the controller's registers instead.

use log::debug;

use crate::cart::CartridgeHeader;
use crate::common::{Byte, Word};
use crate::error::{Error, Result};

/// Size of one switchable ROM window
pub const ROM_BANK_SIZE: usize = 0x4000;

/// Size of one external RAM bank
pub const RAM_BANK_SIZE: usize = 0x2000;

type RomBank = Box<[Byte; ROM_BANK_SIZE]>;

fn empty_bank() -> RomBank {
    Box::new([0xFF; ROM_BANK_SIZE])
}

/// Copy `data` into a bank, rejecting anything that would not fit.
/// Short data leaves the tail of the bank as open bus.
fn fill_bank(bank: &mut RomBank, data: &[Byte]) -> Result<()> {
    if data.len() > ROM_BANK_SIZE {
        return Err(Error::BankTooLarge(data.len()));
    }
    bank[..data.len()].copy_from_slice(data);
    bank[data.len()..].fill(0xFF);
    Ok(())
}

/// Slice of `rom` holding bank `index`, clipped to the image length
fn bank_slice(rom: &[Byte], index: usize) -> &[Byte] {
    let start = (index * ROM_BANK_SIZE).min(rom.len());
    let end = (start + ROM_BANK_SIZE).min(rom.len());
    &rom[start..end]
}

/// Number of bits needed to address `count` items, `ceil(log2(count))`
fn bits_for(count: usize) -> u32 {
    match count {
        0 | 1 => 0,
        n => usize::BITS - (n - 1).leading_zeros(),
    }
}

/// Cartridge controller variants
#[derive(Debug)]
pub enum Mbc {
    RomOnly(RomOnly),
    Mbc1(Mbc1),
}

impl Mbc {
    /// Pick the controller for the header's cartridge type
    pub fn new(header: &CartridgeHeader, rom: &[Byte]) -> Result<Self> {
        match header.cart_type {
            0x00 => Ok(Mbc::RomOnly(RomOnly::new(rom)?)),
            0x01..=0x03 => Ok(Mbc::Mbc1(Mbc1::new(header, rom)?)),
            other => Err(Error::UnsupportedCartridge(other, header.cart_type_name())),
        }
    }

    pub fn read(&self, address: Word) -> Byte {
        match self {
            Mbc::RomOnly(mbc) => mbc.read(address),
            Mbc::Mbc1(mbc) => mbc.read(address),
        }
    }

    pub fn write(&mut self, address: Word, value: Byte) -> Result<()> {
        match self {
            Mbc::RomOnly(_) => Ok(()),
            Mbc::Mbc1(mbc) => mbc.write(address, value),
        }
    }

    /// Replace the contents of the fixed 0x0000-0x3FFF window
    pub fn load_bank0(&mut self, data: &[Byte]) -> Result<()> {
        match self {
            Mbc::RomOnly(mbc) => fill_bank(&mut mbc.bank0, data),
            Mbc::Mbc1(mbc) => fill_bank(&mut mbc.bank0, data),
        }
    }

    /// Replace the contents of the switchable 0x4000-0x7FFF window
    pub fn load_bank1(&mut self, data: &[Byte]) -> Result<()> {
        match self {
            Mbc::RomOnly(mbc) => fill_bank(&mut mbc.bank1, data),
            Mbc::Mbc1(mbc) => fill_bank(&mut mbc.bank1, data),
        }
    }
}

impl Default for Mbc {
    /// An empty ROM-only cartridge, reading as open bus
    fn default() -> Self {
        Mbc::RomOnly(RomOnly {
            bank0: empty_bank(),
            bank1: empty_bank(),
        })
    }
}

/// 32KB cartridge with no controller
#[derive(Debug)]
pub struct RomOnly {
    bank0: RomBank,
    bank1: RomBank,
}

impl RomOnly {
    pub fn new(rom: &[Byte]) -> Result<Self> {
        let mut mbc = Self {
            bank0: empty_bank(),
            bank1: empty_bank(),
        };
        fill_bank(&mut mbc.bank0, bank_slice(rom, 0))?;
        fill_bank(&mut mbc.bank1, bank_slice(rom, 1))?;
        Ok(mbc)
    }

    pub fn read(&self, address: Word) -> Byte {
        match address {
            0x0000..=0x3FFF => self.bank0[address as usize],
            0x4000..=0x7FFF => self.bank1[address as usize - 0x4000],
            _ => 0xFF,
        }
    }
}

/// What the 0x4000-0x5FFF register selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankingMode {
    /// Secondary register holds extra ROM bank bits
    Default,
    /// Secondary register selects the RAM bank
    RamBanking,
}

/// MBC1 controller
#[derive(Debug)]
pub struct Mbc1 {
    rom: Vec<Byte>,
    rom_banks: usize,
    bank0: RomBank,
    bank1: RomBank,
    ram: Vec<[Byte; RAM_BANK_SIZE]>,
    ram_enabled: bool,
    ram_bank: usize,
    extra_rom_bits: usize,
    mode: BankingMode,
}

impl Mbc1 {
    pub fn new(header: &CartridgeHeader, rom: &[Byte]) -> Result<Self> {
        let mut mbc = Self {
            rom: rom.to_vec(),
            rom_banks: header.rom_banks(),
            bank0: empty_bank(),
            bank1: empty_bank(),
            ram: vec![[0; RAM_BANK_SIZE]; header.ram_banks()],
            ram_enabled: false,
            ram_bank: 0,
            extra_rom_bits: 0,
            mode: BankingMode::Default,
        };
        fill_bank(&mut mbc.bank0, bank_slice(rom, 0))?;
        fill_bank(&mut mbc.bank1, bank_slice(rom, 1))?;
        Ok(mbc)
    }

    fn has_ram(&self) -> bool {
        !self.ram.is_empty()
    }

    pub fn read(&self, address: Word) -> Byte {
        match address {
            0x0000..=0x3FFF => self.bank0[address as usize],
            0x4000..=0x7FFF => self.bank1[address as usize - 0x4000],
            0xA000..=0xBFFF if self.has_ram() && self.ram_enabled => {
                self.ram[self.ram_bank][address as usize - 0xA000]
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, address: Word, value: Byte) -> Result<()> {
        match address {
            // RAM Enable
            0x0000..=0x1FFF => {
                self.ram_enabled = value == 0x0A;
            }
            // ROM Bank Number
            0x2000..=0x3FFF => {
                let base = match (value & 0x1F) as usize {
                    0 => 1,
                    n => n,
                };
                let bits = bits_for(self.rom_banks);
                let bank = if bits > 5 {
                    (self.extra_rom_bits << 5) | base
                } else {
                    match base & ((1 << bits) - 1) {
                        0 => 1,
                        n => n,
                    }
                };
                fill_bank(&mut self.bank1, bank_slice(&self.rom, bank))?;
            }
            // RAM Bank Number / extra ROM bits
            0x4000..=0x5FFF => match self.mode {
                BankingMode::Default => self.extra_rom_bits = (value & 0b11) as usize,
                BankingMode::RamBanking if self.has_ram() => {
                    let mask = (1 << bits_for(self.ram.len())) - 1;
                    let bank = value as usize & mask;
                    if bank >= self.ram.len() {
                        return Err(Error::RamBankOutOfRange {
                            bank,
                            available: self.ram.len(),
                        });
                    }
                    self.ram_bank = bank;
                }
                BankingMode::RamBanking => {}
            },
            // Banking Mode Select
            0x6000..=0x7FFF => {
                self.mode = if value & 0x01 == 0 {
                    BankingMode::Default
                } else {
                    BankingMode::RamBanking
                };
                debug!("MBC1 banking mode {:?}", self.mode);
            }
            0xA000..=0xBFFF if self.has_ram() && self.ram_enabled => {
                self.ram[self.ram_bank][address as usize - 0xA000] = value;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ROM image where every byte of bank `n` holds `n`
    fn banked_rom(banks: usize) -> Vec<Byte> {
        (0..banks)
            .flat_map(|bank| std::iter::repeat(bank as Byte).take(ROM_BANK_SIZE))
            .collect()
    }

    fn header(cart_type: Byte, rom_size: Byte, ram_size: Byte) -> CartridgeHeader {
        let mut rom = vec![0u8; 0x150];
        rom[0x147] = cart_type;
        rom[0x148] = rom_size;
        rom[0x149] = ram_size;
        CartridgeHeader::parse(&rom).unwrap()
    }

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(1), 0);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(4), 2);
        assert_eq!(bits_for(5), 3);
        assert_eq!(bits_for(64), 6);
    }

    #[test]
    fn test_rom_only() {
        let rom = banked_rom(2);
        let mut mbc = Mbc::new(&header(0x00, 0x00, 0x00), &rom).unwrap();
        assert_eq!(mbc.read(0x0000), 0);
        assert_eq!(mbc.read(0x4000), 1);
        assert_eq!(mbc.read(0xA000), 0xFF);

        mbc.write(0x2000, 0x01).unwrap();
        assert_eq!(mbc.read(0x0100), 0);
    }

    #[test]
    fn test_unsupported_type() {
        let rom = banked_rom(2);
        assert!(matches!(
            Mbc::new(&header(0x19, 0x00, 0x00), &rom),
            Err(Error::UnsupportedCartridge(0x19, "MBC5"))
        ));
        // ROM+RAM boards have no controller here either
        assert!(matches!(
            Mbc::new(&header(0x08, 0x00, 0x02), &rom),
            Err(Error::UnsupportedCartridge(0x08, "ROM+RAM"))
        ));
        assert!(matches!(
            Mbc::new(&header(0x09, 0x00, 0x02), &rom),
            Err(Error::UnsupportedCartridge(0x09, "ROM+RAM+BATTERY"))
        ));
    }

    #[test]
    fn test_mbc1_bank_zero_selects_one() {
        let rom = banked_rom(8);
        let mut mbc = Mbc::new(&header(0x01, 0x02, 0x00), &rom).unwrap();

        mbc.write(0x2000, 0x03).unwrap();
        assert_eq!(mbc.read(0x4000), 3);

        mbc.write(0x2000, 0x00).unwrap();
        assert_eq!(mbc.read(0x4000), 1);

        // Bits above the bank count are masked off
        mbc.write(0x2000, 0x0A).unwrap();
        assert_eq!(mbc.read(0x4000), 2);
    }

    #[test]
    fn test_mbc1_extra_rom_bits() {
        let rom = banked_rom(64);
        let mut mbc = Mbc::new(&header(0x01, 0x05, 0x00), &rom).unwrap();

        mbc.write(0x4000, 0x01).unwrap();
        mbc.write(0x2000, 0x02).unwrap();
        assert_eq!(mbc.read(0x4000), 34);
    }

    #[test]
    fn test_mbc1_ram_gating() {
        let rom = banked_rom(4);
        let mut mbc = Mbc::new(&header(0x03, 0x01, 0x03), &rom).unwrap();

        mbc.write(0xA000, 0x42).unwrap();
        assert_eq!(mbc.read(0xA000), 0xFF);

        mbc.write(0x0000, 0x0A).unwrap();
        mbc.write(0xA000, 0x42).unwrap();
        assert_eq!(mbc.read(0xA000), 0x42);

        // Only the exact magic value enables RAM
        mbc.write(0x0000, 0x1A).unwrap();
        assert_eq!(mbc.read(0xA000), 0xFF);
    }

    #[test]
    fn test_mbc1_ram_banking() {
        let rom = banked_rom(4);
        let mut mbc = Mbc::new(&header(0x03, 0x01, 0x03), &rom).unwrap();
        mbc.write(0x0000, 0x0A).unwrap();
        mbc.write(0x6000, 0x01).unwrap();

        mbc.write(0x4000, 0x02).unwrap();
        mbc.write(0xA010, 0x22).unwrap();
        mbc.write(0x4000, 0x00).unwrap();
        assert_eq!(mbc.read(0xA010), 0x00);
        mbc.write(0x4000, 0x02).unwrap();
        assert_eq!(mbc.read(0xA010), 0x22);
    }

    #[test]
    fn test_mbc1_ram_bank_out_of_range() {
        let rom = banked_rom(4);
        // Code 0x05 is 8 banks, so a 3-bit mask lets index 7 through
        let mut mbc = Mbc::new(&header(0x03, 0x01, 0x05), &rom).unwrap();
        mbc.write(0x6000, 0x01).unwrap();
        assert!(mbc.write(0x4000, 0x03).is_ok());

        // A single 2KB bank masks everything down to zero
        let mut mbc = Mbc::new(&header(0x03, 0x01, 0x01), &rom).unwrap();
        mbc.write(0x6000, 0x01).unwrap();
        assert!(mbc.write(0x4000, 0x03).is_ok());

        // Three banks cannot be expressed by the header, so build one by hand
        let mut raw = Mbc1::new(&header(0x03, 0x01, 0x03), &rom).unwrap();
        raw.ram.truncate(3);
        raw.write(0x6000, 0x01).unwrap();
        assert!(matches!(
            raw.write(0x4000, 0x03),
            Err(Error::RamBankOutOfRange { bank: 3, available: 3 })
        ));
    }

    #[test]
    fn test_load_bank_rejects_oversized_data() {
        let mut mbc = Mbc::default();
        assert!(matches!(
            mbc.load_bank0(&[0; ROM_BANK_SIZE + 1]),
            Err(Error::BankTooLarge(_))
        ));
        mbc.load_bank1(&[0x12; 4]).unwrap();
        assert_eq!(mbc.read(0x4000), 0x12);
        assert_eq!(mbc.read(0x4004), 0xFF);
    }
}
