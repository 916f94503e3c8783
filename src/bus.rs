//! Memory Bus
//!
//! Decodes CPU addresses and routes each access to the component that owns
//! it. The bus owns every peripheral, so nothing can be left unattached.
//!
//! Routing, first match wins:
//! - DMA in progress: only HRAM (0xFF80-0xFFFE) is reachable
//! - 0x0000-0x00FF: boot ROM while mapped
//! - 0x0000-0x7FFF, 0xA000-0xBFFF: cartridge controller
//! - 0xC000-0xFDFF: WRAM and its echo
//! - 0xFF80-0xFFFE: HRAM
//! - 0xFF46: OAM DMA
//! - 0xFF40-0xFF4B: LCD registers
//! - 0xFE00-0xFE9F: OAM, 0x8000-0x9FFF: VRAM (gated by PPU mode)
//! - 0xFF04-0xFF07: Timer
//! - 0xFFFF, 0xFF0F: IE, IF
//! - 0xFF00: Joypad
//! - 0xFF50: boot ROM lock
//! - everything else: plain backing memory

use log::{debug, error};

use crate::cart::CartridgeHeader;
use crate::common::{Byte, Word};
use crate::dma::Dma;
use crate::error::{Error, Result};
use crate::gamepad::{Button, Gamepad};
use crate::interrupts::{InterruptType, Interrupts};
use crate::mbc::Mbc;
use crate::ppu::Ppu;
use crate::ram::Ram;
use crate::timer::Timer;

/// Size of the DMG boot ROM
pub const BOOT_ROM_SIZE: usize = 0x100;

/// Memory bus trait for reading and writing memory
pub trait MemoryBus {
    /// Read a byte from the given address
    fn read(&self, address: Word) -> Byte;

    /// Write a byte to the given address
    fn write(&mut self, address: Word, value: Byte);

    /// Interrupt registers, for the CPU's dispatch logic
    fn interrupts(&self) -> &Interrupts;

    fn interrupts_mut(&mut self) -> &mut Interrupts;

    /// Read a 16-bit word from the given address (little-endian)
    fn read16(&self, address: Word) -> Word {
        let lo = self.read(address) as Word;
        let hi = self.read(address.wrapping_add(1)) as Word;
        lo | (hi << 8)
    }

    /// Write a 16-bit word to the given address (little-endian)
    fn write16(&mut self, address: Word, value: Word) {
        self.write(address, (value & 0xFF) as Byte);
        self.write(address.wrapping_add(1), (value >> 8) as Byte);
    }
}

/// Game Boy memory bus
pub struct Bus {
    ram: Ram,
    mbc: Mbc,
    pub ppu: Ppu,
    pub timer: Timer,
    pub gamepad: Gamepad,
    dma: Dma,
    interrupts: Interrupts,
    boot_rom: Option<Box<[Byte; BOOT_ROM_SIZE]>>,
    boot_rom_mapped: bool,
    /// Backing store for addresses no component claims
    fallback: Box<[Byte; 0x10000]>,
    /// First fatal error raised by a write, until taken
    fault: Option<Error>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    /// A bus with no cartridge inserted and no boot ROM
    pub fn new() -> Self {
        Self {
            ram: Ram::new(),
            mbc: Mbc::default(),
            ppu: Ppu::new(),
            timer: Timer::new(),
            gamepad: Gamepad::new(),
            dma: Dma::new(),
            interrupts: Interrupts::new(),
            boot_rom: None,
            boot_rom_mapped: false,
            fallback: Box::new([0; 0x10000]),
            fault: None,
        }
    }

    /// Attach the cartridge controller selected by the header
    pub fn initialise(&mut self, header: &CartridgeHeader, rom: &[Byte]) -> Result<()> {
        self.mbc = Mbc::new(header, rom)?;
        Ok(())
    }

    pub fn load_rom_bank0(&mut self, data: &[Byte]) -> Result<()> {
        self.mbc.load_bank0(data)
    }

    pub fn load_rom_bank1(&mut self, data: &[Byte]) -> Result<()> {
        self.mbc.load_bank1(data)
    }

    /// Map a boot ROM over 0x0000-0x00FF until 0xFF50 is written
    pub fn set_boot_rom(&mut self, data: &[Byte]) -> Result<()> {
        let image: [Byte; BOOT_ROM_SIZE] = data
            .try_into()
            .map_err(|_| Error::BootRomSize(data.len()))?;
        self.boot_rom = Some(Box::new(image));
        self.boot_rom_mapped = true;
        Ok(())
    }

    pub fn boot_rom_mapped(&self) -> bool {
        self.boot_rom_mapped
    }

    pub fn dma_active(&self) -> bool {
        self.dma.is_active()
    }

    /// Catch every peripheral up to the clock
    pub fn update(&mut self, now: u64) {
        self.update_dma(now);
        self.ppu.update(now, &mut self.interrupts);
        self.timer.update(now, &mut self.interrupts);
    }

    fn update_dma(&mut self, now: u64) {
        for _ in 0..self.dma.elapsed(now) {
            let Some((source, offset)) = self.dma.tick() else {
                break;
            };
            let value = self.dma_read(source);
            self.ppu.write_oam_direct(offset, value);
        }
    }

    /// Read on behalf of the DMA engine, which is not locked out
    pub fn dma_read(&self, address: Word) -> Byte {
        self.route_read(address)
    }

    /// Hand over a fault raised since the last call
    pub fn take_fault(&mut self) -> Option<Error> {
        self.fault.take()
    }

    pub fn press(&mut self, button: Button) {
        if self.gamepad.press(button) {
            self.interrupts.request(InterruptType::Joypad);
        }
    }

    pub fn release(&mut self, button: Button) {
        self.gamepad.release(button);
    }

    fn route_read(&self, address: Word) -> Byte {
        match address {
            0x0000..=0x00FF if self.boot_rom_mapped => match &self.boot_rom {
                Some(rom) => rom[address as usize],
                None => self.mbc.read(address),
            },
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.mbc.read(address),
            0xC000..=0xFDFF => self.ram.wram_read(address),
            0xFF80..=0xFFFE => self.ram.hram_read(address),
            0xFF46 => self.dma.read(),
            0xFF40..=0xFF4B => self.ppu.read(address),
            0xFE00..=0xFE9F | 0x8000..=0x9FFF => self.ppu.read(address),
            0xFF04..=0xFF07 => self.timer.read(address),
            0xFFFF => self.interrupts.enable,
            0xFF0F => self.interrupts.read_flags(),
            0xFF00 => self.gamepad.read(),
            0xFF50 => {
                if self.boot_rom_mapped {
                    0
                } else {
                    1
                }
            }
            _ => self.fallback[address as usize],
        }
    }
}

impl MemoryBus for Bus {
    fn read(&self, address: Word) -> Byte {
        if self.dma.is_active() && !(0xFF80..=0xFFFE).contains(&address) {
            return 0xFF;
        }
        self.route_read(address)
    }

    fn write(&mut self, address: Word, value: Byte) {
        if self.dma.is_active() && !(0xFF80..=0xFFFE).contains(&address) {
            return;
        }
        match address {
            // Boot ROM is read-only; writes still reach the controller
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                if let Err(err) = self.mbc.write(address, value) {
                    error!("Cartridge fault at 0x{:04X}: {}", address, err);
                    self.fault.get_or_insert(err);
                }
            }
            0xC000..=0xFDFF => self.ram.wram_write(address, value),
            0xFF80..=0xFFFE => self.ram.hram_write(address, value),
            0xFF46 => self.dma.start(value),
            0xFF40..=0xFF4B | 0xFE00..=0xFE9F | 0x8000..=0x9FFF => {
                self.ppu.write(address, value, &mut self.interrupts)
            }
            0xFF04..=0xFF07 => self.timer.write(address, value),
            0xFFFF => self.interrupts.enable = value,
            0xFF0F => self.interrupts.write_flags(value),
            0xFF00 => self.gamepad.write(value),
            0xFF50 => {
                if value != 0 && self.boot_rom_mapped {
                    debug!("Boot ROM unmapped");
                    self.boot_rom_mapped = false;
                }
            }
            _ => self.fallback[address as usize] = value,
        }
    }

    fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    fn interrupts_mut(&mut self) -> &mut Interrupts {
        &mut self.interrupts
    }
}
