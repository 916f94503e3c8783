//! LCD Registers
//!
//! The register file the PPU exposes at 0xFF40-0xFF4B:
//! - LCDC (0xFF40): LCD Control
//! - STAT (0xFF41): LCD Status
//! - SCY (0xFF42): Scroll Y
//! - SCX (0xFF43): Scroll X
//! - LY (0xFF44): Current scanline (read-only from the bus)
//! - LYC (0xFF45): LY Compare
//! - BGP (0xFF47): Background Palette
//! - OBP0 (0xFF48): Object Palette 0
//! - OBP1 (0xFF49): Object Palette 1
//! - WY (0xFF4A): Window Y Position
//! - WX (0xFF4B): Window X Position
//!
//! DMA (0xFF46) sits in the same range but is owned by the bus.

use crate::common::{bit, bit_set, Byte, Word};
use crate::interrupts::{InterruptType, Interrupts};

/// PPU modes, as stored in STAT bits 0-1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuMode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    Drawing = 3,
}

impl From<u8> for PpuMode {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => PpuMode::HBlank,
            1 => PpuMode::VBlank,
            2 => PpuMode::OamSearch,
            _ => PpuMode::Drawing,
        }
    }
}

/// LCD register file
#[derive(Debug, Clone, Default)]
pub struct Lcd {
    pub lcdc: Byte,
    pub stat: Byte,
    pub scy: Byte,
    pub scx: Byte,
    pub ly: Byte,
    pub lyc: Byte,
    pub bgp: Byte,
    pub obp0: Byte,
    pub obp1: Byte,
    pub wy: Byte,
    pub wx: Byte,
}

impl Lcd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read LCD register
    pub fn read(&self, address: Word) -> Byte {
        match address {
            0xFF40 => self.lcdc,
            0xFF41 => self.stat | 0x80, // Bit 7 always reads as 1
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    /// Write LCD register. LCDC side effects are handled by the PPU.
    pub fn write(&mut self, address: Word, value: Byte, interrupts: &mut Interrupts) {
        match address {
            0xFF40 => self.lcdc = value,
            // Mode and coincidence bits are read-only
            0xFF41 => self.stat = (self.stat & 0x07) | (value & 0x78),
            0xFF42 => self.scy = value,
            0xFF43 => self.scx = value,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = value;
                self.compare_lyc(interrupts);
            }
            0xFF47 => self.bgp = value,
            0xFF48 => self.obp0 = value,
            0xFF49 => self.obp1 = value,
            0xFF4A => self.wy = value,
            0xFF4B => self.wx = value,
            _ => {}
        }
    }

    // ========== LCDC Bit Accessors ==========

    /// LCD Display Enable (bit 7)
    pub fn lcd_enabled(&self) -> bool {
        bit(self.lcdc, 7)
    }

    /// Window Tile Map Select (bit 6)
    pub fn window_tile_map(&self) -> Word {
        if bit(self.lcdc, 6) { 0x9C00 } else { 0x9800 }
    }

    /// Window Enable (bit 5)
    pub fn window_enabled(&self) -> bool {
        bit(self.lcdc, 5)
    }

    /// BG & Window Tile Data Select (bit 4)
    /// true = 0x8000 unsigned, false = 0x9000 signed
    pub fn unsigned_tile_data(&self) -> bool {
        bit(self.lcdc, 4)
    }

    /// BG Tile Map Select (bit 3)
    pub fn bg_tile_map(&self) -> Word {
        if bit(self.lcdc, 3) { 0x9C00 } else { 0x9800 }
    }

    /// Sprite Size (bit 2)
    pub fn sprite_height(&self) -> u8 {
        if bit(self.lcdc, 2) { 16 } else { 8 }
    }

    /// Sprite Enable (bit 1)
    pub fn sprites_enabled(&self) -> bool {
        bit(self.lcdc, 1)
    }

    /// BG & Window Enable (bit 0)
    pub fn bg_window_enabled(&self) -> bool {
        bit(self.lcdc, 0)
    }

    // ========== STAT Bit Accessors ==========

    pub fn mode(&self) -> PpuMode {
        PpuMode::from(self.stat & 0x03)
    }

    pub fn set_mode(&mut self, mode: PpuMode) {
        self.stat = (self.stat & 0xFC) | (mode as u8);
    }

    /// LYC=LY Coincidence Flag (bit 2)
    pub fn lyc_flag(&self) -> bool {
        bit(self.stat, 2)
    }

    /// Mode 0 HBlank Interrupt Enable (bit 3)
    pub fn hblank_int_enabled(&self) -> bool {
        bit(self.stat, 3)
    }

    /// Mode 1 VBlank Interrupt Enable (bit 4)
    pub fn vblank_int_enabled(&self) -> bool {
        bit(self.stat, 4)
    }

    /// Mode 2 OAM Interrupt Enable (bit 5)
    pub fn oam_int_enabled(&self) -> bool {
        bit(self.stat, 5)
    }

    /// LYC=LY Coincidence Interrupt Enable (bit 6)
    pub fn lyc_int_enabled(&self) -> bool {
        bit(self.stat, 6)
    }

    // ========== LY/LYC Handling ==========

    /// Set LY; every LY change goes through here so the compare runs
    pub fn set_ly(&mut self, value: Byte, interrupts: &mut Interrupts) {
        self.ly = value;
        self.compare_lyc(interrupts);
    }

    /// Update the coincidence flag and raise STAT if LY==LYC is enabled
    pub fn compare_lyc(&mut self, interrupts: &mut Interrupts) {
        let coincidence = self.ly == self.lyc;
        bit_set(&mut self.stat, 2, coincidence);

        if coincidence && self.lyc_int_enabled() {
            interrupts.request(InterruptType::LcdStat);
        }
    }

    // ========== Palette Helpers ==========

    /// Shade (0-3) for a color index through a palette register
    pub fn shade(palette: Byte, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }
}
