//! PPU Module
//!
//! The Pixel Processing Unit. It owns VRAM, OAM, the LCD register file and
//! the 160x144 output buffer, and is advanced by catch-up: [`Ppu::update`]
//! processes every T-cycle between its watermark and the current clock.
//!
//! - `modes`: the OAM search / drawing / HBlank / VBlank state machine
//! - `pipeline`: background and sprite fetchers feeding the pixel FIFOs

pub mod modes;
pub mod pipeline;

use log::debug;

use crate::common::{bit, Byte, Word};
use crate::interrupts::Interrupts;
use crate::lcd::{Lcd, PpuMode};
use pipeline::Pipeline;

/// Screen dimensions
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const LINES_PER_FRAME: u8 = 154;
pub const CYCLES_PER_LINE: u32 = 456;

/// T-cycles spent in OAM search each visible line
pub const OAM_SEARCH_CYCLES: u32 = 80;

/// Sprites the OAM search keeps per line
pub const MAX_SPRITES_PER_LINE: usize = 10;

const VRAM_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;
const OAM_ENTRIES: usize = 40;

/// Classic Game Boy green palette, ARGB, lightest first
pub const COLORS: [u32; 4] = [0xFF9BBC0F, 0xFF8BAC0F, 0xFF306230, 0xFF0F380F];

/// OAM Entry (sprite attributes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OamEntry {
    /// Y position (plus 16)
    pub y: Byte,
    /// X position (plus 8)
    pub x: Byte,
    pub tile: Byte,
    pub flags: Byte,
}

impl OamEntry {
    /// DMG palette number (bit 4): OBP1 when set
    pub fn palette_number(&self) -> bool {
        bit(self.flags, 4)
    }

    /// X flip (bit 5)
    pub fn x_flip(&self) -> bool {
        bit(self.flags, 5)
    }

    /// Y flip (bit 6)
    pub fn y_flip(&self) -> bool {
        bit(self.flags, 6)
    }

    /// BG/Window over OBJ priority (bit 7)
    pub fn bg_priority(&self) -> bool {
        bit(self.flags, 7)
    }
}

/// A sprite selected by OAM search for the current line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteHit {
    /// Index of the entry in OAM (0-39)
    pub oam_index: u8,
    pub entry: OamEntry,
    /// Set once the sprite fetcher has picked it up
    pub fetched: bool,
}

/// Pixel Processing Unit
#[derive(Debug)]
pub struct Ppu {
    pub lcd: Lcd,
    vram: Box<[Byte; VRAM_SIZE]>,
    oam: [Byte; OAM_SIZE],
    /// Video buffer (160x144 pixels, ARGB format)
    pub video_buffer: Vec<u32>,
    /// Completed frames
    frame: u64,
    /// Set on VBlank entry, cleared by whoever presents the frame
    frame_ready: bool,
    last_updated_at_cycle: u64,
    cycles_in_line: u32,
    /// Next OAM entry to evaluate during OAM search
    oam_index: usize,
    /// Sprites on current line, sorted by x after the search completes
    line_sprites: Vec<SpriteHit>,
    pipeline: Pipeline,
    /// Window line counter; -1 until the window first draws in a frame
    window_line: i16,
    /// WY has matched LY at some point this frame
    window_y_triggered: bool,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            lcd: Lcd::new(),
            vram: Box::new([0; VRAM_SIZE]),
            oam: [0; OAM_SIZE],
            video_buffer: vec![COLORS[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
            frame: 0,
            frame_ready: false,
            last_updated_at_cycle: 0,
            cycles_in_line: 0,
            oam_index: 0,
            line_sprites: Vec::with_capacity(MAX_SPRITES_PER_LINE),
            pipeline: Pipeline::new(),
            window_line: -1,
            window_y_triggered: false,
        }
    }

    /// Current mode from STAT
    pub fn mode(&self) -> PpuMode {
        self.lcd.mode()
    }

    /// Frames completed since power on
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Returns true once per VBlank entry
    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    /// Raw VRAM contents, for debugging
    pub fn vram(&self) -> &[Byte] {
        &self.vram[..]
    }

    fn vram_blocked(&self) -> bool {
        self.lcd.mode() == PpuMode::Drawing
    }

    fn oam_blocked(&self) -> bool {
        matches!(self.lcd.mode(), PpuMode::OamSearch | PpuMode::Drawing)
    }

    /// Bus read of VRAM, OAM or an LCD register
    pub fn read(&self, address: Word) -> Byte {
        match address {
            0x8000..=0x9FFF if self.vram_blocked() => 0xFF,
            0x8000..=0x9FFF => self.vram[(address - 0x8000) as usize],
            0xFE00..=0xFE9F if self.oam_blocked() => 0xFF,
            0xFE00..=0xFE9F => self.oam[(address - 0xFE00) as usize],
            0xFF40..=0xFF4B => self.lcd.read(address),
            _ => 0xFF,
        }
    }

    /// Bus write of VRAM, OAM or an LCD register
    pub fn write(&mut self, address: Word, value: Byte, interrupts: &mut Interrupts) {
        match address {
            0x8000..=0x9FFF if self.vram_blocked() => {}
            0x8000..=0x9FFF => self.vram[(address - 0x8000) as usize] = value,
            0xFE00..=0xFE9F if self.oam_blocked() => {}
            0xFE00..=0xFE9F => self.oam[(address - 0xFE00) as usize] = value,
            0xFF40 => self.write_lcdc(value, interrupts),
            0xFF41..=0xFF4B => self.lcd.write(address, value, interrupts),
            _ => {}
        }
    }

    /// OAM write from the DMA engine, which ignores mode gating
    pub fn write_oam_direct(&mut self, offset: usize, value: Byte) {
        if let Some(slot) = self.oam.get_mut(offset) {
            *slot = value;
        }
    }

    fn write_lcdc(&mut self, value: Byte, interrupts: &mut Interrupts) {
        let was_enabled = self.lcd.lcd_enabled();
        self.lcd.lcdc = value;

        match (was_enabled, self.lcd.lcd_enabled()) {
            (true, false) => {
                debug!("LCD off at LY={}", self.lcd.ly);
                self.lcd.set_mode(PpuMode::HBlank);
                self.lcd.set_ly(0, interrupts);
                self.reset_line();
            }
            (false, true) => {
                debug!("LCD on");
                self.lcd.set_mode(PpuMode::OamSearch);
                self.lcd.compare_lyc(interrupts);
                self.reset_line();
            }
            _ => {}
        }
    }

    /// Forget all progress through the current line
    fn reset_line(&mut self) {
        self.cycles_in_line = 0;
        self.oam_index = 0;
        self.line_sprites.clear();
        self.pipeline.reset(0);
    }

    /// Get OAM entry at index
    pub fn oam_entry(&self, index: usize) -> OamEntry {
        if index >= OAM_ENTRIES {
            return OamEntry::default();
        }
        let offset = index * 4;
        OamEntry {
            y: self.oam[offset],
            x: self.oam[offset + 1],
            tile: self.oam[offset + 2],
            flags: self.oam[offset + 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ppu_new() {
        let ppu = Ppu::new();
        assert_eq!(ppu.vram().len(), 0x2000);
        assert_eq!(ppu.video_buffer.len(), SCREEN_WIDTH * SCREEN_HEIGHT);
        assert_eq!(ppu.mode(), PpuMode::HBlank);
    }

    #[test]
    fn test_vram_read_write() {
        let mut ppu = Ppu::new();
        let mut ints = Interrupts::new();

        ppu.write(0x8000, 0x42, &mut ints);
        assert_eq!(ppu.read(0x8000), 0x42);

        ppu.write(0x9FFF, 0x55, &mut ints);
        assert_eq!(ppu.read(0x9FFF), 0x55);
    }

    #[test]
    fn test_vram_gated_while_drawing() {
        let mut ppu = Ppu::new();
        let mut ints = Interrupts::new();
        ppu.write(0x8000, 0x42, &mut ints);

        ppu.lcd.set_mode(PpuMode::Drawing);
        assert_eq!(ppu.read(0x8000), 0xFF);
        ppu.write(0x8000, 0x99, &mut ints);

        ppu.lcd.set_mode(PpuMode::OamSearch);
        assert_eq!(ppu.read(0x8000), 0x42);
    }

    #[test]
    fn test_oam_gated_in_search_and_drawing() {
        let mut ppu = Ppu::new();
        let mut ints = Interrupts::new();
        ppu.write(0xFE00, 0x10, &mut ints);

        for mode in [PpuMode::OamSearch, PpuMode::Drawing] {
            ppu.lcd.set_mode(mode);
            assert_eq!(ppu.read(0xFE00), 0xFF);
        }
        for mode in [PpuMode::HBlank, PpuMode::VBlank] {
            ppu.lcd.set_mode(mode);
            assert_eq!(ppu.read(0xFE00), 0x10);
        }

        ppu.lcd.set_mode(PpuMode::OamSearch);
        ppu.write_oam_direct(0, 0x20);
        ppu.lcd.set_mode(PpuMode::HBlank);
        assert_eq!(ppu.read(0xFE00), 0x20);
    }

    #[test]
    fn test_oam_entry() {
        let mut ppu = Ppu::new();
        let mut ints = Interrupts::new();

        for (i, v) in [32, 16, 5, 0b11110000].into_iter().enumerate() {
            ppu.write(0xFE00 + i as Word, v, &mut ints);
        }

        let entry = ppu.oam_entry(0);
        assert_eq!(entry.y, 32);
        assert_eq!(entry.x, 16);
        assert_eq!(entry.tile, 5);
        assert!(entry.bg_priority());
        assert!(entry.y_flip());
        assert!(entry.x_flip());
        assert!(entry.palette_number());
        assert_eq!(ppu.oam_entry(40), OamEntry::default());
    }

    #[test]
    fn test_lcd_toggle() {
        let mut ppu = Ppu::new();
        let mut ints = Interrupts::new();

        ppu.write(0xFF40, 0x91, &mut ints);
        assert_eq!(ppu.mode(), PpuMode::OamSearch);

        ppu.lcd.ly = 77;
        ppu.write(0xFF40, 0x11, &mut ints);
        assert_eq!(ppu.mode(), PpuMode::HBlank);
        assert_eq!(ppu.read(0xFF44), 0);
    }

    #[test]
    fn test_mode_idempotent() {
        let mut ppu = Ppu::new();
        let mut ints = Interrupts::new();
        ppu.write(0xFF40, 0x91, &mut ints);
        ppu.update(100, &mut ints);
        assert_eq!(ppu.mode(), ppu.mode());
    }
}
