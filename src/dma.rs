//! DMA Transfer
//!
//! OAM DMA copies 160 bytes from `value << 8` into OAM (0xFE00-0xFE9F), one
//! byte per T-cycle. The controller only tracks progress; the bus performs
//! the copies when it catches the transfer up to the clock.

use log::warn;

use crate::common::{Byte, Word};

/// Number of bytes copied by one transfer
pub const DMA_LENGTH: usize = 160;

/// Highest source page; pages above this would read OAM and I/O
const MAX_SOURCE_PAGE: Byte = 0xDF;

/// DMA Transfer Controller
#[derive(Debug, Clone, Default)]
pub struct Dma {
    active: bool,
    /// First source address of the transfer
    source: Word,
    /// Next byte to copy (0-159)
    index: usize,
    /// Last value written to 0xFF46
    register: Byte,
    last_updated_at_cycle: u64,
}

impl Dma {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write to 0xFF46. A write while a transfer is running is ignored.
    pub fn start(&mut self, value: Byte) {
        if self.active {
            warn!("DMA re-triggered with 0x{:02X} while active, ignoring", value);
            return;
        }
        self.register = value;
        self.source = (value.min(MAX_SOURCE_PAGE) as Word) << 8;
        self.index = 0;
        self.active = true;
    }

    /// Read DMA register (returns last written value)
    pub fn read(&self) -> Byte {
        self.register
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Cycles elapsed since the last catch-up; moves the watermark to `now`
    pub fn elapsed(&mut self, now: u64) -> u64 {
        let elapsed = now.saturating_sub(self.last_updated_at_cycle);
        self.last_updated_at_cycle = self.last_updated_at_cycle.max(now);
        elapsed
    }

    /// Advance one T-cycle. Returns `(source, oam_offset)` of the byte to copy.
    pub fn tick(&mut self) -> Option<(Word, usize)> {
        if !self.active {
            return None;
        }
        let transfer = (self.source + self.index as Word, self.index);
        self.index += 1;
        if self.index >= DMA_LENGTH {
            self.active = false;
        }
        Some(transfer)
    }
}
