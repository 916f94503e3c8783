//! RAM
//!
//! Work RAM (0xC000-0xDFFF, mirrored at 0xE000-0xFDFF) and High RAM
//! (0xFF80-0xFFFE).

use crate::common::{Byte, Word};

/// WRAM size: 8KB
const WRAM_SIZE: usize = 0x2000;

/// HRAM size: 127 bytes
const HRAM_SIZE: usize = 0x7F;

/// RAM structure containing WRAM and HRAM
#[derive(Debug)]
pub struct Ram {
    wram: [Byte; WRAM_SIZE],
    hram: [Byte; HRAM_SIZE],
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl Ram {
    pub fn new() -> Self {
        Self {
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
        }
    }

    /// Offset into WRAM for either the real range or its echo
    fn wram_offset(address: Word) -> usize {
        (address as usize - 0xC000) % WRAM_SIZE
    }

    /// Read from WRAM or its echo (0xC000-0xFDFF)
    pub fn wram_read(&self, address: Word) -> Byte {
        self.wram[Self::wram_offset(address)]
    }

    /// Write to WRAM or its echo (0xC000-0xFDFF)
    pub fn wram_write(&mut self, address: Word, value: Byte) {
        self.wram[Self::wram_offset(address)] = value;
    }

    /// Read from HRAM (0xFF80-0xFFFE)
    pub fn hram_read(&self, address: Word) -> Byte {
        self.hram
            .get((address.wrapping_sub(0xFF80)) as usize)
            .copied()
            .unwrap_or(0xFF)
    }

    /// Write to HRAM (0xFF80-0xFFFE)
    pub fn hram_write(&mut self, address: Word, value: Byte) {
        if let Some(slot) = self.hram.get_mut((address.wrapping_sub(0xFF80)) as usize) {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wram_read_write() {
        let mut ram = Ram::new();

        ram.wram_write(0xC000, 0x42);
        assert_eq!(ram.wram_read(0xC000), 0x42);

        ram.wram_write(0xDFFF, 0xAB);
        assert_eq!(ram.wram_read(0xDFFF), 0xAB);
    }

    #[test]
    fn test_echo_ram_aliases_wram() {
        let mut ram = Ram::new();

        ram.wram_write(0xC123, 0x55);
        assert_eq!(ram.wram_read(0xE123), 0x55);

        ram.wram_write(0xFDFF, 0x66);
        assert_eq!(ram.wram_read(0xDDFF), 0x66);
    }

    #[test]
    fn test_hram_read_write() {
        let mut ram = Ram::new();

        ram.hram_write(0xFF80, 0x12);
        assert_eq!(ram.hram_read(0xFF80), 0x12);

        ram.hram_write(0xFFFE, 0x34);
        assert_eq!(ram.hram_read(0xFFFE), 0x34);

        // IE sits just past HRAM
        assert_eq!(ram.hram_read(0xFFFF), 0xFF);
    }
}
