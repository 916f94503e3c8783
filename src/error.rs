//! Error types
//!
//! Load-time configuration problems and fatal emulation faults share one
//! enum. Unmapped addresses are never errors; they fall back to open bus.

use std::path::PathBuf;

use thiserror::Error;

use crate::common::{Byte, Word};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ROM image is {0} bytes, too short to hold a cartridge header")]
    RomTooShort(usize),

    #[error("unsupported cartridge type 0x{0:02X} ({1})")]
    UnsupportedCartridge(Byte, &'static str),

    #[error("ROM bank data is {0} bytes, a bank holds at most 0x4000")]
    BankTooLarge(usize),

    #[error("boot ROM must be exactly 256 bytes, got {0}")]
    BootRomSize(usize),

    #[error("MBC1 RAM bank {bank} selected but the cartridge only has {available}")]
    RamBankOutOfRange { bank: usize, available: usize },

    #[error("illegal opcode 0x{opcode:02X} at 0x{pc:04X}")]
    IllegalOpcode { opcode: Byte, pc: Word },

    #[error("display error: {0}")]
    Display(String),
}
