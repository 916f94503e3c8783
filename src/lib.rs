//! fifoboy
//!
//! Game Boy (DMG) emulator core. A cycle-counted SM83 CPU drives a shared
//! clock; the PPU, timer and OAM DMA catch up to that clock after every
//! CPU step. The PPU renders through a background/sprite pixel FIFO, so
//! scanline timing and mid-line register writes behave as on hardware.

pub mod bus;
pub mod cart;
pub mod common;
pub mod cpu;
pub mod dma;
pub mod emu;
pub mod error;
pub mod gamepad;
pub mod interrupts;
pub mod lcd;
pub mod mbc;
pub mod ppu;
pub mod ram;
pub mod timer;
#[cfg(feature = "ui")]
pub mod ui;
