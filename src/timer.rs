//! Timer
//!
//! Divider-chain timer registers:
//! - DIV (0xFF04): upper 8 bits of a 16-bit counter that ticks every T-cycle
//! - TIMA (0xFF05): Timer counter
//! - TMA (0xFF06): Timer modulo (reload value)
//! - TAC (0xFF07): Timer control (enable and frequency select)
//!
//! TIMA counts falling edges of `DIV bit & TAC enable`, so writing DIV or
//! TAC can itself produce an increment. On overflow TIMA reads 0x00 for four
//! T-cycles before TMA is loaded; the interrupt is requested immediately.

use crate::common::{bit, Byte, Word};
use crate::interrupts::{InterruptType, Interrupts};

/// DIV counter bit watched for each TAC frequency select
const DIVIDER_BITS: [u8; 4] = [
    9, // 00: 4096 Hz (CPU Clock / 1024)
    3, // 01: 262144 Hz (CPU Clock / 16)
    5, // 10: 65536 Hz (CPU Clock / 64)
    7, // 11: 16384 Hz (CPU Clock / 256)
];

/// T-cycles between overflow and the TMA reload
const RELOAD_DELAY: u8 = 4;

/// DIV counter value left behind by the boot ROM
pub const POST_BOOT_DIV: Word = 0xABCC;

/// Game Boy Timer
#[derive(Debug, Clone)]
pub struct Timer {
    /// Internal 16-bit divider; DIV is the upper byte
    div: Word,
    tima: Byte,
    tma: Byte,
    tac: Byte,
    /// Last `DIV bit & enable` result, for falling-edge detection
    previous_and: bool,
    /// Cycles left until TMA is loaded into TIMA; 0 when no reload pending
    reload_countdown: u8,
    last_updated_at_cycle: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            previous_and: false,
            reload_countdown: 0,
            last_updated_at_cycle: 0,
        }
    }

    /// Set the internal divider, used to reproduce the post-boot state
    pub fn set_div_counter(&mut self, value: Word) {
        self.div = value;
        self.previous_and = self.and_result();
    }

    pub fn read(&self, address: Word) -> Byte {
        match address {
            0xFF04 => (self.div >> 8) as Byte,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, address: Word, value: Byte) {
        match address {
            // Any write clears the whole counter, not just the visible byte
            0xFF04 => self.div = 0,
            0xFF05 => {
                self.tima = value;
                self.reload_countdown = 0;
            }
            0xFF06 => self.tma = value,
            0xFF07 => self.tac = value & 0x07,
            _ => {}
        }
    }

    fn and_result(&self) -> bool {
        let bit_pos = DIVIDER_BITS[(self.tac & 0x03) as usize];
        bit(self.tac, 2) && (self.div >> bit_pos) & 1 == 1
    }

    /// Advance the timer by one T-cycle
    pub fn tick(&mut self, interrupts: &mut Interrupts) {
        if self.reload_countdown > 0 {
            self.reload_countdown -= 1;
            if self.reload_countdown == 0 {
                self.tima = self.tma;
            }
        }

        self.div = self.div.wrapping_add(1);

        let and_result = self.and_result();
        if self.previous_and && !and_result {
            let (tima, overflow) = self.tima.overflowing_add(1);
            self.tima = tima;
            if overflow {
                self.reload_countdown = RELOAD_DELAY;
                interrupts.request(InterruptType::Timer);
            }
        }
        self.previous_and = and_result;
    }

    /// Catch up to the clock, processing every T-cycle since the last call
    pub fn update(&mut self, now: u64, interrupts: &mut Interrupts) {
        for _ in self.last_updated_at_cycle..now {
            self.tick(interrupts);
        }
        self.last_updated_at_cycle = self.last_updated_at_cycle.max(now);
    }
}
