//! CPU Registers
//!
//! Register file of the Sharp LR35902. The four general pairs are stored as
//! 16-bit words; the 8-bit halves are views onto them, so a write through
//! either name is immediately visible through the other.

use crate::common::{bit, Byte, Word};

/// Flag bit positions in F
const FLAG_Z: u8 = 7;
const FLAG_N: u8 = 6;
const FLAG_H: u8 = 5;
const FLAG_C: u8 = 4;

/// Generates the high/low byte accessors of a register pair
macro_rules! pair_halves {
    ($pair:ident, $hi:ident, $set_hi:ident, $lo:ident, $set_lo:ident) => {
        #[inline]
        pub fn $hi(&self) -> Byte {
            (self.$pair >> 8) as Byte
        }

        #[inline]
        pub fn $set_hi(&mut self, value: Byte) {
            self.$pair = (self.$pair & 0x00FF) | ((value as Word) << 8);
        }

        #[inline]
        pub fn $lo(&self) -> Byte {
            (self.$pair & 0xFF) as Byte
        }

        #[inline]
        pub fn $set_lo(&mut self, value: Byte) {
            self.$pair = (self.$pair & 0xFF00) | value as Word;
        }
    };
}

/// CPU Registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    af: Word,
    bc: Word,
    de: Word,
    hl: Word,
    /// Stack Pointer
    pub sp: Word,
    /// Program Counter
    pub pc: Word,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn af(&self) -> Word {
        self.af
    }

    /// The low nibble of F does not exist in hardware and always reads 0
    #[inline]
    pub fn set_af(&mut self, value: Word) {
        self.af = value & 0xFFF0;
    }

    #[inline]
    pub fn bc(&self) -> Word {
        self.bc
    }

    #[inline]
    pub fn set_bc(&mut self, value: Word) {
        self.bc = value;
    }

    #[inline]
    pub fn de(&self) -> Word {
        self.de
    }

    #[inline]
    pub fn set_de(&mut self, value: Word) {
        self.de = value;
    }

    #[inline]
    pub fn hl(&self) -> Word {
        self.hl
    }

    #[inline]
    pub fn set_hl(&mut self, value: Word) {
        self.hl = value;
    }

    #[inline]
    pub fn a(&self) -> Byte {
        (self.af >> 8) as Byte
    }

    #[inline]
    pub fn set_a(&mut self, value: Byte) {
        self.af = (self.af & 0x00FF) | ((value as Word) << 8);
    }

    #[inline]
    pub fn f(&self) -> Byte {
        (self.af & 0xFF) as Byte
    }

    #[inline]
    pub fn set_f(&mut self, value: Byte) {
        self.af = (self.af & 0xFF00) | (value & 0xF0) as Word;
    }

    pair_halves!(bc, b, set_b, c, set_c);
    pair_halves!(de, d, set_d, e, set_e);
    pair_halves!(hl, h, set_h, l, set_l);

    // ========== Flag Accessors ==========

    fn set_flag(&mut self, position: u8, value: bool) {
        let mask = 1 << position;
        let f = if value {
            self.f() | mask
        } else {
            self.f() & !mask
        };
        self.set_f(f);
    }

    /// Zero flag (bit 7)
    #[inline]
    pub fn flag_z(&self) -> bool {
        bit(self.f(), FLAG_Z)
    }

    #[inline]
    pub fn set_flag_z(&mut self, value: bool) {
        self.set_flag(FLAG_Z, value);
    }

    /// Subtract flag (bit 6)
    #[inline]
    pub fn flag_n(&self) -> bool {
        bit(self.f(), FLAG_N)
    }

    #[inline]
    pub fn set_flag_n(&mut self, value: bool) {
        self.set_flag(FLAG_N, value);
    }

    /// Half carry flag (bit 5)
    #[inline]
    pub fn flag_h(&self) -> bool {
        bit(self.f(), FLAG_H)
    }

    #[inline]
    pub fn set_flag_h(&mut self, value: bool) {
        self.set_flag(FLAG_H, value);
    }

    /// Carry flag (bit 4)
    #[inline]
    pub fn flag_c(&self) -> bool {
        bit(self.f(), FLAG_C)
    }

    #[inline]
    pub fn set_flag_c(&mut self, value: bool) {
        self.set_flag(FLAG_C, value);
    }

    /// Set all four flags at once
    #[inline]
    pub fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        let f = (z as Byte) << FLAG_Z
            | (n as Byte) << FLAG_N
            | (h as Byte) << FLAG_H
            | (c as Byte) << FLAG_C;
        self.set_f(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_registers() {
        let regs = Registers::new();
        assert_eq!(regs.af(), 0);
        assert_eq!(regs.bc(), 0);
        assert_eq!(regs.de(), 0);
        assert_eq!(regs.hl(), 0);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.sp, 0);
    }

    #[test]
    fn test_af_masks_low_nibble() {
        let mut regs = Registers::new();

        regs.set_af(0x01B0);
        assert_eq!(regs.a(), 0x01);
        assert_eq!(regs.f(), 0xB0);

        regs.set_af(0xFFFF);
        assert_eq!(regs.a(), 0xFF);
        assert_eq!(regs.f(), 0xF0);
        assert_eq!(regs.af(), 0xFFF0);

        regs.set_f(0x0F);
        assert_eq!(regs.f(), 0x00);
    }

    #[test]
    fn test_halves_alias_pairs() {
        let mut regs = Registers::new();

        regs.set_bc(0xABCD);
        assert_eq!(regs.b(), 0xAB);
        assert_eq!(regs.c(), 0xCD);

        regs.set_d(0x12);
        regs.set_e(0x34);
        assert_eq!(regs.de(), 0x1234);

        regs.set_hl(0x014D);
        regs.set_l(0xFF);
        assert_eq!(regs.h(), 0x01);
        assert_eq!(regs.hl(), 0x01FF);
    }

    #[test]
    fn test_flags() {
        let mut regs = Registers::new();

        regs.set_flag_z(true);
        assert!(regs.flag_z());
        assert_eq!(regs.f(), 0x80);

        regs.set_flag_n(true);
        regs.set_flag_h(true);
        regs.set_flag_c(true);
        assert_eq!(regs.f(), 0xF0);

        regs.set_flag_z(false);
        assert!(!regs.flag_z());
        assert_eq!(regs.f(), 0x70);

        // Flags never leak into A
        assert_eq!(regs.a(), 0);
    }

    #[test]
    fn test_set_flags() {
        let mut regs = Registers::new();
        regs.set_a(0x42);

        regs.set_flags(true, false, true, false);
        assert_eq!(regs.f(), 0xA0);

        regs.set_flags(false, true, false, true);
        assert_eq!(regs.f(), 0x50);
        assert_eq!(regs.a(), 0x42);
    }

    proptest! {
        #[test]
        fn test_pair_round_trip(value: u16) {
            let mut regs = Registers::new();
            regs.set_bc(value);
            regs.set_de(value);
            regs.set_hl(value);
            regs.set_af(value);
            prop_assert_eq!(regs.bc(), value);
            prop_assert_eq!(regs.de(), value);
            prop_assert_eq!(regs.hl(), value);
            prop_assert_eq!(regs.af(), value & 0xFFF0);
        }

        #[test]
        fn test_byte_writes_leave_partner_alone(hi: u8, lo: u8) {
            let mut regs = Registers::new();
            regs.set_h(hi);
            regs.set_l(lo);
            prop_assert_eq!(regs.hl(), (hi as u16) << 8 | lo as u16);
            regs.set_h(!hi);
            prop_assert_eq!(regs.l(), lo);
        }
    }
}
