//! Common types and utilities
//!
//! Type aliases matching the Game Boy's data widths and small bit helpers
//! shared by the register files.

/// 8-bit unsigned integer (Game Boy byte)
pub type Byte = u8;

/// 16-bit unsigned integer (Game Boy word)
pub type Word = u16;

/// Check if bit `n` (0-7) of `value` is set
#[inline]
pub fn bit(value: Byte, n: u8) -> bool {
    (value & (1 << n)) != 0
}

/// Set or clear bit `n` (0-7) of `value`
#[inline]
pub fn bit_set(value: &mut Byte, n: u8, on: bool) {
    if on {
        *value |= 1 << n;
    } else {
        *value &= !(1 << n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit() {
        assert!(bit(0b00000001, 0));
        assert!(!bit(0b00000001, 1));
        assert!(bit(0b10000000, 7));
        assert!(!bit(0b01111111, 7));
        assert!(bit(0b00010000, 4));
    }

    #[test]
    fn test_bit_set() {
        let mut value: Byte = 0;

        bit_set(&mut value, 0, true);
        assert_eq!(value, 0b00000001);

        bit_set(&mut value, 7, true);
        assert_eq!(value, 0b10000001);

        bit_set(&mut value, 0, false);
        assert_eq!(value, 0b10000000);

        bit_set(&mut value, 7, false);
        assert_eq!(value, 0);
    }
}
