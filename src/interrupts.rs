//! Interrupts
//!
//! The IE (0xFFFF) and IF (0xFF0F) registers. Components raise requests
//! through [`Interrupts::request`]; the CPU serves the highest-priority one
//! that is both requested and enabled.

use crate::common::Byte;

/// Interrupt sources, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    /// VBlank interrupt (highest priority)
    VBlank,
    /// LCD STAT interrupt
    LcdStat,
    /// Timer overflow interrupt
    Timer,
    /// Serial transfer interrupt
    Serial,
    /// Joypad interrupt (lowest priority)
    Joypad,
}

impl InterruptType {
    /// Bit mask for this interrupt in IE/IF
    pub fn bit(&self) -> Byte {
        match self {
            InterruptType::VBlank => 0x01,
            InterruptType::LcdStat => 0x02,
            InterruptType::Timer => 0x04,
            InterruptType::Serial => 0x08,
            InterruptType::Joypad => 0x10,
        }
    }

    /// Handler address the CPU jumps to when serving this interrupt
    pub fn vector(&self) -> u16 {
        match self {
            InterruptType::VBlank => 0x0040,
            InterruptType::LcdStat => 0x0048,
            InterruptType::Timer => 0x0050,
            InterruptType::Serial => 0x0058,
            InterruptType::Joypad => 0x0060,
        }
    }

    /// All interrupt types, highest priority first
    pub fn all() -> &'static [InterruptType] {
        &[
            InterruptType::VBlank,
            InterruptType::LcdStat,
            InterruptType::Timer,
            InterruptType::Serial,
            InterruptType::Joypad,
        ]
    }
}

/// Interrupt enable and request registers
#[derive(Debug, Default, Clone)]
pub struct Interrupts {
    /// IF: requested interrupts (0xFF0F)
    pub flags: Byte,
    /// IE: enabled interrupts (0xFFFF)
    pub enable: Byte,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise an interrupt request. It stays set until served.
    pub fn request(&mut self, interrupt: InterruptType) {
        self.flags |= interrupt.bit();
    }

    /// Requested and enabled interrupts
    pub fn pending(&self) -> Byte {
        self.flags & self.enable & 0x1F
    }

    /// Highest-priority interrupt that is both requested and enabled
    pub fn highest_pending(&self) -> Option<InterruptType> {
        let pending = self.pending();
        InterruptType::all()
            .iter()
            .copied()
            .find(|int_type| pending & int_type.bit() != 0)
    }

    /// Clear the request bit once the interrupt is being served
    pub fn acknowledge(&mut self, interrupt: InterruptType) {
        self.flags &= !interrupt.bit();
    }

    /// IF reads with the unused upper bits set
    pub fn read_flags(&self) -> Byte {
        self.flags | 0xE0
    }

    pub fn write_flags(&mut self, value: Byte) {
        self.flags = value & 0x1F;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_interrupt() {
        let mut ints = Interrupts::new();
        ints.request(InterruptType::VBlank);
        assert_eq!(ints.flags, 0x01);

        ints.request(InterruptType::Timer);
        assert_eq!(ints.flags, 0x05);
    }

    #[test]
    fn test_highest_pending_respects_priority_and_enable() {
        let mut ints = Interrupts::new();
        ints.request(InterruptType::Timer);
        ints.request(InterruptType::LcdStat);
        assert_eq!(ints.highest_pending(), None);

        ints.enable = 0x04;
        assert_eq!(ints.highest_pending(), Some(InterruptType::Timer));

        ints.enable = 0x1F;
        assert_eq!(ints.highest_pending(), Some(InterruptType::LcdStat));

        ints.acknowledge(InterruptType::LcdStat);
        assert_eq!(ints.highest_pending(), Some(InterruptType::Timer));
    }

    #[test]
    fn test_flags_register_upper_bits() {
        let mut ints = Interrupts::new();
        ints.write_flags(0xFF);
        assert_eq!(ints.flags, 0x1F);
        assert_eq!(ints.read_flags(), 0xFF);

        ints.write_flags(0x00);
        assert_eq!(ints.read_flags(), 0xE0);
    }

    #[test]
    fn test_vectors() {
        assert_eq!(InterruptType::VBlank.vector(), 0x40);
        assert_eq!(InterruptType::Joypad.vector(), 0x60);
    }
}
