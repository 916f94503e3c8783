//! Gamepad
//!
//! JOYP register (0xFF00). Buttons are active low:
//! - Bit 5: Select action keys (0 = selected)
//! - Bit 4: Select direction keys (0 = selected)
//! - Bit 3: Down or Start (0 = pressed)
//! - Bit 2: Up or Select (0 = pressed)
//! - Bit 1: Left or B (0 = pressed)
//! - Bit 0: Right or A (0 = pressed)
//!
//! When both groups are selected the action keys win.

use crate::common::{bit, Byte};

/// Game Boy buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Right,
    Left,
    Up,
    Down,
}

impl Button {
    /// Bit in the internal pressed mask; action keys in the high nibble
    fn mask(&self) -> Byte {
        match self {
            Button::Right => 0x01,
            Button::Left => 0x02,
            Button::Up => 0x04,
            Button::Down => 0x08,
            Button::A => 0x10,
            Button::B => 0x20,
            Button::Select => 0x40,
            Button::Start => 0x80,
        }
    }
}

/// Gamepad state
#[derive(Debug, Clone)]
pub struct Gamepad {
    /// Held buttons, active high: directions low nibble, actions high nibble
    pressed: Byte,
    /// Last value written to P1
    p1: Byte,
}

impl Default for Gamepad {
    fn default() -> Self {
        Self::new()
    }
}

impl Gamepad {
    pub fn new() -> Self {
        Self {
            pressed: 0,
            p1: 0xFF,
        }
    }

    /// Read JOYP register (0xFF00)
    pub fn read(&self) -> Byte {
        let keys = if !bit(self.p1, 5) {
            self.pressed >> 4
        } else if !bit(self.p1, 4) {
            self.pressed & 0x0F
        } else {
            return 0xFF;
        };
        (self.p1 & 0xF0) | (!keys & 0x0F)
    }

    /// Write JOYP register (0xFF00); only bits 4-5 are writable
    pub fn write(&mut self, value: Byte) {
        self.p1 = (self.p1 & !0x30) | (value & 0x30);
    }

    /// Hold a button. Returns true if it was not already held, which is
    /// when the joypad interrupt fires.
    pub fn press(&mut self, button: Button) -> bool {
        let newly = !self.is_pressed(button);
        self.pressed |= button.mask();
        newly
    }

    pub fn release(&mut self, button: Button) {
        self.pressed &= !button.mask();
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed & button.mask() != 0
    }

    pub fn any_pressed(&self) -> bool {
        self.pressed != 0
    }
}
