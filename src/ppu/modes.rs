//! PPU mode state machine
//!
//! OAM search (80 T-cycles) -> drawing (172+) -> HBlank (rest of the 456
//! cycle line) for lines 0-143, then VBlank for lines 144-153. A single
//! [`Ppu::update`] call may cross any number of mode boundaries; whatever
//! is left of the cycle budget carries into the next mode.

use log::trace;

use super::{
    Ppu, SpriteHit, CYCLES_PER_LINE, LINES_PER_FRAME, MAX_SPRITES_PER_LINE, SCREEN_HEIGHT,
};
use crate::interrupts::{InterruptType, Interrupts};
use crate::lcd::PpuMode;

const OAM_ENTRIES: usize = 40;

impl Ppu {
    /// Catch up to the clock, processing every T-cycle since the last call
    pub fn update(&mut self, now: u64, interrupts: &mut Interrupts) {
        if !self.lcd.lcd_enabled() {
            self.last_updated_at_cycle = now;
            return;
        }

        let mut budget = now.saturating_sub(self.last_updated_at_cycle);
        loop {
            match self.lcd.mode() {
                PpuMode::OamSearch => {
                    if !self.oam_search(&mut budget) {
                        break;
                    }
                }
                PpuMode::Drawing => {
                    let left = self.pixel_pipe(budget);
                    self.cycles_in_line += (budget - left) as u32;
                    budget = left;

                    if !self.pipeline.line_done() {
                        break;
                    }
                    self.enter_hblank(interrupts);
                }
                PpuMode::HBlank => {
                    if !self.finish_line(&mut budget) {
                        break;
                    }
                    let ly = self.lcd.ly + 1;
                    self.lcd.set_ly(ly, interrupts);
                    if ly as usize == SCREEN_HEIGHT {
                        self.enter_vblank(interrupts);
                    } else {
                        self.enter_oam_search(interrupts);
                    }
                }
                PpuMode::VBlank => {
                    if !self.finish_line(&mut budget) {
                        break;
                    }
                    let ly = self.lcd.ly + 1;
                    if ly == LINES_PER_FRAME {
                        self.lcd.set_ly(0, interrupts);
                        self.frame += 1;
                        self.enter_oam_search(interrupts);
                    } else {
                        self.lcd.set_ly(ly, interrupts);
                    }
                }
            }
        }

        // An odd cycle may be left over inside OAM search
        self.last_updated_at_cycle = now - budget;
    }

    /// Evaluate OAM entries, two T-cycles each. Returns true once all 40
    /// are done and drawing has begun.
    fn oam_search(&mut self, budget: &mut u64) -> bool {
        if self.oam_index == 0 {
            self.line_sprites.clear();
            if self.lcd.ly == self.lcd.wy {
                self.window_y_triggered = true;
            }
        }

        let height = self.lcd.sprite_height() as u16;
        let line = self.lcd.ly as u16 + 16;
        while *budget >= 2 && self.oam_index < OAM_ENTRIES {
            let entry = self.oam_entry(self.oam_index);
            let y = entry.y as u16;
            if entry.x > 0
                && line >= y
                && line < y + height
                && self.line_sprites.len() < MAX_SPRITES_PER_LINE
            {
                self.line_sprites.push(SpriteHit {
                    oam_index: self.oam_index as u8,
                    entry,
                    fetched: false,
                });
            }

            self.oam_index += 1;
            self.cycles_in_line += 2;
            *budget -= 2;
        }

        if self.oam_index < OAM_ENTRIES {
            return false;
        }

        // Stable: equal x keeps OAM order
        self.line_sprites.sort_by_key(|hit| hit.entry.x);
        self.oam_index = 0;
        self.pipeline.reset(self.lcd.scx % 8);
        self.lcd.set_mode(PpuMode::Drawing);
        true
    }

    /// Pad the line out to 456 cycles. Returns true when the line ended.
    fn finish_line(&mut self, budget: &mut u64) -> bool {
        let remaining = CYCLES_PER_LINE.saturating_sub(self.cycles_in_line) as u64;
        if *budget < remaining {
            self.cycles_in_line += *budget as u32;
            *budget = 0;
            return false;
        }
        *budget -= remaining;
        self.cycles_in_line = 0;
        true
    }

    fn enter_hblank(&mut self, interrupts: &mut Interrupts) {
        self.lcd.set_mode(PpuMode::HBlank);
        if self.lcd.hblank_int_enabled() {
            interrupts.request(InterruptType::LcdStat);
        }
        self.pipeline.reset(0);
    }

    fn enter_vblank(&mut self, interrupts: &mut Interrupts) {
        self.lcd.set_mode(PpuMode::VBlank);
        interrupts.request(InterruptType::VBlank);
        if self.lcd.vblank_int_enabled() {
            interrupts.request(InterruptType::LcdStat);
        }
        self.window_line = -1;
        self.window_y_triggered = false;
        self.frame_ready = true;
        trace!("VBlank, frame {}", self.frame);
    }

    fn enter_oam_search(&mut self, interrupts: &mut Interrupts) {
        self.lcd.set_mode(PpuMode::OamSearch);
        if self.lcd.oam_int_enabled() {
            interrupts.request(InterruptType::LcdStat);
        }
    }
}
