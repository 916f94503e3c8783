//! Pixel FIFO pipeline
//!
//! During drawing the background fetcher and the sprite fetcher take turns
//! advancing one state every 2 T-cycles, while one pixel per T-cycle is
//! shifted out of the background FIFO, mixed with the sprite FIFO and written
//! to the video buffer. A sprite fetch stalls both the background fetcher and
//! the shifter until its pixels are merged.

use std::collections::VecDeque;

use super::{Ppu, SpriteHit, COLORS, SCREEN_WIDTH};
use crate::common::Byte;
use crate::lcd::Lcd;

/// Fetcher states; each takes one 2-cycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherState {
    GetTile,
    GetTileDataLow,
    GetTileDataHigh,
    Push,
}

/// Background/window tile fetcher
#[derive(Debug, Clone)]
struct BgFetcher {
    state: FetcherState,
    /// Tile column being fetched, relative to line or window start
    x: u8,
    tile: Byte,
    low: Byte,
    high: Byte,
    /// The first tile of a run is fetched twice
    double_fetch_done: bool,
}

impl BgFetcher {
    fn new() -> Self {
        Self {
            state: FetcherState::GetTile,
            x: 0,
            tile: 0,
            low: 0,
            high: 0,
            double_fetch_done: false,
        }
    }
}

/// Fetcher for a single sprite from the OAM search buffer
#[derive(Debug, Clone)]
struct SpriteFetcher {
    state: FetcherState,
    /// Index into the line's sprite buffer
    sprite: usize,
    low: Byte,
    high: Byte,
}

/// One entry of the sprite FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpritePixel {
    /// Raw 2-bit color index; 0 is transparent
    pub color: u8,
    /// Background colors 1-3 are drawn over this pixel
    pub bg_priority: bool,
    /// Use OBP1 instead of OBP0
    pub obp1: bool,
}

/// Per-line pipeline state
#[derive(Debug, Clone)]
pub struct Pipeline {
    fetcher: BgFetcher,
    sprite_fetcher: Option<SpriteFetcher>,
    bg_fifo: VecDeque<u8>,
    sprite_fifo: VecDeque<SpritePixel>,
    /// Pixels emitted on this line so far
    current_pixel: u8,
    /// Background pixels still to drop for SCX fine scroll
    discard_remaining: u8,
    window_active: bool,
    /// Second cycle of a fetcher step
    odd_cycle: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            fetcher: BgFetcher::new(),
            sprite_fetcher: None,
            bg_fifo: VecDeque::with_capacity(16),
            sprite_fifo: VecDeque::with_capacity(8),
            current_pixel: 0,
            discard_remaining: 0,
            window_active: false,
            odd_cycle: false,
        }
    }

    /// Clear everything for a new line, dropping `discard` leading pixels
    pub fn reset(&mut self, discard: u8) {
        self.fetcher = BgFetcher::new();
        self.sprite_fetcher = None;
        self.bg_fifo.clear();
        self.sprite_fifo.clear();
        self.current_pixel = 0;
        self.discard_remaining = discard;
        self.window_active = false;
        self.odd_cycle = false;
    }

    pub fn current_pixel(&self) -> u8 {
        self.current_pixel
    }

    pub fn line_done(&self) -> bool {
        self.current_pixel as usize >= SCREEN_WIDTH
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Unpack one tile row into eight 2-bit color indices, leftmost first
fn decode_row(low: Byte, high: Byte) -> [u8; 8] {
    let mut pixels = [0u8; 8];
    for (i, pixel) in pixels.iter_mut().enumerate() {
        let shift = 7 - i;
        *pixel = ((high >> shift) & 1) << 1 | ((low >> shift) & 1);
    }
    pixels
}

impl Ppu {
    /// Run the pipeline for up to `budget` T-cycles. Returns the cycles left
    /// over once the line's last pixel is out.
    pub(super) fn pixel_pipe(&mut self, mut budget: u64) -> u64 {
        while budget > 0 {
            // Fetchers advance on the first cycle of each pair
            if !self.pipeline.odd_cycle {
                self.check_window();

                if self.pipeline.sprite_fetcher.is_some() {
                    self.sprite_fetch();
                }
                if self.pipeline.sprite_fetcher.is_none() {
                    self.bg_fetch();
                }
            }
            self.pipeline.odd_cycle = !self.pipeline.odd_cycle;

            budget -= 1;
            if self.shift_pixel() && self.pipeline.line_done() {
                return budget;
            }
        }
        budget
    }

    /// Switch to window tiles once the window's left edge is reached.
    /// Returns true on the cycle the switch happens.
    fn check_window(&mut self) -> bool {
        if self.pipeline.window_active || !self.lcd.window_enabled() {
            return false;
        }
        let y_reached = self.window_y_triggered || self.lcd.wy == self.lcd.ly;
        let x_reached = self.pipeline.current_pixel as i16 >= self.lcd.wx as i16 - 7;
        if !(y_reached && x_reached) {
            return false;
        }

        self.window_y_triggered = true;
        self.window_line += 1;

        let p = &mut self.pipeline;
        p.window_active = true;
        p.bg_fifo.clear();
        p.fetcher = BgFetcher::new();
        p.discard_remaining = 0;
        true
    }

    /// Shift one pixel out for one T-cycle. Returns true if a pixel reached
    /// the screen.
    fn shift_pixel(&mut self) -> bool {
        if self.pipeline.bg_fifo.is_empty() || self.pipeline.sprite_fetcher.is_some() {
            return false;
        }
        if self.pipeline.discard_remaining > 0 {
            self.pipeline.bg_fifo.pop_front();
            self.pipeline.discard_remaining -= 1;
            return false;
        }
        if self.check_window() || self.start_sprite_fetch() {
            return false;
        }

        let p = &mut self.pipeline;
        let bg = p.bg_fifo.pop_front().unwrap_or(0);
        let sprite = p.sprite_fifo.pop_front();
        let x = p.current_pixel as usize;
        p.current_pixel += 1;

        let color = self.composite(bg, sprite);
        let index = self.lcd.ly as usize * SCREEN_WIDTH + x;
        if let Some(out) = self.video_buffer.get_mut(index) {
            *out = color;
        }
        true
    }

    /// Final ARGB color for a background index and optional sprite pixel
    fn composite(&self, bg: u8, sprite: Option<SpritePixel>) -> u32 {
        let lcd = &self.lcd;
        if !lcd.bg_window_enabled() {
            return COLORS[0];
        }

        let sprite_wins = sprite.filter(|px| {
            px.color != 0 && lcd.sprites_enabled() && !(px.bg_priority && bg != 0)
        });

        let shade = match sprite_wins {
            Some(px) => {
                let palette = if px.obp1 { lcd.obp1 } else { lcd.obp0 };
                Lcd::shade(palette, px.color)
            }
            None => Lcd::shade(lcd.bgp, bg),
        };
        COLORS[shade as usize]
    }

    /// Begin fetching the next sprite that starts at the current pixel.
    /// Sprites hanging off the left edge are picked up at pixel 0. A full
    /// sprite FIFO does not block the fetch: a sprite starting here only
    /// overlays pixels that earlier sprites left transparent.
    fn start_sprite_fetch(&mut self) -> bool {
        let pixel = self.pipeline.current_pixel as u16;
        let found = self.line_sprites.iter().position(|s: &SpriteHit| {
            let x = s.entry.x as u16;
            !s.fetched && (x == pixel + 8 || (pixel == 0 && x < 8))
        });

        match found {
            Some(index) => {
                self.line_sprites[index].fetched = true;
                self.pipeline.sprite_fetcher = Some(SpriteFetcher {
                    state: FetcherState::GetTile,
                    sprite: index,
                    low: 0,
                    high: 0,
                });
                true
            }
            None => false,
        }
    }

    /// VRAM offset of the sprite's tile row on the current line
    fn sprite_row_address(&self, hit: &SpriteHit) -> usize {
        let height = self.lcd.sprite_height();
        let tile = if height == 16 {
            hit.entry.tile & 0xFE
        } else {
            hit.entry.tile
        };
        let mut row = (self.lcd.ly as u16 + 16).wrapping_sub(hit.entry.y as u16) as u8 % height;
        if hit.entry.y_flip() {
            row = height - 1 - row;
        }
        tile as usize * 16 + row as usize * 2
    }

    fn sprite_fetch(&mut self) {
        let Some(mut fetch) = self.pipeline.sprite_fetcher.take() else {
            return;
        };
        let Some(hit) = self.line_sprites.get(fetch.sprite).copied() else {
            return;
        };

        match fetch.state {
            // Tile number and attributes came from OAM search
            FetcherState::GetTile => fetch.state = FetcherState::GetTileDataLow,
            FetcherState::GetTileDataLow => {
                fetch.low = self.vram[self.sprite_row_address(&hit)];
                fetch.state = FetcherState::GetTileDataHigh;
            }
            FetcherState::GetTileDataHigh => {
                fetch.high = self.vram[self.sprite_row_address(&hit) + 1];
                fetch.state = FetcherState::Push;
            }
            FetcherState::Push => {
                self.merge_sprite(&hit, fetch.low, fetch.high);
                return;
            }
        }
        self.pipeline.sprite_fetcher = Some(fetch);
    }

    /// Overlay a fetched sprite row onto the sprite FIFO. Opaque pixels
    /// already queued belong to earlier sprites and keep priority.
    fn merge_sprite(&mut self, hit: &SpriteHit, low: Byte, high: Byte) {
        let mut colors = decode_row(low, high);
        if hit.entry.x_flip() {
            colors.reverse();
        }
        let skip = 8usize.saturating_sub(hit.entry.x as usize);

        let fifo = &mut self.pipeline.sprite_fifo;
        for (i, &color) in colors.iter().skip(skip).enumerate() {
            let pixel = SpritePixel {
                color,
                bg_priority: hit.entry.bg_priority(),
                obp1: hit.entry.palette_number(),
            };
            match fifo.get_mut(i) {
                Some(slot) if slot.color == 0 => *slot = pixel,
                Some(_) => {}
                None => fifo.push_back(pixel),
            }
        }
    }

    /// VRAM offset of a background/window tile's data
    fn tile_data_address(&self, tile: Byte) -> usize {
        if self.lcd.unsigned_tile_data() {
            tile as usize * 16
        } else {
            (0x1000 + (tile as i8 as i32) * 16) as usize
        }
    }

    /// Row within the tile for the current line
    fn bg_tile_row(&self) -> usize {
        if self.pipeline.window_active {
            (self.window_line.max(0) % 8) as usize
        } else {
            (self.lcd.ly.wrapping_add(self.lcd.scy) % 8) as usize
        }
    }

    fn bg_fetch(&mut self) {
        match self.pipeline.fetcher.state {
            FetcherState::GetTile => {
                let lcd = &self.lcd;
                let fetcher = &self.pipeline.fetcher;
                let (map, column, row) = if self.pipeline.window_active {
                    let row = (self.window_line.max(0) as usize / 8) & 31;
                    (lcd.window_tile_map(), fetcher.x as usize & 31, row)
                } else {
                    let column = (fetcher.x as usize * 8 + lcd.scx as usize) & 0xFF;
                    let row = lcd.ly.wrapping_add(lcd.scy) as usize;
                    (lcd.bg_tile_map(), column >> 3, row >> 3)
                };
                let address = (map - 0x8000) as usize + row * 32 + column;
                self.pipeline.fetcher.tile = self.vram[address];
                self.pipeline.fetcher.state = FetcherState::GetTileDataLow;
            }
            FetcherState::GetTileDataLow => {
                let address = self.tile_data_address(self.pipeline.fetcher.tile) + self.bg_tile_row() * 2;
                self.pipeline.fetcher.low = self.vram[address];
                self.pipeline.fetcher.state = FetcherState::GetTileDataHigh;
            }
            FetcherState::GetTileDataHigh => {
                let address = self.tile_data_address(self.pipeline.fetcher.tile) + self.bg_tile_row() * 2;
                let fetcher = &mut self.pipeline.fetcher;
                fetcher.high = self.vram[address + 1];
                if fetcher.double_fetch_done {
                    fetcher.state = FetcherState::Push;
                } else {
                    // First fetch of a run is thrown away
                    fetcher.double_fetch_done = true;
                    fetcher.state = FetcherState::GetTile;
                }
            }
            FetcherState::Push => {
                let p = &mut self.pipeline;
                if p.bg_fifo.is_empty() {
                    p.bg_fifo.extend(decode_row(p.fetcher.low, p.fetcher.high));
                    p.fetcher.x = p.fetcher.x.wrapping_add(1);
                    p.fetcher.state = FetcherState::GetTile;
                }
            }
        }
    }
}
