//! SDL2 User Interface
//!
//! Presents the video buffer once per frame and maps the keyboard to the
//! joypad. Only built with the `ui` feature.

use std::time::{Duration, Instant};

use log::info;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, Texture, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;

use crate::emu::Emulator;
use crate::error::{Error, Result};
use crate::gamepad::Button;
use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Scale factor for the window
pub const SCALE: u32 = 4;

const FRAME_DURATION: Duration = Duration::from_nanos(16_742_706);

/// SDL2 UI wrapper
pub struct Ui {
    canvas: Canvas<Window>,
    event_pump: EventPump,
    texture_creator: TextureCreator<WindowContext>,
}

impl Ui {
    pub fn new() -> Result<Self> {
        let sdl_context = sdl2::init().map_err(Error::Display)?;
        let video_subsystem = sdl_context.video().map_err(Error::Display)?;

        let window = video_subsystem
            .window(
                "fifoboy",
                SCREEN_WIDTH as u32 * SCALE,
                SCREEN_HEIGHT as u32 * SCALE,
            )
            .position_centered()
            .build()
            .map_err(|e| Error::Display(e.to_string()))?;

        let canvas = window
            .into_canvas()
            .software()
            .build()
            .map_err(|e| Error::Display(e.to_string()))?;

        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump().map_err(Error::Display)?;

        Ok(Self {
            canvas,
            event_pump,
            texture_creator,
        })
    }

    /// Run until the window closes or emulation faults
    pub fn run(&mut self, emulator: &mut Emulator) -> Result<()> {
        let mut texture = self
            .texture_creator
            .create_texture_streaming(
                PixelFormatEnum::ARGB8888,
                SCREEN_WIDTH as u32,
                SCREEN_HEIGHT as u32,
            )
            .map_err(|e| Error::Display(e.to_string()))?;

        'running: loop {
            let frame_start = Instant::now();

            for event in self.event_pump.poll_iter() {
                match event {
                    Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape),
                        ..
                    } => break 'running,
                    Event::KeyDown {
                        keycode: Some(key),
                        repeat: false,
                        ..
                    } => {
                        if let Some(button) = keycode_to_button(key) {
                            emulator.press(button);
                        }
                    }
                    Event::KeyUp {
                        keycode: Some(key), ..
                    } => {
                        if let Some(button) = keycode_to_button(key) {
                            emulator.release(button);
                        }
                    }
                    _ => {}
                }
            }

            emulator.run_frame()?;

            self.present(&mut texture, emulator.video_buffer())
                .map_err(Error::Display)?;

            let elapsed = frame_start.elapsed();
            if elapsed < FRAME_DURATION {
                std::thread::sleep(FRAME_DURATION - elapsed);
            }
        }

        info!("Window closed after {} frames", emulator.frame_count());
        Ok(())
    }

    fn present(&mut self, texture: &mut Texture, pixels: &[u32]) -> std::result::Result<(), String> {
        let bytes: Vec<u8> = pixels.iter().flat_map(|p| p.to_ne_bytes()).collect();
        texture
            .update(None, &bytes, SCREEN_WIDTH * 4)
            .map_err(|e| e.to_string())?;
        self.canvas.clear();
        self.canvas.copy(texture, None, None)?;
        self.canvas.present();
        Ok(())
    }
}

/// Convert SDL2 keycode to Game Boy button
fn keycode_to_button(keycode: Keycode) -> Option<Button> {
    match keycode {
        Keycode::Up => Some(Button::Up),
        Keycode::Down => Some(Button::Down),
        Keycode::Left => Some(Button::Left),
        Keycode::Right => Some(Button::Right),
        Keycode::Z => Some(Button::A),
        Keycode::X => Some(Button::B),
        Keycode::Return => Some(Button::Start),
        Keycode::Backspace => Some(Button::Select),
        _ => None,
    }
}
