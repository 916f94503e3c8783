//! Emulator Core
//!
//! Owns the system clock, the CPU and the bus. Each [`Emulator::step`]
//! runs one CPU step, advances the clock by its cost and then lets the
//! bus catch DMA, PPU and timer up to the new time.

use log::info;

use crate::bus::{Bus, MemoryBus};
use crate::cart::Cartridge;
use crate::common::Byte;
use crate::cpu::Cpu;
use crate::error::Result;
use crate::gamepad::Button;
use crate::interrupts::InterruptType;
use crate::timer::POST_BOOT_DIV;

/// T-cycles in one video frame (456 cycles x 154 lines)
pub const CYCLES_PER_FRAME: u64 = 70224;

/// Upper bound for the fast-forward multiplier
pub const MAX_SPEED_MULTIPLIER: u32 = 15;

/// Session options
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Frames emulated per call to [`Emulator::run_frame`]
    pub speed_multiplier: u32,
    /// 256-byte DMG boot ROM; without one the post-boot state is applied
    pub boot_rom: Option<Vec<Byte>>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1,
            boot_rom: None,
        }
    }
}

/// Main Emulator structure
pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
    /// Total T-cycles since power on
    cycles: u64,
    config: EmulatorConfig,
}

impl Emulator {
    /// Power on with a cartridge inserted
    pub fn new(cartridge: Cartridge, config: EmulatorConfig) -> Result<Self> {
        let mut bus = Bus::new();
        bus.initialise(&cartridge.header, &cartridge.rom)?;

        let mut cpu = Cpu::new();
        match &config.boot_rom {
            Some(image) => {
                bus.set_boot_rom(image)?;
                info!("Starting from boot ROM");
            }
            None => {
                cpu.init();
                bus.write(0xFF40, 0x91);
                bus.write(0xFF47, 0xFC);
                bus.timer.set_div_counter(POST_BOOT_DIV);
            }
        }

        let mut emulator = Self {
            cpu,
            bus,
            cycles: 0,
            config,
        };
        emulator.set_speed(emulator.config.speed_multiplier);
        info!("Emulator ready: {}", emulator.cpu);
        Ok(emulator)
    }

    /// Clamp and apply a new speed multiplier
    pub fn set_speed(&mut self, multiplier: u32) {
        self.config.speed_multiplier = multiplier.clamp(1, MAX_SPEED_MULTIPLIER);
    }

    pub fn speed(&self) -> u32 {
        self.config.speed_multiplier
    }

    /// Clock value in T-cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one CPU step and catch the rest of the system up. Returns the
    /// T-cycles consumed.
    pub fn step(&mut self) -> Result<u32> {
        let spent = self.cpu.step(&mut self.bus)?;
        self.cycles += spent as u64;
        self.bus.update(self.cycles);

        match self.bus.take_fault() {
            Some(fault) => Err(fault),
            None => Ok(spent),
        }
    }

    /// Run one frame's worth of cycles, times the speed multiplier
    pub fn run_frame(&mut self) -> Result<()> {
        let target = self.cycles + CYCLES_PER_FRAME * self.config.speed_multiplier as u64;
        while self.cycles < target {
            self.step()?;
        }
        Ok(())
    }

    /// 160x144 ARGB pixels
    pub fn video_buffer(&self) -> &[u32] {
        &self.bus.ppu.video_buffer
    }

    /// True once after each VBlank entry
    pub fn take_frame_ready(&mut self) -> bool {
        self.bus.ppu.take_frame_ready()
    }

    pub fn frame_count(&self) -> u64 {
        self.bus.ppu.frame()
    }

    pub fn press(&mut self, button: Button) {
        self.bus.press(button);
    }

    pub fn release(&mut self, button: Button) {
        self.bus.release(button);
    }

    pub fn request_interrupt(&mut self, interrupt: InterruptType) {
        self.bus.interrupts_mut().request(interrupt);
    }

    /// VRAM contents, for debugging
    pub fn vram(&self) -> &[Byte] {
        self.bus.ppu.vram()
    }

    /// Run `frames` frame periods, stopping at the first fault. Counts
    /// periods rather than rendered frames so an LCD left off still ends.
    pub fn run(&mut self, frames: u64) -> Result<()> {
        let start = self.frame_count();
        for _ in 0..frames {
            self.run_frame()?;
        }
        info!(
            "Ran {} frames in {} cycles: {}",
            self.frame_count() - start,
            self.cycles,
            self.cpu
        );
        Ok(())
    }
}
