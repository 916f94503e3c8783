//! fifoboy - Entry Point
//!
//! Loads a cartridge and runs it, either headless for a fixed number of
//! frames or, with the `ui` feature, in an SDL2 window.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use fifoboy::cart::Cartridge;
use fifoboy::emu::{Emulator, EmulatorConfig};
use fifoboy::error::{Error, Result};

#[derive(Parser)]
#[command(version, about = "Game Boy (DMG) emulator with a pixel-FIFO PPU")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// 256-byte DMG boot ROM to run before the cartridge
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Frames emulated per presented frame (1-15)
    #[arg(long, default_value_t = 1)]
    speed: u32,

    /// Frames to run when headless
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Write VRAM to this file after the run
    #[arg(long)]
    dump_vram: Option<PathBuf>,

    /// Run without a window even when built with the `ui` feature
    #[arg(long)]
    headless: bool,
}

fn read_file(path: &PathBuf) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::Io {
        path: path.clone(),
        source,
    })
}

fn run(args: Args) -> Result<()> {
    let cartridge = Cartridge::load(&args.rom)?;
    let boot_rom = args.boot_rom.as_ref().map(read_file).transpose()?;

    let config = EmulatorConfig {
        speed_multiplier: args.speed,
        boot_rom,
    };
    let mut emulator = Emulator::new(cartridge, config)?;

    if cfg!(feature = "ui") && !args.headless {
        run_ui(&mut emulator)?;
    } else {
        emulator.run(args.frames)?;
    }

    if let Some(path) = &args.dump_vram {
        std::fs::write(path, emulator.vram()).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        info!("VRAM written to {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "ui")]
fn run_ui(emulator: &mut Emulator) -> Result<()> {
    fifoboy::ui::Ui::new()?.run(emulator)
}

#[cfg(not(feature = "ui"))]
fn run_ui(_emulator: &mut Emulator) -> Result<()> {
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
