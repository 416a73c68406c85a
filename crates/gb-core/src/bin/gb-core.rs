//! CLI entry point: `gb-core info <rom>` and `gb-core run <rom>` (spec §6).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gb_core::boot::BootImage;
use gb_core::display::PaletteChoice;
use gb_core::error::{CoreError, CrashContext};
use gb_core::frame::{run_frame, FramePacer, Machine};
use gb_core::{Bus, Cartridge};

#[derive(Parser)]
#[command(name = "gb-core", about = "A Game Boy CPU interpreter, bus, and tile display core")]
struct Cli {
    /// Increase log verbosity (repeatable: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and print a cartridge header.
    Info { path: PathBuf },
    /// Run a cartridge to completion (until HostQuit or a fault).
    Run {
        path: PathBuf,
        /// Path to a 256-byte boot image; defaults to a synthesized stub.
        #[arg(long)]
        boot: Option<PathBuf>,
        /// Render the supplemental full-VRAM debug view alongside the frame.
        #[arg(long)]
        debug_vram: bool,
        /// Output palette.
        #[arg(long, default_value = "default")]
        palette: PaletteChoice,
        /// Maximum number of frames to run before stopping (0 = unbounded).
        #[arg(long, default_value_t = 0)]
        max_frames: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    match cli.command {
        Commands::Info { path } => info(&path),
        Commands::Run { path, boot, debug_vram, palette, max_frames } => {
            run(&path, boot.as_deref(), debug_vram, palette, max_frames)
        }
    }
}

fn info(path: &Path) -> Result<()> {
    let rom = std::fs::read(path).with_context(|| format!("reading ROM {}", path.display()))?;
    match Cartridge::from_bytes(rom) {
        Ok(cart) => {
            println!("{cart}");
            if !cart.checksum_ok {
                anyhow::bail!("header checksum mismatch");
            }
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e)),
    }
}

fn run(path: &Path, boot: Option<&Path>, debug_vram: bool, palette: PaletteChoice, max_frames: u64) -> Result<()> {
    let rom = std::fs::read(path).with_context(|| format!("reading ROM {}", path.display()))?;
    let cart = match Cartridge::from_bytes(rom) {
        Ok(cart) => cart,
        Err(e) => {
            log::warn!("cartridge decode warning: {e}");
            anyhow::bail!(e);
        }
    };
    if !cart.checksum_ok {
        log::warn!("header checksum mismatch for '{}'", cart.title);
    }

    let boot_image = match boot {
        Some(p) => BootImage::from_file(p).with_context(|| format!("loading boot image {}", p.display()))?,
        None => BootImage::synthesized(),
    };
    let bus = Bus::new(cart.rom, boot_image);
    let mut machine = Machine::new(bus);
    let mut pacer = FramePacer::new();
    let palette_table = palette.table();

    let mut frames: u64 = 0;
    let outcome: Result<&str, CoreError> = loop {
        match run_frame(&mut machine, palette_table, debug_vram) {
            Ok(_out) => {
                for &b in &machine.bus.serial_tap {
                    print!("{}", b as char);
                }
                machine.bus.serial_tap.clear();
                frames += 1;
                if max_frames != 0 && frames >= max_frames {
                    break Ok("Safe exit");
                }
                pacer.wait_for_next_frame();
            }
            Err(CoreError::HostQuit) => break Ok("Safe exit"),
            Err(e) => break Err(e),
        }
    };

    match outcome {
        Ok(message) => {
            write_crash_dump(&machine, message)?;
            Ok(())
        }
        Err(e) => {
            log::error!("{e}");
            write_crash_dump(&machine, &e.to_string())?;
            Err(anyhow::anyhow!(e))
        }
    }
}

fn write_crash_dump(machine: &Machine, message: &str) -> Result<()> {
    let mut memory = Vec::with_capacity(0x10000);
    for addr in 0x0000..=0xFFFFu32 {
        memory.push(machine.bus.read8(addr as u16));
    }
    let ctx = CrashContext {
        message: message.to_string(),
        last_mnemonic: machine.cpu.last_mnemonic.clone(),
        pc: machine.cpu.last_pc,
        registers: machine.cpu.register_dump(),
        memory,
    };
    std::fs::write("crash.txt", ctx.to_string()).context("writing crash.txt")?;
    Ok(())
}
