//! Frame Loop (spec §4.4): cycle accounting, HALT/STOP billing, the
//! once-per-frame Display Pass invocation, and host-rate pacing.

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::display::{self, DebugFrame, Frame, Palette};
use crate::error::CoreError;

/// SM83 clock speed (spec §2).
pub const CPU_HZ: u64 = 4_194_304;
/// T-cycles per frame: 154 scanlines * 456 dots (spec §4.4).
pub const CYCLES_PER_FRAME: u64 = 70_224;
/// Resulting host frame rate, ~59.7 Hz (spec §4.4).
pub const FRAME_SECONDS: f64 = CYCLES_PER_FRAME as f64 / CPU_HZ as f64;

pub struct Machine {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl Machine {
    pub fn new(bus: Bus) -> Self {
        Machine { cpu: Cpu::new(), bus }
    }

    /// Bills one instruction's worth of cycles, or 4 cycles without a fetch
    /// while HALT/STOP is latched (spec §4.4).
    fn tick(&mut self) -> Result<u32, CoreError> {
        if self.cpu.halted || self.cpu.stopped {
            Ok(4)
        } else {
            self.cpu.step(&mut self.bus)
        }
    }
}

#[derive(Debug)]
pub struct FrameOutput {
    pub frame: Frame,
    pub debug: Option<DebugFrame>,
}

/// Runs instructions until the per-frame cycle budget is spent, then invokes
/// the Display Pass exactly once (spec §4.4, §4.3).
pub fn run_frame(machine: &mut Machine, palette: Palette, debug_vram: bool) -> Result<FrameOutput, CoreError> {
    let mut accumulated: u64 = 0;
    while accumulated < CYCLES_PER_FRAME {
        accumulated += machine.tick()? as u64;
    }
    let frame = display::render(&machine.bus, palette);
    let debug = debug_vram.then(|| display::render_debug(&machine.bus, palette));
    Ok(FrameOutput { frame, debug })
}

/// Paces the host loop to the frame's real-world duration. A no-op "dead
/// reckoning" pacer: sleeps only the remainder of the frame budget, so a
/// frame that ran long is not compensated for on the next one.
pub struct FramePacer {
    last: std::time::Instant,
}

impl Default for FramePacer {
    fn default() -> Self {
        FramePacer { last: std::time::Instant::now() }
    }
}

impl FramePacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_for_next_frame(&mut self) {
        let target = std::time::Duration::from_secs_f64(FRAME_SECONDS);
        let elapsed = self.last.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
        self.last = std::time::Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::BootImage;

    fn machine_with(program: &[u8]) -> Machine {
        let mut rom = vec![0u8; 0x8000];
        rom[..program.len()].copy_from_slice(program);
        let mut bus = Bus::new(rom, BootImage::synthesized());
        bus.write8(0xFF50, 1);
        Machine::new(bus)
    }

    #[test]
    fn run_frame_spends_at_least_the_full_cycle_budget() {
        // An infinite loop of NOPs: JR -1 keeps re-executing 0x00 forever.
        let mut machine = machine_with(&[0x00, 0x18, 0xFE]); // NOP ; JR -2 (loops back to the JR itself)
        let _ = run_frame(&mut machine, display::DEFAULT_PALETTE, false).unwrap();
        assert_eq!(machine.cpu.regs.pc, 1); // stuck looping on the JR, proving cycles kept accumulating
    }

    #[test]
    fn halted_cpu_bills_four_cycles_without_advancing_pc() {
        let mut machine = machine_with(&[0x76]); // HALT
        run_frame(&mut machine, display::DEFAULT_PALETTE, false).unwrap();
        assert!(machine.cpu.halted);
        assert_eq!(machine.cpu.regs.pc, 1); // HALT itself advanced PC once, then billing stops advancing it
    }

    #[test]
    fn bus_fault_propagates_out_of_run_frame() {
        let mut machine = machine_with(&[]);
        machine.cpu.regs.pc = 0xFF10;
        let err = run_frame(&mut machine, display::DEFAULT_PALETTE, false).unwrap_err();
        assert!(matches!(err, CoreError::BusFault { .. }));
    }

    #[test]
    fn debug_vram_flag_populates_debug_frame() {
        let mut machine = machine_with(&[0x76]);
        let out = run_frame(&mut machine, display::DEFAULT_PALETTE, true).unwrap();
        assert!(out.debug.is_some());
        let out2 = run_frame(&mut machine, display::DEFAULT_PALETTE, false).unwrap();
        assert!(out2.debug.is_none());
    }
}
