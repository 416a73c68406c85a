use std::fmt;

/// Faults raised while decoding a cartridge or executing an instruction.
///
/// `OpNotImplemented`, `BusFault`, and `InternalInvariant` are fatal: the
/// frame loop unwinds and writes a crash dump. `DecodeError` is a warning
/// for `run` (execution proceeds) but a hard error for `info`.
/// `HostQuit` is a clean exit, still routed through the dump path with a
/// "Safe exit" label.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("opcode {opcode:#04x}{cb} at {pc:#06x} not implemented")]
    OpNotImplemented {
        opcode: u8,
        cb: &'static str,
        pc: u16,
    },

    #[error("PC reached I/O region ({pc:#06x}) during fetch")]
    BusFault { pc: u16 },

    #[error("cartridge header: {0}")]
    DecodeError(String),

    #[error("host requested quit")]
    HostQuit,

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

/// A frozen view of machine state at the moment a fault occurred, sufficient
/// to reconstruct `crash.txt` (spec.md §6, "Files produced").
pub struct CrashContext {
    pub message: String,
    pub last_mnemonic: String,
    pub pc: u16,
    pub registers: String,
    pub memory: Vec<u8>,
}

impl fmt::Display for CrashContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}\n", self.message)?;
        writeln!(f, "last instruction: {} @ {:#06x}\n", self.last_mnemonic, self.pc)?;
        writeln!(f, "{}", self.registers)?;
        for (row, chunk) in self.memory.chunks(16).enumerate() {
            write!(f, "{:04X} :", row * 16)?;
            for b in chunk {
                write!(f, " {b:02X}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
