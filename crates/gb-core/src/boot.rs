//! Boot stub (spec §4, "Boot overlay"; §4.6; §6).
//!
//! Either a user-supplied 256-byte `boot.gb` with its DRM checks patched to
//! no-ops, or a synthesized prologue of real SM83 machine code that sets up
//! post-boot register state and hands off by writing 0xFF50. The synthesized
//! bytes are grounded in the reference `pygb` bootloader fallback
//! (`examples/original_source/cpu.py`'s `BOOT` literal): they are actual
//! opcodes executed by the normal fetch/decode loop, not special-cased state.

use crate::error::CoreError;
use std::path::Path;

pub const BOOT_SIZE: usize = 0x100;

/// Offsets of the three DRM-verification checks patched to 0x00 (NOP) when
/// loading a user-supplied boot image.
const DRM_PATCH_OFFSETS: [usize; 4] = [0xE9, 0xEA, 0xFA, 0xFB];

/// 256 bytes overlaid at 0x0000–0x00FF while `0xFF50 == 0`.
pub struct BootImage {
    pub bytes: [u8; BOOT_SIZE],
}

impl BootImage {
    /// Reads a boot image from disk and patches the DRM check sites.
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let data = std::fs::read(path)
            .map_err(|e| CoreError::DecodeError(format!("reading boot image {}: {e}", path.display())))?;
        if data.len() != BOOT_SIZE {
            return Err(CoreError::DecodeError(format!(
                "boot image must be exactly {BOOT_SIZE} bytes, got {}",
                data.len()
            )));
        }
        let mut bytes = [0u8; BOOT_SIZE];
        bytes.copy_from_slice(&data);
        for &off in &DRM_PATCH_OFFSETS {
            bytes[off] = 0x00;
        }
        Ok(BootImage { bytes })
    }

    /// Builds the synthesized prologue: real SM83 opcodes that bring the
    /// machine to the power-on state in spec §3 and then disable the
    /// overlay via `LDH (0x50),A`.
    pub fn synthesized() -> Self {
        let prog: &[u8] = &[
            0x31, 0xFE, 0xFF, // LD SP, 0xFFFE
            0x37,             // SCF       -> C=1, clears H/N
            0x3E, 0x01,       // LD A, 0x01
            0xCB, 0x7F,       // BIT 7,A   -> Z=1, N=0, H=1, C untouched (still 1) -> F=0xB0
            0x06, 0x00,       // LD B, 0x00
            0x0E, 0x13,       // LD C, 0x13
            0x16, 0x00,       // LD D, 0x00
            0x1E, 0xD8,       // LD E, 0xD8
            0x26, 0x01,       // LD H, 0x01
            0x2E, 0x4D,       // LD L, 0x4D
        ];
        let mut bytes = [0u8; BOOT_SIZE];
        bytes[..prog.len()].copy_from_slice(prog);
        // final two bytes of the image: LDH (0x50),A, disabling the overlay
        bytes[0xFE] = 0xE0;
        bytes[0xFF] = 0x50;
        BootImage { bytes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_is_full_size() {
        assert_eq!(BootImage::synthesized().bytes.len(), BOOT_SIZE);
    }

    #[test]
    fn synthesized_ends_with_handoff() {
        let img = BootImage::synthesized();
        assert_eq!(img.bytes[0xFE], 0xE0);
        assert_eq!(img.bytes[0xFF], 0x50);
    }
}
