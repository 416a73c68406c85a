//! SM83 instruction execution (spec §3 "Register file", §4.2 "CPU Core").
//!
//! Dispatch mirrors the instruction encoding itself: the two large regular
//! blocks (`LD r,r'` and `ALU A,r`) are decoded arithmetically from the
//! opcode's bit fields the way the hardware itself groups them, while the
//! small and irregular groups (control flow, 16-bit loads, rotates) are
//! matched literally. CB-prefixed rotate/shift/BIT/RES/SET opcodes follow
//! the same split. This keeps each opcode's behavior auditable against
//! spec §4.2 table-by-table while avoiding ~370 near-identical match arms.

use crate::bus::Bus;
use crate::error::CoreError;
use crate::registers::{Registers, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

/// Reserved opcodes with no SM83 behavior.
const RESERVED_OPCODES: [u8; 11] = [0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD];

pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    ime_enable_pending: bool,
    pub halted: bool,
    pub stopped: bool,
    pub last_mnemonic: String,
    pub last_pc: u16,
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu {
            regs: Registers::default(),
            ime: true,
            ime_enable_pending: false,
            halted: false,
            stopped: false,
            last_mnemonic: String::from("(none)"),
            last_pc: 0,
        }
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_dump(&self) -> String {
        let r = &self.regs;
        format!(
            "A={:02X} F={:02X} B={:02X} C={:02X} D={:02X} E={:02X} H={:02X} L={:02X} SP={:04X} PC={:04X} IME={}",
            r.a, r.f, r.b, r.c, r.d, r.e, r.h, r.l, r.sp, r.pc, self.ime as u8
        )
    }

    /// Fetches, decodes, and executes exactly one instruction. Callers (the
    /// frame loop) are responsible for billing 4 cycles instead of calling
    /// this when HALT/STOP latches are set (spec §4.4).
    pub fn step(&mut self, bus: &mut Bus) -> Result<u32, CoreError> {
        if self.ime_enable_pending {
            self.ime = true;
            self.ime_enable_pending = false;
        }

        let pc0 = self.regs.pc;
        if pc0 >= 0xFF00 {
            return Err(CoreError::BusFault { pc: pc0 });
        }
        let opcode = bus.read8(pc0);

        if opcode == 0xCB {
            let cb_op = bus.read8(pc0.wrapping_add(1));
            let (cycles, mnemonic) = self.execute_cb(bus, cb_op, pc0)?;
            self.regs.pc = pc0.wrapping_add(2);
            self.last_mnemonic = mnemonic;
            self.last_pc = pc0;
            return Ok(cycles);
        }

        if RESERVED_OPCODES.contains(&opcode) {
            return Err(CoreError::OpNotImplemented { opcode, cb: "", pc: pc0 });
        }

        let (cycles, mnemonic) = self.execute_primary(bus, opcode, pc0)?;
        self.last_mnemonic = mnemonic;
        self.last_pc = pc0;
        Ok(cycles)
    }

    // -- operand helpers -----------------------------------------------

    fn imm8(bus: &Bus, pc0: u16) -> u8 {
        bus.read8(pc0.wrapping_add(1))
    }
    fn imm8_signed(bus: &Bus, pc0: u16) -> i8 {
        Self::imm8(bus, pc0) as i8
    }
    fn imm16(bus: &Bus, pc0: u16) -> u16 {
        bus.read16(pc0.wrapping_add(1))
    }

    fn get_r8(&self, bus: &Bus, idx: u8) -> u8 {
        match idx {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => bus.read8(self.regs.hl()),
            7 => self.regs.a,
            _ => unreachable!(),
        }
    }
    fn set_r8(&mut self, bus: &mut Bus, idx: u8, value: u8) {
        match idx {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            6 => bus.write8(self.regs.hl(), value),
            7 => self.regs.a = value,
            _ => unreachable!(),
        }
    }
    const R8_NAMES: [&'static str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];

    fn r16_group1(&self, idx: u8) -> u16 {
        match idx {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            3 => self.regs.sp,
            _ => unreachable!(),
        }
    }
    fn set_r16_group1(&mut self, idx: u8, value: u16) {
        match idx {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            3 => self.regs.sp = value,
            _ => unreachable!(),
        }
    }
    const R16_G1_NAMES: [&'static str; 4] = ["BC", "DE", "HL", "SP"];
    const R16_G2_NAMES: [&'static str; 4] = ["BC", "DE", "HL", "AF"];

    fn cond_true(&self, cc: u8) -> bool {
        match cc {
            0 => !self.regs.flag(FLAG_Z),
            1 => self.regs.flag(FLAG_Z),
            2 => !self.regs.flag(FLAG_C),
            3 => self.regs.flag(FLAG_C),
            _ => unreachable!(),
        }
    }
    const CC_NAMES: [&'static str; 4] = ["NZ", "Z", "NC", "C"];

    // -- stack -----------------------------------------------------------

    fn push16(&mut self, bus: &mut Bus, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        bus.write8(self.regs.sp.wrapping_add(1), (value >> 8) as u8);
        bus.write8(self.regs.sp, value as u8);
    }
    fn pop16(&mut self, bus: &Bus) -> u16 {
        let lo = bus.read8(self.regs.sp) as u16;
        let hi = bus.read8(self.regs.sp.wrapping_add(1)) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(2);
        (hi << 8) | lo
    }

    // -- ALU ---------------------------------------------------------------

    fn alu_add(&mut self, value: u8, carry_in: u8) -> u8 {
        let a = self.regs.a as u16;
        let v = value as u16;
        let c = carry_in as u16;
        let result = a + v + c;
        let half = (a & 0xF) + (v & 0xF) + c > 0xF;
        let out = (result & 0xFF) as u8;
        self.regs.set_flag(FLAG_Z, out == 0);
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, half);
        self.regs.set_flag(FLAG_C, result > 0xFF);
        out
    }
    fn alu_sub(&mut self, value: u8, carry_in: u8) -> u8 {
        let a = self.regs.a as i16;
        let v = value as i16;
        let c = carry_in as i16;
        let result = a - v - c;
        let half = (a & 0xF) - (v & 0xF) - c < 0;
        let out = (result & 0xFF) as u8;
        self.regs.set_flag(FLAG_Z, out == 0);
        self.regs.set_flag(FLAG_N, true);
        self.regs.set_flag(FLAG_H, half);
        self.regs.set_flag(FLAG_C, result < 0);
        out
    }
    fn alu_and(&mut self, value: u8) -> u8 {
        let out = self.regs.a & value;
        self.regs.set_flag(FLAG_Z, out == 0);
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, true);
        self.regs.set_flag(FLAG_C, false);
        out
    }
    fn alu_or(&mut self, value: u8) -> u8 {
        let out = self.regs.a | value;
        self.regs.set_flag(FLAG_Z, out == 0);
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, false);
        self.regs.set_flag(FLAG_C, false);
        out
    }
    fn alu_xor(&mut self, value: u8) -> u8 {
        let out = self.regs.a ^ value;
        self.regs.set_flag(FLAG_Z, out == 0);
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, false);
        self.regs.set_flag(FLAG_C, false);
        out
    }
    fn alu_cp(&mut self, value: u8) {
        self.alu_sub(value, 0);
    }

    fn inc8(&mut self, value: u8) -> u8 {
        let out = value.wrapping_add(1);
        self.regs.set_flag(FLAG_Z, out == 0);
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, value & 0x0F == 0x0F);
        out
    }
    fn dec8(&mut self, value: u8) -> u8 {
        let out = value.wrapping_sub(1);
        self.regs.set_flag(FLAG_Z, out == 0);
        self.regs.set_flag(FLAG_N, true);
        self.regs.set_flag(FLAG_H, value & 0x0F == 0x00);
        out
    }

    fn add_hl(&mut self, value: u16) {
        let hl = self.regs.hl() as u32;
        let v = value as u32;
        let result = hl + v;
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, (hl & 0xFFF) + (v & 0xFFF) > 0xFFF);
        self.regs.set_flag(FLAG_C, result > 0xFFFF);
        self.regs.set_hl(result as u16);
    }

    /// Shared by `ADD SP,e8` and `LD HL,SP+e8`: H/C are computed on the raw
    /// unsigned low byte addition, which happens to match signed semantics
    /// (spec §4.2, "SP-relative displacement").
    fn sp_plus_e(&mut self, e: i8) -> u16 {
        let sp = self.regs.sp;
        let e_u8 = e as u8;
        let half = (sp & 0xF) + (e_u8 as u16 & 0xF) > 0xF;
        let carry = (sp & 0xFF) + (e_u8 as u16) > 0xFF;
        self.regs.set_flag(FLAG_Z, false);
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, half);
        self.regs.set_flag(FLAG_C, carry);
        sp.wrapping_add(e as i16 as u16)
    }

    fn daa(&mut self) {
        let mut a = self.regs.a;
        let n = self.regs.flag(FLAG_N);
        let mut carry = self.regs.flag(FLAG_C);
        let half = self.regs.flag(FLAG_H);
        if !n {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if half || (a & 0x0F) > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if half {
                a = a.wrapping_sub(0x06);
            }
        }
        self.regs.a = a;
        self.regs.set_flag(FLAG_Z, a == 0);
        self.regs.set_flag(FLAG_H, false);
        self.regs.set_flag(FLAG_C, carry);
    }

    // -- rotates/shifts, shared by accumulator forms and CB forms -----------

    fn rlc(&mut self, value: u8, force_z: bool) -> u8 {
        let carry = value & 0x80 != 0;
        let out = value.rotate_left(1);
        self.set_rot_flags(out, carry, force_z);
        out
    }
    fn rrc(&mut self, value: u8, force_z: bool) -> u8 {
        let carry = value & 0x01 != 0;
        let out = value.rotate_right(1);
        self.set_rot_flags(out, carry, force_z);
        out
    }
    fn rl(&mut self, value: u8, force_z: bool) -> u8 {
        let carry_in = if self.regs.flag(FLAG_C) { 1 } else { 0 };
        let carry_out = value & 0x80 != 0;
        let out = (value << 1) | carry_in;
        self.set_rot_flags(out, carry_out, force_z);
        out
    }
    fn rr(&mut self, value: u8, force_z: bool) -> u8 {
        let carry_in = if self.regs.flag(FLAG_C) { 0x80 } else { 0 };
        let carry_out = value & 0x01 != 0;
        let out = (value >> 1) | carry_in;
        self.set_rot_flags(out, carry_out, force_z);
        out
    }
    fn sla(&mut self, value: u8) -> u8 {
        let carry = value & 0x80 != 0;
        let out = value << 1;
        self.set_rot_flags(out, carry, true);
        out
    }
    fn sra(&mut self, value: u8) -> u8 {
        let carry = value & 0x01 != 0;
        let out = (value >> 1) | (value & 0x80);
        self.set_rot_flags(out, carry, true);
        out
    }
    fn srl(&mut self, value: u8) -> u8 {
        let carry = value & 0x01 != 0;
        let out = value >> 1;
        self.set_rot_flags(out, carry, true);
        out
    }
    fn swap(&mut self, value: u8) -> u8 {
        let out = value.rotate_right(4);
        self.regs.set_flag(FLAG_Z, out == 0);
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, false);
        self.regs.set_flag(FLAG_C, false);
        out
    }
    fn set_rot_flags(&mut self, out: u8, carry: bool, force_z: bool) {
        self.regs.set_flag(FLAG_Z, force_z && out == 0);
        self.regs.set_flag(FLAG_N, false);
        self.regs.set_flag(FLAG_H, false);
        self.regs.set_flag(FLAG_C, carry);
    }

    // -- primary opcode table ------------------------------------------------

    fn execute_primary(&mut self, bus: &mut Bus, opcode: u8, pc0: u16) -> Result<(u32, String), CoreError> {
        // LD r,r' (0x40-0x7F excluding 0x76 HALT) - one regular block.
        if (0x40..=0x7F).contains(&opcode) && opcode != 0x76 {
            let dst = (opcode >> 3) & 7;
            let src = opcode & 7;
            let v = self.get_r8(bus, src);
            self.set_r8(bus, dst, v);
            self.regs.pc = pc0.wrapping_add(1);
            let cycles = if dst == 6 || src == 6 { 8 } else { 4 };
            return Ok((cycles, format!("LD {},{}", Self::R8_NAMES[dst as usize], Self::R8_NAMES[src as usize])));
        }

        // ALU A,r (0x80-0xBF) - the other regular block.
        if (0x80..=0xBF).contains(&opcode) {
            let op = (opcode >> 3) & 7;
            let src = opcode & 7;
            let v = self.get_r8(bus, src);
            self.apply_alu_op(op, v);
            self.regs.pc = pc0.wrapping_add(1);
            let cycles = if src == 6 { 8 } else { 4 };
            const ALU_NAMES: [&str; 8] = ["ADD", "ADC", "SUB", "SBC", "AND", "XOR", "OR", "CP"];
            return Ok((cycles, format!("{} A,{}", ALU_NAMES[op as usize], Self::R8_NAMES[src as usize])));
        }

        match opcode {
            0x00 => {
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "NOP".into()))
            }
            0x10 => {
                // STOP: consumes a trailing byte; only a literal 0x00 arms the latch
                // (spec §9 corrects the prototype's decimal-10 comparison).
                let next = Self::imm8(bus, pc0);
                if next == 0x00 {
                    self.stopped = true;
                }
                self.regs.pc = pc0.wrapping_add(2);
                Ok((4, "STOP".into()))
            }
            0x76 => {
                self.halted = true;
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "HALT".into()))
            }
            0xF3 => {
                self.ime = false;
                self.ime_enable_pending = false;
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "DI".into()))
            }
            0xFB => {
                self.ime_enable_pending = true;
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "EI".into()))
            }

            // 16-bit immediate loads
            0x01 | 0x11 | 0x21 | 0x31 => {
                let idx = (opcode >> 4) & 3;
                let v = Self::imm16(bus, pc0);
                self.set_r16_group1(idx, v);
                self.regs.pc = pc0.wrapping_add(3);
                Ok((12, format!("LD {},nn", Self::R16_G1_NAMES[idx as usize])))
            }

            // (BC)/(DE) indirect loads - bug-fixed: each targets its own pair.
            0x02 => {
                bus.write8(self.regs.bc(), self.regs.a);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD (BC),A".into()))
            }
            0x12 => {
                bus.write8(self.regs.de(), self.regs.a);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD (DE),A".into()))
            }
            0x0A => {
                self.regs.a = bus.read8(self.regs.bc());
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD A,(BC)".into()))
            }
            0x1A => {
                self.regs.a = bus.read8(self.regs.de());
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD A,(DE)".into()))
            }

            // HL+/HL- indirect loads
            0x22 => {
                bus.write8(self.regs.hl(), self.regs.a);
                self.regs.set_hl(self.regs.hl().wrapping_add(1));
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD (HL+),A".into()))
            }
            0x32 => {
                bus.write8(self.regs.hl(), self.regs.a);
                self.regs.set_hl(self.regs.hl().wrapping_sub(1));
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD (HL-),A".into()))
            }
            0x2A => {
                self.regs.a = bus.read8(self.regs.hl());
                self.regs.set_hl(self.regs.hl().wrapping_add(1));
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD A,(HL+)".into()))
            }
            0x3A => {
                self.regs.a = bus.read8(self.regs.hl());
                self.regs.set_hl(self.regs.hl().wrapping_sub(1));
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD A,(HL-)".into()))
            }

            // LD (nn),SP
            0x08 => {
                let addr = Self::imm16(bus, pc0);
                bus.write16(addr, self.regs.sp);
                self.regs.pc = pc0.wrapping_add(3);
                Ok((20, "LD (nn),SP".into()))
            }

            // INC/DEC r16
            0x03 | 0x13 | 0x23 | 0x33 => {
                let idx = (opcode >> 4) & 3;
                let v = self.r16_group1(idx).wrapping_add(1);
                self.set_r16_group1(idx, v);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, format!("INC {}", Self::R16_G1_NAMES[idx as usize])))
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let idx = (opcode >> 4) & 3;
                let v = self.r16_group1(idx).wrapping_sub(1);
                self.set_r16_group1(idx, v);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, format!("DEC {}", Self::R16_G1_NAMES[idx as usize])))
            }

            // ADD HL,rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                let idx = (opcode >> 4) & 3;
                let v = self.r16_group1(idx);
                self.add_hl(v);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, format!("ADD HL,{}", Self::R16_G1_NAMES[idx as usize])))
            }

            // ADD SP,e8 / LD HL,SP+e8
            0xE8 => {
                let e = Self::imm8_signed(bus, pc0);
                self.regs.sp = self.sp_plus_e(e);
                self.regs.pc = pc0.wrapping_add(2);
                Ok((16, "ADD SP,e8".into()))
            }
            0xF8 => {
                let e = Self::imm8_signed(bus, pc0);
                let v = self.sp_plus_e(e);
                self.regs.set_hl(v);
                self.regs.pc = pc0.wrapping_add(2);
                Ok((12, "LD HL,SP+e8".into()))
            }
            0xF9 => {
                self.regs.sp = self.regs.hl();
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD SP,HL".into()))
            }

            // INC/DEC r8 (includes (HL))
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let idx = (opcode >> 3) & 7;
                let v = self.get_r8(bus, idx);
                let out = self.inc8(v);
                self.set_r8(bus, idx, out);
                self.regs.pc = pc0.wrapping_add(1);
                let cycles = if idx == 6 { 12 } else { 4 };
                Ok((cycles, format!("INC {}", Self::R8_NAMES[idx as usize])))
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let idx = (opcode >> 3) & 7;
                let v = self.get_r8(bus, idx);
                let out = self.dec8(v);
                self.set_r8(bus, idx, out);
                self.regs.pc = pc0.wrapping_add(1);
                let cycles = if idx == 6 { 12 } else { 4 };
                Ok((cycles, format!("DEC {}", Self::R8_NAMES[idx as usize])))
            }

            // LD r8,n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let idx = (opcode >> 3) & 7;
                let v = Self::imm8(bus, pc0);
                self.set_r8(bus, idx, v);
                self.regs.pc = pc0.wrapping_add(2);
                let cycles = if idx == 6 { 12 } else { 8 };
                Ok((cycles, format!("LD {},n", Self::R8_NAMES[idx as usize])))
            }

            // ALU A,n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let op = (opcode >> 3) & 7;
                let v = Self::imm8(bus, pc0);
                self.apply_alu_op(op, v);
                self.regs.pc = pc0.wrapping_add(2);
                const ALU_NAMES: [&str; 8] = ["ADD", "ADC", "SUB", "SBC", "AND", "XOR", "OR", "CP"];
                Ok((8, format!("{} A,n", ALU_NAMES[op as usize])))
            }

            // rotate accumulator
            0x07 => {
                let v = self.regs.a;
                self.regs.a = self.rlc(v, false);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "RLCA".into()))
            }
            0x0F => {
                let v = self.regs.a;
                self.regs.a = self.rrc(v, false);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "RRCA".into()))
            }
            0x17 => {
                let v = self.regs.a;
                self.regs.a = self.rl(v, false);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "RLA".into()))
            }
            0x1F => {
                let v = self.regs.a;
                self.regs.a = self.rr(v, false);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "RRA".into()))
            }

            0x27 => {
                self.daa();
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "DAA".into()))
            }
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.set_flag(FLAG_N, true);
                self.regs.set_flag(FLAG_H, true);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "CPL".into()))
            }
            0x37 => {
                self.regs.set_flag(FLAG_N, false);
                self.regs.set_flag(FLAG_H, false);
                self.regs.set_flag(FLAG_C, true);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "SCF".into()))
            }
            0x3F => {
                let c = self.regs.flag(FLAG_C);
                self.regs.set_flag(FLAG_N, false);
                self.regs.set_flag(FLAG_H, false);
                self.regs.set_flag(FLAG_C, !c);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((4, "CCF".into()))
            }

            // PUSH/POP
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let idx = (opcode >> 4) & 3;
                let v = match idx {
                    0 => self.regs.bc(),
                    1 => self.regs.de(),
                    2 => self.regs.hl(),
                    3 => self.regs.af(),
                    _ => unreachable!(),
                };
                self.push16(bus, v);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((16, format!("PUSH {}", Self::R16_G2_NAMES[idx as usize])))
            }
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let idx = (opcode >> 4) & 3;
                let v = self.pop16(bus);
                match idx {
                    0 => self.regs.set_bc(v),
                    1 => self.regs.set_de(v),
                    2 => self.regs.set_hl(v),
                    3 => self.regs.set_af(v),
                    _ => unreachable!(),
                }
                self.regs.pc = pc0.wrapping_add(1);
                Ok((12, format!("POP {}", Self::R16_G2_NAMES[idx as usize])))
            }

            // jumps/calls/returns
            0xC3 => {
                self.regs.pc = Self::imm16(bus, pc0);
                Ok((16, "JP nn".into()))
            }
            0xE9 => {
                // JP (HL): jumps to HL directly, not to the byte HL points at
                // (spec §9 corrects the prototype's indirection bug).
                self.regs.pc = self.regs.hl();
                Ok((4, "JP (HL)".into()))
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let cc = (opcode >> 3) & 3;
                let target = Self::imm16(bus, pc0);
                if self.cond_true(cc) {
                    self.regs.pc = target;
                    Ok((16, format!("JP {},nn", Self::CC_NAMES[cc as usize])))
                } else {
                    self.regs.pc = pc0.wrapping_add(3);
                    Ok((12, format!("JP {},nn", Self::CC_NAMES[cc as usize])))
                }
            }
            0x18 => {
                let e = Self::imm8_signed(bus, pc0);
                self.regs.pc = pc0.wrapping_add(2).wrapping_add(e as i16 as u16);
                Ok((12, "JR e".into()))
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let cc = (opcode >> 3) & 3;
                let e = Self::imm8_signed(bus, pc0);
                let fallthrough = pc0.wrapping_add(2);
                if self.cond_true(cc) {
                    self.regs.pc = fallthrough.wrapping_add(e as i16 as u16);
                    Ok((12, format!("JR {},e", Self::CC_NAMES[cc as usize])))
                } else {
                    self.regs.pc = fallthrough;
                    Ok((8, format!("JR {},e", Self::CC_NAMES[cc as usize])))
                }
            }
            0xCD => {
                let target = Self::imm16(bus, pc0);
                self.push16(bus, pc0.wrapping_add(3));
                self.regs.pc = target;
                Ok((24, "CALL nn".into()))
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let cc = (opcode >> 3) & 3;
                let target = Self::imm16(bus, pc0);
                if self.cond_true(cc) {
                    self.push16(bus, pc0.wrapping_add(3));
                    self.regs.pc = target;
                    Ok((24, format!("CALL {},nn", Self::CC_NAMES[cc as usize])))
                } else {
                    self.regs.pc = pc0.wrapping_add(3);
                    Ok((12, format!("CALL {},nn", Self::CC_NAMES[cc as usize])))
                }
            }
            0xC9 => {
                self.regs.pc = self.pop16(bus);
                Ok((16, "RET".into()))
            }
            0xD9 => {
                self.regs.pc = self.pop16(bus);
                self.ime = true;
                self.ime_enable_pending = false;
                Ok((16, "RETI".into()))
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                let cc = (opcode >> 3) & 3;
                if self.cond_true(cc) {
                    self.regs.pc = self.pop16(bus);
                    Ok((20, format!("RET {}", Self::CC_NAMES[cc as usize])))
                } else {
                    self.regs.pc = pc0.wrapping_add(1);
                    Ok((8, format!("RET {}", Self::CC_NAMES[cc as usize])))
                }
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let target = (opcode & 0x38) as u16;
                self.push16(bus, pc0.wrapping_add(1));
                self.regs.pc = target;
                Ok((16, format!("RST {target:#04x}")))
            }

            // LDH/indirect-C/absolute A loads
            0xE0 => {
                let off = Self::imm8(bus, pc0);
                bus.write8(0xFF00 + off as u16, self.regs.a);
                self.regs.pc = pc0.wrapping_add(2);
                Ok((12, "LDH (n),A".into()))
            }
            0xF0 => {
                let off = Self::imm8(bus, pc0);
                self.regs.a = bus.read8(0xFF00 + off as u16);
                self.regs.pc = pc0.wrapping_add(2);
                Ok((12, "LDH A,(n)".into()))
            }
            0xE2 => {
                bus.write8(0xFF00 + self.regs.c as u16, self.regs.a);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD (C),A".into()))
            }
            0xF2 => {
                self.regs.a = bus.read8(0xFF00 + self.regs.c as u16);
                self.regs.pc = pc0.wrapping_add(1);
                Ok((8, "LD A,(C)".into()))
            }
            0xEA => {
                let addr = Self::imm16(bus, pc0);
                bus.write8(addr, self.regs.a);
                self.regs.pc = pc0.wrapping_add(3);
                Ok((16, "LD (nn),A".into()))
            }
            0xFA => {
                let addr = Self::imm16(bus, pc0);
                self.regs.a = bus.read8(addr);
                self.regs.pc = pc0.wrapping_add(3);
                Ok((16, "LD A,(nn)".into()))
            }

            other => Err(CoreError::OpNotImplemented { opcode: other, cb: "", pc: pc0 }),
        }
    }

    fn apply_alu_op(&mut self, op: u8, value: u8) {
        match op {
            0 => self.regs.a = self.alu_add(value, 0),
            1 => {
                let c = if self.regs.flag(FLAG_C) { 1 } else { 0 };
                self.regs.a = self.alu_add(value, c);
            }
            2 => self.regs.a = self.alu_sub(value, 0),
            3 => {
                let c = if self.regs.flag(FLAG_C) { 1 } else { 0 };
                self.regs.a = self.alu_sub(value, c);
            }
            4 => self.regs.a = self.alu_and(value),
            5 => self.regs.a = self.alu_xor(value),
            6 => self.regs.a = self.alu_or(value),
            7 => self.alu_cp(value),
            _ => unreachable!(),
        }
    }

    // -- CB-prefixed table -----------------------------------------------

    fn execute_cb(&mut self, bus: &mut Bus, cb_op: u8, _pc0: u16) -> Result<(u32, String), CoreError> {
        let reg = cb_op & 7;
        let group = cb_op >> 6;
        let v = self.get_r8(bus, reg);

        if group == 0 {
            let shift_op = (cb_op >> 3) & 7;
            let out = match shift_op {
                0 => self.rlc(v, true),
                1 => self.rrc(v, true),
                2 => self.rl(v, true),
                3 => self.rr(v, true),
                4 => self.sla(v),
                5 => self.sra(v),
                6 => self.swap(v),
                7 => self.srl(v),
                _ => unreachable!(),
            };
            self.set_r8(bus, reg, out);
            const NAMES: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];
            let cycles = if reg == 6 { 16 } else { 8 };
            return Ok((cycles, format!("{} {}", NAMES[shift_op as usize], Self::R8_NAMES[reg as usize])));
        }

        let bit = (cb_op >> 3) & 7;
        match group {
            1 => {
                self.regs.set_flag(FLAG_Z, v & (1 << bit) == 0);
                self.regs.set_flag(FLAG_N, false);
                self.regs.set_flag(FLAG_H, true);
                let cycles = if reg == 6 { 12 } else { 8 };
                Ok((cycles, format!("BIT {},{}", bit, Self::R8_NAMES[reg as usize])))
            }
            2 => {
                self.set_r8(bus, reg, v & !(1 << bit));
                let cycles = if reg == 6 { 16 } else { 8 };
                Ok((cycles, format!("RES {},{}", bit, Self::R8_NAMES[reg as usize])))
            }
            3 => {
                self.set_r8(bus, reg, v | (1 << bit));
                let cycles = if reg == 6 { 16 } else { 8 };
                Ok((cycles, format!("SET {},{}", bit, Self::R8_NAMES[reg as usize])))
            }
            _ => unreachable!(),
        }
    }
}
