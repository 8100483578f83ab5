use crate::alu;
use crate::mmu::Mmu;
use crate::registers::{Registers, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

/// Static description of one opcode: how many bytes it occupies and its base
/// t-cycle cost. Conditional instructions store the not-taken cost; the
/// handler adds the taken surcharge. Operand width is carried by `length`
/// and decoded into an [`Operand`] before execution.
#[derive(Clone, Copy, Debug)]
pub struct Opcode {
    pub mnemonic: &'static str,
    /// Total instruction length in bytes, opcode included (1-3).
    pub length: u8,
    /// Base cost in t-cycles.
    pub cycles: u8,
    /// True when the immediate byte is a signed displacement.
    pub signed_operand: bool,
}

const fn op(mnemonic: &'static str, length: u8, cycles: u8) -> Opcode {
    Opcode {
        mnemonic,
        length,
        cycles,
        signed_operand: false,
    }
}

const fn op_rel(mnemonic: &'static str, length: u8, cycles: u8) -> Opcode {
    Opcode {
        mnemonic,
        length,
        cycles,
        signed_operand: true,
    }
}

const ALU_NAMES: [&str; 8] = [
    "ADD A,r8", "ADC A,r8", "SUB r8", "SBC A,r8", "AND r8", "XOR r8", "OR r8", "CP r8",
];

const CB_NAMES: [&str; 32] = [
    "RLC r8", "RRC r8", "RL r8", "RR r8", "SLA r8", "SRA r8", "SWAP r8", "SRL r8", "BIT 0,r8",
    "BIT 1,r8", "BIT 2,r8", "BIT 3,r8", "BIT 4,r8", "BIT 5,r8", "BIT 6,r8", "BIT 7,r8",
    "RES 0,r8", "RES 1,r8", "RES 2,r8", "RES 3,r8", "RES 4,r8", "RES 5,r8", "RES 6,r8",
    "RES 7,r8", "SET 0,r8", "SET 1,r8", "SET 2,r8", "SET 3,r8", "SET 4,r8", "SET 5,r8",
    "SET 6,r8", "SET 7,r8",
];

const fn build_opcode_table() -> [Opcode; 256] {
    let mut t = [op("???", 1, 4); 256];

    t[0x00] = op("NOP", 1, 4);
    t[0x01] = op("LD BC,d16", 3, 12);
    t[0x02] = op("LD (BC),A", 1, 8);
    t[0x03] = op("INC BC", 1, 8);
    t[0x04] = op("INC B", 1, 4);
    t[0x05] = op("DEC B", 1, 4);
    t[0x06] = op("LD B,d8", 2, 8);
    t[0x07] = op("RLCA", 1, 4);
    t[0x08] = op("LD (a16),SP", 3, 20);
    t[0x09] = op("ADD HL,BC", 1, 8);
    t[0x0A] = op("LD A,(BC)", 1, 8);
    t[0x0B] = op("DEC BC", 1, 8);
    t[0x0C] = op("INC C", 1, 4);
    t[0x0D] = op("DEC C", 1, 4);
    t[0x0E] = op("LD C,d8", 2, 8);
    t[0x0F] = op("RRCA", 1, 4);

    t[0x10] = op("STOP", 2, 4);
    t[0x11] = op("LD DE,d16", 3, 12);
    t[0x12] = op("LD (DE),A", 1, 8);
    t[0x13] = op("INC DE", 1, 8);
    t[0x14] = op("INC D", 1, 4);
    t[0x15] = op("DEC D", 1, 4);
    t[0x16] = op("LD D,d8", 2, 8);
    t[0x17] = op("RLA", 1, 4);
    t[0x18] = op_rel("JR r8", 2, 12);
    t[0x19] = op("ADD HL,DE", 1, 8);
    t[0x1A] = op("LD A,(DE)", 1, 8);
    t[0x1B] = op("DEC DE", 1, 8);
    t[0x1C] = op("INC E", 1, 4);
    t[0x1D] = op("DEC E", 1, 4);
    t[0x1E] = op("LD E,d8", 2, 8);
    t[0x1F] = op("RRA", 1, 4);

    t[0x20] = op_rel("JR NZ,r8", 2, 8);
    t[0x21] = op("LD HL,d16", 3, 12);
    t[0x22] = op("LD (HL+),A", 1, 8);
    t[0x23] = op("INC HL", 1, 8);
    t[0x24] = op("INC H", 1, 4);
    t[0x25] = op("DEC H", 1, 4);
    t[0x26] = op("LD H,d8", 2, 8);
    t[0x27] = op("DAA", 1, 4);
    t[0x28] = op_rel("JR Z,r8", 2, 8);
    t[0x29] = op("ADD HL,HL", 1, 8);
    t[0x2A] = op("LD A,(HL+)", 1, 8);
    t[0x2B] = op("DEC HL", 1, 8);
    t[0x2C] = op("INC L", 1, 4);
    t[0x2D] = op("DEC L", 1, 4);
    t[0x2E] = op("LD L,d8", 2, 8);
    t[0x2F] = op("CPL", 1, 4);

    t[0x30] = op_rel("JR NC,r8", 2, 8);
    t[0x31] = op("LD SP,d16", 3, 12);
    t[0x32] = op("LD (HL-),A", 1, 8);
    t[0x33] = op("INC SP", 1, 8);
    t[0x34] = op("INC (HL)", 1, 12);
    t[0x35] = op("DEC (HL)", 1, 12);
    t[0x36] = op("LD (HL),d8", 2, 12);
    t[0x37] = op("SCF", 1, 4);
    t[0x38] = op_rel("JR C,r8", 2, 8);
    t[0x39] = op("ADD HL,SP", 1, 8);
    t[0x3A] = op("LD A,(HL-)", 1, 8);
    t[0x3B] = op("DEC SP", 1, 8);
    t[0x3C] = op("INC A", 1, 4);
    t[0x3D] = op("DEC A", 1, 4);
    t[0x3E] = op("LD A,d8", 2, 8);
    t[0x3F] = op("CCF", 1, 4);

    // 0x40-0x7F: register-to-register loads, HALT at 0x76.
    let mut i = 0x40;
    while i < 0x80 {
        let src = i & 0x07;
        let dst = (i >> 3) & 0x07;
        let cycles = if src == 6 || dst == 6 { 8 } else { 4 };
        t[i] = op("LD r8,r8", 1, cycles as u8);
        i += 1;
    }
    t[0x76] = op("HALT", 1, 4);

    // 0x80-0xBF: accumulator arithmetic over the register group.
    let mut i = 0x80;
    while i < 0xC0 {
        let src = i & 0x07;
        let cycles = if src == 6 { 8 } else { 4 };
        t[i] = op(ALU_NAMES[(i >> 3) & 0x07], 1, cycles as u8);
        i += 1;
    }

    t[0xC0] = op("RET NZ", 1, 8);
    t[0xC1] = op("POP BC", 1, 12);
    t[0xC2] = op("JP NZ,a16", 3, 12);
    t[0xC3] = op("JP a16", 3, 16);
    t[0xC4] = op("CALL NZ,a16", 3, 12);
    t[0xC5] = op("PUSH BC", 1, 16);
    t[0xC6] = op("ADD A,d8", 2, 8);
    t[0xC7] = op("RST 00H", 1, 16);
    t[0xC8] = op("RET Z", 1, 8);
    t[0xC9] = op("RET", 1, 16);
    t[0xCA] = op("JP Z,a16", 3, 12);
    t[0xCB] = op("PREFIX CB", 1, 4);
    t[0xCC] = op("CALL Z,a16", 3, 12);
    t[0xCD] = op("CALL a16", 3, 24);
    t[0xCE] = op("ADC A,d8", 2, 8);
    t[0xCF] = op("RST 08H", 1, 16);

    t[0xD0] = op("RET NC", 1, 8);
    t[0xD1] = op("POP DE", 1, 12);
    t[0xD2] = op("JP NC,a16", 3, 12);
    t[0xD4] = op("CALL NC,a16", 3, 12);
    t[0xD5] = op("PUSH DE", 1, 16);
    t[0xD6] = op("SUB d8", 2, 8);
    t[0xD7] = op("RST 10H", 1, 16);
    t[0xD8] = op("RET C", 1, 8);
    t[0xD9] = op("RETI", 1, 16);
    t[0xDA] = op("JP C,a16", 3, 12);
    t[0xDC] = op("CALL C,a16", 3, 12);
    t[0xDE] = op("SBC A,d8", 2, 8);
    t[0xDF] = op("RST 18H", 1, 16);

    t[0xE0] = op("LDH (a8),A", 2, 12);
    t[0xE1] = op("POP HL", 1, 12);
    t[0xE2] = op("LD (C),A", 1, 8);
    t[0xE5] = op("PUSH HL", 1, 16);
    t[0xE6] = op("AND d8", 2, 8);
    t[0xE7] = op("RST 20H", 1, 16);
    t[0xE8] = op_rel("ADD SP,r8", 2, 16);
    t[0xE9] = op("JP HL", 1, 4);
    t[0xEA] = op("LD (a16),A", 3, 16);
    t[0xEE] = op("XOR d8", 2, 8);
    t[0xEF] = op("RST 28H", 1, 16);

    t[0xF0] = op("LDH A,(a8)", 2, 12);
    t[0xF1] = op("POP AF", 1, 12);
    t[0xF2] = op("LD A,(C)", 1, 8);
    t[0xF3] = op("DI", 1, 4);
    t[0xF5] = op("PUSH AF", 1, 16);
    t[0xF6] = op("OR d8", 2, 8);
    t[0xF7] = op("RST 30H", 1, 16);
    t[0xF8] = op_rel("LD HL,SP+r8", 2, 12);
    t[0xF9] = op("LD SP,HL", 1, 8);
    t[0xFA] = op("LD A,(a16)", 3, 16);
    t[0xFB] = op("EI", 1, 4);
    t[0xFE] = op("CP d8", 2, 8);
    t[0xFF] = op("RST 38H", 1, 16);

    t
}

const fn build_cb_table() -> [Opcode; 256] {
    let mut t = [op("???", 2, 8); 256];
    let mut i = 0;
    while i < 256 {
        let group = i >> 3;
        let src = i & 0x07;
        // (HL) forms cost 16, except BIT which only reads: 12.
        let cycles = if src != 6 {
            8
        } else if group >= 8 && group < 16 {
            12
        } else {
            16
        };
        t[i] = op(CB_NAMES[group], 2, cycles as u8);
        i += 1;
    }
    t
}

/// Descriptor table for the unprefixed opcode page.
pub static OPCODES: [Opcode; 256] = build_opcode_table();
/// Descriptor table for the CB-prefixed page.
pub static CB_OPCODES: [Opcode; 256] = build_cb_table();

/// Decoded operand bytes, width-tagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    None,
    Imm8(u8),
    Imm16(u16),
}

impl Operand {
    fn imm8(self) -> u8 {
        match self {
            Operand::Imm8(v) => v,
            _ => unreachable!("imm8 operand expected"),
        }
    }

    fn imm16(self) -> u16 {
        match self {
            Operand::Imm16(v) => v,
            _ => unreachable!("imm16 operand expected"),
        }
    }
}

/// Interrupt sources in IF/IE bit order.
pub const INT_VBLANK: u8 = 0x01;
pub const INT_STAT: u8 = 0x02;
pub const INT_TIMER: u8 = 0x04;
pub const INT_SERIAL: u8 = 0x08;
pub const INT_JOYPAD: u8 = 0x10;

const INTERRUPT_SERVICE_CYCLES: u32 = 20;

pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    pub halted: bool,
    /// Set by EI; IME turns on after the next instruction retires.
    ime_pending: bool,
}

impl Cpu {
    pub fn new(cgb: bool) -> Self {
        Self {
            regs: Registers::new(cgb),
            ime: false,
            halted: false,
            ime_pending: false,
        }
    }

    fn pending_interrupts(&self, mmu: &Mmu) -> u8 {
        mmu.ie_reg & mmu.if_reg & 0x1F
    }

    /// Lowest-numbered pending source wins.
    fn next_interrupt(pending: u8) -> (u8, u16) {
        debug_assert!(pending & 0x1F != 0);
        let bit = pending.trailing_zeros() as u16;
        (1 << bit, 0x0040 + bit * 8)
    }

    fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, val as u8);
    }

    fn pop_stack(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = mmu.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = mmu.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    /// Register group indexing used by the LD/ALU/CB rows:
    /// 0=B 1=C 2=D 3=E 4=H 5=L 6=(HL) 7=A.
    fn read_r8(&self, idx: u8, mmu: &mut Mmu) -> u8 {
        match idx {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => mmu.read_byte(self.regs.hl()),
            7 => self.regs.a,
            _ => unreachable!("register index {idx}"),
        }
    }

    fn write_r8(&mut self, idx: u8, val: u8, mmu: &mut Mmu) {
        match idx {
            0 => self.regs.b = val,
            1 => self.regs.c = val,
            2 => self.regs.d = val,
            3 => self.regs.e = val,
            4 => self.regs.h = val,
            5 => self.regs.l = val,
            6 => mmu.write_byte(self.regs.hl(), val),
            7 => self.regs.a = val,
            _ => unreachable!("register index {idx}"),
        }
    }

    /// Condition group: 0=NZ 1=Z 2=NC 3=C.
    fn condition(&self, idx: u8) -> bool {
        match idx {
            0 => !self.regs.flag(FLAG_Z),
            1 => self.regs.flag(FLAG_Z),
            2 => !self.regs.flag(FLAG_C),
            3 => self.regs.flag(FLAG_C),
            _ => unreachable!("condition index {idx}"),
        }
    }

    /// Execute one instruction (or service one interrupt) and return its
    /// cost in t-cycles.
    pub fn step(&mut self, mmu: &mut Mmu) -> u32 {
        let enable_ime = self.ime_pending;

        let pending = self.pending_interrupts(mmu);
        // A pending enabled interrupt wakes a halted CPU even with IME off.
        if self.halted && pending != 0 {
            self.halted = false;
        }
        if self.ime && pending != 0 {
            self.ime = false;
            self.ime_pending = false;
            let (mask, vector) = Self::next_interrupt(pending);
            mmu.if_reg &= !mask;
            let pc = self.regs.pc;
            self.push_stack(mmu, pc);
            self.regs.pc = vector;
            return INTERRUPT_SERVICE_CYCLES;
        }
        if self.halted {
            return 4;
        }

        let pc = self.regs.pc;
        let opcode = mmu.read_byte(pc);

        let cycles = if opcode == 0xCB {
            let cb = mmu.read_byte(pc.wrapping_add(1));
            self.regs.pc = pc.wrapping_add(2);
            self.execute_cb(cb, mmu)
        } else {
            let desc = &OPCODES[opcode as usize];
            let operand = match desc.length {
                1 => Operand::None,
                2 => Operand::Imm8(mmu.read_byte(pc.wrapping_add(1))),
                3 => Operand::Imm16(mmu.read_word(pc.wrapping_add(1))),
                _ => unreachable!("opcode length {}", desc.length),
            };
            self.regs.pc = pc.wrapping_add(desc.length as u16);
            self.execute(opcode, desc, operand, mmu)
        };

        // A DI retiring inside the delay slot cancels the pending enable.
        if enable_ime && self.ime_pending {
            self.ime = true;
            self.ime_pending = false;
        }
        cycles
    }

    fn execute(&mut self, opcode: u8, desc: &Opcode, operand: Operand, mmu: &mut Mmu) -> u32 {
        let base = desc.cycles as u32;
        match opcode {
            0x00 => base,

            // 16-bit immediate loads
            0x01 => {
                self.regs.set_bc(operand.imm16());
                base
            }
            0x11 => {
                self.regs.set_de(operand.imm16());
                base
            }
            0x21 => {
                self.regs.set_hl(operand.imm16());
                base
            }
            0x31 => {
                self.regs.sp = operand.imm16();
                base
            }

            // indirect accumulator stores/loads
            0x02 => {
                mmu.write_byte(self.regs.bc(), self.regs.a);
                base
            }
            0x12 => {
                mmu.write_byte(self.regs.de(), self.regs.a);
                base
            }
            0x22 => {
                let hl = self.regs.hl();
                mmu.write_byte(hl, self.regs.a);
                self.regs.set_hl(hl.wrapping_add(1));
                base
            }
            0x32 => {
                let hl = self.regs.hl();
                mmu.write_byte(hl, self.regs.a);
                self.regs.set_hl(hl.wrapping_sub(1));
                base
            }
            0x0A => {
                self.regs.a = mmu.read_byte(self.regs.bc());
                base
            }
            0x1A => {
                self.regs.a = mmu.read_byte(self.regs.de());
                base
            }
            0x2A => {
                let hl = self.regs.hl();
                self.regs.a = mmu.read_byte(hl);
                self.regs.set_hl(hl.wrapping_add(1));
                base
            }
            0x3A => {
                let hl = self.regs.hl();
                self.regs.a = mmu.read_byte(hl);
                self.regs.set_hl(hl.wrapping_sub(1));
                base
            }

            // 16-bit inc/dec, no flags
            0x03 => {
                self.regs.set_bc(self.regs.bc().wrapping_add(1));
                base
            }
            0x13 => {
                self.regs.set_de(self.regs.de().wrapping_add(1));
                base
            }
            0x23 => {
                self.regs.set_hl(self.regs.hl().wrapping_add(1));
                base
            }
            0x33 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                base
            }
            0x0B => {
                self.regs.set_bc(self.regs.bc().wrapping_sub(1));
                base
            }
            0x1B => {
                self.regs.set_de(self.regs.de().wrapping_sub(1));
                base
            }
            0x2B => {
                self.regs.set_hl(self.regs.hl().wrapping_sub(1));
                base
            }
            0x3B => {
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                base
            }

            // 8-bit inc/dec over the register group
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let idx = (opcode >> 3) & 0x07;
                let val = self.read_r8(idx, mmu);
                let res = alu::inc(&mut self.regs.f, val);
                self.write_r8(idx, res, mmu);
                base
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let idx = (opcode >> 3) & 0x07;
                let val = self.read_r8(idx, mmu);
                let res = alu::dec(&mut self.regs.f, val);
                self.write_r8(idx, res, mmu);
                base
            }

            // 8-bit immediate loads
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let idx = (opcode >> 3) & 0x07;
                self.write_r8(idx, operand.imm8(), mmu);
                base
            }

            // accumulator rotates never set Zero
            0x07 => {
                self.regs.a = alu::rlc(&mut self.regs.f, self.regs.a);
                self.regs.set_flag(FLAG_Z, false);
                base
            }
            0x0F => {
                self.regs.a = alu::rrc(&mut self.regs.f, self.regs.a);
                self.regs.set_flag(FLAG_Z, false);
                base
            }
            0x17 => {
                self.regs.a = alu::rl(&mut self.regs.f, self.regs.a);
                self.regs.set_flag(FLAG_Z, false);
                base
            }
            0x1F => {
                self.regs.a = alu::rr(&mut self.regs.f, self.regs.a);
                self.regs.set_flag(FLAG_Z, false);
                base
            }

            0x08 => {
                mmu.write_word(operand.imm16(), self.regs.sp);
                base
            }

            0x09 | 0x19 | 0x29 | 0x39 => {
                let rr = match opcode {
                    0x09 => self.regs.bc(),
                    0x19 => self.regs.de(),
                    0x29 => self.regs.hl(),
                    _ => self.regs.sp,
                };
                let hl = self.regs.hl();
                let res = alu::add16(&mut self.regs.f, hl, rr);
                self.regs.set_hl(res);
                base
            }

            0x10 => {
                if !mmu.perform_speed_switch() {
                    let pc = self.regs.pc.wrapping_sub(desc.length as u16);
                    log::warn!("STOP at PC={pc:04X} without armed speed switch");
                }
                base
            }

            0x18 => {
                let offset = operand.imm8() as i8;
                self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                base
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                if self.condition((opcode >> 3) & 0x03) {
                    let offset = operand.imm8() as i8;
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                    base + 4
                } else {
                    base
                }
            }

            0x27 => {
                self.regs.a = alu::daa(&mut self.regs.f, self.regs.a);
                base
            }
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.set_flag(FLAG_N, true);
                self.regs.set_flag(FLAG_H, true);
                base
            }
            0x37 => {
                self.regs.set_flag(FLAG_N, false);
                self.regs.set_flag(FLAG_H, false);
                self.regs.set_flag(FLAG_C, true);
                base
            }
            0x3F => {
                let c = self.regs.flag(FLAG_C);
                self.regs.set_flag(FLAG_N, false);
                self.regs.set_flag(FLAG_H, false);
                self.regs.set_flag(FLAG_C, !c);
                base
            }

            0x76 => {
                self.halted = true;
                base
            }

            // register-to-register loads
            0x40..=0x7F => {
                let src = opcode & 0x07;
                let dst = (opcode >> 3) & 0x07;
                let val = self.read_r8(src, mmu);
                self.write_r8(dst, val, mmu);
                base
            }

            // accumulator arithmetic over the register group
            0x80..=0xBF => {
                let val = self.read_r8(opcode & 0x07, mmu);
                self.apply_alu((opcode >> 3) & 0x07, val);
                base
            }

            // conditional/unconditional returns
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.condition((opcode >> 3) & 0x03) {
                    self.regs.pc = self.pop_stack(mmu);
                    base + 12
                } else {
                    base
                }
            }
            0xC9 => {
                self.regs.pc = self.pop_stack(mmu);
                base
            }
            0xD9 => {
                self.regs.pc = self.pop_stack(mmu);
                self.ime = true;
                base
            }

            0xC1 => {
                let val = self.pop_stack(mmu);
                self.regs.set_bc(val);
                base
            }
            0xD1 => {
                let val = self.pop_stack(mmu);
                self.regs.set_de(val);
                base
            }
            0xE1 => {
                let val = self.pop_stack(mmu);
                self.regs.set_hl(val);
                base
            }
            0xF1 => {
                let val = self.pop_stack(mmu);
                self.regs.set_af(val);
                base
            }
            0xC5 => {
                let val = self.regs.bc();
                self.push_stack(mmu, val);
                base
            }
            0xD5 => {
                let val = self.regs.de();
                self.push_stack(mmu, val);
                base
            }
            0xE5 => {
                let val = self.regs.hl();
                self.push_stack(mmu, val);
                base
            }
            0xF5 => {
                let val = self.regs.af();
                self.push_stack(mmu, val);
                base
            }

            0xC3 => {
                self.regs.pc = operand.imm16();
                base
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                if self.condition((opcode >> 3) & 0x03) {
                    self.regs.pc = operand.imm16();
                    base + 4
                } else {
                    base
                }
            }
            0xE9 => {
                self.regs.pc = self.regs.hl();
                base
            }

            0xCD => {
                let pc = self.regs.pc;
                self.push_stack(mmu, pc);
                self.regs.pc = operand.imm16();
                base
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                if self.condition((opcode >> 3) & 0x03) {
                    let pc = self.regs.pc;
                    self.push_stack(mmu, pc);
                    self.regs.pc = operand.imm16();
                    base + 12
                } else {
                    base
                }
            }

            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let pc = self.regs.pc;
                self.push_stack(mmu, pc);
                self.regs.pc = (opcode & 0x38) as u16;
                base
            }

            // immediate accumulator arithmetic
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                self.apply_alu((opcode >> 3) & 0x07, operand.imm8());
                base
            }

            0xE0 => {
                mmu.write_byte(0xFF00 | operand.imm8() as u16, self.regs.a);
                base
            }
            0xF0 => {
                self.regs.a = mmu.read_byte(0xFF00 | operand.imm8() as u16);
                base
            }
            0xE2 => {
                mmu.write_byte(0xFF00 | self.regs.c as u16, self.regs.a);
                base
            }
            0xF2 => {
                self.regs.a = mmu.read_byte(0xFF00 | self.regs.c as u16);
                base
            }
            0xEA => {
                mmu.write_byte(operand.imm16(), self.regs.a);
                base
            }
            0xFA => {
                self.regs.a = mmu.read_byte(operand.imm16());
                base
            }

            0xE8 => {
                self.regs.sp = alu::add_sp(&mut self.regs.f, self.regs.sp, operand.imm8() as i8);
                base
            }
            0xF8 => {
                let res = alu::add_sp(&mut self.regs.f, self.regs.sp, operand.imm8() as i8);
                self.regs.set_hl(res);
                base
            }
            0xF9 => {
                self.regs.sp = self.regs.hl();
                base
            }

            0xF3 => {
                self.ime = false;
                self.ime_pending = false;
                base
            }
            0xFB => {
                self.ime_pending = true;
                base
            }

            _ => panic!(
                "unhandled opcode {opcode:02X} at PC={:04X}",
                self.regs.pc.wrapping_sub(desc.length as u16)
            ),
        }
    }

    /// Accumulator arithmetic group: 0=ADD 1=ADC 2=SUB 3=SBC 4=AND 5=XOR
    /// 6=OR 7=CP.
    fn apply_alu(&mut self, group: u8, val: u8) {
        let a = self.regs.a;
        let f = &mut self.regs.f;
        match group {
            0 => self.regs.a = alu::add(f, a, val),
            1 => self.regs.a = alu::adc(f, a, val),
            2 => self.regs.a = alu::sub(f, a, val),
            3 => self.regs.a = alu::sbc(f, a, val),
            4 => self.regs.a = alu::and(f, a, val),
            5 => self.regs.a = alu::xor(f, a, val),
            6 => self.regs.a = alu::or(f, a, val),
            7 => alu::cp(f, a, val),
            _ => unreachable!("alu group {group}"),
        }
    }

    fn execute_cb(&mut self, opcode: u8, mmu: &mut Mmu) -> u32 {
        let desc = &CB_OPCODES[opcode as usize];
        let idx = opcode & 0x07;
        let group = opcode >> 3;
        match group {
            // rotate/shift/swap group writes back
            0..=7 => {
                let val = self.read_r8(idx, mmu);
                let f = &mut self.regs.f;
                let res = match group {
                    0 => alu::rlc(f, val),
                    1 => alu::rrc(f, val),
                    2 => alu::rl(f, val),
                    3 => alu::rr(f, val),
                    4 => alu::sla(f, val),
                    5 => alu::sra(f, val),
                    6 => alu::swap(f, val),
                    _ => alu::srl(f, val),
                };
                self.write_r8(idx, res, mmu);
            }
            8..=15 => {
                let val = self.read_r8(idx, mmu);
                alu::bit(&mut self.regs.f, val, group - 8);
            }
            16..=23 => {
                let val = self.read_r8(idx, mmu);
                self.write_r8(idx, val & !(1 << (group - 16)), mmu);
            }
            _ => {
                let val = self.read_r8(idx, mmu);
                self.write_r8(idx, val | 1 << (group - 24), mmu);
            }
        }
        desc.cycles as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_lengths_cover_operand_widths() {
        assert_eq!(OPCODES[0x01].length, 3); // LD BC,d16
        assert_eq!(OPCODES[0x06].length, 2); // LD B,d8
        assert_eq!(OPCODES[0x00].length, 1);
        assert_eq!(OPCODES[0x18].signed_operand, true);
        assert_eq!(OPCODES[0xC3].signed_operand, false);
    }

    #[test]
    fn hl_forms_cost_more() {
        assert_eq!(OPCODES[0x46].cycles, 8); // LD B,(HL)
        assert_eq!(OPCODES[0x41].cycles, 4); // LD B,C
        assert_eq!(OPCODES[0x86].cycles, 8); // ADD A,(HL)
        assert_eq!(CB_OPCODES[0x46].cycles, 12); // BIT 0,(HL)
        assert_eq!(CB_OPCODES[0x06].cycles, 16); // RLC (HL)
        assert_eq!(CB_OPCODES[0x00].cycles, 8); // RLC B
    }

    #[test]
    fn interrupt_priority_is_lowest_bit() {
        assert_eq!(Cpu::next_interrupt(0x1F), (INT_VBLANK, 0x40));
        assert_eq!(Cpu::next_interrupt(0x1E), (INT_STAT, 0x48));
        assert_eq!(Cpu::next_interrupt(0x14), (INT_TIMER, 0x50));
        assert_eq!(Cpu::next_interrupt(0x18), (INT_SERIAL, 0x58));
        assert_eq!(Cpu::next_interrupt(0x10), (INT_JOYPAD, 0x60));
    }
}
