//! Instruction Execution
//!
//! Operands have already been decoded by `fetch_data`; each processor
//! applies the operation and reports any M-cycles beyond the table cost
//! (taken branches and the CB-prefixed opcode).

use super::instructions::{
    cb_instruction_by_opcode, AddressingMode, ConditionType, Instruction, InstructionType,
    RegisterType,
};
use super::Cpu;
use crate::bus::MemoryBus;
use crate::common::{Byte, Word};
use crate::error::{Error, Result};

impl Cpu {
    fn check_condition(&self, cond: ConditionType) -> bool {
        match cond {
            ConditionType::None => true,
            ConditionType::Z => self.regs.flag_z(),
            ConditionType::Nz => !self.regs.flag_z(),
            ConditionType::C => self.regs.flag_c(),
            ConditionType::Nc => !self.regs.flag_c(),
        }
    }

    /// Execute a decoded instruction. Returns the extra M-cycles spent.
    pub fn execute<B: MemoryBus>(&mut self, bus: &mut B, inst: &Instruction) -> Result<u8> {
        let operand = self.fetched_data as Byte;
        let mut taken = false;

        match inst.inst_type {
            InstructionType::Illegal => {
                return Err(Error::IllegalOpcode {
                    opcode: self.cur_opcode,
                    pc: self.regs.pc.wrapping_sub(1),
                })
            }
            InstructionType::Nop => {}
            InstructionType::Ld => self.proc_ld(bus, inst),
            InstructionType::Ldh => self.proc_ldh(bus, inst),
            InstructionType::Inc => self.proc_inc_dec(bus, inst, true),
            InstructionType::Dec => self.proc_inc_dec(bus, inst, false),
            InstructionType::Add => self.proc_add(inst),
            InstructionType::Adc => self.alu_add(operand, self.regs.flag_c()),
            InstructionType::Sub => self.alu_sub(operand, false, true),
            InstructionType::Sbc => self.alu_sub(operand, self.regs.flag_c(), true),
            InstructionType::Cp => self.alu_sub(operand, false, false),
            InstructionType::And => {
                let a = self.regs.a() & operand;
                self.regs.set_a(a);
                self.regs.set_flags(a == 0, false, true, false);
            }
            InstructionType::Xor => {
                let a = self.regs.a() ^ operand;
                self.regs.set_a(a);
                self.regs.set_flags(a == 0, false, false, false);
            }
            InstructionType::Or => {
                let a = self.regs.a() | operand;
                self.regs.set_a(a);
                self.regs.set_flags(a == 0, false, false, false);
            }
            InstructionType::Jr => {
                taken = self.check_condition(inst.cond);
                if taken {
                    let offset = operand as i8 as i16 as Word;
                    self.regs.pc = self.regs.pc.wrapping_add(offset);
                }
            }
            InstructionType::Jp => {
                taken = self.check_condition(inst.cond);
                if taken {
                    self.regs.pc = self.fetched_data;
                }
            }
            InstructionType::Call => {
                taken = self.check_condition(inst.cond);
                if taken {
                    self.stack_push16(bus, self.regs.pc);
                    self.regs.pc = self.fetched_data;
                }
            }
            InstructionType::Ret => {
                taken = self.check_condition(inst.cond);
                if taken {
                    self.regs.pc = self.stack_pop16(bus);
                }
            }
            InstructionType::Reti => {
                self.regs.pc = self.stack_pop16(bus);
                self.ime = true;
            }
            InstructionType::Rst => {
                self.stack_push16(bus, self.regs.pc);
                self.regs.pc = inst.param as Word;
            }
            InstructionType::Pop => {
                let value = self.stack_pop16(bus);
                self.write_reg(inst.reg1, value);
            }
            InstructionType::Push => {
                self.stack_push16(bus, self.fetched_data);
            }
            InstructionType::Rlca | InstructionType::Rrca | InstructionType::Rla | InstructionType::Rra => {
                let shift = match inst.inst_type {
                    InstructionType::Rlca => InstructionType::Rlc,
                    InstructionType::Rrca => InstructionType::Rrc,
                    InstructionType::Rla => InstructionType::Rl,
                    _ => InstructionType::Rr,
                };
                let (a, carry) = self.shift(shift, self.regs.a());
                self.regs.set_a(a);
                // The accumulator forms always clear Z
                self.regs.set_flags(false, false, false, carry);
            }
            InstructionType::Stop => self.stopped = true,
            InstructionType::Halt => self.proc_halt(bus),
            InstructionType::Daa => self.proc_daa(),
            InstructionType::Cpl => {
                self.regs.set_a(!self.regs.a());
                self.regs.set_flag_n(true);
                self.regs.set_flag_h(true);
            }
            InstructionType::Scf => {
                self.regs.set_flag_n(false);
                self.regs.set_flag_h(false);
                self.regs.set_flag_c(true);
            }
            InstructionType::Ccf => {
                let c = self.regs.flag_c();
                self.regs.set_flag_n(false);
                self.regs.set_flag_h(false);
                self.regs.set_flag_c(!c);
            }
            InstructionType::Di => {
                self.ime = false;
                self.ime_scheduled = false;
            }
            InstructionType::Ei => self.ime_scheduled = true,
            InstructionType::Cb => return Ok(self.proc_cb(bus, operand)),
            // Only reachable through the CB table
            InstructionType::Rlc
            | InstructionType::Rrc
            | InstructionType::Rl
            | InstructionType::Rr
            | InstructionType::Sla
            | InstructionType::Sra
            | InstructionType::Swap
            | InstructionType::Srl
            | InstructionType::Bit
            | InstructionType::Res
            | InstructionType::Set => {}
        }

        Ok(if taken && inst.cond != ConditionType::None {
            inst.taken_extra()
        } else {
            0
        })
    }

    // ========== Instruction Processors ==========

    fn proc_ld<B: MemoryBus>(&mut self, bus: &mut B, inst: &Instruction) {
        if self.dest_is_mem {
            if inst.reg2.is_16bit() {
                bus.write16(self.mem_dest, self.fetched_data);
            } else {
                bus.write(self.mem_dest, self.fetched_data as Byte);
            }
            return;
        }

        if inst.mode == AddressingMode::HlSpr {
            let value = self.sp_offset(self.fetched_data as Byte);
            self.regs.set_hl(value);
            return;
        }

        self.write_reg(inst.reg1, self.fetched_data);
    }

    fn proc_ldh<B: MemoryBus>(&mut self, bus: &mut B, inst: &Instruction) {
        if inst.reg1 == RegisterType::A {
            let value = bus.read(0xFF00 | self.fetched_data);
            self.regs.set_a(value);
        } else {
            bus.write(self.mem_dest, self.regs.a());
        }
    }

    fn proc_inc_dec<B: MemoryBus>(&mut self, bus: &mut B, inst: &Instruction, increment: bool) {
        // 16-bit forms leave the flags alone
        if inst.mode == AddressingMode::Register && inst.reg1.is_16bit() {
            let value = if increment {
                self.fetched_data.wrapping_add(1)
            } else {
                self.fetched_data.wrapping_sub(1)
            };
            self.write_reg(inst.reg1, value);
            return;
        }

        let before = self.fetched_data as Byte;
        let (after, half) = if increment {
            let v = before.wrapping_add(1);
            (v, before & 0x0F == 0x0F)
        } else {
            let v = before.wrapping_sub(1);
            (v, before & 0x0F == 0x00)
        };

        if self.dest_is_mem {
            bus.write(self.mem_dest, after);
        } else {
            self.write_reg(inst.reg1, after as Word);
        }

        self.regs.set_flag_z(after == 0);
        self.regs.set_flag_n(!increment);
        self.regs.set_flag_h(half);
    }

    fn proc_add(&mut self, inst: &Instruction) {
        match inst.reg1 {
            RegisterType::Hl => {
                let hl = self.regs.hl();
                let value = self.fetched_data;
                let (sum, carry) = hl.overflowing_add(value);
                let half = (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF;
                self.regs.set_hl(sum);
                self.regs.set_flag_n(false);
                self.regs.set_flag_h(half);
                self.regs.set_flag_c(carry);
            }
            RegisterType::Sp => {
                self.regs.sp = self.sp_offset(self.fetched_data as Byte);
            }
            _ => self.alu_add(self.fetched_data as Byte, false),
        }
    }

    /// SP plus a signed byte; flags come from the unsigned low-byte add
    fn sp_offset(&mut self, offset: Byte) -> Word {
        let sp = self.regs.sp;
        let value = offset as Word;
        let half = (sp & 0x0F) + (value & 0x0F) > 0x0F;
        let carry = (sp & 0xFF) + (value & 0xFF) > 0xFF;
        self.regs.set_flags(false, false, half, carry);
        sp.wrapping_add(offset as i8 as i16 as Word)
    }

    fn alu_add(&mut self, value: Byte, carry_in: bool) {
        let a = self.regs.a();
        let c = carry_in as Byte;
        let result = a as u16 + value as u16 + c as u16;
        let half = (a & 0x0F) + (value & 0x0F) + c > 0x0F;
        self.regs.set_a(result as Byte);
        self.regs
            .set_flags(result as Byte == 0, false, half, result > 0xFF);
    }

    /// SUB, SBC and CP; `store` is false for CP
    fn alu_sub(&mut self, value: Byte, carry_in: bool, store: bool) {
        let a = self.regs.a();
        let c = carry_in as i16;
        let result = a as i16 - value as i16 - c;
        let half = (a & 0x0F) as i16 - (value & 0x0F) as i16 - c < 0;
        if store {
            self.regs.set_a(result as Byte);
        }
        self.regs
            .set_flags(result as Byte == 0, true, half, result < 0);
    }

    fn proc_halt<B: MemoryBus>(&mut self, bus: &B) {
        if !self.ime && bus.interrupts().pending() != 0 {
            self.halt_bug = true;
        } else {
            self.halted = true;
        }
    }

    fn proc_daa(&mut self) {
        let mut a = self.regs.a();
        let mut carry = self.regs.flag_c();

        if self.regs.flag_n() {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if self.regs.flag_h() {
                a = a.wrapping_sub(0x06);
            }
        } else {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if self.regs.flag_h() || (a & 0x0F) > 0x09 {
                a = a.wrapping_add(0x06);
            }
        }

        self.regs.set_a(a);
        self.regs.set_flag_z(a == 0);
        self.regs.set_flag_h(false);
        self.regs.set_flag_c(carry);
    }

    /// Rotate or shift a byte, returning the result and the new carry
    fn shift(&self, kind: InstructionType, value: Byte) -> (Byte, bool) {
        let carry_in = self.regs.flag_c() as Byte;
        let high = value & 0x80 != 0;
        let low = value & 0x01 != 0;
        match kind {
            InstructionType::Rlc => (value.rotate_left(1), high),
            InstructionType::Rrc => (value.rotate_right(1), low),
            InstructionType::Rl => ((value << 1) | carry_in, high),
            InstructionType::Rr => ((value >> 1) | (carry_in << 7), low),
            InstructionType::Sla => (value << 1, high),
            InstructionType::Sra => ((value >> 1) | (value & 0x80), low),
            InstructionType::Swap => (value.rotate_left(4), false),
            _ => (value >> 1, low),
        }
    }

    fn proc_cb<B: MemoryBus>(&mut self, bus: &mut B, op: Byte) -> u8 {
        let cb = cb_instruction_by_opcode(op);
        let on_memory = cb.mode == AddressingMode::MemoryRegisterOnly;
        let address = self.regs.hl();
        let value = if on_memory {
            bus.read(address)
        } else {
            self.read_reg(cb.reg1) as Byte
        };

        let result = match cb.inst_type {
            InstructionType::Bit => {
                self.regs.set_flag_z(value & (1 << cb.param) == 0);
                self.regs.set_flag_n(false);
                self.regs.set_flag_h(true);
                return cb.cycles;
            }
            InstructionType::Res => value & !(1 << cb.param),
            InstructionType::Set => value | (1 << cb.param),
            kind => {
                let (result, carry) = self.shift(kind, value);
                self.regs.set_flags(result == 0, false, false, carry);
                result
            }
        };

        if on_memory {
            bus.write(address, result);
        } else {
            self.write_reg(cb.reg1, result as Word);
        }
        cb.cycles
    }

    // ========== Stack Operations ==========

    /// Push a 16-bit value: high byte first, SP ends on the low byte
    pub fn stack_push16<B: MemoryBus>(&mut self, bus: &mut B, value: Word) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, (value >> 8) as Byte);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, value as Byte);
    }

    pub fn stack_pop16<B: MemoryBus>(&mut self, bus: &mut B) -> Word {
        let lo = bus.read(self.regs.sp) as Word;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp) as Word;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        (hi << 8) | lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::tests::FlatBus;
    use crate::interrupts::InterruptType;

    /// Run `steps` instructions of `program` loaded at 0x0000
    fn run(program: &[Byte], steps: usize) -> (Cpu, FlatBus, u32) {
        let mut bus = FlatBus::with_program(0x0000, program);
        let mut cpu = Cpu::new();
        cpu.regs.sp = 0xFFFE;
        let mut cycles = 0;
        for _ in 0..steps {
            cycles = cpu.step(&mut bus).unwrap();
        }
        (cpu, bus, cycles)
    }

    #[test]
    fn test_daa_after_add_and_sub() {
        // LD A,0x15; ADD A,0x27; DAA
        let (cpu, _, _) = run(&[0x3E, 0x15, 0xC6, 0x27, 0x27], 3);
        assert_eq!(cpu.regs.a(), 0x42);
        assert!(!cpu.regs.flag_c());

        // LD A,0x42; SUB 0x15; DAA
        let (cpu, _, _) = run(&[0x3E, 0x42, 0xD6, 0x15, 0x27], 3);
        assert_eq!(cpu.regs.a(), 0x27);
        assert!(cpu.regs.flag_n());

        // LD A,0x99; ADD A,0x01; DAA -> 0x00 with carry
        let (cpu, _, _) = run(&[0x3E, 0x99, 0xC6, 0x01, 0x27], 3);
        assert_eq!(cpu.regs.a(), 0x00);
        assert!(cpu.regs.flag_z());
        assert!(cpu.regs.flag_c());
    }

    #[test]
    fn test_adc_sbc_use_carry() {
        // SCF; LD A,0x0F; ADC A,0x00
        let (cpu, _, _) = run(&[0x37, 0x3E, 0x0F, 0xCE, 0x00], 3);
        assert_eq!(cpu.regs.a(), 0x10);
        assert!(cpu.regs.flag_h());
        assert!(!cpu.regs.flag_c());

        // SCF; LD A,0x00; SBC A,0x00
        let (cpu, _, _) = run(&[0x37, 0x3E, 0x00, 0xDE, 0x00], 3);
        assert_eq!(cpu.regs.a(), 0xFF);
        assert!(cpu.regs.flag_c());
        assert!(cpu.regs.flag_h());
        assert!(cpu.regs.flag_n());
    }

    #[test]
    fn test_cp_leaves_a() {
        // LD A,0x10; CP 0x20
        let (cpu, _, _) = run(&[0x3E, 0x10, 0xFE, 0x20], 2);
        assert_eq!(cpu.regs.a(), 0x10);
        assert!(cpu.regs.flag_c());
        assert!(!cpu.regs.flag_z());
    }

    #[test]
    fn test_inc_dec_flags() {
        // LD B,0x0F; INC B; LD C,0x10; DEC C
        let (cpu, _, _) = run(&[0x06, 0x0F, 0x04, 0x0E, 0x10, 0x0D], 4);
        assert_eq!(cpu.regs.b(), 0x10);
        assert_eq!(cpu.regs.c(), 0x0F);
        assert!(cpu.regs.flag_h());
        assert!(cpu.regs.flag_n());

        // LD HL,0xC000; INC (HL) -> 3 M-cycles
        let (_, bus, cycles) = run(&[0x21, 0x00, 0xC0, 0x34], 2);
        assert_eq!(bus.memory[0xC000], 1);
        assert_eq!(cycles, 12);
    }

    #[test]
    fn test_add_hl_and_sp_offsets() {
        // LD HL,0x0FFF; LD BC,0x0001; ADD HL,BC
        let (cpu, _, _) = run(&[0x21, 0xFF, 0x0F, 0x01, 0x01, 0x00, 0x09], 3);
        assert_eq!(cpu.regs.hl(), 0x1000);
        assert!(cpu.regs.flag_h());
        assert!(!cpu.regs.flag_c());

        // LD SP,0x00FF; ADD SP,-1
        let (cpu, _, cycles) = run(&[0x31, 0xFF, 0x00, 0xE8, 0xFF], 2);
        assert_eq!(cpu.regs.sp, 0x00FE);
        assert!(cpu.regs.flag_c());
        assert!(cpu.regs.flag_h());
        assert_eq!(cycles, 16);

        // LD SP,0xFFF8; LD HL,SP+8
        let (cpu, _, _) = run(&[0x31, 0xF8, 0xFF, 0xF8, 0x08], 2);
        assert_eq!(cpu.regs.hl(), 0x0000);
        assert_eq!(cpu.regs.sp, 0xFFF8);
        assert!(!cpu.regs.flag_z());
    }

    #[test]
    fn test_conditional_jump_costs() {
        // XOR A (Z set); JR NZ,+2 not taken
        let (cpu, _, cycles) = run(&[0xAF, 0x20, 0x02], 2);
        assert_eq!(cycles, 8);
        assert_eq!(cpu.regs.pc, 0x0003);

        // XOR A; JR Z,-3 taken
        let (cpu, _, cycles) = run(&[0xAF, 0x28, 0xFD], 2);
        assert_eq!(cycles, 12);
        assert_eq!(cpu.regs.pc, 0x0000);
    }

    #[test]
    fn test_call_and_ret() {
        let mut program = vec![0xCD, 0x10, 0x00];
        program.resize(0x10, 0x00);
        program.push(0xC9);

        let (cpu, bus, cycles) = run(&program, 1);
        assert_eq!(cpu.regs.pc, 0x0010);
        assert_eq!(cpu.regs.sp, 0xFFFC);
        assert_eq!(bus.memory[0xFFFC], 0x03);
        assert_eq!(cycles, 24);

        let (cpu, _, cycles) = run(&program, 2);
        assert_eq!(cpu.regs.pc, 0x0003);
        assert_eq!(cpu.regs.sp, 0xFFFE);
        assert_eq!(cycles, 16);
    }

    #[test]
    fn test_push_pop_af_masks_flags() {
        // LD BC,0x12FF; PUSH BC; POP AF
        let (cpu, _, _) = run(&[0x01, 0xFF, 0x12, 0xC5, 0xF1], 3);
        assert_eq!(cpu.regs.af(), 0x12F0);
    }

    #[test]
    fn test_rotate_accumulator_clears_zero() {
        // XOR A; RLCA
        let (cpu, _, _) = run(&[0xAF, 0x07], 2);
        assert!(!cpu.regs.flag_z());

        // LD A,0x80; RLA -> 0, carry set
        let (cpu, _, _) = run(&[0x3E, 0x80, 0x17], 2);
        assert_eq!(cpu.regs.a(), 0x00);
        assert!(cpu.regs.flag_c());
        assert!(!cpu.regs.flag_z());
    }

    #[test]
    fn test_cb_operations() {
        // LD A,0xF1; SWAP A
        let (cpu, _, cycles) = run(&[0x3E, 0xF1, 0xCB, 0x37], 2);
        assert_eq!(cpu.regs.a(), 0x1F);
        assert_eq!(cycles, 8);

        // LD B,0x81; SRA B
        let (cpu, _, _) = run(&[0x06, 0x81, 0xCB, 0x28], 2);
        assert_eq!(cpu.regs.b(), 0xC0);
        assert!(cpu.regs.flag_c());

        // LD HL,0xC000; SET 3,(HL); BIT 3,(HL)
        let (cpu, bus, cycles) = run(&[0x21, 0x00, 0xC0, 0xCB, 0xDE, 0xCB, 0x5E], 3);
        assert_eq!(bus.memory[0xC000], 0x08);
        assert!(!cpu.regs.flag_z());
        assert_eq!(cycles, 12);

        let (_, _, cycles) = run(&[0x21, 0x00, 0xC0, 0xCB, 0xDE], 2);
        assert_eq!(cycles, 16);
    }

    #[test]
    fn test_ld_a16_sp() {
        // LD SP,0xBEEF; LD (0xC000),SP
        let (_, bus, cycles) = run(&[0x31, 0xEF, 0xBE, 0x08, 0x00, 0xC0], 2);
        assert_eq!(bus.memory[0xC000], 0xEF);
        assert_eq!(bus.memory[0xC001], 0xBE);
        assert_eq!(cycles, 20);
    }

    #[test]
    fn test_illegal_opcode_is_an_error() {
        let mut bus = FlatBus::with_program(0x0000, &[0x00, 0xDD]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        match cpu.step(&mut bus) {
            Err(Error::IllegalOpcode { opcode, pc }) => {
                assert_eq!(opcode, 0xDD);
                assert_eq!(pc, 0x0001);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_halt_bug_runs_next_byte_twice() {
        // HALT with IME off and Timer pending; INC A executes twice
        let mut bus = FlatBus::with_program(0x0000, &[0x76, 0x3C, 0x00]);
        bus.interrupts.enable = InterruptType::Timer.bit();
        bus.interrupts.request(InterruptType::Timer);
        let mut cpu = Cpu::new();

        cpu.step(&mut bus).unwrap();
        assert!(!cpu.halted);
        cpu.step(&mut bus).unwrap();
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.regs.a(), 2);
        assert_eq!(cpu.regs.pc, 0x0002);
    }

    #[test]
    fn test_di_cancels_pending_ei() {
        // EI; DI; NOP
        let (cpu, _, _) = run(&[0xFB, 0xF3, 0x00], 3);
        assert!(!cpu.ime);
    }
}
