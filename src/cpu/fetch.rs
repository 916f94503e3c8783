//! Instruction Fetch
//!
//! Opcode fetch and operand decoding. Operand bytes are consumed here so
//! that execution only deals with `fetched_data` and `mem_dest`.

use super::instructions::{instruction_by_opcode, AddressingMode, Instruction, RegisterType};
use super::Cpu;
use crate::bus::MemoryBus;
use crate::common::{Byte, Word};

impl Cpu {
    /// Read a value from a register
    pub fn read_reg(&self, reg: RegisterType) -> Word {
        let r = &self.regs;
        match reg {
            RegisterType::None => 0,
            RegisterType::A => r.a() as Word,
            RegisterType::F => r.f() as Word,
            RegisterType::B => r.b() as Word,
            RegisterType::C => r.c() as Word,
            RegisterType::D => r.d() as Word,
            RegisterType::E => r.e() as Word,
            RegisterType::H => r.h() as Word,
            RegisterType::L => r.l() as Word,
            RegisterType::Af => r.af(),
            RegisterType::Bc => r.bc(),
            RegisterType::De => r.de(),
            RegisterType::Hl => r.hl(),
            RegisterType::Sp => r.sp,
            RegisterType::Pc => r.pc,
        }
    }

    /// Write a value to a register; 8-bit targets take the low byte
    pub fn write_reg(&mut self, reg: RegisterType, value: Word) {
        let byte = value as Byte;
        let r = &mut self.regs;
        match reg {
            RegisterType::None => {}
            RegisterType::A => r.set_a(byte),
            RegisterType::F => r.set_f(byte),
            RegisterType::B => r.set_b(byte),
            RegisterType::C => r.set_c(byte),
            RegisterType::D => r.set_d(byte),
            RegisterType::E => r.set_e(byte),
            RegisterType::H => r.set_h(byte),
            RegisterType::L => r.set_l(byte),
            RegisterType::Af => r.set_af(value),
            RegisterType::Bc => r.set_bc(value),
            RegisterType::De => r.set_de(value),
            RegisterType::Hl => r.set_hl(value),
            RegisterType::Sp => r.sp = value,
            RegisterType::Pc => r.pc = value,
        }
    }

    fn read_pc8<B: MemoryBus>(&mut self, bus: &B) -> Byte {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn read_pc16<B: MemoryBus>(&mut self, bus: &B) -> Word {
        let lo = self.read_pc8(bus) as Word;
        let hi = self.read_pc8(bus) as Word;
        lo | (hi << 8)
    }

    /// Fetch the next opcode. After a HALT bug the byte is read but PC is
    /// left in place, so it will be read again as the next operand or opcode.
    pub fn fetch_instruction<B: MemoryBus>(&mut self, bus: &B) -> &'static Instruction {
        self.cur_opcode = bus.read(self.regs.pc);
        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
        let inst = instruction_by_opcode(self.cur_opcode);
        self.cur_inst = Some(inst);
        inst
    }

    /// Fetch operand data based on addressing mode
    pub fn fetch_data<B: MemoryBus>(&mut self, bus: &B, inst: &Instruction) {
        self.mem_dest = 0;
        self.dest_is_mem = false;

        match inst.mode {
            AddressingMode::Implied => {}

            AddressingMode::Register => {
                self.fetched_data = self.read_reg(inst.reg1);
            }

            AddressingMode::RegisterRegister => {
                self.fetched_data = self.read_reg(inst.reg2);
            }

            AddressingMode::RegisterD8
            | AddressingMode::D8
            | AddressingMode::RegisterA8
            | AddressingMode::HlSpr => {
                self.fetched_data = self.read_pc8(bus) as Word;
            }

            AddressingMode::RegisterD16 | AddressingMode::D16 => {
                self.fetched_data = self.read_pc16(bus);
            }

            AddressingMode::MemoryRegister => {
                self.fetched_data = self.read_reg(inst.reg2);
                self.mem_dest = self.read_reg(inst.reg1);
                self.dest_is_mem = true;
                if inst.reg1 == RegisterType::C {
                    self.mem_dest |= 0xFF00;
                }
            }

            AddressingMode::RegisterMemory => {
                let mut addr = self.read_reg(inst.reg2);
                if inst.reg2 == RegisterType::C {
                    addr |= 0xFF00;
                }
                self.fetched_data = bus.read(addr) as Word;
            }

            AddressingMode::RegisterHli | AddressingMode::RegisterHld => {
                let hl = self.regs.hl();
                self.fetched_data = bus.read(hl) as Word;
                self.step_hl(inst.mode == AddressingMode::RegisterHli);
            }

            AddressingMode::HliRegister | AddressingMode::HldRegister => {
                self.fetched_data = self.read_reg(inst.reg2);
                self.mem_dest = self.regs.hl();
                self.dest_is_mem = true;
                self.step_hl(inst.mode == AddressingMode::HliRegister);
            }

            AddressingMode::A8Register => {
                self.mem_dest = self.read_pc8(bus) as Word | 0xFF00;
                self.dest_is_mem = true;
                self.fetched_data = self.read_reg(inst.reg2);
            }

            AddressingMode::A16Register => {
                self.mem_dest = self.read_pc16(bus);
                self.dest_is_mem = true;
                self.fetched_data = self.read_reg(inst.reg2);
            }

            AddressingMode::MemoryRegisterD8 => {
                self.fetched_data = self.read_pc8(bus) as Word;
                self.mem_dest = self.read_reg(inst.reg1);
                self.dest_is_mem = true;
            }

            AddressingMode::MemoryRegisterOnly => {
                self.mem_dest = self.read_reg(inst.reg1);
                self.dest_is_mem = true;
                self.fetched_data = bus.read(self.mem_dest) as Word;
            }

            AddressingMode::RegisterA16 => {
                let addr = self.read_pc16(bus);
                self.fetched_data = bus.read(addr) as Word;
            }
        }
    }

    fn step_hl(&mut self, increment: bool) {
        let hl = self.regs.hl();
        let hl = if increment {
            hl.wrapping_add(1)
        } else {
            hl.wrapping_sub(1)
        };
        self.regs.set_hl(hl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::tests::FlatBus;

    #[test]
    fn test_register_access() {
        let mut cpu = Cpu::new();
        cpu.write_reg(RegisterType::Hl, 0x1234);
        assert_eq!(cpu.read_reg(RegisterType::H), 0x12);
        cpu.write_reg(RegisterType::L, 0x1FF);
        assert_eq!(cpu.read_reg(RegisterType::Hl), 0x12FF);
        cpu.write_reg(RegisterType::F, 0xFF);
        assert_eq!(cpu.read_reg(RegisterType::F), 0xF0);
    }

    #[test]
    fn test_fetch_immediate_operands() {
        let mut bus = FlatBus::with_program(0x0100, &[0x01, 0x34, 0x12]);
        let mut cpu = Cpu::new();
        cpu.regs.pc = 0x0100;

        let inst = cpu.fetch_instruction(&bus);
        cpu.fetch_data(&bus, inst);
        assert_eq!(cpu.fetched_data, 0x1234);
        assert_eq!(cpu.regs.pc, 0x0103);

        // LDH (a8),A targets the high page
        bus.load(0x0103, &[0xE0, 0x80]);
        let inst = cpu.fetch_instruction(&bus);
        cpu.fetch_data(&bus, inst);
        assert!(cpu.dest_is_mem);
        assert_eq!(cpu.mem_dest, 0xFF80);
    }

    #[test]
    fn test_hl_post_increment_and_decrement() {
        let mut bus = FlatBus::with_program(0x0000, &[0x2A, 0x32]);
        bus.load(0xC000, &[0x99]);
        let mut cpu = Cpu::new();
        cpu.regs.set_hl(0xC000);

        let inst = cpu.fetch_instruction(&bus);
        cpu.fetch_data(&bus, inst);
        assert_eq!(cpu.fetched_data, 0x99);
        assert_eq!(cpu.regs.hl(), 0xC001);

        let inst = cpu.fetch_instruction(&bus);
        cpu.fetch_data(&bus, inst);
        assert_eq!(cpu.mem_dest, 0xC001);
        assert_eq!(cpu.regs.hl(), 0xC000);
    }

    #[test]
    fn test_halt_bug_repeats_byte() {
        let bus = FlatBus::with_program(0x0000, &[0x3C]);
        let mut cpu = Cpu::new();
        cpu.halt_bug = true;

        cpu.fetch_instruction(&bus);
        assert_eq!(cpu.regs.pc, 0x0000);
        assert!(!cpu.halt_bug);

        cpu.fetch_instruction(&bus);
        assert_eq!(cpu.regs.pc, 0x0001);
    }
}
