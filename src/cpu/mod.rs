//! CPU Module
//!
//! Sharp SM83 core. [`Cpu::step`] performs exactly one unit of work:
//! dispatch an interrupt, execute one instruction, or idle one T-cycle
//! while halted or stopped. It returns the T-cycles consumed, which the
//! caller adds to the system clock before catching the peripherals up.

pub mod execute;
pub mod fetch;
pub mod instructions;
pub mod registers;

use std::fmt;

use log::trace;

use crate::bus::MemoryBus;
use crate::common::{Byte, Word};
use crate::error::Result;
use crate::interrupts::InterruptType;
use instructions::Instruction;
use registers::Registers;

/// T-cycles per machine cycle
pub const T_CYCLES_PER_M: u32 = 4;

/// Interrupt dispatch costs five machine cycles
const DISPATCH_M_CYCLES: u32 = 5;

/// CPU state
#[derive(Debug, Default)]
pub struct Cpu {
    pub regs: Registers,
    /// Waiting for any enabled interrupt to be requested
    pub halted: bool,
    /// Waiting for a Joypad interrupt request
    pub stopped: bool,
    /// Next opcode fetch leaves PC in place
    pub halt_bug: bool,
    /// Interrupt Master Enable flag
    pub ime: bool,
    /// EI executed; IME turns on after the following instruction
    pub ime_scheduled: bool,
    /// Operand decoded for the current instruction
    pub fetched_data: Word,
    /// Memory destination address for the current instruction
    pub mem_dest: Word,
    pub dest_is_mem: bool,
    pub cur_opcode: Byte,
    cur_inst: Option<&'static Instruction>,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register state left behind by the DMG boot ROM
    pub fn init(&mut self) {
        self.regs.pc = 0x0100;
        self.regs.sp = 0xFFFE;
        self.regs.set_af(0x01B0);
        self.regs.set_bc(0x0013);
        self.regs.set_de(0x00D8);
        self.regs.set_hl(0x014D);

        self.halted = false;
        self.stopped = false;
        self.halt_bug = false;
        self.ime = false;
        self.ime_scheduled = false;
    }

    /// Instruction decoded by the last step, if any
    pub fn current_instruction(&self) -> Option<&'static Instruction> {
        self.cur_inst
    }

    /// Run one step and return the T-cycles it took
    pub fn step<B: MemoryBus>(&mut self, bus: &mut B) -> Result<u32> {
        let pending = bus.interrupts().pending();

        if self.ime && pending != 0 {
            if let Some(interrupt) = bus.interrupts().highest_pending() {
                self.dispatch(bus, interrupt);
                return Ok(DISPATCH_M_CYCLES * T_CYCLES_PER_M);
            }
        }

        if self.halted {
            if pending == 0 {
                return Ok(1);
            }
            self.halted = false;
        }

        if self.stopped {
            if bus.interrupts().flags & InterruptType::Joypad.bit() == 0 {
                return Ok(1);
            }
            self.stopped = false;
        }

        let enable_after = self.ime_scheduled;

        let inst = self.fetch_instruction(bus);
        self.fetch_data(bus, inst);
        let extra = self.execute(bus, inst)?;

        if enable_after && self.ime_scheduled {
            self.ime_scheduled = false;
            self.ime = true;
        }

        Ok((inst.cycles + extra) as u32 * T_CYCLES_PER_M)
    }

    fn dispatch<B: MemoryBus>(&mut self, bus: &mut B, interrupt: InterruptType) {
        trace!("Dispatching {:?} from PC={:04X}", interrupt, self.regs.pc);
        self.ime = false;
        self.halted = false;
        bus.interrupts_mut().acknowledge(interrupt);
        self.stack_push16(bus, self.regs.pc);
        self.regs.pc = interrupt.vector();
    }
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU: PC={:04X} SP={:04X} AF={:04X} BC={:04X} DE={:04X} HL={:04X} IME={} HALT={}",
            self.regs.pc,
            self.regs.sp,
            self.regs.af(),
            self.regs.bc(),
            self.regs.de(),
            self.regs.hl(),
            self.ime as u8,
            self.halted as u8
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::interrupts::Interrupts;

    /// 64KB of plain memory with interrupt registers, for CPU tests
    pub(crate) struct FlatBus {
        pub memory: Vec<Byte>,
        pub interrupts: Interrupts,
    }

    impl FlatBus {
        pub fn with_program(origin: Word, program: &[Byte]) -> Self {
            let mut bus = Self {
                memory: vec![0; 0x10000],
                interrupts: Interrupts::new(),
            };
            bus.load(origin, program);
            bus
        }

        pub fn load(&mut self, origin: Word, bytes: &[Byte]) {
            let start = origin as usize;
            self.memory[start..start + bytes.len()].copy_from_slice(bytes);
        }
    }

    impl MemoryBus for FlatBus {
        fn read(&self, address: Word) -> Byte {
            self.memory[address as usize]
        }

        fn write(&mut self, address: Word, value: Byte) {
            self.memory[address as usize] = value;
        }

        fn interrupts(&self) -> &Interrupts {
            &self.interrupts
        }

        fn interrupts_mut(&mut self) -> &mut Interrupts {
            &mut self.interrupts
        }
    }

    #[test]
    fn test_cpu_new() {
        let cpu = Cpu::new();
        assert_eq!(cpu.regs.pc, 0);
        assert_eq!(cpu.regs.sp, 0);
        assert!(!cpu.halted);
        assert!(!cpu.ime);
    }

    #[test]
    fn test_cpu_init_boot_skip() {
        let mut cpu = Cpu::new();
        cpu.init();

        assert_eq!(cpu.regs.pc, 0x0100);
        assert_eq!(cpu.regs.sp, 0xFFFE);
        assert_eq!(cpu.regs.af(), 0x01B0);
        assert_eq!(cpu.regs.bc(), 0x0013);
        assert_eq!(cpu.regs.de(), 0x00D8);
        assert_eq!(cpu.regs.hl(), 0x014D);
        assert!(cpu.regs.flag_z());
        assert!(!cpu.regs.flag_n());
        assert!(cpu.regs.flag_h());
        assert!(cpu.regs.flag_c());
    }

    #[test]
    fn test_interrupt_dispatch() {
        let mut bus = FlatBus::with_program(0x0200, &[0x00]);
        bus.interrupts.enable = 0x1F;
        bus.interrupts.request(InterruptType::Timer);
        bus.interrupts.request(InterruptType::Joypad);

        let mut cpu = Cpu::new();
        cpu.regs.pc = 0x0200;
        cpu.regs.sp = 0xD000;
        cpu.ime = true;

        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 20);
        assert_eq!(cpu.regs.pc, InterruptType::Timer.vector());
        assert!(!cpu.ime);
        assert_eq!(bus.interrupts.flags, InterruptType::Joypad.bit());
        assert_eq!(bus.memory[0xCFFF], 0x02);
        assert_eq!(bus.memory[0xCFFE], 0x00);
    }

    #[test]
    fn test_no_dispatch_without_enable() {
        let mut bus = FlatBus::with_program(0x0000, &[0x00]);
        bus.interrupts.request(InterruptType::VBlank);
        let mut cpu = Cpu::new();
        cpu.ime = true;

        assert_eq!(cpu.step(&mut bus).unwrap(), 4);
        assert_eq!(cpu.regs.pc, 1);
    }

    #[test]
    fn test_ei_takes_effect_after_next_instruction() {
        // EI; NOP; NOP
        let mut bus = FlatBus::with_program(0x0000, &[0xFB, 0x00, 0x00]);
        bus.interrupts.enable = InterruptType::VBlank.bit();
        bus.interrupts.request(InterruptType::VBlank);
        let mut cpu = Cpu::new();
        cpu.regs.sp = 0xFFFE;

        cpu.step(&mut bus).unwrap();
        assert!(!cpu.ime);
        cpu.step(&mut bus).unwrap();
        assert!(cpu.ime);
        assert_eq!(cpu.regs.pc, 2);

        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.regs.pc, 0x0040);
    }

    #[test]
    fn test_halt_idles_until_interrupt() {
        let mut bus = FlatBus::with_program(0x0000, &[0x76, 0x3C]);
        bus.interrupts.enable = InterruptType::Timer.bit();
        let mut cpu = Cpu::new();

        cpu.step(&mut bus).unwrap();
        assert!(cpu.halted);
        for _ in 0..10 {
            assert_eq!(cpu.step(&mut bus).unwrap(), 1);
        }
        assert_eq!(cpu.regs.pc, 1);

        // IME off: wake and continue without dispatching
        bus.interrupts.request(InterruptType::Timer);
        assert_eq!(cpu.step(&mut bus).unwrap(), 4);
        assert!(!cpu.halted);
        assert_eq!(cpu.regs.a(), 1);
    }

    #[test]
    fn test_halt_with_ime_dispatches() {
        let mut bus = FlatBus::with_program(0x0000, &[0x76]);
        bus.interrupts.enable = InterruptType::LcdStat.bit();
        let mut cpu = Cpu::new();
        cpu.regs.sp = 0xFFFE;
        cpu.ime = true;

        cpu.step(&mut bus).unwrap();
        assert!(cpu.halted);

        bus.interrupts.request(InterruptType::LcdStat);
        assert_eq!(cpu.step(&mut bus).unwrap(), 20);
        assert!(!cpu.halted);
        assert_eq!(cpu.regs.pc, 0x0048);
    }

    #[test]
    fn test_stop_waits_for_joypad() {
        // STOP 0; INC A
        let mut bus = FlatBus::with_program(0x0000, &[0x10, 0x00, 0x3C]);
        let mut cpu = Cpu::new();

        cpu.step(&mut bus).unwrap();
        assert!(cpu.stopped);
        assert_eq!(cpu.regs.pc, 2);

        bus.interrupts.request(InterruptType::Timer);
        assert_eq!(cpu.step(&mut bus).unwrap(), 1);

        bus.interrupts.request(InterruptType::Joypad);
        cpu.step(&mut bus).unwrap();
        assert!(!cpu.stopped);
        assert_eq!(cpu.regs.a(), 1);
    }

    #[test]
    fn test_display() {
        let mut cpu = Cpu::new();
        cpu.init();
        let text = cpu.to_string();
        assert!(text.contains("PC=0100"));
        assert!(text.contains("AF=01B0"));
    }
}
