//! The Chip32 interpreter: fetch/decode/execute loop over a split ROM/RAM
//! image, with a numeric syscall boundary to the host.

pub mod host;
pub mod memory;
pub mod registers;

use alloc::collections::BTreeMap;
use alloc::collections::BTreeSet;
use alloc::string::String;

use crate::assembler::isa::{self, Register};
use crate::assembler::Assembled;
use memory::{MemError, Memory, RAM_FLAG};
use registers::RegisterFile;

pub use host::{SyscallHost, SyscallResult};

/// VM execution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    /// Image loaded, no instruction executed yet.
    Ready,
    /// Executing normally.
    Ok,
    /// Paused on a syscall awaiting a host-supplied result in `R0`.
    WaitEvent,
    /// Stopped by `HALT`.
    Halted,
    /// Aborted by a fault. Only `initialize` recovers from this state.
    Error,
}

/// Sizing knobs passed to [`Chip32::initialize`].
#[derive(Debug, Clone, Copy)]
pub struct VmConfig {
    pub ram_size: usize,
    pub stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            ram_size: 4096,
            stack_size: 256,
        }
    }
}

/// The Chip32 virtual machine.
pub struct Chip32 {
    memory: Memory,
    registers: RegisterFile,
    state: ExecResult,
    config: VmConfig,
    addr_to_line: BTreeMap<u32, usize>,
    breakpoints: BTreeSet<usize>,
    last_error: Option<String>,
}

impl Chip32 {
    pub fn new(config: VmConfig) -> Self {
        Self {
            memory: Memory::new(alloc::vec::Vec::new(), config.ram_size),
            registers: RegisterFile::new(),
            state: ExecResult::Halted,
            config,
            addr_to_line: BTreeMap::new(),
            breakpoints: BTreeSet::new(),
            last_error: None,
        }
    }

    /// Reset registers and load an assembled image into ROM. `SP` starts at
    /// the top of the configured RAM region (the reserved stack grows
    /// downward from there).
    pub fn initialize(&mut self, image: &Assembled) {
        self.memory = Memory::new(image.code.clone(), self.config.ram_size);
        self.registers = RegisterFile::new();
        self.registers
            .set(Register::Sp, RAM_FLAG | self.config.ram_size as u32);
        self.addr_to_line = image.addr_to_line.clone();
        self.state = ExecResult::Ready;
        self.last_error = None;
    }

    pub fn state(&self) -> ExecResult {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn register(&self, reg: Register) -> u32 {
        self.registers.get(reg)
    }

    pub fn set_register(&mut self, reg: Register, value: u32) {
        self.registers.set(reg, value);
    }

    pub fn ram(&self) -> &[u8] {
        self.memory.ram()
    }

    pub fn rom(&self) -> &[u8] {
        self.memory.rom()
    }

    /// Translate the current `PC` to its originating source line, using the
    /// assembler's `{address, source_line}` mapping.
    pub fn current_line(&self) -> Option<usize> {
        self.addr_to_line
            .get(&self.registers.get(Register::Pc))
            .copied()
    }

    pub fn set_breakpoint(&mut self, line: usize) {
        self.breakpoints.insert(line);
    }

    pub fn clear_breakpoint(&mut self, line: usize) {
        self.breakpoints.remove(&line);
    }

    pub fn breakpoints(&self) -> &BTreeSet<usize> {
        &self.breakpoints
    }

    fn fault(&mut self, message: impl Into<String>) -> ExecResult {
        self.last_error = Some(message.into());
        self.state = ExecResult::Error;
        self.state
    }

    fn stack_base(&self) -> u32 {
        (self.config.ram_size - self.config.stack_size) as u32
    }

    /// Execute a single instruction. Returns the resulting [`ExecResult`];
    /// once `Halted`/`Error`, only [`Chip32::initialize`] recovers.
    pub fn step(&mut self, host: &mut dyn SyscallHost) -> ExecResult {
        if matches!(self.state, ExecResult::Halted | ExecResult::Error) {
            return self.state;
        }

        let pc = self.registers.get(Register::Pc);
        let opcode = match self.memory.fetch_u8(pc) {
            Ok(b) => b,
            Err(_) => return self.fault("PC out of bounds"),
        };
        let Some(total_len) = isa::instruction_len(opcode) else {
            return self.fault(alloc::format!("unknown opcode {:#04x}", opcode));
        };
        let operand_len = total_len - 1;
        let operands = match self.memory.fetch_slice(pc + 1, operand_len) {
            Ok(b) => b,
            Err(_) => return self.fault("truncated instruction"),
        };
        let mut next_pc = pc + total_len as u32;

        macro_rules! reg_at {
            ($idx:expr) => {
                match Register::from_index(operands[$idx]) {
                    Some(r) => r,
                    None => return self.fault("bad register index"),
                }
            };
        }

        let result = match opcode {
            isa::OP_NOP => ExecResult::Ok,
            isa::OP_HALT => ExecResult::Halted,
            isa::OP_SYSCALL => {
                self.registers.set(Register::Pc, next_pc);
                let code = operands[0];
                let outcome = host.on_syscall(self, code);
                // PC already advanced; avoid double-advancing below.
                next_pc = self.registers.get(Register::Pc);
                match outcome {
                    SyscallResult::Ok => ExecResult::Ok,
                    SyscallResult::WaitEvent => ExecResult::WaitEvent,
                    SyscallResult::Halt => ExecResult::Halted,
                    SyscallResult::Error => {
                        return self.fault("syscall callback returned Error");
                    }
                }
            }
            isa::OP_LCONS => {
                let reg = reg_at!(0);
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&operands[1..5]);
                self.registers.set(reg, u32::from_le_bytes(buf));
                ExecResult::Ok
            }
            isa::OP_MOV => {
                let ra = reg_at!(0);
                let rb = reg_at!(1);
                self.registers.set(ra, self.registers.get(rb));
                ExecResult::Ok
            }
            isa::OP_PUSH => {
                let ra = reg_at!(0);
                let sp = self.registers.get(Register::Sp);
                let new_sp = sp.wrapping_sub(4);
                if (new_sp & 0xFFFF) < self.stack_base() || new_sp & RAM_FLAG == 0 {
                    return self.fault("stack overflow");
                }
                if let Err(e) = self.memory.write(new_sp, self.registers.get(ra), 4) {
                    return self.fault_for_mem(e);
                }
                self.registers.set(Register::Sp, new_sp);
                ExecResult::Ok
            }
            isa::OP_POP => {
                let ra = reg_at!(0);
                let sp = self.registers.get(Register::Sp);
                if (sp & 0xFFFF) + 4 > self.config.ram_size as u32 {
                    return self.fault("stack underflow");
                }
                let value = match self.memory.read(sp, 4) {
                    Ok(v) => v,
                    Err(e) => return self.fault_for_mem(e),
                };
                self.registers.set(ra, value);
                self.registers.set(Register::Sp, sp.wrapping_add(4));
                ExecResult::Ok
            }
            isa::OP_CALL => {
                let mut buf = [0u8; 2];
                buf.copy_from_slice(&operands[0..2]);
                let addr = u16::from_le_bytes(buf) as u32;
                self.registers.set(Register::Ra, next_pc);
                next_pc = addr;
                ExecResult::Ok
            }
            isa::OP_RET => {
                next_pc = self.registers.get(Register::Ra);
                ExecResult::Ok
            }
            isa::OP_STORE => {
                let ra = reg_at!(0);
                let rb = reg_at!(1);
                let size = operands[2] as usize;
                let addr = self.registers.get(ra);
                let value = self.registers.get(rb);
                if let Err(e) = self.memory.write(addr, value, size) {
                    return self.fault_for_mem(e);
                }
                ExecResult::Ok
            }
            isa::OP_LOAD => {
                let ra = reg_at!(0);
                let rb = reg_at!(1);
                let size = operands[2] as usize;
                let addr = self.registers.get(rb);
                let value = match self.memory.read(addr, size) {
                    Ok(v) => v,
                    Err(e) => return self.fault_for_mem(e),
                };
                self.registers.set(ra, value);
                ExecResult::Ok
            }
            isa::OP_ADD => self.binop(&operands, u32::wrapping_add),
            isa::OP_SUB => self.binop(&operands, u32::wrapping_sub),
            isa::OP_MUL => self.binop(&operands, u32::wrapping_mul),
            isa::OP_DIV => {
                let ra = reg_at!(0);
                let rb = reg_at!(1);
                let divisor = self.registers.get(rb);
                if divisor == 0 {
                    return self.fault("division by zero");
                }
                self.registers
                    .set(ra, self.registers.get(ra) / divisor);
                ExecResult::Ok
            }
            isa::OP_SHIFTL => self.binop(&operands, |a, b| a.wrapping_shl(b & 31)),
            isa::OP_SHIFTR => self.binop(&operands, |a, b| a.wrapping_shr(b & 31)),
            isa::OP_ISHIFTR => self.binop(&operands, |a, b| {
                ((a as i32).wrapping_shr(b & 31)) as u32
            }),
            isa::OP_AND => self.binop(&operands, |a, b| a & b),
            isa::OP_OR => self.binop(&operands, |a, b| a | b),
            isa::OP_XOR => self.binop(&operands, |a, b| a ^ b),
            isa::OP_NOT => {
                let ra = reg_at!(0);
                let rb = reg_at!(1);
                self.registers.set(ra, !self.registers.get(rb));
                ExecResult::Ok
            }
            isa::OP_JUMP => {
                let mut buf = [0u8; 2];
                buf.copy_from_slice(&operands[0..2]);
                next_pc = u16::from_le_bytes(buf) as u32;
                ExecResult::Ok
            }
            isa::OP_JUMPR => {
                let ra = reg_at!(0);
                next_pc = self.registers.get(ra) & 0xFFFF;
                ExecResult::Ok
            }
            isa::OP_SKIPZ | isa::OP_SKIPNZ => {
                let ra = reg_at!(0);
                let value = self.registers.get(ra);
                let take = if opcode == isa::OP_SKIPZ {
                    value == 0
                } else {
                    value != 0
                };
                if take {
                    let next_opcode = match self.memory.fetch_u8(next_pc) {
                        Ok(b) => b,
                        Err(_) => return self.fault("skip target out of bounds"),
                    };
                    let Some(skip_len) = isa::instruction_len(next_opcode) else {
                        return self.fault("skip target has unknown opcode");
                    };
                    next_pc += skip_len as u32;
                }
                ExecResult::Ok
            }
            _ => return self.fault(alloc::format!("unknown opcode {:#04x}", opcode)),
        };

        self.registers.set(Register::Pc, next_pc);
        self.state = result;
        self.state
    }

    fn binop(&mut self, operands: &[u8], f: impl Fn(u32, u32) -> u32) -> ExecResult {
        let ra = match Register::from_index(operands[0]) {
            Some(r) => r,
            None => return ExecResult::Error,
        };
        let rb = match Register::from_index(operands[1]) {
            Some(r) => r,
            None => return ExecResult::Error,
        };
        let value = f(self.registers.get(ra), self.registers.get(rb));
        self.registers.set(ra, value);
        ExecResult::Ok
    }

    fn fault_for_mem(&mut self, e: MemError) -> ExecResult {
        match e {
            MemError::OutOfBounds => self.fault("out-of-bounds memory access"),
            MemError::WriteToRom => self.fault("write to ROM"),
            MemError::InvalidSize => self.fault("invalid load/store size"),
        }
    }

    /// Run until a non-`Ok` result, stopping early (without executing) if
    /// the current instruction's source line carries a breakpoint and at
    /// least one instruction has already executed this call.
    pub fn run(&mut self, host: &mut dyn SyscallHost) -> ExecResult {
        let mut executed_any = false;
        loop {
            if executed_any {
                if let Some(line) = self.current_line() {
                    if self.breakpoints.contains(&line) {
                        return ExecResult::Ok;
                    }
                }
            }
            let result = self.step(host);
            executed_any = true;
            if result != ExecResult::Ok {
                return result;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;

    struct NullHost;
    impl SyscallHost for NullHost {
        fn on_syscall(&mut self, _vm: &mut Chip32, _code: u8) -> SyscallResult {
            SyscallResult::Ok
        }
    }

    fn run_program(src: &str) -> Chip32 {
        let image = assemble(src).unwrap();
        let mut vm = Chip32::new(VmConfig::default());
        vm.initialize(&image);
        let mut host = NullHost;
        vm.run(&mut host);
        vm
    }

    #[test]
    fn minimal_halt() {
        let vm = run_program(".s:\n halt\n");
        assert_eq!(vm.state(), ExecResult::Halted);
        assert_eq!(vm.register(Register::Pc), 1);
    }

    #[test]
    fn load_immediate_and_jump_loops() {
        let image = assemble(".s: lcons r0, 42\n    jump .s\n").unwrap();
        let mut vm = Chip32::new(VmConfig::default());
        vm.initialize(&image);
        let mut host = NullHost;
        vm.step(&mut host);
        vm.step(&mut host);
        assert_eq!(vm.register(Register::R0), 42);
        assert_eq!(vm.register(Register::Pc), 0);
    }

    #[test]
    fn string_constant_syscall_reads_rom_address() {
        struct CaptureHost {
            addr: Option<u32>,
        }
        impl SyscallHost for CaptureHost {
            fn on_syscall(&mut self, vm: &mut Chip32, code: u8) -> SyscallResult {
                if code == 1 {
                    self.addr = Some(vm.register(Register::R0));
                }
                SyscallResult::Ok
            }
        }
        let src = ".s: lcons r0, $msg\n    syscall 1\n    halt\n$msg DC8 \"Hi\", 0\n";
        let image = assemble(src).unwrap();
        let mut vm = Chip32::new(VmConfig::default());
        vm.initialize(&image);
        let mut host = CaptureHost { addr: None };
        vm.run(&mut host);
        let addr = host.addr.unwrap();
        assert_eq!(vm.rom()[addr as usize..addr as usize + 3], [b'H', b'i', 0]);
    }

    #[test]
    fn ram_data_store_sets_flag_bit() {
        let src =
            ".s: lcons r0, $buf\n    lcons r1, 0xAB\n    store @r0, r1, 1\n    halt\n$buf DV8 4\n";
        let vm = run_program(src);
        assert_eq!(vm.ram()[0], 0xAB);
        assert_eq!(vm.register(Register::R0) & RAM_FLAG, RAM_FLAG);
    }

    #[test]
    fn skip_if_zero() {
        let src =
            ".s: lcons r0, 0\n    skipz r0\n    lcons r1, 1\n    lcons r2, 2\n    halt\n";
        let vm = run_program(src);
        assert_eq!(vm.register(Register::R1), 0);
        assert_eq!(vm.register(Register::R2), 2);
    }

    #[test]
    fn division_by_zero_faults() {
        let src = ".s: lcons r0, 5\n    lcons r1, 0\n    div r0, r1\n    halt\n";
        let vm = run_program(src);
        assert_eq!(vm.state(), ExecResult::Error);
        assert_eq!(vm.last_error(), Some("division by zero"));
    }

    #[test]
    fn write_to_rom_faults() {
        let src = ".s: lcons r0, 0\n    lcons r1, 1\n    store @r0, r1, 1\n    halt\n";
        let vm = run_program(src);
        assert_eq!(vm.state(), ExecResult::Error);
    }

    #[test]
    fn determinism_across_runs() {
        let src = ".s: lcons r0, 7\n    add r0, r0\n    halt\n";
        let vm1 = run_program(src);
        let vm2 = run_program(src);
        assert_eq!(vm1.register(Register::R0), vm2.register(Register::R0));
        assert_eq!(vm1.ram(), vm2.ram());
    }

    #[test]
    fn push_pop_round_trip() {
        let src = ".s: lcons r0, 99\n    push r0\n    lcons r0, 0\n    pop r1\n    halt\n";
        let vm = run_program(src);
        assert_eq!(vm.register(Register::R1), 99);
    }

    #[test]
    fn error_state_only_recovers_via_initialize() {
        let image = assemble(".s: lcons r0, 1\n lcons r1, 0\n div r0, r1\n halt\n").unwrap();
        let mut vm = Chip32::new(VmConfig::default());
        vm.initialize(&image);
        let mut host = NullHost;
        vm.run(&mut host);
        assert_eq!(vm.state(), ExecResult::Error);
        let before = vm.register(Register::Pc);
        vm.step(&mut host);
        assert_eq!(vm.register(Register::Pc), before);
        vm.initialize(&image);
        assert_eq!(vm.state(), ExecResult::Ready);
    }
}
