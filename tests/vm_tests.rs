//! Integration tests for the Chip32 interpreter: the assembler-to-VM
//! pipeline end to end, plus determinism as a property.

use chip32_core::assembler::isa::Register;
use chip32_core::vm::VmConfig;
use chip32_core::{assemble, Chip32, ExecResult, SyscallHost, SyscallResult};
use proptest::prelude::*;

struct NullHost;
impl SyscallHost for NullHost {
    fn on_syscall(&mut self, _vm: &mut Chip32, _code: u8) -> SyscallResult {
        SyscallResult::Ok
    }
}

fn run(src: &str) -> Chip32 {
    let image = assemble(src).unwrap();
    let mut vm = Chip32::new(VmConfig::default());
    vm.initialize(&image);
    let mut host = NullHost;
    vm.run(&mut host);
    vm
}

#[test]
fn minimal_halt_scenario() {
    let vm = run(".s:\n halt\n");
    assert_eq!(vm.state(), ExecResult::Halted);
    assert_eq!(vm.register(Register::Pc), 1);
}

#[test]
fn syscall_can_request_a_wait_and_resume() {
    struct GateHost {
        first: bool,
    }
    impl SyscallHost for GateHost {
        fn on_syscall(&mut self, vm: &mut Chip32, _code: u8) -> SyscallResult {
            if self.first {
                self.first = false;
                SyscallResult::WaitEvent
            } else {
                vm.set_register(Register::R0, 7);
                SyscallResult::Ok
            }
        }
    }
    let image = assemble(".s: syscall 3\n    halt\n").unwrap();
    let mut vm = Chip32::new(VmConfig::default());
    vm.initialize(&image);
    let mut host = GateHost { first: true };
    let result = vm.run(&mut host);
    assert_eq!(result, ExecResult::WaitEvent);
    let result = vm.run(&mut host);
    assert_eq!(result, ExecResult::Halted);
    assert_eq!(vm.register(Register::R0), 7);
}

#[test]
fn store_with_a_size_outside_1_2_4_faults_instead_of_panicking() {
    let src = ".s: lcons r0, 0x80000000\n    store @r0, r1, 200\n    halt\n";
    let vm = run(src);
    assert_eq!(vm.state(), ExecResult::Error);
}

#[test]
fn breakpoint_stops_run_before_executing_its_line() {
    let src = ".s: lcons r0, 1\n    lcons r1, 2\n    lcons r2, 3\n    halt\n";
    let image = assemble(src).unwrap();
    let mut vm = Chip32::new(VmConfig::default());
    vm.initialize(&image);
    vm.set_breakpoint(3);
    let mut host = NullHost;
    let result = vm.run(&mut host);
    assert_eq!(result, ExecResult::Ok);
    assert_eq!(vm.current_line(), Some(3));
    assert_eq!(vm.register(Register::R2), 0);
    let result = vm.run(&mut host);
    assert_eq!(result, ExecResult::Halted);
    assert_eq!(vm.register(Register::R2), 3);
}

proptest! {
    #[test]
    fn determinism_across_identical_runs(a in 0u32..1000, b in 1u32..1000) {
        let src = format!(
            ".s: lcons r0, {a}\n    lcons r1, {b}\n    div r0, r1\n    mul r0, r1\n    halt\n"
        );
        let vm1 = run(&src);
        let vm2 = run(&src);
        prop_assert_eq!(vm1.register(Register::R0), vm2.register(Register::R0));
        prop_assert_eq!(vm1.ram().to_vec(), vm2.ram().to_vec());
        prop_assert_eq!(vm1.state(), vm2.state());
    }

    #[test]
    fn add_is_reflected_in_register_value(a in 0u32..1_000_000, b in 0u32..1_000_000) {
        let src = format!(".s: lcons r0, {a}\n    lcons r1, {b}\n    add r0, r1\n    halt\n");
        let vm = run(&src);
        prop_assert_eq!(vm.register(Register::R0), a.wrapping_add(b));
    }
}
