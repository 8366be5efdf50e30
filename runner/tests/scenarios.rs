//! End-to-end scenarios: assemble a program, load it, run it, and check
//! the terminal status and register state the way a user of this crate
//! would.

use runner::SamplePeripheral;
use vm_asm::Assembler;
use vm_core::{Cpu, Memory, MemoryConfig, Status};

const PERIPHERAL_BASE: u32 = 0x8000_0000;
const MEMORY_SIZE: u32 = 1024;

fn run(source: &str, budget: u32) -> (Cpu<SamplePeripheral>, Status) {
    let image = Assembler::new(MEMORY_SIZE).assemble(source).expect("assembles");
    let memory = Memory::new(
        MemoryConfig { size: MEMORY_SIZE as usize, peripheral_base: PERIPHERAL_BASE },
        SamplePeripheral::default(),
    );
    let mut cpu = Cpu::new(memory);
    cpu.load(image.instructions, &image.data);
    cpu.set_pc(image.entry as usize);
    let (status, _completed) = cpu.cycle(budget);
    (cpu, status)
}

#[test]
fn scenario_1_neither_trap_branch_is_taken_and_execution_runs_off_the_end() {
    let source = "\
main: mov r0 42
cmpi r0 42
jmp.ne 1001
mov r0 -1
mov r1 2
cmpi r0 r1
jmp.ge 1005
";
    let (cpu, status) = run(source, 100);
    assert_eq!(status, Status::OutOfInstructions);
    assert!(cpu.pc() >= 7, "pc should be past the last instruction, got {}", cpu.pc());
}

#[test]
fn scenario_2_loads_a_word_directive_and_compares_equal() {
    let source = "\
.word x 33
main: ldr r0 x
cmpi r0 33
jmp.ne 1003
";
    let (cpu, status) = run(source, 100);
    assert_ne!(status, Status::BadInstruction);
    assert_ne!(status, Status::Segfault);
    assert_eq!(cpu.registers().get(0).as_i32(), 33);
}

#[test]
fn scenario_3_float_addition_matches_the_expected_sum() {
    let source = "\
main: mov r0 0.25
mov r1 0.5
addf r2 r0 r1
cmpf r2 0.75
jmp.ne 1010
";
    let (cpu, status) = run(source, 100);
    assert_ne!(status, Status::BadInstruction);
    assert_ne!(status, Status::Segfault);
    assert_eq!(cpu.registers().get(2).as_f32(), 0.75);
}

#[test]
fn scenario_4_peripheral_round_trips_a_written_word() {
    let source = "\
main: mov r0 0xdeadbeef
str r0 0xbeefdead
ldr r1 0xbeefdead
";
    let (cpu, status) = run(source, 100);
    assert_eq!(status, Status::OutOfInstructions);
    assert_eq!(cpu.registers().get(1).bits(), 0xdead_beef);
}

#[test]
fn scenario_5_isr_redirect_runs_the_replacement_handler_and_returns() {
    let source = "\
main: nop
loop: jmp loop
isr_entry: jmp isr_stub
isr_stub: ret
.isr isr_entry my_handler
my_handler: mov r0 0x12345678
ret
";
    let image = Assembler::new(MEMORY_SIZE).assemble(source).expect("assembles");
    let loop_address = image.symbols.get("loop").expect("loop is defined").value.as_u32();
    let isr_entry_address = image.symbols.get("isr_entry").expect("isr_entry is defined").value.as_u32();

    let memory = Memory::new(
        MemoryConfig { size: MEMORY_SIZE as usize, peripheral_base: PERIPHERAL_BASE },
        SamplePeripheral::default(),
    );
    let mut cpu = Cpu::new(memory);
    cpu.load(image.instructions, &image.data);
    cpu.set_pc(loop_address as usize);

    assert!(cpu.interrupt(isr_entry_address));
    let (status, completed) = cpu.cycle(3);
    assert!(completed, "expected to stay within budget, got {status}");
    assert_eq!(cpu.registers().get(0).bits(), 0x1234_5678);
    assert_eq!(cpu.pc(), loop_address as usize);
}

#[test]
fn scenario_6_division_by_zero_traps() {
    let source = "\
main: mov r0 5
mov r1 0
div r2 r0 r1
";
    let (_cpu, status) = run(source, 100);
    assert_eq!(status, Status::DivisionByZero);
}
