//! End-to-end CPU behavior exercised without going through the assembler —
//! instructions are hand-packed with `vm_core::encoding`.

use vm_core::encoding::{pack, Arity, Condition, Opcode, OperandSpec};
use vm_core::memory::{Memory, MemoryConfig, NullPeripheral, Peripheral};
use vm_core::{Cpu, Status, Word};

fn blank_cpu() -> Cpu<NullPeripheral> {
    Cpu::new(Memory::new(
        MemoryConfig { size: 1024, peripheral_base: 0x8000_0000 },
        NullPeripheral,
    ))
}

#[test]
fn reset_restores_the_documented_post_construction_state() {
    let mut cpu = blank_cpu();
    cpu.load(vec![Word::ZERO; 4], &[1, 2, 3, 4]);
    cpu.reset();
    assert_eq!(cpu.pc(), 0);
    for reg in cpu.registers().all() {
        assert_eq!(reg.bits(), 0);
    }
}

#[test]
fn conditional_skip_advances_past_the_extension_word_too() {
    // jmp.eq <a target exactly at the inline mask, which always forces an extension word>; nop
    let far = vm_core::encoding::inline_mask(0);
    let jmp = pack(Condition::Eq, Opcode::Jmp, &[OperandSpec::Immediate(far)]);
    assert!(jmp.extension.is_some());
    let nop = pack(Condition::Al, Opcode::Nop, &[]);
    let mut cpu = blank_cpu();
    cpu.load(vec![jmp.word, jmp.extension.unwrap(), nop.word], &[]);
    // EQUAL flag is clear on reset, so the conditional jump does not fire.
    let (status, completed) = cpu.cycle(2);
    assert_eq!(status, Status::Success);
    assert!(completed);
    assert_eq!(cpu.pc(), 3);
}

#[derive(Default)]
struct RecordingPeripheral {
    writes: Vec<(u32, Word)>,
    last_write: Word,
}

impl Peripheral for RecordingPeripheral {
    fn read(&mut self, _addr: u32) -> Word {
        self.last_write
    }
    fn write(&mut self, addr: u32, value: Word) {
        self.writes.push((addr, value));
        self.last_write = value;
    }
}

#[test]
fn store_then_load_round_trips_through_the_peripheral_window() {
    let base = 0x8000_0000u32;
    let mov = pack(Condition::Al, Opcode::Mov, &[OperandSpec::Register(0), OperandSpec::Immediate(0xDEAD_BEEF)]);
    let str_ = pack(
        Condition::Al,
        Opcode::Str,
        &[OperandSpec::Register(0), OperandSpec::Immediate(base), OperandSpec::Register(1)],
    );
    let ldr = pack(
        Condition::Al,
        Opcode::Ldr,
        &[OperandSpec::Register(2), OperandSpec::Immediate(base), OperandSpec::Register(1)],
    );
    let mut words = vec![mov.word];
    words.extend(mov.extension);
    words.push(str_.word);
    words.extend(str_.extension);
    words.push(ldr.word);
    words.extend(ldr.extension);

    let mut cpu = Cpu::new(Memory::new(
        MemoryConfig { size: 256, peripheral_base: base },
        RecordingPeripheral::default(),
    ));
    cpu.load(words, &[]);
    let (status, _) = cpu.cycle(3);
    assert_eq!(status, Status::Success);
    assert_eq!(cpu.registers().get(2).bits(), 0xDEAD_BEEF);
}

#[test]
fn interrupt_pushes_return_address_and_jumps() {
    let mut cpu = blank_cpu();
    // main: nop; nop; nop (interrupt fires before the first fetch)
    let nop = pack(Condition::Al, Opcode::Nop, &[]).word;
    let mov = pack(Condition::Al, Opcode::Mov, &[OperandSpec::Register(0), OperandSpec::Immediate(0x1234)]);
    let ret = pack(Condition::Al, Opcode::Ret, &[]).word;
    let mut words = vec![nop, nop, nop]; // main stream, isr target appended after
    let isr_index = words.len() as u32;
    words.push(mov.word);
    words.extend(mov.extension);
    words.push(ret);

    cpu.load(words, &[]);
    assert!(cpu.interrupt(isr_index));
    let (status, _) = cpu.cycle(2);
    assert_eq!(status, Status::Success);
    assert_eq!(cpu.registers().get(0).bits(), 0x1234);
    // the isr's RET should have restored pc to 0 (the saved return address)
    assert_eq!(cpu.pc(), 0);
}

#[test]
fn out_of_range_store_latches_segfault_at_the_next_boundary() {
    let str_ = pack(
        Condition::Al,
        Opcode::Str,
        &[OperandSpec::Register(0), OperandSpec::Immediate(10_000), OperandSpec::Register(1)],
    );
    let mut words = vec![str_.word];
    words.extend(str_.extension);
    words.push(pack(Condition::Al, Opcode::Nop, &[]).word);

    let mut cpu = blank_cpu();
    cpu.load(words, &[]);

    // The faulting STR still completes: PC advances past it (and its
    // extension word) and the budget is reported as fully consumed.
    let (status, completed) = cpu.cycle(1);
    assert_eq!(status, Status::Success);
    assert!(completed);
    assert_eq!(cpu.pc(), 2);

    // The fault surfaces at the next cycle boundary, before the NOP runs.
    let (status, completed) = cpu.cycle(1);
    assert_eq!(status, Status::Segfault);
    assert!(!completed);
    assert_eq!(cpu.pc(), 2);
}

#[test]
fn unknown_opcode_bits_trap_missing_instruction() {
    // Bits in the opcode range above the last defined opcode (36 = STRB).
    let bits = (0u32 << 29) | (63u32 << 23);
    let mut cpu = blank_cpu();
    cpu.load(vec![Word::from_bits(bits)], &[]);
    let (status, _) = cpu.cycle(1);
    assert_eq!(status, Status::MissingInstruction);
}

#[test]
fn thirty_third_pending_interrupt_is_dropped_without_state_change() {
    let mut cpu = blank_cpu();
    cpu.load(vec![pack(Condition::Al, Opcode::Nop, &[]).word], &[]);
    for i in 0..32 {
        assert!(cpu.interrupt(i));
    }
    assert!(!cpu.interrupt(999));
}

#[test]
fn decode_roundtrips_every_inline_mask_as_a_forced_extension() {
    for slot in 0..Arity::Three.count() {
        let mask = vm_core::encoding::inline_mask(slot);
        let opcode = match slot {
            0 => Opcode::Jmp,
            1 => Opcode::Mov,
            _ => Opcode::Add,
        };
        let operands: Vec<OperandSpec> = (0..=slot)
            .map(|i| {
                if i == slot {
                    OperandSpec::Immediate(mask)
                } else {
                    OperandSpec::Register(0)
                }
            })
            .collect();
        let packed = pack(Condition::Al, opcode, &operands);
        assert_eq!(packed.extension, Some(Word::from_bits(mask)));
    }
}
