use vm_core::encoding::{describe, inline_mask, pack, sign_extend, Condition, Opcode, OperandSpec};

#[test]
fn negative_inline_immediate_sign_extends_back_to_the_original_value() {
    let packed = pack(
        Condition::Al,
        Opcode::Mov,
        &[OperandSpec::Register(0), OperandSpec::Immediate((-2i32) as u32)],
    );
    assert!(packed.extension.is_none(), "-2 should fit the 15-bit inline field");
    let width = 15;
    let raw = packed.word.bits() & inline_mask(1);
    assert_eq!(sign_extend(raw, width).as_i32(), -2);
}

#[test]
fn describe_formats_registers_and_immediates() {
    let packed = pack(
        Condition::Eq,
        Opcode::Add,
        &[
            OperandSpec::Register(1),
            OperandSpec::Register(2),
            OperandSpec::Register(3),
        ],
    );
    let line = describe(packed.word);
    assert_eq!(line, "add.eq r1 r2 r3");
}

#[test]
fn inline_mask_widths_match_the_documented_table() {
    assert_eq!(inline_mask(0), (1 << 22) - 1);
    assert_eq!(inline_mask(1), (1 << 15) - 1);
    assert_eq!(inline_mask(2), (1 << 8) - 1);
}
