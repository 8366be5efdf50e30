//! Pass A/B/C address assignment and final word-stream emission.

use vm_core::encoding::{self, OperandSpec};
use vm_core::Word;

use crate::ir::{DataWord, Instruction, IsrDirective, Operand};
use crate::symbol::{SymbolKind, SymbolTable};

/// The result of a successful assembly: a word stream ready for
/// `Cpu::load`, the initial data image, the entry point, and the final
/// symbol table (final addresses, not Pass-A IR indices) for callers that
/// need to locate a label after assembly — e.g. a test driving an
/// interrupt at a named handler.
#[derive(Debug)]
pub struct Image {
    pub instructions: Vec<Word>,
    pub data: Vec<u8>,
    pub entry: u32,
    pub symbols: SymbolTable,
}

pub fn generate(
    mut instructions: Vec<Instruction>,
    data_words: &[DataWord],
    isr_directives: &[IsrDirective],
    mut symbols: SymbolTable,
    memory_size: u32,
) -> Result<Image, Vec<String>> {
    let mut errors = Vec::new();

    let data = build_data_image(data_words, memory_size, &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    pass_a(&mut instructions);

    pass_b(&mut instructions, &mut symbols, &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    rewrite_isr_stubs(&mut instructions, isr_directives, &symbols, &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    let Some(main) = symbols.get("main") else {
        errors.push("program has no 'main' symbol".to_string());
        return Err(errors);
    };
    let entry = main.value.as_u32();

    Ok(Image { instructions: emit(&instructions), data, entry, symbols })
}

fn build_data_image(data_words: &[DataWord], memory_size: u32, errors: &mut Vec<String>) -> Vec<u8> {
    let size = data_words.iter().map(|w| w.address + 4).max().unwrap_or(0);
    if size > memory_size {
        errors.push(format!("data image of {size} bytes does not fit in {memory_size} bytes of memory"));
        return Vec::new();
    }
    let mut data = vec![0u8; size as usize];
    for word in data_words {
        let start = word.address as usize;
        data[start..start + 4].copy_from_slice(&word.value.to_le_bytes());
    }
    data
}

/// Conservative layout: assigns each instruction a provisional address and
/// decides whether non-label immediates need an extension word. Label
/// immediates are deferred to Pass B since their targets aren't addressed
/// yet.
fn pass_a(instructions: &mut [Instruction]) {
    let mut cursor: u32 = 0;
    for instruction in instructions.iter_mut() {
        instruction.address = Some(cursor);
        instruction.extra = match instruction.immediate_slot() {
            None => 0,
            Some(slot) => match &instruction.operands[slot] {
                Operand::ImmediateLabel(_) => 0,
                Operand::ImmediateLiteral { value, is_float } => {
                    if *is_float || !encoding::fits_inline(value.as_u32(), slot) {
                        instruction.extension_value = Some(*value);
                        1
                    } else {
                        0
                    }
                }
                Operand::Register(_) => unreachable!("immediate_slot only finds non-register operands"),
            },
        };
        cursor += 1 + instruction.extra as u32;
    }
}

/// Label resolution. Spec describes this as a single sweep with a shared
/// "growth" counter, but a single forward sweep can under-count: a forward
/// reference's target address may still be revised upward by instructions
/// *between* the reference and the target that the sweep hasn't reached
/// yet. Instead this lays addresses out and re-checks every label
/// reference against them repeatedly until nothing changes — `extra` only
/// ever flips 0 to 1, so this is bounded by the instruction count and
/// converges to the same fixed point the spec's growth counter is
/// chasing, just without the undercount.
fn pass_b(instructions: &mut [Instruction], symbols: &mut SymbolTable, errors: &mut Vec<String>) {
    if !validate_label_references(instructions, symbols, errors) {
        return;
    }

    loop {
        relay_addresses(instructions);

        let mut changed = false;
        for i in 0..instructions.len() {
            let Some(slot) = instructions[i].immediate_slot() else { continue };
            let Operand::ImmediateLabel(name) = &instructions[i].operands[slot] else { continue };
            let target_ir_index = symbols
                .get(name)
                .and_then(|s| s.ir_index)
                .expect("validate_label_references already confirmed this is a defined label");
            let target_address = instructions[target_ir_index]
                .address
                .expect("relay_addresses just assigned every instruction an address");

            // Same rule as a packed literal immediate: the field is read
            // back sign-extended at run time, so a label only fits inline
            // if its address round-trips through that same sign extension.
            if !encoding::fits_inline(target_address, slot) && instructions[i].extra == 0 {
                instructions[i].extra = 1;
                changed = true;
            }
            instructions[i].extension_value = Some(Word::from_bits(target_address));
        }

        if !changed {
            break;
        }
    }

    publish_label_addresses(instructions, symbols);
}

fn validate_label_references(
    instructions: &[Instruction],
    symbols: &SymbolTable,
    errors: &mut Vec<String>,
) -> bool {
    let before = errors.len();
    for instruction in instructions {
        let Some(slot) = instruction.immediate_slot() else { continue };
        let Operand::ImmediateLabel(name) = &instruction.operands[slot] else { continue };
        match symbols.get(name) {
            None => errors.push(format!("line {}: undefined symbol '{name}'", instruction.line)),
            Some(symbol) if symbol.ir_index.is_none() => {
                errors.push(format!("line {}: '{name}' is not a label", instruction.line));
            }
            Some(_) => {}
        }
    }
    errors.len() == before
}

fn relay_addresses(instructions: &mut [Instruction]) {
    let mut cursor: u32 = 0;
    for instruction in instructions.iter_mut() {
        instruction.address = Some(cursor);
        cursor += 1 + instruction.extra as u32;
    }
}

fn publish_label_addresses(instructions: &[Instruction], symbols: &mut SymbolTable) {
    let labels: Vec<String> = symbols
        .names()
        .filter(|name| symbols.get(name).map(|s| s.kind) == Some(SymbolKind::Label))
        .cloned()
        .collect();
    for name in labels {
        let ir_index = symbols
            .get(&name)
            .and_then(|s| s.ir_index)
            .expect("just filtered to symbols with SymbolKind::Label, which always carries ir_index");
        let address = instructions[ir_index].address.expect("every instruction has an address by now");
        symbols.get_mut(&name).expect("name came from this same table").value = Word::from_bits(address);
    }
}

/// For each `.isr TARGET REPLACEMENT`: if TARGET's instruction already
/// carries an extension word, or REPLACEMENT's address doesn't fit in a
/// single-operand inline field, assembly fails; otherwise TARGET's
/// immediate is overwritten to jump straight to REPLACEMENT.
fn rewrite_isr_stubs(
    instructions: &mut [Instruction],
    isr_directives: &[IsrDirective],
    symbols: &SymbolTable,
    errors: &mut Vec<String>,
) {
    for isr in isr_directives {
        let Some(target) = symbols.get(&isr.target) else {
            errors.push(format!("line {}: undefined symbol '{}'", isr.line, isr.target));
            continue;
        };
        let Some(target_ir_index) = target.ir_index else {
            errors.push(format!("line {}: '{}' is not a label", isr.line, isr.target));
            continue;
        };
        let Some(replacement) = symbols.get(&isr.replacement) else {
            errors.push(format!("line {}: undefined symbol '{}'", isr.line, isr.replacement));
            continue;
        };
        if replacement.ir_index.is_none() {
            errors.push(format!("line {}: '{}' is not a label", isr.line, isr.replacement));
            continue;
        }
        let replacement_address = replacement.value.as_u32();

        let stub = &mut instructions[target_ir_index];
        let Some(slot) = stub.immediate_slot() else {
            errors.push(format!("line {}: '{}' has no immediate operand to redirect", isr.line, isr.target));
            continue;
        };
        if stub.extra != 0 || !encoding::fits_inline(replacement_address, slot) {
            errors.push(format!("line {}: stub address too large", isr.line));
            continue;
        }
        stub.operands[slot] =
            Operand::ImmediateLiteral { value: Word::from_bits(replacement_address), is_float: false };
    }
}

fn emit(instructions: &[Instruction]) -> Vec<Word> {
    let mut words = Vec::new();
    for instruction in instructions {
        let operands: Vec<OperandSpec> = instruction
            .operands
            .iter()
            .map(|operand| match operand {
                Operand::Register(r) => OperandSpec::Register(*r),
                Operand::ImmediateLiteral { value, .. } => OperandSpec::Immediate(value.as_u32()),
                Operand::ImmediateLabel(_) => {
                    OperandSpec::Immediate(instruction.extension_value.unwrap_or(Word::ZERO).as_u32())
                }
            })
            .collect();
        let packed = encoding::pack(instruction.condition, instruction.opcode, &operands);
        words.push(packed.word);
        if instruction.extra == 1 {
            words.push(packed.extension.unwrap_or_else(|| instruction.extension_value.unwrap_or(Word::ZERO)));
        }
    }
    words
}
