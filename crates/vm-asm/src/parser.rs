//! Two-pass parse: labels and instruction counts first, then directives
//! and instructions resolved against the symbol table.

use vm_core::encoding::{Condition, Opcode};
use vm_core::Word;

use crate::ir::{DataWord, Instruction, IsrDirective, Operand};
use crate::lexer::{split_lines, RawLine};
use crate::symbol::{Symbol, SymbolKind, SymbolTable};
use crate::token::{classify_leading, classify_operand, Token};

pub struct ParseOutput {
    pub instructions: Vec<Instruction>,
    pub data_words: Vec<DataWord>,
    pub isr_directives: Vec<IsrDirective>,
    pub symbols: SymbolTable,
    pub data_size: u32,
}

pub fn parse(source: &str) -> Result<ParseOutput, Vec<String>> {
    let lines = split_lines(source);
    let mut symbols = SymbolTable::with_registers();
    let mut errors = Vec::new();

    first_pass(&lines, &mut symbols, &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    let (instructions, data_words, isr_directives, data_size) =
        second_pass(&lines, &mut symbols, &mut errors);

    if errors.is_empty() {
        Ok(ParseOutput { instructions, data_words, isr_directives, symbols, data_size })
    } else {
        Err(errors)
    }
}

/// Splits off a leading `name:` label token, if present, so a line like
/// `main: nop` is a label definition followed by an ordinary statement
/// rather than the instruction silently being swallowed by the label.
fn split_label(words: &[String]) -> (Option<&str>, &[String]) {
    match words.first() {
        Some(first) => match classify_leading(first) {
            Token::LabelDef(_) => (Some(first.trim_end_matches(':')), &words[1..]),
            _ => (None, words),
        },
        None => (None, words),
    }
}

fn first_pass(lines: &[RawLine], symbols: &mut SymbolTable, errors: &mut Vec<String>) {
    let mut ir_index = 0usize;
    for line in lines {
        let (label, rest) = split_label(&line.words);
        if let Some(name) = label {
            if let Err(e) = symbols.define(name, Symbol::label(ir_index)) {
                errors.push(format!("line {}: {e}", line.number));
            }
        }
        let Some(first) = rest.first() else { continue };
        match classify_leading(first) {
            Token::LabelDef(_) => {
                errors.push(format!("line {}: a second label on the same line is not supported", line.number));
            }
            Token::Directive(_) => {}
            Token::Mnemonic { .. } => ir_index += 1,
            Token::IntLiteral(_) | Token::FloatLiteral(_) | Token::Identifier(_) => {
                errors.push(format!(
                    "line {}: expected a label, directive, or instruction",
                    line.number
                ));
            }
        }
    }
}

#[allow(clippy::too_many_lines)]
fn second_pass(
    lines: &[RawLine],
    symbols: &mut SymbolTable,
    errors: &mut Vec<String>,
) -> (Vec<Instruction>, Vec<DataWord>, Vec<IsrDirective>, u32) {
    let mut instructions = Vec::new();
    let mut data_words = Vec::new();
    let mut isr_directives = Vec::new();
    let mut data_cursor: u32 = 0;

    for line in lines {
        let (_, rest) = split_label(&line.words);
        let Some(first) = rest.first() else { continue };
        match classify_leading(first) {
            Token::LabelDef(_) => {}
            Token::Directive(name) => match name.as_str() {
                "const" => parse_const(line, rest, symbols, errors),
                "word" => parse_word(line, rest, symbols, &mut data_words, &mut data_cursor, errors),
                "isr" => parse_isr(line, rest, &mut isr_directives, errors),
                other => errors.push(format!("line {}: unknown directive '.{other}'", line.number)),
            },
            Token::Mnemonic { name, condition } => {
                parse_instruction(line, rest, &name, condition.as_deref(), symbols, &mut instructions, errors);
            }
            Token::IntLiteral(_) | Token::FloatLiteral(_) | Token::Identifier(_) => unreachable!(
                "first pass already rejected lines not starting with a label, directive, or mnemonic"
            ),
        }
    }

    (instructions, data_words, isr_directives, data_cursor)
}

fn parse_const(line: &RawLine, statement: &[String], symbols: &mut SymbolTable, errors: &mut Vec<String>) {
    if statement.len() != 3 {
        errors.push(format!("line {}: .const expects NAME VALUE", line.number));
        return;
    }
    let name = &statement[1];
    let (value, is_float) = match classify_operand(&statement[2]) {
        Token::IntLiteral(i) => (Word::from_i32(i as i32), false),
        Token::FloatLiteral(f) => (Word::from_f32(f), true),
        _ => {
            errors.push(format!("line {}: .const value must be a literal", line.number));
            return;
        }
    };
    if let Err(e) = symbols.define(name, Symbol::constant(value, is_float)) {
        errors.push(format!("line {}: {e}", line.number));
    }
}

fn parse_word(
    line: &RawLine,
    statement: &[String],
    symbols: &mut SymbolTable,
    data_words: &mut Vec<DataWord>,
    cursor: &mut u32,
    errors: &mut Vec<String>,
) {
    if statement.len() != 3 {
        errors.push(format!("line {}: .word expects NAME VALUE", line.number));
        return;
    }
    let name = &statement[1];
    let (value, is_float) = match classify_operand(&statement[2]) {
        Token::IntLiteral(i) => (Word::from_i32(i as i32), false),
        Token::FloatLiteral(f) => (Word::from_f32(f), true),
        _ => {
            errors.push(format!("line {}: .word value must be a literal", line.number));
            return;
        }
    };
    let address = *cursor;
    if let Err(e) = symbols.define(name, Symbol::literal(Word::from_bits(address), false)) {
        errors.push(format!("line {}: {e}", line.number));
        return;
    }
    data_words.push(DataWord { name: name.clone(), value, is_float, address, line: line.number });
    *cursor += 4;
}

fn parse_isr(line: &RawLine, statement: &[String], isr_directives: &mut Vec<IsrDirective>, errors: &mut Vec<String>) {
    if statement.len() != 3 {
        errors.push(format!("line {}: .isr expects TARGET REPLACEMENT", line.number));
        return;
    }
    isr_directives.push(IsrDirective {
        target: statement[1].clone(),
        replacement: statement[2].clone(),
        line: line.number,
    });
}

#[allow(clippy::too_many_arguments)]
fn parse_instruction(
    line: &RawLine,
    statement: &[String],
    mnemonic: &str,
    condition: Option<&str>,
    symbols: &SymbolTable,
    instructions: &mut Vec<Instruction>,
    errors: &mut Vec<String>,
) {
    let Some(opcode) = Opcode::from_mnemonic(mnemonic) else {
        errors.push(format!("line {}: unknown instruction '{mnemonic}'", line.number));
        return;
    };
    let condition = match condition {
        None => Condition::Al,
        Some(suffix) => match Condition::from_suffix(suffix) {
            Some(c) => c,
            None => {
                errors.push(format!("line {}: unknown condition '.{suffix}'", line.number));
                return;
            }
        },
    };

    let operand_tokens = &statement[1..];
    let min = opcode.min_operands();
    let max = opcode.arity().count();
    if operand_tokens.len() < min || operand_tokens.len() > max {
        errors.push(format!(
            "line {}: '{mnemonic}' expects {} operand(s), found {}",
            line.number,
            if min == max { min.to_string() } else { format!("{min}-{max}") },
            operand_tokens.len()
        ));
        return;
    }

    let mut operands = Vec::with_capacity(operand_tokens.len());
    for token_text in operand_tokens {
        match classify_operand(token_text) {
            Token::IntLiteral(i) => {
                operands.push(Operand::ImmediateLiteral { value: Word::from_i32(i as i32), is_float: false });
            }
            Token::FloatLiteral(f) => {
                operands.push(Operand::ImmediateLiteral { value: Word::from_f32(f), is_float: true });
            }
            Token::Identifier(name) => match symbols.get(&name) {
                None => {
                    errors.push(format!("line {}: undefined symbol '{name}'", line.number));
                    return;
                }
                Some(symbol) => match symbol.kind {
                    SymbolKind::Register => {
                        operands.push(Operand::Register(symbol.value.as_u32() as u8));
                    }
                    SymbolKind::Label => operands.push(Operand::ImmediateLabel(name)),
                    SymbolKind::Literal | SymbolKind::Constant => {
                        operands.push(Operand::ImmediateLiteral { value: symbol.value, is_float: symbol.is_float });
                    }
                },
            },
            Token::Mnemonic { .. } | Token::LabelDef(_) | Token::Directive(_) => {
                errors.push(format!("line {}: '{token_text}' is not a valid operand", line.number));
                return;
            }
        }
    }

    // At most one operand may be an immediate: once a slot is immediate,
    // the bit layout cannot separately encode anything after it.
    let immediate_slots = operands.iter().filter(|o| o.is_immediate()).count();
    if immediate_slots > 1 {
        errors.push(format!(
            "line {}: '{mnemonic}' has more than one immediate operand, which the encoding cannot represent",
            line.number
        ));
        return;
    }

    instructions.push(Instruction::new(opcode, condition, operands, line.number));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registers_labels_and_constants() {
        let source = "\
.const answer 42
main: mov r0 answer
jmp main
";
        let out = parse(source).expect("parses");
        assert_eq!(out.instructions.len(), 2);
        assert_eq!(out.symbols.get("main").unwrap().ir_index, Some(0));
        match &out.instructions[0].operands[1] {
            Operand::ImmediateLiteral { value, is_float } => {
                assert_eq!(value.as_i32(), 42);
                assert!(!is_float);
            }
            other => panic!("expected immediate literal, got {other:?}"),
        }
    }

    #[test]
    fn ldr_accepts_the_two_operand_shorthand() {
        let source = ".word x 33\nmain: ldr r0 x\n";
        let out = parse(source).expect("parses");
        assert_eq!(out.instructions[0].operands.len(), 2);
    }

    #[test]
    fn missing_main_is_not_a_parse_error_here_but_undefined_symbols_are() {
        let source = "main: mov r0 undefined_thing\n";
        let result = parse(source);
        assert!(result.is_err());
    }

    #[test]
    fn word_directive_reserves_four_bytes_and_advances_the_cursor() {
        let source = ".word a 1\n.word b 2\nmain: nop\n";
        let out = parse(source).expect("parses");
        assert_eq!(out.data_words[0].address, 0);
        assert_eq!(out.data_words[1].address, 4);
        assert_eq!(out.data_size, 8);
    }
}
