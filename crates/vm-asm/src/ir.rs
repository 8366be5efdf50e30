//! The instruction IR that the parser builds and the code generator lays
//! out, and the data-image side-table from `.word` directives.

use vm_core::encoding::{Condition, Opcode};
use vm_core::Word;

/// One operand of an IR instruction. Registers are resolved at parse time
/// (the symbol table tells us the index immediately); an immediate may
/// still be a forward-referenced label, which the generator resolves.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(u8),
    ImmediateLiteral { value: Word, is_float: bool },
    ImmediateLabel(String),
}

impl Operand {
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        !matches!(self, Self::Register(_))
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub condition: Condition,
    pub operands: Vec<Operand>,
    pub line: usize,
    /// Assigned by Pass A/B: the word-stream address of this instruction.
    pub address: Option<u32>,
    /// Assigned by Pass A/B: 0 or 1 extension words.
    pub extra: usize,
    /// The literal value to emit as the extension word, once known. Absent
    /// for instructions with no immediate, or an inline-only immediate.
    pub extension_value: Option<Word>,
}

impl Instruction {
    #[must_use]
    pub fn new(opcode: Opcode, condition: Condition, operands: Vec<Operand>, line: usize) -> Self {
        Self { opcode, condition, operands, line, address: None, extra: 0, extension_value: None }
    }

    /// The slot index (position within `operands`, not the opcode's
    /// nominal arity) of the first immediate operand, if any.
    #[must_use]
    pub fn immediate_slot(&self) -> Option<usize> {
        self.operands.iter().position(Operand::is_immediate)
    }
}

#[derive(Debug, Clone)]
pub struct DataWord {
    pub name: String,
    pub value: Word,
    pub is_float: bool,
    pub address: u32,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct IsrDirective {
    pub target: String,
    pub replacement: String,
    pub line: usize,
}
