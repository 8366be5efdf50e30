//! The symbol table: labels, constants, data words, and the pre-populated
//! register names.

use std::collections::HashMap;

use vm_core::encoding::{BP_INDEX, NUM_REGISTERS, SP_INDEX};
use vm_core::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Literal,
    Constant,
    Register,
}

#[derive(Debug, Clone, Copy)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub value: Word,
    /// For `Label`: the index of the IR instruction it names. Starts as
    /// the Pass-A position; code generation overwrites `value` with the
    /// final word-stream address once growth is known.
    pub ir_index: Option<usize>,
    /// Whether `value`'s bits are a float pattern — a `Literal`/`Constant`
    /// symbol carries this through to operand resolution so code
    /// generation's "immediate is float" rule still applies by name.
    pub is_float: bool,
}

impl Symbol {
    #[must_use]
    pub const fn register(index: u8) -> Self {
        Self { kind: SymbolKind::Register, value: Word::from_bits(index as u32), ir_index: None, is_float: false }
    }

    #[must_use]
    pub const fn label(ir_index: usize) -> Self {
        Self { kind: SymbolKind::Label, value: Word::ZERO, ir_index: Some(ir_index), is_float: false }
    }

    #[must_use]
    pub const fn literal(value: Word, is_float: bool) -> Self {
        Self { kind: SymbolKind::Literal, value, ir_index: None, is_float }
    }

    #[must_use]
    pub const fn constant(value: Word, is_float: bool) -> Self {
        Self { kind: SymbolKind::Constant, value, ir_index: None, is_float }
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    #[must_use]
    pub fn with_registers() -> Self {
        let mut symbols = HashMap::new();
        for i in 0..NUM_REGISTERS {
            symbols.insert(format!("r{i}"), Symbol::register(i));
        }
        symbols.insert("sp".to_string(), Symbol::register(SP_INDEX));
        symbols.insert("bp".to_string(), Symbol::register(BP_INDEX));
        Self { symbols }
    }

    pub fn define(&mut self, name: &str, symbol: Symbol) -> Result<(), String> {
        if self.symbols.contains_key(name) {
            return Err(format!("redefinition of symbol '{name}'"));
        }
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.symbols.get_mut(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.symbols.keys()
    }
}
