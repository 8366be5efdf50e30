//! A small "poke a named path, get a value back" query surface, in the
//! style of the teacher's `emu_core::Observable` trait — lets the runner
//! and tests inspect CPU state by name instead of reaching into fields.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Word(u32),
    Bool(bool),
    Status(crate::trap::Status),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(w) => write!(f, "{w:#010x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Status(s) => write!(f, "{s}"),
        }
    }
}

/// Implemented by `Cpu` so callers can inspect named state without a
/// direct field reference.
pub trait Observable {
    fn query(&self, path: &str) -> Option<Value>;
    fn query_paths(&self) -> Vec<String>;
}
