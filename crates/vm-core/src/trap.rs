//! Terminal CPU status codes.

use std::fmt;

/// A terminal status for `Cpu::cycle`. `Undefined` is the sentinel reset
/// value and must never be observed as a cycle's result; if a test sees
/// it, that is a defect in the CPU, not a valid outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Undefined,
    Success,
    OutOfInstructions,
    MissingInstruction,
    BadInstruction,
    Segfault,
    DivisionByZero,
}

impl Status {
    #[must_use]
    pub const fn is_trap(self) -> bool {
        !matches!(self, Self::Success | Self::Undefined)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Undefined => "UNDEFINED",
            Self::Success => "SUCCESS",
            Self::OutOfInstructions => "OUT_OF_INSTRUCTIONS",
            Self::MissingInstruction => "MISSING_INSTRUCTION",
            Self::BadInstruction => "BAD_INSTRUCTION",
            Self::Segfault => "SEGFAULT",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
        };
        f.write_str(s)
    }
}
