//! Bit layout of one instruction word.
//!
//! ```text
//! [31:29] condition   [28:23] opcode   [22] op1-is-register  [21:16] op1
//! [15] op2-is-register  [14:9] op2     [8] op3-is-register   [7:2] op3
//! [1:0] low immediate bits
//! ```
//!
//! An opcode's *arity* (0-3) says how many of the three slots it actually
//! uses. Within the used slots, the first one that is not a register is an
//! inline immediate; everything below it in the word — including the flag
//! bits of the slots that follow — becomes part of that immediate's raw
//! bit pattern, because a family never has more than one immediate operand.
//! This is why the inline width shrinks by seven bits for every register
//! slot in front of it (22, 15, 8): each register slot claims exactly one
//! flag bit and one six-bit field.

use crate::word::Word;

/// Number of addressable registers (R0..R63). SP and BP are ordinary
/// registers at fixed indices (16 and 17) rather than a separate file —
/// the assembler's symbol table is what makes `sp`/`bp` resolve there.
pub const NUM_REGISTERS: u8 = 64;
pub const SP_INDEX: u8 = 16;
pub const BP_INDEX: u8 = 17;

const SLOT_FLAG_BIT: [u32; 3] = [22, 15, 8];
const SLOT_FIELD_SHIFT: [u32; 3] = [16, 9, 2];
const FIELD_MASK: u32 = 0x3F;
const CONDITION_SHIFT: u32 = 29;
const OPCODE_SHIFT: u32 = 23;
const OPCODE_MASK: u32 = 0x3F;

/// Inline-immediate width, indexed by the slot (0/1/2) that first carries it.
pub const INLINE_WIDTH: [u32; 3] = [22, 15, 8];

/// All-ones value of the inline-immediate field for a given slot: the
/// sentinel that forces an extension word.
#[must_use]
pub const fn inline_mask(slot: usize) -> u32 {
    if INLINE_WIDTH[slot] >= 32 {
        u32::MAX
    } else {
        (1 << INLINE_WIDTH[slot]) - 1
    }
}

/// Condition code, bits [31:29].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Al,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Condition {
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Al => 0,
            Self::Eq => 1,
            Self::Ne => 2,
            Self::Gt => 3,
            Self::Ge => 4,
            Self::Lt => 5,
            Self::Le => 6,
        }
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Al),
            1 => Some(Self::Eq),
            2 => Some(Self::Ne),
            3 => Some(Self::Gt),
            4 => Some(Self::Ge),
            5 => Some(Self::Lt),
            6 => Some(Self::Le),
            _ => None,
        }
    }

    #[must_use]
    pub const fn mnemonic_suffix(self) -> &'static str {
        match self {
            Self::Al => "al",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }

    #[must_use]
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "al" => Some(Self::Al),
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }
}

/// How many of the three operand slots an opcode actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Zero,
    One,
    Two,
    Three,
}

impl Arity {
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

macro_rules! opcodes {
    ($($name:ident = $value:expr, $arity:ident, $mnemonic:literal;)*) => {
        /// All instruction opcodes, bits [28:23].
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Opcode {
            $($name,)*
        }

        impl Opcode {
            #[must_use]
            pub const fn bits(self) -> u8 {
                match self {
                    $(Self::$name => $value,)*
                }
            }

            #[must_use]
            pub const fn from_bits(bits: u8) -> Option<Self> {
                match bits {
                    $($value => Some(Self::$name),)*
                    _ => None,
                }
            }

            #[must_use]
            pub const fn arity(self) -> Arity {
                match self {
                    $(Self::$name => Arity::$arity,)*
                }
            }

            #[must_use]
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic,)*
                }
            }

            #[must_use]
            pub fn from_mnemonic(s: &str) -> Option<Self> {
                match s {
                    $($mnemonic => Some(Self::$name),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Nop  = 0,  Zero,  "nop";
    Ret  = 1,  Zero,  "ret";
    Cli  = 2,  Zero,  "cli";
    Sei  = 3,  Zero,  "sei";

    Jmp  = 4,  One,   "jmp";
    Call = 5,  One,   "call";
    Push = 6,  One,   "push";
    Pop  = 7,  One,   "pop";
    Itof = 8,  One,   "itof";
    Ftoi = 9,  One,   "ftoi";
    Rngi = 10, One,   "rngi";
    Rngf = 11, One,   "rngf";

    Mov  = 12, Two,   "mov";
    Cmpi = 13, Two,   "cmpi";
    Cmpu = 14, Two,   "cmpu";
    Cmpf = 15, Two,   "cmpf";

    Ldr  = 16, Three, "ldr";
    Str  = 17, Three, "str";
    Shrs = 18, Three, "shrs";
    Shru = 19, Three, "shru";
    Shl  = 20, Three, "shl";
    And  = 21, Three, "and";
    Or   = 22, Three, "or";
    Xor  = 23, Three, "xor";
    // NOT is logically unary (dest, src) despite sharing a mnemonic family
    // with the other bitwise ops; giving it arity Three would make decode
    // read a phantom third slot and sometimes a phantom extension word.
    Not  = 24, Two,   "not";
    Add  = 25, Three, "add";
    Sub  = 26, Three, "sub";
    Mul  = 27, Three, "mul";
    Div  = 28, Three, "div";
    Mod  = 29, Three, "mod";
    Addf = 30, Three, "addf";
    Subf = 31, Three, "subf";
    Mulf = 32, Three, "mulf";
    Divf = 33, Three, "divf";
    Modf = 34, Three, "modf";

    // Reserved: decode recognises them but the CPU has no execution path.
    Ldrb = 35, Three, "ldrb";
    Strb = 36, Three, "strb";
}

impl Opcode {
    /// The fewest operand tokens the assembler will accept for this
    /// mnemonic. Equal to `arity().count()` for every opcode except LDR
    /// and STR, whose trailing offset operand may be omitted (it then
    /// defaults to an implied zero, per scenario usage like `ldr r0 x`).
    #[must_use]
    pub const fn min_operands(self) -> usize {
        match self {
            Self::Ldr | Self::Str => 2,
            other => other.arity().count(),
        }
    }
}

/// One operand slot after decode: either a register index or the raw bits
/// of an inline immediate (not yet widened to 32 bits / extension-resolved).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOperand {
    Register(u8),
    Immediate { raw: u32, width: u32 },
}

/// A fully decoded instruction word, before immediate/extension resolution.
#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    pub condition: Option<Condition>,
    pub opcode: Option<Opcode>,
    /// Populated for slots `0..arity`; later slots are `Register(0)` filler.
    pub operands: [RawOperand; 3],
}

/// Decode condition, opcode, and operand slots for the given arity.
///
/// `arity` must come from `Opcode::arity()` of the opcode found in this
/// same word — callers read the opcode first, then re-decode operands with
/// the right arity, since a missing operand at slot `k` swallows the bits
/// of every slot after it.
#[must_use]
pub fn decode(word: Word, arity: Arity) -> Decoded {
    let bits = word.bits();
    let condition = Condition::from_bits(((bits >> CONDITION_SHIFT) & 0x7) as u8);
    let opcode = Opcode::from_bits(((bits >> OPCODE_SHIFT) & OPCODE_MASK) as u8);

    // Slots the loop below never reaches (because an earlier slot absorbed
    // them into its immediate) default to a genuine zero immediate, not a
    // register read — those bits aren't independently present in the word,
    // so there is nothing meaningful to read from a register for them.
    let mut operands = [RawOperand::Immediate { raw: 0, width: 32 }; 3];
    for slot in 0..arity.count() {
        let is_register = (bits >> SLOT_FLAG_BIT[slot]) & 1 == 1;
        if is_register {
            let field = ((bits >> SLOT_FIELD_SHIFT[slot]) & FIELD_MASK) as u8;
            operands[slot] = RawOperand::Register(field);
        } else {
            let width = INLINE_WIDTH[slot];
            let mask = inline_mask(slot);
            operands[slot] = RawOperand::Immediate {
                raw: bits & mask,
                width,
            };
            break;
        }
    }

    Decoded {
        condition,
        opcode,
        operands,
    }
}

/// One resolved operand as the encoder wants it: a register index, or an
/// immediate value together with whether the caller insists on an
/// extension word (codegen forces this for label immediates that grow
/// into one, and for values that equal the inline mask exactly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSpec {
    Register(u8),
    Immediate(u32),
}

/// Result of packing one instruction: the word itself, and an extension
/// word if the immediate didn't fit inline.
#[derive(Debug, Clone, Copy)]
pub struct Packed {
    pub word: Word,
    pub extension: Option<Word>,
}

/// Pack condition, opcode, and operands into one (or two) words.
///
/// `operands` must have exactly `opcode.arity().count()` entries. At most
/// one may be `Immediate`; it may appear at any slot, the slots before it
/// must be `Register`, and the slots after it are not emitted (their bits
/// are folded into the immediate's field, or simply zero if `operands` is
/// shorter than three).
#[must_use]
pub fn pack(condition: Condition, opcode: Opcode, operands: &[OperandSpec]) -> Packed {
    let mut bits: u32 = u32::from(condition.bits()) << CONDITION_SHIFT;
    bits |= u32::from(opcode.bits()) << OPCODE_SHIFT;

    let immediate_slot = operands
        .iter()
        .position(|o| matches!(o, OperandSpec::Immediate(_)));

    match immediate_slot {
        None => {
            for (slot, operand) in operands.iter().enumerate() {
                let OperandSpec::Register(r) = operand else {
                    unreachable!("no immediate slot found but an immediate is present")
                };
                bits |= 1 << SLOT_FLAG_BIT[slot];
                bits |= (u32::from(*r) & FIELD_MASK) << SLOT_FIELD_SHIFT[slot];
            }
            Packed {
                word: Word::from_bits(bits),
                extension: None,
            }
        }
        Some(slot) => {
            for i in 0..slot {
                let OperandSpec::Register(r) = operands[i] else {
                    panic!("operand before an immediate slot must be a register")
                };
                bits |= 1 << SLOT_FLAG_BIT[i];
                bits |= (u32::from(r) & FIELD_MASK) << SLOT_FIELD_SHIFT[i];
            }
            let OperandSpec::Immediate(value) = operands[slot] else {
                unreachable!()
            };
            let mask = inline_mask(slot);
            if fits_inline(value, slot) {
                bits |= value & mask;
                Packed {
                    word: Word::from_bits(bits),
                    extension: None,
                }
            } else {
                bits |= mask; // sentinel
                Packed {
                    word: Word::from_bits(bits),
                    extension: Some(Word::from_bits(value)),
                }
            }
        }
    }
}

/// Whether a 32-bit value can be packed into the inline immediate field of
/// the given slot without an extension word: its low bits, sign-extended
/// back out, must reproduce the original value exactly, and must not equal
/// the all-ones sentinel. The assembler's code generator uses this same
/// rule to decide `extra` during layout, so the two never disagree.
#[must_use]
pub const fn fits_inline(value: u32, slot: usize) -> bool {
    let mask = inline_mask(slot);
    let masked = value & mask;
    masked != mask && sign_extend(masked, INLINE_WIDTH[slot]).bits() == value
}

/// Mask of all-ones for an arbitrary bit width (not tied to a slot index);
/// used when resolving an already-decoded `RawOperand::Immediate`.
#[must_use]
pub const fn mask_for_width(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Sign-extend a `width`-bit two's-complement value to a full 32-bit `Word`.
///
/// The assembler packs a literal's low bits verbatim into the inline field;
/// this reconstructs the original 32-bit value the literal meant, so a
/// negative inline immediate reads back as negative regardless of how few
/// bits it occupied in the instruction word.
#[must_use]
pub const fn sign_extend(raw: u32, width: u32) -> Word {
    if width >= 32 {
        return Word::from_bits(raw);
    }
    let shift = 32 - width;
    Word::from_bits((((raw << shift) as i32) >> shift) as u32)
}

/// Format a decoded instruction as a human-readable line, for the runner's
/// verbose trace and for debugging test failures.
#[must_use]
pub fn describe(word: Word) -> String {
    let peek = decode(word, Arity::Three);
    let Some(opcode) = peek.opcode else {
        return format!("<unknown opcode {:#010x}>", word.bits());
    };
    let decoded = decode(word, opcode.arity());
    let cond = decoded
        .condition
        .map_or("??", |c| c.mnemonic_suffix());
    let mut out = format!("{}.{}", opcode.mnemonic(), cond);
    for operand in &decoded.operands[..opcode.arity().count()] {
        match operand {
            RawOperand::Register(r) => out.push_str(&format!(" r{r}")),
            RawOperand::Immediate { raw, width } => {
                out.push_str(&format!(" #{raw:#x} ({width}b)"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_register_only() {
        let packed = pack(
            Condition::Al,
            Opcode::Add,
            &[
                OperandSpec::Register(1),
                OperandSpec::Register(2),
                OperandSpec::Register(3),
            ],
        );
        assert!(packed.extension.is_none());
        let decoded = decode(packed.word, Arity::Three);
        assert_eq!(decoded.opcode, Some(Opcode::Add));
        assert_eq!(decoded.operands[0], RawOperand::Register(1));
        assert_eq!(decoded.operands[1], RawOperand::Register(2));
        assert_eq!(decoded.operands[2], RawOperand::Register(3));
    }

    #[test]
    fn inline_immediate_fits_without_extension() {
        let packed = pack(
            Condition::Al,
            Opcode::Mov,
            &[OperandSpec::Register(0), OperandSpec::Immediate(42)],
        );
        assert!(packed.extension.is_none());
        let decoded = decode(packed.word, Arity::Two);
        match decoded.operands[1] {
            RawOperand::Immediate { raw, width } => {
                assert_eq!(raw, 42);
                assert_eq!(width, INLINE_WIDTH[1]);
            }
            RawOperand::Register(_) => panic!("expected immediate"),
        }
    }

    #[test]
    fn immediate_equal_to_mask_forces_extension() {
        let mask = inline_mask(1);
        let packed = pack(
            Condition::Al,
            Opcode::Mov,
            &[OperandSpec::Register(0), OperandSpec::Immediate(mask)],
        );
        assert_eq!(packed.extension, Some(Word::from_bits(mask)));
        let decoded = decode(packed.word, Arity::Two);
        match decoded.operands[1] {
            RawOperand::Immediate { raw, .. } => assert_eq!(raw, mask),
            RawOperand::Register(_) => panic!("expected immediate"),
        }
    }

    #[test]
    fn out_of_range_immediate_gets_extension_word() {
        let big = inline_mask(0) + 1000;
        let packed = pack(
            Condition::Al,
            Opcode::Jmp,
            &[OperandSpec::Immediate(big)],
        );
        assert_eq!(packed.extension, Some(Word::from_bits(big)));
    }
}
