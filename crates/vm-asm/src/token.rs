//! Token kinds produced by the lexer, and the literal-parsing helpers the
//! regex-based tokenizer drives.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An instruction mnemonic, optionally suffixed `.cond`.
    Mnemonic { name: String, condition: Option<String> },
    /// A `name:` label definition.
    LabelDef(String),
    /// A `.name` directive keyword.
    Directive(String),
    IntLiteral(i64),
    FloatLiteral(f32),
    Identifier(String),
}

fn int_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?(0x[0-9A-Fa-f]+|0b[01]+|[0-9]+)$").unwrap())
}

fn float_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Optional sign, a mandatory '.', with digits required on at least one
    // side of it — accepts ".5", "+0.25", "-1.5", "-1."; rejects the bare ".".
    RE.get_or_init(|| Regex::new(r"^[+-]?([0-9]+\.[0-9]*|[0-9]*\.[0-9]+)$").unwrap())
}

fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Parses an integer literal: optional sign, decimal / `0x` hex / `0b`
/// binary.
#[must_use]
pub fn parse_int_literal(text: &str) -> Option<i64> {
    if !int_pattern().is_match(text) {
        return None;
    }
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = if let Some(hex) = rest.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = rest.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

#[must_use]
pub fn parse_float_literal(text: &str) -> Option<f32> {
    if !float_pattern().is_match(text) {
        return None;
    }
    text.parse::<f32>().ok()
}

#[must_use]
pub fn is_identifier(text: &str) -> bool {
    identifier_pattern().is_match(text)
}

/// Classifies a non-leading token: integer, float, or identifier.
#[must_use]
pub fn classify_operand(text: &str) -> Token {
    if let Some(i) = parse_int_literal(text) {
        Token::IntLiteral(i)
    } else if let Some(f) = parse_float_literal(text) {
        Token::FloatLiteral(f)
    } else {
        Token::Identifier(text.to_string())
    }
}

/// Classifies the leading token of a statement: a label, a directive, or a
/// mnemonic (optionally `.cond`-suffixed).
#[must_use]
pub fn classify_leading(text: &str) -> Token {
    if let Some(name) = text.strip_suffix(':') {
        return Token::LabelDef(name.to_string());
    }
    if let Some(name) = text.strip_prefix('.') {
        return Token::Directive(name.to_lowercase());
    }
    match text.split_once('.') {
        Some((mnemonic, condition)) => Token::Mnemonic {
            name: mnemonic.to_lowercase(),
            condition: Some(condition.to_lowercase()),
        },
        None => Token::Mnemonic { name: text.to_lowercase(), condition: None },
    }
}
