//! Tokenizing monitor expressions.
//!
//! This module holds the tokens of the monitor's expression language
//! ([`Token`]). The evaluator consumes the flat token sequence that
//! [`Token::lexer`] produces from an expression string.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

use crate::target::RegRef;

/// A unit of information in a monitor expression.
#[derive(Debug, Logos, PartialEq, Eq, Clone, Copy)]
#[logos(skip r"[ \t]+", error = LexErr)]
pub enum Token {
    // This regex spans over tokens that are technically invalid
    // (e.g., 12abc matches even though it shouldn't).
    // This is intended; the callback validates the full unit.

    /// An integer literal, decimal (`42`) or hexadecimal (`0x2A`).
    #[regex(r"\d\w*", lex_int)]
    Int(u32),

    /// A register reference (`$eax`, `$ax`, `$al`, `$pc`, ...).
    #[regex(r"\$\w*", lex_reg)]
    Reg(RegRef),

    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `==`
    #[token("==")]
    Eq,
    /// `!=`
    #[token("!=")]
    Ne,
    /// `&&`
    #[token("&&")]
    AndAnd,
    /// `||`
    #[token("||")]
    OrOr,
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `[`, which opens a memory dereference
    #[token("[")]
    LBracket,
    /// `]`
    #[token("]")]
    RBracket,
}

/// Any errors raised in attempting to tokenize an expression.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal cannot fit within the range of a u32.
    DoesNotFitU32,
    /// Numeric literal has invalid decimal digits.
    InvalidNumeric,
    /// Hex literal (starting with 0x) has invalid hex digits.
    InvalidHex,
    /// Hex literal (starting with 0x) doesn't have digits after it.
    InvalidHexEmpty,
    /// Int parsing failed but the reason why is unknown.
    UnknownIntErr,
    /// Register reference (starting with $) does not name a register.
    InvalidReg,
    /// A symbol was used which does not occur in any expression token.
    #[default]
    InvalidSymbol,
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitU32   => f.write_str("numeric token does not fit 32-bit unsigned integer"),
            LexErr::InvalidNumeric  => f.write_str("invalid decimal literal"),
            LexErr::InvalidHex      => f.write_str("invalid hex literal"),
            LexErr::InvalidHexEmpty => f.write_str("invalid hex literal"),
            LexErr::UnknownIntErr   => f.write_str("could not parse integer"),
            LexErr::InvalidReg      => f.write_str("unknown register"),
            LexErr::InvalidSymbol   => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}

/// Helper that converts an int error kind to its corresponding LexErr, based on the provided inputs.
fn convert_int_error(e: &IntErrorKind, invalid_digits_err: LexErr, empty_err: LexErr) -> LexErr {
    match e {
        IntErrorKind::Empty        => empty_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow  => LexErr::DoesNotFitU32,
        IntErrorKind::NegOverflow  => LexErr::DoesNotFitU32,
        _ => LexErr::UnknownIntErr,
    }
}

fn lex_int(lx: &Lexer<'_, Token>) -> Result<u32, LexErr> {
    let string = lx.slice();
    match string.strip_prefix("0x").or_else(|| string.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16)
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty)),
        None => string.parse::<u32>()
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidNumeric)),
    }
}

fn lex_reg(lx: &Lexer<'_, Token>) -> Result<RegRef, LexErr> {
    lx.slice()[1..].parse().map_err(|_| LexErr::InvalidReg)
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use crate::expr::lex::{LexErr, Token};
    use crate::target::gpr_consts::{EAX, EDI};
    use crate::target::RegRef;

    #[test]
    fn test_numeric_dec_success() {
        let mut tokens = Token::lexer("0 123 456789");
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(456789))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_hex_success() {
        let mut tokens = Token::lexer("0x0 0x2110 0xABCD 0xabcd 0XFFFFFFFF");
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0x0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0x2110))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0xABCD))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0xABCD))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0xFFFF_FFFF))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_overflow() {
        assert_eq!(Token::lexer("4294967295").next(), Some(Ok(Token::Int(u32::MAX))));
        assert_eq!(Token::lexer("4294967296").next(), Some(Err(LexErr::DoesNotFitU32)));
        assert_eq!(Token::lexer("0x100000000").next(), Some(Err(LexErr::DoesNotFitU32)));
        assert_eq!(
            Token::lexer("999999999999999999999999").next(),
            Some(Err(LexErr::DoesNotFitU32))
        );
    }

    #[test]
    fn test_numeric_invalid() {
        assert_eq!(Token::lexer("3Q").next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(Token::lexer("0xZZ").next(), Some(Err(LexErr::InvalidHex)));
        assert_eq!(Token::lexer("0x").next(), Some(Err(LexErr::InvalidHexEmpty)));
        assert_eq!(Token::lexer("0X").next(), Some(Err(LexErr::InvalidHexEmpty)));
    }

    #[test]
    fn test_regs() {
        let mut tokens = Token::lexer("$eax $ax $al $ah $edi $pc");
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RegRef::Word(EAX)))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RegRef::Half(EAX)))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RegRef::ByteLo(EAX)))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RegRef::ByteHi(EAX)))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RegRef::Word(EDI)))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RegRef::Pc))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("$").next(), Some(Err(LexErr::InvalidReg)));
        assert_eq!(Token::lexer("$r15").next(), Some(Err(LexErr::InvalidReg)));
        assert_eq!(Token::lexer("$foo").next(), Some(Err(LexErr::InvalidReg)));
    }

    #[test]
    fn test_operators() {
        let mut tokens = Token::lexer("+ - * / == != && || ( ) [ ]");
        assert_eq!(tokens.next(), Some(Ok(Token::Plus)));
        assert_eq!(tokens.next(), Some(Ok(Token::Minus)));
        assert_eq!(tokens.next(), Some(Ok(Token::Star)));
        assert_eq!(tokens.next(), Some(Ok(Token::Slash)));
        assert_eq!(tokens.next(), Some(Ok(Token::Eq)));
        assert_eq!(tokens.next(), Some(Ok(Token::Ne)));
        assert_eq!(tokens.next(), Some(Ok(Token::AndAnd)));
        assert_eq!(tokens.next(), Some(Ok(Token::OrOr)));
        assert_eq!(tokens.next(), Some(Ok(Token::LParen)));
        assert_eq!(tokens.next(), Some(Ok(Token::RParen)));
        assert_eq!(tokens.next(), Some(Ok(Token::LBracket)));
        assert_eq!(tokens.next(), Some(Ok(Token::RBracket)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_dense_expression() {
        let mut tokens = Token::lexer("[0x1000]==3*$eax");
        assert_eq!(tokens.next(), Some(Ok(Token::LBracket)));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0x1000))));
        assert_eq!(tokens.next(), Some(Ok(Token::RBracket)));
        assert_eq!(tokens.next(), Some(Ok(Token::Eq)));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(3))));
        assert_eq!(tokens.next(), Some(Ok(Token::Star)));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RegRef::Word(EAX)))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_invalid_symbol() {
        assert_eq!(Token::lexer("%").next(), Some(Err(LexErr::InvalidSymbol)));
        assert_eq!(Token::lexer("1 ^ 2").nth(1), Some(Err(LexErr::InvalidSymbol)));
    }
}
