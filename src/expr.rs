//! Parsing and evaluating monitor expressions.
//!
//! Expressions are evaluated over the current state of a [`Target`]:
//! integer literals (decimal and hex), register references (`$eax`, `$pc`),
//! word-sized memory dereferences (`[addr]`), unary minus, and the binary
//! operators `* / + - == != && ||` with standard precedence and
//! parenthesized sub-expressions.
//!
//! Evaluation is two-phase: the string is tokenized into a flat sequence of
//! [`Token`]s, then folded into a value by recursive descent over that
//! sequence. Evaluation never mutates the target; registers are snapshotted
//! once at the start, and memory dereferences go through the target's
//! read-only virtual-address read.
//!
//! The result is `Result<u32, EvalErr>` — an `Err` is an *invalid* result
//! (malformed syntax, division by zero, unmapped dereference), structurally
//! distinct from a value of zero. Evaluation never panics.
//!
//! ```
//! use minimon::expr::{self, EvalErr};
//! use minimon::target::{Registers, StepOutcome, Target, TargetFault, Width};
//!
//! struct NoMem;
//! impl Target for NoMem {
//!     fn step(&mut self) -> Result<StepOutcome, TargetFault> { Ok(StepOutcome::Halted) }
//!     fn read_mem(&self, addr: u32, _width: Width) -> Result<u32, TargetFault> {
//!         Err(TargetFault::Unmapped { addr })
//!     }
//!     fn regs(&self) -> Registers { Registers::new([7; 8], 0x1000) }
//! }
//!
//! assert_eq!(expr::eval("2 + 3 * 4", &NoMem), Ok(14));
//! assert_eq!(expr::eval("$eax == 7", &NoMem), Ok(1));
//! assert_eq!(expr::eval("1 / 0", &NoMem), Err(EvalErr::DivideByZero));
//! ```

pub mod lex;

use logos::Logos;

use crate::target::{Registers, Target, Width};
use lex::{LexErr, Token};

/// Any errors raised in attempting to evaluate an expression.
///
/// Every variant is an *invalid result*, never a crash: the caller can
/// report it and continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErr {
    /// The expression could not be tokenized.
    Lex(LexErr),
    /// The expression ended where an operand or operator was expected.
    UnexpectedEnd,
    /// A token appeared somewhere it cannot appear.
    UnexpectedToken,
    /// A `(` without a matching `)`.
    UnclosedParen,
    /// A `[` without a matching `]`.
    UnclosedBracket,
    /// The right operand of `/` evaluated to zero.
    DivideByZero,
    /// A dereference read failed at this address.
    BadDeref(u32),
}
impl std::fmt::Display for EvalErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalErr::Lex(e)          => e.fmt(f),
            EvalErr::UnexpectedEnd   => f.write_str("expression ended unexpectedly"),
            EvalErr::UnexpectedToken => f.write_str("unexpected token in expression"),
            EvalErr::UnclosedParen   => f.write_str("unbalanced parentheses"),
            EvalErr::UnclosedBracket => f.write_str("unbalanced brackets"),
            EvalErr::DivideByZero    => f.write_str("division by zero"),
            EvalErr::BadDeref(addr)  => write!(f, "cannot read word at 0x{addr:08x}"),
        }
    }
}
impl std::error::Error for EvalErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvalErr::Lex(e) => Some(e),
            _ => None,
        }
    }
}
impl From<LexErr> for EvalErr {
    fn from(value: LexErr) -> Self {
        Self::Lex(value)
    }
}

/// Evaluates an expression against the target's current state.
pub fn eval<T: Target>(src: &str, target: &T) -> Result<u32, EvalErr> {
    let tokens = Token::lexer(src).collect::<Result<Vec<_>, _>>()?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        regs: target.regs(),
        target,
    };

    let value = parser.logic_or()?;
    match parser.peek() {
        None => Ok(value),
        Some(_) => Err(EvalErr::UnexpectedToken),
    }
}

/// Recursive-descent evaluator over a token sequence.
///
/// Each method handles one precedence level and delegates tighter-binding
/// operands to the level below it.
struct Parser<'s, T> {
    tokens: &'s [Token],
    pos: usize,
    regs: Registers,
    target: &'s T,
}

impl<T: Target> Parser<'_, T> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }
    fn bump(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }
    /// Consumes the next token if it matches.
    fn eat(&mut self, token: Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn logic_or(&mut self) -> Result<u32, EvalErr> {
        let mut lhs = self.logic_and()?;
        while self.eat(Token::OrOr) {
            let rhs = self.logic_and()?;
            lhs = u32::from(lhs != 0 || rhs != 0);
        }
        Ok(lhs)
    }

    fn logic_and(&mut self) -> Result<u32, EvalErr> {
        let mut lhs = self.relational()?;
        while self.eat(Token::AndAnd) {
            let rhs = self.relational()?;
            lhs = u32::from(lhs != 0 && rhs != 0);
        }
        Ok(lhs)
    }

    fn relational(&mut self) -> Result<u32, EvalErr> {
        let mut lhs = self.additive()?;
        loop {
            if self.eat(Token::Eq) {
                lhs = u32::from(lhs == self.additive()?);
            } else if self.eat(Token::Ne) {
                lhs = u32::from(lhs != self.additive()?);
            } else {
                break Ok(lhs);
            }
        }
    }

    fn additive(&mut self) -> Result<u32, EvalErr> {
        let mut lhs = self.multiplicative()?;
        loop {
            if self.eat(Token::Plus) {
                lhs = lhs.wrapping_add(self.multiplicative()?);
            } else if self.eat(Token::Minus) {
                lhs = lhs.wrapping_sub(self.multiplicative()?);
            } else {
                break Ok(lhs);
            }
        }
    }

    fn multiplicative(&mut self) -> Result<u32, EvalErr> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat(Token::Star) {
                lhs = lhs.wrapping_mul(self.unary()?);
            } else if self.eat(Token::Slash) {
                let rhs = self.unary()?;
                if rhs == 0 {
                    return Err(EvalErr::DivideByZero);
                }
                lhs /= rhs;
            } else {
                break Ok(lhs);
            }
        }
    }

    fn unary(&mut self) -> Result<u32, EvalErr> {
        if self.eat(Token::Minus) {
            return Ok(self.unary()?.wrapping_neg());
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<u32, EvalErr> {
        match self.bump() {
            Some(Token::Int(value)) => Ok(value),
            Some(Token::Reg(reg)) => Ok(reg.read(&self.regs)),
            Some(Token::LParen) => {
                let value = self.logic_or()?;
                match self.eat(Token::RParen) {
                    true => Ok(value),
                    false => Err(EvalErr::UnclosedParen),
                }
            }
            Some(Token::LBracket) => {
                let addr = self.logic_or()?;
                if !self.eat(Token::RBracket) {
                    return Err(EvalErr::UnclosedBracket);
                }
                self.target
                    .read_mem(addr, Width::Word)
                    .map_err(|_| EvalErr::BadDeref(addr))
            }
            Some(_) => Err(EvalErr::UnexpectedToken),
            None => Err(EvalErr::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{eval, EvalErr};
    use crate::expr::lex::LexErr;
    use crate::target::fixture::ScriptedCpu;
    use crate::target::gpr_consts::{EAX, EBX};

    fn cpu() -> ScriptedCpu {
        let mut cpu = ScriptedCpu::new();
        cpu.set_reg(EAX, 10);
        cpu.set_reg(EBX, 0x1234_5678);
        cpu.write_word(0x1000, 0xDEAD_BEEF);
        cpu.write_word(0x1004, 0x1000);
        cpu
    }

    #[test]
    fn test_literals() {
        let cpu = cpu();
        assert_eq!(eval("42", &cpu), Ok(42));
        assert_eq!(eval("0x2a", &cpu), Ok(42));
        assert_eq!(eval("  42  ", &cpu), Ok(42));
    }

    #[test]
    fn test_precedence() {
        let cpu = cpu();
        assert_eq!(eval("2+3*4", &cpu), Ok(14));
        assert_eq!(eval("(2+3)*4", &cpu), Ok(20));
        assert_eq!(eval("2*3+4*5", &cpu), Ok(26));
        assert_eq!(eval("20-8/2", &cpu), Ok(16));
        assert_eq!(eval("1+2==3", &cpu), Ok(1));
        assert_eq!(eval("1+2!=3", &cpu), Ok(0));
        assert_eq!(eval("1==1&&2==2", &cpu), Ok(1));
        assert_eq!(eval("1==2||2==2", &cpu), Ok(1));
        assert_eq!(eval("0||0", &cpu), Ok(0));
    }

    #[test]
    fn test_associativity() {
        let cpu = cpu();
        assert_eq!(eval("100-30-20", &cpu), Ok(50));
        assert_eq!(eval("64/4/2", &cpu), Ok(8));
    }

    #[test]
    fn test_unary_minus() {
        let cpu = cpu();
        assert_eq!(eval("-1", &cpu), Ok(u32::MAX));
        assert_eq!(eval("--1", &cpu), Ok(1));
        assert_eq!(eval("2 * -3", &cpu), Ok(6u32.wrapping_neg()));
        assert_eq!(eval("-1 + 2", &cpu), Ok(1));
    }

    #[test]
    fn test_wrapping() {
        let cpu = cpu();
        assert_eq!(eval("0xFFFFFFFF + 1", &cpu), Ok(0));
        assert_eq!(eval("0 - 1", &cpu), Ok(u32::MAX));
        assert_eq!(eval("0x10000 * 0x10000", &cpu), Ok(0));
    }

    #[test]
    fn test_registers() {
        let cpu = cpu();
        assert_eq!(eval("$eax", &cpu), Ok(10));
        assert_eq!(eval("$eax * 2 + 1", &cpu), Ok(21));
        assert_eq!(eval("$ebx", &cpu), Ok(0x1234_5678));
        assert_eq!(eval("$bx", &cpu), Ok(0x5678));
        assert_eq!(eval("$bl", &cpu), Ok(0x78));
        assert_eq!(eval("$bh", &cpu), Ok(0x56));
        assert_eq!(eval("$pc", &cpu), Ok(0x1000));
    }

    #[test]
    fn test_deref() {
        let cpu = cpu();
        assert_eq!(eval("[0x1000]", &cpu), Ok(0xDEAD_BEEF));
        assert_eq!(eval("[0x1000 + 4]", &cpu), Ok(0x1000));
        // nested: mem[0x1004] holds 0x1000
        assert_eq!(eval("[[0x1004]]", &cpu), Ok(0xDEAD_BEEF));
        assert_eq!(eval("[$pc]", &cpu), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn test_deref_unmapped() {
        let cpu = cpu();
        assert_eq!(eval("[0x9000]", &cpu), Err(EvalErr::BadDeref(0x9000)));
        assert_eq!(eval("[0]", &cpu), Err(EvalErr::BadDeref(0)));
    }

    #[test]
    fn test_divide_by_zero() {
        let cpu = cpu();
        assert_eq!(eval("1/0", &cpu), Err(EvalErr::DivideByZero));
        assert_eq!(eval("5/($eax-10)", &cpu), Err(EvalErr::DivideByZero));
        assert_eq!(eval("0/(1-1) || 1", &cpu), Err(EvalErr::DivideByZero));
    }

    #[test]
    fn test_syntax_errors() {
        let cpu = cpu();
        assert_eq!(eval("", &cpu), Err(EvalErr::UnexpectedEnd));
        assert_eq!(eval("1 +", &cpu), Err(EvalErr::UnexpectedEnd));
        assert_eq!(eval("(1 + 2", &cpu), Err(EvalErr::UnclosedParen));
        assert_eq!(eval("[0x1000", &cpu), Err(EvalErr::UnclosedBracket));
        assert_eq!(eval("1 2", &cpu), Err(EvalErr::UnexpectedToken));
        assert_eq!(eval("1 + * 2", &cpu), Err(EvalErr::UnexpectedToken));
        assert_eq!(eval(")", &cpu), Err(EvalErr::UnexpectedToken));
        assert_eq!(eval("1)", &cpu), Err(EvalErr::UnexpectedToken));
    }

    #[test]
    fn test_lex_errors() {
        let cpu = cpu();
        assert_eq!(eval("$nope", &cpu), Err(EvalErr::Lex(LexErr::InvalidReg)));
        assert_eq!(eval("1 @ 2", &cpu), Err(EvalErr::Lex(LexErr::InvalidSymbol)));
        assert_eq!(eval("0x", &cpu), Err(EvalErr::Lex(LexErr::InvalidHexEmpty)));
    }
}
