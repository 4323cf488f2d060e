// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression evaluation over the token stream.
//!
//! Precedence-climbing evaluator with a C-like operator set, one function per
//! precedence level. Alongside the value, every result tracks:
//!
//! - `known` — false when an unresolved forward reference contributed.
//! - `constant` — true only while every contributor was a literal or an
//!   EQU/SET constant; `$` and labels clear it. The instruction encoder uses
//!   this to keep address-width selection stable across sizing iterations.

use crate::core::tokenizer::{Lexer, TokenKind};

/// Result of evaluating an expression.
#[derive(Debug, Clone, Copy)]
pub struct ExprValue {
    pub value: i64,
    pub known: bool,
    pub constant: bool,
}

impl ExprValue {
    fn literal(value: i64) -> Self {
        Self {
            value,
            known: true,
            constant: true,
        }
    }

    fn combine(self, other: ExprValue, value: i64) -> Self {
        Self {
            value,
            known: self.known && other.known,
            constant: self.constant && other.constant,
        }
    }

    fn map(self, value: i64) -> Self {
        Self { value, ..self }
    }
}

/// Error returned from expression evaluation.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Outcome of a symbol lookup during evaluation.
#[derive(Debug, Clone, Copy)]
pub enum SymbolLookup {
    /// Defined symbol; `constant` is true for EQU/SET, false for labels.
    Value { value: i64, constant: bool },
    Undefined,
}

/// Evaluation context supplied by the assembler.
pub trait ExprContext {
    /// Look up a symbol's value, marking it referenced.
    fn symbol_value(&mut self, name: &str) -> SymbolLookup;

    /// Current program counter, the value of `$`.
    fn current_address(&self) -> u32;

    /// True during the emit pass; undefined symbols are then hard errors
    /// instead of forward references.
    fn emit_pass(&self) -> bool;
}

pub fn eval_expr(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    logical_or(lexer, ctx)
}

fn logical_or(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = logical_and(lexer, ctx)?;
    while lexer.peek().kind == TokenKind::PipePipe {
        lexer.next();
        let right = logical_and(lexer, ctx)?;
        left = left.combine(right, ((left.value != 0) || (right.value != 0)) as i64);
    }
    Ok(left)
}

fn logical_and(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = bit_or(lexer, ctx)?;
    while lexer.peek().kind == TokenKind::AmpAmp {
        lexer.next();
        let right = bit_or(lexer, ctx)?;
        left = left.combine(right, ((left.value != 0) && (right.value != 0)) as i64);
    }
    Ok(left)
}

fn bit_or(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = bit_xor(lexer, ctx)?;
    while lexer.peek().kind == TokenKind::Pipe {
        lexer.next();
        let right = bit_xor(lexer, ctx)?;
        left = left.combine(right, left.value | right.value);
    }
    Ok(left)
}

fn bit_xor(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = bit_and(lexer, ctx)?;
    while lexer.peek().kind == TokenKind::Caret {
        lexer.next();
        let right = bit_and(lexer, ctx)?;
        left = left.combine(right, left.value ^ right.value);
    }
    Ok(left)
}

fn bit_and(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = equality(lexer, ctx)?;
    while lexer.peek().kind == TokenKind::Amp {
        lexer.next();
        let right = equality(lexer, ctx)?;
        left = left.combine(right, left.value & right.value);
    }
    Ok(left)
}

fn equality(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = relational(lexer, ctx)?;
    loop {
        match lexer.peek().kind {
            TokenKind::EqEq => {
                lexer.next();
                let right = relational(lexer, ctx)?;
                left = left.combine(right, (left.value == right.value) as i64);
            }
            TokenKind::Ne => {
                lexer.next();
                let right = relational(lexer, ctx)?;
                left = left.combine(right, (left.value != right.value) as i64);
            }
            _ => return Ok(left),
        }
    }
}

fn relational(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = shift(lexer, ctx)?;
    loop {
        let op = lexer.peek().kind;
        match op {
            TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => {
                lexer.next();
                let right = shift(lexer, ctx)?;
                let result = match op {
                    TokenKind::Lt => left.value < right.value,
                    TokenKind::Le => left.value <= right.value,
                    TokenKind::Gt => left.value > right.value,
                    _ => left.value >= right.value,
                };
                left = left.combine(right, result as i64);
            }
            _ => return Ok(left),
        }
    }
}

fn shift(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = additive(lexer, ctx)?;
    loop {
        match lexer.peek().kind {
            TokenKind::Shl => {
                lexer.next();
                let right = additive(lexer, ctx)?;
                left = left.combine(right, left.value.wrapping_shl((right.value & 0x3f) as u32));
            }
            TokenKind::Shr => {
                // Arithmetic shift, sign-preserving.
                lexer.next();
                let right = additive(lexer, ctx)?;
                left = left.combine(right, left.value.wrapping_shr((right.value & 0x3f) as u32));
            }
            _ => return Ok(left),
        }
    }
}

fn additive(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = multiplicative(lexer, ctx)?;
    loop {
        match lexer.peek().kind {
            TokenKind::Plus => {
                lexer.next();
                let right = multiplicative(lexer, ctx)?;
                left = left.combine(right, left.value.wrapping_add(right.value));
            }
            TokenKind::Minus => {
                lexer.next();
                let right = multiplicative(lexer, ctx)?;
                left = left.combine(right, left.value.wrapping_sub(right.value));
            }
            _ => return Ok(left),
        }
    }
}

fn multiplicative(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let mut left = unary(lexer, ctx)?;
    loop {
        match lexer.peek().kind {
            TokenKind::Star => {
                lexer.next();
                let right = unary(lexer, ctx)?;
                left = left.combine(right, left.value.wrapping_mul(right.value));
            }
            TokenKind::Slash => {
                lexer.next();
                let right = unary(lexer, ctx)?;
                if right.value == 0 {
                    return Err(EvalError::new("division by zero"));
                }
                left = left.combine(right, left.value.wrapping_div(right.value));
            }
            TokenKind::Percent => {
                lexer.next();
                let right = unary(lexer, ctx)?;
                if right.value == 0 {
                    return Err(EvalError::new("modulo by zero"));
                }
                left = left.combine(right, left.value.wrapping_rem(right.value));
            }
            _ => return Ok(left),
        }
    }
}

fn unary(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    match lexer.peek().kind {
        TokenKind::Minus => {
            lexer.next();
            let inner = unary(lexer, ctx)?;
            Ok(inner.map(inner.value.wrapping_neg()))
        }
        TokenKind::Plus => {
            lexer.next();
            unary(lexer, ctx)
        }
        TokenKind::Tilde => {
            lexer.next();
            let inner = unary(lexer, ctx)?;
            Ok(inner.map(!inner.value))
        }
        TokenKind::Not => {
            lexer.next();
            let inner = unary(lexer, ctx)?;
            Ok(inner.map((inner.value == 0) as i64))
        }
        _ => primary(lexer, ctx),
    }
}

fn primary(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<ExprValue, EvalError> {
    let tok = lexer.peek();
    match tok.kind {
        TokenKind::Number | TokenKind::Char => {
            lexer.next();
            Ok(ExprValue::literal(tok.value))
        }
        TokenKind::Dollar => {
            lexer.next();
            // The location counter is position-dependent, never a constant.
            Ok(ExprValue {
                value: ctx.current_address() as i64,
                known: true,
                constant: false,
            })
        }
        TokenKind::LParen => {
            lexer.next();
            let inner = logical_or(lexer, ctx)?;
            if lexer.peek().kind != TokenKind::RParen {
                return Err(EvalError::new("expected ')' in expression"));
            }
            lexer.next();
            Ok(inner)
        }
        TokenKind::Identifier => {
            lexer.next();
            if let Some(function) = builtin_function(&tok.text) {
                return apply_builtin(lexer, ctx, &tok.text, function);
            }
            match ctx.symbol_value(&tok.text) {
                SymbolLookup::Value { value, constant } => Ok(ExprValue {
                    value,
                    known: true,
                    constant,
                }),
                SymbolLookup::Undefined => {
                    if ctx.emit_pass() {
                        Err(EvalError::new(format!("undefined symbol '{}'", tok.text)))
                    } else {
                        // Forward reference; the value settles in a later
                        // sizing iteration.
                        Ok(ExprValue {
                            value: 0,
                            known: false,
                            constant: false,
                        })
                    }
                }
            }
        }
        _ => Err(EvalError::new(format!(
            "expected expression, got '{}'",
            tok.describe()
        ))),
    }
}

fn builtin_function(name: &str) -> Option<fn(i64) -> i64> {
    if name.eq_ignore_ascii_case("HIGH") || name.eq_ignore_ascii_case("HI") {
        Some(|v| (v >> 8) & 0xFF)
    } else if name.eq_ignore_ascii_case("LOW") || name.eq_ignore_ascii_case("LO") {
        Some(|v| v & 0xFF)
    } else if name.eq_ignore_ascii_case("BANK") {
        Some(|v| (v >> 16) & 0xFF)
    } else {
        None
    }
}

fn apply_builtin(
    lexer: &mut Lexer,
    ctx: &mut dyn ExprContext,
    name: &str,
    function: fn(i64) -> i64,
) -> Result<ExprValue, EvalError> {
    if lexer.peek().kind != TokenKind::LParen {
        return Err(EvalError::new(format!("expected '(' after {name}")));
    }
    lexer.next();
    let inner = logical_or(lexer, ctx)?;
    if lexer.peek().kind != TokenKind::RParen {
        return Err(EvalError::new(format!(
            "expected ')' after {name} expression"
        )));
    }
    lexer.next();
    Ok(inner.map(function(inner.value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct TestCtx {
        pc: u32,
        emit: bool,
    }

    impl ExprContext for TestCtx {
        fn symbol_value(&mut self, name: &str) -> SymbolLookup {
            if name.eq_ignore_ascii_case("FIVE") {
                SymbolLookup::Value {
                    value: 5,
                    constant: true,
                }
            } else if name.eq_ignore_ascii_case("START") {
                SymbolLookup::Value {
                    value: 0x100,
                    constant: false,
                }
            } else {
                SymbolLookup::Undefined
            }
        }

        fn current_address(&self) -> u32 {
            self.pc
        }

        fn emit_pass(&self) -> bool {
            self.emit
        }
    }

    fn eval(src: &str) -> ExprValue {
        let mut lexer = Lexer::new(src);
        let mut ctx = TestCtx {
            pc: 0x20,
            emit: false,
        };
        eval_expr(&mut lexer, &mut ctx).expect("eval failed")
    }

    fn eval_emit(src: &str) -> Result<ExprValue, EvalError> {
        let mut lexer = Lexer::new(src);
        let mut ctx = TestCtx {
            pc: 0x20,
            emit: true,
        };
        eval_expr(&mut lexer, &mut ctx)
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("2+3*4").value, 14);
        assert_eq!(eval("(2+3)*4").value, 20);
        assert_eq!(eval("1<<4|1").value, 17);
        assert_eq!(eval("7%4").value, 3);
        assert_eq!(eval("-8>>1").value, -4);
        assert_eq!(eval("1+2==3").value, 1);
        assert_eq!(eval("1 && 0 || 1").value, 1);
        assert_eq!(eval("~0").value, -1);
        assert_eq!(eval("!5").value, 0);
    }

    #[test]
    fn builtins() {
        assert_eq!(eval("HIGH($1234)").value, 0x12);
        assert_eq!(eval("LOW($1234)").value, 0x34);
        assert_eq!(eval("BANK($123456)").value, 0x12);
        assert_eq!(eval("HI($1234)").value, 0x12);
        assert_eq!(eval("LO($1234)").value, 0x34);
    }

    #[test]
    fn dollar_is_pc_and_not_constant() {
        let v = eval("$+2");
        assert_eq!(v.value, 0x22);
        assert!(v.known);
        assert!(!v.constant);
    }

    #[test]
    fn equ_symbol_is_constant_label_is_not() {
        let v = eval("FIVE*2");
        assert_eq!(v.value, 10);
        assert!(v.constant);

        let v = eval("START+1");
        assert_eq!(v.value, 0x101);
        assert!(v.known);
        assert!(!v.constant);
    }

    #[test]
    fn undefined_symbol_is_forward_reference_while_sizing() {
        let v = eval("MISSING+4");
        assert_eq!(v.value, 4);
        assert!(!v.known);
        assert!(!v.constant);
    }

    #[test]
    fn undefined_symbol_errors_in_emit_pass() {
        let err = eval_emit("MISSING").unwrap_err();
        assert!(err.message.contains("undefined symbol 'MISSING'"));
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert!(eval_emit("1/0").is_err());
        assert!(eval_emit("1%0").is_err());
    }

    #[test]
    fn char_literal_in_expression() {
        assert_eq!(eval("'A'+1").value, 0x42);
    }

    proptest! {
        #[test]
        fn literal_round_trip(value in any::<i32>()) {
            // Any decimal literal evaluates to itself.
            let text = value.to_string();
            prop_assert_eq!(eval(&text).value, value as i64);
        }

        #[test]
        fn high_low_recompose(value in any::<u32>()) {
            // HIGH(x) << 8 | LOW(x) == x & 0xFFFF.
            let src = format!("HIGH({value}) << 8 | LOW({value})");
            prop_assert_eq!(eval(&src).value, (value & 0xFFFF) as i64);
        }
    }
}
