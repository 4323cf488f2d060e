// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand model and the addressing-mode parser.
//!
//! Operands live for one source line: the parser builds them, the encoder
//! consumes them. The awkward corner is that `C`, `Z`, `NC`, and `NZ` are
//! condition codes while `C` is also an 8-bit register; resolving that needs
//! a peek one token past the comma, which is why the lexer exposes
//! save/restore of its position.

use crate::core::expr::{eval_expr, ExprContext, SymbolLookup};
use crate::core::tokenizer::{Lexer, TokenKind};
use crate::tlcs900::conditions::{condition_name, lookup_condition, Condition};
use crate::tlcs900::registers::{
    lookup_control_register, lookup_register, register_name, OperandSize, Register,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Immediate,
    Register,
    RegIndirect,
    PostInc,
    PreDec,
    Indexed,
    IndexedReg,
    Direct,
    Condition,
}

#[derive(Debug, Clone)]
pub struct Operand {
    pub mode: AddrMode,
    pub size: OperandSize,
    pub reg: Option<Register>,
    pub index_reg: Option<Register>,
    pub condition: Option<Condition>,
    /// Immediate value, displacement, or direct address.
    pub value: i64,
    /// False when an unresolved forward reference contributed.
    pub value_known: bool,
    /// True only when every contributor was a literal or EQU/SET.
    pub constant: bool,
    /// Explicit `:8`/`:16`/`:24` suffix; 0 means auto-select.
    pub addr_size: u8,
    /// Retained for bare identifiers, for control-register operands and
    /// macro argument reconstruction.
    pub symbol_name: Option<String>,
}

impl Operand {
    fn empty(mode: AddrMode) -> Self {
        Self {
            mode,
            size: OperandSize::None,
            reg: None,
            index_reg: None,
            condition: None,
            value: 0,
            value_known: true,
            constant: true,
            addr_size: 0,
            symbol_name: None,
        }
    }

    pub fn register(reg: Register, size: OperandSize) -> Self {
        Self {
            size,
            reg: Some(reg),
            ..Self::empty(AddrMode::Register)
        }
    }

    pub fn condition(cc: Condition) -> Self {
        Self {
            condition: Some(cc),
            ..Self::empty(AddrMode::Condition)
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(
            self.mode,
            AddrMode::RegIndirect
                | AddrMode::PostInc
                | AddrMode::PreDec
                | AddrMode::Indexed
                | AddrMode::IndexedReg
                | AddrMode::Direct
        )
    }

    /// Render the operand back to source-ish text for macro argument
    /// reconstruction.
    pub fn reconstruct(&self) -> String {
        match self.mode {
            AddrMode::Immediate => match &self.symbol_name {
                Some(name) => name.clone(),
                None => self.value.to_string(),
            },
            AddrMode::Register => self.reg.map(register_name).unwrap_or("?").to_string(),
            AddrMode::Condition => self
                .condition
                .map(condition_name)
                .unwrap_or("T")
                .to_string(),
            AddrMode::RegIndirect => {
                format!("({})", self.reg.map(register_name).unwrap_or("?"))
            }
            AddrMode::PostInc => format!("({}+)", self.reg.map(register_name).unwrap_or("?")),
            AddrMode::PreDec => format!("(-{})", self.reg.map(register_name).unwrap_or("?")),
            AddrMode::Indexed => format!(
                "({}{:+})",
                self.reg.map(register_name).unwrap_or("?"),
                self.value
            ),
            AddrMode::IndexedReg => format!(
                "({}+{})",
                self.reg.map(register_name).unwrap_or("?"),
                self.index_reg.map(register_name).unwrap_or("?")
            ),
            AddrMode::Direct => format!("({})", self.value),
        }
    }
}

/// Parse one operand. Returns `Ok(None)` when the operand slot is empty.
pub fn parse_operand(
    lexer: &mut Lexer,
    ctx: &mut dyn ExprContext,
) -> Result<Option<Operand>, String> {
    let tok = lexer.peek();

    if matches!(tok.kind, TokenKind::Eof | TokenKind::Comma) {
        return Ok(None);
    }

    if tok.kind == TokenKind::LParen {
        return parse_parenthesised(lexer, ctx).map(Some);
    }

    if tok.kind == TokenKind::Identifier {
        let is_reg = lookup_register(&tok.text);
        let is_cc = lookup_condition(&tok.text);

        if let (Some((reg, size)), Some(cc)) = (is_reg, is_cc) {
            return Ok(Some(disambiguate_register_condition(lexer, reg, size, cc)));
        }
        if let Some((reg, size)) = is_reg {
            lexer.next();
            return Ok(Some(Operand::register(reg, size)));
        }
        if let Some(cc) = is_cc {
            lexer.next();
            return Ok(Some(Operand::condition(cc)));
        }
        if lookup_control_register(&tok.text).is_some() {
            // Control-register names are not symbols; keep the name for the
            // LDC encoder.
            lexer.next();
            let mut op = Operand::empty(AddrMode::Immediate);
            op.value_known = false;
            op.constant = false;
            op.symbol_name = Some(tok.text.clone());
            return Ok(Some(op));
        }
    }

    // Immediate expression, with an optional # prefix.
    if tok.kind == TokenKind::Hash {
        lexer.next();
    }

    // A bare identifier keeps its name alongside the resolved value so
    // macro invocations can reconstruct their argument text.
    let first = lexer.peek();
    if first.kind == TokenKind::Identifier {
        let saved = lexer.save_state();
        lexer.next();
        let after = lexer.peek();
        if matches!(after.kind, TokenKind::Eof | TokenKind::Comma) {
            let mut op = Operand::empty(AddrMode::Immediate);
            op.symbol_name = Some(first.text.clone());
            match ctx.symbol_value(&first.text) {
                SymbolLookup::Value { value, constant } => {
                    op.value = value;
                    op.constant = constant;
                }
                SymbolLookup::Undefined => {
                    if ctx.emit_pass() {
                        return Err(format!("undefined symbol '{}'", first.text));
                    }
                    op.value_known = false;
                    op.constant = false;
                }
            }
            return Ok(Some(op));
        }
        lexer.restore_state(saved);
    }

    let value = eval_expr(lexer, ctx).map_err(|e| e.message)?;
    let mut op = Operand::empty(AddrMode::Immediate);
    op.value = value.value;
    op.value_known = value.known;
    op.constant = value.constant;
    Ok(Some(op))
}

/// Rule for names that read as both register and condition: peek one token
/// past the comma. A following `(`, `#`, `$`, number, or register means the
/// name was a register; anything else makes it a condition.
fn disambiguate_register_condition(
    lexer: &mut Lexer,
    reg: Register,
    size: OperandSize,
    cc: Condition,
) -> Operand {
    let saved = lexer.save_state();
    lexer.next(); // the ambiguous identifier

    if lexer.peek().kind != TokenKind::Comma {
        return Operand::register(reg, size);
    }

    lexer.next(); // comma
    let after_comma = lexer.peek();
    lexer.restore_state(saved);
    lexer.next(); // re-consume the identifier

    let register_follows = matches!(
        after_comma.kind,
        TokenKind::LParen | TokenKind::Hash | TokenKind::Dollar | TokenKind::Number
    ) || (after_comma.kind == TokenKind::Identifier
        && lookup_register(&after_comma.text).is_some());

    if register_follows {
        Operand::register(reg, size)
    } else {
        Operand::condition(cc)
    }
}

fn parse_parenthesised(lexer: &mut Lexer, ctx: &mut dyn ExprContext) -> Result<Operand, String> {
    lexer.next(); // (

    let tok = lexer.peek();

    if tok.kind == TokenKind::Identifier {
        if let Some((reg, size)) = lookup_register(&tok.text) {
            lexer.next();
            return parse_register_memory(lexer, ctx, reg, size);
        }
    }

    // (-reg) pre-decrement
    if tok.kind == TokenKind::Minus {
        let saved = lexer.save_state();
        lexer.next();
        let inner = lexer.peek();
        if inner.kind == TokenKind::Identifier {
            if let Some((reg, size)) = lookup_register(&inner.text) {
                lexer.next();
                if lexer.peek().kind == TokenKind::RParen {
                    lexer.next();
                    let mut op = Operand::empty(AddrMode::PreDec);
                    op.reg = Some(reg);
                    op.size = size;
                    parse_trailing_addr_size(lexer, &mut op);
                    return Ok(op);
                }
                return Err("invalid pre-decrement addressing".to_string());
            }
        }
        lexer.restore_state(saved);
    }

    // (expr) direct memory addressing
    let value = eval_expr(lexer, ctx).map_err(|e| e.message)?;
    let mut op = Operand::empty(AddrMode::Direct);
    op.value = value.value;
    op.value_known = value.known;
    op.constant = value.constant;
    parse_inner_addr_size(lexer, &mut op);
    if lexer.peek().kind != TokenKind::RParen {
        return Err("expected ')' after address".to_string());
    }
    lexer.next();
    parse_trailing_addr_size(lexer, &mut op);
    Ok(op)
}

fn parse_register_memory(
    lexer: &mut Lexer,
    ctx: &mut dyn ExprContext,
    reg: Register,
    size: OperandSize,
) -> Result<Operand, String> {
    match lexer.peek().kind {
        TokenKind::Plus => {
            lexer.next();

            // (reg+) post-increment
            if lexer.peek().kind == TokenKind::RParen {
                lexer.next();
                let mut op = Operand::empty(AddrMode::PostInc);
                op.reg = Some(reg);
                op.size = size;
                parse_trailing_addr_size(lexer, &mut op);
                return Ok(op);
            }

            // (reg + r8) register-indexed
            let next = lexer.peek();
            if next.kind == TokenKind::Identifier {
                if let Some((index, index_size)) = lookup_register(&next.text) {
                    if index_size == OperandSize::Byte {
                        lexer.next();
                        if lexer.peek().kind != TokenKind::RParen {
                            return Err("expected ')' after indexed addressing".to_string());
                        }
                        lexer.next();
                        let mut op = Operand::empty(AddrMode::IndexedReg);
                        op.reg = Some(reg);
                        op.size = size;
                        op.index_reg = Some(index);
                        parse_trailing_addr_size(lexer, &mut op);
                        return Ok(op);
                    }
                }
            }

            // (reg + expr) indexed
            let offset = eval_expr(lexer, ctx).map_err(|_| "invalid indexed offset".to_string())?;
            let mut op = Operand::empty(AddrMode::Indexed);
            op.reg = Some(reg);
            op.size = size;
            op.value = offset.value;
            op.value_known = offset.known;
            op.constant = offset.constant;
            parse_inner_addr_size(lexer, &mut op);
            if lexer.peek().kind != TokenKind::RParen {
                return Err("expected ')' after indexed addressing".to_string());
            }
            lexer.next();
            parse_trailing_addr_size(lexer, &mut op);
            Ok(op)
        }
        TokenKind::Minus => {
            lexer.next();
            let offset = eval_expr(lexer, ctx).map_err(|_| "invalid indexed offset".to_string())?;
            let mut op = Operand::empty(AddrMode::Indexed);
            op.reg = Some(reg);
            op.size = size;
            op.value = offset.value.wrapping_neg();
            op.value_known = offset.known;
            op.constant = offset.constant;
            parse_inner_addr_size(lexer, &mut op);
            if lexer.peek().kind != TokenKind::RParen {
                return Err("expected ')' after indexed addressing".to_string());
            }
            lexer.next();
            parse_trailing_addr_size(lexer, &mut op);
            Ok(op)
        }
        TokenKind::RParen => {
            lexer.next();
            let mut op = Operand::empty(AddrMode::RegIndirect);
            op.reg = Some(reg);
            op.size = size;
            parse_trailing_addr_size(lexer, &mut op);
            Ok(op)
        }
        _ => Err("unexpected token in addressing mode".to_string()),
    }
}

/// `:8`/`:16`/`:24` before the closing parenthesis.
fn parse_inner_addr_size(lexer: &mut Lexer, op: &mut Operand) {
    if lexer.peek().kind == TokenKind::Colon {
        lexer.next();
        let tok = lexer.peek();
        if tok.kind == TokenKind::Number {
            lexer.next();
            op.addr_size = tok.value as u8;
        }
    }
}

/// `:8`/`:16`/`:24` after the closing parenthesis.
fn parse_trailing_addr_size(lexer: &mut Lexer, op: &mut Operand) {
    if lexer.peek().kind == TokenKind::Colon {
        lexer.next();
        let tok = lexer.peek();
        if tok.kind == TokenKind::Number {
            lexer.next();
            op.addr_size = tok.value as u8;
        }
    }
}
