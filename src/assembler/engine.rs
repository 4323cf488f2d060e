// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler state and per-line processing.
//!
//! One `Assembler` instance owns everything for a run: symbols, the output
//! image, diagnostics, the macro collector, and the pass state. The sizing
//! iterations and the emit pass replay the same source through
//! `parse_line`; the only difference is whether emitted bytes land in the
//! image or merely advance the program counter.

use crate::core::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::core::expr::{eval_expr, ExprContext, ExprValue, SymbolLookup};
use crate::core::macro_processor::{
    is_endm_line, parse_macro_args, substitute_params, MacroCollector, MAX_MACRO_DEPTH,
};
use crate::core::output::{CodeSink, OutputImage};
use crate::core::symbol_table::{DefineResult, SymbolKind, SymbolTable};
use crate::core::tokenizer::{Lexer, TokenKind};
use crate::tlcs900::operand::{parse_operand, Operand};
use crate::tlcs900::{encode_instruction, EncodeCtx, EncodeResult};

pub const MAX_INCLUDE_DEPTH: u32 = 16;
pub const MAX_OPERANDS: usize = 4;
const ERROR_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Sizing,
    Emit,
}

pub struct Assembler {
    pub symbols: SymbolTable,
    pub image: OutputImage,
    pub diagnostics: Vec<Diagnostic>,

    pub pc: u32,
    pub org: u32,
    pub pass: Pass,
    pub sizing_iteration: u32,

    pub max_mode: bool,
    pub verbose: bool,
    pub errors: bool,
    pub error_count: u32,
    pub warning_count: u32,

    pub current_file: String,
    pub current_line: u32,
    pub include_depth: u32,
    pub macro_depth: u32,

    pub(crate) collector: MacroCollector,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            image: OutputImage::new(),
            diagnostics: Vec::new(),
            pc: 0,
            org: 0,
            pass: Pass::Sizing,
            sizing_iteration: 0,
            // The target family normally runs with 24-bit addressing.
            max_mode: true,
            verbose: false,
            errors: false,
            error_count: 0,
            warning_count: 0,
            current_file: String::new(),
            current_line: 0,
            include_depth: 0,
            macro_depth: 0,
            collector: MacroCollector::new(),
        }
    }

    pub fn is_emit_pass(&self) -> bool {
        self.pass == Pass::Emit
    }

    /// Redefinitions are only rejected on the first sizing iteration;
    /// afterwards symbol values legitimately move between iterations.
    pub(crate) fn strict_define(&self) -> bool {
        self.pass == Pass::Sizing && self.sizing_iteration == 1
    }

    pub(crate) fn begin_sizing_iteration(&mut self, iteration: u32) {
        self.pass = Pass::Sizing;
        self.sizing_iteration = iteration;
        self.pc = 0;
        self.org = 0;
        self.errors = false;
        self.error_count = 0;
        self.warning_count = 0;
        self.macro_depth = 0;
        self.include_depth = 0;
        self.collector.reset();
        // Keep only the latest iteration's diagnostics; every iteration
        // replays the whole source.
        self.diagnostics.clear();
    }

    pub(crate) fn begin_emit_pass(&mut self) {
        self.pass = Pass::Emit;
        self.pc = 0;
        self.org = 0;
        self.errors = false;
        self.error_count = 0;
        self.macro_depth = 0;
        self.include_depth = 0;
        self.collector.reset();
        self.image = OutputImage::new();
    }

    // ---- diagnostics ----

    pub(crate) fn error(&mut self, kind: AsmErrorKind, msg: &str) {
        self.report(AsmError::new(kind, msg, None));
    }

    pub(crate) fn report(&mut self, err: AsmError) {
        self.diagnostics.push(
            Diagnostic::new(self.current_line, Severity::Error, err)
                .with_file(Some(self.current_file.clone())),
        );
        self.errors = true;
        self.error_count += 1;
    }

    pub(crate) fn warning(&mut self, kind: AsmErrorKind, msg: &str) {
        self.diagnostics.push(
            Diagnostic::new(self.current_line, Severity::Warning, AsmError::new(kind, msg, None))
                .with_file(Some(self.current_file.clone())),
        );
        self.warning_count += 1;
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.error_count > ERROR_LIMIT
    }

    // ---- emitter (pass-aware) ----

    pub(crate) fn emit_byte(&mut self, b: u8) {
        if self.pass == Pass::Emit {
            if let Err(err) = self.image.store(self.pc, b) {
                self.report(AsmError::new(AsmErrorKind::Io, &err.to_string(), None));
            }
        }
        self.pc = self.pc.wrapping_add(1);
    }

    pub(crate) fn emit_bytes(&mut self, bytes: &[u8]) {
        if self.pass == Pass::Emit {
            if let Err(err) = self.image.store_slice(self.pc, bytes) {
                self.report(AsmError::new(AsmErrorKind::Io, &err.to_string(), None));
            }
        }
        self.pc = self.pc.wrapping_add(bytes.len() as u32);
    }

    pub(crate) fn emit_fill(&mut self, count: u32, value: u8) {
        if self.pass == Pass::Emit {
            for ix in 0..count {
                if let Err(err) = self.image.store(self.pc.wrapping_add(ix), value) {
                    self.report(AsmError::new(AsmErrorKind::Io, &err.to_string(), None));
                    break;
                }
            }
        }
        self.pc = self.pc.wrapping_add(count);
    }

    // ---- symbols ----

    pub(crate) fn define_symbol(&mut self, name: &str, kind: SymbolKind, value: i64) {
        let strict = self.strict_define();
        let file = self.current_file.clone();
        let line = self.current_line;
        if let DefineResult::Redefinition { file, line } =
            self.symbols.define(name, kind, value, &file, line, strict)
        {
            self.error(
                AsmErrorKind::Symbol,
                &format!("symbol '{name}' already defined at {file}:{line}"),
            );
        }
    }

    fn define_label(&mut self, name: &str) {
        self.define_symbol(name, SymbolKind::Label, self.pc as i64);
    }

    pub(crate) fn eval(&mut self, lexer: &mut Lexer) -> Result<ExprValue, AsmError> {
        eval_expr(lexer, self)
            .map_err(|err| AsmError::new(AsmErrorKind::Expression, &err.message, None))
    }

    // ---- line processing ----

    /// Process one source line. Returns false when an error was reported.
    pub fn parse_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            return true;
        }

        // While a macro definition is open, lines accumulate instead of
        // assembling; only ENDM falls through to normal parsing.
        if self.collector.is_collecting() && !is_endm_line(line) {
            self.collector.add_line(line);
            return true;
        }

        let mut lexer = Lexer::new(line);
        let mut label = String::new();
        let mut mnemonic = String::new();

        let mut tok = lexer.next();
        if tok.kind == TokenKind::Identifier {
            let next = lexer.peek();
            if next.kind == TokenKind::Colon {
                label = tok.text.clone();
                lexer.next();
                tok = lexer.next();
            } else if !line.starts_with(' ') && !line.starts_with('\t') {
                // Identifier at column 1 without a colon is a label, unless
                // it names a directive written unindented.
                if next.kind == TokenKind::Identifier
                    && (next.text.eq_ignore_ascii_case("MACRO")
                        || next.text.eq_ignore_ascii_case("EQU")
                        || next.text.eq_ignore_ascii_case("SET"))
                {
                    label = tok.text.clone();
                    tok = lexer.next();
                    mnemonic = tok.text.clone();
                } else if next.kind == TokenKind::Equals {
                    label = tok.text.clone();
                    tok = lexer.next();
                } else if super::directives::is_directive_name(&tok.text) {
                    mnemonic = tok.text.clone();
                } else {
                    label = tok.text.clone();
                    tok = lexer.next();
                }
            } else {
                mnemonic = tok.text.clone();
            }
        }

        if !label.is_empty() && mnemonic.is_empty() && tok.kind == TokenKind::Identifier {
            mnemonic = tok.text.clone();
        }

        // Label-only line.
        if tok.kind == TokenKind::Eof {
            if !label.is_empty() {
                self.define_label(&label);
            }
            return true;
        }

        // `name = expr` constant definition.
        if tok.kind == TokenKind::Equals
            || (!label.is_empty() && lexer.peek().kind == TokenKind::Equals)
        {
            if tok.kind != TokenKind::Equals {
                lexer.next();
            }
            let value = match self.eval(&mut lexer) {
                Ok(value) => value,
                Err(err) => {
                    self.report(err);
                    return false;
                }
            };
            if !label.is_empty() {
                self.define_symbol(&label, SymbolKind::Equ, value.value);
            }
            return true;
        }

        if mnemonic.is_empty() {
            self.error(AsmErrorKind::Parser, "expected instruction or directive");
            return false;
        }

        // A label on a directive or instruction line takes the current PC,
        // except where the directive consumes it (EQU/SET/MACRO).
        let consumes_label = mnemonic.eq_ignore_ascii_case("EQU")
            || mnemonic.eq_ignore_ascii_case("SET")
            || mnemonic.eq_ignore_ascii_case("MACRO");
        if !label.is_empty() && !consumes_label {
            self.define_label(&label);
        }

        if let Some(handled) = self.handle_directive(&mut lexer, &mnemonic, &label) {
            return handled;
        }

        // Operand list, then the instruction encoder.
        let mut ops: Vec<Operand> = Vec::new();
        while ops.len() < MAX_OPERANDS {
            if lexer.peek().kind == TokenKind::Eof {
                break;
            }
            match parse_operand(&mut lexer, self) {
                Ok(Some(op)) => ops.push(op),
                Ok(None) => break,
                Err(msg) => {
                    self.error(AsmErrorKind::Parser, &msg);
                    return false;
                }
            }
            if lexer.peek().kind == TokenKind::Comma {
                lexer.next();
            } else {
                break;
            }
        }

        let ctx = EncodeCtx {
            pc: self.pc,
            emit_pass: self.pass == Pass::Emit,
        };
        let mut sink = CodeSink::new();
        match encode_instruction(&mnemonic, &ops, &ctx, &mut sink) {
            EncodeResult::Handled => {
                self.emit_bytes(sink.bytes());
                true
            }
            EncodeResult::Failed(err) => {
                self.report(err);
                false
            }
            EncodeResult::Unhandled => {
                if self.symbols.macro_entry(&mnemonic).is_some() {
                    let args: Vec<String> = ops.iter().map(Operand::reconstruct).collect();
                    return self.expand_macro(&mnemonic, &args.join(", "));
                }
                self.error(
                    AsmErrorKind::Parser,
                    &format!("unknown instruction or macro: {mnemonic}"),
                );
                false
            }
        }
    }

    // ---- macro expansion ----

    pub(crate) fn expand_macro(&mut self, name: &str, args_str: &str) -> bool {
        if self.macro_depth >= MAX_MACRO_DEPTH {
            self.error(AsmErrorKind::Macro, "macro expansion too deep");
            return false;
        }
        let entry = match self.symbols.macro_entry(name) {
            Some(entry) => entry.clone(),
            None => return false,
        };

        let mut args = parse_macro_args(args_str);
        // Missing trailing arguments expand as empty text.
        while args.len() < entry.params.len() {
            args.push(String::new());
        }

        self.macro_depth += 1;
        let saved_line = self.current_line;
        for body_line in &entry.body {
            let expanded = substitute_params(body_line, &entry.params, &args);
            self.parse_line(&expanded);
        }
        self.current_line = saved_line;
        self.macro_depth -= 1;
        true
    }
}

impl ExprContext for Assembler {
    fn symbol_value(&mut self, name: &str) -> SymbolLookup {
        match self.symbols.get_value(name) {
            Some((value, kind)) => SymbolLookup::Value {
                value,
                constant: matches!(kind, SymbolKind::Equ | SymbolKind::Set),
            },
            None => SymbolLookup::Undefined,
        }
    }

    fn current_address(&self) -> u32 {
        self.pc
    }

    fn emit_pass(&self) -> bool {
        self.pass == Pass::Emit
    }
}
