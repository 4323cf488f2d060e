// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Directive handling: layout (ORG/ALIGN/DS), data (DB/DW/DD), constants
//! (EQU/SET), file inclusion, CPU selection, and macro bracketing.

use std::path::Path;

use crate::assembler::engine::Assembler;
use crate::core::error::AsmErrorKind;
use crate::core::symbol_table::SymbolKind;
use crate::core::tokenizer::{Lexer, TokenKind};
use crate::tlcs900::operand::{parse_operand, AddrMode};

/// The full directive name set, for the column-1 label rule: an unindented
/// directive stays a statement rather than becoming a label.
pub(crate) fn is_directive_name(name: &str) -> bool {
    const DIRECTIVES: &[&str] = &[
        "ORG", "EQU", "SET", "DB", "DEFB", "DC.B", "FCB", "BYT", ".BYTE", "DW", "DEFW", "DC.W",
        "FDB", "WOR", ".WORD", "DATA", "DD", "DEFL", "DC.L", ".LONG", "DS", "DEFS", "RMB", "RES",
        ".BLKB", "ALIGN", "INCLUDE", "BINCLUDE", "INCBIN", "CPU", ".CPU", "MAXMODE", "END", "PAGE",
        "NEWPAGE", "LISTING", "PRTINIT", "PRTEXIT", "MACRO", "ENDM",
    ];
    DIRECTIVES.iter().any(|d| d.eq_ignore_ascii_case(name))
}

impl Assembler {
    /// Try the name as a directive. `None` means it was not one and the
    /// caller should attempt instruction encoding; `Some(ok)` is the
    /// directive's outcome.
    pub(crate) fn handle_directive(
        &mut self,
        lexer: &mut Lexer,
        directive: &str,
        label: &str,
    ) -> Option<bool> {
        let upper = directive.to_ascii_uppercase();
        let handled = match upper.as_str() {
            "ORG" => self.dir_org(lexer),
            "EQU" => self.dir_constant(lexer, label, SymbolKind::Equ),
            "SET" => {
                // SET doubles as the bit instruction; only the labelled
                // form is the directive.
                if label.is_empty() {
                    return None;
                }
                self.dir_constant(lexer, label, SymbolKind::Set)
            }
            "DB" | "DEFB" | "DC.B" | "FCB" | "BYT" | ".BYTE" => self.dir_db(lexer),
            "DW" | "DEFW" | "DC.W" | "FDB" | "WOR" | ".WORD" | "DATA" => self.dir_dw(lexer),
            "DD" | "DEFL" | "DC.L" | ".LONG" => self.dir_dd(lexer),
            "DS" | "DEFS" | "RMB" | ".BLKB" => self.dir_ds(lexer),
            "RES" => {
                // RES is also the reset-bit instruction; it is only the
                // define-space directive when the operands do not fit the
                // bit-operation shape.
                if self.res_is_instruction(lexer) {
                    return None;
                }
                self.dir_ds(lexer)
            }
            "ALIGN" => self.dir_align(lexer),
            "INCLUDE" => self.dir_include(lexer),
            "BINCLUDE" | "INCBIN" => self.dir_binclude(lexer),
            "CPU" | ".CPU" => self.dir_cpu(lexer),
            "MAXMODE" => self.dir_maxmode(lexer),
            "END" => true,
            // Listing control is accepted and ignored.
            "PAGE" | "NEWPAGE" | "LISTING" | "PRTINIT" | "PRTEXIT" => true,
            "MACRO" => self.dir_macro(lexer, label),
            "ENDM" => self.dir_endm(),
            _ => return None,
        };
        Some(handled)
    }

    fn dir_org(&mut self, lexer: &mut Lexer) -> bool {
        let value = match self.eval(lexer) {
            Ok(value) => value,
            Err(err) => {
                self.report(err);
                return false;
            }
        };
        if !value.known && self.is_emit_pass() {
            self.error(AsmErrorKind::Directive, "ORG value must be known in pass 1");
            return false;
        }
        self.pc = value.value as u32;
        self.org = value.value as u32;
        self.image.set_base(self.org);
        true
    }

    fn dir_constant(&mut self, lexer: &mut Lexer, label: &str, kind: SymbolKind) -> bool {
        if label.is_empty() {
            self.error(
                AsmErrorKind::Directive,
                &format!("{} requires a label", kind.as_str()),
            );
            return false;
        }
        let value = match self.eval(lexer) {
            Ok(value) => value,
            Err(err) => {
                self.report(err);
                return false;
            }
        };
        self.define_symbol(label, kind, value.value);
        true
    }

    fn dir_db(&mut self, lexer: &mut Lexer) -> bool {
        loop {
            let tok = lexer.peek();
            match tok.kind {
                TokenKind::Str | TokenKind::Char => {
                    lexer.next();
                    let bytes: Vec<u8> = tok.text.bytes().collect();
                    self.emit_bytes(&bytes);
                }
                _ => match self.eval(lexer) {
                    Ok(value) => self.emit_byte(value.value as u8),
                    Err(err) => {
                        self.report(err);
                        return false;
                    }
                },
            }

            if lexer.peek().kind == TokenKind::Comma {
                lexer.next();
            } else {
                return true;
            }
        }
    }

    fn dir_dw(&mut self, lexer: &mut Lexer) -> bool {
        loop {
            match self.eval(lexer) {
                Ok(value) => {
                    let word = (value.value as u16).to_le_bytes();
                    self.emit_bytes(&word);
                }
                Err(err) => {
                    self.report(err);
                    return false;
                }
            }
            if lexer.peek().kind == TokenKind::Comma {
                lexer.next();
            } else {
                return true;
            }
        }
    }

    fn dir_dd(&mut self, lexer: &mut Lexer) -> bool {
        loop {
            match self.eval(lexer) {
                Ok(value) => {
                    let long = (value.value as u32).to_le_bytes();
                    self.emit_bytes(&long);
                }
                Err(err) => {
                    self.report(err);
                    return false;
                }
            }
            if lexer.peek().kind == TokenKind::Comma {
                lexer.next();
            } else {
                return true;
            }
        }
    }

    fn dir_ds(&mut self, lexer: &mut Lexer) -> bool {
        let count = match self.eval(lexer) {
            Ok(value) => value,
            Err(err) => {
                self.report(err);
                return false;
            }
        };
        if count.value < 0 {
            self.error(AsmErrorKind::Directive, "invalid DS expression");
            return false;
        }

        let mut fill: u8 = 0;
        if lexer.peek().kind == TokenKind::Comma {
            lexer.next();
            match self.eval(lexer) {
                Ok(value) => fill = value.value as u8,
                Err(err) => {
                    self.report(err);
                    return false;
                }
            }
        }

        self.emit_fill(count.value as u32, fill);
        true
    }

    fn dir_align(&mut self, lexer: &mut Lexer) -> bool {
        let boundary = match self.eval(lexer) {
            Ok(value) => value.value,
            Err(err) => {
                self.report(err);
                return false;
            }
        };
        if boundary <= 0 || (boundary & (boundary - 1)) != 0 {
            self.error(
                AsmErrorKind::Directive,
                "ALIGN boundary must be a power of 2",
            );
            return false;
        }
        let mask = (boundary - 1) as u32;
        let padding = (boundary as u32).wrapping_sub(self.pc & mask) & mask;
        self.emit_fill(padding, 0);
        true
    }

    /// Trial-parse the operands: `RES n, reg-or-mem` is the bit
    /// instruction; everything else is define-space. The lexer is rewound
    /// either way.
    fn res_is_instruction(&mut self, lexer: &mut Lexer) -> bool {
        let saved = lexer.save_state();
        let mut is_instruction = false;
        if let Ok(Some(first)) = parse_operand(lexer, self) {
            if first.mode == AddrMode::Immediate && lexer.peek().kind == TokenKind::Comma {
                lexer.next();
                if let Ok(Some(second)) = parse_operand(lexer, self) {
                    is_instruction = second.mode == AddrMode::Register || second.is_memory();
                }
            }
        }
        lexer.restore_state(saved);
        is_instruction
    }

    fn dir_include(&mut self, lexer: &mut Lexer) -> bool {
        let tok = lexer.peek();
        let filename = match tok.kind {
            TokenKind::Str | TokenKind::Char => {
                lexer.next();
                tok.text.clone()
            }
            TokenKind::Identifier => collect_unquoted_name(lexer),
            _ => {
                self.error(AsmErrorKind::Directive, "INCLUDE requires a filename");
                return false;
            }
        };
        self.include_file(&filename)
    }

    fn dir_binclude(&mut self, lexer: &mut Lexer) -> bool {
        let tok = lexer.peek();
        let filename = match tok.kind {
            TokenKind::Str | TokenKind::Char => {
                lexer.next();
                tok.text.clone()
            }
            _ => collect_unquoted_name(lexer),
        };

        let mut offset: i64 = 0;
        let mut length: i64 = -1;
        if lexer.peek().kind == TokenKind::Comma {
            lexer.next();
            match self.eval(lexer) {
                Ok(value) => offset = value.value,
                Err(err) => {
                    self.report(err);
                    return false;
                }
            }
            if lexer.peek().kind == TokenKind::Comma {
                lexer.next();
                match self.eval(lexer) {
                    Ok(value) => length = value.value,
                    Err(err) => {
                        self.report(err);
                        return false;
                    }
                }
            }
        }

        let resolved = self.resolve_relative_path(&filename);
        let data = match std::fs::read(&resolved) {
            Ok(data) => data,
            Err(_) => {
                self.error(
                    AsmErrorKind::Io,
                    &format!("cannot open binary file '{resolved}'"),
                );
                return false;
            }
        };

        let file_size = data.len() as i64;
        if offset >= file_size || offset < 0 {
            self.error(AsmErrorKind::Directive, "BINCLUDE offset beyond file size");
            return false;
        }
        let mut length = if length < 0 { file_size - offset } else { length };
        if offset + length > file_size {
            length = file_size - offset;
        }

        let slice = data[offset as usize..(offset + length) as usize].to_vec();
        self.emit_bytes(&slice);
        true
    }

    fn dir_cpu(&mut self, lexer: &mut Lexer) -> bool {
        let tok = lexer.next();
        if tok.kind != TokenKind::Identifier {
            self.error(AsmErrorKind::Directive, "CPU requires a processor name");
            return false;
        }
        let name = tok.text.to_ascii_uppercase();
        let accepted = name == "TLCS900"
            || name == "TLCS900H"
            || name == "TMP94C241"
            || name.starts_with("TLCS")
            || name.starts_with("900");
        if !accepted {
            self.warning(
                AsmErrorKind::Directive,
                &format!("unknown CPU '{}', assuming TLCS-900", tok.text),
            );
        }
        true
    }

    fn dir_maxmode(&mut self, lexer: &mut Lexer) -> bool {
        let tok = lexer.peek();
        if tok.kind == TokenKind::Identifier {
            lexer.next();
            if tok.text.eq_ignore_ascii_case("ON") {
                self.max_mode = true;
            } else if tok.text.eq_ignore_ascii_case("OFF") {
                self.max_mode = false;
            } else {
                self.error(AsmErrorKind::Directive, "MAXMODE expects ON or OFF");
                return false;
            }
        } else {
            self.max_mode = true;
        }
        true
    }

    fn dir_macro(&mut self, lexer: &mut Lexer, label: &str) -> bool {
        if label.is_empty() {
            self.error(AsmErrorKind::Macro, "MACRO requires a name (label)");
            return false;
        }
        // The parameter list is the raw remainder of the line, minus any
        // trailing comment.
        let remainder = lexer.remainder();
        let params = remainder.split(';').next().unwrap_or("");
        if self.collector.start(label, params).is_err() {
            self.error(AsmErrorKind::Macro, "nested macro definitions not allowed");
            return false;
        }
        true
    }

    fn dir_endm(&mut self) -> bool {
        match self.collector.finish() {
            Some((name, params, body)) => {
                let strict = self.strict_define();
                let file = self.current_file.clone();
                let line = self.current_line;
                if let crate::core::symbol_table::DefineResult::Redefinition { file, line } =
                    self.symbols.define_macro(&name, params, body, &file, line, strict)
                {
                    self.error(
                        AsmErrorKind::Symbol,
                        &format!("symbol '{name}' already defined at {file}:{line}"),
                    );
                    return false;
                }
                true
            }
            None => {
                self.error(AsmErrorKind::Macro, "ENDM without MACRO");
                false
            }
        }
    }

    pub(crate) fn resolve_relative_path(&self, filename: &str) -> String {
        if Path::new(filename).is_absolute() {
            return filename.to_string();
        }
        match Path::new(&self.current_file).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                dir.join(filename).to_string_lossy().into_owned()
            }
            _ => filename.to_string(),
        }
    }
}

/// Collect an unquoted filename: identifier and number tokens until a comma
/// or end of line.
fn collect_unquoted_name(lexer: &mut Lexer) -> String {
    let mut name = String::new();
    loop {
        let tok = lexer.peek();
        match tok.kind {
            TokenKind::Comma | TokenKind::Eof => break,
            TokenKind::Identifier | TokenKind::Number => {
                lexer.next();
                name.push_str(&tok.text);
            }
            TokenKind::Dot => {
                lexer.next();
                name.push('.');
            }
            TokenKind::Slash => {
                lexer.next();
                name.push('/');
            }
            _ => {
                lexer.next();
            }
        }
    }
    name
}
