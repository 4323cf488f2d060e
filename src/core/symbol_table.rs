// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Symbol table for labels, constants, and macros.

use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Equ,
    /// Reassignable constant.
    Set,
    Macro,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Label => "LABEL",
            SymbolKind::Equ => "EQU",
            SymbolKind::Set => "SET",
            SymbolKind::Macro => "MACRO",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub value: i64,
    pub defined: bool,
    pub referenced: bool,
    pub file: String,
    pub line: u32,
    /// Macro definition payload; empty for other kinds.
    pub params: Vec<String>,
    pub body: Vec<String>,
}

/// Result of a define attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum DefineResult {
    Ok,
    /// The name is already bound; carries the original definition site.
    Redefinition { file: String, line: u32 },
}

/// Symbols are never removed before the end of an assembly run, and lookup
/// is case-insensitive throughout.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<Symbol>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.entries
            .iter_mut()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    /// Define or update a symbol.
    ///
    /// SET symbols may always be re-bound. Other kinds report a redefinition
    /// only when `strict` holds (the first sizing iteration); later
    /// iterations and the emit pass legitimately move label values, so they
    /// update in place.
    pub fn define(
        &mut self,
        name: &str,
        kind: SymbolKind,
        value: i64,
        file: &str,
        line: u32,
        strict: bool,
    ) -> DefineResult {
        if let Some(existing) = self.lookup_mut(name) {
            if existing.kind == SymbolKind::Set || kind == SymbolKind::Set {
                existing.kind = kind;
                existing.value = value;
                existing.defined = true;
                return DefineResult::Ok;
            }
            if existing.defined && strict {
                return DefineResult::Redefinition {
                    file: existing.file.clone(),
                    line: existing.line,
                };
            }
            existing.kind = kind;
            existing.value = value;
            existing.defined = true;
            return DefineResult::Ok;
        }

        self.entries.push(Symbol {
            name: name.to_string(),
            kind,
            value,
            defined: true,
            referenced: false,
            file: file.to_string(),
            line,
            params: Vec::new(),
            body: Vec::new(),
        });
        DefineResult::Ok
    }

    /// Define a macro; ownership of the parameter and body lines moves into
    /// the symbol.
    pub fn define_macro(
        &mut self,
        name: &str,
        params: Vec<String>,
        body: Vec<String>,
        file: &str,
        line: u32,
        strict: bool,
    ) -> DefineResult {
        let result = self.define(name, SymbolKind::Macro, 0, file, line, strict);
        if result == DefineResult::Ok {
            if let Some(entry) = self.lookup_mut(name) {
                entry.params = params;
                entry.body = body;
            }
        }
        result
    }

    /// Get a defined symbol's value, marking it referenced.
    pub fn get_value(&mut self, name: &str) -> Option<(i64, SymbolKind)> {
        let entry = self.lookup_mut(name)?;
        entry.referenced = true;
        if !entry.defined {
            return None;
        }
        Some((entry.value, entry.kind))
    }

    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).map(|entry| entry.defined).unwrap_or(false)
    }

    #[must_use]
    pub fn macro_entry(&self, name: &str) -> Option<&Symbol> {
        self.lookup(name)
            .filter(|entry| entry.kind == SymbolKind::Macro)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter()
    }

    /// Aligned-columns symbol dump.
    pub fn dump<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{:<32} {:<8} {}", "Name", "Type", "Value")?;
        writeln!(out, "{:<32} {:<8} {}", "----", "----", "-----")?;
        for entry in &self.entries {
            writeln!(
                out,
                "{:<32} {:<8} ${:08X}",
                entry.name,
                entry.kind.as_str(),
                entry.value as u32
            )?;
        }
        Ok(())
    }
}
