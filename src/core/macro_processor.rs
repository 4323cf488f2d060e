// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! MACRO/ENDM definition collection and invocation expansion.
//!
//! The collector lives inside the assembler instance; a line that arrives
//! while a definition is open is appended to the body instead of being
//! assembled. Expansion substitutes arguments at identifier boundaries and
//! feeds the resulting lines back through the normal line parser.

pub const MAX_MACRO_DEPTH: u32 = 16;

/// Accumulates one macro definition between MACRO and ENDM.
#[derive(Debug, Default)]
pub struct MacroCollector {
    name: Option<String>,
    params: Vec<String>,
    body: Vec<String>,
}

impl MacroCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collecting(&self) -> bool {
        self.name.is_some()
    }

    /// Begin collecting; `params_str` is the raw remainder of the MACRO
    /// line, split on commas and whitespace.
    pub fn start(&mut self, name: &str, params_str: &str) -> Result<(), ()> {
        if self.is_collecting() {
            return Err(());
        }
        self.name = Some(name.to_string());
        self.params = params_str
            .split([',', ' ', '\t'])
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        self.body = Vec::new();
        Ok(())
    }

    pub fn add_line(&mut self, line: &str) {
        self.body.push(line.to_string());
    }

    /// Close the definition, yielding (name, params, body).
    pub fn finish(&mut self) -> Option<(String, Vec<String>, Vec<String>)> {
        let name = self.name.take()?;
        Some((
            name,
            std::mem::take(&mut self.params),
            std::mem::take(&mut self.body),
        ))
    }

    pub fn reset(&mut self) {
        self.name = None;
        self.params.clear();
        self.body.clear();
    }
}

/// True when the line is an ENDM statement (optionally indented, optionally
/// followed by whitespace or a comment).
pub fn is_endm_line(line: &str) -> bool {
    let trimmed = line.trim_start().as_bytes();
    if trimmed.len() < 4 || !trimmed[..4].eq_ignore_ascii_case(b"ENDM") {
        return false;
    }
    matches!(trimmed.get(4), None | Some(b' ') | Some(b'\t') | Some(b';'))
}

/// Split a macro invocation's argument string on top-level commas.
/// Parenthesised groups stay intact so `(XIX+2)` travels as one argument.
pub fn parse_macro_args(args_str: &str) -> Vec<String> {
    let mut args = Vec::new();
    let bytes = args_str.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] == b';' {
            break;
        }

        let start = pos;
        let mut paren_depth = 0i32;
        while pos < bytes.len() {
            match bytes[pos] {
                b'(' => paren_depth += 1,
                b')' => paren_depth -= 1,
                b',' | b';' if paren_depth <= 0 => break,
                _ => {}
            }
            pos += 1;
        }

        let arg = args_str[start..pos].trim_end();
        if !arg.is_empty() {
            args.push(arg.to_string());
        }
        if pos < bytes.len() && bytes[pos] == b',' {
            pos += 1;
        } else if pos < bytes.len() && bytes[pos] == b';' {
            break;
        }
    }

    args
}

/// Substitute macro parameters with arguments in one body line.
///
/// Matches are case-insensitive and must fall on identifier boundaries so a
/// parameter `n` does not fire inside `n2` or `burn`.
pub fn substitute_params(line: &str, params: &[String], args: &[String]) -> String {
    let bytes = line.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(line.len());
    let mut pos = 0;

    'outer: while pos < bytes.len() {
        for (param, arg) in params.iter().zip(args.iter()) {
            let plen = param.len();
            if pos + plen > bytes.len() {
                continue;
            }
            if !bytes[pos..pos + plen].eq_ignore_ascii_case(param.as_bytes()) {
                continue;
            }
            let prev_ok = pos == 0 || {
                let prev = bytes[pos - 1];
                !prev.is_ascii_alphanumeric() && prev != b'_'
            };
            let next_ok = pos + plen >= bytes.len() || {
                let next = bytes[pos + plen];
                !next.is_ascii_alphanumeric() && next != b'_'
            };
            if prev_ok && next_ok {
                out.extend_from_slice(arg.as_bytes());
                pos += plen;
                continue 'outer;
            }
        }
        out.push(bytes[pos]);
        pos += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
