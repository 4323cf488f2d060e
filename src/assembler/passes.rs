// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pass orchestration: the iterative size-relaxation loop, the emit pass,
//! file/include reading, and output writing.
//!
//! Variable-width memory operands make a single pass impossible: widths
//! depend on label addresses which depend on preceding widths. The driver
//! therefore repeats sizing passes until the end-of-source PC reaches a
//! fixed point, then replays the source once more with the emitter armed.

use std::fs::{self, File};
use std::path::Path;

use serde_json::json;

use crate::assembler::cli::{validate_cli, Cli, CliConfig, OutputFormat};
use crate::assembler::engine::{Assembler, MAX_INCLUDE_DEPTH};
use crate::core::error::{AsmError, AsmErrorKind, AsmRunError, AsmRunReport};

pub const MAX_SIZING_ITERATIONS: u32 = 10;

/// Outcome of a full assembly run.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyResult {
    pub success: bool,
    pub sizing_iterations: u32,
    pub error_count: u32,
}

impl Assembler {
    fn process_lines(&mut self, content: &str) {
        self.current_line = 0;
        for raw in content.lines() {
            self.current_line += 1;
            self.parse_line(raw.trim_end_matches('\r'));
            if self.too_many_errors() {
                self.error(AsmErrorKind::Assembler, "too many errors, stopping");
                break;
            }
        }
    }

    /// Read and assemble one file; used for the root source and for
    /// INCLUDE. Returns false when any error has been recorded.
    pub(crate) fn process_file(&mut self, path: &str) -> bool {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                self.error(AsmErrorKind::Io, &format!("cannot open file '{path}'"));
                return false;
            }
        };

        let prev_file = std::mem::replace(&mut self.current_file, path.to_string());
        let prev_line = self.current_line;
        self.process_lines(&content);
        self.current_file = prev_file;
        self.current_line = prev_line;

        !self.errors
    }

    /// INCLUDE support: resolve relative to the including file, bounded
    /// nesting.
    pub(crate) fn include_file(&mut self, filename: &str) -> bool {
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            self.error(AsmErrorKind::Io, "include nesting too deep");
            return false;
        }
        let resolved = self.resolve_relative_path(filename);
        self.include_depth += 1;
        let ok = self.process_file(&resolved);
        self.include_depth -= 1;
        ok
    }

    fn check_unterminated_macro(&mut self) {
        if self.collector.is_collecting() {
            self.error(
                AsmErrorKind::Macro,
                "unterminated macro definition (missing ENDM)",
            );
            self.collector.reset();
        }
    }

    fn run_passes<F: Fn(&mut Assembler) -> bool>(&mut self, run: F) -> AssemblyResult {
        let mut last_pc: u32 = 0;
        let mut iteration: u32 = 0;

        loop {
            iteration += 1;
            self.begin_sizing_iteration(iteration);
            if self.verbose {
                eprintln!("Pass 1 (iteration {iteration})");
            }
            run(self);
            self.check_unterminated_macro();

            if iteration >= 2 && self.pc == last_pc {
                if self.verbose {
                    eprintln!("  sizes stabilized at iteration {iteration} (PC={})", self.pc);
                }
                break;
            }
            if iteration >= MAX_SIZING_ITERATIONS {
                self.warning(
                    AsmErrorKind::Assembler,
                    &format!("sizes did not stabilize after {MAX_SIZING_ITERATIONS} iterations"),
                );
                break;
            }
            last_pc = self.pc;
        }

        let had_sizing_errors = self.errors;
        let sizing_error_count = self.error_count;

        // Emit even after sizing errors so the user sees diagnostics from
        // both phases; the exit status reflects the union.
        self.begin_emit_pass();
        if self.verbose {
            eprintln!("Pass 2");
        }
        run(self);
        self.check_unterminated_macro();

        AssemblyResult {
            success: !had_sizing_errors && !self.errors,
            sizing_iterations: iteration,
            error_count: sizing_error_count + self.error_count,
        }
    }

    /// Assemble a root source file from disk.
    pub fn assemble_file(&mut self, path: &str) -> AssemblyResult {
        let path = path.to_string();
        self.run_passes(move |asm| asm.process_file(&path))
    }

    /// Assemble in-memory source; `name` labels diagnostics.
    pub fn assemble_source(&mut self, name: &str, source: &str) -> AssemblyResult {
        let name = name.to_string();
        let source = source.to_string();
        self.run_passes(move |asm| {
            asm.current_file = name.clone();
            asm.process_lines(&source);
            !asm.errors
        })
    }
}

/// Run the assembler with command-line arguments.
pub fn run_with_cli(cli: &Cli) -> Result<AsmRunReport, AsmRunError> {
    let config = validate_cli(cli)?;

    let mut assembler = Assembler::new();
    assembler.verbose = config.verbose;

    let input = config.input.to_string_lossy().into_owned();
    let result = assembler.assemble_file(&input);

    // Write whatever was produced, even on failure: a partial image is
    // useful for diffing against the reference ROM.
    if result.success || !assembler.image.is_empty() {
        write_output_file(&assembler, &config)
            .map_err(|err| AsmRunError::new(err, assembler.diagnostics.clone()))?;
    }

    if !result.success {
        return Err(AsmRunError::new(
            AsmError::new(
                AsmErrorKind::Assembler,
                &format!("assembly failed with {} errors", result.error_count),
                None,
            ),
            assembler.diagnostics.clone(),
        ));
    }

    if let Some(labels_path) = &config.labels_file {
        write_labels_file(&assembler, labels_path, config.format)
            .map_err(|err| AsmRunError::new(err, assembler.diagnostics.clone()))?;
    }

    if config.verbose {
        eprintln!(
            "Wrote {} bytes to {} (base address ${:06X})",
            assembler.image.len(),
            config.output.display(),
            assembler.image.base()
        );
    }

    Ok(AsmRunReport::new(
        assembler.diagnostics.clone(),
        assembler.image.len(),
        assembler.image.base(),
    ))
}

fn write_output_file(assembler: &Assembler, config: &CliConfig) -> Result<(), AsmError> {
    let mut file = File::create(&config.output).map_err(|_| {
        AsmError::new(
            AsmErrorKind::Io,
            "cannot open output file",
            Some(&config.output.to_string_lossy()),
        )
    })?;
    assembler
        .image
        .write_bin_file(&mut file)
        .map_err(|err| AsmError::new(AsmErrorKind::Io, &err.to_string(), None))
}

fn write_labels_file(
    assembler: &Assembler,
    path: &Path,
    format: OutputFormat,
) -> Result<(), AsmError> {
    let open_error = |path: &Path| {
        AsmError::new(
            AsmErrorKind::Io,
            "cannot open labels file",
            Some(&path.to_string_lossy()),
        )
    };
    match format {
        OutputFormat::Text => {
            let mut file = File::create(path).map_err(|_| open_error(path))?;
            assembler
                .symbols
                .dump(&mut file)
                .map_err(|err| AsmError::new(AsmErrorKind::Io, &err.to_string(), None))
        }
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = assembler
                .symbols
                .iter()
                .map(|symbol| {
                    json!({
                        "name": symbol.name,
                        "kind": symbol.kind.as_str(),
                        "value": symbol.value,
                    })
                })
                .collect();
            let payload = json!({
                "schema": "asm900-labels-v1",
                "symbols": entries,
            });
            fs::write(path, format!("{payload}\n")).map_err(|_| open_error(path))
        }
    }
}
