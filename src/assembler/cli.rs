// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};

use crate::core::error::AsmRunError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Two-pass assembler for the Toshiba TLCS-900/H (TMP94C241) with
ASL-compatible syntax. Produces a raw binary image whose first byte
corresponds to the first ORG address; iterative size relaxation resolves
forward references before any byte is emitted, so reassembled sources
reproduce their reference ROMs exactly.";

#[derive(Parser, Debug)]
#[command(
    name = "asm900",
    version = VERSION,
    about = "TLCS-900/H (TMP94C241) assembler with ASL-compatible syntax",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::SetTrue,
        long_help = "Report per-iteration sizing progress and final output statistics."
    )]
    pub verbose: bool,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress diagnostic output for successful assembly runs."
    )]
    pub quiet: bool,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Output binary filename. Defaults to the input with its extension replaced by .rom."
    )]
    pub outfile: Option<PathBuf>,
    #[arg(
        long = "labels",
        value_name = "FILE",
        long_help = "Write assembled symbols to FILE after a successful run."
    )]
    pub labels_file: Option<PathBuf>,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select --labels output format. text is the aligned symbol dump; json is machine-readable."
    )]
    pub format: OutputFormat,
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Validated CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub labels_file: Option<PathBuf>,
    pub format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
}

pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    let output = cli
        .outfile
        .clone()
        .unwrap_or_else(|| default_output_name(&cli.input));
    Ok(CliConfig {
        input: cli.input.clone(),
        output,
        labels_file: cli.labels_file.clone(),
        format: cli.format,
        verbose: cli.verbose,
        quiet: cli.quiet,
    })
}

pub fn default_output_name(input: &Path) -> PathBuf {
    input.with_extension("rom")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_replaces_extension() {
        assert_eq!(
            default_output_name(Path::new("firmware.asm")),
            PathBuf::from("firmware.rom")
        );
        assert_eq!(
            default_output_name(Path::new("dir/game")),
            PathBuf::from("dir/game.rom")
        );
    }

    #[test]
    fn cli_parses_minimal_invocation() {
        let cli = Cli::try_parse_from(["asm900", "input.asm"]).expect("parse");
        assert_eq!(cli.input, PathBuf::from("input.asm"));
        assert!(!cli.verbose);
        let config = validate_cli(&cli).expect("validate");
        assert_eq!(config.output, PathBuf::from("input.rom"));
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "asm900",
            "-v",
            "-o",
            "out.bin",
            "--labels",
            "syms.json",
            "--format",
            "json",
            "input.asm",
        ])
        .expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.outfile, Some(PathBuf::from("out.bin")));
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
