// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for asm900.

use clap::Parser;

use asm900::assembler::cli::Cli;
use asm900::assembler::run_with_cli;
use asm900::core::error::Severity;

fn main() {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    match run_with_cli(&cli) {
        Ok(report) => {
            if !quiet {
                for diag in report.diagnostics() {
                    if diag.severity() == Severity::Warning {
                        eprintln!("{}", diag.format());
                    }
                }
            }
        }
        Err(err) => {
            for diag in err.diagnostics() {
                eprintln!("{}", diag.format());
            }
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
