//! The C/AL language server CLI.
//!
//! Provides the `cals` command with the following subcommands:
//!
//! - `cals check <file>` - Parse a C/AL object file and report diagnostics
//! - `cals lsp` - Run the language server on stdin/stdout
//!
//! Options for `check`:
//! - `--json` - Emit diagnostics as JSON lines instead of reports

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use cal_analysis::SymbolTable;
use cal_common::diagnostic::{Diagnostic, Severity};

#[derive(Parser)]
#[command(name = "cals", version, about = "The C/AL language server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a C/AL object file and report diagnostics
    Check {
        /// Path to the object text file (exported from C/SIDE)
        file: PathBuf,

        /// Emit diagnostics as JSON lines instead of human reports
        #[arg(long)]
        json: bool,
    },
    /// Run the language server on stdin/stdout
    Lsp,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { file, json } => {
            if let Err(e) = check(&file, json) {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
        Commands::Lsp => {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("error: failed to start the async runtime: {}", e);
                    process::exit(1);
                }
            };
            runtime.block_on(cal_lsp::run_server());
        }
    }
}

/// Execute the check pipeline: read -> parse -> build symbols -> report.
fn check(path: &Path, json: bool) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("'{}' does not exist", path.display()));
    }

    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;

    let parse = cal_parser::parse(&source);
    // The symbol table is built for its side value: an object that
    // parses but yields no symbols is usually worth a second look.
    let symbols = SymbolTable::build(&parse.document);

    let has_errors = if json {
        report_json(&parse.diagnostics)
    } else {
        report_diagnostics(&source, &parse.diagnostics)
    };

    if has_errors {
        return Err("check failed due to errors above.".to_string());
    }

    match &parse.document.object {
        Some(object) => eprintln!(
            "  OK: {} {} {} ({} symbols)",
            object.kind.as_str(),
            object.id,
            object.name,
            symbols.get_all_symbols().count()
        ),
        None => eprintln!("  OK: no object declaration found"),
    }

    Ok(())
}

/// Report diagnostics using ariadne. Returns true if any are errors.
fn report_diagnostics(source: &str, diagnostics: &[Diagnostic]) -> bool {
    let mut has_errors = false;

    for diagnostic in diagnostics {
        use ariadne::{Label, Report, ReportKind, Source};
        let kind = match diagnostic.severity {
            Severity::Error => {
                has_errors = true;
                ReportKind::Error
            }
            Severity::Warning => ReportKind::Warning,
        };
        let start = diagnostic.token.span.start as usize;
        let end = (diagnostic.token.span.end as usize).max(start + 1);
        let _ = Report::<std::ops::Range<usize>>::build(kind, start..end)
            .with_message(&diagnostic.message)
            .with_label(Label::new(start..end).with_message(&diagnostic.message))
            .finish()
            .eprint(Source::from(source));
    }

    has_errors
}

/// Report diagnostics as JSON lines. Returns true if any are errors.
fn report_json(diagnostics: &[Diagnostic]) -> bool {
    let mut has_errors = false;
    for diagnostic in diagnostics {
        if diagnostic.is_error() {
            has_errors = true;
        }
        match serde_json::to_string(diagnostic) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("error: could not serialize diagnostic: {}", e),
        }
    }
    has_errors
}
