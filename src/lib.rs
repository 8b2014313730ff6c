/// HLML Compiler Library
///
/// Module layout:
///   - source      — source files, byte spans, on-demand line/column
///   - diagnostics — diagnostic kinds, stable text form, miette adapter
///   - number      — 128-bit literal accumulator and double rescaler
///   - lexer       — tokens and the UTF-8 scanner
///   - ast         — parse tree and its pretty-printer
///   - parser      — recursive descent front-end
///   - resolver    — per-source global maps, duplicate detection, stage dumps
///   - builtins    — the `mlog` catalog (constants and instruction templates)
///   - sem         — semantic tree: knowns, names, checked definitions
///   - checker     — cross-source driver, cycles, scopes, constant folding
///   - mlog        — lowered instruction set and text rendering
///   - builder     — lowering to the instruction stream
///   - loader      — include-dir source locating and batch discovery

pub mod ast;
pub mod builder;
pub mod builtins;
pub mod checker;
pub mod diagnostics;
pub mod lexer;
pub mod loader;
pub mod mlog;
pub mod number;
pub mod parser;
pub mod resolver;
pub mod sem;
pub mod source;

use std::path::PathBuf;

pub use builder::Builder;
pub use checker::{Checker, Target};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use lexer::{Lexer, Token};
pub use loader::Loader;
pub use mlog::Program;
pub use parser::Parser;
pub use sem::{Known, Name};
pub use source::{Source, Span};

/// Compile one target to its emitted instruction text: check the source
/// graph, then lower it. Nothing is written anywhere; the caller owns the
/// output file.
pub fn compile(
    loader: Loader,
    artifacts: Option<PathBuf>,
    target: &str,
) -> diagnostics::Result<String> {
    let checked = Checker::new(loader, artifacts).check(target)?;
    let program = Builder::new(&checked).build()?;
    Ok(program.to_string())
}
