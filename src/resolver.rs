/// Resolver: from a parsed source to its global definition map.
///
/// No semantic analysis happens here; the resolver exists so the checker can
/// address globals by identifier instead of by declaration position. It
/// catches duplicate identifiers and duplicate entrypoints, and optionally
/// dumps the intermediate representations of each stage for inspection.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{Declaration, Definition, Statement};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Result};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::source::{Source, Span};

/// One resolved source: its optional entrypoint and its globals by name.
#[derive(Debug)]
pub struct Resolution {
    pub source: Arc<Source>,
    pub entrypoint: Option<(Statement, Span)>,
    pub globals: HashMap<String, Rc<Definition>>,
    /// Declaration order, used when a whole source is checked front to back.
    pub order: Vec<String>,
}

/// Lex, parse, and resolve one source. When `artifacts` names a directory,
/// the intermediate representations are dumped into it as
/// `<source>.<stage>.hlml` files.
pub fn resolve(source: Arc<Source>, artifacts: Option<&Path>) -> Result<Resolution> {
    if let Some(directory) = artifacts {
        dump(directory, &source.name, "contents", &source.contents)?;
        let tokens = Lexer::new(source.clone()).tokenize()?;
        let mut listing = String::new();
        for (token, span) in &tokens {
            let _ = writeln!(listing, "{}..{}\t{}", span.start, span.end, token.explanation());
        }
        dump(directory, &source.name, "tokens", &listing)?;
    }

    let declarations = Parser::new(source.clone())?.parse()?;

    if let Some(directory) = artifacts {
        let mut listing = String::new();
        for declaration in &declarations {
            let _ = writeln!(listing, "{}", declaration);
        }
        dump(directory, &source.name, "declarations", &listing)?;
    }

    let mut entrypoint = None;
    let mut globals: HashMap<String, Rc<Definition>> = HashMap::new();
    let mut order = Vec::new();

    for declaration in declarations {
        match declaration {
            Declaration::Entrypoint { body, span } => {
                if entrypoint.is_some() {
                    return Err(Diagnostic::located(
                        source.clone(),
                        span,
                        DiagnosticKind::Redeclaration("entrypoint".to_string()),
                    ));
                }
                entrypoint = Some((body, span));
            }
            Declaration::Definition(definition) => {
                let identifier = definition.identifier.clone();
                if globals.contains_key(&identifier) {
                    return Err(Diagnostic::located(
                        source.clone(),
                        definition.identifier_span,
                        DiagnosticKind::Redeclaration(identifier),
                    ));
                }
                order.push(identifier.clone());
                globals.insert(identifier, Rc::new(definition));
            }
        }
    }

    Ok(Resolution {
        source,
        entrypoint,
        globals,
        order,
    })
}

fn dump(directory: &Path, source: &str, stage: &str, contents: &str) -> Result<()> {
    let path = directory.join(format!("{}.{}.hlml", source, stage));
    std::fs::create_dir_all(directory).and_then(|_| std::fs::write(&path, contents)).map_err(
        |cause| {
            Diagnostic::named(
                source,
                DiagnosticKind::IoFailure {
                    operation: "write",
                    path: path.display().to_string(),
                    cause: cause.to_string(),
                },
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_text(text: &str) -> Result<Resolution> {
        resolve(Source::new("t", "t.hlml", text), None)
    }

    #[test]
    fn globals_are_keyed_by_identifier() {
        let resolution =
            resolve_text("link cell1; const a = 1; var b; entrypoint { }").unwrap();
        assert!(resolution.entrypoint.is_some());
        assert_eq!(resolution.order, vec!["cell1", "a", "b"]);
        assert!(resolution.globals.contains_key("a"));
    }

    #[test]
    fn duplicate_identifier_is_a_redeclaration() {
        let diagnostic = resolve_text("const a = 1; var a;").unwrap_err();
        assert!(matches!(diagnostic.kind, DiagnosticKind::Redeclaration(name) if name == "a"));
    }

    #[test]
    fn second_entrypoint_is_a_redeclaration() {
        let diagnostic = resolve_text("entrypoint { } entrypoint { }").unwrap_err();
        assert!(matches!(diagnostic.kind, DiagnosticKind::Redeclaration(_)));
    }

    #[test]
    fn resolution_is_deterministic() {
        let text = "const a = 1; const b = a; var c; entrypoint { }";
        let first = resolve_text(text).unwrap();
        let second = resolve_text(text).unwrap();
        assert_eq!(first.order, second.order);
        let mut names: Vec<_> = first.globals.keys().collect();
        names.sort();
        let mut again: Vec<_> = second.globals.keys().collect();
        again.sort();
        assert_eq!(names, again);
    }
}
