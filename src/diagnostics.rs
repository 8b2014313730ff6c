/// Compiler diagnostics.
///
/// A `Diagnostic` pairs a subject (a bare name or a source location) with a
/// kind. The stable text form is `<subject>: error: <message>`; the binary
/// additionally renders spanned diagnostics through miette for terminal
/// output with source context.

use std::fmt;
use std::sync::Arc;

use miette::{NamedSource, SourceSpan};
use thiserror::Error;

use crate::source::{Location, Source, Span};

// ---------------------------------------------------------------------------
// Diagnostic kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum DiagnosticKind {
    #[error("unknown character '{0}'")]
    UnknownCharacter(char),
    #[error("string constant is not terminated")]
    UnterminatedString,
    #[error("number constant is too large")]
    HugeNumber,
    #[error("number constant is not representable")]
    NotRepresentable,
    #[error("color constant must have 6 or 8 hexadecimal digits")]
    MalformedColor,
    #[error("malformed number constant")]
    MalformedNumber,
    #[error("expected {expected}, found {found}")]
    SyntaxError { expected: String, found: String },
    #[error("'{0}' is already declared")]
    Redeclaration(String),
    #[error("loop label '{0}' is already in use in this nest")]
    RedeclaredLabel(String),
    #[error("'{0}' is not a known symbol")]
    UnknownSymbol(String),
    #[error("'{0}' is not visible from this source")]
    NotVisible(String),
    #[error("'{0}' depends on itself")]
    CyclicDefinition(String),
    #[error("expression is not known at compile time")]
    NotCompileTime,
    #[error("'{0}' cannot be used as a variable")]
    NonVariableAccess(String),
    #[error("'{0}' is not a sensible property")]
    NonSensibleProperty(String),
    #[error("'{0}' is not a procedure")]
    NotAProcedure(String),
    #[error("'{name}' takes {parameters} parameters but {arguments} arguments were passed")]
    TooManyArguments {
        name: String,
        parameters: usize,
        arguments: usize,
    },
    #[error("break or continue outside of a loop")]
    NotInLoop,
    #[error("no enclosing loop is labeled '{0}'")]
    BadLabel(String),
    #[error("source '{0}' does not declare an entrypoint")]
    MissingEntrypoint(String),
    #[error("could not {operation} '{path}': {cause}")]
    IoFailure {
        operation: &'static str,
        path: String,
        cause: String,
    },
}

// ---------------------------------------------------------------------------
// Subject — what the diagnostic is about
// ---------------------------------------------------------------------------

/// Either a bare name (a target or source that never got far enough to have
/// positions) or a position inside a loaded source.
#[derive(Debug, Clone)]
pub enum Subject {
    Name(String),
    Location(Location),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Name(name) => write!(f, "{}", name),
            Subject::Location(location) => write!(f, "{}", location),
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub subject: Subject,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn named(name: impl Into<String>, kind: DiagnosticKind) -> Self {
        Diagnostic {
            subject: Subject::Name(name.into()),
            kind,
        }
    }

    pub fn located(source: Arc<Source>, span: Span, kind: DiagnosticKind) -> Self {
        Diagnostic {
            subject: Subject::Location(Location::new(source, span)),
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: error: {}", self.subject, self.kind)
    }
}

impl std::error::Error for Diagnostic {}

/// Checked-failure channel: every pipeline stage aborts on the first
/// diagnostic it raises.
pub type Result<T> = std::result::Result<T, Diagnostic>;

// ---------------------------------------------------------------------------
// Miette adapter — fancy terminal reports in the binary
// ---------------------------------------------------------------------------

#[derive(Debug, Error, miette::Diagnostic)]
#[error("{message}")]
pub struct Report {
    pub message: String,
    #[source_code]
    pub src: NamedSource,
    #[label("here")]
    pub span: SourceSpan,
}

impl Report {
    /// Wrap a diagnostic for miette rendering. Name-only diagnostics have no
    /// source context and keep the plain text form.
    pub fn from_diagnostic(diagnostic: &Diagnostic) -> miette::Report {
        match &diagnostic.subject {
            Subject::Location(location) => miette::Report::new(Report {
                message: diagnostic.kind.to_string(),
                src: NamedSource::new(
                    location.source.path.display().to_string(),
                    location.source.contents.clone(),
                ),
                span: (location.span.start, location.span.len().max(1)).into(),
            }),
            Subject::Name(_) => miette::miette!("{}", diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;

    #[test]
    fn named_diagnostic_formats_stably() {
        let diagnostic = Diagnostic::named("t", DiagnosticKind::UnknownSymbol("frob".into()));
        assert_eq!(diagnostic.to_string(), "t: error: 'frob' is not a known symbol");
    }

    #[test]
    fn located_diagnostic_carries_line_and_column() {
        let source = Source::new("t", "dir/t.hlml", "var §;\n");
        let diagnostic =
            Diagnostic::located(source, Span::new(4, 5), DiagnosticKind::UnknownCharacter('§'));
        assert_eq!(
            diagnostic.to_string(),
            "dir/t.hlml:1:5: error: unknown character '§'"
        );
    }

    #[test]
    fn io_failure_mentions_operation_and_cause() {
        let diagnostic = Diagnostic::named(
            "t",
            DiagnosticKind::IoFailure {
                operation: "read",
                path: "t.hlml".into(),
                cause: "no such file".into(),
            },
        );
        assert_eq!(
            diagnostic.to_string(),
            "t: error: could not read 't.hlml': no such file"
        );
    }
}
