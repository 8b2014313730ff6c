/// Source files and byte spans.
///
/// A `Source` keeps its full text for the lifetime of the compilation so
/// diagnostics can compute line/column coordinates on demand instead of
/// carrying them on every token.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// One loaded source file: bare name, path it was found at, full text.
#[derive(Debug)]
pub struct Source {
    pub name: String,
    pub path: PathBuf,
    pub contents: String,
}

impl Source {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, contents: impl Into<String>) -> Arc<Self> {
        Arc::new(Source {
            name: name.into(),
            path: path.into(),
            contents: contents.into(),
        })
    }

    /// Compute the 1-based line and column of a byte offset by scanning the
    /// retained text from the start.
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        let clamped = offset.min(self.contents.len());
        let prefix = &self.contents.as_bytes()[..clamped];
        let line = prefix.iter().filter(|&&byte| byte == b'\n').count() + 1;
        let column = match prefix.iter().rposition(|&byte| byte == b'\n') {
            Some(newline) => clamped - newline,
            None => clamped + 1,
        };
        (line, column)
    }
}

/// A half-open byte range within one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

impl Default for Span {
    fn default() -> Self {
        Span { start: 0, end: 0 }
    }
}

/// A span pinned to its source, ready to format as `path:line:column` (or
/// `path:line:column:line:column` for multi-character spans).
#[derive(Debug, Clone)]
pub struct Location {
    pub source: Arc<Source>,
    pub span: Span,
}

impl Location {
    pub fn new(source: Arc<Source>, span: Span) -> Self {
        Location { source, span }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start_line, start_column) = self.source.line_column(self.span.start);
        write!(f, "{}:{}:{}", self.source.path.display(), start_line, start_column)?;
        if self.span.len() > 1 {
            let (end_line, end_column) = self.source.line_column(self.span.end);
            write!(f, ":{}:{}", end_line, end_column)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_of_first_byte() {
        let source = Source::new("t", "t.hlml", "var x;\nvar y;\n");
        assert_eq!(source.line_column(0), (1, 1));
    }

    #[test]
    fn line_column_after_newline() {
        let source = Source::new("t", "t.hlml", "var x;\nvar y;\n");
        assert_eq!(source.line_column(7), (2, 1));
        assert_eq!(source.line_column(11), (2, 5));
    }

    #[test]
    fn single_character_location_formats_short() {
        let source = Source::new("t", "t.hlml", "entrypoint { }");
        let location = Location::new(source, Span::new(0, 1));
        assert_eq!(location.to_string(), "t.hlml:1:1");
    }

    #[test]
    fn multi_character_location_formats_both_ends() {
        let source = Source::new("t", "t.hlml", "entrypoint { }");
        let location = Location::new(source, Span::new(0, 10));
        assert_eq!(location.to_string(), "t.hlml:1:1:1:11");
    }

    #[test]
    fn merge_takes_extremes() {
        let merged = Span::new(4, 6).merge(Span::new(1, 5));
        assert_eq!(merged, Span::new(1, 6));
    }
}
