/// Lexer for HLML source text.
///
/// Scans UTF-8 forward over the retained source; non-ASCII is only legal
/// inside comments and strings. `#` starts a line comment. Compounding
/// punctuation follows a fixed ladder: doubled first, then the `=` suffix on
/// whichever base was chosen (`<`, `<<`, `<=`, `<<=`).
///
/// Numbers take an optional base prefix (`0b`, `0o`, `0d`, `0x`); `0p` is the
/// color form (6 or 8 hex digits, alpha defaulting to 0xFF). Digit runs
/// accumulate into a 128-bit significand so overflow surfaces here, not in
/// the checker.

use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Result};
use crate::number::{Accumulator, NumberError};
use crate::source::{Source, Span};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Entrypoint,
    Link,
    Using,
    As,
    Proc,
    Const,
    Var,
    If,
    Else,
    While,
    Break,
    Continue,
    Return,

    // Literals
    Identifier(String),
    Number(f64),
    Color(u32),
    Str(String),

    // Delimiters
    OpeningBrace,
    ClosingBrace,
    OpeningParenthesis,
    ClosingParenthesis,
    Semicolon,
    Comma,
    Dot,
    Colon,
    DoubleColon,

    // Operators
    Plus,
    PlusPlus,
    PlusAssign,
    Minus,
    MinusMinus,
    MinusAssign,
    Star,
    StarAssign,
    Slash,
    SlashAssign,
    FloorDiv,
    FloorDivAssign,
    Percent,
    PercentAssign,
    Ampersand,
    AmpersandAssign,
    LogicalAnd,
    Pipe,
    PipeAssign,
    LogicalOr,
    Caret,
    CaretAssign,
    Tilde,
    Not,
    NotEqual,
    LeftShift,
    LeftShiftAssign,
    RightShift,
    RightShiftAssign,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Assign,
    Equal,
    StrictEqual,
}

impl Token {
    /// Short human text used by syntax errors.
    pub fn explanation(&self) -> String {
        match self {
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Number(value) => format!("number constant '{}'", value),
            Token::Color(bits) => format!("color constant '0p{:08x}'", bits),
            Token::Str(text) => format!("string constant \"{}\"", text),
            other => format!("'{}'", other),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Entrypoint => "entrypoint",
            Token::Link => "link",
            Token::Using => "using",
            Token::As => "as",
            Token::Proc => "proc",
            Token::Const => "const",
            Token::Var => "var",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Return => "return",
            Token::Identifier(name) => return write!(f, "{}", name),
            Token::Number(value) => return write!(f, "{}", value),
            Token::Color(bits) => return write!(f, "0p{:08x}", bits),
            Token::Str(text) => return write!(f, "\"{}\"", text),
            Token::OpeningBrace => "{",
            Token::ClosingBrace => "}",
            Token::OpeningParenthesis => "(",
            Token::ClosingParenthesis => ")",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::DoubleColon => "::",
            Token::Plus => "+",
            Token::PlusPlus => "++",
            Token::PlusAssign => "+=",
            Token::Minus => "-",
            Token::MinusMinus => "--",
            Token::MinusAssign => "-=",
            Token::Star => "*",
            Token::StarAssign => "*=",
            Token::Slash => "/",
            Token::SlashAssign => "/=",
            Token::FloorDiv => "//",
            Token::FloorDivAssign => "//=",
            Token::Percent => "%",
            Token::PercentAssign => "%=",
            Token::Ampersand => "&",
            Token::AmpersandAssign => "&=",
            Token::LogicalAnd => "&&",
            Token::Pipe => "|",
            Token::PipeAssign => "|=",
            Token::LogicalOr => "||",
            Token::Caret => "^",
            Token::CaretAssign => "^=",
            Token::Tilde => "~",
            Token::Not => "!",
            Token::NotEqual => "!=",
            Token::LeftShift => "<<",
            Token::LeftShiftAssign => "<<=",
            Token::RightShift => ">>",
            Token::RightShiftAssign => ">>=",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::Assign => "=",
            Token::Equal => "==",
            Token::StrictEqual => "===",
        };
        write!(f, "{}", text)
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

pub struct Lexer {
    source: Arc<Source>,
    pos: usize,
}

impl Lexer {
    pub fn new(source: Arc<Source>) -> Self {
        Lexer { source, pos: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<(Token, Span)>> {
        let mut tokens = Vec::new();
        while let Some((token, span)) = self.next_token()? {
            tokens.push((token, span));
        }
        Ok(tokens)
    }

    fn text(&self) -> &str {
        &self.source.contents
    }

    fn current(&self) -> Option<char> {
        self.text()[self.pos..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.text()[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, span: Span, kind: DiagnosticKind) -> Diagnostic {
        Diagnostic::located(self.source.clone(), span, kind)
    }

    fn error_here(&self, start: usize, kind: DiagnosticKind) -> Diagnostic {
        self.error(Span::new(start, self.pos.max(start + 1)), kind)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.current() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(ch) = self.current() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<(Token, Span)>> {
        self.skip_trivia();
        let start = self.pos;
        let Some(ch) = self.current() else {
            return Ok(None);
        };

        let token = if ch.is_ascii_digit() {
            self.read_number(start)?
        } else if ch == '"' {
            self.read_string(start)?
        } else if ch.is_ascii_alphabetic() {
            self.read_word()
        } else {
            self.read_punctuation(start, ch)?
        };

        Ok(Some((token, Span::new(start, self.pos))))
    }

    // -----------------------------------------------------------------------
    // Words
    // -----------------------------------------------------------------------

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let word = &self.text()[start..self.pos];
        match word {
            "entrypoint" => Token::Entrypoint,
            "link" => Token::Link,
            "using" => Token::Using,
            "as" => Token::As,
            "proc" => Token::Proc,
            "const" => Token::Const,
            "var" => Token::Var,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "return" => Token::Return,
            _ => Token::Identifier(word.to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // Strings
    // -----------------------------------------------------------------------

    fn read_string(&mut self, start: usize) -> Result<Token> {
        self.advance();
        let text_start = self.pos;
        loop {
            match self.current() {
                Some('"') => {
                    let text = self.text()[text_start..self.pos].to_string();
                    self.advance();
                    return Ok(Token::Str(text));
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    return Err(self.error(
                        Span::new(start, self.pos),
                        DiagnosticKind::UnterminatedString,
                    ))
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Numbers
    // -----------------------------------------------------------------------

    fn read_number(&mut self, start: usize) -> Result<Token> {
        let radix = if self.current() == Some('0') {
            match self.peek() {
                Some('b') => Some(2),
                Some('o') => Some(8),
                Some('d') => Some(10),
                Some('x') => Some(16),
                Some('p') => {
                    self.advance();
                    self.advance();
                    return self.read_color(start);
                }
                _ => None,
            }
        } else {
            None
        };
        let prefixed = radix.is_some();
        if prefixed {
            self.advance();
            self.advance();
        }
        let radix = radix.unwrap_or(10);

        let mut accumulator = Accumulator::new(radix);
        let whole_digits = self.read_digits(radix, &mut accumulator, false, start)?;
        if prefixed && whole_digits == 0 {
            return Err(self.error_here(start, DiagnosticKind::MalformedNumber));
        }

        if self.current() == Some('.')
            && self.peek().map_or(false, |ch| ch.to_digit(radix).is_some())
        {
            self.advance();
            self.read_digits(radix, &mut accumulator, true, start)?;
        }

        let exponent_marker = if radix == 10 { ('e', 'E') } else { ('p', 'P') };
        if self.current() == Some(exponent_marker.0) || self.current() == Some(exponent_marker.1) {
            self.advance();
            let exponent = self.read_exponent(start)?;
            accumulator
                .apply_exponent(exponent)
                .map_err(|cause| self.number_error(start, cause))?;
        }

        let value = accumulator
            .to_double()
            .map_err(|cause| self.number_error(start, cause))?;
        Ok(Token::Number(value))
    }

    fn read_digits(
        &mut self,
        radix: u32,
        accumulator: &mut Accumulator,
        fraction: bool,
        start: usize,
    ) -> Result<usize> {
        let mut count = 0;
        while let Some(ch) = self.current() {
            if ch == '_' {
                self.advance();
                continue;
            }
            let Some(digit) = ch.to_digit(radix) else {
                break;
            };
            self.advance();
            count += 1;
            let pushed = if fraction {
                accumulator.push_fraction_digit(digit)
            } else {
                accumulator.push_digit(digit)
            };
            pushed.map_err(|cause| self.number_error(start, cause))?;
        }
        Ok(count)
    }

    fn read_exponent(&mut self, start: usize) -> Result<i64> {
        let negative = match self.current() {
            Some('-') => {
                self.advance();
                true
            }
            Some('+') => {
                self.advance();
                false
            }
            _ => false,
        };
        let mut digits = 0usize;
        let mut exponent: i64 = 0;
        while let Some(ch) = self.current() {
            if ch == '_' {
                self.advance();
                continue;
            }
            let Some(digit) = ch.to_digit(10) else {
                break;
            };
            self.advance();
            digits += 1;
            exponent = exponent
                .checked_mul(10)
                .and_then(|widened| widened.checked_add(digit as i64))
                .ok_or_else(|| self.error_here(start, DiagnosticKind::HugeNumber))?;
        }
        if digits == 0 {
            return Err(self.error_here(start, DiagnosticKind::MalformedNumber));
        }
        Ok(if negative { -exponent } else { exponent })
    }

    fn read_color(&mut self, start: usize) -> Result<Token> {
        let mut digits = Vec::new();
        while let Some(ch) = self.current() {
            if ch == '_' {
                self.advance();
                continue;
            }
            let Some(digit) = ch.to_digit(16) else {
                break;
            };
            self.advance();
            digits.push(digit);
        }
        let packed = match digits.len() {
            6 => {
                let rgb = digits.iter().fold(0u32, |bits, &digit| (bits << 4) | digit);
                (rgb << 8) | 0xff
            }
            8 => digits.iter().fold(0u32, |bits, &digit| (bits << 4) | digit),
            _ => return Err(self.error_here(start, DiagnosticKind::MalformedColor)),
        };
        Ok(Token::Color(packed))
    }

    fn number_error(&self, start: usize, cause: NumberError) -> Diagnostic {
        let kind = match cause {
            NumberError::Huge => DiagnosticKind::HugeNumber,
            NumberError::NotRepresentable => DiagnosticKind::NotRepresentable,
        };
        self.error_here(start, kind)
    }

    // -----------------------------------------------------------------------
    // Punctuation
    // -----------------------------------------------------------------------

    fn read_punctuation(&mut self, start: usize, ch: char) -> Result<Token> {
        self.advance();
        let token = match ch {
            '{' => Token::OpeningBrace,
            '}' => Token::ClosingBrace,
            '(' => Token::OpeningParenthesis,
            ')' => Token::ClosingParenthesis,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '~' => Token::Tilde,
            ':' => self.ladder(':', Token::DoubleColon, None, Token::Colon),
            '+' => self.ladder('+', Token::PlusPlus, Some(Token::PlusAssign), Token::Plus),
            '-' => self.ladder('-', Token::MinusMinus, Some(Token::MinusAssign), Token::Minus),
            '*' => self.suffixed(Token::StarAssign, Token::Star),
            '%' => self.suffixed(Token::PercentAssign, Token::Percent),
            '^' => self.suffixed(Token::CaretAssign, Token::Caret),
            '!' => self.suffixed(Token::NotEqual, Token::Not),
            '&' => self.ladder('&', Token::LogicalAnd, Some(Token::AmpersandAssign), Token::Ampersand),
            '|' => self.ladder('|', Token::LogicalOr, Some(Token::PipeAssign), Token::Pipe),
            '/' => self.doubled(
                '/',
                Token::FloorDivAssign,
                Token::FloorDiv,
                Token::SlashAssign,
                Token::Slash,
            ),
            '<' => self.doubled(
                '<',
                Token::LeftShiftAssign,
                Token::LeftShift,
                Token::LessEqual,
                Token::Less,
            ),
            '>' => self.doubled(
                '>',
                Token::RightShiftAssign,
                Token::RightShift,
                Token::GreaterEqual,
                Token::Greater,
            ),
            '=' => self.doubled('=', Token::StrictEqual, Token::Equal, Token::Equal, Token::Assign),
            other => {
                return Err(self.error(
                    Span::new(start, self.pos),
                    DiagnosticKind::UnknownCharacter(other),
                ))
            }
        };
        Ok(token)
    }

    /// `base` alone, doubled, or with an optional `=` suffix.
    fn ladder(
        &mut self,
        double: char,
        doubled: Token,
        suffixed: Option<Token>,
        alone: Token,
    ) -> Token {
        if self.current() == Some(double) {
            self.advance();
            return doubled;
        }
        if let Some(compound) = suffixed {
            if self.current() == Some('=') {
                self.advance();
                return compound;
            }
        }
        alone
    }

    /// `base` alone or with an `=` suffix.
    fn suffixed(&mut self, compound: Token, alone: Token) -> Token {
        if self.current() == Some('=') {
            self.advance();
            compound
        } else {
            alone
        }
    }

    /// The four-way ladder: doubled first, then the `=` suffix on whichever
    /// base was chosen.
    fn doubled(
        &mut self,
        double: char,
        doubled_suffixed: Token,
        doubled: Token,
        suffixed: Token,
        alone: Token,
    ) -> Token {
        if self.current() == Some(double) {
            self.advance();
            if self.current() == Some('=') {
                self.advance();
                doubled_suffixed
            } else {
                doubled
            }
        } else if self.current() == Some('=') {
            self.advance();
            suffixed
        } else {
            alone
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<Token> {
        let source = Source::new("t", "t.hlml", text);
        Lexer::new(source)
            .tokenize()
            .expect("lexing should succeed")
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    fn lex_error(text: &str) -> Diagnostic {
        let source = Source::new("t", "t.hlml", text);
        Lexer::new(source).tokenize().expect_err("lexing should fail")
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            lex("proc busy entrypoint"),
            vec![
                Token::Proc,
                Token::Identifier("busy".into()),
                Token::Entrypoint,
            ]
        );
    }

    #[test]
    fn punctuation_ladders() {
        assert_eq!(
            lex("<< <<= < <= :: : ++ += === == = // //= /= /"),
            vec![
                Token::LeftShift,
                Token::LeftShiftAssign,
                Token::Less,
                Token::LessEqual,
                Token::DoubleColon,
                Token::Colon,
                Token::PlusPlus,
                Token::PlusAssign,
                Token::StrictEqual,
                Token::Equal,
                Token::Assign,
                Token::FloorDiv,
                Token::FloorDivAssign,
                Token::SlashAssign,
                Token::Slash,
            ]
        );
    }

    #[test]
    fn logical_and_bitwise_forms() {
        assert_eq!(
            lex("&& & &= || | |= ! != ~"),
            vec![
                Token::LogicalAnd,
                Token::Ampersand,
                Token::AmpersandAssign,
                Token::LogicalOr,
                Token::Pipe,
                Token::PipeAssign,
                Token::Not,
                Token::NotEqual,
                Token::Tilde,
            ]
        );
    }

    #[test]
    fn decimal_numbers() {
        assert_eq!(
            lex("42 3.14 1_000 2.5e2 1e-3"),
            vec![
                Token::Number(42.0),
                Token::Number(3.14),
                Token::Number(1000.0),
                Token::Number(250.0),
                Token::Number(0.001),
            ]
        );
    }

    #[test]
    fn prefixed_numbers() {
        assert_eq!(
            lex("0b1010 0o17 0d9 0xff 0x1p4"),
            vec![
                Token::Number(10.0),
                Token::Number(15.0),
                Token::Number(9.0),
                Token::Number(255.0),
                Token::Number(65536.0),
            ]
        );
    }

    #[test]
    fn color_constants() {
        assert_eq!(lex("0pff8000"), vec![Token::Color(0xff8000ff)]);
        assert_eq!(lex("0pff800040"), vec![Token::Color(0xff800040)]);
    }

    #[test]
    fn color_with_wrong_digit_count_fails() {
        let diagnostic = lex_error("0pff80");
        assert!(matches!(diagnostic.kind, DiagnosticKind::MalformedColor));
    }

    #[test]
    fn string_is_kept_verbatim() {
        assert_eq!(
            lex("\"Hello, Mindustry!\\n\""),
            vec![Token::Str("Hello, Mindustry!\\n".into())]
        );
    }

    #[test]
    fn unterminated_string_fails() {
        let diagnostic = lex_error("\"oops");
        assert!(matches!(diagnostic.kind, DiagnosticKind::UnterminatedString));
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        assert_eq!(
            lex("var # all of this is ignored ~~ §§\nx"),
            vec![Token::Var, Token::Identifier("x".into())]
        );
    }

    #[test]
    fn non_ascii_outside_string_fails() {
        let diagnostic = lex_error("var § = 1;");
        assert!(matches!(diagnostic.kind, DiagnosticKind::UnknownCharacter('§')));
    }

    #[test]
    fn huge_literal_fails() {
        let diagnostic = lex_error("340282366920938463463374607431768211456");
        assert!(matches!(diagnostic.kind, DiagnosticKind::HugeNumber));
    }

    #[test]
    fn unrepresentable_literal_fails() {
        let diagnostic = lex_error("1e400");
        assert!(matches!(diagnostic.kind, DiagnosticKind::NotRepresentable));
    }

    #[test]
    fn dot_after_number_stays_member_access() {
        assert_eq!(
            lex("5.x"),
            vec![Token::Number(5.0), Token::Dot, Token::Identifier("x".into())]
        );
    }

    #[test]
    fn spans_cover_token_text() {
        let source = Source::new("t", "t.hlml", "var  abc;");
        let tokens = Lexer::new(source).tokenize().unwrap();
        assert_eq!(tokens[1].1, Span::new(5, 8));
    }
}
