/// Recursive descent parser for HLML.
///
/// One token of lookahead, no backtracking: every helper either consumes a
/// construct and returns its tree or consumes nothing and reports absence.
/// Syntax errors carry the explanation text of the offending token.

use std::sync::Arc;

use crate::ast::{
    BinaryOperator, Declaration, Definition, DefinitionKind, Expression, LocalVar, Mention,
    Parameter, Statement, UnaryOperator,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Result};
use crate::lexer::{Lexer, Token};
use crate::source::{Source, Span};

/// The binary-operator levels, loosest binding first. Each level is
/// left-associative.
const LEVELS: &[&[(Token, BinaryOperator)]] = &[
    &[(Token::LogicalOr, BinaryOperator::LogicalOr)],
    &[(Token::LogicalAnd, BinaryOperator::LogicalAnd)],
    &[
        (Token::Equal, BinaryOperator::Equal),
        (Token::NotEqual, BinaryOperator::NotEqual),
        (Token::StrictEqual, BinaryOperator::StrictEqual),
    ],
    &[
        (Token::Less, BinaryOperator::Less),
        (Token::LessEqual, BinaryOperator::LessEqual),
        (Token::Greater, BinaryOperator::Greater),
        (Token::GreaterEqual, BinaryOperator::GreaterEqual),
    ],
    &[(Token::Pipe, BinaryOperator::BitwiseOr)],
    &[(Token::Caret, BinaryOperator::BitwiseXor)],
    &[(Token::Ampersand, BinaryOperator::BitwiseAnd)],
    &[
        (Token::LeftShift, BinaryOperator::LeftShift),
        (Token::RightShift, BinaryOperator::RightShift),
    ],
    &[
        (Token::Plus, BinaryOperator::Add),
        (Token::Minus, BinaryOperator::Subtract),
    ],
    &[
        (Token::Star, BinaryOperator::Multiply),
        (Token::Slash, BinaryOperator::Divide),
        (Token::FloorDiv, BinaryOperator::FloorDivide),
        (Token::Percent, BinaryOperator::Modulus),
    ],
];

/// The compound-assignment operators a simple statement recognizes.
const COMPOUND_ASSIGNS: &[(Token, BinaryOperator)] = &[
    (Token::StarAssign, BinaryOperator::Multiply),
    (Token::SlashAssign, BinaryOperator::Divide),
    (Token::FloorDivAssign, BinaryOperator::FloorDivide),
    (Token::PercentAssign, BinaryOperator::Modulus),
    (Token::PlusAssign, BinaryOperator::Add),
    (Token::MinusAssign, BinaryOperator::Subtract),
    (Token::LeftShiftAssign, BinaryOperator::LeftShift),
    (Token::RightShiftAssign, BinaryOperator::RightShift),
    (Token::AmpersandAssign, BinaryOperator::BitwiseAnd),
    (Token::CaretAssign, BinaryOperator::BitwiseXor),
    (Token::PipeAssign, BinaryOperator::BitwiseOr),
];

pub struct Parser {
    source: Arc<Source>,
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

impl Parser {
    pub fn new(source: Arc<Source>) -> Result<Self> {
        let tokens = Lexer::new(source.clone()).tokenize()?;
        Ok(Parser {
            source,
            tokens,
            pos: 0,
        })
    }

    /// Parse a full source: declarations until end of stream.
    pub fn parse(mut self) -> Result<Vec<Declaration>> {
        let mut declarations = Vec::new();
        while !self.is_at_end() {
            declarations.push(self.parse_declaration()?);
        }
        Ok(declarations)
    }

    // -----------------------------------------------------------------------
    // Token plumbing
    // -----------------------------------------------------------------------

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek_nth(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(token, _)| token)
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => *span,
            None => {
                let end = self.source.contents.len();
                Span::new(end, end)
            }
        }
    }

    fn prev_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|index| self.tokens.get(index)) {
            Some((_, span)) => *span,
            None => Span::default(),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let found = match self.peek() {
            Some(token) => token.explanation(),
            None => "end of source".to_string(),
        };
        Diagnostic::located(
            self.source.clone(),
            self.current_span(),
            DiagnosticKind::SyntaxError {
                expected: expected.to_string(),
                found,
            },
        )
    }

    fn consume(&mut self, expected: Token, explanation: &str) -> Result<()> {
        if self.check(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(explanation))
        }
    }

    fn consume_identifier(&mut self, explanation: &str) -> Result<(String, Span)> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                let span = self.current_span();
                self.pos += 1;
                Ok((name, span))
            }
            _ => Err(self.unexpected(explanation)),
        }
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn parse_declaration(&mut self) -> Result<Declaration> {
        let start = self.current_span();
        if self.check(&Token::Entrypoint) {
            let body = self.parse_statement()?;
            let span = start.merge(self.prev_span());
            return Ok(Declaration::Entrypoint { body, span });
        }

        let public = self.check(&Token::Star);
        let definition = match self.peek() {
            Some(Token::Link) => self.parse_link(public, start)?,
            Some(Token::Using) => self.parse_using(public, start)?,
            Some(Token::Proc) => self.parse_proc(public, start)?,
            Some(Token::Const) => self.parse_const(public, start)?,
            Some(Token::Var) => self.parse_global_var(public, start)?,
            _ => return Err(self.unexpected("a declaration")),
        };
        Ok(Declaration::Definition(definition))
    }

    fn parse_link(&mut self, public: bool, start: Span) -> Result<Definition> {
        self.advance();
        let (identifier, identifier_span) = self.consume_identifier("a link name")?;
        let building = if self.check(&Token::Assign) {
            self.consume_identifier("a building name")?.0
        } else {
            identifier.clone()
        };
        self.consume(Token::Semicolon, "';'")?;
        Ok(Definition {
            public,
            identifier,
            identifier_span,
            kind: DefinitionKind::Link { building },
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_using(&mut self, public: bool, start: Span) -> Result<Definition> {
        self.advance();
        let aliased = self.parse_mention("an aliased symbol")?;
        let (identifier, identifier_span) = if self.check(&Token::As) {
            self.consume_identifier("an alias name")?
        } else {
            (aliased.identifier.clone(), aliased.span)
        };
        self.consume(Token::Semicolon, "';'")?;
        Ok(Definition {
            public,
            identifier,
            identifier_span,
            kind: DefinitionKind::Using { aliased },
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_proc(&mut self, public: bool, start: Span) -> Result<Definition> {
        self.advance();
        let (identifier, identifier_span) = self.consume_identifier("a procedure name")?;
        self.consume(Token::OpeningParenthesis, "'('")?;
        let mut parameters = Vec::new();
        if self.peek() != Some(&Token::ClosingParenthesis) {
            loop {
                let (name, name_span) = self.consume_identifier("a parameter name")?;
                let output = self.check(&Token::Ampersand);
                parameters.push(Parameter {
                    identifier: name,
                    output,
                    span: name_span.merge(self.prev_span()),
                });
                if !self.check(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(Token::ClosingParenthesis, "')'")?;
        let body = self.parse_block()?;
        Ok(Definition {
            public,
            identifier,
            identifier_span,
            kind: DefinitionKind::Proc { parameters, body },
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_const(&mut self, public: bool, start: Span) -> Result<Definition> {
        self.advance();
        let (identifier, identifier_span) = self.consume_identifier("a constant name")?;
        self.consume(Token::Assign, "'='")?;
        let value = self.parse_expression()?;
        self.consume(Token::Semicolon, "';'")?;
        Ok(Definition {
            public,
            identifier,
            identifier_span,
            kind: DefinitionKind::Const { value },
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_global_var(&mut self, public: bool, start: Span) -> Result<Definition> {
        self.advance();
        let (identifier, identifier_span) = self.consume_identifier("a variable name")?;
        let initial = if self.check(&Token::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(Token::Semicolon, "';'")?;
        Ok(Definition {
            public,
            identifier,
            identifier_span,
            kind: DefinitionKind::Var { initial },
            span: start.merge(self.prev_span()),
        })
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.consume(Token::OpeningBrace, "'{'")?;
        let mut statements = Vec::new();
        while self.peek() != Some(&Token::ClosingBrace) {
            if self.is_at_end() {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.consume(Token::ClosingBrace, "'}'")?;
        Ok(Statement::Block {
            statements,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        match self.peek() {
            Some(Token::OpeningBrace) => self.parse_block(),
            Some(Token::If) => self.parse_if(start),
            Some(Token::While) => self.parse_while(None, start),
            Some(Token::Identifier(_))
                if self.peek_nth(1) == Some(&Token::Colon)
                    && self.peek_nth(2) == Some(&Token::While) =>
            {
                let (label, _) = self.consume_identifier("a loop label")?;
                self.advance();
                self.parse_while(Some(label), start)
            }
            Some(Token::Break) => {
                self.advance();
                let label = self.optional_label();
                self.consume(Token::Semicolon, "';'")?;
                Ok(Statement::Break {
                    label,
                    span: start.merge(self.prev_span()),
                })
            }
            Some(Token::Continue) => {
                self.advance();
                let label = self.optional_label();
                self.consume(Token::Semicolon, "';'")?;
                Ok(Statement::Continue {
                    label,
                    span: start.merge(self.prev_span()),
                })
            }
            Some(Token::Return) => {
                self.advance();
                let value = if self.peek() == Some(&Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume(Token::Semicolon, "';'")?;
                Ok(Statement::Return {
                    value,
                    span: start.merge(self.prev_span()),
                })
            }
            Some(Token::Var) => {
                let local = self.parse_local_var()?;
                self.consume(Token::Semicolon, "';'")?;
                Ok(Statement::Local(local))
            }
            _ => {
                let statement = self.parse_simple_statement()?;
                self.consume(Token::Semicolon, "';'")?;
                Ok(statement)
            }
        }
    }

    fn optional_label(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.pos += 1;
                Some(name)
            }
            _ => None,
        }
    }

    fn parse_local_var(&mut self) -> Result<LocalVar> {
        let start = self.current_span();
        self.consume(Token::Var, "'var'")?;
        let (identifier, _) = self.consume_identifier("a variable name")?;
        let initial = if self.check(&Token::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(LocalVar {
            identifier,
            initial,
            span: start.merge(self.prev_span()),
        })
    }

    /// A statement with no own terminator: a local variable, a mutation, or
    /// a discarded expression.
    fn parse_simple_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        if self.peek() == Some(&Token::Var) {
            return Ok(Statement::Local(self.parse_local_var()?));
        }
        let expression = self.parse_expression()?;

        if self.check(&Token::PlusPlus) {
            let target = self.mutation_target(expression)?;
            return Ok(Statement::Increment {
                target,
                span: start.merge(self.prev_span()),
            });
        }
        if self.check(&Token::MinusMinus) {
            let target = self.mutation_target(expression)?;
            return Ok(Statement::Decrement {
                target,
                span: start.merge(self.prev_span()),
            });
        }
        if self.check(&Token::Assign) {
            let target = self.mutation_target(expression)?;
            let value = self.parse_expression()?;
            return Ok(Statement::Assign {
                target,
                operator: None,
                value,
                span: start.merge(self.prev_span()),
            });
        }
        for (token, operator) in COMPOUND_ASSIGNS {
            if self.peek() == Some(token) {
                self.pos += 1;
                let target = self.mutation_target(expression)?;
                let value = self.parse_expression()?;
                return Ok(Statement::Assign {
                    target,
                    operator: Some(*operator),
                    value,
                    span: start.merge(self.prev_span()),
                });
            }
        }

        Ok(Statement::Discard {
            expression,
            span: start.merge(self.prev_span()),
        })
    }

    fn mutation_target(&self, expression: Expression) -> Result<Mention> {
        match expression {
            Expression::Symbol(mention) => Ok(mention),
            other => Err(Diagnostic::located(
                self.source.clone(),
                other.span(),
                DiagnosticKind::SyntaxError {
                    expected: "a variable".to_string(),
                    found: "an expression".to_string(),
                },
            )),
        }
    }

    fn parse_if(&mut self, start: Span) -> Result<Statement> {
        self.consume(Token::If, "'if'")?;
        let variables = self.parse_leading_variables()?;
        let condition = self.parse_expression()?;
        let then_branch = Box::new(self.parse_block()?);
        let else_branch = if self.check(&Token::Else) {
            // Either a block or a chained `if`.
            let branch = match self.peek() {
                Some(Token::If) => {
                    let chained = self.current_span();
                    self.parse_if(chained)?
                }
                _ => self.parse_block()?,
            };
            Some(Box::new(branch))
        } else {
            None
        };
        Ok(Statement::If {
            variables,
            condition,
            then_branch,
            else_branch,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_while(&mut self, label: Option<String>, start: Span) -> Result<Statement> {
        self.consume(Token::While, "'while'")?;
        let variables = self.parse_leading_variables()?;
        let condition = self.parse_expression()?;
        let interleaved = if self.check(&Token::Semicolon) {
            Some(Box::new(self.parse_simple_statement()?))
        } else {
            None
        };
        let body = Box::new(self.parse_block()?);
        let zero_branch = if self.check(&Token::Else) {
            Some(Box::new(self.parse_block()?))
        } else {
            None
        };
        Ok(Statement::While {
            label,
            variables,
            condition,
            interleaved,
            body,
            zero_branch,
            span: start.merge(self.prev_span()),
        })
    }

    /// `var x = …;` declarations before a control-flow condition.
    fn parse_leading_variables(&mut self) -> Result<Vec<LocalVar>> {
        let mut variables = Vec::new();
        while self.peek() == Some(&Token::Var) {
            variables.push(self.parse_local_var()?);
            self.consume(Token::Semicolon, "';'")?;
        }
        Ok(variables)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_level(0)
    }

    fn parse_level(&mut self, level: usize) -> Result<Expression> {
        let Some(operators) = LEVELS.get(level) else {
            return self.parse_unary();
        };
        let mut left = self.parse_level(level + 1)?;
        'outer: loop {
            for (token, operator) in operators.iter() {
                if self.peek() == Some(token) {
                    self.pos += 1;
                    let right = self.parse_level(level + 1)?;
                    let span = left.span().merge(right.span());
                    left = Expression::Binary {
                        operator: *operator,
                        left: Box::new(left),
                        right: Box::new(right),
                        span,
                    };
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let start = self.current_span();
        let operator = match self.peek() {
            Some(Token::Plus) => Some(UnaryOperator::Promote),
            Some(Token::Minus) => Some(UnaryOperator::Negate),
            Some(Token::Tilde) => Some(UnaryOperator::BitwiseNot),
            Some(Token::Not) => Some(UnaryOperator::LogicalNot),
            _ => None,
        };
        if let Some(operator) = operator {
            self.pos += 1;
            let operand = Box::new(self.parse_unary()?);
            let span = start.merge(operand.span());
            return Ok(Expression::Unary {
                operator,
                operand,
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expression = self.parse_primary()?;
        loop {
            if self.peek() == Some(&Token::OpeningParenthesis) {
                let Expression::Symbol(procedure) = expression else {
                    return Err(self.unexpected("'.', an operator, or the end of the expression"));
                };
                self.advance();
                let arguments = self.parse_arguments()?;
                let span = procedure.span.merge(self.prev_span());
                expression = Expression::Call {
                    procedure,
                    arguments,
                    span,
                };
            } else if self.check(&Token::Dot) {
                let (member, member_span) = self.consume_identifier("a member name")?;
                if self.check(&Token::OpeningParenthesis) {
                    let arguments = self.parse_arguments()?;
                    let span = expression.span().merge(self.prev_span());
                    expression = Expression::MemberCall {
                        receiver: Box::new(expression),
                        name: member,
                        name_span: member_span,
                        arguments,
                        span,
                    };
                } else {
                    let span = expression.span().merge(member_span);
                    expression = Expression::MemberAccess {
                        object: Box::new(expression),
                        member,
                        member_span,
                        span,
                    };
                }
            } else {
                return Ok(expression);
            }
        }
    }

    /// Comma-separated arguments up to the closing parenthesis, which is
    /// consumed.
    fn parse_arguments(&mut self) -> Result<Vec<Expression>> {
        let mut arguments = Vec::new();
        if self.peek() != Some(&Token::ClosingParenthesis) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.check(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(Token::ClosingParenthesis, "')'")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let span = self.current_span();
        match self.peek().cloned() {
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Expression::Number { value, span })
            }
            Some(Token::Color(bits)) => {
                self.pos += 1;
                Ok(Expression::Color { bits, span })
            }
            Some(Token::Str(value)) => {
                self.pos += 1;
                Ok(Expression::Str { value, span })
            }
            Some(Token::OpeningParenthesis) => {
                self.pos += 1;
                let inner = Box::new(self.parse_expression()?);
                self.consume(Token::ClosingParenthesis, "')'")?;
                Ok(Expression::Grouping {
                    inner,
                    span: span.merge(self.prev_span()),
                })
            }
            Some(Token::Identifier(_)) => {
                let mention = self.parse_mention("a symbol")?;
                Ok(Expression::Symbol(mention))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_mention(&mut self, explanation: &str) -> Result<Mention> {
        let (first, first_span) = self.consume_identifier(explanation)?;
        if self.check(&Token::DoubleColon) {
            let (identifier, identifier_span) = self.consume_identifier("a qualified symbol")?;
            Ok(Mention {
                qualifier: Some(first),
                identifier,
                span: first_span.merge(identifier_span),
            })
        } else {
            Ok(Mention {
                qualifier: None,
                identifier: first,
                span: first_span,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Declaration> {
        let source = Source::new("t", "t.hlml", text);
        Parser::new(source)
            .and_then(Parser::parse)
            .expect("parsing should succeed")
    }

    fn parse_error(text: &str) -> Diagnostic {
        let source = Source::new("t", "t.hlml", text);
        Parser::new(source)
            .and_then(Parser::parse)
            .expect_err("parsing should fail")
    }

    fn printed(text: &str) -> String {
        parse(text)
            .iter()
            .map(|declaration| declaration.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn hello_world_declarations() {
        let declarations = parse(
            "link message1; entrypoint { mlog::print(\"hi\"); mlog::printflush(message1); }",
        );
        assert_eq!(declarations.len(), 2);
        assert!(matches!(declarations[0], Declaration::Definition(_)));
        assert!(matches!(declarations[1], Declaration::Entrypoint { .. }));
    }

    #[test]
    fn link_with_distinct_building() {
        let declarations = parse("link screen = display1;");
        let Declaration::Definition(definition) = &declarations[0] else {
            panic!("expected a definition");
        };
        assert_eq!(definition.identifier, "screen");
        let DefinitionKind::Link { building } = &definition.kind else {
            panic!("expected a link");
        };
        assert_eq!(building, "display1");
    }

    #[test]
    fn public_star_marks_definition() {
        let declarations = parse("*const step = 4;");
        let Declaration::Definition(definition) = &declarations[0] else {
            panic!("expected a definition");
        };
        assert!(definition.public);
    }

    #[test]
    fn using_defaults_alias_to_identifier() {
        let declarations = parse("using mlog::print;");
        let Declaration::Definition(definition) = &declarations[0] else {
            panic!("expected a definition");
        };
        assert_eq!(definition.identifier, "print");
    }

    #[test]
    fn proc_with_output_parameter() {
        let declarations = parse("proc pop(stack, value&) { value = 1; }");
        let Declaration::Definition(definition) = &declarations[0] else {
            panic!("expected a definition");
        };
        let DefinitionKind::Proc { parameters, .. } = &definition.kind else {
            panic!("expected a procedure");
        };
        assert!(!parameters[0].output);
        assert!(parameters[1].output);
    }

    #[test]
    fn precedence_shapes_the_tree() {
        let declarations = parse("const c = 1 + 2 * 3;");
        let Declaration::Definition(definition) = &declarations[0] else {
            panic!("expected a definition");
        };
        let DefinitionKind::Const { value } = &definition.kind else {
            panic!("expected a constant");
        };
        let Expression::Binary { operator, right, .. } = value else {
            panic!("expected a binary expression");
        };
        assert_eq!(*operator, BinaryOperator::Add);
        assert!(
            matches!(**right, Expression::Binary { operator: BinaryOperator::Multiply, .. })
        );
    }

    #[test]
    fn left_associativity() {
        let declarations = parse("const c = 8 - 4 - 2;");
        let Declaration::Definition(definition) = &declarations[0] else {
            panic!("expected a definition");
        };
        let DefinitionKind::Const { value } = &definition.kind else {
            panic!("expected a constant");
        };
        let Expression::Binary { left, .. } = value else {
            panic!("expected a binary expression");
        };
        assert!(
            matches!(**left, Expression::Binary { operator: BinaryOperator::Subtract, .. })
        );
    }

    #[test]
    fn while_with_all_clauses() {
        let declarations =
            parse("entrypoint { outer: while var i = 0; i < 10; i += 1 { break outer; } else { } }");
        let Declaration::Entrypoint { body, .. } = &declarations[0] else {
            panic!("expected the entrypoint");
        };
        let Statement::Block { statements, .. } = body else {
            panic!("expected a block");
        };
        let Statement::While {
            label,
            variables,
            interleaved,
            zero_branch,
            ..
        } = &statements[0]
        else {
            panic!("expected a while");
        };
        assert_eq!(label.as_deref(), Some("outer"));
        assert_eq!(variables.len(), 1);
        assert!(interleaved.is_some());
        assert!(zero_branch.is_some());
    }

    #[test]
    fn if_with_leading_variable() {
        let declarations = parse("entrypoint { if var v = 3; v < 10 { } else { v = 0; } }");
        let Declaration::Entrypoint { body, .. } = &declarations[0] else {
            panic!("expected the entrypoint");
        };
        let Statement::Block { statements, .. } = body else {
            panic!("expected a block");
        };
        assert!(matches!(&statements[0], Statement::If { variables, .. } if variables.len() == 1));
    }

    #[test]
    fn member_call_and_access() {
        let declarations = parse("entrypoint { var a = cell1.read(0); var b = conveyor1.enabled; }");
        let printed = declarations[0].to_string();
        assert!(printed.contains("cell1.read(0)"));
        assert!(printed.contains("conveyor1.enabled"));
    }

    #[test]
    fn unexpected_token_is_reported_with_explanation() {
        let diagnostic = parse_error("const = 4;");
        let DiagnosticKind::SyntaxError { found, .. } = &diagnostic.kind else {
            panic!("expected a syntax error");
        };
        assert_eq!(found, "'='");
    }

    #[test]
    fn calling_a_grouping_is_rejected() {
        parse_error("entrypoint { (x)(1); }");
    }

    #[test]
    fn pretty_printed_source_reparses_to_a_fixed_point() {
        let text = "link cell1;\n\
                    *const answer = 40 + 2;\n\
                    proc clamp(value, low, high, out&) {\n\
                        if value < low { out = low; } else { out = value; }\n\
                        while var i = 0; i < 10 && value != 0; i += 1 { i ^= 2 + 1 * 3; }\n\
                    }\n\
                    entrypoint { mlog::write(answer, cell1, ~(-1)); }";
        let once = printed(text);
        let twice = {
            let source = Source::new("t", "t.hlml", once.clone());
            Parser::new(source)
                .and_then(Parser::parse)
                .expect("printed source should reparse")
                .iter()
                .map(|declaration| declaration.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(once, twice);
    }
}
