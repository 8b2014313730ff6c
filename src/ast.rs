/// Parse tree for HLML sources.
///
/// Declarations, statements and expressions as the parser produced them, all
/// carrying byte spans. The `Display` impls pretty-print with minimal
/// parentheses; printing a tree and re-parsing it yields an equivalent tree,
/// which the resolver's stage dumps and the parser tests both rely on.

use std::fmt;

use crate::source::Span;

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Declaration {
    Entrypoint { body: Statement, span: Span },
    Definition(Definition),
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub public: bool,
    pub identifier: String,
    pub identifier_span: Span,
    pub kind: DefinitionKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum DefinitionKind {
    Link { building: String },
    Using { aliased: Mention },
    Proc { parameters: Vec<Parameter>, body: Statement },
    Const { value: Expression },
    Var { initial: Option<Expression> },
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub identifier: String,
    pub output: bool,
    pub span: Span,
}

/// An optionally source-qualified identifier, `ident` or `scope::ident`.
#[derive(Debug, Clone)]
pub struct Mention {
    pub qualifier: Option<String>,
    pub identifier: String,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LocalVar {
    pub identifier: String,
    pub initial: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Block {
        statements: Vec<Statement>,
        span: Span,
    },
    If {
        variables: Vec<LocalVar>,
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
        span: Span,
    },
    While {
        label: Option<String>,
        variables: Vec<LocalVar>,
        condition: Expression,
        interleaved: Option<Box<Statement>>,
        body: Box<Statement>,
        zero_branch: Option<Box<Statement>>,
        span: Span,
    },
    Break {
        label: Option<String>,
        span: Span,
    },
    Continue {
        label: Option<String>,
        span: Span,
    },
    Return {
        value: Option<Expression>,
        span: Span,
    },
    Local(LocalVar),
    Discard {
        expression: Expression,
        span: Span,
    },
    Increment {
        target: Mention,
        span: Span,
    },
    Decrement {
        target: Mention,
        span: Span,
    },
    Assign {
        target: Mention,
        operator: Option<BinaryOperator>,
        value: Expression,
        span: Span,
    },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Block { span, .. }
            | Statement::If { span, .. }
            | Statement::While { span, .. }
            | Statement::Break { span, .. }
            | Statement::Continue { span, .. }
            | Statement::Return { span, .. }
            | Statement::Discard { span, .. }
            | Statement::Increment { span, .. }
            | Statement::Decrement { span, .. }
            | Statement::Assign { span, .. } => *span,
            Statement::Local(local) => local.span,
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    LogicalOr,
    LogicalAnd,
    Equal,
    NotEqual,
    StrictEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    LeftShift,
    RightShift,
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulus,
}

impl BinaryOperator {
    /// Binding power, loosest first; mirrors the grammar's precedence table.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::LogicalOr => 1,
            BinaryOperator::LogicalAnd => 2,
            BinaryOperator::Equal | BinaryOperator::NotEqual | BinaryOperator::StrictEqual => 3,
            BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => 4,
            BinaryOperator::BitwiseOr => 5,
            BinaryOperator::BitwiseXor => 6,
            BinaryOperator::BitwiseAnd => 7,
            BinaryOperator::LeftShift | BinaryOperator::RightShift => 8,
            BinaryOperator::Add | BinaryOperator::Subtract => 9,
            BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::FloorDivide
            | BinaryOperator::Modulus => 10,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOperator::LogicalOr => "||",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::BitwiseXor => "^",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::FloorDivide => "//",
            BinaryOperator::Modulus => "%",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Promote,
    Negate,
    BitwiseNot,
    LogicalNot,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnaryOperator::Promote => "+",
            UnaryOperator::Negate => "-",
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::LogicalNot => "!",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Number {
        value: f64,
        span: Span,
    },
    Color {
        bits: u32,
        span: Span,
    },
    Str {
        value: String,
        span: Span,
    },
    Symbol(Mention),
    Grouping {
        inner: Box<Expression>,
        span: Span,
    },
    Call {
        procedure: Mention,
        arguments: Vec<Expression>,
        span: Span,
    },
    MemberCall {
        receiver: Box<Expression>,
        name: String,
        name_span: Span,
        arguments: Vec<Expression>,
        span: Span,
    },
    MemberAccess {
        object: Box<Expression>,
        member: String,
        member_span: Span,
        span: Span,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
        span: Span,
    },
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Number { span, .. }
            | Expression::Color { span, .. }
            | Expression::Str { span, .. }
            | Expression::Grouping { span, .. }
            | Expression::Call { span, .. }
            | Expression::MemberCall { span, .. }
            | Expression::MemberAccess { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Unary { span, .. } => *span,
            Expression::Symbol(mention) => mention.span,
        }
    }
}

// ---------------------------------------------------------------------------
// Pretty-printing
// ---------------------------------------------------------------------------

const POSTFIX_PRECEDENCE: u8 = 12;
const UNARY_PRECEDENCE: u8 = 11;

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        write!(f, "    ")?;
    }
    Ok(())
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}::{}", qualifier, self.identifier),
            None => write!(f, "{}", self.identifier),
        }
    }
}

impl Expression {
    fn write_at(&self, f: &mut fmt::Formatter<'_>, surrounding: u8) -> fmt::Result {
        match self {
            Expression::Number { value, .. } => write!(f, "{}", value),
            Expression::Color { bits, .. } => write!(f, "0p{:08x}", bits),
            Expression::Str { value, .. } => write!(f, "\"{}\"", value),
            Expression::Symbol(mention) => write!(f, "{}", mention),
            Expression::Grouping { inner, .. } => inner.write_at(f, surrounding),
            Expression::Call {
                procedure,
                arguments,
                ..
            } => {
                write!(f, "{}(", procedure)?;
                write_arguments(f, arguments)?;
                write!(f, ")")
            }
            Expression::MemberCall {
                receiver,
                name,
                arguments,
                ..
            } => {
                receiver.write_at(f, POSTFIX_PRECEDENCE)?;
                write!(f, ".{}(", name)?;
                write_arguments(f, arguments)?;
                write!(f, ")")
            }
            Expression::MemberAccess { object, member, .. } => {
                object.write_at(f, POSTFIX_PRECEDENCE)?;
                write!(f, ".{}", member)
            }
            Expression::Binary {
                operator,
                left,
                right,
                ..
            } => {
                let precedence = operator.precedence();
                let parenthesized = precedence < surrounding;
                if parenthesized {
                    write!(f, "(")?;
                }
                left.write_at(f, precedence)?;
                write!(f, " {} ", operator)?;
                // Left associativity: the right child re-parenthesizes at the
                // next tighter level.
                right.write_at(f, precedence + 1)?;
                if parenthesized {
                    write!(f, ")")?;
                }
                Ok(())
            }
            Expression::Unary {
                operator, operand, ..
            } => {
                let parenthesized = UNARY_PRECEDENCE < surrounding;
                if parenthesized {
                    write!(f, "(")?;
                }
                write!(f, "{}", operator)?;
                // A nested unary operand is parenthesized so `-(-x)` never
                // prints as `--x`.
                operand.write_at(f, UNARY_PRECEDENCE + 1)?;
                if parenthesized {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[Expression]) -> fmt::Result {
    for (index, argument) in arguments.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        argument.write_at(f, 0)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_at(f, 0)
    }
}

impl LocalVar {
    fn write_head(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var {}", self.identifier)?;
        if let Some(initial) = &self.initial {
            write!(f, " = {}", initial)?;
        }
        Ok(())
    }
}

impl Statement {
    /// Print a simple statement without its terminating semicolon; used by
    /// the interleaved clause of `while`.
    fn write_head(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Local(local) => local.write_head(f),
            Statement::Discard { expression, .. } => write!(f, "{}", expression),
            Statement::Increment { target, .. } => write!(f, "{}++", target),
            Statement::Decrement { target, .. } => write!(f, "{}--", target),
            Statement::Assign {
                target,
                operator,
                value,
                ..
            } => match operator {
                Some(operator) => write!(f, "{} {}= {}", target, operator, value),
                None => write!(f, "{} = {}", target, value),
            },
            Statement::Break { label, .. } => match label {
                Some(label) => write!(f, "break {}", label),
                None => write!(f, "break"),
            },
            Statement::Continue { label, .. } => match label {
                Some(label) => write!(f, "continue {}", label),
                None => write!(f, "continue"),
            },
            Statement::Return { value, .. } => match value {
                Some(value) => write!(f, "return {}", value),
                None => write!(f, "return"),
            },
            _ => Ok(()),
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Statement::Block { statements, .. } => {
                writeln!(f, "{{")?;
                for statement in statements {
                    indent(f, depth + 1)?;
                    statement.write_indented(f, depth + 1)?;
                    writeln!(f)?;
                }
                indent(f, depth)?;
                write!(f, "}}")
            }
            Statement::If {
                variables,
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                write!(f, "if ")?;
                for variable in variables {
                    variable.write_head(f)?;
                    write!(f, "; ")?;
                }
                write!(f, "{} ", condition)?;
                then_branch.write_indented(f, depth)?;
                if let Some(else_branch) = else_branch {
                    write!(f, " else ")?;
                    else_branch.write_indented(f, depth)?;
                }
                Ok(())
            }
            Statement::While {
                label,
                variables,
                condition,
                interleaved,
                body,
                zero_branch,
                ..
            } => {
                if let Some(label) = label {
                    write!(f, "{}: ", label)?;
                }
                write!(f, "while ")?;
                for variable in variables {
                    variable.write_head(f)?;
                    write!(f, "; ")?;
                }
                write!(f, "{}", condition)?;
                if let Some(interleaved) = interleaved {
                    write!(f, "; ")?;
                    interleaved.write_head(f)?;
                }
                write!(f, " ")?;
                body.write_indented(f, depth)?;
                if let Some(zero_branch) = zero_branch {
                    write!(f, " else ")?;
                    zero_branch.write_indented(f, depth)?;
                }
                Ok(())
            }
            simple => {
                simple.write_head(f)?;
                write!(f, ";")
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declaration::Entrypoint { body, .. } => {
                write!(f, "entrypoint ")?;
                body.write_indented(f, 0)
            }
            Declaration::Definition(definition) => write!(f, "{}", definition),
        }
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.public {
            write!(f, "*")?;
        }
        match &self.kind {
            DefinitionKind::Link { building } => {
                if building == &self.identifier {
                    write!(f, "link {};", self.identifier)
                } else {
                    write!(f, "link {} = {};", self.identifier, building)
                }
            }
            DefinitionKind::Using { aliased } => {
                write!(f, "using {} as {};", aliased, self.identifier)
            }
            DefinitionKind::Proc { parameters, body } => {
                write!(f, "proc {}(", self.identifier)?;
                for (index, parameter) in parameters.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", parameter.identifier)?;
                    if parameter.output {
                        write!(f, "&")?;
                    }
                }
                write!(f, ") ")?;
                body.write_indented(f, 0)
            }
            DefinitionKind::Const { value } => {
                write!(f, "const {} = {};", self.identifier, value)
            }
            DefinitionKind::Var { initial } => {
                write!(f, "var {}", self.identifier)?;
                if let Some(initial) = initial {
                    write!(f, " = {}", initial)?;
                }
                write!(f, ";")
            }
        }
    }
}
