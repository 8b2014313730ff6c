/// The checker: cross-source driver and semantic analysis.
///
/// Sources are loaded, lexed, parsed and resolved on demand, memoized by
/// name. Two visit sets catch cycles: one of sources currently being
/// checked, one of globals currently being checked within each source. Every
/// expression is folded to a `Known` the moment all of its operands are
/// numeric knowns; constant definitions and global initializers must fold
/// completely or checking fails.
///
/// Lookup precedence for an unqualified mention: nearest local, then the
/// current source's globals; anything else is an unknown symbol, except the
/// three keyword constants (`true`, `false`, `null`), which have no token of
/// their own and resolve bare. The rest of the catalog is reached as
/// `mlog::name` or aliased in with `using`. Qualified mentions dispatch to
/// the named source, checking it recursively; only public definitions are
/// visible from other sources.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{self, BinaryOperator, UnaryOperator};
use crate::builtins;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Result};
use crate::loader::Loader;
use crate::resolver;
use crate::sem::{Access, Definition, Expression, Known, Local, Name, Parameter, Statement};
use crate::source::{Source, Span};

/// Tolerance the target's `equal`/`notEqual` comparisons use; `===` compares
/// exactly.
const EQUALITY_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

/// The linear local-variable stack. Nested scopes share the storage: a child
/// remembers the parent's frontier with `mark` and gives the entries back
/// with `truncate`. Lookup scans backward so the innermost binding shadows.
pub struct Scope {
    entries: Vec<String>,
}

impl Scope {
    pub fn new() -> Self {
        Scope { entries: Vec::new() }
    }

    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    pub fn introduce(&mut self, identifier: impl Into<String>) {
        self.entries.push(identifier.into());
    }

    pub fn lookup(&self, identifier: &str) -> bool {
        self.entries.iter().rev().any(|entry| entry == identifier)
    }
}

// ---------------------------------------------------------------------------
// Checked output
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CheckedSource {
    pub globals: HashMap<String, Rc<Definition>>,
    pub order: Vec<String>,
    pub entrypoint: Option<Statement>,
}

/// A fully checked target: the entry source plus everything it pulled in,
/// in discovery order.
#[derive(Debug)]
pub struct Target {
    pub entry: String,
    pub sources: HashMap<String, CheckedSource>,
    pub discovery: Vec<String>,
}

impl Target {
    pub fn source(&self, name: &str) -> Option<&CheckedSource> {
        self.sources.get(name)
    }

    pub fn definition(&self, name: &Name) -> Option<&Rc<Definition>> {
        self.sources
            .get(&name.source)
            .and_then(|source| source.globals.get(&name.identifier))
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

struct Unit {
    source: Arc<Source>,
    entry_ast: Option<(ast::Statement, Span)>,
    parsed: HashMap<String, Rc<ast::Definition>>,
    order: Vec<String>,
    checked: HashMap<String, Rc<Definition>>,
    checking: HashSet<String>,
}

/// Per-source context threaded through statement and expression checking.
#[derive(Clone)]
struct Cx {
    current: String,
    source: Arc<Source>,
}

impl Cx {
    fn error(&self, span: Span, kind: DiagnosticKind) -> Diagnostic {
        Diagnostic::located(self.source.clone(), span, kind)
    }
}

pub struct Checker {
    loader: Loader,
    artifacts: Option<PathBuf>,
    units: HashMap<String, Unit>,
    checking_sources: HashSet<String>,
    discovery: Vec<String>,
}

impl Checker {
    pub fn new(loader: Loader, artifacts: Option<PathBuf>) -> Self {
        Checker {
            loader,
            artifacts,
            units: HashMap::new(),
            checking_sources: HashSet::new(),
            discovery: Vec::new(),
        }
    }

    /// Check the target source and everything it references.
    pub fn check(mut self, target: &str) -> Result<Target> {
        self.ensure_source(target)?;

        let entry_ast = self
            .units
            .get(target)
            .and_then(|unit| unit.entry_ast.clone());
        let entrypoint = match entry_ast {
            Some((body, _)) => {
                let cx = self.context(target);
                let mut scope = Scope::new();
                let mut loops = Vec::new();
                Some(self.check_statement(&cx, &body, &mut scope, &mut loops)?)
            }
            None => None,
        };

        // The entrypoint is unique per target and lives in the entry source.
        for name in &self.discovery {
            if name == target {
                continue;
            }
            if let Some(unit) = self.units.get(name) {
                if let Some((_, span)) = &unit.entry_ast {
                    return Err(Diagnostic::located(
                        unit.source.clone(),
                        *span,
                        DiagnosticKind::Redeclaration("entrypoint".to_string()),
                    ));
                }
            }
        }

        let mut entrypoint = entrypoint;
        let mut sources = HashMap::new();
        for (name, unit) in self.units {
            let entry = if name == target { entrypoint.take() } else { None };
            sources.insert(
                name,
                CheckedSource {
                    globals: unit.checked,
                    order: unit.order,
                    entrypoint: entry,
                },
            );
        }
        Ok(Target {
            entry: target.to_string(),
            sources,
            discovery: self.discovery,
        })
    }

    fn context(&self, name: &str) -> Cx {
        let unit = &self.units[name];
        Cx {
            current: name.to_string(),
            source: unit.source.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Source driving
    // -----------------------------------------------------------------------

    /// Load, resolve and fully check one source, memoized. Re-entry while
    /// the source is still on the checking stack is a cycle.
    fn ensure_source(&mut self, name: &str) -> Result<()> {
        if self.checking_sources.contains(name) {
            return Err(Diagnostic::named(
                name,
                DiagnosticKind::CyclicDefinition(name.to_string()),
            ));
        }
        if self.units.contains_key(name) {
            return Ok(());
        }

        let source = self.loader.load(name)?;
        let resolution = resolver::resolve(source, self.artifacts.as_deref())?;
        self.units.insert(
            name.to_string(),
            Unit {
                source: resolution.source,
                entry_ast: resolution.entrypoint,
                parsed: resolution.globals,
                order: resolution.order.clone(),
                checked: HashMap::new(),
                checking: HashSet::new(),
            },
        );
        self.discovery.push(name.to_string());

        self.checking_sources.insert(name.to_string());
        let mut result: Result<()> = Ok(());
        for identifier in resolution.order {
            if let Err(diagnostic) = self.check_global(name, &identifier) {
                result = Err(diagnostic);
                break;
            }
        }
        self.checking_sources.remove(name);
        result
    }

    /// Check one global of an already-loaded source, on demand.
    fn check_global(&mut self, source_name: &str, identifier: &str) -> Result<Rc<Definition>> {
        let unit = &self.units[source_name];
        if let Some(checked) = unit.checked.get(identifier) {
            return Ok(checked.clone());
        }

        let parsed = unit.parsed.get(identifier).cloned();
        let Some(parsed) = parsed else {
            return Err(Diagnostic::named(
                source_name,
                DiagnosticKind::UnknownSymbol(identifier.to_string()),
            ));
        };
        let cx = self.context(source_name);
        if !self.units.get_mut(source_name).map_or(false, |unit| {
            unit.checking.insert(identifier.to_string())
        }) {
            return Err(cx.error(
                parsed.identifier_span,
                DiagnosticKind::CyclicDefinition(identifier.to_string()),
            ));
        }

        let result = self.check_definition(&cx, &parsed);
        if let Some(unit) = self.units.get_mut(source_name) {
            unit.checking.remove(identifier);
            if let Ok(definition) = &result {
                unit.checked
                    .insert(identifier.to_string(), definition.clone());
            }
        }
        result
    }

    fn check_definition(&mut self, cx: &Cx, parsed: &ast::Definition) -> Result<Rc<Definition>> {
        let name = Name::new(&cx.current, &parsed.identifier);
        let definition = match &parsed.kind {
            ast::DefinitionKind::Link { building } => Definition::Link {
                public: parsed.public,
                name,
                building: building.clone(),
            },
            ast::DefinitionKind::Using { aliased } => {
                let (target, target_definition) = self.resolve_definition(cx, aliased, None)?;
                // Chains of aliases collapse at declaration time so later
                // lookups see a stable target.
                let aliased = match target_definition.as_ref() {
                    Definition::Using { aliased, .. } => aliased.clone(),
                    _ => target,
                };
                Definition::Using {
                    public: parsed.public,
                    name,
                    aliased,
                }
            }
            ast::DefinitionKind::Const { value } => {
                let mut scope = Scope::new();
                let checked = self.check_expression(cx, value, &mut scope)?;
                let Some(known) = checked.as_known() else {
                    return Err(cx.error(value.span(), DiagnosticKind::NotCompileTime));
                };
                Definition::Constant {
                    public: parsed.public,
                    name,
                    value: known.clone(),
                }
            }
            ast::DefinitionKind::Var { initial } => {
                let initial = match initial {
                    Some(expression) => {
                        let mut scope = Scope::new();
                        let checked = self.check_expression(cx, expression, &mut scope)?;
                        let Some(known) = checked.as_known() else {
                            return Err(cx.error(expression.span(), DiagnosticKind::NotCompileTime));
                        };
                        Some(known.clone())
                    }
                    None => None,
                };
                Definition::GlobalVar {
                    public: parsed.public,
                    name,
                    initial,
                }
            }
            ast::DefinitionKind::Proc { parameters, body } => {
                let mut scope = Scope::new();
                for parameter in parameters {
                    scope.introduce(&parameter.identifier);
                }
                let mut loops = Vec::new();
                let body = self.check_statement(cx, body, &mut scope, &mut loops)?;
                Definition::Procedure {
                    public: parsed.public,
                    name,
                    parameters: parameters
                        .iter()
                        .map(|parameter| Parameter {
                            identifier: parameter.identifier.clone(),
                            output: parameter.output,
                        })
                        .collect(),
                    body,
                }
            }
        };
        Ok(Rc::new(definition))
    }

    // -----------------------------------------------------------------------
    // Symbol resolution
    // -----------------------------------------------------------------------

    /// Resolve a mention that must land on a definition, following `using`
    /// aliases. A local shadowing the name is not acceptable here.
    fn resolve_definition(
        &mut self,
        cx: &Cx,
        mention: &ast::Mention,
        scope: Option<&Scope>,
    ) -> Result<(Name, Rc<Definition>)> {
        match self.resolve_symbol(cx, mention, scope)? {
            ResolvedSymbol::Local(identifier) => Err(cx.error(
                mention.span,
                DiagnosticKind::NotAProcedure(identifier),
            )),
            ResolvedSymbol::Definition { name, definition } => Ok((name, definition)),
        }
    }

    fn resolve_symbol(
        &mut self,
        cx: &Cx,
        mention: &ast::Mention,
        scope: Option<&Scope>,
    ) -> Result<ResolvedSymbol> {
        if let Some(qualifier) = &mention.qualifier {
            return self.resolve_qualified(cx, qualifier, &mention.identifier, mention.span);
        }

        if scope.map_or(false, |scope| scope.lookup(&mention.identifier)) {
            return Ok(ResolvedSymbol::Local(mention.identifier.clone()));
        }

        let own = self.units[&cx.current]
            .parsed
            .contains_key(&mention.identifier);
        if own {
            let definition = self.check_global(&cx.current, &mention.identifier)?;
            return self.follow_alias(cx, Name::new(&cx.current, &mention.identifier), definition);
        }

        // Only the keyword constants resolve without a qualifier; the rest
        // of the catalog is reached as `mlog::name` or aliased in with
        // `using`.
        if let Some(definition) = builtin_keyword(&mention.identifier) {
            return Ok(ResolvedSymbol::Definition {
                name: Name::new(builtins::SOURCE_NAME, &mention.identifier),
                definition,
            });
        }

        Err(cx.error(
            mention.span,
            DiagnosticKind::UnknownSymbol(mention.identifier.clone()),
        ))
    }

    fn resolve_qualified(
        &mut self,
        cx: &Cx,
        qualifier: &str,
        identifier: &str,
        span: Span,
    ) -> Result<ResolvedSymbol> {
        if qualifier == builtins::SOURCE_NAME {
            let Some(definition) = builtin_definition(identifier) else {
                return Err(cx.error(span, DiagnosticKind::UnknownSymbol(identifier.to_string())));
            };
            return Ok(ResolvedSymbol::Definition {
                name: Name::new(builtins::SOURCE_NAME, identifier),
                definition,
            });
        }

        if qualifier != cx.current {
            self.ensure_source(qualifier).map_err(|diagnostic| {
                // Source-level cycles point at the mention that closed them.
                match diagnostic.kind {
                    DiagnosticKind::CyclicDefinition(name) => {
                        cx.error(span, DiagnosticKind::CyclicDefinition(name))
                    }
                    _ => diagnostic,
                }
            })?;
        }

        if !self.units[qualifier].parsed.contains_key(identifier) {
            return Err(cx.error(span, DiagnosticKind::UnknownSymbol(identifier.to_string())));
        }
        let definition = self.check_global(qualifier, identifier)?;
        if qualifier != cx.current && !definition.is_public() {
            return Err(cx.error(span, DiagnosticKind::NotVisible(identifier.to_string())));
        }
        self.follow_alias(cx, Name::new(qualifier, identifier), definition)
    }

    /// A `using` forwards transparently: resolve through to its target.
    fn follow_alias(
        &mut self,
        _cx: &Cx,
        name: Name,
        definition: Rc<Definition>,
    ) -> Result<ResolvedSymbol> {
        match definition.as_ref() {
            Definition::Using { aliased, .. } => {
                let target = self.definition_of(aliased)?;
                Ok(ResolvedSymbol::Definition {
                    name: aliased.clone(),
                    definition: target,
                })
            }
            _ => Ok(ResolvedSymbol::Definition { name, definition }),
        }
    }

    /// Fetch a definition by name handle. Alias targets are stored fully
    /// resolved, so this never needs to follow further.
    fn definition_of(&mut self, name: &Name) -> Result<Rc<Definition>> {
        if name.source == builtins::SOURCE_NAME {
            return builtin_definition(&name.identifier).ok_or_else(|| {
                Diagnostic::named(
                    name.to_string(),
                    DiagnosticKind::UnknownSymbol(name.identifier.clone()),
                )
            });
        }
        if !self.units.contains_key(&name.source) {
            self.ensure_source(&name.source)?;
        }
        self.check_global(&name.source, &name.identifier)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn check_statement(
        &mut self,
        cx: &Cx,
        statement: &ast::Statement,
        scope: &mut Scope,
        loops: &mut Vec<Option<String>>,
    ) -> Result<Statement> {
        match statement {
            ast::Statement::Block { statements, .. } => {
                let mark = scope.mark();
                let mut checked = Vec::with_capacity(statements.len());
                for statement in statements {
                    checked.push(self.check_statement(cx, statement, scope, loops)?);
                }
                scope.truncate(mark);
                Ok(Statement::Block(checked))
            }
            ast::Statement::Local(local) => {
                let checked = self.check_local(cx, local, scope)?;
                Ok(Statement::Local(checked))
            }
            ast::Statement::If {
                variables,
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let mark = scope.mark();
                let mut checked_variables = Vec::with_capacity(variables.len());
                for variable in variables {
                    checked_variables.push(self.check_local(cx, variable, scope)?);
                }
                let condition = self.check_expression(cx, condition, scope)?;
                let inner = scope.mark();
                let then_branch = Box::new(self.check_statement(cx, then_branch, scope, loops)?);
                scope.truncate(inner);
                let else_branch = match else_branch {
                    Some(branch) => {
                        let checked = self.check_statement(cx, branch, scope, loops)?;
                        scope.truncate(inner);
                        Some(Box::new(checked))
                    }
                    None => None,
                };
                scope.truncate(mark);
                Ok(Statement::If {
                    variables: checked_variables,
                    condition,
                    then_branch,
                    else_branch,
                })
            }
            ast::Statement::While {
                label,
                variables,
                condition,
                interleaved,
                body,
                zero_branch,
                span,
            } => {
                if let Some(label) = label {
                    if loops.iter().any(|frame| frame.as_deref() == Some(label)) {
                        return Err(
                            cx.error(*span, DiagnosticKind::RedeclaredLabel(label.clone()))
                        );
                    }
                }
                let mark = scope.mark();
                let mut checked_variables = Vec::with_capacity(variables.len());
                for variable in variables {
                    checked_variables.push(self.check_local(cx, variable, scope)?);
                }
                let condition = self.check_expression(cx, condition, scope)?;

                loops.push(label.clone());
                let inner = scope.mark();
                let interleaved = match interleaved {
                    Some(statement) => {
                        let checked = self.check_statement(cx, statement, scope, loops)?;
                        Some(Box::new(checked))
                    }
                    None => None,
                };
                let body = Box::new(self.check_statement(cx, body, scope, loops)?);
                scope.truncate(inner);
                loops.pop();

                // The zero branch runs only when the loop never does; it is
                // outside the loop for break and continue purposes.
                let zero_branch = match zero_branch {
                    Some(branch) => {
                        let checked = self.check_statement(cx, branch, scope, loops)?;
                        scope.truncate(inner);
                        Some(Box::new(checked))
                    }
                    None => None,
                };
                scope.truncate(mark);
                Ok(Statement::While {
                    variables: checked_variables,
                    condition,
                    interleaved,
                    body,
                    zero_branch,
                })
            }
            ast::Statement::Break { label, span } => {
                let depth = self.resolve_loop(cx, label.as_deref(), loops, *span)?;
                Ok(Statement::Break { depth })
            }
            ast::Statement::Continue { label, span } => {
                let depth = self.resolve_loop(cx, label.as_deref(), loops, *span)?;
                Ok(Statement::Continue { depth })
            }
            ast::Statement::Return { value, .. } => {
                let value = match value {
                    Some(expression) => Some(self.check_expression(cx, expression, scope)?),
                    None => None,
                };
                Ok(Statement::Return { value })
            }
            ast::Statement::Discard { expression, .. } => {
                let checked = self.check_expression(cx, expression, scope)?;
                Ok(Statement::Discard(checked))
            }
            ast::Statement::Increment { target, .. } => {
                let access = self.check_mutation_target(cx, target, scope)?;
                Ok(Statement::Increment(access))
            }
            ast::Statement::Decrement { target, .. } => {
                let access = self.check_mutation_target(cx, target, scope)?;
                Ok(Statement::Decrement(access))
            }
            ast::Statement::Assign {
                target,
                operator,
                value,
                ..
            } => {
                let access = self.check_mutation_target(cx, target, scope)?;
                let value = self.check_expression(cx, value, scope)?;
                Ok(Statement::Assign {
                    target: access,
                    operator: *operator,
                    value,
                })
            }
        }
    }

    fn check_local(&mut self, cx: &Cx, local: &ast::LocalVar, scope: &mut Scope) -> Result<Local> {
        // The initializer sees the surrounding bindings, not the new one.
        let initial = match &local.initial {
            Some(expression) => Some(self.check_expression(cx, expression, scope)?),
            None => None,
        };
        scope.introduce(&local.identifier);
        Ok(Local {
            identifier: local.identifier.clone(),
            initial,
        })
    }

    /// Break/continue binding: the innermost frame when unlabeled, the
    /// nearest frame with a matching label otherwise. Depth 0 is innermost.
    fn resolve_loop(
        &self,
        cx: &Cx,
        label: Option<&str>,
        loops: &[Option<String>],
        span: Span,
    ) -> Result<usize> {
        match label {
            None => {
                if loops.is_empty() {
                    Err(cx.error(span, DiagnosticKind::NotInLoop))
                } else {
                    Ok(0)
                }
            }
            Some(label) => loops
                .iter()
                .rev()
                .position(|frame| frame.as_deref() == Some(label))
                .ok_or_else(|| {
                    if loops.is_empty() {
                        cx.error(span, DiagnosticKind::NotInLoop)
                    } else {
                        cx.error(span, DiagnosticKind::BadLabel(label.to_string()))
                    }
                }),
        }
    }

    fn check_mutation_target(
        &mut self,
        cx: &Cx,
        target: &ast::Mention,
        scope: &Scope,
    ) -> Result<Access> {
        match self.resolve_symbol(cx, target, Some(scope))? {
            ResolvedSymbol::Local(identifier) => Ok(Access::Local(identifier)),
            ResolvedSymbol::Definition { name, definition } => match definition.as_ref() {
                Definition::GlobalVar { .. } => Ok(Access::Global(name)),
                // Constants, links, procedures and builtins are not
                // assignable.
                _ => Err(cx.error(
                    target.span,
                    DiagnosticKind::NonVariableAccess(target.identifier.clone()),
                )),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn check_expression(
        &mut self,
        cx: &Cx,
        expression: &ast::Expression,
        scope: &mut Scope,
    ) -> Result<Expression> {
        match expression {
            ast::Expression::Number { value, .. } => Ok(Expression::Known(Known::Number(*value))),
            ast::Expression::Color { bits, .. } => Ok(Expression::Known(Known::Color(*bits))),
            ast::Expression::Str { value, .. } => {
                Ok(Expression::Known(Known::Str(value.clone())))
            }
            ast::Expression::Grouping { inner, .. } => self.check_expression(cx, inner, scope),
            ast::Expression::Symbol(mention) => self.check_symbol_access(cx, mention, scope),
            ast::Expression::Unary {
                operator, operand, ..
            } => {
                let operand = self.check_expression(cx, operand, scope)?;
                if let Some(value) = operand.as_known().and_then(Known::numeric) {
                    return Ok(Expression::Known(Known::Number(fold_unary(*operator, value))));
                }
                Ok(Expression::Unary {
                    operator: *operator,
                    operand: Box::new(operand),
                })
            }
            ast::Expression::Binary {
                operator,
                left,
                right,
                ..
            } => {
                let left = self.check_expression(cx, left, scope)?;
                let right = self.check_expression(cx, right, scope)?;
                let folded = left
                    .as_known()
                    .and_then(Known::numeric)
                    .zip(right.as_known().and_then(Known::numeric));
                match operator {
                    BinaryOperator::LogicalAnd => {
                        if let Some((a, b)) = folded {
                            let value = if a != 0.0 && b != 0.0 { 1.0 } else { 0.0 };
                            return Ok(Expression::Known(Known::Number(value)));
                        }
                        Ok(Expression::LogicalAnd {
                            left: Box::new(left),
                            right: Box::new(right),
                        })
                    }
                    BinaryOperator::LogicalOr => {
                        if let Some((a, b)) = folded {
                            let value = if a != 0.0 || b != 0.0 { 1.0 } else { 0.0 };
                            return Ok(Expression::Known(Known::Number(value)));
                        }
                        Ok(Expression::LogicalOr {
                            left: Box::new(left),
                            right: Box::new(right),
                        })
                    }
                    _ => {
                        if let Some((a, b)) = folded {
                            return Ok(Expression::Known(Known::Number(fold_binary(
                                *operator, a, b,
                            ))));
                        }
                        Ok(Expression::Binary {
                            operator: *operator,
                            left: Box::new(left),
                            right: Box::new(right),
                        })
                    }
                }
            }
            ast::Expression::Call {
                procedure,
                arguments,
                ..
            } => {
                let (name, definition) = self.resolve_definition(cx, procedure, Some(&*scope))?;
                self.check_call(cx, name, definition, None, arguments, procedure.span, scope)
            }
            ast::Expression::MemberCall {
                receiver,
                name,
                name_span,
                arguments,
                ..
            } => {
                // `receiver.name(args)` rewrites to `name(receiver, args…)`
                // before argument checking; the callee resolves within the
                // current source only (aliases included), then the catalog.
                let receiver = self.check_expression(cx, receiver, scope)?;
                let mention = ast::Mention {
                    qualifier: None,
                    identifier: name.clone(),
                    span: *name_span,
                };
                let (callee, definition) = self.resolve_definition(cx, &mention, Some(&*scope))?;
                self.check_call(
                    cx,
                    callee,
                    definition,
                    Some(receiver),
                    arguments,
                    *name_span,
                    scope,
                )
            }
            ast::Expression::MemberAccess {
                object,
                member,
                member_span,
                ..
            } => {
                let object = self.check_expression(cx, object, scope)?;
                // Member reads resolve against the builtin catalog only.
                match builtins::catalog().constant(member) {
                    Some(known @ Known::Builtin(_)) => Ok(Expression::Sensor {
                        object: Box::new(object),
                        property: known.clone(),
                    }),
                    _ => Err(cx.error(
                        *member_span,
                        DiagnosticKind::NonSensibleProperty(member.clone()),
                    )),
                }
            }
        }
    }

    fn check_symbol_access(
        &mut self,
        cx: &Cx,
        mention: &ast::Mention,
        scope: &Scope,
    ) -> Result<Expression> {
        match self.resolve_symbol(cx, mention, Some(scope))? {
            ResolvedSymbol::Local(identifier) => Ok(Expression::Access(Access::Local(identifier))),
            ResolvedSymbol::Definition { name, definition } => match definition.as_ref() {
                Definition::Constant { value, .. }
                | Definition::BuiltinKeyword { value }
                | Definition::BuiltinConstant { value, .. } => {
                    Ok(Expression::Known(value.clone()))
                }
                Definition::GlobalVar { .. } => Ok(Expression::Access(Access::Global(name))),
                Definition::Link { building, .. } => Ok(Expression::Access(Access::Link {
                    building: building.clone(),
                })),
                Definition::Procedure { .. } | Definition::BuiltinProcedure(_) => Err(cx.error(
                    mention.span,
                    DiagnosticKind::NonVariableAccess(mention.identifier.clone()),
                )),
                Definition::Using { .. } => unreachable!("aliases are followed during resolution"),
            },
        }
    }

    fn check_call(
        &mut self,
        cx: &Cx,
        name: Name,
        definition: Rc<Definition>,
        receiver: Option<Expression>,
        arguments: &[ast::Expression],
        span: Span,
        scope: &mut Scope,
    ) -> Result<Expression> {
        let (parameter_count, outputs): (usize, Vec<bool>) = match definition.as_ref() {
            Definition::Procedure { parameters, .. } => (
                parameters.len(),
                parameters.iter().map(|parameter| parameter.output).collect(),
            ),
            Definition::BuiltinProcedure(procedure) => {
                (procedure.parameters, vec![false; procedure.parameters])
            }
            _ => {
                return Err(cx.error(
                    span,
                    DiagnosticKind::NotAProcedure(name.identifier.clone()),
                ))
            }
        };

        let supplied = arguments.len() + usize::from(receiver.is_some());
        if supplied > parameter_count {
            return Err(cx.error(
                span,
                DiagnosticKind::TooManyArguments {
                    name: name.identifier.clone(),
                    parameters: parameter_count,
                    arguments: supplied,
                },
            ));
        }

        let mut checked = Vec::with_capacity(parameter_count);
        if let Some(receiver) = receiver {
            checked.push(receiver);
        }
        for argument in arguments {
            let index = checked.len();
            let value = self.check_expression(cx, argument, scope)?;
            // Output parameters need somewhere to copy back into.
            if outputs.get(index).copied().unwrap_or(false) {
                match &value {
                    Expression::Access(Access::Local(_))
                    | Expression::Access(Access::Global(_)) => {}
                    _ => {
                        return Err(cx.error(
                            argument.span(),
                            DiagnosticKind::NonVariableAccess(name.identifier.clone()),
                        ))
                    }
                }
            }
            checked.push(value);
        }
        // Missing trailing arguments are implicitly null.
        while checked.len() < parameter_count {
            checked.push(Expression::Known(Known::Null));
        }

        Ok(Expression::Call {
            procedure: name,
            arguments: checked,
        })
    }
}

enum ResolvedSymbol {
    Local(String),
    Definition { name: Name, definition: Rc<Definition> },
}

/// The three keyword constants are the only catalog entries reachable
/// without the `mlog` qualifier.
fn builtin_keyword(identifier: &str) -> Option<Rc<Definition>> {
    match builtins::catalog().constant(identifier) {
        Some(known @ (Known::True | Known::False | Known::Null)) => {
            Some(Rc::new(Definition::BuiltinKeyword {
                value: known.clone(),
            }))
        }
        _ => None,
    }
}

/// Synthesize the semantic definition of a catalog entry.
fn builtin_definition(identifier: &str) -> Option<Rc<Definition>> {
    let catalog = builtins::catalog();
    if let Some(known) = catalog.constant(identifier) {
        let definition = match known {
            Known::True | Known::False | Known::Null => Definition::BuiltinKeyword {
                value: known.clone(),
            },
            _ => Definition::BuiltinConstant {
                identifier: identifier.to_string(),
                value: known.clone(),
            },
        };
        return Some(Rc::new(definition));
    }
    catalog
        .procedure(identifier)
        .map(|procedure| Rc::new(Definition::BuiltinProcedure(procedure.clone())))
}

// ---------------------------------------------------------------------------
// Constant folding arithmetic
// ---------------------------------------------------------------------------

/// Width of the integer bit patterns bitwise and shift operators work on.
const BIT_WIDTH: u32 = 53;
const BIT_MASK: i64 = (1 << BIT_WIDTH) - 1;

/// Sign-extend the low 53 bits, bit 52 being the sign.
fn sign_extend(bits: i64) -> i64 {
    let masked = bits & BIT_MASK;
    if masked & (1 << (BIT_WIDTH - 1)) != 0 {
        masked | !BIT_MASK
    } else {
        masked
    }
}

/// The 53-bit two's-complement pattern a double coerces to before a bitwise
/// operation. Values whose magnitude exceeds the width wrap to their low 53
/// bits.
fn as_bits(value: f64) -> i64 {
    sign_extend(value as i64)
}

/// Reinterpret an operation result as a double, wrapping it back into the
/// 53-bit pattern first.
fn from_bits(bits: i64) -> f64 {
    sign_extend(bits) as f64
}

fn boolean(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

pub(crate) fn fold_unary(operator: UnaryOperator, value: f64) -> f64 {
    match operator {
        UnaryOperator::Promote => value,
        UnaryOperator::Negate => -value,
        UnaryOperator::BitwiseNot => from_bits(!as_bits(value)),
        UnaryOperator::LogicalNot => boolean(value == 0.0),
    }
}

pub(crate) fn fold_binary(operator: BinaryOperator, a: f64, b: f64) -> f64 {
    match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => a / b,
        BinaryOperator::FloorDivide => (a / b).floor(),
        BinaryOperator::Modulus => a % b,
        BinaryOperator::Equal => boolean((a - b).abs() < EQUALITY_TOLERANCE),
        BinaryOperator::NotEqual => boolean((a - b).abs() >= EQUALITY_TOLERANCE),
        // Strict equality folds exactly, not with the tolerance.
        BinaryOperator::StrictEqual => boolean(a == b),
        BinaryOperator::Less => boolean(a < b),
        BinaryOperator::LessEqual => boolean(a <= b),
        BinaryOperator::Greater => boolean(a > b),
        BinaryOperator::GreaterEqual => boolean(a >= b),
        BinaryOperator::BitwiseAnd => from_bits(as_bits(a) & as_bits(b)),
        BinaryOperator::BitwiseOr => from_bits(as_bits(a) | as_bits(b)),
        BinaryOperator::BitwiseXor => from_bits(as_bits(a) ^ as_bits(b)),
        BinaryOperator::LeftShift => from_bits(as_bits(a) << (as_bits(b) & 63)),
        BinaryOperator::RightShift => from_bits(as_bits(a) >> (as_bits(b) & 63)),
        BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => {
            // Handled by the short-circuit paths in check_expression.
            boolean(a != 0.0 && b != 0.0)
        }
    }
}
