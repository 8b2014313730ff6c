/// Lowering: from a checked target to the flat instruction stream.
///
/// One ever-growing pool of registers per compilation. While an expression
/// lowers, a next-free cursor says which temporary a sub-expression may
/// claim; a binary operation lowers its left operand at the cursor and its
/// right operand one past it, then writes the result at the cursor.
/// Immediates never consume a register.
///
/// Conditions fuse into jumps where the target supports it: `if v < 1000`
/// emits a single `greaterThanEq` jump to the else branch. Procedures lower
/// to shared blocks after the entrypoint's `end`, entered with a
/// return-address register (`op add <ra> @counter 1` before the jump) and
/// left through `set @counter <ra>`; call sites are back-patched once the
/// block is placed. Recursion is not supported: each procedure has a single
/// return-address register.

use std::collections::{HashMap, HashSet};

use crate::builtins;
use crate::checker::Target;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Result};
use crate::mlog::{
    unary_encoding, Field, Instruction, JumpCondition, OpCode, Program, Register, Value,
};
use crate::sem::{Access, Definition, Expression, Known, Local, Name, Statement};

// ---------------------------------------------------------------------------
// Register pool
// ---------------------------------------------------------------------------

/// Registers are indices into one growing pool; each carries the display
/// name it renders as. Locals render as their identifier (suffixed when a
/// name is already taken) and temporaries as `_r<N>`; user identifiers
/// cannot start with an underscore, so plumbing names never collide.
struct Pool {
    names: Vec<String>,
    used: HashSet<String>,
    temporaries: Vec<Register>,
}

impl Pool {
    fn new() -> Self {
        Pool {
            names: Vec::new(),
            used: HashSet::new(),
            temporaries: Vec::new(),
        }
    }

    fn allocate(&mut self, desired: &str) -> Register {
        let mut name = desired.to_string();
        let mut attempt = 2;
        while !self.used.insert(name.clone()) {
            name = format!("{}_{}", desired, attempt);
            attempt += 1;
        }
        self.names.push(name);
        self.names.len() - 1
    }

    /// The temporary at a cursor position, created on first use and reused
    /// ever after.
    fn temporary(&mut self, ordinal: usize) -> Register {
        while self.temporaries.len() <= ordinal {
            let register = self.allocate(&format!("_r{}", self.temporaries.len()));
            self.temporaries.push(register);
        }
        self.temporaries[ordinal]
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// The lowering state of one user procedure: its parameter, return-value and
/// return-address registers, its entry line once placed, and the call-site
/// jumps waiting for it.
struct Frame {
    parameters: Vec<(Register, bool)>,
    ret: Register,
    ra: Register,
    start: Option<usize>,
    pending_calls: Vec<usize>,
}

struct LoopFrame {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct Builder<'t> {
    target: &'t Target,
    instructions: Vec<Instruction>,
    pool: Pool,
    globals: HashMap<Name, Register>,
    bindings: Vec<(String, Register)>,
    frames: HashMap<Name, Frame>,
    queue: Vec<Name>,
    loops: Vec<LoopFrame>,
    /// Return jumps of the procedure currently being lowered.
    epilogue_jumps: Vec<usize>,
    /// The return-value register while inside a procedure; `None` in the
    /// entrypoint, where `return` lowers to `end`.
    current_ret: Option<Register>,
}

impl<'t> Builder<'t> {
    pub fn new(target: &'t Target) -> Self {
        Builder {
            target,
            instructions: Vec::new(),
            pool: Pool::new(),
            globals: HashMap::new(),
            bindings: Vec::new(),
            frames: HashMap::new(),
            queue: Vec::new(),
            loops: Vec::new(),
            epilogue_jumps: Vec::new(),
            current_ret: None,
        }
    }

    /// Lower the whole target: global initializers, the entrypoint, `end`,
    /// then every referenced procedure block.
    pub fn build(mut self) -> Result<Program> {
        let entry = self
            .target
            .source(&self.target.entry)
            .and_then(|source| source.entrypoint.clone())
            .ok_or_else(|| {
                Diagnostic::named(
                    self.target.entry.clone(),
                    DiagnosticKind::MissingEntrypoint(self.target.entry.clone()),
                )
            })?;

        self.lower_global_initializers();
        self.lower_statement(&entry)?;
        self.emit(Instruction::End);

        let mut next = 0;
        while next < self.queue.len() {
            let name = self.queue[next].clone();
            next += 1;
            self.lower_procedure(&name)?;
        }
        if next > 0 {
            self.emit(Instruction::End);
        }

        Ok(Program {
            instructions: self.instructions,
            register_names: self.pool.names,
        })
    }

    fn lower_global_initializers(&mut self) {
        let target = self.target;
        for source_name in &target.discovery {
            let Some(source) = target.source(source_name) else {
                continue;
            };
            for identifier in &source.order {
                let name = Name::new(source_name.clone(), identifier.clone());
                let Some(definition) = target.definition(&name) else {
                    continue;
                };
                if let Definition::GlobalVar {
                    initial: Some(initial),
                    ..
                } = definition.as_ref()
                {
                    let value = known_value(initial);
                    let register = self.global_register(&name);
                    self.emit(Instruction::Set {
                        target: register,
                        value,
                    });
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    fn here(&self) -> usize {
        self.instructions.len()
    }

    fn patch(&mut self, index: usize, line: usize) {
        if let Instruction::Jump { target, .. } = &mut self.instructions[index] {
            *target = line;
        }
    }

    fn patch_all(&mut self, indices: &[usize], line: usize) {
        for &index in indices {
            self.patch(index, line);
        }
    }

    fn global_register(&mut self, name: &Name) -> Register {
        if let Some(&register) = self.globals.get(name) {
            return register;
        }
        let display = format!("{}.{}", name.source, name.identifier);
        let register = self.pool.allocate(&display);
        self.globals.insert(name.clone(), register);
        register
    }

    fn local_register(&mut self, identifier: &str) -> Result<Register> {
        self.bindings
            .iter()
            .rev()
            .find(|(name, _)| name == identifier)
            .map(|(_, register)| *register)
            .ok_or_else(|| {
                Diagnostic::named(
                    identifier,
                    DiagnosticKind::UnknownSymbol(identifier.to_string()),
                )
            })
    }

    fn access_value(&mut self, access: &Access) -> Result<Value> {
        Ok(match access {
            Access::Local(identifier) => Value::Register(self.local_register(identifier)?),
            Access::Global(name) => Value::Register(self.global_register(name)),
            Access::Link { building } => Value::Link(building.clone()),
        })
    }

    /// The register behind an assignable access.
    fn access_register(&mut self, access: &Access) -> Result<Register> {
        match access {
            Access::Local(identifier) => self.local_register(identifier),
            Access::Global(name) => Ok(self.global_register(name)),
            Access::Link { building } => Err(Diagnostic::named(
                building.clone(),
                DiagnosticKind::NonVariableAccess(building.clone()),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn lower_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Block(statements) => {
                let mark = self.bindings.len();
                for statement in statements {
                    self.lower_statement(statement)?;
                }
                self.bindings.truncate(mark);
                Ok(())
            }
            Statement::Local(local) => self.lower_local(local),
            Statement::Discard(expression) => {
                self.lower_expression(expression, 0)?;
                Ok(())
            }
            Statement::Increment(access) => {
                let register = self.access_register(access)?;
                self.emit(Instruction::Op {
                    code: OpCode::Add,
                    target: register,
                    left: Value::Register(register),
                    right: Value::Number(1.0),
                });
                Ok(())
            }
            Statement::Decrement(access) => {
                let register = self.access_register(access)?;
                self.emit(Instruction::Op {
                    code: OpCode::Sub,
                    target: register,
                    left: Value::Register(register),
                    right: Value::Number(1.0),
                });
                Ok(())
            }
            Statement::Assign {
                target,
                operator,
                value,
            } => {
                let register = self.access_register(target)?;
                match operator {
                    // A compound assignment writes straight back into its
                    // target, no temporary.
                    Some(operator) => {
                        let value = self.lower_expression(value, 0)?;
                        let code = OpCode::from_binary(*operator).ok_or_else(|| {
                            Diagnostic::named(
                                "assignment",
                                DiagnosticKind::UnknownSymbol(operator.to_string()),
                            )
                        })?;
                        self.emit(Instruction::Op {
                            code,
                            target: register,
                            left: Value::Register(register),
                            right: value,
                        });
                    }
                    None => self.lower_into(value, register, 0)?,
                }
                Ok(())
            }
            Statement::If {
                variables,
                condition,
                then_branch,
                else_branch,
            } => {
                let mark = self.bindings.len();
                for variable in variables {
                    self.lower_local(variable)?;
                }
                let false_jumps = self.lower_branch_false(condition)?;
                self.lower_statement(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let skip = self.emit(Instruction::Jump {
                            target: 0,
                            condition: JumpCondition::Always,
                            left: Value::Number(0.0),
                            right: Value::Number(0.0),
                        });
                        let else_entry = self.here();
                        self.patch_all(&false_jumps, else_entry);
                        self.lower_statement(else_branch)?;
                        let end = self.here();
                        self.patch(skip, end);
                    }
                    None => {
                        let end = self.here();
                        self.patch_all(&false_jumps, end);
                    }
                }
                self.bindings.truncate(mark);
                Ok(())
            }
            Statement::While {
                variables,
                condition,
                interleaved,
                body,
                zero_branch,
            } => {
                let mark = self.bindings.len();
                for variable in variables {
                    self.lower_local(variable)?;
                }
                // First test: fall past the loop (into the zero branch when
                // present) if the condition starts out false.
                let zero_jumps = self.lower_branch_false(condition)?;

                self.loops.push(LoopFrame {
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });
                let top = self.here();
                self.lower_statement(body)?;
                if let Some(interleaved) = interleaved {
                    self.lower_statement(interleaved)?;
                }
                // Continue lands here: after the interleaved, before the
                // re-check.
                let recheck = self.here();
                let back_jumps = self.lower_branch_true(condition)?;
                self.patch_all(&back_jumps, top);
                let frame = self.loops.pop().unwrap_or(LoopFrame {
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });
                self.patch_all(&frame.continue_jumps, recheck);

                match zero_branch {
                    Some(zero_branch) => {
                        let skip = self.emit(Instruction::Jump {
                            target: 0,
                            condition: JumpCondition::Always,
                            left: Value::Number(0.0),
                            right: Value::Number(0.0),
                        });
                        let zero_entry = self.here();
                        self.patch_all(&zero_jumps, zero_entry);
                        self.lower_statement(zero_branch)?;
                        let end = self.here();
                        self.patch(skip, end);
                        self.patch_all(&frame.break_jumps, end);
                    }
                    None => {
                        let end = self.here();
                        self.patch_all(&zero_jumps, end);
                        self.patch_all(&frame.break_jumps, end);
                    }
                }
                self.bindings.truncate(mark);
                Ok(())
            }
            Statement::Break { depth } => {
                let jump = self.emit(Instruction::Jump {
                    target: 0,
                    condition: JumpCondition::Always,
                    left: Value::Number(0.0),
                    right: Value::Number(0.0),
                });
                let index = self.loops.len() - 1 - depth;
                self.loops[index].break_jumps.push(jump);
                Ok(())
            }
            Statement::Continue { depth } => {
                let jump = self.emit(Instruction::Jump {
                    target: 0,
                    condition: JumpCondition::Always,
                    left: Value::Number(0.0),
                    right: Value::Number(0.0),
                });
                let index = self.loops.len() - 1 - depth;
                self.loops[index].continue_jumps.push(jump);
                Ok(())
            }
            Statement::Return { value } => match self.current_ret {
                Some(ret) => {
                    match value {
                        Some(value) => self.lower_into(value, ret, 0)?,
                        None => {
                            self.emit(Instruction::Set {
                                target: ret,
                                value: Value::Builtin("null".to_string()),
                            });
                        }
                    }
                    let jump = self.emit(Instruction::Jump {
                        target: 0,
                        condition: JumpCondition::Always,
                        left: Value::Number(0.0),
                        right: Value::Number(0.0),
                    });
                    self.epilogue_jumps.push(jump);
                    Ok(())
                }
                None => {
                    // Returning from the entrypoint stops the program.
                    if let Some(value) = value {
                        self.lower_expression(value, 0)?;
                    }
                    self.emit(Instruction::End);
                    Ok(())
                }
            },
        }
    }

    fn lower_local(&mut self, local: &Local) -> Result<()> {
        let register = self.pool.allocate(&local.identifier);
        if let Some(initial) = &local.initial {
            self.lower_into(initial, register, 0)?;
        }
        self.bindings.push((local.identifier.clone(), register));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Conditions
    // -----------------------------------------------------------------------

    /// Emit the jumps taken when `condition` is false; returns their indices
    /// for patching. Comparisons fuse into a single inverted jump.
    fn lower_branch_false(&mut self, condition: &Expression) -> Result<Vec<usize>> {
        if let Some(known) = condition.as_known() {
            if known_truthy(known) {
                return Ok(Vec::new());
            }
            let jump = self.emit(Instruction::Jump {
                target: 0,
                condition: JumpCondition::Always,
                left: Value::Number(0.0),
                right: Value::Number(0.0),
            });
            return Ok(vec![jump]);
        }
        if let Expression::Binary {
            operator,
            left,
            right,
        } = condition
        {
            if let Some(inverse) = JumpCondition::from_binary(*operator)
                .and_then(JumpCondition::inverse)
            {
                let left = self.lower_expression(left, 0)?;
                let right = self.lower_expression(right, 1)?;
                let jump = self.emit(Instruction::Jump {
                    target: 0,
                    condition: inverse,
                    left,
                    right,
                });
                return Ok(vec![jump]);
            }
        }
        let value = self.lower_condition_register(condition)?;
        let jump = self.emit(Instruction::Jump {
            target: 0,
            condition: JumpCondition::Equal,
            left: value,
            right: Value::Number(0.0),
        });
        Ok(vec![jump])
    }

    /// Emit the jumps taken when `condition` is true.
    fn lower_branch_true(&mut self, condition: &Expression) -> Result<Vec<usize>> {
        if let Some(known) = condition.as_known() {
            if !known_truthy(known) {
                return Ok(Vec::new());
            }
            let jump = self.emit(Instruction::Jump {
                target: 0,
                condition: JumpCondition::Always,
                left: Value::Number(0.0),
                right: Value::Number(0.0),
            });
            return Ok(vec![jump]);
        }
        if let Expression::Binary {
            operator,
            left,
            right,
        } = condition
        {
            if let Some(condition) = JumpCondition::from_binary(*operator) {
                let left = self.lower_expression(left, 0)?;
                let right = self.lower_expression(right, 1)?;
                let jump = self.emit(Instruction::Jump {
                    target: 0,
                    condition,
                    left,
                    right,
                });
                return Ok(vec![jump]);
            }
        }
        let value = self.lower_condition_register(condition)?;
        let jump = self.emit(Instruction::Jump {
            target: 0,
            condition: JumpCondition::NotEqual,
            left: value,
            right: Value::Number(0.0),
        });
        Ok(vec![jump])
    }

    fn lower_condition_register(&mut self, condition: &Expression) -> Result<Value> {
        self.lower_expression(condition, 0)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Lower an expression; the result is a register at or above `cursor`,
    /// or an immediate when no instruction was needed.
    fn lower_expression(&mut self, expression: &Expression, cursor: usize) -> Result<Value> {
        match expression {
            Expression::Known(known) => Ok(known_value(known)),
            Expression::Access(access) => self.access_value(access),
            Expression::Call {
                procedure,
                arguments,
            } => self.lower_call(procedure, arguments, cursor, None),
            _ => {
                let register = self.pool.temporary(cursor);
                self.lower_into(expression, register, cursor)?;
                Ok(Value::Register(register))
            }
        }
    }

    /// Lower an expression so its result lands in `dest`.
    fn lower_into(&mut self, expression: &Expression, dest: Register, cursor: usize) -> Result<()> {
        match expression {
            Expression::Known(known) => {
                let value = known_value(known);
                self.emit(Instruction::Set {
                    target: dest,
                    value,
                });
                Ok(())
            }
            Expression::Access(access) => {
                let value = self.access_value(access)?;
                if value != Value::Register(dest) {
                    self.emit(Instruction::Set {
                        target: dest,
                        value,
                    });
                }
                Ok(())
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.lower_expression(left, cursor)?;
                let right = self.lower_expression(right, cursor + 1)?;
                let code = OpCode::from_binary(*operator).ok_or_else(|| {
                    Diagnostic::named(
                        "expression",
                        DiagnosticKind::UnknownSymbol(operator.to_string()),
                    )
                })?;
                self.emit(Instruction::Op {
                    code,
                    target: dest,
                    left,
                    right,
                });
                Ok(())
            }
            Expression::Unary { operator, operand } => {
                let operand = self.lower_expression(operand, cursor)?;
                let (code, zero_first) = unary_encoding(*operator);
                let (left, right) = if zero_first {
                    (Value::Number(0.0), operand)
                } else {
                    (operand, Value::Number(0.0))
                };
                self.emit(Instruction::Op {
                    code,
                    target: dest,
                    left,
                    right,
                });
                Ok(())
            }
            Expression::LogicalAnd { left, right } => {
                // Left lands in the result register; a zero there skips the
                // right operand entirely.
                self.lower_into(left, dest, cursor)?;
                let short = self.emit(Instruction::Jump {
                    target: 0,
                    condition: JumpCondition::Equal,
                    left: Value::Register(dest),
                    right: Value::Number(0.0),
                });
                self.lower_into(right, dest, cursor)?;
                let end = self.here();
                self.patch(short, end);
                Ok(())
            }
            Expression::LogicalOr { left, right } => {
                self.lower_into(left, dest, cursor)?;
                let short = self.emit(Instruction::Jump {
                    target: 0,
                    condition: JumpCondition::NotEqual,
                    left: Value::Register(dest),
                    right: Value::Number(0.0),
                });
                self.lower_into(right, dest, cursor)?;
                let skip = self.emit(Instruction::Jump {
                    target: 0,
                    condition: JumpCondition::Always,
                    left: Value::Number(0.0),
                    right: Value::Number(0.0),
                });
                // The shortcut normalizes a truthy left operand to 1.
                let shortcut = self.here();
                self.patch(short, shortcut);
                self.emit(Instruction::Set {
                    target: dest,
                    value: Value::Number(1.0),
                });
                let end = self.here();
                self.patch(skip, end);
                Ok(())
            }
            Expression::Call {
                procedure,
                arguments,
            } => {
                self.lower_call(procedure, arguments, cursor, Some(dest))?;
                Ok(())
            }
            Expression::Sensor { object, property } => {
                let object = self.lower_expression(object, cursor)?;
                self.emit(Instruction::Builtin {
                    fields: vec![
                        Field::Word("sensor".to_string()),
                        Field::Operand(Value::Register(dest)),
                        Field::Operand(object),
                        Field::Operand(known_value(property)),
                    ],
                });
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    fn lower_call(
        &mut self,
        procedure: &Name,
        arguments: &[Expression],
        cursor: usize,
        dest: Option<Register>,
    ) -> Result<Value> {
        if procedure.source == builtins::SOURCE_NAME {
            return self.lower_builtin_call(procedure, arguments, cursor, dest);
        }

        self.ensure_frame(procedure)?;
        let (parameters, ret, ra) = {
            let frame = &self.frames[procedure];
            (frame.parameters.clone(), frame.ret, frame.ra)
        };

        // Arguments evaluate left to right, each above the previous, before
        // any parameter is written; a call in a later argument cannot
        // clobber an earlier one.
        let mut values = Vec::with_capacity(arguments.len());
        for (index, argument) in arguments.iter().enumerate() {
            values.push(self.lower_expression(argument, cursor + index)?);
        }
        for ((parameter, _), value) in parameters.iter().zip(&values) {
            if *value != Value::Register(*parameter) {
                self.emit(Instruction::Set {
                    target: *parameter,
                    value: value.clone(),
                });
            }
        }

        self.emit(Instruction::Op {
            code: OpCode::Add,
            target: ra,
            left: Value::Builtin("@counter".to_string()),
            right: Value::Number(1.0),
        });
        let call = self.emit(Instruction::Jump {
            target: 0,
            condition: JumpCondition::Always,
            left: Value::Number(0.0),
            right: Value::Number(0.0),
        });
        {
            let frame = self.frames.get_mut(procedure).ok_or_else(|| {
                Diagnostic::named(
                    procedure.to_string(),
                    DiagnosticKind::UnknownSymbol(procedure.identifier.clone()),
                )
            })?;
            match frame.start {
                Some(start) => {
                    self.instructions[call] = Instruction::Jump {
                        target: start,
                        condition: JumpCondition::Always,
                        left: Value::Number(0.0),
                        right: Value::Number(0.0),
                    };
                }
                None => frame.pending_calls.push(call),
            }
        }

        // Output parameters copy back into their argument variables.
        for ((parameter, output), value) in parameters.iter().zip(&values) {
            if *output {
                if let Value::Register(argument) = value {
                    self.emit(Instruction::Set {
                        target: *argument,
                        value: Value::Register(*parameter),
                    });
                }
            }
        }

        let result = match dest {
            Some(dest) => dest,
            None => self.pool.temporary(cursor),
        };
        self.emit(Instruction::Set {
            target: result,
            value: Value::Register(ret),
        });
        Ok(Value::Register(result))
    }

    fn lower_builtin_call(
        &mut self,
        procedure: &Name,
        arguments: &[Expression],
        cursor: usize,
        dest: Option<Register>,
    ) -> Result<Value> {
        let template = builtins::catalog()
            .procedure(&procedure.identifier)
            .cloned()
            .ok_or_else(|| {
                Diagnostic::named(
                    procedure.to_string(),
                    DiagnosticKind::UnknownSymbol(procedure.identifier.clone()),
                )
            })?;

        let mut values = Vec::with_capacity(arguments.len());
        for (index, argument) in arguments.iter().enumerate() {
            values.push(self.lower_expression(argument, cursor + index)?);
        }

        let mut fields = Vec::new();
        for word in &template.opening {
            fields.push(Field::Word(word.clone()));
        }
        for (index, value) in values.into_iter().enumerate() {
            fields.push(Field::Operand(value));
            if let Some(dummy) = template.dummy {
                if dummy.after == index {
                    fields.push(Field::Word(dummy.word.to_string()));
                }
            }
        }
        for _ in 0..template.padding {
            fields.push(Field::Word("0".to_string()));
        }
        self.emit(Instruction::Builtin { fields });

        // A builtin call has no return register; as an expression it reads
        // as null.
        if let Some(dest) = dest {
            self.emit(Instruction::Set {
                target: dest,
                value: Value::Builtin("null".to_string()),
            });
            return Ok(Value::Register(dest));
        }
        Ok(Value::Builtin("null".to_string()))
    }

    // -----------------------------------------------------------------------
    // Procedures
    // -----------------------------------------------------------------------

    /// Allocate the registers of a procedure the first time a call site
    /// reaches it and queue its block for lowering.
    fn ensure_frame(&mut self, name: &Name) -> Result<()> {
        if self.frames.contains_key(name) {
            return Ok(());
        }
        let definition = self.target.definition(name).cloned().ok_or_else(|| {
            Diagnostic::named(
                name.to_string(),
                DiagnosticKind::UnknownSymbol(name.identifier.clone()),
            )
        })?;
        let Definition::Procedure { parameters, .. } = definition.as_ref() else {
            return Err(Diagnostic::named(
                name.to_string(),
                DiagnosticKind::NotAProcedure(name.identifier.clone()),
            ));
        };
        let parameters = parameters
            .iter()
            .map(|parameter| {
                (
                    self.pool.allocate(&parameter.identifier),
                    parameter.output,
                )
            })
            .collect();
        let ret = self.pool.allocate(&format!("_ret_{}", name.identifier));
        let ra = self.pool.allocate(&format!("_ra_{}", name.identifier));
        self.frames.insert(
            name.clone(),
            Frame {
                parameters,
                ret,
                ra,
                start: None,
                pending_calls: Vec::new(),
            },
        );
        self.queue.push(name.clone());
        Ok(())
    }

    fn lower_procedure(&mut self, name: &Name) -> Result<()> {
        let definition = self.target.definition(name).cloned().ok_or_else(|| {
            Diagnostic::named(
                name.to_string(),
                DiagnosticKind::UnknownSymbol(name.identifier.clone()),
            )
        })?;
        let Definition::Procedure {
            parameters: declared,
            body,
            ..
        } = definition.as_ref()
        else {
            return Err(Diagnostic::named(
                name.to_string(),
                DiagnosticKind::NotAProcedure(name.identifier.clone()),
            ));
        };

        let start = self.here();
        let (parameters, ret, ra, pending) = {
            let frame = self.frames.get_mut(name).ok_or_else(|| {
                Diagnostic::named(
                    name.to_string(),
                    DiagnosticKind::UnknownSymbol(name.identifier.clone()),
                )
            })?;
            frame.start = Some(start);
            (
                frame.parameters.clone(),
                frame.ret,
                frame.ra,
                std::mem::take(&mut frame.pending_calls),
            )
        };
        self.patch_all(&pending, start);

        let mark = self.bindings.len();
        for (declaration, (register, _)) in declared.iter().zip(&parameters) {
            self.bindings
                .push((declaration.identifier.clone(), *register));
        }
        let saved_ret = self.current_ret.replace(ret);
        let saved_epilogue = std::mem::take(&mut self.epilogue_jumps);

        self.lower_statement(body)?;

        // Falling off the end returns null.
        self.emit(Instruction::Set {
            target: ret,
            value: Value::Builtin("null".to_string()),
        });
        let epilogue = self.here();
        let jumps = std::mem::take(&mut self.epilogue_jumps);
        self.patch_all(&jumps, epilogue);
        self.emit(Instruction::SetCounter { address: ra });

        self.current_ret = saved_ret;
        self.epilogue_jumps = saved_epilogue;
        self.bindings.truncate(mark);
        Ok(())
    }
}

fn known_value(known: &Known) -> Value {
    match known {
        Known::Number(value) => Value::Number(*value),
        Known::Color(bits) => Value::Color(*bits),
        Known::Str(text) => Value::Str(text.clone()),
        Known::Builtin(name) => Value::Builtin(name.clone()),
        Known::True => Value::Builtin("true".to_string()),
        Known::False => Value::Builtin("false".to_string()),
        Known::Null => Value::Builtin("null".to_string()),
    }
}

/// The zero-is-false reading the target's jumps apply; null is false, any
/// other non-numeric immediate is truthy.
fn known_truthy(known: &Known) -> bool {
    match known.numeric() {
        Some(value) => value != 0.0,
        None => !matches!(known, Known::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Checker;
    use crate::loader::Loader;

    fn build_text(text: &str) -> String {
        let mut loader = Loader::new(vec![]);
        loader.add_virtual("t", text);
        let target = Checker::new(loader, None)
            .check("t")
            .expect("checking should succeed");
        Builder::new(&target)
            .build()
            .expect("building should succeed")
            .to_string()
    }

    #[test]
    fn pool_mangles_colliding_names() {
        let mut pool = Pool::new();
        let first = pool.allocate("x");
        let second = pool.allocate("x");
        assert_eq!(pool.names[first], "x");
        assert_eq!(pool.names[second], "x_2");
    }

    #[test]
    fn temporaries_are_stable_per_cursor_position() {
        let mut pool = Pool::new();
        assert_eq!(pool.temporary(0), pool.temporary(0));
        assert_ne!(pool.temporary(0), pool.temporary(1));
        let t1 = pool.temporary(1);
        assert_eq!(pool.names[t1], "_r1");
    }

    #[test]
    fn binary_operands_lower_into_adjacent_temporaries() {
        let output = build_text("entrypoint { var a; var b; a = (b + 1) * (b + 2); }");
        assert_eq!(
            output,
            "op add _r0 b 1\nop add _r1 b 2\nop mul a _r0 _r1\nend\n"
        );
    }

    #[test]
    fn shadowed_locals_get_distinct_registers() {
        let output = build_text(
            "entrypoint { var x = 1; { var x = 2; mlog::print(x); } mlog::print(x); }",
        );
        assert_eq!(output, "set x 1\nset x_2 2\nprint x_2\nprint x\nend\n");
    }

    #[test]
    fn unary_operators_keep_the_ternary_op_shape() {
        let output = build_text("entrypoint { var a; var b; a = -b; a = ~b; a = !b; }");
        assert_eq!(
            output,
            "op sub a 0 b\nop not a b 0\nop equal a b 0\nend\n"
        );
    }

    #[test]
    fn return_in_the_entrypoint_stops_the_program() {
        let output = build_text("entrypoint { var a; if a == 0 { return; } mlog::print(a); }");
        assert_eq!(
            output,
            "jump 2 notEqual a 0\nend\nprint a\nend\n"
        );
    }
}
