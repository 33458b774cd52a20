//! Tree-walking evaluator.
//!
//! Scoping is static and two-level: a function body sees its own frame and the global frame,
//! never the frame of its caller.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::io::prelude::*;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{DisplayAction, FunctionDef, Node, NodeKind};
use crate::builtins::BUILTINS;
use crate::ctx::Context;
use crate::diag::Position;
use crate::token::{TokenKind, UnaryFn};
use crate::value::{ResultKind, Value};

/// Remaining stack below which recursive descent grows a new segment.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown variable '{name}' at line {line}")]
    UndefinedVariable { name: String, line: Position },
    #[error(
        "can not call '{name}' at line {line}: wrong number of arguments \
         (given {given}, expected {expected})"
    )]
    ArityMismatch {
        name: String,
        given: usize,
        expected: usize,
        line: Position,
    },
    #[error("can not apply '{op}' to {operand} value at line {line}")]
    TypeMismatch {
        op: &'static str,
        operand: &'static str,
        line: Position,
    },
    #[error(
        "can not compute '{op}' at line {line} in undefined numeric mode \
         (use '@:f' for floating point or '@:r' for rational)"
    )]
    ModeUndefined { op: &'static str, line: Position },
    #[error("can not call '{name}' at line {line}: not a function")]
    NotCallable { name: String, line: Position },
    #[error("division by zero at line {line}")]
    DivisionByZero { line: Position },
    #[error("{operand} value can not be used as boolean at line {line}")]
    NotABoolean {
        operand: &'static str,
        line: Position,
    },
    #[error("{details} at line {line}")]
    Domain { details: String, line: Position },
    #[error("'{op}' can not be used there at line {line}")]
    BadOperator { op: &'static str, line: Position },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One function activation unwound by an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub function: String,
    /// Line of the call.
    pub line: Position,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {} (line {})", self.function, self.line)
    }
}

/// Evaluation failure with the calls it unwound, innermost first.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ExecError {
    pub error: RuntimeError,
    pub trace: Vec<TraceEntry>,
}

impl From<RuntimeError> for ExecError {
    fn from(error: RuntimeError) -> ExecError {
        ExecError {
            error,
            trace: vec![],
        }
    }
}

impl From<io::Error> for ExecError {
    fn from(e: io::Error) -> ExecError {
        RuntimeError::from(e).into()
    }
}

pub type CallFrame = HashMap<String, Value>;

/// Frames of the active calls.  The first frame holds the globals and is never popped.
#[derive(Debug)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    /// Creates a stack made of a global frame holding the builtins.
    pub fn new() -> CallStack {
        let globals = BUILTINS
            .iter()
            .map(|b| (b.name.to_owned(), Value::Builtin(*b)))
            .collect();
        CallStack {
            frames: vec![globals],
        }
    }

    /// Finds the slot of `name` in the current frame, then in the global frame.  When it is in
    /// neither, a zero slot is created in the current frame if `also_define` is set.
    pub fn lookup(
        &mut self,
        name: &str,
        also_define: bool,
        line: Position,
    ) -> Result<&mut Value, RuntimeError> {
        let top = self.frames.len() - 1;
        let depth = if self.frames[top].contains_key(name) {
            top
        } else if self.frames[0].contains_key(name) {
            0
        } else if also_define {
            self.frames[top].insert(name.to_owned(), Value::zero());
            top
        } else {
            return Err(undefined(name, line));
        };
        self.frames[depth]
            .get_mut(name)
            .ok_or_else(|| undefined(name, line))
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Drops every frame above the global one.
    pub fn unwind_to_global(&mut self) {
        self.frames.truncate(1);
    }

    pub fn bind_global(&mut self, name: impl Into<String>, value: Value) {
        self.frames[0].insert(name.into(), value);
    }

    pub fn bind_local(&mut self, name: impl Into<String>, value: Value) {
        let top = self.frames.len() - 1;
        self.frames[top].insert(name.into(), value);
    }

    /// Number of frames, the global one included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn globals(&self) -> &CallFrame {
        &self.frames[0]
    }
}

impl Default for CallStack {
    fn default() -> Self {
        CallStack::new()
    }
}

fn undefined(name: &str, line: Position) -> RuntimeError {
    RuntimeError::UndefinedVariable {
        name: name.to_owned(),
        line,
    }
}

fn bad_operator(op: TokenKind, line: Position) -> RuntimeError {
    RuntimeError::BadOperator {
        op: op.lexeme().unwrap_or_else(|| op.name()),
        line,
    }
}

#[derive(Debug)]
pub struct Evaluator<'t, W: Write> {
    output: &'t mut W,
    ctx: Rc<Context>,
    exit_requested: bool,
}

impl<'t, W: Write> Evaluator<'t, W> {
    pub fn new(output: &'t mut W, ctx: Rc<Context>) -> Evaluator<'t, W> {
        Evaluator {
            output,
            ctx,
            exit_requested: false,
        }
    }

    /// Whether an `exit` statement ran during the last `execute`.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Evaluates a whole program.  On failure the frames above the global one are discarded
    /// and the globals keep the values they had when the error occurred.
    pub fn execute(&mut self, node: &Node, stack: &mut CallStack) -> Result<Value, ExecError> {
        self.exit_requested = false;
        let result = self.eval(node, stack);
        if result.is_err() {
            stack.unwind_to_global();
        }
        result
    }

    fn eval(&mut self, node: &Node, stack: &mut CallStack) -> Result<Value, ExecError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_node(node, stack)
        })
    }

    fn eval_node(&mut self, node: &Node, stack: &mut CallStack) -> Result<Value, ExecError> {
        let line = node.line;
        match &node.kind {
            NodeKind::Body(stmts) => {
                let mut last = Value::zero();
                for stmt in stmts {
                    if self.exit_requested {
                        break;
                    }
                    last = self.eval(stmt, stack)?;
                }
                Ok(last)
            }
            NodeKind::Constant(v) => Ok(v.clone()),
            NodeKind::Variable(name) => Ok(stack.lookup(name, false, line)?.clone()),
            NodeKind::Unary { op, operand } => self.unary(*op, operand, line, stack),
            NodeKind::Binary { op, lhs, rhs } => {
                let f = op.binary().ok_or_else(|| bad_operator(*op, line))?;
                let a = self.eval(lhs, stack)?;
                let b = self.eval(rhs, stack)?;
                Ok(f(&a, &b, ResultKind::of(&a, &b), self.ctx.mode(), line)?)
            }
            NodeKind::Assign { op, target, value } => {
                // The slot is resolved, and for `=` created as integer zero, before the
                // right-hand side runs.
                stack.lookup(target, op.binary().is_none(), line)?;
                let value = self.eval(value, stack)?;
                match op.binary() {
                    None => {
                        *stack.lookup(target, false, line)? = value.clone();
                        Ok(value)
                    }
                    Some(f) => {
                        let slot = stack.lookup(target, false, line)?;
                        let combined =
                            f(slot, &value, ResultKind::of(slot, &value), self.ctx.mode(), line)?;
                        *slot = combined.clone();
                        Ok(combined)
                    }
                }
            }
            NodeKind::While { guard, body } => {
                let mut last = Value::zero();
                while !self.exit_requested && self.condition(guard, stack)? {
                    last = self.eval(body, stack)?;
                }
                Ok(last)
            }
            NodeKind::For {
                init,
                guard,
                step,
                body,
            } => {
                self.eval(init, stack)?;
                let mut last = Value::zero();
                while !self.exit_requested && self.condition(guard, stack)? {
                    last = self.eval(body, stack)?;
                    self.eval(step, stack)?;
                }
                Ok(last)
            }
            NodeKind::If {
                guard,
                then,
                otherwise,
            } => {
                if self.condition(guard, stack)? {
                    self.eval(then, stack)
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise, stack)
                } else {
                    Ok(Value::zero())
                }
            }
            NodeKind::FunctionDef(def) => {
                let f = Value::Function(def.clone());
                stack.bind_global(def.name.clone(), f.clone());
                Ok(f)
            }
            NodeKind::Call { name, args } => self.call(name, args, line, stack),
            NodeKind::Display(action) => self.display(action, stack),
            NodeKind::Exit => {
                self.exit_requested = true;
                Ok(Value::zero())
            }
        }
    }

    fn condition(&mut self, guard: &Node, stack: &mut CallStack) -> Result<bool, ExecError> {
        Ok(self.eval(guard, stack)?.to_bool(guard.line)?)
    }

    fn unary(
        &mut self,
        op: TokenKind,
        operand: &Node,
        line: Position,
        stack: &mut CallStack,
    ) -> Result<Value, ExecError> {
        match op.unary() {
            Some(UnaryFn::Pure(f)) => {
                let v = self.eval(operand, stack)?;
                Ok(f(&v, line)?)
            }
            Some(UnaryFn::InPlace(f)) => match &operand.kind {
                NodeKind::Variable(name) => Ok(f(stack.lookup(name, false, line)?, line)?),
                _ => Err(bad_operator(op, line).into()),
            },
            None => Err(bad_operator(op, line).into()),
        }
    }

    fn call(
        &mut self,
        name: &str,
        args: &[Node],
        line: Position,
        stack: &mut CallStack,
    ) -> Result<Value, ExecError> {
        let callee = stack.lookup(name, false, line)?.clone();

        let mut argv = Vec::with_capacity(args.len());
        for arg in args {
            argv.push(self.eval(arg, stack)?);
        }

        match callee {
            Value::Builtin(builtin) => {
                check_arity(name, argv.len(), builtin.arity, line)?;
                Ok((builtin.body)(&argv, line)?)
            }
            Value::Function(def) => self.call_function(&def, argv, line, stack),
            _ => Err(RuntimeError::NotCallable {
                name: name.to_owned(),
                line,
            }
            .into()),
        }
    }

    fn call_function(
        &mut self,
        def: &FunctionDef,
        argv: Vec<Value>,
        line: Position,
        stack: &mut CallStack,
    ) -> Result<Value, ExecError> {
        check_arity(&def.name, argv.len(), def.params.len(), line)?;

        let frame: CallFrame = def.params.iter().cloned().zip(argv).collect();
        stack.push(frame);
        let result = self.eval(&def.body, stack);
        stack.pop();

        result.map_err(|mut e| {
            e.trace.push(TraceEntry {
                function: def.name.clone(),
                line,
            });
            e
        })
    }

    fn display(
        &mut self,
        action: &DisplayAction,
        stack: &mut CallStack,
    ) -> Result<Value, ExecError> {
        match action {
            DisplayAction::Show(expr) => {
                let v = self.eval(expr, stack)?;
                writeln!(self.output, "{}", v.describe(self.ctx.programmer_mode()))?;
                Ok(v)
            }
            DisplayAction::SetMode(mode) => {
                self.ctx.set_mode(*mode);
                Ok(Value::zero())
            }
            DisplayAction::ToggleProgrammer => {
                self.ctx.toggle_programmer_mode();
                Ok(Value::boolean(self.ctx.programmer_mode()))
            }
        }
    }
}

fn check_arity(
    name: &str,
    given: usize,
    expected: usize,
    line: Position,
) -> Result<(), RuntimeError> {
    if given == expected {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch {
            name: name.to_owned(),
            given,
            expected,
            line,
        })
    }
}

/// Creates a call stack whose global frame holds the builtins.
pub fn new_global_call_stack() -> CallStack {
    CallStack::new()
}

/// Evaluates `node` with display output going to `output`.
pub fn execute<W: Write>(
    node: &Node,
    stack: &mut CallStack,
    output: &mut W,
    ctx: Rc<Context>,
) -> Result<Value, ExecError> {
    Evaluator::new(output, ctx).execute(node, stack)
}
