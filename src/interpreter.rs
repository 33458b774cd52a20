//! API to control the interpreter.

use std::io::prelude::*;
use std::io::Cursor;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{Node, NodeKind};
use crate::ctx::Context;
use crate::diag::FullParseError;
use crate::eval::{CallStack, Evaluator, ExecError};
use crate::parser::parse;
use crate::value::Value;

/// Name bound to the result of the last evaluated program.
pub const LAST_RESULT: &str = "_";

/// Calculator session: settings, global variables and functions survive between calls to
/// [`Interpreter::eval`].
///
/// # Example
///
/// Invoke the interpreter a first time to define a function then additional times to call this
/// function:
///
/// ```
/// # use rcalc::interpreter::{CalcError, Interpreter};
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// let func_def = r#"
///     func fact(n) {
///         if (n <= 1) {
///             1;
///         } else {
///             n * fact(n - 1);
///         }
///     }
/// "#;
/// interp.eval(func_def.as_bytes())?;
///
/// let v = interp.eval("fact(25)".as_bytes())?;
/// assert_eq!(v.to_string(), "15'511'210'043'330'985'984'000'000");
///
/// interp.eval("@ 7 / 2".as_bytes())?;
/// assert_eq!(output, b"rational 7/2 = 3.5\n");
/// # Ok::<(), CalcError>(())
/// ```
#[derive(Debug)]
pub struct Interpreter<'t, W: Write> {
    ctx: Rc<Context>,
    evaluator: Evaluator<'t, W>,
    stack: CallStack,
}

/// Errors the interpreter can raise.
#[derive(Debug, Error)]
pub enum CalcError {
    /// Error occurring during lexical or syntactic analysis.
    #[error(transparent)]
    Parse(#[from] FullParseError),

    /// Error occurring during evaluation.
    #[error("runtime error: {0}")]
    Exec(#[from] ExecError),
}

impl<'t, W: Write> Interpreter<'t, W> {
    /// Creates a session in rational mode writing display statements to `output`.
    pub fn new(output: &'t mut W) -> Interpreter<'t, W> {
        Interpreter::with_context(output, Context::new())
    }

    pub fn with_context(output: &'t mut W, ctx: Rc<Context>) -> Interpreter<'t, W> {
        Interpreter {
            ctx: ctx.clone(),
            evaluator: Evaluator::new(output, ctx),
            stack: CallStack::new(),
        }
    }

    /// Parses and runs a whole program and returns the value of its last statement.
    pub fn eval<R: BufRead + Send + 'static>(&mut self, input: R) -> Result<Value, CalcError> {
        let program = parse(input, self.ctx.clone())?;
        self.run(&program)
    }

    pub fn eval_str(&mut self, source: &str) -> Result<Value, CalcError> {
        self.eval(Cursor::new(source.to_owned()))
    }

    fn run(&mut self, program: &Node) -> Result<Value, CalcError> {
        let value = self.evaluator.execute(program, &mut self.stack)?;
        if updates_last_result(program) {
            self.stack.bind_global(LAST_RESULT, value.clone());
        }
        Ok(value)
    }

    /// Whether the last program ran `exit`.
    pub fn exit_requested(&self) -> bool {
        self.evaluator.exit_requested()
    }

    /// Textual form of `value` under the current settings.
    pub fn render(&self, value: &Value) -> String {
        value.render(self.ctx.programmer_mode())
    }

    pub fn context(&self) -> &Rc<Context> {
        &self.ctx
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.stack
    }
}

/// Looking at a variable or displaying something leaves the last result alone.
fn updates_last_result(program: &Node) -> bool {
    match &program.kind {
        NodeKind::Body(stmts) => match stmts.as_slice() {
            [] => false,
            [only] => !matches!(only.kind, NodeKind::Variable(_) | NodeKind::Display(_)),
            _ => true,
        },
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::NumericMode;
    use crate::eval::RuntimeError;

    fn interpret(input: &str) -> Result<String, CalcError> {
        let mut raw_output: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut raw_output);
        interp.eval_str(input)?;
        let output = String::from_utf8(raw_output).expect("cannot convert output to string");
        Ok(output)
    }

    #[test]
    fn display_expr() -> Result<(), CalcError> {
        assert_eq!(interpret("@ 3*2")?, "integer 6\n");
        assert_eq!(interpret("@ 0x1f")?, "integer 0x1f\n");
        Ok(())
    }

    #[test]
    fn value_of_last_statement() -> Result<(), CalcError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        assert_eq!(interp.eval_str("a = 2; b = 3; a * b")?, Value::int(6));
        assert_eq!(interp.eval_str("")?, Value::zero());
        Ok(())
    }

    #[test]
    fn last_result_is_bound() -> Result<(), CalcError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        interp.eval_str("3 + 4")?;
        interp.eval_str("x = 10")?;
        interp.eval_str("x")?;
        assert_eq!(interp.eval_str("_ * 2")?, Value::int(20));
        interp.eval_str("@")?;
        assert_eq!(out, b"integer 20\n");
        Ok(())
    }

    #[test]
    fn globals_survive_errors() -> Result<(), CalcError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        interp.eval_str("a = 1; func f(x) { x / 0; }")?;
        match interp.eval_str("a = 5; f(a)") {
            Err(CalcError::Exec(ExecError {
                error: RuntimeError::DivisionByZero { line: 1 },
                trace,
            })) => assert_eq!(trace.len(), 1),
            r => panic!("unexpected output: {:?}", r),
        }
        assert_eq!(interp.call_stack().depth(), 1);
        assert_eq!(interp.eval_str("a + 1")?, Value::int(6));
        Ok(())
    }

    #[test]
    fn parse_errors() {
        match interpret("a = (1 + 2") {
            Err(CalcError::Parse(e)) => assert_eq!(e.pos, 1),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn error_messages() {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        match interp.eval_str("\nnope + 1") {
            Err(e) => assert_eq!(e.to_string(), "runtime error: unknown variable 'nope' at line 2"),
            r => panic!("unexpected output: {:?}", r),
        }
        match interp.eval_str("2 + * 3") {
            Err(e) => assert_eq!(
                e.to_string(),
                "syntax error at line 1: unexpected token '*' (while parsing basic expression)"
            ),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn settings_are_shared() -> Result<(), CalcError> {
        let ctx = Context::with_mode(NumericMode::Undefined);
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::with_context(&mut out, ctx.clone());
        match interp.eval_str("1 / 2") {
            Err(CalcError::Exec(ExecError {
                error: RuntimeError::ModeUndefined { .. },
                ..
            })) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        interp.eval_str("@:f")?;
        assert_eq!(ctx.mode(), NumericMode::Float);
        assert_eq!(interp.eval_str("1 / 2")?, Value::float(0.5));

        let v = interp.eval_str("255")?;
        assert_eq!(interp.render(&v), "255");
        ctx.set_programmer_mode(true);
        assert_eq!(interp.render(&v), "255\t0xff");
        Ok(())
    }

    #[test]
    fn exit_is_reported() -> Result<(), CalcError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        interp.eval_str("1")?;
        assert!(!interp.exit_requested());
        interp.eval_str("exit")?;
        assert!(interp.exit_requested());
        assert_eq!(interp.eval_str("40 + 2")?, Value::int(42));
        assert!(!interp.exit_requested());
        Ok(())
    }

    #[test]
    fn long_sum() -> Result<(), CalcError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::new(&mut out);
        let source = format!("{}1", "1+".repeat(50_000));
        assert_eq!(interp.eval_str(&source)?, Value::int(50_001));
        Ok(())
    }
}
