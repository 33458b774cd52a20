use std::io::Cursor;

use num_traits::ToPrimitive;

use rcalc::ctx::{Context, NumericMode};
use rcalc::eval::{ExecError, RuntimeError};
use rcalc::interpreter::{CalcError, Interpreter};
use rcalc::token::TokenKind;
use rcalc::value::{Flavor, ResultKind, Value};
use rcalc::{execute, lex, new_global_call_stack, parse, parse_str};

const ACKERMANN: &str = r#"
    # Grows fast enough to exercise deep recursion.
    func af(m, n) {
        if (m == 0) {
            n + 1;
        } else if (n == 0) {
            af(m - 1, 1);
        } else {
            af(m - 1, af(m, n - 1));
        }
    }
"#;

fn run(source: &str) -> Result<Value, CalcError> {
    let mut out: Vec<u8> = Vec::new();
    let mut interp = Interpreter::new(&mut out);
    interp.eval_str(source)
}

fn run_in_mode(mode: NumericMode, source: &str) -> Result<Value, CalcError> {
    let mut out: Vec<u8> = Vec::new();
    let mut interp = Interpreter::with_context(&mut out, Context::with_mode(mode));
    interp.eval_str(source)
}

#[test]
fn composable_stages() -> Result<(), CalcError> {
    let ctx = Context::new();
    let ast = parse(Cursor::new("x = 6; x * 7"), ctx.clone())?;
    let mut stack = new_global_call_stack();
    let mut out: Vec<u8> = Vec::new();
    assert_eq!(execute(&ast, &mut stack, &mut out, ctx.clone())?, Value::int(42));

    // Globals persist in the stack across executions.
    let ast = parse_str("x + 1", ctx.clone())?;
    assert_eq!(execute(&ast, &mut stack, &mut out, ctx)?, Value::int(7));
    Ok(())
}

#[test]
fn octal_boundary() {
    let kinds: Vec<TokenKind> = lex(Cursor::new("0123  01238")).map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        [TokenKind::Oct, TokenKind::Oct, TokenKind::Error, TokenKind::Eof]
    );
}

#[test]
fn integer_literals_keep_their_form() -> Result<(), CalcError> {
    assert_eq!(run("42")?, Value::int(42));
    assert_eq!(run("052")?, Value::int_with(42, Flavor::Oct));
    assert_eq!(run("0x2a")?, Value::int_with(42, Flavor::Hex));
    assert_eq!(
        run("123456789012345678901234567890")?.to_string(),
        "123'456'789'012'345'678'901'234'567'890"
    );
    Ok(())
}

#[test]
fn widening() -> Result<(), CalcError> {
    let v = run_in_mode(NumericMode::Float, "2 + 0.5")?;
    assert_eq!(v.result_kind(), ResultKind::Float);
    let v = run_in_mode(NumericMode::Rational, "2 + 0.5")?;
    assert_eq!(v.result_kind(), ResultKind::Rational);
    assert_eq!(v.to_string(), "2.5");
    Ok(())
}

#[test]
fn increment_yields_the_new_value() -> Result<(), CalcError> {
    let mut out: Vec<u8> = Vec::new();
    let mut interp = Interpreter::new(&mut out);
    assert_eq!(interp.eval_str("a = 12; a++")?, Value::int(13));
    assert_eq!(interp.eval_str("a")?, Value::int(13));
    Ok(())
}

#[test]
fn fractional_power() -> Result<(), CalcError> {
    match run_in_mode(NumericMode::Float, "2**(1/2)")? {
        Value::Float { x, .. } => assert!((x - 1.41421356).abs() < 1e-8),
        v => panic!("unexpected output: {:?}", v),
    }
    match run_in_mode(NumericMode::Rational, "2**(1/2)")? {
        Value::Rational { q, .. } => {
            let x = q.to_f64().unwrap_or(f64::NAN);
            assert!((x - 1.41421356).abs() < 1e-8);
        }
        v => panic!("unexpected output: {:?}", v),
    }
    Ok(())
}

#[test]
fn precedence() -> Result<(), CalcError> {
    assert_eq!(run("1+2*3-4")?, Value::int(3));
    assert_eq!(run("(1+2)*3-4")?, Value::int(5));
    assert_eq!(run("2 * 3 ** 2")?, Value::int(18));
    assert_eq!(run("1 + 1 == 2 && 3 > 2")?, Value::int(1));
    Ok(())
}

#[test]
fn ackermann() -> Result<(), CalcError> {
    let mut out: Vec<u8> = Vec::new();
    let mut interp = Interpreter::new(&mut out);
    interp.eval_str(ACKERMANN)?;
    assert_eq!(interp.eval_str("af(2, 3)")?, Value::int(9));
    assert_eq!(interp.eval_str("af(3, 3)")?, Value::int(61));
    Ok(())
}

#[test]
fn undefined_mode_does_not_end_the_session() -> Result<(), CalcError> {
    let mut out: Vec<u8> = Vec::new();
    let ctx = Context::with_mode(NumericMode::Undefined);
    let mut interp = Interpreter::with_context(&mut out, ctx);
    interp.eval_str("total = 10")?;
    match interp.eval_str("total / 4") {
        Err(CalcError::Exec(ExecError {
            error: RuntimeError::ModeUndefined { .. },
            ..
        })) => (),
        r => panic!("unexpected output: {:?}", r),
    }
    assert_eq!(interp.eval_str("total * 2")?, Value::int(20));
    match interp.eval_str("1.5") {
        Err(CalcError::Parse(_)) => (),
        r => panic!("unexpected output: {:?}", r),
    }
    Ok(())
}

#[test]
fn date_arithmetic() -> Result<(), CalcError> {
    assert_eq!(run("$20160101 + 1")?.to_string(), "$20160102");
    assert_eq!(run("$20161231 + 1")?.to_string(), "$20170101");
    assert_eq!(run("$20170101 - $20160101")?, Value::int(366));
    match run("1 - $20160101") {
        Err(CalcError::Exec(ExecError {
            error: RuntimeError::TypeMismatch { op: "-", .. },
            ..
        })) => (),
        r => panic!("unexpected output: {:?}", r),
    }
    Ok(())
}

#[test]
fn callables_are_not_numbers() {
    match run("sqrt + 1") {
        Err(CalcError::Exec(ExecError {
            error: RuntimeError::TypeMismatch { op: "+", operand: "builtin", .. },
            ..
        })) => (),
        r => panic!("unexpected output: {:?}", r),
    }
    match run("func f(a) { a; }\nf * 2") {
        Err(CalcError::Exec(ExecError {
            error:
                RuntimeError::TypeMismatch {
                    op: "*",
                    operand: "function",
                    line: 2,
                },
            ..
        })) => (),
        r => panic!("unexpected output: {:?}", r),
    }
}

#[test]
fn rendered_values_parse_back() -> Result<(), CalcError> {
    for (mode, source) in [
        (NumericMode::Rational, "1234567"),
        (NumericMode::Rational, "-98765 * 3"),
        (NumericMode::Rational, "5 / 4"),
        (NumericMode::Rational, "1234.5"),
        (NumericMode::Float, "1234.25"),
        (NumericMode::Float, "0.5e-3"),
    ] {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::with_context(&mut out, Context::with_mode(mode));
        let v = interp.eval_str(&format!("x = {}", source))?;
        let rendered = interp.render(&v);
        let same = interp.eval_str(&format!("x == {}", rendered))?;
        assert_eq!(same, Value::int(1), "{} rendered as {}", source, rendered);
    }
    Ok(())
}

#[test]
fn display_statement() -> Result<(), CalcError> {
    let mut out: Vec<u8> = Vec::new();
    let mut interp = Interpreter::new(&mut out);
    interp.eval_str("func f(a, b) { a + b; }")?;
    interp.eval_str("@ f; @ 2.5; @:f; @ 5 / 2; @ 31")?;
    interp.eval_str("@:p; @ 31")?;
    assert_eq!(
        String::from_utf8_lossy(&out),
        "function f(a, b)\nrational 5/2 = 2.5\nfloat 2.5\ninteger 31\ninteger 31\t0x1f\n"
    );
    Ok(())
}

#[test]
fn call_trace() {
    let source = "func inner(x) {\n  x / 0;\n}\nfunc outer(x) {\n  inner(x);\n}\nouter(1)";
    match run(source) {
        Err(CalcError::Exec(ExecError {
            error: RuntimeError::DivisionByZero { line: 2 },
            trace,
        })) => {
            let trace: Vec<String> = trace.iter().map(|t| t.to_string()).collect();
            assert_eq!(trace, ["at inner (line 5)", "at outer (line 7)"]);
        }
        r => panic!("unexpected output: {:?}", r),
    }
}

#[test]
fn exit_skips_the_rest() -> Result<(), CalcError> {
    let mut out: Vec<u8> = Vec::new();
    let mut interp = Interpreter::new(&mut out);
    assert_eq!(interp.eval_str("a = 1; exit; a = 2")?, Value::zero());
    assert!(interp.exit_requested());
    Ok(())
}
