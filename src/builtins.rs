//! Native functions bound in the global frame.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{FromPrimitive, Signed};

use crate::diag::Position;
use crate::eval::RuntimeError;
use crate::value::{Builtin, BuiltinFn, Value};

fn single<'a>(name: &str, args: &'a [Value], line: Position) -> Result<&'a Value, RuntimeError> {
    match args {
        [v] => Ok(v),
        _ => Err(RuntimeError::ArityMismatch {
            name: name.to_owned(),
            given: args.len(),
            expected: 1,
            line,
        }),
    }
}

/// Unary function computed in floating point whatever the argument's kind.
macro_rules! float_builtin {
    ($name:ident, $f:expr) => {
        fn $name(args: &[Value], line: Position) -> Result<Value, RuntimeError> {
            const NAME: &str = stringify!($name);
            let x = single(NAME, args, line)?.to_float(NAME, line)?;
            Ok(Value::float($f(x)))
        }
    };
}

float_builtin!(acos, f64::acos);
float_builtin!(asin, f64::asin);
float_builtin!(atan, f64::atan);
float_builtin!(cos, f64::cos);
float_builtin!(cosh, f64::cosh);
float_builtin!(ln, f64::ln);
float_builtin!(log10, f64::log10);
float_builtin!(log2, f64::log2);
float_builtin!(sin, f64::sin);
float_builtin!(sinh, f64::sinh);
float_builtin!(sqrt, f64::sqrt);
float_builtin!(tan, f64::tan);
float_builtin!(tanh, f64::tanh);

fn abs(args: &[Value], line: Position) -> Result<Value, RuntimeError> {
    match single("abs", args, line)? {
        Value::Int { n, flavor } => Ok(Value::int_with(n.abs(), *flavor)),
        Value::Float { x, flavor } => Ok(Value::float_with(x.abs(), *flavor)),
        Value::Rational { q, flavor, prec } => Ok(Value::rational_with(q.abs(), *flavor, *prec)),
        v => Err(RuntimeError::TypeMismatch {
            op: "abs",
            operand: v.kind_name(),
            line,
        }),
    }
}

/// Rounds towards an integer; integers are returned unchanged.
fn round_with(
    name: &'static str,
    args: &[Value],
    line: Position,
    exact: fn(&BigRational) -> BigRational,
    float: fn(f64) -> f64,
) -> Result<Value, RuntimeError> {
    match single(name, args, line)? {
        v @ Value::Int { .. } => Ok(v.clone()),
        Value::Rational { q, .. } => Ok(Value::int(exact(q).to_integer())),
        Value::Float { x, .. } => BigInt::from_f64(float(*x))
            .map(Value::int)
            .ok_or_else(|| RuntimeError::Domain {
                details: format!("{} of {} is not an integer", name, x),
                line,
            }),
        v => Err(RuntimeError::TypeMismatch {
            op: name,
            operand: v.kind_name(),
            line,
        }),
    }
}

fn floor(args: &[Value], line: Position) -> Result<Value, RuntimeError> {
    round_with("floor", args, line, |q| q.floor(), f64::floor)
}

fn ceil(args: &[Value], line: Position) -> Result<Value, RuntimeError> {
    round_with("ceil", args, line, |q| q.ceil(), f64::ceil)
}

const fn unary(name: &'static str, body: BuiltinFn) -> Builtin {
    Builtin {
        name,
        arity: 1,
        body,
    }
}

/// Every builtin, in the order they are bound.
pub const BUILTINS: [Builtin; 16] = [
    unary("abs", abs),
    unary("acos", acos),
    unary("asin", asin),
    unary("atan", atan),
    unary("cos", cos),
    unary("cosh", cosh),
    unary("floor", floor),
    unary("ceil", ceil),
    unary("ln", ln),
    unary("log10", log10),
    unary("log2", log2),
    unary("sin", sin),
    unary("sinh", sinh),
    unary("sqrt", sqrt),
    unary("tan", tan),
    unary("tanh", tanh),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Flavor;
    use chrono::NaiveDate;

    fn call(name: &str, arg: Value) -> Result<Value, RuntimeError> {
        let builtin = BUILTINS
            .iter()
            .find(|b| b.name == name)
            .unwrap_or_else(|| panic!("no builtin {}", name));
        (builtin.body)(&[arg], 3)
    }

    #[test]
    fn names_are_unique() {
        for (i, b) in BUILTINS.iter().enumerate() {
            assert!(BUILTINS[i + 1..].iter().all(|other| other.name != b.name));
        }
    }

    #[test]
    fn float_functions() -> Result<(), RuntimeError> {
        assert_eq!(call("sqrt", Value::int(16))?, Value::float(4.0));
        assert_eq!(call("log2", Value::float(8.0))?, Value::float(3.0));
        assert_eq!(call("cos", Value::int(0))?, Value::float(1.0));
        let half = BigRational::new(BigInt::from(1), BigInt::from(4));
        assert_eq!(call("sqrt", Value::rational(half, 2))?, Value::float(0.5));
        Ok(())
    }

    #[test]
    fn abs_keeps_kind() -> Result<(), RuntimeError> {
        assert_eq!(
            call("abs", Value::int_with(-255, Flavor::Hex))?,
            Value::int_with(255, Flavor::Hex)
        );
        assert_eq!(call("abs", Value::float(-2.5))?, Value::float(2.5));
        let q = BigRational::new(BigInt::from(-5), BigInt::from(2));
        assert_eq!(call("abs", Value::rational(q, 1))?.to_string(), "2.5");
        Ok(())
    }

    #[test]
    fn rounding() -> Result<(), RuntimeError> {
        let q = BigRational::new(BigInt::from(-5), BigInt::from(2));
        assert_eq!(call("floor", Value::rational(q.clone(), 1))?, Value::int(-3));
        assert_eq!(call("ceil", Value::rational(q, 1))?, Value::int(-2));
        assert_eq!(call("floor", Value::float(2.7))?, Value::int(2));
        assert_eq!(call("ceil", Value::float(2.1))?, Value::int(3));
        assert_eq!(call("floor", Value::int(7))?, Value::int(7));
        Ok(())
    }

    #[test]
    fn rounding_infinity() {
        match call("floor", Value::float(f64::INFINITY)) {
            Err(RuntimeError::Domain { line: 3, .. }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn dates_are_not_numbers() {
        let d = Value::Date(NaiveDate::from_ymd_opt(2016, 1, 1).unwrap());
        match call("sqrt", d) {
            Err(RuntimeError::TypeMismatch {
                op: "sqrt",
                operand: "date",
                ..
            }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn wrong_argument_count() {
        match (BUILTINS[0].body)(&[], 1) {
            Err(RuntimeError::ArityMismatch {
                given: 0,
                expected: 1,
                ..
            }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }
}
