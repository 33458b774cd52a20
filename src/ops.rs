//! Operator semantics.
//!
//! Binary operators receive the operands, the [`ResultKind`] of the operation (the widest kind
//! among the operands) and the current [`NumericMode`], and dispatch on the kind.

use std::cmp::Ordering;

use chrono::{Days, NaiveDate};
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};

use crate::ctx::NumericMode;
use crate::diag::Position;
use crate::eval::RuntimeError;
use crate::value::{ResultKind, Value};

/// Extra fractional digits displayed for the result of a division.
pub const DIVISION_HEADROOM: usize = 8;

/// Display precision never grows beyond this many fractional digits.
pub const MAX_PRECISION: usize = 64;

fn mismatch(
    op: &'static str,
    kind: ResultKind,
    a: &Value,
    b: &Value,
    line: Position,
) -> RuntimeError {
    let operand = match kind {
        ResultKind::Callable if a.is_callable() => a.kind_name(),
        ResultKind::Callable => b.kind_name(),
        other => other.name(),
    };
    RuntimeError::TypeMismatch { op, operand, line }
}

fn domain(details: impl Into<String>, line: Position) -> RuntimeError {
    RuntimeError::Domain {
        details: details.into(),
        line,
    }
}

fn capped(prec: usize) -> usize {
    prec.min(MAX_PRECISION)
}

pub fn add(
    a: &Value,
    b: &Value,
    kind: ResultKind,
    _mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    const OP: &str = "+";
    let flavor = a.flavor().merge(b.flavor());
    match kind {
        ResultKind::Int => Ok(Value::int_with(
            a.to_int(OP, line)? + b.to_int(OP, line)?,
            flavor,
        )),
        ResultKind::Rational => Ok(Value::rational_with(
            a.to_rational(OP, line)? + b.to_rational(OP, line)?,
            flavor,
            a.precision().max(b.precision()),
        )),
        ResultKind::Float => Ok(Value::float_with(
            a.to_float(OP, line)? + b.to_float(OP, line)?,
            flavor,
        )),
        ResultKind::Date => match (a, b) {
            (Value::Date(d), offset) | (offset, Value::Date(d)) => {
                shift_date(*d, day_count(offset, OP, line)?, line)
            }
            _ => Err(mismatch(OP, kind, a, b, line)),
        },
        ResultKind::Callable => Err(mismatch(OP, kind, a, b, line)),
    }
}

pub fn sub(
    a: &Value,
    b: &Value,
    kind: ResultKind,
    _mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    const OP: &str = "-";
    let flavor = a.flavor().merge(b.flavor());
    match kind {
        ResultKind::Int => Ok(Value::int_with(
            a.to_int(OP, line)? - b.to_int(OP, line)?,
            flavor,
        )),
        ResultKind::Rational => Ok(Value::rational_with(
            a.to_rational(OP, line)? - b.to_rational(OP, line)?,
            flavor,
            a.precision().max(b.precision()),
        )),
        ResultKind::Float => Ok(Value::float_with(
            a.to_float(OP, line)? - b.to_float(OP, line)?,
            flavor,
        )),
        ResultKind::Date => match (a, b) {
            (Value::Date(x), Value::Date(y)) => {
                Ok(Value::int(x.signed_duration_since(*y).num_days()))
            }
            (Value::Date(d), offset) => {
                let days = day_count(offset, OP, line)?;
                let back = days
                    .checked_neg()
                    .ok_or_else(|| domain("day offset out of range", line))?;
                shift_date(*d, back, line)
            }
            _ => Err(mismatch(OP, kind, a, b, line)),
        },
        ResultKind::Callable => Err(mismatch(OP, kind, a, b, line)),
    }
}

fn day_count(offset: &Value, op: &'static str, line: Position) -> Result<i64, RuntimeError> {
    offset
        .to_int(op, line)?
        .to_i64()
        .ok_or_else(|| domain("day offset out of range", line))
}

fn shift_date(date: NaiveDate, days: i64, line: Position) -> Result<Value, RuntimeError> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted
        .map(Value::Date)
        .ok_or_else(|| domain("date out of range", line))
}

pub fn mul(
    a: &Value,
    b: &Value,
    kind: ResultKind,
    _mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    const OP: &str = "*";
    let flavor = a.flavor().merge(b.flavor());
    match kind {
        ResultKind::Int => Ok(Value::int_with(
            a.to_int(OP, line)? * b.to_int(OP, line)?,
            flavor,
        )),
        ResultKind::Rational => Ok(Value::rational_with(
            a.to_rational(OP, line)? * b.to_rational(OP, line)?,
            flavor,
            capped(a.precision() + b.precision()),
        )),
        ResultKind::Float => Ok(Value::float_with(
            a.to_float(OP, line)? * b.to_float(OP, line)?,
            flavor,
        )),
        ResultKind::Date | ResultKind::Callable => Err(mismatch(OP, kind, a, b, line)),
    }
}

pub fn div(
    a: &Value,
    b: &Value,
    kind: ResultKind,
    mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    const OP: &str = "/";
    if matches!(kind, ResultKind::Date | ResultKind::Callable) {
        return Err(mismatch(OP, kind, a, b, line));
    }
    match mode {
        NumericMode::Undefined => Err(RuntimeError::ModeUndefined { op: OP, line }),
        NumericMode::Rational if kind != ResultKind::Float => {
            let divisor = b.to_rational(OP, line)?;
            if divisor.is_zero() {
                return Err(RuntimeError::DivisionByZero { line });
            }
            Ok(Value::rational(
                a.to_rational(OP, line)? / divisor,
                capped(a.precision().max(b.precision()) + DIVISION_HEADROOM),
            ))
        }
        _ => Ok(Value::float(a.to_float(OP, line)? / b.to_float(OP, line)?)),
    }
}

/// Euclidean remainder of integers: never negative.
pub fn modulo(
    a: &Value,
    b: &Value,
    kind: ResultKind,
    _mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    const OP: &str = "%";
    if kind != ResultKind::Int {
        return Err(mismatch(OP, kind, a, b, line));
    }
    let divisor = b.to_int(OP, line)?;
    if divisor.is_zero() {
        return Err(RuntimeError::DivisionByZero { line });
    }
    Ok(Value::int_with(
        a.to_int(OP, line)?.mod_floor(&divisor.abs()),
        a.flavor().merge(b.flavor()),
    ))
}

pub fn pow(
    a: &Value,
    b: &Value,
    kind: ResultKind,
    mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    const OP: &str = "**";
    match kind {
        ResultKind::Int => {
            let base = a.to_int(OP, line)?;
            let exponent = b.to_int(OP, line)?;
            if !exponent.is_negative() {
                let k = exponent
                    .to_u32()
                    .ok_or_else(|| domain("exponent too large", line))?;
                return Ok(Value::int_with(base.pow(k), a.flavor()));
            }
            match mode {
                NumericMode::Undefined => Err(RuntimeError::ModeUndefined { op: OP, line }),
                NumericMode::Float => Ok(Value::float(
                    a.to_float(OP, line)?.powf(b.to_float(OP, line)?),
                )),
                NumericMode::Rational => {
                    let q = a.to_rational(OP, line)?;
                    rational_power(&q, exponent, DIVISION_HEADROOM, line)
                }
            }
        }
        ResultKind::Rational => {
            let base = a.to_rational(OP, line)?;
            let exponent = b.to_rational(OP, line)?;
            if exponent.is_integer() {
                let k = exponent.to_integer();
                let prec = k
                    .abs()
                    .to_usize()
                    .and_then(|k| a.precision().max(1).checked_mul(k))
                    .map_or(MAX_PRECISION, capped);
                return rational_power(&base, &k, prec, line);
            }
            fractional_power(a, b, mode, line)
        }
        ResultKind::Float => Ok(Value::float(
            a.to_float(OP, line)?.powf(b.to_float(OP, line)?),
        )),
        ResultKind::Date | ResultKind::Callable => Err(mismatch(OP, kind, a, b, line)),
    }
}

fn rational_power(
    base: &BigRational,
    exponent: &BigInt,
    prec: usize,
    line: Position,
) -> Result<Value, RuntimeError> {
    let k = exponent
        .to_i32()
        .ok_or_else(|| domain("exponent too large", line))?;
    if k < 0 && base.is_zero() {
        return Err(RuntimeError::DivisionByZero { line });
    }
    Ok(Value::rational(base.pow(k), prec))
}

/// Powers with a non-integral exponent are computed in floating point.
fn fractional_power(
    a: &Value,
    b: &Value,
    mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    const OP: &str = "**";
    let x = a.to_float(OP, line)?.powf(b.to_float(OP, line)?);
    match mode {
        NumericMode::Undefined => Err(RuntimeError::ModeUndefined { op: OP, line }),
        NumericMode::Float => Ok(Value::float(x)),
        NumericMode::Rational => {
            let q = BigRational::from_f64(x)
                .ok_or_else(|| domain(format!("{} has no rational value", x), line))?;
            let prec = a
                .precision()
                .max(b.precision())
                .max(DIVISION_HEADROOM);
            Ok(Value::rational(q, capped(prec)))
        }
    }
}

fn bitwise(
    op: &'static str,
    a: &Value,
    b: &Value,
    kind: ResultKind,
    line: Position,
    f: fn(&BigInt, &BigInt) -> BigInt,
) -> Result<Value, RuntimeError> {
    if kind != ResultKind::Int {
        return Err(mismatch(op, kind, a, b, line));
    }
    Ok(Value::int_with(
        f(a.to_int(op, line)?, b.to_int(op, line)?),
        a.flavor().merge(b.flavor()),
    ))
}

pub fn bit_or(
    a: &Value,
    b: &Value,
    kind: ResultKind,
    _mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    bitwise("|", a, b, kind, line, |x, y| x | y)
}

pub fn bit_and(
    a: &Value,
    b: &Value,
    kind: ResultKind,
    _mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    bitwise("&", a, b, kind, line, |x, y| x & y)
}

/// Both operands are always evaluated; only integers are accepted.
pub fn logical_or(
    a: &Value,
    b: &Value,
    _kind: ResultKind,
    _mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    let (x, y) = (a.to_bool(line)?, b.to_bool(line)?);
    Ok(Value::boolean(x || y))
}

pub fn logical_and(
    a: &Value,
    b: &Value,
    _kind: ResultKind,
    _mode: NumericMode,
    line: Position,
) -> Result<Value, RuntimeError> {
    let (x, y) = (a.to_bool(line)?, b.to_bool(line)?);
    Ok(Value::boolean(x && y))
}

/// `None` when the operands are unordered (NaN).
fn compare(
    op: &'static str,
    a: &Value,
    b: &Value,
    kind: ResultKind,
    line: Position,
) -> Result<Option<Ordering>, RuntimeError> {
    match kind {
        ResultKind::Int => Ok(Some(a.to_int(op, line)?.cmp(b.to_int(op, line)?))),
        ResultKind::Rational => {
            Ok(Some(a.to_rational(op, line)?.cmp(&b.to_rational(op, line)?)))
        }
        ResultKind::Float => Ok(a.to_float(op, line)?.partial_cmp(&b.to_float(op, line)?)),
        ResultKind::Date => match (a, b) {
            (Value::Date(x), Value::Date(y)) => Ok(Some(x.cmp(y))),
            _ => Err(mismatch(op, kind, a, b, line)),
        },
        ResultKind::Callable => Err(mismatch(op, kind, a, b, line)),
    }
}

macro_rules! comparison {
    ($name:ident, $op:literal, |$ordering:ident| $test:expr) => {
        pub fn $name(
            a: &Value,
            b: &Value,
            kind: ResultKind,
            _mode: NumericMode,
            line: Position,
        ) -> Result<Value, RuntimeError> {
            let $ordering = compare($op, a, b, kind, line)?;
            Ok(Value::boolean($test))
        }
    };
}

comparison!(eq, "==", |o| o == Some(Ordering::Equal));
comparison!(ne, "!=", |o| o != Some(Ordering::Equal));
comparison!(gt, ">", |o| o == Some(Ordering::Greater));
comparison!(ge, ">=", |o| matches!(o, Some(Ordering::Greater | Ordering::Equal)));
comparison!(lt, "<", |o| o == Some(Ordering::Less));
comparison!(le, "<=", |o| matches!(o, Some(Ordering::Less | Ordering::Equal)));

pub fn negate(v: &Value, line: Position) -> Result<Value, RuntimeError> {
    match v {
        Value::Int { n, flavor } => Ok(Value::int_with(-n, *flavor)),
        Value::Float { x, flavor } => Ok(Value::float_with(-x, *flavor)),
        Value::Rational { q, flavor, prec } => Ok(Value::rational_with(-q, *flavor, *prec)),
        v => Err(RuntimeError::TypeMismatch {
            op: "-",
            operand: v.kind_name(),
            line,
        }),
    }
}

pub fn not(v: &Value, line: Position) -> Result<Value, RuntimeError> {
    match v {
        Value::Int { n, .. } => Ok(Value::boolean(n.is_zero())),
        v => Err(RuntimeError::TypeMismatch {
            op: "!",
            operand: v.kind_name(),
            line,
        }),
    }
}

fn step(
    op: &'static str,
    slot: &mut Value,
    delta: i32,
    line: Position,
) -> Result<Value, RuntimeError> {
    match slot {
        Value::Int { n, .. } => *n += BigInt::from(delta),
        Value::Float { x, .. } => *x += f64::from(delta),
        Value::Rational { q, .. } => *q += BigRational::from_integer(BigInt::from(delta)),
        v => {
            return Err(RuntimeError::TypeMismatch {
                op,
                operand: v.kind_name(),
                line,
            })
        }
    }
    Ok(slot.clone())
}

/// `++`: bumps the variable and yields its new value.
pub fn increment(slot: &mut Value, line: Position) -> Result<Value, RuntimeError> {
    step("++", slot, 1, line)
}

pub fn decrement(slot: &mut Value, line: Position) -> Result<Value, RuntimeError> {
    step("--", slot, -1, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Flavor;

    const R: NumericMode = NumericMode::Rational;

    fn apply(
        f: crate::token::BinaryFn,
        a: &Value,
        b: &Value,
        mode: NumericMode,
    ) -> Result<Value, RuntimeError> {
        f(a, b, ResultKind::of(a, b), mode, 1)
    }

    fn ratio(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn integer_arithmetic() -> Result<(), RuntimeError> {
        assert_eq!(apply(add, &Value::int(2), &Value::int(3), R)?, Value::int(5));
        assert_eq!(apply(sub, &Value::int(2), &Value::int(3), R)?, Value::int(-1));
        assert_eq!(apply(mul, &Value::int(4), &Value::int(3), R)?, Value::int(12));
        assert_eq!(apply(pow, &Value::int(2), &Value::int(10), R)?, Value::int(1024));
        Ok(())
    }

    #[test]
    fn flavor_survives_only_between_equals() -> Result<(), RuntimeError> {
        let h = Value::int_with(0x10, Flavor::Hex);
        assert_eq!(apply(add, &h, &h, R)?.flavor(), Flavor::Hex);
        assert_eq!(apply(add, &h, &Value::int(1), R)?.flavor(), Flavor::Dec);
        Ok(())
    }

    #[test]
    fn division_follows_mode() -> Result<(), RuntimeError> {
        let (one, three) = (Value::int(1), Value::int(3));
        match apply(div, &one, &three, NumericMode::Undefined) {
            Err(RuntimeError::ModeUndefined { op: "/", line: 1 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        assert_eq!(
            apply(div, &one, &three, R)?,
            Value::rational(ratio(1, 3), DIVISION_HEADROOM)
        );
        assert_eq!(
            apply(div, &Value::int(3), &Value::int(2), NumericMode::Float)?,
            Value::float(1.5)
        );
        Ok(())
    }

    #[test]
    fn rational_division_by_zero() {
        match apply(div, &Value::int(1), &Value::int(0), R) {
            Err(RuntimeError::DivisionByZero { .. }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn float_division_by_zero_is_infinite() -> Result<(), RuntimeError> {
        let r = apply(div, &Value::int(1), &Value::int(0), NumericMode::Float)?;
        assert_eq!(r, Value::float(f64::INFINITY));
        Ok(())
    }

    #[test]
    fn rational_precision_tracking() -> Result<(), RuntimeError> {
        let a = Value::rational(ratio(23, 10), 1);
        let b = Value::rational(ratio(1, 100), 2);
        assert_eq!(apply(add, &a, &b, R)?.precision(), 2);
        assert_eq!(apply(mul, &a, &b, R)?.precision(), 3);
        assert_eq!(apply(div, &a, &b, R)?.precision(), 10);
        assert_eq!(apply(pow, &a, &Value::int(3), R)?.precision(), 3);
        Ok(())
    }

    #[test]
    fn modulo_is_euclidean() -> Result<(), RuntimeError> {
        assert_eq!(apply(modulo, &Value::int(7), &Value::int(3), R)?, Value::int(1));
        assert_eq!(apply(modulo, &Value::int(-7), &Value::int(3), R)?, Value::int(2));
        assert_eq!(apply(modulo, &Value::int(-7), &Value::int(-3), R)?, Value::int(2));
        match apply(modulo, &Value::float(7.0), &Value::int(3), R) {
            Err(RuntimeError::TypeMismatch { op: "%", operand: "float", .. }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        Ok(())
    }

    #[test]
    fn negative_exponents() -> Result<(), RuntimeError> {
        let (two, minus_two) = (Value::int(2), Value::int(-2));
        assert_eq!(apply(pow, &two, &minus_two, NumericMode::Float)?, Value::float(0.25));
        assert_eq!(
            apply(pow, &two, &minus_two, R)?,
            Value::rational(ratio(1, 4), DIVISION_HEADROOM)
        );
        match apply(pow, &two, &minus_two, NumericMode::Undefined) {
            Err(RuntimeError::ModeUndefined { op: "**", .. }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        match apply(pow, &Value::int(0), &minus_two, R) {
            Err(RuntimeError::DivisionByZero { .. }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        Ok(())
    }

    #[test]
    fn fractional_exponent_under_rational_mode() -> Result<(), RuntimeError> {
        let half = Value::rational(ratio(1, 2), 1);
        match apply(pow, &Value::int(4), &half, R)? {
            Value::Rational { q, .. } => assert_eq!(q, ratio(2, 1)),
            r => panic!("unexpected output: {:?}", r),
        }
        Ok(())
    }

    #[test]
    fn comparisons() -> Result<(), RuntimeError> {
        let (one, two) = (Value::int(1), Value::int(2));
        assert_eq!(apply(lt, &one, &two, R)?, Value::int(1));
        assert_eq!(apply(ge, &one, &two, R)?, Value::int(0));
        assert_eq!(apply(eq, &one, &Value::float(1.0), R)?, Value::int(1));
        assert_eq!(apply(ne, &Value::float(f64::NAN), &one, R)?, Value::int(1));
        assert_eq!(apply(le, &date(2016, 1, 1), &date(2016, 1, 2), R)?, Value::int(1));
        Ok(())
    }

    #[test]
    fn logical_and_bitwise() -> Result<(), RuntimeError> {
        let (zero, five) = (Value::int(0), Value::int(5));
        assert_eq!(apply(logical_or, &zero, &five, R)?, Value::int(1));
        assert_eq!(apply(logical_and, &zero, &five, R)?, Value::int(0));
        assert_eq!(apply(bit_or, &Value::int(4), &Value::int(1), R)?, Value::int(5));
        assert_eq!(apply(bit_and, &Value::int(6), &Value::int(3), R)?, Value::int(2));
        match apply(logical_or, &Value::float(1.0), &five, R) {
            Err(RuntimeError::NotABoolean { .. }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        Ok(())
    }

    #[test]
    fn date_arithmetic() -> Result<(), RuntimeError> {
        assert_eq!(apply(add, &date(2016, 1, 1), &Value::int(1), R)?, date(2016, 1, 2));
        assert_eq!(apply(add, &Value::int(31), &date(2016, 1, 1), R)?, date(2016, 2, 1));
        assert_eq!(apply(sub, &date(2016, 3, 1), &Value::int(1), R)?, date(2016, 2, 29));
        assert_eq!(apply(sub, &date(2016, 3, 1), &date(2016, 2, 1), R)?, Value::int(29));
        match apply(sub, &Value::int(1), &date(2016, 1, 1), R) {
            Err(RuntimeError::TypeMismatch { op: "-", operand: "date", .. }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        match apply(mul, &date(2016, 1, 1), &Value::int(2), R) {
            Err(RuntimeError::TypeMismatch { op: "*", .. }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        Ok(())
    }

    #[test]
    fn unary_operators() -> Result<(), RuntimeError> {
        assert_eq!(negate(&Value::int(3), 1)?, Value::int(-3));
        assert_eq!(not(&Value::int(0), 1)?, Value::int(1));
        assert_eq!(not(&Value::int(7), 1)?, Value::int(0));
        let mut slot = Value::int(41);
        assert_eq!(increment(&mut slot, 1)?, Value::int(42));
        assert_eq!(slot, Value::int(42));
        assert_eq!(decrement(&mut slot, 1)?, Value::int(41));
        let mut d = date(2016, 1, 1);
        match increment(&mut d, 9) {
            Err(RuntimeError::TypeMismatch { op: "++", operand: "date", line: 9 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        Ok(())
    }
}
