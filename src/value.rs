//! Runtime values and their textual rendering.

use std::fmt;
use std::rc::Rc;

use chrono::NaiveDate;
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::ast::FunctionDef;
use crate::diag::Position;
use crate::eval::RuntimeError;

/// Preferred presentation of a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Dec,
    Oct,
    Hex,
    /// Float written with an exponent.
    Exp,
    /// Integer count of seconds shown as a duration.
    Time,
}

impl Flavor {
    /// Flavor of a result computed from operands of flavors `self` and `other`.
    pub fn merge(self, other: Flavor) -> Flavor {
        if self == other {
            self
        } else {
            Flavor::Dec
        }
    }
}

pub type BuiltinFn = fn(&[Value], Position) -> Result<Value, RuntimeError>;

/// Natively implemented function.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub body: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<builtin {}/{}>", self.name, self.arity)
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Builtin) -> bool {
        self.name == other.name && self.arity == other.arity
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int { n: BigInt, flavor: Flavor },
    Float { x: f64, flavor: Flavor },
    /// Exact rational displayed with `prec` fractional digits.
    Rational {
        q: BigRational,
        flavor: Flavor,
        prec: usize,
    },
    Date(NaiveDate),
    Function(Rc<FunctionDef>),
    Builtin(Builtin),
}

/// Kind of the result of a binary operation, the widest kind among its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResultKind {
    Int,
    Rational,
    Float,
    Date,
    Callable,
}

impl ResultKind {
    pub fn of(a: &Value, b: &Value) -> ResultKind {
        a.result_kind().max(b.result_kind())
    }

    pub fn name(self) -> &'static str {
        match self {
            ResultKind::Int => "integer",
            ResultKind::Rational => "rational",
            ResultKind::Float => "float",
            ResultKind::Date => "date",
            ResultKind::Callable => "function",
        }
    }
}

impl Value {
    pub fn int(n: impl Into<BigInt>) -> Value {
        Value::int_with(n, Flavor::Dec)
    }

    pub fn int_with(n: impl Into<BigInt>, flavor: Flavor) -> Value {
        Value::Int {
            n: n.into(),
            flavor,
        }
    }

    pub fn float(x: f64) -> Value {
        Value::float_with(x, Flavor::Dec)
    }

    pub fn float_with(x: f64, flavor: Flavor) -> Value {
        Value::Float { x, flavor }
    }

    pub fn rational(q: BigRational, prec: usize) -> Value {
        Value::rational_with(q, Flavor::Dec, prec)
    }

    pub fn rational_with(q: BigRational, flavor: Flavor, prec: usize) -> Value {
        Value::Rational { q, flavor, prec }
    }

    /// Integer 1 or 0.
    pub fn boolean(b: bool) -> Value {
        Value::int(u8::from(b))
    }

    /// Result of statements that produce nothing.
    pub fn zero() -> Value {
        Value::int(0)
    }

    pub fn result_kind(&self) -> ResultKind {
        match self {
            Value::Int { .. } => ResultKind::Int,
            Value::Rational { .. } => ResultKind::Rational,
            Value::Float { .. } => ResultKind::Float,
            Value::Date(_) => ResultKind::Date,
            Value::Function(_) | Value::Builtin(_) => ResultKind::Callable,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Builtin(_) => "builtin",
            v => v.result_kind().name(),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Builtin(_))
    }

    pub fn flavor(&self) -> Flavor {
        match self {
            Value::Int { flavor, .. }
            | Value::Float { flavor, .. }
            | Value::Rational { flavor, .. } => *flavor,
            _ => Flavor::Dec,
        }
    }

    /// Display precision of rationals, 0 for everything else.
    pub fn precision(&self) -> usize {
        match self {
            Value::Rational { prec, .. } => *prec,
            _ => 0,
        }
    }

    fn mismatch(&self, op: &'static str, line: Position) -> RuntimeError {
        RuntimeError::TypeMismatch {
            op,
            operand: self.kind_name(),
            line,
        }
    }

    pub fn to_int(&self, op: &'static str, line: Position) -> Result<&BigInt, RuntimeError> {
        match self {
            Value::Int { n, .. } => Ok(n),
            v => Err(v.mismatch(op, line)),
        }
    }

    pub fn to_rational(
        &self,
        op: &'static str,
        line: Position,
    ) -> Result<BigRational, RuntimeError> {
        match self {
            Value::Int { n, .. } => Ok(BigRational::from_integer(n.clone())),
            Value::Rational { q, .. } => Ok(q.clone()),
            v => Err(v.mismatch(op, line)),
        }
    }

    pub fn to_float(&self, op: &'static str, line: Position) -> Result<f64, RuntimeError> {
        match self {
            Value::Int { n, .. } => Ok(n.to_f64().unwrap_or(f64::NAN)),
            Value::Rational { q, .. } => Ok(q.to_f64().unwrap_or(f64::NAN)),
            Value::Float { x, .. } => Ok(*x),
            v => Err(v.mismatch(op, line)),
        }
    }

    /// Truth value of an integer used as a condition.
    pub fn to_bool(&self, line: Position) -> Result<bool, RuntimeError> {
        match self {
            Value::Int { n, .. } => Ok(!n.is_zero()),
            v => Err(RuntimeError::NotABoolean {
                operand: v.kind_name(),
                line,
            }),
        }
    }

    /// Textual form, with the hexadecimal value appended to decimal integers in programmer
    /// mode.
    pub fn render(&self, programmer: bool) -> String {
        match self {
            Value::Int { n, flavor } => render_int(n, *flavor, programmer),
            Value::Float { x, flavor } => render_float(*x, *flavor),
            Value::Rational { q, prec, .. } => group_digits(&truncated_decimal(q, *prec)),
            Value::Date(d) => format!("${}", d.format("%Y%m%d")),
            Value::Function(def) => format!("{}({})", def.name, def.params.join(", ")),
            Value::Builtin(b) => format!("{}/{}", b.name, b.arity),
        }
    }

    /// Kind-tagged form written by the `@` command.
    pub fn describe(&self, programmer: bool) -> String {
        match self {
            Value::Rational { q, .. } => format!(
                "rational {}/{} = {}",
                q.numer(),
                q.denom(),
                self.render(programmer)
            ),
            v => format!("{} {}", v.kind_name(), v.render(programmer)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}

fn render_int(n: &BigInt, flavor: Flavor, programmer: bool) -> String {
    match flavor {
        Flavor::Hex if programmer => format!("{}\t{:#x}", n, n),
        Flavor::Hex => format!("{:#x}", n),
        Flavor::Oct if n.is_zero() => "0".to_owned(),
        Flavor::Oct if n.is_negative() => format!("-0{:o}", n.abs()),
        Flavor::Oct => format!("0{:o}", n),
        Flavor::Time => render_time(n),
        _ if programmer => format!("{}\t{:#x}", group_digits(&n.to_string()), n),
        _ => group_digits(&n.to_string()),
    }
}

/// `hh:mm:ss` when there are hours, `mm:ss` otherwise.
fn render_time(seconds: &BigInt) -> String {
    let sign = if seconds.is_negative() { "-" } else { "" };
    let (minutes, secs) = seconds.abs().div_rem(&BigInt::from(60));
    let (hours, minutes) = minutes.div_rem(&BigInt::from(60));
    if hours.is_zero() {
        format!("{}{:02}:{:02}", sign, minutes, secs)
    } else {
        format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, secs)
    }
}

fn render_float(x: f64, flavor: Flavor) -> String {
    if !x.is_finite() {
        return x.to_string();
    }
    match flavor {
        Flavor::Exp => format!("{:e}", x),
        _ => group_digits(&x.to_string()),
    }
}

/// Decimal expansion of `q` truncated to `prec` fractional digits.
fn truncated_decimal(q: &BigRational, prec: usize) -> String {
    let scale = num_traits::pow(BigInt::from(10), prec);
    let scaled = (q.numer().abs() * &scale) / q.denom();
    let sign = if q.is_negative() && !scaled.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = scaled.to_string();
    if prec == 0 {
        return format!("{}{}", sign, digits);
    }
    let padded = format!("{:0>width$}", digits, width = prec + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - prec);
    format!("{}{}.{}", sign, int_part, frac_part)
}

/// Groups integral digits by thousands with `'` and drops trailing fractional zeros, keeping at
/// least one fractional digit.  Exponent notation is returned unchanged.
pub fn group_digits(s: &str) -> String {
    if s.contains(|c: char| c == 'e' || c == 'E') {
        return s.to_owned();
    }
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (integral, fraction) = match rest.find('.') {
        Some(dot) => rest.split_at(dot),
        None => (rest, ""),
    };

    let mut out = String::with_capacity(s.len() + integral.len() / 3);
    out.push_str(sign);
    for (i, ch) in integral.chars().enumerate() {
        if i != 0 && (integral.len() - i) % 3 == 0 {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push_str(trim_fraction(fraction));
    out
}

fn trim_fraction(fraction: &str) -> &str {
    if fraction.len() <= 2 {
        return fraction;
    }
    let end = fraction
        .char_indices()
        .skip(1)
        .filter(|(_, c)| *c != '0')
        .last()
        .map_or(2, |(i, _)| i + 1);
    &fraction[..end]
}
