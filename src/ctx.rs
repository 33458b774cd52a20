use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// How decimal literals and divisions are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericMode {
    /// Decimal literals and division are errors.
    Undefined,
    Float,
    #[default]
    Rational,
}

impl fmt::Display for NumericMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumericMode::Undefined => "undefined",
            NumericMode::Float => "float",
            NumericMode::Rational => "rational",
        };
        write!(f, "{}", name)
    }
}

/// Session settings shared by the parser and the evaluator.
///
/// Both read the numeric mode: the parser to decide how decimal literals are represented, the
/// evaluator for division and negative powers.  Running `@:f` or `@:r` changes it.
#[derive(Debug, Default)]
pub struct Context {
    mode: Cell<NumericMode>,
    programmer: Cell<bool>,
}

impl Context {
    /// Creates a new context in rational mode.
    ///
    /// Returns a Rc because the context is shared between various data structures.
    pub fn new() -> Rc<Self> {
        Rc::new(Context::default())
    }

    pub fn with_mode(mode: NumericMode) -> Rc<Self> {
        let ctx = Context::new();
        ctx.set_mode(mode);
        ctx
    }

    pub fn mode(&self) -> NumericMode {
        self.mode.get()
    }

    pub fn set_mode(&self, mode: NumericMode) {
        self.mode.set(mode);
    }

    /// Whether decimal integers are displayed with their hexadecimal value too.
    pub fn programmer_mode(&self) -> bool {
        self.programmer.get()
    }

    pub fn set_programmer_mode(&self, on: bool) {
        self.programmer.set(on);
    }

    pub fn toggle_programmer_mode(&self) {
        self.programmer.set(!self.programmer.get());
    }
}
