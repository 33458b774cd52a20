use thiserror::Error;

/// Line number (starting at one).
pub type Position = u32;

#[derive(Debug, Error, PartialEq)]
#[error("syntax error at line {pos}: {error}")]
pub struct FullParseError {
    pub pos: Position,
    pub error: ParseError,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// `context` names the construct being parsed, e.g. "while parsing basic expression".
    #[error("unexpected token '{found}' ({context})")]
    UnexpectedToken {
        found: String,
        context: &'static str,
    },
    #[error("unexpected token '{found}' (expecting '{expected}' {context})")]
    Expected {
        found: String,
        expected: &'static str,
        context: &'static str,
    },
    #[error("unexpected end of file ({context})")]
    UnexpectedEof { context: &'static str },
    #[error("could not parse expression")]
    Malformed,
    /// Diagnostic reported by the lexer.
    #[error("{0}")]
    Lexical(String),
    #[error("wrong number format '{0}'")]
    BadNumberLiteral(String),
    #[error("wrong date format '${0}' (expecting $yyyymmdd)")]
    BadDateLiteral(String),
    #[error("wrong time format '{0}' (expecting mm:ss or hh:mm:ss)")]
    BadTimeLiteral(String),
    #[error(
        "numbers with a decimal point are not allowed in undefined numeric mode \
         (use '@:f' for floating point or '@:r' for rational)"
    )]
    RealInUndefinedMode,
}
