//! Token kinds and their static metadata.
//!
//! Every kind is described once in [`descriptors`]. [`TokenTable`] is built from that list in a
//! single pass: the descriptors are registered in any order and the lexical follow sets are then
//! computed over the complete set, so a two-character operator is found no matter where it is
//! declared relative to its one-character prefix.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::ctx::NumericMode;
use crate::diag::Position;
use crate::eval::RuntimeError;
use crate::ops;
use crate::value::{ResultKind, Value};

/// Native implementation of a binary operator.
pub type BinaryFn =
    fn(&Value, &Value, ResultKind, NumericMode, Position) -> Result<Value, RuntimeError>;

/// Native implementation of a unary operator.
#[derive(Debug, Clone, Copy)]
pub enum UnaryFn {
    /// Computes a new value from the operand.
    Pure(fn(&Value, Position) -> Result<Value, RuntimeError>),
    /// Mutates the operand's slot and returns a copy of the new value.
    InPlace(fn(&mut Value, Position) -> Result<Value, RuntimeError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenKind {
    // Sentinels
    Error,
    Eof,

    // Literal classes
    Real,
    Int,
    Hex,
    Oct,
    Date,
    Time,
    Keyword,
    Symbol,

    // Structure
    LeftParen,
    RightParen,
    LeftCurly,
    RightCurly,
    At,
    Colon,
    Comma,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    OrOr,
    Or,
    AndAnd,
    And,
    PlusPlus,
    MinusMinus,
    Bang,
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Assignment
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
}

/// Static description of a token kind.
#[derive(Debug, Clone)]
pub struct KindInfo {
    pub kind: TokenKind,
    /// Printable name, also used when dumping syntax trees.
    pub name: &'static str,
    /// Exact source text for fixed tokens, `None` for literal classes and sentinels.
    pub lexeme: Option<&'static str>,
    /// Binding priority of binary operators, -1 for everything else.
    pub priority: i32,
    pub binary: Option<BinaryFn>,
    pub unary: Option<UnaryFn>,
    /// `=` and the compound assignment operators.
    pub assigns: bool,
    /// Longer tokens whose text starts with this token's text.
    pub follow: Vec<TokenKind>,
}

fn plain(kind: TokenKind, name: &'static str) -> KindInfo {
    KindInfo {
        kind,
        name,
        lexeme: None,
        priority: -1,
        binary: None,
        unary: None,
        assigns: false,
        follow: vec![],
    }
}

fn punct(kind: TokenKind, lexeme: &'static str) -> KindInfo {
    KindInfo {
        lexeme: Some(lexeme),
        ..plain(kind, lexeme)
    }
}

fn binary(kind: TokenKind, lexeme: &'static str, priority: i32, f: BinaryFn) -> KindInfo {
    binary_named(kind, lexeme, lexeme, priority, f)
}

/// Binary operator whose printable name differs from its source text (`ge` for `>=`).
fn binary_named(
    kind: TokenKind,
    name: &'static str,
    lexeme: &'static str,
    priority: i32,
    f: BinaryFn,
) -> KindInfo {
    KindInfo {
        name,
        priority,
        binary: Some(f),
        ..punct(kind, lexeme)
    }
}

fn unary(kind: TokenKind, lexeme: &'static str, f: UnaryFn) -> KindInfo {
    KindInfo {
        unary: Some(f),
        ..punct(kind, lexeme)
    }
}

fn binary_unary(
    kind: TokenKind,
    lexeme: &'static str,
    priority: i32,
    f: BinaryFn,
    u: UnaryFn,
) -> KindInfo {
    KindInfo {
        unary: Some(u),
        ..binary(kind, lexeme, priority, f)
    }
}

/// Assignment operator; compound forms reuse the base operator's function.
fn assign(kind: TokenKind, lexeme: &'static str, base: Option<BinaryFn>) -> KindInfo {
    KindInfo {
        binary: base,
        assigns: true,
        ..punct(kind, lexeme)
    }
}

const OR_PRIORITY: i32 = 1;
const AND_PRIORITY: i32 = 2;
const BIT_OR_PRIORITY: i32 = 3;
const BIT_AND_PRIORITY: i32 = 4;
const COMPARE_PRIORITY: i32 = 5;
const ADD_PRIORITY: i32 = 6;
const MUL_PRIORITY: i32 = 7;
const POW_PRIORITY: i32 = 8;

/// Every token kind the language knows about.
pub fn descriptors() -> Vec<KindInfo> {
    use TokenKind::*;

    vec![
        plain(Error, "an error"),
        plain(Eof, "end of file"),
        plain(Real, "a real number"),
        plain(Int, "an integer number"),
        plain(Hex, "a hexadecimal number"),
        plain(Oct, "an octal number"),
        plain(Date, "a date constant"),
        plain(Time, "a time constant"),
        plain(Keyword, "a keyword"),
        plain(Symbol, "any symbol"),
        assign(Equal, "=", None),
        assign(PlusEqual, "+=", Some(ops::add)),
        assign(MinusEqual, "-=", Some(ops::sub)),
        assign(StarEqual, "*=", Some(ops::mul)),
        assign(SlashEqual, "/=", Some(ops::div)),
        assign(PercentEqual, "%=", Some(ops::modulo)),
        punct(LeftParen, "("),
        punct(RightParen, ")"),
        punct(LeftCurly, "{"),
        punct(RightCurly, "}"),
        punct(At, "@"),
        punct(Colon, ":"),
        punct(Comma, ","),
        punct(Semicolon, ";"),
        binary(Plus, "+", ADD_PRIORITY, ops::add),
        binary_unary(
            Minus,
            "-",
            ADD_PRIORITY,
            ops::sub,
            UnaryFn::Pure(ops::negate),
        ),
        binary(Star, "*", MUL_PRIORITY, ops::mul),
        binary(Slash, "/", MUL_PRIORITY, ops::div),
        binary(Percent, "%", MUL_PRIORITY, ops::modulo),
        binary(StarStar, "**", POW_PRIORITY, ops::pow),
        binary(OrOr, "||", OR_PRIORITY, ops::logical_or),
        binary(Or, "|", BIT_OR_PRIORITY, ops::bit_or),
        binary(AndAnd, "&&", AND_PRIORITY, ops::logical_and),
        binary(And, "&", BIT_AND_PRIORITY, ops::bit_and),
        unary(PlusPlus, "++", UnaryFn::InPlace(ops::increment)),
        unary(MinusMinus, "--", UnaryFn::InPlace(ops::decrement)),
        unary(Bang, "!", UnaryFn::Pure(ops::not)),
        binary(EqualEqual, "==", COMPARE_PRIORITY, ops::eq),
        binary(BangEqual, "!=", COMPARE_PRIORITY, ops::ne),
        binary_named(Greater, "gt", ">", COMPARE_PRIORITY, ops::gt),
        binary_named(GreaterEqual, "ge", ">=", COMPARE_PRIORITY, ops::ge),
        binary_named(Less, "lt", "<", COMPARE_PRIORITY, ops::lt),
        binary_named(LessEqual, "le", "<=", COMPARE_PRIORITY, ops::le),
    ]
}

/// Immutable registry of token kinds.
#[derive(Debug)]
pub struct TokenTable {
    infos: HashMap<TokenKind, KindInfo>,
    lexemes: HashMap<&'static str, TokenKind>,
}

impl TokenTable {
    /// Registers all `descriptors` then computes every follow set in one closure pass.
    pub fn new(descriptors: Vec<KindInfo>) -> TokenTable {
        let mut infos: HashMap<TokenKind, KindInfo> =
            descriptors.into_iter().map(|d| (d.kind, d)).collect();

        let lexemes: HashMap<&'static str, TokenKind> = infos
            .values()
            .filter_map(|info| info.lexeme.map(|l| (l, info.kind)))
            .collect();

        for info in infos.values_mut() {
            let Some(short) = info.lexeme else {
                continue;
            };
            let mut follow: Vec<TokenKind> = lexemes
                .iter()
                .filter(|(long, _)| long.len() > short.len() && long.starts_with(short))
                .map(|(_, kind)| *kind)
                .collect();
            follow.sort();
            info.follow = follow;
        }

        TokenTable { infos, lexemes }
    }

    pub fn info(&self, kind: TokenKind) -> Option<&KindInfo> {
        self.infos.get(&kind)
    }

    /// Finds the fixed token spelled exactly `text`.
    pub fn by_lexeme(&self, text: &str) -> Option<TokenKind> {
        self.lexemes.get(text).copied()
    }
}

static TABLE: LazyLock<TokenTable> = LazyLock::new(|| TokenTable::new(descriptors()));

/// The process-wide token table.
pub fn table() -> &'static TokenTable {
    &TABLE
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        table().info(self).map_or("?", |i| i.name)
    }

    pub fn lexeme(self) -> Option<&'static str> {
        table().info(self).and_then(|i| i.lexeme)
    }

    pub fn priority(self) -> i32 {
        table().info(self).map_or(-1, |i| i.priority)
    }

    pub fn binary(self) -> Option<BinaryFn> {
        table().info(self).and_then(|i| i.binary)
    }

    pub fn unary(self) -> Option<UnaryFn> {
        table().info(self).and_then(|i| i.unary)
    }

    pub fn assigns(self) -> bool {
        table().info(self).is_some_and(|i| i.assigns)
    }

    pub fn follow(self) -> &'static [TokenKind] {
        match table().info(self) {
            Some(info) => &info.follow,
            None => &[],
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme().unwrap_or_else(|| self.name()))
    }
}

pub const KEYWORDS: [&str; 6] = ["if", "else", "while", "for", "func", "exit"];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// "Words" produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: Position) -> Token {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of file"),
            _ => write!(f, "{}", self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_registered() {
        use TokenKind::*;
        for kind in [
            Error, Eof, Real, Int, Hex, Oct, Date, Time, Keyword, Symbol, LeftParen, RightParen,
            LeftCurly, RightCurly, At, Colon, Comma, Semicolon, Plus, Minus, Star, Slash,
            Percent, StarStar, OrOr, Or, AndAnd, And, PlusPlus, MinusMinus, Bang, EqualEqual,
            BangEqual, Greater, GreaterEqual, Less, LessEqual, Equal, PlusEqual, MinusEqual,
            StarEqual, SlashEqual, PercentEqual,
        ] {
            assert!(table().info(kind).is_some(), "{:?} missing", kind);
        }
    }

    #[test]
    fn follow_sets_cover_longer_operators() {
        assert_eq!(
            TokenKind::Star.follow(),
            &[TokenKind::StarStar, TokenKind::StarEqual]
        );
        assert_eq!(
            TokenKind::Minus.follow(),
            &[TokenKind::MinusMinus, TokenKind::MinusEqual]
        );
        assert_eq!(TokenKind::Equal.follow(), &[TokenKind::EqualEqual]);
        assert_eq!(TokenKind::Bang.follow(), &[TokenKind::BangEqual]);
        assert!(TokenKind::LeftParen.follow().is_empty());
        assert!(TokenKind::StarStar.follow().is_empty());
    }

    #[test]
    fn follow_sets_do_not_depend_on_declaration_order() {
        let mut reversed = descriptors();
        reversed.reverse();
        let table = TokenTable::new(reversed);
        let follow = &table.info(TokenKind::Slash).map(|i| i.follow.clone());
        assert_eq!(follow, &Some(vec![TokenKind::SlashEqual]));
    }

    #[test]
    fn literal_classes_have_no_lexeme() {
        assert_eq!(table().by_lexeme("an integer number"), None);
        assert_eq!(TokenKind::Int.lexeme(), None);
        assert_eq!(table().by_lexeme(">="), Some(TokenKind::GreaterEqual));
    }

    #[test]
    fn operator_metadata() {
        assert_eq!(TokenKind::GreaterEqual.name(), "ge");
        assert_eq!(TokenKind::GreaterEqual.to_string(), ">=");
        assert!(TokenKind::Star.priority() > TokenKind::Plus.priority());
        assert!(TokenKind::StarStar.priority() > TokenKind::Star.priority());
        assert_eq!(TokenKind::PlusEqual.priority(), -1);
        assert!(TokenKind::PlusEqual.assigns());
        assert!(TokenKind::PlusEqual.binary().is_some());
        assert!(TokenKind::Equal.binary().is_none());
        assert!(TokenKind::Minus.unary().is_some());
        assert!(TokenKind::Minus.binary().is_some());
        assert!(TokenKind::Bang.binary().is_none());
    }

    #[test]
    fn keywords() {
        assert!(is_keyword("func"));
        assert!(!is_keyword("fun"));
    }
}
