//! Statement parser and operator-precedence expression parser.
//!
//! Statements are parsed by recursive descent.  Infix expressions are parsed with an operand
//! stack and an operator stack: an operator reduces the stack while its priority is not greater
//! than the priority of the operator on top, which makes every operator left associative.

use std::io::prelude::*;
use std::io::Cursor;
use std::rc::Rc;

use chrono::NaiveDate;
use num_bigint::BigInt;
use num_rational::BigRational;

use crate::ast::{DisplayAction, FunctionDef, Node, NodeKind};
use crate::ctx::{Context, NumericMode};
use crate::diag::{FullParseError, ParseError, Position};
use crate::eval::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::ops::MAX_PRECISION;
use crate::scanner::{lex, TokenStream};
use crate::token::{Token, TokenKind};
use crate::value::{Flavor, Value};

type ParseResult<T> = Result<T, FullParseError>;

/// Largest power of ten accepted in a rational literal.
const MAX_LITERAL_SCALE: u64 = 100_000;

#[derive(Debug)]
pub struct Parser {
    tokens: TokenStream,
    // Mode for classifying real literals.  Follows `@:f`/`@:r` as they are parsed; the session
    // context itself only changes when those statements run.
    mode: NumericMode,
}

fn unexpected(tok: &Token, context: &'static str) -> FullParseError {
    let error = match tok.kind {
        TokenKind::Eof => ParseError::UnexpectedEof { context },
        _ => ParseError::UnexpectedToken {
            found: tok.text.clone(),
            context,
        },
    };
    FullParseError {
        pos: tok.line,
        error,
    }
}

impl Parser {
    pub fn new(tokens: TokenStream, ctx: &Context) -> Parser {
        Parser {
            tokens,
            mode: ctx.mode(),
        }
    }

    /// Parses the whole stream.  At top level semicolons are optional and functions may be
    /// defined.
    pub fn parse_program(&mut self) -> ParseResult<Node> {
        self.statements(true)
    }

    /// Next token, with lexer diagnostics turned into errors.
    fn next(&mut self) -> ParseResult<Token> {
        let tok = self.tokens.get();
        if tok.kind == TokenKind::Error {
            return Err(FullParseError {
                pos: tok.line,
                error: ParseError::Lexical(tok.text),
            });
        }
        Ok(tok)
    }

    fn peek(&mut self) -> ParseResult<Token> {
        let tok = self.next()?;
        self.tokens.rewind(tok.clone());
        Ok(tok)
    }

    fn expect(&mut self, kind: TokenKind, context: &'static str) -> ParseResult<Token> {
        let tok = self.next()?;
        if tok.kind == kind {
            return Ok(tok);
        }
        let error = match tok.kind {
            TokenKind::Eof => ParseError::UnexpectedEof { context },
            _ => ParseError::Expected {
                found: tok.text,
                expected: kind.lexeme().unwrap_or_else(|| kind.name()),
                context,
            },
        };
        Err(FullParseError {
            pos: tok.line,
            error,
        })
    }

    /// statement-list ::= <statement> ; <statement-list>
    ///
    /// A nested list stops before the closing brace.
    fn statements(&mut self, toplevel: bool) -> ParseResult<Node> {
        let line = self.peek()?.line;
        let mut stmts = vec![];
        loop {
            let tok = self.peek()?;
            match tok.kind {
                TokenKind::Eof if toplevel => break,
                TokenKind::RightCurly if !toplevel => break,
                TokenKind::Eof => return Err(unexpected(&tok, "expecting '}'")),
                _ => stmts.push(self.statement(toplevel)?),
            }
        }
        Ok(Node::new(NodeKind::Body(stmts), line))
    }

    fn statement(&mut self, toplevel: bool) -> ParseResult<Node> {
        let tok = self.next()?;

        if tok.kind == TokenKind::At {
            let node = self.display(tok.line)?;
            self.semicolon(toplevel)?;
            return Ok(node);
        }

        if tok.kind != TokenKind::Keyword {
            self.tokens.rewind(tok);
            let node = self.expression()?;
            self.semicolon(toplevel)?;
            return Ok(node);
        }

        match tok.text.as_str() {
            "func" if toplevel => self.function_def(tok.line),
            "func" => Err(unexpected(&tok, "can not define nested functions")),
            "if" => self.if_stmt(tok.line),
            "while" => self.while_stmt(tok.line),
            "for" => self.for_stmt(tok.line),
            "exit" => {
                let node = self.exit(tok.line)?;
                self.semicolon(toplevel)?;
                Ok(node)
            }
            _ => Err(unexpected(&tok, "while parsing a statement")),
        }
    }

    fn semicolon(&mut self, toplevel: bool) -> ParseResult<()> {
        let tok = self.next()?;
        if tok.kind == TokenKind::Semicolon {
            return Ok(());
        }
        self.tokens.rewind(tok);
        if toplevel {
            return Ok(());
        }
        self.expect(TokenKind::Semicolon, "while reading statement")
            .map(|_| ())
    }

    fn block(&mut self, context: &'static str) -> ParseResult<Node> {
        self.expect(TokenKind::LeftCurly, context)?;
        let body = self.statements(false)?;
        self.expect(TokenKind::RightCurly, context)?;
        Ok(body)
    }

    /// func-def ::= func <symbol> ( <symbol>, ... ) { <statement-list> }
    fn function_def(&mut self, line: Position) -> ParseResult<Node> {
        const CONTEXT: &str = "while parsing function definition";
        let name = self.next()?;
        if name.kind != TokenKind::Symbol {
            return Err(unexpected(&name, CONTEXT));
        }

        self.expect(TokenKind::LeftParen, CONTEXT)?;
        let mut params = vec![];
        loop {
            let mut tok = self.next()?;
            if tok.kind == TokenKind::RightParen {
                break;
            }
            if !params.is_empty() {
                if tok.kind != TokenKind::Comma {
                    return Err(unexpected(
                        &tok,
                        "expected ',' while parsing function definition",
                    ));
                }
                tok = self.next()?;
            }
            if tok.kind != TokenKind::Symbol {
                return Err(unexpected(
                    &tok,
                    "expected symbol while parsing function definition",
                ));
            }
            params.push(tok.text);
        }

        let body = self.block(CONTEXT)?;
        let def = FunctionDef {
            name: name.text,
            params,
            body,
        };
        Ok(Node::new(NodeKind::FunctionDef(Rc::new(def)), line))
    }

    /// if ::= if ( <expression> ) { <statement-list> } [ else { <statement-list> } | else <if> ]
    fn if_stmt(&mut self, line: Position) -> ParseResult<Node> {
        const CONTEXT: &str = "while parsing 'if' statement";
        self.expect(TokenKind::LeftParen, CONTEXT)?;
        let guard = self.expression()?;
        self.expect(TokenKind::RightParen, CONTEXT)?;
        let then = self.block(CONTEXT)?;

        let tok = self.next()?;
        let otherwise = if tok.is_keyword("else") {
            let tok = self.next()?;
            if tok.kind == TokenKind::LeftCurly {
                self.tokens.rewind(tok);
                Some(self.block("while parsing 'else' branch")?)
            } else if tok.is_keyword("if") {
                Some(self.if_stmt(tok.line)?)
            } else {
                return Err(unexpected(
                    &tok,
                    "expected '{' or 'if' while parsing 'else' branch",
                ));
            }
        } else {
            self.tokens.rewind(tok);
            None
        };

        Ok(Node::new(
            NodeKind::If {
                guard: Box::new(guard),
                then: Box::new(then),
                otherwise: otherwise.map(Box::new),
            },
            line,
        ))
    }

    /// while ::= while ( <expression> ) { <statement-list> }
    fn while_stmt(&mut self, line: Position) -> ParseResult<Node> {
        const CONTEXT: &str = "while parsing 'while' statement";
        self.expect(TokenKind::LeftParen, CONTEXT)?;
        let guard = self.expression()?;
        self.expect(TokenKind::RightParen, CONTEXT)?;
        let body = self.block(CONTEXT)?;
        Ok(Node::new(
            NodeKind::While {
                guard: Box::new(guard),
                body: Box::new(body),
            },
            line,
        ))
    }

    /// for ::= for ( <expression> ; <expression> ; <expression> ) { <statement-list> }
    fn for_stmt(&mut self, line: Position) -> ParseResult<Node> {
        const CONTEXT: &str = "while parsing 'for' statement";
        self.expect(TokenKind::LeftParen, CONTEXT)?;
        let init = self.expression()?;
        self.expect(TokenKind::Semicolon, CONTEXT)?;
        let guard = self.expression()?;
        self.expect(TokenKind::Semicolon, CONTEXT)?;
        let step = self.expression()?;
        self.expect(TokenKind::RightParen, CONTEXT)?;
        let body = self.block(CONTEXT)?;
        Ok(Node::new(
            NodeKind::For {
                init: Box::new(init),
                guard: Box::new(guard),
                step: Box::new(step),
                body: Box::new(body),
            },
            line,
        ))
    }

    /// `@` alone shows the last result, `@:p` toggles programmer mode, `@:f` and `@:r` select
    /// the numeric mode and `@ <expression>` shows a value.
    ///
    /// A mode switch also applies to decimal literals further down the same input.
    fn display(&mut self, line: Position) -> ParseResult<Node> {
        const CONTEXT: &str = "while parsing display statement";
        let tok = self.next()?;
        let action = match tok.kind {
            TokenKind::Semicolon | TokenKind::Eof => {
                self.tokens.rewind(tok);
                let last = Node::new(NodeKind::Variable("_".to_owned()), line);
                DisplayAction::Show(Box::new(last))
            }
            TokenKind::Colon => {
                let option = self.next()?;
                if option.kind != TokenKind::Symbol {
                    return Err(unexpected(&option, CONTEXT));
                }
                match option.text.as_str() {
                    "p" => DisplayAction::ToggleProgrammer,
                    "f" => self.switch_mode(NumericMode::Float),
                    "r" => self.switch_mode(NumericMode::Rational),
                    _ => return Err(unexpected(&option, CONTEXT)),
                }
            }
            _ => {
                self.tokens.rewind(tok);
                DisplayAction::Show(Box::new(self.expression()?))
            }
        };
        Ok(Node::new(NodeKind::Display(action), line))
    }

    fn switch_mode(&mut self, mode: NumericMode) -> DisplayAction {
        self.mode = mode;
        DisplayAction::SetMode(mode)
    }

    fn exit(&mut self, line: Position) -> ParseResult<Node> {
        let tok = self.peek()?;
        if !matches!(tok.kind, TokenKind::Semicolon | TokenKind::Eof) {
            return Err(unexpected(&tok, "while parsing exit statement"));
        }
        Ok(Node::new(NodeKind::Exit, line))
    }

    /// expression ::= <symbol> <assignment-operator> <infix> | <infix>
    fn expression(&mut self) -> ParseResult<Node> {
        let first = self.next()?;
        if first.kind != TokenKind::Symbol {
            self.tokens.rewind(first);
            return self.infix();
        }

        let second = self.next()?;
        if second.kind.assigns() {
            let value = self.infix()?;
            return Ok(Node::new(
                NodeKind::Assign {
                    op: second.kind,
                    target: first.text,
                    value: Box::new(value),
                },
                first.line,
            ));
        }

        self.tokens.rewind(second);
        self.tokens.rewind(first);
        self.infix()
    }

    fn infix(&mut self) -> ParseResult<Node> {
        let mut operands: Vec<Node> = vec![];
        let mut operators: Vec<Token> = vec![];

        loop {
            operands.push(self.operand()?);

            let op = self.next()?;
            if matches!(
                op.kind,
                TokenKind::Eof | TokenKind::RightParen | TokenKind::Semicolon | TokenKind::Comma
            ) {
                self.tokens.rewind(op);
                break;
            }
            if op.kind.priority() < 0 {
                return Err(unexpected(&op, "expecting operator"));
            }

            while let Some(top) = operators.last() {
                if op.kind.priority() > top.kind.priority() {
                    break;
                }
                reduce(&mut operands, &mut operators)?;
            }
            operators.push(op);
        }

        while !operators.is_empty() {
            reduce(&mut operands, &mut operators)?;
        }

        match (operands.pop(), operands.is_empty()) {
            (Some(node), true) => Ok(node),
            (node, _) => Err(FullParseError {
                pos: node.map_or(0, |n| n.line),
                error: ParseError::Malformed,
            }),
        }
    }

    fn operand(&mut self) -> ParseResult<Node> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.operand_inner())
    }

    /// operand ::= <literal> | <symbol>++ | <symbol>-- | <symbol>( <expression>, ... ) | <symbol>
    ///           | +<operand> | -<operand> | !<operand> | ( <expression> )
    fn operand_inner(&mut self) -> ParseResult<Node> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::Real
            | TokenKind::Int
            | TokenKind::Hex
            | TokenKind::Oct
            | TokenKind::Date
            | TokenKind::Time => self.literal(tok),

            TokenKind::Symbol => {
                let next = self.next()?;
                match next.kind {
                    TokenKind::PlusPlus | TokenKind::MinusMinus => {
                        let var = Node::new(NodeKind::Variable(tok.text), tok.line);
                        Ok(Node::new(
                            NodeKind::Unary {
                                op: next.kind,
                                operand: Box::new(var),
                            },
                            tok.line,
                        ))
                    }
                    TokenKind::LeftParen => self.call(tok),
                    _ => {
                        self.tokens.rewind(next);
                        Ok(Node::new(NodeKind::Variable(tok.text), tok.line))
                    }
                }
            }

            TokenKind::Plus => self.operand(),
            TokenKind::Minus | TokenKind::Bang => {
                let operand = self.operand()?;
                Ok(Node::new(
                    NodeKind::Unary {
                        op: tok.kind,
                        operand: Box::new(operand),
                    },
                    tok.line,
                ))
            }

            TokenKind::LeftParen => {
                let node = self.expression()?;
                self.expect(TokenKind::RightParen, "while parsing subexpression")?;
                Ok(node)
            }

            _ => Err(unexpected(&tok, "while parsing basic expression")),
        }
    }

    /// Arguments of a call whose name and opening parenthesis were already read.
    fn call(&mut self, name: Token) -> ParseResult<Node> {
        let mut args = vec![];
        loop {
            let tok = self.next()?;
            if tok.kind == TokenKind::RightParen {
                break;
            }
            if args.is_empty() {
                self.tokens.rewind(tok);
            } else if tok.kind != TokenKind::Comma {
                return Err(unexpected(&tok, "while parsing function call"));
            }
            args.push(self.expression()?);
        }
        Ok(Node::new(
            NodeKind::Call {
                name: name.text,
                args,
            },
            name.line,
        ))
    }

    fn literal(&self, tok: Token) -> ParseResult<Node> {
        let text = tok.text.as_str();
        let value = match tok.kind {
            TokenKind::Hex => parse_integer(text, text.get(2..).unwrap_or(""), 16, Flavor::Hex),
            TokenKind::Oct => parse_integer(text, text.get(1..).unwrap_or(""), 8, Flavor::Oct),
            TokenKind::Real => parse_real(text, self.mode),
            TokenKind::Date => parse_date(text),
            TokenKind::Time => parse_time(text),
            _ => parse_integer(text, text, 10, Flavor::Dec),
        }
        .map_err(|error| FullParseError {
            pos: tok.line,
            error,
        })?;
        Ok(Node::new(NodeKind::Constant(value), tok.line))
    }
}

fn reduce(operands: &mut Vec<Node>, operators: &mut Vec<Token>) -> ParseResult<()> {
    let (Some(op), Some(rhs), Some(lhs)) = (operators.pop(), operands.pop(), operands.pop())
    else {
        return Err(FullParseError {
            pos: 0,
            error: ParseError::Malformed,
        });
    };
    operands.push(Node::new(
        NodeKind::Binary {
            op: op.kind,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        op.line,
    ));
    Ok(())
}

fn parse_integer(
    text: &str,
    digits: &str,
    radix: u32,
    flavor: Flavor,
) -> Result<Value, ParseError> {
    BigInt::parse_bytes(digits.as_bytes(), radix)
        .map(|n| Value::int_with(n, flavor))
        .ok_or_else(|| ParseError::BadNumberLiteral(text.to_owned()))
}

fn parse_real(text: &str, mode: NumericMode) -> Result<Value, ParseError> {
    let bad = || ParseError::BadNumberLiteral(text.to_owned());
    match mode {
        NumericMode::Undefined => Err(ParseError::RealInUndefinedMode),
        NumericMode::Float => {
            let x: f64 = text.parse().map_err(|_| bad())?;
            let flavor = if text.contains(|c: char| c == 'e' || c == 'E') {
                Flavor::Exp
            } else {
                Flavor::Dec
            };
            Ok(Value::float_with(x, flavor))
        }
        NumericMode::Rational => {
            let (q, prec) = parse_decimal(text).ok_or_else(bad)?;
            Ok(Value::rational(q, prec))
        }
    }
}

/// Exact value of a decimal literal and its display precision: the number of fractional
/// digits, less the exponent, but at least one.
fn parse_decimal(text: &str) -> Option<(BigRational, usize)> {
    let (mantissa, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
        Some(i) => (&text[..i], text[i + 1..].parse::<i64>().ok()?),
        None => (text, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let digits = format!("{}{}", int_part, frac_part);
    let n = BigInt::parse_bytes(digits.as_bytes(), 10)?;
    let scale = i64::try_from(frac_part.len()).ok()?.checked_sub(exponent)?;
    if scale.unsigned_abs() > MAX_LITERAL_SCALE {
        return None;
    }
    let power = num_traits::pow(BigInt::from(10), usize::try_from(scale.unsigned_abs()).ok()?);
    let q = if scale >= 0 {
        BigRational::new(n, power)
    } else {
        BigRational::from_integer(n * power)
    };

    let prec = usize::try_from(scale.max(1)).ok()?.min(MAX_PRECISION);
    Some((q, prec))
}

/// `$yyyymmdd`, the text excludes the dollar sign.
fn parse_date(text: &str) -> Result<Value, ParseError> {
    let bad = || ParseError::BadDateLiteral(text.to_owned());
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let year: i32 = text[..4].parse().map_err(|_| bad())?;
    let month: u32 = text[4..6].parse().map_err(|_| bad())?;
    let day: u32 = text[6..].parse().map_err(|_| bad())?;
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Value::Date)
        .ok_or_else(bad)
}

/// `mm:ss` or `hh:mm:ss`, stored as a number of seconds.
fn parse_time(text: &str) -> Result<Value, ParseError> {
    let bad = || ParseError::BadTimeLiteral(text.to_owned());
    let parts: Vec<&str> = text.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(bad());
    }
    let mut seconds = BigInt::from(0);
    for part in parts {
        let n = BigInt::parse_bytes(part.as_bytes(), 10).ok_or_else(bad)?;
        seconds = seconds * 60 + n;
    }
    Ok(Value::int_with(seconds, Flavor::Time))
}

/// Parses a whole program read from `input`.
pub fn parse<R: BufRead + Send + 'static>(input: R, ctx: Rc<Context>) -> ParseResult<Node> {
    Parser::new(lex(input), &ctx).parse_program()
}

pub fn parse_str(source: &str, ctx: Rc<Context>) -> ParseResult<Node> {
    parse(Cursor::new(source.to_owned()), ctx)
}
