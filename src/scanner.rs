//! Lexical analyzer
//!
//! The scanner is a state machine pulled one token at a time. [`lex`] runs it on a producer
//! thread and hands tokens to the parser through a bounded channel wrapped in a [`TokenStream`].

use std::io::prelude::*;
use std::io::Cursor;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use crate::char_reader::{CharReader, CharReaderError};
use crate::diag::Position;
use crate::token::{is_keyword, table, Token, TokenKind};

/// Number of tokens the producer may run ahead of the parser.
const TOKEN_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Read a character and dispatch on it.
    Base,
    /// Dispatch on a character that has already been read.  `separated` is false right after
    /// a number or symbol, where another number or symbol can not start.
    Dispatch { ch: Option<char>, separated: bool },
    /// One operator character read, looking for a longer operator.
    Follow,
    Comment,
    Symbol,
    Integer,
    Fraction,
    Exponent,
    /// Just read a leading `0`.
    Number,
    Hex,
    Octal,
    Date,
    Time,
    /// An error token was produced, end of stream comes next.
    Finish,
    Done,
}

enum Step {
    Next(State),
    Emit(Token, State),
}

/// Turn sequence of bytes into sequence of tokens.
#[derive(Debug)]
pub struct Scanner<R: BufRead> {
    input: CharReader<R>,
    state: State,
    line: Position,
    start_line: Position,

    // Text of the token being scanned.  Allocated here to reuse memory.
    acc: String,
}

impl<R: BufRead> Scanner<R> {
    pub fn new(input: R) -> Scanner<R> {
        Scanner {
            input: CharReader::new(input),
            state: State::Base,
            line: 1,
            start_line: 1,
            acc: String::new(),
        }
    }

    /// Scan next token and return it.
    ///
    /// Malformed input and read failures produce a [`TokenKind::Error`] token whose text is the
    /// diagnostic, followed by [`TokenKind::Eof`].  Once the end is reached, every further call
    /// returns [`TokenKind::Eof`] again.
    pub fn get_token(&mut self) -> Token {
        loop {
            let step = self.step().unwrap_or_else(|e| {
                Step::Emit(Token::new(TokenKind::Error, e.to_string(), self.line), State::Finish)
            });
            match step {
                Step::Next(state) => self.state = state,
                Step::Emit(token, state) => {
                    self.state = state;
                    return token;
                }
            }
        }
    }

    fn step(&mut self) -> Result<Step, CharReaderError> {
        match self.state {
            State::Base => {
                let ch = self.input.read()?;
                Ok(Step::Next(State::Dispatch {
                    ch,
                    separated: true,
                }))
            }
            State::Dispatch { ch, separated } => Ok(self.dispatch(ch, separated)),
            State::Follow => self.follow(),
            State::Comment => self.comment(),
            State::Symbol => self.symbol(),
            State::Integer => self.integer(),
            State::Fraction => self.fraction(),
            State::Exponent => self.exponent(),
            State::Number => self.number(),
            State::Hex => self.run(|c| c.is_ascii_hexdigit(), TokenKind::Hex),
            State::Octal => self.run(|c| ('0'..='7').contains(&c), TokenKind::Oct),
            State::Date => self.run(|c| c.is_ascii_digit(), TokenKind::Date),
            State::Time => self.run(|c| c.is_ascii_digit() || c == ':', TokenKind::Time),
            State::Finish | State::Done => {
                Ok(Step::Emit(Token::new(TokenKind::Eof, "", self.line), State::Done))
            }
        }
    }

    fn dispatch(&mut self, ch: Option<char>, separated: bool) -> Step {
        let Some(ch) = ch else {
            return Step::Emit(Token::new(TokenKind::Eof, "", self.line), State::Done);
        };
        match ch {
            ' ' | '\t' | '\r' => Step::Next(State::Base),
            '\n' => {
                self.line += 1;
                Step::Next(State::Base)
            }
            '#' => Step::Next(State::Comment),
            '0' if separated => self.start(ch, State::Number),
            '1'..='9' if separated => self.start(ch, State::Integer),
            '.' if separated => self.start(ch, State::Fraction),
            '$' if separated => {
                self.acc.clear();
                self.start_line = self.line;
                Step::Next(State::Date)
            }
            '0'..='9' | '.' | '$' => self.unexpected(ch),
            c if c == '_' || c.is_alphabetic() => {
                if separated {
                    self.start(ch, State::Symbol)
                } else {
                    self.unexpected(ch)
                }
            }
            _ => {
                let mut text = [0u8; 4];
                match table().by_lexeme(ch.encode_utf8(&mut text)) {
                    Some(kind) if kind.follow().is_empty() => {
                        Step::Emit(Token::new(kind, ch, self.line), State::Base)
                    }
                    Some(_) => self.start(ch, State::Follow),
                    None => self.unexpected(ch),
                }
            }
        }
    }

    fn start(&mut self, ch: char, state: State) -> Step {
        self.acc.clear();
        self.acc.push(ch);
        self.start_line = self.line;
        Step::Next(state)
    }

    fn unexpected(&self, ch: char) -> Step {
        Step::Emit(
            Token::new(
                TokenKind::Error,
                format!("unexpected character '{}'", ch.escape_default()),
                self.line,
            ),
            State::Finish,
        )
    }

    /// Emits the accumulated text as `kind` and dispatches `next` without a separator.
    fn emit(&mut self, kind: TokenKind, next: Option<char>) -> Step {
        Step::Emit(
            Token::new(kind, self.acc.as_str(), self.start_line),
            State::Dispatch {
                ch: next,
                separated: false,
            },
        )
    }

    fn follow(&mut self) -> Result<Step, CharReaderError> {
        let ch = self.input.read()?;
        let Some(short) = table().by_lexeme(&self.acc) else {
            return Ok(self.emit(TokenKind::Error, ch));
        };
        if let Some(c) = ch {
            let mut candidate = self.acc.clone();
            candidate.push(c);
            if let Some(long) = short
                .follow()
                .iter()
                .find(|k| k.lexeme() == Some(candidate.as_str()))
            {
                return Ok(Step::Emit(
                    Token::new(*long, candidate, self.start_line),
                    State::Base,
                ));
            }
        }
        Ok(Step::Emit(
            Token::new(short, self.acc.as_str(), self.start_line),
            State::Dispatch {
                ch,
                separated: true,
            },
        ))
    }

    fn comment(&mut self) -> Result<Step, CharReaderError> {
        loop {
            match self.input.read()? {
                None => {
                    return Ok(Step::Next(State::Dispatch {
                        ch: None,
                        separated: true,
                    }))
                }
                Some('\n') => {
                    self.line += 1;
                    return Ok(Step::Next(State::Base));
                }
                Some(_) => (),
            }
        }
    }

    fn symbol(&mut self) -> Result<Step, CharReaderError> {
        loop {
            match self.input.read()? {
                Some(c) if c == '_' || c.is_alphanumeric() => self.acc.push(c),
                ch => {
                    let kind = if is_keyword(&self.acc) {
                        TokenKind::Keyword
                    } else {
                        TokenKind::Symbol
                    };
                    return Ok(self.emit(kind, ch));
                }
            }
        }
    }

    fn integer(&mut self) -> Result<Step, CharReaderError> {
        loop {
            match self.input.read()? {
                Some(c) if c.is_ascii_digit() => self.acc.push(c),
                Some('\'') => (),
                Some(c @ '.') => return Ok(self.advance(c, State::Fraction)),
                Some(c @ ('e' | 'E')) => return Ok(self.advance(c, State::Exponent)),
                Some(c @ ':') => return Ok(self.advance(c, State::Time)),
                ch => return Ok(self.emit(TokenKind::Int, ch)),
            }
        }
    }

    fn fraction(&mut self) -> Result<Step, CharReaderError> {
        loop {
            match self.input.read()? {
                Some(c) if c.is_ascii_digit() => self.acc.push(c),
                Some('\'') => (),
                Some(c @ ('e' | 'E')) => return Ok(self.advance(c, State::Exponent)),
                ch => return Ok(self.emit(TokenKind::Real, ch)),
            }
        }
    }

    fn exponent(&mut self) -> Result<Step, CharReaderError> {
        let mut first = true;
        loop {
            match self.input.read()? {
                Some(c) if c.is_ascii_digit() => self.acc.push(c),
                Some(c @ ('+' | '-')) if first => self.acc.push(c),
                ch => return Ok(self.emit(TokenKind::Real, ch)),
            }
            first = false;
        }
    }

    fn number(&mut self) -> Result<Step, CharReaderError> {
        match self.input.read()? {
            Some(c @ ('x' | 'X')) => Ok(self.advance(c, State::Hex)),
            Some(c @ '0'..='7') => Ok(self.advance(c, State::Octal)),
            Some(c @ '.') => Ok(self.advance(c, State::Fraction)),
            Some(c @ ':') => Ok(self.advance(c, State::Time)),
            ch => Ok(self.emit(TokenKind::Int, ch)),
        }
    }

    fn advance(&mut self, ch: char, state: State) -> Step {
        self.acc.push(ch);
        Step::Next(state)
    }

    /// Accumulates characters matching `accept` into a token of `kind`.
    fn run(&mut self, accept: fn(char) -> bool, kind: TokenKind) -> Result<Step, CharReaderError> {
        loop {
            match self.input.read()? {
                Some(c) if accept(c) => self.acc.push(c),
                ch => return Ok(self.emit(kind, ch)),
            }
        }
    }
}

impl<R: BufRead> Iterator for Scanner<R> {
    type Item = Token;

    /// Yields every token up to and including the first end of file.
    fn next(&mut self) -> Option<Token> {
        if self.state == State::Done {
            return None;
        }
        Some(self.get_token())
    }
}

/// Tokens consumed by the parser, with pushback.
#[derive(Debug)]
pub struct TokenStream {
    receiver: Option<Receiver<Token>>,
    rewound: Vec<Token>,
    last_line: Position,
}

impl TokenStream {
    pub fn new(receiver: Receiver<Token>) -> TokenStream {
        TokenStream {
            receiver: Some(receiver),
            rewound: vec![],
            last_line: 1,
        }
    }

    /// Stream over tokens that were already scanned.
    pub fn from_tokens(mut tokens: Vec<Token>) -> TokenStream {
        tokens.reverse();
        TokenStream {
            receiver: None,
            rewound: tokens,
            last_line: 1,
        }
    }

    /// Next token.  Past the end of the stream this keeps returning end of file.
    pub fn get(&mut self) -> Token {
        match self.next() {
            Some(token) => token,
            None => Token::new(TokenKind::Eof, "", self.last_line),
        }
    }

    /// Pushes `token` back so that the next [`TokenStream::get`] returns it.
    pub fn rewind(&mut self, token: Token) {
        self.rewound.push(token);
    }
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = match self.rewound.pop() {
            Some(token) => Some(token),
            None => self.receiver.as_ref().and_then(|r| r.recv().ok()),
        };
        if let Some(token) = &token {
            self.last_line = token.line;
        }
        token
    }
}

/// Scans `input` on a separate thread.
///
/// The producer blocks when the parser falls behind and stops as soon as the returned stream
/// is dropped.
pub fn lex<R: BufRead + Send + 'static>(input: R) -> TokenStream {
    let (sender, receiver) = mpsc::sync_channel(TOKEN_QUEUE_DEPTH);
    let spawned = thread::Builder::new()
        .name("lexer".into())
        .spawn(move || {
            for token in Scanner::new(input) {
                if sender.send(token).is_err() {
                    break;
                }
            }
        });
    match spawned {
        Ok(_) => TokenStream::new(receiver),
        Err(e) => TokenStream::from_tokens(vec![
            Token::new(TokenKind::Error, format!("could not start the lexer: {}", e), 1),
            Token::new(TokenKind::Eof, "", 1),
        ]),
    }
}

/// Scans all of `source`, including the final end of file token.
pub fn lex_all(source: &str) -> Vec<Token> {
    lex(Cursor::new(source.to_owned())).collect()
}
