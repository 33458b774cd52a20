//! Decode a buffered byte reader into UTF-8 characters, one at a time.

use std::io::{self, BufRead};
use std::str::{self, Utf8Error};

use thiserror::Error;

/// Reads characters straight out of the reader's buffer.
///
/// A continuation byte that turns out to start the next character is kept aside and
/// returned by the following read, so malformed input never swallows valid text.
#[derive(Debug)]
pub struct CharReader<R: BufRead> {
    input: R,
    pending: Option<u8>,

    // Conversion buffer stored here to avoid reallocation.
    buf: Vec<u8>,
}

impl<R: BufRead> CharReader<R> {
    pub fn new(input: R) -> CharReader<R> {
        CharReader {
            input,
            pending: None,
            buf: Vec::with_capacity(4),
        }
    }

    /// Next character, or `None` at end of input.
    pub fn read(&mut self) -> Result<Option<char>, CharReaderError> {
        let Some(first) = self.next_byte()? else {
            return Ok(None);
        };
        if first.is_ascii() {
            return Ok(Some(first as char));
        }
        let width = encoded_width(first).ok_or(CharReaderError::BadStartByte(first))?;

        self.buf.clear();
        self.buf.push(first);
        while self.buf.len() < width {
            match self.next_byte()? {
                Some(b) if is_continuation(b) => self.buf.push(b),
                Some(b) => {
                    self.pending = Some(b);
                    break;
                }
                None => break,
            }
        }

        let s = str::from_utf8(&self.buf)?;
        Ok(s.chars().next())
    }

    fn next_byte(&mut self) -> Result<Option<u8>, CharReaderError> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        let byte = loop {
            match self.input.fill_buf() {
                Ok(buf) => break buf.first().copied(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if byte.is_some() {
            self.input.consume(1);
        }
        Ok(byte)
    }
}

fn is_continuation(b: u8) -> bool {
    (b & 0b1100_0000) == 0b1000_0000
}

fn encoded_width(first: u8) -> Option<usize> {
    match first {
        b if (b & 0b1110_0000) == 0b1100_0000 => Some(2),
        b if (b & 0b1111_0000) == 0b1110_0000 => Some(3),
        b if (b & 0b1111_1000) == 0b1111_0000 => Some(4),
        _ => None,
    }
}

impl<R: BufRead> Iterator for CharReader<R> {
    type Item = Result<char, CharReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

/// Errors raised when reading and converting to UTF-8.
#[derive(Debug, Error)]
pub enum CharReaderError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected UTF-8 start byte: {0:#010b}")]
    BadStartByte(u8),
    #[error("invalid UTF-8 sequence: {0}")]
    Utf8(#[from] Utf8Error),
}
