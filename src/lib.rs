//! A small calculator language with arbitrary precision integers, exact rationals, floats and
//! dates.
//!
//! Programs are statement lists with variables, functions, loops and conditionals.  Source text
//! goes through three composable stages: [`lex`] turns it into tokens, [`parse`] into a syntax
//! tree and [`execute`] evaluates the tree against a [`eval::CallStack`].
//!
//! # Examples
//!
//! See [`crate::interpreter::Interpreter`].
//!
//! # Limitations
//!
//! - The scanner and parser do not attempt any error recovery.  They bail out on the first
//! encountered error.
//! - Functions can only be defined at top level and do not capture anything: their body sees
//! its parameters and the globals.

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod ast;
pub mod ctx;
pub mod diag;
pub mod eval;
pub mod interpreter;
pub mod scanner;
pub mod token;
pub mod value;

mod builtins;
mod char_reader;
mod ops;
mod parser;

pub use eval::{execute, new_global_call_stack};
pub use parser::{parse, parse_str};
pub use scanner::lex;
