//! Calculator command-line.
//!
//! Files given as arguments run in a single interpreter session (so functions and variables
//! defined by a file are visible to the next ones) and the value of each file is printed.
//!
//! When called without files, or with `-i`, it drops into an interactive read-evaluate-print
//! loop.

use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{self, Context as _};
use clap::{Parser, ValueEnum};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use rcalc::ctx::{Context, NumericMode};
use rcalc::interpreter::{CalcError, Interpreter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Decimal literals and divisions are errors.
    Undefined,
    Float,
    Rational,
}

impl From<Mode> for NumericMode {
    fn from(mode: Mode) -> NumericMode {
        match mode {
            Mode::Undefined => NumericMode::Undefined,
            Mode::Float => NumericMode::Float,
            Mode::Rational => NumericMode::Rational,
        }
    }
}

/// Calculator with arbitrary precision integers, exact rationals, floats and dates.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Read commands from the terminal once the files have run.
    #[arg(short, long)]
    interactive: bool,

    /// Initial numeric mode, `@:f` and `@:r` switch it later.
    #[arg(long, value_enum, default_value_t = Mode::Rational)]
    mode: Mode,

    /// Show decimal integers with their hexadecimal value too.
    #[arg(short, long)]
    programmer: bool,

    /// Scripts to run in order.
    files: Vec<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let ctx = Context::with_mode(args.mode.into());
    ctx.set_programmer_mode(args.programmer);

    let mut interp_stdout = io::stdout();
    let mut interp = Interpreter::with_context(&mut interp_stdout, ctx);

    for path in &args.files {
        if let Err(e) = run_file(&mut interp, path) {
            eprintln!("{:#}", e);
        }
        if interp.exit_requested() {
            return Ok(());
        }
    }

    if args.files.is_empty() || args.interactive {
        run_prompt(&mut interp)?;
    }

    Ok(())
}

fn run_file<W: Write>(interp: &mut Interpreter<'_, W>, path: &Path) -> Result<(), anyhow::Error> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
    );
    match interp.eval(reader) {
        Ok(v) => println!("= {}", interp.render(&v)),
        Err(e) => {
            eprint!("{}: ", path.display());
            report(&e);
        }
    }
    Ok(())
}

fn run_prompt<W: Write>(interp: &mut Interpreter<'_, W>) -> Result<(), ReadlineError> {
    let mut rl = DefaultEditor::new()?;

    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        };
        if line.trim().is_empty() {
            continue;
        }
        rl.add_history_entry(line.as_str())?;

        match interp.eval_str(&line) {
            Ok(v) => println!("= {}", interp.render(&v)),
            Err(e) => report(&e),
        }

        if interp.exit_requested() {
            break;
        }
    }

    Ok(())
}

/// Prints `e` and the calls it unwound on stderr.
fn report(e: &CalcError) {
    eprintln!("{}", e);
    if let CalcError::Exec(e) = e {
        for entry in &e.trace {
            eprintln!("    {}", entry);
        }
    }
}
