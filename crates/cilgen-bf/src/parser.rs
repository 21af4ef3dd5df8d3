//! The Brainfuck parser, written with `chumsky` combinators.
//!
//! The eight command characters are the only meaningful input: everything else is a
//! comment and is skipped. Consecutive `+`/`-` and `<`/`>` commands are folded into a
//! single command carrying their net effect, and the `[-]` idiom is recognized as a
//! cell clear, so that the lowering does not have to look for patterns itself.
use chumsky::prelude::*;
use span::{Span, Spanned};

/// The eight command characters.
const COMMANDS: &str = "+-<>[].,";

/// The errors produced by the parser.
pub type ParserError<'a> = extra::Err<Rich<'a, char, Span>>;

/// A Brainfuck command, after folding.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Add a (possibly negative) amount to the current cell, modulo 256.
    Add(i32),

    /// Move the data pointer by a (possibly negative) number of cells.
    Shift(i32),

    /// Write the current cell to the standard output, as a character.
    Output,

    /// Read a character from the standard input into the current cell.
    Input,

    /// Set the current cell to zero (`[-]`).
    Clear,

    /// Repeat the body while the current cell is not zero.
    Loop(Vec<Spanned<Command>>),
}

impl Command {
    /// A short human-readable description, used for the AST dump.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Command::Add(amount) => format!("add {amount}"),
            Command::Shift(offset) => format!("shift {offset}"),
            Command::Output => String::from("output"),
            Command::Input => String::from("input"),
            Command::Clear => String::from("clear"),
            Command::Loop(body) => format!("loop ({} commands)", body.len()),
        }
    }
}

/// Parse a whole Brainfuck program.
///
/// A `]` without a matching `[`, or a `[` never closed, is reported as an error whose
/// span points at the offending bracket or at the end of the input.
#[must_use]
pub fn parser<'a>() -> impl Parser<'a, &'a str, Vec<Spanned<Command>>, ParserError<'a>> {
    let comment = none_of(COMMANDS).repeated();

    let program = recursive(|commands| {
        // A run of `up`/`down` characters, possibly interleaved with comments, folded
        // into its net effect.
        let run = |up: char, down: char| {
            choice((just(up).to(1), just(down).to(-1)))
                .then_ignore(comment.clone())
                .repeated()
                .at_least(1)
                .collect::<Vec<i32>>()
                .map(|steps| steps.into_iter().fold(0i32, i32::wrapping_add))
        };

        let clear = just('[')
            .then(comment.clone())
            .then(just('-'))
            .then(comment.clone())
            .then(just(']'))
            .to(Command::Clear);

        let looped = just('[')
            .ignore_then(comment.clone())
            .ignore_then(commands)
            .then_ignore(just(']'))
            .map(Command::Loop);

        let command = choice((
            clear,
            looped,
            run('+', '-').map(Command::Add),
            run('>', '<').map(Command::Shift),
            just('.').to(Command::Output),
            just(',').to(Command::Input),
        ))
        .map_with(|command, e| Spanned::new(command, e.span()))
        .then_ignore(comment.clone());

        command.repeated().collect::<Vec<_>>()
    });

    comment.ignore_then(program).then_ignore(end())
}
