//! A Brainfuck front end for the CIL backend.
//!
//! Brainfuck is small enough that the whole front end fits in three steps: the
//! [`parser`] turns the source into a list of folded commands, [`error`] turns parse
//! failures into `ariadne` reports, and [`lower`] drives the backend to produce the
//! listing of a console program.
pub mod error;
pub mod lower;
pub mod parser;

pub use error::{SyntaxError, SyntaxErrorKind};
pub use lower::compile;
pub use parser::{parser, Command};
