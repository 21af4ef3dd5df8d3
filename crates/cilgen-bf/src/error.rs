//! Turn the parser errors into `ariadne` reports, with messages that talk about
//! brackets rather than about what the parser expected.
use ariadne::{Color, Label, Report, ReportKind};
use chumsky::error::Rich;
use span::Span;
use std::ops::Range;

/// The different kinds of errors that can occur while parsing a Brainfuck program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SyntaxErrorKind {
    /// A `]` with no `[` before it.
    UnmatchedClose = 1,

    /// A `[` that is still open at the end of the program.
    UnclosedLoop = 2,
}

/// A syntax error, located in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub span: Span,
}

impl SyntaxError {
    /// Classify an error produced by the parser. The only way the parser can fail is
    /// on a bracket: either a `]` is found where no loop is open, or the input ends
    /// while one still is.
    #[must_use]
    pub fn from_rich(error: &Rich<'_, char, Span>) -> Self {
        let kind = match error.found() {
            Some(&']') => SyntaxErrorKind::UnmatchedClose,
            _ => SyntaxErrorKind::UnclosedLoop,
        };
        Self {
            kind,
            span: *error.span(),
        }
    }

    /// Build the report of this error, against the given source file name. For an
    /// unclosed loop, `open` is the position of the `[` that was never closed, if known.
    #[must_use]
    pub fn report<'src>(
        &self,
        filename: &'src str,
        open: Option<usize>,
    ) -> Report<'src, (&'src str, Range<usize>)> {
        let range = self.span.into_range();
        let report = Report::build(ReportKind::Error, (filename, range.clone()))
            .with_code(self.kind as u32);
        match self.kind {
            SyntaxErrorKind::UnmatchedClose => report
                .with_message("unmatched ']'")
                .with_label(
                    Label::new((filename, range))
                        .with_message("this ']' does not close any loop")
                        .with_color(Color::Red),
                )
                .finish(),
            SyntaxErrorKind::UnclosedLoop => {
                let report = report
                    .with_message("unclosed '['")
                    .with_label(
                        Label::new((filename, range))
                            .with_message("the program ends here")
                            .with_color(Color::Red),
                    );
                match open {
                    Some(offset) => report
                        .with_label(
                            Label::new((filename, offset..offset + 1))
                                .with_message("this loop is never closed")
                                .with_color(Color::Cyan),
                        )
                        .finish(),
                    None => report.finish(),
                }
            }
        }
    }
}

/// Find the `[` left open at the end of a program, if any: the innermost one that has
/// no matching `]`.
#[must_use]
pub fn unclosed_bracket(source: &str) -> Option<usize> {
    let mut open = Vec::new();
    for (offset, c) in source.char_indices() {
        match c {
            '[' => open.push(offset),
            ']' => {
                open.pop();
            }
            _ => {}
        }
    }
    open.pop()
}
