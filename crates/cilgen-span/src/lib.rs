use std::{
    ops::{Deref, DerefMut},
    rc::Rc,
};

/// A simple span type that uses `usize` to represent the start and end of a span.
pub type Span = chumsky::span::SimpleSpan<usize>;

/// A wrapper around an item that includes its span. This struct directly dereferences
/// to the inner item, so it can be used as if it were the item itself, but also allows
/// access to the span information.
pub struct Spanned<T>(pub T, pub Span);

impl<T> Spanned<T> {
    #[must_use]
    pub fn new(item: T, span: Span) -> Self {
        Self(item, span)
    }

    #[must_use]
    pub fn none(item: T) -> Self {
        Self(item, Span::from(0..0))
    }

    /// Get a reference to the inner item.
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.0
    }

    /// Get the span of the item.
    #[must_use]
    pub fn span(&self) -> Span {
        self.1
    }

    /// Consume the `Spanned` and return the inner item, discarding the span.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Spanned<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Clone> Clone for Spanned<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone(), self.1)
    }
}

impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Spanned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spanned")
            .field("span", &self.span())
            .field("item", &self.inner())
            .finish()
    }
}

/// A source location as the backend sees it: a file name and a 1-based line number.
/// Diagnostics are reported against locations rather than spans because the code
/// generator never has the source text at hand, only what the front end recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// The name of the source file. Shared between all the nodes of a compilation unit.
    pub file: Rc<str>,

    /// The line number, starting at 1. A line of 0 means "unknown".
    pub line: u64,
}

impl Location {
    #[must_use]
    pub fn new(file: Rc<str>, line: u64) -> Self {
        Self { file, line }
    }

    /// A location for synthesized nodes that do not come from any source file.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            file: Rc::from("<unknown>"),
            line: 0,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Maps byte offsets of a source text to line numbers. Front ends use it to turn
/// the spans produced by the parser into the [`Location`]s carried by AST nodes.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first character of each line. The first entry is always 0.
    starts: Vec<usize>,
}

impl LineIndex {
    /// Build the line index of the given source text.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self { starts }
    }

    /// Get the 1-based line number containing the given byte offset. Offsets past the
    /// end of the text are attributed to the last line.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> u64 {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx as u64 + 1,
            Err(idx) => idx as u64,
        }
    }

    /// Build the location of a span, using the line where the span starts.
    #[must_use]
    pub fn locate(&self, file: &Rc<str>, span: Span) -> Location {
        Location::new(Rc::clone(file), self.line_of(span.start))
    }
}
