//! Located compiler messages. The backend reports errors and warnings against AST nodes
//! (or against an explicit file and line when no node exists yet), and lets the driver
//! decide where they end up: a registered callback per severity, or a plain
//! `file:line: message` line on the diagnostic stream.
//!
//! Reporting never aborts anything. The reporter counts what went through it so that the
//! driver can decide, once the unit is done, whether the produced assembly is usable.
use ast::NodeInfo;
use std::io::Write;

/// A diagnostic callback. It receives the file name, the line number and the already
/// formatted message.
pub type DiagFn = Box<dyn FnMut(&str, u64, &str)>;

/// The severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// Routes diagnostics to the registered callbacks or to the diagnostic stream.
pub struct Reporter {
    error_fn: Option<DiagFn>,
    warning_fn: Option<DiagFn>,
    stream: Box<dyn Write>,
    errors: usize,
    warnings: usize,
}

impl Reporter {
    /// Create a reporter writing to the standard error stream.
    #[must_use]
    pub fn new() -> Self {
        Self::with_stream(Box::new(std::io::stderr()))
    }

    /// Create a reporter writing to the given stream when no callback is registered.
    #[must_use]
    pub fn with_stream(stream: Box<dyn Write>) -> Self {
        Self {
            error_fn: None,
            warning_fn: None,
            stream,
            errors: 0,
            warnings: 0,
        }
    }

    /// Register (or remove, with `None`) the callback receiving errors.
    pub fn set_error_fn(&mut self, callback: Option<DiagFn>) {
        self.error_fn = callback;
    }

    /// Register (or remove, with `None`) the callback receiving warnings.
    pub fn set_warning_fn(&mut self, callback: Option<DiagFn>) {
        self.warning_fn = callback;
    }

    /// Report an error located at the given node.
    pub fn error(&mut self, node: &impl NodeInfo, msg: &str) {
        self.report(Severity::Error, node.source_file(), node.source_line(), msg);
    }

    /// Report a warning located at the given node.
    pub fn warning(&mut self, node: &impl NodeInfo, msg: &str) {
        self.report(Severity::Warning, node.source_file(), node.source_line(), msg);
    }

    /// Report an error on an explicit line, before any node exists for it.
    pub fn error_on_line(&mut self, file: &str, line: u64, msg: &str) {
        self.report(Severity::Error, file, line, msg);
    }

    /// Report a warning on an explicit line, before any node exists for it.
    pub fn warning_on_line(&mut self, file: &str, line: u64, msg: &str) {
        self.report(Severity::Warning, file, line, msg);
    }

    /// Get the number of errors reported so far.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Get the number of warnings reported so far.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// Check if at least one error was reported. The output of a unit with errors must
    /// not be used.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    fn report(&mut self, severity: Severity, file: &str, line: u64, msg: &str) {
        tracing::debug!(?severity, file, line, msg, "diagnostic");
        let callback = match severity {
            Severity::Error => {
                self.errors += 1;
                self.error_fn.as_mut()
            }
            Severity::Warning => {
                self.warnings += 1;
                self.warning_fn.as_mut()
            }
        };

        if let Some(callback) = callback {
            callback(file, line, msg);
            return;
        }

        let prefix = match severity {
            Severity::Error => "",
            Severity::Warning => "warning: ",
        };

        // A diagnostic that cannot be written has nowhere else to go.
        let _ = writeln!(self.stream, "{file}:{line}: {prefix}{msg}");
        let _ = self.stream.flush();
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("error_fn", &self.error_fn.is_some())
            .field("warning_fn", &self.warning_fn.is_some())
            .field("errors", &self.errors)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::{Ast, NodeKind};
    use span::Location;
    use std::{cell::RefCell, rc::Rc};

    /// A stream that keeps what was written to it, readable after the reporter took it.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    #[test]
    fn default_formatter() {
        let buffer = SharedBuffer::default();
        let mut reporter = Reporter::with_stream(Box::new(buffer.clone()));

        let mut ast = Ast::new();
        let node = ast.push(
            NodeKind::Statement {
                description: "goto".into(),
            },
            Location::new(Rc::from("main.bf"), 7),
        );

        reporter.error(&ast[node], "undefined label 'end'");
        reporter.warning_on_line("main.bf", 2, "unused variable");

        assert_eq!(
            buffer.contents(),
            "main.bf:7: undefined label 'end'\nmain.bf:2: warning: unused variable\n"
        );
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.warning_count(), 1);
        assert!(reporter.has_errors());
    }

    #[test]
    fn callbacks_take_over_the_stream() {
        let buffer = SharedBuffer::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut reporter = Reporter::with_stream(Box::new(buffer.clone()));

        let sink = Rc::clone(&seen);
        reporter.set_warning_fn(Some(Box::new(move |file, line, msg| {
            sink.borrow_mut().push(format!("{file}|{line}|{msg}"));
        })));

        reporter.warning_on_line("a.cs", 3, "shadowed");
        reporter.error_on_line("a.cs", 4, "bad");

        assert_eq!(*seen.borrow(), vec!["a.cs|3|shadowed".to_owned()]);
        assert_eq!(buffer.contents(), "a.cs:4: bad\n");

        reporter.set_warning_fn(None);
        reporter.warning_on_line("a.cs", 5, "again");
        assert_eq!(buffer.contents(), "a.cs:4: bad\na.cs:5: warning: again\n");
        assert_eq!(reporter.warning_count(), 2);

        // The error slot is independent from the warning slot.
        let sink = Rc::clone(&seen);
        reporter.set_error_fn(Some(Box::new(move |file, line, msg| {
            sink.borrow_mut().push(format!("error {file}|{line}|{msg}"));
        })));
        reporter.error_on_line("a.cs", 6, "worse");
        reporter.warning_on_line("a.cs", 7, "still here");
        assert_eq!(
            *seen.borrow(),
            vec!["a.cs|3|shadowed".to_owned(), "error a.cs|6|worse".to_owned()]
        );
        assert_eq!(
            buffer.contents(),
            "a.cs:4: bad\na.cs:5: warning: again\na.cs:7: warning: still here\n"
        );

        reporter.set_error_fn(None);
        reporter.error_on_line("a.cs", 8, "last");
        assert!(buffer.contents().ends_with("a.cs:8: last\n"));
        assert_eq!(reporter.error_count(), 3);
    }
}
