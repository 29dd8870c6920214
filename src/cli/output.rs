//! Console output for a validation run
//!
//! Problem diagnostics go to stdout; banner, progress, notes, I/O errors and
//! the aggregate summary go to stderr. Quiet mode drops per-problem detail,
//! progress and notes, but never I/O errors or the summary.

use console::style;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::core::outcome::Problem;

pub struct Reporter {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    quiet: bool,
}

impl Reporter {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>, quiet: bool) -> Self {
        Self { out, err, quiet }
    }

    /// Reporter bound to the process's stdout and stderr
    pub fn stdio(quiet: bool) -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()), quiet)
    }

    /// Reporter writing into in-memory buffers
    pub fn capture(quiet: bool) -> (Self, Captured) {
        let captured = Captured::default();
        let reporter = Self::new(
            Box::new(captured.out.clone()),
            Box::new(captured.err.clone()),
            quiet,
        );
        (reporter, captured)
    }

    pub fn banner(&mut self, text: &str) {
        if !self.quiet {
            let _ = writeln!(self.err, "{}", style(text).bold().for_stderr());
        }
    }

    /// Per-file, per-engine progress line
    pub fn progress(&mut self, text: &str) {
        if !self.quiet {
            let _ = writeln!(self.err, "{}", text);
        }
    }

    pub fn problem(&mut self, problem: &Problem) {
        if !self.quiet {
            let _ = writeln!(self.out, "{}", problem);
        }
    }

    /// Parse failure detail from a syntax-only engine
    pub fn syntax(&mut self, text: &str) {
        if !self.quiet {
            let _ = writeln!(self.out, "{}", text);
        }
    }

    pub fn io_error(&mut self, text: &str) {
        let _ = writeln!(
            self.err,
            "{} {}",
            style("✗").red().for_stderr(),
            text
        );
    }

    pub fn internal_error(&mut self, text: &str) {
        let _ = writeln!(
            self.err,
            "{} {}",
            style("!").yellow().for_stderr(),
            text
        );
    }

    /// Render a diagnostic error report, regardless of quiet mode
    pub fn report(&mut self, report: miette::Report) {
        let _ = writeln!(self.err, "{:?}", report);
    }

    pub fn summary(&mut self, all_correct: bool) {
        if all_correct {
            let _ = writeln!(
                self.err,
                "{}",
                style("No validation issues encountered.").green().for_stderr()
            );
        } else {
            let _ = writeln!(
                self.err,
                "{}",
                style("At least one validation issue encountered.").red().for_stderr()
            );
        }
    }

    pub fn flush(&mut self) {
        let _ = self.out.flush();
        let _ = self.err.flush();
    }
}

/// Shared in-memory buffer implementing `Write`
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Handles to what a captured reporter wrote
#[derive(Clone, Default)]
pub struct Captured {
    out: SharedBuffer,
    err: SharedBuffer,
}

impl Captured {
    pub fn stdout(&self) -> String {
        self.out.contents()
    }

    pub fn stderr(&self) -> String {
        self.err.contents()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_drops_detail_but_not_summary() {
        let (mut reporter, captured) = Reporter::capture(true);
        reporter.banner("docval");
        reporter.progress("Validating 'a.json'...");
        reporter.problem(&Problem::new("missing field"));
        reporter.syntax("expected value");
        reporter.io_error("a.json: not found");
        reporter.summary(false);

        assert_eq!(captured.stdout(), "");
        let err = captured.stderr();
        assert!(!err.contains("docval"));
        assert!(!err.contains("Validating"));
        assert!(err.contains("a.json: not found"));
        assert!(err.contains("At least one validation issue encountered."));
    }

    #[test]
    fn test_streams() {
        let (mut reporter, captured) = Reporter::capture(false);
        reporter.progress("Validating 'a.json'...");
        reporter.problem(&Problem::new("missing field"));
        reporter.summary(true);

        assert_eq!(captured.stdout(), "missing field\n");
        assert!(captured.stderr().contains("Validating 'a.json'..."));
        assert!(captured.stderr().contains("No validation issues encountered."));
    }
}
