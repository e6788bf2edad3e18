//! # Diagnostics
//!
//! Central error reporting facility shared by every compilation stage
//! (lexer, parser, checker). Mirrors the role of a single process-wide
//! error sink: each stage reports through the same [`Reporter`], and the
//! driver halts the pipeline once its count is non-zero.

use std::fmt::Display;

use colored::Colorize;

/// A single line-attributed diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} line {}: {}",
            "error:".red().bold(),
            self.line,
            self.message
        )
    }
}

/// Collects diagnostics across stages and tracks a monotonic error count.
///
/// Stages never abort on the first error; they report and continue so a
/// single run can surface multiple problems. The driver is responsible for
/// checking [`Reporter::has_errors`] between stages.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, line: usize, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            line,
            message: message.into(),
        };
        log::error!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl Display for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_errors() {
        let mut reporter = Reporter::new();
        assert!(!reporter.has_errors());

        reporter.error(3, "Illegal character 'c'");
        reporter.error(5, "Unterminated string literal");

        assert_eq!(reporter.count(), 2);
        assert!(reporter.has_errors());
        assert_eq!(reporter.diagnostics()[0].line, 3);
    }
}
