//! Compile diagnostics for user-facing error messages
//!
//! A failed compile is reported as a single structured value: where it
//! happened, what went wrong, and (when we can tell) how to fix it. The
//! caller decides how to surface it; nothing in the core writes to a
//! global logger.

use std::fmt;

/// Diagnostic produced by a failed compilation.
///
/// `Display` renders a multi-line, directly printable message with the
/// offending source line and a caret, so hosts can show it verbatim.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// 1-indexed source line, 0 when the location is unknown.
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub hint: Option<String>,
    pub snippet: Option<String>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: 0,
            column: 0,
            message: message.into(),
            hint: None,
            snippet: None,
        }
    }

    pub fn at(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
            hint: None,
            snippet: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            writeln!(f, "compile error at line {}:{}", self.line, self.column)?;
        } else {
            writeln!(f, "compile error")?;
        }

        if let Some(snippet) = &self.snippet {
            writeln!(f, "  {}", snippet)?;
            writeln!(f, "  {}^", " ".repeat(self.column.saturating_sub(1)))?;
        }

        write!(f, "{}", self.message)?;

        if let Some(hint) = &self.hint {
            write!(f, "\nhint: {}", hint)?;
        }

        Ok(())
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_location_and_hint() {
        let err = CompileError::at(3, 8, "unknown function 'lfp'")
            .with_snippet("out: sin 440 >> lfp 1000 0.7")
            .with_hint("did you mean 'lpf'?");

        let text = err.to_string();
        assert!(text.contains("line 3:8"));
        assert!(text.contains("out: sin 440"));
        assert!(text.contains("did you mean 'lpf'?"));

        // Caret sits under column 8 (two-space gutter + 7 spaces)
        let caret_line = text
            .lines()
            .find(|l| l.trim_end().ends_with('^'))
            .expect("caret line");
        assert_eq!(caret_line.len(), 2 + 7 + 1);
    }

    #[test]
    fn test_display_without_location() {
        let err = CompileError::new("program declares no output");
        let text = err.to_string();
        assert!(text.starts_with("compile error\n"));
        assert!(text.contains("no output"));
    }
}
