//! Source locations shared by every compiler and runtime layer.

use std::fmt;
use std::sync::Arc;

/// A position in a source file.
///
/// `line == 0` denotes a synthetic location, i.e. one that was not produced
/// by tokenizing real source text (for example, the location assigned to the
/// top-level function wrapping a whole script).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    file: Arc<str>,
    line: u32,
    column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// A synthetic location with no real source position, tagged to `file`.
    pub fn synthetic(file: impl Into<Arc<str>>) -> Self {
        Self::new(file, 0, 0)
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_file_line_column() {
        let sloc = SourceLocation::new("script.ast", 12, 5);
        assert_eq!(sloc.to_string(), "script.ast:12:5");
    }

    #[test]
    fn synthetic_has_zero_line() {
        let sloc = SourceLocation::synthetic("[file scope]");
        assert!(sloc.is_synthetic());
        assert_eq!(sloc.line(), 0);
    }
}
