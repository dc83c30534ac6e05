//! Source positions shared by every stage of the pipeline.
//!
//! Every AST node, token, and diagnostic in this crate carries a
//! [`Position`] rather than reaching back into the source text, so that
//! stages downstream of the lexer never need to re-scan.

use std::fmt::{self, Display};

/// A single point in a source file: 1-based line and column, plus the
/// byte offsets of the lexeme that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize, start_byte: usize, end_byte: usize) -> Self {
        Self {
            line,
            column,
            start_byte,
            end_byte,
        }
    }

    /// Merge two positions into a span covering both, keeping the
    /// earlier line/column and the widest byte range. Used when a
    /// compound node's position should cover its children.
    pub fn to(self, other: Position) -> Position {
        Position {
            line: self.line,
            column: self.column,
            start_byte: self.start_byte.min(other.start_byte),
            end_byte: self.end_byte.max(other.end_byte),
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
