//! Source spans.
//!
//! The front end annotates every node with the line/column range it was
//! parsed from plus the raw token image. Byte offsets are kept alongside so
//! diagnostics can be rendered against the original source text.

use std::fmt;

use rowan::{TextRange, TextSize};
use serde::{Deserialize, Serialize};

/// A 1-based line/column position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The region of source text a node was produced from.
///
/// Synthetic nodes created by a pass inherit the span of the node they
/// replace, so diagnostics raised later still point at user code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    /// Byte offset of the first character.
    #[serde(default)]
    pub offset: u32,
    /// Length in bytes.
    #[serde(default)]
    pub len: u32,
    /// Raw token image.
    #[serde(default)]
    pub lexeme: String,
}

impl Span {
    /// A span covering `offset..offset + lexeme.len()` on a single line.
    pub fn new(line: u32, column: u32, offset: u32, lexeme: impl Into<String>) -> Self {
        let lexeme = lexeme.into();
        let len = lexeme.len() as u32;
        Span {
            start: Position::new(line, column),
            end: Position::new(line, column + len),
            offset,
            len,
            lexeme,
        }
    }

    /// A span with no source location, used for nodes built in code.
    pub fn synthetic() -> Self {
        Span::default()
    }

    pub fn is_synthetic(&self) -> bool {
        self.start.line == 0
    }

    /// Byte range for diagnostic rendering.
    pub fn text_range(&self) -> TextRange {
        TextRange::at(TextSize::from(self.offset), TextSize::from(self.len))
    }

    /// The smallest span containing both `self` and `other`.
    pub fn cover(&self, other: &Span) -> Span {
        if self.is_synthetic() {
            return other.clone();
        }
        if other.is_synthetic() {
            return self.clone();
        }
        let start_off = self.offset.min(other.offset);
        let end_off = (self.offset + self.len).max(other.offset + other.len);
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            offset: start_off,
            len: end_off - start_off,
            lexeme: String::new(),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
