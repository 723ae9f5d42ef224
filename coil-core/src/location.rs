//! Source locations attached to tokens, tree nodes and errors.

use std::fmt::Display;
use std::rc::Rc;

/// A position within a named source: a 1-based line and column plus the
/// path the bytes were read from (if any).
///
/// The first line is 1 and the first column is 1, matching the coil
/// reference implementation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    path: Option<Rc<str>>,
    line: u32,
    column: u32,
}

impl Location {
    /// Constructs a location at the given line/column within `path`.
    pub fn new(path: Option<Rc<str>>, line: u32, column: u32) -> Self {
        Location { path, line, column }
    }

    /// A location with no useful information, used for synthetic values
    /// that were never read from source text.
    pub fn unknown() -> Self {
        Location::default()
    }

    /// The path of the source this location belongs to, if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The 1-based line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// The 1-based column number.
    pub fn column(&self) -> u32 {
        self.column
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.path.as_deref().unwrap_or("<string>"),
            self.line,
            self.column
        )
    }
}
