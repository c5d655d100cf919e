//! Source locations of statements and scops.
//!
//! A location is a byte range in the original input file, optionally
//! annotated with the line number of its first byte. Scops start out with
//! a dummy location that carries no offsets until the first update.

use std::fmt;
use serde::{Serialize, Deserialize};

/// A byte range in the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Loc {
    /// Byte offset of start
    pub start: usize,
    /// Byte offset one past the end
    pub end: usize,
    /// Line number (1-indexed) of the start, if known
    pub line: Option<usize>,
    dummy: bool,
}

impl Loc {
    /// Create a new location.
    pub fn new(start: usize, end: usize, line: Option<usize>) -> Self {
        Self { start, end, line, dummy: false }
    }

    /// Create a dummy location (no offset information yet).
    pub fn dummy() -> Self {
        Self { start: 0, end: 0, line: None, dummy: true }
    }

    /// Check if this location is the dummy location.
    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    /// Extend this location to include the region from `start` to `end`.
    ///
    /// A dummy location simply takes over the given offsets.
    pub fn update_start_end(&self, start: usize, end: usize) -> Loc {
        if self.dummy {
            return Loc::new(start, end, None);
        }
        Loc {
            start: self.start.min(start),
            end: self.end.max(end),
            line: self.line,
            dummy: false,
        }
    }

    /// Extend this location to include `other`.
    pub fn merge(&self, other: &Loc) -> Loc {
        if other.dummy {
            return *self;
        }
        self.update_start_end(other.start, other.end)
    }

    /// Get the length of this location in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if the location covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl Default for Loc {
    fn default() -> Self {
        Self::dummy()
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dummy {
            return write!(f, "<dummy>");
        }
        match self.line {
            Some(line) => write!(f, "{}:{}-{}", line, self.start, self.end),
            None => write!(f, "{}-{}", self.start, self.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loc_display() {
        assert_eq!(Loc::new(5, 10, Some(1)).to_string(), "1:5-10");
        assert_eq!(Loc::new(5, 10, None).to_string(), "5-10");
        assert_eq!(Loc::dummy().to_string(), "<dummy>");
    }

    #[test]
    fn test_dummy_takes_offsets() {
        let loc = Loc::dummy().update_start_end(12, 40);
        assert!(!loc.is_dummy());
        assert_eq!((loc.start, loc.end), (12, 40));
    }

    #[test]
    fn test_update_extends() {
        let loc = Loc::new(10, 20, Some(3)).update_start_end(4, 15);
        assert_eq!((loc.start, loc.end), (4, 20));
        assert_eq!(loc.line, Some(3));
        assert_eq!(loc.len(), 16);
    }

    #[test]
    fn test_merge_ignores_dummy() {
        let loc = Loc::new(1, 2, None);
        assert_eq!(loc.merge(&Loc::dummy()), loc);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&Loc::new(1, 9, Some(2))).unwrap();
        assert!(json.contains("\"start\":1"));
        assert!(json.contains("\"line\":2"));
    }
}
