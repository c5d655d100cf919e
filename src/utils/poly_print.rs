//! Textual dumps of SCoP entities.
//!
//! The dump format is meant for diagnostics only. Nested entities are
//! indented by two spaces per level.

use std::fmt::{Display, Write};

use crate::polyhedral::set::IntegerSet;

/// Indenting printer shared by the `dump` methods.
pub struct PolyPrinter {
    /// Indentation level
    indent: usize,
    /// Output buffer
    buffer: String,
}

impl PolyPrinter {
    /// Create a new printer.
    pub fn new() -> Self {
        Self {
            indent: 0,
            buffer: String::new(),
        }
    }

    /// Get the output.
    pub fn output(&self) -> &str {
        &self.buffer
    }

    /// Take the output.
    pub fn take_output(self) -> String {
        self.buffer
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buffer.push_str("  ");
        }
    }

    /// Print one line at the current indentation.
    pub fn line(&mut self, text: impl Display) {
        self.write_indent();
        // writing into a String cannot fail
        let _ = writeln!(self.buffer, "{}", text);
    }

    /// Print `name: value`.
    pub fn field(&mut self, name: &str, value: impl Display) {
        self.write_indent();
        let _ = writeln!(self.buffer, "{}: {}", name, value);
    }

    /// Print `name:` followed by whatever `body` prints, one level deeper.
    pub fn nested(&mut self, name: &str, body: impl FnOnce(&mut Self)) {
        self.line(format_args!("{}:", name));
        self.indent += 1;
        body(self);
        self.indent -= 1;
    }
}

impl Default for PolyPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Enumerate the points of `set` inside the box `[lo, hi]^dim` (for small sets only).
pub fn enumerate_points(set: &IntegerSet, params: &[i64], lo: i64, hi: i64) -> Vec<Vec<i64>> {
    let mut points = Vec::new();
    let mut current = vec![lo; set.dim()];
    if set.dim() == 0 {
        if set.contains(&current, params) {
            points.push(current);
        }
        return points;
    }
    enumerate_recursive(set, params, lo, hi, 0, &mut current, &mut points);
    points
}

fn enumerate_recursive(
    set: &IntegerSet,
    params: &[i64],
    lo: i64,
    hi: i64,
    dim: usize,
    current: &mut Vec<i64>,
    points: &mut Vec<Vec<i64>>,
) {
    if dim == current.len() {
        if set.contains(current, params) {
            points.push(current.clone());
        }
        return;
    }
    for v in lo..=hi {
        current[dim] = v;
        enumerate_recursive(set, params, lo, hi, dim + 1, current, points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse_set;
    use crate::utils::intern::Ctx;

    #[test]
    fn test_nested_indentation() {
        let mut printer = PolyPrinter::new();
        printer.field("context", "[N] -> { : N >= 0 }");
        printer.nested("stmts", |p| {
            p.line("S");
            p.nested("args", |p| p.line("a"));
        });
        assert_eq!(
            printer.output(),
            "context: [N] -> { : N >= 0 }\nstmts:\n  S\n  args:\n    a\n"
        );
    }

    #[test]
    fn test_enumerate_points() {
        let ctx = Ctx::new();
        let set = parse_set(&ctx, "{ S[i, j] : 0 <= i < 3 and 0 <= j <= i }").unwrap();
        let points = enumerate_points(&set, &[], -1, 4);
        assert_eq!(points.len(), 6);
        assert!(points.contains(&vec![2, 1]));
        assert!(!points.contains(&vec![1, 2]));
    }
}
