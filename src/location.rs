/// Source locations for tokens and AST nodes.
///
/// Every token and every AST node carries a `Span` so that errors, tooling
/// and the incremental reparser can map nodes back to source bytes.

/// A region of the source text.
///
/// `line` and `column` are 1-based; `offset` and `end_offset` are byte
/// offsets into the original source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub end_offset: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, offset: usize, end_offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
            end_offset,
        }
    }

    /// Span for a synthesized node with no source counterpart.
    pub fn unknown() -> Self {
        Self {
            line: 0,
            column: 0,
            offset: 0,
            end_offset: 0,
        }
    }

    /// Returns a span covering from the start of `self` to the end of `end`.
    pub fn span_to(&self, end: Span) -> Span {
        Span {
            line: self.line,
            column: self.column,
            offset: self.offset,
            end_offset: end.end_offset,
        }
    }

    /// Shifts both byte offsets by a signed delta. Used by the incremental
    /// reparser when splicing blocks after an edit.
    pub fn shifted(&self, delta: isize) -> Span {
        Span {
            line: self.line,
            column: self.column,
            offset: self.offset.saturating_add_signed(delta),
            end_offset: self.end_offset.saturating_add_signed(delta),
        }
    }

    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.end_offset <= self.offset
    }

    /// True if the byte range [start, end) overlaps this span.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.offset < end && start < self.end_offset
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::new(1, 1, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_to_merges_ranges() {
        let a = Span::new(1, 1, 0, 5);
        let b = Span::new(2, 3, 10, 20);
        let merged = a.span_to(b);
        assert_eq!(merged.offset, 0);
        assert_eq!(merged.end_offset, 20);
        assert_eq!(merged.line, 1);
    }

    #[test]
    fn shifted_moves_offsets() {
        let s = Span::new(3, 1, 40, 50).shifted(-10);
        assert_eq!(s.offset, 30);
        assert_eq!(s.end_offset, 40);
    }

    #[test]
    fn overlap_is_half_open() {
        let s = Span::new(1, 1, 10, 20);
        assert!(s.overlaps(15, 25));
        assert!(s.overlaps(0, 11));
        assert!(!s.overlaps(20, 30));
        assert!(!s.overlaps(0, 10));
    }
}
