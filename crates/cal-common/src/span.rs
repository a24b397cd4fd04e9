use serde::Serialize;

/// Half-open byte range `[start, end)` into a source file.
///
/// The lexer stamps every token with one of these, and AST nodes keep
/// their first and last token, so any C/AL construct can be traced back
/// to the exact bytes it was parsed from. Offsets index the original
/// UTF-8 text; callers construct spans with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Half-open membership test: the end offset is already outside.
    pub fn contains(&self, offset: u32) -> bool {
        (self.start..self.end).contains(&offset)
    }

    /// The smallest span enclosing both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// The source text this span points at.
    ///
    /// # Panics
    ///
    /// Panics if the span does not lie on UTF-8 boundaries of `source`,
    /// which cannot happen for spans produced by the lexer over the
    /// same text.
    pub fn text_in<'src>(&self, source: &'src str) -> &'src str {
        &source[self.start as usize..self.end as usize]
    }
}

/// Byte-offset to line/column translation for one source text.
///
/// Diagnostics and the editor layer speak 1-based lines and columns
/// while the front end works in byte offsets. The index records where
/// every line begins in a single pass over the text and answers lookups
/// by binary search. Columns are byte counts from the line start.
#[derive(Debug)]
pub struct LineIndex {
    /// Offset of the first byte of every line; index 0 holds 0.
    starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(at, _)| (at + 1) as u32))
            .collect();
        Self { starts }
    }

    /// 1-based (line, column) of a byte offset. A line break belongs to
    /// the line it ends.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        (line as u32 + 1, offset - self.starts[line] + 1)
    }

    /// Offset of the first byte of a 1-based line, when the line exists.
    pub fn line_start(&self, line: u32) -> Option<u32> {
        self.starts.get(line.checked_sub(1)? as usize).copied()
    }

    /// How many lines the source has.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}
