/// Byte-level source iterator for the C/AL lexer.
///
/// The cursor wraps a source string and provides character-by-character
/// iteration with byte-offset position tracking plus 1-based line/column
/// counters. All offsets are byte offsets into the original UTF-8 source.
pub struct Cursor<'src> {
    source: &'src str,
    pos: u32,
    line: u32,
    column: u32,
    chars: std::str::Chars<'src>,
}

impl<'src> Cursor<'src> {
    /// Create a new cursor at the start of the source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            chars: source.chars(),
        }
    }

    /// Look at the current character without consuming it.
    pub fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    /// Look at the character after the current one without consuming anything.
    pub fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next()
    }

    /// Consume the current character and advance the position.
    ///
    /// `\n` bumps the line counter and resets the column; `\r\n` counts as
    /// one newline (the bump happens at the `\n`). Returns the consumed
    /// character, or `None` at end of input.
    pub fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        match c {
            '\n' => {
                self.line += 1;
                self.column = 1;
            }
            '\r' => {
                if self.peek() != Some('\n') {
                    self.line += 1;
                    self.column = 1;
                }
            }
            _ => self.column += 1,
        }
        Some(c)
    }

    /// Current byte position in the source text.
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Current 1-based line.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Current 1-based column.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Whether there are no more characters to consume.
    pub fn is_eof(&self) -> bool {
        self.peek().is_none()
    }

    /// Advance while the predicate holds for the current character.
    pub fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if predicate(c) {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Extract a slice of the source text by byte offsets.
    ///
    /// # Panics
    ///
    /// Panics if start or end are out of bounds or not on UTF-8 boundaries.
    pub fn slice(&self, start: u32, end: u32) -> &'src str {
        &self.source[start as usize..end as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cursor_starts_at_origin() {
        let cursor = Cursor::new("hello");
        assert_eq!(cursor.pos(), 0);
        assert_eq!(cursor.line(), 1);
        assert_eq!(cursor.column(), 1);
        assert!(!cursor.is_eof());
    }

    #[test]
    fn lookahead_never_moves_the_cursor() {
        // Two-character operator disambiguation (`:` vs `:=`) relies on
        // peeking both characters without consuming either.
        let cursor = Cursor::new(":=");
        assert_eq!(cursor.peek(), Some(':'));
        assert_eq!(cursor.peek_next(), Some('='));
        assert_eq!(cursor.peek(), Some(':'));
        assert_eq!(cursor.pos(), 0);
        assert_eq!(cursor.column(), 1);
    }

    #[test]
    fn advance_moves_position_and_column() {
        let mut cursor = Cursor::new("abc");
        assert_eq!(cursor.advance(), Some('a'));
        assert_eq!(cursor.pos(), 1);
        assert_eq!(cursor.column(), 2);
        assert_eq!(cursor.advance(), Some('b'));
        assert_eq!(cursor.advance(), Some('c'));
        assert_eq!(cursor.advance(), None);
        assert!(cursor.is_eof());
    }

    #[test]
    fn advance_tracks_lines() {
        let mut cursor = Cursor::new("a\nb");
        cursor.advance(); // a
        assert_eq!(cursor.line(), 1);
        cursor.advance(); // \n
        assert_eq!(cursor.line(), 2);
        assert_eq!(cursor.column(), 1);
        cursor.advance(); // b
        assert_eq!(cursor.line(), 2);
        assert_eq!(cursor.column(), 2);
    }

    #[test]
    fn crlf_counts_as_one_newline() {
        let mut cursor = Cursor::new("a\r\nb");
        cursor.advance(); // a
        cursor.advance(); // \r -- no bump yet, \n follows
        assert_eq!(cursor.line(), 1);
        cursor.advance(); // \n
        assert_eq!(cursor.line(), 2);
        assert_eq!(cursor.column(), 1);
    }

    #[test]
    fn lone_cr_counts_as_newline() {
        let mut cursor = Cursor::new("a\rb");
        cursor.advance(); // a
        cursor.advance(); // \r
        assert_eq!(cursor.line(), 2);
        assert_eq!(cursor.column(), 1);
    }

    #[test]
    fn multibyte_chars_advance_by_their_byte_width() {
        // Quoted identifiers may hold any character; offsets stay byte
        // offsets while the column counts whole characters.
        let mut cursor = Cursor::new("Værdi");
        cursor.advance(); // V
        assert_eq!(cursor.pos(), 1);
        cursor.advance(); // æ is 2 bytes
        assert_eq!(cursor.pos(), 3);
        assert_eq!(cursor.column(), 3);
    }

    #[test]
    fn eat_while_stops_at_the_first_mismatch() {
        let mut cursor = Cursor::new("50000;");
        cursor.eat_while(|c| c.is_ascii_digit());
        assert_eq!(cursor.pos(), 5);
        assert_eq!(cursor.peek(), Some(';'));
    }

    #[test]
    fn slice_reads_back_consumed_text() {
        let mut cursor = Cursor::new("BEGIN END");
        let start = cursor.pos();
        cursor.eat_while(|c| c.is_ascii_alphabetic());
        assert_eq!(cursor.slice(start, cursor.pos()), "BEGIN");
    }

    #[test]
    fn empty_source_is_eof_from_the_start() {
        let cursor = Cursor::new("");
        assert!(cursor.is_eof());
        assert_eq!(cursor.peek(), None);
        assert_eq!(cursor.peek_next(), None);
        assert_eq!((cursor.line(), cursor.column()), (1, 1));
    }
}
