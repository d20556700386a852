//! Byte input with cursor tracking and mark-based backtracking.
//!
//! An [`Input`] owns a byte source and a logical cursor. Combinators take a
//! mark before speculative work, then either commit it or rewind to it; a
//! rewind restores the position, line, column, and last-consumed byte
//! exactly. For stream sources the input retains every byte from the oldest
//! live mark to the cursor, so rewinding works even when the underlying
//! source cannot seek.

use std::io::{ErrorKind, Read};

use common::Loc;

/// Chunk size for stream reads.
const READ_CHUNK: usize = 256;

enum Source<'a> {
    Bytes(&'a [u8]),
    Stream(Box<dyn Read + 'a>),
}

/// A saved cursor state. Returned by [`Input::mark`] and consumed by
/// [`Input::rewind`] or [`Input::commit`].
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pos: usize,
    line: u32,
    col: u32,
    last: Option<u8>,
    depth: usize,
}

impl Checkpoint {
    /// Byte offset at which the mark was taken.
    pub fn pos(&self) -> usize {
        self.pos
    }
}

pub struct Input<'a> {
    name: String,
    src: Source<'a>,

    // Stream retention window: absolute bytes [buf_base, buf_base + buf.len()).
    buf: Vec<u8>,
    buf_base: usize,
    hit_eof: bool,
    read_error: Option<String>,

    pos: usize,
    line: u32,
    col: u32,
    last: Option<u8>,

    // Stack of absolute offsets with a live mark.
    marks: Vec<usize>,
    // Backtracking is disabled while > 0 (predictive evaluation).
    suspended: u32,
}

impl<'a> Input<'a> {
    /// Open an in-memory byte source.
    pub fn bytes(name: &str, bytes: &'a [u8]) -> Self {
        Self::new(name, Source::Bytes(bytes))
    }

    /// Open an in-memory string source.
    pub fn string(name: &str, text: &'a str) -> Self {
        Self::bytes(name, text.as_bytes())
    }

    /// Open a forward-only stream source.
    pub fn stream(name: &str, reader: impl Read + 'a) -> Self {
        Self::new(name, Source::Stream(Box::new(reader)))
    }

    fn new(name: &str, src: Source<'a>) -> Self {
        Self {
            name: name.to_string(),
            src,
            buf: Vec::new(),
            buf_base: 0,
            hit_eof: false,
            read_error: None,
            pos: 0,
            line: 1,
            col: 1,
            last: None,
            marks: Vec::new(),
            suspended: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset from the start of the input.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn col(&self) -> u32 {
        self.col
    }

    /// The previously consumed byte, or `None` at the start of the input.
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Current position as a [`Loc`].
    pub fn loc(&self) -> Loc {
        Loc::new(self.pos as u32, self.line, self.col)
    }

    /// The cause of a failed stream read, if one occurred.
    pub fn read_failure(&self) -> Option<&str> {
        self.read_error.as_deref()
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    fn fill(&mut self, upto: usize) {
        if let Source::Stream(reader) = &mut self.src {
            while !self.hit_eof && self.buf_base + self.buf.len() < upto {
                let mut chunk = [0u8; READ_CHUNK];
                match reader.read(&mut chunk) {
                    Ok(0) => self.hit_eof = true,
                    Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.read_error = Some(e.to_string());
                        self.hit_eof = true;
                    }
                }
            }
        }
    }

    /// Look at the next byte without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        match &self.src {
            Source::Bytes(bytes) => bytes.get(self.pos).copied(),
            Source::Stream(_) => {
                self.fill(self.pos + 1);
                self.buf.get(self.pos - self.buf_base).copied()
            }
        }
    }

    /// Consume and return the next byte, updating position tracking.
    pub fn next(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.last = Some(b);
        Some(b)
    }

    pub fn eof(&mut self) -> bool {
        self.peek().is_none()
    }

    // -------------------------------------------------------------------------
    // Marks
    // -------------------------------------------------------------------------

    /// Register a rewind point.
    pub fn mark(&mut self) -> Checkpoint {
        self.marks.push(self.pos);
        Checkpoint {
            pos: self.pos,
            line: self.line,
            col: self.col,
            last: self.last,
            depth: self.marks.len() - 1,
        }
    }

    /// Restore the cursor to `cp` and release the mark.
    ///
    /// While backtracking is suspended the cursor is left where it is; only
    /// the mark is released.
    pub fn rewind(&mut self, cp: &Checkpoint) {
        self.marks.truncate(cp.depth);
        if self.suspended == 0 {
            self.pos = cp.pos;
            self.line = cp.line;
            self.col = cp.col;
            self.last = cp.last;
        }
        self.compact();
    }

    /// Release the mark without moving the cursor. Retained stream bytes
    /// older than the oldest live mark are discarded.
    pub fn commit(&mut self, cp: &Checkpoint) {
        self.marks.truncate(cp.depth);
        self.compact();
    }

    /// Number of open marks.
    pub fn backtrack_depth(&self) -> usize {
        self.marks.len()
    }

    pub fn suspend_backtracking(&mut self) {
        self.suspended += 1;
    }

    pub fn resume_backtracking(&mut self) {
        self.suspended = self.suspended.saturating_sub(1);
    }

    /// Whether a rewind would currently restore the cursor.
    pub fn backtracking(&self) -> bool {
        self.suspended == 0
    }

    fn compact(&mut self) {
        if matches!(self.src, Source::Bytes(_)) {
            return;
        }
        let keep_from = self.marks.first().copied().unwrap_or(self.pos);
        if keep_from > self.buf_base {
            self.buf.drain(..keep_from - self.buf_base);
            self.buf_base = keep_from;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_string_positions() {
        let mut i = Input::string("<test>", "ab\ncd");
        assert_eq!(i.peek(), Some(b'a'));
        assert_eq!(i.next(), Some(b'a'));
        assert_eq!(i.next(), Some(b'b'));
        assert_eq!((i.line(), i.col()), (1, 3));
        assert_eq!(i.next(), Some(b'\n'));
        assert_eq!((i.line(), i.col()), (2, 1));
        assert_eq!(i.next(), Some(b'c'));
        assert_eq!(i.last(), Some(b'c'));
        assert_eq!(i.next(), Some(b'd'));
        assert_eq!(i.next(), None);
        assert!(i.eof());
        assert_eq!(i.pos(), 5);
    }

    #[test]
    fn test_rewind_restores_exactly() {
        let mut i = Input::string("<test>", "x\nyz");
        i.next();
        let cp = i.mark();
        assert_eq!(i.backtrack_depth(), 1);
        i.next();
        i.next();
        i.rewind(&cp);
        assert_eq!(i.backtrack_depth(), 0);
        assert_eq!(i.pos(), 1);
        assert_eq!((i.line(), i.col()), (1, 2));
        assert_eq!(i.last(), Some(b'x'));
        assert_eq!(i.peek(), Some(b'\n'));
    }

    #[test]
    fn test_commit_keeps_position() {
        let mut i = Input::string("<test>", "abc");
        let cp = i.mark();
        i.next();
        i.next();
        i.commit(&cp);
        assert_eq!(i.pos(), 2);
        assert_eq!(i.backtrack_depth(), 0);
    }

    #[test]
    fn test_nested_marks() {
        let mut i = Input::string("<test>", "abcdef");
        let outer = i.mark();
        i.next();
        let inner = i.mark();
        i.next();
        i.next();
        i.rewind(&inner);
        assert_eq!(i.pos(), 1);
        i.rewind(&outer);
        assert_eq!(i.pos(), 0);
        assert_eq!(i.last(), None);
    }

    #[test]
    fn test_suspended_rewind_keeps_cursor() {
        let mut i = Input::string("<test>", "abc");
        let cp = i.mark();
        i.next();
        i.suspend_backtracking();
        assert!(!i.backtracking());
        i.rewind(&cp);
        assert_eq!(i.pos(), 1);
        i.resume_backtracking();
        assert!(i.backtracking());
    }

    #[test]
    fn test_stream_rewind_across_chunks() {
        // Larger than one read chunk so retention spans refills.
        let data: Vec<u8> = (0..600).map(|n| (n % 251) as u8).collect();
        let mut i = Input::stream("<pipe>", Cursor::new(data.clone()));
        for expected in &data[..10] {
            assert_eq!(i.next(), Some(*expected));
        }
        let cp = i.mark();
        for expected in &data[10..500] {
            assert_eq!(i.next(), Some(*expected));
        }
        i.rewind(&cp);
        assert_eq!(i.pos(), 10);
        for expected in &data[10..] {
            assert_eq!(i.next(), Some(*expected));
        }
        assert!(i.eof());
    }

    #[test]
    fn test_stream_read_failure_is_eof() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::Other, "boom"))
            }
        }
        let mut i = Input::stream("<pipe>", Failing);
        assert_eq!(i.peek(), None);
        assert!(i.read_failure().is_some());
    }
}
