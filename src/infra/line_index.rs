//! Newline index over a file snapshot with LF/CRLF-robust line lookup.
//!
//! - 1-based external line numbers, matching blame and diff output.
//! - Line text excludes the terminating '\n' and a preceding '\r'.
//! - An empty buffer has 0 lines; a trailing '\n' does not open a new line.

#[derive(Debug, Clone)]
pub struct NewlineIndex
{
    /// Byte positions of every '\n' in the buffer.
    nl_positions: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl NewlineIndex
{
    /// Build an index recording positions of '\n'.
    pub fn build(bytes: &[u8]) -> Self
    {
        let nl_positions = memchr::memchr_iter(b'\n', bytes).collect();

        Self { nl_positions, len: bytes.len() }
    }

    /// Number of logical lines.
    pub fn line_count(&self) -> usize
    {
        if self.len == 0
        {
            return 0;
        }

        match self
            .nl_positions
            .last()
        {
            // Trailing newline terminates the last line
            Some(&last) if last + 1 == self.len => self
                .nl_positions
                .len(),
            _ => self
                .nl_positions
                .len()
                + 1,
        }
    }

    /// Byte span (start inclusive, end exclusive) of a 1-based line.
    pub fn line_span(
        &self,
        line1: usize,
        bytes: &[u8],
    ) -> Option<(usize, usize)>
    {
        if line1 == 0 || line1 > self.line_count()
        {
            return None;
        }

        let start = if line1 == 1 { 0 } else { self.nl_positions[line1 - 2] + 1 };

        let mut end = self
            .nl_positions
            .get(line1 - 1)
            .copied()
            .unwrap_or(self.len);

        if end > start && bytes.get(end - 1) == Some(&b'\r')
        {
            end -= 1;
        }

        Some((start, end))
    }

    /// Text of a 1-based line, if it is valid UTF-8.
    pub fn line_text<'a>(
        &self,
        line1: usize,
        text: &'a str,
    ) -> Option<&'a str>
    {
        let (s, e) = self.line_span(line1, text.as_bytes())?;
        text.get(s..e)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn counts_lines_with_and_without_trailing_newline()
    {
        assert_eq!(NewlineIndex::build(b"").line_count(), 0);
        assert_eq!(NewlineIndex::build(b"a").line_count(), 1);
        assert_eq!(NewlineIndex::build(b"a\n").line_count(), 1);
        assert_eq!(NewlineIndex::build(b"a\nb").line_count(), 2);
        assert_eq!(NewlineIndex::build(b"a\n\n").line_count(), 2);
    }

    #[test]
    fn line_text_strips_crlf()
    {
        let text = "int a;\r\nint b;\r\n";
        let idx = NewlineIndex::build(text.as_bytes());

        assert_eq!(idx.line_text(1, text), Some("int a;"));
        assert_eq!(idx.line_text(2, text), Some("int b;"));
        assert_eq!(idx.line_text(3, text), None);
        assert_eq!(idx.line_text(0, text), None);
    }
}
