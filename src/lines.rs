//! Logical-line reader for makefile fragments: strips `#` comments and joins
//! backslash-continued physical lines.

use std::io::BufRead;

/// Reads logical lines from a makefile stream, one at a time.
///
/// Any content after the first unescaped `#` on a physical line is dropped.
/// A trailing backslash joins the next physical line, with the backslash
/// replaced by a space. `next_line` returns `Ok(None)` at end of stream,
/// including mid-continuation, since a dangling continuation simply closes
/// the logical line rather than erroring.
pub struct LineReader<R: BufRead> {
    read: R,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(read: R) -> Self {
        Self { read }
    }

    /// Reads the next logical line, or `None` at end of stream.
    pub fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let mut logical = String::new();
        loop {
            let mut physical = String::new();
            let n = self.read.read_line(&mut physical)?;
            if n == 0 {
                if logical.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(logical));
            }
            let physical = physical.trim_end_matches(['\n', '\r']);
            let physical = strip_comment(physical);
            if let Some(stripped) = physical.strip_suffix('\\') {
                logical.push_str(stripped);
                logical.push(' ');
            } else {
                logical.push_str(physical);
                return Ok(Some(logical));
            }
        }
    }
}

/// Drops everything from the first `#` to the end of the line.
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines(input: &str) -> Vec<String> {
        LineReader::new(Cursor::new(input)).collect()
    }

    #[test]
    fn strips_trailing_comment() {
        assert_eq!(lines("obj-y += a.o # comment\n"), vec!["obj-y += a.o "]);
    }

    #[test]
    fn joins_continuation() {
        assert_eq!(
            lines("obj-y += a.o \\\n\tb.o\n"),
            vec!["obj-y += a.o  \tb.o"]
        );
    }

    #[test]
    fn dangling_continuation_closes_at_eof() {
        assert_eq!(lines("obj-y += a.o \\\n"), vec!["obj-y += a.o "]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(lines("").is_empty());
    }

    #[test]
    fn multiple_lines() {
        assert_eq!(lines("a\nb\nc\n"), vec!["a", "b", "c"]);
    }
}
