//! Physical → logical line assembly for load files.
//!
//! A logical line is produced by stripping comments, joining
//! backslash-continued physical lines and finally resolving escapes. Escaped
//! characters are kept as [`Glyph`]s flagged `literal`, so the tokenizer can
//! tell an escaped `:` or `'` apart from a separator or quote.

use std::io::BufRead;

use crate::acctree::tools::error::Result;

/// Character that starts a comment.
pub const COMMENT: char = '#';
/// Escape and continuation character.
pub const ESCAPE: char = '\\';

/// One character of a logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub ch: char,
    /// Set when the character was escaped in the source.
    pub literal: bool,
}

impl Glyph {
    pub fn plain(ch: char) -> Self {
        Self { ch, literal: false }
    }

    /// Whether this is the unescaped character `ch`.
    pub fn is(&self, ch: char) -> bool {
        !self.literal && self.ch == ch
    }
}

/// A comment-stripped, continuation-joined, escape-resolved line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// 1-based number of the first physical line.
    pub number: usize,
    /// Number of physical lines joined into this one.
    pub consumed: usize,
    pub glyphs: Vec<Glyph>,
}

impl LogicalLine {
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|glyph| glyph.ch).collect()
    }

    pub fn is_blank(&self) -> bool {
        self.glyphs
            .iter()
            .all(|glyph| !glyph.literal && glyph.ch.is_whitespace())
    }
}

/// Iterator assembling logical lines out of a buffered reader.
///
/// Blank lines are yielded as well; callers skip them.
pub struct LineAssembler<R> {
    reader: R,
    physical: usize,
    done: bool,
}

impl<R: BufRead> LineAssembler<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            physical: 0,
            done: false,
        }
    }

    /// Number of physical lines consumed so far.
    pub fn physical_lines(&self) -> usize {
        self.physical
    }

    fn next_physical(&mut self) -> Result<Option<String>> {
        let mut buffer = String::new();
        if self.reader.read_line(&mut buffer)? == 0 {
            self.done = true;
            return Ok(None);
        }
        self.physical += 1;
        while buffer.ends_with('\n') || buffer.ends_with('\r') {
            buffer.pop();
        }
        Ok(Some(buffer))
    }

    /// Reads the next logical line, or `None` at end of input.
    pub fn read_logical_line(&mut self) -> Result<Option<LogicalLine>> {
        if self.done {
            return Ok(None);
        }
        let Some(first) = self.next_physical()? else {
            return Ok(None);
        };

        let number = self.physical;
        let mut consumed = 1;
        let mut raw = String::new();
        let mut segment = trim_unescaped_end(strip_comment(&first)).to_string();

        loop {
            let trailing = segment.chars().rev().take_while(|ch| *ch == ESCAPE).count();
            if trailing % 2 == 0 {
                raw.push_str(&segment);
                break;
            }
            segment.pop();
            raw.push_str(&segment);
            match self.next_physical()? {
                Some(next) => {
                    consumed += 1;
                    segment = trim_unescaped_end(strip_comment(&next)).to_string();
                }
                None => break,
            }
        }

        Ok(Some(LogicalLine {
            number,
            consumed,
            glyphs: unescape(&raw),
        }))
    }
}

impl<R: BufRead> Iterator for LineAssembler<R> {
    type Item = Result<LogicalLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_logical_line().transpose()
    }
}

/// Drops everything from the first unescaped comment character onward.
pub fn strip_comment(line: &str) -> &str {
    let mut chars = line.char_indices();
    while let Some((index, ch)) = chars.next() {
        if ch == ESCAPE {
            chars.next();
        } else if ch == COMMENT {
            return &line[..index];
        }
    }
    line
}

/// Trims trailing whitespace unless it is escaped.
fn trim_unescaped_end(line: &str) -> &str {
    let mut end = line.len();
    while let Some(ch) = line[..end].chars().next_back() {
        if !ch.is_whitespace() {
            break;
        }
        let before = &line[..end - ch.len_utf8()];
        let escapes = before.chars().rev().take_while(|c| *c == ESCAPE).count();
        if escapes % 2 == 1 {
            break;
        }
        end -= ch.len_utf8();
    }
    &line[..end]
}

/// Resolves `\x` to a literal `x`. A trailing lone backslash is dropped.
pub fn unescape(raw: &str) -> Vec<Glyph> {
    let mut glyphs = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == ESCAPE {
            if let Some(escaped) = chars.next() {
                glyphs.push(Glyph {
                    ch: escaped,
                    literal: true,
                });
            }
        } else {
            glyphs.push(Glyph::plain(ch));
        }
    }
    glyphs
}

/// Inverse of [`unescape`] for values written by the serializer: prefixes
/// comment, quote and backslash characters with a backslash.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, COMMENT | '\'' | '"' | ESCAPE) {
            escaped.push(ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}
