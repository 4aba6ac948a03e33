//! Normalized document text

use std::borrow::Cow;

/// Line that opens and closes the schema section
pub(crate) const DELIMITER: &str = "---";

/// A document with `\r\n` and lone `\r` line endings turned into `\n`
#[derive(Debug, Clone)]
pub(crate) struct Source<'a> {
    text: Cow<'a, str>,
}

impl<'a> Source<'a> {
    pub fn new(raw: &'a str) -> Self {
        let text = if raw.contains('\r') {
            Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
        } else {
            Cow::Borrowed(raw)
        };
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Document lines; line `i` is diagnostic line `i`
    pub fn lines(&self) -> Vec<&str> {
        self.text.split('\n').collect()
    }

    /// Index of the line closing the schema section
    ///
    /// `None` when the document does not open with a delimiter line or the
    /// section is never closed.
    pub fn frontmatter_end(&self) -> Option<usize> {
        frontmatter_end(&self.lines())
    }

    /// Split into the schema section (both delimiter lines included) and the
    /// remaining body, which starts with the newline after the closing line
    pub fn split_frontmatter(&self) -> Option<(&str, &str)> {
        let end_line = self.frontmatter_end()?;
        let offset: usize = self
            .text
            .split('\n')
            .take(end_line + 1)
            .map(|line| line.len() + 1)
            .sum::<usize>()
            - 1;
        Some(self.text.split_at(offset.min(self.text.len())))
    }
}

pub(crate) fn frontmatter_end(lines: &[&str]) -> Option<usize> {
    if lines.first().copied() != Some(DELIMITER) {
        return None;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| **line == DELIMITER)
        .map(|(i, _)| i)
}
