//! Markdown table extraction
//!
//! Finds pipe tables in the document body. A table is a pipe row immediately
//! followed by a separator row (`|---|:---:|`), then every consecutive pipe
//! row as data. The closest preceding heading names the table.

use crate::source::{frontmatter_end, Source};
use lazy_regex::{regex_captures, regex_is_match};
use mdxtab_core::{Diagnostic, DiagnosticCode, DiagnosticRange, DiagnosticResult};

/// A header cell
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    /// Text between the pipes, spacing preserved
    pub raw: String,
    pub trimmed: String,
    pub line: usize,
    /// Character offsets of `raw` within the line
    pub start: usize,
    pub end: usize,
}

impl HeaderCell {
    pub fn range(&self) -> DiagnosticRange {
        DiagnosticRange::span(self.line, self.start, self.end)
    }
}

/// A data cell
#[derive(Debug, Clone, PartialEq)]
pub struct DataCell {
    pub raw: String,
    pub start: usize,
    pub end: usize,
}

impl DataCell {
    pub fn text(&self) -> &str {
        self.raw.trim()
    }

    /// Character span of the trimmed text, or of the whole cell when empty
    pub fn text_span(&self) -> (usize, usize) {
        let text = self.text();
        if text.is_empty() {
            return (self.start, self.end);
        }
        let leading = self.raw.chars().take_while(|c| c.is_whitespace()).count();
        let start = self.start + leading;
        (start, start + text.chars().count())
    }
}

/// A data row
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: Vec<DataCell>,
    pub line: usize,
    /// Length of the source line in characters
    pub length: usize,
}

impl TableRow {
    pub fn range(&self) -> DiagnosticRange {
        DiagnosticRange::span(self.line, 0, self.length)
    }

    pub fn cell_range(&self, index: usize) -> DiagnosticRange {
        match self.cells.get(index) {
            Some(cell) => {
                let (start, end) = cell.text_span();
                DiagnosticRange::span(self.line, start, end)
            }
            None => self.range(),
        }
    }
}

/// A table found in the body
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub name: String,
    /// Range of the heading that named the table
    pub heading: Option<DiagnosticRange>,
    /// Range of the whole header line
    pub header_range: DiagnosticRange,
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<TableRow>,
}

impl ParsedTable {
    /// Heading range, or the header line for unnamed tables
    pub fn range(&self) -> DiagnosticRange {
        self.heading.unwrap_or(self.header_range)
    }
}

/// Tracks fenced code blocks line by line
///
/// A line starting with three or more backticks opens a fence; a line of at
/// least as many backticks and nothing else closes it.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    open: Option<usize>,
}

impl FenceTracker {
    /// Feed one line; returns true if the line belongs to a fence,
    /// delimiters included
    pub fn consume(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        let ticks = trimmed.chars().take_while(|c| *c == '`').count();

        match self.open {
            Some(opening) => {
                if ticks >= opening && ticks == trimmed.len() {
                    self.open = None;
                }
                true
            }
            None if ticks >= 3 => {
                self.open = Some(ticks);
                true
            }
            None => false,
        }
    }
}

/// Extract the markdown tables of a document
///
/// The schema section is skipped; line numbers stay absolute.
pub fn parse_markdown_tables(raw: &str) -> DiagnosticResult<Vec<ParsedTable>> {
    let source = Source::new(raw);
    let lines = source.lines();
    let first = frontmatter_end(&lines).map_or(0, |end| end + 1);

    let mut tables: Vec<ParsedTable> = Vec::new();
    let mut heading: Option<(String, DiagnosticRange)> = None;
    let mut fence = FenceTracker::default();

    let mut i = first;
    while i < lines.len() {
        let line = lines[i];
        if fence.consume(line) {
            i += 1;
            continue;
        }

        let trimmed = line.trim();
        if let Some((_, text)) = regex_captures!(r"^#+\s+(.*)$", trimmed) {
            heading = Some((text.trim().to_string(), DiagnosticRange::line(i, line)));
            i += 1;
            continue;
        }

        let starts_table = is_pipe_row(trimmed)
            && lines
                .get(i + 1)
                .map_or(false, |next| is_separator(next.trim()));
        if !starts_table {
            i += 1;
            continue;
        }

        let headers = split_cells(line)
            .into_iter()
            .map(|(raw, start, end)| HeaderCell {
                trimmed: raw.trim().to_string(),
                raw,
                line: i,
                start,
                end,
            })
            .collect::<Vec<_>>();

        let (name, heading_range) = match heading.take() {
            Some((name, range)) => (name, Some(range)),
            None => (format!("table{}", tables.len() + 1), None),
        };

        let mut rows = Vec::new();
        let mut j = i + 2;
        while j < lines.len() && is_pipe_row(lines[j].trim()) {
            let row_line = lines[j];
            let range = DiagnosticRange::line(j, row_line);
            let cells: Vec<DataCell> = split_cells(row_line)
                .into_iter()
                .map(|(raw, start, end)| DataCell { raw, start, end })
                .collect();

            if cells.iter().any(|c| c.raw.contains('\t')) {
                return Err(Diagnostic::new(
                    DiagnosticCode::TableTab,
                    "Tab characters are not allowed in data cells",
                )
                .with_table(name.as_str())
                .with_range(range));
            }
            if cells.len() != headers.len() {
                return Err(Diagnostic::new(
                    DiagnosticCode::TableColumnCount,
                    format!(
                        "Row has {} columns but the header has {}",
                        cells.len(),
                        headers.len()
                    ),
                )
                .with_table(name.as_str())
                .with_range(range));
            }

            rows.push(TableRow {
                cells,
                line: j,
                length: row_line.chars().count(),
            });
            j += 1;
        }

        tracing::trace!(table = %name, line = i, rows = rows.len(), "found markdown table");
        tables.push(ParsedTable {
            name,
            heading: heading_range,
            header_range: DiagnosticRange::line(i, line),
            headers,
            rows,
        });
        i = j;
    }

    Ok(tables)
}

fn is_pipe_row(trimmed: &str) -> bool {
    trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
}

fn is_separator(trimmed: &str) -> bool {
    if !is_pipe_row(trimmed) {
        return false;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    inner
        .split('|')
        .all(|cell| regex_is_match!(r"^:?-{3,}:?$", cell.trim()))
}

/// Cells of a pipe row with their character offsets in `line`
fn split_cells(line: &str) -> Vec<(String, usize, usize)> {
    let leading = line.chars().take_while(|c| c.is_whitespace()).count();
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix('|')
        .and_then(|s| s.strip_suffix('|'))
        .unwrap_or(trimmed);

    let mut cells = Vec::new();
    let mut pos = leading + 1;
    for raw in inner.split('|') {
        let len = raw.chars().count();
        cells.push((raw.to_string(), pos, pos + len));
        pos += len + 1;
    }
    cells
}
