//! Diagnostics
//!
//! A [`Diagnostic`] is the single error type that crosses the document
//! compiler boundary. It carries a stable code, a human message and as much
//! location context (table, column, aggregate, row key, source range) as the
//! failing layer could supply.

use std::fmt;
use thiserror::Error;

/// Result type for operations that fail with a diagnostic
pub type DiagnosticResult<T> = std::result::Result<T, Diagnostic>;

/// Stable, machine-checkable diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DiagnosticCode {
    /// Cycle between computed columns of one table
    #[cfg_attr(feature = "serde", serde(rename = "E_CYCLE"))]
    Cycle,
    /// Lookup chain that returns to a row still being materialized
    #[cfg_attr(feature = "serde", serde(rename = "E_LOOKUP_CYCLE"))]
    LookupCycle,
    /// Aggregate call whose argument is not a single column identifier
    #[cfg_attr(feature = "serde", serde(rename = "E_AGG_ARGUMENT"))]
    AggregateArgument,
    /// Unknown aggregate reference in the document body
    #[cfg_attr(feature = "serde", serde(rename = "E_AGG_REF"))]
    AggregateReference,
    /// Aggregate call inside a computed column
    #[cfg_attr(feature = "serde", serde(rename = "E_AGG_IN_ROW"))]
    AggregateInRow,
    /// Missing, duplicate or undeclared table
    #[cfg_attr(feature = "serde", serde(rename = "E_TABLE"))]
    Table,
    /// Tab character inside a data cell
    #[cfg_attr(feature = "serde", serde(rename = "E_TABLE_TAB"))]
    TableTab,
    /// Data row with a different cell count than the header
    #[cfg_attr(feature = "serde", serde(rename = "E_TABLE_COLUMN_COUNT"))]
    TableColumnCount,
    /// Markdown header does not match the schema columns
    #[cfg_attr(feature = "serde", serde(rename = "E_COLUMN_MISMATCH"))]
    ColumnMismatch,
    /// Key column not among the declared columns
    #[cfg_attr(feature = "serde", serde(rename = "E_KEY_COLUMN"))]
    KeyColumn,
    /// Row without a key value
    #[cfg_attr(feature = "serde", serde(rename = "E_KEY"))]
    Key,
    /// Duplicate key within a table
    #[cfg_attr(feature = "serde", serde(rename = "E_KEY_DUP"))]
    KeyDuplicate,
    /// Type mismatch
    #[cfg_attr(feature = "serde", serde(rename = "E_TYPE"))]
    Type,
    /// Division by zero
    #[cfg_attr(feature = "serde", serde(rename = "E_DIV_ZERO"))]
    DivideByZero,
    /// Unknown column or field reference
    #[cfg_attr(feature = "serde", serde(rename = "E_REF"))]
    Reference,
    /// Lookup of an unknown table or missing row
    #[cfg_attr(feature = "serde", serde(rename = "E_LOOKUP"))]
    Lookup,
    /// Unknown function
    #[cfg_attr(feature = "serde", serde(rename = "E_FUNC"))]
    Function,
    /// Unsupported operator
    #[cfg_attr(feature = "serde", serde(rename = "E_OP"))]
    Operator,
    /// Wrong number of function arguments
    #[cfg_attr(feature = "serde", serde(rename = "E_ARG"))]
    Argument,
    /// Malformed schema section
    #[cfg_attr(feature = "serde", serde(rename = "E_FRONTMATTER"))]
    Frontmatter,
    /// Empty cell in a table whose policy forbids it
    #[cfg_attr(feature = "serde", serde(rename = "E_EMPTY_CELL"))]
    EmptyCell,
    /// Invalid character in an expression
    #[cfg_attr(feature = "serde", serde(rename = "E_LEX"))]
    Lex,
    /// Malformed expression
    #[cfg_attr(feature = "serde", serde(rename = "E_PARSE"))]
    Parse,
    /// Anything without a recognizable code
    #[cfg_attr(feature = "serde", serde(rename = "E_UNKNOWN"))]
    Unknown,
}

impl DiagnosticCode {
    /// All codes, in declaration order
    pub const ALL: [DiagnosticCode; 24] = [
        DiagnosticCode::Cycle,
        DiagnosticCode::LookupCycle,
        DiagnosticCode::AggregateArgument,
        DiagnosticCode::AggregateReference,
        DiagnosticCode::AggregateInRow,
        DiagnosticCode::Table,
        DiagnosticCode::TableTab,
        DiagnosticCode::TableColumnCount,
        DiagnosticCode::ColumnMismatch,
        DiagnosticCode::KeyColumn,
        DiagnosticCode::Key,
        DiagnosticCode::KeyDuplicate,
        DiagnosticCode::Type,
        DiagnosticCode::DivideByZero,
        DiagnosticCode::Reference,
        DiagnosticCode::Lookup,
        DiagnosticCode::Function,
        DiagnosticCode::Operator,
        DiagnosticCode::Argument,
        DiagnosticCode::Frontmatter,
        DiagnosticCode::EmptyCell,
        DiagnosticCode::Lex,
        DiagnosticCode::Parse,
        DiagnosticCode::Unknown,
    ];

    /// The code as it appears in output (`E_...`)
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::Cycle => "E_CYCLE",
            DiagnosticCode::LookupCycle => "E_LOOKUP_CYCLE",
            DiagnosticCode::AggregateArgument => "E_AGG_ARGUMENT",
            DiagnosticCode::AggregateReference => "E_AGG_REF",
            DiagnosticCode::AggregateInRow => "E_AGG_IN_ROW",
            DiagnosticCode::Table => "E_TABLE",
            DiagnosticCode::TableTab => "E_TABLE_TAB",
            DiagnosticCode::TableColumnCount => "E_TABLE_COLUMN_COUNT",
            DiagnosticCode::ColumnMismatch => "E_COLUMN_MISMATCH",
            DiagnosticCode::KeyColumn => "E_KEY_COLUMN",
            DiagnosticCode::Key => "E_KEY",
            DiagnosticCode::KeyDuplicate => "E_KEY_DUP",
            DiagnosticCode::Type => "E_TYPE",
            DiagnosticCode::DivideByZero => "E_DIV_ZERO",
            DiagnosticCode::Reference => "E_REF",
            DiagnosticCode::Lookup => "E_LOOKUP",
            DiagnosticCode::Function => "E_FUNC",
            DiagnosticCode::Operator => "E_OP",
            DiagnosticCode::Argument => "E_ARG",
            DiagnosticCode::Frontmatter => "E_FRONTMATTER",
            DiagnosticCode::EmptyCell => "E_EMPTY_CELL",
            DiagnosticCode::Lex => "E_LEX",
            DiagnosticCode::Parse => "E_PARSE",
            DiagnosticCode::Unknown => "E_UNKNOWN",
        }
    }

    /// Parse an `E_...` code
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == code)
    }

    /// Extract the first `E_...` code mentioned in free text
    ///
    /// Falls back to [`DiagnosticCode::Unknown`] when the text carries no
    /// recognizable code.
    pub fn from_message(message: &str) -> Self {
        lazy_regex::regex_find!(r"\bE_[A-Z0-9_]+\b", message)
            .and_then(Self::parse)
            .unwrap_or(DiagnosticCode::Unknown)
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// A zero-based line/character position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DiagnosticPosition {
    pub line: usize,
    pub character: usize,
}

impl DiagnosticPosition {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// A source span, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DiagnosticRange {
    pub start: DiagnosticPosition,
    pub end: DiagnosticPosition,
}

impl DiagnosticRange {
    /// Create a range from explicit positions
    pub fn new(start: DiagnosticPosition, end: DiagnosticPosition) -> Self {
        Self { start, end }
    }

    /// A span within a single line
    pub fn span(line: usize, start: usize, end: usize) -> Self {
        Self::new(
            DiagnosticPosition::new(line, start),
            DiagnosticPosition::new(line, end),
        )
    }

    /// A whole line, given its text
    pub fn line(line: usize, text: &str) -> Self {
        Self::span(line, 0, text.chars().count())
    }
}

/// A single positioned compilation failure
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[error("[{code}] {message}")]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub severity: Severity,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub table: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub column: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub aggregate: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub row_key: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub range: Option<DiagnosticRange>,
}

impl Diagnostic {
    /// Create an error diagnostic with no location context
    pub fn new<S: Into<String>>(code: DiagnosticCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
            table: None,
            column: None,
            aggregate: None,
            row_key: None,
            range: None,
        }
    }

    /// Create a diagnostic whose code is taken from the message text
    pub fn from_message<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        Self::new(DiagnosticCode::from_message(&message), message)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_table<S: Into<String>>(mut self, table: S) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_column<S: Into<String>>(mut self, column: S) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_aggregate<S: Into<String>>(mut self, aggregate: S) -> Self {
        self.aggregate = Some(aggregate.into());
        self
    }

    pub fn with_row_key<S: Into<String>>(mut self, row_key: S) -> Self {
        self.row_key = Some(row_key.into());
        self
    }

    pub fn with_range(mut self, range: DiagnosticRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Set the table unless a more specific layer already did
    pub fn or_table(mut self, table: &str) -> Self {
        self.table.get_or_insert_with(|| table.to_string());
        self
    }

    /// Set the column unless a more specific layer already did
    pub fn or_column(mut self, column: &str) -> Self {
        self.column.get_or_insert_with(|| column.to_string());
        self
    }

    /// Set the aggregate unless a more specific layer already did
    pub fn or_aggregate(mut self, aggregate: &str) -> Self {
        self.aggregate.get_or_insert_with(|| aggregate.to_string());
        self
    }

    /// Set the row key unless a more specific layer already did
    pub fn or_row_key(mut self, row_key: &str) -> Self {
        self.row_key.get_or_insert_with(|| row_key.to_string());
        self
    }

    /// Set the range unless a more specific layer already did
    pub fn or_range(mut self, range: Option<DiagnosticRange>) -> Self {
        if self.range.is_none() {
            self.range = range;
        }
        self
    }

    /// `table=..., column=..., ...` context suffix for terminal output
    pub fn context_label(&self) -> Option<String> {
        let parts: Vec<String> = [
            ("table", &self.table),
            ("column", &self.column),
            ("aggregate", &self.aggregate),
            ("row", &self.row_key),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}={}", label, v)))
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_round_trip_names() {
        for code in DiagnosticCode::ALL {
            assert_eq!(DiagnosticCode::parse(code.as_str()), Some(code));
        }
    }

    #[test]
    fn test_code_from_message() {
        assert_eq!(
            DiagnosticCode::from_message("E_AGG_IN_ROW: aggregates not allowed in row evaluation"),
            DiagnosticCode::AggregateInRow
        );
        assert_eq!(
            DiagnosticCode::from_message("lookup failed (E_LOOKUP)"),
            DiagnosticCode::Lookup
        );
        assert_eq!(
            DiagnosticCode::from_message("Closing --- for frontmatter not found"),
            DiagnosticCode::Unknown
        );
        assert_eq!(
            DiagnosticCode::from_message("E_NOT_A_CODE happened"),
            DiagnosticCode::Unknown
        );
    }

    #[test]
    fn test_display() {
        let diag = Diagnostic::new(DiagnosticCode::DivideByZero, "division by zero");
        assert_eq!(diag.to_string(), "[E_DIV_ZERO] division by zero");
        assert_eq!(diag.severity, Severity::Error);
    }

    #[test]
    fn test_fill_does_not_overwrite() {
        let inner = DiagnosticRange::span(12, 2, 8);
        let diag = Diagnostic::new(DiagnosticCode::Lookup, "missing row")
            .with_table("rates")
            .with_range(inner)
            .or_table("expenses")
            .or_column("tax")
            .or_range(Some(DiagnosticRange::span(3, 0, 1)));

        assert_eq!(diag.table.as_deref(), Some("rates"));
        assert_eq!(diag.column.as_deref(), Some("tax"));
        assert_eq!(diag.range, Some(inner));
    }

    #[test]
    fn test_context_label() {
        let diag = Diagnostic::new(DiagnosticCode::Type, "bad")
            .with_table("expenses")
            .with_row_key("h1");
        assert_eq!(diag.context_label().as_deref(), Some("table=expenses, row=h1"));
        assert_eq!(Diagnostic::new(DiagnosticCode::Type, "bad").context_label(), None);
    }

    #[test]
    fn test_line_range_counts_chars() {
        let range = DiagnosticRange::line(4, "| é | 1 |");
        assert_eq!(range.start, DiagnosticPosition::new(4, 0));
        assert_eq!(range.end, DiagnosticPosition::new(4, 9));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_camel_case() {
        let diag = Diagnostic::new(DiagnosticCode::KeyDuplicate, "Duplicate key h1")
            .with_table("expenses")
            .with_row_key("h1");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "E_KEY_DUP",
                "message": "Duplicate key h1",
                "severity": "error",
                "table": "expenses",
                "rowKey": "h1"
            })
        );
    }
}
