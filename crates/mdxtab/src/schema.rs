//! Document schema
//!
//! The schema lives in a YAML section at the top of the document, between two
//! `---` lines:
//!
//! ```yaml
//! mdxtab: "1.0"
//! tables:
//!   expenses:
//!     key: id
//!     columns: [id, category, net]
//!     types:
//!       net: number
//!     computed:
//!       tax: net * rates[category].rate
//!     aggregates:
//!       total_net: sum(net)
//!       net_by_category: sum(net) by category
//!     empty_cells: zero
//! ```
//!
//! Parsing goes through `serde_yaml::Value` so that table, column and entry
//! order survive. Every failure is an `E_FRONTMATTER` diagnostic pointing at
//! the offending line when it can be located.

use crate::source::{Source, DELIMITER};
use lazy_regex::regex_captures;
use mdxtab_core::{Diagnostic, DiagnosticCode, DiagnosticRange, DiagnosticResult};
use serde::{Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

/// The only supported dialect version
pub const DIALECT_VERSION: &str = "1.0";

/// Key column used when a table does not name one
pub const DEFAULT_KEY: &str = "id";

/// Declared type of a markdown column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    String,
    Date,
    Bool,
}

impl ColumnType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "number" => Some(ColumnType::Number),
            "string" => Some(ColumnType::String),
            "date" => Some(ColumnType::Date),
            "bool" => Some(ColumnType::Bool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Date => "date",
            ColumnType::Bool => "bool",
        }
    }
}

/// What an empty markdown cell becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyCellPolicy {
    #[default]
    Null,
    Zero,
    EmptyString,
    /// Empty cells are rejected
    Error,
}

impl EmptyCellPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "null" => Some(EmptyCellPolicy::Null),
            "zero" => Some(EmptyCellPolicy::Zero),
            "empty-string" => Some(EmptyCellPolicy::EmptyString),
            "error" => Some(EmptyCellPolicy::Error),
            _ => None,
        }
    }
}

/// A computed column: a per-row expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedColumn {
    pub name: String,
    pub expression: String,
}

/// A table-level aggregate, optionally evaluated once per group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDefinition {
    pub name: String,
    pub expression: String,
    /// Column whose distinct values define the groups (`... by <column>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
}

impl AggregateDefinition {
    /// Split the ` by <column>` suffix off an aggregate entry
    pub fn parse<N: Into<String>>(name: N, source: &str) -> Self {
        let (expression, group_by) =
            match regex_captures!(r"^(.*\S)\s+by\s+([A-Za-z_][A-Za-z0-9_]*)\s*$", source) {
                Some((_, expression, column)) => (expression.to_string(), Some(column.to_string())),
                None => (source.trim().to_string(), None),
            };
        Self {
            name: name.into(),
            expression,
            group_by,
        }
    }
}

/// Schema of one table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    /// Declared markdown columns, in header order
    pub columns: Vec<String>,
    pub key: String,
    #[serde(serialize_with = "serialize_pairs")]
    pub types: Vec<(String, ColumnType)>,
    pub computed: Vec<ComputedColumn>,
    pub aggregates: Vec<AggregateDefinition>,
    pub empty_cells: EmptyCellPolicy,
}

impl TableSchema {
    /// Create a table with the default key and no typed, computed or
    /// aggregate entries
    pub fn new<N: Into<String>>(name: N, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            key: DEFAULT_KEY.to_string(),
            types: Vec::new(),
            computed: Vec::new(),
            aggregates: Vec::new(),
            empty_cells: EmptyCellPolicy::default(),
        }
    }

    /// Declared type of a column
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.types
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| *ty)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn has_computed(&self, column: &str) -> bool {
        self.computed.iter().any(|c| c.name == column)
    }
}

/// Section of a table entry, for locating it in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Types,
    Computed,
    Aggregates,
}

impl Section {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "types" => Some(Section::Types),
            "computed" => Some(Section::Computed),
            "aggregates" => Some(Section::Aggregates),
            _ => None,
        }
    }
}

/// Source ranges of schema entries
#[derive(Debug, Clone, Default, PartialEq)]
struct SourceMap {
    tables: HashMap<String, DiagnosticRange>,
    entries: HashMap<(String, Section, String), DiagnosticRange>,
}

/// Parsed schema section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    #[serde(rename = "mdxtab")]
    pub version: String,
    #[serde(serialize_with = "serialize_tables")]
    pub tables: Vec<TableSchema>,
    /// Line of the closing delimiter
    #[serde(skip)]
    pub end_line: usize,
    #[serde(skip)]
    source_map: SourceMap,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Range of a table's entry under `tables:`
    pub fn table_range(&self, table: &str) -> Option<DiagnosticRange> {
        self.source_map.tables.get(table).copied()
    }

    /// Range of a `types`, `computed` or `aggregates` entry, falling back to
    /// the table's range
    pub fn entry_range(&self, table: &str, section: Section, name: &str) -> Option<DiagnosticRange> {
        self.source_map
            .entries
            .get(&(table.to_string(), section, name.to_string()))
            .copied()
            .or_else(|| self.table_range(table))
    }
}

/// Parse the schema section of a document
pub fn parse_schema(raw: &str) -> DiagnosticResult<Schema> {
    let source = Source::new(raw);
    let lines = source.lines();

    if lines.first().copied() != Some(DELIMITER) {
        return Err(frontmatter_error("Frontmatter must start with ---").with_range(
            DiagnosticRange::line(0, lines.first().copied().unwrap_or_default()),
        ));
    }
    let end_line = source.frontmatter_end().ok_or_else(|| {
        frontmatter_error("Closing --- for frontmatter not found")
            .with_range(DiagnosticRange::line(0, DELIMITER))
    })?;

    let yaml_lines = &lines[1..end_line];
    let yaml_text = yaml_lines.join("\n");
    let source_map = locate_entries(yaml_lines, 1);

    let root: Value = serde_yaml::from_str(&yaml_text).map_err(|e| {
        let diag = frontmatter_error(format!("Invalid YAML: {}", e));
        match e.location() {
            // Locations are one-based; the YAML starts on document line 1
            Some(loc) => {
                let line = loc.line().max(1);
                let character = loc.column().saturating_sub(1);
                diag.with_range(DiagnosticRange::span(line, character, character + 1))
            }
            None => diag.with_range(DiagnosticRange::line(0, DELIMITER)),
        }
    })?;

    let mut builder = SchemaBuilder {
        source_map,
        end_line,
    };
    builder.build(&root)
}

struct SchemaBuilder {
    source_map: SourceMap,
    end_line: usize,
}

impl SchemaBuilder {
    fn build(&mut self, root: &Value) -> DiagnosticResult<Schema> {
        let root = expect_mapping(root, "frontmatter root")?;

        let version = match root.get("mdxtab") {
            Some(Value::String(v)) => v.clone(),
            Some(_) | None => return Err(frontmatter_error("Invalid mdxtab version: expected string")),
        };
        if version != DIALECT_VERSION {
            return Err(frontmatter_error(format!(
                "Unsupported mdxtab version: {}",
                version
            )));
        }

        let tables_value = root
            .get("tables")
            .ok_or_else(|| frontmatter_error("Invalid tables: expected object"))?;
        let tables_map = expect_mapping(tables_value, "tables")?;

        let mut tables = Vec::with_capacity(tables_map.len());
        for (name, value) in tables_map {
            let name = key_string(name)
                .ok_or_else(|| frontmatter_error("Invalid table name: expected string"))?;
            let table = self
                .build_table(&name, value)
                .map_err(|d| d.or_table(&name).or_range(self.source_map.tables.get(&name).copied()))?;
            tables.push(table);
        }

        Ok(Schema {
            version,
            tables,
            end_line: self.end_line,
            source_map: std::mem::take(&mut self.source_map),
        })
    }

    fn build_table(&self, name: &str, value: &Value) -> DiagnosticResult<TableSchema> {
        let obj = expect_mapping(value, &format!("table {}", name))?;

        let columns = expect_string_list(obj.get("columns"), &format!("columns for table {}", name))?;
        let mut seen: Vec<&str> = Vec::with_capacity(columns.len());
        for column in &columns {
            if seen.contains(&column.as_str()) {
                return Err(frontmatter_error(format!(
                    "Duplicate column {} in table {}",
                    column, name
                ))
                .with_column(column.as_str()));
            }
            seen.push(column);
        }

        let mut table = TableSchema::new(name, columns);

        match obj.get("key") {
            None => {}
            Some(Value::String(key)) => table.key = key.clone(),
            Some(_) => {
                return Err(frontmatter_error(format!(
                    "Invalid key for table {}: expected string",
                    name
                )))
            }
        }

        for (column, ty) in self.entries(obj, name, Section::Types)? {
            let parsed = ty.as_str().and_then(ColumnType::parse).ok_or_else(|| {
                self.entry_error(
                    name,
                    Section::Types,
                    &column,
                    format!("Invalid type for {}.{}: {}", name, column, describe(ty)),
                )
            })?;
            if !table.has_column(&column) {
                return Err(self.entry_error(
                    name,
                    Section::Types,
                    &column,
                    format!("Type declared for unknown column {}.{}", name, column),
                ));
            }
            table.types.push((column, parsed));
        }

        for (column, expr) in self.entries(obj, name, Section::Computed)? {
            let expression = self.entry_string(name, Section::Computed, &column, expr, "computed expression")?;
            if table.has_column(&column) {
                return Err(self.entry_error(
                    name,
                    Section::Computed,
                    &column,
                    format!(
                        "Computed column {}.{} collides with a declared column",
                        name, column
                    ),
                ));
            }
            table.computed.push(ComputedColumn {
                name: column,
                expression,
            });
        }

        for (aggregate, expr) in self.entries(obj, name, Section::Aggregates)? {
            let text = self.entry_string(name, Section::Aggregates, &aggregate, expr, "aggregate expression")?;
            table.aggregates.push(AggregateDefinition::parse(aggregate, &text));
        }

        match obj.get("empty_cells") {
            None | Some(Value::Null) => {}
            Some(value) => {
                table.empty_cells = value
                    .as_str()
                    .and_then(EmptyCellPolicy::parse)
                    .ok_or_else(|| {
                        frontmatter_error(format!(
                            "Invalid empty_cells value for table {}: {}",
                            name,
                            describe(value)
                        ))
                    })?;
            }
        }

        Ok(table)
    }

    /// Entries of an optional `types` / `computed` / `aggregates` mapping
    fn entries<'v>(
        &self,
        obj: &'v Mapping,
        table: &str,
        section: Section,
    ) -> DiagnosticResult<Vec<(String, &'v Value)>> {
        let key = match section {
            Section::Types => "types",
            Section::Computed => "computed",
            Section::Aggregates => "aggregates",
        };
        let map = match obj.get(key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(value) => expect_mapping(value, &format!("{} for table {}", key, table))?,
        };

        map.iter()
            .map(|(k, v)| {
                key_string(k)
                    .map(|k| (k, v))
                    .ok_or_else(|| frontmatter_error(format!("Invalid {} for table {}: expected string keys", key, table)))
            })
            .collect()
    }

    fn entry_string(
        &self,
        table: &str,
        section: Section,
        name: &str,
        value: &Value,
        what: &str,
    ) -> DiagnosticResult<String> {
        value.as_str().map(str::to_string).ok_or_else(|| {
            self.entry_error(
                table,
                section,
                name,
                format!("Invalid {} for {}.{}: expected string", what, table, name),
            )
        })
    }

    fn entry_error(&self, table: &str, section: Section, name: &str, message: String) -> Diagnostic {
        let diag = frontmatter_error(message);
        let diag = match section {
            Section::Aggregates => diag.with_aggregate(name),
            Section::Types | Section::Computed => diag.with_column(name),
        };
        let range = self
            .source_map
            .entries
            .get(&(table.to_string(), section, name.to_string()))
            .copied();
        diag.or_range(range)
    }
}

fn frontmatter_error<S: Into<String>>(message: S) -> Diagnostic {
    Diagnostic::new(DiagnosticCode::Frontmatter, message)
}

fn expect_mapping<'v>(value: &'v Value, context: &str) -> DiagnosticResult<&'v Mapping> {
    value
        .as_mapping()
        .ok_or_else(|| frontmatter_error(format!("Invalid {}: expected object", context)))
}

fn expect_string_list(value: Option<&Value>, context: &str) -> DiagnosticResult<Vec<String>> {
    let items = value
        .and_then(Value::as_sequence)
        .ok_or_else(|| frontmatter_error(format!("Invalid {}: expected array of strings", context)))?;

    let strings = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| frontmatter_error(format!("Invalid {}: expected array of strings", context)))?;

    if strings.is_empty() {
        return Err(frontmatter_error(format!("Invalid {}: must not be empty", context)));
    }
    Ok(strings)
}

/// Mapping keys are usually strings; plain scalars like `2024` are accepted
fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(tagged) => describe(&tagged.value),
    }
}

/// Find the lines of table entries and of their `types` / `computed` /
/// `aggregates` entries by indentation. Flow-style mappings are not located;
/// their diagnostics fall back to the table line.
fn locate_entries(lines: &[&str], first_line: usize) -> SourceMap {
    let mut map = SourceMap::default();

    let mut in_tables = false;
    let mut table_indent: Option<usize> = None;
    let mut table: Option<String> = None;
    let mut section_indent: Option<usize> = None;
    let mut section: Option<Section> = None;
    let mut entry_indent: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - trimmed.len();
        let key = match yaml_key(trimmed) {
            Some(key) => key,
            None => continue,
        };
        let range = DiagnosticRange::line(first_line + i, line);

        if indent == 0 {
            in_tables = key == "tables";
            table = None;
            continue;
        }
        if !in_tables {
            continue;
        }

        let table_level = *table_indent.get_or_insert(indent);
        if indent < table_level {
            continue;
        }
        if indent == table_level {
            map.tables.insert(key.to_string(), range);
            table = Some(key.to_string());
            section_indent = None;
            section = None;
            continue;
        }

        let table_name = match &table {
            Some(name) => name,
            None => continue,
        };

        match section_indent {
            Some(level) if indent > level => {
                let entry_level = *entry_indent.get_or_insert(indent);
                if let (Some(section), true) = (section, indent == entry_level) {
                    map.entries
                        .insert((table_name.clone(), section, key.to_string()), range);
                }
            }
            _ => {
                section_indent = Some(indent);
                section = Section::from_key(key);
                entry_indent = None;
            }
        }
    }

    map
}

/// Key of a block mapping line (`name:` or `"quoted name":`)
fn yaml_key(line: &str) -> Option<&str> {
    let (_, double, single, plain) = regex_captures!(
        r#"^(?:"([^"]*)"|'([^']*)'|([^\s:#'"\-][^:#]*?))\s*:(?:\s|$)"#,
        line
    )?;
    [double, single, plain].into_iter().find(|k| !k.is_empty())
}

fn serialize_pairs<S, V>(pairs: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    serializer.collect_map(pairs.iter().map(|(k, v)| (k, v)))
}

fn serialize_tables<S: Serializer>(tables: &[TableSchema], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(tables.iter().map(|t| (&t.name, t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdxtab_core::DiagnosticPosition;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"---
mdxtab: "1.0"
tables:
  rates:
    columns: [id, rate]
    types:
      rate: number
  expenses:
    key: code
    columns: [code, category, net]
    computed:
      tax: net * rates[category].rate
      gross: net + tax
    aggregates:
      total_net: sum(net)
      net_by_category: sum(net) by category
    empty_cells: zero
---

Body
"#;

    #[test]
    fn test_parse_schema() {
        let schema = parse_schema(DOC).unwrap();
        assert_eq!(schema.version, "1.0");
        assert_eq!(schema.end_line, 17);

        let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rates", "expenses"]);

        let rates = schema.table("rates").unwrap();
        assert_eq!(rates.key, "id");
        assert_eq!(rates.column_type("rate"), Some(ColumnType::Number));
        assert_eq!(rates.column_type("id"), None);
        assert_eq!(rates.empty_cells, EmptyCellPolicy::Null);

        let expenses = schema.table("expenses").unwrap();
        assert_eq!(expenses.key, "code");
        assert_eq!(expenses.columns, vec!["code", "category", "net"]);
        assert_eq!(
            expenses.computed,
            vec![
                ComputedColumn {
                    name: "tax".into(),
                    expression: "net * rates[category].rate".into()
                },
                ComputedColumn {
                    name: "gross".into(),
                    expression: "net + tax".into()
                },
            ]
        );
        assert_eq!(expenses.aggregates[0].group_by, None);
        assert_eq!(
            expenses.aggregates[1],
            AggregateDefinition {
                name: "net_by_category".into(),
                expression: "sum(net)".into(),
                group_by: Some("category".into()),
            }
        );
        assert_eq!(expenses.empty_cells, EmptyCellPolicy::Zero);
    }

    #[test]
    fn test_source_ranges() {
        let schema = parse_schema(DOC).unwrap();
        assert_eq!(schema.table_range("rates").unwrap().start.line, 3);
        assert_eq!(schema.table_range("expenses").unwrap().start.line, 7);
        assert_eq!(
            schema
                .entry_range("expenses", Section::Computed, "gross")
                .unwrap()
                .start
                .line,
            12
        );
        assert_eq!(
            schema
                .entry_range("expenses", Section::Aggregates, "net_by_category")
                .unwrap()
                .start
                .line,
            15
        );
        assert_eq!(schema.entry_range("rates", Section::Types, "rate").unwrap().start.line, 6);
        // Unknown entries fall back to the table line
        assert_eq!(
            schema.entry_range("rates", Section::Computed, "nope").unwrap().start.line,
            3
        );
    }

    #[test]
    fn test_missing_delimiters() {
        let err = parse_schema("# Title\n").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Frontmatter);
        assert_eq!(err.message, "Frontmatter must start with ---");
        assert_eq!(err.range.unwrap().start, DiagnosticPosition::new(0, 0));

        let err = parse_schema("---\nmdxtab: \"1.0\"\n").unwrap_err();
        assert_eq!(err.message, "Closing --- for frontmatter not found");
        assert_eq!(err.range.unwrap().start.line, 0);
    }

    #[test]
    fn test_crlf() {
        let doc = DOC.replace('\n', "\r\n");
        let schema = parse_schema(&doc).unwrap();
        assert_eq!(schema.tables.len(), 2);
    }

    #[test]
    fn test_version() {
        let err = parse_schema("---\nmdxtab: \"2.0\"\ntables: {}\n---\n").unwrap_err();
        assert_eq!(err.message, "Unsupported mdxtab version: 2.0");

        let err = parse_schema("---\nmdxtab: 1.0\ntables: {}\n---\n").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Frontmatter);

        let err = parse_schema("---\ntables: {}\n---\n").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Frontmatter);
    }

    #[test]
    fn test_yaml_error_location() {
        let err = parse_schema("---\nmdxtab: \"1.0\"\ntables: [\n---\n").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Frontmatter);
        assert!(err.message.starts_with("Invalid YAML"));
        let line = err.range.unwrap().start.line;
        assert!((1..=3).contains(&line), "line {}", line);
    }

    #[test]
    fn test_shape_errors() {
        let cases = [
            ("tables:\n  t:\n    columns: []\n", "must not be empty"),
            ("tables:\n  t:\n    columns: [id, 2]\n", "expected array of strings"),
            ("tables:\n  t:\n    columns: [id, id]\n", "Duplicate column id"),
            ("tables:\n  t:\n    columns: [id]\n    key: [id]\n", "Invalid key"),
            (
                "tables:\n  t:\n    columns: [id]\n    types:\n      id: integer\n",
                "Invalid type for t.id: integer",
            ),
            (
                "tables:\n  t:\n    columns: [id]\n    types:\n      net: number\n",
                "Type declared for unknown column t.net",
            ),
            (
                "tables:\n  t:\n    columns: [id, net]\n    computed:\n      net: id * 2\n",
                "collides with a declared column",
            ),
            (
                "tables:\n  t:\n    columns: [id]\n    computed:\n      x: 2\n",
                "Invalid computed expression for t.x",
            ),
            (
                "tables:\n  t:\n    columns: [id]\n    empty_cells: blank\n",
                "Invalid empty_cells value for table t: blank",
            ),
            ("tables:\n  t: 3\n", "Invalid table t: expected object"),
            ("tables: [a]\n", "Invalid tables: expected object"),
        ];

        for (yaml, expected) in cases {
            let doc = format!("---\nmdxtab: \"1.0\"\n{}---\n", yaml);
            let err = parse_schema(&doc).unwrap_err();
            assert_eq!(err.code, DiagnosticCode::Frontmatter, "{}", yaml);
            assert!(
                err.message.contains(expected),
                "{:?} does not contain {:?}",
                err.message,
                expected
            );
        }
    }

    #[test]
    fn test_shape_error_ranges() {
        let doc = "---\nmdxtab: \"1.0\"\ntables:\n  t:\n    columns: [id]\n    computed:\n      x: 2\n---\n";
        let err = parse_schema(doc).unwrap_err();
        assert_eq!(err.table.as_deref(), Some("t"));
        assert_eq!(err.column.as_deref(), Some("x"));
        assert_eq!(err.range.unwrap().start.line, 6);

        let doc = "---\nmdxtab: \"1.0\"\ntables:\n  t:\n    columns: []\n---\n";
        let err = parse_schema(doc).unwrap_err();
        assert_eq!(err.range.unwrap().start.line, 3);
    }

    #[test]
    fn test_null_empty_cells_is_default() {
        let doc = "---\nmdxtab: \"1.0\"\ntables:\n  t:\n    columns: [id]\n    empty_cells: null\n---\n";
        let schema = parse_schema(doc).unwrap();
        assert_eq!(schema.tables[0].empty_cells, EmptyCellPolicy::Null);
    }

    #[test]
    fn test_aggregate_group_suffix() {
        let agg = AggregateDefinition::parse("a", "  count(id)  ");
        assert_eq!(agg.expression, "count(id)");
        assert_eq!(agg.group_by, None);

        let agg = AggregateDefinition::parse("b", "round(avg(hours), 1) by  project ");
        assert_eq!(agg.expression, "round(avg(hours), 1)");
        assert_eq!(agg.group_by.as_deref(), Some("project"));
    }

    #[test]
    fn test_yaml_key() {
        assert_eq!(yaml_key("tables:"), Some("tables"));
        assert_eq!(yaml_key("tax: net * 2"), Some("tax"));
        assert_eq!(yaml_key("\"my table\":"), Some("my table"));
        assert_eq!(yaml_key("- id"), None);
        assert_eq!(yaml_key("plain text"), None);
    }

    #[test]
    fn test_serialize() {
        let schema = parse_schema(DOC).unwrap();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["mdxtab"], "1.0");
        assert_eq!(json["tables"]["rates"]["types"]["rate"], "number");
        assert_eq!(json["tables"]["expenses"]["emptyCells"], "zero");
        assert_eq!(
            json["tables"]["expenses"]["aggregates"][1]["groupBy"],
            "category"
        );
    }
}
