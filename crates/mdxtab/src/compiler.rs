//! Document compilation
//!
//! Ties the passes together: schema and markdown tables are parsed
//! independently and cross-checked, cells are coerced, computed columns are
//! materialized through the [`RowStore`](crate::store), aggregates are folded
//! and the body is re-rendered with aggregate values interpolated.
//!
//! Compilation is fail-fast: the first diagnostic wins.
//!
//! # Example
//!
//! ```rust
//! use mdxtab::{compile, CompileOptions};
//! use mdxtab_core::Scalar;
//!
//! let doc = concat!(
//!     "---\n",
//!     "mdxtab: \"1.0\"\n",
//!     "tables:\n",
//!     "  items:\n",
//!     "    columns: [id, price]\n",
//!     "    aggregates:\n",
//!     "      total: sum(price)\n",
//!     "---\n",
//!     "\n",
//!     "### items\n",
//!     "| id | price |\n",
//!     "|----|-------|\n",
//!     "| a  | 3     |\n",
//!     "| b  | 4     |\n",
//!     "\n",
//!     "Total: {{ items.total }}\n",
//! );
//!
//! let result = compile(doc, &CompileOptions::default()).unwrap();
//! let items = result.table("items").unwrap();
//! assert_eq!(items.aggregates.get("total"), Some(&Scalar::Number(7.0)));
//! assert!(result.rendered.ends_with("Total: 7\n"));
//! ```

use crate::coerce::coerce_cell;
use crate::markdown::{parse_markdown_tables, ParsedTable};
use crate::render::interpolate;
use crate::schema::{parse_schema, Schema, Section, TableSchema};
use crate::source::Source;
use crate::store::{ComputedExpr, RowStore, TableData};
use ahash::AHashSet;
use mdxtab_core::{Diagnostic, DiagnosticCode, DiagnosticRange, DiagnosticResult, Row, Scalar};
use mdxtab_formula::{parse_expression, validate_aggregate_calls, DependencyGraph, Expr, FormulaError};
use serde::{Serialize, Serializer};

/// Options for a compile call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Echo the schema section at the top of the rendered document
    pub include_frontmatter: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            include_frontmatter: true,
        }
    }
}

/// A `... by <column>` aggregate: one value per group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedAggregate {
    pub name: String,
    /// Group key → value, in first-appearance order
    pub groups: Vec<(String, Scalar)>,
}

impl GroupedAggregate {
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.groups.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl Serialize for GroupedAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.groups.iter().map(|(k, v)| (k, v)))
    }
}

/// Evaluated table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResult {
    #[serde(skip)]
    pub name: String,
    /// Rows with computed columns filled in
    pub rows: Vec<Row>,
    /// Ungrouped aggregates by name
    pub aggregates: Row,
    #[serde(serialize_with = "serialize_grouped")]
    pub grouped_aggregates: Vec<GroupedAggregate>,
}

impl TableResult {
    /// Grouped aggregate by name
    pub fn grouped(&self, name: &str) -> Option<&GroupedAggregate> {
        self.grouped_aggregates.iter().find(|g| g.name == name)
    }
}

/// Output of a successful compile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileResult {
    pub schema: Schema,
    #[serde(serialize_with = "serialize_tables")]
    pub tables: Vec<TableResult>,
    pub rendered: String,
}

impl CompileResult {
    pub fn table(&self, name: &str) -> Option<&TableResult> {
        self.tables.iter().find(|t| t.name == name)
    }
}

fn serialize_grouped<S: Serializer>(
    grouped: &[GroupedAggregate],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(grouped.iter().map(|g| (&g.name, g)))
}

fn serialize_tables<S: Serializer>(tables: &[TableResult], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(tables.iter().map(|t| (&t.name, t)))
}

/// Parsed aggregate of one table
struct AggregatePlan {
    name: String,
    expr: Expr,
    group_by: Option<String>,
}

/// Compile a document
pub fn compile(raw: &str, options: &CompileOptions) -> DiagnosticResult<CompileResult> {
    let source = Source::new(raw);
    let text = source.text();

    let schema = parse_schema(text)?;
    let parsed = parse_markdown_tables(text)?;
    let pairs = match_tables(&schema, parsed)?;

    let mut data = Vec::with_capacity(pairs.len());
    let mut plans = Vec::with_capacity(pairs.len());
    for (table_schema, table) in &pairs {
        check_headers(&schema, table_schema, table)?;
        let (rows, keys, ranges) = coerce_rows(table_schema, table)?;
        let computed = plan_computed(&schema, table_schema)?;
        let aggregates = plan_aggregates(&schema, table_schema)?;

        tracing::debug!(
            table = %table_schema.name,
            rows = rows.len(),
            order = ?computed.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "prepared table"
        );

        let mut columns = table_schema.columns.clone();
        columns.extend(table_schema.computed.iter().map(|c| c.name.clone()));
        data.push(TableData {
            name: table_schema.name.clone(),
            columns,
            computed,
            rows,
            keys,
            ranges,
        });
        plans.push(aggregates);
    }

    let store = RowStore::new(data);
    store.materialize_all()?;

    let mut tables = Vec::with_capacity(pairs.len());
    for ((table_schema, _), aggregates) in pairs.iter().zip(plans) {
        let result = evaluate_aggregates(&schema, &store, table_schema, aggregates)?;
        tracing::debug!(
            table = %result.name,
            aggregates = result.aggregates.len(),
            grouped = result.grouped_aggregates.len(),
            "computed aggregates"
        );
        tables.push(result);
    }
    drop(pairs);

    let (frontmatter, body) = source
        .split_frontmatter()
        .ok_or_else(|| Diagnostic::new(DiagnosticCode::Frontmatter, "Closing --- for frontmatter not found"))?;
    let body = interpolate(body, schema.end_line, &tables)?;
    let rendered = if options.include_frontmatter {
        format!("{}{}", frontmatter, body)
    } else {
        body
    };

    Ok(CompileResult {
        schema,
        tables,
        rendered,
    })
}

/// Check a document, returning the first failure if any
///
/// Compilation stops at the first error, so at most one diagnostic is
/// returned even when the document has several independent problems.
pub fn validate(raw: &str) -> Vec<Diagnostic> {
    match compile(raw, &CompileOptions::default()) {
        Ok(_) => Vec::new(),
        Err(diag) => vec![diag],
    }
}

/// Compile a document and return only the rendered text
pub fn render(raw: &str, options: &CompileOptions) -> DiagnosticResult<String> {
    compile(raw, options).map(|result| result.rendered)
}

/// Pair every schema table with exactly one markdown table, in schema order
fn match_tables<'s>(
    schema: &'s Schema,
    parsed: Vec<ParsedTable>,
) -> DiagnosticResult<Vec<(&'s TableSchema, ParsedTable)>> {
    let mut seen = AHashSet::new();
    for table in &parsed {
        if schema.table(&table.name).is_none() {
            return Err(Diagnostic::new(
                DiagnosticCode::Table,
                format!("Markdown table {} not declared in frontmatter", table.name),
            )
            .with_table(table.name.as_str())
            .with_range(table.range()));
        }
        if !seen.insert(table.name.as_str()) {
            return Err(Diagnostic::new(
                DiagnosticCode::Table,
                format!("Duplicate table {} in markdown", table.name),
            )
            .with_table(table.name.as_str())
            .with_range(table.range()));
        }
    }

    let mut parsed = parsed;
    let mut pairs = Vec::with_capacity(schema.tables.len());
    for table_schema in &schema.tables {
        let position = parsed.iter().position(|t| t.name == table_schema.name);
        let table = match position {
            Some(i) => parsed.swap_remove(i),
            None => {
                return Err(Diagnostic::new(
                    DiagnosticCode::Table,
                    format!("Missing markdown table for {}", table_schema.name),
                )
                .with_table(table_schema.name.as_str())
                .or_range(schema.table_range(&table_schema.name)))
            }
        };
        pairs.push((table_schema, table));
    }
    Ok(pairs)
}

fn check_headers(schema: &Schema, table_schema: &TableSchema, table: &ParsedTable) -> DiagnosticResult<()> {
    let name = table_schema.name.as_str();

    for (i, header) in table.headers.iter().enumerate() {
        match table_schema.columns.get(i) {
            Some(expected) if *expected == header.trimmed => {}
            Some(expected) => {
                return Err(Diagnostic::new(
                    DiagnosticCode::ColumnMismatch,
                    format!(
                        "Header mismatch for table {}: expected {}, got {}",
                        name, expected, header.trimmed
                    ),
                )
                .with_table(name)
                .with_column(expected.as_str())
                .with_range(header.range()))
            }
            None => {
                return Err(Diagnostic::new(
                    DiagnosticCode::ColumnMismatch,
                    format!("Header mismatch for table {}: unexpected column {}", name, header.trimmed),
                )
                .with_table(name)
                .with_range(header.range()))
            }
        }
    }
    if let Some(missing) = table_schema.columns.get(table.headers.len()) {
        return Err(Diagnostic::new(
            DiagnosticCode::ColumnMismatch,
            format!("Header column count mismatch for table {}: missing {}", name, missing),
        )
        .with_table(name)
        .with_column(missing.as_str())
        .with_range(table.header_range));
    }

    if !table_schema.has_column(&table_schema.key) {
        return Err(Diagnostic::new(
            DiagnosticCode::KeyColumn,
            format!("Key column {} is not declared for table {}", table_schema.key, name),
        )
        .with_table(name)
        .with_column(table_schema.key.as_str())
        .or_range(schema.table_range(name)));
    }
    Ok(())
}

type CoercedRows = (Vec<Row>, Vec<String>, Vec<DiagnosticRange>);

fn coerce_rows(table_schema: &TableSchema, table: &ParsedTable) -> DiagnosticResult<CoercedRows> {
    let name = table_schema.name.as_str();
    let mut rows = Vec::with_capacity(table.rows.len());
    let mut keys: Vec<String> = Vec::with_capacity(table.rows.len());
    let mut ranges = Vec::with_capacity(table.rows.len());
    let mut seen = AHashSet::new();

    for source_row in &table.rows {
        let mut row = Row::with_capacity(table_schema.columns.len() + table_schema.computed.len());
        for (i, column) in table_schema.columns.iter().enumerate() {
            let raw = source_row.cells.get(i).map_or("", |c| c.raw.as_str());
            let value = coerce_cell(raw, table_schema.column_type(column), table_schema.empty_cells)
                .map_err(|d| {
                    d.with_table(name)
                        .with_column(column.as_str())
                        .with_range(source_row.cell_range(i))
                })?;
            row.insert(column.as_str(), value);
        }

        let key = match row.get(&table_schema.key) {
            None | Some(Scalar::Null) => None,
            Some(value) => Some(value.to_string()).filter(|k| !k.is_empty()),
        };
        let key = key.ok_or_else(|| {
            Diagnostic::new(
                DiagnosticCode::Key,
                format!("Missing key value in table {}", name),
            )
            .with_table(name)
            .with_column(table_schema.key.as_str())
            .with_range(source_row.range())
        })?;
        if !seen.insert(key.clone()) {
            return Err(Diagnostic::new(
                DiagnosticCode::KeyDuplicate,
                format!("Duplicate key {} in table {}", key, name),
            )
            .with_table(name)
            .with_row_key(key.as_str())
            .with_range(source_row.range()));
        }

        rows.push(row);
        keys.push(key);
        ranges.push(source_row.range());
    }

    Ok((rows, keys, ranges))
}

/// Parse a table's computed columns and put them in evaluation order
fn plan_computed(schema: &Schema, table_schema: &TableSchema) -> DiagnosticResult<Vec<ComputedExpr>> {
    let name = table_schema.name.as_str();
    let entry_error = |err: FormulaError, column: &str| {
        Diagnostic::from(err)
            .or_table(name)
            .or_column(column)
            .or_range(schema.entry_range(name, Section::Computed, column))
    };

    let mut parsed: Vec<(&str, Expr)> = Vec::with_capacity(table_schema.computed.len());
    for column in &table_schema.computed {
        let expr = parse_expression(&column.expression)
            .and_then(|expr| validate_aggregate_calls(&expr).map(|_| expr))
            .map_err(|e| entry_error(e, &column.name))?;
        parsed.push((column.name.as_str(), expr));
    }

    let graph = DependencyGraph::build(parsed.iter().map(|(n, e)| (*n, e))).map_err(|e| {
        let first = match &e {
            FormulaError::Cycle { path } => path.first().cloned(),
            _ => None,
        };
        match first {
            Some(column) => entry_error(e, &column),
            None => Diagnostic::from(e).or_table(name),
        }
    })?;

    let order = graph.order();
    let mut ordered = Vec::with_capacity(order.len());
    for column in order {
        if let Some(i) = parsed.iter().position(|(n, _)| *n == column.as_str()) {
            let (n, expr) = parsed.swap_remove(i);
            ordered.push(ComputedExpr {
                name: n.to_string(),
                expr,
            });
        }
    }
    Ok(ordered)
}

fn plan_aggregates(schema: &Schema, table_schema: &TableSchema) -> DiagnosticResult<Vec<AggregatePlan>> {
    let name = table_schema.name.as_str();
    table_schema
        .aggregates
        .iter()
        .map(|def| {
            let range = schema.entry_range(name, Section::Aggregates, &def.name);
            let enrich = |d: Diagnostic| d.or_table(name).or_aggregate(&def.name).or_range(range);

            let expr = parse_expression(&def.expression)
                .and_then(|expr| validate_aggregate_calls(&expr).map(|_| expr))
                .map_err(|e| enrich(Diagnostic::from(e)))?;

            if let Some(column) = &def.group_by {
                if !table_schema.has_column(column) && !table_schema.has_computed(column) {
                    return Err(enrich(Diagnostic::new(
                        DiagnosticCode::Reference,
                        format!(
                            "Unknown group column {} for aggregate {}.{}",
                            column, name, def.name
                        ),
                    )));
                }
            }

            Ok(AggregatePlan {
                name: def.name.clone(),
                expr,
                group_by: def.group_by.clone(),
            })
        })
        .collect()
}

fn evaluate_aggregates(
    schema: &Schema,
    store: &RowStore,
    table_schema: &TableSchema,
    plans: Vec<AggregatePlan>,
) -> DiagnosticResult<TableResult> {
    let name = table_schema.name.as_str();
    let mut aggregates = Row::with_capacity(plans.len());
    let mut grouped_aggregates = Vec::new();

    for plan in plans {
        let enrich = |e: FormulaError| {
            Diagnostic::from(e)
                .or_table(name)
                .or_aggregate(&plan.name)
                .or_range(schema.entry_range(name, Section::Aggregates, &plan.name))
        };
        match &plan.group_by {
            None => {
                let value = store.aggregate(name, &plan.expr).map_err(enrich)?;
                aggregates.insert(plan.name.as_str(), value);
            }
            Some(column) => {
                let groups = store
                    .aggregate_groups(name, column, &plan.expr)
                    .map_err(enrich)?;
                grouped_aggregates.push(GroupedAggregate {
                    name: plan.name.clone(),
                    groups,
                });
            }
        }
    }

    Ok(TableResult {
        name: name.to_string(),
        rows: store.rows(name),
        aggregates,
        grouped_aggregates,
    })
}
