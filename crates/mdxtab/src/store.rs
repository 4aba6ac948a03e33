//! Row storage for one compile pass
//!
//! Rows live in per-table arenas addressed by index. Computed columns are
//! filled in lazily: a row is materialized the first time it is needed, either
//! by the compiler's sweep over every table or by a lookup from another row.
//! The per-row state vector makes materialization idempotent and catches
//! lookup chains that come back to a row still being computed.

use ahash::AHashMap;
use mdxtab_core::{Diagnostic, DiagnosticRange, DiagnosticResult, Row, Scalar};
use mdxtab_formula::{
    evaluate, AggregateFunction, EvaluationContext, Expr, FormulaError, FormulaResult,
};
use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowState {
    Pending,
    Visiting,
    Done,
}

/// A computed column ready for evaluation
#[derive(Debug, Clone)]
pub(crate) struct ComputedExpr {
    pub name: String,
    pub expr: Expr,
}

/// Input rows of one table, after coercion and key checks
#[derive(Debug, Clone)]
pub(crate) struct TableData {
    pub name: String,
    /// Declared and computed column names, for aggregate argument checks
    pub columns: Vec<String>,
    /// Computed columns in evaluation order
    pub computed: Vec<ComputedExpr>,
    pub rows: Vec<Row>,
    /// Textual key of each row
    pub keys: Vec<String>,
    /// Source range of each row
    pub ranges: Vec<DiagnosticRange>,
}

#[derive(Debug)]
struct StoredTable {
    name: String,
    columns: Vec<String>,
    computed: Vec<ComputedExpr>,
    rows: RefCell<Vec<Row>>,
    states: RefCell<Vec<RowState>>,
    index: AHashMap<String, usize>,
    keys: Vec<String>,
    ranges: Vec<DiagnosticRange>,
}

impl StoredTable {
    fn label(&self, row: usize) -> String {
        format!("{}[{}]", self.name, self.keys[row])
    }
}

/// Arena of every table's rows
#[derive(Debug)]
pub(crate) struct RowStore {
    tables: Vec<StoredTable>,
    by_name: AHashMap<String, usize>,
    /// `table[key]` labels of the rows being materialized, outermost first
    path: RefCell<Vec<String>>,
}

impl RowStore {
    pub fn new(tables: Vec<TableData>) -> Self {
        let by_name = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        let tables = tables
            .into_iter()
            .map(|t| {
                let index = t
                    .keys
                    .iter()
                    .enumerate()
                    .map(|(i, k)| (k.clone(), i))
                    .collect();
                StoredTable {
                    states: RefCell::new(vec![RowState::Pending; t.rows.len()]),
                    rows: RefCell::new(t.rows),
                    name: t.name,
                    columns: t.columns,
                    computed: t.computed,
                    index,
                    keys: t.keys,
                    ranges: t.ranges,
                }
            })
            .collect();

        Self {
            tables,
            by_name,
            path: RefCell::new(Vec::new()),
        }
    }

    fn table_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Materialize every row of every table, in declaration order
    pub fn materialize_all(&self) -> DiagnosticResult<()> {
        for (t, table) in self.tables.iter().enumerate() {
            for r in 0..table.keys.len() {
                self.materialize(t, r)?;
            }
        }
        Ok(())
    }

    /// Fill in the computed columns of one row
    ///
    /// A no-op for rows that are already done. Errors carry the table,
    /// column, row key and row range of the row being computed.
    fn materialize(&self, t: usize, r: usize) -> DiagnosticResult<()> {
        let table = &self.tables[t];
        let state = table.states.borrow()[r];
        match state {
            RowState::Done => return Ok(()),
            RowState::Visiting => return Err(self.cycle_error(table.label(r)).into()),
            RowState::Pending => {}
        }

        tracing::trace!(row = %table.label(r), "materializing row");
        table.states.borrow_mut()[r] = RowState::Visiting;
        self.path.borrow_mut().push(table.label(r));

        // The row leaves the arena while its expressions run so lookups into
        // the same table can borrow the arena again.
        let mut row = std::mem::take(&mut table.rows.borrow_mut()[r]);
        let result: DiagnosticResult<()> = table.computed.iter().try_for_each(|column| {
            let value = evaluate(
                &column.expr,
                &MaterializeContext {
                    store: self,
                    row: &row,
                },
            )
            .map_err(|err| {
                Diagnostic::from(err)
                    .or_table(&table.name)
                    .or_column(&column.name)
                    .or_row_key(&table.keys[r])
                    .or_range(Some(table.ranges[r]))
            })?;
            row.insert(column.name.as_str(), value);
            Ok(())
        });

        table.rows.borrow_mut()[r] = row;
        self.path.borrow_mut().pop();
        table.states.borrow_mut()[r] = if result.is_ok() {
            RowState::Done
        } else {
            RowState::Pending
        };
        result
    }

    fn cycle_error(&self, label: String) -> FormulaError {
        let path = self.path.borrow();
        let start = path.iter().position(|p| *p == label).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..].to_vec();
        cycle.push(label);
        FormulaError::LookupCycle { path: cycle }
    }

    /// Materialized copy of the row of `table` with key text `key`
    fn lookup(&self, table: &str, key: &Scalar) -> FormulaResult<Row> {
        let key = key.to_string();
        let t = self
            .table_index(table)
            .ok_or_else(|| FormulaError::Lookup(format!("unknown table {}", table)))?;
        let r = self.tables[t]
            .index
            .get(&key)
            .copied()
            .ok_or_else(|| FormulaError::Lookup(format!("missing row {}[{}]", table, key)))?;

        tracing::trace!(target_row = %self.tables[t].label(r), "lookup");
        self.materialize(t, r).map_err(FormulaError::from)?;
        Ok(self.tables[t].rows.borrow()[r].clone())
    }

    /// Materialized rows of a table
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.table_index(table)
            .map(|t| self.tables[t].rows.borrow().clone())
            .unwrap_or_default()
    }

    /// Evaluate an aggregate expression over the whole table
    pub fn aggregate(&self, table: &str, expr: &Expr) -> FormulaResult<Scalar> {
        let t = self
            .table_index(table)
            .ok_or_else(|| FormulaError::Lookup(format!("unknown table {}", table)))?;
        let rows: Vec<usize> = (0..self.tables[t].keys.len()).collect();
        evaluate(expr, &AggregateContext { store: self, table: t, rows: &rows })
    }

    /// Evaluate an aggregate expression once per distinct value of `column`
    ///
    /// Groups are keyed by the value's textual form and keep the order in
    /// which their first row appears.
    pub fn aggregate_groups(
        &self,
        table: &str,
        column: &str,
        expr: &Expr,
    ) -> FormulaResult<Vec<(String, Scalar)>> {
        let t = self
            .table_index(table)
            .ok_or_else(|| FormulaError::Lookup(format!("unknown table {}", table)))?;

        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        {
            let rows = self.tables[t].rows.borrow();
            for (i, row) in rows.iter().enumerate() {
                let key = row.get(column).cloned().unwrap_or(Scalar::Null).to_string();
                match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, members)) => members.push(i),
                    None => groups.push((key, vec![i])),
                }
            }
        }

        groups
            .into_iter()
            .map(|(key, members)| {
                let ctx = AggregateContext {
                    store: self,
                    table: t,
                    rows: &members,
                };
                evaluate(expr, &ctx).map(|value| (key, value))
            })
            .collect()
    }
}

/// Context of a row being materialized
struct MaterializeContext<'a> {
    store: &'a RowStore,
    row: &'a Row,
}

impl EvaluationContext for MaterializeContext<'_> {
    fn resolve(&self, name: &str) -> Option<Scalar> {
        self.row.get(name).cloned()
    }

    fn lookup(&self, table: &str, key: &Scalar) -> FormulaResult<Row> {
        self.store.lookup(table, key)
    }

    fn aggregate(&self, function: AggregateFunction, _column: &str) -> FormulaResult<Scalar> {
        Err(FormulaError::AggregateInRow {
            function: function.name().to_string(),
        })
    }
}

/// Context of an aggregate: no current row, a set of rows to fold
struct AggregateContext<'a> {
    store: &'a RowStore,
    table: usize,
    rows: &'a [usize],
}

impl EvaluationContext for AggregateContext<'_> {
    fn resolve(&self, _name: &str) -> Option<Scalar> {
        None
    }

    fn lookup(&self, table: &str, key: &Scalar) -> FormulaResult<Row> {
        self.store.lookup(table, key)
    }

    fn aggregate(&self, function: AggregateFunction, column: &str) -> FormulaResult<Scalar> {
        let table = &self.store.tables[self.table];
        if !table.columns.iter().any(|c| c == column) {
            return Err(FormulaError::UnknownReference(column.to_string()));
        }
        let values: Vec<Scalar> = {
            let rows = table.rows.borrow();
            self.rows
                .iter()
                .map(|&i| rows[i].get(column).cloned().unwrap_or(Scalar::Null))
                .collect()
        };
        function.apply(&values)
    }
}
