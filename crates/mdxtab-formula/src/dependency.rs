//! Dependency ordering for computed columns
//!
//! A table's computed columns may reference each other. The graph collects
//! those references, validates aggregate calls along the way and produces an
//! evaluation order in which every column comes after the columns it reads.

use crate::ast::Expr;
use crate::error::{FormulaError, FormulaResult};
use crate::functions::AggregateFunction;
use std::collections::HashMap;

/// `to` reads the value of `from`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Precedent
    pub from: String,
    /// Dependent
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Dependency graph of one table's computed columns
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: Vec<DependencyEdge>,
    order: Vec<String>,
    /// Column → columns it reads, in first-reference order
    precedents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build the graph and its evaluation order
    ///
    /// `nodes` are the computed columns in declaration order. References to
    /// names outside the node set (plain columns, unknown names) are not
    /// edges; the evaluator reports those.
    ///
    /// # Example
    /// ```rust
    /// use mdxtab_formula::{parse_expression, DependencyGraph};
    ///
    /// let c = parse_expression("b + 1").unwrap();
    /// let b = parse_expression("a * 2").unwrap();
    /// let graph = DependencyGraph::build([("c", &c), ("b", &b)]).unwrap();
    /// assert_eq!(graph.order(), ["b", "c"]);
    /// ```
    pub fn build<'a, I>(nodes: I) -> FormulaResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a Expr)>,
    {
        let nodes: Vec<(&str, &Expr)> = nodes.into_iter().collect();
        let names: Vec<&str> = nodes.iter().map(|(name, _)| *name).collect();

        let mut graph = DependencyGraph::default();
        for (name, expr) in &nodes {
            let mut refs = Vec::new();
            collect_references(expr, &mut refs)?;

            let mut deps: Vec<String> = Vec::new();
            for r in refs {
                if names.contains(&r.as_str()) && !deps.contains(&r) {
                    graph.edges.push(DependencyEdge {
                        from: r.clone(),
                        to: name.to_string(),
                    });
                    deps.push(r);
                }
            }
            graph.precedents.insert(name.to_string(), deps);
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut order = Vec::with_capacity(names.len());
        for &name in &names {
            graph.visit(name, &mut marks, &mut stack, &mut order)?;
        }
        graph.order = order;

        tracing::trace!(order = ?graph.order, "computed column order");
        Ok(graph)
    }

    fn visit<'g>(
        &'g self,
        name: &'g str,
        marks: &mut HashMap<&'g str, Mark>,
        stack: &mut Vec<&'g str>,
        order: &mut Vec<String>,
    ) -> FormulaResult<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                path.push(name.to_string());
                return Err(FormulaError::Cycle { path });
            }
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        stack.push(name);

        if let Some(deps) = self.precedents.get(name) {
            for dep in deps {
                self.visit(dep, marks, stack, order)?;
            }
        }

        stack.pop();
        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    /// Evaluation order; every column follows its precedents
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// All edges, grouped by dependent in declaration order
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Columns that `name` reads
    pub fn precedents(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        self.precedents
            .get(name)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Columns that read `name`
    pub fn dependents<'g>(&'g self, name: &'g str) -> impl Iterator<Item = &'g str> + 'g {
        self.edges
            .iter()
            .filter(move |e| e.from == name)
            .map(|e| e.to.as_str())
    }
}

/// Check every aggregate call in an expression
///
/// `sum`, `avg`, `min`, `max` and `count` take exactly one argument, a bare
/// column identifier.
pub fn validate_aggregate_calls(expr: &Expr) -> FormulaResult<()> {
    collect_references(expr, &mut Vec::new())
}

fn collect_references(expr: &Expr, refs: &mut Vec<String>) -> FormulaResult<()> {
    match expr {
        Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) => Ok(()),
        Expr::Identifier(name) => {
            refs.push(name.clone());
            Ok(())
        }
        Expr::Unary { operand, .. } => collect_references(operand, refs),
        Expr::Binary { left, right, .. } => {
            collect_references(left, refs)?;
            collect_references(right, refs)
        }
        Expr::Call { name, args } => {
            if AggregateFunction::from_name(name).is_some() {
                check_aggregate_argument(name, args).map(|_| ())
            } else {
                args.iter().try_for_each(|arg| collect_references(arg, refs))
            }
        }
        Expr::Member { base, .. } => collect_references(base, refs),
        // The table operand names a table, not a column
        Expr::Lookup { key, .. } => collect_references(key, refs),
    }
}

pub(crate) fn check_aggregate_argument<'e>(name: &str, args: &'e [Expr]) -> FormulaResult<&'e str> {
    match args {
        [Expr::Identifier(column)] => Ok(column.as_str()),
        _ => Err(FormulaError::AggregateArgument {
            function: name.to_string(),
        }),
    }
}
