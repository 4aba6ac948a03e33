//! Expression evaluator
//!
//! A tree-walking evaluator over [`Expr`]. Rows and other tables are reached
//! only through an [`EvaluationContext`], which keeps this crate free of any
//! knowledge about documents or row storage.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::dependency::check_aggregate_argument;
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{round_half_even, AggregateFunction, Builtin};
use mdxtab_core::{Row, Scalar};
use std::cmp::Ordering;

/// Data an expression can reach while it is evaluated
pub trait EvaluationContext {
    /// Value of a column of the current row
    fn resolve(&self, name: &str) -> Option<Scalar>;

    /// The fully materialized row of `table` whose key is `key`
    fn lookup(&self, table: &str, key: &Scalar) -> FormulaResult<Row>;

    /// Fold `column` of the rows in scope
    fn aggregate(&self, function: AggregateFunction, column: &str) -> FormulaResult<Scalar>;
}

/// Context over a single row, with no lookups and no aggregates
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'r> {
    row: &'r Row,
}

impl<'r> RowContext<'r> {
    pub fn new(row: &'r Row) -> Self {
        Self { row }
    }
}

impl EvaluationContext for RowContext<'_> {
    fn resolve(&self, name: &str) -> Option<Scalar> {
        self.row.get(name).cloned()
    }

    fn lookup(&self, table: &str, key: &Scalar) -> FormulaResult<Row> {
        Err(FormulaError::Lookup(format!(
            "{}[{}]: no tables are available",
            table, key
        )))
    }

    fn aggregate(&self, function: AggregateFunction, _column: &str) -> FormulaResult<Scalar> {
        Err(FormulaError::AggregateInRow {
            function: function.name().to_string(),
        })
    }
}

/// Intermediate value; rows only exist between a lookup and a member access
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Scalar(Scalar),
    Row(Row),
}

/// Evaluate an expression to a scalar
pub fn evaluate(expr: &Expr, ctx: &dyn EvaluationContext) -> FormulaResult<Scalar> {
    evaluate_scalar(expr, ctx)
}

fn evaluate_scalar(expr: &Expr, ctx: &dyn EvaluationContext) -> FormulaResult<Scalar> {
    match evaluate_value(expr, ctx)? {
        Value::Scalar(value) => Ok(value),
        Value::Row(_) => Err(FormulaError::type_error(
            "expected a scalar but got a row; select a field with '.'",
        )),
    }
}

fn evaluate_value(expr: &Expr, ctx: &dyn EvaluationContext) -> FormulaResult<Value> {
    match expr {
        // Literals
        Expr::Number(n) => Ok(Value::Scalar(Scalar::Number(*n))),
        Expr::String(s) => Ok(Value::Scalar(Scalar::String(s.clone()))),
        Expr::Boolean(b) => Ok(Value::Scalar(Scalar::Boolean(*b))),

        Expr::Identifier(name) => ctx
            .resolve(name)
            .map(Value::Scalar)
            .ok_or_else(|| FormulaError::UnknownReference(name.clone())),

        Expr::Unary { op, operand } => {
            let value = evaluate_scalar(operand, ctx)?;
            evaluate_unary(*op, value).map(Value::Scalar)
        }

        Expr::Binary { op, left, right } => {
            // Both sides are always evaluated, including for `and` / `or`
            let left = evaluate_scalar(left, ctx)?;
            let right = evaluate_scalar(right, ctx)?;
            evaluate_binary(*op, left, right).map(Value::Scalar)
        }

        Expr::Call { name, args } => evaluate_call(name, args, ctx),

        Expr::Member { base, field } => match evaluate_value(base, ctx)? {
            Value::Row(row) => row
                .get(field)
                .cloned()
                .map(Value::Scalar)
                .ok_or_else(|| FormulaError::UnknownReference(field.clone())),
            Value::Scalar(value) => Err(FormulaError::type_error(format!(
                "cannot read field '{}' of {} value; only lookup results have fields",
                field,
                value.type_name()
            ))),
        },

        Expr::Lookup { table, key } => {
            let table = table.as_identifier().ok_or_else(|| {
                FormulaError::Lookup("lookup target must be a table name".to_string())
            })?;
            let key = evaluate_scalar(key, ctx)?;
            ctx.lookup(table, &key).map(Value::Row)
        }
    }
}

fn evaluate_unary(op: UnaryOperator, value: Scalar) -> FormulaResult<Scalar> {
    match value {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Number(n) => Ok(Scalar::Number(match op {
            UnaryOperator::Plus => n,
            UnaryOperator::Negate => -n,
        })),
        other => Err(FormulaError::type_error(format!(
            "unary '{}' requires a number, got {}",
            op.symbol(),
            other.type_name()
        ))),
    }
}

fn evaluate_binary(op: BinaryOperator, left: Scalar, right: Scalar) -> FormulaResult<Scalar> {
    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide => evaluate_arithmetic(op, &left, &right),

        BinaryOperator::And | BinaryOperator::Or => {
            let (l, r) = match (left.as_bool(), right.as_bool()) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    return Err(FormulaError::type_error(format!(
                        "'{}' requires booleans, got {} and {}",
                        op,
                        left.type_name(),
                        right.type_name()
                    )))
                }
            };
            Ok(Scalar::Boolean(if op == BinaryOperator::And {
                l && r
            } else {
                l || r
            }))
        }

        _ => evaluate_comparison(op, &left, &right).map(Scalar::Boolean),
    }
}

fn evaluate_arithmetic(op: BinaryOperator, left: &Scalar, right: &Scalar) -> FormulaResult<Scalar> {
    let numeric = |v: &Scalar| v.is_null() || v.as_number().is_some();
    if !numeric(left) || !numeric(right) {
        return Err(FormulaError::type_error(format!(
            "'{}' requires numbers, got {} and {}",
            op,
            left.type_name(),
            right.type_name()
        )));
    }

    let (l, r) = match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => (l, r),
        // Null in, null out
        _ => return Ok(Scalar::Null),
    };

    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return Err(FormulaError::DivideByZero);
            }
            l / r
        }
        other => return Err(FormulaError::UnsupportedOperator(other.symbol().to_string())),
    };
    Ok(Scalar::Number(result))
}

fn evaluate_comparison(op: BinaryOperator, left: &Scalar, right: &Scalar) -> FormulaResult<bool> {
    if left.is_null() || right.is_null() {
        return Ok(false);
    }

    let ordering = match (left, right) {
        (Scalar::Number(l), Scalar::Number(r)) => l.partial_cmp(r),
        (Scalar::String(l), Scalar::String(r)) => Some(l.cmp(r)),
        (Scalar::Boolean(l), Scalar::Boolean(r)) => Some(l.cmp(r)),
        _ => {
            return Err(FormulaError::type_error(format!(
                "cannot compare {} with {} using '{}'",
                left.type_name(),
                right.type_name(),
                op
            )))
        }
    };

    // NaN compares unequal to everything
    let ordering = match ordering {
        Some(ordering) => ordering,
        None => return Ok(op == BinaryOperator::NotEqual),
    };

    Ok(match op {
        BinaryOperator::Equal => ordering == Ordering::Equal,
        BinaryOperator::NotEqual => ordering != Ordering::Equal,
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterEqual => ordering != Ordering::Less,
        other => return Err(FormulaError::UnsupportedOperator(other.symbol().to_string())),
    })
}

fn evaluate_call(name: &str, args: &[Expr], ctx: &dyn EvaluationContext) -> FormulaResult<Value> {
    if let Some(builtin) = Builtin::from_name(name) {
        builtin.check_arity(args.len())?;
        return match builtin {
            Builtin::Round => evaluate_round(&args[0], &args[1], ctx).map(Value::Scalar),
            Builtin::If => match evaluate_scalar(&args[0], ctx)? {
                Scalar::Boolean(true) => evaluate_value(&args[1], ctx),
                Scalar::Boolean(false) => evaluate_value(&args[2], ctx),
                other => Err(FormulaError::type_error(format!(
                    "if condition must be a boolean, got {}",
                    other.type_name()
                ))),
            },
        };
    }

    if let Some(function) = AggregateFunction::from_name(name) {
        let column = check_aggregate_argument(name, args)?;
        return ctx.aggregate(function, column).map(Value::Scalar);
    }

    Err(FormulaError::UnknownFunction(name.to_string()))
}

fn evaluate_round(value: &Expr, digits: &Expr, ctx: &dyn EvaluationContext) -> FormulaResult<Scalar> {
    let value = evaluate_scalar(value, ctx)?;
    let digits = evaluate_scalar(digits, ctx)?;

    match (&value, &digits) {
        (Scalar::Number(x), Scalar::Number(n)) => {
            Ok(Scalar::Number(round_half_even(*x, n.trunc() as i32)))
        }
        (Scalar::Null, Scalar::Number(_) | Scalar::Null) | (Scalar::Number(_), Scalar::Null) => {
            Ok(Scalar::Null)
        }
        _ => Err(FormulaError::type_error(format!(
            "round requires numbers, got {} and {}",
            value.type_name(),
            digits.type_name()
        ))),
    }
}
