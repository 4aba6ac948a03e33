//! Built-in functions
//!
//! Two kinds of calls exist. Scalar built-ins ([`Builtin`]) are evaluated by
//! the evaluator against the current row. Aggregates ([`AggregateFunction`])
//! take a bare column name and fold that column over a set of rows supplied
//! by the evaluation context. Names are case-insensitive.

use crate::error::{FormulaError, FormulaResult};
use mdxtab_core::Scalar;
use std::fmt;

/// Ties closer than this to one half are treated as exact ties
const TIE_EPSILON: f64 = 1e-12;

/// Row-level built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `round(x, digits)`, half to even
    Round,
    /// `if(condition, then, else)`, evaluates one branch
    If,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "round" => Some(Builtin::Round),
            "if" => Some(Builtin::If),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Round => "round",
            Builtin::If => "if",
        }
    }

    /// Exact number of arguments
    pub fn arity(&self) -> usize {
        match self {
            Builtin::Round => 2,
            Builtin::If => 3,
        }
    }

    /// Fail with an argument-count error unless `actual` matches
    pub fn check_arity(&self, actual: usize) -> FormulaResult<()> {
        if actual == self.arity() {
            Ok(())
        } else {
            Err(FormulaError::ArgumentCount {
                function: self.name().to_string(),
                expected: self.arity(),
                actual,
            })
        }
    }
}

/// Aggregate functions over one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(AggregateFunction::Sum),
            "avg" => Some(AggregateFunction::Avg),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            "count" => Some(AggregateFunction::Count),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Count => "count",
        }
    }

    /// Fold a column's values
    ///
    /// Nulls are skipped. `sum` of nothing is 0; `avg`, `min` and `max` of
    /// nothing are null. Every function but `count` requires numbers.
    ///
    /// # Example
    /// ```rust
    /// use mdxtab_core::Scalar;
    /// use mdxtab_formula::AggregateFunction;
    ///
    /// let values = [Scalar::from(100.0), Scalar::Null, Scalar::from(200.0)];
    /// assert_eq!(AggregateFunction::Avg.apply(&values).unwrap(), Scalar::Number(150.0));
    /// assert_eq!(AggregateFunction::Count.apply(&values).unwrap(), Scalar::Number(2.0));
    /// ```
    pub fn apply<'a, I>(&self, values: I) -> FormulaResult<Scalar>
    where
        I: IntoIterator<Item = &'a Scalar>,
    {
        let present = values.into_iter().filter(|v| !v.is_null());

        if *self == AggregateFunction::Count {
            return Ok(Scalar::Number(present.count() as f64));
        }

        let numbers = present
            .map(|v| {
                v.as_number().ok_or_else(|| {
                    FormulaError::type_error(format!(
                        "{} requires numbers, got {} '{}'",
                        self.name(),
                        v.type_name(),
                        v
                    ))
                })
            })
            .collect::<FormulaResult<Vec<f64>>>()?;

        let result = match self {
            AggregateFunction::Sum => Scalar::Number(numbers.iter().sum()),
            AggregateFunction::Avg if numbers.is_empty() => Scalar::Null,
            AggregateFunction::Avg => {
                Scalar::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
            AggregateFunction::Min => numbers
                .iter()
                .copied()
                .reduce(f64::min)
                .map_or(Scalar::Null, Scalar::Number),
            AggregateFunction::Max => numbers
                .iter()
                .copied()
                .reduce(f64::max)
                .map_or(Scalar::Null, Scalar::Number),
            AggregateFunction::Count => Scalar::Number(numbers.len() as f64),
        };
        Ok(result)
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Round half to even at `digits` decimal places
///
/// Negative `digits` round to the left of the decimal point.
///
/// # Example
/// ```rust
/// use mdxtab_formula::round_half_even;
///
/// assert_eq!(round_half_even(1.25, 1), 1.2);
/// assert_eq!(round_half_even(1.35, 1), 1.4);
/// assert_eq!(round_half_even(2.5, 0), 2.0);
/// ```
pub fn round_half_even(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let factor = 10f64.powi(digits);
    let scaled = value * factor;
    let truncated = scaled.trunc();
    let remainder = (scaled - truncated).abs();

    let rounded = if (remainder - 0.5).abs() < TIE_EPSILON {
        if truncated % 2.0 == 0.0 {
            truncated
        } else {
            truncated + scaled.signum()
        }
    } else {
        scaled.round()
    };

    rounded / factor
}
