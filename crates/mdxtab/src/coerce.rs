//! Markdown cell coercion

use crate::schema::{ColumnType, EmptyCellPolicy};
use chrono::NaiveDate;
use lazy_regex::regex_is_match;
use mdxtab_core::{Diagnostic, DiagnosticCode, DiagnosticResult, Scalar};

fn is_number(text: &str) -> bool {
    regex_is_match!(r"^-?\d+(?:\.\d+)?$", text)
}

fn is_date(text: &str) -> bool {
    regex_is_match!(r"^\d{4}-\d{2}-\d{2}$", text)
}

/// Convert a raw cell to a scalar
///
/// Untyped cells are inferred as boolean, then number, then string; ISO
/// dates stay strings so they compare in calendar order. A typed cell must
/// match its type; `string` accepts anything.
///
/// # Example
/// ```rust
/// use mdxtab::coerce::coerce_cell;
/// use mdxtab::schema::{ColumnType, EmptyCellPolicy};
/// use mdxtab_core::Scalar;
///
/// let policy = EmptyCellPolicy::Null;
/// assert_eq!(coerce_cell(" 0.2 ", None, policy).unwrap(), Scalar::Number(0.2));
/// assert_eq!(coerce_cell("42", Some(ColumnType::String), policy).unwrap(), Scalar::from("42"));
/// assert!(coerce_cell("soon", Some(ColumnType::Date), policy).is_err());
/// ```
pub fn coerce_cell(
    raw: &str,
    column_type: Option<ColumnType>,
    policy: EmptyCellPolicy,
) -> DiagnosticResult<Scalar> {
    let text = raw.trim();
    if text.is_empty() {
        return empty_cell(policy);
    }

    let accepts = |ty: ColumnType| column_type.map_or(true, |declared| declared == ty);

    if (text == "true" || text == "false") && accepts(ColumnType::Bool) {
        return Ok(Scalar::Boolean(text == "true"));
    }
    if is_number(text) && accepts(ColumnType::Number) {
        return text.parse::<f64>().map(Scalar::Number).map_err(|_| {
            Diagnostic::new(DiagnosticCode::Type, format!("Invalid number '{}'", text))
        });
    }
    if is_date(text) && accepts(ColumnType::Date) {
        if column_type == Some(ColumnType::Date) && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_err() {
            return Err(Diagnostic::new(
                DiagnosticCode::Type,
                format!("Type mismatch: '{}' is not a calendar date", text),
            ));
        }
        return Ok(Scalar::string(text));
    }

    match column_type {
        None | Some(ColumnType::String) => Ok(Scalar::string(text)),
        Some(ty) => Err(Diagnostic::new(
            DiagnosticCode::Type,
            format!("Type mismatch: cannot coerce '{}' to {}", text, ty.as_str()),
        )),
    }
}

fn empty_cell(policy: EmptyCellPolicy) -> DiagnosticResult<Scalar> {
    match policy {
        EmptyCellPolicy::Null => Ok(Scalar::Null),
        EmptyCellPolicy::Zero => Ok(Scalar::Number(0.0)),
        EmptyCellPolicy::EmptyString => Ok(Scalar::string("")),
        EmptyCellPolicy::Error => Err(Diagnostic::new(
            DiagnosticCode::EmptyCell,
            "Empty cell not allowed",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn untyped(raw: &str) -> Scalar {
        coerce_cell(raw, None, EmptyCellPolicy::Null).unwrap()
    }

    fn typed(raw: &str, ty: ColumnType) -> DiagnosticResult<Scalar> {
        coerce_cell(raw, Some(ty), EmptyCellPolicy::Null)
    }

    #[test]
    fn test_inference() {
        assert_eq!(untyped("true"), Scalar::Boolean(true));
        assert_eq!(untyped(" false "), Scalar::Boolean(false));
        assert_eq!(untyped("100"), Scalar::Number(100.0));
        assert_eq!(untyped("-4.5"), Scalar::Number(-4.5));
        assert_eq!(untyped("2024-03-01"), Scalar::from("2024-03-01"));
        assert_eq!(untyped("Hosting"), Scalar::from("Hosting"));
        // Not numbers under the cell grammar
        assert_eq!(untyped("1e3"), Scalar::from("1e3"));
        assert_eq!(untyped(".5"), Scalar::from(".5"));
        assert_eq!(untyped("True"), Scalar::from("True"));
    }

    #[test]
    fn test_typed() {
        assert_eq!(typed("1", ColumnType::Number).unwrap(), Scalar::Number(1.0));
        assert_eq!(typed("true", ColumnType::Bool).unwrap(), Scalar::Boolean(true));
        assert_eq!(typed("true", ColumnType::String).unwrap(), Scalar::from("true"));
        assert_eq!(
            typed("2024-02-29", ColumnType::Date).unwrap(),
            Scalar::from("2024-02-29")
        );

        let err = typed("abc", ColumnType::Number).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Type);
        assert_eq!(err.message, "Type mismatch: cannot coerce 'abc' to number");

        assert!(typed("1", ColumnType::Bool).is_err());
        assert!(typed("yes", ColumnType::Bool).is_err());
        assert!(typed("2024-01-01", ColumnType::Number).is_err());
    }

    #[test]
    fn test_calendar_dates() {
        assert!(typed("2023-02-29", ColumnType::Date).is_err());
        assert!(typed("2024-13-01", ColumnType::Date).is_err());
        // Untyped lookalikes are plain strings
        assert_eq!(untyped("2024-13-01"), Scalar::from("2024-13-01"));
    }

    #[test]
    fn test_empty_cells() {
        assert_eq!(coerce_cell("  ", None, EmptyCellPolicy::Null).unwrap(), Scalar::Null);
        assert_eq!(
            coerce_cell("", Some(ColumnType::Number), EmptyCellPolicy::Zero).unwrap(),
            Scalar::Number(0.0)
        );
        assert_eq!(
            coerce_cell("", None, EmptyCellPolicy::EmptyString).unwrap(),
            Scalar::from("")
        );
        let err = coerce_cell("", None, EmptyCellPolicy::Error).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::EmptyCell);
    }
}
