//! End-to-end compilation tests

use mdxtab::prelude::*;
use mdxtab::DiagnosticPosition;
use pretty_assertions::assert_eq;

const EXPENSES: &str = r#"---
mdxtab: "1.0"
tables:
  rates:
    key: id
    columns: [id, rate]
    types:
      rate: number
  expenses:
    key: id
    columns: [id, category, net]
    computed:
      tax: net * rates[category].rate
    aggregates:
      total_net: sum(net)
      total_tax: sum(tax)
---

## rates
| id | rate |
|----|------|
| Hosting | 0.2 |
| Ads | 0.1 |

## expenses
| id | category | net |
|----|----------|-----|
| h1 | Hosting  | 100 |
| a1 | Ads      | 200 |

Summary: {{ expenses.total_net }} / {{ expenses.total_tax }}
"#;

const TIMESHEET: &str = r#"---
mdxtab: "1.0"
tables:
  timesheet:
    columns: [id, project, hours]
    types:
      hours: number
    aggregates:
      total_hours: sum(hours)
      hours_by_project: sum(hours) by project
---

## timesheet
| id | project | hours |
|----|---------|-------|
| 1  | Alpha   | 8     |
| 2  | Beta    | 7     |
| 3  | Alpha   | 7     |

Alpha took {{ timesheet.hours_by_project[Alpha] }} of {{ timesheet.total_hours }} hours.
"#;

fn compile_default(raw: &str) -> Result<CompileResult, Diagnostic> {
    compile(raw, &CompileOptions::default())
}

#[test]
fn test_rates_and_expenses() {
    let result = compile_default(EXPENSES).unwrap();
    let expenses = result.table("expenses").unwrap();

    assert_eq!(expenses.rows.len(), 2);
    let taxes: Vec<&Scalar> = expenses.rows.iter().filter_map(|r| r.get("tax")).collect();
    assert_eq!(taxes, vec![&Scalar::Number(20.0), &Scalar::Number(20.0)]);
    assert_eq!(expenses.aggregates.get("total_net"), Some(&Scalar::Number(300.0)));
    assert_eq!(expenses.aggregates.get("total_tax"), Some(&Scalar::Number(40.0)));
    assert!(result.rendered.contains("Summary: 300 / 40"));

    let rates = result.table("rates").unwrap();
    assert_eq!(rates.rows[0].get("rate"), Some(&Scalar::Number(0.2)));
    assert!(rates.aggregates.is_empty());
}

#[test]
fn test_header_mismatch() {
    let doc = EXPENSES.replacen("category", "cat", 1);
    let err = compile_default(&doc).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::ColumnMismatch);
    assert_eq!(err.table.as_deref(), Some("expenses"));
    assert_eq!(
        err.message,
        "Header mismatch for table expenses: expected cat, got category"
    );
}

#[test]
fn test_frontmatter_echo() {
    let with = render(EXPENSES, &CompileOptions::default()).unwrap();
    let without = render(
        EXPENSES,
        &CompileOptions {
            include_frontmatter: false,
        },
    )
    .unwrap();

    let end = EXPENSES.find("\n---\n").unwrap() + "\n---".len();
    let frontmatter = &EXPENSES[..end];
    assert!(with.starts_with(frontmatter));
    assert!(!without.contains("mdxtab:"));
    assert_eq!(with, format!("{}{}", frontmatter, without));
    assert!(without.starts_with("\n\n## rates"));
}

#[test]
fn test_grouped_aggregates() {
    let result = compile_default(TIMESHEET).unwrap();
    let table = result.table("timesheet").unwrap();
    let grouped = table.grouped("hours_by_project").unwrap();

    assert_eq!(
        grouped.groups,
        vec![
            ("Alpha".to_string(), Scalar::Number(15.0)),
            ("Beta".to_string(), Scalar::Number(7.0)),
        ]
    );
    assert_eq!(grouped.get("Beta"), Some(&Scalar::Number(7.0)));
    assert_eq!(table.aggregates.get("hours_by_project"), None);
    assert!(result
        .rendered
        .contains("Alpha took 15 of 22 hours."));
}

#[test]
fn test_code_is_not_interpolated() {
    let doc = EXPENSES.replace(
        "Summary:",
        "Inline `{{ expenses.total_net }}` stays.\n\n```\n{{ expenses.nothing }}\n```\n\nSummary:",
    );
    let rendered = compile_default(&doc).unwrap().rendered;
    assert!(rendered.contains("Inline `{{ expenses.total_net }}` stays."));
    assert!(rendered.contains("```\n{{ expenses.nothing }}\n```"));
    assert!(rendered.contains("Summary: 300 / 40"));
}

#[test]
fn test_unknown_aggregate_reference() {
    let doc = EXPENSES.replace("{{ expenses.total_tax }}", "{{ expenses.missing }}");
    let err = compile_default(&doc).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::AggregateReference);
    assert_eq!(err.table.as_deref(), Some("expenses"));
    assert_eq!(err.aggregate.as_deref(), Some("missing"));
    assert_eq!(err.message, "Unknown aggregate reference expenses.missing");

    let range = err.range.unwrap();
    assert_eq!(range.start.line, 30);
    assert_eq!(range.start.character, "Summary: {{ expenses.total_net }} / ".len());
}

#[test]
fn test_table_errors() {
    let doc = EXPENSES.replace("| a1 | Ads      | 200 |", "| a1 | Ads\t| 200 |");
    let err = compile_default(&doc).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::TableTab);
    let range = err.range.unwrap();
    assert_eq!(range.start, DiagnosticPosition::new(28, 0));
    assert_eq!(range.end.line, 28);

    let doc = EXPENSES.replace("| a1 | Ads      | 200 |", "| a1 | Ads | 200 | 5 |");
    let err = compile_default(&doc).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::TableColumnCount);
    assert_eq!(err.table.as_deref(), Some("expenses"));
}

#[test]
fn test_missing_lookup_row() {
    let doc = EXPENSES.replace("| a1 | Ads      | 200 |", "| a1 | Travel   | 200 |");
    let err = compile_default(&doc).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::Lookup);
    assert!(err.message.contains("rates[Travel]"), "{}", err.message);
    assert_eq!(err.table.as_deref(), Some("expenses"));
    assert_eq!(err.column.as_deref(), Some("tax"));
    assert_eq!(err.row_key.as_deref(), Some("a1"));
    assert_eq!(err.range.unwrap().start.line, 28);
}

#[test]
fn test_lookup_cycle() {
    let doc = r#"---
mdxtab: "1.0"
tables:
  a:
    columns: [id, b_id]
    computed:
      x: b[b_id].y
  b:
    columns: [id, a_id]
    computed:
      y: a[a_id].x
---

## a
| id | b_id |
|----|------|
| a1 | b1   |

## b
| id | a_id |
|----|------|
| b1 | a1   |
"#;
    let err = compile_default(doc).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::LookupCycle);
    assert_eq!(err.message, "Lookup cycle detected: a[a1] -> b[b1] -> a[a1]");
}

#[test]
fn test_validate_reports_first_error_only() {
    assert!(validate(EXPENSES).is_empty());

    let doc = EXPENSES
        .replace("| h1 | Hosting  | 100 |", "| h1 | Hosting  | abc |")
        .replace("{{ expenses.total_tax }}", "{{ expenses.missing }}")
        .replace("| Ads | 0.1 |", "| Ads | high |");
    let diagnostics = validate(&doc);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, DiagnosticCode::Type);
    assert_eq!(diagnostics[0].table.as_deref(), Some("rates"));
}

#[test]
fn test_null_propagation_and_empty_cells() {
    let doc = r#"---
mdxtab: "1.0"
tables:
  items:
    columns: [id, price, discount]
    computed:
      final: price - discount
    aggregates:
      counted: count(discount)
      total: sum(final)
---

## items
| id | price | discount |
|----|-------|----------|
| a  | 10    | 2        |
| b  | 5     |          |

{{ items.counted }} discounts, total {{ items.total }}
"#;
    let result = compile_default(doc).unwrap();
    let items = result.table("items").unwrap();
    assert_eq!(items.rows[1].get("discount"), Some(&Scalar::Null));
    assert_eq!(items.rows[1].get("final"), Some(&Scalar::Null));
    assert!(result.rendered.contains("1 discounts, total 8"));

    let strict = doc.replace("    aggregates:", "    empty_cells: error\n    aggregates:");
    let err = compile_default(&strict).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::EmptyCell);
    assert_eq!(err.column.as_deref(), Some("discount"));
}

#[test]
fn test_crlf_document() {
    let doc = EXPENSES.replace('\n', "\r\n");
    let result = compile_default(&doc).unwrap();
    assert!(result.rendered.contains("Summary: 300 / 40"));
    assert!(!result.rendered.contains('\r'));
}

#[test]
fn test_json_output() {
    let result = compile_default(TIMESHEET).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["schema"]["mdxtab"], "1.0");
    assert_eq!(json["tables"]["timesheet"]["rows"][0]["project"], "Alpha");
    assert_eq!(json["tables"]["timesheet"]["aggregates"]["total_hours"], 22.0);
    assert_eq!(
        json["tables"]["timesheet"]["groupedAggregates"]["hours_by_project"]["Alpha"],
        15.0
    );
    assert!(json["rendered"].as_str().unwrap().contains("Alpha took 15"));

    let diag = compile_default(&TIMESHEET.replace("total_hours }}", "nope }}")).unwrap_err();
    let json = serde_json::to_value(&diag).unwrap();
    assert_eq!(json["code"], "E_AGG_REF");
    assert_eq!(json["severity"], "error");
    assert_eq!(json["aggregate"], "nope");
    assert!(json.get("column").is_none());
    assert_eq!(json["range"]["start"]["line"], 19);
}
