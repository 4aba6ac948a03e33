//! Aggregate interpolation
//!
//! `{{ table.aggregate }}` and `{{ table.aggregate[group] }}` references in the
//! body are replaced with the value's textual form. Fenced code blocks and
//! inline code spans are copied untouched, as is `{{ ... }}` text that is not
//! a reference.

use crate::compiler::TableResult;
use crate::markdown::FenceTracker;
use lazy_regex::regex_captures;
use mdxtab_core::{Diagnostic, DiagnosticCode, DiagnosticRange, DiagnosticResult};

/// A parsed `{{ ... }}` reference
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reference<'a> {
    table: &'a str,
    aggregate: &'a str,
    group: Option<&'a str>,
}

impl<'a> Reference<'a> {
    fn parse(inner: &'a str) -> Option<Self> {
        let (_, table, aggregate, group) = regex_captures!(
            r"^\s*([A-Za-z0-9_]+)\.([A-Za-z0-9_]+)(?:\[\s*([^\]]*?)\s*\])?\s*$",
            inner
        )?;
        let group = if inner.contains('[') {
            Some(strip_quotes(group))
        } else {
            None
        };
        Some(Self {
            table,
            aggregate,
            group,
        })
    }
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

/// Replace aggregate references in `body`
///
/// `first_line` is the document line of the body's first line; diagnostics
/// use absolute document positions.
pub(crate) fn interpolate(
    body: &str,
    first_line: usize,
    tables: &[TableResult],
) -> DiagnosticResult<String> {
    let mut out = String::with_capacity(body.len());
    let mut fence = FenceTracker::default();

    for (i, line) in body.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if fence.consume(line) {
            out.push_str(line);
            continue;
        }
        interpolate_line(line, first_line + i, tables, &mut out)?;
    }

    Ok(out)
}

fn interpolate_line(
    line: &str,
    line_number: usize,
    tables: &[TableResult],
    out: &mut String,
) -> DiagnosticResult<()> {
    let mut pos = 0;

    while pos < line.len() {
        let rest = &line[pos..];

        if rest.starts_with('`') {
            let run = rest.bytes().take_while(|b| *b == b'`').count();
            let end = match closing_run(line, pos + run, run) {
                // Inline code span, copied with its delimiters
                Some(close) => close + run,
                // Unmatched backticks are literal text
                None => pos + run,
            };
            out.push_str(&line[pos..end]);
            pos = end;
            continue;
        }

        if rest.starts_with("{{") {
            if let Some(close) = rest[2..].find("}}") {
                let inner = &rest[2..2 + close];
                if let Some(reference) = Reference::parse(inner) {
                    let end = pos + 2 + close + 2;
                    let range = DiagnosticRange::span(
                        line_number,
                        line[..pos].chars().count(),
                        line[..end].chars().count(),
                    );
                    let text = resolve(&reference, tables).map_err(|d| d.with_range(range))?;
                    out.push_str(&text);
                    pos = end;
                    continue;
                }
            }
        }

        // Copy one character
        let width = rest.chars().next().map_or(1, char::len_utf8);
        out.push_str(&rest[..width]);
        pos += width;
    }

    Ok(())
}

/// Byte offset of the next run of exactly `len` backticks at or after `from`
fn closing_run(line: &str, from: usize, len: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let run = bytes[i..].iter().take_while(|b| **b == b'`').count();
            if run == len {
                return Some(i);
            }
            i += run;
        } else {
            i += 1;
        }
    }
    None
}

fn resolve(reference: &Reference<'_>, tables: &[TableResult]) -> DiagnosticResult<String> {
    let Reference {
        table,
        aggregate,
        group,
    } = *reference;
    let error = |message: String| {
        Diagnostic::new(DiagnosticCode::AggregateReference, message)
            .with_table(table)
            .with_aggregate(aggregate)
    };
    let unknown = || error(format!("Unknown aggregate reference {}.{}", table, aggregate));

    let result = tables.iter().find(|t| t.name == table).ok_or_else(unknown)?;

    if let Some(value) = result.aggregates.get(aggregate) {
        return match group {
            None => Ok(value.to_string()),
            Some(key) => Err(error(format!(
                "Aggregate {}.{} is not grouped; cannot select [{}]",
                table, aggregate, key
            ))),
        };
    }

    let grouped = result.grouped(aggregate).ok_or_else(unknown)?;
    match group {
        None => Err(error(format!(
            "Aggregate {}.{} is grouped; select a group with {}.{}[key]",
            table, aggregate, table, aggregate
        ))),
        Some(key) => grouped
            .get(key)
            .map(|value| value.to_string())
            .ok_or_else(|| {
                error(format!(
                    "Unknown group {} for aggregate {}.{}",
                    key, table, aggregate
                ))
            }),
    }
}
