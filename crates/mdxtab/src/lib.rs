//! # mdxtab
//!
//! A compiler for markdown documents that carry typed tables.
//!
//! A document opens with a YAML schema section declaring its tables, their
//! column types, computed columns and aggregates. The body holds the tables as
//! ordinary markdown pipe tables and may quote aggregate values with
//! `{{ table.aggregate }}`.
//!
//! ## Features
//!
//! - Typed cells with inference for untyped columns
//! - Computed columns over the row and over other tables (`rates[category].rate`)
//! - Table aggregates, optionally grouped (`sum(hours) by project`)
//! - Positioned diagnostics with stable `E_*` codes
//!
//! ## Example
//!
//! ```rust
//! use mdxtab::prelude::*;
//!
//! let doc = concat!(
//!     "---\n",
//!     "mdxtab: \"1.0\"\n",
//!     "tables:\n",
//!     "  t:\n",
//!     "    columns: [id, v]\n",
//!     "    computed:\n",
//!     "      double: v * 2\n",
//!     "---\n",
//!     "| id | v |\n",
//!     "|----|---|\n",
//!     "| a  | 21 |\n",
//! );
//!
//! // Tables without a heading are named table1, table2, ...
//! let diagnostics = validate(doc);
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].code, DiagnosticCode::Table);
//!
//! let doc = doc.replace("  t:", "  table1:");
//! let result = compile(&doc, &CompileOptions::default()).unwrap();
//! let row = &result.table("table1").unwrap().rows[0];
//! assert_eq!(row.get("double"), Some(&Scalar::Number(42.0)));
//! ```

pub mod coerce;
pub mod compiler;
pub mod markdown;
pub mod prelude;
pub mod schema;

pub(crate) mod render;
pub(crate) mod source;
pub(crate) mod store;

pub use compiler::{
    compile, render, validate, CompileOptions, CompileResult, GroupedAggregate, TableResult,
};
pub use markdown::{parse_markdown_tables, ParsedTable};
pub use schema::{parse_schema, ColumnType, EmptyCellPolicy, Schema, TableSchema};

// Re-export the shared data model
pub use mdxtab_core::{
    Diagnostic, DiagnosticCode, DiagnosticPosition, DiagnosticRange, DiagnosticResult, Row,
    Scalar, Severity,
};
