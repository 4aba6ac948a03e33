//! # mdxtab-core
//!
//! Core data structures for the mdxtab document compiler.
//!
//! This crate provides the types shared by every layer of the compiler:
//! - [`Scalar`] - The values document authors can see (number, string, boolean, null)
//! - [`Row`] - An ordered column → value mapping, as materialized by the compiler
//! - [`Diagnostic`] - A positioned, machine-checkable compilation failure
//!
//! ## Example
//!
//! ```rust
//! use mdxtab_core::{Row, Scalar};
//!
//! let mut row = Row::new();
//! row.insert("id", "h1");
//! row.insert("net", 100.0);
//!
//! assert_eq!(row.get("net"), Some(&Scalar::Number(100.0)));
//! assert_eq!(row.get("net").unwrap().to_string(), "100");
//! ```

pub mod diagnostic;
pub mod row;
pub mod value;

// Re-exports for convenience
pub use diagnostic::{
    Diagnostic, DiagnosticCode, DiagnosticPosition, DiagnosticRange, DiagnosticResult, Severity,
};
pub use row::Row;
pub use value::Scalar;
