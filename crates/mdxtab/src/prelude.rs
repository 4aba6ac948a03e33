//! Prelude module - common imports for mdxtab users
//!
//! ```rust
//! use mdxtab::prelude::*;
//! ```

pub use crate::{
    // Entry points
    compile,
    render,
    validate,
    CompileOptions,
    CompileResult,
    // Diagnostics
    Diagnostic,
    DiagnosticCode,
    DiagnosticRange,
    GroupedAggregate,
    // Values
    Row,
    Scalar,
    TableResult,
};
