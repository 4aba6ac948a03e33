//! Formula error types

use mdxtab_core::{Diagnostic, DiagnosticCode};
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during lexing, parsing, ordering or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Invalid character or unterminated literal
    #[error("Lex error at offset {offset}: {message}")]
    Lex { offset: usize, message: String },

    /// Malformed expression
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// Computed columns that depend on each other
    #[error("Cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// Aggregate call that does not take a single column identifier
    #[error("Aggregate {function} requires a single column identifier")]
    AggregateArgument { function: String },

    /// Aggregate call in a row-level expression
    #[error("Aggregate {function} is not allowed in row evaluation")]
    AggregateInRow { function: String },

    /// Operand or argument of the wrong type
    #[error("Type error: {0}")]
    Type(String),

    /// Division by a zero right operand
    #[error("Division by zero")]
    DivideByZero,

    /// Unknown column or field
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    /// Operator applied where it has no meaning
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// Unknown table or missing row
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Lookup chain that returns to a row still being materialized
    #[error("Lookup cycle detected: {}", .path.join(" -> "))]
    LookupCycle { path: Vec<String> },

    /// A failure raised while materializing another row, already positioned
    #[error(transparent)]
    Diagnostic(Box<Diagnostic>),
}

impl FormulaError {
    /// Create a lex error
    pub fn lex<S: Into<String>>(offset: usize, message: S) -> Self {
        FormulaError::Lex {
            offset,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse<S: Into<String>>(offset: usize, message: S) -> Self {
        FormulaError::Parse {
            offset,
            message: message.into(),
        }
    }

    /// Create a type error
    pub fn type_error<S: Into<String>>(message: S) -> Self {
        FormulaError::Type(message.into())
    }

    /// The stable diagnostic code for this error
    pub fn code(&self) -> DiagnosticCode {
        match self {
            FormulaError::Lex { .. } => DiagnosticCode::Lex,
            FormulaError::Parse { .. } => DiagnosticCode::Parse,
            FormulaError::Cycle { .. } => DiagnosticCode::Cycle,
            FormulaError::AggregateArgument { .. } => DiagnosticCode::AggregateArgument,
            FormulaError::AggregateInRow { .. } => DiagnosticCode::AggregateInRow,
            FormulaError::Type(_) => DiagnosticCode::Type,
            FormulaError::DivideByZero => DiagnosticCode::DivideByZero,
            FormulaError::UnknownReference(_) => DiagnosticCode::Reference,
            FormulaError::UnsupportedOperator(_) => DiagnosticCode::Operator,
            FormulaError::UnknownFunction(_) => DiagnosticCode::Function,
            FormulaError::ArgumentCount { .. } => DiagnosticCode::Argument,
            FormulaError::Lookup(_) => DiagnosticCode::Lookup,
            FormulaError::LookupCycle { .. } => DiagnosticCode::LookupCycle,
            FormulaError::Diagnostic(diag) => diag.code,
        }
    }
}

impl From<Diagnostic> for FormulaError {
    fn from(diag: Diagnostic) -> Self {
        FormulaError::Diagnostic(Box::new(diag))
    }
}

impl From<FormulaError> for Diagnostic {
    fn from(err: FormulaError) -> Self {
        match err {
            FormulaError::Diagnostic(diag) => *diag,
            other => Diagnostic::new(other.code(), other.to_string()),
        }
    }
}
