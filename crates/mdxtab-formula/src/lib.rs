//! # mdxtab-formula
//!
//! Expression language for mdxtab computed columns and aggregates.
//!
//! This crate provides:
//! - Lexing (text → tokens)
//! - Pratt parsing (tokens → AST)
//! - Dependency ordering of a table's computed columns
//! - Evaluation (AST → [`Scalar`](mdxtab_core::Scalar)) with null propagation,
//!   lookups and aggregates
//!
//! ## Example
//!
//! ```rust
//! use mdxtab_core::{Row, Scalar};
//! use mdxtab_formula::{evaluate, parse_expression, RowContext};
//!
//! let ast = parse_expression("round(net * 0.2, 1)").unwrap();
//! let row: Row = [("net", Scalar::from(12.25))].into_iter().collect();
//!
//! let value = evaluate(&ast, &RowContext::new(&row)).unwrap();
//! assert_eq!(value, Scalar::Number(2.4));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use dependency::{validate_aggregate_calls, DependencyEdge, DependencyGraph};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext, RowContext};
pub use functions::{round_half_even, AggregateFunction, Builtin};
pub use lexer::{lex, Token, TokenKind};
pub use parser::{parse_expression, parse_tokens};
