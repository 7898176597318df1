//! Error types for the Absolution engine.

use crate::types::Axis;
use thiserror::Error;

/// Errors while parsing a rule expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Empty expression")]
    Empty,

    #[error("Unexpected input at column {column}: {found:?}")]
    UnexpectedInput { found: String, column: usize },
}

/// Errors raised by the constraint system.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConstraintError {
    #[error("Contradiction: {variable}({current}) is already set (attempting to set {attempted})")]
    Contradiction {
        variable: String,
        current: f64,
        attempted: f64,
    },

    #[error("Variable {variable} has no value")]
    Unset { variable: String },

    #[error("{name} is not a function")]
    UnknownFunction { name: String },

    #[error("{name} function already registered")]
    DuplicateFunction { name: String },

    #[error("Relationship {relationship} is over-constrained by its literal operands")]
    OverConstrained { relationship: String },

    #[error("Invalid expression: {0}")]
    Parse(#[from] ParseError),
}

/// Errors raised by the layout bridge.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LayoutError {
    #[error("The {axis} axis already has 2 constraints")]
    AxisOverConstrained { axis: Axis },

    #[error("Unknown region: {id}")]
    UnknownRegion { id: String },

    #[error("Region {id} is already registered")]
    DuplicateRegion { id: String },

    #[error("Couldn't create rule {property}=\"{text}\" because {source}")]
    Rule {
        property: String,
        text: String,
        #[source]
        source: ConstraintError,
    },

    #[error("Constraint error: {0}")]
    Constraint(#[from] ConstraintError),
}
