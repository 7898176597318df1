//! Core types, expression AST, and errors for the Absolution layout engine.
//!
//! This crate provides the vocabulary shared by the other absolution crates:
//! - Expression AST produced by the parser and lowered by the constraint system
//! - Geometry types (axes, rect properties, positions and updates)
//! - Error types

pub mod ast;
pub mod errors;
pub mod types;

pub use ast::*;
pub use errors::*;
pub use types::*;
