//! Parser for Absolution rule expressions.
//!
//! Turns rule right-hand sides such as `L + (W / 2)`, `header.bottom + 8`
//! or `max(a.width, 100)` into an [`Expression`] tree. Built on `nom`.

mod grammar;
mod lexer;

use absolution_core::{Expression, ParseError};

/// Parse a rule expression from source text.
///
/// # Example
///
/// ```
/// use absolution_parser::parse_expression;
///
/// let expr = parse_expression("sidebar.right + 8").unwrap();
/// assert_eq!(expr.to_string(), "(sidebar.right + 8)");
/// ```
pub fn parse_expression(source: &str) -> Result<Expression, ParseError> {
    grammar::parse(source)
}
