//! Token-level parsers shared by the expression grammar.

use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map_res, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};

/// Parse an identifier (starts with letter/underscore, followed by alphanumeric/underscore).
///
/// Hyphens are not allowed here so that `R-L` reads as a subtraction.
pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// Parse a property key after a dot, e.g. `center-x`.
///
/// Keys may contain hyphen-joined segments.
pub fn property_key(input: &str) -> IResult<&str, &str> {
    recognize(pair(identifier, many0(preceded(char('-'), identifier))))(input)
}

/// Parse an unsigned number (integer or decimal).
///
/// Negative literals are handled by the grammar's unary minus.
pub fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_digit()),
            opt(pair(char('.'), take_while1(|c: char| c.is_ascii_digit()))),
        )),
        |s: &str| s.parse::<f64>(),
    )(input)
}

/// Wrap a parser so it skips surrounding whitespace.
pub fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}
