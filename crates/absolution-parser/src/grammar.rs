//! Grammar rules for rule expressions.
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := factor (('*' | '/') factor)*
//! factor     := number | '-' factor | '(' expression ')' | call | reference
//! call       := identifier '(' (expression (',' expression)*)? ')'
//! reference  := identifier ('.' property_key)?
//! ```

use nom::{
    branch::alt,
    character::complete::{char, multispace0, one_of},
    combinator::{map, opt},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use absolution_core::{BinaryOp, Expression, ParseError};

use crate::lexer::*;

/// Parse a complete expression, rejecting trailing input.
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    match expression(input) {
        Ok((rest, expr)) if rest.is_empty() => Ok(expr),
        Ok((rest, _)) => Err(unexpected(input, rest)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(unexpected(input, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(unexpected(input, "")),
    }
}

fn unexpected(input: &str, rest: &str) -> ParseError {
    let rest = rest.trim_start();
    ParseError::UnexpectedInput {
        found: rest.to_string(),
        column: input.len() - rest.len() + 1,
    }
}

fn expression(input: &str) -> IResult<&str, Expression> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(ws(one_of("+-")), term),
        move || first.clone(),
        |left, (op, right)| {
            let op = if op == '+' { BinaryOp::Add } else { BinaryOp::Sub };
            Expression::binary(left, op, right)
        },
    )(input)
}

fn term(input: &str) -> IResult<&str, Expression> {
    let (input, first) = factor(input)?;
    fold_many0(
        pair(ws(one_of("*/")), factor),
        move || first.clone(),
        |left, (op, right)| {
            let op = if op == '*' { BinaryOp::Mul } else { BinaryOp::Div };
            Expression::binary(left, op, right)
        },
    )(input)
}

fn factor(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        map(number, Expression::Number),
        negation,
        delimited(char('('), expression, char(')')),
        call,
        reference,
    )))(input)
}

fn negation(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('-'), factor), |operand| match operand {
        Expression::Number(n) => Expression::Number(-n),
        other => Expression::binary(Expression::Number(0.0), BinaryOp::Sub, other),
    })(input)
}

fn call(input: &str) -> IResult<&str, Expression> {
    map(
        tuple((
            identifier,
            preceded(multispace0, char('(')),
            separated_list0(char(','), expression),
            preceded(multispace0, char(')')),
        )),
        |(name, _, args, _)| Expression::Call {
            name: name.to_string(),
            args,
        },
    )(input)
}

fn reference(input: &str) -> IResult<&str, Expression> {
    map(
        pair(identifier, opt(preceded(char('.'), property_key))),
        |(object, key)| match key {
            Some(key) => Expression::property(object, key),
            None => Expression::ident(object),
        },
    )(input)
}
