//! Expression AST for layout rules.
//!
//! Rules such as `left: sidebar.right + 8` carry an expression on their
//! right-hand side. The parser produces these nodes and the constraint
//! system lowers them into relationships.

use std::fmt;

use crate::types::Identifier;

/// A rule expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expression {
    /// A numeric literal.
    Number(f64),
    /// A bare variable name, e.g. `gutter`.
    Ident(Identifier),
    /// A property of a named object, e.g. `header.bottom`.
    Property { object: Identifier, key: String },
    /// `left op right`
    BinaryOp { left: Box<Expression>, op: BinaryOp, right: Box<Expression> },
    /// A call to a registered function, e.g. `max(a.width, 100)`.
    Call { name: String, args: Vec<Expression> },
}

impl Expression {
    /// Create a binary operation node.
    pub fn binary(left: Expression, op: BinaryOp, right: Expression) -> Self {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create an identifier node.
    pub fn ident(name: impl Into<Identifier>) -> Self {
        Expression::Ident(name.into())
    }

    /// Create a property reference node.
    pub fn property(object: impl Into<Identifier>, key: impl Into<String>) -> Self {
        Expression::Property {
            object: object.into(),
            key: key.into(),
        }
    }

    /// The variable name this node refers to, if it is a plain reference.
    ///
    /// Property references are flattened to `object.key`.
    pub fn variable_name(&self) -> Option<String> {
        match self {
            Expression::Ident(id) => Some(id.0.clone()),
            Expression::Property { object, key } => Some(format!("{}.{}", object.0, key)),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Number(n) => write!(f, "{}", n),
            Expression::Ident(id) => write!(f, "{}", id.0),
            Expression::Property { object, key } => write!(f, "{}.{}", object.0, key),
            Expression::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            Expression::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Binary operators for expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// The operator's source symbol.
    pub fn symbol(&self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
