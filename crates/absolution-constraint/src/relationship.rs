//! Relationships between variables and the derivation rules for each kind.
//!
//! A relationship never writes a value itself. [`Relationship::derive`]
//! inspects which operands currently have values and reports the one
//! missing operand it can compute; the [`System`](crate::System) performs
//! the write so that contradiction checks and notification always run.

use std::fmt;

use absolution_core::BinaryOp;
use smallvec::SmallVec;

use crate::function::Function;
use crate::variable::VariableId;

/// Ordinal identifier of a relationship, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipId(pub(crate) u64);

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A role filled either by a variable or by a literal number.
///
/// A literal behaves like a variable whose value is always present and
/// can never change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Variable(VariableId),
    Literal(f64),
}

impl Operand {
    pub fn variable(&self) -> Option<VariableId> {
        match self {
            Operand::Variable(id) => Some(*id),
            Operand::Literal(_) => None,
        }
    }
}

/// The arithmetic kind of a relationship.
#[derive(Clone)]
pub enum RelationshipKind {
    /// `left = right`
    Equality,
    /// `sum = addend1 + addend2`
    Addition,
    /// `difference = minuend - subtrahend`
    Subtraction,
    /// `product = mult1 * mult2`
    Multiplication,
    /// `quotient = dividend / divisor`
    Division,
    /// `output = name(params...)`, derived forward only.
    Custom { name: String, func: Function },
}

impl fmt::Debug for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipKind::Equality => f.write_str("Equality"),
            RelationshipKind::Addition => f.write_str("Addition"),
            RelationshipKind::Subtraction => f.write_str("Subtraction"),
            RelationshipKind::Multiplication => f.write_str("Multiplication"),
            RelationshipKind::Division => f.write_str("Division"),
            RelationshipKind::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

impl RelationshipKind {
    /// The arithmetic operator of the binary kinds.
    pub fn operator(&self) -> Option<BinaryOp> {
        match self {
            RelationshipKind::Addition => Some(BinaryOp::Add),
            RelationshipKind::Subtraction => Some(BinaryOp::Sub),
            RelationshipKind::Multiplication => Some(BinaryOp::Mul),
            RelationshipKind::Division => Some(BinaryOp::Div),
            RelationshipKind::Equality | RelationshipKind::Custom { .. } => None,
        }
    }

    /// The binary kind for an expression operator.
    pub fn from_operator(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => RelationshipKind::Addition,
            BinaryOp::Sub => RelationshipKind::Subtraction,
            BinaryOp::Mul => RelationshipKind::Multiplication,
            BinaryOp::Div => RelationshipKind::Division,
        }
    }
}

/// `result = a op b`
fn forward(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
    }
}

/// Solve `result = a op b` for `a`.
fn solve_first(op: BinaryOp, b: f64, result: f64) -> f64 {
    match op {
        BinaryOp::Add => result - b,
        BinaryOp::Sub => result + b,
        BinaryOp::Mul => result / b,
        BinaryOp::Div => result * b,
    }
}

/// Solve `result = a op b` for `b`.
fn solve_second(op: BinaryOp, a: f64, result: f64) -> f64 {
    match op {
        BinaryOp::Add => result - a,
        BinaryOp::Sub => a - result,
        BinaryOp::Mul => result / a,
        BinaryOp::Div => a / result,
    }
}

/// A relationship between operands with fixed roles.
///
/// Operand order:
/// - `Equality`: `[left, right]`
/// - binary kinds: `[operand1, operand2, result]`
/// - `Custom`: `[params..., output]`
#[derive(Debug, Clone)]
pub struct Relationship {
    id: RelationshipId,
    kind: RelationshipKind,
    operands: SmallVec<[Operand; 3]>,
}

impl Relationship {
    pub(crate) fn equality(id: RelationshipId, left: Operand, right: Operand) -> Self {
        Self {
            id,
            kind: RelationshipKind::Equality,
            operands: SmallVec::from_slice(&[left, right]),
        }
    }

    pub(crate) fn binary(
        id: RelationshipId,
        kind: RelationshipKind,
        operand1: Operand,
        operand2: Operand,
        result: Operand,
    ) -> Self {
        debug_assert!(kind.operator().is_some());
        Self {
            id,
            kind,
            operands: SmallVec::from_slice(&[operand1, operand2, result]),
        }
    }

    pub(crate) fn custom(
        id: RelationshipId,
        name: String,
        func: Function,
        params: impl IntoIterator<Item = Operand>,
        output: Operand,
    ) -> Self {
        let mut operands: SmallVec<[Operand; 3]> = params.into_iter().collect();
        operands.push(output);
        Self {
            id,
            kind: RelationshipKind::Custom { name, func },
            operands,
        }
    }

    pub fn id(&self) -> RelationshipId {
        self.id
    }

    pub fn kind(&self) -> &RelationshipKind {
        &self.kind
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Variables referenced by this relationship, in role order.
    ///
    /// A variable filling several roles appears once per role.
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.operands.iter().filter_map(Operand::variable)
    }

    /// Whether every role is a literal.
    pub fn is_static(&self) -> bool {
        self.variables().next().is_none()
    }

    /// Work out which operand can be computed from the present ones.
    ///
    /// `value_of` returns the value of an operand if it is present in the
    /// current pass. The first satisfied case wins: operand pair, then
    /// (result, operand1), then (result, operand2). When every role is
    /// present the first case still fires so the write re-checks
    /// consistency.
    pub fn derive<F>(&self, value_of: F) -> Option<(Operand, f64)>
    where
        F: Fn(Operand) -> Option<f64>,
    {
        let ops = &self.operands;
        match &self.kind {
            RelationshipKind::Equality => match (value_of(ops[0]), value_of(ops[1])) {
                (Some(left), _) => Some((ops[1], left)),
                (None, Some(right)) => Some((ops[0], right)),
                (None, None) => None,
            },
            RelationshipKind::Custom { func, .. } => {
                let (output, params) = ops.split_last()?;
                let inputs: Option<SmallVec<[f64; 4]>> = params.iter().map(|&p| value_of(p)).collect();
                inputs.map(|inputs| (*output, func(inputs.as_slice())))
            }
            kind => {
                let op = kind.operator()?;
                let a = value_of(ops[0]);
                let b = value_of(ops[1]);
                let result = value_of(ops[2]);
                match (a, b, result) {
                    (Some(a), Some(b), _) => Some((ops[2], forward(op, a, b))),
                    (Some(a), None, Some(r)) => Some((ops[1], solve_second(op, a, r))),
                    (None, Some(b), Some(r)) => Some((ops[0], solve_first(op, b, r))),
                    _ => None,
                }
            }
        }
    }

    /// Render the relationship using `name_of` to print operands.
    pub fn render<F>(&self, name_of: F) -> String
    where
        F: Fn(Operand) -> String,
    {
        let ops = &self.operands;
        match &self.kind {
            RelationshipKind::Equality => format!("{} = {}", name_of(ops[0]), name_of(ops[1])),
            RelationshipKind::Custom { name, .. } => {
                let (output, params) = match ops.split_last() {
                    Some(split) => split,
                    None => return format!("{}()", name),
                };
                let params: Vec<String> = params.iter().map(|&p| name_of(p)).collect();
                format!("{} = {}({})", name_of(*output), name, params.join(", "))
            }
            kind => format!(
                "{} = {} {} {}",
                name_of(ops[2]),
                name_of(ops[0]),
                kind.operator().map(|op| op.symbol()).unwrap_or('?'),
                name_of(ops[1])
            ),
        }
    }
}
