//! Incremental constraint propagation.
//!
//! A [`System`] holds named numeric [`Variable`]s linked by
//! [`Relationship`]s (equality, the four arithmetic operations and custom
//! functions). Whenever a variable receives a value, every relationship
//! attached to it tries to compute one of its missing operands, and the
//! process repeats depth first until nothing new can be derived.
//!
//! Values are scoped to a propagation pass. Assigned and environment values
//! persist; derived values only count within the pass that produced them,
//! so starting a new pass lets the whole graph recompute from fresh inputs.
//!
//! ```
//! use absolution_constraint::System;
//!
//! let mut system = System::new();
//! system.add("sum", "x", "y").unwrap();
//! system.assign("sum", 10.0);
//! system.assign("x", 4.0);
//! system.solve_next().unwrap();
//! assert_eq!(system.get("y"), Ok(6.0));
//! ```

mod expression;
mod function;
mod relationship;
mod system;
mod variable;

pub use function::{Function, FunctionRegistry};
pub use relationship::{Operand, Relationship, RelationshipId, RelationshipKind};
pub use system::{ListenerId, System, SystemOptions, Value};
pub use variable::{PassId, Provenance, Variable, VariableId};
