//! Named numeric cells with pass-scoped provenance.

use std::fmt;

use absolution_core::{close_enough, ConstraintError, DEFAULT_TOLERANCE};
use smallvec::SmallVec;

use crate::relationship::RelationshipId;
use crate::system::ListenerId;

/// Handle to a variable owned by a [`System`](crate::System).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub(crate) usize);

/// Identifier of one propagation run.
///
/// Derived values are only valid within the pass that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PassId(pub u64);

impl PassId {
    /// The pass following this one.
    pub fn next(self) -> PassId {
        PassId(self.0 + 1)
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a variable's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provenance {
    /// No value.
    #[default]
    Unset,
    /// Set directly by a caller; survives across passes.
    Assigned,
    /// Mirrors an external reading; survives across passes.
    Environment,
    /// Produced by a relationship during `pass`.
    Derived {
        pass: PassId,
        by: Option<RelationshipId>,
    },
}

impl Provenance {
    /// Whether the value survives pass changes and `clear_all`.
    pub fn is_persistent(&self) -> bool {
        matches!(self, Provenance::Assigned | Provenance::Environment)
    }
}

/// A named numeric cell.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    value: Option<f64>,
    provenance: Provenance,
    tolerance: f64,
    transient: bool,
    relationships: SmallVec<[RelationshipId; 4]>,
    listeners: SmallVec<[ListenerId; 1]>,
}

impl Variable {
    /// Create an unset variable.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            provenance: Provenance::Unset,
            tolerance: DEFAULT_TOLERANCE,
            transient: false,
            relationships: SmallVec::new(),
            listeners: SmallVec::new(),
        }
    }

    /// Set the tolerance used to compare derived values.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Mark this variable as holding an intermediate expression result.
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The stored value, which may be stale for a derived variable.
    ///
    /// Use [`Variable::value_for`] to respect pass scoping.
    pub fn stored_value(&self) -> Option<f64> {
        self.value
    }

    /// The value if it is present for `pass`.
    pub fn value_for(&self, pass: PassId) -> Option<f64> {
        if self.has_value(pass) {
            self.value
        } else {
            None
        }
    }

    /// Authoritatively set the value. Never fails and never notifies.
    pub fn assign(&mut self, value: f64) {
        self.value = Some(value);
        self.provenance = Provenance::Assigned;
    }

    /// Set the value from an external observation. Never fails and never notifies.
    pub fn set_environment(&mut self, value: f64) {
        self.value = Some(value);
        self.provenance = Provenance::Environment;
    }

    /// Store a value produced during `pass`.
    ///
    /// Returns `Ok(true)` when the value was stored and dependents must be
    /// notified, `Ok(false)` when an equal value was already present.
    pub fn set_derived(
        &mut self,
        value: f64,
        pass: PassId,
        by: Option<RelationshipId>,
    ) -> Result<bool, ConstraintError> {
        if let Some(current) = self.value_for(pass) {
            if close_enough(current, value, self.tolerance) {
                return Ok(false);
            }
            return Err(ConstraintError::Contradiction {
                variable: self.name.clone(),
                current,
                attempted: value,
            });
        }
        self.value = Some(value);
        self.provenance = Provenance::Derived { pass, by };
        Ok(true)
    }

    /// Check if the variable has a value usable during `pass`.
    pub fn has_value(&self, pass: PassId) -> bool {
        match self.provenance {
            Provenance::Unset => false,
            Provenance::Assigned | Provenance::Environment => true,
            Provenance::Derived { pass: p, .. } => p == pass,
        }
    }

    /// Drop the value, whatever its provenance.
    pub fn clear(&mut self) {
        self.value = None;
        self.provenance = Provenance::Unset;
    }

    /// Orphaned and not holding a persistent value.
    pub fn can_destroy(&self) -> bool {
        self.relationships.is_empty() && !self.provenance.is_persistent()
    }

    pub(crate) fn attach(&mut self, relationship: RelationshipId) {
        if !self.relationships.contains(&relationship) {
            self.relationships.push(relationship);
        }
    }

    pub(crate) fn detach(&mut self, relationship: RelationshipId) {
        self.relationships.retain(|r| *r != relationship);
    }

    /// Attached relationships in attachment order.
    pub fn relationships(&self) -> &[RelationshipId] {
        &self.relationships
    }

    pub(crate) fn add_listener(&mut self, listener: ListenerId) {
        self.listeners.push(listener);
    }

    pub(crate) fn remove_listener(&mut self, listener: ListenerId) {
        self.listeners.retain(|l| *l != listener);
    }

    pub(crate) fn listeners(&self) -> &[ListenerId] {
        &self.listeners
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{}({})", self.name, v),
            None => write!(f, "{}(unset)", self.name),
        }
    }
}
