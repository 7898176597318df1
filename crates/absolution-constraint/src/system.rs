//! The constraint system: registry of variables and relationships.
//!
//! The system owns every variable and relationship and drives propagation.
//! Writing a derived value notifies the variable's listeners and then every
//! attached relationship, depth first, before the write returns.

use std::collections::HashMap;
use std::fmt;

use absolution_core::{close_enough, ConstraintError, DEFAULT_TOLERANCE};
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::function::{Function, FunctionRegistry};
use crate::relationship::{Operand, Relationship, RelationshipId, RelationshipKind};
use crate::variable::{PassId, Provenance, Variable, VariableId};

/// Options for a constraint system.
#[derive(Debug, Clone)]
pub struct SystemOptions {
    /// Absolute difference under which two derived values agree
    pub tolerance: f64,
    /// Prefix for the generated names of transient variables
    pub transient_prefix: String,
}

impl Default for SystemOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            transient_prefix: "$".to_string(),
        }
    }
}

/// Handle to a change listener registered with [`System::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// An argument to a declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A variable looked up (or created) by name
    Name(String),
    /// A literal number
    Number(f64),
    /// An existing variable
    Variable(VariableId),
}

impl From<&str> for Value {
    fn from(name: &str) -> Self {
        Value::Name(name.to_string())
    }
}

impl From<String> for Value {
    fn from(name: String) -> Self {
        Value::Name(name)
    }
}

impl From<&String> for Value {
    fn from(name: &String) -> Self {
        Value::Name(name.clone())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<VariableId> for Value {
    fn from(id: VariableId) -> Self {
        Value::Variable(id)
    }
}

struct Listener {
    variable: VariableId,
    callback: Box<dyn FnMut(&str, f64)>,
}

/// A network of variables linked by relationships.
pub struct System {
    options: SystemOptions,
    variables: HashMap<VariableId, Variable>,
    /// Named lookup, in creation order
    names: IndexMap<String, VariableId>,
    /// Relationships in registration order
    relationships: IndexMap<RelationshipId, Relationship>,
    functions: FunctionRegistry,
    listeners: HashMap<ListenerId, Listener>,
    pass: PassId,
    next_variable: usize,
    next_relationship: u64,
    next_listener: u64,
    /// Counter for transient names
    sequence: u64,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("pass", &self.pass)
            .field("variables", &self.names.len())
            .field("relationships", &self.relationships.len())
            .field("functions", &self.functions)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl System {
    /// Create an empty system with default options.
    pub fn new() -> Self {
        Self::with_options(SystemOptions::default())
    }

    /// Create an empty system.
    pub fn with_options(options: SystemOptions) -> Self {
        Self {
            options,
            variables: HashMap::new(),
            names: IndexMap::new(),
            relationships: IndexMap::new(),
            functions: FunctionRegistry::new(),
            listeners: HashMap::new(),
            pass: PassId::default(),
            next_variable: 0,
            next_relationship: 0,
            next_listener: 0,
            sequence: 0,
        }
    }

    /// Use `functions` for `call` relationships.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn options(&self) -> &SystemOptions {
        &self.options
    }

    /// Drop every variable, relationship, listener and function.
    pub fn reset(&mut self) {
        self.variables.clear();
        self.names.clear();
        self.relationships.clear();
        self.functions = FunctionRegistry::new();
        self.listeners.clear();
        self.pass = PassId::default();
        self.sequence = 0;
    }

    // ------------------------------------------------------------------
    // Functions

    /// Register a function for use in `call` relationships and expressions.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&[f64]) -> f64 + 'static,
    ) -> Result<(), ConstraintError> {
        self.functions.register(name, func)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    pub(crate) fn function(&self, name: &str) -> Result<Function, ConstraintError> {
        self.functions.get(name)
    }

    // ------------------------------------------------------------------
    // Passes

    /// The pass used by reads and by immediate propagation.
    pub fn current_pass(&self) -> PassId {
        self.pass
    }

    /// Advance to a new pass and return it.
    ///
    /// Every derived value from earlier passes becomes stale.
    pub fn next_pass(&mut self) -> PassId {
        self.pass = self.pass.next();
        self.pass
    }

    /// Notify every relationship once, in registration order.
    ///
    /// Calling this again with the same pass is a no-op for a stable graph.
    pub fn solve(&mut self, pass: PassId) -> Result<(), ConstraintError> {
        self.pass = pass;
        debug!(%pass, relationships = self.relationships.len(), "solving");
        let ids: Vec<RelationshipId> = self.relationships.keys().copied().collect();
        for id in ids {
            self.notify(id, pass)?;
        }
        Ok(())
    }

    /// Start a new pass and solve it.
    pub fn solve_next(&mut self) -> Result<PassId, ConstraintError> {
        let pass = self.next_pass();
        self.solve(pass)?;
        Ok(pass)
    }

    // ------------------------------------------------------------------
    // Variables

    /// Check if a variable exists.
    pub fn has(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn variable_id(&self, name: &str) -> Option<VariableId> {
        self.names.get(name).copied()
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variable_id(name).and_then(|id| self.variables.get(&id))
    }

    pub fn variable_by_id(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(&id)
    }

    /// Names of all live variables, in creation order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// Get or create a variable.
    pub fn get_or_create(&mut self, name: &str) -> VariableId {
        match self.names.get(name) {
            Some(&id) => id,
            None => self.create_variable(name.to_string(), false),
        }
    }

    /// Create a variable with a unique generated name.
    pub fn create_transient(&mut self) -> VariableId {
        let name = loop {
            self.sequence += 1;
            let name = format!("{}{}", self.options.transient_prefix, self.sequence);
            if !self.names.contains_key(&name) {
                break name;
            }
        };
        self.create_variable(name, true)
    }

    fn create_variable(&mut self, name: String, transient: bool) -> VariableId {
        let id = VariableId(self.next_variable);
        self.next_variable += 1;

        let mut variable = Variable::new(name.clone()).with_tolerance(self.options.tolerance);
        if transient {
            variable = variable.transient();
        }
        self.variables.insert(id, variable);
        self.names.insert(name, id);
        id
    }

    /// Get a variable's value in the current pass.
    pub fn get(&self, name: &str) -> Result<f64, ConstraintError> {
        self.value(name).ok_or_else(|| ConstraintError::Unset {
            variable: name.to_string(),
        })
    }

    /// Get a variable's value in the current pass, if any.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.variable(name).and_then(|v| v.value_for(self.pass))
    }

    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.variable(name).map(Variable::provenance)
    }

    /// Assign a variable's value. Does not propagate.
    pub fn assign(&mut self, name: &str, value: f64) {
        let id = self.get_or_create(name);
        if let Some(variable) = self.variables.get_mut(&id) {
            variable.assign(value);
        }
    }

    /// Record an externally observed value. Does not propagate.
    pub fn assign_environment(&mut self, name: &str, value: f64) {
        let id = self.get_or_create(name);
        if let Some(variable) = self.variables.get_mut(&id) {
            variable.set_environment(value);
        }
    }

    /// Replace a variable's value and propagate it within the current pass.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ConstraintError> {
        let id = self.get_or_create(name);
        if let Some(variable) = self.variables.get_mut(&id) {
            variable.clear();
        }
        self.set_derived(id, value, self.pass, None)
    }

    /// Clear a single variable's value, whatever its provenance.
    pub fn clear(&mut self, name: &str) {
        if let Some(id) = self.variable_id(name) {
            if let Some(variable) = self.variables.get_mut(&id) {
                variable.clear();
            }
        }
    }

    /// Clear every variable that doesn't hold a persistent value.
    pub fn clear_all(&mut self) {
        for variable in self.variables.values_mut() {
            if !variable.provenance().is_persistent() {
                variable.clear();
            }
        }
    }

    // ------------------------------------------------------------------
    // Listeners

    /// Call `callback` whenever propagation stores a new value in `name`.
    pub fn on_change(
        &mut self,
        name: &str,
        callback: impl FnMut(&str, f64) + 'static,
    ) -> ListenerId {
        let variable = self.get_or_create(name);
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;

        if let Some(v) = self.variables.get_mut(&variable) {
            v.add_listener(id);
        }
        self.listeners.insert(
            id,
            Listener {
                variable,
                callback: Box::new(callback),
            },
        );
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        if let Some(listener) = self.listeners.remove(&id) {
            if let Some(v) = self.variables.get_mut(&listener.variable) {
                v.remove_listener(id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Declarations

    /// left = right
    pub fn equals(
        &mut self,
        left: impl Into<Value>,
        right: impl Into<Value>,
    ) -> Result<RelationshipId, ConstraintError> {
        let left = self.operand_for(left.into());
        let right = self.operand_for(right.into());
        let id = self.next_relationship_id();
        self.declare(Relationship::equality(id, left, right))
    }

    /// sum = addend1 + addend2
    pub fn add(
        &mut self,
        sum: impl Into<Value>,
        addend1: impl Into<Value>,
        addend2: impl Into<Value>,
    ) -> Result<RelationshipId, ConstraintError> {
        self.binary(RelationshipKind::Addition, sum.into(), addend1.into(), addend2.into())
    }

    /// difference = minuend - subtrahend
    pub fn subtract(
        &mut self,
        difference: impl Into<Value>,
        minuend: impl Into<Value>,
        subtrahend: impl Into<Value>,
    ) -> Result<RelationshipId, ConstraintError> {
        self.binary(
            RelationshipKind::Subtraction,
            difference.into(),
            minuend.into(),
            subtrahend.into(),
        )
    }

    /// product = mult1 * mult2
    pub fn multiply(
        &mut self,
        product: impl Into<Value>,
        mult1: impl Into<Value>,
        mult2: impl Into<Value>,
    ) -> Result<RelationshipId, ConstraintError> {
        self.binary(RelationshipKind::Multiplication, product.into(), mult1.into(), mult2.into())
    }

    /// quotient = dividend / divisor
    pub fn divide(
        &mut self,
        quotient: impl Into<Value>,
        dividend: impl Into<Value>,
        divisor: impl Into<Value>,
    ) -> Result<RelationshipId, ConstraintError> {
        self.binary(RelationshipKind::Division, quotient.into(), dividend.into(), divisor.into())
    }

    /// out = func(params...)
    pub fn call<I, V>(
        &mut self,
        func: &str,
        out: impl Into<Value>,
        params: I,
    ) -> Result<RelationshipId, ConstraintError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let function = self.function(func)?;
        let params: SmallVec<[Operand; 4]> = params
            .into_iter()
            .map(|p| self.operand_for(p.into()))
            .collect();
        let out = self.operand_for(out.into());
        let id = self.next_relationship_id();
        self.declare(Relationship::custom(id, func.to_string(), function, params, out))
    }

    pub(crate) fn binary(
        &mut self,
        kind: RelationshipKind,
        result: Value,
        operand1: Value,
        operand2: Value,
    ) -> Result<RelationshipId, ConstraintError> {
        let operand1 = self.operand_for(operand1);
        let operand2 = self.operand_for(operand2);
        let result = self.operand_for(result);
        let id = self.next_relationship_id();
        self.declare(Relationship::binary(id, kind, operand1, operand2, result))
    }

    fn next_relationship_id(&mut self) -> RelationshipId {
        let id = RelationshipId(self.next_relationship);
        self.next_relationship += 1;
        id
    }

    fn operand_for(&mut self, value: Value) -> Operand {
        match value {
            Value::Name(name) => Operand::Variable(self.get_or_create(&name)),
            Value::Number(n) => Operand::Literal(n),
            Value::Variable(id) => Operand::Variable(id),
        }
    }

    /// Register a relationship, attach it and propagate it in the current pass.
    fn declare(&mut self, relationship: Relationship) -> Result<RelationshipId, ConstraintError> {
        if relationship.is_static() {
            self.check_static(&relationship)?;
        }

        let id = relationship.id();
        for variable in relationship.variables() {
            if let Some(v) = self.variables.get_mut(&variable) {
                v.attach(id);
            }
        }
        trace!(relationship = %id, expr = %self.render(&relationship), "declared");
        self.relationships.insert(id, relationship);

        // A rejected declaration leaves nothing behind.
        if let Err(err) = self.notify(id, self.pass) {
            self.destroy_relationship(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Id the next declared relationship will get.
    pub(crate) fn relationship_mark(&self) -> u64 {
        self.next_relationship
    }

    /// Destroy every relationship declared since `mark`.
    pub(crate) fn destroy_since(&mut self, mark: u64) {
        let ids: Vec<RelationshipId> = self
            .relationships
            .keys()
            .copied()
            .filter(|id| id.0 >= mark)
            .collect();
        for id in ids {
            self.destroy_relationship(id);
        }
    }

    /// A relationship over literals only must already hold.
    fn check_static(&self, relationship: &Relationship) -> Result<(), ConstraintError> {
        let derived = relationship.derive(|op| self.operand_value(op, self.pass));
        if let Some((Operand::Literal(current), value)) = derived {
            if !close_enough(current, value, self.options.tolerance) {
                return Err(ConstraintError::OverConstrained {
                    relationship: self.render(relationship),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Propagation

    fn operand_value(&self, operand: Operand, pass: PassId) -> Option<f64> {
        match operand {
            Operand::Literal(v) => Some(v),
            Operand::Variable(id) => self.variables.get(&id).and_then(|v| v.value_for(pass)),
        }
    }

    /// Let a relationship derive whatever it can.
    fn notify(&mut self, id: RelationshipId, pass: PassId) -> Result<(), ConstraintError> {
        let derived = match self.relationships.get(&id) {
            Some(relationship) => relationship.derive(|op| self.operand_value(op, pass)),
            None => return Ok(()),
        };
        match derived {
            Some((target, value)) => self.write(target, value, pass, id),
            None => Ok(()),
        }
    }

    fn write(
        &mut self,
        target: Operand,
        value: f64,
        pass: PassId,
        by: RelationshipId,
    ) -> Result<(), ConstraintError> {
        match target {
            Operand::Variable(id) => self.set_derived(id, value, pass, Some(by)),
            Operand::Literal(current) => {
                if close_enough(current, value, self.options.tolerance) {
                    Ok(())
                } else {
                    let err = ConstraintError::Contradiction {
                        variable: self.variable_names_of(by).unwrap_or_else(|| current.to_string()),
                        current,
                        attempted: value,
                    };
                    warn!(relationship = %by, error = %err, "literal contradicted");
                    Err(err)
                }
            }
        }
    }

    /// The propagation write path.
    fn set_derived(
        &mut self,
        id: VariableId,
        value: f64,
        pass: PassId,
        by: Option<RelationshipId>,
    ) -> Result<(), ConstraintError> {
        let Some(variable) = self.variables.get_mut(&id) else {
            return Ok(());
        };
        match variable.set_derived(value, pass, by) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(err) => {
                warn!(error = %err, "contradiction");
                return Err(err);
            }
        }
        trace!(variable = variable.name(), value, %pass, "derived");

        let name = variable.name().to_string();
        let listeners: SmallVec<[_; 1]> = SmallVec::from_slice(variable.listeners());
        let dependents: SmallVec<[_; 4]> = SmallVec::from_slice(variable.relationships());

        for listener in listeners {
            if let Some(listener) = self.listeners.get_mut(&listener) {
                (listener.callback)(&name, value);
            }
        }
        for relationship in dependents {
            self.notify(relationship, pass)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Destruction

    /// Destroy a relationship and any variables it leaves orphaned.
    ///
    /// Destroying a relationship that no longer exists is a no-op.
    pub fn destroy_relationship(&mut self, id: RelationshipId) {
        let Some(relationship) = self.relationships.shift_remove(&id) else {
            return;
        };
        debug!(relationship = %id, "destroying relationship");

        for variable in relationship.variables() {
            let orphaned = match self.variables.get_mut(&variable) {
                Some(v) => {
                    v.detach(id);
                    v.can_destroy()
                }
                None => false,
            };
            if orphaned {
                self.destroy_variable_by_id(variable);
            }
        }
    }

    /// Destroy a named variable and every relationship attached to it.
    pub fn destroy_variable(&mut self, name: &str) {
        if let Some(id) = self.variable_id(name) {
            self.destroy_variable_by_id(id);
        }
    }

    fn destroy_variable_by_id(&mut self, id: VariableId) {
        let Some(variable) = self.variables.remove(&id) else {
            return;
        };
        debug!(variable = variable.name(), "destroying variable");
        self.names.shift_remove(variable.name());
        for listener in variable.listeners() {
            self.listeners.remove(listener);
        }
        for &relationship in variable.relationships() {
            self.destroy_relationship(relationship);
        }
    }

    // ------------------------------------------------------------------
    // Introspection

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(&id)
    }

    /// Relationships in registration order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    /// Relationships attached to `name`, in attachment order.
    pub fn relationships_involving(&self, name: &str) -> Vec<RelationshipId> {
        self.variable(name)
            .map(|v| v.relationships().to_vec())
            .unwrap_or_default()
    }

    /// Render a relationship as text, e.g. `sum = x + y`.
    pub fn describe(&self, id: RelationshipId) -> Option<String> {
        self.relationships.get(&id).map(|r| self.render(r))
    }

    /// Names of the variables a relationship references, comma separated.
    fn variable_names_of(&self, id: RelationshipId) -> Option<String> {
        let relationship = self.relationships.get(&id)?;
        let mut names: Vec<&str> = relationship
            .variables()
            .filter_map(|v| self.variable_by_id(v))
            .map(Variable::name)
            .collect();
        names.dedup();
        if names.is_empty() {
            None
        } else {
            Some(names.join(", "))
        }
    }

    fn render(&self, relationship: &Relationship) -> String {
        relationship.render(|op| match op {
            Operand::Variable(id) => self
                .variable_by_id(id)
                .map_or_else(|| "?".to_string(), |v| v.name().to_string()),
            Operand::Literal(v) => v.to_string(),
        })
    }

    /// Dump all relationships as text, one per line.
    ///
    /// With a filter, only lines containing it are kept.
    pub fn dump(&self, filter: Option<&str>) -> String {
        self.relationships
            .values()
            .map(|r| self.render(r))
            .filter(|line| filter.map_or(true, |f| line.contains(f)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;

    fn solved(system: &mut System) -> PassId {
        system.solve_next().unwrap()
    }

    #[test]
    fn test_equality() {
        let mut system = System::new();
        system.equals("A", "B").unwrap();
        system.assign("A", 5.0);
        solved(&mut system);
        assert_eq!(system.get("B"), Ok(5.0));
    }

    #[test]
    fn test_addition() {
        let mut system = System::new();
        system.add("sum", "x", "y").unwrap();
        system.assign("x", 2.0);
        system.assign("y", 3.0);
        solved(&mut system);
        assert_eq!(system.get("sum"), Ok(5.0));
    }

    #[test]
    fn test_addition_back_solve() {
        let mut system = System::new();
        system.add("sum", "x", "y").unwrap();
        system.assign("sum", 10.0);
        system.assign("x", 4.0);
        solved(&mut system);
        assert_eq!(system.get("y"), Ok(6.0));
    }

    #[test]
    fn test_subtraction() {
        let mut system = System::new();
        system.subtract("A", "B", "C").unwrap();
        system.assign("B", 10.0);
        system.assign("C", 5.0);
        solved(&mut system);
        assert_eq!(system.get("A"), Ok(5.0));
    }

    #[test]
    fn test_multiplication() {
        let mut system = System::new();
        system.multiply("A", "B", "C").unwrap();
        system.assign("B", 5.0);
        system.assign("C", 5.0);
        solved(&mut system);
        assert_eq!(system.get("A"), Ok(25.0));
    }

    #[test]
    fn test_division_back_solve() {
        let mut system = System::new();
        system.divide("q", "d", "v").unwrap();
        system.assign("q", 4.0);
        system.assign("v", 2.0);
        solved(&mut system);
        assert_eq!(system.get("d"), Ok(8.0));
    }

    #[test]
    fn test_division_by_zero_propagates() {
        let mut system = System::new();
        system.divide("q", "a", "b").unwrap();
        system.assign("a", 1.0);
        system.assign("b", 0.0);
        solved(&mut system);
        assert!(system.get("q").unwrap().is_infinite());
    }

    #[test]
    fn test_chain_propagates_depth_first() {
        let mut system = System::new();
        system.equals("A", "B").unwrap();
        system.add("C", "B", 1.0).unwrap();
        system.multiply("D", "C", 2.0).unwrap();
        system.assign("A", 4.0);
        solved(&mut system);
        assert_eq!(system.get("D"), Ok(10.0));
    }

    #[test]
    fn test_declaration_propagates_immediately() {
        let mut system = System::new();
        system.assign("x", 3.0);
        system.add("y", "x", 1.0).unwrap();
        assert_eq!(system.get("y"), Ok(4.0));
    }

    #[test]
    fn test_set_propagates_immediately() {
        let mut system = System::new();
        system.equals("A", "B").unwrap();
        system.set("A", 321.0).unwrap();
        assert_eq!(system.get("B"), Ok(321.0));
    }

    #[test]
    fn test_cycle_with_conflicting_assignments_contradicts() {
        let mut system = System::new();
        system.equals("A", "B").unwrap();
        system.equals("B", "A").unwrap();
        system.assign("A", 1.0);
        system.assign("B", 2.0);
        let err = system.solve_next().unwrap_err();
        assert!(matches!(err, ConstraintError::Contradiction { .. }));
    }

    #[test]
    fn test_converging_cycle_terminates() {
        let mut system = System::new();
        system.equals("A", "B").unwrap();
        system.equals("B", "A").unwrap();
        system.assign("A", 1.0);
        solved(&mut system);
        assert_eq!(system.get("B"), Ok(1.0));
    }

    #[test]
    fn test_tolerance_within_pass() {
        let mut system = System::new();
        system.equals("B", "A").unwrap();
        system.equals("B", "C").unwrap();
        system.assign("A", 5.0);
        system.assign("C", 5.0005);
        solved(&mut system);
        assert_eq!(system.get("B"), Ok(5.0));

        system.assign("C", 5.002);
        let err = system.solve_next().unwrap_err();
        assert_eq!(
            err,
            ConstraintError::Contradiction {
                variable: "C".into(),
                current: 5.002,
                attempted: 5.0,
            }
        );
    }

    #[test]
    fn test_solve_is_idempotent() {
        let mut system = System::new();
        system.set_text("C", "L + (W / 2)").unwrap();
        system.assign("L", 10.0);
        system.assign("W", 6.0);
        let pass = solved(&mut system);
        let first: Vec<_> = system.variable_names().map(|n| system.value(n)).collect();
        system.solve(pass).unwrap();
        let second: Vec<_> = system.variable_names().map(|n| system.value(n)).collect();
        assert_eq!(first, second);
        assert_eq!(system.get("C"), Ok(13.0));
    }

    #[test]
    fn test_persistent_values_survive_clear_all() {
        let mut system = System::new();
        system.add("sum", "x", "y").unwrap();
        system.assign("x", 2.0);
        system.assign_environment("y", 3.0);
        solved(&mut system);

        system.clear_all();
        assert_eq!(system.get("x"), Ok(2.0));
        assert_eq!(system.get("y"), Ok(3.0));
        assert_eq!(
            system.get("sum"),
            Err(ConstraintError::Unset { variable: "sum".into() })
        );

        let pass = solved(&mut system);
        assert_eq!(system.get("sum"), Ok(5.0));
        assert!(matches!(
            system.provenance("sum"),
            Some(Provenance::Derived { pass: p, by: Some(_) }) if p == pass
        ));
    }

    #[test]
    fn test_derived_values_go_stale_on_new_pass() {
        let mut system = System::new();
        system.equals("A", "B").unwrap();
        system.assign("A", 1.0);
        solved(&mut system);
        assert_eq!(system.get("B"), Ok(1.0));

        system.next_pass();
        assert!(system.get("B").is_err());
        assert_eq!(system.variable("B").unwrap().stored_value(), Some(1.0));
    }

    #[test]
    fn test_new_pass_allows_changed_inputs() {
        let mut system = System::new();
        system.add("sum", "x", "y").unwrap();
        system.assign("x", 1.0);
        system.assign("y", 1.0);
        solved(&mut system);
        system.assign("y", 5.0);
        solved(&mut system);
        assert_eq!(system.get("sum"), Ok(6.0));
    }

    #[test]
    fn test_get_unknown_is_unset() {
        let system = System::new();
        assert_eq!(
            system.get("nothing"),
            Err(ConstraintError::Unset { variable: "nothing".into() })
        );
        assert!(!system.has("nothing"));
    }

    #[test]
    fn test_static_relationships() {
        let mut system = System::new();
        assert!(system.add(5.0, 2.0, 3.0).is_ok());
        assert_eq!(
            system.equals(3.0, 4.0),
            Err(ConstraintError::OverConstrained { relationship: "3 = 4".into() })
        );
    }

    #[test]
    fn test_literal_operand_contradiction() {
        let mut system = System::new();
        system.equals("A", 5.0).unwrap();
        system.assign("A", 6.0);
        let err = system.solve_next().unwrap_err();
        assert_eq!(
            err,
            ConstraintError::Contradiction {
                variable: "A".into(),
                current: 5.0,
                attempted: 6.0,
            }
        );
    }

    #[test]
    fn test_contradicting_declaration_is_rolled_back() {
        let mut system = System::new();
        system.assign("x", 1.0);
        system.assign("y", 2.0);

        let err = system.equals("x", "y").unwrap_err();
        assert!(matches!(err, ConstraintError::Contradiction { .. }));
        assert_eq!(system.relationship_count(), 0);
        assert!(system.relationships_involving("x").is_empty());
        assert!(system.relationships_involving("y").is_empty());

        // Later passes aren't poisoned by the rejected rule.
        system.add("sum", "x", "y").unwrap();
        system.solve_next().unwrap();
        assert_eq!(system.get("sum"), Ok(3.0));
    }

    #[test]
    fn test_call() {
        let mut system = System::new();
        system
            .register_function("max", |args| args.iter().copied().fold(f64::MIN, f64::max))
            .unwrap();
        system.call("max", "out", ["a", "b"]).unwrap();
        system.assign("a", 3.0);
        system.assign("b", 7.0);
        solved(&mut system);
        assert_eq!(system.get("out"), Ok(7.0));
    }

    #[test]
    fn test_call_unknown_function_declares_nothing() {
        let mut system = System::new();
        let err = system.call("nope", "out", ["a"]).unwrap_err();
        assert_eq!(err, ConstraintError::UnknownFunction { name: "nope".into() });
        assert!(!system.has("out"));
        assert!(!system.has("a"));
        assert_eq!(system.relationship_count(), 0);
    }

    #[test]
    fn test_call_with_builtins() {
        let mut system = System::new().with_functions(FunctionRegistry::with_builtins());
        system.call("min", "out", [Value::from("a"), Value::from(2.0)]).unwrap();
        system.assign("a", 9.0);
        solved(&mut system);
        assert_eq!(system.get("out"), Ok(2.0));
    }

    #[test]
    fn test_on_change_fires_once_per_change() {
        let mut system = System::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        system.on_change("B", move |name, value| sink.borrow_mut().push((name.to_string(), value)));

        system.equals("A", "B").unwrap();
        system.assign("A", 5.0);
        let pass = solved(&mut system);
        system.solve(pass).unwrap();
        assert_eq!(*seen.borrow(), vec![("B".to_string(), 5.0)]);
    }

    #[test]
    fn test_remove_listener() {
        let mut system = System::new();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let listener = system.on_change("B", move |_, _| *sink.borrow_mut() += 1);
        system.remove_listener(listener);

        system.equals("A", "B").unwrap();
        system.assign("A", 5.0);
        solved(&mut system);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_destroy_relationship_removes_orphans() {
        let mut system = System::new();
        let r = system.add("sum", "x", "y").unwrap();
        system.assign("x", 1.0);

        system.destroy_relationship(r);
        assert_eq!(system.relationship_count(), 0);
        assert!(system.has("x"));
        assert!(!system.has("y"));
        assert!(!system.has("sum"));

        // Already gone.
        system.destroy_relationship(r);
        assert_eq!(system.relationship_count(), 0);
    }

    #[test]
    fn test_destroy_keeps_shared_variables() {
        let mut system = System::new();
        let r1 = system.equals("A", "B").unwrap();
        let r2 = system.equals("B", "C").unwrap();
        system.destroy_relationship(r1);
        assert!(!system.has("A"));
        assert!(system.has("B"));
        assert_eq!(system.relationships_involving("B"), vec![r2]);
    }

    #[test]
    fn test_destroy_variable_cascades() {
        let mut system = System::new();
        system.set_text("C", "A + B").unwrap();
        system.assign("A", 1.0);
        assert_eq!(system.relationship_count(), 2);

        system.destroy_variable("$1");
        assert_eq!(system.relationship_count(), 0);
        assert_eq!(system.variable_names().collect::<Vec<_>>(), vec!["A"]);
        assert!(system.relationships_involving("A").is_empty());

        system.destroy_variable("$1");
        system.destroy_variable("missing");
    }

    #[test]
    fn test_destroy_repeated_operand() {
        let mut system = System::new();
        let r = system.add("double", "x", "x").unwrap();
        assert_eq!(system.relationships_involving("x"), vec![r]);
        system.destroy_relationship(r);
        assert!(!system.has("x"));
        assert!(!system.has("double"));
    }

    #[test]
    fn test_destroy_cyclic_graph_terminates() {
        let mut system = System::new();
        system.equals("A", "B").unwrap();
        system.equals("B", "C").unwrap();
        system.equals("C", "A").unwrap();
        system.destroy_variable("B");
        assert_eq!(system.dump(None), "C = A");

        system.destroy_variable("A");
        assert_eq!(system.relationship_count(), 0);
        assert_eq!(system.variable_names().count(), 0);
    }

    #[test]
    fn test_transient_names_are_unique() {
        let mut system = System::new();
        system.assign("$1", 0.0);
        let t = system.create_transient();
        let v = system.variable_by_id(t).unwrap();
        assert_eq!(v.name(), "$2");
        assert!(v.is_transient());
    }

    #[test]
    fn test_reset() {
        let mut system = System::new();
        system.register_function("f", |_| 0.0).unwrap();
        system.equals("A", "B").unwrap();
        system.next_pass();
        system.reset();
        assert_eq!(system.relationship_count(), 0);
        assert!(!system.has("A"));
        assert!(!system.has_function("f"));
        assert_eq!(system.current_pass(), PassId(0));
    }

    #[test]
    fn test_dump() {
        let mut system = System::new();
        system.set_text("C", "L + (W / 2)").unwrap();
        system.add("sum", "x", 1.0).unwrap();
        insta::assert_snapshot!(system.dump(None), @r###"
        $1 = W / 2
        $2 = L + $1
        C = $2
        sum = x + 1
        "###);
        assert_eq!(system.dump(Some("sum")), "sum = x + 1");
    }

    proptest! {
        #[test]
        fn prop_addition(a in -1.0e6..1.0e6f64, b in -1.0e6..1.0e6f64) {
            let mut system = System::new();
            system.add("sum", "a", "b").unwrap();
            system.assign("a", a);
            system.assign("b", b);
            system.solve_next().unwrap();
            prop_assert_eq!(system.get("sum").unwrap(), a + b);

            let mut system = System::new();
            system.add("sum", "a", "b").unwrap();
            system.assign("sum", a + b);
            system.assign("a", a);
            system.solve_next().unwrap();
            prop_assert_eq!(system.get("b").unwrap(), (a + b) - a);
        }

        #[test]
        fn prop_subtraction(a in -1.0e6..1.0e6f64, b in -1.0e6..1.0e6f64) {
            let mut system = System::new();
            system.subtract("diff", "a", "b").unwrap();
            system.assign("a", a);
            system.assign("b", b);
            system.solve_next().unwrap();
            prop_assert_eq!(system.get("diff").unwrap(), a - b);

            let mut system = System::new();
            system.subtract("diff", "a", "b").unwrap();
            system.assign("diff", a - b);
            system.assign("b", b);
            system.solve_next().unwrap();
            prop_assert_eq!(system.get("a").unwrap(), (a - b) + b);
        }

        #[test]
        fn prop_multiplication(a in 0.5..1.0e3f64, b in -1.0e3..1.0e3f64) {
            let mut system = System::new();
            system.multiply("product", "a", "b").unwrap();
            system.assign("product", a * b);
            system.assign("a", a);
            system.solve_next().unwrap();
            prop_assert_eq!(system.get("b").unwrap(), (a * b) / a);
        }

        #[test]
        fn prop_division(q in -1.0e3..1.0e3f64, v in 0.5..1.0e3f64) {
            let mut system = System::new();
            system.divide("q", "d", "v").unwrap();
            system.assign("q", q);
            system.assign("v", v);
            system.solve_next().unwrap();
            prop_assert_eq!(system.get("d").unwrap(), q * v);
        }
    }
}
