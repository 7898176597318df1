//! Managed rects.

use absolution_constraint::{Provenance, RelationshipId, System, Value};
use absolution_core::{Axis, ConstraintError, LayoutError, Property, RectPosition, RectUpdate};
use tracing::debug;

use crate::axis::{AxisVariables, ConstrainedAxis};

/// A rule declared on a region, e.g. `left = sidebar.right + 8`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub property: Property,
    pub text: String,
    pub relationship: RelationshipId,
}

/// A rect whose edges, size and center are variables in a [`System`].
///
/// For each axis the region declares
///
/// ```text
/// <id>.right    = <id>.left + <id>.width
/// <id>.center-x = <id>.left + <id>.width / 2
/// ```
///
/// and the same for `top`/`bottom`/`height`/`center-y`.
#[derive(Debug, Clone)]
pub struct Region {
    id: String,
    x: ConstrainedAxis,
    y: ConstrainedAxis,
    x_vars: AxisVariables,
    y_vars: AxisVariables,
    rules: Vec<Rule>,
}

impl Region {
    /// Create a region and declare its internal relationships.
    ///
    /// Axes compare positions with the system's tolerance. If a declaration
    /// contradicts values already in the system, nothing is left declared.
    pub fn new(system: &mut System, id: impl Into<String>) -> Result<Self, LayoutError> {
        let id = id.into();
        let tolerance = system.options().tolerance;
        let region = Self {
            x: ConstrainedAxis::new(Axis::X).with_tolerance(tolerance),
            y: ConstrainedAxis::new(Axis::Y).with_tolerance(tolerance),
            x_vars: AxisVariables::new(&id, Axis::X),
            y_vars: AxisVariables::new(&id, Axis::Y),
            rules: Vec::new(),
            id,
        };
        let mut declared = Vec::new();
        if let Err(err) = region.declare_internal(system, &mut declared) {
            for relationship in declared {
                system.destroy_relationship(relationship);
            }
            return Err(err.into());
        }
        debug!(region = %region.id, "registered region");
        Ok(region)
    }

    fn declare_internal(
        &self,
        system: &mut System,
        declared: &mut Vec<RelationshipId>,
    ) -> Result<(), ConstraintError> {
        for vars in [&self.x_vars, &self.y_vars] {
            declared.push(system.add(&vars.end, &vars.offset, &vars.size)?);
            let half = system.create_transient();
            declared.push(system.divide(half, &vars.size, 2.0)?);
            declared.push(system.add(&vars.center, &vars.offset, Value::Variable(half))?);
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn axis(&self, axis: Axis) -> &ConstrainedAxis {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut ConstrainedAxis {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    pub fn variables(&self, axis: Axis) -> &AxisVariables {
        match axis {
            Axis::X => &self.x_vars,
            Axis::Y => &self.y_vars,
        }
    }

    /// The variable backing `property`, e.g. `box.center-x`.
    pub fn variable(&self, property: Property) -> &str {
        self.variables(property.axis()).get(property)
    }

    /// Every variable of this region.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.x_vars.iter().chain(self.y_vars.iter())
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Constrain `property` to the expression `text`.
    ///
    /// The axis is checked first; an over-constrained axis leaves the
    /// system untouched. A rule that fails to declare leaves the axis as it
    /// was and puts back any observation it cleared.
    pub fn constrain(
        &mut self,
        system: &mut System,
        property: Property,
        text: &str,
    ) -> Result<RelationshipId, LayoutError> {
        let axis = property.axis();
        let current = *self.axis(axis);
        let next = current.constrain(property)?;

        // Drop stale observations of whatever the rule takes over.
        let vars = self.variables(axis);
        let mut taken = Vec::new();
        if next.owns_offset() && !current.owns_offset() {
            taken.push(vars.offset.clone());
        }
        if next.owns_size() && !current.owns_size() {
            taken.push(vars.size.clone());
        }
        let cleared: Vec<_> = taken
            .into_iter()
            .map(|name| {
                let saved = system
                    .variable(&name)
                    .and_then(|v| v.stored_value().map(|value| (v.provenance(), value)));
                system.clear(&name);
                (name, saved)
            })
            .collect();

        let target = self.variable(property).to_string();
        let relationship = match system.set_text(&target, text) {
            Ok(relationship) => relationship,
            Err(source) => {
                for (name, saved) in cleared {
                    match saved {
                        Some((Provenance::Environment, value)) => system.assign_environment(&name, value),
                        Some((Provenance::Assigned, value)) => system.assign(&name, value),
                        _ => {}
                    }
                }
                return Err(LayoutError::Rule {
                    property: property.name().to_string(),
                    text: text.to_string(),
                    source,
                });
            }
        };

        *self.axis_mut(axis) = next;
        self.rules.push(Rule {
            property,
            text: text.to_string(),
            relationship,
        });
        Ok(relationship)
    }

    /// Check if any solved field differs between `a` and `b`.
    pub fn constrained_differ(&self, a: &RectPosition, b: &RectPosition) -> bool {
        self.x.constrained_differ(a, b) || self.y.constrained_differ(a, b)
    }

    /// Check if any observed field differs between `a` and `b`.
    pub fn independent_differ(&self, a: &RectPosition, b: &RectPosition) -> bool {
        self.x.independent_differ(a, b) || self.y.independent_differ(a, b)
    }

    /// Push the observed fields of `position` into the system.
    pub fn push_to_system(&self, system: &mut System, position: &RectPosition) {
        self.x.push_to_system(system, &self.x_vars, position);
        self.y.push_to_system(system, &self.y_vars, position);
    }

    /// Build the write-back for this region from the solved values.
    ///
    /// Unmarked fields keep their `observed` values. Fails with `Unset` if
    /// a solved field has no value in the current pass.
    pub fn pull_to_geometry(&self, system: &System, observed: &RectPosition) -> Result<RectUpdate, LayoutError> {
        let mut update = RectUpdate {
            position: *observed,
            ..RectUpdate::default()
        };
        self.x.pull_to_geometry(&mut update);
        self.y.pull_to_geometry(&mut update);

        for axis in [Axis::X, Axis::Y] {
            let vars = self.variables(axis);
            if update.has_offset_on(axis) {
                update.position.set_offset(axis, system.get(&vars.offset)?);
            }
            if update.has_size_on(axis) {
                update.position.set_size(axis, system.get(&vars.size)?);
            }
        }
        Ok(update)
    }

    /// Destroy the region's variables and everything attached to them.
    pub(crate) fn destroy(&self, system: &mut System) {
        debug!(region = %self.id, "removing region");
        for name in self.variable_names() {
            system.destroy_variable(name);
        }
    }
}
