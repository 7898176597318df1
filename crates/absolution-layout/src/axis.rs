//! Per-axis constraint state.
//!
//! Each axis of a region has two degrees of freedom: an offset (`left` /
//! `top`) and a size (`width` / `height`). Rules take ownership of them one
//! at a time. Whatever the rules don't own is observed from the rendered
//! rect and pushed into the system as environment values; whatever they do
//! own is solved and pulled back out.

use absolution_constraint::System;
use absolution_core::{close_enough, Axis, LayoutError, Property, RectPosition, RectUpdate, DEFAULT_TOLERANCE};

/// Which degrees of freedom of an axis are owned by rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisState {
    #[default]
    Unconstrained,
    OffsetConstrained,
    SizeConstrained,
    BothConstrained,
}

/// Variable names for one axis of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisVariables {
    /// `left` or `top`
    pub offset: String,
    /// `right` or `bottom`
    pub end: String,
    /// `width` or `height`
    pub size: String,
    /// `center-x` or `center-y`
    pub center: String,
}

impl AxisVariables {
    /// Names of the form `<region>.<property>`.
    pub fn new(region: &str, axis: Axis) -> Self {
        let [offset, end, size, center] = properties(axis);
        let name = |p: Property| format!("{}.{}", region, p.name());
        Self {
            offset: name(offset),
            end: name(end),
            size: name(size),
            center: name(center),
        }
    }

    /// The variable backing `property`, which must be on this axis.
    pub fn get(&self, property: Property) -> &str {
        match property {
            Property::Left | Property::Top => &self.offset,
            Property::Right | Property::Bottom => &self.end,
            Property::Width | Property::Height => &self.size,
            Property::CenterX | Property::CenterY => &self.center,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [&self.offset, &self.end, &self.size, &self.center]
            .into_iter()
            .map(String::as_str)
    }
}

/// Offset, end, size and center properties of an axis.
pub fn properties(axis: Axis) -> [Property; 4] {
    match axis {
        Axis::X => [Property::Left, Property::Right, Property::Width, Property::CenterX],
        Axis::Y => [Property::Top, Property::Bottom, Property::Height, Property::CenterY],
    }
}

/// State machine gluing one axis of a rendered rect to the system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstrainedAxis {
    axis: Axis,
    state: AxisState,
    /// Positions closer than this don't differ
    tolerance: f64,
}

impl ConstrainedAxis {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            state: AxisState::Unconstrained,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn state(&self) -> AxisState {
        self.state
    }

    /// The state after a rule on `property` takes one degree of freedom.
    ///
    /// `width`/`height` take the size; every other property takes the
    /// offset. An axis accepts at most two rules.
    pub fn constrain(self, property: Property) -> Result<Self, LayoutError> {
        let state = match (self.state, property.is_size()) {
            (AxisState::Unconstrained, true) => AxisState::SizeConstrained,
            (AxisState::Unconstrained, false) => AxisState::OffsetConstrained,
            (AxisState::OffsetConstrained, _) | (AxisState::SizeConstrained, _) => {
                AxisState::BothConstrained
            }
            (AxisState::BothConstrained, _) => {
                return Err(LayoutError::AxisOverConstrained { axis: self.axis })
            }
        };
        Ok(Self { state, ..self })
    }

    /// Whether the offset is solved rather than observed.
    pub fn owns_offset(&self) -> bool {
        matches!(self.state, AxisState::OffsetConstrained | AxisState::BothConstrained)
    }

    /// Whether the size is solved rather than observed.
    pub fn owns_size(&self) -> bool {
        matches!(self.state, AxisState::SizeConstrained | AxisState::BothConstrained)
    }

    /// Check if any solved field differs between `a` and `b`.
    pub fn constrained_differ(&self, a: &RectPosition, b: &RectPosition) -> bool {
        (self.owns_offset() && self.offset_differs(a, b)) || (self.owns_size() && self.size_differs(a, b))
    }

    /// Check if any observed field differs between `a` and `b`.
    pub fn independent_differ(&self, a: &RectPosition, b: &RectPosition) -> bool {
        (!self.owns_offset() && self.offset_differs(a, b)) || (!self.owns_size() && self.size_differs(a, b))
    }

    fn offset_differs(&self, a: &RectPosition, b: &RectPosition) -> bool {
        !close_enough(a.offset(self.axis), b.offset(self.axis), self.tolerance)
    }

    fn size_differs(&self, a: &RectPosition, b: &RectPosition) -> bool {
        !close_enough(a.size(self.axis), b.size(self.axis), self.tolerance)
    }

    /// Write the observed fields into the system as environment values.
    pub fn push_to_system(&self, system: &mut System, variables: &AxisVariables, position: &RectPosition) {
        if !self.owns_offset() {
            system.assign_environment(&variables.offset, position.offset(self.axis));
        }
        if !self.owns_size() {
            system.assign_environment(&variables.size, position.size(self.axis));
        }
    }

    /// Mark the solved fields for write-back.
    pub fn pull_to_geometry(&self, update: &mut RectUpdate) {
        if self.owns_offset() {
            update.mark_offset(self.axis);
            update.has_offset = true;
        }
        if self.owns_size() {
            update.mark_size(self.axis);
        }
    }
}
