//! Core value types for rect geometry.

use std::fmt;
use std::str::FromStr;

/// Absolute difference under which two values are considered equal.
pub const DEFAULT_TOLERANCE: f64 = 0.001;

/// Check whether two values are equal within `tolerance`.
pub fn close_enough(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// An identifier (region id, variable name, function name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identifier(pub String);

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two independent dimensions of a rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

/// A constrainable property of a rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Property {
    Left,
    Right,
    Width,
    CenterX,
    Top,
    Bottom,
    Height,
    CenterY,
}

impl Property {
    pub const ALL: [Property; 8] = [
        Property::Left,
        Property::Right,
        Property::Width,
        Property::CenterX,
        Property::Top,
        Property::Bottom,
        Property::Height,
        Property::CenterY,
    ];

    /// The property's rule name, e.g. `center-x`.
    pub fn name(&self) -> &'static str {
        match self {
            Property::Left => "left",
            Property::Right => "right",
            Property::Width => "width",
            Property::CenterX => "center-x",
            Property::Top => "top",
            Property::Bottom => "bottom",
            Property::Height => "height",
            Property::CenterY => "center-y",
        }
    }

    /// Look up a property by its rule name.
    pub fn from_name(name: &str) -> Option<Property> {
        Property::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// The axis this property lives on.
    pub fn axis(&self) -> Axis {
        match self {
            Property::Left | Property::Right | Property::Width | Property::CenterX => Axis::X,
            Property::Top | Property::Bottom | Property::Height | Property::CenterY => Axis::Y,
        }
    }

    /// Whether this property is the size of its axis.
    ///
    /// Every other property pins the axis offset.
    pub fn is_size(&self) -> bool {
        matches!(self, Property::Width | Property::Height)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Property {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Property::from_name(s).ok_or_else(|| format!("unknown rect property: {}", s))
    }
}

/// Observed or solved placement of a rect.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RectPosition {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RectPosition {
    /// Create a position from offsets and sizes.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// The offset (left or top) along `axis`.
    pub fn offset(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.left,
            Axis::Y => self.top,
        }
    }

    /// The size (width or height) along `axis`.
    pub fn size(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        }
    }

    pub fn set_offset(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.left = value,
            Axis::Y => self.top = value,
        }
    }

    pub fn set_size(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.width = value,
            Axis::Y => self.height = value,
        }
    }

    /// Get the right edge (left + width).
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Get the bottom edge (top + height).
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// A position together with the fields that should be written back to
/// the rendered rect.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RectUpdate {
    pub position: RectPosition,
    pub has_any: bool,
    pub has_left: bool,
    pub has_top: bool,
    pub has_width: bool,
    pub has_height: bool,
    /// The rect's offset must be re-applied relative to its container.
    pub has_offset: bool,
}

impl RectUpdate {
    /// Mark the offset field of `axis` for write-back.
    pub fn mark_offset(&mut self, axis: Axis) {
        self.has_any = true;
        match axis {
            Axis::X => self.has_left = true,
            Axis::Y => self.has_top = true,
        }
    }

    /// Mark the size field of `axis` for write-back.
    pub fn mark_size(&mut self, axis: Axis) {
        self.has_any = true;
        match axis {
            Axis::X => self.has_width = true,
            Axis::Y => self.has_height = true,
        }
    }

    pub fn has_offset_on(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.has_left,
            Axis::Y => self.has_top,
        }
    }

    pub fn has_size_on(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.has_width,
            Axis::Y => self.has_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_names_round_trip() {
        for property in Property::ALL {
            assert_eq!(Property::from_name(property.name()), Some(property));
        }
        assert_eq!("center-y".parse::<Property>(), Ok(Property::CenterY));
        assert!("middle".parse::<Property>().is_err());
    }

    #[test]
    fn test_property_axis() {
        assert_eq!(Property::Right.axis(), Axis::X);
        assert_eq!(Property::Bottom.axis(), Axis::Y);
        assert!(Property::Height.is_size());
        assert!(!Property::CenterX.is_size());
    }

    #[test]
    fn test_position_axis_accessors() {
        let mut pos = RectPosition::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(pos.offset(Axis::Y), 20.0);
        assert_eq!(pos.size(Axis::X), 100.0);
        assert_eq!(pos.right(), 110.0);
        assert_eq!(pos.bottom(), 70.0);

        pos.set_size(Axis::Y, 5.0);
        pos.set_offset(Axis::X, 1.0);
        assert_eq!(pos, RectPosition::new(1.0, 20.0, 100.0, 5.0));
    }

    #[test]
    fn test_update_marks() {
        let mut update = RectUpdate::default();
        assert!(!update.has_any);
        update.mark_size(Axis::Y);
        assert!(update.has_any);
        assert!(update.has_height);
        assert!(update.has_size_on(Axis::Y));
        assert!(!update.has_offset_on(Axis::Y));
    }

    #[test]
    fn test_close_enough() {
        assert!(close_enough(1.0, 1.0005, DEFAULT_TOLERANCE));
        assert!(!close_enough(1.0, 1.002, DEFAULT_TOLERANCE));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_position_serializes() {
        let pos = RectPosition::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&pos).unwrap();
        assert_eq!(json, r#"{"left":1.0,"top":2.0,"width":3.0,"height":4.0}"#);
        let back: RectPosition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pos);
    }
}
