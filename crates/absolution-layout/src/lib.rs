//! Rect layout on top of the Absolution constraint system.
//!
//! A [`Layout`] owns a [`System`](absolution_constraint::System) and a set
//! of [`Region`]s. Each update runs one pass:
//!
//! 1. **Observe**: every region pushes the fields its rules don't own
//! 2. **Solve**: a fresh pass is propagated through the whole system
//! 3. **Write back**: every region pulls the fields its rules do own
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use absolution_core::{Property, RectPosition};
//! use absolution_layout::Layout;
//!
//! let mut layout = Layout::new();
//! layout.register("sidebar").unwrap();
//! layout.register("content").unwrap();
//! layout.constrain("content", Property::Left, "sidebar.right + 8").unwrap();
//!
//! let mut observed = HashMap::new();
//! observed.insert("sidebar".to_string(), RectPosition::new(0.0, 0.0, 200.0, 600.0));
//! observed.insert("content".to_string(), RectPosition::new(0.0, 0.0, 400.0, 600.0));
//!
//! let report = layout.update(&observed).unwrap();
//! assert_eq!(report.update("content").unwrap().position.left, 208.0);
//! ```

mod axis;
mod layout;
mod region;

pub use axis::{properties, AxisState, AxisVariables, ConstrainedAxis};
pub use layout::{Layout, LayoutOptions, LayoutReport, RegionFailure};
pub use region::{Region, Rule};
