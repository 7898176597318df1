//! The layout bridge: observe, solve, write back.

use std::collections::HashMap;

use absolution_constraint::{PassId, RelationshipId, System, SystemOptions};
use absolution_core::{ConstraintError, LayoutError, Property, RectPosition, RectUpdate};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::region::Region;

/// Options for a layout.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Options for the underlying constraint system
    pub system: SystemOptions,
    /// Report failing regions instead of aborting the update
    pub skip_failed_regions: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            system: SystemOptions::default(),
            skip_failed_regions: true,
        }
    }
}

/// A region that couldn't be laid out during an update.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFailure {
    pub region: String,
    pub error: LayoutError,
}

/// Result of one layout pass.
#[derive(Debug, Clone, Default)]
pub struct LayoutReport {
    /// The pass that was solved
    pub pass: PassId,
    /// Write-backs for every region that pulled successfully
    pub updates: IndexMap<String, RectUpdate>,
    /// Regions whose solved fields differ from what was observed
    pub changed: Vec<String>,
    /// Regions that were skipped
    pub failures: Vec<RegionFailure>,
    /// Contradiction raised while solving, if any
    pub solve_error: Option<ConstraintError>,
}

impl LayoutReport {
    /// Whether every region was laid out.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty() && self.solve_error.is_none()
    }

    pub fn update(&self, region: &str) -> Option<&RectUpdate> {
        self.updates.get(region)
    }
}

/// A set of regions sharing one constraint system.
#[derive(Debug)]
pub struct Layout {
    system: System,
    regions: IndexMap<String, Region>,
    /// Last observed position of each region
    observed: HashMap<String, RectPosition>,
    options: LayoutOptions,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    pub fn new() -> Self {
        Self::with_options(LayoutOptions::default())
    }

    pub fn with_options(options: LayoutOptions) -> Self {
        Self {
            system: System::with_options(options.system.clone()),
            regions: IndexMap::new(),
            observed: HashMap::new(),
            options,
        }
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    /// Direct access to the system, e.g. to register functions.
    pub fn system_mut(&mut self) -> &mut System {
        &mut self.system
    }

    /// Register a new region.
    pub fn register(&mut self, id: &str) -> Result<&Region, LayoutError> {
        if self.regions.contains_key(id) {
            return Err(LayoutError::DuplicateRegion { id: id.to_string() });
        }
        let region = Region::new(&mut self.system, id)?;
        let entry = self.regions.entry(id.to_string()).or_insert(region);
        Ok(entry)
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.get(id)
    }

    /// Regions in registration order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Add a rule `property = text` to a region.
    pub fn constrain(&mut self, id: &str, property: Property, text: &str) -> Result<RelationshipId, LayoutError> {
        let region = self
            .regions
            .get_mut(id)
            .ok_or_else(|| LayoutError::UnknownRegion { id: id.to_string() })?;
        region.constrain(&mut self.system, property, text)
    }

    /// Remove a region, destroying its variables and rules.
    pub fn remove_region(&mut self, id: &str) -> Result<(), LayoutError> {
        let region = self
            .regions
            .shift_remove(id)
            .ok_or_else(|| LayoutError::UnknownRegion { id: id.to_string() })?;
        region.destroy(&mut self.system);
        self.observed.remove(id);
        Ok(())
    }

    /// Run one layout pass.
    ///
    /// Regions missing from `observed` reuse their last observation. Observed
    /// fields are only pushed when they changed.
    pub fn update(&mut self, observed: &HashMap<String, RectPosition>) -> Result<LayoutReport, LayoutError> {
        for region in self.regions.values() {
            let Some(position) = observed.get(region.id()) else {
                continue;
            };
            let stale = self
                .observed
                .get(region.id())
                .map_or(true, |last| region.independent_differ(last, position));
            if stale {
                region.push_to_system(&mut self.system, position);
            }
            self.observed.insert(region.id().to_string(), *position);
        }

        let pass = self.system.next_pass();
        debug!(%pass, regions = self.regions.len(), "layout pass");
        let mut report = LayoutReport {
            pass,
            ..LayoutReport::default()
        };

        if let Err(err) = self.system.solve(pass) {
            if !self.options.skip_failed_regions {
                return Err(err.into());
            }
            warn!(error = %err, "solve failed, pulling partial results");
            report.solve_error = Some(err);
        }

        for region in self.regions.values() {
            let position = self.observed.get(region.id()).copied().unwrap_or_default();
            match region.pull_to_geometry(&self.system, &position) {
                Ok(update) => {
                    if region.constrained_differ(&position, &update.position) {
                        report.changed.push(region.id().to_string());
                    }
                    report.updates.insert(region.id().to_string(), update);
                }
                Err(error) if self.options.skip_failed_regions => {
                    warn!(region = region.id(), error = %error, "skipping region");
                    report.failures.push(RegionFailure {
                        region: region.id().to_string(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(report)
    }
}
