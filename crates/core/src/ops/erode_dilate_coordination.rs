use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::attributes::VoxelData;
use crate::driver::{ExecutionContext, IterationDriver, PassTargets, RunOutcome, Step};
use crate::error::MorphError;
use crate::grid::{AxisMask, VoxelGrid};
use crate::labels::max_label;
use crate::ops::default_feature_ids;
use crate::propagate::CoordinationScanner;

pub const NAME: &str = "Erode/Dilate Coordination Number";

pub const MAX_COORDINATION_NUMBER: i32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErodeDilateCoordinationConfig {
    /// Minimum number of opposite-class neighbors that flips a voxel.
    pub coordination_number: i32,
    pub loop_until_gone: bool,
    pub feature_ids: String,
    pub ignored_arrays: Vec<String>,
}

impl Default for ErodeDilateCoordinationConfig {
    fn default() -> Self {
        Self {
            coordination_number: MAX_COORDINATION_NUMBER,
            loop_until_gone: false,
            feature_ids: default_feature_ids(),
            ignored_arrays: Vec::new(),
        }
    }
}

impl ErodeDilateCoordinationConfig {
    pub fn validate(&self) -> Result<(), MorphError> {
        if !(0..=MAX_COORDINATION_NUMBER).contains(&self.coordination_number) {
            return Err(MorphError::InvalidConfiguration(format!(
                "coordination_number must be between 0 and {MAX_COORDINATION_NUMBER}, got {}",
                self.coordination_number
            )));
        }
        Ok(())
    }
}

pub fn execute(
    data: &mut VoxelData,
    config: &ErodeDilateCoordinationConfig,
    ctx: &ExecutionContext,
) -> Result<RunOutcome, MorphError> {
    config.validate()?;
    let threshold = config.coordination_number as usize;
    let grid = VoxelGrid::from_geometry(data.geometry(), AxisMask::ALL)?;
    let mut targets = PassTargets::split(data, &config.feature_ids, &config.ignored_arrays)?;
    let mut scanner = CoordinationScanner::new(grid, threshold, max_label(targets.labels()));
    let mut driver = IterationDriver::new(ctx, NAME, grid.voxel_count());

    if !config.loop_until_gone {
        return Ok(driver.run_fixed(&mut targets, &mut scanner, 1));
    }

    // Fingerprints of every label field seen so far; a repeat means the loop cycles.
    let mut seen = HashSet::from([fingerprint(targets.labels())]);
    let outcome = driver.run_until_converged(
        &mut targets,
        &mut scanner,
        |summary, reporter| {
            if summary.planned == 0 {
                return Step::Stop;
            }
            reporter.message(format!("{} voxels above the coordination number", summary.planned));
            Step::Continue
        },
        |labels, _| {
            if !seen.insert(fingerprint(labels)) {
                tracing::warn!("{}: labels returned to an earlier state; stopping the loop", NAME);
                return Step::Stop;
            }
            Step::Continue
        },
    );
    Ok(outcome)
}

fn fingerprint(labels: &[i32]) -> u64 {
    let mut hasher = DefaultHasher::new();
    labels.hash(&mut hasher);
    hasher.finish()
}
