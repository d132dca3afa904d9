use serde::{Deserialize, Serialize};

use crate::attributes::VoxelData;
use crate::driver::{ExecutionContext, IterationDriver, PassTargets, RunOutcome};
use crate::error::MorphError;
use crate::grid::{AxisMask, VoxelGrid};
use crate::labels::max_label;
use crate::ops::{default_feature_ids, non_negative};
use crate::propagate::{MajorityScanner, MorphOperation};

pub const NAME: &str = "Erode/Dilate Bad Data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErodeDilateBadDataConfig {
    pub operation: MorphOperation,
    pub iterations: i32,
    pub axes: AxisMask,
    pub feature_ids: String,
    pub ignored_arrays: Vec<String>,
}

impl Default for ErodeDilateBadDataConfig {
    fn default() -> Self {
        Self {
            operation: MorphOperation::Dilate,
            iterations: 2,
            axes: AxisMask::ALL,
            feature_ids: default_feature_ids(),
            ignored_arrays: Vec::new(),
        }
    }
}

impl ErodeDilateBadDataConfig {
    pub fn validate(&self) -> Result<(), MorphError> {
        non_negative(self.iterations, "iterations")?;
        Ok(())
    }
}

pub fn execute(
    data: &mut VoxelData,
    config: &ErodeDilateBadDataConfig,
    ctx: &ExecutionContext,
) -> Result<RunOutcome, MorphError> {
    config.validate()?;
    let iterations = non_negative(config.iterations, "iterations")?;
    let grid = VoxelGrid::from_geometry(data.geometry(), config.axes)?;
    let mut targets = PassTargets::split(data, &config.feature_ids, &config.ignored_arrays)?;
    tracing::debug!(
        "{}: {:?} x{} on {:?}, arrays {:?}",
        NAME,
        config.operation,
        iterations,
        grid.dims(),
        targets.array_names()
    );

    let mut scanner =
        MajorityScanner::erode_dilate(grid, config.operation, max_label(targets.labels()));
    let mut driver = IterationDriver::new(ctx, NAME, grid.voxel_count());
    Ok(driver.run_fixed(&mut targets, &mut scanner, iterations))
}
