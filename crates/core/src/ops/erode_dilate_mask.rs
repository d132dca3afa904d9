use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::attributes::VoxelData;
use crate::driver::{ExecutionContext, RunOutcome};
use crate::error::MorphError;
use crate::grid::{AxisMask, VoxelGrid};
use crate::ops::non_negative;
use crate::propagate::MorphOperation;

pub const NAME: &str = "Erode/Dilate Mask";

pub const DEFAULT_MASK: &str = "Mask";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErodeDilateMaskConfig {
    pub operation: MorphOperation,
    pub iterations: i32,
    pub axes: AxisMask,
    pub mask: String,
}

impl Default for ErodeDilateMaskConfig {
    fn default() -> Self {
        Self {
            operation: MorphOperation::Dilate,
            iterations: 2,
            axes: AxisMask::ALL,
            mask: DEFAULT_MASK.to_string(),
        }
    }
}

impl ErodeDilateMaskConfig {
    pub fn validate(&self) -> Result<(), MorphError> {
        non_negative(self.iterations, "iterations")?;
        Ok(())
    }
}

/// Grows (dilate) or shrinks (erode) the `true` region of a boolean mask by one voxel per
/// iteration. Only the mask changes; no other array is touched.
pub fn execute(
    data: &mut VoxelData,
    config: &ErodeDilateMaskConfig,
    ctx: &ExecutionContext,
) -> Result<RunOutcome, MorphError> {
    config.validate()?;
    let iterations = non_negative(config.iterations, "iterations")?;
    let grid = VoxelGrid::from_geometry(data.geometry(), config.axes)?;
    let voxels = grid.voxel_count();
    let array = data
        .get_mut(&config.mask)
        .ok_or_else(|| MorphError::MissingArray(config.mask.clone()))?;
    if array.tuple_count() != voxels {
        return Err(MorphError::DimensionMismatch {
            name: config.mask.clone(),
            expected: voxels,
            actual: array.tuple_count(),
        });
    }
    let mask = array.scalar_bool_mut(&config.mask)?;

    let reporter = ctx.reporter(NAME);
    let started = Instant::now();
    reporter.start();
    // Voxels that change take the opposite of their current value when any neighbor has it.
    let grow = config.operation == MorphOperation::Dilate;
    let mut previous = vec![false; voxels];
    let mut completed = 0;
    for iteration in 0..iterations {
        if ctx.cancel_flag().is_cancelled() {
            break;
        }
        previous.copy_from_slice(mask);
        let before = &previous;
        ctx.runner().for_each_indexed_mut(mask, |index, value| {
            if *value == grow {
                return;
            }
            let (x, y, z) = grid.decompose(index);
            if grid
                .neighbors(index, x, y, z)
                .any(|neighbor| before[neighbor] == grow)
            {
                *value = grow;
            }
        });
        completed += 1;
        reporter.advance((iteration + 1) as f32 / iterations as f32);
    }

    let cancelled = completed < iterations;
    if !cancelled {
        reporter.complete();
    }
    reporter.finish(completed, cancelled);
    tracing::info!(
        "{}: {} {:?} iterations on '{}' ({:.1} ms)",
        NAME,
        completed,
        config.operation,
        config.mask,
        started.elapsed().as_secs_f32() * 1000.0
    );
    if cancelled {
        Ok(RunOutcome::Cancelled {
            completed_passes: completed,
        })
    } else {
        Ok(RunOutcome::Completed { passes: completed })
    }
}
