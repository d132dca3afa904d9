use serde::{Deserialize, Serialize};

use crate::attributes::VoxelData;
use crate::driver::{validate_targets, ExecutionContext, IterationDriver, PassTargets, RunOutcome, Step};
use crate::error::MorphError;
use crate::grid::{AxisMask, VoxelGrid};
use crate::labels::{count_where, max_label};
use crate::ops::{default_feature_ids, non_negative};
use crate::propagate::{classify_defects, DefectRegions, MajorityScanner};

pub const NAME: &str = "Fill Bad Data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillBadDataConfig {
    pub min_defect_size: i32,
    /// Give background regions that stay unfilled their own phase id.
    pub store_as_new_phase: bool,
    pub cell_phases: Option<String>,
    pub feature_ids: String,
    pub ignored_arrays: Vec<String>,
}

impl Default for FillBadDataConfig {
    fn default() -> Self {
        Self {
            min_defect_size: 1,
            store_as_new_phase: false,
            cell_phases: None,
            feature_ids: default_feature_ids(),
            ignored_arrays: Vec::new(),
        }
    }
}

impl FillBadDataConfig {
    pub fn validate(&self) -> Result<(), MorphError> {
        non_negative(self.min_defect_size, "min_defect_size")?;
        if self.store_as_new_phase && self.phases_name().is_none() {
            return Err(MorphError::InvalidConfiguration(
                "store_as_new_phase requires a cell_phases array".to_string(),
            ));
        }
        Ok(())
    }

    fn phases_name(&self) -> Option<&str> {
        self.cell_phases
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

pub fn execute(
    data: &mut VoxelData,
    config: &FillBadDataConfig,
    ctx: &ExecutionContext,
) -> Result<RunOutcome, MorphError> {
    config.validate()?;
    let min_size = non_negative(config.min_defect_size, "min_defect_size")?;
    let grid = VoxelGrid::from_geometry(data.geometry(), AxisMask::ALL)?;
    validate_targets(data, &config.feature_ids, &config.ignored_arrays)?;
    let new_phase = if config.store_as_new_phase {
        config
            .phases_name()
            .map(|name| next_phase(data, name, grid.voxel_count()))
            .transpose()?
    } else {
        None
    };

    let mut driver = IterationDriver::new(ctx, NAME, grid.voxel_count());
    let labels = data
        .get(&config.feature_ids)
        .ok_or_else(|| MorphError::MissingArray(config.feature_ids.clone()))?
        .scalar_i32(&config.feature_ids)?;
    let max = max_label(labels);
    let Some(defects) = classify_defects(&grid, labels, min_size, ctx.cancel_flag()) else {
        return Ok(driver.abandon());
    };
    tracing::info!(
        "{}: {} background regions, {} below {} voxels ({} voxels to fill)",
        NAME,
        defects.regions,
        defects.small_regions,
        min_size,
        defects.flagged.len()
    );

    commit_classification(data, config, &defects, new_phase)?;
    let mut targets = PassTargets::split(data, &config.feature_ids, &config.ignored_arrays)?;
    let mut scanner = MajorityScanner::fill(grid, max);
    let total = defects.flagged.len().max(1);
    let mut stalled = false;
    let outcome = driver.run_until_converged(
        &mut targets,
        &mut scanner,
        |summary, reporter| {
            if summary.active == 0 {
                return Step::Stop;
            }
            if summary.planned == 0 {
                reporter.message(format!("{} voxels cannot be reached", summary.active));
                stalled = true;
                return Step::Stop;
            }
            reporter.advance(1.0 - summary.active as f32 / total as f32);
            Step::Continue
        },
        |_, _| Step::Continue,
    );

    if stalled {
        let labels = targets.labels_mut();
        let stranded = count_where(labels, |label| label < 0);
        for label in labels.iter_mut().filter(|label| **label < 0) {
            *label = 0;
        }
        tracing::warn!(
            "{}: {} flagged voxels have no feature neighbor and were reset to background",
            NAME,
            stranded
        );
    }
    Ok(outcome)
}

/// Phase id for kept background regions: one past the largest phase in use.
fn next_phase(data: &VoxelData, name: &str, voxels: usize) -> Result<i32, MorphError> {
    let phases = data
        .get(name)
        .ok_or_else(|| MorphError::MissingArray(name.to_string()))?;
    if phases.tuple_count() != voxels {
        return Err(MorphError::DimensionMismatch {
            name: name.to_string(),
            expected: voxels,
            actual: phases.tuple_count(),
        });
    }
    Ok(max_label(phases.scalar_i32(name)?) + 1)
}

fn commit_classification(
    data: &mut VoxelData,
    config: &FillBadDataConfig,
    defects: &DefectRegions,
    new_phase: Option<i32>,
) -> Result<(), MorphError> {
    if let (Some(phase), Some(name)) = (new_phase, config.phases_name()) {
        if !defects.kept.is_empty() {
            let phases = data
                .get_mut(name)
                .ok_or_else(|| MorphError::MissingArray(name.to_string()))?
                .scalar_i32_mut(name)?;
            for &index in &defects.kept {
                phases[index] = phase;
            }
            tracing::info!(
                "{}: {} voxels in large defects stored as phase {}",
                NAME,
                defects.kept.len(),
                phase
            );
        }
    }
    let labels = data
        .get_mut(&config.feature_ids)
        .ok_or_else(|| MorphError::MissingArray(config.feature_ids.clone()))?
        .scalar_i32_mut(&config.feature_ids)?;
    defects.flag(labels);
    Ok(())
}
