use serde::{Deserialize, Serialize};

use crate::grid::VoxelGrid;
use crate::labels::VoteTable;
use crate::plan::RemapPlan;
use crate::progress::CancelFlag;
use crate::remap::{ActiveLabel, CopyGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphOperation {
    Erode,
    #[default]
    Dilate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Voxels the scanner considered for an update.
    pub active: usize,
    /// Voxels that received a copy instruction.
    pub planned: usize,
}

/// Produces one remap plan per pass from the current labels.
pub trait PassScanner {
    fn guard(&self) -> CopyGuard;

    /// Rebuilds `plan` from `labels`. Returns `None` if cancellation was observed before the
    /// scan finished, in which case the plan must not be applied.
    fn scan(
        &mut self,
        labels: &[i32],
        plan: &mut RemapPlan,
        cancel: &CancelFlag,
        on_slice: &mut dyn FnMut(f32),
    ) -> Option<ScanSummary>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoteRule {
    Erode,
    Dilate,
    Fill,
}

/// Majority vote over feature neighbors for background (or flagged) voxels.
pub struct MajorityScanner {
    grid: VoxelGrid,
    votes: VoteTable,
    rule: VoteRule,
}

impl MajorityScanner {
    pub fn erode_dilate(grid: VoxelGrid, operation: MorphOperation, max_label: i32) -> Self {
        let rule = match operation {
            MorphOperation::Erode => VoteRule::Erode,
            MorphOperation::Dilate => VoteRule::Dilate,
        };
        Self {
            grid,
            votes: VoteTable::new(max_label),
            rule,
        }
    }

    pub fn fill(grid: VoxelGrid, max_label: i32) -> Self {
        Self {
            grid,
            votes: VoteTable::new(max_label),
            rule: VoteRule::Fill,
        }
    }

    fn active(&self) -> ActiveLabel {
        match self.rule {
            VoteRule::Erode | VoteRule::Dilate => ActiveLabel::Zero,
            VoteRule::Fill => ActiveLabel::Negative,
        }
    }
}

impl PassScanner for MajorityScanner {
    fn guard(&self) -> CopyGuard {
        CopyGuard::FromFeature(self.active())
    }

    fn scan(
        &mut self,
        labels: &[i32],
        plan: &mut RemapPlan,
        cancel: &CancelFlag,
        on_slice: &mut dyn FnMut(f32),
    ) -> Option<ScanSummary> {
        plan.clear();
        let grid = self.grid;
        let [nx, ny, nz] = grid.dims();
        let active = self.active();
        // Dilate clears the counters it raised; the others re-scan the neighbors to zero them.
        let rescan_reset = !matches!(self.rule, VoteRule::Dilate);
        let mut summary = ScanSummary::default();

        for z in 0..nz {
            if cancel.is_cancelled() {
                self.votes.clear_touched();
                return None;
            }
            for y in 0..ny {
                for x in 0..nx {
                    let index = grid.linear_index(x, y, z);
                    if !active.matches(labels[index]) {
                        continue;
                    }
                    summary.active += 1;

                    let mut most = 0;
                    let mut winner = None;
                    for neighbor in grid.neighbors(index, x, y, z) {
                        let feature = labels[neighbor];
                        if feature <= 0 {
                            continue;
                        }
                        let current = if rescan_reset {
                            self.votes.vote(feature)
                        } else {
                            self.votes.vote_tracked(feature)
                        };
                        if current > most {
                            most = current;
                            winner = Some(neighbor);
                        }
                    }

                    if rescan_reset {
                        for neighbor in grid.neighbors(index, x, y, z) {
                            let feature = labels[neighbor];
                            if feature > 0 {
                                self.votes.reset(feature);
                            }
                        }
                    } else {
                        self.votes.clear_touched();
                    }

                    if let Some(source) = winner {
                        plan.set(index, source);
                        summary.planned += 1;
                    }
                }
            }
            on_slice((z + 1) as f32 / nz as f32);
        }

        self.votes.clear_touched();
        Some(summary)
    }
}

/// Replaces voxels that have at least `threshold` neighbors of the opposite class
/// (feature next to background, or background next to features).
pub struct CoordinationScanner {
    grid: VoxelGrid,
    votes: VoteTable,
    threshold: usize,
}

impl CoordinationScanner {
    pub fn new(grid: VoxelGrid, threshold: usize, max_label: i32) -> Self {
        Self {
            grid,
            votes: VoteTable::new(max_label),
            threshold,
        }
    }
}

impl PassScanner for CoordinationScanner {
    fn guard(&self) -> CopyGuard {
        CopyGuard::Planned
    }

    fn scan(
        &mut self,
        labels: &[i32],
        plan: &mut RemapPlan,
        cancel: &CancelFlag,
        on_slice: &mut dyn FnMut(f32),
    ) -> Option<ScanSummary> {
        plan.clear();
        let grid = self.grid;
        let [nx, ny, nz] = grid.dims();
        let mut summary = ScanSummary::default();

        for z in 0..nz {
            if cancel.is_cancelled() {
                return None;
            }
            for y in 0..ny {
                for x in 0..nx {
                    let index = grid.linear_index(x, y, z);
                    let label = labels[index];
                    let mut coordination = 0;
                    let mut most = 0;
                    let mut winner = None;
                    for neighbor in grid.neighbors(index, x, y, z) {
                        let feature = labels[neighbor];
                        let opposite = (label > 0 && feature == 0) || (label == 0 && feature > 0);
                        if !opposite {
                            continue;
                        }
                        coordination += 1;
                        let current = self.votes.vote(feature);
                        if current > most {
                            most = current;
                            winner = Some(neighbor);
                        }
                    }
                    for neighbor in grid.neighbors(index, x, y, z) {
                        let feature = labels[neighbor];
                        if feature >= 0 {
                            self.votes.reset(feature);
                        }
                    }

                    if coordination > 0 && coordination >= self.threshold {
                        summary.active += 1;
                        if let Some(source) = winner {
                            plan.set(index, source);
                            summary.planned += 1;
                        }
                    }
                }
            }
            on_slice((z + 1) as f32 / nz as f32);
        }

        Some(summary)
    }
}

/// Result of splitting background voxels into connected defect regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefectRegions {
    pub regions: usize,
    pub small_regions: usize,
    /// Voxels in regions smaller than the minimum size; these get filled.
    pub flagged: Vec<usize>,
    /// Voxels in regions at or above the minimum size; these stay background.
    pub kept: Vec<usize>,
}

impl DefectRegions {
    pub fn flag(&self, labels: &mut [i32]) {
        for &index in &self.flagged {
            labels[index] = -1;
        }
    }
}

/// Flood-fills every background region over face connectivity and sorts the regions by size.
/// A region of exactly `min_size` voxels is kept as background. Nothing is written here, so a
/// cancelled classification leaves the labels untouched.
pub fn classify_defects(
    grid: &VoxelGrid,
    labels: &[i32],
    min_size: usize,
    cancel: &CancelFlag,
) -> Option<DefectRegions> {
    let total = grid.voxel_count();
    let slab = grid.slab_len();
    let mut visited = vec![false; total];
    let mut region = Vec::new();
    let mut result = DefectRegions::default();

    for seed in 0..total {
        if seed % slab == 0 && cancel.is_cancelled() {
            return None;
        }
        if visited[seed] || labels[seed] != 0 {
            continue;
        }
        visited[seed] = true;
        region.clear();
        region.push(seed);
        let mut cursor = 0;
        while cursor < region.len() {
            let index = region[cursor];
            let (x, y, z) = grid.decompose(index);
            for neighbor in grid.neighbors(index, x, y, z) {
                if labels[neighbor] == 0 && !visited[neighbor] {
                    visited[neighbor] = true;
                    region.push(neighbor);
                }
            }
            cursor += 1;
        }

        result.regions += 1;
        if region.len() >= min_size {
            result.kept.extend_from_slice(&region);
        } else {
            result.small_regions += 1;
            result.flagged.extend_from_slice(&region);
        }
    }

    Some(result)
}
