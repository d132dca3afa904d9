mod attributes;
mod driver;
mod error;
mod grid;
mod labels;
mod parallel;
mod plan;
mod progress;
mod propagate;
mod remap;

pub mod ops;

pub use attributes::{
    AttributeError, AttributeRef, AttributeStorage, AttributeType, DataArray, VoxelData,
};
pub use driver::{ExecutionContext, RunOutcome};
pub use error::MorphError;
pub use grid::{AxisMask, Direction, ImageGeometry, VoxelGrid};
pub use labels::{count_where, max_label, VoteTable};
pub use ops::{
    ErodeDilateBadDataConfig, ErodeDilateCoordinationConfig, ErodeDilateMaskConfig,
    FillBadDataConfig, FilterConfig, FilterKind,
};
pub use parallel::{default_parallelism, ParallelTaskRunner, TaskGroup};
pub use plan::RemapPlan;
pub use progress::{CancelFlag, ProgressEvent, ProgressReporter, ProgressSink, DEFAULT_PROGRESS_INTERVAL};
pub use propagate::{
    classify_defects, CoordinationScanner, DefectRegions, MajorityScanner, MorphOperation,
    PassScanner, ScanSummary,
};
pub use remap::{
    remap_attribute, remap_labels, remap_tuples, ActiveLabel, AttributeMut, CopyGuard,
    RemapTarget,
};
