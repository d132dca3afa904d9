use serde::{Deserialize, Serialize};

use crate::attributes::VoxelData;
use crate::driver::{ExecutionContext, RunOutcome};
use crate::error::MorphError;

pub mod erode_dilate_bad_data;
pub mod erode_dilate_coordination;
pub mod erode_dilate_mask;
pub mod fill_bad_data;


pub use erode_dilate_bad_data::ErodeDilateBadDataConfig;
pub use erode_dilate_coordination::ErodeDilateCoordinationConfig;
pub use erode_dilate_mask::ErodeDilateMaskConfig;
pub use fill_bad_data::FillBadDataConfig;

pub const DEFAULT_FEATURE_IDS: &str = "FeatureIds";

pub(crate) fn default_feature_ids() -> String {
    DEFAULT_FEATURE_IDS.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    ErodeDilateBadData,
    FillBadData,
    ErodeDilateCoordinationNumber,
    ErodeDilateMask,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::ErodeDilateBadData,
        FilterKind::FillBadData,
        FilterKind::ErodeDilateCoordinationNumber,
        FilterKind::ErodeDilateMask,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::ErodeDilateBadData => erode_dilate_bad_data::NAME,
            FilterKind::FillBadData => fill_bad_data::NAME,
            FilterKind::ErodeDilateCoordinationNumber => erode_dilate_coordination::NAME,
            FilterKind::ErodeDilateMask => erode_dilate_mask::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    ErodeDilateBadData(ErodeDilateBadDataConfig),
    FillBadData(FillBadDataConfig),
    ErodeDilateCoordinationNumber(ErodeDilateCoordinationConfig),
    ErodeDilateMask(ErodeDilateMaskConfig),
}

impl FilterConfig {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterConfig::ErodeDilateBadData(_) => FilterKind::ErodeDilateBadData,
            FilterConfig::FillBadData(_) => FilterKind::FillBadData,
            FilterConfig::ErodeDilateCoordinationNumber(_) => {
                FilterKind::ErodeDilateCoordinationNumber
            }
            FilterConfig::ErodeDilateMask(_) => FilterKind::ErodeDilateMask,
        }
    }

    pub fn validate(&self) -> Result<(), MorphError> {
        match self {
            FilterConfig::ErodeDilateBadData(config) => config.validate(),
            FilterConfig::FillBadData(config) => config.validate(),
            FilterConfig::ErodeDilateCoordinationNumber(config) => config.validate(),
            FilterConfig::ErodeDilateMask(config) => config.validate(),
        }
    }

    pub fn run(
        &self,
        data: &mut VoxelData,
        ctx: &ExecutionContext,
    ) -> Result<RunOutcome, MorphError> {
        match self {
            FilterConfig::ErodeDilateBadData(config) => erode_dilate_bad_data::execute(data, config, ctx),
            FilterConfig::FillBadData(config) => fill_bad_data::execute(data, config, ctx),
            FilterConfig::ErodeDilateCoordinationNumber(config) => {
                erode_dilate_coordination::execute(data, config, ctx)
            }
            FilterConfig::ErodeDilateMask(config) => erode_dilate_mask::execute(data, config, ctx),
        }
    }
}

fn non_negative(value: i32, what: &str) -> Result<usize, MorphError> {
    usize::try_from(value).map_err(|_| {
        MorphError::InvalidConfiguration(format!("{what} must be non-negative, got {value}"))
    })
}
