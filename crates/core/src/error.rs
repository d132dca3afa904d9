use crate::attributes::{AttributeError, AttributeType};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MorphError {
    #[error("array '{name}' has element type {data_type:?}, which cannot be remapped")]
    UnsupportedElementType {
        name: String,
        data_type: AttributeType,
    },
    #[error("array '{name}' has {actual} tuples but the grid has {expected} voxels")]
    DimensionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("array '{0}' does not exist")]
    MissingArray(String),
    #[error("array '{name}' must be a single-component {expected:?} array, found {components} x {actual:?}")]
    InvalidArrayType {
        name: String,
        expected: AttributeType,
        actual: AttributeType,
        components: usize,
    },
    #[error("malformed array: {0}")]
    Attribute(#[from] AttributeError),
    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),
}
