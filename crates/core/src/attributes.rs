use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MorphError;
use crate::grid::ImageGeometry;

/// Runtime element-type tag of a cell array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "int8")]
    Int8,
    #[serde(rename = "int16")]
    Int16,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "uint8")]
    UInt8,
    #[serde(rename = "uint16")]
    UInt16,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint64")]
    UInt64,
    #[serde(rename = "float32")]
    Float32,
    #[serde(rename = "float64")]
    Float64,
    #[serde(rename = "text")]
    Text,
}

impl AttributeType {
    pub const PRIMITIVES: [AttributeType; 11] = [
        AttributeType::Bool,
        AttributeType::Int8,
        AttributeType::Int16,
        AttributeType::Int32,
        AttributeType::Int64,
        AttributeType::UInt8,
        AttributeType::UInt16,
        AttributeType::UInt32,
        AttributeType::UInt64,
        AttributeType::Float32,
        AttributeType::Float64,
    ];

    pub fn is_primitive(self) -> bool {
        !matches!(self, AttributeType::Text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeStorage {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Text(Vec<String>),
}

impl AttributeStorage {
    pub fn len(&self) -> usize {
        match self {
            AttributeStorage::Bool(values) => values.len(),
            AttributeStorage::Int8(values) => values.len(),
            AttributeStorage::Int16(values) => values.len(),
            AttributeStorage::Int32(values) => values.len(),
            AttributeStorage::Int64(values) => values.len(),
            AttributeStorage::UInt8(values) => values.len(),
            AttributeStorage::UInt16(values) => values.len(),
            AttributeStorage::UInt32(values) => values.len(),
            AttributeStorage::UInt64(values) => values.len(),
            AttributeStorage::Float32(values) => values.len(),
            AttributeStorage::Float64(values) => values.len(),
            AttributeStorage::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> AttributeType {
        match self {
            AttributeStorage::Bool(_) => AttributeType::Bool,
            AttributeStorage::Int8(_) => AttributeType::Int8,
            AttributeStorage::Int16(_) => AttributeType::Int16,
            AttributeStorage::Int32(_) => AttributeType::Int32,
            AttributeStorage::Int64(_) => AttributeType::Int64,
            AttributeStorage::UInt8(_) => AttributeType::UInt8,
            AttributeStorage::UInt16(_) => AttributeType::UInt16,
            AttributeStorage::UInt32(_) => AttributeType::UInt32,
            AttributeStorage::UInt64(_) => AttributeType::UInt64,
            AttributeStorage::Float32(_) => AttributeType::Float32,
            AttributeStorage::Float64(_) => AttributeType::Float64,
            AttributeStorage::Text(_) => AttributeType::Text,
        }
    }

    pub fn as_ref(&self) -> AttributeRef<'_> {
        match self {
            AttributeStorage::Bool(values) => AttributeRef::Bool(values.as_slice()),
            AttributeStorage::Int8(values) => AttributeRef::Int8(values.as_slice()),
            AttributeStorage::Int16(values) => AttributeRef::Int16(values.as_slice()),
            AttributeStorage::Int32(values) => AttributeRef::Int32(values.as_slice()),
            AttributeStorage::Int64(values) => AttributeRef::Int64(values.as_slice()),
            AttributeStorage::UInt8(values) => AttributeRef::UInt8(values.as_slice()),
            AttributeStorage::UInt16(values) => AttributeRef::UInt16(values.as_slice()),
            AttributeStorage::UInt32(values) => AttributeRef::UInt32(values.as_slice()),
            AttributeStorage::UInt64(values) => AttributeRef::UInt64(values.as_slice()),
            AttributeStorage::Float32(values) => AttributeRef::Float32(values.as_slice()),
            AttributeStorage::Float64(values) => AttributeRef::Float64(values.as_slice()),
            AttributeStorage::Text(values) => AttributeRef::Text(values.as_slice()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeError {
    #[error("an array needs at least one component per tuple")]
    ZeroComponents,
    #[error("{values} values do not divide into tuples of {components} components")]
    InvalidLength { components: usize, values: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeRef<'a> {
    Bool(&'a [bool]),
    Int8(&'a [i8]),
    Int16(&'a [i16]),
    Int32(&'a [i32]),
    Int64(&'a [i64]),
    UInt8(&'a [u8]),
    UInt16(&'a [u16]),
    UInt32(&'a [u32]),
    UInt64(&'a [u64]),
    Float32(&'a [f32]),
    Float64(&'a [f64]),
    Text(&'a [String]),
}

/// A cell array: flat storage holding `components` values per voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    storage: AttributeStorage,
    components: usize,
}

impl DataArray {
    pub fn new(storage: AttributeStorage, components: usize) -> Result<Self, AttributeError> {
        if components == 0 {
            return Err(AttributeError::ZeroComponents);
        }
        if storage.len() % components != 0 {
            return Err(AttributeError::InvalidLength {
                components,
                values: storage.len(),
            });
        }
        Ok(Self {
            storage,
            components,
        })
    }

    pub fn scalar(storage: AttributeStorage) -> Self {
        Self {
            storage,
            components: 1,
        }
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn tuple_count(&self) -> usize {
        self.storage.len() / self.components
    }

    pub fn data_type(&self) -> AttributeType {
        self.storage.data_type()
    }

    pub fn storage(&self) -> &AttributeStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut AttributeStorage {
        &mut self.storage
    }

    pub fn scalar_i32(&self, name: &str) -> Result<&[i32], MorphError> {
        match &self.storage {
            AttributeStorage::Int32(values) if self.components == 1 => Ok(values.as_slice()),
            other => Err(MorphError::InvalidArrayType {
                name: name.to_string(),
                expected: AttributeType::Int32,
                actual: other.data_type(),
                components: self.components,
            }),
        }
    }

    /// The values as a single-component `int32` array, the layout label and phase arrays use.
    pub fn scalar_i32_mut(&mut self, name: &str) -> Result<&mut [i32], MorphError> {
        let components = self.components;
        let actual = self.storage.data_type();
        match &mut self.storage {
            AttributeStorage::Int32(values) if components == 1 => Ok(values.as_mut_slice()),
            _ => Err(MorphError::InvalidArrayType {
                name: name.to_string(),
                expected: AttributeType::Int32,
                actual,
                components,
            }),
        }
    }

    pub fn scalar_bool_mut(&mut self, name: &str) -> Result<&mut [bool], MorphError> {
        let components = self.components;
        let actual = self.storage.data_type();
        match &mut self.storage {
            AttributeStorage::Bool(values) if components == 1 => Ok(values.as_mut_slice()),
            _ => Err(MorphError::InvalidArrayType {
                name: name.to_string(),
                expected: AttributeType::Bool,
                actual,
                components,
            }),
        }
    }
}

/// An image geometry plus its cell attribute matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelData {
    geometry: ImageGeometry,
    arrays: BTreeMap<String, DataArray>,
}

impl VoxelData {
    pub fn new(geometry: ImageGeometry) -> Self {
        Self {
            geometry,
            arrays: BTreeMap::new(),
        }
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    pub fn insert(&mut self, name: impl Into<String>, array: DataArray) -> Option<DataArray> {
        self.arrays.insert(name.into(), array)
    }

    pub fn get(&self, name: &str) -> Option<&DataArray> {
        self.arrays.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DataArray> {
        self.arrays.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataArray)> {
        self.arrays.iter().map(|(name, array)| (name.as_str(), array))
    }

    /// Splits the matrix into the label field and the remaining non-ignored arrays.
    pub fn labels_and_arrays_mut(
        &mut self,
        labels: &str,
        ignored: &[String],
    ) -> Result<(&mut [i32], Vec<(&str, &mut DataArray)>), MorphError> {
        for name in ignored {
            if !self.arrays.contains_key(name) {
                tracing::warn!("ignored array '{}' is not in the cell data", name);
            }
        }
        let mut label_array = None;
        let mut others = Vec::with_capacity(self.arrays.len());
        for (name, array) in self.arrays.iter_mut() {
            if name == labels {
                label_array = Some(array);
            } else if !ignored.iter().any(|ignored| ignored == name) {
                others.push((name.as_str(), array));
            }
        }
        let label_array = label_array.ok_or_else(|| MorphError::MissingArray(labels.to_string()))?;
        let labels = label_array.scalar_i32_mut(labels)?;
        Ok((labels, others))
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeError, AttributeStorage, AttributeType, DataArray, VoxelData};
    use crate::error::MorphError;
    use crate::grid::ImageGeometry;

    fn demo_data() -> VoxelData {
        let mut data = VoxelData::new(ImageGeometry::new([2, 2, 1]));
        data.insert(
            "FeatureIds",
            DataArray::scalar(AttributeStorage::Int32(vec![1, 0, 0, 2])),
        );
        data.insert(
            "Euler",
            DataArray::new(AttributeStorage::Float32(vec![0.0; 12]), 3).unwrap(),
        );
        data.insert(
            "Mask",
            DataArray::scalar(AttributeStorage::Bool(vec![true, false, false, true])),
        );
        data
    }

    #[test]
    fn components_must_divide_values() {
        let err = DataArray::new(AttributeStorage::UInt8(vec![0; 5]), 2).unwrap_err();
        assert_eq!(
            err,
            AttributeError::InvalidLength {
                components: 2,
                values: 5
            }
        );
        assert_eq!(
            DataArray::new(AttributeStorage::UInt8(vec![]), 0).unwrap_err(),
            AttributeError::ZeroComponents
        );
    }

    #[test]
    fn tuple_count_divides_by_components() {
        let data = demo_data();
        let euler = data.get("Euler").unwrap();
        assert_eq!(euler.tuple_count(), 4);
        assert_eq!(euler.data_type(), AttributeType::Float32);
    }

    #[test]
    fn split_excludes_labels_and_ignored() {
        let mut data = demo_data();
        let ignored = vec!["Mask".to_string()];
        let (labels, arrays) = data.labels_and_arrays_mut("FeatureIds", &ignored).unwrap();
        assert_eq!(labels, &mut [1, 0, 0, 2]);
        let names: Vec<&str> = arrays.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["Euler"]);
    }

    #[test]
    fn label_array_must_be_scalar_int32() {
        let mut data = demo_data();
        let err = data.labels_and_arrays_mut("Euler", &[]).unwrap_err();
        assert!(matches!(
            err,
            MorphError::InvalidArrayType {
                expected: AttributeType::Int32,
                actual: AttributeType::Float32,
                components: 3,
                ..
            }
        ));
        let err = data.labels_and_arrays_mut("Missing", &[]).unwrap_err();
        assert_eq!(err, MorphError::MissingArray("Missing".to_string()));
    }

    #[test]
    fn scalar_accessors_write_through_or_report_the_stored_type() {
        let mut data = demo_data();
        data.get_mut("FeatureIds")
            .unwrap()
            .scalar_i32_mut("FeatureIds")
            .unwrap()[1] = 7;
        data.get_mut("Mask").unwrap().scalar_bool_mut("Mask").unwrap()[1] = true;
        assert_eq!(
            data.get("FeatureIds").unwrap().scalar_i32("FeatureIds").unwrap(),
            &[1, 7, 0, 2]
        );
        assert_eq!(
            data.get("Mask").unwrap().storage(),
            &AttributeStorage::Bool(vec![true, true, false, true])
        );

        let err = data
            .get_mut("Mask")
            .unwrap()
            .scalar_i32_mut("Mask")
            .unwrap_err();
        assert_eq!(
            err,
            MorphError::InvalidArrayType {
                name: "Mask".to_string(),
                expected: AttributeType::Int32,
                actual: AttributeType::Bool,
                components: 1
            }
        );
        let err = data
            .get_mut("Euler")
            .unwrap()
            .scalar_bool_mut("Euler")
            .unwrap_err();
        assert_eq!(
            err,
            MorphError::InvalidArrayType {
                name: "Euler".to_string(),
                expected: AttributeType::Bool,
                actual: AttributeType::Float32,
                components: 3
            }
        );
    }

    #[test]
    fn text_is_not_primitive() {
        assert!(!AttributeType::Text.is_primitive());
        assert!(AttributeType::PRIMITIVES.iter().all(|kind| kind.is_primitive()));
    }
}
