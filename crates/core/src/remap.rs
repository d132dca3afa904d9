use crate::attributes::{AttributeStorage, DataArray};
use crate::error::MorphError;
use crate::plan::RemapPlan;

/// Which labels count as "needs a value" for a destination voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveLabel {
    Zero,
    Negative,
}

impl ActiveLabel {
    pub fn matches(self, label: i32) -> bool {
        match self {
            ActiveLabel::Zero => label == 0,
            ActiveLabel::Negative => label < 0,
        }
    }
}

/// Condition re-checked against the pre-pass labels before each tuple copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyGuard {
    /// Destination is active and the source is a feature voxel.
    FromFeature(ActiveLabel),
    /// Every plan entry is copied.
    Planned,
}

impl CopyGuard {
    pub fn allows(self, labels: &[i32], destination: usize, source: usize) -> bool {
        match self {
            CopyGuard::FromFeature(active) => active.matches(labels[destination]) && labels[source] > 0,
            CopyGuard::Planned => true,
        }
    }
}

/// Mutable view over a cell array whose element type can be remapped.
#[derive(Debug)]
pub enum AttributeMut<'a> {
    Bool(&'a mut [bool]),
    Int8(&'a mut [i8]),
    Int16(&'a mut [i16]),
    Int32(&'a mut [i32]),
    Int64(&'a mut [i64]),
    UInt8(&'a mut [u8]),
    UInt16(&'a mut [u16]),
    UInt32(&'a mut [u32]),
    UInt64(&'a mut [u64]),
    Float32(&'a mut [f32]),
    Float64(&'a mut [f64]),
}

/// A validated remap target: typed values plus the tuple width.
#[derive(Debug)]
pub struct RemapTarget<'a> {
    values: AttributeMut<'a>,
    components: usize,
}

impl<'a> RemapTarget<'a> {
    pub fn new(name: &str, array: &'a mut DataArray) -> Result<Self, MorphError> {
        let components = array.components();
        let values = match array.storage_mut() {
            AttributeStorage::Bool(values) => AttributeMut::Bool(values),
            AttributeStorage::Int8(values) => AttributeMut::Int8(values),
            AttributeStorage::Int16(values) => AttributeMut::Int16(values),
            AttributeStorage::Int32(values) => AttributeMut::Int32(values),
            AttributeStorage::Int64(values) => AttributeMut::Int64(values),
            AttributeStorage::UInt8(values) => AttributeMut::UInt8(values),
            AttributeStorage::UInt16(values) => AttributeMut::UInt16(values),
            AttributeStorage::UInt32(values) => AttributeMut::UInt32(values),
            AttributeStorage::UInt64(values) => AttributeMut::UInt64(values),
            AttributeStorage::Float32(values) => AttributeMut::Float32(values),
            AttributeStorage::Float64(values) => AttributeMut::Float64(values),
            other => {
                return Err(MorphError::UnsupportedElementType {
                    name: name.to_string(),
                    data_type: other.data_type(),
                })
            }
        };
        Ok(Self { values, components })
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn apply(&mut self, plan: &RemapPlan, labels: &[i32], guard: CopyGuard) -> usize {
        let components = self.components;
        match &mut self.values {
            AttributeMut::Bool(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::Int8(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::Int16(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::Int32(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::Int64(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::UInt8(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::UInt16(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::UInt32(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::UInt64(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::Float32(values) => remap_tuples(&mut **values, components, plan, labels, guard),
            AttributeMut::Float64(values) => remap_tuples(&mut **values, components, plan, labels, guard),
        }
    }
}

/// Copies whole tuples along the plan wherever `guard` holds; returns the number of tuples copied.
pub fn remap_tuples<T: Copy>(
    values: &mut [T],
    components: usize,
    plan: &RemapPlan,
    labels: &[i32],
    guard: CopyGuard,
) -> usize {
    let mut copied = 0;
    for (destination, source) in plan.entries() {
        if !guard.allows(labels, destination, source) {
            continue;
        }
        let start = source * components;
        values.copy_within(start..start + components, destination * components);
        copied += 1;
    }
    copied
}

/// Applies `plan` to one cell array of any primitive element type.
pub fn remap_attribute(
    name: &str,
    array: &mut DataArray,
    plan: &RemapPlan,
    labels: &[i32],
    guard: CopyGuard,
) -> Result<usize, MorphError> {
    let mut target = RemapTarget::new(name, array)?;
    Ok(target.apply(plan, labels, guard))
}

/// Applies `plan` to the label field itself, in place.
///
/// Under [`CopyGuard::FromFeature`] every planned source is a feature voxel and every
/// destination is active, so no source is written before it is read and the live labels give
/// the same answer as the field every array was remapped against.
pub fn remap_labels(labels: &mut [i32], plan: &RemapPlan, guard: CopyGuard) -> usize {
    let mut copied = 0;
    for (destination, source) in plan.entries() {
        if !guard.allows(labels, destination, source) {
            continue;
        }
        labels[destination] = labels[source];
        copied += 1;
    }
    copied
}

#[cfg(test)]
mod tests {
    use super::{remap_attribute, remap_labels, ActiveLabel, CopyGuard, RemapTarget};
    use crate::attributes::{AttributeStorage, AttributeType, DataArray};
    use crate::error::MorphError;
    use crate::plan::RemapPlan;

    fn plan_1_from_0() -> RemapPlan {
        let mut plan = RemapPlan::new(3);
        plan.set(1, 0);
        plan
    }

    #[test]
    fn copies_every_component_of_a_tuple() {
        let mut array =
            DataArray::new(AttributeStorage::Float64(vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 7.0, 8.0, 9.0]), 3)
                .unwrap();
        let labels = [5, 0, 6];
        let copied = remap_attribute(
            "Euler",
            &mut array,
            &plan_1_from_0(),
            &labels,
            CopyGuard::FromFeature(ActiveLabel::Zero),
        )
        .unwrap();
        assert_eq!(copied, 1);
        assert_eq!(
            array.storage(),
            &AttributeStorage::Float64(vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 7.0, 8.0, 9.0])
        );
    }

    #[test]
    fn guard_blocks_copies_from_background() {
        let mut array = DataArray::scalar(AttributeStorage::UInt16(vec![10, 20, 30]));
        let labels = [0, 0, 4];
        let copied = remap_attribute(
            "Values",
            &mut array,
            &plan_1_from_0(),
            &labels,
            CopyGuard::FromFeature(ActiveLabel::Zero),
        )
        .unwrap();
        assert_eq!(copied, 0);
        assert_eq!(array.storage(), &AttributeStorage::UInt16(vec![10, 20, 30]));
    }

    #[test]
    fn negative_guard_only_fills_flagged_voxels() {
        let labels = [3, -1, 0];
        let mut plan = RemapPlan::new(3);
        plan.set(1, 0);
        plan.set(2, 0);
        let mut array = DataArray::scalar(AttributeStorage::Bool(vec![true, false, false]));
        remap_attribute(
            "Flags",
            &mut array,
            &plan,
            &labels,
            CopyGuard::FromFeature(ActiveLabel::Negative),
        )
        .unwrap();
        assert_eq!(array.storage(), &AttributeStorage::Bool(vec![true, true, false]));
    }

    #[test]
    fn every_primitive_kind_dispatches() {
        let labels = [1, 0, 1];
        let plan = plan_1_from_0();
        let arrays = vec![
            AttributeStorage::Bool(vec![true, false, false]),
            AttributeStorage::Int8(vec![-3, 0, 0]),
            AttributeStorage::Int16(vec![-300, 0, 0]),
            AttributeStorage::Int32(vec![-70000, 0, 0]),
            AttributeStorage::Int64(vec![-5_000_000_000, 0, 0]),
            AttributeStorage::UInt8(vec![200, 0, 0]),
            AttributeStorage::UInt16(vec![60000, 0, 0]),
            AttributeStorage::UInt32(vec![4_000_000_000, 0, 0]),
            AttributeStorage::UInt64(vec![u64::MAX, 0, 0]),
            AttributeStorage::Float32(vec![1.5, 0.0, 0.0]),
            AttributeStorage::Float64(vec![-2.25, 0.0, 0.0]),
        ];
        assert_eq!(arrays.len(), AttributeType::PRIMITIVES.len());
        for storage in arrays {
            let kind = storage.data_type();
            let mut array = DataArray::scalar(storage);
            let copied = remap_attribute(
                "Any",
                &mut array,
                &plan,
                &labels,
                CopyGuard::FromFeature(ActiveLabel::Zero),
            )
            .unwrap();
            assert_eq!(copied, 1, "{kind:?}");
            let first = array.storage().as_ref();
            let expected = match first {
                crate::attributes::AttributeRef::Bool(values) => values[0] == values[1],
                crate::attributes::AttributeRef::Int8(values) => values[0] == values[1],
                crate::attributes::AttributeRef::Int16(values) => values[0] == values[1],
                crate::attributes::AttributeRef::Int32(values) => values[0] == values[1],
                crate::attributes::AttributeRef::Int64(values) => values[0] == values[1],
                crate::attributes::AttributeRef::UInt8(values) => values[0] == values[1],
                crate::attributes::AttributeRef::UInt16(values) => values[0] == values[1],
                crate::attributes::AttributeRef::UInt32(values) => values[0] == values[1],
                crate::attributes::AttributeRef::UInt64(values) => values[0] == values[1],
                crate::attributes::AttributeRef::Float32(values) => values[0] == values[1],
                crate::attributes::AttributeRef::Float64(values) => values[0] == values[1],
                crate::attributes::AttributeRef::Text(_) => false,
            };
            assert!(expected, "{kind:?}");
        }
    }

    #[test]
    fn text_arrays_are_rejected_before_any_copy() {
        let mut array = DataArray::scalar(AttributeStorage::Text(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]));
        let err = RemapTarget::new("Names", &mut array).unwrap_err();
        assert_eq!(
            err,
            MorphError::UnsupportedElementType {
                name: "Names".to_string(),
                data_type: AttributeType::Text
            }
        );
    }

    #[test]
    fn labels_follow_the_same_plan() {
        let mut labels = vec![2, 0, 0, 3];
        let mut values = DataArray::scalar(AttributeStorage::Float32(vec![0.5, 0.0, 0.0, 1.5]));
        let mut plan = RemapPlan::new(4);
        plan.set(1, 0);
        plan.set(2, 3);
        let guard = CopyGuard::FromFeature(ActiveLabel::Zero);
        let arrays = remap_attribute("Values", &mut values, &plan, &labels, guard).unwrap();
        let copied = remap_labels(&mut labels, &plan, guard);
        assert_eq!((arrays, copied), (2, 2));
        assert_eq!(labels, vec![2, 2, 3, 3]);
        assert_eq!(
            values.storage(),
            &AttributeStorage::Float32(vec![0.5, 0.5, 1.5, 1.5])
        );
    }

    #[test]
    fn label_guard_reads_the_field_in_place() {
        // Only voxel 3 is still active, so 3 <- 2 is the one copy made.
        let mut labels = vec![-1, 4, 6, 0];
        let mut plan = RemapPlan::new(4);
        plan.set(1, 2);
        plan.set(3, 2);
        plan.set(0, 3);
        let copied = remap_labels(&mut labels, &plan, CopyGuard::FromFeature(ActiveLabel::Zero));
        assert_eq!(copied, 1);
        assert_eq!(labels, vec![-1, 4, 6, 6]);
    }
}
