/// Striped Aggregation
///
/// One buffer per attribute; every range is a contiguous run of elements in
/// each buffer. Used for vertex and varying data, and (with one range per
/// array) for single, non-aggregated storage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::config::RegistryConfig;
use crate::error::EngineError;
use crate::memory::buffer_array::{BufferArray, BufferArrayCore};
use crate::memory::buffer_array_range::{BufferArrayRange, RangeHandle};
use crate::memory::buffer_resource::{BufferResource, DeviceBuffer};
use crate::memory::buffer_source::BufferSource;
use crate::memory::buffer_spec::{BufferArrayUsageHint, BufferSpec};
use crate::memory::buffer_value::BufferValue;
use crate::memory::error::{coding_error, invalid_source_error};

use super::AggregationStrategy;

/// Column-per-attribute buffer array
pub struct StripedBufferArray {
    core: BufferArrayCore,
    layout_name: &'static str,
    resources: Vec<(String, Arc<BufferResource>)>,
    max_num_elements: usize,
    total_capacity: AtomicUsize,
}

impl StripedBufferArray {
    /// Create an array whose buffers never exceed `max_buffer_size` bytes and
    /// that accepts at most `max_num_ranges` ranges
    pub fn new(
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
        max_buffer_size: usize,
        max_num_ranges: usize,
        layout_name: &'static str,
    ) -> Arc<Self> {
        let max_bytes_per_element = specs
            .iter()
            .map(|spec| spec.tuple_type.size_in_bytes())
            .max()
            .unwrap_or(0);
        let max_num_elements = if max_bytes_per_element == 0 {
            0
        } else {
            max_buffer_size / max_bytes_per_element
        };

        let resources = specs
            .iter()
            .map(|spec| {
                let stride = spec.tuple_type.size_in_bytes();
                let resource = BufferResource::new(role, spec.tuple_type, 0, stride);
                (spec.name.clone(), Arc::new(resource))
            })
            .collect();

        log::debug!(
            "[StripedBufferArray] Created {} array '{}' with {} buffers, max {} elements",
            layout_name,
            role,
            specs.len(),
            max_num_elements
        );

        Arc::new_cyclic(|weak: &Weak<StripedBufferArray>| {
            let self_ref: Weak<dyn BufferArray> = weak.clone();
            Self {
                core: BufferArrayCore::new(role, specs, usage_hint, max_num_ranges, self_ref),
                layout_name,
                resources,
                max_num_elements,
                total_capacity: AtomicUsize::new(0),
            }
        })
    }

    /// Elements backed by storage after the last reallocation
    pub fn total_capacity(&self) -> usize {
        self.total_capacity.load(Ordering::Acquire)
    }
}

impl BufferArray for StripedBufferArray {
    fn core(&self) -> &BufferArrayCore {
        &self.core
    }

    fn layout_name(&self) -> &'static str {
        self.layout_name
    }

    fn reallocate(&self, ranges: &[RangeHandle], cur_range_owner: &Arc<dyn BufferArray>) {
        let mut new_offsets = Vec::with_capacity(ranges.len());
        let mut total_elements = 0;
        for range in ranges {
            new_offsets.push(total_elements);
            total_elements += range.num_elements();
        }

        self.core.set_range_list(ranges);

        for (name, resource) in &self.resources {
            let element_size = resource.tuple_type().size_in_bytes();

            // read the current buffer before this resource is swapped, the
            // owner may be this array
            let old_buffer = cur_range_owner
                .resource(name)
                .and_then(|resource| resource.allocation());
            let new_buffer = (total_elements > 0).then(|| DeviceBuffer::new(total_elements * element_size));

            if let (Some(old_buffer), Some(new_buffer)) = (&old_buffer, &new_buffer) {
                for (range, new_offset) in ranges.iter().zip(&new_offsets) {
                    let placement = range.placement();
                    let Some(old_offset) = placement.element_offset else {
                        continue;
                    };
                    let count = placement.num_elements.min(placement.capacity);
                    if count == 0 {
                        continue;
                    }
                    let bytes = old_buffer.read(old_offset * element_size, count * element_size);
                    new_buffer.write(new_offset * element_size, &bytes);
                }
            }

            resource.set_allocation(new_buffer);
        }

        for (range, new_offset) in ranges.iter().zip(new_offsets) {
            range.update_placement(|placement| {
                placement.element_offset = Some(new_offset);
                placement.capacity = placement.num_elements;
            });
        }

        self.total_capacity.store(total_elements, Ordering::Release);
        self.core.finish_reallocation();

        log::debug!(
            "[StripedBufferArray] Reallocated '{}': {} ranges, {} elements",
            self.core.role(),
            ranges.len(),
            total_elements
        );
    }

    fn max_num_elements(&self) -> usize {
        self.max_num_elements
    }

    fn resize_range(&self, range: &BufferArrayRange, num_elements: usize) -> bool {
        let mut num_elements = num_elements;
        if num_elements > self.max_num_elements {
            log::warn!(
                "[StripedBufferArray] Resize to {} elements exceeds the array maximum of {}, clamping",
                num_elements,
                self.max_num_elements
            );
            num_elements = self.max_num_elements;
        }

        let needs_reallocation = range.update_placement(|placement| {
            placement.num_elements = num_elements;
            placement.capacity != num_elements
        });
        if needs_reallocation {
            self.core.set_needs_reallocation();
        }
        needs_reallocation
    }

    fn copy_range_data(&self, range: &BufferArrayRange, source: &dyn BufferSource) {
        let Some(resource) = self.resource(source.name()) else {
            coding_error(EngineError::ResourceNotFound {
                resource_type: "buffer resource".to_string(),
                id: source.name().to_string(),
            });
            return;
        };
        let Some(value) = source.data() else {
            invalid_source_error(source.name());
            return;
        };
        if value.tuple_type() != resource.tuple_type() {
            log::error!(
                "[StripedBufferArray] '{}': source layout {} does not match buffer layout {}",
                source.name(),
                value.tuple_type(),
                resource.tuple_type()
            );
            return;
        }

        let placement = range.placement();
        let (Some(offset), Some(buffer)) = (placement.element_offset, resource.allocation()) else {
            log::warn!("[StripedBufferArray] '{}': range has no storage yet", source.name());
            return;
        };

        let element_size = resource.tuple_type().size_in_bytes();
        let dst_size = placement.num_elements.min(placement.capacity) * element_size;
        let mut src_size = value.size_in_bytes();
        if src_size > dst_size {
            log::warn!(
                "[StripedBufferArray] '{}': size {} is larger than the range ({})",
                source.name(),
                src_size,
                dst_size
            );
            src_size = dst_size;
        }

        buffer.write(offset * element_size, &value.bytes()[..src_size]);
    }

    fn read_range_data(&self, range: &BufferArrayRange, name: &str) -> BufferValue {
        let Some(resource) = self.resource(name) else {
            coding_error(EngineError::ResourceNotFound {
                resource_type: "buffer resource".to_string(),
                id: name.to_string(),
            });
            return BufferValue::empty();
        };

        let placement = range.placement();
        let (Some(offset), Some(buffer)) = (placement.element_offset, resource.allocation()) else {
            return BufferValue::empty();
        };

        let element_size = resource.tuple_type().size_in_bytes();
        let count = placement.num_elements.min(placement.capacity);
        let bytes = buffer.read(offset * element_size, count * element_size);
        BufferValue::new(resource.tuple_type(), count, bytes)
    }

    fn resource(&self, name: &str) -> Option<Arc<BufferResource>> {
        self.resources
            .iter()
            .find(|(resource_name, _)| resource_name == name)
            .map(|(_, resource)| resource.clone())
    }

    fn resources(&self) -> Vec<(String, Arc<BufferResource>)> {
        self.resources.clone()
    }
}

/// Striped layout for vertex and varying data
#[derive(Debug, Clone)]
pub struct StripedAggregationStrategy {
    max_vbo_size: usize,
}

impl StripedAggregationStrategy {
    pub fn new(max_vbo_size: usize) -> Self {
        Self { max_vbo_size }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.max_vbo_size)
    }
}

impl AggregationStrategy for StripedAggregationStrategy {
    fn name(&self) -> &'static str {
        "striped"
    }

    fn create_buffer_array(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> Arc<dyn BufferArray> {
        // splitting is driven by element counts, not range counts
        StripedBufferArray::new(role, specs, usage_hint, self.max_vbo_size, usize::MAX, "striped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{TupleType, ValueBufferSource, ValueType};

    fn specs() -> Vec<BufferSpec> {
        vec![
            BufferSpec::new("points", TupleType::single(ValueType::Float32Vec3)),
            BufferSpec::new("widths", TupleType::single(ValueType::Float32)),
        ]
    }

    fn points(values: &[f32]) -> ValueBufferSource {
        ValueBufferSource::new(
            "points",
            BufferValue::from_pod(TupleType::single(ValueType::Float32Vec3), values),
        )
    }

    fn assigned_range(array: &Arc<StripedBufferArray>, num_elements: usize) -> RangeHandle {
        let range = Arc::new(BufferArrayRange::new());
        assert!(array.try_assign_range(&range));
        range.resize(num_elements);
        range
    }

    fn reallocate_in_place(array: &Arc<StripedBufferArray>) {
        let owner: Arc<dyn BufferArray> = array.clone();
        let ranges = array.core().live_ranges();
        array.reallocate(&ranges, &owner);
    }

    #[test]
    fn test_max_num_elements_from_widest_spec() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1200, usize::MAX, "striped");
        assert_eq!(array.max_num_elements(), 100);
    }

    #[test]
    fn test_assign_marks_reallocation() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let range = assigned_range(&array, 3);

        assert!(range.is_valid());
        assert!(array.needs_reallocation());
        assert_eq!(array.range_count(), 1);

        reallocate_in_place(&array);
        assert!(!array.needs_reallocation());
        assert_eq!(array.version(), 1);
        assert_eq!(range.element_offset(), Some(0));
        assert_eq!(range.capacity(), 3);
        assert_eq!(array.total_capacity(), 3);
    }

    #[test]
    fn test_copy_then_read_back() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let first = assigned_range(&array, 2);
        let second = assigned_range(&array, 1);
        reallocate_in_place(&array);

        let data = [0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0];
        first.copy_data(&points(&data));
        second.copy_data(&points(&[9.0, 9.0, 9.0]));

        assert_eq!(first.read_data("points").to_vec::<f32>(), data.to_vec());
        assert_eq!(second.read_data("points").to_vec::<f32>(), vec![9.0, 9.0, 9.0]);
        assert_eq!(second.element_offset(), Some(2));
    }

    #[test]
    fn test_oversize_copy_truncated() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let first = assigned_range(&array, 1);
        let second = assigned_range(&array, 1);
        reallocate_in_place(&array);

        second.copy_data(&points(&[7.0, 7.0, 7.0]));
        first.copy_data(&points(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]));

        assert_eq!(first.read_data("points").to_vec::<f32>(), vec![1.0, 1.0, 1.0]);
        assert_eq!(second.read_data("points").to_vec::<f32>(), vec![7.0, 7.0, 7.0]);
    }

    #[test]
    fn test_layout_mismatch_is_ignored() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let range = assigned_range(&array, 1);
        reallocate_in_place(&array);

        let wrong = ValueBufferSource::new(
            "points",
            BufferValue::from_pod(TupleType::single(ValueType::Int32Vec3), &[1i32, 2, 3]),
        );
        range.copy_data(&wrong);
        assert_eq!(range.read_data("points").to_vec::<f32>(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_resize_clamps_to_max() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 120, usize::MAX, "striped");
        let range = assigned_range(&array, 50);
        assert_eq!(range.num_elements(), 10);
    }

    #[test]
    fn test_resize_reports_capacity_change() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let range = assigned_range(&array, 4);
        reallocate_in_place(&array);

        assert!(!range.resize(4));
        assert!(!array.needs_reallocation());
        assert!(range.resize(6));
        assert!(array.needs_reallocation());
    }

    #[test]
    fn test_reallocation_preserves_data() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let first = assigned_range(&array, 1);
        let second = assigned_range(&array, 1);
        reallocate_in_place(&array);
        second.copy_data(&points(&[5.0, 6.0, 7.0]));

        drop(first);
        assert!(!array.garbage_collect());

        assert_eq!(array.range_count(), 1);
        assert_eq!(second.element_offset(), Some(0));
        assert_eq!(second.read_data("points").to_vec::<f32>(), vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_compaction_keeps_live_ranges() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let mut ranges: Vec<RangeHandle> = (0..8).map(|_| assigned_range(&array, 1)).collect();
        let survivors: Vec<RangeHandle> = ranges.iter().step_by(3).cloned().collect();
        ranges.clear();

        array.core().remove_unused_ranges();
        assert_eq!(array.range_count(), survivors.len());

        let live = array.core().live_ranges();
        assert_eq!(live.len(), survivors.len());
        for survivor in &survivors {
            assert!(live.iter().any(|range| Arc::ptr_eq(range, survivor)));
        }
    }

    #[test]
    fn test_empty_array_collects() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let range = assigned_range(&array, 2);
        reallocate_in_place(&array);
        drop(range);

        assert!(array.garbage_collect());
        assert!(array.resource("points").and_then(|r| r.allocation()).is_none());
    }

    #[test]
    fn test_zero_element_range_reads_empty() {
        let array = StripedBufferArray::new("primvar", &specs(), BufferArrayUsageHint::default(), 1 << 20, usize::MAX, "striped");
        let range = assigned_range(&array, 0);
        reallocate_in_place(&array);

        range.copy_data(&points(&[]));
        assert!(range.read_data("points").is_empty());
    }
}
