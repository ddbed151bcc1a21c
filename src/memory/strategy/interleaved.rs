/// Interleaved Aggregation
///
/// All attributes of a range are packed into one struct and structs are laid
/// out back to back in a single buffer, following std140/std430 style
/// alignment. Each range holds exactly one struct.

use std::sync::{Arc, Weak};

use crate::config::RegistryConfig;
use crate::error::EngineError;
use crate::memory::buffer_array::{BufferArray, BufferArrayCore};
use crate::memory::buffer_array_range::{BufferArrayRange, RangeHandle};
use crate::memory::buffer_resource::{BufferResource, DeviceBuffer};
use crate::memory::buffer_source::BufferSource;
use crate::memory::buffer_spec::{BufferArrayUsageHint, BufferSpec, TupleType};
use crate::memory::buffer_value::BufferValue;
use crate::memory::error::{coding_error, invalid_source_error};

use super::AggregationStrategy;

/// Bytes needed to move `offset` up to a multiple of `alignment`
fn compute_padding(alignment: usize, offset: usize) -> usize {
    if alignment == 0 {
        return 0;
    }
    (alignment - (offset & (alignment - 1))) & (alignment - 1)
}

/// Base alignment of a member. Matrices align as arrays of vec4 and vec3
/// rounds up to vec4.
fn compute_alignment(tuple_type: TupleType) -> usize {
    let value_type = tuple_type.value_type;
    let mut components = value_type.component_count().min(4);
    if components == 3 {
        components = 4;
    }
    value_type.component_size() * components
}

/// Struct-per-range buffer array
pub struct InterleavedBufferArray {
    core: BufferArrayCore,
    layout_name: &'static str,
    resources: Vec<(String, Arc<BufferResource>)>,
    stride: usize,
}

impl InterleavedBufferArray {
    pub fn new(
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
        buffer_offset_alignment: usize,
        struct_alignment: usize,
        max_size: usize,
        layout_name: &'static str,
    ) -> Arc<Self> {
        let mut stride = 0;
        let mut struct_alignment = struct_alignment;
        for spec in specs {
            let alignment = compute_alignment(spec.tuple_type);
            stride += compute_padding(alignment, stride);
            struct_alignment = struct_alignment.max(alignment);
            stride += spec.tuple_type.size_in_bytes();
        }
        stride += compute_padding(struct_alignment, stride);
        stride += compute_padding(buffer_offset_alignment, stride);

        let mut offset = 0;
        let mut resources = Vec::with_capacity(specs.len());
        for spec in specs {
            offset += compute_padding(compute_alignment(spec.tuple_type), offset);
            log::trace!("[InterleavedBufferArray]   {} : offset = {}", spec.name, offset);
            resources.push((
                spec.name.clone(),
                Arc::new(BufferResource::new(role, spec.tuple_type, offset, stride)),
            ));
            offset += spec.tuple_type.size_in_bytes();
        }

        let max_num_ranges = if stride == 0 { 0 } else { max_size / stride };
        log::debug!(
            "[InterleavedBufferArray] Created {} array '{}': stride = {}, max {} ranges",
            layout_name,
            role,
            stride,
            max_num_ranges
        );

        Arc::new_cyclic(|weak: &Weak<InterleavedBufferArray>| {
            let self_ref: Weak<dyn BufferArray> = weak.clone();
            Self {
                core: BufferArrayCore::new(role, specs, usage_hint, max_num_ranges, self_ref),
                layout_name,
                resources,
                stride,
            }
        })
    }

    /// Bytes per struct
    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl BufferArray for InterleavedBufferArray {
    fn core(&self) -> &BufferArrayCore {
        &self.core
    }

    fn layout_name(&self) -> &'static str {
        self.layout_name
    }

    fn reallocate(&self, ranges: &[RangeHandle], cur_range_owner: &Arc<dyn BufferArray>) {
        let element_count: usize = ranges.iter().map(|range| range.num_elements()).sum();
        let total_size = element_count * self.stride;

        self.core.set_range_list(ranges);

        // every resource shares one allocation
        let cur_buffer = cur_range_owner
            .resources()
            .into_iter()
            .next()
            .and_then(|(_, resource)| resource.allocation());
        let new_buffer = (total_size > 0).then(|| DeviceBuffer::new(total_size));

        let mut index = 0;
        for range in ranges {
            let placement = range.placement();
            if let (Some(cur_buffer), Some(new_buffer), Some(old_index)) =
                (&cur_buffer, &new_buffer, placement.element_offset)
            {
                let copy_size = self.stride * placement.num_elements;
                let bytes = cur_buffer.read(old_index * self.stride, copy_size);
                new_buffer.write(index * self.stride, &bytes);
            }

            range.update_placement(|placement| {
                placement.element_offset = Some(index);
                placement.capacity = placement.num_elements;
            });
            index += placement.num_elements;
        }

        for (_, resource) in &self.resources {
            resource.set_allocation(new_buffer.clone());
        }

        self.core.finish_reallocation();
        log::debug!(
            "[InterleavedBufferArray] Reallocated '{}': {} structs, {} bytes",
            self.core.role(),
            element_count,
            total_size
        );
    }

    fn max_num_elements(&self) -> usize {
        self.core.max_num_ranges()
    }

    fn resize_range(&self, _range: &BufferArrayRange, _num_elements: usize) -> bool {
        // one struct per range, never resized
        false
    }

    fn copy_range_data(&self, range: &BufferArrayRange, source: &dyn BufferSource) {
        let resource = match self.resource(source.name()) {
            Some(resource) if resource.allocation().is_some() => resource,
            _ => {
                coding_error(EngineError::ResourceNotFound {
                    resource_type: "interleaved buffer".to_string(),
                    id: source.name().to_string(),
                });
                return;
            }
        };
        let Some(value) = source.data() else {
            invalid_source_error(source.name());
            return;
        };

        // arity may differ: N-tuples and N-element arrays interchange
        if value.tuple_type().value_type != resource.tuple_type().value_type {
            log::error!(
                "[InterleavedBufferArray] '{}': ({}) != ({})",
                source.name(),
                value.tuple_type(),
                resource.tuple_type()
            );
            return;
        }

        let placement = range.placement();
        let (Some(index), Some(buffer)) = (placement.element_offset, resource.allocation()) else {
            return;
        };

        let data_size = resource.tuple_type().size_in_bytes();
        let data = value.bytes();
        let mut offset = resource.offset() + self.stride * index;
        for element in 0..placement.num_elements {
            let start = element * data_size;
            if start >= data.len() {
                break;
            }
            let end = (start + data_size).min(data.len());
            buffer.write(offset, &data[start..end]);
            offset += self.stride;
        }
    }

    fn read_range_data(&self, range: &BufferArrayRange, name: &str) -> BufferValue {
        let Some(resource) = self.resource(name) else {
            coding_error(EngineError::ResourceNotFound {
                resource_type: "interleaved buffer".to_string(),
                id: name.to_string(),
            });
            return BufferValue::empty();
        };

        let placement = range.placement();
        let (Some(index), Some(buffer)) = (placement.element_offset, resource.allocation()) else {
            return BufferValue::empty();
        };

        let data_size = resource.tuple_type().size_in_bytes();
        let mut bytes = Vec::with_capacity(data_size * placement.num_elements);
        let mut offset = resource.offset() + self.stride * index;
        for _ in 0..placement.num_elements {
            bytes.extend(buffer.read(offset, data_size));
            offset += self.stride;
        }
        BufferValue::new(resource.tuple_type(), placement.num_elements, bytes)
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

/// Which block flavour an interleaved strategy produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterleavedBlock {
    Uniform,
    ShaderStorage,
}

#[derive(Debug, Clone)]
pub struct InterleavedAggregationStrategy {
    block: InterleavedBlock,
    buffer_offset_alignment: usize,
    struct_alignment: usize,
    max_size: usize,
}

impl InterleavedAggregationStrategy {
    pub fn new(block: InterleavedBlock, buffer_offset_alignment: usize, struct_alignment: usize, max_size: usize) -> Self {
        Self {
            block,
            buffer_offset_alignment,
            struct_alignment,
            max_size,
        }
    }

    /// Uniform blocks: struct aligned to a vec4, stride aligned for binding
    pub fn uniform(config: &RegistryConfig) -> Self {
        Self::new(
            InterleavedBlock::Uniform,
            config.uniform_buffer_offset_alignment,
            config.uniform_struct_alignment,
            config.max_uniform_block_size,
        )
    }

    /// Shader storage blocks: std430 packing, no extra alignment
    pub fn shader_storage(config: &RegistryConfig) -> Self {
        Self::new(InterleavedBlock::ShaderStorage, 0, 0, config.max_shader_storage_block_size)
    }

    pub fn block(&self) -> InterleavedBlock {
        self.block
    }
}

impl AggregationStrategy for InterleavedAggregationStrategy {
    fn name(&self) -> &'static str {
        match self.block {
            InterleavedBlock::Uniform => "uniform",
            InterleavedBlock::ShaderStorage => "shader_storage",
        }
    }

    fn create_buffer_array(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> Arc<dyn BufferArray> {
        InterleavedBufferArray::new(
            role,
            specs,
            usage_hint,
            self.buffer_offset_alignment,
            self.struct_alignment,
            self.max_size,
            self.name(),
        )
    }

    fn create_buffer_array_range(&self) -> RangeHandle {
        Arc::new(BufferArrayRange::with_num_elements(1))
    }
}
