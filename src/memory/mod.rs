/// Aggregated Buffer Memory
///
/// Buffer schemas, ranges and the arrays that pack many ranges into a few large
/// allocations, plus the aggregation strategies that decide how they are laid
/// out. Registries that pool arrays live in [`crate::registry`].

pub mod error;
pub mod buffer_spec;
pub mod buffer_value;
pub mod buffer_resource;
pub mod buffer_source;
pub mod buffer_array_range;
pub mod range_container;
pub mod buffer_array;
pub mod strategy;

pub use error::{MemoryResult, MemoryErrorContext, coding_error, invalid_range_error, invalid_source_error};
pub use buffer_spec::{BufferSpec, TupleType, ValueType, BufferArrayUsageHint};
pub use buffer_value::BufferValue;
pub use buffer_resource::{BufferResource, DeviceBuffer};
pub use buffer_source::{BufferSource, SourceHandle, ValueBufferSource, DerivedBufferSource};
pub use buffer_array_range::{BufferArrayRange, RangeHandle};
pub use range_container::BufferArrayRangeContainer;
pub use buffer_array::{BufferArray, BufferArrayCore};
pub use strategy::{
    AggregationStrategy, StripedAggregationStrategy, InterleavedAggregationStrategy, InterleavedBlock,
    SimpleAggregationStrategy,
};
