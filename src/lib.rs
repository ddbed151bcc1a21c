pub mod config;
pub mod error;
pub mod memory;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{EngineError, EngineResult};
pub use memory::{
    AggregationStrategy, BufferArray, BufferArrayRange, BufferArrayRangeContainer, BufferArrayUsageHint,
    BufferSource, BufferSpec, BufferValue, DerivedBufferSource, RangeHandle, SourceHandle, TupleType,
    ValueBufferSource, ValueType,
};
pub use registry::{
    AllocationReport, BufferCategory, CommitStats, Computation, ComputeQueue, ResourceRegistry,
};
