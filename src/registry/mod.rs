/// Resource Registries
///
/// Pools buffer arrays per aggregation id, de-duplicates shared resources and
/// drives the per-frame commit of queued sources and computations.

pub mod allocation_report;
pub mod buffer_array_registry;
pub mod computation;
pub mod instance_registry;
pub mod resource_registry;

pub use allocation_report::{keys, AllocationReport};
pub use buffer_array_registry::BufferArrayRegistry;
pub use computation::{Computation, ComputationHandle, ComputeQueue, CopyComputation};
pub use instance_registry::{Instance, InstanceRegistry};
pub use resource_registry::{
    BufferCategory, CommitStats, PerfCounters, PerfSnapshot, ResourceRegistry, StrategySet,
};
