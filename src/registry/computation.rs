/// Deferred Computations
///
/// Work executed after all sources have been copied, in registration order
/// within each compute queue. A computation may grow its destination range
/// before the reallocation phase through `num_output_elements`.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::memory::error::invalid_range_error;
use crate::memory::{BufferSource, BufferSpec, RangeHandle, ValueBufferSource};

use super::resource_registry::ResourceRegistry;

/// Execution queue. Queues run in order; all work of one queue completes
/// before the next starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComputeQueue {
    #[default]
    Zero,
    One,
    Two,
    Three,
}

impl ComputeQueue {
    pub const COUNT: usize = 4;

    pub const ALL: [ComputeQueue; Self::COUNT] = [
        ComputeQueue::Zero,
        ComputeQueue::One,
        ComputeQueue::Two,
        ComputeQueue::Three,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

pub trait Computation: Send + Sync {
    /// Run against the destination range, if any
    fn execute(&self, range: Option<&RangeHandle>, registry: &ResourceRegistry);

    /// Elements the computation writes; zero leaves the range size alone
    fn num_output_elements(&self) -> usize;

    /// Buffers the computation writes
    fn buffer_specs(&self) -> Vec<BufferSpec>;

    fn is_valid(&self) -> bool {
        true
    }
}

/// Shared handle to a computation
pub type ComputationHandle = Arc<dyn Computation>;

/// Copies one named buffer from a source range into the destination range.
/// Queued when a range migrates to a new aggregation.
pub struct CopyComputation {
    src: RangeHandle,
    name: String,
}

impl CopyComputation {
    pub fn new(src: RangeHandle, name: impl Into<String>) -> Self {
        Self {
            src,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Computation for CopyComputation {
    fn execute(&self, range: Option<&RangeHandle>, registry: &ResourceRegistry) {
        let Some(dst) = range.filter(|dst| dst.is_valid()) else {
            invalid_range_error(format!("copy destination for '{}'", self.name));
            return;
        };
        if !self.src.is_valid() {
            invalid_range_error(format!("copy source for '{}'", self.name));
            return;
        }

        let value = self.src.read_data(&self.name);
        if value.is_empty() {
            return;
        }

        let source = ValueBufferSource::new(self.name.clone(), value);
        source.resolve();
        dst.copy_data(&source);

        registry
            .perf_counters()
            .copy_buffer_gpu_to_gpu
            .fetch_add(1, Ordering::Relaxed);
        log::trace!("[CopyComputation] Copied '{}' ({} elements)", self.name, source.num_elements());
    }

    fn num_output_elements(&self) -> usize {
        self.src.num_elements()
    }

    fn buffer_specs(&self) -> Vec<BufferSpec> {
        self.src
            .resource(&self.name)
            .map(|resource| vec![BufferSpec::new(self.name.clone(), resource.tuple_type())])
            .unwrap_or_default()
    }

    fn is_valid(&self) -> bool {
        self.src.is_valid()
    }
}
