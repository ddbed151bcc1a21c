/// Aggregation Strategies
///
/// A strategy decides which ranges may share an array (through the
/// aggregation id) and how that array lays out its storage.

pub mod striped;
pub mod interleaved;
pub mod simple;

pub use striped::{StripedAggregationStrategy, StripedBufferArray};
pub use interleaved::{InterleavedAggregationStrategy, InterleavedBlock, InterleavedBufferArray};
pub use simple::SimpleAggregationStrategy;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::{FxHashSet, FxHasher};

use crate::registry::AllocationReport;

use super::buffer_array::BufferArray;
use super::buffer_array_range::{BufferArrayRange, RangeHandle};
use super::buffer_spec::{BufferArrayUsageHint, BufferSpec};

pub trait AggregationStrategy: Send + Sync {
    /// Strategy name; also salts aggregation ids
    fn name(&self) -> &'static str;

    fn create_buffer_array(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> Arc<dyn BufferArray>;

    /// New unassigned range suited to this strategy's arrays
    fn create_buffer_array_range(&self) -> RangeHandle {
        Arc::new(BufferArrayRange::new())
    }

    /// Ranges with equal ids may share an array
    fn compute_aggregation_id(&self, specs: &[BufferSpec], usage_hint: BufferArrayUsageHint) -> u64 {
        let mut hasher = FxHasher::default();
        self.name().hash(&mut hasher);
        specs.hash(&mut hasher);
        usage_hint.bits().hash(&mut hasher);
        hasher.finish()
    }

    fn buffer_specs(&self, array: &dyn BufferArray) -> Vec<BufferSpec> {
        array.buffer_specs().to_vec()
    }

    /// Add the array's allocated bytes to `report` under its role and return
    /// them. Allocations shared between resources count once.
    fn resource_allocation(&self, array: &dyn BufferArray, report: &mut AllocationReport) -> usize {
        let mut seen = FxHashSet::default();
        let mut total = 0;
        for (_, resource) in array.resources() {
            if let Some(buffer) = resource.allocation() {
                if seen.insert(buffer.id()) {
                    total += buffer.size();
                }
            }
        }
        report.add(array.role(), total);
        total
    }
}
