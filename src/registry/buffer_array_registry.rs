/// Buffer Array Registry
///
/// Pools buffer arrays by aggregation id. Allocation is safe from many threads:
/// the first writer for an id constructs the bucket while later writers wait on
/// a condition variable. Assignment then tries each array front to back and
/// only appends a new array once the tail is full. Reallocation and garbage
/// collection take `&mut self` and therefore never overlap allocation.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use crate::error::{EngineError, EngineResult};
use crate::memory::error::coding_error;
use crate::memory::{
    AggregationStrategy, BufferArray, BufferArrayUsageHint, BufferSpec, RangeHandle,
};

use super::allocation_report::AllocationReport;

/// Arrays sharing one aggregation id
#[derive(Default)]
struct ArrayEntry {
    /// Empty only while the first writer is constructing the bucket
    arrays: Mutex<Vec<Arc<dyn BufferArray>>>,
    constructed: Condvar,
}

impl ArrayEntry {
    /// Array at `index` and whether it is the tail, waiting for the first
    /// writer to construct the bucket if necessary
    fn wait_for_array(&self, index: usize) -> (Arc<dyn BufferArray>, bool) {
        let mut arrays = self.arrays.lock();
        loop {
            if let Some(array) = arrays.get(index) {
                return (array.clone(), index + 1 == arrays.len());
            }
            self.constructed.wait(&mut arrays);
        }
    }
}

#[derive(Default)]
pub struct BufferArrayRegistry {
    entries: DashMap<u64, Arc<ArrayEntry>>,
}

impl BufferArrayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a range for `specs`, aggregated with compatible ranges
    pub fn allocate_range(
        &self,
        strategy: &dyn AggregationStrategy,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> EngineResult<RangeHandle> {
        if specs.is_empty() {
            return Err(coding_error(EngineError::EmptyBufferSpecs {
                role: role.to_string(),
            }));
        }

        let aggregation_id = strategy.compute_aggregation_id(specs, usage_hint);
        let range = strategy.create_buffer_array_range();

        // The shard lock is released before any bucket work happens
        let (entry, first_writer) = match self.entries.entry(aggregation_id) {
            Entry::Occupied(occupied) => (occupied.get().clone(), false),
            Entry::Vacant(vacant) => {
                let entry = Arc::new(ArrayEntry::default());
                vacant.insert(entry.clone());
                (entry, true)
            }
        };

        if first_writer {
            let array = strategy.create_buffer_array(role, specs, usage_hint);
            log::debug!(
                "[BufferArrayRegistry] New bucket {:016x} for '{}' ({} specs)",
                aggregation_id,
                role,
                specs.len()
            );
            entry.arrays.lock().push(array);
            entry.constructed.notify_all();
        }

        // Arrays emptied by compaction are refilled before a new one is appended
        let mut index = 0;
        loop {
            let (array, is_tail) = entry.wait_for_array(index);
            if array.max_num_ranges() == 0 {
                return Err(coding_error(EngineError::InvalidRange {
                    context: format!("schema for '{}' does not fit a single element", role),
                }));
            }
            if array.try_assign_range(&range) {
                return Ok(range);
            }
            if is_tail {
                Self::insert_new_array(&entry, &array, strategy, role, specs, usage_hint);
            }
            index += 1;
        }
    }

    /// Append a fresh array unless another thread already replaced the tail
    fn insert_new_array(
        entry: &ArrayEntry,
        expected_tail: &Arc<dyn BufferArray>,
        strategy: &dyn AggregationStrategy,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) {
        let mut arrays = entry.arrays.lock();
        let tail_unchanged = arrays
            .last()
            .map_or(true, |tail| Arc::ptr_eq(tail, expected_tail));
        if tail_unchanged {
            log::debug!(
                "[BufferArrayRegistry] Array for '{}' is full, appending array #{}",
                role,
                arrays.len() + 1
            );
            arrays.push(strategy.create_buffer_array(role, specs, usage_hint));
        }
    }

    /// Reallocate every dirty array, splitting arrays whose ranges no longer
    /// fit. Split-off arrays are inserted ahead of the array they came from.
    /// Returns the number of arrays reallocated.
    pub fn reallocate_all(&mut self, strategy: &dyn AggregationStrategy) -> usize {
        let mut reallocated = 0;

        for entry in self.entries.iter() {
            let mut arrays = entry.value().arrays.lock();
            let mut index = 0;
            while index < arrays.len() {
                let array = arrays[index].clone();
                if !array.needs_reallocation() {
                    index += 1;
                    continue;
                }

                let max_total_elements = array.max_num_elements();
                let mut total_elements = 0;
                let mut ranges: Vec<RangeHandle> = Vec::new();

                for range in array.core().live_ranges() {
                    let num_elements = range.num_elements();
                    if total_elements + num_elements > max_total_elements && !ranges.is_empty() {
                        let specs = strategy.buffer_specs(array.as_ref());
                        let split = strategy.create_buffer_array(array.role(), &specs, array.usage_hint());
                        split.reallocate(&ranges, &array);
                        log::debug!(
                            "[BufferArrayRegistry] Split {} ranges ({} elements) off '{}'",
                            ranges.len(),
                            total_elements,
                            array.role()
                        );

                        arrays.insert(index, split);
                        index += 1;
                        reallocated += 1;

                        total_elements = 0;
                        ranges.clear();
                    }
                    total_elements += num_elements;
                    ranges.push(range);
                }

                array.reallocate(&ranges, &array);
                reallocated += 1;
                index += 1;
            }
        }

        if reallocated > 0 {
            log::debug!("[BufferArrayRegistry] Reallocated {} arrays", reallocated);
        }
        reallocated
    }

    /// Compact arrays and evict the empty ones, dropping buckets left without
    /// arrays. Returns the number of arrays evicted.
    pub fn garbage_collect(&mut self) -> usize {
        let mut evicted = 0;

        self.entries.retain(|aggregation_id, entry| {
            let mut arrays = entry.arrays.lock();
            let before = arrays.len();
            arrays.retain(|array| !array.garbage_collect());
            evicted += before - arrays.len();

            if arrays.is_empty() {
                log::debug!("[BufferArrayRegistry] Evicted bucket {:016x}", aggregation_id);
            }
            !arrays.is_empty()
        });

        if evicted > 0 {
            log::debug!("[BufferArrayRegistry] Garbage collected {} arrays", evicted);
        }
        evicted
    }

    /// Add every array's allocation to `report` and return the total
    pub fn resource_allocation(&self, strategy: &dyn AggregationStrategy, report: &mut AllocationReport) -> usize {
        self.arrays()
            .iter()
            .map(|array| strategy.resource_allocation(array.as_ref(), report))
            .sum()
    }

    /// Snapshot of every array in every bucket
    pub fn arrays(&self) -> Vec<Arc<dyn BufferArray>> {
        self.entries
            .iter()
            .flat_map(|entry| entry.value().arrays.lock().clone())
            .collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.entries.len()
    }

    pub fn array_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.value().arrays.lock().len())
            .sum()
    }
}

impl fmt::Display for BufferArrayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BufferArrayRegistry: {} buckets", self.entries.len())?;
        for entry in self.entries.iter() {
            let arrays = entry.value().arrays.lock();
            writeln!(f, " bucket {:016x}: {} arrays", entry.key(), arrays.len())?;
            for array in arrays.iter() {
                write!(f, "{}", array.as_ref())?;
            }
        }
        Ok(())
    }
}
