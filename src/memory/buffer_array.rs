/// Buffer Arrays
///
/// A buffer array is one aggregation: a fixed schema of buffers shared by many
/// ranges. `BufferArrayCore` carries the bookkeeping every array needs (weak
/// range slots, dirty flags, version); the `BufferArray` trait adds the
/// storage policy implemented by each aggregation strategy.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::buffer_array_range::{BufferArrayRange, RangeHandle};
use super::buffer_resource::BufferResource;
use super::buffer_source::BufferSource;
use super::buffer_spec::{BufferArrayUsageHint, BufferSpec};
use super::buffer_value::BufferValue;

/// Shared bookkeeping of a buffer array
pub struct BufferArrayCore {
    role: String,
    specs: Vec<BufferSpec>,
    usage_hint: BufferArrayUsageHint,

    /// Weak references to assigned ranges; expired slots wait for compaction
    slots: RwLock<Vec<Option<Weak<BufferArrayRange>>>>,

    /// Reserved slot count. May transiently exceed `slots.len()` while an
    /// assignment is in flight.
    range_count: AtomicUsize,
    max_num_ranges: usize,

    needs_reallocation: AtomicBool,
    needs_compaction: AtomicBool,
    version: AtomicUsize,

    self_ref: Weak<dyn BufferArray>,
}

impl BufferArrayCore {
    /// `self_ref` is the weak handle of the array embedding this core, as
    /// handed out by `Arc::new_cyclic`
    pub fn new(
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
        max_num_ranges: usize,
        self_ref: Weak<dyn BufferArray>,
    ) -> Self {
        Self {
            role: role.to_string(),
            specs: specs.to_vec(),
            usage_hint,
            slots: RwLock::new(Vec::new()),
            range_count: AtomicUsize::new(0),
            max_num_ranges,
            needs_reallocation: AtomicBool::new(false),
            needs_compaction: AtomicBool::new(false),
            version: AtomicUsize::new(0),
            self_ref,
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn specs(&self) -> &[BufferSpec] {
        &self.specs
    }

    pub fn usage_hint(&self) -> BufferArrayUsageHint {
        self.usage_hint
    }

    pub fn max_num_ranges(&self) -> usize {
        self.max_num_ranges
    }

    /// Strong handle to the embedding array
    pub fn self_handle(&self) -> Option<Arc<dyn BufferArray>> {
        self.self_ref.upgrade()
    }

    /// Reserve a slot and install `range` in it
    ///
    /// Lock-free on the reservation; the slot vector is only write-locked to
    /// grow it and store the weak reference.
    pub fn try_assign_range(&self, range: &RangeHandle) -> bool {
        let index = self.range_count.fetch_add(1, Ordering::AcqRel);
        if index >= self.max_num_ranges {
            // Best-effort clamp so the counter does not run away
            self.range_count.store(self.max_num_ranges, Ordering::Release);
            return false;
        }

        {
            let mut slots = self.slots.write();
            if slots.len() <= index {
                slots.resize_with(index + 1, || None);
            }
            slots[index] = Some(Arc::downgrade(range));
        }

        range.set_buffer_array(self.self_ref.clone());
        self.needs_reallocation.store(true, Ordering::Release);
        true
    }

    /// Drop expired slots in place by swapping the last entry into the hole.
    /// Live ranges keep no particular order.
    pub fn remove_unused_ranges(&self) {
        let mut slots = self.slots.write();
        let reserved = self.range_count.load(Ordering::Acquire).min(slots.len());
        slots.truncate(reserved);

        let mut index = 0;
        while index < slots.len() {
            let expired = slots[index]
                .as_ref()
                .map_or(true, |weak| weak.strong_count() == 0);
            if expired {
                // re-check the moved entry on the next pass
                slots.swap_remove(index);
            } else {
                index += 1;
            }
        }

        self.range_count.store(slots.len(), Ordering::Release);
    }

    /// Replace the slot list with `ranges` and bind each of them to this array
    pub fn set_range_list(&self, ranges: &[RangeHandle]) {
        let mut slots = self.slots.write();
        slots.clear();
        slots.extend(ranges.iter().map(|range| Some(Arc::downgrade(range))));
        self.range_count.store(slots.len(), Ordering::Release);

        for range in ranges {
            range.set_buffer_array(self.self_ref.clone());
        }
    }

    /// Range at `index`, if reserved and still alive
    pub fn range(&self, index: usize) -> Option<RangeHandle> {
        self.slots
            .read()
            .get(index)
            .and_then(|slot| slot.as_ref())
            .and_then(Weak::upgrade)
    }

    /// Every live range, in slot order
    pub fn live_ranges(&self) -> Vec<RangeHandle> {
        self.slots
            .read()
            .iter()
            .filter_map(|slot| slot.as_ref().and_then(Weak::upgrade))
            .collect()
    }

    pub fn range_count(&self) -> usize {
        self.range_count.load(Ordering::Acquire)
    }

    pub fn needs_reallocation(&self) -> bool {
        self.needs_reallocation.load(Ordering::Acquire)
    }

    pub fn set_needs_reallocation(&self) {
        self.needs_reallocation.store(true, Ordering::Release);
    }

    pub fn needs_compaction(&self) -> bool {
        self.needs_compaction.load(Ordering::Acquire)
    }

    pub fn set_needs_compaction(&self) {
        self.needs_compaction.store(true, Ordering::Release);
    }

    /// Clear both dirty flags and bump the version; called at the end of a
    /// reallocation
    pub fn finish_reallocation(&self) {
        self.needs_reallocation.store(false, Ordering::Release);
        self.needs_compaction.store(false, Ordering::Release);
        self.increment_version();
    }

    pub fn version(&self) -> usize {
        self.version.load(Ordering::Acquire)
    }

    pub fn increment_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for BufferArrayCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferArrayCore")
            .field("role", &self.role)
            .field("specs", &self.specs.len())
            .field("range_count", &self.range_count())
            .field("max_num_ranges", &self.max_num_ranges)
            .field("needs_reallocation", &self.needs_reallocation())
            .field("needs_compaction", &self.needs_compaction())
            .field("version", &self.version())
            .finish()
    }
}

/// Storage policy of one aggregation
pub trait BufferArray: Send + Sync {
    fn core(&self) -> &BufferArrayCore;

    /// Short name of the storage layout, for diagnostics
    fn layout_name(&self) -> &'static str;

    /// Size storage for `ranges` and place each of them
    ///
    /// `cur_range_owner` is the array the ranges' current placements refer
    /// to. It differs from `self` when ranges are being split off another
    /// array. Data is carried over, the dirty flags cleared and the version
    /// bumped.
    fn reallocate(&self, ranges: &[RangeHandle], cur_range_owner: &Arc<dyn BufferArray>);

    /// Element capacity of a single range
    fn max_num_elements(&self) -> usize;

    /// Apply a resize request from `range`; true if reallocation is needed
    fn resize_range(&self, range: &BufferArrayRange, num_elements: usize) -> bool;

    fn copy_range_data(&self, range: &BufferArrayRange, source: &dyn BufferSource);

    fn read_range_data(&self, range: &BufferArrayRange, name: &str) -> BufferValue;

    fn resource(&self, name: &str) -> Option<Arc<BufferResource>>;

    /// Named resources in schema order
    fn resources(&self) -> Vec<(String, Arc<BufferResource>)>;

    /// Compact if needed. Returns true when the array holds no ranges and can
    /// be dropped.
    fn garbage_collect(&self) -> bool {
        let core = self.core();
        if core.needs_compaction() {
            core.remove_unused_ranges();
            let ranges = core.live_ranges();
            if let Some(owner) = core.self_handle() {
                self.reallocate(&ranges, &owner);
            }
        }
        core.range_count() == 0
    }

    fn try_assign_range(&self, range: &RangeHandle) -> bool {
        self.core().try_assign_range(range)
    }

    fn role(&self) -> &str {
        self.core().role()
    }

    fn buffer_specs(&self) -> &[BufferSpec] {
        self.core().specs()
    }

    fn usage_hint(&self) -> BufferArrayUsageHint {
        self.core().usage_hint()
    }

    fn range_count(&self) -> usize {
        self.core().range_count()
    }

    fn max_num_ranges(&self) -> usize {
        self.core().max_num_ranges()
    }

    fn range(&self, index: usize) -> Option<RangeHandle> {
        self.core().range(index)
    }

    fn needs_reallocation(&self) -> bool {
        self.core().needs_reallocation()
    }

    fn version(&self) -> usize {
        self.core().version()
    }

    fn increment_version(&self) {
        self.core().increment_version()
    }
}

impl fmt::Display for dyn BufferArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} array '{}' ranges {}/{} version {}{}",
            self.layout_name(),
            self.role(),
            self.range_count(),
            self.max_num_ranges(),
            self.version(),
            if self.needs_reallocation() { " (dirty)" } else { "" },
        )?;
        for (name, resource) in self.resources() {
            writeln!(
                f,
                "    {} {} offset {} stride {} size {}",
                name,
                resource.tuple_type(),
                resource.offset(),
                resource.stride(),
                resource.size()
            )?;
        }
        for range in self.core().live_ranges() {
            writeln!(f, "    {}", range)?;
        }
        Ok(())
    }
}
