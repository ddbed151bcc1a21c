/// Buffer Array Range
///
/// A caller-held handle to a slice of a buffer array. The range keeps only a
/// weak back-pointer to its array; every storage-dependent operation is
/// forwarded to the array, which applies its own placement policy.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::buffer_array::BufferArray;
use super::buffer_resource::BufferResource;
use super::buffer_source::BufferSource;
use super::buffer_spec::{BufferArrayUsageHint, BufferSpec};
use super::buffer_value::BufferValue;
use super::error::invalid_range_error;

/// Shared handle to a range
pub type RangeHandle = Arc<BufferArrayRange>;

/// Where a range lives inside its array
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    /// First element (or struct index) inside the array; `None` until the
    /// array has been reallocated with this range
    pub element_offset: Option<usize>,
    /// Requested element count
    pub num_elements: usize,
    /// Element count backed by storage
    pub capacity: usize,
}

pub struct BufferArrayRange {
    array: RwLock<Option<Weak<dyn BufferArray>>>,
    placement: Mutex<Placement>,
}

impl BufferArrayRange {
    /// Unassigned range
    pub fn new() -> Self {
        Self::with_num_elements(0)
    }

    /// Unassigned range with a fixed element count (one struct per range for
    /// interleaved storage)
    pub fn with_num_elements(num_elements: usize) -> Self {
        Self {
            array: RwLock::new(None),
            placement: Mutex::new(Placement {
                element_offset: None,
                num_elements,
                capacity: 0,
            }),
        }
    }

    /// Owning array, if it is still alive
    pub fn buffer_array(&self) -> Option<Arc<dyn BufferArray>> {
        self.array.read().as_ref().and_then(Weak::upgrade)
    }

    /// True once the range has been handed to an array
    pub fn is_assigned(&self) -> bool {
        self.array.read().is_some()
    }

    /// True while the owning array is alive and the range has not been
    /// invalidated
    pub fn is_valid(&self) -> bool {
        self.buffer_array().is_some()
    }

    pub fn is_immutable(&self) -> bool {
        self.usage_hint().immutable
    }

    pub fn usage_hint(&self) -> BufferArrayUsageHint {
        self.buffer_array()
            .map(|array| array.usage_hint())
            .unwrap_or_default()
    }

    /// Request `num_elements` elements. Returns true if the owning array now
    /// needs reallocation.
    pub fn resize(&self, num_elements: usize) -> bool {
        match self.buffer_array() {
            Some(array) => array.resize_range(self, num_elements),
            None => {
                log::warn!("[BufferArrayRange] Resize of an invalid range ignored");
                false
            }
        }
    }

    /// Copy a resolved source into this range's storage
    pub fn copy_data(&self, source: &dyn BufferSource) {
        match self.buffer_array() {
            Some(array) => array.copy_range_data(self, source),
            None => {
                invalid_range_error(format!("copy of '{}'", source.name()));
            }
        }
    }

    /// Read back the buffer `name`. Empty when the range has no storage yet
    /// or the name is unknown.
    pub fn read_data(&self, name: &str) -> BufferValue {
        match self.buffer_array() {
            Some(array) if self.element_offset().is_some() => array.read_range_data(self, name),
            _ => BufferValue::empty(),
        }
    }

    pub fn num_elements(&self) -> usize {
        self.placement.lock().num_elements
    }

    pub fn element_offset(&self) -> Option<usize> {
        self.placement.lock().element_offset
    }

    pub fn capacity(&self) -> usize {
        self.placement.lock().capacity
    }

    pub fn max_num_elements(&self) -> usize {
        self.buffer_array().map_or(0, |array| array.max_num_elements())
    }

    /// Version of the owning array
    pub fn version(&self) -> usize {
        self.buffer_array().map_or(0, |array| array.version())
    }

    pub fn increment_version(&self) {
        if let Some(array) = self.buffer_array() {
            array.increment_version();
        }
    }

    /// Opaque identity of the owning array
    pub fn aggregation(&self) -> Option<usize> {
        self.buffer_array()
            .map(|array| Arc::as_ptr(&array) as *const () as usize)
    }

    /// True if both ranges live in the same array
    pub fn is_aggregated_with(&self, other: &BufferArrayRange) -> bool {
        match (self.aggregation(), other.aggregation()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn buffer_specs(&self) -> Vec<BufferSpec> {
        self.buffer_array()
            .map(|array| array.buffer_specs().to_vec())
            .unwrap_or_default()
    }

    pub fn resource(&self, name: &str) -> Option<Arc<BufferResource>> {
        self.buffer_array().and_then(|array| array.resource(name))
    }

    /// Detach the range from its array
    pub fn invalidate(&self) {
        *self.array.write() = None;
    }

    pub(crate) fn set_buffer_array(&self, array: Weak<dyn BufferArray>) {
        *self.array.write() = Some(array);
    }

    pub(crate) fn placement(&self) -> Placement {
        *self.placement.lock()
    }

    pub(crate) fn update_placement<R>(&self, f: impl FnOnce(&mut Placement) -> R) -> R {
        f(&mut self.placement.lock())
    }
}

impl Default for BufferArrayRange {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BufferArrayRange {
    fn drop(&mut self) {
        if let Some(array) = self.array.get_mut().as_ref().and_then(Weak::upgrade) {
            array.core().set_needs_compaction();
        }
    }
}

impl fmt::Debug for BufferArrayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let placement = self.placement();
        f.debug_struct("BufferArrayRange")
            .field("valid", &self.is_valid())
            .field("element_offset", &placement.element_offset)
            .field("num_elements", &placement.num_elements)
            .field("capacity", &placement.capacity)
            .finish()
    }
}

impl fmt::Display for BufferArrayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let placement = self.placement();
        match placement.element_offset {
            Some(offset) => write!(
                f,
                "[range] offset {} num_elements {} capacity {}",
                offset, placement.num_elements, placement.capacity
            ),
            None => write!(f, "[range] unplaced num_elements {}", placement.num_elements),
        }
    }
}
