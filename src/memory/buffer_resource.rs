/// Buffer Resources
///
/// `DeviceBuffer` is the host-memory stand-in for a driver allocation.
/// `BufferResource` describes one attribute inside an allocation (offset,
/// stride and value layout) and survives reallocation: arrays swap the
/// allocation underneath it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::buffer_spec::TupleType;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Storage allocation
#[derive(Debug)]
pub struct DeviceBuffer {
    id: u64,
    bytes: RwLock<Vec<u8>>,
}

impl DeviceBuffer {
    /// Allocate a zero-filled buffer of `size` bytes
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            bytes: RwLock::new(vec![0; size]),
        })
    }

    /// Unique id, used to count shared allocations once
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> usize {
        self.bytes.read().len()
    }

    /// Write `data` at `offset`, truncated to the buffer end.
    /// Returns the number of bytes written.
    pub fn write(&self, offset: usize, data: &[u8]) -> usize {
        let mut bytes = self.bytes.write();
        if offset >= bytes.len() {
            return 0;
        }
        let len = data.len().min(bytes.len() - offset);
        bytes[offset..offset + len].copy_from_slice(&data[..len]);
        len
    }

    /// Read up to `len` bytes from `offset`
    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        let bytes = self.bytes.read();
        if offset >= bytes.len() {
            return Vec::new();
        }
        let end = offset.saturating_add(len).min(bytes.len());
        bytes[offset..end].to_vec()
    }
}

/// One attribute's view into an allocation
#[derive(Debug)]
pub struct BufferResource {
    role: String,
    tuple_type: TupleType,
    offset: usize,
    stride: usize,
    allocation: RwLock<Option<Arc<DeviceBuffer>>>,
}

impl BufferResource {
    pub fn new(role: impl Into<String>, tuple_type: TupleType, offset: usize, stride: usize) -> Self {
        Self {
            role: role.into(),
            tuple_type,
            offset,
            stride,
            allocation: RwLock::new(None),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn tuple_type(&self) -> TupleType {
        self.tuple_type
    }

    /// Byte offset of the first element within the allocation
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte distance between consecutive elements
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn allocation(&self) -> Option<Arc<DeviceBuffer>> {
        self.allocation.read().clone()
    }

    pub fn set_allocation(&self, buffer: Option<Arc<DeviceBuffer>>) {
        *self.allocation.write() = buffer;
    }

    /// Size of the current allocation in bytes
    pub fn size(&self) -> usize {
        self.allocation.read().as_ref().map_or(0, |buffer| buffer.size())
    }
}
