/// Sparse, index-addressed holder of range handles
use std::fmt;

use crate::error::{EngineError, EngineResult};

use super::buffer_array_range::RangeHandle;
use super::error::coding_error;

#[derive(Debug, Default, Clone)]
pub struct BufferArrayRangeContainer {
    ranges: Vec<Option<RangeHandle>>,
}

impl BufferArrayRangeContainer {
    /// Container with `size` empty slots
    pub fn new(size: usize) -> Self {
        Self {
            ranges: vec![None; size],
        }
    }

    /// Store `range` at `index`, growing the container as needed.
    /// A negative index is a coding error and leaves the container unchanged.
    pub fn set(&mut self, index: i32, range: Option<RangeHandle>) -> EngineResult<()> {
        let idx = usize::try_from(index).map_err(|_| {
            coding_error(EngineError::InvalidIndex {
                index: i64::from(index),
                size: self.ranges.len(),
            })
        })?;

        if idx >= self.ranges.len() {
            self.ranges.resize(idx + 1, None);
        }
        self.ranges[idx] = range;
        Ok(())
    }

    /// Range at `index`; `None` for empty slots and out-of-bounds or negative
    /// indices
    pub fn get(&self, index: i32) -> Option<&RangeHandle> {
        let idx = usize::try_from(index).ok()?;
        self.ranges.get(idx).and_then(Option::as_ref)
    }

    /// Resize to `size` slots, truncating or padding with empty slots
    pub fn resize(&mut self, size: usize) {
        self.ranges.resize(size, None);
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl fmt::Display for BufferArrayRangeContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BufferArrayRangeContainer ({} slots)", self.ranges.len())?;
        for (index, range) in self.ranges.iter().enumerate() {
            match range {
                Some(range) => writeln!(f, "  {}: {}", index, range)?,
                None => writeln!(f, "  {}: empty", index)?,
            }
        }
        Ok(())
    }
}
