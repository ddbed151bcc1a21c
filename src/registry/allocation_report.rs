/// Allocation Report
///
/// Byte totals per role and per storage category, filled in by
/// `ResourceRegistry::resource_allocation`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known report keys
pub mod keys {
    pub const NON_UNIFORM_SIZE: &str = "non_uniform_size";
    pub const UBO_SIZE: &str = "ubo_size";
    pub const SSBO_SIZE: &str = "ssbo_size";
    pub const SINGLE_BUFFER_SIZE: &str = "single_buffer_size";
    pub const GPU_MEMORY_USED: &str = "gpu_memory_used";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReport {
    entries: BTreeMap<String, usize>,
}

impl AllocationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `bytes` under `key`
    pub fn add(&mut self, key: &str, bytes: usize) {
        *self.entries.entry(key.to_string()).or_insert(0) += bytes;
    }

    /// Overwrite `key`
    pub fn set(&mut self, key: &str, bytes: usize) {
        self.entries.insert(key.to_string(), bytes);
    }

    /// Bytes recorded under `key`, zero if absent
    pub fn get(&self, key: &str) -> usize {
        self.entries.get(key).copied().unwrap_or(0)
    }

    pub fn gpu_memory_used(&self) -> usize {
        self.get(keys::GPU_MEMORY_USED)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(key, bytes)| (key.as_str(), *bytes))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
