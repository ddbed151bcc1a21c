/// Registry Configuration
///
/// Device limits and tuning knobs for the resource registry. The values stand in
/// for the driver capabilities a real backend would query at startup.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::memory::MemoryErrorContext;

/// Configuration for a [`ResourceRegistry`](crate::registry::ResourceRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Byte budget of a single striped (vertex/varying) buffer
    pub max_vbo_size: usize,

    /// Stride alignment required between uniform block elements
    pub uniform_buffer_offset_alignment: usize,

    /// Struct alignment of uniform block elements
    pub uniform_struct_alignment: usize,

    /// Maximum size of a uniform block (bytes)
    pub max_uniform_block_size: usize,

    /// Maximum size of a shader storage block (bytes)
    pub max_shader_storage_block_size: usize,

    /// De-duplicate shared ranges through the instance registries
    pub enable_resource_instancing: bool,

    /// Resolve passes before a commit gives up on unresolved sources
    pub max_resolve_iterations: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_vbo_size: 1024 * 1024 * 1024, // 1GB
            uniform_buffer_offset_alignment: 256,
            uniform_struct_alignment: 16, // vec4
            max_uniform_block_size: 64 * 1024,
            max_shader_storage_block_size: 128 * 1024 * 1024,
            enable_resource_instancing: true,
            max_resolve_iterations: 100,
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let config: RegistryConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .memory_context(&format!("reading {}", path.display()))?;
        let config = Self::from_toml_str(&raw)?;
        log::info!("[RegistryConfig] Loaded {}", path.display());
        Ok(config)
    }

    /// Check sizes are non-zero and alignments are powers of two
    pub fn validate(&self) -> EngineResult<()> {
        let sizes = [
            ("max_vbo_size", self.max_vbo_size),
            ("max_uniform_block_size", self.max_uniform_block_size),
            ("max_shader_storage_block_size", self.max_shader_storage_block_size),
            ("max_resolve_iterations", self.max_resolve_iterations),
        ];
        for (key, value) in sizes {
            if value == 0 {
                return Err(EngineError::Config {
                    message: format!("{} must be greater than zero", key),
                });
            }
        }

        let alignments = [
            ("uniform_buffer_offset_alignment", self.uniform_buffer_offset_alignment),
            ("uniform_struct_alignment", self.uniform_struct_alignment),
        ];
        for (key, value) in alignments {
            // zero disables the alignment
            if value != 0 && !value.is_power_of_two() {
                return Err(EngineError::Config {
                    message: format!("{} must be a power of two, got {}", key, value),
                });
            }
        }

        Ok(())
    }
}
