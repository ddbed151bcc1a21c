/// Single (non-aggregated) storage: every range gets its own array whose
/// buffers are sized exactly to it.
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::memory::buffer_array::BufferArray;
use crate::memory::buffer_spec::{BufferArrayUsageHint, BufferSpec};

use super::striped::StripedBufferArray;
use super::AggregationStrategy;

#[derive(Debug, Clone)]
pub struct SimpleAggregationStrategy {
    max_buffer_size: usize,
}

impl SimpleAggregationStrategy {
    pub fn new(max_buffer_size: usize) -> Self {
        Self { max_buffer_size }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.max_vbo_size)
    }
}

impl AggregationStrategy for SimpleAggregationStrategy {
    fn name(&self) -> &'static str {
        "single"
    }

    fn create_buffer_array(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> Arc<dyn BufferArray> {
        StripedBufferArray::new(role, specs, usage_hint, self.max_buffer_size, 1, "single")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BufferValue, TupleType, ValueBufferSource, ValueType};

    #[test]
    fn test_one_range_per_array() {
        let strategy = SimpleAggregationStrategy::from_config(&RegistryConfig::default());
        let specs = vec![BufferSpec::new("indices", TupleType::single(ValueType::Int32Vec3))];
        let array = strategy.create_buffer_array("topology", &specs, BufferArrayUsageHint::default());

        let first = strategy.create_buffer_array_range();
        let second = strategy.create_buffer_array_range();
        assert!(array.try_assign_range(&first));
        assert!(!array.try_assign_range(&second));
        assert_eq!(array.range_count(), 1);
        assert!(!second.is_valid());
    }

    #[test]
    fn test_storage_sized_to_range() {
        let strategy = SimpleAggregationStrategy::new(1 << 20);
        let specs = vec![BufferSpec::new("indices", TupleType::single(ValueType::Int32Vec3))];
        let array = strategy.create_buffer_array("topology", &specs, BufferArrayUsageHint::default());

        let range = strategy.create_buffer_array_range();
        assert!(array.try_assign_range(&range));
        range.resize(2);
        array.reallocate(&[range.clone()], &array);

        let indices = [0i32, 1, 2, 2, 1, 3];
        range.copy_data(&ValueBufferSource::new(
            "indices",
            BufferValue::from_pod(TupleType::single(ValueType::Int32Vec3), &indices),
        ));

        assert_eq!(array.resource("indices").map(|r| r.size()), Some(24));
        assert_eq!(range.read_data("indices").to_vec::<i32>(), indices.to_vec());
    }
}
