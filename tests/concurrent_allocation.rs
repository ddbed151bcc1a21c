// Concurrency tests: many threads allocating from the same buckets and
// enqueueing sources before a single commit.

use std::sync::{Arc, Barrier};
use std::thread;

use rayon::prelude::*;

use earth_buffers::memory::{InterleavedAggregationStrategy, InterleavedBlock};
use earth_buffers::registry::StrategySet;
use earth_buffers::{
    BufferArrayUsageHint, BufferCategory, BufferSpec, BufferValue, RangeHandle, RegistryConfig,
    ResourceRegistry, TupleType, ValueBufferSource, ValueType,
};

const THREADS: usize = 8;
const RANGES_PER_THREAD: usize = 50;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_concurrent_assignment_respects_capacity() {
    init_logging();
    let config = RegistryConfig::default();
    let mut strategies = StrategySet::from_config(&config);
    // eight vec4 structs per array
    strategies.shader_storage = Arc::new(InterleavedAggregationStrategy::new(
        InterleavedBlock::ShaderStorage,
        0,
        0,
        8 * 16,
    ));
    let mut registry = ResourceRegistry::with_strategies(config, strategies);
    let specs = vec![BufferSpec::new("color", TupleType::single(ValueType::Float32Vec4))];

    let barrier = Barrier::new(THREADS);
    let ranges: Vec<RangeHandle> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    (0..RANGES_PER_THREAD)
                        .map(|_| {
                            registry
                                .allocate_shader_storage_range("constant", &specs, BufferArrayUsageHint::default())
                                .expect("allocate")
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("allocation thread"))
            .collect()
    });

    assert_eq!(ranges.len(), THREADS * RANGES_PER_THREAD);
    assert!(ranges.iter().all(|range| range.is_valid()));

    let arrays = registry.buffer_array_registry(BufferCategory::ShaderStorage).arrays();
    assert_eq!(registry.buffer_array_registry(BufferCategory::ShaderStorage).bucket_count(), 1);
    let assigned: usize = arrays.iter().map(|array| array.range_count()).sum();
    assert_eq!(assigned, THREADS * RANGES_PER_THREAD);
    for array in &arrays {
        assert!(array.range_count() <= array.max_num_ranges());
        assert_eq!(array.max_num_ranges(), 8);
    }

    registry.commit();
    let mut slots: Vec<(usize, usize)> = ranges
        .iter()
        .map(|range| (range.aggregation().expect("assigned"), range.element_offset().expect("placed")))
        .collect();
    slots.sort_unstable();
    slots.dedup();
    assert_eq!(slots.len(), ranges.len(), "two ranges share a struct slot");
}

#[test]
fn test_parallel_enqueue_then_commit() {
    init_logging();
    let config = RegistryConfig {
        max_vbo_size: 64 * 12,
        ..RegistryConfig::default()
    };
    let mut registry = ResourceRegistry::new(config);
    let specs = vec![BufferSpec::new("points", TupleType::single(ValueType::Float32Vec3))];

    let ranges: Vec<(usize, RangeHandle)> = (0..256)
        .into_par_iter()
        .map(|i| {
            let range = registry
                .allocate_non_uniform_range("primvar", &specs, BufferArrayUsageHint::default())
                .expect("allocate");
            let data: Vec<f32> = (0..9).map(|v| (i * 9 + v) as f32).collect();
            let source = ValueBufferSource::new(
                "points",
                BufferValue::from_pod(TupleType::single(ValueType::Float32Vec3), &data),
            );
            registry.add_source(&range, source.into_handle()).expect("enqueue");
            (i, range)
        })
        .collect();

    assert_eq!(registry.num_pending_sources(), 256);
    let stats = registry.commit();
    assert_eq!(stats.sources_resolved, 256);
    assert_eq!(stats.ranges_copied, 256);

    // 64 elements per array, three per range
    let arrays = registry.buffer_array_registry(BufferCategory::NonUniform).arrays();
    assert!(arrays.len() >= 256 * 3 / 64);
    for array in &arrays {
        let elements: usize = array.core().live_ranges().iter().map(|r| r.num_elements()).sum();
        assert!(elements <= array.max_num_elements());
    }

    for (i, range) in &ranges {
        let expected: Vec<f32> = (0..9).map(|v| (i * 9 + v) as f32).collect();
        assert_eq!(range.read_data("points").to_vec::<f32>(), expected);
    }
}

#[test]
fn test_second_allocation_does_not_wait_on_first() {
    init_logging();
    let registry = ResourceRegistry::new(RegistryConfig::default());
    let specs = vec![BufferSpec::new("points", TupleType::single(ValueType::Float32Vec3))];

    let first = registry
        .allocate_non_uniform_range("primvar", &specs, BufferArrayUsageHint::default())
        .expect("allocate");

    // the bucket exists; a second thread only assigns into the tail
    let second = thread::scope(|scope| {
        scope
            .spawn(|| {
                registry
                    .allocate_non_uniform_range("primvar", &specs, BufferArrayUsageHint::default())
                    .expect("allocate")
            })
            .join()
            .expect("allocation thread")
    });

    assert!(first.is_aggregated_with(&second));
}
