// Integration tests for the commit phases: source resolution order,
// computation sizing and ordering, range migration and chained sources.

use std::sync::Arc;

use parking_lot::Mutex;

use earth_buffers::registry::{Computation, ComputeQueue};
use earth_buffers::{
    BufferArrayUsageHint, BufferCategory, BufferSource, BufferSpec, BufferValue, DerivedBufferSource,
    RangeHandle, RegistryConfig, ResourceRegistry, SourceHandle, TupleType, ValueBufferSource,
    ValueType,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn float() -> TupleType {
    TupleType::single(ValueType::Float32)
}

fn vec3() -> TupleType {
    TupleType::single(ValueType::Float32Vec3)
}

fn floats(name: &str, data: &[f32]) -> SourceHandle {
    ValueBufferSource::new(name, BufferValue::from_pod(float(), data)).into_handle()
}

fn vec3s(name: &str, data: &[f32]) -> SourceHandle {
    ValueBufferSource::new(name, BufferValue::from_pod(vec3(), data)).into_handle()
}

fn map_source(name: &str, input: &SourceHandle, f: fn(f32) -> f32) -> SourceHandle {
    DerivedBufferSource::new(name, float(), vec![input.clone()], move |inputs| {
        let data: Vec<f32> = inputs[0].to_vec::<f32>().into_iter().map(f).collect();
        BufferValue::from_pod(float(), &data)
    })
    .into_handle()
}

fn allocate(registry: &ResourceRegistry, specs: &[BufferSpec]) -> RangeHandle {
    registry
        .allocate_non_uniform_range("primvar", specs, BufferArrayUsageHint::default())
        .expect("allocate")
}

#[test]
fn test_dependency_chain_resolves_out_of_order() {
    init_logging();
    let mut registry = ResourceRegistry::new(RegistryConfig::default());

    let a = floats("a", &[1.0, 2.0, 3.0]);
    let b = map_source("b", &a, |v| v * 2.0);
    let c = map_source("c", &b, |v| v + 1.0);

    let range_a = allocate(&registry, &[BufferSpec::new("a", float())]);
    let range_b = allocate(&registry, &[BufferSpec::new("b", float())]);
    let range_c = allocate(&registry, &[BufferSpec::new("c", float())]);

    registry.add_source(&range_c, c).expect("enqueue c");
    registry.add_source(&range_a, a).expect("enqueue a");
    registry.add_source(&range_b, b).expect("enqueue b");
    assert_eq!(registry.num_pending_sources(), 3);

    let stats = registry.commit();
    assert_eq!(stats.sources_resolved, 3);
    assert_eq!(stats.unresolved_sources, 0);
    assert_eq!(stats.resolve_iterations, 2);

    assert_eq!(range_a.read_data("a").to_vec::<f32>(), vec![1.0, 2.0, 3.0]);
    assert_eq!(range_b.read_data("b").to_vec::<f32>(), vec![2.0, 4.0, 6.0]);
    assert_eq!(range_c.read_data("c").to_vec::<f32>(), vec![3.0, 5.0, 7.0]);
}

#[test]
fn test_dependency_chain_into_one_range() {
    init_logging();
    let mut registry = ResourceRegistry::new(RegistryConfig::default());

    let a = floats("a", &[1.0, 2.0, 3.0]);
    let b = map_source("b", &a, |v| v * 2.0);
    let c = map_source("c", &b, |v| v + 1.0);

    let range = allocate(
        &registry,
        &[
            BufferSpec::new("a", float()),
            BufferSpec::new("b", float()),
            BufferSpec::new("c", float()),
        ],
    );

    // c leads the group but resolves last, so the range is sized on the second pass
    registry.add_sources(&range, vec![c.clone(), a, b]).expect("enqueue");
    let stats = registry.commit();

    assert_eq!(stats.sources_resolved, 3);
    assert_eq!(stats.unresolved_sources, 0);
    assert_eq!(stats.resolve_iterations, 2);
    assert_eq!(stats.ranges_copied, 3);
    assert!(c.is_resolved());

    assert_eq!(range.num_elements(), 3);
    assert_eq!(range.capacity(), 3);
    assert_eq!(range.read_data("a").to_vec::<f32>(), vec![1.0, 2.0, 3.0]);
    assert_eq!(range.read_data("b").to_vec::<f32>(), vec![2.0, 4.0, 6.0]);
    assert_eq!(range.read_data("c").to_vec::<f32>(), vec![3.0, 5.0, 7.0]);
}

#[test]
fn test_stalled_resolve_gives_up() {
    init_logging();
    let config = RegistryConfig {
        max_resolve_iterations: 3,
        ..RegistryConfig::default()
    };
    let mut registry = ResourceRegistry::new(config);

    // the input is never enqueued, so it never resolves
    let orphan = floats("orphan", &[1.0]);
    let derived = map_source("derived", &orphan, |v| v);
    let range = allocate(&registry, &[BufferSpec::new("derived", float())]);
    registry.add_source(&range, derived).expect("enqueue");

    let stats = registry.commit();
    assert_eq!(stats.resolve_iterations, 3);
    assert_eq!(stats.unresolved_sources, 1);
    assert_eq!(stats.ranges_copied, 0);
    assert_eq!(range.num_elements(), 0);
    assert_eq!(registry.num_pending_sources(), 0);
}

/// Records its id when executed
struct Recorder {
    id: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl Computation for Recorder {
    fn execute(&self, _range: Option<&RangeHandle>, _registry: &ResourceRegistry) {
        self.log.lock().push(self.id);
    }

    fn num_output_elements(&self) -> usize {
        0
    }

    fn buffer_specs(&self) -> Vec<BufferSpec> {
        Vec::new()
    }
}

#[test]
fn test_computations_run_in_registration_order() {
    init_logging();
    let mut registry = ResourceRegistry::new(RegistryConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));

    let queued = [
        (ComputeQueue::One, 10),
        (ComputeQueue::Zero, 0),
        (ComputeQueue::Two, 20),
        (ComputeQueue::Zero, 1),
        (ComputeQueue::One, 11),
        (ComputeQueue::Zero, 2),
    ];
    for (queue, id) in queued {
        let recorder = Arc::new(Recorder {
            id,
            log: log.clone(),
        });
        registry.add_computation(None, recorder, queue).expect("enqueue");
    }

    let stats = registry.commit();
    assert_eq!(stats.computations_executed, 6);
    assert_eq!(*log.lock(), vec![0, 1, 2, 10, 11, 20]);

    // consumed work is gone
    assert_eq!(registry.commit().computations_executed, 0);
}

/// Writes a ramp of `count` floats into its range
struct Ramp {
    count: usize,
}

impl Computation for Ramp {
    fn execute(&self, range: Option<&RangeHandle>, _registry: &ResourceRegistry) {
        let Some(range) = range else {
            return;
        };
        let data: Vec<f32> = (0..self.count).map(|v| v as f32).collect();
        let source = ValueBufferSource::new("weights", BufferValue::from_pod(float(), &data));
        source.resolve();
        range.copy_data(&source);
    }

    fn num_output_elements(&self) -> usize {
        self.count
    }

    fn buffer_specs(&self) -> Vec<BufferSpec> {
        vec![BufferSpec::new("weights", float())]
    }
}

#[test]
fn test_computation_grows_range() {
    init_logging();
    let mut registry = ResourceRegistry::new(RegistryConfig::default());
    let range = allocate(&registry, &[BufferSpec::new("weights", float())]);

    registry
        .add_computation(Some(&range), Arc::new(Ramp { count: 8 }), ComputeQueue::Zero)
        .expect("enqueue");
    registry.commit();

    assert_eq!(range.num_elements(), 8);
    assert_eq!(range.capacity(), 8);
    assert_eq!(
        range.read_data("weights").to_vec::<f32>(),
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]
    );

    // a smaller output leaves the range alone
    registry
        .add_computation(Some(&range), Arc::new(Ramp { count: 2 }), ComputeQueue::Zero)
        .expect("enqueue");
    registry.commit();
    assert_eq!(range.num_elements(), 8);
}

#[test]
fn test_invalid_computation_range_rejected() {
    init_logging();
    let registry = ResourceRegistry::new(RegistryConfig::default());
    let detached: RangeHandle = Arc::new(earth_buffers::BufferArrayRange::new());
    let result = registry.add_computation(Some(&detached), Arc::new(Ramp { count: 1 }), ComputeQueue::Zero);
    assert!(result.is_err());
}

#[test]
fn test_update_range_migrates_data() {
    init_logging();
    let mut registry = ResourceRegistry::new(RegistryConfig::default());
    let hint = BufferArrayUsageHint::default();
    let specs = vec![BufferSpec::new("points", vec3()), BufferSpec::new("normals", vec3())];

    let range = allocate(&registry, &specs);
    let points = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
    let normals = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0];
    registry
        .add_sources(&range, vec![vec3s("points", &points), vec3s("normals", &normals)])
        .expect("enqueue");
    registry.commit();
    let version = range.version();

    let colors = [BufferSpec::new("colors", vec3())];
    let migrated = registry
        .update_range(BufferCategory::NonUniform, "primvar", Some(&range), &colors, &[], hint)
        .expect("migrate");
    assert!(!Arc::ptr_eq(&migrated, &range));
    assert!(range.version() > version);
    assert_eq!(migrated.buffer_specs().len(), 3);
    assert_eq!(registry.perf_counters().snapshot().ranges_migrated, 1);

    let color_data = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    registry.add_source(&migrated, vec3s("colors", &color_data)).expect("enqueue");
    let stats = registry.commit();
    assert_eq!(stats.computations_executed, 2);

    assert_eq!(migrated.num_elements(), 2);
    assert_eq!(migrated.read_data("points").to_vec::<f32>(), points.to_vec());
    assert_eq!(migrated.read_data("normals").to_vec::<f32>(), normals.to_vec());
    assert_eq!(migrated.read_data("colors").to_vec::<f32>(), color_data.to_vec());
    assert_eq!(registry.perf_counters().snapshot().copy_buffer_gpu_to_gpu, 2);

    // removing a buffer always migrates
    let removed = [BufferSpec::new("normals", vec3())];
    let trimmed = registry
        .update_range(BufferCategory::NonUniform, "primvar", Some(&migrated), &[], &removed, hint)
        .expect("migrate");
    registry.commit();
    let names: Vec<String> = trimmed.buffer_specs().into_iter().map(|spec| spec.name).collect();
    assert!(names.contains(&"points".to_string()));
    assert!(names.contains(&"colors".to_string()));
    assert!(!names.contains(&"normals".to_string()));
    assert_eq!(trimmed.read_data("points").to_vec::<f32>(), points.to_vec());
}

#[test]
fn test_immutable_range_migrates_on_update() {
    init_logging();
    let registry = ResourceRegistry::new(RegistryConfig::default());
    let hint = BufferArrayUsageHint::default();
    let specs = vec![BufferSpec::new("points", vec3())];

    let range = registry
        .allocate_non_uniform_immutable_range("primvar", &specs, hint)
        .expect("allocate");
    let updated = registry
        .update_range(BufferCategory::NonUniformImmutable, "primvar", Some(&range), &specs, &[], hint)
        .expect("migrate");
    assert!(!Arc::ptr_eq(&updated, &range));
    assert!(updated.is_immutable());

    // no updates: nothing to migrate
    let same = registry
        .update_range(BufferCategory::NonUniformImmutable, "primvar", Some(&range), &[], &[], hint)
        .expect("reuse");
    assert!(Arc::ptr_eq(&same, &range));
}

#[test]
fn test_chained_and_pre_chained_sources() {
    init_logging();
    let mut registry = ResourceRegistry::new(RegistryConfig::default());
    let specs = vec![BufferSpec::new("points", vec3()), BufferSpec::new("normals", vec3())];
    let range = allocate(&registry, &specs);

    let scratch = floats("scratch", &[9.0]);
    let normals = vec3s("normals", &[0.0, 1.0, 0.0]);
    let points = ValueBufferSource::new("points", BufferValue::from_pod(vec3(), &[1.0f32, 2.0, 3.0]))
        .with_chained(vec![normals])
        .with_pre_chained(scratch.clone())
        .into_handle();

    registry.add_sources(&range, vec![points]).expect("enqueue");
    // the pre-chained buffer is queued unbound alongside
    assert_eq!(registry.num_pending_sources(), 2);

    let stats = registry.commit();
    assert!(scratch.is_resolved());
    assert_eq!(stats.sources_resolved, 2);
    assert_eq!(stats.ranges_copied, 2);
    assert_eq!(range.read_data("points").to_vec::<f32>(), vec![1.0, 2.0, 3.0]);
    assert_eq!(range.read_data("normals").to_vec::<f32>(), vec![0.0, 1.0, 0.0]);
}

/// Queues a source for the next frame when executed
struct Requeue {
    range: RangeHandle,
}

impl Computation for Requeue {
    fn execute(&self, _range: Option<&RangeHandle>, registry: &ResourceRegistry) {
        registry
            .add_source(&self.range, floats("late", &[4.0, 5.0]))
            .expect("enqueue from computation");
    }

    fn num_output_elements(&self) -> usize {
        0
    }

    fn buffer_specs(&self) -> Vec<BufferSpec> {
        Vec::new()
    }
}

#[test]
fn test_work_queued_during_execute_waits_for_next_commit() {
    init_logging();
    let mut registry = ResourceRegistry::new(RegistryConfig::default());
    let range = allocate(&registry, &[BufferSpec::new("late", float())]);

    registry
        .add_computation(None, Arc::new(Requeue { range: range.clone() }), ComputeQueue::Zero)
        .expect("enqueue");
    registry.commit();
    assert_eq!(registry.num_pending_sources(), 1);
    assert_eq!(range.num_elements(), 0);

    let stats = registry.commit();
    assert_eq!(stats.ranges_copied, 1);
    assert_eq!(range.read_data("late").to_vec::<f32>(), vec![4.0, 5.0]);
}
