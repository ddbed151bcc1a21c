/// Resource Registry
///
/// Front door of the aggregation layer. Clients allocate ranges per storage
/// category, enqueue sources and computations against them from any thread,
/// and once per frame call [`ResourceRegistry::commit`], which runs the
/// phases below strictly in order:
///
/// 1. Resolve: resolve queued sources until all are done (capped), resizing
///    each destination range from its first source
/// 2. Computation sizing: grow destination ranges to the computation output
/// 3. Reallocate: every category registry reallocates its dirty arrays
/// 4. Copy: resolved sources (and their chained buffers) land in their ranges
/// 5. Execute: computations run queue by queue in registration order
/// 6. Clear: the consumed work is dropped

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::RegistryConfig;
use crate::error::{EngineError, EngineResult};
use crate::memory::error::{coding_error, invalid_range_error, invalid_source_error};
use crate::memory::{
    AggregationStrategy, BufferArrayRange, BufferArrayUsageHint, BufferResource, BufferSpec,
    DeviceBuffer, InterleavedAggregationStrategy, RangeHandle, SimpleAggregationStrategy,
    SourceHandle, StripedAggregationStrategy, TupleType,
};

use super::allocation_report::{keys, AllocationReport};
use super::buffer_array_registry::BufferArrayRegistry;
use super::computation::{ComputationHandle, ComputeQueue, CopyComputation};
use super::instance_registry::{Instance, InstanceRegistry};

/// Storage category a range is allocated from. Each category owns one
/// buffer array registry and one aggregation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferCategory {
    /// Vertex and varying data
    NonUniform,
    /// Vertex data that is never updated in place
    NonUniformImmutable,
    /// Constant data in uniform blocks
    Uniform,
    /// Constant data in shader storage blocks
    ShaderStorage,
    /// One range per array
    Single,
}

impl BufferCategory {
    pub const COUNT: usize = 5;

    pub const ALL: [BufferCategory; Self::COUNT] = [
        BufferCategory::NonUniform,
        BufferCategory::NonUniformImmutable,
        BufferCategory::Uniform,
        BufferCategory::ShaderStorage,
        BufferCategory::Single,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferCategory::NonUniform => "non_uniform",
            BufferCategory::NonUniformImmutable => "non_uniform_immutable",
            BufferCategory::Uniform => "uniform",
            BufferCategory::ShaderStorage => "shader_storage",
            BufferCategory::Single => "single",
        }
    }

    /// Allocation report key the category's bytes are tallied under
    pub fn report_key(self) -> &'static str {
        match self {
            BufferCategory::NonUniform | BufferCategory::NonUniformImmutable => keys::NON_UNIFORM_SIZE,
            BufferCategory::Uniform => keys::UBO_SIZE,
            BufferCategory::ShaderStorage => keys::SSBO_SIZE,
            BufferCategory::Single => keys::SINGLE_BUFFER_SIZE,
        }
    }

    /// Hint actually used for allocation in this category
    pub fn usage_hint(self, mut hint: BufferArrayUsageHint) -> BufferArrayUsageHint {
        if self == BufferCategory::NonUniformImmutable {
            hint.immutable = true;
        }
        hint
    }
}

impl fmt::Display for BufferCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregation strategy per storage category
#[derive(Clone)]
pub struct StrategySet {
    pub non_uniform: Arc<dyn AggregationStrategy>,
    pub non_uniform_immutable: Arc<dyn AggregationStrategy>,
    pub uniform: Arc<dyn AggregationStrategy>,
    pub shader_storage: Arc<dyn AggregationStrategy>,
    pub single: Arc<dyn AggregationStrategy>,
}

impl StrategySet {
    /// Striped vertex storage, interleaved UBO/SSBO blocks and single buffers
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            non_uniform: Arc::new(StripedAggregationStrategy::from_config(config)),
            non_uniform_immutable: Arc::new(StripedAggregationStrategy::from_config(config)),
            uniform: Arc::new(InterleavedAggregationStrategy::uniform(config)),
            shader_storage: Arc::new(InterleavedAggregationStrategy::shader_storage(config)),
            single: Arc::new(SimpleAggregationStrategy::from_config(config)),
        }
    }

    pub fn get(&self, category: BufferCategory) -> &Arc<dyn AggregationStrategy> {
        match category {
            BufferCategory::NonUniform => &self.non_uniform,
            BufferCategory::NonUniformImmutable => &self.non_uniform_immutable,
            BufferCategory::Uniform => &self.uniform,
            BufferCategory::ShaderStorage => &self.shader_storage,
            BufferCategory::Single => &self.single,
        }
    }
}

struct StorageCategory {
    strategy: Arc<dyn AggregationStrategy>,
    registry: BufferArrayRegistry,
}

/// Sources waiting for a commit; `range` is `None` for unbound CPU work
struct PendingSource {
    range: Option<RangeHandle>,
    sources: Vec<SourceHandle>,
}

struct PendingComputation {
    range: Option<RangeHandle>,
    computation: ComputationHandle,
}

/// Running totals across commits
#[derive(Debug, Default)]
pub struct PerfCounters {
    pub buffer_sources_resolved: AtomicUsize,
    pub computations_committed: AtomicUsize,
    pub arrays_reallocated: AtomicUsize,
    pub ranges_migrated: AtomicUsize,
    pub arrays_garbage_collected: AtomicUsize,
    pub copy_buffer_cpu_to_gpu: AtomicUsize,
    pub copy_buffer_gpu_to_gpu: AtomicUsize,
}

/// Point-in-time copy of [`PerfCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PerfSnapshot {
    pub buffer_sources_resolved: usize,
    pub computations_committed: usize,
    pub arrays_reallocated: usize,
    pub ranges_migrated: usize,
    pub arrays_garbage_collected: usize,
    pub copy_buffer_cpu_to_gpu: usize,
    pub copy_buffer_gpu_to_gpu: usize,
}

impl PerfCounters {
    pub fn snapshot(&self) -> PerfSnapshot {
        PerfSnapshot {
            buffer_sources_resolved: self.buffer_sources_resolved.load(Ordering::Relaxed),
            computations_committed: self.computations_committed.load(Ordering::Relaxed),
            arrays_reallocated: self.arrays_reallocated.load(Ordering::Relaxed),
            ranges_migrated: self.ranges_migrated.load(Ordering::Relaxed),
            arrays_garbage_collected: self.arrays_garbage_collected.load(Ordering::Relaxed),
            copy_buffer_cpu_to_gpu: self.copy_buffer_cpu_to_gpu.load(Ordering::Relaxed),
            copy_buffer_gpu_to_gpu: self.copy_buffer_gpu_to_gpu.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.buffer_sources_resolved,
            &self.computations_committed,
            &self.arrays_reallocated,
            &self.ranges_migrated,
            &self.arrays_garbage_collected,
            &self.copy_buffer_cpu_to_gpu,
            &self.copy_buffer_gpu_to_gpu,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// What a single commit did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitStats {
    pub sources_resolved: usize,
    pub unresolved_sources: usize,
    pub resolve_iterations: usize,
    pub computations_executed: usize,
    pub arrays_reallocated: usize,
    pub ranges_copied: usize,
}

pub struct ResourceRegistry {
    config: RegistryConfig,
    categories: Vec<StorageCategory>,

    pending_sources: Mutex<Vec<PendingSource>>,
    num_sources_to_resolve: AtomicUsize,
    pending_computations: [Mutex<Vec<PendingComputation>>; ComputeQueue::COUNT],

    buffer_resources: Mutex<Vec<Arc<BufferResource>>>,
    primvar_ranges: InstanceRegistry<BufferArrayRange>,
    topology_index_ranges: DashMap<String, Arc<InstanceRegistry<BufferArrayRange>>>,
    ext_computation_data_ranges: InstanceRegistry<BufferArrayRange>,

    perf: PerfCounters,
}

impl ResourceRegistry {
    /// Registry with the default strategy for every category
    pub fn new(config: RegistryConfig) -> Self {
        let strategies = StrategySet::from_config(&config);
        Self::with_strategies(config, strategies)
    }

    pub fn with_strategies(config: RegistryConfig, strategies: StrategySet) -> Self {
        let categories = BufferCategory::ALL
            .iter()
            .map(|&category| StorageCategory {
                strategy: strategies.get(category).clone(),
                registry: BufferArrayRegistry::new(),
            })
            .collect();

        log::info!(
            "[ResourceRegistry] Created (instancing {})",
            if config.enable_resource_instancing { "on" } else { "off" }
        );

        Self {
            config,
            categories,
            pending_sources: Mutex::new(Vec::new()),
            num_sources_to_resolve: AtomicUsize::new(0),
            pending_computations: Default::default(),
            buffer_resources: Mutex::new(Vec::new()),
            primvar_ranges: InstanceRegistry::new(),
            topology_index_ranges: DashMap::new(),
            ext_computation_data_ranges: InstanceRegistry::new(),
            perf: PerfCounters::default(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn perf_counters(&self) -> &PerfCounters {
        &self.perf
    }

    pub fn strategy(&self, category: BufferCategory) -> &dyn AggregationStrategy {
        self.categories[category.index()].strategy.as_ref()
    }

    pub fn buffer_array_registry(&self, category: BufferCategory) -> &BufferArrayRegistry {
        &self.categories[category.index()].registry
    }

    /// Sources enqueued since the last commit
    pub fn num_pending_sources(&self) -> usize {
        self.num_sources_to_resolve.load(Ordering::Acquire)
    }

    // ---------------------------------------------------------------------
    // Allocation

    pub fn allocate_range(
        &self,
        category: BufferCategory,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> EngineResult<RangeHandle> {
        let storage = &self.categories[category.index()];
        storage
            .registry
            .allocate_range(storage.strategy.as_ref(), role, specs, category.usage_hint(usage_hint))
    }

    pub fn allocate_non_uniform_range(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> EngineResult<RangeHandle> {
        self.allocate_range(BufferCategory::NonUniform, role, specs, usage_hint)
    }

    pub fn allocate_non_uniform_immutable_range(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> EngineResult<RangeHandle> {
        self.allocate_range(BufferCategory::NonUniformImmutable, role, specs, usage_hint)
    }

    pub fn allocate_uniform_range(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> EngineResult<RangeHandle> {
        self.allocate_range(BufferCategory::Uniform, role, specs, usage_hint)
    }

    pub fn allocate_shader_storage_range(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> EngineResult<RangeHandle> {
        self.allocate_range(BufferCategory::ShaderStorage, role, specs, usage_hint)
    }

    pub fn allocate_single_range(
        &self,
        role: &str,
        specs: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> EngineResult<RangeHandle> {
        self.allocate_range(BufferCategory::Single, role, specs, usage_hint)
    }

    /// Return a range holding `updated_or_added` plus the current buffers
    /// minus `removed`. The current range is reused when it already fits;
    /// otherwise a new range is allocated and the buffers that are not being
    /// rewritten are copied over during the next commit.
    pub fn update_range(
        &self,
        category: BufferCategory,
        role: &str,
        cur_range: Option<&RangeHandle>,
        updated_or_added: &[BufferSpec],
        removed: &[BufferSpec],
        usage_hint: BufferArrayUsageHint,
    ) -> EngineResult<RangeHandle> {
        let cur_range = match cur_range.filter(|range| range.is_valid()) {
            Some(range) => range,
            None => {
                if !removed.is_empty() {
                    coding_error(EngineError::InvalidRange {
                        context: format!("removing {} buffers from an invalid '{}' range", removed.len(), role),
                    });
                }
                return self.allocate_range(category, role, updated_or_added, usage_hint);
            }
        };

        let usage_hint = category.usage_hint(usage_hint);
        let cur_specs = cur_range.buffer_specs();

        let needs_migration = (cur_range.is_immutable() && !updated_or_added.is_empty())
            || cur_range.usage_hint().bits() != usage_hint.bits()
            || !removed.is_empty()
            || !BufferSpec::is_subset(updated_or_added, &cur_specs);

        if !needs_migration {
            return Ok(cur_range.clone());
        }

        let new_specs = BufferSpec::compute_union(
            updated_or_added,
            &BufferSpec::compute_difference(&cur_specs, removed),
        );
        let new_range = self.allocate_range(category, role, &new_specs, usage_hint)?;

        for spec in BufferSpec::compute_difference(&new_specs, updated_or_added) {
            self.add_computation(
                Some(&new_range),
                Arc::new(CopyComputation::new(cur_range.clone(), spec.name)),
                ComputeQueue::Zero,
            )?;
        }

        // consumers holding the old range see a version change
        cur_range.increment_version();
        self.perf.ranges_migrated.fetch_add(1, Ordering::Relaxed);

        log::debug!(
            "[ResourceRegistry] Migrated '{}' range: {} -> {} buffers",
            role,
            cur_specs.len(),
            new_specs.len()
        );
        Ok(new_range)
    }

    // ---------------------------------------------------------------------
    // Enqueueing

    /// Queue `sources` for `range`. Invalid sources are dropped with an error;
    /// the rest keep their order.
    pub fn add_sources(&self, range: &RangeHandle, mut sources: Vec<SourceHandle>) -> EngineResult<()> {
        if sources.is_empty() {
            return Err(coding_error(EngineError::EmptySources {
                context: "add_sources".to_string(),
            }));
        }
        if !range.is_valid() {
            return Err(invalid_range_error(format!("add_sources ({} sources)", sources.len())));
        }

        sources.retain(|source| {
            let valid = source.is_valid();
            if !valid {
                invalid_source_error(source.name());
            }
            valid
        });
        if sources.is_empty() {
            return Ok(());
        }

        for source in &sources {
            if let Some(pre_chained) = source.pre_chained_buffer() {
                self.add_unbound_source(pre_chained)?;
            }
        }
        self.enqueue_sources(Some(range.clone()), sources);
        Ok(())
    }

    pub fn add_source(&self, range: &RangeHandle, source: SourceHandle) -> EngineResult<()> {
        if !range.is_valid() {
            return Err(invalid_range_error(format!("add_source '{}'", source.name())));
        }
        if !source.is_valid() {
            return Err(invalid_source_error(source.name()));
        }

        if let Some(pre_chained) = source.pre_chained_buffer() {
            self.add_unbound_source(pre_chained)?;
        }
        self.enqueue_sources(Some(range.clone()), vec![source]);
        Ok(())
    }

    /// Queue CPU work that is resolved but not copied anywhere
    pub fn add_unbound_source(&self, source: SourceHandle) -> EngineResult<()> {
        if !source.is_valid() {
            return Err(invalid_source_error(source.name()));
        }

        if let Some(pre_chained) = source.pre_chained_buffer() {
            self.add_unbound_source(pre_chained)?;
        }
        self.enqueue_sources(None, vec![source]);
        Ok(())
    }

    fn enqueue_sources(&self, range: Option<RangeHandle>, sources: Vec<SourceHandle>) {
        self.num_sources_to_resolve.fetch_add(sources.len(), Ordering::AcqRel);
        self.pending_sources.lock().push(PendingSource { range, sources });
    }

    /// Queue a computation writing into `range` (or nothing)
    pub fn add_computation(
        &self,
        range: Option<&RangeHandle>,
        computation: ComputationHandle,
        queue: ComputeQueue,
    ) -> EngineResult<()> {
        if let Some(range) = range {
            if !range.is_valid() {
                return Err(invalid_range_error("add_computation"));
            }
        }

        self.pending_computations[queue.index()].lock().push(PendingComputation {
            range: range.cloned(),
            computation,
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Commit

    /// Run all queued work. Work queued by computations while they execute
    /// is kept for the next commit.
    pub fn commit(&mut self) -> CommitStats {
        let mut stats = CommitStats::default();

        let sources = mem::take(self.pending_sources.get_mut());
        let queued = self.num_sources_to_resolve.swap(0, Ordering::AcqRel);
        let computations: Vec<Vec<PendingComputation>> = self
            .pending_computations
            .iter_mut()
            .map(|queue| mem::take(queue.get_mut()))
            .collect();

        log::trace!(
            "[ResourceRegistry] Commit: {} sources, {} computations",
            queued,
            computations.iter().map(Vec::len).sum::<usize>()
        );

        self.resolve_sources(&sources, &mut stats);
        Self::size_computation_ranges(&computations);

        for storage in &mut self.categories {
            stats.arrays_reallocated += storage.registry.reallocate_all(storage.strategy.as_ref());
        }
        self.perf
            .arrays_reallocated
            .fetch_add(stats.arrays_reallocated, Ordering::Relaxed);

        self.copy_sources(&sources, &mut stats);

        let registry: &ResourceRegistry = self;
        for queue in &computations {
            for pending in queue {
                if !pending.computation.is_valid() {
                    log::warn!("[ResourceRegistry] Skipping invalid computation");
                    continue;
                }
                pending.computation.execute(pending.range.as_ref(), registry);
                stats.computations_executed += 1;
            }
        }
        self.perf
            .computations_committed
            .fetch_add(stats.computations_executed, Ordering::Relaxed);

        drop(computations);
        drop(sources);

        log::debug!(
            "[ResourceRegistry] Committed {} sources, {} computations, {} arrays reallocated",
            stats.sources_resolved,
            stats.computations_executed,
            stats.arrays_reallocated
        );
        stats
    }

    fn resolve_sources(&self, pending: &[PendingSource], stats: &mut CommitStats) {
        let total: usize = pending.iter().map(|entry| entry.sources.len()).sum();
        let mut done: Vec<Vec<bool>> = pending
            .iter()
            .map(|entry| vec![false; entry.sources.len()])
            .collect();

        while stats.sources_resolved < total {
            if stats.resolve_iterations == self.config.max_resolve_iterations {
                log::warn!(
                    "[ResourceRegistry] Giving up after {} resolve passes, {} of {} sources unresolved",
                    stats.resolve_iterations,
                    total - stats.sources_resolved,
                    total
                );
                break;
            }
            stats.resolve_iterations += 1;

            for (entry, flags) in pending.iter().zip(done.iter_mut()) {
                for (index, source) in entry.sources.iter().enumerate() {
                    if flags[index] || !(source.is_resolved() || source.resolve()) {
                        continue;
                    }
                    flags[index] = true;
                    stats.sources_resolved += 1;

                    // the first source of a group sizes the range
                    if index == 0 {
                        if let Some(range) = entry.range.as_ref().filter(|range| range.is_valid()) {
                            range.resize(source.num_elements());
                        }
                    }
                }
            }
        }

        stats.unresolved_sources = total - stats.sources_resolved;
        self.perf
            .buffer_sources_resolved
            .fetch_add(stats.sources_resolved, Ordering::Relaxed);
    }

    fn size_computation_ranges(queues: &[Vec<PendingComputation>]) {
        for pending in queues.iter().flatten() {
            let Some(range) = pending.range.as_ref().filter(|range| range.is_valid()) else {
                continue;
            };
            if !pending.computation.is_valid() {
                continue;
            }
            let num_elements = pending.computation.num_output_elements();
            if num_elements > range.num_elements() {
                range.resize(num_elements);
            }
        }
    }

    fn copy_sources(&self, pending: &[PendingSource], stats: &mut CommitStats) {
        for entry in pending {
            let Some(range) = entry.range.as_ref() else {
                continue;
            };
            if !range.is_valid() || range.num_elements() == 0 {
                continue;
            }
            for source in &entry.sources {
                self.copy_source_tree(range, source, stats);
            }
        }
    }

    /// Copy `source`, then its chained buffers depth first
    fn copy_source_tree(&self, range: &RangeHandle, source: &SourceHandle, stats: &mut CommitStats) {
        if source.is_resolved() || source.resolve() {
            range.copy_data(source.as_ref());
            stats.ranges_copied += 1;
            self.perf.copy_buffer_cpu_to_gpu.fetch_add(1, Ordering::Relaxed);
        } else {
            log::warn!("[ResourceRegistry] Source '{}' unresolved, not copied", source.name());
        }

        for chained in source.chained_buffers() {
            self.copy_source_tree(range, &chained, stats);
        }
    }

    // ---------------------------------------------------------------------
    // Garbage collection and reporting

    /// Release everything only the registry still references. Returns the
    /// number of arrays evicted.
    pub fn garbage_collect(&mut self) -> usize {
        let resources = self.buffer_resources.get_mut();
        let before = resources.len();
        resources.retain(|resource| Arc::strong_count(resource) > 1);
        let resources_freed = before - resources.len();

        self.primvar_ranges.garbage_collect();
        self.ext_computation_data_ranges.garbage_collect();
        self.topology_index_ranges
            .retain(|_, registry| registry.garbage_collect() > 0);

        let mut evicted = 0;
        for storage in &mut self.categories {
            evicted += storage.registry.garbage_collect();
        }
        self.perf
            .arrays_garbage_collected
            .fetch_add(evicted, Ordering::Relaxed);

        log::debug!(
            "[ResourceRegistry] Garbage collected {} arrays, {} buffer resources",
            evicted,
            resources_freed
        );
        evicted
    }

    /// Bytes held per role and per category
    pub fn resource_allocation(&self) -> AllocationReport {
        let mut report = AllocationReport::new();
        let mut gpu_memory_used = 0;

        for (category, storage) in BufferCategory::ALL.iter().zip(&self.categories) {
            let bytes = storage
                .registry
                .resource_allocation(storage.strategy.as_ref(), &mut report);
            report.add(category.report_key(), bytes);
            gpu_memory_used += bytes;
        }

        for resource in self.buffer_resources.lock().iter() {
            let bytes = resource.size();
            report.add(resource.role(), bytes);
            gpu_memory_used += bytes;
        }

        report.set(keys::GPU_MEMORY_USED, gpu_memory_used);
        report
    }

    // ---------------------------------------------------------------------
    // Shared resources

    /// Standalone buffer sized for one `tuple_type`
    pub fn register_buffer_resource(&self, role: &str, tuple_type: TupleType) -> Arc<BufferResource> {
        let resource = Arc::new(BufferResource::new(role, tuple_type, 0, tuple_type.size_in_bytes()));
        resource.set_allocation(Some(DeviceBuffer::new(tuple_type.size_in_bytes())));
        self.buffer_resources.lock().push(resource.clone());
        resource
    }

    pub fn register_primvar_range(&self, id: u64) -> Instance<BufferArrayRange> {
        self.register_instance(&self.primvar_ranges, id)
    }

    /// Index range `name` of the topology identified by `id`
    pub fn register_topology_index_range(&self, id: u64, name: &str) -> Instance<BufferArrayRange> {
        let registry = self
            .topology_index_ranges
            .entry(name.to_string())
            .or_default()
            .clone();
        self.register_instance(&registry, id)
    }

    pub fn register_ext_computation_data_range(&self, id: u64) -> Instance<BufferArrayRange> {
        self.register_instance(&self.ext_computation_data_ranges, id)
    }

    fn register_instance(
        &self,
        registry: &InstanceRegistry<BufferArrayRange>,
        id: u64,
    ) -> Instance<BufferArrayRange> {
        if self.config.enable_resource_instancing {
            registry.register(id)
        } else {
            InstanceRegistry::detached(id)
        }
    }
}

impl fmt::Display for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ResourceRegistry")?;
        for (category, storage) in BufferCategory::ALL.iter().zip(&self.categories) {
            writeln!(f, "[{}] strategy '{}'", category, storage.strategy.name())?;
            write!(f, "{}", storage.registry)?;
        }
        writeln!(f, "buffer resources: {}", self.buffer_resources.lock().len())
    }
}
