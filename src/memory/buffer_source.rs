/// Buffer Sources
///
/// Deferred producers of buffer data. A source is resolved during the commit's
/// resolve phase, possibly after the sources it depends on, and then copied
/// into its destination range.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use super::buffer_spec::{BufferSpec, TupleType};
use super::buffer_value::BufferValue;

/// Shared handle to a buffer source
pub type SourceHandle = Arc<dyn BufferSource>;

pub trait BufferSource: Send + Sync {
    /// Name of the buffer this source writes
    fn name(&self) -> &str;

    /// Try to produce the payload. Returns true once the source is resolved;
    /// false when an input it depends on is not ready yet.
    fn resolve(&self) -> bool;

    fn is_resolved(&self) -> bool;

    /// Resolved payload, `None` until resolution
    fn data(&self) -> Option<&BufferValue>;

    fn tuple_type(&self) -> TupleType;

    /// Number of elements produced; zero before resolution
    fn num_elements(&self) -> usize;

    /// Sources with an empty layout are rejected on enqueue
    fn is_valid(&self) -> bool {
        self.tuple_type().count > 0
    }

    /// Sources copied into the same range right after this one
    fn chained_buffers(&self) -> Vec<SourceHandle> {
        Vec::new()
    }

    /// Source that must be resolved before this one, enqueued unbound
    fn pre_chained_buffer(&self) -> Option<SourceHandle> {
        None
    }

    fn buffer_specs(&self) -> Vec<BufferSpec> {
        vec![BufferSpec::new(self.name(), self.tuple_type())]
    }
}

impl fmt::Debug for dyn BufferSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSource")
            .field("name", &self.name())
            .field("tuple_type", &self.tuple_type())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Source wrapping an already computed value
///
/// The value is available immediately but the source only counts as resolved
/// once the commit has visited it.
pub struct ValueBufferSource {
    name: String,
    value: BufferValue,
    resolved: AtomicBool,
    chained: Vec<SourceHandle>,
    pre_chained: Option<SourceHandle>,
}

impl ValueBufferSource {
    pub fn new(name: impl Into<String>, value: BufferValue) -> Self {
        Self {
            name: name.into(),
            value,
            resolved: AtomicBool::new(false),
            chained: Vec::new(),
            pre_chained: None,
        }
    }

    pub fn with_chained(mut self, chained: Vec<SourceHandle>) -> Self {
        self.chained = chained;
        self
    }

    pub fn with_pre_chained(mut self, source: SourceHandle) -> Self {
        self.pre_chained = Some(source);
        self
    }

    pub fn into_handle(self) -> SourceHandle {
        Arc::new(self)
    }
}

impl BufferSource for ValueBufferSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self) -> bool {
        self.resolved.store(true, Ordering::Release);
        true
    }

    fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    fn data(&self) -> Option<&BufferValue> {
        Some(&self.value)
    }

    fn tuple_type(&self) -> TupleType {
        self.value.tuple_type()
    }

    fn num_elements(&self) -> usize {
        self.value.num_elements()
    }

    fn chained_buffers(&self) -> Vec<SourceHandle> {
        self.chained.clone()
    }

    fn pre_chained_buffer(&self) -> Option<SourceHandle> {
        self.pre_chained.clone()
    }
}

type DeriveFn = dyn Fn(&[&BufferValue]) -> BufferValue + Send + Sync;

/// Source computed on the CPU from other sources
///
/// Resolution is deferred until every input is resolved, so a chain of
/// derived sources resolves over several passes regardless of the order it
/// was enqueued in.
pub struct DerivedBufferSource {
    name: String,
    tuple_type: TupleType,
    inputs: Vec<SourceHandle>,
    derive: Box<DeriveFn>,
    result: OnceLock<BufferValue>,
}

impl DerivedBufferSource {
    pub fn new<F>(name: impl Into<String>, tuple_type: TupleType, inputs: Vec<SourceHandle>, derive: F) -> Self
    where
        F: Fn(&[&BufferValue]) -> BufferValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            tuple_type,
            inputs,
            derive: Box::new(derive),
            result: OnceLock::new(),
        }
    }

    pub fn into_handle(self) -> SourceHandle {
        Arc::new(self)
    }
}

impl BufferSource for DerivedBufferSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self) -> bool {
        if self.result.get().is_some() {
            return true;
        }

        let mut values = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            match input.data() {
                Some(value) if input.is_resolved() => values.push(value),
                _ => return false,
            }
        }

        let value = (self.derive)(&values);
        log::trace!("[DerivedBufferSource] Resolved '{}' ({} elements)", self.name, value.num_elements());
        let _ = self.result.set(value);
        true
    }

    fn is_resolved(&self) -> bool {
        self.result.get().is_some()
    }

    fn data(&self) -> Option<&BufferValue> {
        self.result.get()
    }

    fn tuple_type(&self) -> TupleType {
        self.tuple_type
    }

    fn num_elements(&self) -> usize {
        self.result.get().map_or(0, BufferValue::num_elements)
    }
}
