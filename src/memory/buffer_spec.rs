/// Buffer Schema Descriptors
///
/// A [`BufferSpec`] names one attribute stored in a buffer array together with
/// its value layout. Spec vectors are compared as sets when deciding whether a
/// range can keep its current aggregation or has to migrate to a wider one.

use std::fmt;

use rustc_hash::FxHashSet;

/// Component layout of a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Int32,
    Int32Vec2,
    Int32Vec3,
    Int32Vec4,
    UInt32,
    UInt32Vec2,
    UInt32Vec3,
    UInt32Vec4,
    Float32,
    Float32Vec2,
    Float32Vec3,
    Float32Vec4,
    Float32Mat3,
    Float32Mat4,
    Float64,
    Float64Vec2,
    Float64Vec3,
    Float64Vec4,
    Float64Mat4,
    /// Packed 10/10/10/2 signed normal stored in one 32-bit word
    Int32_2_10_10_10Rev,
}

impl ValueType {
    /// Scalar type of each component
    pub fn component_type(self) -> ValueType {
        use ValueType::*;
        match self {
            Int32 | Int32Vec2 | Int32Vec3 | Int32Vec4 => Int32,
            UInt32 | UInt32Vec2 | UInt32Vec3 | UInt32Vec4 => UInt32,
            Float32 | Float32Vec2 | Float32Vec3 | Float32Vec4 | Float32Mat3 | Float32Mat4 => {
                Float32
            }
            Float64 | Float64Vec2 | Float64Vec3 | Float64Vec4 | Float64Mat4 => Float64,
            Int32_2_10_10_10Rev => Int32_2_10_10_10Rev,
        }
    }

    /// Number of scalar components
    pub fn component_count(self) -> usize {
        use ValueType::*;
        match self {
            Int32 | UInt32 | Float32 | Float64 | Int32_2_10_10_10Rev => 1,
            Int32Vec2 | UInt32Vec2 | Float32Vec2 | Float64Vec2 => 2,
            Int32Vec3 | UInt32Vec3 | Float32Vec3 | Float64Vec3 => 3,
            Int32Vec4 | UInt32Vec4 | Float32Vec4 | Float64Vec4 => 4,
            Float32Mat3 => 9,
            Float32Mat4 | Float64Mat4 => 16,
        }
    }

    /// Size of one scalar component in bytes
    pub fn component_size(self) -> usize {
        match self.component_type() {
            ValueType::Float64 => 8,
            _ => 4,
        }
    }

    /// Size of one value in bytes
    pub fn size_in_bytes(self) -> usize {
        self.component_size() * self.component_count()
    }
}

/// Value layout descriptor: a value type and the number of values per element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleType {
    pub value_type: ValueType,
    pub count: usize,
}

impl TupleType {
    pub const fn new(value_type: ValueType, count: usize) -> Self {
        Self { value_type, count }
    }

    /// Single value per element
    pub const fn single(value_type: ValueType) -> Self {
        Self::new(value_type, 1)
    }

    /// Bytes occupied by one element
    pub fn size_in_bytes(&self) -> usize {
        self.value_type.size_in_bytes() * self.count
    }
}

impl fmt::Display for TupleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} x {}", self.value_type, self.count)
    }
}

/// Named attribute layout stored in a buffer array
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferSpec {
    pub name: String,
    pub tuple_type: TupleType,
}

impl BufferSpec {
    pub fn new(name: impl Into<String>, tuple_type: TupleType) -> Self {
        Self {
            name: name.into(),
            tuple_type,
        }
    }

    /// True if every spec in `subset` is contained in `superset`
    pub fn is_subset(subset: &[BufferSpec], superset: &[BufferSpec]) -> bool {
        subset.iter().all(|spec| superset.contains(spec))
    }

    /// `a` followed by the specs of `b` not already present, without duplicates
    pub fn compute_union(a: &[BufferSpec], b: &[BufferSpec]) -> Vec<BufferSpec> {
        let mut seen: FxHashSet<&BufferSpec> = FxHashSet::default();
        let mut result = Vec::with_capacity(a.len() + b.len());
        for spec in a.iter().chain(b.iter()) {
            if seen.insert(spec) {
                result.push(spec.clone());
            }
        }
        result
    }

    /// Specs of `a` not present in `b`, without duplicates, in `a`'s order
    pub fn compute_difference(a: &[BufferSpec], b: &[BufferSpec]) -> Vec<BufferSpec> {
        let excluded: FxHashSet<&BufferSpec> = b.iter().collect();
        let mut seen: FxHashSet<&BufferSpec> = FxHashSet::default();
        a.iter()
            .filter(|spec| !excluded.contains(spec) && seen.insert(*spec))
            .cloned()
            .collect()
    }
}

impl fmt::Display for BufferSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.tuple_type)
    }
}

/// Hints describing how a buffer array will be used
///
/// Hints take part in aggregation ids: ranges with different hints never share
/// an array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BufferArrayUsageHint {
    pub uniform: bool,
    pub storage: bool,
    pub vertex: bool,
    pub index: bool,
    pub immutable: bool,
    pub size_varying: bool,
}

impl BufferArrayUsageHint {
    pub fn immutable() -> Self {
        Self {
            immutable: true,
            ..Self::default()
        }
    }

    pub fn size_varying() -> Self {
        Self {
            size_varying: true,
            ..Self::default()
        }
    }

    /// Packed representation
    pub fn bits(&self) -> u32 {
        (self.uniform as u32)
            | (self.storage as u32) << 1
            | (self.vertex as u32) << 2
            | (self.index as u32) << 3
            | (self.immutable as u32) << 4
            | (self.size_varying as u32) << 5
    }
}
