/// Opaque typed payload carried by buffer sources and returned by read-backs.
use bytemuck::Pod;

use super::buffer_spec::{TupleType, ValueType};

/// A run of `num_elements` elements laid out as `tuple_type`
#[derive(Debug, Clone, PartialEq)]
pub struct BufferValue {
    tuple_type: TupleType,
    num_elements: usize,
    bytes: Vec<u8>,
}

impl BufferValue {
    /// Build from raw bytes. The byte vector is resized to exactly
    /// `num_elements` elements.
    pub fn new(tuple_type: TupleType, num_elements: usize, mut bytes: Vec<u8>) -> Self {
        bytes.resize(num_elements * tuple_type.size_in_bytes(), 0);
        Self {
            tuple_type,
            num_elements,
            bytes,
        }
    }

    /// Build from a slice of plain data. Trailing bytes that do not fill a
    /// whole element are dropped.
    pub fn from_pod<T: Pod>(tuple_type: TupleType, data: &[T]) -> Self {
        let bytes: Vec<u8> = bytemuck::cast_slice(data).to_vec();
        let element_size = tuple_type.size_in_bytes();
        let num_elements = if element_size == 0 { 0 } else { bytes.len() / element_size };
        Self::new(tuple_type, num_elements, bytes)
    }

    /// Zero-element value returned for unassigned ranges and unknown names
    pub fn empty() -> Self {
        Self {
            tuple_type: TupleType::new(ValueType::Float32, 0),
            num_elements: 0,
            bytes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    pub fn tuple_type(&self) -> TupleType {
        self.tuple_type
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Reinterpret the payload as plain data
    pub fn to_vec<T: Pod>(&self) -> Vec<T> {
        bytemuck::pod_collect_to_vec(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pod_counts_elements() {
        let points = [0.0f32, 0.0, 0.0, 1.0, 1.0, 1.0];
        let value = BufferValue::from_pod(TupleType::single(ValueType::Float32Vec3), &points);

        assert_eq!(value.num_elements(), 2);
        assert_eq!(value.size_in_bytes(), 24);
        assert_eq!(value.to_vec::<f32>(), points.to_vec());
    }

    #[test]
    fn test_partial_element_dropped() {
        let value = BufferValue::from_pod(TupleType::single(ValueType::Float32Vec2), &[1.0f32, 2.0, 3.0]);
        assert_eq!(value.num_elements(), 1);
        assert_eq!(value.to_vec::<f32>(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_wide_values_read_back() {
        // byte storage carries no f64 alignment
        let transform: Vec<f64> = (0..16).map(f64::from).collect();
        let value = BufferValue::from_pod(TupleType::single(ValueType::Float64Mat4), &transform);
        assert_eq!(value.num_elements(), 1);
        assert_eq!(value.to_vec::<f64>(), transform);
    }

    #[test]
    fn test_empty_value() {
        let value = BufferValue::empty();
        assert!(value.is_empty());
        assert!(value.bytes().is_empty());
    }
}
