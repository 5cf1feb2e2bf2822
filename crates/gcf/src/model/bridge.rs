//! Tensor bridge: conversions between plain Rust index/score buffers and
//! burn tensors.
//!
//! The sampler and the ranking code work on `usize` ids and `f32` scores;
//! models need `Tensor<B, 1, Int>` indices and produce `Tensor<B, 2>` scores.

use burn::prelude::*;
use burn::tensor::TensorData;

/// Convert internal ids to a 1D integer tensor.
pub fn index_tensor<B: Backend>(ids: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = ids.iter().map(|&i| i as i64).collect();
    Tensor::from_data(TensorData::new(data, [ids.len()]), device)
}

/// Convert a batch of equal-length f32 rows to a 2D tensor.
///
/// # Panics
/// Panics if rows is empty or if rows have inconsistent lengths.
pub fn rows_to_tensor<B: Backend>(rows: &[Vec<f32>], device: &B::Device) -> Tensor<B, 2> {
    assert!(!rows.is_empty(), "rows must not be empty");
    let dim = rows[0].len();
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), dim, "row {i} has length {}, expected {dim}", row.len());
    }
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), dim]), device)
}

/// Read a `[rows, cols]` score tensor back as row-major f32 values.
///
/// Returns the flat buffer and the column count.
pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> anyhow::Result<(Vec<f32>, usize)> {
    let [_, cols] = tensor.dims();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Failed to read score tensor: {e:?}"))?;
    Ok((values, cols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_rows_round_trip() {
        let device = Default::default();
        let rows = vec![vec![1.0_f32, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let tensor = rows_to_tensor::<TestBackend>(&rows, &device);
        assert_eq!(tensor.dims(), [2, 3]);

        let (flat, cols) = tensor_to_rows(tensor).unwrap();
        assert_eq!(cols, 3);
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_index_tensor() {
        let device = Default::default();
        let t = index_tensor::<TestBackend>(&[3, 0, 7], &device);
        assert_eq!(t.dims(), [3]);
        let values: Vec<i64> = t.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(values, vec![3, 0, 7]);
    }

    #[test]
    #[should_panic(expected = "row 1 has length 2")]
    fn test_ragged_rows_panic() {
        let device = Default::default();
        let _ = rows_to_tensor::<TestBackend>(&[vec![1.0, 2.0, 3.0], vec![1.0, 2.0]], &device);
    }
}
