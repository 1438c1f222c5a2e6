//! Sparse engines: same output contracts as [`crate::matmul::dense`], driven by
//! the block ledger. Skipped blocks contribute nothing.
//!
//! Ledger integrity is the caller's job; debug builds assert on blocks that run
//! past the end of the vector.

use crate::fixed_point::{QuantInt, Requant};
use crate::matmul::ledger::{SparseRows, SPARSE_BLOCK_SIZE};
use crate::matmul::dot_i8;

/// Float sparse matmul, accumulating into strided `result` like the dense kernel.
#[allow(clippy::too_many_arguments)]
pub fn sparse_matrix_batch_vector_multiply_accumulate(
    matrix: &[f32],
    ledger: &[u8],
    m_rows: usize,
    m_cols: usize,
    vectors: &[f32],
    n_batch: usize,
    result: &mut [f32],
    result_stride: usize,
) {
    debug_assert_eq!(m_cols % SPARSE_BLOCK_SIZE, 0);
    let mut out = 0usize;
    for b in 0..n_batch {
        let vector = &vectors[b * m_cols..(b + 1) * m_cols];
        for row in SparseRows::new(matrix, ledger, m_rows) {
            let mut dot_prod = 0.0f32;
            for (start, block) in row.iter() {
                debug_assert!(start + SPARSE_BLOCK_SIZE <= m_cols);
                for (m, v) in block.iter().zip(&vector[start..start + SPARSE_BLOCK_SIZE]) { dot_prod += m * v; }
            }
            result[out] += dot_prod;
            out += result_stride;
        }
    }
}

/// int8 sparse matmul scaled per batch into a float accumulator.
#[allow(clippy::too_many_arguments)]
pub fn sparse_hybrid_matrix_batch_vector_multiply_accumulate(
    matrix: &[i8],
    ledger: &[u8],
    m_rows: usize,
    m_cols: usize,
    vectors: &[i8],
    scaling_factors: &[f32],
    n_batch: usize,
    result: &mut [f32],
    result_stride: usize,
) {
    debug_assert_eq!(m_cols % SPARSE_BLOCK_SIZE, 0);
    let mut out = 0usize;
    for b in 0..n_batch {
        let vector = &vectors[b * m_cols..(b + 1) * m_cols];
        let batch_scaling_factor = scaling_factors[b];
        for row in SparseRows::new(matrix, ledger, m_rows) {
            let mut dotprod: i32 = 0;
            for (start, block) in row.iter() {
                debug_assert!(start + SPARSE_BLOCK_SIZE <= m_cols);
                dotprod += dot_i8(block, &vector[start..start + SPARSE_BLOCK_SIZE]);
            }
            result[out] += dotprod as f32 * batch_scaling_factor;
            out += result_stride;
        }
    }
}

/// Requantized sparse matmul with the contract of
/// [`crate::matmul::quantized_matrix_batch_vector_multiply_accumulate`].
#[allow(clippy::too_many_arguments)]
pub fn sparse_quantized_matrix_batch_vector_multiply_accumulate<T: QuantInt>(
    input: &[i8],
    zeropoint_times_weights: Option<&[i32]>,
    weights: &[i8],
    ledger: &[u8],
    requant: Requant,
    n_batch: usize,
    n_input: usize,
    n_output: usize,
    output_zp: i32,
    output: &mut [T],
) {
    debug_assert_eq!(n_input % SPARSE_BLOCK_SIZE, 0);
    for b in 0..n_batch {
        let vector = &input[b * n_input..(b + 1) * n_input];
        for (r, row) in SparseRows::new(weights, ledger, n_output).enumerate() {
            let mut acc = zeropoint_times_weights.map_or(0, |z| z[r]);
            for (start, block) in row.iter() {
                acc += dot_i8(block, &vector[start..start + SPARSE_BLOCK_SIZE]);
            }
            let idx = b * n_output + r;
            let acc = requant.apply(acc) + output_zp + output[idx].widen();
            output[idx] = T::saturate(acc);
        }
    }
}
