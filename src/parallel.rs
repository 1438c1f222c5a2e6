//! Batch-parallel drivers on the rayon pool.
//!
//! Each batch owns a disjoint `m_rows * result_stride` window of the result, so
//! batches run independently and match the single-threaded kernels bit for bit.
//! Run inside `ThreadPool::install` to pick the pool.

use rayon::prelude::*;

use crate::matmul::dense::{hybrid_matrix_batch_vector_multiply_accumulate, matrix_batch_vector_multiply_accumulate};

// Slots touched by the serial kernel; the last batch window may be short.
fn span(m_rows: usize, n_batch: usize, result_stride: usize) -> usize { (n_batch * m_rows - 1) * result_stride + 1 }

/// Parallel [`matrix_batch_vector_multiply_accumulate`].
pub fn par_matrix_batch_vector_multiply_accumulate(
    matrix: &[f32],
    m_rows: usize,
    m_cols: usize,
    vectors: &[f32],
    n_batch: usize,
    result: &mut [f32],
    result_stride: usize,
) {
    if m_rows == 0 || m_cols == 0 || n_batch == 0 {
        return;
    }
    result[..span(m_rows, n_batch, result_stride)]
        .par_chunks_mut(m_rows * result_stride)
        .zip(vectors[..n_batch * m_cols].par_chunks(m_cols))
        .for_each(|(out, vector)| {
            matrix_batch_vector_multiply_accumulate(matrix, m_rows, m_cols, vector, 1, out, result_stride);
        });
}

/// Parallel [`hybrid_matrix_batch_vector_multiply_accumulate`].
#[allow(clippy::too_many_arguments)]
pub fn par_hybrid_matrix_batch_vector_multiply_accumulate(
    matrix: &[i8],
    m_rows: usize,
    m_cols: usize,
    vectors: &[i8],
    scaling_factors: &[f32],
    n_batch: usize,
    result: &mut [f32],
    result_stride: usize,
) {
    if m_rows == 0 || m_cols == 0 || n_batch == 0 {
        return;
    }
    result[..span(m_rows, n_batch, result_stride)]
        .par_chunks_mut(m_rows * result_stride)
        .zip(vectors[..n_batch * m_cols].par_chunks(m_cols))
        .zip(scaling_factors[..n_batch].par_iter())
        .for_each(|((out, vector), scale)| {
            hybrid_matrix_batch_vector_multiply_accumulate(
                matrix,
                m_rows,
                m_cols,
                vector,
                std::slice::from_ref(scale),
                1,
                out,
                result_stride,
            );
        });
}
