//! Matrix by batched-vector engines.
//!
//! Layout conventions shared by every kernel here: matrices are row-major
//! `m_rows x m_cols`, vectors are concatenated per batch, and float results for
//! batch `b`, row `r` live at `result[(b * m_rows + r) * result_stride]`.

pub mod dense;
pub mod ledger;
pub mod sparse;

pub use dense::{
    hybrid_matrix_batch_vector_multiply_accumulate, matrix_batch_vector_multiply_accumulate,
    matrix_scalar_multiply_accumulate, quantized_matrix_batch_vector_multiply_accumulate,
};
pub use ledger::{validate_ledger, BlockSparseMatrix, SparseRow, SparseRows, SPARSE_BLOCK_SIZE};
pub use sparse::{
    sparse_hybrid_matrix_batch_vector_multiply_accumulate, sparse_matrix_batch_vector_multiply_accumulate,
    sparse_quantized_matrix_batch_vector_multiply_accumulate,
};

/// int8 dot product accumulated in int32.
#[inline]
pub fn dot_i8(row: &[i8], x: &[i8]) -> i32 {
    debug_assert_eq!(row.len(), x.len());
    let mut acc: i32 = 0;
    for i in 0..row.len() { acc += (row[i] as i32) * (x[i] as i32); }
    acc
}

/// float dot product, summed left to right from zero.
#[inline]
pub fn dot_f32(row: &[f32], x: &[f32]) -> f32 {
    debug_assert_eq!(row.len(), x.len());
    let mut acc = 0.0f32;
    for (a, b) in row.iter().zip(x) { acc += a * b; }
    acc
}
