//! Block-compressed sparse rows with a byte ledger.
//!
//! A matrix is cut into 16-column blocks. For each row the ledger stores the
//! number of kept blocks followed by their block-column indices; the value
//! buffer stores the kept blocks back to back, row after row. Blocks missing
//! from the ledger are all zero.

use crate::error::{SparseError, SparseResult};
use log::debug;

/// Width of one sparse block, in columns.
pub const SPARSE_BLOCK_SIZE: usize = 16;

/// One decoded ledger row: its block indices and the matching values.
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a, T> {
    pub blocks: &'a [u8],
    pub values: &'a [T],
}

impl<'a, T> SparseRow<'a, T> {
    /// `(first column, 16 values)` for every kept block.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a [T])> + 'a {
        let values: &'a [T] = self.values;
        self.blocks
            .iter()
            .zip(values.chunks_exact(SPARSE_BLOCK_SIZE))
            .map(|(&b, v)| (b as usize * SPARSE_BLOCK_SIZE, v))
    }
}

/// Walks a ledger and its value buffer with two running offsets.
#[derive(Debug, Clone)]
pub struct SparseRows<'a, T> {
    ledger: &'a [u8],
    values: &'a [T],
    ledger_offset: usize,
    value_offset: usize,
    rows_left: usize,
}

impl<'a, T> SparseRows<'a, T> {
    pub fn new(values: &'a [T], ledger: &'a [u8], m_rows: usize) -> Self {
        Self { ledger, values, ledger_offset: 0, value_offset: 0, rows_left: m_rows }
    }
}

impl<'a, T> Iterator for SparseRows<'a, T> {
    type Item = SparseRow<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rows_left == 0 {
            return None;
        }
        self.rows_left -= 1;
        let count = self.ledger[self.ledger_offset] as usize;
        let blocks = &self.ledger[self.ledger_offset + 1..self.ledger_offset + 1 + count];
        let n_values = count * SPARSE_BLOCK_SIZE;
        let values = &self.values[self.value_offset..self.value_offset + n_values];
        self.ledger_offset += 1 + count;
        self.value_offset += n_values;
        Some(SparseRow { blocks, values })
    }

    fn size_hint(&self) -> (usize, Option<usize>) { (self.rows_left, Some(self.rows_left)) }
}

/// Check that a ledger is well formed for an `m_rows x m_cols` matrix whose
/// value buffer holds `values_len` elements.
///
/// Block indices within a row must be strictly increasing and in range, and the
/// ledger and value buffer must be consumed exactly.
pub fn validate_ledger(ledger: &[u8], m_rows: usize, m_cols: usize, values_len: usize) -> SparseResult<()> {
    if m_cols % SPARSE_BLOCK_SIZE != 0 {
        return Err(SparseError::ColumnsNotBlockAligned { cols: m_cols, block: SPARSE_BLOCK_SIZE });
    }
    let blocks_per_row = m_cols / SPARSE_BLOCK_SIZE;
    let mut offset = 0usize;
    let mut kept = 0usize;
    for row in 0..m_rows {
        let count = *ledger.get(offset).ok_or(SparseError::LedgerTruncated { row })? as usize;
        let blocks = ledger.get(offset + 1..offset + 1 + count).ok_or(SparseError::LedgerTruncated { row })?;
        if count > blocks_per_row {
            return Err(SparseError::TooManyBlocks { row, count, blocks_per_row });
        }
        let mut prev: Option<u8> = None;
        for &block in blocks {
            if block as usize >= blocks_per_row {
                return Err(SparseError::BlockOutOfRange { row, block, blocks_per_row });
            }
            if prev.map_or(false, |p| block <= p) {
                return Err(SparseError::BlockOrder { row, block });
            }
            prev = Some(block);
        }
        offset += 1 + count;
        kept += count;
    }
    if offset != ledger.len() {
        return Err(SparseError::TrailingLedgerBytes { extra: ledger.len() - offset });
    }
    let expected = kept * SPARSE_BLOCK_SIZE;
    if expected != values_len {
        return Err(SparseError::ValueCount { expected, actual: values_len });
    }
    Ok(())
}

/// Owned block-sparse matrix: ledger plus packed values.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSparseMatrix<T> {
    rows: usize,
    cols: usize,
    ledger: Vec<u8>,
    values: Vec<T>,
}

impl<T: Copy + Default + PartialEq> BlockSparseMatrix<T> {
    /// Encode a dense row-major matrix, dropping every all-zero block.
    pub fn from_dense(dense: &[T], rows: usize, cols: usize) -> SparseResult<Self> {
        if cols % SPARSE_BLOCK_SIZE != 0 {
            return Err(SparseError::ColumnsNotBlockAligned { cols, block: SPARSE_BLOCK_SIZE });
        }
        if dense.len() != rows * cols {
            return Err(SparseError::BufferSize { expected: rows * cols, actual: dense.len() });
        }
        let blocks_per_row = cols / SPARSE_BLOCK_SIZE;
        if blocks_per_row > u8::MAX as usize {
            return Err(SparseError::TooWide { cols, max_blocks: u8::MAX as usize });
        }
        let zero = T::default();
        let mut ledger = Vec::with_capacity(rows * (blocks_per_row + 1));
        let mut values = Vec::new();
        for row in dense.chunks_exact(cols.max(1)).take(rows) {
            let count_at = ledger.len();
            ledger.push(0u8);
            for (j, block) in row.chunks_exact(SPARSE_BLOCK_SIZE).enumerate() {
                if block.iter().any(|v| *v != zero) {
                    ledger[count_at] += 1;
                    ledger.push(j as u8);
                    values.extend_from_slice(block);
                }
            }
        }
        // Zero-width rows still need their (empty) ledger entries
        if cols == 0 {
            ledger.resize(rows, 0);
        }
        debug!(
            "encoded {}x{} matrix: kept {} of {} blocks",
            rows,
            cols,
            values.len() / SPARSE_BLOCK_SIZE,
            rows * blocks_per_row
        );
        Ok(Self { rows, cols, ledger, values })
    }

    /// Wrap an existing ledger and value buffer after validating them.
    pub fn from_parts(ledger: Vec<u8>, values: Vec<T>, rows: usize, cols: usize) -> SparseResult<Self> {
        validate_ledger(&ledger, rows, cols, values.len())?;
        Ok(Self { rows, cols, ledger, values })
    }

    /// Scatter the kept blocks back into a zero-filled dense matrix.
    pub fn to_dense(&self) -> Vec<T> {
        let mut dense = vec![T::default(); self.rows * self.cols];
        for (r, row) in self.rows().enumerate() {
            for (col, block) in row.iter() {
                let start = r * self.cols + col;
                dense[start..start + SPARSE_BLOCK_SIZE].copy_from_slice(block);
            }
        }
        dense
    }

    pub fn validate(&self) -> SparseResult<()> {
        validate_ledger(&self.ledger, self.rows, self.cols, self.values.len())
    }
}

impl<T> BlockSparseMatrix<T> {
    pub fn n_rows(&self) -> usize { self.rows }
    pub fn n_cols(&self) -> usize { self.cols }
    pub fn ledger(&self) -> &[u8] { &self.ledger }
    pub fn values(&self) -> &[T] { &self.values }

    /// Number of stored 16-wide blocks.
    pub fn kept_blocks(&self) -> usize { self.values.len() / SPARSE_BLOCK_SIZE }

    /// Fraction of blocks kept, in `[0, 1]`.
    pub fn density(&self) -> f64 {
        let total = self.rows * (self.cols / SPARSE_BLOCK_SIZE);
        if total == 0 { 0.0 } else { self.kept_blocks() as f64 / total as f64 }
    }

    pub fn rows(&self) -> SparseRows<'_, T> { SparseRows::new(&self.values, &self.ledger, self.rows) }
}

impl BlockSparseMatrix<f32> {
    /// Float sparse matmul against this matrix; see
    /// [`crate::matmul::sparse_matrix_batch_vector_multiply_accumulate`].
    pub fn multiply_accumulate(&self, vectors: &[f32], n_batch: usize, result: &mut [f32], result_stride: usize) {
        crate::matmul::sparse::sparse_matrix_batch_vector_multiply_accumulate(
            &self.values, &self.ledger, self.rows, self.cols, vectors, n_batch, result, result_stride,
        );
    }
}

impl BlockSparseMatrix<i8> {
    /// Hybrid sparse matmul against this matrix; see
    /// [`crate::matmul::sparse_hybrid_matrix_batch_vector_multiply_accumulate`].
    pub fn hybrid_multiply_accumulate(
        &self,
        vectors: &[i8],
        scaling_factors: &[f32],
        n_batch: usize,
        result: &mut [f32],
        result_stride: usize,
    ) {
        crate::matmul::sparse::sparse_hybrid_matrix_batch_vector_multiply_accumulate(
            &self.values, &self.ledger, self.rows, self.cols, vectors, scaling_factors, n_batch, result, result_stride,
        );
    }
}
