use crate::fixed_point::{QuantInt, Requant};
use crate::matmul::{dot_f32, dot_i8};

/// `result[b][r] += sum_c matrix[r][c] * vectors[b][c]` over float data.
///
/// Consecutive outputs of a batch are `result_stride` apart, and batches follow
/// each other, so `result` must hold `m_rows * n_batch * result_stride` slots.
pub fn matrix_batch_vector_multiply_accumulate(
    matrix: &[f32],
    m_rows: usize,
    m_cols: usize,
    vectors: &[f32],
    n_batch: usize,
    result: &mut [f32],
    result_stride: usize,
) {
    debug_assert!(result_stride >= 1);
    debug_assert!(matrix.len() >= m_rows * m_cols);
    debug_assert!(vectors.len() >= m_cols * n_batch);
    let mut out = 0usize;
    for b in 0..n_batch {
        let vector = &vectors[b * m_cols..(b + 1) * m_cols];
        for r in 0..m_rows {
            result[out] += dot_f32(&matrix[r * m_cols..(r + 1) * m_cols], vector);
            out += result_stride;
        }
    }
}

/// int8 matrix times int8 vectors, with the int32 dot product scaled into a float
/// accumulator by `scaling_factors[b]` (usually `matrix_scale * vector_scale[b]`).
#[allow(clippy::too_many_arguments)]
pub fn hybrid_matrix_batch_vector_multiply_accumulate(
    matrix: &[i8],
    m_rows: usize,
    m_cols: usize,
    vectors: &[i8],
    scaling_factors: &[f32],
    n_batch: usize,
    result: &mut [f32],
    result_stride: usize,
) {
    debug_assert!(result_stride >= 1);
    debug_assert!(scaling_factors.len() >= n_batch);
    let mut out = 0usize;
    for b in 0..n_batch {
        let vector = &vectors[b * m_cols..(b + 1) * m_cols];
        let batch_scaling_factor = scaling_factors[b];
        for r in 0..m_rows {
            let dotprod = dot_i8(&matrix[r * m_cols..(r + 1) * m_cols], vector);
            result[out] += dotprod as f32 * batch_scaling_factor;
            out += result_stride;
        }
    }
}

/// Fully quantized matmul: int8 input x int8 weights, requantized into `T`.
///
/// For every batch `b` and output row `r`:
/// `acc = zeropoint_times_weights[r] + sum_c input[b][c] * weights[r][c]`, then
/// `output[b][r] = saturate(requant(acc) + output_zp + output[b][r])`.
/// `None` for `zeropoint_times_weights` means the input zero point is 0.
/// Outputs are dense (`n_batch x n_output`).
#[allow(clippy::too_many_arguments)]
pub fn quantized_matrix_batch_vector_multiply_accumulate<T: QuantInt>(
    input: &[i8],
    zeropoint_times_weights: Option<&[i32]>,
    weights: &[i8],
    requant: Requant,
    n_batch: usize,
    n_input: usize,
    n_output: usize,
    output_zp: i32,
    output: &mut [T],
) {
    debug_assert!(weights.len() >= n_input * n_output);
    debug_assert!(output.len() >= n_batch * n_output);
    for b in 0..n_batch {
        let vector = &input[b * n_input..(b + 1) * n_input];
        for r in 0..n_output {
            let bias = zeropoint_times_weights.map_or(0, |z| z[r]);
            let acc = bias + dot_i8(&weights[r * n_input..(r + 1) * n_input], vector);
            let idx = b * n_output + r;
            let acc = requant.apply(acc) + output_zp + output[idx].widen();
            output[idx] = T::saturate(acc);
        }
    }
}

/// `output[r] += scalar * sum_c matrix[r][c]`.
///
/// With `scalar = -input_zero_point` this builds the `zeropoint_times_weights`
/// term consumed by [`quantized_matrix_batch_vector_multiply_accumulate`].
pub fn matrix_scalar_multiply_accumulate(matrix: &[i8], scalar: i32, n_row: usize, n_col: usize, output: &mut [i32]) {
    for (r, o) in output[..n_row].iter_mut().enumerate() {
        let row_sum: i32 = matrix[r * n_col..(r + 1) * n_col].iter().map(|&v| v as i32).sum();
        *o += row_sum * scalar;
    }
}
