//! Float vector utilities used around the matmul kernels in a recurrent cell.
//!
//! Batched buffers are `n_batch` vectors of `v_size` floats laid end to end.

use std::ops::AddAssign;

use log::trace;

/// `result[i] = clamp(vector[i], -abs_limit, abs_limit)`.
pub fn clip_vector(vector: &[f32], abs_limit: f32, result: &mut [f32]) {
    for (r, &v) in result.iter_mut().zip(vector) {
        *r = abs_limit.min(v).max(-abs_limit);
    }
}

/// True when every element is exactly `0.0` (either sign).
pub fn is_zero_vector(vector: &[f32]) -> bool { vector.iter().all(|&v| v == 0.0) }

/// `result[i] = vector[i] as f32 * scale`.
pub fn vector_scalar_multiply(vector: &[i8], scale: f32, result: &mut [f32]) {
    for (r, &v) in result.iter_mut().zip(vector) { *r = v as f32 * scale; }
}

/// Add `vector` to every batch of `batch_vector` in place.
pub fn vector_batch_vector_add(vector: &[f32], v_size: usize, n_batch: usize, batch_vector: &mut [f32]) {
    for batch in batch_vector.chunks_exact_mut(v_size.max(1)).take(n_batch) {
        for (b, &v) in batch.iter_mut().zip(&vector[..v_size]) { *b += v; }
    }
}

/// Copy `vector` into every batch of `batch_vector`.
pub fn vector_batch_vector_assign(vector: &[f32], v_size: usize, n_batch: usize, batch_vector: &mut [f32]) {
    if v_size == 0 {
        return;
    }
    for batch in batch_vector.chunks_exact_mut(v_size).take(n_batch) {
        batch.copy_from_slice(&vector[..v_size]);
    }
}

pub fn vector_vector_cwise_product(vector_1: &[f32], vector_2: &[f32], result: &mut [f32]) {
    for ((r, &a), &b) in result.iter_mut().zip(vector_1).zip(vector_2) { *r = a * b; }
}

pub fn vector_vector_cwise_product_accumulate(vector_1: &[f32], vector_2: &[f32], result: &mut [f32]) {
    for ((r, &a), &b) in result.iter_mut().zip(vector_1).zip(vector_2) { *r += a * b; }
}

/// `result[b][i] = vector[i] * batch_vector[b][i]` for every batch.
pub fn vector_batch_vector_cwise_product(
    vector: &[f32],
    v_size: usize,
    batch_vector: &[f32],
    n_batch: usize,
    result: &mut [f32],
) {
    let n = v_size * n_batch;
    for (i, (r, &bv)) in result[..n].iter_mut().zip(&batch_vector[..n]).enumerate() {
        *r = vector[i % v_size] * bv;
    }
}

/// `result[b][i] += vector[i] * batch_vector[b][i]` for every batch.
pub fn vector_batch_vector_cwise_product_accumulate(
    vector: &[f32],
    v_size: usize,
    batch_vector: &[f32],
    n_batch: usize,
    result: &mut [f32],
) {
    let n = v_size * n_batch;
    for (i, (r, &bv)) in result[..n].iter_mut().zip(&batch_vector[..n]).enumerate() {
        *r += vector[i % v_size] * bv;
    }
}

pub fn vector_vector_dot_product(vector_1: &[f32], vector_2: &[f32]) -> f32 {
    crate::matmul::dot_f32(vector_1, vector_2)
}

/// Dot product of matching batches, written (not accumulated) to
/// `result[b * result_stride]`.
pub fn batch_vector_batch_vector_dot_product(
    vector_1: &[f32],
    vector_2: &[f32],
    v_size: usize,
    n_batch: usize,
    result: &mut [f32],
    result_stride: usize,
) {
    for b in 0..n_batch {
        let span = b * v_size..(b + 1) * v_size;
        result[b * result_stride] = vector_vector_dot_product(&vector_1[span.clone()], &vector_2[span]);
    }
}

/// Drop the first element, shift the rest left by one and append `shift_value`.
pub fn vector_shift_left(vector: &mut [f32], shift_value: f32) {
    if let Some(last) = vector.len().checked_sub(1) {
        vector.copy_within(1.., 0);
        vector[last] = shift_value;
    }
}

/// `output[o] = sum(input[o * reduction_size .. (o + 1) * reduction_size])`.
pub fn reduction_sum_vector<T: Copy + Default + AddAssign>(
    input: &[T],
    output: &mut [T],
    output_size: usize,
    reduction_size: usize,
) {
    for (o, out) in output[..output_size].iter_mut().enumerate() {
        let mut sum = T::default();
        for &v in &input[o * reduction_size..(o + 1) * reduction_size] { sum += v; }
        *out = sum;
    }
}

/// Normalize every batch to zero mean and unit variance.
///
/// The variance is `E[x^2] - mean^2` over f32 sums. Only an exactly zero
/// variance falls back to `1 / sqrt(epsilon)`, so a constant row maps to zeros
/// while a tiny but varying row is still fully normalized.
pub fn mean_stddev_normalization(input: &[f32], output: &mut [f32], v_size: usize, n_batch: usize, epsilon: f32) {
    if v_size == 0 {
        return;
    }
    let n = v_size as f32;
    for (row, out) in input.chunks_exact(v_size).zip(output.chunks_exact_mut(v_size)).take(n_batch) {
        let mut sum = 0.0f32;
        let mut sum_sq = 0.0f32;
        for &x in row {
            sum += x;
            sum_sq += x * x;
        }
        let mean = sum / n;
        let variance = sum_sq / n - mean * mean;
        let stddev_inv = if variance == 0.0 {
            trace!("zero variance row, normalizing with epsilon {}", epsilon);
            1.0 / epsilon.sqrt()
        } else {
            1.0 / variance.sqrt()
        };
        for (o, &x) in out.iter_mut().zip(row) { *o = (x - mean) * stddev_inv; }
    }
}

/// `result[i] = 1 - vector[i]`.
pub fn sub1_vector(vector: &[f32], result: &mut [f32]) {
    for (r, &v) in result.iter_mut().zip(vector) { *r = 1.0 - v; }
}

pub fn zero_vector(vector: &mut [f32]) { vector.fill(0.0); }
