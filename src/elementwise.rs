//! Elementwise kernels over int16/int8 fixed-point buffers.
//!
//! All kernels walk `n_batch * n_input` elements; the batch/input split only
//! documents the caller's layout.

use crate::fixed_point::{multiply_by_quantized_multiplier, rounding_divide_by_pot, QuantInt};

/// Saturating int16 add: `out = clamp(a + b)`.
pub fn cwise_add(input_1: &[i16], input_2: &[i16], n_batch: usize, n_input: usize, output: &mut [i16]) {
    let n = n_batch * n_input;
    for ((o, &a), &b) in output[..n].iter_mut().zip(&input_1[..n]).zip(&input_2[..n]) {
        *o = a.saturating_add(b);
    }
}

/// Multiply two int16 buffers and shift the int32 product right by `shift` with rounding.
///
/// The rounded product is narrowed with a plain two's-complement cast; only
/// `(-32768)^2` style corner cases exceed the output width, and they wrap.
pub fn cwise_mul<T: QuantInt>(input_1: &[i16], input_2: &[i16], n_batch: usize, n_input: usize, shift: i32, output: &mut [T]) {
    let n = n_batch * n_input;
    for ((o, &a), &b) in output[..n].iter_mut().zip(&input_1[..n]).zip(&input_2[..n]) {
        let value = a as i32 * b as i32;
        *o = T::wrap(rounding_divide_by_pot(value, shift));
    }
}

/// Multiply two int16 buffers, rescale by `multiplier * 2^shift / 2^31`,
/// subtract `output_zp` and saturate to int8.
#[allow(clippy::too_many_arguments)]
pub fn cwise_mul_rescaled(
    input_1: &[i16],
    input_2: &[i16],
    multiplier: i32,
    shift: i32,
    n_batch: usize,
    n_input: usize,
    output_zp: i32,
    output: &mut [i8],
) {
    let n = n_batch * n_input;
    for ((o, &a), &b) in output[..n].iter_mut().zip(&input_1[..n]).zip(&input_2[..n]) {
        let value = multiply_by_quantized_multiplier(a as i32 * b as i32, multiplier, shift);
        *o = i8::saturate(value - output_zp);
    }
}

/// Clamp every element into `[-limit, limit]` in place.
pub fn cwise_clipping<T: QuantInt>(input: &mut [T], limit: T, n_batch: usize, n_input: usize) {
    let hi = limit.widen();
    let lo = -hi;
    for v in &mut input[..n_batch * n_input] {
        let x = v.widen();
        if x > hi {
            *v = limit;
        } else if x < lo {
            *v = T::saturate(lo);
        }
    }
}
