use log::debug;

use crate::fixed_point::{inv_sqrt_quantized_multiplier_exp, multiply_by_quantized_multiplier};

const TWO_TO_POWER_20: i64 = 1 << 20;

/// Integer layer normalization of int16 rows.
///
/// Each row is normalized to zero mean and unit variance using 10 extra
/// fractional bits, scaled by `weights` and shifted by `bias` (both
/// per-column), then requantized by `scale_a * 2^scale_b` and clamped to int16.
/// A row whose integer variance is below 1 uses `variance_limit` instead.
#[allow(clippy::too_many_arguments)]
pub fn apply_layer_norm(
    input: &[i16],
    layer_norm_weights: &[i16],
    bias: &[i32],
    layer_norm_scale_a: i32,
    layer_norm_scale_b: i32,
    variance_limit: i32,
    n_batch: usize,
    n_input: usize,
    output: &mut [i16],
) {
    if n_input == 0 {
        return;
    }
    debug_assert!(layer_norm_weights.len() >= n_input && bias.len() >= n_input);
    let n = n_input as i64;
    for (row, out) in input.chunks_exact(n_input).zip(output.chunks_exact_mut(n_input)).take(n_batch) {
        let mut sum: i64 = 0;
        let mut sum_sq: i64 = 0;
        for &v in row {
            let v = v as i64;
            sum += v;
            sum_sq += v * v;
        }
        let mean = (sum * 1024 / n) as i32;
        let temp = TWO_TO_POWER_20 / n;
        let variance = sum_sq * temp - mean as i64 * mean as i64;
        let mut variance2 = (variance / TWO_TO_POWER_20) as i32;
        if variance2 < 1 {
            debug!("layer norm row variance {} below 1, using limit {}", variance2, variance_limit);
            variance2 = variance_limit;
        }
        let (stddev_inverse_a, stddev_inverse_b) = inv_sqrt_quantized_multiplier_exp(variance2, -1);

        for (j, (o, &v)) in out.iter_mut().zip(row).enumerate() {
            let shifted = (1024 * v as i32).wrapping_sub(mean);
            let rescaled = multiply_by_quantized_multiplier(shifted, stddev_inverse_a, stddev_inverse_b);
            let val3 = rescaled as i64 * layer_norm_weights[j] as i64 + bias[j] as i64;
            let val4 = ((if val3 > 0 { val3 + 512 } else { val3 - 512 }) / 1024) as i32;
            let val5 = multiply_by_quantized_multiplier(val4, layer_norm_scale_a, layer_norm_scale_b + 12);
            *o = val5.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
    }
}
