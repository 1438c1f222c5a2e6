//! Float to int8 quantization.

use log::trace;

/// Ranges below this are treated as all-zero input.
pub const MIN_QUANTIZATION_RANGE: f32 = 1e-8;

const SYMMETRIC_SCALE: i32 = 127;

/// Observed range and the resulting symmetric scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub min: f32,
    pub max: f32,
    pub scale: f32,
}

/// Scale and zero point of an asymmetric quantization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsymmetricQuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

fn min_max(values: &[f32]) -> (f32, f32) {
    let mut it = values.iter().copied();
    let first = match it.next() {
        Some(v) => v,
        None => return (0.0, 0.0),
    };
    it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Symmetrically quantize `input` into `output`, returning the observed range and scale.
///
/// `output[i] = clamp(round(input[i] / scale), -127, 127)` with
/// `scale = max(|min|, |max|) / 127`. A range below [`MIN_QUANTIZATION_RANGE`]
/// yields scale `1.0` and an all-zero output.
pub fn symmetric_quantize(input: &[f32], output: &mut [i8]) -> QuantParams {
    let (min, max) = min_max(input);
    let scale = symmetric_quantize_with_range(input, output, min, max);
    QuantParams { min, max, scale }
}

/// Like [`symmetric_quantize`] but with a caller-supplied range.
pub fn symmetric_quantize_with_range(input: &[f32], output: &mut [i8], min: f32, max: f32) -> f32 {
    debug_assert!(output.len() >= input.len());
    let range = min.abs().max(max.abs());
    if range < MIN_QUANTIZATION_RANGE {
        trace!("quantization range {} below threshold, emitting zeros", range);
        for q in &mut output[..input.len()] { *q = 0; }
        return 1.0;
    }
    let scaling_factor_inv = SYMMETRIC_SCALE as f32 / range;
    for (q, &v) in output.iter_mut().zip(input) {
        let quantized = (v * scaling_factor_inv).round() as i32;
        *q = quantized.clamp(-SYMMETRIC_SCALE, SYMMETRIC_SCALE) as i8;
    }
    range / SYMMETRIC_SCALE as f32
}

/// Asymmetrically quantize into the full `[-128, 127]` range.
///
/// The range is widened to include zero so that zero is exactly representable;
/// the zero point is nudged onto the integer grid.
pub fn asymmetric_quantize(input: &[f32], output: &mut [i8]) -> AsymmetricQuantParams {
    const QMIN: f64 = i8::MIN as f64;
    const QMAX: f64 = i8::MAX as f64;
    debug_assert!(output.len() >= input.len());

    let (lo, hi) = min_max(input);
    let rmin = (lo as f64).min(0.0);
    let rmax = (hi as f64).max(0.0);
    if rmin == rmax {
        trace!("asymmetric quantization of an all-zero buffer");
        for q in &mut output[..input.len()] { *q = 0; }
        return AsymmetricQuantParams { scale: 1.0, zero_point: 0 };
    }

    let scale = (rmax - rmin) / (QMAX - QMIN);
    let zero_point_from_min = QMIN - rmin / scale;
    let zero_point_from_max = QMAX - rmax / scale;
    let zero_point_from_min_error = QMIN.abs() + (rmin / scale).abs();
    let zero_point_from_max_error = QMAX.abs() + (rmax / scale).abs();
    let zero_point = if zero_point_from_min_error < zero_point_from_max_error {
        zero_point_from_min
    } else {
        zero_point_from_max
    };
    let nudged_zero_point = if zero_point <= QMIN {
        i8::MIN as i32
    } else if zero_point >= QMAX {
        i8::MAX as i32
    } else {
        zero_point.round() as i32
    };

    let params = AsymmetricQuantParams { scale: scale as f32, zero_point: nudged_zero_point };
    let scaling_factor_inv = (1.0 / params.scale as f64) as f32;
    for (q, &v) in output.iter_mut().zip(input) {
        let quantized = (params.zero_point as f32 + v * scaling_factor_inv).round() as i32;
        *q = quantized.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
    }
    params
}

/// Map quantized values back to floats: `output[i] = input[i] * scale`.
pub fn dequantize(input: &[i8], scale: f32, output: &mut [f32]) {
    crate::vector::vector_scalar_multiply(input, scale, output);
}
