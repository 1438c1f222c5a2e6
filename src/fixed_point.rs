//! Scalar fixed-point primitives shared by every quantized kernel.
//!
//! Rounding follows the gemmlowp conventions: `rounding_divide_by_pot` rounds to
//! nearest with ties away from zero, and the doubling high multiply nudges by
//! half an ulp before truncating.

/// Narrow signed integer types a quantized kernel can produce.
pub trait QuantInt: Copy + Default + PartialOrd + std::fmt::Debug + Send + Sync {
    const MIN_I32: i32;
    const MAX_I32: i32;

    fn widen(self) -> i32;

    /// Clamp into the representable range, then narrow.
    fn saturate(v: i32) -> Self;

    /// Two's-complement narrowing (keeps the low bits).
    fn wrap(v: i32) -> Self;
}

macro_rules! impl_quant_int {
    ($t:ty) => {
        impl QuantInt for $t {
            const MIN_I32: i32 = <$t>::MIN as i32;
            const MAX_I32: i32 = <$t>::MAX as i32;

            #[inline]
            fn widen(self) -> i32 { self as i32 }

            #[inline]
            fn saturate(v: i32) -> Self { v.clamp(Self::MIN_I32, Self::MAX_I32) as $t }

            #[inline]
            fn wrap(v: i32) -> Self { v as $t }
        }
    };
}

impl_quant_int!(i8);
impl_quant_int!(i16);

/// Requantization descriptor: effective scale `multiplier / 2^31 * 2^shift`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Requant {
    pub multiplier: i32,
    pub shift: i32,
}

impl Requant {
    pub const fn new(multiplier: i32, shift: i32) -> Self { Self { multiplier, shift } }

    /// Encode a real scale as a Q0.31 multiplier in `[2^30, 2^31)` and a power-of-two shift.
    pub fn from_scale(scale: f64) -> Self {
        if scale == 0.0 {
            return Self::new(0, 0);
        }
        let (q, mut shift) = frexp(scale);
        let mut q_fixed = (q * (1i64 << 31) as f64).round() as i64;
        if q_fixed == 1i64 << 31 {
            q_fixed /= 2;
            shift += 1;
        }
        if shift < -31 {
            shift = 0;
            q_fixed = 0;
        }
        Self::new(q_fixed as i32, shift)
    }

    /// The real scale this descriptor encodes.
    pub fn scale(self) -> f64 {
        self.multiplier as f64 / (1i64 << 31) as f64 * 2f64.powi(self.shift)
    }

    #[inline]
    pub fn apply(self, x: i32) -> i32 { multiply_by_quantized_multiplier(x, self.multiplier, self.shift) }
}

// Splits x into a mantissa in [0.5, 1) and an exponent, like C's frexp.
fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let mut exp = x.abs().log2().floor() as i32 + 1;
    let mut m = x / 2f64.powi(exp);
    // log2 can land one off near exact powers of two
    if m.abs() >= 1.0 {
        m /= 2.0;
        exp += 1;
    } else if m.abs() < 0.5 {
        m *= 2.0;
        exp -= 1;
    }
    (m, exp)
}

/// Divide by `2^exponent`, rounding to nearest and ties away from zero.
#[inline]
pub fn rounding_divide_by_pot(x: i32, exponent: i32) -> i32 {
    debug_assert!((0..=31).contains(&exponent), "exponent {} out of range", exponent);
    let mask = ((1i64 << exponent) - 1) as i32;
    let remainder = x & mask;
    let threshold = (mask >> 1) + i32::from(x < 0);
    (x >> exponent) + i32::from(remainder > threshold)
}

#[inline]
pub fn rounding_divide_by_pot_i16(x: i16, exponent: i32) -> i16 {
    debug_assert!((0..=15).contains(&exponent));
    rounding_divide_by_pot(x as i32, exponent) as i16
}

/// High 32 bits of `2 * a * b`, rounded; the single overflow case saturates.
#[inline]
pub fn saturating_rounding_doubling_high_mul(a: i32, b: i32) -> i32 {
    if a == b && a == i32::MIN {
        return i32::MAX;
    }
    let ab = a as i64 * b as i64;
    let nudge: i64 = if ab >= 0 { 1 << 30 } else { 1 - (1 << 30) };
    ((ab + nudge) / (1i64 << 31)) as i32
}

#[inline]
pub fn saturating_rounding_doubling_high_mul_i16(a: i16, b: i16) -> i16 {
    if a == b && a == i16::MIN {
        return i16::MAX;
    }
    let ab = a as i32 * b as i32;
    let nudge: i32 = if ab >= 0 { 1 << 14 } else { 1 - (1 << 14) };
    ((ab + nudge) / (1 << 15)) as i16
}

/// `x * 2^exponent`; left shifts saturate, right shifts round.
#[inline]
pub fn saturating_rounding_multiply_by_pot(x: i32, exponent: i32) -> i32 {
    if exponent == 0 {
        x
    } else if exponent < 0 {
        rounding_divide_by_pot(x, -exponent)
    } else {
        let threshold = (1i32 << (31 - exponent)) - 1;
        if x > threshold {
            i32::MAX
        } else if x < -threshold {
            i32::MIN
        } else {
            x << exponent
        }
    }
}

#[inline]
pub fn saturating_rounding_multiply_by_pot_i16(x: i16, exponent: i32) -> i16 {
    if exponent == 0 {
        x
    } else if exponent < 0 {
        rounding_divide_by_pot_i16(x, -exponent)
    } else {
        let threshold = (1i32 << (15 - exponent)) - 1;
        let wide = x as i32;
        if wide > threshold {
            i16::MAX
        } else if wide < -threshold {
            i16::MIN
        } else {
            (wide << exponent) as i16
        }
    }
}

/// Rescale an accumulator by `multiplier * 2^shift / 2^31`.
#[inline]
pub fn multiply_by_quantized_multiplier(x: i32, multiplier: i32, shift: i32) -> i32 {
    let left_shift = shift.max(0);
    let right_shift = (-shift).max(0);
    rounding_divide_by_pot(
        saturating_rounding_doubling_high_mul(x.wrapping_mul(1 << left_shift), multiplier),
        right_shift,
    )
}

/// `(a + b) / 2` rounded away from zero, without intermediate overflow.
#[inline]
pub fn rounding_half_sum_i16(a: i16, b: i16) -> i16 {
    let sum = a as i32 + b as i32;
    let sign = if sum >= 0 { 1 } else { -1 };
    ((sum + sign) / 2) as i16
}

/// Multiplier/shift pair approximating `1 / sqrt(input)`.
///
/// Runs five Newton-Raphson steps in Q3.28. The returned shift is multiplied by
/// `reverse_shift`, so `-1` yields a shift suitable for
/// [`multiply_by_quantized_multiplier`]. Inputs `<= 1` map to `(i32::MAX, 0)`.
pub fn inv_sqrt_quantized_multiplier_exp(input: i32, reverse_shift: i32) -> (i32, i32) {
    debug_assert!(input >= 0);
    if input <= 1 {
        return (i32::MAX, 0);
    }
    let mut input = input;
    let mut shift = 11;
    while input >= (1 << 29) {
        input /= 4;
        shift += 1;
    }
    let max_left_shift_bits = (input as u32).leading_zeros() as i32 - 1;
    let left_shift_bit_pairs = max_left_shift_bits / 2 - 1;
    shift -= left_shift_bit_pairs;
    input <<= 2 * left_shift_bit_pairs;
    debug_assert!((1 << 27..1 << 29).contains(&input));

    const HALF_THREE: i32 = (1 << 28) + (1 << 27); // 1.5 in Q3.28
    const HALF_SQRT_2: i32 = 1_518_500_250; // sqrt(2)/2 in Q0.31
    let srdhm = saturating_rounding_doubling_high_mul;

    let half_input = saturating_rounding_multiply_by_pot(input >> 1, -1);
    let mut x: i32 = 1 << 28;
    for _ in 0..5 {
        let x3 = saturating_rounding_multiply_by_pot(srdhm(srdhm(x, x), x), 6);
        x = saturating_rounding_multiply_by_pot(srdhm(HALF_THREE, x).wrapping_sub(srdhm(half_input, x3)), 3);
    }
    x = srdhm(x, HALF_SQRT_2);
    if shift < 0 {
        x <<= -shift;
        shift = 0;
    }
    (x, shift * reverse_shift)
}
