//! int16 fixed-point tanh and sigmoid.
//!
//! Inputs are Q`m`.`15-m` raw values, outputs are Q0.15. The math follows the
//! gemmlowp formulation: `exp(x)` for `x <= 0` from a Taylor polynomial around
//! `-1/8` plus a barrel shifter over the integer part, then a Newton-Raphson
//! reciprocal. Intermediate adds wrap like the two's-complement raw type does.

use crate::fixed_point::{
    rounding_half_sum_i16, saturating_rounding_doubling_high_mul_i16 as mul,
    saturating_rounding_multiply_by_pot_i16 as mul_by_pot,
};

// Q0.15 constants, each the int32 gemmlowp constant rounded to nearest over 16 bits.
const EXP_MINUS_ONE_EIGHTH: i16 = 28918;
const ONE_THIRD: i16 = 10923;
const ONE_HALF: i16 = 16384;
const ONE_Q0: i16 = i16::MAX;

// Q2.13
const FORTY_EIGHT_OVER_SEVENTEEN: i16 = 23130;
const NEG_THIRTY_TWO_OVER_SEVENTEEN: i16 = -15420;
const ONE_Q2: i16 = 1 << 13;

/// `exp(-2^k)` in Q0.15 for `k = -2..=4`.
const BARREL: [(i32, i16); 7] = [(-2, 25520), (-1, 19875), (0, 12055), (1, 4435), (2, 600), (3, 11), (4, 0)];

/// Largest integer-bit count [`apply_tanh`] accepts.
pub const MAX_TANH_INTEGER_BITS: u32 = 12;

/// `exp(a)` for `a` in `[-1/4, 0)`, Q0.15 in and out.
fn exp_on_interval_between_negative_one_quarter_and_0_excl(a: i16) -> i16 {
    let x = a.wrapping_add(1 << 12);
    let x2 = mul(x, x);
    let x3 = mul(x2, x);
    let x4 = mul(x2, x2);
    let x4_over_4 = mul_by_pot(x4, -2);
    let poly = mul(x4_over_4.wrapping_add(x3), ONE_THIRD).wrapping_add(x2);
    let x4_over_24_plus_x3_over_6_plus_x2_over_2 = mul_by_pot(poly, -1);
    let tail = mul(EXP_MINUS_ONE_EIGHTH, x.wrapping_add(x4_over_24_plus_x3_over_6_plus_x2_over_2));
    EXP_MINUS_ONE_EIGHTH.saturating_add(tail)
}

/// `exp(a)` for `a <= 0` given as Q`integer_bits`, result in Q0.15.
fn exp_on_negative_values(a: i16, integer_bits: u32) -> i16 {
    let ib = integer_bits as i32;
    let fractional_bits = 15 - ib;
    let one_quarter: i16 = 1 << (fractional_bits - 2);
    let mask = one_quarter - 1;
    let a_mod_quarter_minus_one_quarter = (a & mask).wrapping_sub(one_quarter);
    let mut result = exp_on_interval_between_negative_one_quarter_and_0_excl(mul_by_pot(a_mod_quarter_minus_one_quarter, ib));
    let remainder = a_mod_quarter_minus_one_quarter.wrapping_sub(a);

    for &(exponent, multiplier) in &BARREL {
        if ib > exponent && remainder & (1 << (fractional_bits + exponent)) != 0 {
            result = mul(result, multiplier);
        }
    }
    // exp(-32) is below one ulp
    if ib > 5 && (a as i32) < -(1 << (20 - ib)) {
        result = 0;
    }
    if a == 0 { ONE_Q0 } else { result }
}

/// Newton-Raphson estimate of `1 / (1 + a)` in Q2.13, `a` in `[0, 1]` as Q0.15.
fn reciprocal_one_plus(a: i16) -> i16 {
    let half_denominator = rounding_half_sum_i16(a, ONE_Q0);
    let mut x = FORTY_EIGHT_OVER_SEVENTEEN.wrapping_add(mul(half_denominator, NEG_THIRTY_TWO_OVER_SEVENTEEN));
    for _ in 0..3 {
        let half_denominator_times_x = mul(half_denominator, x);
        let one_minus_half_denominator_times_x = ONE_Q2.wrapping_sub(half_denominator_times_x);
        x = x.wrapping_add(mul_by_pot(mul(x, one_minus_half_denominator_times_x), 2));
    }
    x
}

/// `1 / (1 + a)` in Q0.15.
fn one_over_one_plus_x_for_x_in_0_1(a: i16) -> i16 { mul_by_pot(reciprocal_one_plus(a), 1) }

/// `(1 - a) / (1 + a)` in Q0.15.
fn one_minus_x_over_one_plus_x_for_x_in_0_1(a: i16) -> i16 {
    mul_by_pot(reciprocal_one_plus(a).wrapping_sub(ONE_Q2), 2)
}

/// tanh of one Q`integer_bits` raw value, in Q0.15.
pub fn tanh_raw(a: i16, integer_bits: u32) -> i16 {
    if a == 0 {
        return 0;
    }
    let neg = a < 0;
    let n = if neg { a } else { a.wrapping_neg() };
    // The doubled argument is the same raw value read with one more integer bit
    let t = one_minus_x_over_one_plus_x_for_x_in_0_1(exp_on_negative_values(n, integer_bits + 1));
    if neg { t.wrapping_neg() } else { t }
}

/// Logistic sigmoid of one Q`integer_bits` raw value, in Q0.15.
pub fn logistic_raw(a: i16, integer_bits: u32) -> i16 {
    if a == 0 {
        return ONE_HALF;
    }
    let abs_input = if a > 0 { a } else { a.wrapping_neg() };
    let result_if_positive = one_over_one_plus_x_for_x_in_0_1(exp_on_negative_values(abs_input.wrapping_neg(), integer_bits));
    if a > 0 { result_if_positive } else { ONE_Q0.wrapping_sub(result_if_positive) }
}

fn map_batch(input: &[i16], n_batch: usize, n_input: usize, output: &mut [i16], f: impl Fn(i16) -> i16) {
    let n = n_batch * n_input;
    for (o, &x) in output[..n].iter_mut().zip(&input[..n]) { *o = f(x); }
}

/// tanh over Q`integer_bits` inputs; `integer_bits` must be at most
/// [`MAX_TANH_INTEGER_BITS`].
///
/// With fewer than 2 integer bits the Newton-Raphson reciprocal overshoots for
/// the smallest magnitudes, so a few raw inputs next to zero come out with the
/// wrong sign: `|a| <= 3` for 0 integer bits (`tanh(1) == -8`) and `|a| == 1`
/// for 1 integer bit (`tanh(1) == -4`). From 2 integer bits on the sign of the
/// output always follows the input.
pub fn apply_tanh(integer_bits: u32, input: &[i16], n_batch: usize, n_input: usize, output: &mut [i16]) {
    debug_assert!(integer_bits <= MAX_TANH_INTEGER_BITS, "tanh with {} integer bits", integer_bits);
    map_batch(input, n_batch, n_input, output, |x| tanh_raw(x, integer_bits));
}

/// tanh over Q3.12 inputs.
pub fn apply_tanh3(input: &[i16], n_batch: usize, n_input: usize, output: &mut [i16]) {
    apply_tanh(3, input, n_batch, n_input, output);
}

/// tanh over Q4.11 inputs.
pub fn apply_tanh4(input: &[i16], n_batch: usize, n_input: usize, output: &mut [i16]) {
    apply_tanh(4, input, n_batch, n_input, output);
}

/// Sigmoid over Q3.12 inputs.
pub fn apply_sigmoid(input: &[i16], n_batch: usize, n_input: usize, output: &mut [i16]) {
    map_batch(input, n_batch, n_input, output, |x| logistic_raw(x, 3));
}
