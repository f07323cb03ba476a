//! # Tabulated Fixed-Point Math
//!
//! `ln_fp`, `exp_fp`, `pow_fp`: the three transcendental functions the
//! scoring, retargeting, and acceptance pipelines need, implemented as
//! integer fixed-point with a pinned lookup table rather than floats.
//!
//! Every quantity here is scaled by [`FP_SCALE`]; a plain integer `v`
//! represents the rational `v / FP_SCALE`. The lookup table below is a
//! consensus artifact: changing it changes every score the network has
//! ever computed, so it is versioned and its hash belongs in `Policy`
//! (see `animica_consensus::domain::policy::Policy::table_hash`).
//!
//! Rounding mode throughout: round-to-nearest, ties-to-even.

use primitive_types::U256;

/// Fixed-point scale: one unit of `FP_SCALE` represents `1.0`.
pub const FP_SCALE: u64 = 1_000_000;

/// `ln(2)`, scaled by [`FP_SCALE`].
pub const LN2_FP: i64 = 693_147;

/// `ln(1 + k/64)` for `k` in `0..=64`, scaled by [`FP_SCALE`].
///
/// Generated once and pinned; values are monotonically non-decreasing in
/// `k`, which `ln_mantissa_fp` relies on for its interpolation to stay
/// monotone.
const LN_MANTISSA_TABLE: [u32; 65] = [
    0, 15504, 30772, 45810, 60625, 75223, 89612, 103797, 117783, 131576, 145182, 158605, 171850,
    184922, 197826, 210565, 223144, 235566, 247836, 259956, 271933, 283768, 295465, 307028,
    318461, 329766, 340946, 352006, 362946, 373771, 384483, 395084, 405577, 415964, 426247,
    436429, 446511, 456496, 466386, 476183, 485888, 495503, 505031, 514473, 523832, 533108,
    542303, 551420, 560460, 569424, 578314, 587132, 595879, 604556, 613165, 621707, 630184,
    638596, 646945, 655231, 663457, 671624, 679731, 687782, 695776,
];

/// `exp(k/64 * ln2)` for `k` in `0..=64`, scaled by [`FP_SCALE`]; used as
/// the interpolation anchors for `exp_fp`'s fractional part.
const EXP_MANTISSA_TABLE: [u64; 65] = [
    1_000_000, 1_010_889, 1_021_897, 1_033_024, 1_044_274, 1_055_645, 1_067_140, 1_078_761,
    1_090_508, 1_102_383, 1_114_387, 1_126_522, 1_138_789, 1_151_189, 1_163_725, 1_176_397,
    1_189_207, 1_202_156, 1_215_247, 1_228_480, 1_241_858, 1_255_381, 1_269_052, 1_282_872,
    1_296_840, 1_310_962, 1_325_237, 1_339_667, 1_354_254, 1_369_000, 1_383_906, 1_398_974,
    1_414_206, 1_429_602, 1_445_165, 1_460_897, 1_476_798, 1_492_871, 1_509_117, 1_525_539,
    1_542_138, 1_558_914, 1_575_871, 1_593_011, 1_610_334, 1_627_843, 1_645_540, 1_663_426,
    1_681_504, 1_699_776, 1_718_243, 1_736_908, 1_755_772, 1_774_838, 1_794_107, 1_813_582,
    1_833_265, 1_853_158, 1_873_262, 1_893_581, 1_914_115, 1_934_868, 1_955_843, 1_977_040,
    2_000_000,
];

/// Round-to-nearest, ties-to-even division of `numerator` by `denominator`.
fn round_half_even(numerator: i128, denominator: i128) -> i64 {
    debug_assert!(denominator > 0);
    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);
    let twice = remainder * 2;
    let rounded = if twice > denominator {
        quotient + 1
    } else if twice < denominator {
        quotient
    } else if quotient % 2 == 0 {
        quotient
    } else {
        quotient + 1
    };
    rounded as i64
}

/// `ln` of a mantissa in `[FP_SCALE, 2*FP_SCALE)`, via table lookup with
/// linear interpolation between the 64 fixed buckets.
fn ln_mantissa_fp(mantissa: u64) -> i64 {
    debug_assert!((FP_SCALE..2 * FP_SCALE).contains(&mantissa));
    let offset = mantissa - FP_SCALE; // in [0, FP_SCALE)
    let scaled = offset as u128 * 64;
    let idx = (scaled / FP_SCALE as u128) as usize; // 0..64
    let rem = scaled % FP_SCALE as u128; // in [0, FP_SCALE)

    let lo = LN_MANTISSA_TABLE[idx] as i64;
    let hi = LN_MANTISSA_TABLE[(idx + 1).min(64)] as i64;
    let interpolated = lo as i128 * (FP_SCALE as i128 - rem as i128) + hi as i128 * rem as i128;
    round_half_even(interpolated, FP_SCALE as i128)
}

/// Natural log of `x / FP_SCALE`, returned scaled by `FP_SCALE`.
///
/// `x` must be strictly positive. `ln_fp(FP_SCALE) == 0`.
pub fn ln_fp(x: u64) -> i64 {
    assert!(x > 0, "ln_fp is undefined at zero");
    ln_fp_u256(U256::from(x)) - ln_fp_u256(U256::from(FP_SCALE))
}

/// Natural log of an arbitrary-width positive integer `x` (not pre-divided
/// by `FP_SCALE`), returned scaled by `FP_SCALE`.
///
/// Used directly by the u-draw, where `x = N + 1` ranges over `[1, 2^256]`
/// and a `u64` mantissa would overflow long before the exponent does.
pub fn ln_fp_u256(x: U256) -> i64 {
    assert!(!x.is_zero(), "ln_fp_u256 is undefined at zero");

    let bit_len = x.bits() as i64; // 1..=256
    let leading_bit = bit_len - 1; // floor(log2(x))

    // Normalize the top 24 bits of `x` into a `[FP_SCALE, 2*FP_SCALE)`
    // mantissa so the lookup table (built for that range) applies.
    let mantissa_raw: u64 = if bit_len > 24 {
        (x >> (bit_len - 24)).low_u64()
    } else {
        (x << (24 - bit_len)).low_u64()
    };
    // mantissa_raw is now in [2^23, 2^24); rescale to [FP_SCALE, 2*FP_SCALE).
    let mantissa = round_half_even(mantissa_raw as i128 * FP_SCALE as i128, 1i128 << 23) as u64;
    let mantissa = mantissa.clamp(FP_SCALE, 2 * FP_SCALE - 1);

    leading_bit * LN2_FP + ln_mantissa_fp(mantissa)
}

/// `exp` of `x / FP_SCALE`, returned scaled by `FP_SCALE`. `x` may be
/// negative (represented as `i64`); the result saturates at `u64::MAX`
/// rather than overflow for very large `x`.
pub fn exp_fp(x: i64) -> u64 {
    if x == 0 {
        return FP_SCALE;
    }

    let negative = x < 0;
    let magnitude = x.unsigned_abs() as i128;

    // Range-reduce: magnitude = n * LN2_FP + r, r in [0, LN2_FP).
    let n = magnitude / LN2_FP as i128;
    let r = magnitude % LN2_FP as i128;

    // Interpolate exp(r / LN2_FP * ln2) against the 64-bucket table.
    let scaled = r * 64;
    let idx = (scaled / LN2_FP as i128) as usize;
    let idx = idx.min(63);
    let rem = scaled - idx as i128 * LN2_FP as i128;

    let lo = EXP_MANTISSA_TABLE[idx] as i128;
    let hi = EXP_MANTISSA_TABLE[idx + 1] as i128;
    let interpolated = lo * (LN2_FP as i128 - rem) + hi * rem;
    let exp_r = round_half_even(interpolated, LN2_FP as i128) as u128;

    // Multiply (or divide, if negative) by 2^n.
    let shifted = if n >= 64 {
        // 2^64 already overflows u64 arithmetic at FP_SCALE; saturate.
        return if negative { 0 } else { u64::MAX };
    } else {
        exp_r << n
    };

    let result = shifted / FP_SCALE as u128;
    if negative {
        if result == 0 {
            0
        } else {
            ((FP_SCALE as u128 * FP_SCALE as u128) / result) as u64
        }
    } else {
        result.min(u64::MAX as u128) as u64
    }
}

/// `ln(2^exponent)`, scaled by [`FP_SCALE`] — i.e. `exponent * ln(2)`.
///
/// Used by the u-draw, whose domain is `2^256`, a value too large to
/// construct as a [`U256`] directly (it overflows by one bit).
pub fn ln_fp_pow2(exponent: u32) -> i64 {
    exponent as i64 * LN2_FP
}

/// `a * (b_fp / FP_SCALE)`, i.e. multiply a plain integer by a fixed-point
/// fraction, saturating at `u64::MAX` rather than overflowing.
///
/// Unlike [`pow_fp`]/[`ln_fp`], `a` need not itself be fixed-point scaled —
/// this is the general "apply a fixed-point multiplier" operation the
/// scoring and fairness-tuning pipelines share.
pub fn mul_fp(a: u64, b_fp: u64) -> u64 {
    let product = a as u128 * b_fp as u128;
    (product / FP_SCALE as u128).min(u64::MAX as u128) as u64
}

/// `base^exponent` where `exponent` is a fixed-point rational in
/// `(0, FP_SCALE]` (a sublinear curve, e.g. `sigma` in the storage score),
/// computed as `exp_fp(exponent * ln_fp(base) / FP_SCALE)`.
pub fn pow_fp(base: u64, exponent: u64) -> u64 {
    if base == 0 {
        return 0;
    }
    let ln_base = ln_fp(base);
    let scaled = ln_base as i128 * exponent as i128;
    let ln_result = round_half_even(scaled, FP_SCALE as i128);
    exp_fp(ln_result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ln_fp_of_one_is_zero() {
        assert_eq!(ln_fp(FP_SCALE), 0);
    }

    #[test]
    fn ln_fp_is_monotone_increasing() {
        let a = ln_fp(FP_SCALE);
        let b = ln_fp(2 * FP_SCALE);
        let c = ln_fp(4 * FP_SCALE);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn ln_fp_of_two_matches_ln2_within_table_precision() {
        let computed = ln_fp(2 * FP_SCALE);
        assert!((computed - LN2_FP).abs() < 200);
    }

    #[test]
    fn exp_fp_of_zero_is_one() {
        assert_eq!(exp_fp(0), FP_SCALE);
    }

    #[test]
    fn exp_fp_is_monotone_increasing() {
        let a = exp_fp(-(FP_SCALE as i64));
        let b = exp_fp(0);
        let c = exp_fp(FP_SCALE as i64);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn exp_ln_roundtrip_is_approximately_identity() {
        let x = 5 * FP_SCALE;
        let roundtrip = exp_fp(ln_fp(x));
        let diff = (roundtrip as i64 - x as i64).abs();
        assert!(diff < (x as i64) / 1000, "roundtrip drifted too far: {roundtrip} vs {x}");
    }

    #[test]
    fn ln_fp_u256_handles_very_large_values() {
        let near_max = U256::MAX;
        let result = ln_fp_u256(near_max);
        // ln(2^256) ~= 256 * ln(2)
        let expected = 256 * LN2_FP;
        assert!((result - expected).abs() < 10_000);
    }

    #[test]
    fn pow_fp_sublinear_exponent_is_bounded_by_linear() {
        let base = 1_000 * FP_SCALE;
        let half = FP_SCALE / 2;
        let sqrt_ish = pow_fp(base, half);
        assert!(sqrt_ish < base);
        assert!(sqrt_ish > 0);
    }

    #[test]
    fn ln_fp_pow2_matches_repeated_doubling() {
        let direct = ln_fp_pow2(256);
        assert_eq!(direct, 256 * LN2_FP);
        assert!(direct > 0);
    }

    #[test]
    fn mul_fp_identity_at_fp_scale() {
        assert_eq!(mul_fp(42, FP_SCALE), 42);
    }

    #[test]
    fn mul_fp_applies_fraction() {
        assert_eq!(mul_fp(100, FP_SCALE / 2), 50);
    }

    #[test]
    fn mul_fp_saturates_instead_of_overflowing() {
        assert_eq!(mul_fp(u64::MAX, FP_SCALE * 2), u64::MAX);
    }

    #[test]
    fn round_half_even_ties_to_even() {
        assert_eq!(round_half_even(5, 2), 2); // 2.5 -> 2 (even)
        assert_eq!(round_half_even(7, 2), 4); // 3.5 -> 4 (even)
        assert_eq!(round_half_even(1, 2), 0); // 0.5 -> 0 (even)
    }
}
