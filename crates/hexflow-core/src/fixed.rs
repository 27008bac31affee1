use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Every simulated duration, efficiency, boost and quality value is a
/// `Fixed64` so that two engines fed the same inputs stay bit-identical.
pub type Fixed64 = I32F32;

/// Ticks count discrete simulation steps.
pub type Ticks = u64;

/// Simulated time units. Timers accumulate these, not ticks.
pub type SimTime = Fixed64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Checked multiplication for Fixed64 that returns None on overflow.
#[inline]
pub fn checked_mul_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_mul(b)
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// `base / divisor`, or `None` when the divisor is not strictly positive.
///
/// Used for every "interval divided by speed factors" computation: a zero or
/// negative factor means the timer can never fire.
#[inline]
pub fn scaled_interval(base: Fixed64, divisor: Fixed64) -> Option<Fixed64> {
    if divisor <= Fixed64::ZERO {
        return None;
    }
    base.checked_div(divisor)
}

/// Floor a non-negative fixed value into a `u64`, saturating at zero.
#[inline]
pub fn floor_to_u64(v: Fixed64) -> u64 {
    v.to_num::<i64>().max(0) as u64
}

/// Exact decimal rendering of a Fixed64. Every Q32.32 value has a finite
/// decimal expansion, so parsing the result gives back the same bits.
pub fn fixed64_to_exact_string(v: Fixed64) -> String {
    const FRAC_MASK: u64 = 0xFFFF_FFFF;
    let bits = v.to_bits();
    let magnitude = bits.unsigned_abs();
    let mut out = String::new();
    if bits < 0 {
        out.push('-');
    }
    out.push_str(&(magnitude >> 32).to_string());
    let mut frac = magnitude & FRAC_MASK;
    if frac != 0 {
        out.push('.');
        while frac != 0 {
            frac *= 10;
            out.push(char::from(b'0' + (frac >> 32) as u8));
            frac &= FRAC_MASK;
        }
    }
    out
}
