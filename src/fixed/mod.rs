//! 16.16 signed fixed-point arithmetic.
//!
//! Everything that crosses a module boundary (clip-space positions, screen
//! coordinates, depth, varyings) is a plain `i32` holding a 16.16 value.
//! Multiplication and division widen to `i64` so intermediate products never
//! overflow; setup code that needs more headroom (plane equations) widens to
//! `i128` locally.

use glam::Vec4;

pub type Fixed = i32;

pub const FIX_SHIFT: u32 = 16;
pub const FIX_ONE: Fixed = 1 << FIX_SHIFT;
pub const FIX_HALF: Fixed = 1 << (FIX_SHIFT - 1);
pub const FIX_MASK: Fixed = FIX_ONE - 1;

/// Sub-pixel bits kept when snapping screen coordinates for edge evaluation.
pub const SUBPIXEL_BITS: u32 = 8;
pub const SUBPIXEL_ONE: i64 = 1 << SUBPIXEL_BITS;
pub const SUBPIXEL_HALF: i64 = SUBPIXEL_ONE / 2;

#[inline(always)]
pub const fn from_int(v: i32) -> Fixed {
    v << FIX_SHIFT
}

#[inline]
pub fn from_f32(v: f32) -> Fixed {
    (v * FIX_ONE as f32).round() as Fixed
}

#[inline]
pub fn from_f64(v: f64) -> Fixed {
    (v * FIX_ONE as f64).round() as Fixed
}

#[inline]
pub fn to_f32(v: Fixed) -> f32 {
    v as f32 / FIX_ONE as f32
}

#[inline]
pub fn to_f64(v: Fixed) -> f64 {
    v as f64 / FIX_ONE as f64
}

/// Convert a float clip-space position to 16.16 `[x, y, z, w]`.
#[inline]
pub fn from_vec4(v: Vec4) -> [Fixed; 4] {
    [from_f32(v.x), from_f32(v.y), from_f32(v.z), from_f32(v.w)]
}

/// 16.16 multiply.
#[inline(always)]
pub fn fixmul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FIX_SHIFT) as Fixed
}

/// 16.16 divide. `b` must be non-zero.
#[inline(always)]
pub fn fixdiv(a: Fixed, b: Fixed) -> Fixed {
    debug_assert!(b != 0, "fixdiv by zero");
    (((a as i64) << FIX_SHIFT) / b as i64) as Fixed
}

/// 16.16 reciprocal. `v` must be non-zero.
#[inline(always)]
pub fn invert(v: Fixed) -> Fixed {
    debug_assert!(v != 0, "invert of zero");
    ((1i64 << (2 * FIX_SHIFT)) / v as i64) as Fixed
}

/// Smallest integer not below the 16.16 value.
#[inline(always)]
pub fn ceil_int(v: Fixed) -> i32 {
    (v + FIX_MASK) >> FIX_SHIFT
}

/// Largest integer not above the 16.16 value.
#[inline(always)]
pub fn floor_int(v: Fixed) -> i32 {
    v >> FIX_SHIFT
}

/// Snap a 16.16 coordinate to 24.8 (round to nearest).
#[inline(always)]
pub fn snap_subpixel(v: Fixed) -> i64 {
    let shift = FIX_SHIFT - SUBPIXEL_BITS;
    ((v as i64) + (1 << (shift - 1))) >> shift
}

/// Per-step increment that walks from `from` to `to` in `steps` steps.
#[inline(always)]
pub fn interp_step(from: Fixed, to: Fixed, steps: u32) -> Fixed {
    if steps == 0 {
        0
    } else {
        ((to as i64 - from as i64) / steps as i64) as Fixed
    }
}

/// `a + (b - a) * t` with `t` in 16.16, evaluated in 64 bits.
#[inline(always)]
pub fn lerp(a: Fixed, b: Fixed, t: Fixed) -> Fixed {
    (a as i64 + (((b as i64 - a as i64) * t as i64) >> FIX_SHIFT)) as Fixed
}

/// Floor division for a positive divisor.
#[inline(always)]
pub fn div_floor(n: i64, d: i64) -> i64 {
    debug_assert!(d > 0);
    n.div_euclid(d)
}

/// Ceiling division for a positive divisor.
#[inline(always)]
pub fn div_ceil(n: i64, d: i64) -> i64 {
    debug_assert!(d > 0);
    -(-n).div_euclid(d)
}
