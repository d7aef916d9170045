/// Floating point type used throughout system
pub type Real = f64;

/// NaN and +/-Inf become 0; finite values pass through.
#[inline]
pub fn finite_or_zero(v: Real) -> Real {
    if v.is_finite() { v } else { 0.0 }
}
