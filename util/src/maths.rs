//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

use crate::raise_error;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value between `min` and `max` (hard limits).
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Saturate a value to the symmetric range `[-bound, bound]`.
pub fn saturate<T>(value: T, bound: T) -> T
where
    T: Float
{
    clamp(value, -bound.abs(), bound.abs())
}

/// Wrap an angle into the range (-pi, pi].
///
/// The angle is first reduced by the exact floating point remainder of 2pi,
/// so the cost does not depend on its magnitude, then shifted by at most one
/// turn. Non-finite angles are returned unchanged.
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    if !angle.is_finite() {
        return angle;
    }

    // |a| < 2pi from here on
    let mut a = angle % tau_t;

    if a > pi_t {
        a = a - tau_t;
    }
    else if a <= -pi_t {
        a = a + tau_t;
    }

    a
}

/// Approximate the integral of `f` over `[a, b]` using the composite midpoint
/// rule with `n` subintervals.
///
/// # Panics
/// - If `n` is zero or the interval has zero width. Both are precondition
///   violations and abort the process.
pub fn midpoint_rule<F>(f: F, a: f64, b: f64, n: usize) -> f64
where
    F: Fn(f64) -> f64
{
    if n == 0 {
        raise_error!("midpoint_rule: invalid number of subintervals n = {}", n);
    }
    if a == b {
        raise_error!("midpoint_rule: zero width interval a = b = {}", a);
    }

    let dx = (b - a) / n as f64;

    let sum: f64 = (0..n)
        .map(|i| f(a + (i as f64 + 0.5) * dx))
        .sum();

    sum * dx
}

/// Approximate the integral of `f` over `[a, b]` using the composite
/// trapezoidal rule with `n` subintervals.
///
/// A zero width interval integrates to zero.
///
/// # Panics
/// - If `n` is zero, this aborts the process.
pub fn trapezoidal_rule<F>(f: F, a: f64, b: f64, n: usize) -> f64
where
    F: Fn(f64) -> f64
{
    if n == 0 {
        raise_error!("trapezoidal_rule: invalid number of subintervals n = {}", n);
    }
    if a == b {
        return 0.0;
    }

    let h = (b - a) / n as f64;

    let mut sum = f(a) + f(b);
    for i in 1..n {
        sum += 2.0 * f(a + i as f64 * h);
    }

    0.5 * h * sum
}
