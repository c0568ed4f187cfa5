//! Angle wrapping and the scalar Gaussian density shared by the motion and sensor models.
//!
//! Headings in this crate are never compared with raw subtraction. Any difference between two
//! angles that may straddle the ±π boundary goes through [`angle_difference`], which always
//! returns the short way around the circle.

use std::f64::consts::{PI, TAU};

/// Wrap an angle to the half-open range $(-\pi, \pi]$ radians
///
/// # Arguments
/// * `angle` - The angle in radians, of any magnitude.
/// # Returns
/// * The equivalent angle in $(-\pi, \pi]$. Note that $-\pi$ maps to $+\pi$.
/// # Example
/// ```rust
/// use beaconloc::angles::wrap_to_pi;
/// use std::f64::consts::PI;
/// let wrapped = wrap_to_pi(3.0 * PI / 2.0);
/// assert!((wrapped + PI / 2.0).abs() < 1e-12);
/// ```
pub fn wrap_to_pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}
/// Signed angular distance from `from` to `to`, in $(-\pi, \pi]$ radians
///
/// Headings which differ by whole turns compare as equal. A difference of exactly half a turn
/// is reported as $+\pi$.
///
/// # Example
/// ```rust
/// use beaconloc::angles::angle_difference;
/// use std::f64::consts::PI;
/// let d = angle_difference(0.1 + 2.0 * PI, 0.1);
/// assert!(d.abs() < 1e-12);
/// ```
pub fn angle_difference(from: f64, to: f64) -> f64 {
    wrap_to_pi(to - from)
}
/// Normal probability density of `x` for a distribution with mean `mu` and standard deviation `sigma`
///
/// $$
/// p(x) = \frac{1}{\sigma \sqrt{2 \pi}} \exp\left( -\frac{(x - \mu)^2}{2 \sigma^2} \right)
/// $$
///
/// The result is always non-negative; far tails underflow to exactly zero.
pub fn gauss(x: f64, mu: f64, sigma: f64) -> f64 {
    let normalized = (x - mu) / sigma;
    (-0.5 * normalized * normalized).exp() / (sigma * TAU.sqrt())
}
