//! Equation of state for the weakly-compressible fluid.
//!
//! Both phases share one stiffened-gas relation so the interface carries no
//! pressure jump from the EOS itself. All units are SI.

/// Default EOS exponent. `b = 1` makes the relation linear in density.
pub const DEFAULT_EOS_EXPONENT: f64 = 1.0;

/// Smallest density ratio the inverse EOS will return.
const MIN_DENSITY_RATIO: f64 = 1.0e-3;

/// Background pressure p0 = rho0 * c0^2 (Pa).
pub fn background_pressure(rest_density: f64, speed_of_sound: f64) -> f64 {
    rest_density * speed_of_sound * speed_of_sound
}

/// Stiffened equation of state.
///
/// ```text
/// p = p0 * ((rho / rho0)^b - 1)
/// ```
///
/// Negative (tensile) pressure is allowed when `density < rest_density`.
pub fn stiffened_eos(density: f64, rest_density: f64, p0: f64, exponent: f64) -> f64 {
    let ratio = density / rest_density;
    if exponent == 1.0 {
        p0 * (ratio - 1.0)
    } else {
        p0 * (ratio.powf(exponent) - 1.0)
    }
}

/// Inverse of [`stiffened_eos`]: the density that yields pressure `p`.
///
/// ```text
/// rho = rho0 * (p / p0 + 1)^(1/b)
/// ```
///
/// The ratio is floored at a small positive value so solid particles never
/// end up with zero volume under strong tension.
pub fn inverse_stiffened_eos(p: f64, rest_density: f64, p0: f64, exponent: f64) -> f64 {
    let base = (p / p0 + 1.0).max(MIN_DENSITY_RATIO);
    if exponent == 1.0 {
        rest_density * base
    } else {
        rest_density * base.powf(1.0 / exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RHO0: f64 = 3000.0;
    const C0: f64 = 10.0;

    #[test]
    fn pressure_at_rest_density_is_zero() {
        let p0 = background_pressure(RHO0, C0);
        assert_eq!(p0, 300_000.0);
        let p = stiffened_eos(RHO0, RHO0, p0, DEFAULT_EOS_EXPONENT);
        assert!(p.abs() < 1.0e-9, "pressure at rest density should be 0, got {p}");
    }

    #[test]
    fn compression_and_expansion_signs() {
        let p0 = background_pressure(RHO0, C0);
        assert!(stiffened_eos(3030.0, RHO0, p0, 1.0) > 0.0);
        assert!(stiffened_eos(2970.0, RHO0, p0, 1.0) < 0.0);
        assert!(stiffened_eos(3030.0, RHO0, p0, 7.0) > 0.0);
    }

    #[test]
    fn linear_eos_slope_is_c0_squared() {
        let p0 = background_pressure(RHO0, C0);
        let p = stiffened_eos(RHO0 + 3.0, RHO0, p0, 1.0);
        assert!((p - 3.0 * C0 * C0).abs() < 1.0e-9, "got {p}");
    }

    #[test]
    fn inverse_recovers_density() {
        let p0 = background_pressure(RHO0, C0);
        for &b in &[1.0, 7.0] {
            for &rho in &[2950.0, 3000.0, 3100.0] {
                let p = stiffened_eos(rho, RHO0, p0, b);
                let back = inverse_stiffened_eos(p, RHO0, p0, b);
                assert!((back - rho).abs() < 1.0e-9 * rho, "b={b}: {rho} -> {back}");
            }
        }
    }

    #[test]
    fn inverse_is_floored_under_extreme_tension() {
        let p0 = background_pressure(RHO0, C0);
        let rho = inverse_stiffened_eos(-2.0 * p0, RHO0, p0, 1.0);
        assert!(rho > 0.0);
    }
}
