//! SPH smoothing kernels in 2D.
//!
//! Two kernels are available: the Wendland C2 kernel (support 2h), free of
//! pairing artifacts, and the Morris quintic spline (support 3h), which gives
//! smoother colour gradients at the price of more neighbors.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Normalization constant for the 2D Wendland C2 kernel: 7 / (4 * pi).
const WENDLAND_C2_NORM_2D: f64 = 7.0 / (4.0 * PI);

/// Normalization constant for the 2D quintic spline: 7 / (478 * pi).
const QUINTIC_NORM_2D: f64 = 7.0 / (478.0 * PI);

/// Separation below which two particles are treated as coincident and the
/// kernel gradient is zero.
const COINCIDENT_EPS: f64 = 1.0e-15;

/// Wendland C2 smoothing kernel in 2D.
///
/// ```text
/// W(r, h) = (7 / (4 pi h^2)) * (1 - q/2)^4 * (1 + 2q)   for q = r/h < 2
/// W(r, h) = 0                                             otherwise
/// ```
pub fn wendland_c2(r: f64, h: f64) -> f64 {
    let q = r / h;
    if q >= 2.0 {
        return 0.0;
    }
    let t = 1.0 - 0.5 * q;
    let t2 = t * t;
    WENDLAND_C2_NORM_2D / (h * h) * t2 * t2 * (1.0 + 2.0 * q)
}

/// Radial derivative dW/dr of the 2D Wendland C2 kernel.
///
/// ```text
/// dW/dr = (7 / (4 pi h^3)) * (-5 q) * (1 - q/2)^3
/// ```
pub fn wendland_c2_derivative(r: f64, h: f64) -> f64 {
    let q = r / h;
    if q >= 2.0 {
        return 0.0;
    }
    let t = 1.0 - 0.5 * q;
    WENDLAND_C2_NORM_2D / (h * h * h) * (-5.0 * q) * t * t * t
}

/// Quintic spline smoothing kernel in 2D.
///
/// ```text
/// W(r, h) = (7 / (478 pi h^2)) * [ (3-q)^5 - 6 (2-q)^5 + 15 (1-q)^5 ]
/// ```
/// where each bracketed term only contributes while its base is positive.
pub fn quintic_spline(r: f64, h: f64) -> f64 {
    let q = r / h;
    if q >= 3.0 {
        return 0.0;
    }
    let t3 = 3.0 - q;
    let mut w = t3.powi(5);
    if q < 2.0 {
        w -= 6.0 * (2.0 - q).powi(5);
    }
    if q < 1.0 {
        w += 15.0 * (1.0 - q).powi(5);
    }
    QUINTIC_NORM_2D / (h * h) * w
}

/// Radial derivative dW/dr of the 2D quintic spline.
pub fn quintic_spline_derivative(r: f64, h: f64) -> f64 {
    let q = r / h;
    if q >= 3.0 {
        return 0.0;
    }
    let mut dw = -5.0 * (3.0 - q).powi(4);
    if q < 2.0 {
        dw += 30.0 * (2.0 - q).powi(4);
    }
    if q < 1.0 {
        dw -= 75.0 * (1.0 - q).powi(4);
    }
    QUINTIC_NORM_2D / (h * h * h) * dw
}

/// Choice of smoothing kernel, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingKernel {
    /// Morris quintic spline, support 3h.
    #[default]
    QuinticSpline,
    /// Wendland C2, support 2h.
    WendlandC2,
}

impl SmoothingKernel {
    /// Radius beyond which the kernel vanishes.
    #[inline]
    pub fn support_radius(self, h: f64) -> f64 {
        match self {
            Self::QuinticSpline => 3.0 * h,
            Self::WendlandC2 => 2.0 * h,
        }
    }

    /// Kernel value W(r, h).
    #[inline]
    pub fn weight(self, r: f64, h: f64) -> f64 {
        match self {
            Self::QuinticSpline => quintic_spline(r, h),
            Self::WendlandC2 => wendland_c2(r, h),
        }
    }

    /// Kernel gradient with respect to the position of particle i.
    ///
    /// `(dx, dy)` is the displacement x_i - x_j and `r` its length. Returns
    /// zero for coincident particles.
    #[inline]
    pub fn gradient(self, dx: f64, dy: f64, r: f64, h: f64) -> (f64, f64) {
        if r < COINCIDENT_EPS {
            return (0.0, 0.0);
        }
        let dw_dr = match self {
            Self::QuinticSpline => quintic_spline_derivative(r, h),
            Self::WendlandC2 => wendland_c2_derivative(r, h),
        };
        let f = dw_dr / r;
        (f * dx, f * dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Integrate W over the plane on a fine lattice.
    fn lattice_integral(kernel: SmoothingKernel, h: f64) -> f64 {
        let spacing = h / 40.0;
        let extent = kernel.support_radius(h);
        let n = (extent / spacing).ceil() as i64 + 1;
        let mut sum = 0.0;
        for i in -n..=n {
            for j in -n..=n {
                let x = i as f64 * spacing;
                let y = j as f64 * spacing;
                sum += kernel.weight((x * x + y * y).sqrt(), h);
            }
        }
        sum * spacing * spacing
    }

    #[test]
    fn kernels_are_normalised() {
        for kernel in [SmoothingKernel::WendlandC2, SmoothingKernel::QuinticSpline] {
            let integral = lattice_integral(kernel, 1.3e-5);
            assert!(
                (integral - 1.0).abs() < 1.0e-3,
                "{kernel:?} should integrate to 1, got {integral}"
            );
        }
    }

    #[test]
    fn kernels_vanish_outside_support() {
        let h = 1.0;
        assert_eq!(wendland_c2(2.0, h), 0.0);
        assert_eq!(wendland_c2(2.5, h), 0.0);
        assert_eq!(quintic_spline(3.0, h), 0.0);
        assert_eq!(quintic_spline_derivative(3.1, h), 0.0);
        assert!(quintic_spline(2.9, h) > 0.0);
    }

    #[test]
    fn kernels_are_monotone_decreasing() {
        for kernel in [SmoothingKernel::WendlandC2, SmoothingKernel::QuinticSpline] {
            let h = 1.0;
            let mut prev = kernel.weight(0.0, h);
            let steps = 100;
            for k in 1..=steps {
                let r = kernel.support_radius(h) * k as f64 / steps as f64;
                let w = kernel.weight(r, h);
                assert!(w <= prev, "{kernel:?} increases at r={r}");
                prev = w;
            }
        }
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let h = 1.0;
        let eps = 1.0e-6;
        for kernel in [SmoothingKernel::WendlandC2, SmoothingKernel::QuinticSpline] {
            for &r in &[0.3, 0.9, 1.4, 1.9] {
                let fd = (kernel.weight(r + eps, h) - kernel.weight(r - eps, h)) / (2.0 * eps);
                let (gx, _) = kernel.gradient(r, 0.0, r, h);
                assert!(
                    (fd - gx).abs() < 1.0e-6 * fd.abs().max(1.0),
                    "{kernel:?} dW/dr mismatch at r={r}: analytic {gx}, fd {fd}"
                );
            }
        }
    }

    #[test]
    fn gradient_points_toward_neighbor() {
        // x_i - x_j along +x: W decreases with r, so the gradient points along -x.
        let (gx, gy) = SmoothingKernel::WendlandC2.gradient(0.5, 0.0, 0.5, 1.0);
        assert!(gx < 0.0);
        assert_eq!(gy, 0.0);
        assert_eq!(SmoothingKernel::QuinticSpline.gradient(0.0, 0.0, 0.0, 1.0), (0.0, 0.0));
    }
}
