//! Physical and numerical parameters consumed by the kernel stages.

use serde::{Deserialize, Serialize};

use crate::eos;
use crate::integrator::IntegratorScheme;
use crate::rheology::CarreauModel;
use crate::sph::SmoothingKernel;

/// Interface detection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceParams {
    /// Factor applied to `h` while estimating normals and curvature.
    pub h_scale: f64,
    /// Smoothed colour above which a particle may be an interface particle.
    pub band_low: f64,
    /// Smoothed colour below which a particle may be an interface particle.
    pub band_high: f64,
    /// Normal validity threshold, as a multiple of 1/h.
    pub normal_threshold: f64,
}

impl Default for InterfaceParams {
    fn default() -> Self {
        Self {
            h_scale: 0.8,
            band_low: 0.05,
            band_high: 0.95,
            normal_threshold: 0.01,
        }
    }
}

impl InterfaceParams {
    /// Whether a smoothed colour lies strictly inside the interface band.
    #[inline]
    pub fn is_interface(&self, scolor: f64) -> bool {
        scolor > self.band_low && scolor < self.band_high
    }
}

/// Contact-angle adhesion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdhesionParams {
    /// Adhesion strength multiplier.
    pub alpha: f64,
    /// Band thickness as a multiple of `h`.
    pub delta: f64,
}

impl Default for AdhesionParams {
    fn default() -> Self {
        Self {
            alpha: 15.0,
            delta: 1.5,
        }
    }
}

/// Short-range wall repulsion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepulsionParams {
    /// Stiffness k (m/s^2).
    pub stiffness: f64,
    /// Profile exponent n.
    pub exponent: f64,
    /// Cutoff distance r0 (m). `None` means half the smoothing length.
    pub cutoff: Option<f64>,
}

impl Default for RepulsionParams {
    fn default() -> Self {
        Self {
            stiffness: 5000.0,
            exponent: 2.0,
            cutoff: None,
        }
    }
}

impl RepulsionParams {
    /// Effective cutoff for smoothing length `h`.
    #[inline]
    pub fn cutoff_for(&self, h: f64) -> f64 {
        self.cutoff.unwrap_or(0.5 * h)
    }
}

/// Monaghan artificial stress settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtificialStressParams {
    /// Stress fraction epsilon.
    pub epsilon: f64,
    /// Exponent applied to W(r)/W(dx).
    pub exponent: i32,
}

impl Default for ArtificialStressParams {
    fn default() -> Self {
        Self {
            epsilon: 0.2,
            exponent: 4,
        }
    }
}

/// Rotation of interface normals near a wall toward the contact-angle
/// direction before the curvature is estimated. Off by default; the adhesion
/// force alone imposes the angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallNormalCorrection {
    /// Apply the correction.
    pub enabled: bool,
    /// Blending band thickness as a multiple of `h`.
    pub delta: f64,
}

impl Default for WallNormalCorrection {
    fn default() -> Self {
        Self {
            enabled: false,
            delta: 2.0,
        }
    }
}

/// Everything the kernel needs to advance one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphParams {
    /// Reference density (kg/m^3).
    pub rho0: f64,
    /// Artificial speed of sound (m/s).
    pub c0: f64,
    /// EOS exponent b.
    pub eos_exponent: f64,
    /// Gravity (m/s^2).
    pub gravity: [f64; 2],
    /// Surface tension coefficient (N/m).
    pub sigma: f64,
    /// Newtonian kinematic viscosity (m^2/s).
    pub nu: f64,
    /// Initial particle spacing (m).
    pub dx: f64,
    /// Smoothing length (m).
    pub h: f64,
    /// Smoothing kernel.
    pub kernel: SmoothingKernel,
    /// Interface detection.
    pub interface: InterfaceParams,
    /// Wall adhesion.
    pub adhesion: AdhesionParams,
    /// Wall repulsion.
    pub repulsion: RepulsionParams,
    /// Artificial stress.
    pub artificial_stress: ArtificialStressParams,
    /// Contact-angle rotation of near-wall interface normals.
    pub wall_normal_correction: WallNormalCorrection,
    /// Shear-thinning model; `None` keeps the viscosity Newtonian.
    pub carreau: Option<CarreauModel>,
    /// Time integration scheme.
    pub scheme: IntegratorScheme,
}

impl SphParams {
    /// Background pressure p0 = rho0 c0^2.
    pub fn background_pressure(&self) -> f64 {
        eos::background_pressure(self.rho0, self.c0)
    }

    /// Viscosity used for the time-step bound: the zero-shear value when
    /// Carreau rheology is active, the Newtonian value otherwise.
    pub fn effective_nu(&self) -> f64 {
        match &self.carreau {
            Some(model) => model.eta0 / self.rho0,
            None => self.nu,
        }
    }

    /// Particle mass rho0 dx^2.
    pub fn particle_mass(&self) -> f64 {
        self.rho0 * self.dx * self.dx
    }
}

impl Default for SphParams {
    fn default() -> Self {
        let dx = 1.0e-5;
        Self {
            rho0: 3000.0,
            c0: 10.0,
            eos_exponent: eos::DEFAULT_EOS_EXPONENT,
            gravity: [0.0, -9.81],
            sigma: 0.04,
            nu: 5.0e-4,
            dx,
            h: 1.3 * dx,
            kernel: SmoothingKernel::default(),
            interface: InterfaceParams::default(),
            adhesion: AdhesionParams::default(),
            repulsion: RepulsionParams::default(),
            artificial_stress: ArtificialStressParams::default(),
            wall_normal_correction: WallNormalCorrection::default(),
            carreau: None,
            scheme: IntegratorScheme::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_band_is_open() {
        let p = InterfaceParams::default();
        assert!(p.is_interface(0.5));
        assert!(!p.is_interface(0.05));
        assert!(!p.is_interface(0.95));
        assert!(!p.is_interface(1.0));
    }

    #[test]
    fn effective_viscosity_uses_zero_shear_value() {
        let mut params = SphParams::default();
        assert_eq!(params.effective_nu(), 5.0e-4);
        params.carreau = Some(CarreauModel::default());
        assert!((params.effective_nu() - 0.5 / 3000.0).abs() < 1.0e-15);
    }

    #[test]
    fn repulsion_cutoff_defaults_to_half_h() {
        let r = RepulsionParams::default();
        assert_eq!(r.cutoff_for(2.0), 1.0);
        let fixed = RepulsionParams {
            cutoff: Some(0.3),
            ..r
        };
        assert_eq!(fixed.cutoff_for(2.0), 0.3);
    }
}
