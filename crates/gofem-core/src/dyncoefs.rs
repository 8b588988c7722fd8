//! Newmark-family time-integration coefficients (§4.1).
//!
//! `DynCoefs` turns a chosen scheme's fixed parameters plus the current
//! Δt into the α₁…α₆, β₁, β₂ coefficients the Domain uses to build the
//! starred vectors (§4.2 `star_vars`) and every `AddToKb`/`AddToRhs`
//! implementation that carries an inertial or transient-diffusion term.
//! Named constructors (`theta`, `newmark`, `hht_alpha`) follow the
//! teacher's `NewmarkConfig::average_acceleration()`/`linear_acceleration()`
//! pattern rather than requiring callers to hand-compute β/γ/α_f/α_m.

use crate::error::{FemError, Result};

/// First-order (transient diffusion) scheme: implicit-θ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThetaScheme {
    pub theta: f64,
}

/// Second-order (transient dynamics) scheme: Newmark-β or HHT-α.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewmarkScheme {
    pub beta: f64,
    pub gamma: f64,
    /// HHT-α parameters; zero recovers plain Newmark-β.
    pub alpha_f: f64,
    pub alpha_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynCoefs {
    pub theta: ThetaScheme,
    pub newmark: NewmarkScheme,
    pub dt: f64,
    /// β₁, β₂: first-order coefficients (`psi* = β₁·Y + β₂·dYdt`).
    pub beta1: f64,
    pub beta2: f64,
    /// α₁…α₆: second-order coefficients (`zet*`, `chi*`).
    pub alpha1: f64,
    pub alpha2: f64,
    pub alpha3: f64,
    pub alpha4: f64,
    pub alpha5: f64,
    pub alpha6: f64,
}

impl DynCoefs {
    /// Implicit-θ scheme for first-order (diffusion-type) equations.
    /// θ ∈ (0,1]; θ=1 is backward Euler, θ=0.5 is Crank-Nicolson.
    pub fn theta(theta: f64) -> Self {
        Self {
            theta: ThetaScheme { theta },
            newmark: NewmarkScheme {
                beta: 0.25,
                gamma: 0.5,
                alpha_f: 0.0,
                alpha_m: 0.0,
            },
            dt: 0.0,
            beta1: 0.0,
            beta2: 0.0,
            alpha1: 0.0,
            alpha2: 0.0,
            alpha3: 0.0,
            alpha4: 0.0,
            alpha5: 0.0,
            alpha6: 0.0,
        }
    }

    /// Newmark-β scheme for second-order (dynamics-type) equations.
    /// `beta=0.25, gamma=0.5` is the unconditionally-stable average-
    /// acceleration variant; `beta=1.0/6.0` is linear-acceleration.
    pub fn newmark(beta: f64, gamma: f64) -> Self {
        Self {
            newmark: NewmarkScheme {
                beta,
                gamma,
                alpha_f: 0.0,
                alpha_m: 0.0,
            },
            ..Self::theta(1.0)
        }
    }

    /// HHT-α (generalized-α family member with `alpha_m = 0`).
    pub fn hht_alpha(alpha_f: f64) -> Self {
        let gamma = 0.5 + alpha_f;
        let beta = 0.25 * (gamma + 0.5).powi(2);
        Self {
            newmark: NewmarkScheme {
                beta,
                gamma,
                alpha_f,
                alpha_m: 0.0,
            },
            ..Self::theta(1.0)
        }
    }

    /// Recompute α₁…α₆, β₁, β₂ for the given Δt (§4.1 `CalcBoth`).
    /// Fails only if Δt ≤ 0 or a resulting coefficient is non-finite.
    pub fn calc_both(&mut self, dt: f64) -> Result<()> {
        if !(dt > 0.0) {
            return Err(FemError::InvalidTimeStep(dt));
        }
        self.dt = dt;

        let theta = self.theta.theta;
        self.beta1 = 1.0 / (theta * dt);
        self.beta2 = 1.0 - 1.0 / theta;

        let NewmarkScheme {
            beta,
            gamma,
            alpha_f,
            alpha_m,
        } = self.newmark;

        self.alpha1 = (1.0 - alpha_m) / (beta * dt * dt);
        self.alpha2 = (1.0 - alpha_m) / (beta * dt);
        self.alpha3 = (1.0 - alpha_m) / (2.0 * beta) - 1.0;
        self.alpha4 = (1.0 - alpha_f) * gamma / (beta * dt);
        self.alpha5 = (1.0 - alpha_f) * gamma / beta - 1.0;
        self.alpha6 = (1.0 - alpha_f) * (gamma / (2.0 * beta) - 1.0) * dt;

        let all = [
            self.beta1,
            self.beta2,
            self.alpha1,
            self.alpha2,
            self.alpha3,
            self.alpha4,
            self.alpha5,
            self.alpha6,
        ];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(FemError::NonFiniteCoefficient);
        }
        Ok(())
    }
}

impl Default for DynCoefs {
    fn default() -> Self {
        Self::newmark(0.25, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_dt() {
        let mut c = DynCoefs::default();
        assert!(matches!(c.calc_both(0.0), Err(FemError::InvalidTimeStep(_))));
        assert!(matches!(c.calc_both(-1.0), Err(FemError::InvalidTimeStep(_))));
    }

    #[test]
    fn theta_one_is_backward_euler_style() {
        let mut c = DynCoefs::theta(1.0);
        c.calc_both(0.5).unwrap();
        assert!((c.beta1 - 2.0).abs() < 1e-12);
        assert!((c.beta2 - 0.0).abs() < 1e-12);
    }

    #[test]
    fn newmark_average_acceleration_matches_known_values() {
        let mut c = DynCoefs::newmark(0.25, 0.5);
        c.calc_both(0.1).unwrap();
        // alpha1 = 1/(beta dt^2) = 1/(0.25*0.01) = 400
        assert!((c.alpha1 - 400.0).abs() < 1e-9);
        // alpha2 = 1/(beta dt) = 1/(0.025) = 40
        assert!((c.alpha2 - 40.0).abs() < 1e-9);
    }

    #[test]
    fn hht_alpha_zero_recovers_newmark_average_acceleration() {
        let mut c = DynCoefs::hht_alpha(0.0);
        assert!((c.newmark.beta - 0.25).abs() < 1e-12);
        assert!((c.newmark.gamma - 0.5).abs() < 1e-12);
        c.calc_both(0.2).unwrap();
        assert!(c.alpha1.is_finite());
    }
}
