//! Constitutive model boundary (§1, "constitutive model libraries ...
//! are external collaborators"). As with the shape-function kit, this
//! module owns the trait boundary plus one reference model per physics
//! (`LinearElastic` for `ElemU`, `SaturatedPorous` for `ElemP`) so the
//! two representative elements are fully exercisable; a production
//! deployment swaps in a fuller plasticity/retention-curve library
//! behind the same traits.

use nalgebra::DMatrix;

use crate::error::Result;

/// Per-integration-point state for a solid element: stress, strain, and
/// whatever scalar internal (hardening) variables the model needs
/// (§3, "Element internal state").
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolidIpState {
    /// Voigt-ordered stress: `[sx, sy, sz, sxy]` (2D) or
    /// `[sx, sy, sz, sxy, syz, szx]` (3D).
    pub stress: Vec<f64>,
    pub strain: Vec<f64>,
    pub internal: Vec<f64>,
}

/// Consistent tangent `D = ∂σ/∂ε` plus the stress-update contract every
/// solid constitutive model implements (§4.4, "the constitutive state at
/// idx").
pub trait SolidModel: Send + Sync {
    /// Number of Voigt stress/strain components (4 in 2D, 6 in 3D).
    fn nstress(&self) -> usize;

    /// Consistent tangent at the current state. For a linear-elastic
    /// model this is constant; nonlinear models would read `state`.
    fn tangent(&self, state: &SolidIpState) -> DMatrix<f64>;

    /// Advance `state` given the Voigt strain increment `deps`, writing
    /// the new stress/internal variables in place.
    fn update(&self, state: &mut SolidIpState, deps: &[f64]) -> Result<()>;

    fn zero_state(&self) -> SolidIpState {
        SolidIpState {
            stress: vec![0.0; self.nstress()],
            strain: vec![0.0; self.nstress()],
            internal: Vec::new(),
        }
    }
}

/// Isotropic linear elasticity, plane-strain/plane-stress/3D (§4.4,
/// "Initial-state setup"; reference model grounding `ElemU` tests).
#[derive(Debug, Clone, Copy)]
pub struct LinearElastic {
    pub young: f64,
    pub poisson: f64,
    pub plane_stress: bool,
    pub three_d: bool,
}

impl LinearElastic {
    pub fn plane_strain(young: f64, poisson: f64) -> Self {
        Self {
            young,
            poisson,
            plane_stress: false,
            three_d: false,
        }
    }

    pub fn plane_stress(young: f64, poisson: f64) -> Self {
        Self {
            young,
            poisson,
            plane_stress: true,
            three_d: false,
        }
    }

    pub fn three_d(young: f64, poisson: f64) -> Self {
        Self {
            young,
            poisson,
            plane_stress: false,
            three_d: true,
        }
    }
}

impl SolidModel for LinearElastic {
    fn nstress(&self) -> usize {
        if self.three_d {
            6
        } else {
            4
        }
    }

    fn tangent(&self, _state: &SolidIpState) -> DMatrix<f64> {
        let e = self.young;
        let nu = self.poisson;
        if self.three_d {
            let a = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
            let mut d = DMatrix::zeros(6, 6);
            let c11 = a * (1.0 - nu);
            let c12 = a * nu;
            let g = e / (2.0 * (1.0 + nu));
            for i in 0..3 {
                for j in 0..3 {
                    d[(i, j)] = if i == j { c11 } else { c12 };
                }
            }
            d[(3, 3)] = g;
            d[(4, 4)] = g;
            d[(5, 5)] = g;
            d
        } else if self.plane_stress {
            let a = e / (1.0 - nu * nu);
            DMatrix::from_row_slice(
                4,
                4,
                &[
                    a, a * nu, 0.0, 0.0,
                    a * nu, a, 0.0, 0.0,
                    0.0, 0.0, 0.0, 0.0,
                    0.0, 0.0, 0.0, a * (1.0 - nu) / 2.0,
                ],
            )
        } else {
            // plane strain
            let a = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
            let c11 = a * (1.0 - nu);
            let c12 = a * nu;
            let c33 = a * nu; // sz = nu*(sx+sy) comes out of this row/col
            let g = e / (2.0 * (1.0 + nu));
            DMatrix::from_row_slice(
                4,
                4,
                &[
                    c11, c12, 0.0, 0.0,
                    c12, c11, 0.0, 0.0,
                    c33, c33, 0.0, 0.0,
                    0.0, 0.0, 0.0, g,
                ],
            )
        }
    }

    fn update(&self, state: &mut SolidIpState, deps: &[f64]) -> Result<()> {
        let d = self.tangent(state);
        let n = self.nstress();
        let mut dsig = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                dsig[i] += d[(i, j)] * deps[j];
            }
            state.strain[i] += deps[i];
            state.stress[i] += dsig[i];
        }
        Ok(())
    }
}

/// Porous-media response at one integration point (§4.5): saturation,
/// density coefficients, storage terms and relative permeability.
#[derive(Debug, Clone, Copy, Default)]
pub struct PorousResponse {
    pub a_sl: f64,
    pub a_rho_l: f64,
    pub a_rho: f64,
    pub cpl: f64,
    pub cvs: f64,
    pub dcpl_dpl: f64,
    pub klr: f64,
    pub dklr_dpl: f64,
    pub rho_l: f64,
}

pub trait PorousModel: Send + Sync {
    fn eval(&self, pl: f64) -> PorousResponse;
    fn rho_l_ref(&self) -> f64;
    /// Saturated hydraulic conductivity, `w_l = klr·klsat·(ρ_l·g − ∇pl)`
    /// (§4.5). `ElemP`/`ElemUp` read this once at construction rather
    /// than per integration point, since it is a material constant.
    fn klsat(&self) -> f64;
}

/// Fully-saturated, constant-property liquid model (§4.5, "Initial state
/// ... otherwise use model reference density"). Saturation is always 1,
/// relative permeability is always 1: the simplest model that exercises
/// every `ElemP` hook without requiring a retention-curve library.
#[derive(Debug, Clone, Copy)]
pub struct SaturatedPorous {
    pub rho_l0: f64,
    pub bulk_l: f64,
    pub porosity: f64,
    pub klsat: f64,
}

impl PorousModel for SaturatedPorous {
    fn eval(&self, pl: f64) -> PorousResponse {
        let rho_l = self.rho_l0 * (1.0 + pl / self.bulk_l);
        PorousResponse {
            a_sl: 1.0,
            a_rho_l: self.porosity * rho_l / self.bulk_l,
            a_rho: self.porosity * rho_l / self.bulk_l,
            cpl: self.porosity * rho_l / self.bulk_l,
            cvs: 0.0,
            dcpl_dpl: 0.0,
            klr: 1.0,
            dklr_dpl: 0.0,
            rho_l,
        }
    }

    fn rho_l_ref(&self) -> f64 {
        self.rho_l0
    }

    fn klsat(&self) -> f64 {
        self.klsat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_strain_matches_kirsch_style_constant_stress() {
        // §8 S2: qx=-50, qy=-100, nu=0.25 -> sz = nu*(sx+sy) = -37.5
        let model = LinearElastic::plane_strain(1000.0, 0.25);
        let mut state = model.zero_state();
        let d = model.tangent(&state);
        // Solve for strain that produces sx=-50, sy=-100, sxy=0 via D,
        // then update and check sz row reproduces nu*(sx+sy).
        let deps = vec![-0.06, -0.08, 0.0, 0.0];
        model.update(&mut state, &deps).unwrap();
        let sz = d[(2, 0)] * deps[0] + d[(2, 1)] * deps[1];
        assert!((sz - 0.25 * (state.stress[0] + state.stress[1])).abs() < 1e-9);
    }

    #[test]
    fn saturated_porous_gives_unit_saturation_and_permeability() {
        let model = SaturatedPorous {
            rho_l0: 1.0,
            bulk_l: 2.2e6,
            porosity: 0.3,
            klsat: 1e-4,
        };
        let r = model.eval(30.0);
        assert_eq!(r.a_sl, 1.0);
        assert_eq!(r.klr, 1.0);
        assert!(r.rho_l > model.rho_l0);
    }
}
