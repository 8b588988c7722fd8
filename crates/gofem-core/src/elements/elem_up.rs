//! ElemUP — coupled displacement/pore-liquid-pressure element (§4.6).

use gofem_model::cell::Extra;

use crate::elements::elem_p::ElemP;
use crate::elements::elem_u::{jacobian_and_dndx, ElemU};
use crate::elements::{AssemblyMap, Element, ElementCond, IpOut};
use crate::error::{FemError, Result};
use crate::kb::KbBuilder;
use crate::shapes;
use crate::solution::Solution;

/// Owns a displacement element and a pressure element sharing geometry
/// and integration points; the pressure field may use a coarser
/// ("basic") shape than the displacement field for LBB stability, so
/// its vertex count can be less than or equal to the displacement
/// element's.
pub struct ElemUp {
    pub id: i64,
    pub u: ElemU,
    pub p: ElemP,
    pub alpha: f64,
    map: AssemblyMap,
}

impl ElemUp {
    pub fn new(id: i64, u: ElemU, p: ElemP) -> Self {
        Self {
            id,
            u,
            p,
            alpha: 1.0,
            map: AssemblyMap::default(),
        }
    }
}

impl Element for ElemUp {
    fn id(&self) -> i64 {
        self.id
    }

    fn assembly_map(&self) -> &AssemblyMap {
        &self.map
    }

    /// The Domain builds the union table with every `u` dof (full
    /// shape) followed by every `p` dof (basic shape), per vertex order;
    /// this splits it back into the two sub-elements' own maps.
    fn set_eqs(&mut self, map: AssemblyMap) {
        let nu = self.u.ndim * self.u.coords.len();
        let u_eqs = map.eqs[..nu].to_vec();
        let p_eqs = map.eqs[nu..].to_vec();
        self.u.set_eqs(AssemblyMap { eqs: u_eqs });
        self.p.set_eqs(AssemblyMap { eqs: p_eqs });
        self.map = map;
    }

    fn set_ele_conds(&mut self, conds: &[ElementCond], extra: &Extra) -> Result<()> {
        self.u.set_ele_conds(conds, extra)?;
        self.p.set_ele_conds(conds, extra)?;
        self.alpha = extra.get_f64("alpha", 1.0);
        Ok(())
    }

    fn interp_star_vars(&mut self, sol: &Solution) {
        self.u.interp_star_vars(sol);
        self.p.interp_star_vars(sol);
    }

    fn add_to_rhs(&self, fb: &mut [f64], sol: &Solution) -> Result<()> {
        self.u.add_to_rhs(fb, sol)?;
        self.p.add_to_rhs(fb, sol)?;

        let u_nverts = self.u.coords.len();
        let p_nverts = self.p.coords.len();

        for (ipi, ip) in self.u.ips.iter().enumerate() {
            let ev_u = shapes::eval(self.u.shape, ip.xi);
            let ev_p = shapes::eval(self.p.shape, ip.xi);
            let (det, dndx_u) = jacobian_and_dndx(&self.u.coords, &ev_u.dn, self.u.ndim)?;
            if det <= 0.0 {
                return Err(FemError::NegativeJacobian {
                    cell: self.id,
                    ip: ipi,
                });
            }
            let w = ip.weight * det;

            let mut pl = 0.0;
            for n in 0..p_nverts {
                pl += ev_p.n[n] * sol.y[self.p.assembly_map().eqs[n]];
            }

            // Pressure acts as a negative isotropic stress on the solid
            // (Biot effective-stress coupling): subtract alpha*div(v)*pl
            // work from Ru, one (vertex, direction) row at a time.
            let mut div_u_dot = 0.0;
            for mv in 0..u_nverts {
                for j in 0..self.u.ndim {
                    let eq = self.u.assembly_map().eqs[mv * self.u.ndim + j];
                    fb[eq] -= self.alpha * dndx_u[j][mv] * pl * w;

                    let u_dot = sol.dyn_coefs.alpha4 * sol.y[eq] - self.u.chi_at(ipi, j);
                    div_u_dot += dndx_u[j][mv] * u_dot;
                }
            }

            for n in 0..p_nverts {
                let eq = self.p.assembly_map().eqs[n];
                fb[eq] -= ev_p.n[n] * self.alpha * div_u_dot * w;
            }
        }
        Ok(())
    }

    fn add_to_kb(&self, kb: &mut KbBuilder, sol: &Solution, first_it: bool) -> Result<()> {
        self.u.add_to_kb(kb, sol, first_it)?;
        self.p.add_to_kb(kb, sol, first_it)?;

        let u_nverts = self.u.coords.len();
        let p_nverts = self.p.coords.len();
        for ip in self.u.ips.iter() {
            let ev_u = shapes::eval(self.u.shape, ip.xi);
            let ev_p = shapes::eval(self.p.shape, ip.xi);
            let (det, dndx_u) = jacobian_and_dndx(&self.u.coords, &ev_u.dn, self.u.ndim)?;
            if det <= 0.0 {
                continue;
            }
            let w = ip.weight * det;

            for mv in 0..u_nverts {
                for j in 0..self.u.ndim {
                    let eq_u = self.u.assembly_map().eqs[mv * self.u.ndim + j];
                    for n in 0..p_nverts {
                        let eq_p = self.p.assembly_map().eqs[n];
                        let kup = self.alpha * dndx_u[j][mv] * ev_p.n[n] * w;
                        kb.push(eq_u, eq_p, kup);
                        let kpu = self.alpha * sol.dyn_coefs.alpha4 * ev_p.n[n] * dndx_u[j][mv] * w;
                        kb.push(eq_p, eq_u, kpu);
                    }
                }
            }
        }
        Ok(())
    }

    fn update(&mut self, sol: &Solution) -> Result<()> {
        self.u.update(sol)?;
        self.p.update(sol)
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = self.u.encode();
        out.extend(self.p.encode());
        out
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        // ElemU's payload is variable length (per-IP stress/internal
        // vectors); split at the midpoint recorded by each sub-element's
        // own IP count rather than an arbitrary byte offset.
        let u_len = self.u.encode().len();
        self.u.decode(&bytes[..u_len])?;
        self.p.decode(&bytes[u_len..])
    }

    fn out_ips_data(&self) -> Vec<IpOut> {
        let mut out = self.u.out_ips_data();
        out.extend(self.p.out_ips_data());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constitutive::{LinearElastic, SaturatedPorous};
    use std::sync::Arc;

    fn build() -> ElemUp {
        let coords = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let u_model = Arc::new(LinearElastic::plane_strain(1000.0, 0.3));
        let p_model = Arc::new(SaturatedPorous {
            rho_l0: 1.0,
            bulk_l: 2.2e6,
            porosity: 0.3,
            klsat: 1e-4,
        });
        let u = ElemU::new(1, gofem_model::Shape::Quad4, coords.clone(), u_model, 4, true);
        let p = ElemP::new(1, gofem_model::Shape::Quad4, coords, p_model, 4, true);
        let mut up = ElemUp::new(1, u, p);
        // Convention (documented on `set_eqs`): all displacement
        // equations first (vertex-major), then all pressure equations.
        up.set_eqs(AssemblyMap {
            eqs: (0..12).collect(),
        });
        up
    }

    #[test]
    fn set_eqs_splits_union_map_between_u_and_p() {
        let up = build();
        assert_eq!(up.u.assembly_map().len(), 8);
        assert_eq!(up.p.assembly_map().len(), 4);
        assert_eq!(up.p.assembly_map().eqs[0], 8);
    }

    #[test]
    fn add_to_rhs_runs_without_error_on_zero_state() {
        let up = build();
        let sol = Solution::new(12, 0, true, false, false);
        let mut fb = vec![0.0; 12];
        up.add_to_rhs(&mut fb, &sol).unwrap();
    }
}
