//! ElemU — small-strain solid element (§4.4).

use std::sync::Arc;

use gofem_model::cell::Extra;
use gofem_model::Shape;
use nalgebra::DMatrix;

use crate::constitutive::{SolidIpState, SolidModel};
use crate::elements::{AssemblyMap, Element, ElementCond, IpOut};
use crate::error::{FemError, Result};
use crate::kb::KbBuilder;
use crate::shapes::{self, IntegPoint};
use crate::solution::Solution;

/// A pre-lumped nodal-equivalent surface traction (§4.4, "add
/// surface-traction contributions from natural BCs"). The Domain lumps
/// `qn`/`qn0`/`aqn` face data into per-local-vertex, per-direction
/// forces before handing it to the element (face sub-integration itself
/// is the external shape-function library's job, §1); the element only
/// adds the already-lumped vector into `fb`.
#[derive(Debug, Clone, Default)]
pub struct FaceTraction {
    /// Same length/order as the element's assembly map.
    pub lumped: Vec<f64>,
}

pub(crate) fn jacobian_and_dndx(
    coords: &[[f64; 3]],
    dn: &[Vec<f64>],
    ndim: usize,
) -> Result<(f64, Vec<Vec<f64>>)> {
    let nverts = dn[0].len();
    let mut j = DMatrix::<f64>::zeros(ndim, ndim);
    for i in 0..ndim {
        for m in 0..nverts {
            for jj in 0..ndim {
                j[(i, jj)] += dn[i][m] * coords[m][jj];
            }
        }
    }
    let det = j.determinant();
    if det <= 0.0 {
        return Ok((det, vec![vec![0.0; nverts]; ndim]));
    }
    let jinv = j
        .try_inverse()
        .ok_or_else(|| FemError::Other("Jacobian not invertible".to_string()))?;
    let mut dndx = vec![vec![0.0; nverts]; ndim];
    for dimx in 0..ndim {
        for m in 0..nverts {
            let mut s = 0.0;
            for i in 0..ndim {
                s += jinv[(dimx, i)] * dn[i][m];
            }
            dndx[dimx][m] = s;
        }
    }
    Ok((det, dndx))
}

/// Voigt B-matrix block for one node's contribution (4 rows in 2D, 6 in
/// 3D): `[ex, ey(, ez), gxy(, gyz, gzx)]`.
fn b_block(ndim: usize, dndx_m: &[f64]) -> Vec<Vec<f64>> {
    if ndim == 2 {
        let (dx, dy) = (dndx_m[0], dndx_m[1]);
        vec![
            vec![dx, 0.0],
            vec![0.0, dy],
            vec![0.0, 0.0],
            vec![dy, dx],
        ]
    } else {
        let (dx, dy, dz) = (dndx_m[0], dndx_m[1], dndx_m[2]);
        vec![
            vec![dx, 0.0, 0.0],
            vec![0.0, dy, 0.0],
            vec![0.0, 0.0, dz],
            vec![dy, dx, 0.0],
            vec![0.0, dz, dy],
            vec![dz, 0.0, dx],
        ]
    }
}

pub struct ElemU {
    pub id: i64,
    pub shape: Shape,
    pub ndim: usize,
    pub coords: Vec<[f64; 3]>,
    pub model: Arc<dyn SolidModel>,
    pub ips: Vec<IntegPoint>,
    pub state: Vec<SolidIpState>,
    pub state_bkp: Vec<SolidIpState>,
    pub state_aux: Vec<SolidIpState>,
    pub map: AssemblyMap,
    pub steady: bool,
    pub rho: f64,
    pub c_damp: f64,
    pub gravity: [f64; 3],
    pub thickness: f64,
    pub traction: Option<FaceTraction>,
    /// Starred-variable interpolants cached per IP per direction by
    /// `InterpStarVars` (§4.3).
    zet_ip: Vec<[f64; 3]>,
    chi_ip: Vec<[f64; 3]>,
}

impl ElemU {
    pub fn new(
        id: i64,
        shape: Shape,
        coords: Vec<[f64; 3]>,
        model: Arc<dyn SolidModel>,
        nip: usize,
        steady: bool,
    ) -> Self {
        let ndim = shape.ndim();
        let ips = shapes::integration_points(shape, nip);
        let n = ips.len();
        Self {
            id,
            shape,
            ndim,
            coords,
            state: vec![model.zero_state(); n],
            state_bkp: vec![model.zero_state(); n],
            state_aux: vec![model.zero_state(); n],
            model,
            ips,
            map: AssemblyMap::default(),
            steady,
            rho: 0.0,
            c_damp: 0.0,
            gravity: [0.0, 0.0, 0.0],
            thickness: 1.0,
            traction: None,
            zet_ip: vec![[0.0; 3]; n],
            chi_ip: vec![[0.0; 3]; n],
        }
    }

    fn nverts(&self) -> usize {
        self.coords.len()
    }

    /// Local equation index for vertex `m`, direction `j` (0=ux,1=uy,2=uz).
    fn eq(&self, m: usize, j: usize) -> usize {
        self.map.eqs[m * self.ndim + j]
    }

    pub fn ipoints(&self) -> usize {
        self.ips.len()
    }

    /// Cached `Chi*` interpolant at integration point `ipi`, direction
    /// `j` (0=x,1=y,2=z), as last computed by `InterpStarVars`. Exposed
    /// so `ElemUp` can reuse the same velocity estimate for its
    /// solid-velocity-divergence coupling term instead of re-deriving it.
    pub fn chi_at(&self, ipi: usize, j: usize) -> f64 {
        self.chi_ip[ipi][j]
    }

    pub fn set_ini_stress(&mut self, stresses: &[Vec<f64>]) -> Result<()> {
        if stresses.len() != self.ips.len() {
            return Err(FemError::DimensionMismatch {
                expected: self.ips.len(),
                found: stresses.len(),
            });
        }
        for (st, s) in self.state.iter_mut().zip(stresses.iter()) {
            st.stress = s.clone();
        }
        Ok(())
    }

    pub fn backup_ivs(&mut self, aux: bool) {
        if aux {
            self.state_aux = self.state.clone();
        } else {
            self.state_bkp = self.state.clone();
        }
    }

    pub fn restore_ivs(&mut self, aux: bool) {
        if aux {
            self.state = self.state_aux.clone();
        } else {
            self.state = self.state_bkp.clone();
        }
    }

    /// `Ureset` (§8, invariant 7): only the deformation-gradient-like
    /// (strain) fields are zeroed; stress and hardening variables are
    /// preserved.
    pub fn ureset(&mut self) {
        for st in &mut self.state {
            st.strain.iter_mut().for_each(|v| *v = 0.0);
        }
    }
}

impl Element for ElemU {
    fn id(&self) -> i64 {
        self.id
    }

    fn assembly_map(&self) -> &AssemblyMap {
        &self.map
    }

    fn set_eqs(&mut self, map: AssemblyMap) {
        self.map = map;
    }

    fn set_ele_conds(&mut self, conds: &[ElementCond], extra: &Extra) -> Result<()> {
        for c in conds {
            if c.key == "g" {
                let dir = self.ndim - 1; // gravity along the last spatial direction
                self.gravity[dir] = -c.value;
            }
        }
        self.thickness = extra.get_f64("thick", 1.0);
        Ok(())
    }

    fn interp_star_vars(&mut self, sol: &Solution) {
        for (ipi, ip) in self.ips.iter().enumerate() {
            let ev = shapes::eval(self.shape, ip.xi);
            let mut zet = [0.0; 3];
            let mut chi = [0.0; 3];
            for m in 0..self.nverts() {
                for j in 0..self.ndim {
                    let eq = self.eq(m, j);
                    zet[j] += ev.n[m] * sol.zet[eq];
                    chi[j] += ev.n[m] * sol.chi[eq];
                }
            }
            self.zet_ip[ipi] = zet;
            self.chi_ip[ipi] = chi;
        }
    }

    fn add_to_rhs(&self, fb: &mut [f64], sol: &Solution) -> Result<()> {
        let nstress = self.model.nstress();
        for (ipi, ip) in self.ips.iter().enumerate() {
            let ev = shapes::eval(self.shape, ip.xi);
            let (det, dndx) = jacobian_and_dndx(&self.coords, &ev.dn, self.ndim)?;
            if det <= 0.0 {
                return Err(FemError::NegativeJacobian {
                    cell: self.id,
                    ip: ipi,
                });
            }
            let w = ip.weight * det * self.thickness;
            let stress = &self.state[ipi].stress;

            for m in 0..self.nverts() {
                let bm = b_block(self.ndim, &[dndx[0][m], dndx[1][m], *dndx.get(2).map(|d| &d[m]).unwrap_or(&0.0)]);
                for j in 0..self.ndim {
                    let mut contrib = 0.0;
                    for s in 0..nstress {
                        contrib += bm[s][j] * stress[s];
                    }
                    fb[self.eq(m, j)] -= contrib * w;
                }
            }

            if !self.steady {
                for m in 0..self.nverts() {
                    for j in 0..self.ndim {
                        let eq = self.eq(m, j);
                        let mut u_j = 0.0;
                        for n in 0..self.nverts() {
                            u_j += ev.n[n] * sol.y[self.eq(n, j)];
                        }
                        let inertial = self.rho
                            * (sol.dyn_coefs.alpha1 * u_j - self.zet_ip[ipi][j] - self.gravity[j]);
                        let damping = self.c_damp
                            * (sol.dyn_coefs.alpha4 * u_j - self.chi_ip[ipi][j]);
                        fb[eq] -= ev.n[m] * (inertial + damping) * w;
                    }
                }
            }
        }

        // Already lumped to nodal-equivalent forces by the Domain (see
        // `FaceTraction` doc comment), so this is a single add, not a
        // per-IP contribution — adding it inside the IP loop above would
        // scale a set traction by the element's integration-point count.
        if let Some(tr) = &self.traction {
            for (i, &eq) in self.map.eqs.iter().enumerate() {
                fb[eq] += tr.lumped[i];
            }
        }
        Ok(())
    }

    fn add_to_kb(&self, kb: &mut KbBuilder, sol: &Solution, _first_it: bool) -> Result<()> {
        let nverts = self.nverts();
        for (ipi, ip) in self.ips.iter().enumerate() {
            let ev = shapes::eval(self.shape, ip.xi);
            let (det, dndx) = jacobian_and_dndx(&self.coords, &ev.dn, self.ndim)?;
            if det <= 0.0 {
                return Err(FemError::NegativeJacobian {
                    cell: self.id,
                    ip: ipi,
                });
            }
            let w = ip.weight * det * self.thickness;
            let d = self.model.tangent(&self.state[ipi]);
            let nstress = self.model.nstress();

            let b: Vec<Vec<Vec<f64>>> = (0..nverts)
                .map(|m| {
                    b_block(
                        self.ndim,
                        &[dndx[0][m], dndx[1][m], *dndx.get(2).map(|d| &d[m]).unwrap_or(&0.0)],
                    )
                })
                .collect();

            for m in 0..nverts {
                for n in 0..nverts {
                    for jm in 0..self.ndim {
                        for jn in 0..self.ndim {
                            let mut kmn = 0.0;
                            for si in 0..nstress {
                                for sj in 0..nstress {
                                    kmn += b[m][si][jm] * d[(si, sj)] * b[n][sj][jn];
                                }
                            }
                            if jm == jn && !self.steady {
                                kmn += (self.rho * sol.dyn_coefs.alpha1
                                    + self.c_damp * sol.dyn_coefs.alpha4)
                                    * ev.n[m]
                                    * ev.n[n];
                            }
                            kb.push(self.eq(m, jm), self.eq(n, jn), kmn * w);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn update(&mut self, sol: &Solution) -> Result<()> {
        let nverts = self.nverts();
        for (ipi, ip) in self.ips.iter().enumerate() {
            let ev = shapes::eval(self.shape, ip.xi);
            let (det, dndx) = jacobian_and_dndx(&self.coords, &ev.dn, self.ndim)?;
            if det <= 0.0 {
                return Err(FemError::NegativeJacobian {
                    cell: self.id,
                    ip: ipi,
                });
            }
            let nstress = self.model.nstress();
            let mut deps = vec![0.0; nstress];
            for m in 0..nverts {
                let bm = b_block(
                    self.ndim,
                    &[dndx[0][m], dndx[1][m], *dndx.get(2).map(|d| &d[m]).unwrap_or(&0.0)],
                );
                for j in 0..self.ndim {
                    let eq = self.eq(m, j);
                    let dy = sol.dy[eq];
                    for s in 0..nstress {
                        deps[s] += bm[s][j] * dy;
                    }
                }
            }
            self.model
                .update(&mut self.state[ipi], &deps)
                .map_err(|_| FemError::ConstitutiveFailure {
                    cell: self.id,
                    ip: ipi,
                    reason: "update failed".to_string(),
                })?;
        }
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for st in &self.state {
            out.extend_from_slice(&(st.stress.len() as u64).to_le_bytes());
            for v in &st.stress {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.extend_from_slice(&(st.internal.len() as u64).to_le_bytes());
            for v in &st.internal {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        let mut pos = 0usize;
        let read_u64 = |b: &[u8], p: &mut usize| -> u64 {
            let v = u64::from_le_bytes(b[*p..*p + 8].try_into().unwrap());
            *p += 8;
            v
        };
        let read_f64 = |b: &[u8], p: &mut usize| -> f64 {
            let v = f64::from_le_bytes(b[*p..*p + 8].try_into().unwrap());
            *p += 8;
            v
        };
        for st in &mut self.state {
            let n = read_u64(bytes, &mut pos) as usize;
            st.stress = (0..n).map(|_| read_f64(bytes, &mut pos)).collect();
            let ni = read_u64(bytes, &mut pos) as usize;
            st.internal = (0..ni).map(|_| read_f64(bytes, &mut pos)).collect();
        }
        Ok(())
    }

    fn out_ips_data(&self) -> Vec<IpOut> {
        self.state
            .iter()
            .map(|st| IpOut {
                labels: (0..st.stress.len()).map(|i| format!("s{i}")).collect(),
                values: st.stress.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constitutive::LinearElastic;

    fn unit_quad(model: Arc<dyn SolidModel>, steady: bool) -> ElemU {
        let coords = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let mut e = ElemU::new(1, Shape::Quad4, coords, model, 4, steady);
        // 4 verts x 2 dof each, eqs 0..8
        let table: Vec<Vec<usize>> = (0..4).map(|m| vec![m * 2, m * 2 + 1]).collect();
        e.set_eqs(AssemblyMap::from_table(&table));
        e
    }

    #[test]
    fn constant_stress_patch_test_matches_closed_form() {
        // §8 S2: qx=-50, qy=-100, nu=0.25 plane-strain unit square.
        let model: Arc<dyn SolidModel> = Arc::new(LinearElastic::plane_strain(1000.0, 0.25));
        let mut e = unit_quad(model.clone(), true);
        let d = model.tangent(&model.zero_state());
        // Choose a uniform displacement gradient matching target stresses by
        // solving the 2x2 system implied by the plane-strain D matrix rows.
        let target = [-50.0, -100.0, 0.0, 0.0];
        // d[(0,0)]*ex + d[(0,1)]*ey = target[0]; d[(1,0)]*ex + d[(1,1)]*ey = target[1]
        let det = d[(0, 0)] * d[(1, 1)] - d[(0, 1)] * d[(1, 0)];
        let ex = (target[0] * d[(1, 1)] - target[1] * d[(0, 1)]) / det;
        let ey = (d[(0, 0)] * target[1] - d[(1, 0)] * target[0]) / det;

        let mut sol = Solution::new(8, 0, true, false, false);
        // u = ex*x, v = ey*y at the four corners.
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for (m, (x, y)) in corners.iter().enumerate() {
            sol.y[m * 2] = ex * x;
            sol.y[m * 2 + 1] = ey * y;
            sol.dy[m * 2] = ex * x;
            sol.dy[m * 2 + 1] = ey * y;
        }
        e.update(&sol).unwrap();
        for st in &e.state {
            assert!((st.stress[0] - target[0]).abs() < 1e-9);
            assert!((st.stress[1] - target[1]).abs() < 1e-9);
            assert!((st.stress[2] - 0.25 * (target[0] + target[1])).abs() < 1e-9);
            assert!(st.stress[3].abs() < 1e-9);
        }
    }

    #[test]
    fn negative_jacobian_is_detected() {
        let model: Arc<dyn SolidModel> = Arc::new(LinearElastic::plane_strain(1000.0, 0.3));
        // Degenerate/inverted quad (nodes 2 and 3 swapped order).
        let coords = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        let mut e = ElemU::new(1, Shape::Quad4, coords, model, 4, true);
        let table: Vec<Vec<usize>> = (0..4).map(|m| vec![m * 2, m * 2 + 1]).collect();
        e.set_eqs(AssemblyMap::from_table(&table));
        let sol = Solution::new(8, 0, true, false, false);
        let mut fb = vec![0.0; 8];
        let err = e.add_to_rhs(&mut fb, &sol).unwrap_err();
        assert!(matches!(err, FemError::NegativeJacobian { .. }));
    }

    #[test]
    fn ureset_preserves_stress_but_zeros_strain() {
        let model: Arc<dyn SolidModel> = Arc::new(LinearElastic::plane_strain(1000.0, 0.3));
        let mut e = unit_quad(model, true);
        e.state[0].stress = vec![1.0, 2.0, 3.0, 4.0];
        e.state[0].strain = vec![0.1, 0.2, 0.3, 0.4];
        e.ureset();
        assert_eq!(e.state[0].stress, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(e.state[0].strain, vec![0.0; 4]);
    }

    #[test]
    fn encode_decode_roundtrips_state() {
        let model: Arc<dyn SolidModel> = Arc::new(LinearElastic::plane_strain(1000.0, 0.3));
        let mut e = unit_quad(model, true);
        for st in &mut e.state {
            st.stress = vec![1.0, 2.0, 3.0, 4.0];
        }
        let bytes = e.encode();
        let mut e2 = unit_quad(Arc::new(LinearElastic::plane_strain(1000.0, 0.3)), true);
        e2.decode(&bytes).unwrap();
        assert_eq!(e2.state[0].stress, e.state[0].stress);
    }

    #[test]
    fn face_traction_is_added_once_not_per_integration_point() {
        let model: Arc<dyn SolidModel> = Arc::new(LinearElastic::plane_strain(1000.0, 0.3));
        let mut e = unit_quad(model, true);
        e.traction = Some(FaceTraction {
            lumped: vec![1.0; 8],
        });
        let sol = Solution::new(8, 0, true, false, false);
        let mut fb = vec![0.0; 8];
        e.add_to_rhs(&mut fb, &sol).unwrap();
        // 4 integration points on this quad; a per-IP add would give 4.0.
        assert!((fb[0] - 1.0).abs() < 1e-9);
    }
}
