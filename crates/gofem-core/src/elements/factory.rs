//! `AnyElement` — the closed sum-type dispatch table selected over trait
//! objects (§9, "Polymorphism over a capability set"; module doc on
//! `elements::mod`). Mirrors the teacher's `DynamicElement` pattern
//! (`elements/factory.rs`): one variant per concrete element kind, a
//! `from_cell` allocator keyed on the cell's element-type tag, and the
//! nine-method `Element` contract implemented by a single `match`.

use std::sync::Arc;

use gofem_model::cell::{Cell, ElemData, Extra};

use crate::constitutive::{LinearElastic, PorousModel, SaturatedPorous, SolidModel};
use crate::elements::elem_p::ElemP;
use crate::elements::elem_u::ElemU;
use crate::elements::elem_up::ElemUp;
use crate::elements::stub::{StubElement, StubKind};
use crate::elements::{AssemblyMap, Element, ElementCond, IpOut};
use crate::error::{FemError, Result};
use crate::kb::KbBuilder;
use crate::solution::Solution;

pub enum AnyElement {
    U(ElemU),
    P(ElemP),
    Up(ElemUp),
    Stub(StubElement),
}

impl AnyElement {
    /// Allocate the right variant for `data.etype`, given the cell's
    /// geometry (`coords`, already resolved from vertex ids) and a
    /// steady/transient flag inherited from the current stage. Unknown
    /// `etype` strings are rejected rather than silently stubbed, since a
    /// typo in `etype` should surface at `SetStage` time (§4.2).
    pub fn from_cell(
        cell: &Cell,
        data: &ElemData,
        coords: Vec<[f64; 3]>,
        steady: bool,
    ) -> Result<Self> {
        let nip = if data.nip == 0 { default_nip(cell.shape) } else { data.nip };
        match data.etype.as_str() {
            "u" => {
                let model: Arc<dyn SolidModel> = Arc::new(linear_elastic_from_mat(&data.mat)?);
                Ok(AnyElement::U(ElemU::new(cell.id, cell.shape, coords, model, nip, steady)))
            }
            "p" => {
                let model: Arc<dyn PorousModel> = Arc::new(saturated_porous_from_mat(&data.mat)?);
                Ok(AnyElement::P(ElemP::new(cell.id, cell.shape, coords, model, nip, steady)))
            }
            "up" => {
                let umodel: Arc<dyn SolidModel> = Arc::new(linear_elastic_from_mat(&data.mat)?);
                let pmodel: Arc<dyn PorousModel> = Arc::new(saturated_porous_from_mat(&data.mat)?);
                let u = ElemU::new(cell.id, cell.shape, coords.clone(), umodel, nip, steady);
                let p = ElemP::new(cell.id, cell.shape, coords, pmodel, nip, steady);
                Ok(AnyElement::Up(ElemUp::new(cell.id, u, p)))
            }
            "beam" => Ok(AnyElement::Stub(StubElement::new(cell.id, StubKind::Beam))),
            "rod" => Ok(AnyElement::Stub(StubElement::new(cell.id, StubKind::Rod))),
            "rod_model" => Ok(AnyElement::Stub(StubElement::new(cell.id, StubKind::RodWithModel))),
            "phi" => Ok(AnyElement::Stub(StubElement::new(cell.id, StubKind::Phi))),
            "rjoint" => Ok(AnyElement::Stub(StubElement::new(cell.id, StubKind::Rjoint))),
            "contact" => Ok(AnyElement::Stub(StubElement::new(cell.id, StubKind::Contact))),
            "xfem" => Ok(AnyElement::Stub(StubElement::new(cell.id, StubKind::Xfem))),
            other => Err(FemError::UnknownElementType(other.to_string())),
        }
    }

    // ---- optional capabilities (§4.3, ElemIntvars / ElemConnector) ----
    // Inherent methods rather than separate traits: harmless no-ops on
    // variants that lack the capability, per the module-level design note.

    pub fn ipoints(&self) -> usize {
        match self {
            AnyElement::U(e) => e.ipoints(),
            AnyElement::P(e) => e.ips.len(),
            AnyElement::Up(e) => e.u.ipoints(),
            AnyElement::Stub(_) => 0,
        }
    }

    pub fn set_ini_stress(&mut self, stresses: &[Vec<f64>]) -> Result<()> {
        match self {
            AnyElement::U(e) => e.set_ini_stress(stresses),
            AnyElement::Up(e) => e.u.set_ini_stress(stresses),
            AnyElement::P(_) | AnyElement::Stub(_) => Ok(()),
        }
    }

    pub fn set_ini_ivs(&mut self, sol: &Solution) -> Result<()> {
        match self {
            AnyElement::P(e) => e.set_ini_ivs(sol),
            AnyElement::Up(e) => e.p.set_ini_ivs(sol),
            AnyElement::U(_) | AnyElement::Stub(_) => Ok(()),
        }
    }

    pub fn backup_ivs(&mut self, aux: bool) {
        match self {
            AnyElement::U(e) => e.backup_ivs(aux),
            AnyElement::Up(e) => e.u.backup_ivs(aux),
            AnyElement::P(_) | AnyElement::Stub(_) => {}
        }
    }

    pub fn restore_ivs(&mut self, aux: bool) {
        match self {
            AnyElement::U(e) => e.restore_ivs(aux),
            AnyElement::Up(e) => e.u.restore_ivs(aux),
            AnyElement::P(_) | AnyElement::Stub(_) => {}
        }
    }

    pub fn ureset(&mut self) {
        match self {
            AnyElement::U(e) => e.ureset(),
            AnyElement::Up(e) => e.u.ureset(),
            AnyElement::P(_) | AnyElement::Stub(_) => {}
        }
    }

    /// `ElemConnector::Connect` (§9): only joint/contact stubs adopt a
    /// neighbour's DOF map.
    pub fn connect(&mut self, neighbour_cell_id: i64) {
        if let AnyElement::Stub(e) = self {
            e.connect(neighbour_cell_id);
        }
    }
}

fn default_nip(shape: gofem_model::Shape) -> usize {
    match shape {
        gofem_model::Shape::Line2 => 2,
        gofem_model::Shape::Tri3 => 1,
        gofem_model::Shape::Tet4 => 1,
        gofem_model::Shape::Quad4 | gofem_model::Shape::Quad8 => 4,
        gofem_model::Shape::Hex8 => 8,
    }
}

/// Parses `mat` strings of the form `"E=1000,nu=0.3[,plane_stress]"` —
/// the minimal per-tag material record a `LinearElastic` reference model
/// needs; a full material-library lookup is the external collaborator
/// named in §1.
fn linear_elastic_from_mat(mat: &str) -> Result<LinearElastic> {
    let extra = Extra::parse(
        &mat.split(',')
            .map(|kv| {
                let (k, v) = kv.split_once('=').unwrap_or((kv, ""));
                format!("!{k}:{v}")
            })
            .collect::<Vec<_>>()
            .join(" "),
    )
    .map_err(FemError::from)?;
    let young = extra.get_f64("E", 1000.0);
    let poisson = extra.get_f64("nu", 0.3);
    Ok(if extra.get_bool("plane_stress", false) {
        LinearElastic::plane_stress(young, poisson)
    } else if extra.get_bool("three_d", false) {
        LinearElastic::three_d(young, poisson)
    } else {
        LinearElastic::plane_strain(young, poisson)
    })
}

fn saturated_porous_from_mat(mat: &str) -> Result<SaturatedPorous> {
    let extra = Extra::parse(
        &mat.split(',')
            .map(|kv| {
                let (k, v) = kv.split_once('=').unwrap_or((kv, ""));
                format!("!{k}:{v}")
            })
            .collect::<Vec<_>>()
            .join(" "),
    )
    .map_err(FemError::from)?;
    Ok(SaturatedPorous {
        rho_l0: extra.get_f64("rhoL0", 1.0),
        bulk_l: extra.get_f64("bulkL", 2.2e6),
        porosity: extra.get_f64("porosity", 0.3),
        klsat: extra.get_f64("klsat", 1e-4),
    })
}

impl Element for AnyElement {
    fn id(&self) -> i64 {
        match self {
            AnyElement::U(e) => e.id(),
            AnyElement::P(e) => e.id(),
            AnyElement::Up(e) => e.id(),
            AnyElement::Stub(e) => e.id(),
        }
    }

    fn assembly_map(&self) -> &AssemblyMap {
        match self {
            AnyElement::U(e) => e.assembly_map(),
            AnyElement::P(e) => e.assembly_map(),
            AnyElement::Up(e) => e.assembly_map(),
            AnyElement::Stub(e) => e.assembly_map(),
        }
    }

    fn set_eqs(&mut self, map: AssemblyMap) {
        match self {
            AnyElement::U(e) => e.set_eqs(map),
            AnyElement::P(e) => e.set_eqs(map),
            AnyElement::Up(e) => e.set_eqs(map),
            AnyElement::Stub(e) => e.set_eqs(map),
        }
    }

    fn set_ele_conds(&mut self, conds: &[ElementCond], extra: &Extra) -> Result<()> {
        match self {
            AnyElement::U(e) => e.set_ele_conds(conds, extra),
            AnyElement::P(e) => e.set_ele_conds(conds, extra),
            AnyElement::Up(e) => e.set_ele_conds(conds, extra),
            AnyElement::Stub(e) => e.set_ele_conds(conds, extra),
        }
    }

    fn interp_star_vars(&mut self, sol: &Solution) {
        match self {
            AnyElement::U(e) => e.interp_star_vars(sol),
            AnyElement::P(e) => e.interp_star_vars(sol),
            AnyElement::Up(e) => e.interp_star_vars(sol),
            AnyElement::Stub(e) => e.interp_star_vars(sol),
        }
    }

    fn add_to_rhs(&self, fb: &mut [f64], sol: &Solution) -> Result<()> {
        match self {
            AnyElement::U(e) => e.add_to_rhs(fb, sol),
            AnyElement::P(e) => e.add_to_rhs(fb, sol),
            AnyElement::Up(e) => e.add_to_rhs(fb, sol),
            AnyElement::Stub(e) => e.add_to_rhs(fb, sol),
        }
    }

    fn add_to_kb(&self, kb: &mut KbBuilder, sol: &Solution, first_it: bool) -> Result<()> {
        match self {
            AnyElement::U(e) => e.add_to_kb(kb, sol, first_it),
            AnyElement::P(e) => e.add_to_kb(kb, sol, first_it),
            AnyElement::Up(e) => e.add_to_kb(kb, sol, first_it),
            AnyElement::Stub(e) => e.add_to_kb(kb, sol, first_it),
        }
    }

    fn update(&mut self, sol: &Solution) -> Result<()> {
        match self {
            AnyElement::U(e) => e.update(sol),
            AnyElement::P(e) => e.update(sol),
            AnyElement::Up(e) => e.update(sol),
            AnyElement::Stub(e) => e.update(sol),
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            AnyElement::U(e) => e.encode(),
            AnyElement::P(e) => e.encode(),
            AnyElement::Up(e) => e.encode(),
            AnyElement::Stub(e) => e.encode(),
        }
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            AnyElement::U(e) => e.decode(bytes),
            AnyElement::P(e) => e.decode(bytes),
            AnyElement::Up(e) => e.decode(bytes),
            AnyElement::Stub(e) => e.decode(bytes),
        }
    }

    fn out_ips_data(&self) -> Vec<IpOut> {
        match self {
            AnyElement::U(e) => e.out_ips_data(),
            AnyElement::P(e) => e.out_ips_data(),
            AnyElement::Up(e) => e.out_ips_data(),
            AnyElement::Stub(e) => e.out_ips_data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gofem_model::Shape;

    fn quad_cell(etype: &str, mat: &str) -> (Cell, ElemData, Vec<[f64; 3]>) {
        let cell = Cell {
            id: 1,
            shape: Shape::Quad4,
            tag: 1,
            verts: vec![1, 2, 3, 4],
            part: 0,
            joint: false,
        };
        let data = ElemData {
            tag: 1,
            mat: mat.to_string(),
            etype: etype.to_string(),
            extra: String::new(),
            nip: 4,
            nipf: 0,
        };
        let coords = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        (cell, data, coords)
    }

    #[test]
    fn builds_elem_u_from_u_etype() {
        let (cell, data, coords) = quad_cell("u", "E=2000,nu=0.25");
        let e = AnyElement::from_cell(&cell, &data, coords, true).unwrap();
        assert!(matches!(e, AnyElement::U(_)));
    }

    #[test]
    fn builds_elem_up_from_up_etype() {
        let (cell, data, coords) = quad_cell("up", "E=2000,nu=0.25");
        let e = AnyElement::from_cell(&cell, &data, coords, true).unwrap();
        assert!(matches!(e, AnyElement::Up(_)));
    }

    #[test]
    fn elem_p_klsat_is_copied_from_the_material_string() {
        let (cell, data, coords) = quad_cell("p", "rhoL0=1.0,bulkL=2.2e6,klsat=5e-3");
        let e = AnyElement::from_cell(&cell, &data, coords, true).unwrap();
        match e {
            AnyElement::P(p) => assert_eq!(p.klsat, 5e-3),
            _ => panic!("expected AnyElement::P"),
        }
    }

    #[test]
    fn elem_up_pressure_sub_element_klsat_is_copied_from_the_material_string() {
        let (cell, data, coords) = quad_cell("up", "E=2000,nu=0.25,klsat=5e-3");
        let e = AnyElement::from_cell(&cell, &data, coords, true).unwrap();
        match e {
            AnyElement::Up(up) => assert_eq!(up.p.klsat, 5e-3),
            _ => panic!("expected AnyElement::Up"),
        }
    }

    #[test]
    fn unknown_etype_is_rejected() {
        let (cell, data, coords) = quad_cell("bogus", "");
        let err = AnyElement::from_cell(&cell, &data, coords, true).unwrap_err();
        assert!(matches!(err, FemError::UnknownElementType(_)));
    }

    #[test]
    fn stub_kinds_all_construct() {
        for etype in ["beam", "rod", "rod_model", "phi", "rjoint", "contact", "xfem"] {
            let (cell, data, coords) = quad_cell(etype, "");
            let e = AnyElement::from_cell(&cell, &data, coords, true).unwrap();
            assert!(matches!(e, AnyElement::Stub(_)));
        }
    }
}
