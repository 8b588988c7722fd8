//! Interface-level element kinds (§1, §4 table: "the remaining element
//! types ... are described only at the interface level"). Each satisfies
//! the `Element` contract so the Domain and Newton-Raphson driver can
//! allocate and step them, but carries no constitutive/geometric detail
//! beyond a diagonal identity contribution — enough to keep the global
//! system well-posed for any DOFs it claims, not enough to reproduce the
//! physics a full implementation would. A production deployment replaces
//! these with real element kinds behind the same trait.

use gofem_model::cell::Extra;

use crate::elements::{AssemblyMap, Element, ElementCond, IpOut};
use crate::error::Result;
use crate::kb::KbBuilder;
use crate::solution::Solution;

/// Which stub this instance represents, purely for diagnostics/output
/// labelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubKind {
    Beam,
    Rod,
    RodWithModel,
    Phi,
    Rjoint,
    Contact,
    Xfem,
}

impl StubKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StubKind::Beam => "beam",
            StubKind::Rod => "rod",
            StubKind::RodWithModel => "rod_model",
            StubKind::Phi => "phi",
            StubKind::Rjoint => "rjoint",
            StubKind::Contact => "contact",
            StubKind::Xfem => "xfem",
        }
    }
}

pub struct StubElement {
    pub id: i64,
    pub kind: StubKind,
    pub map: AssemblyMap,
    /// `ElemConnector::Connect` target, for `Rjoint`/`Contact` (§4.3,
    /// optional capability): joint elements adopt their neighbours'
    /// equation numbers instead of owning their own DOFs.
    pub connected_to: Option<i64>,
}

impl StubElement {
    pub fn new(id: i64, kind: StubKind) -> Self {
        Self {
            id,
            kind,
            map: AssemblyMap::default(),
            connected_to: None,
        }
    }

    /// `ElemConnector::Connect` (§9, "joints adopt the DOF maps of their
    /// neighbours"): no-op beyond recording the neighbour id, since this
    /// kind carries no independent physics to couple through it.
    pub fn connect(&mut self, neighbour_cell_id: i64) {
        self.connected_to = Some(neighbour_cell_id);
    }
}

impl Element for StubElement {
    fn id(&self) -> i64 {
        self.id
    }

    fn assembly_map(&self) -> &AssemblyMap {
        &self.map
    }

    fn set_eqs(&mut self, map: AssemblyMap) {
        self.map = map;
    }

    fn set_ele_conds(&mut self, _conds: &[ElementCond], _extra: &Extra) -> Result<()> {
        Ok(())
    }

    fn interp_star_vars(&mut self, _sol: &Solution) {}

    fn add_to_rhs(&self, _fb: &mut [f64], _sol: &Solution) -> Result<()> {
        Ok(())
    }

    fn add_to_kb(&self, kb: &mut KbBuilder, _sol: &Solution, _first_it: bool) -> Result<()> {
        // A unit diagonal keeps any DOF this stub claims from leaving the
        // global Jacobian singular.
        for &eq in &self.map.eqs {
            kb.push(eq, eq, 1.0);
        }
        Ok(())
    }

    fn update(&mut self, _sol: &Solution) -> Result<()> {
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        Vec::new()
    }

    fn decode(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn out_ips_data(&self) -> Vec<IpOut> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_kind_names_are_stable() {
        assert_eq!(StubKind::Beam.as_str(), "beam");
        assert_eq!(StubKind::Xfem.as_str(), "xfem");
    }

    #[test]
    fn add_to_kb_puts_unit_diagonal_on_every_claimed_eq() {
        let mut e = StubElement::new(5, StubKind::Rjoint);
        e.set_eqs(AssemblyMap { eqs: vec![2, 7] });
        let mut kb = KbBuilder::new(10, 10, 8);
        e.add_to_kb(&mut kb, &Solution::new(10, 0, true, false, false), true)
            .unwrap();
        assert_eq!(kb.nnz(), 2);
    }

    #[test]
    fn connect_records_neighbour_without_touching_eqs() {
        let mut e = StubElement::new(1, StubKind::Contact);
        e.connect(42);
        assert_eq!(e.connected_to, Some(42));
    }
}
