//! Element polymorphic contract (§4.3).
//!
//! Every element implements the capability set {Id, SetEqs, SetEleConds,
//! InterpStarVars, AddToRhs, AddToKb, Update, Encode, Decode,
//! OutIpsData} — modelled here as the `Element` trait. Three optional
//! capability sets (`ElemIntvars`, `ElemConnector`, `ElemWriter`) select
//! subset membership; per the spec's own design note (§9, "Polymorphism
//! over a capability set"), this repository maps the whole contract onto
//! a closed sum type with a dispatch table (`AnyElement`, in
//! `factory.rs`) rather than trait objects, so the optional capabilities
//! are inherent methods on `AnyElement` instead of separate traits —
//! this keeps ownership strict and avoids downcasting `dyn Element`.

pub mod elem_p;
pub mod elem_u;
pub mod elem_up;
pub mod factory;
pub mod stub;

use gofem_model::cell::Extra;

use crate::error::Result;
use crate::kb::KbBuilder;
use crate::solution::Solution;

/// A cell condition applied to an element (§4.2, "cell conditions
/// (gravity `g`)").
#[derive(Debug, Clone)]
pub struct ElementCond {
    pub key: String,
    pub value: f64,
}

/// One integration point's output record (§4.3, `OutIpsData`):
/// natural coordinates are implicit (index order), payload is
/// element-defined (stress components, saturation, …).
#[derive(Debug, Clone, Default)]
pub struct IpOut {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Flattened local-(vertex,dof) -> global-equation table (§4.3,
/// `SetEqs`: "receives a 2-D table of equation numbers indexed by
/// local-vertex and local-DOF index, flattens it into the element's
/// assembly map").
#[derive(Debug, Clone, Default)]
pub struct AssemblyMap {
    pub eqs: Vec<usize>,
}

impl AssemblyMap {
    pub fn from_table(table: &[Vec<usize>]) -> Self {
        Self {
            eqs: table.iter().flatten().copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.eqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eqs.is_empty()
    }
}

/// Per-call contract every element honours (§4.3).
pub trait Element {
    fn id(&self) -> i64;

    fn assembly_map(&self) -> &AssemblyMap;

    /// `SetEqs`: install the flattened assembly map built by the Domain
    /// from the per-vertex DOF table.
    fn set_eqs(&mut self, map: AssemblyMap);

    /// `SetEleConds`: cell conditions such as gravity (§4.2).
    fn set_ele_conds(&mut self, conds: &[ElementCond], extra: &Extra) -> Result<()>;

    /// `InterpStarVars`: read Psi/Zet/Chi and cache per-IP interpolants
    /// consumed by later `AddToRhs`/`AddToKb` (§4.3).
    fn interp_star_vars(&mut self, sol: &Solution);

    /// Add `-R` (negative residual) into `fb` at this element's assembly
    /// positions. Must not clear `fb` (§4.3).
    fn add_to_rhs(&self, fb: &mut [f64], sol: &Solution) -> Result<()>;

    /// Add Jacobian entries into the global triplet builder. The
    /// triplet is never zeroed between elements; `first_it` may gate a
    /// once-per-step tangent re-evaluation (§4.3).
    fn add_to_kb(&self, kb: &mut KbBuilder, sol: &Solution, first_it: bool) -> Result<()>;

    /// Advance internal variables from converged `Y`/`ΔY`. Idempotent
    /// within a given `(Y, ΔY)` pair (§4.3).
    fn update(&mut self, sol: &Solution) -> Result<()>;

    /// Opaque internal-variable payload for persistence (§4.11); the
    /// driver only frames the byte sequence, the element owns the
    /// schema.
    fn encode(&self) -> Vec<u8>;

    fn decode(&mut self, bytes: &[u8]) -> Result<()>;

    fn out_ips_data(&self) -> Vec<IpOut>;
}
