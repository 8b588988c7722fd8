//! Typed simulation configuration tree (§6, "Simulation configuration").
//!
//! The grammar of whatever text format a real deployment parses into this
//! tree is out of scope (§1); this module owns only the shape the parser
//! would hand the engine, expressed as `serde`-deserialisable records so a
//! CLI can read it straight out of TOML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cell::ElemData;
use crate::functions::TimeFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoder {
    Binary,
    Json,
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::Binary
    }
}

/// Simulation-wide flags and water/gravity properties (§6, `data`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default)]
    pub steady: bool,
    #[serde(default)]
    pub axisym: bool,
    #[serde(default)]
    pub pstress: bool,
    #[serde(default)]
    pub encoder: Encoder,
    pub dirout: String,
    pub key: String,
    #[serde(default)]
    pub show_residual: bool,
    #[serde(default = "default_water_level")]
    pub water_level: f64,
    #[serde(default = "default_water_rho0")]
    pub water_rho0: f64,
    #[serde(default = "default_water_bulk")]
    pub water_bulk: f64,
    /// Name of a function in `functions` giving gravity magnitude(t).
    pub gravity_fcn: Option<String>,
    #[serde(default = "default_linsol")]
    pub linsol: String,
}

fn default_water_level() -> f64 {
    0.0
}
fn default_water_rho0() -> f64 {
    1.0
}
fn default_water_bulk() -> f64 {
    2.2e6
}
fn default_linsol() -> String {
    "native".to_string()
}

/// A mesh-file reference plus the per-tag element data for one region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub mesh_file: String,
    pub elemsdata: Vec<ElemData>,
}

/// A single essential (Dirichlet) BC entry in a stage's `nodebcs`/`facebcs`
/// list, prior to being split into EssentialBc/PtNaturalBc rows by
/// `Domain::SetStage` (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcEntry {
    /// Node or face tag this entry targets.
    pub tag: i32,
    /// DOF key, e.g. "ux", "pl", or a structural key "rigid"/"incsup"/"hst".
    pub key: String,
    /// Name of a function in `functions`.
    pub fcn: String,
    /// Extra scalar (e.g. inclined-support angle, in radians).
    #[serde(default)]
    pub extra: f64,
}

/// A cell condition, e.g. gravity body load (`key = "g"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EleCond {
    pub tag: i32,
    pub key: String,
    pub fcn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepControl {
    /// Name of a function in `functions` giving Δt(step-index) or the
    /// total-time target; interpretation is driver-specific (§4.10).
    pub tf: f64,
    pub dt: f64,
    pub dtout: f64,
    #[serde(default)]
    pub richardson: bool,
}

/// One initial-value entry for the `value-map` ini-state dispatch (§4.2,
/// "explicit initial-stress map, user-function-per-DOF"): `fcn` evaluated
/// at the stage's start time sets DOF `key` on every node carrying `tag`.
/// A `Cte` function gives a plain explicit value; any other function
/// covers the "user-function-per-DOF" case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IniValueEntry {
    pub tag: i32,
    pub key: String,
    pub fcn: String,
}

/// `SetIniVals(i, zeroSol?)` dispatch (§4.2): which initial-state
/// strategy a stage uses, plus whether `Sol` is zeroed before it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "method")]
pub enum IniState {
    /// No explicit `Y` seeding beyond what BCs already installed; every
    /// stateful element still runs its own `SetIniIvs`.
    None {
        #[serde(default)]
        zero_sol: bool,
    },
    /// Hydrostatic pore pressure `pl(z) = waterRho0 * g * (waterLevel - z)`
    /// on every active `pl` DOF.
    Hydrostatic {
        #[serde(default)]
        zero_sol: bool,
    },
    /// Hydrostatic pore pressure plus a K0 total-vertical-stress profile
    /// seeding `ElemU`/`ElemUp` initial effective stresses (§4.6).
    Geostatic {
        #[serde(default)]
        zero_sol: bool,
        k0: f64,
    },
    /// Explicit per-tag/per-key initial values (the "explicit
    /// initial-stress map" and "user-function-per-DOF" strategies).
    ValueMap {
        #[serde(default)]
        zero_sol: bool,
        values: Vec<IniValueEntry>,
    },
    /// Import a prior run's checkpoint at output index `tidx` in place of
    /// computing a fresh initial state.
    Import {
        #[serde(default)]
        zero_sol: bool,
        tidx: usize,
    },
}

impl IniState {
    pub fn zero_sol(&self) -> bool {
        match self {
            IniState::None { zero_sol }
            | IniState::Hydrostatic { zero_sol }
            | IniState::Geostatic { zero_sol, .. }
            | IniState::ValueMap { zero_sol, .. }
            | IniState::Import { zero_sol, .. } => *zero_sol,
        }
    }
}

/// One ordered stage (§6, `stages[]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub desc: String,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub activate: Vec<i64>,
    #[serde(default)]
    pub deactivate: Vec<i64>,
    #[serde(default)]
    pub facebcs: Vec<BcEntry>,
    #[serde(default)]
    pub nodebcs: Vec<BcEntry>,
    #[serde(default)]
    pub eleconds: Vec<EleCond>,
    #[serde(default, rename = "ini-state")]
    pub ini_state: Option<IniState>,
    pub control: StepControl,
}

/// Top-level simulation document (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub data: DataSection,
    #[serde(default)]
    pub functions: BTreeMap<String, TimeFunction>,
    pub regions: Vec<RegionConfig>,
    pub stages: Vec<StageConfig>,
}

impl Simulation {
    pub fn function(&self, name: &str) -> Option<&TimeFunction> {
        self.functions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_defaults_to_binary() {
        assert_eq!(Encoder::default(), Encoder::Binary);
    }
}
