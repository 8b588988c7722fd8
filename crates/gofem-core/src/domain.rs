//! Domain (§3, §4.2): owns the mesh, the active-stage Node/Element sets,
//! equation numbering, boundary conditions, and the augmented system
//! buffers (`Sol`, `Fb`, `Wb`, `Kb`).

use std::collections::{BTreeMap, BTreeSet};

use gofem_model::cell::{Cell, ElemData};
use gofem_model::config::{BcEntry, EleCond, IniState, IniValueEntry, RegionConfig, StageConfig};
use gofem_model::{Mesh, Simulation, TimeFunction};

use crate::dof::{Dof2Tnum, DofKey, Node, Vid2Node};
use crate::elements::factory::AnyElement;
use crate::elements::{AssemblyMap, Element, ElementCond};
use crate::error::{FemError, Result};
use crate::essential_bcs::{EssentialBcs, NodeEqLookup};
use crate::kb::KbBuilder;
use crate::pt_natural_bcs::PtNaturalBcs;
use crate::solution::Solution;

/// Mirrors `gofem_model::mesh::MeshStats` (§A.5 in the expanded spec):
/// a cheap summary surfaced by the CLI/logging layer, not part of the
/// solve path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainStats {
    pub nnodes: usize,
    pub nelems: usize,
    pub ny: usize,
    pub nlam: usize,
}

pub struct Domain {
    mesh: Mesh,
    tag_to_data: BTreeMap<i32, ElemData>,
    active: BTreeSet<i64>,
    vid2node: Vid2Node,
    cid2elem: BTreeMap<i64, AnyElement>,
    dof2tnum: Dof2Tnum,
    eq_lookup: NodeEqLookup,
    essential: EssentialBcs,
    pt_natural: PtNaturalBcs,

    pub sol: Solution,
    pub kb: KbBuilder,
    pub fb: Vec<f64>,
    pub wb: Vec<f64>,

    ny: usize,
    nlam: usize,
    steady: bool,
    axisym: bool,
    pstress: bool,
}

fn dof_keys_for_etype(etype: &str, ndim: usize) -> Vec<DofKey> {
    match etype {
        "u" => {
            if ndim == 3 {
                vec![DofKey::Ux, DofKey::Uy, DofKey::Uz]
            } else {
                vec![DofKey::Ux, DofKey::Uy]
            }
        }
        "p" => vec![DofKey::Pl],
        "up" => {
            if ndim == 3 {
                vec![DofKey::Ux, DofKey::Uy, DofKey::Uz, DofKey::Pl]
            } else {
                vec![DofKey::Ux, DofKey::Uy, DofKey::Pl]
            }
        }
        "beam" => vec![DofKey::Uy, DofKey::Rz],
        "rod" | "rod_model" => {
            if ndim == 3 {
                vec![DofKey::Ux, DofKey::Uy, DofKey::Uz]
            } else {
                vec![DofKey::Ux, DofKey::Uy]
            }
        }
        "phi" => vec![DofKey::H],
        _ => Vec::new(),
    }
}

/// Essential-BC key names (§4.7): structural multi-row keys plus the
/// primary-variable keys a single-point bc can target directly.
fn is_essential_key(key: &str) -> bool {
    matches!(
        key,
        "ux" | "uy" | "uz" | "pl" | "rigid" | "incsup" | "hst"
    )
}

/// Natural-BC key -> target DOF (§4.8): `f`-prefixed force/flux keys.
fn natural_key_to_dof(key: &str) -> Option<DofKey> {
    match key {
        "fx" => Some(DofKey::Ux),
        "fy" => Some(DofKey::Uy),
        "fz" => Some(DofKey::Uz),
        "ql" => Some(DofKey::Pl),
        _ => None,
    }
}

impl Domain {
    pub fn new(mesh: Mesh, region: &RegionConfig) -> Self {
        let tag_to_data = region
            .elemsdata
            .iter()
            .map(|d| (d.tag, d.clone()))
            .collect();
        Self {
            mesh,
            tag_to_data,
            active: BTreeSet::new(),
            vid2node: Vid2Node::new(),
            cid2elem: BTreeMap::new(),
            dof2tnum: Dof2Tnum::new(),
            eq_lookup: NodeEqLookup::default(),
            essential: EssentialBcs::new(),
            pt_natural: PtNaturalBcs::new(),
            sol: Solution::new(0, 0, true, false, false),
            kb: KbBuilder::new(0, 0, 0),
            fb: Vec::new(),
            wb: Vec::new(),
            ny: 0,
            nlam: 0,
            steady: true,
            axisym: false,
            pstress: false,
        }
    }

    pub fn stats(&self) -> DomainStats {
        DomainStats {
            nnodes: self.vid2node.len(),
            nelems: self.cid2elem.len(),
            ny: self.ny,
            nlam: self.nlam,
        }
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nlam(&self) -> usize {
        self.nlam
    }

    pub fn elements(&self) -> impl Iterator<Item = &AnyElement> {
        self.cid2elem.values()
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut AnyElement> {
        self.cid2elem.values_mut()
    }

    pub fn t1_eqs(&self) -> &[usize] {
        &self.dof2tnum.t1eqs
    }

    pub fn t2_eqs(&self) -> &[usize] {
        &self.dof2tnum.t2eqs
    }

    /// `Start()` (§5): reset `Kb`/`Fb` without releasing capacity.
    pub fn start_system(&mut self) {
        self.kb.start();
        self.fb.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Returns the global equation for `(vid, key)`, creating it (and
    /// registering it with `Dof2Tnum`/`eq_lookup`) the first time this
    /// particular node/key pair is requested. Idempotent on repeat calls
    /// from a later cell sharing the same vertex.
    fn assign_eq(&mut self, vid: i64, key: DofKey) -> usize {
        let node = self.vid2node.entry(vid).or_insert_with(|| Node::new(vid));
        if let Some(existing) = node.eq_of(key) {
            return existing;
        }
        let eq = self.ny;
        node.ensure_dof(key, eq);
        self.ny += 1;
        self.dof2tnum.register(key, eq);
        self.eq_lookup.insert(vid, key, eq);
        eq
    }

    fn cell_coords(&self, cell: &Cell) -> Result<Vec<[f64; 3]>> {
        cell.verts
            .iter()
            .map(|vid| {
                let v = self
                    .mesh
                    .vertex(*vid)
                    .ok_or_else(|| FemError::Other(format!("missing vertex {vid}")))?;
                let mut c = [0.0; 3];
                for (i, x) in v.coords.iter().enumerate().take(3) {
                    c[i] = *x;
                }
                Ok(c)
            })
            .collect()
    }

    /// `SetStage(i)` (§4.2). `sim` supplies named time functions and the
    /// simulation-wide `steady`/`axisym`/`pstress` flags.
    pub fn set_stage(&mut self, stage: &StageConfig, sim: &Simulation) -> Result<()> {
        self.steady = sim.data.steady;
        self.axisym = sim.data.axisym;
        self.pstress = sim.data.pstress;

        for id in &stage.deactivate {
            self.active.remove(id);
            self.cid2elem.remove(id);
        }
        for id in &stage.activate {
            self.active.insert(*id);
        }

        let cell_ids: Vec<i64> = self
            .mesh
            .cells_in_order()
            .filter(|c| self.active.contains(&c.id))
            .map(|c| c.id)
            .collect();

        // First pass: build every non-joint element and assign equations.
        for cid in &cell_ids {
            if self.cid2elem.contains_key(cid) {
                continue;
            }
            let cell = self.mesh.cell(*cid).expect("active cell id must exist").clone();
            if cell.joint {
                continue;
            }
            let data = self
                .tag_to_data
                .get(&cell.tag)
                .ok_or(FemError::UnknownCellTag(cell.tag))?
                .clone();
            let ndim = cell.shape.ndim();
            let keys = dof_keys_for_etype(&data.etype, ndim);
            if keys.is_empty() && !matches!(data.etype.as_str(), "rjoint" | "contact" | "xfem") {
                return Err(FemError::UnknownElementType(data.etype.clone()));
            }

            // `up` elements need the union map laid out as [all u eqs
            // (vertex-major)] followed by [all p eqs (vertex-major)]
            // (documented convention on `ElemUp::set_eqs`); every other
            // kind uses a plain per-vertex row.
            let table: Vec<Vec<usize>> = if data.etype == "up" {
                let mut u_block = Vec::new();
                for vid in &cell.verts {
                    for key in [DofKey::Ux, DofKey::Uy, DofKey::Uz].into_iter().take(ndim) {
                        u_block.push(self.assign_eq(*vid, key));
                    }
                }
                let mut p_block = Vec::new();
                for vid in &cell.verts {
                    p_block.push(self.assign_eq(*vid, DofKey::Pl));
                }
                u_block.extend(p_block);
                vec![u_block]
            } else {
                cell.verts
                    .iter()
                    .map(|vid| keys.iter().map(|&key| self.assign_eq(*vid, key)).collect())
                    .collect()
            };

            let coords = self.cell_coords(&cell)?;
            let mut elem = AnyElement::from_cell(&cell, &data, coords, self.steady)?;
            elem.set_eqs(AssemblyMap::from_table(&table));
            let extra = data.extra().map_err(|e| FemError::MalformedExtra {
                cell: cell.id,
                source: e,
            })?;
            let conds = self.cell_conds_for(&stage.eleconds, cell.tag, sim);
            elem.set_ele_conds(&conds, &extra)?;
            self.cid2elem.insert(cell.id, elem);
        }

        // Second pass: `connect` joint cells to a neighbour sharing a
        // vertex (§9, "joints adopt the DOF maps of their neighbours";
        // a full topological neighbour search is mesh-topology machinery
        // out of scope here, so this picks the first matching element).
        for cid in &cell_ids {
            let cell = self.mesh.cell(*cid).expect("active cell id must exist").clone();
            if !cell.joint || self.cid2elem.contains_key(cid) {
                continue;
            }
            let data = self
                .tag_to_data
                .get(&cell.tag)
                .ok_or(FemError::UnknownCellTag(cell.tag))?
                .clone();
            let coords = self.cell_coords(&cell)?;
            let mut elem = AnyElement::from_cell(&cell, &data, coords, self.steady)?;
            let existing_ids: Vec<i64> = self.cid2elem.keys().copied().collect();
            let neighbour = existing_ids.into_iter().find(|&other| {
                self.mesh
                    .cell(other)
                    .map(|oc| oc.verts.iter().any(|v| cell.verts.contains(v)))
                    .unwrap_or(false)
            });
            if let Some(n) = neighbour {
                elem.connect(n);
            }
            self.cid2elem.insert(cell.id, elem);
        }

        self.apply_bcs(&stage.facebcs, sim)?;
        self.apply_bcs(&stage.nodebcs, sim)?;

        let (nlam, _nnza) = self.essential.build(self.ny);
        self.nlam = nlam;

        let nyb = self.ny + self.nlam;
        self.sol = Solution::new(self.ny, self.nlam, self.steady, self.axisym, self.pstress);
        self.fb = vec![0.0; nyb];
        self.wb = vec![0.0; nyb];
        self.kb = KbBuilder::new(nyb, nyb, nyb * 8);
        Ok(())
    }

    fn cell_conds_for(&self, eleconds: &[EleCond], tag: i32, sim: &Simulation) -> Vec<ElementCond> {
        eleconds
            .iter()
            .filter(|c| c.tag == tag)
            .map(|c| {
                let value = sim
                    .function(&c.fcn)
                    .map(|f| f.eval(0.0, &|_| None))
                    .unwrap_or(0.0);
                ElementCond {
                    key: c.key.clone(),
                    value,
                }
            })
            .collect()
    }

    /// Splits a face/node BC list into `EssentialBcs`/`PtNaturalBcs` rows
    /// (§4.2, "applies face BCs (splitting into essential on YandC keys
    /// versus natural on all others)"). Both `facebcs` and `nodebcs`
    /// resolve against vertex tags here: true face-vs-node topology (an
    /// edge/face owning a subset of a cell's vertices) is mesh-topology
    /// machinery the external shape library would supply (§1), so this
    /// treats every BC entry as targeting all vertices carrying its tag.
    fn apply_bcs(&mut self, entries: &[BcEntry], sim: &Simulation) -> Result<()> {
        for entry in entries {
            let fcn = sim
                .function(&entry.fcn)
                .cloned()
                .unwrap_or(TimeFunction::Zero);
            let targets: Vec<i64> = self
                .mesh
                .verts
                .values()
                .filter(|v| v.tag == entry.tag)
                .map(|v| v.id)
                .collect();
            if targets.is_empty() {
                return Err(FemError::UnknownTag(entry.tag));
            }

            if is_essential_key(&entry.key) {
                match entry.key.as_str() {
                    "rigid" => {
                        if targets.len() < 2 {
                            continue;
                        }
                        // §4.7: couple every DOF the lead node owns, not
                        // just Ux, with the same key on each other node.
                        let lead_keys: Vec<DofKey> = self
                            .vid2node
                            .get(&targets[0])
                            .map(|n| n.dofs().iter().map(|(k, _)| *k).collect())
                            .unwrap_or_default();
                        for key in lead_keys {
                            let eq0 = self.eq_lookup.get(targets[0], key)?;
                            for &vid in &targets[1..] {
                                if let Ok(eq) = self.eq_lookup.get(vid, key) {
                                    self.essential.set_rigid(eq0, eq);
                                }
                            }
                        }
                    }
                    "incsup" => {
                        for &vid in &targets {
                            let ex = self.eq_lookup.get(vid, DofKey::Ux)?;
                            let ey = self.eq_lookup.get(vid, DofKey::Uy)?;
                            self.essential.set_incsup(ex, ey, entry.extra, fcn.clone());
                        }
                    }
                    "hst" => {
                        for &vid in &targets {
                            let eq = self.eq_lookup.get(vid, DofKey::Pl)?;
                            self.essential
                                .set_hydrostatic("hst", eq, entry.extra, fcn.clone());
                        }
                    }
                    other => {
                        let key = DofKey::parse(other)
                            .ok_or_else(|| FemError::Other(format!("unknown essential key {other}")))?;
                        for &vid in &targets {
                            let eq = self.eq_lookup.get(vid, key)?;
                            self.essential.set_single(other, eq, fcn.clone());
                        }
                    }
                }
            } else if let Some(dof) = natural_key_to_dof(&entry.key) {
                for &vid in &targets {
                    let eq = self.eq_lookup.get(vid, dof)?;
                    self.pt_natural.push(entry.key.clone(), eq, fcn.clone());
                }
            } else {
                return Err(FemError::Other(format!("unknown bc key {}", entry.key)));
            }
        }
        Ok(())
    }

    /// `star_vars`, Domain half (§4.2): recompute Psi*/Zet*/Chi* from the
    /// previous step's converged `Y`/`dYdt`/`d2Ydt2`. Called once per time
    /// step, before the Newton-Raphson loop starts — *not* on every
    /// iteration, since the starred vectors must stay fixed while `Y`
    /// itself is the unknown being iterated on.
    pub fn compute_star_vars(&mut self) {
        self.sol.compute_starred(&self.dof2tnum.t1eqs, &self.dof2tnum.t2eqs);
    }

    /// `InterpStarVars` + per-element residual assembly (§4.3 driver
    /// loop): lets every element cache its own IP-level star-variable
    /// interpolants before contributing to `fb`.
    pub fn assemble_rhs(&mut self) -> Result<()> {
        for elem in self.cid2elem.values_mut() {
            elem.interp_star_vars(&self.sol);
        }
        for elem in self.cid2elem.values() {
            elem.add_to_rhs(&mut self.fb[..self.ny], &self.sol)?;
        }
        self.essential.add_to_rhs(&mut self.fb, &self.sol, self.ny, &|_| None);
        self.pt_natural.add_to_rhs(&mut self.fb, self.sol.t, &|_| None)?;
        Ok(())
    }

    pub fn assemble_kb(&mut self, first_it: bool) -> Result<()> {
        for elem in self.cid2elem.values() {
            elem.add_to_kb(&mut self.kb, &self.sol, first_it)?;
        }
        self.essential.put_mat_and_mat_t(self.ny, &mut self.kb);
        Ok(())
    }

    pub fn update_elements(&mut self) -> Result<()> {
        for elem in self.cid2elem.values_mut() {
            elem.update(&self.sol)?;
        }
        Ok(())
    }

    /// `BackupIvs(aux)` (§4.9 step g): snapshot every stateful element's
    /// internal variables so a later iteration can re-`Update` from the
    /// same baseline rather than accumulating across trial increments.
    pub fn backup_ivs(&mut self, aux: bool) {
        for elem in self.cid2elem.values_mut() {
            elem.backup_ivs(aux);
        }
    }

    pub fn restore_ivs(&mut self, aux: bool) {
        for elem in self.cid2elem.values_mut() {
            elem.restore_ivs(aux);
        }
    }

    /// Direct element lookup by cell id, used by the `import` ini-state
    /// dispatch to `Decode` a checkpointed payload back into place.
    pub fn element_mut(&mut self, cid: i64) -> Option<&mut AnyElement> {
        self.cid2elem.get_mut(&cid)
    }

    /// `SetIniVals(i, zeroSol?)` (§4.2): optionally zero `Sol`, install
    /// the stage's configured initial-state strategy into `Y`, then call
    /// every stateful element's `SetIniIvs` so per-IP internal variables
    /// (density, effective stress, ...) are derived consistently with the
    /// values just installed. `IniState::Import` is handled by the caller
    /// (it needs the run's `dirout`/`key`, which `Domain` does not own).
    pub fn set_ini_vals(&mut self, ini: &IniState, sim: &Simulation) -> Result<()> {
        if ini.zero_sol() {
            self.sol.y.iter_mut().for_each(|v| *v = 0.0);
            self.sol.dydt.iter_mut().for_each(|v| *v = 0.0);
            self.sol.d2ydt2.iter_mut().for_each(|v| *v = 0.0);
            self.sol.l.iter_mut().for_each(|v| *v = 0.0);
        }

        let gravity = sim
            .data
            .gravity_fcn
            .as_ref()
            .and_then(|name| sim.function(name))
            .map(|f| f.eval(self.sol.t, &|_| None))
            .unwrap_or(0.0);

        match ini {
            IniState::None { .. } => {}
            IniState::Hydrostatic { .. } => {
                self.apply_hydrostatic_pl(sim.data.water_rho0, sim.data.water_level, gravity);
            }
            IniState::Geostatic { k0, .. } => {
                self.apply_hydrostatic_pl(sim.data.water_rho0, sim.data.water_level, gravity);
                self.apply_geostatic_stress(sim.data.water_rho0, sim.data.water_level, gravity, *k0)?;
            }
            IniState::ValueMap { values, .. } => self.apply_value_map(values, sim)?,
            IniState::Import { .. } => {
                return Err(FemError::Other(
                    "ini-state import must be resolved by the caller".to_string(),
                ))
            }
        }

        for elem in self.cid2elem.values_mut() {
            elem.set_ini_ivs(&self.sol)?;
        }
        Ok(())
    }

    /// Seeds every active `pl` DOF with `rhoL0 * g * (waterLevel - z)`,
    /// `z` taken from the node's last coordinate component (§4.5/§4.6,
    /// the same "vertical is the last spatial direction" convention used
    /// by `ElemP`/`ElemU`'s own gravity handling).
    fn apply_hydrostatic_pl(&mut self, rho_l0: f64, water_level: f64, g: f64) {
        let vids: Vec<i64> = self.vid2node.keys().copied().collect();
        for vid in vids {
            let eq = match self.vid2node.get(&vid).and_then(|n| n.eq_of(DofKey::Pl)) {
                Some(eq) => eq,
                None => continue,
            };
            let z = self
                .mesh
                .vertex(vid)
                .and_then(|v| v.coords.last().copied())
                .unwrap_or(0.0);
            self.sol.y[eq] = rho_l0 * g * (water_level - z);
        }
    }

    /// K0 total-vertical-stress profile (§4.6): `sigmaV = rhoL0 * g *
    /// (waterLevel - z)`, `sigmaH = k0 * sigmaV`, seeded per element from
    /// its average vertex elevation. No separate solid unit weight is
    /// modelled in this repository, so the water unit weight stands in
    /// for the total overburden magnitude; this is a deliberate
    /// simplification, not the general geostatic procedure.
    fn apply_geostatic_stress(&mut self, rho_l0: f64, water_level: f64, g: f64, k0: f64) -> Result<()> {
        let cids: Vec<i64> = self.cid2elem.keys().copied().collect();
        for cid in cids {
            let cell = match self.mesh.cell(cid) {
                Some(c) => c.clone(),
                None => continue,
            };
            let zs: Vec<f64> = cell
                .verts
                .iter()
                .filter_map(|vid| self.mesh.vertex(*vid).and_then(|v| v.coords.last().copied()))
                .collect();
            if zs.is_empty() {
                continue;
            }
            let z = zs.iter().sum::<f64>() / zs.len() as f64;
            let sigma_v = rho_l0 * g * (water_level - z);
            let sigma_h = k0 * sigma_v;
            let ndim = cell.shape.ndim();
            let nstress = if ndim == 3 { 6 } else { 4 };
            let mut s = vec![0.0; nstress];
            if ndim == 3 {
                s[0] = -sigma_h;
                s[1] = -sigma_h;
                s[2] = -sigma_v;
            } else {
                s[0] = -sigma_h;
                s[1] = -sigma_v;
                s[2] = -sigma_h;
            }

            let elem = match self.cid2elem.get_mut(&cid) {
                Some(e) => e,
                None => continue,
            };
            let n = elem.ipoints();
            if n == 0 {
                continue;
            }
            elem.set_ini_stress(&vec![s; n])?;
        }
        Ok(())
    }

    /// Explicit per-tag initial values (§4.2, "explicit initial-stress
    /// map" / "user-function-per-DOF"): `fcn` evaluated at the current
    /// time sets DOF `key` on every node carrying `tag`.
    fn apply_value_map(&mut self, values: &[IniValueEntry], sim: &Simulation) -> Result<()> {
        for entry in values {
            let key = DofKey::parse(&entry.key)
                .ok_or_else(|| FemError::Other(format!("unknown dof key {}", entry.key)))?;
            let value = sim
                .function(&entry.fcn)
                .map(|f| f.eval(self.sol.t, &|_| None))
                .unwrap_or(0.0);
            let targets: Vec<i64> = self
                .mesh
                .verts
                .values()
                .filter(|v| v.tag == entry.tag)
                .map(|v| v.id)
                .collect();
            for vid in targets {
                if let Some(eq) = self.vid2node.get(&vid).and_then(|n| n.eq_of(key)) {
                    self.sol.y[eq] = value;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gofem_model::cell::{Cell, ElemData, Shape};
    use gofem_model::config::{BcEntry, DataSection, Encoder, StepControl};
    use gofem_model::vertex::Vertex;
    use std::collections::BTreeMap;

    fn unit_quad_sim() -> (Mesh, RegionConfig, Simulation) {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Vertex::new(1, vec![0.0, 0.0], 1));
        mesh.add_vertex(Vertex::new(2, vec![1.0, 0.0], 0));
        mesh.add_vertex(Vertex::new(3, vec![1.0, 1.0], 0));
        mesh.add_vertex(Vertex::new(4, vec![0.0, 1.0], 0));
        mesh.add_cell(Cell {
            id: 1,
            shape: Shape::Quad4,
            tag: 1,
            verts: vec![1, 2, 3, 4],
            part: 0,
            joint: false,
        });

        let region = RegionConfig {
            mesh_file: "mesh.json".to_string(),
            elemsdata: vec![ElemData {
                tag: 1,
                mat: "E=1000,nu=0.3".to_string(),
                etype: "u".to_string(),
                extra: String::new(),
                nip: 4,
                nipf: 0,
            }],
        };

        let mut functions = BTreeMap::new();
        functions.insert("zero".to_string(), TimeFunction::Zero);
        let sim = Simulation {
            data: DataSection {
                steady: true,
                axisym: false,
                pstress: false,
                encoder: Encoder::Binary,
                dirout: "/tmp".to_string(),
                key: "test".to_string(),
                show_residual: false,
                water_level: 0.0,
                water_rho0: 1.0,
                water_bulk: 2.2e6,
                gravity_fcn: None,
                linsol: "native".to_string(),
            },
            functions,
            regions: vec![region.clone()],
            stages: Vec::new(),
        };
        (mesh, region, sim)
    }

    #[test]
    fn set_stage_assigns_eight_equations_for_a_single_u_quad() {
        let (mesh, region, sim) = unit_quad_sim();
        let mut domain = Domain::new(mesh, &region);
        let stage = StageConfig {
            desc: "s1".to_string(),
            skip: false,
            activate: vec![1],
            deactivate: vec![],
            facebcs: vec![BcEntry {
                tag: 1,
                key: "ux".to_string(),
                fcn: "zero".to_string(),
                extra: 0.0,
            }],
            nodebcs: vec![],
            eleconds: vec![],
            ini_state: None,
            control: StepControl {
                tf: 1.0,
                dt: 1.0,
                dtout: 1.0,
                richardson: false,
            },
        };
        domain.set_stage(&stage, &sim).unwrap();
        assert_eq!(domain.ny(), 8);
        assert_eq!(domain.nlam(), 1);
        assert_eq!(domain.stats().nelems, 1);
    }

    #[test]
    fn unknown_cell_tag_is_rejected() {
        let (mesh, mut region, sim) = unit_quad_sim();
        region.elemsdata.clear();
        let mut domain = Domain::new(mesh, &region);
        let stage = StageConfig {
            desc: "s1".to_string(),
            skip: false,
            activate: vec![1],
            deactivate: vec![],
            facebcs: vec![],
            nodebcs: vec![],
            eleconds: vec![],
            ini_state: None,
            control: StepControl {
                tf: 1.0,
                dt: 1.0,
                dtout: 1.0,
                richardson: false,
            },
        };
        let err = domain.set_stage(&stage, &sim).unwrap_err();
        assert!(matches!(err, FemError::UnknownCellTag(1)));
    }

    #[test]
    fn rigid_bc_couples_every_dof_the_lead_node_owns() {
        let (mut mesh, region, sim) = unit_quad_sim();
        // Regroup vertices 1 and 2 into a rigid link; unrelated to the
        // cell's own material tag, which stays keyed off `Cell.tag`.
        mesh.verts.get_mut(&1).unwrap().tag = 9;
        mesh.verts.get_mut(&2).unwrap().tag = 9;
        let mut domain = Domain::new(mesh, &region);
        let stage = StageConfig {
            desc: "s1".to_string(),
            skip: false,
            activate: vec![1],
            deactivate: vec![],
            facebcs: vec![BcEntry {
                tag: 9,
                key: "rigid".to_string(),
                fcn: "zero".to_string(),
                extra: 0.0,
            }],
            nodebcs: vec![],
            eleconds: vec![],
            ini_state: None,
            control: StepControl {
                tf: 1.0,
                dt: 1.0,
                dtout: 1.0,
                richardson: false,
            },
        };
        domain.set_stage(&stage, &sim).unwrap();
        // Both ux and uy of vertex 2 are coupled to vertex 1's, not just
        // ux: one multiplier row per shared DOF key.
        assert_eq!(domain.nlam(), 2);
    }

    #[test]
    fn set_ini_vals_hydrostatic_seeds_pl_from_node_elevation() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Vertex::new(1, vec![0.0, 0.0], 0));
        mesh.add_vertex(Vertex::new(2, vec![1.0, 0.0], 0));
        mesh.add_vertex(Vertex::new(3, vec![1.0, 3.0], 0));
        mesh.add_vertex(Vertex::new(4, vec![0.0, 3.0], 0));
        mesh.add_cell(Cell {
            id: 1,
            shape: Shape::Quad4,
            tag: 1,
            verts: vec![1, 2, 3, 4],
            part: 0,
            joint: false,
        });
        let region = RegionConfig {
            mesh_file: "mesh.json".to_string(),
            elemsdata: vec![ElemData {
                tag: 1,
                mat: "rhoL0=1.0,bulkL=2.2e6,klsat=1e-4".to_string(),
                etype: "p".to_string(),
                extra: String::new(),
                nip: 4,
                nipf: 0,
            }],
        };
        let mut functions = BTreeMap::new();
        functions.insert("g".to_string(), TimeFunction::Cte { value: 10.0 });
        let sim = Simulation {
            data: DataSection {
                steady: true,
                axisym: false,
                pstress: false,
                encoder: Encoder::Binary,
                dirout: "/tmp".to_string(),
                key: "test".to_string(),
                show_residual: false,
                water_level: 3.0,
                water_rho0: 1.0,
                water_bulk: 2.2e6,
                gravity_fcn: Some("g".to_string()),
                linsol: "native".to_string(),
            },
            functions,
            regions: vec![region.clone()],
            stages: Vec::new(),
        };
        let mut domain = Domain::new(mesh, &region);
        let stage = StageConfig {
            desc: "s1".to_string(),
            skip: false,
            activate: vec![1],
            deactivate: vec![],
            facebcs: vec![],
            nodebcs: vec![],
            eleconds: vec![],
            ini_state: None,
            control: StepControl {
                tf: 1.0,
                dt: 1.0,
                dtout: 1.0,
                richardson: false,
            },
        };
        domain.set_stage(&stage, &sim).unwrap();
        let ini = gofem_model::config::IniState::Hydrostatic { zero_sol: false };
        domain.set_ini_vals(&ini, &sim).unwrap();

        let eq_bottom = domain.eq_lookup.get(1, DofKey::Pl).unwrap();
        let eq_top = domain.eq_lookup.get(3, DofKey::Pl).unwrap();
        assert!((domain.sol.y[eq_bottom] - 30.0).abs() < 1e-9);
        assert!(domain.sol.y[eq_top].abs() < 1e-9);
    }
}
