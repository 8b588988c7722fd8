//! `Fem` (§6, "CLI surface"): the top-level driver a caller constructs
//! once per run, mirroring `NewFEM(simFile, alias, erasePrev,
//! readSummary, allowParallel, verbose) -> FEM` plus `Run()`/
//! `SetStage(i)`/`ZeroStage(i,bool)`/`SolveOneStage(i,bool)`.
//!
//! Parsing `simFile` into a `Simulation` and loading a region's mesh file
//! are both external-collaborator concerns (§1); callers hand `Fem::new`
//! an already-built `Simulation` and `Mesh` rather than file paths.

use std::path::Path;

use gofem_model::config::IniState;
use gofem_model::{Mesh, Simulation};

use crate::backend::NativeBackend;
use crate::domain::Domain;
use crate::elements::Element;
use crate::error::Result;
use crate::time_stepping::{self, RichardsonConfig, RunReport, StepConfig};
use gofem_io::{ElementPayload, NodeCheckpoint, Summary};

/// Constructor options (§6): named fields stand in for `NewFEM`'s
/// positional `(alias, erasePrev, readSummary, allowParallel, verbose)`
/// arguments.
#[derive(Debug, Clone, Default)]
pub struct FemOptions {
    /// Overrides `sim.data.key` for this run's checkpoint/summary file
    /// prefix, e.g. to keep multiple restarts of the same simulation
    /// from colliding in the same `dirout`.
    pub alias: Option<String>,
    /// Deletes any pre-existing checkpoint/summary files in `dirout`
    /// before the first stage runs.
    pub erase_prev: bool,
    /// Loads a prior run's `Summary` (output-time/residual trace) at
    /// construction instead of starting a fresh one.
    pub read_summary: bool,
    /// Selects a per-processor mesh partition from `sim.regions[]`
    /// (§5, "parallel across Domains"). This repository runs a single
    /// partition (`regions[0]`) regardless of this flag — true
    /// multi-processor partitioning is the distributed runtime's job,
    /// out of scope here — but the flag is kept so callers written
    /// against the original contract still compile.
    pub allow_parallel: bool,
    pub verbose: bool,
}

/// Owns the `Simulation` configuration, the active `Domain`, the linear
/// solver backend, and the run-level `Summary` trace.
pub struct Fem {
    sim: Simulation,
    domain: Domain,
    backend: NativeBackend,
    opts: FemOptions,
    summary: Summary,
    next_tidx: usize,
}

impl Fem {
    pub fn new(sim: Simulation, mesh: Mesh, opts: FemOptions) -> Result<Self> {
        let region = &sim.regions[0];
        let dirout = Path::new(&sim.data.dirout);
        let key = opts.alias.clone().unwrap_or_else(|| sim.data.key.clone());

        if opts.erase_prev {
            let _ = std::fs::remove_dir_all(dirout);
        }

        let summary = if opts.read_summary {
            gofem_io::load_summary(dirout, &key).unwrap_or_else(|_| Summary {
                dirout: sim.data.dirout.clone(),
                fnkey: key.clone(),
                nproc: 1,
                ..Summary::default()
            })
        } else {
            Summary {
                dirout: sim.data.dirout.clone(),
                fnkey: key.clone(),
                nproc: 1,
                ..Summary::default()
            }
        };
        let next_tidx = summary.out_times.len();

        let domain = Domain::new(mesh, region);
        tracing::info!(stages = sim.stages.len(), "Fem initialised");

        Ok(Self {
            sim,
            domain,
            backend: NativeBackend::new(),
            opts,
            summary,
            next_tidx,
        })
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    fn key(&self) -> String {
        self.opts
            .alias
            .clone()
            .unwrap_or_else(|| self.sim.data.key.clone())
    }

    /// `SetStage(i)` (§6): activates stage `i`'s elements/equations/BCs
    /// on the current `Domain` without advancing time or solving, then
    /// dispatches the stage's `SetIniVals` instruction (§4.2) if one is
    /// configured.
    pub fn set_stage(&mut self, i: usize) -> Result<()> {
        let stage = &self.sim.stages[i];
        if stage.skip {
            tracing::info!(stage = i, "stage skipped");
            return Ok(());
        }
        let _span = tracing::info_span!("stage", i).entered();
        self.domain.set_stage(stage, &self.sim)?;
        if let Some(ini) = self.sim.stages[i].ini_state.clone() {
            self.apply_ini_state(&ini)?;
        }
        Ok(())
    }

    /// `SetIniVals(i, zeroSol?)` (§4.2). `IniState::Import` needs this
    /// run's `dirout`/`key`/`encoder`, which `Domain` does not own, so it
    /// is resolved here by loading a prior checkpoint straight into the
    /// domain's `Sol` and `Decode`-ing each element's saved payload,
    /// bypassing the geostatic/hydrostatic/value-map computation that
    /// the other variants run through `Domain::set_ini_vals`.
    fn apply_ini_state(&mut self, ini: &IniState) -> Result<()> {
        tracing::info!("applying initial-state dispatch");
        if let IniState::Import { tidx, .. } = ini {
            let dirout = self.sim.data.dirout.clone();
            let key = self.key();
            let encoder = self.sim.data.encoder;
            let node = gofem_io::load_node_checkpoint(Path::new(&dirout), &key, 0, *tidx, encoder)?;
            self.domain.sol.t = node.t;
            self.domain.sol.y = node.y;
            self.domain.sol.dydt = node.dydt;
            self.domain.sol.d2ydt2 = node.d2ydt2;
            let payloads =
                gofem_io::load_element_checkpoint(Path::new(&dirout), &key, 0, *tidx, encoder)?;
            for p in payloads {
                if let Some(elem) = self.domain.element_mut(p.cid) {
                    elem.decode(&p.bytes)?;
                }
            }
            return Ok(());
        }
        self.domain.set_ini_vals(ini, &self.sim)
    }

    /// `ZeroStage(i, resetSol)` (§6): re-applies stage `i`'s setup and,
    /// when `reset_sol` is set, discards the carried-over solution
    /// state in favour of a zeroed one (fresh start at `t=0` rather than
    /// continuing from the previous stage's converged state).
    pub fn zero_stage(&mut self, i: usize, reset_sol: bool) -> Result<()> {
        self.set_stage(i)?;
        if reset_sol {
            let sol = &mut self.domain.sol;
            sol.t = 0.0;
            sol.y.iter_mut().for_each(|v| *v = 0.0);
            sol.dydt.iter_mut().for_each(|v| *v = 0.0);
            sol.d2ydt2.iter_mut().for_each(|v| *v = 0.0);
            sol.l.iter_mut().for_each(|v| *v = 0.0);
        }
        Ok(())
    }

    /// `SolveOneStage(i, dryRun)` (§6): activates stage `i`, then runs
    /// its time-stepping driver (implicit fixed-Δt, or Richardson
    /// extrapolation when `control.richardson` is set) to `control.tf`,
    /// persisting a checkpoint at every output boundary. `dry_run` only
    /// performs `SetStage`, useful for validating a configuration's
    /// equation numbering and BCs without paying for a solve.
    pub fn solve_one_stage(&mut self, i: usize, dry_run: bool) -> Result<RunReport> {
        self.set_stage(i)?;
        if dry_run || self.sim.stages[i].skip {
            return Ok(RunReport::default());
        }

        let control = self.sim.stages[i].control.clone();
        let step_cfg = StepConfig::default();
        let dirout = self.sim.data.dirout.clone();
        let key = self.key();
        let encoder = self.sim.data.encoder;
        let mut tidx = self.next_tidx;

        let on_output = |domain: &Domain| -> Result<()> {
            let node = NodeCheckpoint {
                t: domain.sol.t,
                y: domain.sol.y.clone(),
                dydt: domain.sol.dydt.clone(),
                d2ydt2: domain.sol.d2ydt2.clone(),
            };
            gofem_io::save_node_checkpoint(Path::new(&dirout), &key, 0, tidx, encoder, &node)?;
            let payloads: Vec<ElementPayload> = domain
                .elements()
                .map(|e| ElementPayload {
                    cid: e.id(),
                    bytes: e.encode(),
                })
                .collect();
            gofem_io::save_element_checkpoint(
                Path::new(&dirout),
                &key,
                0,
                tidx,
                encoder,
                &payloads,
            )?;
            tidx += 1;
            Ok(())
        };

        let report = if control.richardson {
            time_stepping::run_richardson(
                &mut self.domain,
                &mut self.backend,
                &control,
                &step_cfg,
                &RichardsonConfig::default(),
                on_output,
            )?
        } else {
            time_stepping::run_implicit_fixed_dt(
                &mut self.domain,
                &mut self.backend,
                &control,
                &step_cfg,
                on_output,
            )?
        };

        self.next_tidx += report.output_times.len();
        self.summary.out_times.extend(&report.output_times);
        self.summary.resid_ptrs.push(self.summary.resid_vals.len());
        self.summary
            .resid_vals
            .extend(report.steps.iter().map(|s| s.dt));
        gofem_io::save_summary(Path::new(&self.sim.data.dirout), &self.key(), &self.summary)?;

        if self.opts.verbose {
            tracing::info!(
                stage = i,
                steps = report.steps.len(),
                outputs = report.output_times.len(),
                "stage complete"
            );
        }
        Ok(report)
    }

    /// `Run()` (§6): solves every non-skipped stage in order.
    pub fn run(&mut self) -> Result<Vec<RunReport>> {
        let n = self.sim.stages.len();
        let mut reports = Vec::with_capacity(n);
        for i in 0..n {
            reports.push(self.solve_one_stage(i, false)?);
        }
        Ok(reports)
    }
}
