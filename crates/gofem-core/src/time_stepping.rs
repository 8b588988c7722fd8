//! Time-stepping drivers (§4.10): implicit fixed-Δt with divergence-
//! triggered halving, and Richardson extrapolation with adaptive Δt.

use gofem_model::config::StepControl;

use crate::backend::LinearSolver;
use crate::domain::Domain;
use crate::error::{FemError, Result};
use crate::nr_driver::{self, rms_relative_error, NrConfig};

/// Shared controls for a single committed step, independent of which
/// outer driver (fixed-Δt or Richardson) is calling it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig {
    /// `NdvgMax`: number of times a single step may halve Δt after a
    /// diverging Newton-Raphson solve before giving up.
    pub ndvg_max: usize,
    pub nr: NrConfig,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            ndvg_max: 5,
            nr: NrConfig::default(),
        }
    }
}

/// Adaptive-Δt controls for the Richardson-extrapolation driver (§4.10).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RichardsonConfig {
    pub atol: f64,
    pub rtol: f64,
    pub mmin: f64,
    pub mmax: f64,
    pub mfac: f64,
    pub dt_min: f64,
    pub use_gustafsson: bool,
}

impl Default for RichardsonConfig {
    fn default() -> Self {
        Self {
            atol: 1e-8,
            rtol: 1e-6,
            mmin: 0.2,
            mmax: 5.0,
            mfac: 0.9,
            dt_min: 1e-10,
            use_gustafsson: true,
        }
    }
}

/// One committed (or finally-rejected-and-reported) outer step, for
/// diagnostics/logging (mirrors `NrOutcome`'s iteration trace, §A.5).
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub t: f64,
    pub dt: f64,
    pub rejected_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub output_times: Vec<f64>,
}

/// Point-in-time snapshot of everything the driver must roll back on a
/// rejected/diverging step (§4.10, "restore"): the primary-variable
/// vectors plus the current time, but not `Psi`/`Zet`/`Chi`, which are
/// unconditionally recomputed from `Y`/`Dydt`/`D2ydt2` by
/// `Domain::compute_star_vars` before every attempt.
struct SolSnapshot {
    t: f64,
    y: Vec<f64>,
    dydt: Vec<f64>,
    d2ydt2: Vec<f64>,
    l: Vec<f64>,
}

impl SolSnapshot {
    fn capture(domain: &Domain) -> Self {
        Self {
            t: domain.sol.t,
            y: domain.sol.y.clone(),
            dydt: domain.sol.dydt.clone(),
            d2ydt2: domain.sol.d2ydt2.clone(),
            l: domain.sol.l.clone(),
        }
    }

    fn restore_into(&self, domain: &mut Domain) {
        domain.sol.t = self.t;
        domain.sol.y.copy_from_slice(&self.y);
        domain.sol.dydt.copy_from_slice(&self.dydt);
        domain.sol.d2ydt2.copy_from_slice(&self.d2ydt2);
        domain.sol.l.copy_from_slice(&self.l);
    }
}

/// Attempts one committed step of nominal size `dt`, halving up to
/// `cfg.ndvg_max` times on a diverging/non-converging Newton-Raphson
/// solve (§4.10, "Implicit (fixed-Δt with optional halving)" and
/// Richardson step 1/3, which reuse the same halving behaviour for
/// their big-step/half-step sub-solves). On success, commits
/// `Domain::sol` (time advanced by the Δt that actually succeeded,
/// derivatives updated) and returns that Δt. On a non-convergence
/// failure exhausting `ndvg_max`, restores `Domain::sol` and every
/// element's internal state to the pre-attempt snapshot before
/// returning `FemError::ReContinuousDivergence`.
fn take_step(
    domain: &mut Domain,
    backend: &mut dyn LinearSolver,
    cfg: &StepConfig,
    dt: f64,
) -> Result<f64> {
    let t1 = domain.t1_eqs().to_vec();
    let t2 = domain.t2_eqs().to_vec();
    let snapshot = SolSnapshot::capture(domain);
    domain.backup_ivs(true);

    let mut attempt_dt = dt;
    for attempt in 0..=cfg.ndvg_max {
        domain.sol.dyn_coefs.calc_both(attempt_dt)?;
        domain.compute_star_vars();

        match nr_driver::solve_increment(domain, backend, &cfg.nr) {
            Ok(_) => {
                domain.sol.update_derivatives(&t1, &t2);
                domain.sol.t += attempt_dt;
                return Ok(attempt_dt);
            }
            Err(FemError::Diverging(_)) | Err(FemError::MaxIterationsReached(_)) => {
                if attempt == cfg.ndvg_max {
                    snapshot.restore_into(domain);
                    domain.restore_ivs(true);
                    return Err(FemError::ReContinuousDivergence(attempt));
                }
                tracing::warn!(attempt, attempt_dt, "step diverged, halving");
                snapshot.restore_into(domain);
                domain.restore_ivs(true);
                attempt_dt /= 2.0;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("loop always returns by the attempt == cfg.ndvg_max branch")
}

fn next_output_boundary(t: f64, dtout: f64) -> f64 {
    if dtout <= 0.0 {
        f64::INFINITY
    } else {
        t + dtout
    }
}

/// Implicit fixed-Δt driver (§4.10, first paragraph): walks from the
/// domain's current time to `control.tf` in steps of `control.dt`
/// (the last step is shortened to land exactly on `tf`), recording an
/// output time at every `dtout` boundary and at the final step.
///
/// `on_output` fires with the domain exactly at an output boundary,
/// before any further step mutates `Domain::sol` — the caller (`Fem`)
/// uses it to persist a checkpoint, since `Domain::sol` only ever holds
/// the *current* state and intermediate output states would otherwise
/// be overwritten by later steps before the driver returns.
pub fn run_implicit_fixed_dt(
    domain: &mut Domain,
    backend: &mut dyn LinearSolver,
    control: &StepControl,
    cfg: &StepConfig,
    mut on_output: impl FnMut(&Domain) -> Result<()>,
) -> Result<RunReport> {
    let mut report = RunReport::default();
    let mut next_out = next_output_boundary(domain.sol.t, control.dtout);
    const EPS: f64 = 1e-9;

    while domain.sol.t < control.tf - EPS {
        let dt = control.dt.min(control.tf - domain.sol.t);
        let used_dt = take_step(domain, backend, cfg, dt)?;
        report.steps.push(StepReport {
            t: domain.sol.t,
            dt: used_dt,
            rejected_count: 0,
        });
        if domain.sol.t >= next_out - EPS || domain.sol.t >= control.tf - EPS {
            on_output(domain)?;
            report.output_times.push(domain.sol.t);
            next_out = next_output_boundary(domain.sol.t, control.dtout);
        }
    }
    Ok(report)
}

/// Richardson-extrapolation driver (§4.10, "Richardson extrapolation").
/// Every outer step compares one full-Δt solve against two half-Δt
/// solves; steps with `rerr ≥ 1` are always rolled back to the pre-step
/// state and retried with the shrunk Δt (§9, "always restore on
/// reject"), never advancing time or accumulating the rejected attempt.
pub fn run_richardson(
    domain: &mut Domain,
    backend: &mut dyn LinearSolver,
    control: &StepControl,
    step_cfg: &StepConfig,
    re_cfg: &RichardsonConfig,
    mut on_output: impl FnMut(&Domain) -> Result<()>,
) -> Result<RunReport> {
    let mut report = RunReport::default();
    let mut next_out = next_output_boundary(domain.sol.t, control.dtout);
    let mut dt = control.dt;
    let mut prev_rerr: Option<f64> = None;
    const EPS: f64 = 1e-9;

    while domain.sol.t < control.tf - EPS {
        dt = dt.min(control.tf - domain.sol.t);
        let mut rejected = 0usize;

        loop {
            if dt < re_cfg.dt_min {
                return Err(FemError::ReAtMinStep);
            }

            let snapshot = SolSnapshot::capture(domain);
            domain.backup_ivs(true);

            take_step(domain, backend, step_cfg, dt)?;
            let y_big = domain.sol.y.clone();

            snapshot.restore_into(domain);
            domain.restore_ivs(true);

            take_step(domain, backend, step_cfg, dt / 2.0)?;
            take_step(domain, backend, step_cfg, dt / 2.0)?;
            let y_two_half = domain.sol.y.clone();

            let diff: Vec<f64> = y_two_half
                .iter()
                .zip(&y_big)
                .map(|(a, b)| a - b)
                .collect();
            let rerr = rms_relative_error(&diff, re_cfg.atol, re_cfg.rtol, &y_two_half) / 3.0;
            let m = (re_cfg.mfac / rerr.sqrt())
                .max(re_cfg.mmin)
                .min(re_cfg.mmax);
            let mut dt_new = m * dt;

            if rerr < 1.0 {
                // Gustafsson predictor (§4.10 step 6): a PI-style
                // correction folding in the previous accepted step's
                // error, shrinking `dt_new` further when the error
                // estimate is trending up rather than reacting only to
                // the latest `rerr`.
                if re_cfg.use_gustafsson {
                    if let Some(prev) = prev_rerr {
                        if prev > 0.0 {
                            let m_g = re_cfg.mfac * (prev / rerr).sqrt();
                            dt_new = dt_new.min(m_g * dt);
                        }
                    }
                }
                prev_rerr = Some(rerr.max(1e-12));
                report.steps.push(StepReport {
                    t: domain.sol.t,
                    dt,
                    rejected_count: rejected,
                });
                dt = dt_new;
                break;
            }

            tracing::warn!(rerr, dt, dt_new, "Richardson step rejected, restoring");
            snapshot.restore_into(domain);
            domain.restore_ivs(true);
            dt = dt_new;
            rejected += 1;
        }

        if domain.sol.t >= next_out - EPS || domain.sol.t >= control.tf - EPS {
            on_output(domain)?;
            report.output_times.push(domain.sol.t);
            next_out = next_output_boundary(domain.sol.t, control.dtout);
        }
    }
    Ok(report)
}
