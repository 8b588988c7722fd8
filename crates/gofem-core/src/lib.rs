//! Transient coupled-physics finite element solver core (§2, core module
//! table): time-integration coefficients, the Solution/Dof/Domain state,
//! the Element contract and its `u`/`p`/`u-p` implementations, the
//! Newton-Raphson and time-stepping drivers, the linear-solver backend
//! boundary, and the top-level `Fem` driver that ties a `Simulation`
//! configuration to a running solve.

pub mod backend;
pub mod constitutive;
pub mod dof;
pub mod domain;
pub mod dyncoefs;
pub mod elements;
pub mod error;
pub mod essential_bcs;
pub mod fem;
pub mod kb;
pub mod nr_driver;
pub mod pt_natural_bcs;
pub mod shapes;
pub mod solution;
pub mod time_stepping;

pub use domain::{Domain, DomainStats};
pub use dyncoefs::DynCoefs;
pub use error::{FemError, Result};
pub use fem::{Fem, FemOptions};
pub use nr_driver::{NrConfig, NrIteration, NrOutcome};
pub use solution::Solution;
pub use time_stepping::{RichardsonConfig, RunReport, StepConfig, StepReport};
