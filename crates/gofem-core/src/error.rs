//! Error type for `gofem-core` (§7, error-kind table).
//!
//! Variants map 1:1 onto the spec's Configuration/Topology/Numerical/
//! Convergence/RE-control/I-O rows; each carries the context (cell id,
//! equation index, key name) needed to log and display the failure
//! without a parser backtrace, mirroring `ccx-io`'s `error.rs`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FemError>;

#[derive(Error, Debug)]
pub enum FemError {
    // --- Configuration ---
    #[error("unknown element type: {0}")]
    UnknownElementType(String),

    #[error("no material named {0} in the active region")]
    MissingMaterial(String),

    #[error("malformed extra keycode for cell {cell}: {source}")]
    MalformedExtra {
        cell: i64,
        #[source]
        source: gofem_model::ModelError,
    },

    // --- Topology ---
    #[error("cell tag {0} has no matching elemsdata entry")]
    UnknownCellTag(i32),

    #[error("node/face tag {0} matches no vertex in the active stage")]
    UnknownTag(i32),

    // --- Numerical ---
    #[error("Jacobian is negative at integration point {ip} of cell {cell}")]
    NegativeJacobian { cell: i64, ip: usize },

    #[error("constitutive model update failed for cell {cell}, ip {ip}: {reason}")]
    ConstitutiveFailure {
        cell: i64,
        ip: usize,
        reason: String,
    },

    #[error("linear solver failed: {0}")]
    LinearSolverFailure(String),

    // --- Convergence ---
    #[error("Newton-Raphson exceeded {0} iterations without converging")]
    MaxIterationsReached(usize),

    #[error("Newton-Raphson diverged at iteration {0}")]
    Diverging(usize),

    // --- RE control ---
    #[error("Richardson extrapolation rejected the step at the minimum allowed Δt")]
    ReAtMinStep,

    #[error("Richardson extrapolation saw continuous divergence over {0} retries")]
    ReContinuousDivergence(usize),

    // --- I/O ---
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] gofem_io::IoError),

    #[error("imported state dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    // --- DynCoefs / misc numerical setup ---
    #[error("invalid time step Δt = {0}: must be positive")]
    InvalidTimeStep(f64),

    #[error("DynCoefs parameters produced a non-finite coefficient")]
    NonFiniteCoefficient,

    #[error("{0}")]
    Other(String),
}

impl From<gofem_model::ModelError> for FemError {
    fn from(e: gofem_model::ModelError) -> Self {
        FemError::Other(e.to_string())
    }
}
