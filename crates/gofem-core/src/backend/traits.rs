//! Linear-solver backend abstraction (§1, "sparse linear-algebra
//! backends ... are external collaborators"; §9, "the sparse solver must
//! handle indefinite saddle-point systems"). This module owns only the
//! trait boundary, mirroring the teacher's `backend/traits.rs` split
//! between the interchange format (`SparseTripletsF64`) and the
//! `LinearSolver` trait; `backend/native.rs` supplies the one reference
//! implementation this repository ships.

use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;

/// Error from a linear-solver backend.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        BackendError(s.to_string())
    }
}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

/// A factorised linear solve: `Kb * wb = fb` for the augmented
/// saddle-point system `[K, Aᵀ; A, 0]` (§4.7).
pub trait LinearSolver: Send {
    /// (Re-)factorise the augmented Jacobian. Called on the first
    /// iteration of every step, or every iteration when `CteTg` is off.
    fn factorize(&mut self, kb: &CooMatrix<f64>) -> Result<(), BackendError>;

    /// Solve `Kb * wb = fb` using the most recent factorisation.
    fn solve(&self, fb: &DVector<f64>) -> Result<DVector<f64>, BackendError>;

    fn name(&self) -> &str;
}
