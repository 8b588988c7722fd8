//! Native dense-LU backend (§9, "state this as a requirement on the
//! backend": the solver must handle indefinite saddle-point systems).
//!
//! This is the one reference `LinearSolver` this repository ships,
//! mirroring the teacher's `NativeBackend`: it reconstructs a dense
//! matrix from the COO triplets and factorises with `nalgebra`'s LU
//! (not Cholesky — the augmented `[K,Aᵀ;A,0]` system is indefinite even
//! when `K` itself is SPD). Suitable for the small-to-medium problems
//! this engine's own test suite exercises; a production deployment
//! swaps in an external MUMPS-class backend behind the same trait.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;

use super::traits::{BackendError, LinearSolver};

pub struct NativeBackend {
    lu: Option<nalgebra::linalg::LU<f64, nalgebra::Dyn, nalgebra::Dyn>>,
    n: usize,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self { lu: None, n: 0 }
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSolver for NativeBackend {
    fn factorize(&mut self, kb: &CooMatrix<f64>) -> Result<(), BackendError> {
        let n = kb.nrows();
        if kb.ncols() != n {
            return Err(BackendError(format!(
                "augmented Jacobian is not square: {}x{}",
                n,
                kb.ncols()
            )));
        }
        let mut dense = DMatrix::<f64>::zeros(n, n);
        for (i, j, v) in kb.triplet_iter() {
            dense[(i, j)] += *v;
        }
        self.n = n;
        self.lu = Some(dense.lu());
        Ok(())
    }

    fn solve(&self, fb: &DVector<f64>) -> Result<DVector<f64>, BackendError> {
        let lu = self
            .lu
            .as_ref()
            .ok_or_else(|| BackendError("solve() called before factorize()".to_string()))?;
        if fb.len() != self.n {
            return Err(BackendError(format!(
                "rhs length {} does not match factorised size {}",
                fb.len(),
                self.n
            )));
        }
        lu.solve(fb)
            .ok_or_else(|| BackendError("augmented Jacobian is singular".to_string()))
    }

    fn name(&self) -> &str {
        "native-nalgebra-lu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_simple_diagonal_system() {
        let mut coo = CooMatrix::<f64>::new(2, 2);
        coo.push(0, 0, 2.0);
        coo.push(1, 1, 3.0);
        let mut backend = NativeBackend::new();
        backend.factorize(&coo).unwrap();
        let fb = DVector::from_vec(vec![4.0, 9.0]);
        let wb = backend.solve(&fb).unwrap();
        assert!((wb[0] - 2.0).abs() < 1e-12);
        assert!((wb[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn solves_indefinite_saddle_point_system() {
        // [[2,0,1],[0,2,-1],[1,-1,0]] * x = [3,1,0] -> x = [1,1,1]
        let mut coo = CooMatrix::<f64>::new(3, 3);
        let entries = [
            (0, 0, 2.0),
            (1, 1, 2.0),
            (0, 2, 1.0),
            (2, 0, 1.0),
            (1, 2, -1.0),
            (2, 1, -1.0),
        ];
        for (i, j, v) in entries {
            coo.push(i, j, v);
        }
        let mut backend = NativeBackend::new();
        backend.factorize(&coo).unwrap();
        let fb = DVector::from_vec(vec![3.0, 1.0, 0.0]);
        let wb = backend.solve(&fb).unwrap();
        for i in 0..3 {
            assert!((wb[i] - 1.0).abs() < 1e-9, "component {i} = {}", wb[i]);
        }
    }

    #[test]
    fn duplicate_triplet_entries_accumulate() {
        let mut coo = CooMatrix::<f64>::new(1, 1);
        coo.push(0, 0, 1.0);
        coo.push(0, 0, 1.0);
        let mut backend = NativeBackend::new();
        backend.factorize(&coo).unwrap();
        let wb = backend.solve(&DVector::from_vec(vec![4.0])).unwrap();
        assert!((wb[0] - 2.0).abs() < 1e-12);
    }
}
