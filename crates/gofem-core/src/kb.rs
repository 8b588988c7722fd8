//! Triplet builder for the augmented Jacobian `Kb` (§3 "Domain", §5
//! "Memory": "the sparse triplet Kb retains its capacity across
//! iterations; `Start()` resets the pointer without freeing").

use nalgebra_sparse::CooMatrix;

/// Growable (row, col, value) triplet list backing the global Jacobian.
/// Elements and `EssentialBcs` push their local contributions here;
/// duplicate `(row, col)` pairs are summed when the triplets are
/// converted into a `CooMatrix` for factorisation (§4.3, "the triplet is
/// never zeroed between elements").
#[derive(Debug, Clone, Default)]
pub struct KbBuilder {
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
}

impl KbBuilder {
    pub fn new(nrows: usize, ncols: usize, capacity: usize) -> Self {
        Self {
            nrows,
            ncols,
            rows: Vec::with_capacity(capacity),
            cols: Vec::with_capacity(capacity),
            vals: Vec::with_capacity(capacity),
        }
    }

    /// Reset the triplet count to zero without releasing the backing
    /// storage (§5, "Start() resets the pointer without freeing").
    pub fn start(&mut self) {
        self.rows.clear();
        self.cols.clear();
        self.vals.clear();
    }

    pub fn push(&mut self, row: usize, col: usize, val: f64) {
        debug_assert!(row < self.nrows && col < self.ncols);
        self.rows.push(row);
        self.cols.push(col);
        self.vals.push(val);
    }

    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    pub fn to_coo(&self) -> CooMatrix<f64> {
        CooMatrix::try_from_triplets(
            self.nrows,
            self.ncols,
            self.rows.clone(),
            self.cols.clone(),
            self.vals.clone(),
        )
        .expect("triplet indices are always bounds-checked by push()")
    }
}
