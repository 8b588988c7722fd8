//! Solution state (§3, "Solution"): the stacked primary-variable vectors,
//! Lagrange multipliers, starred vectors, and current time.

use crate::dyncoefs::DynCoefs;

/// `{T; Y[ny]; Dydt[ny]; D2ydt2[ny]; ΔY[ny]; L[nλ]; Psi[ny]; Zet[ny]; Chi[ny]}`
/// plus the static flags and the current `DynCoefs`.
#[derive(Debug, Clone)]
pub struct Solution {
    pub t: f64,
    pub y: Vec<f64>,
    pub dydt: Vec<f64>,
    pub d2ydt2: Vec<f64>,
    /// Increment accumulated within the current step; needed by strain
    /// updates (§3, "ΔY").
    pub dy: Vec<f64>,
    pub l: Vec<f64>,
    /// Starred vectors (§5 integration technique), defined only on the
    /// T1/T2 equation subsets; zero elsewhere.
    pub psi: Vec<f64>,
    pub zet: Vec<f64>,
    pub chi: Vec<f64>,

    pub steady: bool,
    pub axisym: bool,
    pub pstress: bool,

    pub dyn_coefs: DynCoefs,
}

impl Solution {
    pub fn new(ny: usize, nlam: usize, steady: bool, axisym: bool, pstress: bool) -> Self {
        Self {
            t: 0.0,
            y: vec![0.0; ny],
            dydt: vec![0.0; ny],
            d2ydt2: vec![0.0; ny],
            dy: vec![0.0; ny],
            l: vec![0.0; nlam],
            psi: vec![0.0; ny],
            zet: vec![0.0; ny],
            chi: vec![0.0; ny],
            steady,
            axisym,
            pstress,
            dyn_coefs: DynCoefs::default(),
        }
    }

    pub fn ny(&self) -> usize {
        self.y.len()
    }

    pub fn nlam(&self) -> usize {
        self.l.len()
    }

    /// Reset the within-step increment accumulator (NR driver step 1).
    pub fn zero_dy(&mut self) {
        self.dy.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Recompute the starred vectors from the *previous* time-step values
    /// for the given T1/T2 equation subsets (§4.2 `star_vars`, first half;
    /// the second half, `InterpStarVars`, is an element-level operation).
    pub fn compute_starred(&mut self, t1eqs: &[usize], t2eqs: &[usize]) {
        let c = &self.dyn_coefs;
        for &i in t1eqs {
            self.psi[i] = c.beta1 * self.y[i] + c.beta2 * self.dydt[i];
        }
        for &i in t2eqs {
            self.zet[i] = c.alpha1 * self.y[i] + c.alpha2 * self.dydt[i] + c.alpha3 * self.d2ydt2[i];
            self.chi[i] = c.alpha4 * self.y[i] + c.alpha5 * self.dydt[i] + c.alpha6 * self.d2ydt2[i];
        }
    }

    /// Update first/second time-derivative vectors after a converged (or
    /// provisional) Newton increment (§4.9 step 3f).
    pub fn update_derivatives(&mut self, t1eqs: &[usize], t2eqs: &[usize]) {
        let c = self.dyn_coefs;
        for &i in t1eqs {
            self.dydt[i] = c.beta1 * self.y[i] - self.psi[i];
        }
        for &i in t2eqs {
            self.d2ydt2[i] = c.alpha1 * self.y[i] - self.zet[i];
            self.dydt[i] = c.alpha4 * self.y[i] - self.chi[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starred_vectors_are_zero_outside_their_subset() {
        let mut sol = Solution::new(4, 0, false, false, false);
        sol.y = vec![1.0, 2.0, 3.0, 4.0];
        sol.dyn_coefs.calc_both(0.1).unwrap();
        sol.compute_starred(&[0], &[1]);
        assert_eq!(sol.psi[1], 0.0);
        assert_eq!(sol.psi[2], 0.0);
        assert_eq!(sol.zet[0], 0.0);
        assert_ne!(sol.psi[0], 0.0);
    }

    #[test]
    fn update_derivatives_is_consistent_with_starred_definitions() {
        let mut sol = Solution::new(2, 0, false, false, false);
        sol.dyn_coefs.calc_both(0.1).unwrap();
        sol.y = vec![0.5, 0.0];
        sol.compute_starred(&[0], &[]);
        let psi_before = sol.psi[0];
        sol.y[0] = 0.6;
        sol.update_derivatives(&[0], &[]);
        let expected = sol.dyn_coefs.beta1 * 0.6 - psi_before;
        assert!((sol.dydt[0] - expected).abs() < 1e-12);
    }
}
