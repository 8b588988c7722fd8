//! PtNaturalBcs (§4.8): concentrated nodal loads as time functions.

use gofem_model::TimeFunction;

use crate::error::{FemError, Result};

/// One `(fKey, node, fcn, extra)` entry. `fKey` names the target DOF
/// ("fx" for "ux", "ql" for "pl", …); `node.eq` is the already-resolved
/// global equation index (missing-target-DOF is fatal at stage setup,
/// per §4.8, so by construction every `PtNaturalBc` carries a valid eq).
#[derive(Debug, Clone)]
pub struct PtNaturalBc {
    pub f_key: String,
    pub eq: usize,
    pub fcn: TimeFunction,
}

#[derive(Debug, Clone, Default)]
pub struct PtNaturalBcs {
    entries: Vec<PtNaturalBc>,
}

impl PtNaturalBcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// §4.8, "missing target DOF is fatal at stage setup": callers
    /// resolve `eq` via the Domain's node lookup before pushing here, so
    /// this constructor cannot itself fail; stage setup surfaces the
    /// lookup failure as `FemError::UnknownTag` before reaching it.
    pub fn push(&mut self, f_key: impl Into<String>, eq: usize, fcn: TimeFunction) {
        self.entries.push(PtNaturalBc {
            f_key: f_key.into(),
            eq,
            fcn,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `AddToRhs(fb, t)`: adds `fcn(t)` into `fb[eq]` for every entry
    /// (§4.8).
    pub fn add_to_rhs(&self, fb: &mut [f64], t: f64, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<()> {
        for e in &self.entries {
            let eq = e.eq;
            if eq >= fb.len() {
                return Err(FemError::Other(format!(
                    "PtNaturalBc {} targets out-of-range equation {eq}",
                    e.f_key
                )));
            }
            fb[eq] += e.fcn.eval(t, lookup);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_evaluated_function_into_target_equation() {
        let mut bcs = PtNaturalBcs::new();
        bcs.push("fx", 2, TimeFunction::Cte { value: 7.5 });
        let mut fb = vec![0.0; 5];
        bcs.add_to_rhs(&mut fb, 0.0, &|_| None).unwrap();
        assert_eq!(fb[2], 7.5);
        assert_eq!(fb[0], 0.0);
    }

    #[test]
    fn multiple_entries_on_same_equation_accumulate() {
        let mut bcs = PtNaturalBcs::new();
        bcs.push("fx", 0, TimeFunction::Cte { value: 1.0 });
        bcs.push("fx", 0, TimeFunction::Cte { value: 2.0 });
        let mut fb = vec![0.0; 1];
        bcs.add_to_rhs(&mut fb, 0.0, &|_| None).unwrap();
        assert_eq!(fb[0], 3.0);
    }
}
