//! Named time functions consumed by boundary conditions (§6, `functions`).

use serde::{Deserialize, Serialize};

/// A scalar function of time, as named in the simulation configuration's
/// `functions` section. Evaluated by essential/natural BCs via `fcn(t)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TimeFunction {
    /// Constant value.
    Cte { value: f64 },
    /// Linear ramp `a + b*t`.
    Lin { a: f64, b: f64 },
    /// `a * cos(b*t + c)`.
    Cos { a: f64, b: f64, c: f64 },
    /// Ramps from 0 to `value` over `[t0, t1]`, then holds `value`.
    Ramp { t0: f64, t1: f64, value: f64 },
    /// Sum of two named functions, looked up by name in the owning
    /// `functions` table at evaluation time.
    Add { a: String, b: String },
    /// Always zero; the default for an unset BC magnitude.
    Zero,
}

impl TimeFunction {
    /// Evaluate at time `t`. `Add` resolves its operands via `lookup`.
    pub fn eval(&self, t: f64, lookup: &dyn Fn(&str) -> Option<f64>) -> f64 {
        match self {
            TimeFunction::Cte { value } => *value,
            TimeFunction::Lin { a, b } => a + b * t,
            TimeFunction::Cos { a, b, c } => a * (b * t + c).cos(),
            TimeFunction::Ramp { t0, t1, value } => {
                if t <= *t0 {
                    0.0
                } else if t >= *t1 {
                    *value
                } else {
                    value * (t - t0) / (t1 - t0)
                }
            }
            TimeFunction::Add { a, b } => lookup(a).unwrap_or(0.0) + lookup(b).unwrap_or(0.0),
            TimeFunction::Zero => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_clamps_outside_its_interval() {
        let f = TimeFunction::Ramp {
            t0: 1.0,
            t1: 2.0,
            value: 10.0,
        };
        let noop = |_: &str| None;
        assert_eq!(f.eval(0.0, &noop), 0.0);
        assert_eq!(f.eval(1.5, &noop), 5.0);
        assert_eq!(f.eval(3.0, &noop), 10.0);
    }

    #[test]
    fn zero_is_always_zero() {
        let noop = |_: &str| None;
        assert_eq!(TimeFunction::Zero.eval(42.0, &noop), 0.0);
    }
}
