//! Deterministic signal patterns for synthetic trials

use serde::{Deserialize, Serialize};

/// Shape of the noise-free component of a simulated phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SignalPattern {
    /// Constant plateau
    Constant { level: f64 },
    /// Linear drift from `start` at the phase origin
    Ramp { start: f64, slope: f64 },
    /// Slow oscillation around a baseline
    Sinusoidal {
        frequency: f64,
        amplitude: f64,
        baseline: f64,
    },
}

impl SignalPattern {
    /// Pattern value at `t` seconds from the phase origin
    pub fn value_at(&self, t: f64) -> f64 {
        match self {
            SignalPattern::Constant { level } => *level,
            SignalPattern::Ramp { start, slope } => start + slope * t,
            SignalPattern::Sinusoidal {
                frequency,
                amplitude,
                baseline,
            } => baseline + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin(),
        }
    }
}
