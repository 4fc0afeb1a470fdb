//! Hourly plume rise and time profile records produced by the science modules

use serde::{Deserialize, Serialize};

/// Number of vertical quantiles in a plume rise profile
pub const NUM_QUANTILES: usize = 20;

/// Plume rise for one fire-hour: 21 quantile edge heights (m) and the fraction of
/// emissions injected between each pair of edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlumeriseHour {
    pub heights: Vec<f64>,
    pub emission_fractions: Vec<f64>,
    #[serde(default)]
    pub smolder_fraction: f64,
}

impl PlumeriseHour {
    /// Uniform profile between `bottom` and `top`
    pub fn uniform(bottom: f64, top: f64, smolder_fraction: f64) -> Self {
        let step = (top - bottom) / NUM_QUANTILES as f64;
        Self {
            heights: (0..=NUM_QUANTILES).map(|i| bottom + step * i as f64).collect(),
            emission_fractions: vec![1.0 / NUM_QUANTILES as f64; NUM_QUANTILES],
            smolder_fraction,
        }
    }

    /// Whether the record has the fixed 21/20 shape
    pub fn is_well_formed(&self) -> bool {
        self.heights.len() == NUM_QUANTILES + 1 && self.emission_fractions.len() == NUM_QUANTILES
    }

    /// Top of the plume (last quantile edge)
    pub fn top(&self) -> f64 {
        self.heights.last().copied().unwrap_or(0.0)
    }
}

/// Fraction of an active area's burn falling in one local hour
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeprofileHour {
    #[serde(default)]
    pub area_fraction: f64,
    #[serde(default)]
    pub flaming: f64,
    #[serde(default)]
    pub smoldering: f64,
    #[serde(default)]
    pub residual: f64,
}

impl TimeprofileHour {
    /// Fraction for a combustion phase by name
    pub fn phase(&self, phase: &str) -> Option<f64> {
        match phase {
            "flaming" => Some(self.flaming),
            "smoldering" => Some(self.smoldering),
            "residual" => Some(self.residual),
            _ => None,
        }
    }
}
