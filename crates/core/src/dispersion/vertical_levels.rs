//! Vertical emission level reduction
//!
//! Plume rise describes each fire-hour with 20 quantiles between 21 edge heights.
//! Writing all 20 levels per source is costly for the dispersion model, so the
//! profile is collapsed by a factor that divides 20, and the fraction that lands in
//! the topmost reduced level is redistributed over the levels below it:
//!
//! ```text
//! fractions [0.05; 20], factor 4
//!   reduce      -> [0.2, 0.2, 0.2, 0.2, 0.2]
//!   reallocate  -> [0.25, 0.25, 0.25, 0.25, 0.0]
//! ```
//!
//! At factor 1 each level sits at the midpoint of its quantile; at coarser factors
//! each level sits at the upper edge of the quantiles it covers.

use crate::core_types::plume::{PlumeriseHour, NUM_QUANTILES};
use crate::error::{ConfigError, FireDataError};
use tracing::warn;

/// A divisor of 20 used to collapse the plume rise profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReductionFactor(u32);

impl ReductionFactor {
    pub const VALID: [u32; 6] = [1, 2, 4, 5, 10, 20];

    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] unless `factor` divides 20
    pub fn new(factor: u32) -> Result<Self, ConfigError> {
        if Self::VALID.contains(&factor) {
            Ok(Self(factor))
        } else {
            Err(ConfigError::invalid(
                "dispersion.hysplit.VERTICAL_EMISLEVELS_REDUCTION_FACTOR",
                format!("{factor} does not divide {NUM_QUANTILES}; use one of {:?}", Self::VALID),
            ))
        }
    }

    /// Largest valid factor not greater than `factor` (1 for 0)
    pub fn clamped(factor: u32) -> Self {
        let chosen = Self::VALID
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= factor)
            .unwrap_or(1);
        if chosen != factor {
            warn!("Vertical emission level reduction factor {factor} adjusted to {chosen}");
        }
        Self(chosen)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Levels remaining after reduction
    pub fn num_levels(&self) -> usize {
        NUM_QUANTILES / self.0 as usize
    }
}

impl Default for ReductionFactor {
    fn default() -> Self {
        Self(1)
    }
}

/// Collapse one fire-hour's profile and move the top level's share down.
///
/// Returns `(heights, fractions)`, each with `20 / factor` entries. With more than
/// one level the last fraction is always 0.
///
/// # Errors
/// Returns [`FireDataError::PayloadShape`] if the profile does not have 21 heights
/// and 20 fractions
pub fn reduce_and_reallocate(
    hour: &PlumeriseHour,
    factor: ReductionFactor,
) -> Result<(Vec<f64>, Vec<f64>), FireDataError> {
    if !hour.is_well_formed() {
        return Err(FireDataError::PayloadShape(format!(
            "plumerise with {} heights and {} fractions",
            hour.heights.len(),
            hour.emission_fractions.len()
        )));
    }

    let step = factor.get() as usize;
    let num_levels = factor.num_levels();
    let mut heights = Vec::with_capacity(num_levels);
    let mut fractions = Vec::with_capacity(num_levels);
    for lower in (0..NUM_QUANTILES).step_by(step) {
        let upper = lower + step;
        let height = if step == 1 {
            (hour.heights[lower] + hour.heights[upper]) / 2.0
        } else {
            hour.heights[upper]
        };
        heights.push(height);
        fractions.push(hour.emission_fractions[lower..upper].iter().sum::<f64>());
    }

    if num_levels == 1 {
        return Ok((heights, vec![1.0]));
    }

    let top = fractions[num_levels - 1];
    // The top fraction is accumulated from up to 20 terms, so allow that much rounding
    let all_in_top = 1.0 - top <= f64::EPSILON * NUM_QUANTILES as f64;
    if all_in_top {
        let share = 1.0 / (num_levels - 1) as f64;
        for f in &mut fractions[..num_levels - 1] {
            *f = share;
        }
    } else {
        let scale = 1.0 / (1.0 - top);
        for f in &mut fractions[..num_levels - 1] {
            *f *= scale;
        }
    }
    fractions[num_levels - 1] = 0.0;

    Ok((heights, fractions))
}

/// Emission amount injected at one height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionLevel {
    pub height: f64,
    pub amount: f64,
}

/// Split one hour's emissions over the reduced plume levels.
///
/// The smoldering share (`total * smolder_fraction`) is injected at
/// `smolder_height`; the rest is spread over the reduced levels by fraction.
///
/// # Errors
/// Propagates malformed profiles from [`reduce_and_reallocate`]
pub fn distribute_hour_emissions(
    hour: &PlumeriseHour,
    factor: ReductionFactor,
    total: f64,
    smolder_height: f64,
) -> Result<Vec<EmissionLevel>, FireDataError> {
    let (heights, fractions) = reduce_and_reallocate(hour, factor)?;
    let smolder = hour.smolder_fraction.clamp(0.0, 1.0);
    let lofted = total * (1.0 - smolder);

    let mut levels = Vec::with_capacity(heights.len() + 1);
    levels.push(EmissionLevel {
        height: smolder_height,
        amount: total * smolder,
    });
    levels.extend(heights.into_iter().zip(fractions).map(|(height, fraction)| EmissionLevel {
        height,
        amount: lofted * fraction,
    }));
    Ok(levels)
}
