//! Merging of fires that share an id
//!
//! Inputs from several sources can describe the same fire under one id with
//! different activity. Those fires are folded into the first one seen: activity is
//! concatenated and provenance and meta are unioned. Fires whose type, fuel type or
//! meta disagree cannot be combined.

use crate::config::MergeConfig;
use crate::core_types::fire::{conflicting_meta_key, union_meta, Fire};
use crate::error::{FireDataError, MergeError};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

/// Folds fires sharing an id into one fire
#[derive(Debug, Clone, Default)]
pub struct FiresMerger {
    skip_failures: bool,
}

impl FiresMerger {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            skip_failures: config.skip_failures,
        }
    }

    /// Merge fires by id, keeping first-seen order.
    ///
    /// # Errors
    /// A per-fire conflict, unless `skip_failures` is set, in which case the
    /// conflicting fire is dropped with a warning
    pub fn merge(&self, fires: Vec<Fire>) -> Result<Vec<Fire>, MergeError> {
        let num_in = fires.len();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        let mut merged: Vec<Fire> = Vec::with_capacity(fires.len());

        for fire in fires {
            let Some(&i) = index.get(fire.id()) else {
                index.insert(fire.id().to_string(), merged.len());
                merged.push(fire);
                continue;
            };

            match combine(&merged[i], &fire) {
                Ok(combined) => merged[i] = combined,
                Err(source) if self.skip_failures => {
                    warn!("Skipping fire {}: {source}", fire.id());
                }
                Err(source) => {
                    return Err(MergeError::Fire {
                        fire_id: fire.id().to_string(),
                        source,
                    })
                }
            }
        }

        debug!("Merged {} fires into {} by id", num_in, merged.len());
        Ok(merged)
    }
}

/// Fold `other` into a copy of `base`; the result keeps `base`'s id
fn combine(base: &Fire, other: &Fire) -> Result<Fire, FireDataError> {
    if base.fire_type != other.fire_type {
        return Err(FireDataError::TypeMismatch(
            base.fire_type.to_string(),
            other.fire_type.to_string(),
        ));
    }
    if base.fuel_type != other.fuel_type {
        return Err(FireDataError::FuelTypeMismatch(
            base.fuel_type.to_string(),
            other.fuel_type.to_string(),
        ));
    }
    if let Some(key) = conflicting_meta_key(&base.meta, &other.meta) {
        return Err(FireDataError::MetaConflict(key));
    }

    let mut combined = base.clone();
    combined.original_fire_ids = base.provenance();
    combined.original_fire_ids.extend(other.provenance());
    combined.meta = union_meta(&base.meta, &other.meta);
    combined.activity.extend(other.activity.iter().cloned());
    Ok(combined)
}
