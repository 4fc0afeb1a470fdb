//! Fire activity filtering
//!
//! Filters are applied one after another in configuration order. Each one walks
//! every fire's active areas and removes those its predicate rejects; activity
//! collections left empty are dropped, and fires left without activity move from
//! the kept set to the removed set.
//!
//! # Failure handling
//!
//! - A filter whose parameters are invalid fails the pass with
//!   [`FilterError::Config`], or is skipped with a warning when `skip_failures` is set.
//! - A predicate that cannot evaluate an active area (no location, bad area) fails
//!   the pass with [`FilterError::Fire`], or keeps that area with a warning when
//!   `skip_failures` is set.

pub mod predicates;

pub use predicates::{ActiveAreaPredicate, PredicateBuilder};

use crate::config::FilterConfig;
use crate::core_types::fire::Fire;
use crate::error::{ConfigError, FilterError};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Filter name → predicate builder
///
/// Names without a registered builder use the generic whitelist/blacklist
/// builder on the field of the same name.
#[derive(Clone)]
pub struct FilterRegistry {
    builders: FxHashMap<String, PredicateBuilder>,
    fallback: PredicateBuilder,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        let mut registry = Self {
            builders: FxHashMap::default(),
            fallback: predicates::build_field_list,
        };
        registry.register("country", predicates::build_field_list);
        registry.register("location", predicates::build_location);
        registry.register("area", predicates::build_area);
        registry.register("time", predicates::build_time);
        registry
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.builders.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("builders", &names).finish_non_exhaustive()
    }
}

impl FilterRegistry {
    /// Register (or replace) the builder for a filter name
    pub fn register(&mut self, name: &str, builder: PredicateBuilder) {
        self.builders.insert(name.to_string(), builder);
    }

    /// # Errors
    /// Whatever the builder reports for invalid parameters
    pub fn build(
        &self,
        name: &str,
        params: &Value,
    ) -> Result<Box<dyn ActiveAreaPredicate>, ConfigError> {
        let builder = self.builders.get(name).copied().unwrap_or(self.fallback);
        builder(name, params)
    }
}

/// Result of a filter pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub kept: Vec<Fire>,
    pub removed: Vec<Fire>,
}

/// Applies configured filters to fires
#[derive(Debug, Clone, Default)]
pub struct FireActivityFilter {
    config: FilterConfig,
    registry: FilterRegistry,
}

impl FireActivityFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self::with_registry(config, FilterRegistry::default())
    }

    pub fn with_registry(config: FilterConfig, registry: FilterRegistry) -> Self {
        Self { config, registry }
    }

    /// Run every configured filter over `fires`.
    ///
    /// # Errors
    /// See the module docs; nothing is returned when the pass fails
    pub fn filter(&self, fires: Vec<Fire>) -> Result<FilterOutcome, FilterError> {
        let mut outcome = FilterOutcome {
            kept: fires,
            removed: Vec::new(),
        };

        for (name, params) in &self.config.filters {
            let predicate = match self.registry.build(name, params) {
                Ok(predicate) => predicate,
                Err(source) if self.config.skip_failures => {
                    warn!("Skipping '{name}' filter: {source}");
                    continue;
                }
                Err(source) => {
                    return Err(FilterError::Config {
                        filter: name.clone(),
                        source,
                    })
                }
            };

            let num_before = outcome.kept.len();
            self.apply(name, predicate.as_ref(), &mut outcome)?;
            info!(
                "Filter '{}' removed {} of {} fires",
                name,
                num_before - outcome.kept.len(),
                num_before
            );
        }

        Ok(outcome)
    }

    fn apply(
        &self,
        name: &str,
        predicate: &dyn ActiveAreaPredicate,
        outcome: &mut FilterOutcome,
    ) -> Result<(), FilterError> {
        let mut kept = Vec::with_capacity(outcome.kept.len());
        for mut fire in outcome.kept.drain(..) {
            self.filter_fire(name, predicate, &mut fire)?;
            if fire.activity.is_empty() {
                debug!("Fire {} removed by '{}' filter", fire.id(), name);
                outcome.removed.push(fire);
            } else {
                kept.push(fire);
            }
        }
        outcome.kept = kept;
        Ok(())
    }

    /// Remove rejected active areas, then emptied collections, from one fire
    fn filter_fire(
        &self,
        name: &str,
        predicate: &dyn ActiveAreaPredicate,
        fire: &mut Fire,
    ) -> Result<(), FilterError> {
        let mut activity = std::mem::take(&mut fire.activity);
        let mut failure = None;
        let owner: &Fire = fire;

        for collection in &mut activity {
            collection.active_areas.retain_mut(|aa| {
                if failure.is_some() {
                    return true;
                }
                match predicate.remove(owner, aa) {
                    Ok(remove) => !remove,
                    Err(source) if self.config.skip_failures => {
                        warn!("'{name}' filter failed on fire {}: {source}", owner.id());
                        true
                    }
                    Err(source) => {
                        failure = Some(source);
                        true
                    }
                }
            });
        }
        activity.retain(|c| !c.active_areas.is_empty());
        fire.activity = activity;

        match failure {
            Some(source) => Err(FilterError::Fire {
                fire_id: fire.id().to_string(),
                source,
            }),
            None => Ok(()),
        }
    }
}
