//! Nested numeric payloads
//!
//! Consumption, emissions and time-profiled values arrive as nested mappings keyed
//! by category, phase and species, bottoming out in numbers or per-fuelbed arrays:
//!
//! ```text
//! { "flaming": { "PM2.5": [1.2, 0.4] }, "smoldering": { "PM2.5": [0.8, 0.1] } }
//! ```

use crate::error::FireDataError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A nested numeric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Number(f64),
    Array(Vec<f64>),
    Map(BTreeMap<String, Payload>),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Map(BTreeMap::new())
    }
}

impl Payload {
    /// Build a one-level map payload
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Payload)>) -> Self {
        Payload::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a child of a map payload
    pub fn get(&self, key: &str) -> Option<&Payload> {
        match self {
            Payload::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Sum of every numeric leaf
    pub fn total(&self) -> f64 {
        match self {
            Payload::Number(n) => *n,
            Payload::Array(values) => values.iter().sum(),
            Payload::Map(map) => map.values().map(Payload::total).sum(),
        }
    }

    /// Recursively add two same-shaped payloads.
    ///
    /// Keys present on only one side pass through unchanged, numeric leaves are
    /// added and arrays are added element-wise (a longer array keeps its tail).
    ///
    /// # Errors
    /// Returns [`FireDataError::PayloadShape`] when the two sides disagree on
    /// shape at some key, e.g. a number on one side and a map on the other.
    pub fn deep_sum(a: &Payload, b: &Payload) -> Result<Payload, FireDataError> {
        match (a, b) {
            (Payload::Number(x), Payload::Number(y)) => Ok(Payload::Number(x + y)),
            (Payload::Array(xs), Payload::Array(ys)) => Ok(Payload::Array(sum_arrays(xs, ys))),
            (Payload::Map(left), Payload::Map(right)) => {
                let mut merged = left.clone();
                for (key, value) in right {
                    let summed = match left.get(key) {
                        Some(existing) => Self::deep_sum(existing, value).map_err(|e| match e {
                            FireDataError::PayloadShape(path) => {
                                FireDataError::PayloadShape(format!("{key}.{path}"))
                            }
                            other => other,
                        })?,
                        None => value.clone(),
                    };
                    merged.insert(key.clone(), summed);
                }
                Ok(Payload::Map(merged))
            }
            _ => Err(FireDataError::PayloadShape(format!(
                "{} vs {}",
                a.kind(),
                b.kind()
            ))),
        }
    }

    /// Deep sum of two optional payloads; `None` passes the other side through
    ///
    /// # Errors
    /// Propagates shape mismatches from [`Payload::deep_sum`]
    pub fn deep_sum_opt(
        a: Option<&Payload>,
        b: Option<&Payload>,
    ) -> Result<Option<Payload>, FireDataError> {
        match (a, b) {
            (Some(a), Some(b)) => Self::deep_sum(a, b).map(Some),
            (Some(only), None) | (None, Some(only)) => Ok(Some(only.clone())),
            (None, None) => Ok(None),
        }
    }

    /// Whether [`Payload::deep_sum`] of `a` and `b` would succeed
    pub fn can_sum(a: &Payload, b: &Payload) -> bool {
        match (a, b) {
            (Payload::Number(_), Payload::Number(_)) | (Payload::Array(_), Payload::Array(_)) => {
                true
            }
            (Payload::Map(left), Payload::Map(right)) => right
                .iter()
                .all(|(key, value)| left.get(key).is_none_or(|existing| Self::can_sum(existing, value))),
            _ => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Payload::Number(_) => "number",
            Payload::Array(_) => "array",
            Payload::Map(_) => "map",
        }
    }
}

fn sum_arrays(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let (long, short) = if xs.len() >= ys.len() { (xs, ys) } else { (ys, xs) };
    long.iter()
        .enumerate()
        .map(|(i, v)| v + short.get(i).copied().unwrap_or(0.0))
        .collect()
}
