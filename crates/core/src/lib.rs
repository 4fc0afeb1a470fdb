//! Smoke Simulation Core Library
//!
//! Prepares fire activity for smoke dispersion modelling:
//!
//! - [`merge`]: combine fires by id, time-contiguous records per location, and
//!   records per plume grid cell
//! - [`filter`]: drop active areas by country, bounding box, area or time window
//! - [`dispersion`]: balance fire sets across worker tranches, reduce plume rise
//!   to fewer vertical levels, and run tranche workers
//!
//! Every stage takes its configuration explicitly ([`config`]); there is no
//! global state.

// Core types and utilities
pub mod core_types;

pub mod config;
pub mod dispersion;
pub mod error;
pub mod filter;
pub mod merge;

// Re-export core types
pub use core_types::{
    ActiveArea, ActivityCollection, Fire, FireRecord, FireType, FuelType, LatLng, Location,
    Payload, PlumeriseHour, UtcOffset,
};

pub use config::PipelineConfig;
pub use error::{ConfigError, FilterError, FireDataError, MergeError, WorkerError};
pub use filter::{FilterOutcome, FilterRegistry, FireActivityFilter};
pub use merge::{FireActivityMerger, FiresMerger, PlumeMerger};
