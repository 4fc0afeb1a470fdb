//! Core types and utilities

pub mod fire;
pub mod geo;
pub mod payload;
pub mod plume;
pub mod record;
pub mod time;

pub use fire::*;
pub use geo::{Boundary, BoundaryConfig, CornerConfig, Geolocated, LatLng};
pub use payload::Payload;
pub use plume::{PlumeriseHour, TimeprofileHour, NUM_QUANTILES};
pub use record::FireRecord;
pub use time::{FilterTime, UtcOffset, Window};
