//! Combining fires and fire records
//!
//! - [`fires`]: fires sharing an id become one fire
//! - [`activity`]: time-contiguous records at the same location become one record
//! - [`plume`]: records in the same grid cell become one record

pub mod activity;
pub mod fires;
pub mod plume;

pub use activity::{can_merge, FireActivityMerger};
pub use fires::FiresMerger;
pub use plume::PlumeMerger;
