//! Preparing merged fire records for the dispersion model
//!
//! - [`tranching`]: group records into fire sets and split them across workers
//! - [`vertical_levels`]: collapse plume rise profiles to fewer emission levels
//! - [`workers`]: run one worker per tranche

pub mod tranching;
pub mod vertical_levels;
pub mod workers;

pub use tranching::{
    compute_num_processes, create_fire_sets, create_fire_tranches, num_processes_for,
};
pub use vertical_levels::{
    distribute_hour_emissions, reduce_and_reallocate, EmissionLevel, ReductionFactor,
};
pub use workers::{run_tranches, TrancheContext};

use crate::config::HysplitConfig;
use crate::core_types::record::FireRecord;

/// Fire sets split into tranches using the configured process counts
pub fn prepare_tranches(records: Vec<FireRecord>, config: &HysplitConfig) -> Vec<Vec<FireRecord>> {
    let fire_sets = create_fire_sets(records);
    let num_processes = num_processes_for(fire_sets.len(), config);
    create_fire_tranches(fire_sets, num_processes)
}
