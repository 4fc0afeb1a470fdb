//! Splitting fires into balanced tranches, one per dispersion worker
//!
//! All records of one fire form a fire set, and a fire set is never split across
//! tranches. With `n` fire sets over `p` workers, the first `n % p` tranches get
//! `n / p + 1` sets and the rest get `n / p`:
//!
//! ```text
//! 4 sets, 3 processes -> [2, 1, 1]
//! ```

use crate::config::HysplitConfig;
use crate::core_types::record::FireRecord;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Group records by fire id, in first-seen order
pub fn create_fire_sets(records: Vec<FireRecord>) -> Vec<Vec<FireRecord>> {
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    let mut sets: Vec<Vec<FireRecord>> = Vec::new();
    for record in records {
        match index.get(&record.id) {
            Some(&i) => sets[i].push(record),
            None => {
                index.insert(record.id.clone(), sets.len());
                sets.push(vec![record]);
            }
        }
    }
    sets
}

/// Number of worker processes for `num_fire_sets` fire sets.
///
/// - `num_processes >= 1`: that many, but no more than there are fire sets
/// - else `num_fires_per_process >= 1`: enough processes for that many sets each,
///   capped at `num_processes_max` when it is `>= 1`
/// - else a single process
///
/// The result is always at least 1 and never more than `max(1, num_fire_sets)`.
pub fn compute_num_processes(
    num_fire_sets: usize,
    num_processes: i64,
    num_fires_per_process: i64,
    num_processes_max: i64,
) -> usize {
    let upper = num_fire_sets.max(1);
    let n = if num_processes >= 1 {
        (num_processes as usize).min(num_fire_sets)
    } else if num_fires_per_process >= 1 {
        let n = num_fire_sets.div_ceil(num_fires_per_process as usize);
        if num_processes_max >= 1 {
            n.min(num_processes_max as usize)
        } else {
            n
        }
    } else {
        1
    };
    n.clamp(1, upper)
}

/// [`compute_num_processes`] driven by the dispersion config
pub fn num_processes_for(num_fire_sets: usize, config: &HysplitConfig) -> usize {
    compute_num_processes(
        num_fire_sets,
        config.num_processes,
        config.num_fires_per_process,
        config.num_processes_max,
    )
}

/// Partition fire sets into `num_processes` tranches of near-equal set counts.
///
/// Larger tranches come first; set order and record order are preserved. No
/// tranches are produced for empty input.
pub fn create_fire_tranches(
    fire_sets: Vec<Vec<FireRecord>>,
    num_processes: usize,
) -> Vec<Vec<FireRecord>> {
    let n = fire_sets.len();
    if n == 0 {
        return Vec::new();
    }
    let p = num_processes.clamp(1, n);
    let base = n / p;
    let extra = n % p;

    let mut sets = fire_sets.into_iter();
    let tranches: Vec<Vec<FireRecord>> = (0..p)
        .map(|i| {
            let size = if i < extra { base + 1 } else { base };
            sets.by_ref().take(size).flatten().collect()
        })
        .collect();

    debug!(
        "Split {} fire sets into {} tranches of sizes {:?}",
        n,
        p,
        tranches.iter().map(Vec::len).collect::<Vec<_>>()
    );
    tranches
}
