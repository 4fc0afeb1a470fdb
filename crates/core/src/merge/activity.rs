//! Merging of co-located fire records split across time windows
//!
//! The same physical fire is often reported several times for consecutive windows
//! (a morning and an afternoon pass, one record per day). Dispersion should see one
//! source per location and contiguous window, so records at the exact same
//! coordinates whose windows do not overlap and whose `meta` agrees are combined:
//!
//! ```text
//! A: 17:00-19:00, 10 ac ─┐
//!                        ├─> 17:00-21:00, 25 ac
//! B: 19:00-21:00, 15 ac ─┘
//! ```
//!
//! Records that overlap in time are never merged, since that would double count
//! area and emissions for the shared hours.

use crate::core_types::fire::{conflicting_meta_key, union_meta};
use crate::core_types::geo::Geolocated;
use crate::core_types::payload::Payload;
use crate::core_types::record::FireRecord;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Combines co-located, non-overlapping, meta-compatible fire records
#[derive(Debug, Clone, Copy, Default)]
pub struct FireActivityMerger;

impl FireActivityMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge records into the fewest non-overlapping combined records.
    ///
    /// Buckets are keyed on bit-identical coordinates and emitted in (latitude,
    /// longitude) order; within a bucket, merge outcomes follow the stable order of
    /// record start times. Records that cannot be merged pass through unchanged.
    pub fn merge(&self, records: Vec<FireRecord>) -> Vec<FireRecord> {
        let num_in = records.len();
        let mut bucket_index: FxHashMap<(u64, u64), usize> = FxHashMap::default();
        let mut buckets: Vec<Vec<FireRecord>> = Vec::new();
        let mut unlocated = Vec::new();

        for record in records {
            let Ok(point) = record.lat_lng() else {
                warn!("Fire {} has no usable location, leaving unmerged", record.id);
                unlocated.push(record);
                continue;
            };
            let idx = *bucket_index.entry(point.bits()).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[idx].push(record);
        }

        buckets.sort_by(|a, b| {
            let (pa, pb) = (a[0].location(), b[0].location());
            pa.lat.total_cmp(&pb.lat).then(pa.lng.total_cmp(&pb.lng))
        });

        let mut merged: Vec<FireRecord> = buckets.into_iter().flat_map(merge_bucket).collect();
        merged.extend(unlocated);

        debug!("Merged {} fire records into {}", num_in, merged.len());
        merged
    }
}

/// Merge the records of one coordinate bucket
fn merge_bucket(mut bucket: Vec<FireRecord>) -> Vec<FireRecord> {
    bucket.sort_by_key(|r| r.start);

    let mut merged: Vec<FireRecord> = Vec::with_capacity(bucket.len());
    for record in bucket {
        // Candidates are tried in start order; merge results can move earlier
        merged.sort_by_key(|r| r.start);
        match merged.iter().position(|candidate| can_merge(candidate, &record)) {
            Some(i) => {
                let candidate = merged.remove(i);
                merged.insert(i, merge_two(candidate, record));
            }
            None => merged.push(record),
        }
    }
    merged
}

/// Whether two records at the same location may be combined
pub fn can_merge(a: &FireRecord, b: &FireRecord) -> bool {
    if a.window().overlaps(&b.window()) {
        debug!("Fires {} and {} overlap in time", a.id, b.id);
        return false;
    }
    if let Some(key) = conflicting_meta_key(&a.meta, &b.meta) {
        debug!("Fires {} and {} conflict on meta '{}'", a.id, b.id, key);
        return false;
    }
    for (field, x, y) in [
        ("consumption", &a.consumption, &b.consumption),
        ("emissions", &a.emissions, &b.emissions),
    ] {
        if let (Some(x), Some(y)) = (x, y) {
            if !Payload::can_sum(x, y) {
                debug!("Fires {} and {} have incompatible {} shapes", a.id, b.id, field);
                return false;
            }
        }
    }
    true
}

/// Combine two non-overlapping records into a new record with a fresh id
fn merge_two(a: FireRecord, b: FireRecord) -> FireRecord {
    let (earlier, later) = if b.start < a.start { (b, a) } else { (a, b) };

    if earlier.utc_offset != later.utc_offset {
        warn!(
            "Merging fires {} ({}) and {} ({}) with different UTC offsets; keeping {}",
            earlier.id, earlier.utc_offset, later.id, later.utc_offset, earlier.utc_offset
        );
    }

    let consumption = sum_or_keep(&earlier, &later, "consumption", |r| r.consumption.as_ref());
    let emissions = sum_or_keep(&earlier, &later, "emissions", |r| r.emissions.as_ref());
    let heat = match (earlier.heat, later.heat) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    };

    let mut original_fire_ids = earlier.provenance();
    original_fire_ids.extend(later.provenance());

    let cutoff = later.start;
    FireRecord {
        id: Uuid::new_v4().to_string(),
        original_fire_ids,
        meta: union_meta(&earlier.meta, &later.meta),
        fire_type: earlier.fire_type,
        fuel_type: earlier.fuel_type,
        start: earlier.start,
        end: later.end.max(earlier.end),
        utc_offset: earlier.utc_offset,
        area: earlier.area + later.area,
        latitude: earlier.latitude,
        longitude: earlier.longitude,
        plumerise: overlay(earlier.plumerise, later.plumerise, cutoff),
        timeprofiled_area: overlay(earlier.timeprofiled_area, later.timeprofiled_area, cutoff),
        timeprofiled_emissions: overlay(
            earlier.timeprofiled_emissions,
            later.timeprofiled_emissions,
            cutoff,
        ),
        consumption,
        emissions,
        heat,
    }
}

/// Earlier series with the later series' hours at or after `cutoff` laid on top
fn overlay<K: Ord + Copy, V>(
    mut earlier: BTreeMap<K, V>,
    later: BTreeMap<K, V>,
    cutoff: K,
) -> BTreeMap<K, V> {
    earlier.extend(later.into_iter().filter(|(hour, _)| *hour >= cutoff));
    earlier
}

/// Deep sum of a payload field. Shapes are checked by [`can_merge`]; a mismatch
/// here keeps the earlier value and warns.
fn sum_or_keep<'a>(
    earlier: &'a FireRecord,
    later: &'a FireRecord,
    field: &str,
    get: impl Fn(&'a FireRecord) -> Option<&'a Payload>,
) -> Option<Payload> {
    match Payload::deep_sum_opt(get(earlier), get(later)) {
        Ok(summed) => summed,
        Err(e) => {
            warn!("Cannot sum {field} of fires {} and {}: {e}", earlier.id, later.id);
            get(earlier).cloned()
        }
    }
}
