//! Grid-aware plume merging
//!
//! Dense fire clusters can put hundreds of sources into one cell of the dispersion
//! output grid. Binning records onto a regular lat/lng grid and collapsing each
//! cell into one source keeps the source count bounded by the grid size.
//!
//! Cell index per axis is `floor((coord - sw) / spacing)`. Records outside the
//! boundary are dropped.

use crate::config::PlumeGridConfig;
use crate::core_types::fire::Fields;
use crate::core_types::geo::{Boundary, Geolocated, LatLng};
use crate::core_types::payload::Payload;
use crate::core_types::plume::PlumeriseHour;
use crate::core_types::record::FireRecord;
use crate::error::ConfigError;
use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use uuid::Uuid;

/// Merges fire records falling into the same grid cell
#[derive(Debug, Clone)]
pub struct PlumeMerger {
    spacing: f64,
    boundary: Boundary,
}

impl PlumeMerger {
    /// # Errors
    /// Missing `spacing` or boundary values, a non-positive spacing, or an
    /// invalid boundary
    pub fn new(config: &PlumeGridConfig) -> Result<Self, ConfigError> {
        let spacing = config
            .spacing
            .ok_or_else(|| ConfigError::missing("plume_merge.spacing"))?;
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(ConfigError::invalid(
                "plume_merge.spacing",
                format!("must be positive, got {spacing}"),
            ));
        }
        let boundary_config = config.boundary.clone().unwrap_or_default();
        let boundary = Boundary::from_config(&boundary_config, "plume_merge.boundary")?;
        Ok(Self { spacing, boundary })
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Grid cell containing `point`, or `None` outside the boundary
    pub fn cell_of(&self, point: LatLng) -> Option<(i64, i64)> {
        if !self.boundary.contains(point) {
            return None;
        }
        let ix = ((point.lng - self.boundary.sw.lng) / self.spacing).floor() as i64;
        let iy = ((point.lat - self.boundary.sw.lat) / self.spacing).floor() as i64;
        Some((ix, iy))
    }

    /// Centre of a grid cell
    pub fn cell_center(&self, (ix, iy): (i64, i64)) -> LatLng {
        LatLng::new(
            self.boundary.sw.lat + (iy as f64 + 0.5) * self.spacing,
            self.boundary.sw.lng + (ix as f64 + 0.5) * self.spacing,
        )
    }

    /// Bin records into cells and collapse each cell to one record.
    ///
    /// Output is ordered by cell index; single-record cells pass through unchanged.
    pub fn merge(&self, records: Vec<FireRecord>) -> Vec<FireRecord> {
        let num_in = records.len();
        let mut cells: FxHashMap<(i64, i64), Vec<FireRecord>> = FxHashMap::default();
        let mut dropped = 0usize;

        for record in records {
            match record.lat_lng().ok().and_then(|p| self.cell_of(p)) {
                Some(cell) => cells.entry(cell).or_default().push(record),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!("Dropped {} fire records outside the plume merge grid", dropped);
        }

        let mut keys: Vec<_> = cells.keys().copied().collect();
        keys.sort_unstable();

        let merged: Vec<FireRecord> = keys
            .into_iter()
            .filter_map(|key| {
                let mut members = cells.remove(&key)?;
                if members.len() == 1 {
                    return members.pop();
                }
                members.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
                Some(combine_cell(members, self.cell_center(key)))
            })
            .collect();

        debug!(
            "Plume merge reduced {} fire records to {}",
            num_in,
            merged.len()
        );
        merged
    }
}

/// Collapse all records of one cell into a single source at `center`.
///
/// Unlike the activity merger, windows may overlap here, so hourly series are
/// summed rather than overlaid.
fn combine_cell(members: Vec<FireRecord>, center: LatLng) -> FireRecord {
    let first = &members[0];
    let mut original_fire_ids = BTreeSet::new();
    let mut meta = first.meta.clone();
    let mut dropped_meta = BTreeSet::new();
    let mut timeprofiled_area: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    let mut timeprofiled_emissions: BTreeMap<NaiveDateTime, BTreeMap<String, f64>> =
        BTreeMap::new();
    let mut consumption: Option<Payload> = None;
    let mut emissions: Option<Payload> = None;
    let mut heat: Option<f64> = None;

    for record in &members {
        original_fire_ids.extend(record.provenance());
        merge_meta_lossy(&mut meta, &record.meta, &mut dropped_meta);
        if record.utc_offset != first.utc_offset {
            warn!(
                "Plume merge of fire {} ({}) into cell with offset {}",
                record.id, record.utc_offset, first.utc_offset
            );
        }
        for (hour, area) in &record.timeprofiled_area {
            *timeprofiled_area.entry(*hour).or_insert(0.0) += area;
        }
        for (hour, species) in &record.timeprofiled_emissions {
            let hourly = timeprofiled_emissions.entry(*hour).or_default();
            for (name, amount) in species {
                *hourly.entry(name.clone()).or_insert(0.0) += amount;
            }
        }
        consumption = sum_payload(consumption, record.consumption.as_ref(), &record.id);
        emissions = sum_payload(emissions, record.emissions.as_ref(), &record.id);
        if let Some(h) = record.heat {
            heat = Some(heat.unwrap_or(0.0) + h);
        }
    }
    if !dropped_meta.is_empty() {
        debug!("Plume merge dropped conflicting meta keys {:?}", dropped_meta);
    }

    FireRecord {
        id: Uuid::new_v4().to_string(),
        original_fire_ids,
        meta,
        fire_type: first.fire_type,
        fuel_type: first.fuel_type,
        start: members.iter().map(|r| r.start).min().unwrap_or(first.start),
        end: members.iter().map(|r| r.end).max().unwrap_or(first.end),
        utc_offset: first.utc_offset,
        area: members.iter().map(|r| r.area).sum(),
        latitude: center.lat,
        longitude: center.lng,
        plumerise: dominant_plumerise(&members),
        timeprofiled_area,
        timeprofiled_emissions,
        consumption,
        emissions,
        heat,
    }
}

/// Keep keys that agree; remove keys that conflict
fn merge_meta_lossy(meta: &mut Fields, other: &Fields, dropped: &mut BTreeSet<String>) {
    for (key, value) in other {
        if dropped.contains(key) {
            continue;
        }
        match meta.get(key) {
            Some(existing) if existing != value => {
                meta.remove(key);
                dropped.insert(key.clone());
            }
            Some(_) => {}
            None => {
                meta.insert(key.clone(), value.clone());
            }
        }
    }
}

fn sum_payload(acc: Option<Payload>, next: Option<&Payload>, id: &str) -> Option<Payload> {
    match Payload::deep_sum_opt(acc.as_ref(), next) {
        Ok(summed) => summed,
        Err(e) => {
            warn!("Cannot sum payload of fire {id} into plume cell: {e}");
            acc
        }
    }
}

/// Per hour, the plume rise of the member burning the most area that hour
fn dominant_plumerise(members: &[FireRecord]) -> BTreeMap<NaiveDateTime, PlumeriseHour> {
    let mut best: BTreeMap<NaiveDateTime, (f64, &PlumeriseHour)> = BTreeMap::new();
    for record in members {
        for (hour, profile) in &record.plumerise {
            let weight = record.timeprofiled_area.get(hour).copied().unwrap_or(0.0);
            match best.get(hour) {
                Some((w, _)) if *w >= weight => {}
                _ => {
                    best.insert(*hour, (weight, profile));
                }
            }
        }
    }
    best.into_iter()
        .map(|(hour, (_, profile))| (hour, profile.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::geo::{BoundaryConfig, CornerConfig};
    use crate::core_types::time::parse_naive;

    fn t(hour: u32) -> NaiveDateTime {
        parse_naive(&format!("2015-08-04T{hour:02}:00:00")).unwrap()
    }

    fn grid_config(spacing: Option<f64>) -> PlumeGridConfig {
        PlumeGridConfig {
            spacing,
            boundary: Some(BoundaryConfig {
                sw: Some(CornerConfig {
                    lat: Some(40.0),
                    lng: Some(-120.0),
                }),
                ne: Some(CornerConfig {
                    lat: Some(50.0),
                    lng: Some(-110.0),
                }),
            }),
        }
    }

    fn record(id: &str, lat: f64, lng: f64, area: f64) -> FireRecord {
        FireRecord::new(id, LatLng::new(lat, lng), t(10), t(14), area)
    }

    #[test]
    fn test_config_errors_name_the_field() {
        assert_eq!(
            PlumeMerger::new(&grid_config(None)).unwrap_err(),
            ConfigError::MissingField("plume_merge.spacing".into())
        );
        assert!(PlumeMerger::new(&grid_config(Some(0.0))).is_err());

        let mut cfg = grid_config(Some(0.5));
        cfg.boundary.as_mut().unwrap().sw.as_mut().unwrap().lat = None;
        assert_eq!(
            PlumeMerger::new(&cfg).unwrap_err(),
            ConfigError::MissingField("plume_merge.boundary.sw.lat".into())
        );
        cfg.boundary = None;
        assert_eq!(
            PlumeMerger::new(&cfg).unwrap_err(),
            ConfigError::MissingField("plume_merge.boundary.sw".into())
        );
    }

    #[test]
    fn test_cell_index() {
        let merger = PlumeMerger::new(&grid_config(Some(0.5))).unwrap();
        assert_eq!(merger.cell_of(LatLng::new(40.2, -119.9)), Some((0, 0)));
        assert_eq!(merger.cell_of(LatLng::new(41.1, -118.6)), Some((2, 2)));
        assert_eq!(merger.cell_of(LatLng::new(39.9, -119.9)), None);
        let c = merger.cell_center((2, 2));
        assert!((c.lat - 41.25).abs() < 1e-12 && (c.lng + 118.75).abs() < 1e-12);
    }

    #[test]
    fn test_single_records_pass_through_and_outside_dropped() {
        let merger = PlumeMerger::new(&grid_config(Some(0.5))).unwrap();
        let a = record("a", 40.2, -119.9, 10.0);
        let b = record("b", 45.2, -115.9, 20.0);
        let outside = record("c", 55.0, -115.0, 5.0);

        let merged = merger.merge(vec![b.clone(), outside, a.clone()]);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn test_cell_members_are_combined() {
        let merger = PlumeMerger::new(&grid_config(Some(0.5))).unwrap();
        let mut a = record("a", 40.1, -119.9, 10.0);
        let mut b = record("b", 40.3, -119.7, 30.0);
        b.start = t(12);
        b.end = t(18);
        a.timeprofiled_area.insert(t(12), 2.0);
        b.timeprofiled_area.insert(t(12), 6.0);
        a.plumerise.insert(t(12), PlumeriseHour::uniform(0.0, 500.0, 0.2));
        b.plumerise.insert(t(12), PlumeriseHour::uniform(0.0, 3000.0, 0.2));
        a.meta.insert("src".into(), "x".into());
        b.meta.insert("src".into(), "y".into());
        a.heat = Some(1.0);
        b.heat = Some(2.0);

        let merged = merger.merge(vec![a, b]);
        assert_eq!(merged.len(), 1);
        let m = &merged[0];
        assert_eq!(m.area, 40.0);
        assert_eq!((m.start, m.end), (t(10), t(18)));
        assert_eq!(m.timeprofiled_area[&t(12)], 8.0);
        // b burns more area at 12:00, so its plume wins
        assert_eq!(m.plumerise[&t(12)].top(), 3000.0);
        assert!(!m.meta.contains_key("src"));
        assert_eq!(m.heat, Some(3.0));
        assert_eq!(m.original_fire_ids.len(), 2);
        assert!((m.latitude - 40.25).abs() < 1e-12);
    }
}
