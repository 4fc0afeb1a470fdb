//! Flattened per-location fire records
//!
//! Dispersion works on one record per burning location rather than on the nested
//! fire structure. Each record carries the location's coordinates, its burn window,
//! the science outputs for that location and the hourly series derived from the
//! active area's time profile.

use crate::core_types::fire::{ActiveArea, Fields, Fire, FireType, FuelType, LocationView};
use crate::core_types::geo::{Geolocated, LatLng};
use crate::core_types::payload::Payload;
use crate::core_types::plume::PlumeriseHour;
use crate::core_types::time::{UtcOffset, Window};
use crate::error::FireDataError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Combustion phases in time profiles and emissions payloads
pub const PHASES: [&str; 3] = ["flaming", "smoldering", "residual"];

/// One burning location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireRecord {
    pub id: String,
    #[serde(default)]
    pub original_fire_ids: BTreeSet<String>,
    #[serde(default)]
    pub meta: Fields,
    #[serde(rename = "type", default)]
    pub fire_type: FireType,
    #[serde(default)]
    pub fuel_type: FuelType,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub utc_offset: UtcOffset,
    pub area: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub plumerise: BTreeMap<NaiveDateTime, PlumeriseHour>,
    #[serde(default)]
    pub timeprofiled_area: BTreeMap<NaiveDateTime, f64>,
    /// Hour → species → amount
    #[serde(default)]
    pub timeprofiled_emissions: BTreeMap<NaiveDateTime, BTreeMap<String, f64>>,
    #[serde(default)]
    pub consumption: Option<Payload>,
    #[serde(default)]
    pub emissions: Option<Payload>,
    #[serde(default)]
    pub heat: Option<f64>,
}

impl FireRecord {
    /// A bare record with no science outputs
    pub fn new(
        id: impl Into<String>,
        location: LatLng,
        start: NaiveDateTime,
        end: NaiveDateTime,
        area: f64,
    ) -> Self {
        let id = id.into();
        Self {
            original_fire_ids: BTreeSet::from([id.clone()]),
            id,
            meta: Fields::new(),
            fire_type: FireType::default(),
            fuel_type: FuelType::default(),
            start,
            end,
            utc_offset: UtcOffset::default(),
            area,
            latitude: location.lat,
            longitude: location.lng,
            plumerise: BTreeMap::new(),
            timeprofiled_area: BTreeMap::new(),
            timeprofiled_emissions: BTreeMap::new(),
            consumption: None,
            emissions: None,
            heat: None,
        }
    }

    pub fn window(&self) -> Window {
        Window::new(self.start, self.end)
    }

    pub fn location(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    /// Original ids, falling back to the record's own id
    pub fn provenance(&self) -> BTreeSet<String> {
        if self.original_fire_ids.is_empty() {
            BTreeSet::from([self.id.clone()])
        } else {
            self.original_fire_ids.clone()
        }
    }

    /// Sum of hourly emissions over all species
    pub fn total_timeprofiled_emissions(&self) -> f64 {
        self.timeprofiled_emissions
            .values()
            .flat_map(BTreeMap::values)
            .sum()
    }

    /// One record per location of every active area of `fire`.
    ///
    /// Records share the fire's id, so a fire's records form one fire set.
    ///
    /// # Errors
    /// A location without coordinates or geometry, or without area
    pub fn from_fire(fire: &Fire) -> Result<Vec<FireRecord>, FireDataError> {
        let mut records = Vec::new();
        for aa in fire.active_areas() {
            for view in aa.location_views() {
                records.push(Self::from_location(fire, aa, view)?);
            }
        }
        Ok(records)
    }

    fn from_location(
        fire: &Fire,
        aa: &ActiveArea,
        view: LocationView<'_>,
    ) -> Result<FireRecord, FireDataError> {
        let loc = view.location;
        let point = view.lat_lng()?;
        let area = loc.area.ok_or(FireDataError::MissingArea)?;
        if area < 0.0 {
            return Err(FireDataError::NegativeArea(area));
        }

        let mut timeprofiled_area = BTreeMap::new();
        let mut timeprofiled_emissions = BTreeMap::new();
        let per_species = loc.emissions.as_ref().map(species_by_phase);
        for (hour, profile) in &aa.timeprofile {
            timeprofiled_area.insert(*hour, area * profile.area_fraction);
            if let Some(per_species) = &per_species {
                let mut hourly = BTreeMap::new();
                for (phase, species) in per_species {
                    let fraction = profile.phase(phase).unwrap_or(0.0);
                    for (name, amount) in species {
                        *hourly.entry(name.clone()).or_insert(0.0) += amount * fraction;
                    }
                }
                timeprofiled_emissions.insert(*hour, hourly);
            }
        }

        Ok(FireRecord {
            id: fire.id().to_string(),
            original_fire_ids: fire.provenance(),
            meta: fire.meta.clone(),
            fire_type: fire.fire_type,
            fuel_type: fire.fuel_type,
            start: aa.start,
            end: aa.end,
            utc_offset: view.utc_offset(),
            area,
            latitude: point.lat,
            longitude: point.lng,
            plumerise: loc.plumerise.clone(),
            timeprofiled_area,
            timeprofiled_emissions,
            consumption: loc.consumption.clone(),
            emissions: loc.emissions.clone(),
            heat: loc.heat,
        })
    }
}

impl Geolocated for FireRecord {
    fn lat_lng(&self) -> Result<LatLng, FireDataError> {
        if self.latitude.is_finite() && self.longitude.is_finite() {
            Ok(self.location())
        } else {
            Err(FireDataError::MissingLocation)
        }
    }
}

/// Collapse an emissions payload `{phase: {species: leaf}}` to phase → species → total
fn species_by_phase(emissions: &Payload) -> Vec<(&'static str, BTreeMap<String, f64>)> {
    PHASES
        .iter()
        .filter_map(|phase| {
            let Some(Payload::Map(species)) = emissions.get(phase) else {
                return None;
            };
            let totals = species
                .iter()
                .map(|(name, leaf)| (name.clone(), leaf.total()))
                .collect();
            Some((*phase, totals))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::fire::{ActivityCollection, Location};
    use crate::core_types::plume::TimeprofileHour;
    use crate::core_types::time::parse_naive;

    fn t(text: &str) -> NaiveDateTime {
        parse_naive(text).unwrap()
    }

    #[test]
    fn test_records_from_fire_apply_timeprofile() {
        let emissions = Payload::map([
            ("flaming", Payload::map([("PM2.5", Payload::Array(vec![6.0, 4.0]))])),
            ("smoldering", Payload::map([("PM2.5", Payload::Number(10.0))])),
        ]);
        let mut point = Location::point(47.41, -121.41, 100.0);
        point.emissions = Some(emissions);
        point.heat = Some(5.0e6);

        let mut aa = ActiveArea::new(
            t("2015-08-04T17:00:00"),
            t("2015-08-04T19:00:00"),
            UtcOffset::parse("-07:00").unwrap(),
        )
        .with_points(vec![point, Location::point(47.5, -121.5, 20.0)]);
        aa.timeprofile.insert(
            t("2015-08-04T17:00:00"),
            TimeprofileHour {
                area_fraction: 0.75,
                flaming: 0.5,
                smoldering: 0.25,
                residual: 0.0,
            },
        );

        let fire = Fire::new("f1").with_activity(ActivityCollection::new(vec![aa]));
        let records = FireRecord::from_fire(&fire).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.id, "f1");
        assert_eq!(first.utc_offset.minutes(), -420);
        assert_eq!(first.timeprofiled_area[&t("2015-08-04T17:00:00")], 75.0);
        // 10 * 0.5 flaming + 10 * 0.25 smoldering
        let hourly = &first.timeprofiled_emissions[&t("2015-08-04T17:00:00")];
        assert!((hourly["PM2.5"] - 7.5).abs() < 1e-12);
        assert_eq!(first.heat, Some(5.0e6));

        // No emissions on the second point, so no hourly emissions
        assert!(records[1].timeprofiled_emissions.is_empty());
        assert!(records.iter().all(|r| r.original_fire_ids.contains("f1")));
    }

    #[test]
    fn test_missing_area_is_an_error() {
        let mut point = Location::point(47.41, -121.41, 0.0);
        point.area = None;
        let aa = ActiveArea::new(t("2015-08-04T17:00:00"), t("2015-08-04T19:00:00"), UtcOffset::default())
            .with_points(vec![point]);
        let fire = Fire::new("f1").with_activity(ActivityCollection::new(vec![aa]));
        assert_eq!(FireRecord::from_fire(&fire), Err(FireDataError::MissingArea));
    }
}
