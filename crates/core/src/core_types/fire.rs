//! Fire activity data model
//!
//! ```text
//! Fire 1-* ActivityCollection 1-* ActiveArea 1-* Location
//! ```
//!
//! An active area carries its locations either as `specified_points` or as a single
//! `perimeter`. Locations may omit fields such as `country` and inherit them from
//! the enclosing active area through [`LocationView`].

use crate::core_types::geo::{polygon_centroid, Geolocated, LatLng};
use crate::core_types::payload::Payload;
use crate::core_types::plume::{PlumeriseHour, TimeprofileHour};
use crate::core_types::time::{UtcOffset, Window};
use crate::error::FireDataError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Free-form JSON fields
pub type Fields = Map<String, Value>;

/// Fields that belong to a location and are never inherited from its active area
pub const LOCATION_ONLY_FIELDS: [&str; 9] = [
    "lat",
    "lng",
    "polygon",
    "area",
    "fuelbeds",
    "consumption",
    "emissions",
    "heat",
    "plumerise",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FireType {
    #[default]
    Wildfire,
    Rx,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    #[default]
    Natural,
    Activity,
    Piles,
}

impl fmt::Display for FireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FireType::Wildfire => "wildfire",
            FireType::Rx => "rx",
        })
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FuelType::Natural => "natural",
            FuelType::Activity => "activity",
            FuelType::Piles => "piles",
        })
    }
}

/// A specified point or perimeter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Ring of `[lng, lat]` pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<[f64; 2]>>,
    /// Burned area in acres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissions: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plumerise: BTreeMap<NaiveDateTime, PlumeriseHour>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl Location {
    pub fn point(lat: f64, lng: f64, area: f64) -> Self {
        Self {
            lat: Some(lat),
            lng: Some(lng),
            area: Some(area),
            ..Self::default()
        }
    }

    pub fn perimeter(polygon: Vec<[f64; 2]>, area: f64) -> Self {
        Self {
            polygon: Some(polygon),
            area: Some(area),
            ..Self::default()
        }
    }

    /// Set a free-form field
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

impl Geolocated for Location {
    fn lat_lng(&self) -> Result<LatLng, FireDataError> {
        if let (Some(lat), Some(lng)) = (self.lat, self.lng) {
            return Ok(LatLng::new(lat, lng));
        }
        self.polygon
            .as_deref()
            .and_then(polygon_centroid)
            .ok_or(FireDataError::MissingLocation)
    }
}

/// Read-only view of a location with field fallback to its active area
#[derive(Debug, Clone, Copy)]
pub struct LocationView<'a> {
    pub location: &'a Location,
    pub parent: Option<&'a ActiveArea>,
}

impl<'a> LocationView<'a> {
    /// Look a free-form field up locally, else on the parent active area.
    ///
    /// Location-only fields are never inherited.
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        let local = self.location.extra.get(field);
        if local.is_some() || LOCATION_ONLY_FIELDS.contains(&field) {
            return local;
        }
        self.parent.and_then(|aa| aa.extra.get(field))
    }

    pub fn utc_offset(&self) -> UtcOffset {
        self.parent.map(|aa| aa.utc_offset).unwrap_or_default()
    }
}

impl Geolocated for LocationView<'_> {
    fn lat_lng(&self) -> Result<LatLng, FireDataError> {
        self.location.lat_lng()
    }
}

/// One geographically and temporally coherent burn window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveArea {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub utc_offset: UtcOffset,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specified_points: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perimeter: Option<Location>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timeprofile: BTreeMap<NaiveDateTime, TimeprofileHour>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl ActiveArea {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, utc_offset: UtcOffset) -> Self {
        Self {
            start,
            end,
            utc_offset,
            specified_points: Vec::new(),
            perimeter: None,
            timeprofile: BTreeMap::new(),
            extra: Fields::new(),
        }
    }

    pub fn with_points(mut self, points: Vec<Location>) -> Self {
        self.specified_points = points;
        self
    }

    pub fn with_perimeter(mut self, perimeter: Location) -> Self {
        self.perimeter = Some(perimeter);
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn window(&self) -> Window {
        Window::new(self.start, self.end)
    }

    /// Specified points if any, else the perimeter
    pub fn locations(&self) -> Vec<&Location> {
        if self.specified_points.is_empty() {
            self.perimeter.iter().collect()
        } else {
            self.specified_points.iter().collect()
        }
    }

    pub fn location_views(&self) -> impl Iterator<Item = LocationView<'_>> {
        self.locations().into_iter().map(move |location| LocationView {
            location,
            parent: Some(self),
        })
    }

    pub fn has_location(&self) -> bool {
        !self.locations().is_empty()
    }

    /// Field as seen from the first location (inheriting from this area), or the
    /// area's own field when it has no location
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.location_views().next() {
            Some(view) => view.get(name),
            None => self.extra.get(name),
        }
    }

    /// Sum of location areas
    ///
    /// # Errors
    /// Missing location info, a location without area, or a negative total
    pub fn total_area(&self) -> Result<f64, FireDataError> {
        let locations = self.locations();
        if locations.is_empty() {
            return Err(FireDataError::MissingLocation);
        }
        let mut total = 0.0;
        for loc in locations {
            total += loc.area.ok_or(FireDataError::MissingArea)?;
        }
        if total < 0.0 {
            return Err(FireDataError::NegativeArea(total));
        }
        Ok(total)
    }
}

/// One temporal/spatial grouping of active areas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityCollection {
    #[serde(default)]
    pub active_areas: Vec<ActiveArea>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl ActivityCollection {
    pub fn new(active_areas: Vec<ActiveArea>) -> Self {
        Self {
            active_areas,
            extra: Fields::new(),
        }
    }
}

/// A fire and its activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fire {
    id: String,
    #[serde(rename = "type", default)]
    pub fire_type: FireType,
    #[serde(default)]
    pub fuel_type: FuelType,
    #[serde(default)]
    pub original_fire_ids: BTreeSet<String>,
    #[serde(default)]
    pub meta: Fields,
    #[serde(default)]
    pub activity: Vec<ActivityCollection>,
}

impl Fire {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fire_type: FireType::default(),
            fuel_type: FuelType::default(),
            original_fire_ids: BTreeSet::new(),
            meta: Fields::new(),
            activity: Vec::new(),
        }
    }

    pub fn with_activity(mut self, collection: ActivityCollection) -> Self {
        self.activity.push(collection);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn with_type(mut self, fire_type: FireType, fuel_type: FuelType) -> Self {
        self.fire_type = fire_type;
        self.fuel_type = fuel_type;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn active_areas(&self) -> impl Iterator<Item = &ActiveArea> {
        self.activity.iter().flat_map(|c| c.active_areas.iter())
    }

    pub fn num_active_areas(&self) -> usize {
        self.active_areas().count()
    }

    /// Total area over every active area
    ///
    /// # Errors
    /// Propagates [`ActiveArea::total_area`] failures
    pub fn total_area(&self) -> Result<f64, FireDataError> {
        self.active_areas().map(ActiveArea::total_area).sum()
    }

    /// Original ids, falling back to the fire's own id for unmerged fires
    pub fn provenance(&self) -> BTreeSet<String> {
        if self.original_fire_ids.is_empty() {
            BTreeSet::from([self.id.clone()])
        } else {
            self.original_fire_ids.clone()
        }
    }
}

/// First key present in both maps with different values
pub fn conflicting_meta_key(a: &Fields, b: &Fields) -> Option<String> {
    a.iter()
        .find(|(k, v)| b.get(k.as_str()).is_some_and(|other| other != *v))
        .map(|(k, _)| k.clone())
}

/// Union of two non-conflicting maps
pub fn union_meta(a: &Fields, b: &Fields) -> Fields {
    let mut merged = a.clone();
    for (k, v) in b {
        merged.entry(k.clone()).or_insert_with(|| v.clone());
    }
    merged
}
