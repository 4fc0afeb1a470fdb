//! Built-in active area predicates and their builders
//!
//! Each builder validates its own parameters and returns a predicate answering
//! "should this active area be removed?".

use crate::core_types::fire::{ActiveArea, Fire};
use crate::core_types::geo::{Boundary, BoundaryConfig, Geolocated};
use crate::core_types::time::FilterTime;
use crate::error::{ConfigError, FireDataError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Decides whether an active area is removed
pub trait ActiveAreaPredicate: Send + Sync {
    /// `true` removes the active area. Predicates may prune the area's specified
    /// points, but only after every check has succeeded. The fire's activity is
    /// detached while its areas are evaluated.
    ///
    /// # Errors
    /// Per-fire data errors (missing location, missing or negative area)
    fn remove(&self, fire: &Fire, aa: &mut ActiveArea) -> Result<bool, FireDataError>;
}

/// Builds a predicate from a filter's name and parameters
pub type PredicateBuilder =
    fn(name: &str, params: &Value) -> Result<Box<dyn ActiveAreaPredicate>, ConfigError>;

fn parse_params<T: DeserializeOwned>(name: &str, params: &Value) -> Result<T, ConfigError> {
    serde_json::from_value(params.clone())
        .map_err(|e| ConfigError::invalid(format!("filter.{name}"), e.to_string()))
}

// ============================================================================
// WHITELIST / BLACKLIST
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    whitelist: Option<Vec<Value>>,
    #[serde(default)]
    blacklist: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
enum ListMode {
    Whitelist(Vec<Value>),
    Blacklist(Vec<Value>),
}

/// Matches an active area field against a whitelist or blacklist
#[derive(Debug, Clone)]
pub struct FieldListPredicate {
    field: String,
    mode: ListMode,
}

impl ActiveAreaPredicate for FieldListPredicate {
    fn remove(&self, _fire: &Fire, aa: &mut ActiveArea) -> Result<bool, FireDataError> {
        let value = aa.field(&self.field);
        Ok(match &self.mode {
            ListMode::Whitelist(list) => value.is_none_or(|v| !list.contains(v)),
            ListMode::Blacklist(list) => value.is_some_and(|v| list.contains(v)),
        })
    }
}

/// Generic builder: filters on the field named like the filter (e.g. `country`)
///
/// # Errors
/// Neither or both of `whitelist` / `blacklist`
pub fn build_field_list(
    name: &str,
    params: &Value,
) -> Result<Box<dyn ActiveAreaPredicate>, ConfigError> {
    let params: ListParams = parse_params(name, params)?;
    let mode = match (params.whitelist, params.blacklist) {
        (Some(list), None) => ListMode::Whitelist(list),
        (None, Some(list)) => ListMode::Blacklist(list),
        (Some(_), Some(_)) => {
            return Err(ConfigError::invalid(
                format!("filter.{name}"),
                "specify whitelist or blacklist, not both",
            ))
        }
        (None, None) => {
            return Err(ConfigError::missing(format!(
                "filter.{name}.whitelist or filter.{name}.blacklist"
            )))
        }
    };
    Ok(Box::new(FieldListPredicate {
        field: name.to_string(),
        mode,
    }))
}

// ============================================================================
// LOCATION
// ============================================================================

#[derive(Debug, Deserialize)]
struct LocationParams {
    #[serde(default)]
    boundary: Option<BoundaryConfig>,
}

/// Removes locations (and then active areas) outside a bounding box
#[derive(Debug, Clone)]
pub struct LocationPredicate {
    boundary: Boundary,
}

impl ActiveAreaPredicate for LocationPredicate {
    fn remove(&self, _fire: &Fire, aa: &mut ActiveArea) -> Result<bool, FireDataError> {
        if !aa.has_location() {
            return Err(FireDataError::MissingLocation);
        }
        if aa.specified_points.is_empty() {
            let inside = match &aa.perimeter {
                Some(perimeter) => self.boundary.contains(perimeter.lat_lng()?),
                None => false,
            };
            return Ok(!inside);
        }

        let inside = aa
            .specified_points
            .iter()
            .map(|p| p.lat_lng().map(|ll| self.boundary.contains(ll)))
            .collect::<Result<Vec<bool>, _>>()?;
        let mut flags = inside.into_iter();
        aa.specified_points.retain(|_| flags.next().unwrap_or(false));
        Ok(aa.specified_points.is_empty())
    }
}

/// # Errors
/// Missing or invalid `boundary`
pub fn build_location(
    name: &str,
    params: &Value,
) -> Result<Box<dyn ActiveAreaPredicate>, ConfigError> {
    let params: LocationParams = parse_params(name, params)?;
    let boundary_config = params
        .boundary
        .ok_or_else(|| ConfigError::missing(format!("filter.{name}.boundary")))?;
    let boundary = Boundary::from_config(&boundary_config, &format!("filter.{name}.boundary"))?;
    Ok(Box::new(LocationPredicate { boundary }))
}

// ============================================================================
// AREA
// ============================================================================

#[derive(Debug, Deserialize)]
struct AreaParams {
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

/// Removes active areas whose total area is outside `[min, max]`
#[derive(Debug, Clone)]
pub struct AreaPredicate {
    min: Option<f64>,
    max: Option<f64>,
}

impl ActiveAreaPredicate for AreaPredicate {
    fn remove(&self, _fire: &Fire, aa: &mut ActiveArea) -> Result<bool, FireDataError> {
        let area = aa.total_area()?;
        Ok(self.min.is_some_and(|min| area < min) || self.max.is_some_and(|max| area > max))
    }
}

/// # Errors
/// Neither bound given, a negative bound, or `min > max`
pub fn build_area(name: &str, params: &Value) -> Result<Box<dyn ActiveAreaPredicate>, ConfigError> {
    let AreaParams { min, max } = parse_params(name, params)?;
    if min.is_none() && max.is_none() {
        return Err(ConfigError::missing(format!(
            "filter.{name}.min or filter.{name}.max"
        )));
    }
    for (key, bound) in [("min", min), ("max", max)] {
        if let Some(b) = bound {
            if !(b.is_finite() && b >= 0.0) {
                return Err(ConfigError::invalid(
                    format!("filter.{name}.{key}"),
                    format!("must be non-negative, got {b}"),
                ));
            }
        }
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(ConfigError::invalid(
                format!("filter.{name}"),
                format!("min ({lo}) greater than max ({hi})"),
            ));
        }
    }
    Ok(Box::new(AreaPredicate { min, max }))
}

// ============================================================================
// TIME
// ============================================================================

#[derive(Debug, Deserialize)]
struct TimeParams {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

/// Removes active areas whose window does not intersect `[start, end]`
#[derive(Debug, Clone)]
pub struct TimePredicate {
    start: Option<FilterTime>,
    end: Option<FilterTime>,
}

impl ActiveAreaPredicate for TimePredicate {
    fn remove(&self, _fire: &Fire, aa: &mut ActiveArea) -> Result<bool, FireDataError> {
        let offset = aa.utc_offset;
        let ends_before = self
            .start
            .is_some_and(|s| aa.end <= s.to_local(offset));
        let starts_after = self
            .end
            .is_some_and(|e| aa.start >= e.to_local(offset));
        Ok(ends_before || starts_after)
    }
}

/// # Errors
/// Neither bound given, an unparseable timestamp, or `start >= end`
pub fn build_time(name: &str, params: &Value) -> Result<Box<dyn ActiveAreaPredicate>, ConfigError> {
    let TimeParams { start, end } = parse_params(name, params)?;
    if start.is_none() && end.is_none() {
        return Err(ConfigError::missing(format!(
            "filter.{name}.start or filter.{name}.end"
        )));
    }
    let start = start
        .map(|s| FilterTime::parse(&format!("filter.{name}.start"), &s))
        .transpose()?;
    let end = end
        .map(|e| FilterTime::parse(&format!("filter.{name}.end"), &e))
        .transpose()?;

    let out_of_order = match (start, end) {
        (Some(FilterTime::Absolute(s)), Some(FilterTime::Absolute(e))) => s >= e,
        (Some(FilterTime::Local(s)), Some(FilterTime::Local(e))) => s >= e,
        _ => false,
    };
    if out_of_order {
        return Err(ConfigError::invalid(
            format!("filter.{name}"),
            "start must be before end",
        ));
    }
    Ok(Box::new(TimePredicate { start, end }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::fire::Location;
    use crate::core_types::time::{parse_naive, UtcOffset};
    use serde_json::json;

    fn area_with(points: Vec<Location>) -> ActiveArea {
        ActiveArea::new(
            parse_naive("2015-08-04T17:00:00").unwrap(),
            parse_naive("2015-08-05T17:00:00").unwrap(),
            UtcOffset::parse("-07:00").unwrap(),
        )
        .with_points(points)
    }

    fn removes(pred: &dyn ActiveAreaPredicate, aa: &mut ActiveArea) -> bool {
        pred.remove(&Fire::new("f"), aa).unwrap()
    }

    #[test]
    fn test_list_builder_requires_exactly_one_list() {
        assert!(build_field_list("country", &json!({})).is_err());
        assert!(build_field_list("country", &json!({"whitelist": ["US"], "blacklist": ["ZZ"]})).is_err());
        assert!(build_field_list("country", &json!({"whitelist": "US"})).is_err());
        assert!(build_field_list("country", &json!({"blacklist": ["ZZ"]})).is_ok());
    }

    #[test]
    fn test_whitelist_removes_absent_values() {
        let pred = build_field_list("country", &json!({"whitelist": ["USA"]})).unwrap();
        let mut usa = area_with(vec![Location::point(45.0, -120.0, 1.0)]).with_field("country", "USA");
        let mut unknown = area_with(vec![Location::point(45.0, -120.0, 1.0)]);
        assert!(!removes(pred.as_ref(), &mut usa));
        assert!(removes(pred.as_ref(), &mut unknown));
    }

    #[test]
    fn test_blacklist_reads_location_field() {
        let pred = build_field_list("country", &json!({"blacklist": ["ZZ"]})).unwrap();
        let mut zz = area_with(vec![Location::point(45.0, -120.0, 1.0).with_field("country", "ZZ")]);
        let mut unknown = area_with(vec![Location::point(45.0, -120.0, 1.0)]);
        assert!(removes(pred.as_ref(), &mut zz));
        assert!(!removes(pred.as_ref(), &mut unknown));
    }

    #[test]
    fn test_location_value_overrides_area_value() {
        let pred = build_field_list("country", &json!({"blacklist": ["ZZ"]})).unwrap();
        // Location says ZZ, its area says USA: the location wins
        let mut local_zz =
            area_with(vec![Location::point(45.0, -120.0, 1.0).with_field("country", "ZZ")])
                .with_field("country", "USA");
        let mut inherited_zz =
            area_with(vec![Location::point(45.0, -120.0, 1.0)]).with_field("country", "ZZ");
        let mut no_location = area_with(Vec::new()).with_field("country", "ZZ");
        assert!(removes(pred.as_ref(), &mut local_zz));
        assert!(removes(pred.as_ref(), &mut inherited_zz));
        assert!(removes(pred.as_ref(), &mut no_location));
    }

    #[test]
    fn test_location_prunes_points() {
        let pred = build_location(
            "location",
            &json!({"boundary": {"sw": {"lat": 40.0, "lng": -125.0}, "ne": {"lat": 50.0, "lng": -115.0}}}),
        )
        .unwrap();
        let mut aa = area_with(vec![
            Location::point(45.0, -120.0, 1.0),
            Location::point(35.0, -120.0, 1.0),
        ]);
        assert!(!removes(pred.as_ref(), &mut aa));
        assert_eq!(aa.specified_points.len(), 1);

        let mut outside = area_with(vec![Location::point(35.0, -120.0, 1.0)]);
        assert!(removes(pred.as_ref(), &mut outside));

        let mut empty = area_with(vec![]);
        assert_eq!(
            pred.remove(&Fire::new("f"), &mut empty),
            Err(FireDataError::MissingLocation)
        );
    }

    #[test]
    fn test_location_config_errors() {
        assert_eq!(
            build_location("location", &json!({})).err(),
            Some(ConfigError::MissingField("filter.location.boundary".into()))
        );
        let bad = json!({"boundary": {"sw": {"lat": 40.0, "lng": -125.0}, "ne": {"lat": 95.0, "lng": -115.0}}});
        assert!(build_location("location", &bad).is_err());
    }

    #[test]
    fn test_area_bounds() {
        let pred = build_area("area", &json!({"min": 20.0, "max": 120.0})).unwrap();
        let mut ok = area_with(vec![Location::point(45.0, -120.0, 45.0)]);
        let mut small = area_with(vec![Location::point(45.0, -120.0, 10.0)]);
        let mut large = area_with(vec![
            Location::point(45.0, -120.0, 100.0),
            Location::point(45.1, -120.0, 30.0),
        ]);
        assert!(!removes(pred.as_ref(), &mut ok));
        assert!(removes(pred.as_ref(), &mut small));
        assert!(removes(pred.as_ref(), &mut large));

        let mut negative = area_with(vec![Location::point(45.0, -120.0, -5.0)]);
        assert_eq!(
            pred.remove(&Fire::new("f"), &mut negative),
            Err(FireDataError::NegativeArea(-5.0))
        );
    }

    #[test]
    fn test_area_config_errors() {
        assert!(build_area("area", &json!({})).is_err());
        assert!(build_area("area", &json!({"min": -1.0})).is_err());
        assert!(build_area("area", &json!({"min": 50.0, "max": 10.0})).is_err());
        assert!(build_area("area", &json!({"max": 10.0})).is_ok());
    }

    #[test]
    fn test_time_window_intersection() {
        // Area burns 2015-08-04T17:00 to 2015-08-05T17:00 local (-07:00)
        let pred = build_time("time", &json!({"start": "2015-08-05T12:00:00L"})).unwrap();
        assert!(!removes(pred.as_ref(), &mut area_with(vec![])));

        let pred = build_time("time", &json!({"start": "2015-08-05T17:00:00L"})).unwrap();
        assert!(removes(pred.as_ref(), &mut area_with(vec![])));

        // 2015-08-05T00:00Z is 2015-08-04T17:00 local: area starts exactly at end
        let pred = build_time("time", &json!({"end": "2015-08-05T00:00:00Z"})).unwrap();
        assert!(removes(pred.as_ref(), &mut area_with(vec![])));

        let pred = build_time("time", &json!({"end": "2015-08-05T01:00:00Z"})).unwrap();
        assert!(!removes(pred.as_ref(), &mut area_with(vec![])));
    }

    #[test]
    fn test_time_config_errors() {
        assert!(build_time("time", &json!({})).is_err());
        assert!(build_time("time", &json!({"start": "nope"})).is_err());
        assert!(build_time(
            "time",
            &json!({"start": "2015-08-05T00:00:00Z", "end": "2015-08-04T00:00:00Z"})
        )
        .is_err());
    }
}
