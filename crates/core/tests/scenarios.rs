//! Worked examples for each pipeline stage
use approx::assert_relative_eq;
use serde_json::json;
use smoke_sim_core::config::FilterConfig;
use smoke_sim_core::core_types::time::parse_naive;
use smoke_sim_core::dispersion::{create_fire_tranches, reduce_and_reallocate, ReductionFactor};
use smoke_sim_core::{
    ActiveArea, ActivityCollection, Fire, FireActivityFilter, FireActivityMerger, FireRecord,
    LatLng, Location, PlumeriseHour, UtcOffset,
};

#[ctor::ctor]
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn at(text: &str) -> chrono::NaiveDateTime {
    parse_naive(text).unwrap()
}

fn fire_with_area(id: &str, country: &str, area: f64) -> Fire {
    let aa = ActiveArea::new(
        at("2015-08-04T17:00:00"),
        at("2015-08-05T17:00:00"),
        UtcOffset::parse("-07:00").unwrap(),
    )
    .with_points(vec![Location::point(47.41, -121.41, area)])
    .with_field("country", country);
    Fire::new(id).with_activity(ActivityCollection::new(vec![aa]))
}

#[test]
fn test_contiguous_windows_merge_into_one_record() {
    let a = FireRecord::new(
        "A",
        LatLng::new(47.41, -121.41),
        at("2015-08-04T17:00:00"),
        at("2015-08-04T19:00:00"),
        10.0,
    );
    let b = FireRecord::new(
        "B",
        LatLng::new(47.41, -121.41),
        at("2015-08-04T19:00:00"),
        at("2015-08-04T21:00:00"),
        32.5,
    );

    let merged = FireActivityMerger::new().merge(vec![a, b]);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].start, at("2015-08-04T17:00:00"));
    assert_eq!(merged[0].end, at("2015-08-04T21:00:00"));
    assert_eq!(merged[0].area, 42.5);
    assert_eq!(merged[0].original_fire_ids.len(), 2);
}

#[test]
fn test_reduction_by_four_moves_top_level_down() {
    let hour = PlumeriseHour {
        heights: (0..=20).map(|i| 1000.0 + 100.0 * f64::from(i)).collect(),
        emission_fractions: vec![0.05; 20],
        smolder_fraction: 0.0,
    };

    let (heights, fractions) = reduce_and_reallocate(&hour, ReductionFactor::new(4).unwrap()).unwrap();

    assert_eq!(heights, [1400.0, 1800.0, 2200.0, 2600.0, 3000.0]);
    for (got, want) in fractions.iter().zip([0.25, 0.25, 0.25, 0.25, 0.0]) {
        assert_relative_eq!(*got, want, epsilon = 1e-12);
    }
}

#[test]
fn test_four_fire_sets_over_three_processes() {
    let record = |id: &str| {
        FireRecord::new(
            id,
            LatLng::new(45.0, -120.0),
            at("2015-08-04T00:00:00"),
            at("2015-08-05T00:00:00"),
            1.0,
        )
    };
    let sets: Vec<Vec<FireRecord>> = ["s1", "s2", "s3", "s4"]
        .iter()
        .map(|id| vec![record(id), record(id)])
        .collect();

    let tranches = create_fire_tranches(sets, 3);

    let sizes: Vec<_> = tranches.iter().map(Vec::len).collect();
    assert_eq!(sizes, [4, 2, 2]);
}

#[test]
fn test_area_within_bounds_is_kept() {
    let config = FilterConfig::default().with_filter("area", json!({"min": 20, "max": 120}));

    let outcome = FireActivityFilter::new(config)
        .filter(vec![fire_with_area("f", "USA", 45.0)])
        .unwrap();

    assert_eq!(outcome.kept.len(), 1);
    assert_eq!(outcome.kept[0].num_active_areas(), 1);
    assert!(outcome.removed.is_empty());
}

#[test]
fn test_blacklisted_country_removes_fire() {
    let config = FilterConfig::default().with_filter("country", json!({"blacklist": ["ZZ"]}));

    let outcome = FireActivityFilter::new(config)
        .filter(vec![fire_with_area("zz", "ZZ", 10.0), fire_with_area("us", "USA", 10.0)])
        .unwrap();

    let kept: Vec<_> = outcome.kept.iter().map(Fire::id).collect();
    let removed: Vec<_> = outcome.removed.iter().map(Fire::id).collect();
    assert_eq!(kept, ["us"]);
    assert_eq!(removed, ["zz"]);
    assert!(outcome.removed[0].activity.is_empty());
}
