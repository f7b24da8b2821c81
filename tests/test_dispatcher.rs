mod common;

use altrack::core::ctfmra::THRESHOLD_AUX_ID;
use altrack::core::threshold::SIGMA0;
use altrack::{
    AltrackError, ClassifierChannels, DispatcherConfig, Level2Data, SurfaceType,
    SurfaceTypeClassification, SurfaceTypeDispatcher, Waveform,
};
use approx::assert_relative_eq;
use common::{init_logger, EchoGenerator};
use ndarray::{Array1, Array2};

const N_RECORDS: usize = 40;

const SETTINGS: &str = r#"{
    "retrackers": [
        {"surface_type": "ocean", "retracker": "TFMRA"},
        {"surface_type": "lead", "retracker": "cTFMRA", "options": {"threshold": 0.95}},
        {
            "surface_type": "sea_ice",
            "retracker": "cTFMRA",
            "options": {
                "threshold": {"type": "sitype_sigma_func", "coef_fyi": [0.5], "coef_myi": [0.7]},
                "uncertainty": {"type": "fixed", "value": 0.1}
            }
        }
    ]
}"#;

const CYCLE: [SurfaceType; 4] = [
    SurfaceType::Ocean,
    SurfaceType::Lead,
    SurfaceType::SeaIce,
    SurfaceType::Land,
];

/// Random echoes, record 5 (a lead) without any power
fn granule() -> Waveform {
    let waveform = EchoGenerator::new(42, 128).waveform(N_RECORDS);
    let mut power: Array2<f64> = waveform.power().clone();
    power.row_mut(5).fill(0.0);
    Waveform::new(
        power,
        waveform.range().clone(),
        waveform.radar_mode().clone(),
        waveform.is_valid().clone(),
    )
    .unwrap()
}

fn level2() -> Level2Data {
    let flag = Array1::from_shape_fn(N_RECORDS, |i| CYCLE[i % 4]);
    let sitype = Array1::from_shape_fn(N_RECORDS, |i| if i % 8 < 4 { 0.0 } else { 1.0 });
    Level2Data::new(
        Array1::from_elem(N_RECORDS, 725_000.0),
        SurfaceTypeClassification::new(flag),
    )
    .unwrap()
    .with_sitype(sitype)
    .unwrap()
}

fn classifiers() -> ClassifierChannels {
    ClassifierChannels::new().with_channel(SIGMA0, Array1::from_elem(N_RECORDS, 20.0))
}

#[test]
fn test_dispatch_partitions_records() {
    init_logger();

    let waveform = granule();
    let mut l2 = level2();
    let original_flag = l2.surface_type.flag().clone();

    let mut dispatcher =
        SurfaceTypeDispatcher::new(DispatcherConfig::from_json_str(SETTINGS).unwrap());
    let summary = dispatcher.execute(&waveform, &classifiers(), &mut l2).unwrap();

    assert_eq!(summary.reports.len(), 3);
    for report in &summary.reports {
        assert_eq!(report.n_records, N_RECORDS / 4);
    }

    for i in 0..N_RECORDS {
        match original_flag[i] {
            SurfaceType::Land => {
                // Not configured: untouched
                assert!(l2.range.value[i].is_nan());
                assert!(l2.elevation.value[i].is_nan());
                assert!(l2.power[i].is_nan());
                assert!(!summary.invalid[i]);
            }
            _ if summary.invalid[i] => {
                assert!(l2.range.value[i].is_nan());
            }
            _ => {
                assert!(l2.range.value[i].is_finite(), "record {}", i);
                assert_relative_eq!(
                    l2.elevation.value[i],
                    l2.altitude[i] - l2.range.value[i],
                    epsilon = 1e-9
                );
            }
        }
    }

    // Radar mode is carried into the Level-2 data
    assert_eq!(l2.radar_mode.as_ref().unwrap(), waveform.radar_mode());
}

#[test]
fn test_invalid_records_consolidated() {
    init_logger();

    let mut l2 = level2();
    let mut dispatcher =
        SurfaceTypeDispatcher::new(DispatcherConfig::from_json_str(SETTINGS).unwrap());
    let summary = dispatcher.execute(&granule(), &classifiers(), &mut l2).unwrap();

    assert!(summary.invalid[5]);
    assert!(summary.n_invalid() >= 1);
    assert_eq!(l2.surface_type.flag()[5], SurfaceType::Invalid);

    let lead_report = summary
        .reports
        .iter()
        .find(|r| r.surface_type == SurfaceType::Lead)
        .unwrap();
    assert!(lead_report.n_invalid >= 1);
}

#[test]
fn test_threshold_and_uncertainty_per_surface_type() {
    init_logger();

    let mut l2 = level2();
    let mut dispatcher =
        SurfaceTypeDispatcher::new(DispatcherConfig::from_json_str(SETTINGS).unwrap());
    dispatcher.execute(&granule(), &classifiers(), &mut l2).unwrap();

    let threshold = l2.auxiliary(THRESHOLD_AUX_ID).unwrap();
    // Lead records
    assert_eq!(threshold.value[1], 0.95);
    // Sea ice records: first-year ice at 2, multi-year ice at 6
    assert_eq!(threshold.value[2], 0.5);
    assert_eq!(threshold.value[6], 0.7);
    // Ocean is retracked by the reference TFMRA which keeps no threshold output
    assert!(threshold.value[0].is_nan());

    assert_eq!(l2.range.uncertainty[2], 0.1);
    assert_eq!(l2.elevation.uncertainty[2], 0.1);
    assert_eq!(l2.range.uncertainty[0], 0.0);
}

#[test]
fn test_missing_classifier_leaves_level2_untouched() {
    init_logger();

    let settings = r#"{
        "retrackers": [
            {"surface_type": "ocean", "retracker": "TFMRA"},
            {"surface_type": "lead", "retracker": "cTFMRA",
             "options": {"threshold": {"type": "sigma_func", "coef": [0.5, 0.01]}}}
        ]
    }"#;
    let mut l2 = level2();
    let mut dispatcher =
        SurfaceTypeDispatcher::new(DispatcherConfig::from_json_str(settings).unwrap());
    let result = dispatcher.execute(&granule(), &ClassifierChannels::new(), &mut l2);

    assert!(matches!(result, Err(AltrackError::MissingClassifier(name)) if name == SIGMA0));
    assert!(l2.range.value.iter().all(|r| r.is_nan()));
    assert!(l2.radar_mode.is_none());
    assert!(l2.auxiliary_variables().is_empty());
}

#[test]
fn test_missing_classifier_ignored_without_records() {
    init_logger();

    // No polynya records in the granule
    let settings = r#"{
        "retrackers": [
            {"surface_type": "ocean", "retracker": "TFMRA"},
            {"surface_type": "polynya", "retracker": "cTFMRA",
             "options": {"threshold": {"type": "sigma_func", "coef": [0.5]}}}
        ]
    }"#;
    let mut l2 = level2();
    let mut dispatcher =
        SurfaceTypeDispatcher::new(DispatcherConfig::from_json_str(settings).unwrap());
    let summary = dispatcher
        .execute(&granule(), &ClassifierChannels::new(), &mut l2)
        .unwrap();

    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].surface_type, SurfaceType::Ocean);
}

#[test]
fn test_fatal_configuration_errors() {
    let unknown_policy = r#"{
        "retrackers": [
            {"surface_type": "lead", "retracker": "cTFMRA",
             "options": {"threshold": {"type": "lookup_table", "value": 0.5}}}
        ]
    }"#;
    assert!(matches!(
        DispatcherConfig::from_json_str(unknown_policy),
        Err(AltrackError::Config(_))
    ));

    let unknown_retracker = r#"{
        "retrackers": [{"surface_type": "lead", "retracker": "SAMOSAPlus"}]
    }"#;
    assert!(matches!(
        DispatcherConfig::from_json_str(unknown_retracker),
        Err(AltrackError::Config(_))
    ));
}

#[test]
fn test_level2_size_mismatch() {
    let waveform = granule();
    let mut l2 = Level2Data::new(
        Array1::zeros(3),
        SurfaceTypeClassification::new(Array1::from_elem(3, SurfaceType::Ocean)),
    )
    .unwrap();

    let mut dispatcher =
        SurfaceTypeDispatcher::new(DispatcherConfig::from_json_str(SETTINGS).unwrap());
    assert!(matches!(
        dispatcher.execute(&waveform, &classifiers(), &mut l2),
        Err(AltrackError::ShapeMismatch(_))
    ));
}
