mod common;

use altrack::core::threshold_range;
use altrack::{CTfmra, RadarMode, Retracker, RetrackerConfig, Tfmra, Waveform};
use approx::assert_relative_eq;
use common::{init_logger, range_window, BIN_SIZE};
use ndarray::{Array1, Array2};

const R0: f64 = 720_000.0;

/// Zero power up to bin 100, linear ramp to 1 at bin 120 (the peak)
fn ramp_waveform() -> Waveform {
    let n_bins = 121;
    let range = range_window(R0, n_bins);
    let power = Array1::from_shape_fn(n_bins, |j| {
        if j <= 100 {
            0.0
        } else {
            (j - 100) as f64 / 20.0
        }
    });
    Waveform::new(
        power.insert_axis(ndarray::Axis(0)),
        range.insert_axis(ndarray::Axis(0)),
        Array1::from(vec![RadarMode::SAR]),
        Array1::from(vec![true]),
    )
    .unwrap()
}

fn unsmoothed_config() -> RetrackerConfig {
    RetrackerConfig {
        oversampling_factor: 10,
        smoothing_window_size: [1, 1, 1],
        ..RetrackerConfig::default()
    }
}

#[test]
fn test_analytic_half_power_crossing() {
    init_logger();

    let waveform = ramp_waveform();
    // Half power is reached 10 bins up the 20 bin ramp
    let expected = R0 + 110.0 * BIN_SIZE;

    let mut reference = Tfmra::with_config(unsmoothed_config()).unwrap();
    let mut optimized = CTfmra::with_config(unsmoothed_config()).unwrap();
    reference.retrack(&waveform).unwrap();
    optimized.retrack(&waveform).unwrap();

    for retracker in [&reference as &dyn Retracker, &optimized] {
        let result = retracker.result(0).unwrap();
        assert!(!result.invalid, "{} failed", retracker.name());
        assert_relative_eq!(result.range, expected, max_relative = 1e-6);
        assert_relative_eq!(result.power, 0.5, max_relative = 1e-6);
    }
}

#[test]
fn test_degenerate_waveforms_are_invalid() {
    init_logger();

    let n_bins = 64;
    let mut power = Array2::zeros((3, n_bins));
    power.row_mut(1).fill(f64::NAN);
    power.row_mut(2).fill(3.0);
    let range = Array2::from_shape_fn((3, n_bins), |(_, j)| R0 + j as f64 * BIN_SIZE);
    let waveform = Waveform::from_flags(power, range, &[0, 1, 2]).unwrap();

    let mut retrackers: Vec<Box<dyn Retracker>> =
        vec![Box::new(Tfmra::new()), Box::new(CTfmra::new())];
    for retracker in retrackers.iter_mut() {
        assert!(retracker.retrack(&waveform).unwrap());
        let output = retracker.output().unwrap();
        for i in 0..3 {
            assert!(output.range[i].is_nan(), "{} record {}", retracker.name(), i);
            assert!(output.power[i].is_nan());
            assert!(output.invalid[i]);
        }
    }
}

#[test]
fn test_threshold_monotonic_on_filtered_waveform() {
    let waveform = ramp_waveform();
    let tfmra = Tfmra::with_config(unsmoothed_config()).unwrap();
    let preprocessed = tfmra.preprocessed_waveforms(&waveform);
    let fmi = preprocessed.first_maximum_index[0].unwrap();

    let mut previous = f64::NEG_INFINITY;
    for step in 1..20 {
        let threshold = step as f64 * 0.05;
        let crossing = threshold_range(
            preprocessed.range.row(0),
            preprocessed.power.row(0),
            fmi,
            threshold,
        )
        .unwrap();
        assert!(crossing.range >= previous, "threshold {}", threshold);
        previous = crossing.range;
    }
}

#[test]
fn test_single_bin_waveform() {
    let waveform = Waveform::from_flags(
        Array2::from_elem((1, 1), 1.0),
        Array2::from_elem((1, 1), R0),
        &[1],
    )
    .unwrap();

    let mut tfmra = Tfmra::new();
    tfmra.retrack(&waveform).unwrap();
    assert!(tfmra.output().unwrap().invalid[0]);
}
