use crate::types::WaveformFailure;
use ndarray::ArrayView1;

/// Gradients below this (normalized power per meter) cannot be inverted
const MIN_GRADIENT: f64 = 1.0e-12;

/// Retracked point on the filtered waveform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdCrossing {
    pub range: f64,
    /// Power at the retracked point in normalized units
    pub power: f64,
}

/// Range where the filtered waveform crosses `threshold` times the first
/// maximum power.
///
/// Candidate samples are those before the first maximum above the target
/// power. If they form several contiguous runs, the last run is the leading
/// edge; earlier runs are noise ripples.
pub fn threshold_range(
    range: ArrayView1<f64>,
    power: ArrayView1<f64>,
    first_maximum_index: usize,
    threshold: f64,
) -> Result<ThresholdCrossing, WaveformFailure> {
    let target_power = threshold * power[first_maximum_index];

    let points: Vec<usize> = (0..first_maximum_index)
        .filter(|&i| power[i] > target_power)
        .collect();

    if points.is_empty() {
        return Err(WaveformFailure::NoThresholdCrossing);
    }

    let retrack_point = match points.windows(2).rposition(|pair| pair[1] - pair[0] > 1) {
        Some(gap) => points[gap + 1],
        None => points[0],
    };

    interpolate_crossing(range, power, retrack_point, target_power)
}

/// Same result as [`threshold_range`], scanning backwards from the first maximum
pub fn threshold_range_fast(
    range: ArrayView1<f64>,
    power: ArrayView1<f64>,
    first_maximum_index: usize,
    threshold: f64,
) -> Result<ThresholdCrossing, WaveformFailure> {
    let target_power = threshold * power[first_maximum_index];

    let mut retrack_point = (0..first_maximum_index)
        .rev()
        .find(|&i| power[i] > target_power)
        .ok_or(WaveformFailure::NoThresholdCrossing)?;

    while retrack_point > 0 && power[retrack_point - 1] > target_power {
        retrack_point -= 1;
    }

    interpolate_crossing(range, power, retrack_point, target_power)
}

/// Linear interpolation between the crossing sample and its predecessor
fn interpolate_crossing(
    range: ArrayView1<f64>,
    power: ArrayView1<f64>,
    retrack_point: usize,
    target_power: f64,
) -> Result<ThresholdCrossing, WaveformFailure> {
    // A run starting at the first sample has no lower neighbour to interpolate from
    if retrack_point == 0 {
        return Err(WaveformFailure::NoThresholdCrossing);
    }

    let (i0, i1) = (retrack_point - 1, retrack_point);
    let gradient = (power[i1] - power[i0]) / (range[i1] - range[i0]);
    if !gradient.is_finite() || gradient.abs() < MIN_GRADIENT {
        return Err(WaveformFailure::FlatGradient);
    }

    let crossing_range = (target_power - power[i0]) / gradient + range[i0];
    if !crossing_range.is_finite() {
        return Err(WaveformFailure::FlatGradient);
    }

    Ok(ThresholdCrossing {
        range: crossing_range,
        power: target_power,
    })
}
