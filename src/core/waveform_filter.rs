//! Waveform oversampling, smoothing, noise floor and first-maximum detection.
//!
//! Every step comes in a reference form and a fast form. Both produce the same
//! filtered waveform up to floating point rounding; the fast kernels replace
//! per-sample searches and window sums with single running passes.

use crate::core::config::RetrackerConfig;
use crate::core::crossing;
use crate::types::{AltrackError, Waveform};
use ndarray::{s, Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of leading bins (times the oversampling factor) used for the noise floor
pub const NOISE_FLOOR_BINS: usize = 5;

/// Left edge padding offset for local maximum detection at index 0
const EDGE_PAD: f64 = 1.0e-6;

/// Waveform oversampling method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationKind {
    Linear,
    Nearest,
}

impl FromStr for InterpolationKind {
    type Err = AltrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(InterpolationKind::Linear),
            "nearest" => Ok(InterpolationKind::Nearest),
            _ => Err(AltrackError::Config(format!(
                "unsupported waveform oversampling method: {}",
                s
            ))),
        }
    }
}

/// Kernel implementation used for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelSet {
    Reference,
    Fast,
}

/// Filter parameters resolved for one radar mode
#[derive(Debug, Clone)]
pub struct FilterParams {
    pub oversampling_factor: usize,
    pub interpolation: InterpolationKind,
    pub smoothing_window_size: usize,
    pub first_maximum_normalized_threshold: f64,
    pub skip_leading_bins: usize,
}

/// Oversampled, smoothed and normalized waveform of one record
#[derive(Debug, Clone)]
pub struct FilteredWaveform {
    pub range: Array1<f64>,
    pub power: Array1<f64>,
    /// `None` if no finite maximum exists
    pub first_maximum_index: Option<usize>,
    pub norm: f64,
    pub noise_level: f64,
}

/// Filter one waveform and locate its first maximum
pub fn filter_waveform(
    range: ArrayView1<f64>,
    power: ArrayView1<f64>,
    params: &FilterParams,
    kernels: KernelSet,
) -> FilteredWaveform {
    let n_os = range.len() * params.oversampling_factor;

    let blanked;
    let power = if params.skip_leading_bins > 0 {
        let mut owned = power.to_owned();
        let n_skip = params.skip_leading_bins.min(owned.len());
        owned.slice_mut(s![..n_skip]).fill(0.0);
        blanked = owned;
        blanked.view()
    } else {
        power.view()
    };

    let oversampled = match (kernels, params.interpolation) {
        (KernelSet::Fast, InterpolationKind::Linear) => {
            oversample_linear_fast(range, power, params.oversampling_factor)
        }
        _ => oversample(range, power, params.oversampling_factor, params.interpolation),
    };

    let (range_os, power_os) = match oversampled {
        Some(result) => result,
        None => return FilteredWaveform::degenerate(n_os),
    };

    let smoothed = match kernels {
        KernelSet::Reference => smooth(&power_os, params.smoothing_window_size),
        KernelSet::Fast => smooth_fast(&power_os, params.smoothing_window_size),
    };

    let (normalized, norm) = match normalize(&smoothed) {
        Some(result) => result,
        None => {
            return FilteredWaveform {
                range: range_os,
                power: smoothed,
                first_maximum_index: None,
                norm: f64::NAN,
                noise_level: f64::NAN,
            }
        }
    };

    // First maximum must exceed the radar mode threshold above the noise floor
    let noise_level = noise_floor(&normalized, params.oversampling_factor);
    let peak_minimum_power = params.first_maximum_normalized_threshold + noise_level;
    let first_maximum_index = match kernels {
        KernelSet::Reference => first_maximum_index(&normalized, peak_minimum_power),
        KernelSet::Fast => first_maximum_index_fast(&normalized, peak_minimum_power),
    };

    FilteredWaveform {
        range: range_os,
        power: normalized,
        first_maximum_index,
        norm,
        noise_level,
    }
}

impl FilteredWaveform {
    fn degenerate(n: usize) -> Self {
        Self {
            range: Array1::from_elem(n, f64::NAN),
            power: Array1::from_elem(n, f64::NAN),
            first_maximum_index: None,
            norm: f64::NAN,
            noise_level: f64::NAN,
        }
    }
}

/// Resample `power` onto `factor * n` evenly spaced points between the range limits
pub fn oversample(
    range: ArrayView1<f64>,
    power: ArrayView1<f64>,
    factor: usize,
    kind: InterpolationKind,
) -> Option<(Array1<f64>, Array1<f64>)> {
    let n = range.len();
    let (range_min, range_max) = nan_min_max(range)?;
    let range_os = Array1::linspace(range_min, range_max, n * factor);

    if n == 1 {
        let power_os = Array1::from_elem(range_os.len(), power[0]);
        return Some((range_os, power_os));
    }

    let power_os = range_os.mapv(|x| {
        let j = segment_index(&range, x);
        match kind {
            InterpolationKind::Linear => lerp(range[j], range[j + 1], power[j], power[j + 1], x),
            InterpolationKind::Nearest => {
                if x - range[j] <= range[j + 1] - x {
                    power[j]
                } else {
                    power[j + 1]
                }
            }
        }
    });

    Some((range_os, power_os))
}

/// Linear oversampling walking both monotonic grids in one pass
pub fn oversample_linear_fast(
    range: ArrayView1<f64>,
    power: ArrayView1<f64>,
    factor: usize,
) -> Option<(Array1<f64>, Array1<f64>)> {
    let n = range.len();
    let (range_min, range_max) = nan_min_max(range)?;
    let range_os = Array1::linspace(range_min, range_max, n * factor);

    if n == 1 {
        let power_os = Array1::from_elem(range_os.len(), power[0]);
        return Some((range_os, power_os));
    }

    let mut power_os = Array1::zeros(range_os.len());
    let mut j = 0;
    for (k, &x) in range_os.iter().enumerate() {
        while j + 2 < n && range[j + 1] <= x {
            j += 1;
        }
        power_os[k] = lerp(range[j], range[j + 1], power[j], power[j + 1], x);
    }

    Some((range_os, power_os))
}

/// Index of the interpolation segment [j, j + 1] containing `x` (binary search)
fn segment_index(range: &ArrayView1<f64>, x: f64) -> usize {
    let mut left = 0;
    let mut right = range.len();

    while left < right {
        let mid = (left + right) / 2;
        if range[mid] <= x {
            left = mid + 1;
        } else {
            right = mid;
        }
    }

    left.saturating_sub(1).min(range.len() - 2)
}

#[inline]
fn lerp(r0: f64, r1: f64, p0: f64, p1: f64, x: f64) -> f64 {
    let dr = r1 - r0;
    if dr == 0.0 {
        p0
    } else {
        (p1 - p0) / dr * (x - r0) + p0
    }
}

/// Centered moving average, samples beyond both edges count as zero
pub fn smooth(x: &Array1<f64>, window: usize) -> Array1<f64> {
    let n = x.len();
    let half = window / 2;
    let width = window as f64;

    Array1::from_shape_fn(n, |i| {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(n);
        x.slice(s![start..end]).sum() / width
    })
}

/// Centered moving average with a running window sum
pub fn smooth_fast(x: &Array1<f64>, window: usize) -> Array1<f64> {
    let n = x.len();
    let half = window / 2;
    let width = window as f64;

    let mut smoothed = Array1::zeros(n);
    let mut sum = 0.0;
    let mut n_invalid = 0usize;

    for &value in x.iter().take(half.min(n)) {
        if value.is_finite() {
            sum += value;
        } else {
            n_invalid += 1;
        }
    }

    for i in 0..n {
        let incoming = i + half;
        if incoming < n {
            let value = x[incoming];
            if value.is_finite() {
                sum += value;
            } else {
                n_invalid += 1;
            }
        }
        if i > half {
            let value = x[i - half - 1];
            if value.is_finite() {
                sum -= value;
            } else {
                n_invalid -= 1;
            }
        }
        smoothed[i] = if n_invalid > 0 { f64::NAN } else { sum / width };
    }

    smoothed
}

/// Divide by the maximum. `None` if there is no positive finite maximum.
pub fn normalize(x: &Array1<f64>) -> Option<(Array1<f64>, f64)> {
    let norm = nan_max(x.view())?;
    if norm <= 0.0 || !norm.is_finite() {
        return None;
    }
    Some((x.mapv(|v| v / norm), norm))
}

/// Mean power of the first `NOISE_FLOOR_BINS * oversampling_factor` samples
pub fn noise_floor(x: &Array1<f64>, oversampling_factor: usize) -> f64 {
    let n = (NOISE_FLOOR_BINS * oversampling_factor).min(x.len());
    let (sum, count) = x
        .iter()
        .take(n)
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Index of the first local maximum before the absolute maximum with power
/// of at least `peak_minimum_power`, else the absolute maximum.
pub fn first_maximum_index(x: &Array1<f64>, peak_minimum_power: f64) -> Option<usize> {
    let absolute_maximum_index = nan_argmax(x)?;

    let leading_maxima: Vec<usize> = (0..absolute_maximum_index)
        .filter(|&i| is_local_maximum(x, i))
        .collect();

    Some(
        leading_maxima
            .into_iter()
            .find(|&i| x[i] >= peak_minimum_power)
            .unwrap_or(absolute_maximum_index),
    )
}

/// Single pass first-maximum search
pub fn first_maximum_index_fast(x: &Array1<f64>, peak_minimum_power: f64) -> Option<usize> {
    let mut absolute_maximum_index = None;
    let mut maximum = f64::NEG_INFINITY;
    let mut first_peak = None;

    for (i, &value) in x.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        if absolute_maximum_index.is_none() || value > maximum {
            maximum = value;
            absolute_maximum_index = Some(i);
        }
        if first_peak.is_none() && value >= peak_minimum_power && is_local_maximum(x, i) {
            first_peak = Some(i);
        }
    }

    let absolute_maximum_index = absolute_maximum_index?;
    Some(match first_peak {
        Some(peak) if peak < absolute_maximum_index => peak,
        _ => absolute_maximum_index,
    })
}

#[inline]
fn is_local_maximum(x: &Array1<f64>, i: usize) -> bool {
    if i + 1 >= x.len() {
        return false;
    }
    let left = if i == 0 { x[0] - EDGE_PAD } else { x[i - 1] };
    x[i] > left && x[i] > x[i + 1]
}

fn nan_argmax(x: &Array1<f64>) -> Option<usize> {
    let mut index = None;
    let mut maximum = f64::NEG_INFINITY;
    for (i, &value) in x.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        if index.is_none() || value > maximum {
            maximum = value;
            index = Some(i);
        }
    }
    index
}

fn nan_max(x: ArrayView1<f64>) -> Option<f64> {
    x.iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

fn nan_min_max(x: ArrayView1<f64>) -> Option<(f64, f64)> {
    let (min, max) = x
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min.is_finite() && max.is_finite() {
        Some((min, max))
    } else {
        None
    }
}

/// Intermediate filter products of every record in a granule
#[derive(Debug, Clone)]
pub struct PreprocessedWaveforms {
    pub range: Array2<f64>,
    pub power: Array2<f64>,
    pub first_maximum_index: Vec<Option<usize>>,
    pub norm: Array1<f64>,
}

/// Filter all valid records. Invalid records stay NaN with no first maximum.
pub fn preprocess_waveforms(
    waveform: &Waveform,
    config: &RetrackerConfig,
    kernels: KernelSet,
) -> PreprocessedWaveforms {
    let n_records = waveform.n_records();
    let n_os = waveform.n_bins() * config.oversampling_factor;

    log::debug!(
        "Preprocessing {} waveforms ({} oversampled bins)",
        n_records,
        n_os
    );

    let mut preprocessed = PreprocessedWaveforms {
        range: Array2::from_elem((n_records, n_os), f64::NAN),
        power: Array2::from_elem((n_records, n_os), f64::NAN),
        first_maximum_index: vec![None; n_records],
        norm: Array1::from_elem(n_records, f64::NAN),
    };

    for i in 0..n_records {
        if !waveform.is_valid()[i] {
            continue;
        }
        let params = config.filter_params(waveform.radar_mode()[i]);
        let filtered = filter_waveform(
            waveform.range().row(i),
            waveform.power().row(i),
            &params,
            kernels,
        );
        preprocessed.range.row_mut(i).assign(&filtered.range);
        preprocessed.power.row_mut(i).assign(&filtered.power);
        preprocessed.first_maximum_index[i] = filtered.first_maximum_index;
        preprocessed.norm[i] = filtered.norm;
    }

    preprocessed
}

impl PreprocessedWaveforms {
    /// Range distance between the crossings of thresholds `t0 < t1`.
    ///
    /// Irregular waveforms can produce negative widths, those are set to NaN.
    pub fn thresholds_distance(&self, t0: f64, t1: f64) -> Array1<f64> {
        let n_records = self.first_maximum_index.len();
        let mut width = Array1::from_elem(n_records, f64::NAN);

        for (i, fmi) in self.first_maximum_index.iter().enumerate() {
            let fmi = match fmi {
                Some(fmi) => *fmi,
                None => continue,
            };
            let range = self.range.row(i);
            let power = self.power.row(i);
            let r0 = crossing::threshold_range(range, power, fmi, t0);
            let r1 = crossing::threshold_range(range, power, fmi, t1);
            if let (Ok(r0), Ok(r1)) = (r0, r1) {
                let distance = r1.range - r0.range;
                if distance >= 0.0 {
                    width[i] = distance;
                }
            }
        }

        width
    }
}
