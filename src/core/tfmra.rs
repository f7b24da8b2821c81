//! Threshold First Maximum Retracker Algorithm (reference implementation)

use crate::core::config::RetrackerConfig;
use crate::core::crossing::{threshold_range, threshold_range_fast};
use crate::core::retracker::{RetrackedPoint, Retracker, RetrackerBase};
use crate::core::waveform_filter::{
    filter_waveform, preprocess_waveforms, KernelSet, PreprocessedWaveforms,
};
use crate::types::{AltrackResult, RadarMode, Waveform, WaveformFailure};
use ndarray::ArrayView1;

/// Retrack one waveform: filter, find the first maximum, interpolate the crossing.
///
/// `power` of the result is in the units of the input waveform.
pub(crate) fn retrack_waveform(
    range: ArrayView1<f64>,
    power: ArrayView1<f64>,
    radar_mode: RadarMode,
    threshold: f64,
    config: &RetrackerConfig,
    kernels: KernelSet,
) -> Result<RetrackedPoint, WaveformFailure> {
    if !threshold.is_finite() {
        return Err(WaveformFailure::NoThresholdCrossing);
    }

    let params = config.filter_params(radar_mode);
    let filtered = filter_waveform(range, power, &params, kernels);
    let first_maximum_index = filtered
        .first_maximum_index
        .ok_or(WaveformFailure::NoFiniteMaximum)?;

    let crossing = match kernels {
        KernelSet::Reference => threshold_range(
            filtered.range.view(),
            filtered.power.view(),
            first_maximum_index,
            threshold,
        ),
        KernelSet::Fast => threshold_range_fast(
            filtered.range.view(),
            filtered.power.view(),
            first_maximum_index,
            threshold,
        ),
    }?;

    Ok(RetrackedPoint {
        range: crossing.range,
        power: crossing.power * filtered.norm,
    })
}

/// Reference TFMRA retracker.
///
/// Processes every record in scope one after the other, including records
/// flagged invalid upstream.
pub struct Tfmra {
    base: RetrackerBase,
    name: &'static str,
}

impl Tfmra {
    pub const NAME: &'static str = "TFMRA";
    pub const ENVISAT_NAME: &'static str = "SICCI2TfmraEnvisat";

    /// Create a TFMRA retracker with default options
    pub fn new() -> Self {
        Self {
            base: RetrackerBase::new(RetrackerConfig::default()),
            name: Self::NAME,
        }
    }

    /// Envisat flavour: leading waveform bins blanked before filtering
    pub fn envisat() -> Self {
        Self {
            base: RetrackerBase::new(RetrackerConfig::envisat()),
            name: Self::ENVISAT_NAME,
        }
    }

    /// Create a TFMRA retracker with custom options
    pub fn with_config(config: RetrackerConfig) -> AltrackResult<Self> {
        let mut retracker = Self::new();
        retracker.set_options(config)?;
        Ok(retracker)
    }

    /// Oversampled, filtered waveforms of all records with the current options
    pub fn preprocessed_waveforms(&self, waveform: &Waveform) -> PreprocessedWaveforms {
        preprocess_waveforms(waveform, self.base.config(), KernelSet::Reference)
    }
}

impl Default for Tfmra {
    fn default() -> Self {
        Self::new()
    }
}

impl Retracker for Tfmra {
    fn name(&self) -> &str {
        self.name
    }

    fn base(&self) -> &RetrackerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RetrackerBase {
        &mut self.base
    }

    fn l2_retrack(&mut self, waveform: &Waveform, indices: &[usize]) -> AltrackResult<()> {
        let config = self.base.config();
        let thresholds = config
            .threshold
            .evaluate(self.base.classifier(), indices, waveform.n_records())?;

        let mut results = Vec::with_capacity(indices.len());
        for &i in indices {
            let result = retrack_waveform(
                waveform.range().row(i),
                waveform.power().row(i),
                waveform.radar_mode()[i],
                thresholds[i],
                config,
                KernelSet::Reference,
            );
            results.push((i, result));
        }

        self.base.write_results(&results, waveform.radar_mode())
    }
}
