//! Optimized TFMRA retracker.
//!
//! Same algorithm as [`Tfmra`](crate::core::tfmra::Tfmra) with single-pass
//! filter kernels, records processed in parallel when the `parallel` feature
//! is enabled. Records flagged invalid upstream are not retracked.

use crate::core::config::RetrackerConfig;
use crate::core::retracker::{RetrackedPoint, Retracker, RetrackerBase};
use crate::core::tfmra::retrack_waveform;
use crate::core::waveform_filter::{
    preprocess_waveforms, InterpolationKind, KernelSet, PreprocessedWaveforms,
};
use crate::types::{AltrackError, AltrackResult, Waveform, WaveformFailure};
use ndarray::Array1;

/// Auxiliary output id of the per-record threshold
pub const THRESHOLD_AUX_ID: &str = "tfmrathr";
pub const THRESHOLD_AUX_NAME: &str = "tfmra_threshold";

type RecordResult = (usize, Result<RetrackedPoint, WaveformFailure>);

/// Optimized TFMRA retracker
pub struct CTfmra {
    base: RetrackerBase,
}

impl CTfmra {
    pub const NAME: &'static str = "cTFMRA";

    /// Create a cTFMRA retracker with default options
    pub fn new() -> Self {
        Self {
            base: RetrackerBase::new(RetrackerConfig::default()),
        }
    }

    /// Create a cTFMRA retracker with custom options
    pub fn with_config(config: RetrackerConfig) -> AltrackResult<Self> {
        let mut retracker = Self::new();
        retracker.set_options(config)?;
        Ok(retracker)
    }

    /// Oversampled, filtered waveforms of all records with the current options
    pub fn preprocessed_waveforms(&self, waveform: &Waveform) -> PreprocessedWaveforms {
        preprocess_waveforms(waveform, self.base.config(), KernelSet::Fast)
    }

    #[cfg(feature = "parallel")]
    fn retrack_records(
        waveform: &Waveform,
        indices: &[usize],
        thresholds: &Array1<f64>,
        config: &RetrackerConfig,
    ) -> Vec<RecordResult> {
        use rayon::prelude::*;

        log::trace!("Retracking {} waveforms in parallel", indices.len());

        indices
            .par_iter()
            .map(|&i| (i, Self::retrack_record(waveform, i, thresholds[i], config)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn retrack_records(
        waveform: &Waveform,
        indices: &[usize],
        thresholds: &Array1<f64>,
        config: &RetrackerConfig,
    ) -> Vec<RecordResult> {
        indices
            .iter()
            .map(|&i| (i, Self::retrack_record(waveform, i, thresholds[i], config)))
            .collect()
    }

    fn retrack_record(
        waveform: &Waveform,
        i: usize,
        threshold: f64,
        config: &RetrackerConfig,
    ) -> Result<RetrackedPoint, WaveformFailure> {
        if !waveform.is_valid()[i] {
            return Err(WaveformFailure::FlaggedInvalid);
        }
        retrack_waveform(
            waveform.range().row(i),
            waveform.power().row(i),
            waveform.radar_mode()[i],
            threshold,
            config,
            KernelSet::Fast,
        )
    }
}

impl Default for CTfmra {
    fn default() -> Self {
        Self::new()
    }
}

impl Retracker for CTfmra {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn base(&self) -> &RetrackerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RetrackerBase {
        &mut self.base
    }

    fn validate_options(&self, config: &RetrackerConfig) -> AltrackResult<()> {
        config.validate()?;
        if config.interpolation != InterpolationKind::Linear {
            return Err(AltrackError::Config(format!(
                "{} supports linear waveform oversampling only, got {:?}",
                Self::NAME,
                config.interpolation
            )));
        }
        Ok(())
    }

    fn l2_retrack(&mut self, waveform: &Waveform, indices: &[usize]) -> AltrackResult<()> {
        let thresholds = self.base.config().threshold.evaluate(
            self.base.classifier(),
            indices,
            waveform.n_records(),
        )?;

        let results = Self::retrack_records(waveform, indices, &thresholds, self.base.config());
        self.base.write_results(&results, waveform.radar_mode())?;

        self.register_auxiliary_output(THRESHOLD_AUX_ID, THRESHOLD_AUX_NAME, thresholds, None);
        Ok(())
    }
}
