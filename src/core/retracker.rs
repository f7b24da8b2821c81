//! Common retracker contract.
//!
//! A retracker is configured once, restricted to a set of record indices and
//! then run on a waveform collection. Results live in per-record arrays sized
//! to the full collection; only the indices in scope are written.

use crate::core::config::RetrackerConfig;
use crate::types::{
    AltrackError, AltrackResult, AuxiliaryVariable, ClassifierChannels, RadarMode, Waveform,
    WaveformFailure,
};
use ndarray::Array1;
use std::collections::HashMap;
use std::sync::Arc;

/// Retracked point of one waveform in physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrackedPoint {
    /// Range to the retracked point before offset and bias (meters)
    pub range: f64,
    /// Waveform power at the retracked point
    pub power: f64,
}

/// Per-record result arrays of one retracker run
#[derive(Debug, Clone, PartialEq)]
pub struct RetrackerOutput {
    pub range: Array1<f64>,
    pub power: Array1<f64>,
    pub uncertainty: Array1<f64>,
    pub invalid: Array1<bool>,
}

impl RetrackerOutput {
    /// Default arrays: range and power NaN, uncertainty zero, nothing invalid
    pub fn new(n_records: usize) -> Self {
        Self {
            range: Array1::from_elem(n_records, f64::NAN),
            power: Array1::from_elem(n_records, f64::NAN),
            uncertainty: Array1::zeros(n_records),
            invalid: Array1::from_elem(n_records, false),
        }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Result of a single record
#[derive(Debug, Clone, PartialEq)]
pub struct RetrackResult {
    pub range: f64,
    pub power: f64,
    pub uncertainty: f64,
    pub invalid: bool,
    pub auxiliary: HashMap<String, f64>,
}

/// State shared by all retracker variants
#[derive(Debug, Clone)]
pub struct RetrackerBase {
    config: RetrackerConfig,
    indices: Option<Vec<usize>>,
    classifier: Option<Arc<ClassifierChannels>>,
    output: Option<RetrackerOutput>,
    auxiliary: Vec<AuxiliaryVariable>,
}

impl RetrackerBase {
    pub fn new(config: RetrackerConfig) -> Self {
        Self {
            config,
            indices: None,
            classifier: None,
            output: None,
            auxiliary: Vec::new(),
        }
    }

    pub fn config(&self) -> &RetrackerConfig {
        &self.config
    }

    pub fn classifier(&self) -> Option<&ClassifierChannels> {
        self.classifier.as_deref()
    }

    pub fn indices(&self) -> Option<&[usize]> {
        self.indices.as_deref()
    }

    pub fn output(&self) -> Option<&RetrackerOutput> {
        self.output.as_ref()
    }

    pub fn auxiliary(&self) -> &[AuxiliaryVariable] {
        &self.auxiliary
    }

    /// Allocate default output arrays unless arrays of this size already exist
    fn init(&mut self, n_records: usize) {
        let reuse = matches!(&self.output, Some(output) if output.len() == n_records);
        if !reuse {
            self.output = Some(RetrackerOutput::new(n_records));
        }
        self.auxiliary.clear();
    }

    fn output_mut(&mut self) -> AltrackResult<&mut RetrackerOutput> {
        self.output.as_mut().ok_or_else(|| {
            AltrackError::Processing("retracker output arrays not initialized".to_string())
        })
    }

    /// Store per-record results.
    ///
    /// Successful records get the configured offset added and the radar mode
    /// range bias subtracted. Failed records are NaN and flagged invalid.
    pub fn write_results(
        &mut self,
        results: &[(usize, Result<RetrackedPoint, WaveformFailure>)],
        radar_mode: &Array1<RadarMode>,
    ) -> AltrackResult<()> {
        let offset = self.config.offset;
        let uncertainty = self.config.uncertainty.map(|u| u.value());
        let bias: Vec<f64> = results
            .iter()
            .map(|&(i, _)| self.config.range_bias(radar_mode[i]))
            .collect();

        let mut failures: HashMap<WaveformFailure, usize> = HashMap::new();
        let output = self.output_mut()?;

        for ((i, result), bias) in results.iter().zip(bias) {
            let i = *i;
            match result {
                Ok(point) => {
                    output.range[i] = point.range + offset - bias;
                    output.power[i] = point.power;
                    output.invalid[i] = false;
                }
                Err(failure) => {
                    output.range[i] = f64::NAN;
                    output.power[i] = f64::NAN;
                    output.invalid[i] = true;
                    *failures.entry(*failure).or_insert(0) += 1;
                }
            }
            if let Some(value) = uncertainty {
                output.uncertainty[i] = value;
            }
        }

        for (failure, count) in &failures {
            log::debug!("{} of {} waveforms failed: {}", count, results.len(), failure);
        }

        Ok(())
    }

    /// Any record in scope without a finite range is invalid
    fn flag_missing_ranges(&mut self, indices: &[usize]) -> AltrackResult<()> {
        let output = self.output_mut()?;
        for &i in indices {
            if !output.range[i].is_finite() {
                output.invalid[i] = true;
            }
        }
        Ok(())
    }
}

/// Retracker contract shared by the TFMRA variants
pub trait Retracker: Send {
    /// Name used in settings files and logs
    fn name(&self) -> &str;

    fn base(&self) -> &RetrackerBase;

    fn base_mut(&mut self) -> &mut RetrackerBase;

    /// Variant specific retracking of the records in `indices`
    fn l2_retrack(&mut self, waveform: &Waveform, indices: &[usize]) -> AltrackResult<()>;

    /// Variant specific configuration check
    fn validate_options(&self, config: &RetrackerConfig) -> AltrackResult<()> {
        config.validate()
    }

    /// Replace the configuration
    fn set_options(&mut self, config: RetrackerConfig) -> AltrackResult<()> {
        self.validate_options(&config)?;
        self.base_mut().config = config;
        Ok(())
    }

    /// Restrict processing to `indices` (all records if never set)
    fn set_indices(&mut self, indices: Vec<usize>) {
        self.base_mut().indices = Some(indices);
    }

    /// Attach classifier channels for threshold policies that read them
    fn set_classifier(&mut self, classifier: Arc<ClassifierChannels>) {
        self.base_mut().classifier = Some(classifier);
    }

    /// Add a named side-channel result for the Level-2 record set
    fn register_auxiliary_output(
        &mut self,
        id: &str,
        name: &str,
        value: Array1<f64>,
        uncertainty: Option<Array1<f64>>,
    ) {
        let auxiliary = &mut self.base_mut().auxiliary;
        auxiliary.retain(|var| var.id != id);
        auxiliary.push(AuxiliaryVariable {
            id: id.to_string(),
            name: name.to_string(),
            value,
            uncertainty,
        });
    }

    /// Retrack all records in scope. Returns `false` if there was nothing to do.
    fn retrack(&mut self, waveform: &Waveform) -> AltrackResult<bool> {
        let n_records = waveform.n_records();

        let indices = match self.base().indices() {
            Some(indices) => indices.to_vec(),
            None => (0..n_records).collect(),
        };
        if let Some(&index) = indices.iter().find(|&&i| i >= n_records) {
            return Err(AltrackError::ShapeMismatch(format!(
                "record index {} out of bounds for {} waveforms",
                index, n_records
            )));
        }

        let base = self.base_mut();
        base.indices = Some(indices.clone());
        base.init(n_records);

        if indices.is_empty() {
            log::debug!("{}: no waveforms in scope", self.name());
            return Ok(false);
        }

        log::debug!("{}: retracking {} of {} waveforms", self.name(), indices.len(), n_records);
        self.l2_retrack(waveform, &indices)?;
        self.base_mut().flag_missing_ranges(&indices)?;

        Ok(true)
    }

    /// Record indices of the last run
    fn indices(&self) -> Option<&[usize]> {
        self.base().indices()
    }

    fn output(&self) -> Option<&RetrackerOutput> {
        self.base().output()
    }

    fn auxiliary_outputs(&self) -> &[AuxiliaryVariable] {
        self.base().auxiliary()
    }

    fn error_flag(&self) -> Option<&Array1<bool>> {
        self.base().output().map(|output| &output.invalid)
    }

    /// Result of record `i`, `None` before the first run or out of bounds
    fn result(&self, i: usize) -> Option<RetrackResult> {
        let output = self.base().output()?;
        if i >= output.len() {
            return None;
        }
        let auxiliary = self
            .auxiliary_outputs()
            .iter()
            .filter_map(|var| var.value.get(i).map(|&value| (var.id.clone(), value)))
            .collect();
        Some(RetrackResult {
            range: output.range[i],
            power: output.power[i],
            uncertainty: output.uncertainty[i],
            invalid: output.invalid[i],
            auxiliary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Writes the record index as range, fails odd records
    struct IndexRetracker {
        base: RetrackerBase,
    }

    impl Retracker for IndexRetracker {
        fn name(&self) -> &str {
            "index"
        }

        fn base(&self) -> &RetrackerBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut RetrackerBase {
            &mut self.base
        }

        fn l2_retrack(&mut self, waveform: &Waveform, indices: &[usize]) -> AltrackResult<()> {
            let results: Vec<_> = indices
                .iter()
                .map(|&i| {
                    let result = if i % 2 == 0 {
                        Ok(RetrackedPoint {
                            range: i as f64,
                            power: 1.0,
                        })
                    } else {
                        Err(WaveformFailure::NoThresholdCrossing)
                    };
                    (i, result)
                })
                .collect();
            self.base.write_results(&results, waveform.radar_mode())
        }
    }

    fn waveform(n_records: usize) -> Waveform {
        Waveform::from_flags(
            Array2::zeros((n_records, 4)),
            Array2::zeros((n_records, 4)),
            &vec![1; n_records],
        )
        .unwrap()
    }

    #[test]
    fn test_only_indices_in_scope_are_written() {
        let mut retracker = IndexRetracker {
            base: RetrackerBase::new(RetrackerConfig::default()),
        };
        retracker.set_indices(vec![2, 3]);
        assert!(retracker.retrack(&waveform(6)).unwrap());

        let output = retracker.output().unwrap();
        assert_eq!(output.range[2], 2.0);
        assert!(output.range[3].is_nan());
        assert!(output.invalid[3]);
        for i in [0, 1, 4, 5] {
            assert!(output.range[i].is_nan());
            assert!(!output.invalid[i]);
            assert_eq!(output.uncertainty[i], 0.0);
        }
    }

    #[test]
    fn test_offset_bias_and_uncertainty() {
        let mut config = RetrackerConfig::default();
        config.offset = 0.5;
        config.range_bias = Some([0.0, 0.25, 0.0]);
        config.uncertainty = Some(crate::core::config::UncertaintyOption::Fixed { value: 0.1 });

        let mut retracker = IndexRetracker {
            base: RetrackerBase::new(config),
        };
        retracker.retrack(&waveform(3)).unwrap();

        let result = retracker.result(2).unwrap();
        assert_eq!(result.range, 2.0 + 0.5 - 0.25);
        assert_eq!(result.uncertainty, 0.1);
        assert!(!result.invalid);
    }

    #[test]
    fn test_empty_scope_is_noop() {
        let mut retracker = IndexRetracker {
            base: RetrackerBase::new(RetrackerConfig::default()),
        };
        retracker.set_indices(vec![]);
        assert!(!retracker.retrack(&waveform(4)).unwrap());
        assert!(retracker.output().unwrap().range.iter().all(|r| r.is_nan()));
    }

    #[test]
    fn test_out_of_bounds_index() {
        let mut retracker = IndexRetracker {
            base: RetrackerBase::new(RetrackerConfig::default()),
        };
        retracker.set_indices(vec![1, 7]);
        assert!(matches!(
            retracker.retrack(&waveform(4)),
            Err(AltrackError::ShapeMismatch(_))
        ));
        assert!(retracker.output().is_none());
    }

    #[test]
    fn test_auxiliary_registration_replaces_id() {
        let mut retracker = IndexRetracker {
            base: RetrackerBase::new(RetrackerConfig::default()),
        };
        retracker.register_auxiliary_output("thr", "threshold", Array1::zeros(2), None);
        retracker.register_auxiliary_output("thr", "threshold", Array1::ones(2), None);

        assert_eq!(retracker.auxiliary_outputs().len(), 1);
        assert_eq!(retracker.auxiliary_outputs()[0].value[1], 1.0);
    }

    #[test]
    fn test_set_options_validates() {
        let mut retracker = IndexRetracker {
            base: RetrackerBase::new(RetrackerConfig::default()),
        };
        let mut config = RetrackerConfig::default();
        config.oversampling_factor = 0;
        assert!(retracker.set_options(config).is_err());
        assert_eq!(retracker.base().config().oversampling_factor, 10);
    }
}
