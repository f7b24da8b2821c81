//! Retracker configuration and processor settings.
//!
//! Settings files use the processor option names (`wfm_oversampling_factor`, ...).
//! They are deserialized into [`RetrackerOptions`] and resolved against the
//! defaults of a retracker variant into an immutable, validated
//! [`RetrackerConfig`].

use crate::core::dispatcher::RetrackerKind;
use crate::core::threshold::ThresholdPolicy;
use crate::core::waveform_filter::{FilterParams, InterpolationKind};
use crate::types::{AltrackError, AltrackResult, RadarMode, SurfaceType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Range uncertainty assigned to retracked records
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UncertaintyOption {
    Fixed { value: f64 },
}

impl UncertaintyOption {
    pub fn value(&self) -> f64 {
        match self {
            UncertaintyOption::Fixed { value } => *value,
        }
    }
}

/// Immutable configuration of one TFMRA retracker instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrackerConfig {
    /// Threshold policy (fraction of the first maximum power)
    pub threshold: ThresholdPolicy,
    /// Constant range offset in meters
    pub offset: f64,
    pub oversampling_factor: usize,
    pub interpolation: InterpolationKind,
    /// Smoothing window per radar mode (LRM, SAR, SIN)
    pub smoothing_window_size: [usize; 3],
    /// Normalized first maximum power threshold per radar mode (LRM, SAR, SIN)
    pub first_maximum_normalized_threshold: [f64; 3],
    /// Range bias per radar mode, subtracted from the retracked range
    pub range_bias: Option<[f64; 3]>,
    pub uncertainty: Option<UncertaintyOption>,
    /// Raw waveform bins set to zero before filtering
    pub skip_leading_bins: usize,
}

impl Default for RetrackerConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdPolicy::default(),
            offset: 0.0,
            oversampling_factor: 10,
            interpolation: InterpolationKind::Linear,
            smoothing_window_size: [11, 11, 51],
            first_maximum_normalized_threshold: [0.15, 0.15, 0.45],
            range_bias: None,
            uncertainty: None,
            skip_leading_bins: 0,
        }
    }
}

impl RetrackerConfig {
    /// Envisat defaults: the first 5 waveform bins carry artifacts
    pub fn envisat() -> Self {
        Self {
            skip_leading_bins: 5,
            ..Self::default()
        }
    }

    /// Check all parameters, failing on the first invalid one
    pub fn validate(&self) -> AltrackResult<()> {
        self.threshold.validate()?;

        if !self.offset.is_finite() {
            return Err(AltrackError::Config(format!(
                "range offset must be finite, got {}",
                self.offset
            )));
        }

        if self.oversampling_factor < 1 {
            return Err(AltrackError::Config(
                "waveform oversampling factor must be at least 1".to_string(),
            ));
        }

        for (mode, &window) in self.smoothing_window_size.iter().enumerate() {
            if window < 1 || window % 2 == 0 {
                return Err(AltrackError::Config(format!(
                    "smoothing window size must be odd and positive, got {} for radar mode {}",
                    window, mode
                )));
            }
        }

        if self
            .first_maximum_normalized_threshold
            .iter()
            .any(|t| !t.is_finite())
        {
            return Err(AltrackError::Config(
                "first maximum normalized threshold must be finite".to_string(),
            ));
        }

        if let Some(bias) = &self.range_bias {
            if bias.iter().any(|b| !b.is_finite()) {
                return Err(AltrackError::Config(format!(
                    "range bias must be finite, got {:?}",
                    bias
                )));
            }
        }

        if let Some(uncertainty) = &self.uncertainty {
            let value = uncertainty.value();
            if !value.is_finite() || value < 0.0 {
                return Err(AltrackError::Config(format!(
                    "fixed uncertainty must be finite and non-negative, got {}",
                    value
                )));
            }
        }

        Ok(())
    }

    /// Filter parameters for one radar mode
    pub fn filter_params(&self, radar_mode: RadarMode) -> FilterParams {
        let mode = radar_mode.index();
        FilterParams {
            oversampling_factor: self.oversampling_factor,
            interpolation: self.interpolation,
            smoothing_window_size: self.smoothing_window_size[mode],
            first_maximum_normalized_threshold: self.first_maximum_normalized_threshold[mode],
            skip_leading_bins: self.skip_leading_bins,
        }
    }

    /// Range bias for one radar mode (0 if not configured)
    pub fn range_bias(&self, radar_mode: RadarMode) -> f64 {
        self.range_bias
            .map(|bias| bias[radar_mode.index()])
            .unwrap_or(0.0)
    }

    /// Overlay processor options on `defaults` and validate the result
    pub fn from_options(defaults: RetrackerConfig, options: &RetrackerOptions) -> AltrackResult<Self> {
        let mut config = defaults;

        if let Some(threshold) = &options.threshold {
            config.threshold = parse_threshold(threshold)?;
        }
        if let Some(offset) = options.offset {
            config.offset = offset;
        }
        if let Some(factor) = options.wfm_oversampling_factor {
            config.oversampling_factor = factor;
        }
        if let Some(method) = options.wfm_oversampling_method {
            config.interpolation = method;
        }
        if let Some(windows) = options.wfm_smoothing_window_size {
            config.smoothing_window_size = windows;
        }
        if let Some(fmnt) = options.first_maximum_normalized_threshold {
            config.first_maximum_normalized_threshold = fmnt;
        }
        if let Some(order) = options.first_maximum_local_order {
            if order != 1 {
                return Err(AltrackError::Config(format!(
                    "first_maximum_local_order must be 1, got {}",
                    order
                )));
            }
        }
        if let Some(bias) = options.range_bias {
            config.range_bias = Some(bias);
        }
        if let Some(uncertainty) = options.uncertainty {
            config.uncertainty = Some(uncertainty);
        }
        if let Some(skip) = options.skip_leading_bins {
            config.skip_leading_bins = skip;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse processor options from JSON and resolve them against `defaults`
    pub fn from_json_str(defaults: RetrackerConfig, json: &str) -> AltrackResult<Self> {
        let options: RetrackerOptions = serde_json::from_str(json)?;
        Self::from_options(defaults, &options)
    }
}

/// Threshold option: a bare number is the legacy fixed threshold
fn parse_threshold(value: &serde_json::Value) -> AltrackResult<ThresholdPolicy> {
    if let Some(fixed) = value.as_f64() {
        return Ok(ThresholdPolicy::Fixed { value: fixed });
    }
    serde_json::from_value(value.clone())
        .map_err(|e| AltrackError::Config(format!("invalid threshold option: {}", e)))
}

/// Raw retracker options as found in a Level-2 processor settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrackerOptions {
    pub threshold: Option<serde_json::Value>,
    pub offset: Option<f64>,
    pub wfm_oversampling_factor: Option<usize>,
    pub wfm_oversampling_method: Option<InterpolationKind>,
    pub wfm_smoothing_window_size: Option<[usize; 3]>,
    pub first_maximum_normalized_threshold: Option<[f64; 3]>,
    pub first_maximum_local_order: Option<usize>,
    pub range_bias: Option<[f64; 3]>,
    pub uncertainty: Option<UncertaintyOption>,
    pub skip_leading_bins: Option<usize>,
}

/// Retracker assigned to one surface type
#[derive(Debug, Clone, PartialEq)]
pub struct RetrackerDefinition {
    pub surface_type: SurfaceType,
    pub kind: RetrackerKind,
    pub config: RetrackerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DispatcherSettings {
    retrackers: Vec<RetrackerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetrackerEntry {
    surface_type: String,
    retracker: String,
    #[serde(default)]
    options: RetrackerOptions,
}

/// Ordered surface type to retracker assignment of the dispatcher
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatcherConfig {
    definitions: Vec<RetrackerDefinition>,
}

impl DispatcherConfig {
    /// Validate a list of definitions (each surface type at most once)
    pub fn new(definitions: Vec<RetrackerDefinition>) -> AltrackResult<Self> {
        let mut seen = HashSet::new();
        for definition in &definitions {
            if !seen.insert(definition.surface_type) {
                return Err(AltrackError::Config(format!(
                    "surface type {} has more than one retracker",
                    definition.surface_type
                )));
            }
            definition.kind.validate_config(&definition.config)?;
        }
        Ok(Self { definitions })
    }

    /// Add a retracker for one more surface type
    pub fn with_retracker(
        self,
        surface_type: SurfaceType,
        kind: RetrackerKind,
        config: RetrackerConfig,
    ) -> AltrackResult<Self> {
        let mut definitions = self.definitions;
        definitions.push(RetrackerDefinition {
            surface_type,
            kind,
            config,
        });
        Self::new(definitions)
    }

    /// Load from the `retrackers` list of a settings file
    pub fn from_json_str(json: &str) -> AltrackResult<Self> {
        let settings: DispatcherSettings = serde_json::from_str(json)?;

        let definitions = settings
            .retrackers
            .iter()
            .map(|entry| {
                let surface_type = SurfaceType::from_str(&entry.surface_type)?;
                let kind = RetrackerKind::from_str(&entry.retracker)?;
                let config = RetrackerConfig::from_options(kind.default_config(), &entry.options)?;
                log::debug!("Surface type {} -> {}: {:?}", surface_type, kind, config);
                Ok(RetrackerDefinition {
                    surface_type,
                    kind,
                    config,
                })
            })
            .collect::<AltrackResult<Vec<_>>>()?;

        Self::new(definitions)
    }

    pub fn definitions(&self) -> &[RetrackerDefinition] {
        &self.definitions
    }

    pub fn surface_types(&self) -> Vec<SurfaceType> {
        self.definitions.iter().map(|d| d.surface_type).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threshold, ThresholdPolicy::Fixed { value: 0.5 });
        assert_eq!(config.smoothing_window_size, [11, 11, 51]);

        let params = config.filter_params(RadarMode::SIN);
        assert_eq!(params.smoothing_window_size, 51);
        assert_eq!(params.first_maximum_normalized_threshold, 0.45);
        assert_eq!(RetrackerConfig::envisat().skip_leading_bins, 5);
    }

    #[test]
    fn test_options_overlay() {
        let json = r#"{
            "threshold": {"type": "sigma_func", "coef": [0.5, 0.01]},
            "offset": 0.1,
            "wfm_oversampling_factor": 5,
            "wfm_smoothing_window_size": [3, 5, 21],
            "range_bias": [0.0, 0.05, -0.1],
            "uncertainty": {"type": "fixed", "value": 0.1}
        }"#;
        let config = RetrackerConfig::from_json_str(RetrackerConfig::default(), json).unwrap();

        assert_eq!(
            config.threshold,
            ThresholdPolicy::SigmaFunc {
                coef: vec![0.5, 0.01]
            }
        );
        assert_eq!(config.oversampling_factor, 5);
        assert_eq!(config.smoothing_window_size, [3, 5, 21]);
        assert_eq!(config.range_bias(RadarMode::SIN), -0.1);
        assert_eq!(config.uncertainty, Some(UncertaintyOption::Fixed { value: 0.1 }));
        // Untouched option keeps its default
        assert_eq!(config.first_maximum_normalized_threshold, [0.15, 0.15, 0.45]);
    }

    #[test]
    fn test_legacy_numeric_threshold() {
        let config =
            RetrackerConfig::from_json_str(RetrackerConfig::default(), r#"{"threshold": 0.8}"#)
                .unwrap();
        assert_eq!(config.threshold, ThresholdPolicy::Fixed { value: 0.8 });
    }

    #[test]
    fn test_invalid_options_rejected() {
        let defaults = RetrackerConfig::default;

        let cases = [
            r#"{"wfm_smoothing_window_size": [10, 11, 51]}"#,
            r#"{"wfm_oversampling_factor": 0}"#,
            r#"{"first_maximum_local_order": 2}"#,
            r#"{"uncertainty": {"type": "fixed", "value": -1.0}}"#,
            r#"{"threshold": {"type": "unknown_policy"}}"#,
            r#"{"wfm_oversampling_method": "cubic"}"#,
            r#"{"not_an_option": 1}"#,
        ];
        for json in cases {
            assert!(
                RetrackerConfig::from_json_str(defaults(), json).is_err(),
                "accepted {}",
                json
            );
        }
    }

    #[test]
    fn test_dispatcher_config_from_json() {
        let json = r#"{
            "retrackers": [
                {"surface_type": "ocean", "retracker": "TFMRA"},
                {"surface_type": "lead", "retracker": "cTFMRA", "options": {"threshold": 0.95}},
                {"surface_type": "sea_ice", "retracker": "SICCI2TfmraEnvisat"}
            ]
        }"#;
        let config = DispatcherConfig::from_json_str(json).unwrap();

        assert_eq!(
            config.surface_types(),
            vec![SurfaceType::Ocean, SurfaceType::Lead, SurfaceType::SeaIce]
        );
        let lead = &config.definitions()[1];
        assert_eq!(lead.kind, RetrackerKind::CTfmra);
        assert_eq!(lead.config.threshold, ThresholdPolicy::Fixed { value: 0.95 });
        assert_eq!(config.definitions()[2].config.skip_leading_bins, 5);
    }

    #[test]
    fn test_dispatcher_config_rejects_bad_entries() {
        let unknown_retracker =
            r#"{"retrackers": [{"surface_type": "ocean", "retracker": "SAMOSAPlus"}]}"#;
        assert!(matches!(
            DispatcherConfig::from_json_str(unknown_retracker),
            Err(AltrackError::Config(_))
        ));

        let unknown_surface =
            r#"{"retrackers": [{"surface_type": "glacier", "retracker": "TFMRA"}]}"#;
        assert!(matches!(
            DispatcherConfig::from_json_str(unknown_surface),
            Err(AltrackError::Config(_))
        ));

        let duplicate = r#"{"retrackers": [
            {"surface_type": "lead", "retracker": "TFMRA"},
            {"surface_type": "lead", "retracker": "cTFMRA"}
        ]}"#;
        assert!(DispatcherConfig::from_json_str(duplicate).is_err());

        let nearest_optimized = r#"{"retrackers": [
            {"surface_type": "lead", "retracker": "cTFMRA",
             "options": {"wfm_oversampling_method": "nearest"}}
        ]}"#;
        assert!(DispatcherConfig::from_json_str(nearest_optimized).is_err());
    }
}
