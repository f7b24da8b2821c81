use crate::types::{AltrackError, AltrackResult, ClassifierChannels};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Classifier channel names read by the threshold policies
pub const SIGMA0: &str = "sigma0";
pub const SITYPE: &str = "sitype";
pub const LEADING_EDGE_WIDTH: &str = "leading_edge_width";
pub const LEADING_EDGE_WIDTH_FIRST_HALF: &str = "leading_edge_width_first_half";
pub const LEADING_EDGE_WIDTH_SECOND_HALF: &str = "leading_edge_width_second_half";

/// Multi-year ice fraction above which the MYI coefficients are used
const MYI_SITYPE_LIMIT: f64 = 0.5;

/// Per-record retracking threshold policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Constant threshold for all waveforms
    Fixed { value: f64 },
    /// Polynomial in sigma0: sum(coef[i] * sigma0^i)
    SigmaFunc { coef: Vec<f64> },
    /// Sigma0 polynomial with separate first-year/multi-year ice coefficients
    SitypeSigmaFunc { coef_fyi: Vec<f64>, coef_myi: Vec<f64> },
    /// Plane fit in leading edge width and sigma0 (Envisat CDR)
    PolyPlaneFit {
        intercept: f64,
        coef_lew: Vec<f64>,
        coef_sig0: Vec<f64>,
    },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::Fixed { value: 0.5 }
    }
}

impl ThresholdPolicy {
    /// Classifier channels this policy reads
    pub fn required_channels(&self) -> Vec<&'static str> {
        match self {
            ThresholdPolicy::Fixed { .. } => vec![],
            ThresholdPolicy::SigmaFunc { .. } => vec![SIGMA0],
            ThresholdPolicy::SitypeSigmaFunc { .. } => vec![SIGMA0, SITYPE],
            ThresholdPolicy::PolyPlaneFit { .. } => vec![SIGMA0, LEADING_EDGE_WIDTH],
        }
    }

    /// Check that `classifiers` provides every channel of this policy
    pub fn check_channels(&self, classifiers: Option<&ClassifierChannels>) -> AltrackResult<()> {
        for name in self.required_channels() {
            let available = match classifiers {
                Some(channels) if name == LEADING_EDGE_WIDTH => {
                    channels.contains(LEADING_EDGE_WIDTH)
                        || (channels.contains(LEADING_EDGE_WIDTH_FIRST_HALF)
                            && channels.contains(LEADING_EDGE_WIDTH_SECOND_HALF))
                }
                Some(channels) => channels.contains(name),
                None => false,
            };
            if !available {
                return Err(AltrackError::MissingClassifier(name.to_string()));
            }
        }
        Ok(())
    }

    /// Configuration-time sanity check. Values outside (0, 1] are legal but suspicious.
    pub fn validate(&self) -> AltrackResult<()> {
        match self {
            ThresholdPolicy::Fixed { value } => {
                if !value.is_finite() {
                    return Err(AltrackError::Config(format!(
                        "fixed threshold must be finite, got {}",
                        value
                    )));
                }
                if !is_nominal_threshold(*value) {
                    log::warn!("Fixed TFMRA threshold {} is outside (0, 1]", value);
                }
            }
            ThresholdPolicy::SigmaFunc { coef } => {
                require_coefficients("coef", coef)?;
            }
            ThresholdPolicy::SitypeSigmaFunc { coef_fyi, coef_myi } => {
                require_coefficients("coef_fyi", coef_fyi)?;
                require_coefficients("coef_myi", coef_myi)?;
            }
            ThresholdPolicy::PolyPlaneFit {
                intercept,
                coef_lew,
                coef_sig0,
            } => {
                if !intercept.is_finite() {
                    return Err(AltrackError::Config(
                        "poly_plane_fit intercept must be finite".to_string(),
                    ));
                }
                if coef_lew.iter().chain(coef_sig0.iter()).any(|c| !c.is_finite()) {
                    return Err(AltrackError::Config(
                        "poly_plane_fit coefficients must be finite".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Evaluate the threshold for every record in `indices`.
    ///
    /// The result has `n_records` entries; records outside `indices` are NaN.
    pub fn evaluate(
        &self,
        classifiers: Option<&ClassifierChannels>,
        indices: &[usize],
        n_records: usize,
    ) -> AltrackResult<Array1<f64>> {
        if let Some(&max_index) = indices.iter().max() {
            if max_index >= n_records {
                return Err(AltrackError::ShapeMismatch(format!(
                    "record index {} out of bounds for {} records",
                    max_index, n_records
                )));
            }
        }

        self.check_channels(classifiers)?;
        let mut threshold = Array1::from_elem(n_records, f64::NAN);

        match self {
            ThresholdPolicy::Fixed { value } => {
                for &i in indices {
                    threshold[i] = *value;
                }
            }
            ThresholdPolicy::SigmaFunc { coef } => {
                let sigma0 = channel(classifiers, SIGMA0, n_records)?;
                for &i in indices {
                    threshold[i] = polyval(coef, sigma0[i]);
                }
            }
            ThresholdPolicy::SitypeSigmaFunc { coef_fyi, coef_myi } => {
                let sigma0 = channel(classifiers, SIGMA0, n_records)?;
                let sitype = channel(classifiers, SITYPE, n_records)?;
                for &i in indices {
                    // Strict: sitype == 0.5 stays first-year ice
                    let coef = if sitype[i] > MYI_SITYPE_LIMIT { coef_myi } else { coef_fyi };
                    threshold[i] = polyval(coef, sigma0[i]);
                }
            }
            ThresholdPolicy::PolyPlaneFit {
                intercept,
                coef_lew,
                coef_sig0,
            } => {
                let sigma0 = channel(classifiers, SIGMA0, n_records)?;
                let lew = leading_edge_width(classifiers, n_records)?;
                for &i in indices {
                    let mut value = *intercept;
                    for (k, c) in coef_lew.iter().enumerate() {
                        value += c * lew[i].powi(k as i32 + 1);
                    }
                    for (k, c) in coef_sig0.iter().enumerate() {
                        value += c * sigma0[i].powi(k as i32 + 1);
                    }
                    threshold[i] = value;
                }
            }
        }

        let n_outside = indices
            .iter()
            .filter(|&&i| threshold[i].is_finite() && !is_nominal_threshold(threshold[i]))
            .count();
        if n_outside > 0 {
            log::warn!(
                "{} of {} TFMRA thresholds are outside (0, 1]",
                n_outside,
                indices.len()
            );
        }

        Ok(threshold)
    }
}

/// Evaluate sum(coef[i] * x^i)
pub fn polyval(coef: &[f64], x: f64) -> f64 {
    coef.iter()
        .enumerate()
        .map(|(i, c)| c * x.powi(i as i32))
        .sum()
}

fn is_nominal_threshold(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

fn require_coefficients(name: &str, coef: &[f64]) -> AltrackResult<()> {
    if coef.is_empty() {
        return Err(AltrackError::Config(format!(
            "threshold polynomial {} must not be empty",
            name
        )));
    }
    if coef.iter().any(|c| !c.is_finite()) {
        return Err(AltrackError::Config(format!(
            "threshold polynomial {} must be finite",
            name
        )));
    }
    Ok(())
}

fn channel<'a>(
    classifiers: Option<&'a ClassifierChannels>,
    name: &str,
    n_records: usize,
) -> AltrackResult<&'a Array1<f64>> {
    classifiers
        .ok_or_else(|| AltrackError::MissingClassifier(name.to_string()))?
        .require(name, n_records)
}

/// Leading edge width, either as one channel or as the sum of both halves
fn leading_edge_width(
    classifiers: Option<&ClassifierChannels>,
    n_records: usize,
) -> AltrackResult<Array1<f64>> {
    let channels =
        classifiers.ok_or_else(|| AltrackError::MissingClassifier(LEADING_EDGE_WIDTH.to_string()))?;
    if channels.contains(LEADING_EDGE_WIDTH) {
        return Ok(channels.require(LEADING_EDGE_WIDTH, n_records)?.clone());
    }
    let first = channels.require(LEADING_EDGE_WIDTH_FIRST_HALF, n_records)?;
    let second = channels.require(LEADING_EDGE_WIDTH_SECOND_HALF, n_records)?;
    Ok(first + second)
}
