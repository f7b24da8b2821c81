//! Level-2 processing steps that run after the surface type dispatcher

use crate::core::level2::Level2Data;
use crate::types::{AltrackError, AltrackResult, ClassifierChannels};
use ndarray::Array1;

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Pulse deblurring correction for ERS-1/2 elevations.
///
/// The correction is derived from the `epss` classifier (seconds) and only
/// applies where it is negative.
#[derive(Debug, Clone)]
pub struct ErsPulseDeblurring {
    pub classifier_name: String,
}

impl Default for ErsPulseDeblurring {
    fn default() -> Self {
        Self {
            classifier_name: "epss".to_string(),
        }
    }
}

impl ErsPulseDeblurring {
    pub const AUX_ID: &'static str = "pdbc";
    pub const AUX_NAME: &'static str = "pulse_deblurring_correction";

    pub fn new() -> Self {
        Self::default()
    }

    /// Correction in meters for every record
    pub fn correction(&self, classifiers: &ClassifierChannels, n_records: usize) -> AltrackResult<Array1<f64>> {
        let epss = classifiers.require(&self.classifier_name, n_records)?;
        Ok(epss.mapv(|eps| {
            let eps = eps * SPEED_OF_LIGHT * 0.5;
            if eps < 0.0 {
                eps / 5.0
            } else {
                0.0
            }
        }))
    }

    /// Add the correction to the elevation. Returns the error flag of this step.
    pub fn execute(
        &self,
        classifiers: &ClassifierChannels,
        l2: &mut Level2Data,
    ) -> AltrackResult<Array1<bool>> {
        let n_records = l2.n_records();
        let correction = self.correction(classifiers, n_records)?;

        l2.elevation.value += &correction;

        let n_corrected = correction.iter().filter(|&&c| c != 0.0).count();
        log::debug!("Pulse deblurring correction applied to {} records", n_corrected);

        l2.set_auxiliary_parameter(Self::AUX_ID, Self::AUX_NAME, correction, None)?;
        Ok(Array1::from_elem(n_records, false))
    }
}

/// Elevations of additional retrackers whose ranges are provided as
/// classifier channels (e.g. the ocean and ice retrackers of an SGDR product).
#[derive(Debug, Clone)]
pub struct SgdrMultipleElevations {
    classifier_name_fmt: String,
    output_name_fmt: String,
    predefined_retrackers: Vec<String>,
}

impl SgdrMultipleElevations {
    /// `classifier_name_fmt` and `output_name_fmt` contain a `{}` placeholder
    /// for the retracker id.
    pub fn new(
        classifier_name_fmt: &str,
        output_name_fmt: &str,
        predefined_retrackers: Vec<String>,
    ) -> AltrackResult<Self> {
        for fmt in [classifier_name_fmt, output_name_fmt] {
            if !fmt.contains("{}") {
                return Err(AltrackError::Config(format!(
                    "name format '{}' has no {{}} placeholder",
                    fmt
                )));
            }
        }
        Ok(Self {
            classifier_name_fmt: classifier_name_fmt.to_string(),
            output_name_fmt: output_name_fmt.to_string(),
            predefined_retrackers,
        })
    }

    pub fn classifier_name(&self, retracker_id: &str) -> String {
        self.classifier_name_fmt.replacen("{}", retracker_id, 1)
    }

    pub fn output_name(&self, retracker_id: &str) -> String {
        self.output_name_fmt.replacen("{}", retracker_id, 1)
    }

    /// Store `altitude - range` of every predefined retracker as auxiliary
    /// parameter `elev<id>`. Returns the error flag of this step.
    pub fn execute(
        &self,
        classifiers: &ClassifierChannels,
        l2: &mut Level2Data,
    ) -> AltrackResult<Array1<bool>> {
        let n_records = l2.n_records();

        for retracker_id in &self.predefined_retrackers {
            let range = classifiers.require(&self.classifier_name(retracker_id), n_records)?;
            let elevation = &l2.altitude - range;
            l2.set_auxiliary_parameter(
                &format!("elev{}", retracker_id),
                &self.output_name(retracker_id),
                elevation,
                None,
            )?;
        }

        Ok(Array1::from_elem(n_records, false))
    }
}
