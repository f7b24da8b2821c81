//! Level-2 along-track record set updated by the retrackers

use crate::core::retracker::Retracker;
use crate::types::{
    AltrackError, AltrackResult, AuxiliaryVariable, RadarMode, SurfaceTypeClassification,
};
use ndarray::Array1;

/// Level-2 parameter with per-record uncertainty
#[derive(Debug, Clone, PartialEq)]
pub struct L2Parameter {
    pub value: Array1<f64>,
    pub uncertainty: Array1<f64>,
}

impl L2Parameter {
    fn new(n_records: usize) -> Self {
        Self {
            value: Array1::from_elem(n_records, f64::NAN),
            uncertainty: Array1::zeros(n_records),
        }
    }
}

/// Along-track Level-2 data of one granule
#[derive(Debug, Clone)]
pub struct Level2Data {
    /// Satellite altitude above the reference ellipsoid (meters)
    pub altitude: Array1<f64>,
    pub surface_type: SurfaceTypeClassification,
    /// Multi-year ice fraction
    pub sitype: Option<Array1<f64>>,
    pub range: L2Parameter,
    pub elevation: L2Parameter,
    pub power: Array1<f64>,
    pub radar_mode: Option<Array1<RadarMode>>,
    auxiliary: Vec<AuxiliaryVariable>,
}

impl Level2Data {
    pub fn new(
        altitude: Array1<f64>,
        surface_type: SurfaceTypeClassification,
    ) -> AltrackResult<Self> {
        let n_records = altitude.len();
        if surface_type.n_records() != n_records {
            return Err(AltrackError::ShapeMismatch(format!(
                "surface type has {} records, altitude has {}",
                surface_type.n_records(),
                n_records
            )));
        }

        Ok(Self {
            altitude,
            surface_type,
            sitype: None,
            range: L2Parameter::new(n_records),
            elevation: L2Parameter::new(n_records),
            power: Array1::from_elem(n_records, f64::NAN),
            radar_mode: None,
            auxiliary: Vec::new(),
        })
    }

    /// Attach the multi-year ice fraction
    pub fn with_sitype(mut self, sitype: Array1<f64>) -> AltrackResult<Self> {
        self.check_len("sitype", sitype.len())?;
        self.sitype = Some(sitype);
        Ok(self)
    }

    pub fn n_records(&self) -> usize {
        self.altitude.len()
    }

    fn check_len(&self, name: &str, len: usize) -> AltrackResult<()> {
        if len != self.n_records() {
            return Err(AltrackError::ShapeMismatch(format!(
                "{} has {} records, expected {}",
                name,
                len,
                self.n_records()
            )));
        }
        Ok(())
    }

    /// Transfer range, elevation, power and auxiliary outputs of a retracker
    /// at the indices it processed
    pub fn update_retracked_range(&mut self, retracker: &dyn Retracker) -> AltrackResult<()> {
        let (indices, output) = match (retracker.indices(), retracker.output()) {
            (Some(indices), Some(output)) => (indices, output),
            _ => return Ok(()),
        };
        self.check_len("retracker output", output.len())?;

        for &i in indices {
            let range = output.range[i];
            let uncertainty = output.uncertainty[i];
            self.range.value[i] = range;
            self.range.uncertainty[i] = uncertainty;
            self.elevation.value[i] = self.altitude[i] - range;
            self.elevation.uncertainty[i] = uncertainty;
            self.power[i] = output.power[i];
        }

        for var in retracker.auxiliary_outputs() {
            self.check_len(&var.id, var.value.len())?;
            match self.auxiliary.iter_mut().find(|existing| existing.id == var.id) {
                Some(existing) => {
                    for &i in indices {
                        existing.value[i] = var.value[i];
                    }
                    if let (Some(target), Some(source)) =
                        (existing.uncertainty.as_mut(), var.uncertainty.as_ref())
                    {
                        for &i in indices {
                            target[i] = source[i];
                        }
                    }
                }
                None => {
                    log::debug!("New auxiliary parameter {} ({})", var.id, var.name);
                    self.auxiliary.push(var.clone());
                }
            }
        }

        Ok(())
    }

    /// Add or replace an auxiliary parameter
    pub fn set_auxiliary_parameter(
        &mut self,
        id: &str,
        name: &str,
        value: Array1<f64>,
        uncertainty: Option<Array1<f64>>,
    ) -> AltrackResult<()> {
        self.check_len(id, value.len())?;
        if let Some(uncertainty) = &uncertainty {
            self.check_len(id, uncertainty.len())?;
        }

        self.auxiliary.retain(|var| var.id != id);
        self.auxiliary.push(AuxiliaryVariable {
            id: id.to_string(),
            name: name.to_string(),
            value,
            uncertainty,
        });
        Ok(())
    }

    pub fn auxiliary(&self, id: &str) -> Option<&AuxiliaryVariable> {
        self.auxiliary.iter().find(|var| var.id == id)
    }

    pub fn auxiliary_variables(&self) -> &[AuxiliaryVariable] {
        &self.auxiliary
    }
}
