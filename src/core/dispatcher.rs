//! Surface type dispatcher.
//!
//! Routes the records of each configured surface type to their retracker and
//! merges the results into the Level-2 record set. Surface types partition the
//! records, so every record is written by at most one retracker.

use crate::core::config::{DispatcherConfig, RetrackerConfig};
use crate::core::ctfmra::CTfmra;
use crate::core::level2::Level2Data;
use crate::core::retracker::Retracker;
use crate::core::threshold::SITYPE;
use crate::core::tfmra::Tfmra;
use crate::types::{AltrackError, AltrackResult, ClassifierChannels, SurfaceType, Waveform};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Retracker variants available to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrackerKind {
    /// Reference TFMRA
    Tfmra,
    /// Optimized TFMRA
    CTfmra,
    /// Reference TFMRA with Envisat defaults
    Sicci2TfmraEnvisat,
}

impl RetrackerKind {
    pub fn name(self) -> &'static str {
        match self {
            RetrackerKind::Tfmra => Tfmra::NAME,
            RetrackerKind::CTfmra => CTfmra::NAME,
            RetrackerKind::Sicci2TfmraEnvisat => Tfmra::ENVISAT_NAME,
        }
    }

    /// Default options of the variant
    pub fn default_config(self) -> RetrackerConfig {
        match self {
            RetrackerKind::Tfmra | RetrackerKind::CTfmra => RetrackerConfig::default(),
            RetrackerKind::Sicci2TfmraEnvisat => RetrackerConfig::envisat(),
        }
    }

    /// Check `config` against the variant without building a retracker
    pub fn validate_config(self, config: &RetrackerConfig) -> AltrackResult<()> {
        self.create(config.clone()).map(|_| ())
    }

    /// Build a configured retracker
    pub fn create(self, config: RetrackerConfig) -> AltrackResult<Box<dyn Retracker>> {
        let mut retracker: Box<dyn Retracker> = match self {
            RetrackerKind::Tfmra => Box::new(Tfmra::new()),
            RetrackerKind::CTfmra => Box::new(CTfmra::new()),
            RetrackerKind::Sicci2TfmraEnvisat => Box::new(Tfmra::envisat()),
        };
        retracker.set_options(config)?;
        Ok(retracker)
    }
}

impl FromStr for RetrackerKind {
    type Err = AltrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TFMRA" => Ok(RetrackerKind::Tfmra),
            "cTFMRA" => Ok(RetrackerKind::CTfmra),
            "SICCI2TfmraEnvisat" => Ok(RetrackerKind::Sicci2TfmraEnvisat),
            _ => Err(AltrackError::Config(format!("unknown retracker: {}", s))),
        }
    }
}

impl std::fmt::Display for RetrackerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Selecting(SurfaceType),
    Configuring(SurfaceType),
    Retracking(SurfaceType),
    Merging(SurfaceType),
    Done,
}

/// Retracking statistics of one surface type
#[derive(Debug, Clone)]
pub struct SurfaceTypeReport {
    pub surface_type: SurfaceType,
    pub retracker: RetrackerKind,
    pub n_records: usize,
    pub n_invalid: usize,
    pub elapsed: Duration,
}

/// Outcome of a dispatch call
#[derive(Debug, Clone)]
pub struct DispatchSummary {
    /// Consolidated per-record invalid flag of all retrackers
    pub invalid: Array1<bool>,
    pub reports: Vec<SurfaceTypeReport>,
    pub processed_at: DateTime<Utc>,
}

impl DispatchSummary {
    pub fn n_invalid(&self) -> usize {
        self.invalid.iter().filter(|&&flag| flag).count()
    }
}

/// Retracks every configured surface type of a granule
pub struct SurfaceTypeDispatcher {
    config: DispatcherConfig,
    state: DispatchState,
}

impl SurfaceTypeDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            state: DispatchState::Idle,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    fn transition(&mut self, state: DispatchState) {
        log::debug!("Dispatcher state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Retrack all configured surface types and merge the results into `l2`.
    ///
    /// Shape and classifier checks of every surface type with records run
    /// before the first retracker, so a fatal error leaves `l2` untouched.
    pub fn execute(
        &mut self,
        waveform: &Waveform,
        classifiers: &ClassifierChannels,
        l2: &mut Level2Data,
    ) -> AltrackResult<DispatchSummary> {
        self.state = DispatchState::Idle;
        let n_records = waveform.n_records();

        if l2.n_records() != n_records {
            return Err(AltrackError::ShapeMismatch(format!(
                "Level-2 data has {} records, waveforms have {}",
                l2.n_records(),
                n_records
            )));
        }

        let channels = Arc::new(Self::merge_channels(classifiers, l2));
        for definition in self.config.definitions() {
            if l2.surface_type.num(definition.surface_type) == 0 {
                continue;
            }
            definition
                .config
                .threshold
                .evaluate(Some(channels.as_ref()), &[], n_records)?;
        }

        l2.radar_mode = Some(waveform.radar_mode().clone());
        let mut invalid = Array1::from_elem(n_records, false);
        let mut reports = Vec::new();
        let definitions = self.config.definitions().to_vec();

        for definition in definitions {
            let surface_type = definition.surface_type;

            self.transition(DispatchState::Selecting(surface_type));
            let indices = l2.surface_type.indices(surface_type);
            if indices.is_empty() {
                log::info!("no waveforms of type {}", surface_type);
                continue;
            }

            self.transition(DispatchState::Configuring(surface_type));
            let mut retracker = definition.kind.create(definition.config)?;
            retracker.set_indices(indices.clone());
            retracker.set_classifier(Arc::clone(&channels));

            self.transition(DispatchState::Retracking(surface_type));
            let start = Instant::now();
            retracker.retrack(waveform)?;
            let elapsed = start.elapsed();

            self.transition(DispatchState::Merging(surface_type));
            l2.update_retracked_range(retracker.as_ref())?;

            let mut n_invalid = 0;
            if let Some(flag) = retracker.error_flag() {
                for &i in &indices {
                    if flag[i] {
                        invalid[i] = true;
                        n_invalid += 1;
                    }
                }
            }

            log::info!(
                "Retrack class {} with {} in {:.3} seconds",
                surface_type,
                retracker.name(),
                elapsed.as_secs_f64()
            );
            log::debug!("{} of {} {} waveforms invalid", n_invalid, indices.len(), surface_type);

            reports.push(SurfaceTypeReport {
                surface_type,
                retracker: definition.kind,
                n_records: indices.len(),
                n_invalid,
                elapsed,
            });
        }

        self.transition(DispatchState::Done);
        l2.surface_type.add_flag(&invalid, SurfaceType::Invalid)?;

        Ok(DispatchSummary {
            invalid,
            reports,
            processed_at: Utc::now(),
        })
    }

    /// Level-1 classifiers plus the Level-2 ice type fraction
    fn merge_channels(classifiers: &ClassifierChannels, l2: &Level2Data) -> ClassifierChannels {
        let mut channels = classifiers.clone();
        if let Some(sitype) = &l2.sitype {
            if !channels.contains(SITYPE) {
                channels.insert(SITYPE, sitype.clone());
            }
        }
        channels
    }
}
