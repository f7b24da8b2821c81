//! altrack: A Fast, Modular Radar Altimeter Waveform Retracker
//!
//! This library converts radar altimeter waveforms into sub-bin range
//! measurements with the Threshold First Maximum Retracker Algorithm (TFMRA),
//! using adaptive per-waveform thresholds and surface type dependent
//! retracker configurations.

pub mod types;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types
pub use types::{
    AltrackError, AltrackResult, AuxiliaryVariable, ClassifierChannels, RadarMode, SurfaceType,
    SurfaceTypeClassification, Waveform, WaveformFailure,
};

pub use crate::core::{
    CTfmra, DispatcherConfig, Level2Data, Retracker, RetrackerConfig, RetrackerKind,
    SurfaceTypeDispatcher, ThresholdPolicy, Tfmra,
};
