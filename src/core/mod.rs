//! Core retracking modules

pub mod threshold;
pub mod waveform_filter;
pub mod crossing;
pub mod config;
pub mod retracker;
pub mod tfmra;
pub mod ctfmra;
pub mod level2;
pub mod dispatcher;
pub mod corrections;

// Re-export main types
pub use threshold::ThresholdPolicy;
pub use waveform_filter::{
    filter_waveform, preprocess_waveforms, FilterParams, FilteredWaveform, InterpolationKind,
    KernelSet, PreprocessedWaveforms,
};
pub use crossing::{threshold_range, threshold_range_fast, ThresholdCrossing};
pub use config::{
    DispatcherConfig, RetrackerConfig, RetrackerDefinition, RetrackerOptions, UncertaintyOption,
};
pub use retracker::{RetrackResult, RetrackedPoint, Retracker, RetrackerBase, RetrackerOutput};
pub use tfmra::Tfmra;
pub use ctfmra::CTfmra;
pub use level2::{L2Parameter, Level2Data};
pub use dispatcher::{
    DispatchState, DispatchSummary, RetrackerKind, SurfaceTypeDispatcher, SurfaceTypeReport,
};
pub use corrections::{ErsPulseDeblurring, SgdrMultipleElevations};
