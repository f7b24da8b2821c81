use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Radar altimeter operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadarMode {
    /// Low resolution mode (pulse limited)
    LRM = 0,
    /// SAR mode (delay-Doppler)
    SAR = 1,
    /// SAR interferometric mode
    SIN = 2,
}

impl RadarMode {
    /// Index into radar-mode dependent option triples
    pub fn index(self) -> usize {
        self as usize
    }

    /// Convert a Level-1 radar mode flag
    pub fn from_flag(flag: u8) -> AltrackResult<Self> {
        match flag {
            0 => Ok(RadarMode::LRM),
            1 => Ok(RadarMode::SAR),
            2 => Ok(RadarMode::SIN),
            _ => Err(AltrackError::InvalidFormat(format!(
                "Invalid radar mode flag: {}",
                flag
            ))),
        }
    }
}

impl std::fmt::Display for RadarMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadarMode::LRM => write!(f, "LRM"),
            RadarMode::SAR => write!(f, "SAR"),
            RadarMode::SIN => write!(f, "SIN"),
        }
    }
}

/// Radar echo power profiles of one Level-1 granule (records x range bins)
#[derive(Debug, Clone)]
pub struct Waveform {
    power: Array2<f64>,
    range: Array2<f64>,
    radar_mode: Array1<RadarMode>,
    is_valid: Array1<bool>,
}

impl Waveform {
    /// Create a waveform collection, checking that all arrays agree in shape
    pub fn new(
        power: Array2<f64>,
        range: Array2<f64>,
        radar_mode: Array1<RadarMode>,
        is_valid: Array1<bool>,
    ) -> AltrackResult<Self> {
        if power.dim() != range.dim() {
            return Err(AltrackError::ShapeMismatch(format!(
                "power shape {:?} does not match range shape {:?}",
                power.dim(),
                range.dim()
            )));
        }

        let (n_records, n_bins) = power.dim();
        if n_bins == 0 {
            return Err(AltrackError::ShapeMismatch(
                "waveform must have at least one range bin".to_string(),
            ));
        }
        if radar_mode.len() != n_records || is_valid.len() != n_records {
            return Err(AltrackError::ShapeMismatch(format!(
                "expected {} records, got {} radar modes and {} validity flags",
                n_records,
                radar_mode.len(),
                is_valid.len()
            )));
        }

        Ok(Self {
            power,
            range,
            radar_mode,
            is_valid,
        })
    }

    /// Create a waveform collection from raw radar mode flags, all records valid
    pub fn from_flags(
        power: Array2<f64>,
        range: Array2<f64>,
        radar_mode_flags: &[u8],
    ) -> AltrackResult<Self> {
        let radar_mode = radar_mode_flags
            .iter()
            .map(|&flag| RadarMode::from_flag(flag))
            .collect::<AltrackResult<Vec<_>>>()?;
        let n_records = radar_mode.len();
        Self::new(
            power,
            range,
            Array1::from(radar_mode),
            Array1::from_elem(n_records, true),
        )
    }

    pub fn n_records(&self) -> usize {
        self.power.nrows()
    }

    pub fn n_bins(&self) -> usize {
        self.power.ncols()
    }

    pub fn power(&self) -> &Array2<f64> {
        &self.power
    }

    pub fn range(&self) -> &Array2<f64> {
        &self.range
    }

    pub fn radar_mode(&self) -> &Array1<RadarMode> {
        &self.radar_mode
    }

    pub fn is_valid(&self) -> &Array1<bool> {
        &self.is_valid
    }
}

/// Named per-record classifier arrays (sigma0, leading edge width, sitype, ...)
#[derive(Debug, Clone, Default)]
pub struct ClassifierChannels {
    channels: HashMap<String, Array1<f64>>,
}

impl ClassifierChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a channel
    pub fn insert(&mut self, name: impl Into<String>, values: Array1<f64>) {
        self.channels.insert(name.into(), values);
    }

    /// Builder-style variant of [`ClassifierChannels::insert`]
    pub fn with_channel(mut self, name: impl Into<String>, values: Array1<f64>) -> Self {
        self.insert(name, values);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Get a channel by name, failing if it is absent
    pub fn get(&self, name: &str) -> AltrackResult<&Array1<f64>> {
        self.channels
            .get(name)
            .ok_or_else(|| AltrackError::MissingClassifier(name.to_string()))
    }

    /// Get a channel by name and check it covers `n_records`
    pub fn require(&self, name: &str, n_records: usize) -> AltrackResult<&Array1<f64>> {
        let values = self.get(name)?;
        if values.len() != n_records {
            return Err(AltrackError::ShapeMismatch(format!(
                "classifier {} has {} records, expected {}",
                name,
                values.len(),
                n_records
            )));
        }
        Ok(values)
    }
}

/// Surface type classes of the Level-2 processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    Unknown = 0,
    Ocean = 1,
    Lead = 2,
    Polynya = 3,
    SeaIce = 4,
    ClosedSea = 5,
    LandIce = 6,
    Land = 7,
    Invalid = 8,
}

impl SurfaceType {
    pub const ALL: [SurfaceType; 9] = [
        SurfaceType::Unknown,
        SurfaceType::Ocean,
        SurfaceType::Lead,
        SurfaceType::Polynya,
        SurfaceType::SeaIce,
        SurfaceType::ClosedSea,
        SurfaceType::LandIce,
        SurfaceType::Land,
        SurfaceType::Invalid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SurfaceType::Unknown => "unknown",
            SurfaceType::Ocean => "ocean",
            SurfaceType::Lead => "lead",
            SurfaceType::Polynya => "polynya",
            SurfaceType::SeaIce => "sea_ice",
            SurfaceType::ClosedSea => "closed_sea",
            SurfaceType::LandIce => "land_ice",
            SurfaceType::Land => "land",
            SurfaceType::Invalid => "invalid",
        }
    }

    pub fn from_code(code: u8) -> AltrackResult<Self> {
        SurfaceType::ALL
            .iter()
            .copied()
            .find(|st| *st as u8 == code)
            .ok_or_else(|| {
                AltrackError::InvalidFormat(format!("Invalid surface type code: {}", code))
            })
    }
}

impl FromStr for SurfaceType {
    type Err = AltrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SurfaceType::ALL
            .iter()
            .copied()
            .find(|st| st.name() == s)
            .ok_or_else(|| AltrackError::Config(format!("unknown surface type: {}", s)))
    }
}

impl std::fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-record surface type flag (exactly one class per record)
#[derive(Debug, Clone)]
pub struct SurfaceTypeClassification {
    flag: Array1<SurfaceType>,
}

impl SurfaceTypeClassification {
    pub fn new(flag: Array1<SurfaceType>) -> Self {
        Self { flag }
    }

    /// Build from Level-2 surface type codes
    pub fn from_codes(codes: &[u8]) -> AltrackResult<Self> {
        let flag = codes
            .iter()
            .map(|&code| SurfaceType::from_code(code))
            .collect::<AltrackResult<Vec<_>>>()?;
        Ok(Self::new(Array1::from(flag)))
    }

    /// Build from named boolean masks; later masks take precedence
    pub fn from_masks(
        n_records: usize,
        masks: &[(SurfaceType, Array1<bool>)],
    ) -> AltrackResult<Self> {
        let mut classification = Self::new(Array1::from_elem(n_records, SurfaceType::Unknown));
        for (surface_type, mask) in masks {
            classification.add_flag(mask, *surface_type)?;
        }
        Ok(classification)
    }

    pub fn n_records(&self) -> usize {
        self.flag.len()
    }

    pub fn flag(&self) -> &Array1<SurfaceType> {
        &self.flag
    }

    /// Record indices classified as `surface_type`
    pub fn indices(&self, surface_type: SurfaceType) -> Vec<usize> {
        self.flag
            .iter()
            .enumerate()
            .filter(|(_, st)| **st == surface_type)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn num(&self, surface_type: SurfaceType) -> usize {
        self.flag.iter().filter(|st| **st == surface_type).count()
    }

    pub fn mask(&self, surface_type: SurfaceType) -> Array1<bool> {
        self.flag.mapv(|st| st == surface_type)
    }

    /// Set `surface_type` for every record where `mask` is true
    pub fn add_flag(&mut self, mask: &Array1<bool>, surface_type: SurfaceType) -> AltrackResult<()> {
        if mask.len() != self.flag.len() {
            return Err(AltrackError::ShapeMismatch(format!(
                "surface type mask has {} records, expected {}",
                mask.len(),
                self.flag.len()
            )));
        }
        for (st, &set) in self.flag.iter_mut().zip(mask.iter()) {
            if set {
                *st = surface_type;
            }
        }
        Ok(())
    }
}

/// Named side-channel output of a retracker (e.g. the threshold actually used)
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryVariable {
    pub id: String,
    pub name: String,
    pub value: Array1<f64>,
    pub uncertainty: Option<Array1<f64>>,
}

/// Recoverable per-waveform failure. Marks a record invalid, never aborts a granule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum WaveformFailure {
    #[error("no finite maximum in waveform")]
    NoFiniteMaximum,

    #[error("no threshold crossing on the leading edge")]
    NoThresholdCrossing,

    #[error("leading edge gradient too small for interpolation")]
    FlatGradient,

    #[error("waveform flagged invalid upstream")]
    FlaggedInvalid,
}

/// Error types for retracking
#[derive(Debug, thiserror::Error)]
pub enum AltrackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing classifier channel: {0}")]
    MissingClassifier(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Settings parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for retracking operations
pub type AltrackResult<T> = Result<T, AltrackError>;
