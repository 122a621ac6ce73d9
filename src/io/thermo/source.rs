//! The view of a Thermo RAW acquisition that the converters consume.
//!
//! Everything a conversion needs from an instrument file is expressed by
//! [`RawFileAccess`]. The vendor enumerations are mirrored here so that the
//! controlled vocabulary lookups in [`super::instruments`] can be written
//! against them, and so a run can be captured as a serializable snapshot.
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mzsignal::peak_picker::{PeakFitType, PeakPicker, PeakPickerError};

#[derive(Debug, Error)]
pub enum RawFileError {
    #[error("The RAW file {0} does not exist")]
    NotFound(PathBuf),
    #[error("Failed to open the RAW file {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },
    #[error("The RAW file reported an error: {0}")]
    FileError(String),
    #[error("The RAW file {0} is still being acquired")]
    InAcquisition(PathBuf),
    #[error("The RAW file {0} does not contain any mass spectrometry data")]
    NoMsDevice(PathBuf),
    #[error("The RAW file {0} does not contain any scans")]
    Empty(PathBuf),
    #[error("Scan {0} is not available")]
    ScanNotFound(i32),
    #[error("Failed to centroid scan {0}: {1:?}")]
    PeakPicking(i32, PeakPickerError),
    #[error("An I/O error occurred: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to decode RAW file snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MassAnalyzerType {
    FTMS,
    ITMS,
    Sector,
    TOFMS,
    TQMS,
    SQMS,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IonizationModeType {
    ElectroSpray,
    GlowDischarge,
    ChemicalIonization,
    AtmosphericPressureChemicalIonization,
    MatrixAssistedLaserDesorptionIonization,
    NanoSpray,
    ElectronImpact,
    FastAtomBombardment,
    ThermoSpray,
    FieldDesorption,
    PaperSprayIonization,
    CardNanoSprayIonization,
    Any,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationType {
    CID,
    HCD,
    ETD,
    ECD,
    MultiPhotonDissociation,
    ProtonTransferReaction,
    NegativeElectronTransferDissociation,
    NegativeProtonTransferReaction,
    UltraVioletPhotoDissociation,
    Any,
}

/// The scan order reported by a scan filter. Non mass spectrometry orders
/// (neutral gain, neutral loss, parent scans) are treated as MS1 when a
/// spectrum level is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MSOrderType {
    Ng,
    Nl,
    Par,
    Any,
    #[default]
    Ms,
    Ms2,
    Ms3,
    Ms4,
    Ms5,
    Ms6,
    Ms7,
    Ms8,
    Ms9,
    Ms10,
}

impl MSOrderType {
    pub const fn ms_level(&self) -> u8 {
        match self {
            Self::Ng | Self::Nl | Self::Par | Self::Any | Self::Ms => 1,
            Self::Ms2 => 2,
            Self::Ms3 => 3,
            Self::Ms4 => 4,
            Self::Ms5 => 5,
            Self::Ms6 => 6,
            Self::Ms7 => 7,
            Self::Ms8 => 8,
            Self::Ms9 => 9,
            Self::Ms10 => 10,
        }
    }

    pub const fn from_level(level: u8) -> Self {
        match level {
            0 | 1 => Self::Ms,
            2 => Self::Ms2,
            3 => Self::Ms3,
            4 => Self::Ms4,
            5 => Self::Ms5,
            6 => Self::Ms6,
            7 => Self::Ms7,
            8 => Self::Ms8,
            9 => Self::Ms9,
            _ => Self::Ms10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PolarityType {
    Positive,
    Negative,
    #[default]
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScanDataType {
    Centroid,
    Profile,
    #[default]
    Any,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TraceType {
    #[default]
    BasePeak,
    TIC,
    /// The summed intensity inside [`TraceWindow::mass_range`]
    MassRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Device {
    #[default]
    MS,
    MSAnalog,
    Analog,
    UV,
    Pda,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunHeader {
    pub first_spectrum: i32,
    pub last_spectrum: i32,
    /// Minutes
    pub start_time: f64,
    /// Minutes
    pub end_time: f64,
    pub low_mass: f64,
    pub high_mass: f64,
    pub spectra_count: i32,
    pub mass_resolution: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InstrumentData {
    pub name: String,
    pub model: String,
    pub serial_number: String,
    pub software_version: String,
    pub hardware_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SampleInformation {
    pub sample_name: String,
    pub sample_id: String,
    pub sample_type: String,
    pub comment: String,
    pub vial: String,
    pub sample_volume: f64,
    pub injection_volume: f64,
    pub row_number: i32,
    pub dilution_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanStatistics {
    pub tic: f64,
    pub base_peak_mass: f64,
    pub base_peak_intensity: f64,
    pub low_mass: f64,
    pub high_mass: f64,
    pub is_centroid_scan: bool,
}

/// Vendor centroided peaks, in ascending mass order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CentroidStream {
    pub masses: Vec<f64>,
    pub intensities: Vec<f64>,
    pub charges: Vec<f64>,
}

impl CentroidStream {
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    /// The most intense peak as a `(mass, intensity)` pair
    pub fn base_peak(&self) -> Option<(f64, f64)> {
        self.masses
            .iter()
            .zip(self.intensities.iter())
            .fold(None, |best: Option<(f64, f64)>, (mz, int)| match best {
                Some((_, best_int)) if best_int >= *int => best,
                _ => Some((*mz, *int)),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SegmentedScan {
    pub positions: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl SegmentedScan {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NoisePacket {
    pub mass: f64,
    pub noise: f64,
    pub baseline: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanFilter {
    pub ms_order: MSOrderType,
    pub polarity: PolarityType,
    pub mass_analyzer: MassAnalyzerType,
    pub ionization_mode: IonizationModeType,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            ms_order: MSOrderType::Ms,
            polarity: PolarityType::Any,
            mass_analyzer: MassAnalyzerType::Any,
            ionization_mode: IonizationModeType::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reaction {
    pub precursor_mass: f64,
    pub collision_energy: f64,
    pub collision_energy_valid: bool,
    pub isolation_width: f64,
    pub isolation_width_offset: f64,
    pub activation_type: ActivationType,
}

impl Default for Reaction {
    fn default() -> Self {
        Self {
            precursor_mass: 0.0,
            collision_energy: 0.0,
            collision_energy_valid: false,
            isolation_width: 0.0,
            isolation_width_offset: 0.0,
            activation_type: ActivationType::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RawScanEvent {
    pub filter_string: String,
    pub scan_data: ScanDataType,
    pub supplemental_activation: bool,
    pub reactions: Vec<Reaction>,
}

impl RawScanEvent {
    /// The reaction at `index`, or `None` when the event has fewer reactions
    pub fn reaction(&self, index: usize) -> Option<&Reaction> {
        self.reactions.get(index)
    }
}

impl Display for RawScanEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.filter_string)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrailerEntry {
    pub label: String,
    pub value: String,
}

impl TrailerEntry {
    pub fn new<L: Into<String>, V: Into<String>>(label: L, value: V) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// One trace, as parallel time (minutes) and intensity arrays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChromatogramTrace {
    pub times: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl ChromatogramTrace {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Restricts the scans and signal a chromatogram trace is built from.
///
/// The default window admits every scan of the range and all of its signal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceWindow {
    /// Inclusive m/z bounds, only read by [`TraceType::MassRange`]
    pub mass_range: Option<(f64, f64)>,
    /// Inclusive retention time bounds in minutes
    pub time_range: Option<(f64, f64)>,
    /// `ms`, `ms2`, .. select an MS level, any other text must occur in the
    /// scan's filter string. Both comparisons ignore case.
    pub filter: Option<String>,
}

impl TraceWindow {
    pub fn with_mass_range(mut self, low: f64, high: f64) -> Self {
        self.mass_range = Some((low, high));
        self
    }

    pub fn with_time_range(mut self, start: f64, end: f64) -> Self {
        self.time_range = Some((start, end));
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn contains_time(&self, time: f64) -> bool {
        self.time_range
            .map_or(true, |(start, end)| time >= start && time <= end)
    }

    pub fn contains_mz(&self, mz: f64) -> bool {
        self.mass_range
            .map_or(true, |(low, high)| mz >= low && mz <= high)
    }

    pub fn matches_scan(&self, ms_order: MSOrderType, filter_string: &str) -> bool {
        let Some(filter) = self.filter.as_deref() else {
            return true;
        };
        let filter = filter.trim().to_lowercase();
        match filter.strip_prefix("ms") {
            Some(level) if level.chars().all(|c| c.is_ascii_digit()) => {
                let level = level.parse::<u8>().unwrap_or(1);
                ms_order.ms_level() == level
            }
            _ => filter_string.to_lowercase().contains(&filter),
        }
    }
}

/// Read access to one opened RAW file.
///
/// Scan numbers are 1-based and contiguous between the run header's first and
/// last spectrum. Instrument selection is the only mutating operation, every
/// subsequent read applies to the selected device.
pub trait RawFileAccess {
    fn path(&self) -> &Path;

    fn is_error(&self) -> bool;

    fn in_acquisition(&self) -> bool;

    /// The vendor's description of the file error, if any
    fn file_error(&self) -> Option<&str>;

    fn instrument_count(&self, device: Device) -> usize;

    fn select_instrument(&mut self, device: Device, number: usize) -> Result<(), RawFileError>;

    fn run_header(&self) -> &RunHeader;

    fn instrument_data(&self) -> &InstrumentData;

    fn creation_date(&self) -> Option<DateTime<Utc>>;

    fn sample_information(&self) -> &SampleInformation;

    fn scan_statistics(&self, scan_number: i32) -> Result<ScanStatistics, RawFileError>;

    fn centroid_stream(&self, scan_number: i32) -> Result<CentroidStream, RawFileError>;

    fn segmented_scan(&self, scan_number: i32) -> Result<SegmentedScan, RawFileError>;

    /// Centroid the profile signal of a scan.
    ///
    /// The default implementation runs a quadratic fit [`PeakPicker`] over
    /// [`RawFileAccess::segmented_scan`].
    fn centroid_profile(&self, scan_number: i32) -> Result<CentroidStream, RawFileError> {
        let segmented = self.segmented_scan(scan_number)?;
        let intensities: Vec<f32> = segmented.intensities.iter().map(|i| *i as f32).collect();
        let peak_picker = PeakPicker {
            fit_type: PeakFitType::Quadratic,
            ..Default::default()
        };
        let mut acc = Vec::new();
        peak_picker
            .discover_peaks(&segmented.positions, &intensities, &mut acc)
            .map_err(|e| RawFileError::PeakPicking(scan_number, e))?;
        acc.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        let (masses, intensities) = acc.into_iter().map(|p| (p.mz, p.intensity as f64)).unzip();
        Ok(CentroidStream {
            masses,
            intensities,
            charges: Vec::new(),
        })
    }

    fn noise_data(&self, scan_number: i32) -> Result<Vec<NoisePacket>, RawFileError>;

    fn scan_filter(&self, scan_number: i32) -> Result<ScanFilter, RawFileError>;

    fn scan_event(&self, scan_number: i32) -> Result<RawScanEvent, RawFileError>;

    fn trailer_extra(&self, scan_number: i32) -> Result<Vec<TrailerEntry>, RawFileError>;

    /// Minutes
    fn retention_time(&self, scan_number: i32) -> Result<f64, RawFileError>;

    /// Extract traces of `trace_type` over the inclusive scan range, from the
    /// scans and signal admitted by `window`
    fn chromatogram(
        &self,
        trace_type: TraceType,
        first_scan: i32,
        last_scan: i32,
        window: &TraceWindow,
    ) -> Result<Vec<ChromatogramTrace>, RawFileError>;
}

/// Opens files of a particular kind as [`RawFileAccess`] implementations
pub trait RawFileOpener {
    type Reader: RawFileAccess;

    /// Whether this opener recognizes `path` when scanning a directory
    fn accepts(&self, path: &Path) -> bool;

    fn open(&self, path: &Path) -> Result<Self::Reader, RawFileError>;
}

/// Every top-level file in `directory` accepted by `opener`, sorted by path
pub fn raw_files_in<O: RawFileOpener>(opener: &O, directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if opener.accepts(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Open `path` and select its first MS device, rejecting files that report
/// an error, are still being acquired or hold no spectra
pub fn open_ms_run<O: RawFileOpener>(opener: &O, path: &Path) -> Result<O::Reader, RawFileError> {
    let mut raw = opener.open(path)?;
    if raw.is_error() {
        return Err(RawFileError::FileError(
            raw.file_error().unwrap_or("unknown error").to_string(),
        ));
    }
    if raw.in_acquisition() {
        return Err(RawFileError::InAcquisition(path.to_path_buf()));
    }
    if raw.instrument_count(Device::MS) == 0 {
        return Err(RawFileError::NoMsDevice(path.to_path_buf()));
    }
    raw.select_instrument(Device::MS, 1)?;
    if raw.run_header().last_spectrum < 1 {
        return Err(RawFileError::Empty(path.to_path_buf()));
    }
    Ok(raw)
}

/// The run name for a RAW file path: the file name with `.json` and then
/// `.raw` stripped, case-insensitively.
pub fn run_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = strip_suffix_ignore_case(&name, ".json");
    strip_suffix_ignore_case(name, ".raw").to_string()
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> &'a str {
    if name.len() > suffix.len() {
        let split = name.len() - suffix.len();
        if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(suffix) {
            return &name[..split];
        }
    }
    name
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_run_name() {
        assert_eq!(run_name(Path::new("/data/small.RAW")), "small");
        assert_eq!(run_name(Path::new("small.raw.json")), "small");
        assert_eq!(run_name(Path::new("run.mzML")), "run.mzML");
        assert_eq!(run_name(Path::new(".raw")), ".raw");
    }

    #[test]
    fn test_ms_order() {
        assert_eq!(MSOrderType::Ms3.ms_level(), 3);
        assert_eq!(MSOrderType::Par.ms_level(), 1);
        assert_eq!(MSOrderType::from_level(2), MSOrderType::Ms2);
        assert_eq!(MSOrderType::from_level(0).ms_level(), 1);
    }

    #[test]
    fn test_trace_window() {
        let window = TraceWindow::default();
        assert!(window.contains_mz(1e6));
        assert!(window.contains_time(-1.0));
        assert!(window.matches_scan(MSOrderType::Ms3, ""));

        let ms1 = "FTMS + p NSI Full ms [350.00-1500.00]";
        let ms2 = "ITMS + c NSI d Full ms2 500.00@cid35.00 [100.00-1000.00]";
        let window = TraceWindow::default()
            .with_mass_range(400.0, 500.0)
            .with_time_range(1.0, 2.0)
            .with_filter("ms");
        assert!(window.contains_mz(400.0) && window.contains_mz(500.0));
        assert!(!window.contains_mz(500.1));
        assert!(window.contains_time(2.0) && !window.contains_time(0.5));
        assert!(window.matches_scan(MSOrderType::Ms, ms1));
        assert!(!window.matches_scan(MSOrderType::Ms2, ms2));

        let window = TraceWindow::default().with_filter("MS2");
        assert!(window.matches_scan(MSOrderType::Ms2, ms2));
        assert!(!window.matches_scan(MSOrderType::Ms, ms1));

        let window = TraceWindow::default().with_filter("ITMS");
        assert!(window.matches_scan(MSOrderType::Ms2, ms2));
        assert!(!window.matches_scan(MSOrderType::Ms, ms1));
    }

    #[test]
    fn test_reaction_lookup() {
        let event = RawScanEvent {
            filter_string: "FTMS + p NSI d Full ms2 500.00@hcd30.00 [100.00-1000.00]".into(),
            reactions: vec![Reaction {
                precursor_mass: 500.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(event.reaction(0).map(|r| r.precursor_mass), Some(500.0));
        assert!(event.reaction(1).is_none());
        assert!(event.to_string().starts_with("FTMS"));
    }

    #[test]
    fn test_base_peak() {
        let stream = CentroidStream {
            masses: vec![100.0, 200.0, 300.0],
            intensities: vec![5.0, 50.0, 50.0],
            charges: vec![],
        };
        assert_eq!(stream.base_peak(), Some((200.0, 50.0)));
        assert_eq!(CentroidStream::default().base_peak(), None);
    }
}
