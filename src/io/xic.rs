//! Extracted ion chromatograms.
//!
//! A request names an m/z window, directly or as a mass with a tolerance or as
//! a peptide sequence, and optionally a retention time window and a scan
//! filter. Each trace sums the signal inside the m/z window for every scan the
//! filter admits.
//!
//! ```json
//! [
//!   {"mz": 488.5384, "tolerance": 10, "tolerance_unit": "ppm"},
//!   {"mz_start": 480.0, "mz_end": 490.0, "rt_start": 10.0, "rt_end": 20.0},
//!   {"sequence": "TRANNEL", "tolerance": 5, "charge": 2, "scan_filter": "ms"}
//! ]
//! ```
use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::thermo::{
    open_ms_run, run_name, ChromatogramTrace, RawFileAccess, RawFileError, RawFileOpener,
    TraceType, TraceWindow,
};
use crate::io::write_atomically;
use crate::spectrum::bindata::{to_base64, to_bytes};

pub const WATER_MASS: f64 = 18.0105646837;
pub const PROTON_MASS: f64 = 1.00727646677;

/// The filter applied when a request names none: MS1 scans only
pub const DEFAULT_SCAN_FILTER: &str = "ms";

#[derive(Debug, Error)]
pub enum XicError {
    #[error(transparent)]
    RawFileError(#[from] RawFileError),
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
    #[error("Failed to read or write JSON: {0}")]
    JSONError(#[from] serde_json::Error),
    #[error("Invalid XIC request {0}: {1}")]
    InvalidRequest(usize, String),
}

/// The monoisotopic residue mass of an amino acid
pub fn residue_mass(residue: char) -> Option<f64> {
    let mass = match residue {
        'G' => 57.02146,
        'A' => 71.03711,
        'S' => 87.03203,
        'P' => 97.05276,
        'V' => 99.06841,
        'T' => 101.04768,
        'C' => 103.00919,
        'L' | 'I' => 113.08406,
        'N' => 114.04293,
        'D' => 115.02694,
        'Q' => 128.05858,
        'K' => 128.09496,
        'E' => 129.04259,
        'M' => 131.04049,
        'H' => 137.05891,
        'F' => 147.06841,
        'U' => 150.95364,
        'R' => 156.10111,
        'Y' => 163.06333,
        'W' => 186.07931,
        'O' => 237.14773,
        _ => return None,
    };
    Some(mass)
}

/// The m/z of an unmodified peptide at `charge`
pub fn peptide_mz(sequence: &str, charge: i32) -> Result<f64, String> {
    if charge == 0 {
        return Err("Charge must not be zero".to_string());
    }
    let mut mass = WATER_MASS;
    for residue in sequence.trim().chars() {
        mass += residue_mass(residue.to_ascii_uppercase())
            .ok_or_else(|| format!("Unknown amino acid '{residue}' in {sequence}"))?;
    }
    Ok((mass + charge as f64 * PROTON_MASS) / (charge.abs() as f64))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceUnit {
    #[default]
    PPM,
    AMU,
    MMU,
    Da,
}

impl ToleranceUnit {
    /// Parse a unit name in any case. The empty string means parts per million.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "" | "ppm" => Some(Self::PPM),
            "amu" => Some(Self::AMU),
            "mmu" => Some(Self::MMU),
            "da" => Some(Self::Da),
            _ => None,
        }
    }

    /// The half width of the window of `tolerance` around `mz`
    pub fn delta(&self, mz: f64, tolerance: f64) -> f64 {
        match self {
            Self::PPM => mz * tolerance * 1e-6,
            Self::AMU | Self::Da => tolerance,
            Self::MMU => tolerance * 1e-3,
        }
    }
}

/// One requested trace, as read from the request JSON
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XicRequest {
    pub mz: Option<f64>,
    pub tolerance: Option<f64>,
    pub tolerance_unit: Option<String>,
    pub mz_start: Option<f64>,
    pub mz_end: Option<f64>,
    pub rt_start: Option<f64>,
    pub rt_end: Option<f64>,
    pub sequence: Option<String>,
    pub charge: Option<i32>,
    pub scan_filter: Option<String>,
}

impl XicRequest {
    /// Turn the request into the windows of a trace. Exactly one of `mz` with
    /// `tolerance`, `mz_start` with `mz_end`, or `sequence` with `tolerance`
    /// must be given.
    pub fn resolve(&self) -> Result<XicMeta, String> {
        let by_mass = self.mz.is_some();
        let by_range = self.mz_start.is_some() || self.mz_end.is_some();
        let by_sequence = self.sequence.is_some();
        match (by_mass, by_range, by_sequence) {
            (true, false, false) | (false, true, false) | (false, false, true) => {}
            (false, false, false) => {
                return Err("Give mz, mz_start and mz_end, or sequence".to_string())
            }
            _ => {
                return Err(
                    "Use mz and tolerance, mz_start and mz_end, or sequence and tolerance, not a combination"
                        .to_string(),
                )
            }
        }
        if by_range && self.tolerance.is_some() {
            return Err("A tolerance cannot be combined with mz_start and mz_end".to_string());
        }
        for value in [
            self.mz,
            self.tolerance,
            self.mz_start,
            self.mz_end,
            self.rt_start,
            self.rt_end,
        ]
        .into_iter()
        .flatten()
        {
            if value < 0.0 {
                return Err(format!("Negative value {value}"));
            }
        }

        let (mz_start, mz_end) = if by_range {
            match (self.mz_start, self.mz_end) {
                (Some(start), Some(end)) => (start, end),
                _ => return Err("Both mz_start and mz_end are required".to_string()),
            }
        } else {
            let tolerance = self
                .tolerance
                .ok_or_else(|| "A tolerance is required".to_string())?;
            let unit_name = self.tolerance_unit.as_deref().unwrap_or_default();
            let unit = ToleranceUnit::from_name(unit_name)
                .ok_or_else(|| format!("Unknown tolerance unit '{unit_name}'"))?;
            let mz = match (self.mz, self.sequence.as_deref()) {
                (Some(mz), _) => mz,
                (None, Some(sequence)) => peptide_mz(sequence, self.charge.unwrap_or(1))?,
                (None, None) => return Err("Give mz or sequence with a tolerance".to_string()),
            };
            let delta = unit.delta(mz, tolerance);
            (mz - delta, mz + delta)
        };

        let meta = XicMeta {
            mz_start: Some(mz_start),
            mz_end: Some(mz_end),
            rt_start: self.rt_start,
            rt_end: self.rt_end,
            filter: self.scan_filter.clone(),
        };
        if mz_start > mz_end {
            return Err(format!("m/z range {mz_start}-{mz_end} is empty"));
        }
        if let (Some(start), Some(end)) = (meta.rt_start, meta.rt_end) {
            if start > end {
                return Err(format!("Retention time range {start}-{end} is empty"));
            }
        }
        Ok(meta)
    }
}

/// Parse and resolve a JSON array of requests
pub fn parse_requests(text: &str) -> Result<Vec<XicMeta>, XicError> {
    let requests: Vec<XicRequest> = serde_json::from_str(text)?;
    requests
        .iter()
        .enumerate()
        .map(|(i, request)| request.resolve().map_err(|e| XicError::InvalidRequest(i, e)))
        .collect()
}

/// The windows of one trace. Missing bounds fall back to the run's own.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XicMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mz_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mz_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rt_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rt_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Trace values, either as numbers or as base64 encoded little endian doubles
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum XicArray {
    Values(Vec<f64>),
    Base64(String),
}

impl XicArray {
    pub fn new(values: Vec<f64>, base64: bool) -> Self {
        if base64 {
            Self::Base64(to_base64(&to_bytes(&values)))
        } else {
            Self::Values(values)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XicUnit {
    pub meta: XicMeta,
    pub retention_times: Option<XicArray>,
    pub intensities: Option<XicArray>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XicOutputMeta {
    pub base64: bool,
    pub timeunit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct XicData {
    pub output_meta: XicOutputMeta,
    pub content: Vec<XicUnit>,
}

/// Extracts the requested traces from one RAW file
pub struct XicReader<'a, R: RawFileAccess> {
    raw: &'a R,
}

impl<'a, R: RawFileAccess> XicReader<'a, R> {
    pub fn new(raw: &'a R) -> Self {
        Self { raw }
    }

    fn window(&self, meta: &XicMeta) -> TraceWindow {
        let header = self.raw.run_header();
        let filter = meta.filter.as_deref().unwrap_or(DEFAULT_SCAN_FILTER);
        let mut window = TraceWindow::default().with_filter(filter);
        if meta.mz_start.is_some() || meta.mz_end.is_some() {
            window = window.with_mass_range(
                meta.mz_start.unwrap_or(header.low_mass),
                meta.mz_end.unwrap_or(header.high_mass),
            );
        }
        if meta.rt_start.is_some() || meta.rt_end.is_some() {
            window = window.with_time_range(
                meta.rt_start.unwrap_or(header.start_time),
                meta.rt_end.unwrap_or(header.end_time),
            );
        }
        window
    }

    /// The trace of one request, empty when no scan falls inside its windows
    pub fn trace(&self, meta: &XicMeta) -> Result<ChromatogramTrace, RawFileError> {
        let header = self.raw.run_header();
        let window = self.window(meta);
        log::debug!("Extracting ion chromatogram for {window:?}");
        let traces = self.raw.chromatogram(
            TraceType::MassRange,
            header.first_spectrum,
            header.last_spectrum,
            &window,
        )?;
        Ok(traces.into_iter().next().unwrap_or_default())
    }

    pub fn read(&self, requests: &[XicMeta], base64: bool) -> Result<XicData, RawFileError> {
        let mut content = Vec::with_capacity(requests.len());
        for meta in requests {
            let trace = self.trace(meta)?;
            let (retention_times, intensities) = if trace.is_empty() {
                (None, None)
            } else {
                (
                    Some(XicArray::new(trace.times, base64)),
                    Some(XicArray::new(trace.intensities, base64)),
                )
            };
            content.push(XicUnit {
                meta: meta.clone(),
                retention_times,
                intensities,
            });
        }
        Ok(XicData {
            output_meta: XicOutputMeta {
                base64,
                timeunit: "minutes".to_string(),
            },
            content,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct XicOptions {
    pub input_files: Vec<PathBuf>,
    /// The JSON request file
    pub json_file: PathBuf,
    /// Defaults to the directory of each input file
    pub output_directory: Option<PathBuf>,
    pub base64: bool,
    pub stdout: bool,
}

impl XicOptions {
    /// `<output dir>/<run name>.json`
    pub fn output_path(&self, raw_path: &Path) -> PathBuf {
        let directory = self
            .output_directory
            .clone()
            .or_else(|| raw_path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        directory.join(format!("{}.json", run_name(raw_path)))
    }
}

/// What an XIC run did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct XicSummary {
    pub files: usize,
    pub errors: usize,
}

fn extract_file<O: RawFileOpener>(
    opener: &O,
    options: &XicOptions,
    requests: &[XicMeta],
    path: &Path,
) -> Result<(), XicError> {
    let raw = open_ms_run(opener, path)?;
    let data = XicReader::new(&raw).read(requests, options.base64)?;
    if options.stdout {
        let mut handle = io::stdout().lock();
        serde_json::to_writer_pretty(&mut handle, &data)?;
        writeln!(handle)?;
    } else {
        let output_path = options.output_path(path);
        write_atomically(&output_path, |file| -> Result<(), XicError> {
            let mut handle = io::BufWriter::new(file);
            serde_json::to_writer_pretty(&mut handle, &data)?;
            handle.flush()?;
            Ok(())
        })?;
        log::info!("Wrote {} traces to {}", data.content.len(), output_path.display());
    }
    Ok(())
}

/// Extract the traces requested in the JSON file from every input file. An
/// invalid request file stops the run, a failing RAW file is logged and
/// counted.
pub fn run_xic<O: RawFileOpener>(
    opener: &O,
    options: &XicOptions,
) -> Result<XicSummary, XicError> {
    let requests = parse_requests(&fs::read_to_string(&options.json_file)?)?;
    let mut summary = XicSummary::default();
    for path in options.input_files.iter() {
        summary.files += 1;
        if let Err(e) = extract_file(opener, options, &requests, path) {
            log::error!("Failed to extract ion chromatograms from {}: {e}", path.display());
            summary.errors += 1;
        }
    }
    Ok(summary)
}
