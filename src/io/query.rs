//! Look up scans of a RAW run by number and describe each one as a PROXI
//! spectrum: its peaks and a flat list of controlled vocabulary attributes.
use std::collections::BTreeSet;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::io::thermo::{
    calculate_selected_ion_mz, isolation_width, open_ms_run, run_name, RawFileAccess,
    RawFileError, RawFileOpener, ScanDataType, ScanTrailer, CHARGE_STATE, ION_INJECTION_TIME,
    MONOISOTOPIC_MZ,
};
use crate::io::write_atomically;
use crate::params::{ControlledVocabulary, Param, ParamCow, ParamLike, Unit};
use crate::spectrum::{IsolationWindow, ScanPolarity, SignalContinuity};

const CV: ControlledVocabulary = ControlledVocabulary::MS;

const SCAN_NUMBER: ParamCow = CV.const_param_ident("scan number", 1003057);
const SCAN_START_TIME: ParamCow =
    CV.const_param_ident_unit("scan start time", 1000016, Unit::Second);
const MS_LEVEL: ParamCow = CV.const_param_ident("ms level", 1000511);
const ION_INJECTION_TIME_TERM: ParamCow =
    CV.const_param_ident_unit("ion injection time", 1000927, Unit::Millisecond);
const SELECTED_ION_MZ: ParamCow = CV.const_param_ident_unit("selected ion m/z", 1000744, Unit::MZ);
const ISOLATION_WINDOW_TARGET: ParamCow =
    CV.const_param_ident_unit("isolation window target m/z", 1000827, Unit::MZ);
const ISOLATION_WINDOW_LOWER: ParamCow =
    CV.const_param_ident_unit("isolation window lower offset", 1000828, Unit::MZ);
const ISOLATION_WINDOW_UPPER: ParamCow =
    CV.const_param_ident_unit("isolation window upper offset", 1000829, Unit::MZ);
const SCAN_POLARITY: ParamCow = CV.const_param_ident("scan polarity", 1000465);
const CHARGE_STATE_TERM: ParamCow = CV.const_param_ident("charge state", 1000041);
const FILTER_STRING: ParamCow = CV.const_param_ident("filter string", 1000512);
const SPECTRUM_REPRESENTATION: ParamCow = CV.const_param_ident("spectrum representation", 1000525);

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    RawFileError(#[from] RawFileError),
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
    #[error("Failed to write JSON: {0}")]
    JSONError(#[from] serde_json::Error),
    #[error("Invalid scan list '{0}'")]
    InvalidScans(String),
}

/// Parse a comma separated list of scan numbers and inclusive ranges, `1,3-5`
pub fn parse_scan_numbers(text: &str) -> Result<BTreeSet<i32>, QueryError> {
    let invalid = || QueryError::InvalidScans(text.to_string());
    if !text.chars().all(|c| c.is_ascii_digit() || matches!(c, ',' | '-' | ' ')) {
        return Err(invalid());
    }
    let mut scans = BTreeSet::new();
    for token in text.split(',').map(str::trim) {
        let parse = |s: &str| s.trim().parse::<i32>().map_err(|_| invalid());
        match token.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(invalid());
                }
                scans.extend(start..=end);
            }
            None => {
                scans.insert(parse(token)?);
            }
        }
    }
    Ok(scans)
}

/// One attribute of a PROXI spectrum. Attributes sharing a `cv_param_group`
/// belong together, such as a value and its unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxiAttribute {
    pub accession: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_accession: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_param_group: Option<String>,
}

impl ProxiAttribute {
    pub fn new<P: ParamLike>(param: &P) -> Self {
        let value = param.value();
        Self {
            accession: param.curie().unwrap_or_default(),
            name: param.name().to_string(),
            value: (!value.is_empty()).then(|| value.to_string()),
            value_accession: None,
            cv_param_group: None,
        }
    }

    /// An attribute whose value is itself a controlled vocabulary term
    pub fn with_term_value<P: ParamLike>(mut self, term: &P) -> Self {
        self.value = Some(term.name().to_string());
        self.value_accession = term.curie();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProxiSpectrum {
    pub mzs: Vec<f64>,
    pub intensities: Vec<f64>,
    pub attributes: Vec<ProxiAttribute>,
    #[serde(skip)]
    groups: usize,
}

impl ProxiSpectrum {
    /// Add `param`. A param with a unit is grouped with an attribute naming it.
    pub fn add_param(&mut self, param: Param) {
        let mut attribute = ProxiAttribute::new(&param);
        if param.unit == Unit::Unknown {
            self.attributes.push(attribute);
            return;
        }
        self.groups += 1;
        let group = self.groups.to_string();
        attribute.cv_param_group = Some(group.clone());
        self.attributes.push(attribute);
        let (accession, name) = param.unit.for_param();
        self.attributes.push(ProxiAttribute {
            accession: accession.to_string(),
            name: name.to_string(),
            value: None,
            value_accession: None,
            cv_param_group: Some(group),
        });
    }

    pub fn add_attribute(&mut self, attribute: ProxiAttribute) {
        self.attributes.push(attribute);
    }

    pub fn get_attribute(&self, accession: &str) -> Option<&ProxiAttribute> {
        self.attributes.iter().find(|a| a.accession == accession)
    }
}

/// Builds [`ProxiSpectrum`]s for individual scans of one RAW file
pub struct SpectrumQuery<'a, R: RawFileAccess> {
    raw: &'a R,
    no_peak_picking: bool,
    pub warnings: usize,
}

impl<'a, R: RawFileAccess> SpectrumQuery<'a, R> {
    pub fn new(raw: &'a R, no_peak_picking: bool) -> Self {
        Self {
            raw,
            no_peak_picking,
            warnings: 0,
        }
    }

    fn peaks(
        &self,
        scan_number: i32,
        scan_data: ScanDataType,
        is_centroid_scan: bool,
    ) -> Result<(Vec<f64>, Vec<f64>, SignalContinuity), RawFileError> {
        if !self.no_peak_picking {
            let centroids = self.raw.centroid_stream(scan_number)?;
            if !centroids.is_empty() {
                return Ok((centroids.masses, centroids.intensities, SignalContinuity::Centroid));
            }
            if scan_data == ScanDataType::Profile {
                let picked = self.raw.centroid_profile(scan_number)?;
                return Ok((picked.masses, picked.intensities, SignalContinuity::Centroid));
            }
        }
        let segmented = self.raw.segmented_scan(scan_number)?;
        let continuity = match scan_data {
            ScanDataType::Centroid => SignalContinuity::Centroid,
            ScanDataType::Profile => SignalContinuity::Profile,
            ScanDataType::Any if is_centroid_scan => SignalContinuity::Centroid,
            ScanDataType::Any => SignalContinuity::Profile,
        };
        Ok((segmented.positions, segmented.intensities, continuity))
    }

    /// Describe one scan, peaks sorted by m/z
    pub fn spectrum(&self, scan_number: i32) -> Result<ProxiSpectrum, RawFileError> {
        let statistics = self.raw.scan_statistics(scan_number)?;
        let filter = self.raw.scan_filter(scan_number)?;
        let event = self.raw.scan_event(scan_number)?;
        let retention_time = self.raw.retention_time(scan_number)?;
        let trailer = ScanTrailer::new(self.raw.trailer_extra(scan_number)?.iter());
        let ms_level = filter.ms_order.ms_level();

        let mut spectrum = ProxiSpectrum::default();
        spectrum.add_param(SCAN_NUMBER.with_value(scan_number));
        spectrum.add_param(SCAN_START_TIME.with_value(retention_time * 60.0));
        spectrum.add_param(MS_LEVEL.with_value(ms_level));
        if let Some(injection_time) = trailer.as_double(ION_INJECTION_TIME) {
            spectrum.add_param(ION_INJECTION_TIME_TERM.with_value(injection_time));
        }

        if ms_level > 1 {
            if let Some(reaction) = event.reaction(ms_level as usize - 2) {
                let width = isolation_width(&trailer, ms_level, reaction);
                let selected_ion_mz = calculate_selected_ion_mz(
                    reaction.precursor_mass,
                    trailer.as_double(MONOISOTOPIC_MZ),
                    width,
                );
                spectrum.add_param(SELECTED_ION_MZ.with_value(selected_ion_mz));
                let window = IsolationWindow::from_width(
                    Some(reaction.precursor_mass),
                    width,
                    reaction.isolation_width_offset,
                );
                spectrum.add_param(ISOLATION_WINDOW_TARGET.with_value(reaction.precursor_mass));
                if let (Some(lower), Some(upper)) = (window.lower_offset, window.upper_offset) {
                    spectrum.add_param(ISOLATION_WINDOW_LOWER.with_value(lower));
                    spectrum.add_param(ISOLATION_WINDOW_UPPER.with_value(upper));
                }
            } else {
                log::debug!("Scan {scan_number} is an MS{ms_level} scan but has no reaction");
            }
        }

        let polarity: ScanPolarity = filter.polarity.into();
        if let Some(term) = polarity.to_param() {
            spectrum.add_attribute(ProxiAttribute::new(&SCAN_POLARITY).with_term_value(&term));
        }
        if let Some(charge) = trailer.as_positive_int(CHARGE_STATE) {
            spectrum.add_param(CHARGE_STATE_TERM.with_value(charge));
        }
        spectrum.add_param(FILTER_STRING.with_value(&event.filter_string));

        let (masses, intensities, continuity) =
            self.peaks(scan_number, event.scan_data, statistics.is_centroid_scan)?;
        if let Some(term) = continuity.to_param() {
            spectrum.add_attribute(
                ProxiAttribute::new(&SPECTRUM_REPRESENTATION).with_term_value(&term),
            );
        }

        let mut peaks: Vec<(f64, f64)> = masses.into_iter().zip(intensities).collect();
        peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (mzs, intensities) = peaks.into_iter().unzip();
        spectrum.mzs = mzs;
        spectrum.intensities = intensities;
        Ok(spectrum)
    }

    /// Describe every scan in `scans` that lies within the run. Scans outside
    /// of it are skipped with a warning.
    pub fn retrieve(&mut self, scans: &BTreeSet<i32>) -> Result<Vec<ProxiSpectrum>, RawFileError> {
        let header = self.raw.run_header();
        let (first, last) = (header.first_spectrum, header.last_spectrum);
        let mut spectra = Vec::with_capacity(scans.len());
        for scan_number in scans.iter().copied() {
            if scan_number < first || scan_number > last {
                log::warn!("Scan {scan_number} lies outside of the run's scans {first}-{last}");
                self.warnings += 1;
                continue;
            }
            spectra.push(self.spectrum(scan_number)?);
        }
        Ok(spectra)
    }
}

/// Write `spectra` as an indented JSON array
pub fn write_spectra<W: Write>(spectra: &[ProxiSpectrum], writer: W) -> Result<(), QueryError> {
    serde_json::to_writer_pretty(writer, spectra)?;
    Ok(())
}

/// What to look up, and where the result goes
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub input_file: PathBuf,
    pub scans: BTreeSet<i32>,
    /// Defaults to `<run name>.json` beside the input file
    pub output_file: Option<PathBuf>,
    /// Use profile data as recorded instead of centroids
    pub no_peak_picking: bool,
    pub stdout: bool,
}

impl QueryOptions {
    pub fn output_path(&self) -> PathBuf {
        self.output_file.clone().unwrap_or_else(|| {
            let directory = self.input_file.parent().unwrap_or(Path::new(""));
            directory.join(format!("{}.json", run_name(&self.input_file)))
        })
    }
}

/// Look up the requested scans of one file and write them out. Returns the
/// number of spectra written and the warnings raised.
pub fn run_query<O: RawFileOpener>(
    opener: &O,
    options: &QueryOptions,
) -> Result<(usize, usize), QueryError> {
    let raw = open_ms_run(opener, &options.input_file)?;
    let mut query = SpectrumQuery::new(&raw, options.no_peak_picking);
    let spectra = query.retrieve(&options.scans)?;

    if options.stdout {
        let mut handle = io::stdout().lock();
        write_spectra(&spectra, &mut handle)?;
        writeln!(handle)?;
    } else {
        let path = options.output_path();
        write_atomically(&path, |file| -> Result<(), QueryError> {
            let mut handle = io::BufWriter::new(file);
            write_spectra(&spectra, &mut handle)?;
            handle.flush()?;
            Ok(())
        })?;
        log::info!("Wrote {} spectra to {}", spectra.len(), path.display());
    }
    Ok((spectra.len(), query.warnings))
}
