//! Drives the conversion of one RAW file, or every RAW file in a directory,
//! into spectrum and metadata output files.
use std::collections::BTreeSet;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::io::metadata::{write_metadata, MetadataFormat};
use crate::io::mgf::{MGFError, MGFWriter, DEFAULT_MS_LEVELS};
use crate::io::mzml::{MzMLOutputMode, MzMLWriter, MzMLWriterError};
use crate::io::thermo::{
    open_ms_run, parse_instrument_model, raw_files_in, run_name, InstrumentModelType, RawFileAccess,
    RawFileError, RawFileOpener, SpectrumAssemblyOptions, DEFAULT_SOFTWARE_NAME,
};
use crate::io::traits::{SpectrumWriter, WriteSummary};
use crate::io::write_atomically;
use crate::spectrum::BinaryCompressionType;

/// The spectrum output formats, numbered as on the command line
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    MGF,
    MzML,
    #[default]
    IndexMzML,
    Parquet,
    None,
}

impl OutputFormat {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::MGF),
            1 => Some(Self::MzML),
            2 => Some(Self::IndexMzML),
            3 => Some(Self::Parquet),
            4 => Some(Self::None),
            _ => None,
        }
    }

    pub const fn extension(&self) -> Option<&'static str> {
        match self {
            Self::MGF => Some("mgf"),
            Self::MzML | Self::IndexMzML => Some("mzML"),
            Self::Parquet => Some("parquet"),
            Self::None => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    RawFileError(#[from] RawFileError),
    #[error("Failed to write mzML: {0}")]
    MzMLError(#[from] MzMLWriterError),
    #[error("Failed to write MGF: {0}")]
    MGFError(#[from] MGFError),
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
    #[error("The {0:?} output format is not supported")]
    UnsupportedFormat(OutputFormat),
    #[error("No RAW files were found in {0}")]
    NoRawFiles(PathBuf),
    #[error("No input file or directory was given")]
    MissingInput,
}

/// Everything that controls a conversion run
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub input_file: Option<PathBuf>,
    pub input_directory: Option<PathBuf>,
    /// Defaults to the directory of each input file
    pub output_directory: Option<PathBuf>,
    /// Only used when converting a single file
    pub output_file: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub metadata_format: MetadataFormat,
    pub metadata_output_file: Option<PathBuf>,
    pub gzip: bool,
    pub no_peak_picking: BTreeSet<u8>,
    pub no_zlib_compression: bool,
    pub noise_data: bool,
    pub exclude_profile: bool,
    /// The MS levels written to MGF
    pub ms_levels: BTreeSet<u8>,
    pub ignore_instrument_errors: bool,
    pub warnings_are_errors: bool,
    pub software_name: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            input_file: None,
            input_directory: None,
            output_directory: None,
            output_file: None,
            output_format: OutputFormat::default(),
            metadata_format: MetadataFormat::default(),
            metadata_output_file: None,
            gzip: false,
            no_peak_picking: BTreeSet::new(),
            no_zlib_compression: false,
            noise_data: false,
            exclude_profile: false,
            ms_levels: DEFAULT_MS_LEVELS.into_iter().collect(),
            ignore_instrument_errors: false,
            warnings_are_errors: false,
            software_name: DEFAULT_SOFTWARE_NAME.to_string(),
        }
    }
}

impl ConversionOptions {
    pub fn assembly_options(&self) -> SpectrumAssemblyOptions {
        SpectrumAssemblyOptions {
            compression: BinaryCompressionType::from_flag(!self.no_zlib_compression),
            no_peak_picking: self.no_peak_picking.clone(),
            noise_data: self.noise_data,
            exclude_profile: self.exclude_profile,
        }
    }
}

/// Parse a comma separated list of MS levels and inclusive ranges, `1,3-5`
pub fn parse_levels(text: &str) -> Result<BTreeSet<u8>, String> {
    let mut levels = BTreeSet::new();
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let parse = |s: &str| {
            s.trim()
                .parse::<u8>()
                .map_err(|e| format!("Invalid MS level '{s}': {e}"))
        };
        match token.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(format!("Invalid MS level range '{token}'"));
                }
                levels.extend(start..=end);
            }
            None => {
                levels.insert(parse(token)?);
            }
        }
    }
    if levels.is_empty() {
        return Err(format!("No MS levels in '{text}'"));
    }
    Ok(levels)
}

/// What a conversion run did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSummary {
    pub files: usize,
    pub spectra: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl ConversionSummary {
    /// `0` on success, `1` when any error was counted, `2` when warnings
    /// are treated as errors and any were counted
    pub fn exit_code(&self, warnings_are_errors: bool) -> i32 {
        if self.errors > 0 {
            1
        } else if warnings_are_errors && self.warnings > 0 {
            2
        } else {
            0
        }
    }
}

/// Converts every input file in turn, counting the problems met along the way.
/// A failing file is logged and counted, and does not stop the batch.
pub struct RunOrchestrator<O: RawFileOpener> {
    options: ConversionOptions,
    opener: O,
    summary: ConversionSummary,
}

impl<O: RawFileOpener> RunOrchestrator<O> {
    pub fn new(options: ConversionOptions, opener: O) -> Self {
        Self {
            options,
            opener,
            summary: ConversionSummary::default(),
        }
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn new_warning(&mut self) {
        self.summary.warnings += 1;
    }

    pub fn new_error(&mut self) {
        self.summary.errors += 1;
    }

    pub fn summary(&self) -> &ConversionSummary {
        &self.summary
    }

    /// The files to convert: the single input file, or every file in the input
    /// directory that the opener accepts
    pub fn input_files(&self) -> Result<Vec<PathBuf>, ConversionError> {
        if let Some(dir) = self.options.input_directory.as_ref() {
            let paths = raw_files_in(&self.opener, dir)?;
            log::info!("The folder contains {} RAW files", paths.len());
            if paths.is_empty() {
                return Err(ConversionError::NoRawFiles(dir.clone()));
            }
            Ok(paths)
        } else if let Some(path) = self.options.input_file.as_ref() {
            Ok(vec![path.clone()])
        } else {
            Err(ConversionError::MissingInput)
        }
    }

    /// Convert every input file. Only problems that prevent any file from being
    /// attempted are returned as errors.
    pub fn run(&mut self) -> Result<ConversionSummary, ConversionError> {
        if self.options.output_format == OutputFormat::Parquet {
            return Err(ConversionError::UnsupportedFormat(OutputFormat::Parquet));
        }
        if let Some(dir) = self.options.input_directory.as_ref() {
            log::info!("Started analyzing folder {}", dir.display());
        }
        for path in self.input_files()? {
            log::info!("Started parsing {}", path.display());
            self.summary.files += 1;
            match self.convert_file(&path) {
                Ok(written) => {
                    self.summary.spectra += written.spectra;
                    log::info!("Finished parsing {}", path.display());
                }
                Err(e) => {
                    log::error!("Failed to convert {}: {e}", path.display());
                    self.new_error();
                }
            }
        }
        if self.summary.errors > 0 || self.summary.warnings > 0 {
            log::warn!(
                "{} errors and {} warnings were raised",
                self.summary.errors,
                self.summary.warnings
            );
        }
        Ok(self.summary)
    }

    fn output_directory(&self, raw_path: &Path) -> PathBuf {
        self.options
            .output_directory
            .clone()
            .or_else(|| raw_path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Where the spectra converted from `raw_path` are written
    pub fn output_path(&self, raw_path: &Path) -> Option<PathBuf> {
        let extension = self.options.output_format.extension()?;
        let mut path = match (
            self.options.output_file.as_ref(),
            self.options.input_directory.is_none(),
        ) {
            (Some(output_file), true) => output_file.clone(),
            _ => self
                .output_directory(raw_path)
                .join(format!("{}.{extension}", run_name(raw_path))),
        };
        if self.options.gzip && path.extension().map_or(true, |e| e != "gz") {
            let mut name = path.as_os_str().to_os_string();
            name.push(".gz");
            path = PathBuf::from(name);
        }
        Some(path)
    }

    fn metadata_path(&self, raw_path: &Path) -> Option<PathBuf> {
        match self.options.metadata_output_file.as_ref() {
            Some(path) if self.options.input_directory.is_none() => Some(path.clone()),
            _ => self
                .options
                .metadata_format
                .default_path(&self.output_directory(raw_path), raw_path),
        }
    }

    /// Convert a single RAW file
    pub fn convert_file(&mut self, path: &Path) -> Result<WriteSummary, ConversionError> {
        let raw = open_ms_run(&self.opener, path)?;
        let header = raw.run_header();
        let (first_scan, last_scan) = (header.first_spectrum, header.last_spectrum);

        let instrument = raw.instrument_data();
        let name = if instrument.name.is_empty() { &instrument.model } else { &instrument.name };
        if parse_instrument_model(name) == InstrumentModelType::Unknown {
            if self.options.ignore_instrument_errors {
                log::debug!("Unrecognized instrument model '{name}'");
            } else {
                log::warn!("Unrecognized instrument model '{name}', writing a generic model");
                self.new_warning();
            }
        }

        if let Some(metadata_path) = self.metadata_path(path) {
            let format = self.options.metadata_format;
            let warnings =
                write_atomically(&metadata_path, |file| -> Result<usize, ConversionError> {
                    let mut handle = BufWriter::new(file);
                    let warnings =
                        write_metadata(&raw, first_scan, last_scan, format, &mut handle)?;
                    handle.flush()?;
                    Ok(warnings)
                })?;
            self.summary.warnings += warnings;
            log::debug!("Wrote metadata to {}", metadata_path.display());
        }

        let Some(output_path) = self.output_path(path) else {
            return Ok(WriteSummary::default());
        };
        let summary = self.write_spectra(&raw, first_scan, last_scan, &output_path)?;
        self.summary.warnings += summary.warnings;
        Ok(summary)
    }

    /// Write to a temporary file beside the destination, which is only moved
    /// into place once everything was written
    fn write_spectra<R: RawFileAccess>(
        &self,
        raw: &R,
        first_scan: i32,
        last_scan: i32,
        output_path: &Path,
    ) -> Result<WriteSummary, ConversionError> {
        let summary = write_atomically(output_path, |file| -> Result<WriteSummary, ConversionError> {
            if self.options.gzip {
                let encoder = GzEncoder::new(file, Compression::default());
                let (summary, encoder) = self.write_format(raw, first_scan, last_scan, encoder)?;
                encoder.finish()?;
                Ok(summary)
            } else {
                let (summary, mut handle) =
                    self.write_format(raw, first_scan, last_scan, BufWriter::new(file))?;
                handle.flush()?;
                Ok(summary)
            }
        })?;
        log::debug!(
            "Wrote {} spectra and {} chromatograms to {}",
            summary.spectra,
            summary.chromatograms,
            output_path.display()
        );
        Ok(summary)
    }

    fn write_format<R: RawFileAccess, W: Write>(
        &self,
        raw: &R,
        first_scan: i32,
        last_scan: i32,
        sink: W,
    ) -> Result<(WriteSummary, W), ConversionError> {
        let assembly_options = self.options.assembly_options();
        match self.options.output_format {
            OutputFormat::MGF => {
                let mut writer = MGFWriter::with_options(sink, assembly_options)
                    .with_ms_levels(self.options.ms_levels.iter().copied());
                let summary = writer.write_run(raw, first_scan, last_scan)?;
                Ok((summary, writer.into_inner()?))
            }
            OutputFormat::MzML | OutputFormat::IndexMzML => {
                let mode = if self.options.output_format == OutputFormat::IndexMzML {
                    MzMLOutputMode::Indexed
                } else {
                    MzMLOutputMode::Plain
                };
                let mut writer = MzMLWriter::with_options(
                    sink,
                    mode,
                    assembly_options,
                    self.options.software_name.clone(),
                );
                let summary = writer.write_run(raw, first_scan, last_scan)?;
                Ok((summary, writer.into_inner()?))
            }
            format => Err(ConversionError::UnsupportedFormat(format)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::thermo::fixtures::three_scan_run;
    use crate::io::thermo::{RawFileSnapshot, SnapshotOpener};
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;

    fn write_run(dir: &Path, name: &str, snapshot: RawFileSnapshot) -> PathBuf {
        let path = dir.join(name);
        snapshot.save(&path).unwrap();
        path
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(parse_levels("1").unwrap(), BTreeSet::from([1]));
        assert_eq!(parse_levels("1, 3-5").unwrap(), BTreeSet::from([1, 3, 4, 5]));
        assert!(parse_levels("3-1").is_err());
        assert!(parse_levels("x").is_err());
        assert!(parse_levels("").is_err());
    }

    #[test]
    fn test_exit_code() {
        let mut summary = ConversionSummary::default();
        assert_eq!(summary.exit_code(true), 0);
        summary.warnings = 2;
        assert_eq!(summary.exit_code(false), 0);
        assert_eq!(summary.exit_code(true), 2);
        summary.errors = 1;
        assert_eq!(summary.exit_code(true), 1);
    }

    #[test_log::test]
    fn test_single_file_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_run(dir.path(), "small.raw.json", three_scan_run());
        let options = ConversionOptions {
            input_file: Some(input),
            metadata_format: MetadataFormat::JSON,
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        let summary = orchestrator.run().unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.spectra, 3);
        assert_eq!(summary.errors, 0);

        assert_eq!(
            file_names(dir.path()),
            vec!["small-metadata.json", "small.mzML", "small.raw.json"]
        );
        let text = fs::read_to_string(dir.path().join("small.mzML")).unwrap();
        assert!(text.contains("<indexedmzML"));
        assert!(text.contains("<fileChecksum>"));
    }

    #[test]
    fn test_gzip_mgf_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_run(dir.path(), "small.raw.json", three_scan_run());
        let out = tempfile::tempdir().unwrap();
        let options = ConversionOptions {
            input_file: Some(input),
            output_file: Some(out.path().join("peaks.mgf")),
            output_format: OutputFormat::MGF,
            gzip: true,
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        orchestrator.run().unwrap();
        assert_eq!(file_names(out.path()), vec!["peaks.mgf.gz"]);

        let mut decoder = GzDecoder::new(fs::File::open(out.path().join("peaks.mgf.gz")).unwrap());
        let mut text = String::new();
        decoder.read_to_string(&mut text).unwrap();
        assert_eq!(text.matches("BEGIN IONS").count(), 1);
        assert!(text.contains("PEPMASS=500\n"));
    }

    #[test]
    fn test_directory_with_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), "a.raw.json", three_scan_run());
        fs::write(dir.path().join("b.raw.json"), b"{ not json").unwrap();
        let mut acquiring = three_scan_run();
        acquiring.in_acquisition = true;
        write_run(dir.path(), "c.raw.json", acquiring);
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let out = tempfile::tempdir().unwrap();
        let options = ConversionOptions {
            input_directory: Some(dir.path().to_path_buf()),
            output_directory: Some(out.path().to_path_buf()),
            output_format: OutputFormat::MzML,
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        let summary = orchestrator.run().unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.exit_code(false), 1);
        // Failed conversions leave nothing behind
        assert_eq!(file_names(out.path()), vec!["a.mzML"]);
        let text = fs::read_to_string(out.path().join("a.mzML")).unwrap();
        assert!(!text.contains("indexedmzML"));
    }

    #[test_log::test]
    fn test_scan_failure_mid_run() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), "a.raw.json", three_scan_run());
        let mut gapped = three_scan_run();
        gapped.scans.remove(1);
        write_run(dir.path(), "b.raw.json", gapped);
        write_run(dir.path(), "c.raw.json", three_scan_run());

        let out = tempfile::tempdir().unwrap();
        let options = ConversionOptions {
            input_directory: Some(dir.path().to_path_buf()),
            output_directory: Some(out.path().to_path_buf()),
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        let summary = orchestrator.run().unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.spectra, 6);
        // Scan 2 is missing, so b fails after scan 1 was written
        assert_eq!(file_names(out.path()), vec!["a.mzML", "c.mzML"]);
    }

    #[test]
    fn test_metadata_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut gapped = three_scan_run();
        gapped.scans.remove(1);
        let input = write_run(dir.path(), "gapped.raw.json", gapped);
        let out = tempfile::tempdir().unwrap();
        let options = ConversionOptions {
            input_file: Some(input),
            output_directory: Some(out.path().to_path_buf()),
            metadata_format: MetadataFormat::JSON,
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        let summary = orchestrator.run().unwrap();
        assert_eq!(summary.errors, 1);
        assert!(file_names(out.path()).is_empty());

        let input = write_run(dir.path(), "small.raw.json", three_scan_run());
        let options = ConversionOptions {
            input_file: Some(input),
            output_directory: Some(out.path().to_path_buf()),
            output_format: OutputFormat::None,
            metadata_format: MetadataFormat::JSON,
            metadata_output_file: Some(out.path().join("summary.json")),
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        orchestrator.run().unwrap();
        assert_eq!(file_names(out.path()), vec!["summary.json"]);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.path().join("summary.json")).unwrap())
                .unwrap();
        assert!(value.get("FileProperties").is_some());
    }

    #[test]
    fn test_rejected_runs() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConversionOptions {
            input_directory: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        assert!(matches!(orchestrator.run(), Err(ConversionError::NoRawFiles(_))));

        let input = write_run(dir.path(), "small.raw.json", three_scan_run());
        let options = ConversionOptions {
            input_file: Some(input),
            output_format: OutputFormat::Parquet,
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        assert!(matches!(
            orchestrator.run(),
            Err(ConversionError::UnsupportedFormat(OutputFormat::Parquet))
        ));

        let mut orchestrator = RunOrchestrator::new(ConversionOptions::default(), SnapshotOpener);
        assert!(matches!(orchestrator.run(), Err(ConversionError::MissingInput)));
    }

    #[test]
    fn test_warnings_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = three_scan_run();
        snapshot.scans[1].event.reactions.clear();
        let input = write_run(dir.path(), "small.raw.json", snapshot);
        let options = ConversionOptions {
            input_file: Some(input),
            output_format: OutputFormat::None,
            metadata_format: MetadataFormat::TXT,
            warnings_are_errors: true,
            ignore_instrument_errors: true,
            ..Default::default()
        };
        let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
        let summary = orchestrator.run().unwrap();
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.exit_code(true), 2);
        assert_eq!(
            file_names(dir.path()),
            vec!["small-metadata.txt", "small.raw.json"]
        );
    }
}
