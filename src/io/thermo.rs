//! Assemble mzML spectra, chromatograms and document headers from Thermo RAW runs.
//!
//! Reading the vendor format itself is delegated to an implementation of
//! [`RawFileAccess`]. The crate ships [`SnapshotRawFile`], which serves a run
//! from a JSON snapshot written by an external exporter.
//!
//! ```no_run
//! use rawmzml::io::thermo::{RawFileAccess, RunState, SnapshotRawFile, SpectrumAssembler, SpectrumAssemblyOptions};
//!
//! # fn main() -> Result<(), rawmzml::io::thermo::RawFileError> {
//! let raw = SnapshotRawFile::open_path("./small.raw.json".as_ref())?;
//! let options = SpectrumAssemblyOptions::default();
//! let assembler = SpectrumAssembler::new(&raw, &options);
//! let mut state = RunState::new();
//! let spectrum = assembler.assemble(raw.run_header().first_spectrum, 0, &mut state)?;
//! assert_eq!(spectrum.index(), 0);
//! #    Ok(())
//! # }
//! ```
mod chromatogram;
mod document;
mod instruments;
mod mapping;
mod snapshot;
mod source;
mod spectrum;
mod trailer;

pub use chromatogram::ChromatogramAssembler;
pub use document::{
    DocumentAssembler, COMMON_INSTRUMENT_PARAMS, DEFAULT_INSTRUMENT_CONFIGURATION,
    DEFAULT_SOFTWARE_NAME, SOURCE_FILE_ID,
};
pub use instruments::{
    detector_for_analyzer, instrument_model_to_detector, parse_instrument_model,
    InstrumentModelType,
};
pub use snapshot::{RawFileSnapshot, ScanSnapshot, SnapshotOpener, SnapshotRawFile};
pub use source::{
    open_ms_run, raw_files_in, run_name, ActivationType, CentroidStream, ChromatogramTrace, Device, InstrumentData,
    IonizationModeType, MSOrderType, MassAnalyzerType, NoisePacket, PolarityType, RawFileAccess,
    RawFileError, RawFileOpener, RawScanEvent, Reaction, RunHeader, SampleInformation,
    ScanDataType, ScanFilter, ScanStatistics, SegmentedScan, TraceType, TraceWindow, TrailerEntry,
};
pub use spectrum::{
    calculate_selected_ion_mz, isolation_width, native_id, RunState, SpectrumAssembler,
    SpectrumAssemblyOptions, ZERO_DELTA,
};
pub use trailer::{
    isolation_width_key, ScanTrailer, CHARGE_STATE, ION_INJECTION_TIME, MONOISOTOPIC_MZ,
};

#[cfg(test)]
pub(crate) use spectrum::test as fixtures;
