use std::collections::BTreeSet;
use std::io::{self, prelude::*};

use thiserror::Error;

use crate::io::thermo::{RawFileAccess, RawFileError, RunState, SpectrumAssembler, SpectrumAssemblyOptions};
use crate::io::traits::{SpectrumWriter, WriteSummary};
use crate::spectrum::{ScanPolarity, SignalContinuity, SpectrumRecord};

/// The MS levels written when no selection is made
pub const DEFAULT_MS_LEVELS: [u8; 1] = [2];

#[derive(Debug, Error)]
pub enum MGFError {
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
    #[error("Failed to read from the RAW file: {0}")]
    RawFileError(#[from] RawFileError),
}

/// An MGF writer type that writes one ion block per selected spectrum.
///
/// Only spectra whose MS level is in [`MGFWriterType::ms_levels`] are written,
/// by default only MS2. Profile data is always centroided before it is written.
pub struct MGFWriterType<W: io::Write> {
    pub handle: io::BufWriter<W>,
    pub ms_levels: BTreeSet<u8>,
    assembly_options: SpectrumAssemblyOptions,
}

impl<W: io::Write> MGFWriterType<W> {
    pub fn new(file: W) -> MGFWriterType<W> {
        Self::with_options(file, SpectrumAssemblyOptions::default())
    }

    pub fn with_options(file: W, assembly_options: SpectrumAssemblyOptions) -> MGFWriterType<W> {
        let handle = io::BufWriter::with_capacity(500, file);
        MGFWriterType {
            handle,
            ms_levels: DEFAULT_MS_LEVELS.into_iter().collect(),
            assembly_options: SpectrumAssemblyOptions {
                exclude_profile: true,
                ..assembly_options
            },
        }
    }

    pub fn with_ms_levels<I: IntoIterator<Item = u8>>(mut self, levels: I) -> Self {
        self.ms_levels = levels.into_iter().collect();
        self
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.handle.into_inner().map_err(|e| e.into_error())
    }

    /// Write a spectrum header `KEY=value`
    pub fn write_kv(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.handle.write_all(key.as_bytes())?;
        self.handle.write_all(b"=")?;
        self.handle.write_all(value.as_bytes())?;
        self.handle.write_all(b"\n")?;
        Ok(())
    }

    /// Write the header of a spectrum, everything after `BEGIN IONS`, before writing
    /// the peak list.
    pub fn write_header(&mut self, spectrum: &SpectrumRecord) -> io::Result<()> {
        let desc = &spectrum.description;
        self.write_kv("TITLE", spectrum.id())?;
        self.write_kv("SCANS", &desc.scan_number.to_string())?;
        self.write_kv("RTINSECONDS", &(spectrum.start_time() * 60.0).to_string())?;
        if let Some(ion) = spectrum.precursor().map(|p| &p.ion) {
            if let Some(mz) = ion.mz {
                self.write_kv("PEPMASS", &mz.to_string())?;
            }
            if let Some(charge) = ion.charge.filter(|z| *z != 0) {
                let sign = match desc.polarity {
                    ScanPolarity::Negative => '-',
                    _ => '+',
                };
                self.write_kv("CHARGE", &format!("{}{sign}", charge.abs()))?;
            }
        }
        Ok(())
    }

    /// Write the peak list of a spectrum, sorted by m/z
    pub fn write_peaks(&mut self, spectrum: &SpectrumRecord) -> io::Result<()> {
        if spectrum.signal_continuity() == SignalContinuity::Profile {
            log::warn!("Writing profile spectrum {} to MGF", spectrum.id());
        }
        let mut peaks: Vec<(f64, f64)> = spectrum
            .mzs()
            .iter()
            .copied()
            .zip(spectrum.intensities().iter().copied())
            .collect();
        peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (mz, intensity) in peaks {
            writeln!(self.handle, "{mz:.5} {intensity:.3}")?;
        }
        Ok(())
    }

    /// Write a spectrum from start to finish. Spectra of an unselected MS level are skipped.
    pub fn write_spectrum(&mut self, spectrum: &SpectrumRecord) -> io::Result<usize> {
        if !self.ms_levels.contains(&spectrum.ms_level()) {
            log::trace!("Skipping MS{} spectrum {}", spectrum.ms_level(), spectrum.id());
            return Ok(0);
        }
        self.handle.write_all(b"BEGIN IONS\n")?;
        self.write_header(spectrum)?;
        self.write_peaks(spectrum)?;
        self.handle.write_all(b"END IONS\n")?;
        Ok(1)
    }
}

impl<W: io::Write> SpectrumWriter for MGFWriterType<W> {
    type Error = MGFError;

    fn write(&mut self, spectrum: &SpectrumRecord) -> Result<usize, Self::Error> {
        Ok(self.write_spectrum(spectrum)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }

    fn write_run<R: RawFileAccess>(
        &mut self,
        raw: &R,
        first_scan: i32,
        last_scan: i32,
    ) -> Result<WriteSummary, Self::Error> {
        let mut state = RunState::new();
        let options = self.assembly_options.clone();
        let assembler = SpectrumAssembler::new(raw, &options);
        let mut summary = WriteSummary::default();
        // Every scan is assembled so precursor references can be resolved
        for (index, scan_number) in (first_scan..=last_scan).enumerate() {
            let spectrum = assembler.assemble(scan_number, index, &mut state)?;
            summary.spectra += self.write(&spectrum)?;
        }
        self.flush()?;
        summary.warnings = state.warnings;
        Ok(summary)
    }
}

/// A convenient alias for [`MGFWriterType`]
pub type MGFWriter<W> = MGFWriterType<W>;
