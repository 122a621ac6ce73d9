use std::io;

use crate::io::thermo::{RawFileAccess, RawFileError};
use crate::spectrum::SpectrumRecord;

/// Counts describing what a [`SpectrumWriter`] produced for one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub spectra: usize,
    pub chromatograms: usize,
    /// Recoverable problems met while assembling spectra
    pub warnings: usize,
}

/// Common operations for writing spectra converted from a RAW run
pub trait SpectrumWriter {
    type Error: std::error::Error + From<RawFileError> + From<io::Error>;

    /// Write out a single spectrum
    fn write(&mut self, spectrum: &SpectrumRecord) -> Result<usize, Self::Error>;

    /// As [`std::io::Write::flush`]
    fn flush(&mut self) -> io::Result<()>;

    /// Consume an [`Iterator`] over [`SpectrumRecord`] references
    fn write_all<'b, T: Iterator<Item = &'b SpectrumRecord>>(
        &mut self,
        iterator: T,
    ) -> Result<usize, Self::Error> {
        let mut n = 0;
        for spectrum in iterator {
            n += self.write(spectrum)?;
        }
        Ok(n)
    }

    /// Convert every scan of `raw` from `first_scan` to `last_scan` inclusive
    /// and write them out, completing the output document.
    fn write_run<R: RawFileAccess>(
        &mut self,
        raw: &R,
        first_scan: i32,
        last_scan: i32,
    ) -> Result<WriteSummary, Self::Error>;
}
