//! Convert Thermo RAW acquisitions into mzML, indexed mzML and MGF.
//!
//! Spectra and chromatograms are assembled from a [`RawFileAccess`](crate::io::thermo::RawFileAccess)
//! implementation by the [`io::thermo`] module and serialized by the writers in [`io`].
//! The [`convert`] module drives whole conversions of single files or directories.
pub mod convert;
pub mod io;
pub mod meta;
pub mod params;
pub mod spectrum;

pub use crate::convert::{ConversionOptions, OutputFormat, RunOrchestrator};
pub use crate::io::mgf::MGFWriter;
pub use crate::io::mzml::MzMLWriter;
pub use crate::io::SpectrumWriter;

pub use crate::spectrum::{ChromatogramRecord, SpectrumRecord};
