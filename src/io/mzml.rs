//! Writes the PSI-MS mzML and indexedmzML XML file formats for representing
//! mass spectra converted from a RAW run.

pub mod writer;

pub use crate::io::mzml::writer::{
    MzMLOutputMode, MzMLWriter, MzMLWriterError, MzMLWriterState, MzMLWriterType, WriterResult,
};
