//! Reading RAW runs and writing the converted spectra, chromatograms and metadata.
pub mod metadata;
pub mod mgf;
pub mod mzml;
mod offset_index;
pub mod query;
pub mod thermo;
pub mod traits;
mod utils;
pub mod xic;

pub use crate::io::metadata::{write_metadata, MetadataCollector, MetadataFormat, RunMetadata};
pub use crate::io::mgf::{MGFError, MGFWriter};
pub use crate::io::mzml::{MzMLOutputMode, MzMLWriter, MzMLWriterError};
pub use crate::io::offset_index::OffsetIndex;
pub use crate::io::query::{run_query, QueryError, QueryOptions, SpectrumQuery};
pub use crate::io::thermo::{RawFileAccess, RawFileError, RawFileOpener, SnapshotOpener, SnapshotRawFile};
pub use crate::io::traits::{SpectrumWriter, WriteSummary};
pub use crate::io::utils::{checksum_file, write_atomically, SHA1HashingStream};
pub use crate::io::xic::{run_xic, XicError, XicOptions, XicReader, XicSummary};
