//! Writes centroided MSn spectra in the Mascot Generic Format (MGF).

mod writer;

pub use writer::{MGFError, MGFWriter, MGFWriterType, DEFAULT_MS_LEVELS};
