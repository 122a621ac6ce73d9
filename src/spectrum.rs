pub mod bindata;
pub mod chromatogram;
pub mod scan_properties;
pub mod spectrum_types;

pub use crate::spectrum::bindata::{
    ArrayType, BinaryArrayList, BinaryCompressionType, BinaryDataArrayType, DataArray,
};
pub use crate::spectrum::chromatogram::{ChromatogramRecord, ChromatogramType};
pub use crate::spectrum::scan_properties::*;
pub use crate::spectrum::spectrum_types::SpectrumRecord;
