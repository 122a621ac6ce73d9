use super::bindata::{ArrayType, BinaryArrayList};
use super::scan_properties::{Precursor, SignalContinuity, SpectrumDescription};

/// A fully assembled spectrum: its description and peak arrays
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpectrumRecord {
    pub description: SpectrumDescription,
    pub arrays: BinaryArrayList,
}

impl SpectrumRecord {
    pub fn new(description: SpectrumDescription, arrays: BinaryArrayList) -> Self {
        Self {
            description,
            arrays,
        }
    }

    pub fn id(&self) -> &str {
        &self.description.id
    }

    pub fn index(&self) -> usize {
        self.description.index
    }

    pub fn ms_level(&self) -> u8 {
        self.description.ms_level
    }

    pub fn signal_continuity(&self) -> SignalContinuity {
        self.description.signal_continuity
    }

    pub fn precursor(&self) -> Option<&Precursor> {
        self.description.precursor.as_ref()
    }

    /// Retention time in minutes of the first scan event
    pub fn start_time(&self) -> f64 {
        self.description
            .acquisition
            .first_scan()
            .map(|s| s.start_time)
            .unwrap_or_default()
    }

    pub fn default_array_length(&self) -> usize {
        self.arrays.default_array_length()
    }

    pub fn mzs(&self) -> &[f64] {
        self.arrays
            .get(&ArrayType::MZArray)
            .map(|a| a.values.as_slice())
            .unwrap_or_default()
    }

    pub fn intensities(&self) -> &[f64] {
        self.arrays
            .get(&ArrayType::IntensityArray)
            .map(|a| a.values.as_slice())
            .unwrap_or_default()
    }
}
