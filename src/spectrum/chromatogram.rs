use super::bindata::{ArrayType, BinaryArrayList};
use crate::impl_param_described;
use crate::params::{ControlledVocabulary, ParamCow, ParamList};

/// The kinds of trace a chromatogram may describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChromatogramType {
    #[default]
    BasePeakChromatogram,
    TotalIonCurrentChromatogram,
    SelectedIonCurrentChromatogram,
}

impl ChromatogramType {
    /// The prefix of the ids given to chromatograms of this type
    pub const fn id_prefix(&self) -> &'static str {
        match self {
            ChromatogramType::BasePeakChromatogram => "base_peak",
            ChromatogramType::TotalIonCurrentChromatogram => "tic",
            ChromatogramType::SelectedIonCurrentChromatogram => "sic",
        }
    }

    /// The term written on the chromatogram. Base peak traces are labeled as
    /// ion current chromatograms.
    pub const fn to_param(&self) -> ParamCow<'static> {
        match self {
            ChromatogramType::SelectedIonCurrentChromatogram => ControlledVocabulary::MS
                .const_param_ident("selected ion current chromatogram", 1000627),
            _ => ControlledVocabulary::MS
                .const_param_ident("total ion current chromatogram", 1000235),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChromatogramRecord {
    pub id: String,
    pub index: usize,
    pub chromatogram_type: ChromatogramType,
    pub params: ParamList,
    pub arrays: BinaryArrayList,
}

impl_param_described!(ChromatogramRecord);

impl ChromatogramRecord {
    pub fn default_array_length(&self) -> usize {
        self.arrays.default_array_length()
    }

    pub fn times(&self) -> &[f64] {
        self.arrays
            .get(&ArrayType::TimeArray)
            .map(|a| a.values.as_slice())
            .unwrap_or_default()
    }
}
