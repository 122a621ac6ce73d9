use crate::params::ParamDescribed;
use crate::spectrum::{
    ArrayType, BinaryArrayList, BinaryCompressionType, ChromatogramRecord, ChromatogramType,
    DataArray,
};

use super::source::{RawFileAccess, RawFileError, TraceType, TraceWindow};

impl From<TraceType> for ChromatogramType {
    fn from(value: TraceType) -> Self {
        match value {
            TraceType::BasePeak => ChromatogramType::BasePeakChromatogram,
            TraceType::TIC => ChromatogramType::TotalIonCurrentChromatogram,
            TraceType::MassRange => ChromatogramType::SelectedIonCurrentChromatogram,
        }
    }
}

/// Extracts chromatogram traces over a scan range and turns every non-empty
/// trace into a [`ChromatogramRecord`]. Trace arrays are always zlib compressed.
pub struct ChromatogramAssembler<'a, R: RawFileAccess> {
    raw: &'a R,
    trace_type: TraceType,
}

impl<'a, R: RawFileAccess> ChromatogramAssembler<'a, R> {
    pub fn new(raw: &'a R) -> Self {
        Self {
            raw,
            trace_type: TraceType::BasePeak,
        }
    }

    pub fn with_trace_type(mut self, trace_type: TraceType) -> Self {
        self.trace_type = trace_type;
        self
    }

    pub fn assemble(
        &self,
        first_scan: i32,
        last_scan: i32,
    ) -> Result<Vec<ChromatogramRecord>, RawFileError> {
        let traces =
            self.raw
                .chromatogram(self.trace_type, first_scan, last_scan, &TraceWindow::default())?;
        let chromatogram_type: ChromatogramType = self.trace_type.into();

        let mut records = Vec::with_capacity(traces.len());
        for (i, trace) in traces.into_iter().enumerate() {
            if trace.is_empty() {
                log::debug!("Skipping empty chromatogram trace {i}");
                continue;
            }
            let mut arrays = BinaryArrayList::new();
            arrays.add(DataArray::new(
                ArrayType::TimeArray,
                trace.times,
                BinaryCompressionType::Zlib,
            ));
            arrays.add(DataArray::new(
                ArrayType::IntensityArray,
                trace.intensities,
                BinaryCompressionType::Zlib,
            ));

            let mut record = ChromatogramRecord {
                id: format!("{}_{i}", chromatogram_type.id_prefix()),
                index: records.len(),
                chromatogram_type,
                arrays,
                ..Default::default()
            };
            record.add_param(chromatogram_type.to_param().into());
            records.push(record);
        }
        Ok(records)
    }
}
