//! Document-level metadata describing where spectra came from and what was done to them.
#[macro_use]
pub mod file_description;
pub mod data_processing;
pub mod instrument;
pub mod run;
pub mod software;

pub use crate::meta::data_processing::{DataProcessing, ProcessingMethod};
pub use crate::meta::file_description::{FileDescription, SourceFile};
pub use crate::meta::instrument::{
    Component, ComponentType, InstrumentConfiguration, ReferenceableParamGroup,
};
pub use crate::meta::run::MassSpectrometryRun;
pub use crate::meta::software::Software;

/// All of the document header pieces an mzML writer needs before the first
/// spectrum can be written.
#[derive(Debug, Clone, Default)]
pub struct MzMLMetadata {
    /// The `id` attribute of the `<mzML>` element
    pub id: String,
    pub file_description: FileDescription,
    pub param_groups: Vec<ReferenceableParamGroup>,
    pub softwares: Vec<Software>,
    pub instrument_configurations: Vec<InstrumentConfiguration>,
    pub data_processings: Vec<DataProcessing>,
    pub run: MassSpectrometryRun,
}

impl MzMLMetadata {
    pub fn default_data_processing_id(&self) -> Option<&str> {
        self.run
            .default_data_processing_id
            .as_deref()
            .or_else(|| self.data_processings.first().map(|dp| dp.id.as_str()))
    }
}
