use crate::impl_param_described;
use crate::params::{ParamDescribed, ParamList};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub location: String,
    pub id: String,
    pub params: ParamList,
}

/// The `<fileDescription>` block, with the kinds of spectra present and
/// the files they were converted from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDescription {
    pub contents: ParamList,
    pub source_files: Vec<SourceFile>,
}

impl_param_described!(SourceFile);

impl ParamDescribed for FileDescription {
    fn params(&self) -> &ParamList {
        &self.contents
    }

    fn params_mut(&mut self) -> &mut ParamList {
        &mut self.contents
    }
}
