use std::fmt::Debug;
use std::io::{self, BufWriter, Write};

use chrono::SecondsFormat;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::Error as XMLError;
use quick_xml::Writer;
use thiserror::Error;

use crate::io::offset_index::OffsetIndex;
use crate::io::thermo::{
    ChromatogramAssembler, DocumentAssembler, RawFileAccess, RawFileError, RunState,
    SpectrumAssembler, SpectrumAssemblyOptions, DEFAULT_SOFTWARE_NAME,
};
use crate::io::traits::{SpectrumWriter, WriteSummary};
use crate::io::utils::SHA1HashingStream;
use crate::meta::MzMLMetadata;
use crate::params::{ControlledVocabulary, Param, ParamCow, ParamDescribed, ParamLike, Unit};
use crate::spectrum::{
    Acquisition, BinaryArrayList, ChromatogramRecord, DataArray, IsolationWindow, Precursor,
    SpectrumRecord,
};

const BUFFER_SIZE: usize = 10000;

macro_rules! bstart {
    ($e:tt) => {
        BytesStart::from_content($e, $e.len())
    };
}

macro_rules! attrib {
    ($name:expr, $value:expr, $elt:ident) => {
        let key = $name.as_bytes();
        let value = $value.as_bytes();
        $elt.push_attribute((key, value));
    };
}

macro_rules! start_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::Start($target.borrow()))?;
    };
}

macro_rules! end_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::End($target.to_end()))?;
    };
}

const MZML_NAMESPACE: &str = "http://psi.hupo.org/ms/mzml";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.0.xsd";

const CV: ControlledVocabulary = ControlledVocabulary::MS;

const NO_COMBINATION: ParamCow = CV.const_param_ident("no combination", 1000795);
const SCAN_START_TIME: ParamCow = CV.const_param_ident_unit("scan start time", 1000016, Unit::Minute);
const FILTER_STRING: ParamCow = CV.const_param_ident("filter string", 1000512);
const ION_INJECTION_TIME: ParamCow =
    CV.const_param_ident_unit("ion injection time", 1000927, Unit::Millisecond);
const SCAN_WINDOW_LOWER_LIMIT: ParamCow =
    CV.const_param_ident_unit("scan window lower limit", 1000501, Unit::MZ);
const SCAN_WINDOW_UPPER_LIMIT: ParamCow =
    CV.const_param_ident_unit("scan window upper limit", 1000500, Unit::MZ);
const ISOLATION_WINDOW_TARGET: ParamCow =
    CV.const_param_ident_unit("isolation window target m/z", 1000827, Unit::MZ);
const ISOLATION_WINDOW_LOWER_OFFSET: ParamCow =
    CV.const_param_ident_unit("isolation window lower offset", 1000828, Unit::MZ);
const ISOLATION_WINDOW_UPPER_OFFSET: ParamCow =
    CV.const_param_ident_unit("isolation window upper offset", 1000829, Unit::MZ);
const SELECTED_ION_MZ: ParamCow = CV.const_param_ident_unit("selected ion m/z", 1000744, Unit::MZ);
const CHARGE_STATE: ParamCow = CV.const_param_ident("charge state", 1000041);
const COLLISION_ENERGY: ParamCow =
    CV.const_param_ident_unit("collision energy", 1000045, Unit::Electronvolt);

#[derive(Debug, Error)]
pub enum MzMLWriterError {
    #[error("An XML error occurred: {0}")]
    XMLError(#[from] XMLError),
    #[error("Attempted to transition from {from_state:?} to {to_state:?}")]
    StateTransitionError {
        from_state: MzMLWriterState,
        to_state: MzMLWriterState,
    },
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
    #[error("Attempted to perform an invalid action in {0:?}")]
    InvalidActionError(MzMLWriterState),
    #[error("Failed to read from the RAW file: {0}")]
    RawFileError(#[from] RawFileError),
}

pub type WriterResult = Result<(), MzMLWriterError>;

/// Whether the document is wrapped in `<indexedmzML>` with a trailing offset
/// index and checksum
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MzMLOutputMode {
    #[default]
    Indexed,
    Plain,
}

struct InnerXMLWriter<W: io::Write> {
    pub handle: Writer<BufWriter<SHA1HashingStream<W>>>,
}

impl<W: Write> Debug for InnerXMLWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InnerXMLWriter")
            .field("handle", &"...")
            .finish()
    }
}

impl<W: io::Write> InnerXMLWriter<W> {
    const INDENT_SIZE: usize = 2;

    pub fn new(file: W) -> InnerXMLWriter<W> {
        let handle = BufWriter::with_capacity(BUFFER_SIZE, SHA1HashingStream::new(file));
        Self {
            handle: Writer::new_with_indent(handle, b' ', Self::INDENT_SIZE),
        }
    }

    /// The number of bytes written to the document so far, including those
    /// still held in the buffer
    pub fn position(&self) -> u64 {
        let buffer = self.handle.get_ref();
        buffer.get_ref().position() + buffer.buffer().len() as u64
    }

    /// The digest of every byte written so far
    pub fn digest(&mut self) -> io::Result<String> {
        self.flush()?;
        Ok(self.handle.get_ref().get_ref().compute())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.handle.get_mut().flush()
    }

    pub fn into_inner(self) -> io::Result<W> {
        let stream = self
            .handle
            .into_inner()
            .into_inner()
            .map_err(|e| e.into_error())?;
        Ok(stream.into_inner())
    }

    pub fn write_param<P: ParamLike>(&mut self, param: &P) -> WriterResult {
        let mut elt = match param.curie() {
            None => bstart!("userParam"),
            Some(accession_str) => {
                let mut elt = bstart!("cvParam");
                attrib!("accession", accession_str, elt);
                if let Some(cv_ref) = param.controlled_vocabulary() {
                    attrib!("cvRef", cv_ref.prefix(), elt);
                }
                elt
            }
        };

        attrib!("name", param.name(), elt);
        if param.is_controlled() || !param.value().is_empty() {
            attrib!("value", param.value(), elt);
        }
        if let Some(value_type) = param.value_type() {
            attrib!("type", value_type, elt);
        }
        match param.unit() {
            Unit::Unknown => {}
            unit => {
                let (unit_acc, unit_name) = unit.for_param();
                let unit_cv = unit
                    .controlled_vocabulary()
                    .unwrap_or(ControlledVocabulary::UO);
                attrib!("unitCvRef", unit_cv.prefix(), elt);
                attrib!("unitAccession", unit_acc, elt);
                attrib!("unitName", unit_name, elt);
            }
        }
        self.handle.write_event(Event::Empty(elt))?;
        Ok(())
    }

    pub fn write_param_list<'a, T: Iterator<Item = &'a Param>>(
        &mut self,
        params: T,
    ) -> WriterResult {
        for param in params {
            self.write_param(param)?
        }
        Ok(())
    }

    pub fn write_event(&mut self, event: Event) -> WriterResult {
        self.handle.write_event(event)?;
        Ok(())
    }

    pub fn write_text_element(&mut self, name: &str, text: &str) -> WriterResult {
        let tag = BytesStart::new(name);
        self.handle.write_event(Event::Start(tag.borrow()))?;
        self.handle.write_event(Event::Text(BytesText::new(text)))?;
        self.handle.write_event(Event::End(tag.to_end()))?;
        Ok(())
    }

    /// Write a start tag and return the byte offset of its opening `<`
    pub fn write_start_tracked(&mut self, tag: &BytesStart) -> Result<u64, MzMLWriterError> {
        self.handle.write_event(Event::Start(tag.borrow()))?;
        Ok(self.position() - (tag.len() as u64 + 2))
    }
}

/**
The different states that [`MzMLWriterType`] can enter while
writing an mzML document. This is only necessary for the module
consumer when determining where something may have gone wrong.
*/
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub enum MzMLWriterState {
    Start,
    DocumentOpen,
    Header,
    Run,
    SpectrumList,
    SpectrumListClosed,
    ChromatogramList,
    ChromatogramListClosed,
    RunClosed,
    MzMLClosed,
    IndexList,
    IndexListClosed,
    End,
}

/**
A streaming mzML writer for [`SpectrumRecord`]s and [`ChromatogramRecord`]s.

Spectra are written out immediately. In [`MzMLOutputMode::Indexed`] mode the byte
offset of every spectrum and chromatogram is recorded as it is written, and the
document is completed by an `<indexList>` and a SHA-1 `<fileChecksum>` over all
preceding bytes.
*/
#[derive(Debug)]
pub struct MzMLWriterType<W: Write> {
    /// The total number of spectra this mzML document will contain.
    /// This value will appear in the `spectrumList` element's count attribute
    pub spectrum_count: u64,
    /// The number of `spectrum` elements written so far.
    pub spectrum_counter: u64,

    /// The total number of chromatograms this mzML document will contain.
    /// No `chromatogramList` is written when this is zero.
    pub chromatogram_count: u64,
    /// The number of chromatograms written so far
    pub chromatogram_counter: u64,

    pub mode: MzMLOutputMode,
    /// The document header, written before the first spectrum
    pub metadata: MzMLMetadata,
    /// How spectra are assembled when writing a whole run
    pub assembly_options: SpectrumAssemblyOptions,
    pub software_name: String,

    pub state: MzMLWriterState,
    pub spectrum_offset_index: OffsetIndex,
    pub chromatogram_offset_index: OffsetIndex,

    handle: InnerXMLWriter<W>,
}

pub type MzMLWriter<W> = MzMLWriterType<W>;

impl<W: Write> MzMLWriterType<W> {
    const PSIMS_VERSION: &'static str = "4.1.12";
    const UNIT_VERSION: &'static str = "09:04:2014";

    /// Wrap a new [`std::io::Write`]-able type, constructing a new [`MzMLWriterType`]
    pub fn new(file: W, mode: MzMLOutputMode) -> MzMLWriterType<W> {
        MzMLWriterType {
            spectrum_count: 0,
            spectrum_counter: 0,
            chromatogram_count: 0,
            chromatogram_counter: 0,
            mode,
            metadata: MzMLMetadata::default(),
            assembly_options: SpectrumAssemblyOptions::default(),
            software_name: DEFAULT_SOFTWARE_NAME.to_string(),
            state: MzMLWriterState::Start,
            spectrum_offset_index: OffsetIndex::new("spectrum".into()),
            chromatogram_offset_index: OffsetIndex::new("chromatogram".into()),
            handle: InnerXMLWriter::new(file),
        }
    }

    pub fn with_options(
        file: W,
        mode: MzMLOutputMode,
        assembly_options: SpectrumAssemblyOptions,
        software_name: String,
    ) -> MzMLWriterType<W> {
        let mut this = Self::new(file, mode);
        this.assembly_options = assembly_options;
        this.software_name = software_name;
        this
    }

    fn transition_err(&self, to_state: MzMLWriterState) -> WriterResult {
        Err(MzMLWriterError::StateTransitionError {
            from_state: self.state,
            to_state,
        })
    }

    /// The number of bytes written so far
    pub fn stream_position(&self) -> u64 {
        self.handle.position()
    }

    fn write_cv_list(&mut self) -> WriterResult {
        let mut cv_list = bstart!("cvList");
        attrib!("count", "2", cv_list);
        start_event!(self, cv_list);

        let mut cv = bstart!("cv");
        attrib!("id", "MS", cv);
        attrib!("fullName", "Mass spectrometry ontology", cv);
        attrib!("version", Self::PSIMS_VERSION, cv);
        attrib!(
            "URI",
            "https://raw.githubusercontent.com/HUPO-PSI/psi-ms-CV/master/psi-ms.obo",
            cv
        );
        self.handle.write_event(Event::Empty(cv))?;

        let mut cv = bstart!("cv");
        attrib!("id", "UO", cv);
        attrib!("fullName", "Unit Ontology", cv);
        attrib!("version", Self::UNIT_VERSION, cv);
        attrib!(
            "URI",
            "https://raw.githubusercontent.com/bio-ontology-research-group/unit-ontology/master/unit.obo",
            cv
        );
        self.handle.write_event(Event::Empty(cv))?;

        end_event!(self, cv_list);
        Ok(())
    }

    fn start_document(&mut self) -> WriterResult {
        if self.state != MzMLWriterState::Start {
            return self.transition_err(MzMLWriterState::DocumentOpen);
        }
        self.handle
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        if self.mode == MzMLOutputMode::Indexed {
            let mut indexed = bstart!("indexedmzML");
            attrib!("xmlns", MZML_NAMESPACE, indexed);
            attrib!("xmlns:xsi", XSI_NAMESPACE, indexed);
            attrib!("xsi:schemaLocation", SCHEMA_LOCATION, indexed);
            self.handle.write_event(Event::Start(indexed))?;
        }

        let mut mzml = bstart!("mzML");
        attrib!("xmlns", MZML_NAMESPACE, mzml);
        attrib!("xmlns:xsi", XSI_NAMESPACE, mzml);
        attrib!("xsi:schemaLocation", SCHEMA_LOCATION, mzml);
        attrib!("version", "1.1.0", mzml);
        attrib!("id", self.metadata.id, mzml);
        self.handle.write_event(Event::Start(mzml))?;

        self.state = MzMLWriterState::DocumentOpen;
        Ok(())
    }

    /// Write out the document header. Called implicitly by the first write.
    pub fn write_header(&mut self) -> WriterResult {
        self.start_document()?;
        self.write_cv_list()?;
        self.write_file_description()?;
        self.write_param_groups()?;
        self.write_software_list()?;
        self.write_instrument_configuration()?;
        self.write_data_processing()?;

        self.state = MzMLWriterState::Header;
        Ok(())
    }

    fn write_file_description(&mut self) -> WriterResult {
        let fd = bstart!("fileDescription");
        start_event!(self, fd);

        let fc_tag = bstart!("fileContent");
        start_event!(self, fc_tag);
        self.handle
            .write_param_list(self.metadata.file_description.params().iter())?;
        end_event!(self, fc_tag);

        let mut outer = bstart!("sourceFileList");
        let count = self.metadata.file_description.source_files.len().to_string();
        attrib!("count", count, outer);
        start_event!(self, outer);
        for sf in self.metadata.file_description.source_files.iter() {
            let mut tag = bstart!("sourceFile");
            attrib!("id", sf.id, tag);
            attrib!("name", sf.name, tag);
            attrib!("location", sf.location, tag);
            self.handle.write_event(Event::Start(tag.borrow()))?;
            self.handle.write_param_list(sf.params().iter())?;
            self.handle.write_event(Event::End(tag.to_end()))?;
        }
        end_event!(self, outer);

        end_event!(self, fd);
        Ok(())
    }

    fn write_param_groups(&mut self) -> WriterResult {
        if self.metadata.param_groups.is_empty() {
            return Ok(());
        }
        let mut outer = bstart!("referenceableParamGroupList");
        let count = self.metadata.param_groups.len().to_string();
        attrib!("count", count, outer);
        start_event!(self, outer);
        for group in self.metadata.param_groups.iter() {
            let mut tag = bstart!("referenceableParamGroup");
            attrib!("id", group.id, tag);
            self.handle.write_event(Event::Start(tag.borrow()))?;
            self.handle.write_param_list(group.params().iter())?;
            self.handle.write_event(Event::End(tag.to_end()))?;
        }
        end_event!(self, outer);
        Ok(())
    }

    fn write_software_list(&mut self) -> WriterResult {
        let mut outer = bstart!("softwareList");
        let count = self.metadata.softwares.len().to_string();
        attrib!("count", count, outer);
        start_event!(self, outer);
        for soft in self.metadata.softwares.iter() {
            let mut tag = bstart!("software");
            attrib!("id", soft.id, tag);
            attrib!("version", soft.version, tag);
            self.handle.write_event(Event::Start(tag.borrow()))?;
            self.handle.write_param_list(soft.params().iter())?;
            self.handle.write_event(Event::End(tag.to_end()))?;
        }
        end_event!(self, outer);
        Ok(())
    }

    fn write_instrument_configuration(&mut self) -> WriterResult {
        let mut outer = bstart!("instrumentConfigurationList");
        let count = self.metadata.instrument_configurations.len().to_string();
        attrib!("count", count, outer);
        start_event!(self, outer);

        for ic in self.metadata.instrument_configurations.iter() {
            let mut tag = bstart!("instrumentConfiguration");
            attrib!("id", ic.id, tag);
            self.handle.write_event(Event::Start(tag.borrow()))?;
            for group_ref in ic.param_group_refs.iter() {
                let mut ref_tag = bstart!("referenceableParamGroupRef");
                attrib!("ref", group_ref, ref_tag);
                self.handle.write_event(Event::Empty(ref_tag))?;
            }
            self.handle.write_param_list(ic.params().iter())?;

            let mut list_tag = bstart!("componentList");
            let count = ic.components.len().to_string();
            attrib!("count", count, list_tag);
            self.handle.write_event(Event::Start(list_tag.borrow()))?;
            for comp in ic.components.iter() {
                let Some(name) = comp.component_type.tag_name() else {
                    log::warn!("Skipping component of unknown type in {}", ic.id);
                    continue;
                };
                let mut cmp_tag = BytesStart::new(name);
                let order = comp.order.to_string();
                attrib!("order", order, cmp_tag);
                self.handle.write_event(Event::Start(cmp_tag.borrow()))?;
                self.handle.write_param_list(comp.params().iter())?;
                self.handle.write_event(Event::End(cmp_tag.to_end()))?;
            }
            self.handle.write_event(Event::End(list_tag.to_end()))?;
            self.handle.write_event(Event::End(tag.to_end()))?;
        }
        end_event!(self, outer);
        Ok(())
    }

    fn write_data_processing(&mut self) -> WriterResult {
        let mut outer = bstart!("dataProcessingList");
        let count = self.metadata.data_processings.len().to_string();
        attrib!("count", count, outer);
        start_event!(self, outer);
        for dp in self.metadata.data_processings.iter() {
            let mut tag = bstart!("dataProcessing");
            attrib!("id", dp.id, tag);
            self.handle.write_event(Event::Start(tag.borrow()))?;
            for proc in dp.iter() {
                let mut mtag = bstart!("processingMethod");
                let order = proc.order.to_string();
                attrib!("order", order, mtag);
                attrib!("softwareRef", proc.software_reference, mtag);
                self.handle.write_event(Event::Start(mtag.borrow()))?;
                self.handle.write_param_list(proc.params().iter())?;
                self.handle.write_event(Event::End(mtag.to_end()))?;
            }
            self.handle.write_event(Event::End(tag.to_end()))?;
        }
        end_event!(self, outer);
        Ok(())
    }

    fn start_run(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::Header {
            self.write_header()?;
        } else if self.state > MzMLWriterState::Header {
            return self.transition_err(MzMLWriterState::Run);
        }
        let run_meta = &self.metadata.run;
        let mut run = bstart!("run");
        let id = run_meta.id.as_deref().unwrap_or(self.metadata.id.as_str());
        attrib!("id", id, run);
        if let Some(ic_ref) = run_meta.default_instrument_id.as_deref().or_else(|| {
            self.metadata
                .instrument_configurations
                .first()
                .map(|ic| ic.id.as_str())
        }) {
            attrib!("defaultInstrumentConfigurationRef", ic_ref, run);
        }
        if let Some(start_time) = run_meta.start_time {
            let timestamp = start_time.to_rfc3339_opts(SecondsFormat::Secs, true);
            attrib!("startTimeStamp", timestamp, run);
        }
        if let Some(sf_ref) = run_meta.default_source_file_id.as_deref().or_else(|| {
            self.metadata
                .file_description
                .source_files
                .first()
                .map(|sf| sf.id.as_str())
        }) {
            attrib!("defaultSourceFileRef", sf_ref, run);
        }
        self.handle.write_event(Event::Start(run))?;
        self.state = MzMLWriterState::Run;
        Ok(())
    }

    fn start_spectrum_list(&mut self) -> WriterResult {
        match self.state {
            MzMLWriterState::SpectrumList => return Ok(()),
            state if state < MzMLWriterState::Run => {
                self.start_run()?;
            }
            MzMLWriterState::Run => {}
            _ => {
                return self.transition_err(MzMLWriterState::SpectrumList);
            }
        }
        let mut list = bstart!("spectrumList");
        let count = self.spectrum_count.to_string();
        attrib!("count", count, list);
        if let Some(dp) = self.metadata.default_data_processing_id() {
            attrib!("defaultDataProcessingRef", dp, list);
        }
        self.handle.write_event(Event::Start(list))?;
        self.state = MzMLWriterState::SpectrumList;
        Ok(())
    }

    fn close_spectrum_list(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::SpectrumList {
            self.start_spectrum_list()?;
        } else if self.state > MzMLWriterState::SpectrumList {
            return self.transition_err(MzMLWriterState::SpectrumListClosed);
        }
        if self.spectrum_counter != self.spectrum_count {
            log::warn!(
                "Declared {} spectra but wrote {}",
                self.spectrum_count,
                self.spectrum_counter
            );
        }
        let tag = bstart!("spectrumList");
        end_event!(self, tag);
        self.state = MzMLWriterState::SpectrumListClosed;
        Ok(())
    }

    fn start_chromatogram_list(&mut self) -> WriterResult {
        match self.state {
            MzMLWriterState::ChromatogramList => return Ok(()),
            state if state < MzMLWriterState::SpectrumListClosed => {
                self.close_spectrum_list()?;
            }
            MzMLWriterState::SpectrumListClosed => {}
            _ => {
                return self.transition_err(MzMLWriterState::ChromatogramList);
            }
        }
        let mut list = bstart!("chromatogramList");
        let count = self.chromatogram_count.to_string();
        attrib!("count", count, list);
        if let Some(dp) = self.metadata.default_data_processing_id() {
            attrib!("defaultDataProcessingRef", dp, list);
        }
        self.handle.write_event(Event::Start(list))?;
        self.state = MzMLWriterState::ChromatogramList;
        Ok(())
    }

    fn close_chromatogram_list(&mut self) -> WriterResult {
        let tag = bstart!("chromatogramList");
        end_event!(self, tag);
        self.state = MzMLWriterState::ChromatogramListClosed;
        Ok(())
    }

    fn close_run(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::SpectrumListClosed {
            self.close_spectrum_list()?;
        }
        if self.state == MzMLWriterState::ChromatogramList {
            self.close_chromatogram_list()?;
        } else if self.state > MzMLWriterState::ChromatogramListClosed {
            // The run has already been closed
            return self.transition_err(MzMLWriterState::RunClosed);
        }
        let tag = bstart!("run");
        end_event!(self, tag);
        self.state = MzMLWriterState::RunClosed;
        Ok(())
    }

    fn close_mzml(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::RunClosed {
            self.close_run()?;
        }
        let tag = bstart!("mzML");
        end_event!(self, tag);
        self.state = MzMLWriterState::MzMLClosed;
        Ok(())
    }

    fn close_indexed_mzml(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::MzMLClosed {
            self.close_mzml()?;
        }
        self.write_index_list()?;
        let tag = bstart!("indexedmzML");
        end_event!(self, tag);
        self.state = MzMLWriterState::End;
        Ok(())
    }

    /**
    Close the document. In indexed mode this writes out the offset indices
    and the file checksum at the tail of the document.
    */
    pub fn close(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::End {
            match self.mode {
                MzMLOutputMode::Indexed => self.close_indexed_mzml()?,
                MzMLOutputMode::Plain => {
                    if self.state < MzMLWriterState::MzMLClosed {
                        self.close_mzml()?;
                    }
                    self.state = MzMLWriterState::End;
                }
            }
            self.handle.write_event(Event::Text(BytesText::new("\n")))?;
        }
        self.handle.flush()?;
        Ok(())
    }

    /// Close the document if needed and return the wrapped stream
    pub fn into_inner(mut self) -> Result<W, MzMLWriterError> {
        self.close()?;
        Ok(self.handle.into_inner()?)
    }

    fn write_scan_list(&mut self, acq: &Acquisition) -> WriterResult {
        let mut scan_list_tag = bstart!("scanList");
        let count = acq.scans.len().to_string();
        attrib!("count", count, scan_list_tag);
        start_event!(self, scan_list_tag);
        self.handle.write_param(&NO_COMBINATION)?;
        self.handle.write_param_list(acq.params().iter())?;

        for scan in acq.scans.iter() {
            let mut scan_tag = bstart!("scan");
            attrib!(
                "instrumentConfigurationRef",
                scan.instrument_configuration_id,
                scan_tag
            );
            self.handle.write_event(Event::Start(scan_tag.borrow()))?;

            self.handle
                .write_param(&SCAN_START_TIME.with_value(scan.start_time))?;
            self.handle
                .write_param(&FILTER_STRING.with_value(&scan.filter_string))?;
            if let Some(injection_time) = scan.injection_time {
                self.handle
                    .write_param(&ION_INJECTION_TIME.with_value(injection_time))?;
            }
            self.handle.write_param_list(scan.params().iter())?;

            let mut scan_window_list_tag = bstart!("scanWindowList");
            let scan_window_list_count = scan.scan_windows.len().to_string();
            attrib!("count", scan_window_list_count, scan_window_list_tag);
            self.handle
                .write_event(Event::Start(scan_window_list_tag.borrow()))?;
            for window in scan.scan_windows.iter() {
                let window_tag = bstart!("scanWindow");
                self.handle.write_event(Event::Start(window_tag.borrow()))?;
                self.handle
                    .write_param(&SCAN_WINDOW_LOWER_LIMIT.with_value(window.lower_bound))?;
                self.handle
                    .write_param(&SCAN_WINDOW_UPPER_LIMIT.with_value(window.upper_bound))?;
                self.handle.write_event(Event::End(window_tag.to_end()))?;
            }
            self.handle
                .write_event(Event::End(scan_window_list_tag.to_end()))?;
            self.handle.write_event(Event::End(scan_tag.to_end()))?;
        }
        end_event!(self, scan_list_tag);
        Ok(())
    }

    fn write_isolation_window(&mut self, iw: &IsolationWindow) -> WriterResult {
        let iw_tag = bstart!("isolationWindow");
        start_event!(self, iw_tag);
        if let Some(target) = iw.target {
            self.handle
                .write_param(&ISOLATION_WINDOW_TARGET.with_value(target))?;
            if let Some(lower) = iw.lower_offset {
                self.handle
                    .write_param(&ISOLATION_WINDOW_LOWER_OFFSET.with_value(lower))?;
            }
            if let Some(upper) = iw.upper_offset {
                self.handle
                    .write_param(&ISOLATION_WINDOW_UPPER_OFFSET.with_value(upper))?;
            }
        }
        end_event!(self, iw_tag);
        Ok(())
    }

    fn write_selected_ions(&mut self, precursor: &Precursor) -> WriterResult {
        let mut outer = bstart!("selectedIonList");
        attrib!("count", "1", outer);
        start_event!(self, outer);
        let tag = bstart!("selectedIon");
        start_event!(self, tag);

        let ion = &precursor.ion;
        if let Some(mz) = ion.mz {
            self.handle.write_param(&SELECTED_ION_MZ.with_value(mz))?;
        }
        if let Some(charge) = ion.charge {
            self.handle.write_param(&CHARGE_STATE.with_value(charge))?;
        }
        self.handle.write_param_list(ion.params().iter())?;
        end_event!(self, tag);
        end_event!(self, outer);
        Ok(())
    }

    fn write_activation(&mut self, precursor: &Precursor) -> WriterResult {
        let act = &precursor.activation;
        let tag = bstart!("activation");
        start_event!(self, tag);
        if let Some(energy) = act.energy {
            self.handle.write_param(&COLLISION_ENERGY.with_value(energy))?;
        }
        self.handle.write_param_list(act.params().iter())?;
        end_event!(self, tag);
        Ok(())
    }

    fn write_precursor(&mut self, precursor: &Precursor) -> WriterResult {
        let mut precursor_list_tag = bstart!("precursorList");
        attrib!("count", "1", precursor_list_tag);
        start_event!(self, precursor_list_tag);

        let mut precursor_tag = bstart!("precursor");
        if let Some(prec_id) = precursor.precursor_id.as_deref() {
            attrib!("spectrumRef", prec_id, precursor_tag);
        }
        start_event!(self, precursor_tag);

        self.write_isolation_window(&precursor.isolation_window)?;
        self.write_selected_ions(precursor)?;
        self.write_activation(precursor)?;
        end_event!(self, precursor_tag);
        end_event!(self, precursor_list_tag);
        Ok(())
    }

    fn write_binary_data_array(&mut self, array: &DataArray) -> WriterResult {
        let encoded = array.encode()?;
        let mut outer = bstart!("binaryDataArray");
        let encoded_len = encoded.encoded_length.to_string();
        attrib!("encodedLength", encoded_len, outer);
        start_event!(self, outer);

        self.handle.write_param(&array.name.as_param_const())?;
        self.handle.write_param(&array.dtype.as_param_const())?;
        self.handle.write_param(&array.compression.as_param_const())?;
        self.handle.write_param_list(array.params().iter())?;

        self.handle.write_text_element("binary", &encoded.text)?;
        end_event!(self, outer);
        Ok(())
    }

    fn write_binary_data_arrays(&mut self, arrays: &BinaryArrayList) -> WriterResult {
        if arrays.is_empty() {
            return Ok(());
        }
        let count = arrays.len().to_string();
        let mut outer = bstart!("binaryDataArrayList");
        attrib!("count", count, outer);
        start_event!(self, outer);
        for array in arrays.iter() {
            self.write_binary_data_array(array)?
        }
        end_event!(self, outer);
        Ok(())
    }

    /**
    Write a [`SpectrumRecord`] out to the mzML file.

    ## Side-Effects
    If the writer has not already started writing the spectra, this will cause all the metadata
    to be written out and the `<spectrumList>` element will be opened, preventing no new metadata
    from being written to this stream. Furthermore, this writes the spectrum count out, so the value
    may no longer be changed.
    */
    pub fn write_spectrum(&mut self, spectrum: &SpectrumRecord) -> WriterResult {
        match self.state {
            MzMLWriterState::SpectrumList => {}
            state if state < MzMLWriterState::SpectrumList => {
                self.start_spectrum_list()?;
            }
            _ => {
                // Spectra can no longer be written once the spectrum list is closed
                return Err(MzMLWriterError::InvalidActionError(self.state));
            }
        }
        let mut outer = bstart!("spectrum");
        attrib!("id", spectrum.id(), outer);
        let index = self.spectrum_counter.to_string();
        attrib!("index", index, outer);
        let default_array_len = spectrum.default_array_length().to_string();
        attrib!("defaultArrayLength", default_array_len, outer);

        let offset = self.handle.write_start_tracked(&outer)?;
        self.spectrum_offset_index.insert(spectrum.id(), offset);
        self.spectrum_counter += 1;

        let description = &spectrum.description;
        self.handle.write_param_list(description.params().iter())?;
        self.write_scan_list(&description.acquisition)?;
        if let Some(precursor) = description.precursor.as_ref() {
            self.write_precursor(precursor)?;
        }
        self.write_binary_data_arrays(&spectrum.arrays)?;

        end_event!(self, outer);
        log::trace!("Spectrum written to file -- {}", spectrum.id());
        Ok(())
    }

    /// Write a [`ChromatogramRecord`], closing the spectrum list first if it is still open
    pub fn write_chromatogram(&mut self, chromatogram: &ChromatogramRecord) -> WriterResult {
        match self.state {
            MzMLWriterState::ChromatogramList => {}
            state if state < MzMLWriterState::ChromatogramList => {
                self.start_chromatogram_list()?;
            }
            _ => {
                return Err(MzMLWriterError::InvalidActionError(self.state));
            }
        }
        let mut outer = bstart!("chromatogram");
        attrib!("id", chromatogram.id, outer);
        let index = self.chromatogram_counter.to_string();
        attrib!("index", index, outer);
        let default_array_len = chromatogram.default_array_length().to_string();
        attrib!("defaultArrayLength", default_array_len, outer);

        let offset = self.handle.write_start_tracked(&outer)?;
        self.chromatogram_offset_index
            .insert(chromatogram.id.as_str(), offset);
        self.chromatogram_counter += 1;

        self.handle.write_param_list(chromatogram.params().iter())?;
        self.write_binary_data_arrays(&chromatogram.arrays)?;
        end_event!(self, outer);
        Ok(())
    }

    fn write_index(&mut self, index: &OffsetIndex) -> WriterResult {
        let mut outer = bstart!("index");
        attrib!("name", index.name, outer);
        start_event!(self, outer);
        for (id, offset) in index.iter() {
            let mut tag = bstart!("offset");
            attrib!("idRef", id, tag);
            start_event!(self, tag);
            let content = offset.to_string();
            self.handle
                .write_event(Event::Text(BytesText::new(&content)))?;
            end_event!(self, tag);
        }
        end_event!(self, outer);
        Ok(())
    }

    fn write_index_list(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::MzMLClosed {
            self.close_mzml()?;
        } else if self.state > MzMLWriterState::MzMLClosed {
            return self.transition_err(MzMLWriterState::IndexList);
        }
        let has_chromatograms = !self.chromatogram_offset_index.is_empty();
        let mut outer = bstart!("indexList");
        let count = if has_chromatograms { "2" } else { "1" };
        attrib!("count", count, outer);
        let index_list_offset = self.handle.write_start_tracked(&outer)?;
        self.state = MzMLWriterState::IndexList;

        let spectrum_index = std::mem::take(&mut self.spectrum_offset_index);
        self.write_index(&spectrum_index)?;
        self.spectrum_offset_index = spectrum_index;
        if has_chromatograms {
            let chromatogram_index = std::mem::take(&mut self.chromatogram_offset_index);
            self.write_index(&chromatogram_index)?;
            self.chromatogram_offset_index = chromatogram_index;
        }
        end_event!(self, outer);
        self.state = MzMLWriterState::IndexListClosed;

        self.handle
            .write_text_element("indexListOffset", &index_list_offset.to_string())?;

        let tag = bstart!("fileChecksum");
        start_event!(self, tag);
        let content = self.handle.digest()?;
        self.handle
            .write_event(Event::Text(BytesText::new(&content)))?;
        end_event!(self, tag);
        Ok(())
    }

    /// Get a reference to the mzML writer's spectrum count.
    pub fn spectrum_count(&self) -> &u64 {
        &self.spectrum_count
    }

    /// Set the mzML writer's spectrum count.
    pub fn set_spectrum_count(&mut self, spectrum_count: u64) {
        self.spectrum_count = spectrum_count;
    }

    /// Set the number of chromatograms the document will hold
    pub fn set_chromatogram_count(&mut self, chromatogram_count: u64) {
        self.chromatogram_count = chromatogram_count;
    }
}

impl<W: Write> SpectrumWriter for MzMLWriterType<W> {
    type Error = MzMLWriterError;

    fn write(&mut self, spectrum: &SpectrumRecord) -> Result<usize, Self::Error> {
        self.write_spectrum(spectrum)?;
        Ok(1)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }

    fn write_run<R: RawFileAccess>(
        &mut self,
        raw: &R,
        first_scan: i32,
        last_scan: i32,
    ) -> Result<WriteSummary, Self::Error> {
        let mut state = RunState::new();
        let document = DocumentAssembler::new(raw, self.software_name.clone());
        self.metadata = document.build(&mut state)?;
        self.set_spectrum_count((last_scan - first_scan + 1).max(0) as u64);

        let options = self.assembly_options.clone();
        let assembler = SpectrumAssembler::new(raw, &options);
        let mut summary = WriteSummary::default();
        for (index, scan_number) in (first_scan..=last_scan).enumerate() {
            let spectrum = assembler.assemble(scan_number, index, &mut state)?;
            summary.spectra += self.write(&spectrum)?;
            log::debug!("Spectrum written to file -- SCAN# {scan_number}");
        }

        let chromatograms = ChromatogramAssembler::new(raw).assemble(first_scan, last_scan)?;
        self.set_chromatogram_count(chromatograms.len() as u64);
        for chromatogram in chromatograms.iter() {
            self.write_chromatogram(chromatogram)?;
            summary.chromatograms += 1;
        }

        self.close()?;
        summary.warnings = state.warnings;
        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::thermo::fixtures::three_scan_run;
    use crate::io::thermo::SnapshotRawFile;
    use crate::io::utils::checksum_file;
    use regex::Regex;
    use sha1::{Digest, Sha1};

    fn convert_three_scans(mode: MzMLOutputMode) -> (String, WriteSummary) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.raw.json");
        three_scan_run().save(&path).unwrap();
        let raw = SnapshotRawFile::open_path(&path).unwrap();

        let mut writer = MzMLWriterType::new(Vec::new(), mode);
        let summary = writer.write_run(&raw, 1, 3).unwrap();
        let buffer = writer.into_inner().unwrap();
        (String::from_utf8(buffer).unwrap(), summary)
    }

    #[test_log::test]
    fn test_three_scan_document() {
        let (text, summary) = convert_three_scans(MzMLOutputMode::Indexed);
        assert_eq!(summary.spectra, 3);
        assert_eq!(summary.chromatograms, 1);
        assert_eq!(summary.warnings, 0);

        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<indexedmzML"));
        assert!(text.contains("<spectrumList count=\"3\" defaultDataProcessingRef=\"rawmzmlProcessing\">"));
        assert_eq!(text.matches("<precursorList count=\"1\">").count(), 1);
        assert!(text.contains(
            "<precursor spectrumRef=\"controllerType=0 controllerNumber=1 scan=1\">"
        ));
        assert_eq!(text.matches("<binaryDataArrayList count=\"2\">").count(), 3);
        assert!(text.contains(
            "<spectrum id=\"controllerType=0 controllerNumber=1 scan=3\" index=\"2\" defaultArrayLength=\"0\">"
        ));
        let third = text
            .split("scan=3\" index=\"2\"")
            .nth(1)
            .and_then(|s| s.split("</spectrum>").next())
            .unwrap();
        assert!(!third.contains("binaryDataArrayList"));

        assert!(text.contains("<indexList count=\"2\">"));
        assert_eq!(text.matches("<offset idRef=").count(), 4);
        assert!(text.contains("<chromatogram id=\"base_peak_0\" index=\"0\" defaultArrayLength=\"3\">"));
        assert!(text.contains("<instrumentConfiguration id=\"IC2\">"));
        assert!(text.contains("<run id=\"small\" defaultInstrumentConfigurationRef=\"IC1\""));
        assert!(text.trim_end().ends_with("</indexedmzML>"));
    }

    #[test]
    fn test_offsets_point_at_elements() {
        let (text, _) = convert_three_scans(MzMLOutputMode::Indexed);
        let bytes = text.as_bytes();
        let pattern = Regex::new(r#"<offset idRef="([^"]+)">(\d+)</offset>"#).unwrap();
        let mut seen = 0;
        for cap in pattern.captures_iter(&text) {
            let id = &cap[1];
            let offset: usize = cap[2].parse().unwrap();
            let expected_spectrum = format!("<spectrum id=\"{id}\"");
            let expected_chromatogram = format!("<chromatogram id=\"{id}\"");
            let at = &bytes[offset..];
            assert!(
                at.starts_with(expected_spectrum.as_bytes())
                    || at.starts_with(expected_chromatogram.as_bytes()),
                "offset {offset} of {id} does not point at its element"
            );
            seen += 1;
        }
        assert_eq!(seen, 4);

        let pattern = Regex::new(r"<indexListOffset>(\d+)</indexListOffset>").unwrap();
        let offset: usize = pattern.captures(&text).unwrap()[1].parse().unwrap();
        assert!(bytes[offset..].starts_with(b"<indexList count="));
    }

    #[test]
    fn test_file_checksum() {
        let (text, _) = convert_three_scans(MzMLOutputMode::Indexed);
        let marker = "<fileChecksum>";
        let start = text.find(marker).unwrap() + marker.len();
        let end = text.find("</fileChecksum>").unwrap();
        let written = &text[start..end];
        assert_eq!(written.len(), 40);

        let mut hasher = Sha1::new();
        hasher.update(&text.as_bytes()[..start]);
        let expected = base16ct::lower::encode_string(&hasher.finalize());
        assert_eq!(written, expected);
    }

    #[test]
    fn test_plain_document() {
        let (text, summary) = convert_three_scans(MzMLOutputMode::Plain);
        assert_eq!(summary.spectra, 3);
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<mzML"));
        assert!(!text.contains("indexedmzML"));
        assert!(!text.contains("<indexList"));
        assert!(!text.contains("fileChecksum"));
        assert!(text.contains("version=\"1.1.0\" id=\"small\""));
        assert!(text.trim_end().ends_with("</mzML>"));
    }

    #[test]
    fn test_spectrum_terms() {
        let (text, _) = convert_three_scans(MzMLOutputMode::Plain);
        assert!(text.contains(
            "<cvParam accession=\"MS:1000016\" cvRef=\"MS\" name=\"scan start time\" value=\"0.1\" unitCvRef=\"UO\" unitAccession=\"UO:0000031\" unitName=\"minute\"/>"
        ));
        assert!(text.contains(
            "<cvParam accession=\"MS:1000504\" cvRef=\"MS\" name=\"base peak m/z\" value=\"500\" unitCvRef=\"MS\" unitAccession=\"MS:1000040\" unitName=\"m/z\"/>"
        ));
        assert!(text.contains(
            "<cvParam accession=\"MS:1000045\" cvRef=\"MS\" name=\"collision energy\" value=\"35\" unitCvRef=\"UO\" unitAccession=\"UO:0000266\" unitName=\"electronvolt\"/>"
        ));
        assert!(text.contains("<cvParam accession=\"MS:1000041\" cvRef=\"MS\" name=\"charge state\" value=\"2\"/>"));
        assert!(text.contains("<cvParam accession=\"MS:1000574\" cvRef=\"MS\" name=\"zlib compression\" value=\"\"/>"));
        assert!(text.contains("<cv id=\"MS\" fullName=\"Mass spectrometry ontology\" version=\"4.1.12\""));

        let first = &text[text.find("<spectrum ").unwrap()..text.find("</spectrum>").unwrap()];
        let continuity = first.find("name=\"centroid spectrum\"").unwrap();
        let tic = first.find("name=\"total ion current\"").unwrap();
        let polarity = first.find("name=\"positive scan\"").unwrap();
        assert!(polarity < continuity);
        assert!(continuity < tic);
    }

    #[test]
    fn test_source_checksum_and_no_compression() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.raw.json");
        three_scan_run().save(&path).unwrap();
        let raw = SnapshotRawFile::open_path(&path).unwrap();

        let options = SpectrumAssemblyOptions {
            compression: crate::spectrum::BinaryCompressionType::NoCompression,
            ..Default::default()
        };
        let mut writer =
            MzMLWriterType::with_options(Vec::new(), MzMLOutputMode::Indexed, options, "conv".into());
        writer.write_run(&raw, 1, 3).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let checksum = checksum_file(&path).unwrap();
        assert!(text.contains(&format!("name=\"SHA-1\" value=\"{checksum}\"")));
        assert!(text.contains("<software id=\"conv\""));
        // Spectra honour the option, chromatograms stay compressed
        assert_eq!(text.matches("name=\"no compression\"").count(), 4);
        assert_eq!(text.matches("name=\"zlib compression\"").count(), 2);
    }

    #[test]
    fn test_state_errors() {
        let mut writer = MzMLWriterType::new(Vec::new(), MzMLOutputMode::Indexed);
        writer.set_spectrum_count(0);
        writer.close().unwrap();
        let record = SpectrumRecord::default();
        assert!(matches!(
            writer.write_spectrum(&record),
            Err(MzMLWriterError::InvalidActionError(MzMLWriterState::End))
        ));
    }
}
