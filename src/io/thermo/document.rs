//! Build the document header of a converted run: file description, the
//! shared instrument parameters, software, processing and the instrument
//! configurations discovered from the run's leading scans.
use std::fs;

use crate::io::utils::checksum_file;
use crate::meta::{
    Component, ComponentType, DataProcessing, FileDescription, InstrumentConfiguration,
    MassSpectrometryRun, MzMLMetadata, ProcessingMethod, ReferenceableParamGroup, Software,
    SourceFile,
};
use crate::params::{ControlledVocabulary, Param, ParamCow, ParamDescribed};

use super::instruments::{detector_for_analyzer, parse_instrument_model, InstrumentModelType};
use super::source::{
    run_name, IonizationModeType, MassAnalyzerType, RawFileAccess, RawFileError,
};
use super::spectrum::{RunState, MS1_SPECTRUM, MSN_SPECTRUM};

const CV: ControlledVocabulary = ControlledVocabulary::MS;

pub const THERMO_NATIVE_ID_FORMAT: ParamCow = CV.const_param_ident("Thermo nativeID format", 1000768);
pub const THERMO_RAW_FORMAT: ParamCow = CV.const_param_ident("Thermo RAW format", 1000563);
pub const SHA1_CHECKSUM: ParamCow = CV.const_param_ident("SHA-1", 1000569);
pub const INSTRUMENT_SERIAL_NUMBER: ParamCow =
    CV.const_param_ident("instrument serial number", 1000529);
pub const CUSTOM_SOFTWARE: ParamCow =
    CV.const_param_ident("custom unreleased software tool", 1000799);
pub const CONVERSION_TO_MZML: ParamCow = CV.const_param_ident("Conversion to mzML", 1000544);

pub const SOURCE_FILE_ID: &str = "RAW1";
pub const COMMON_INSTRUMENT_PARAMS: &str = "commonInstrumentParams";
pub const DEFAULT_INSTRUMENT_CONFIGURATION: &str = "IC1";
pub const DEFAULT_SOFTWARE_NAME: &str = env!("CARGO_PKG_NAME");

pub struct DocumentAssembler<'a, R: RawFileAccess> {
    raw: &'a R,
    software_name: String,
}

impl<'a, R: RawFileAccess> DocumentAssembler<'a, R> {
    pub fn new<S: Into<String>>(raw: &'a R, software_name: S) -> Self {
        Self {
            raw,
            software_name: software_name.into(),
        }
    }

    pub fn software_name(&self) -> &str {
        &self.software_name
    }

    pub fn data_processing_id(&self) -> String {
        format!("{}Processing", self.software_name)
    }

    /// Read scan filters from the first scan until an MSn scan has been seen,
    /// registering every analyzer and ionization mode along the way. Returns
    /// the number of scans inspected.
    pub fn discover_instrument_configurations(
        &self,
        state: &mut RunState,
    ) -> Result<usize, RawFileError> {
        let header = self.raw.run_header();
        let mut inspected = 0;
        for scan_number in header.first_spectrum..=header.last_spectrum {
            let filter = self.raw.scan_filter(scan_number)?;
            state.observe_filter(&filter);
            inspected += 1;
            if filter.ms_order.ms_level() > 1 {
                break;
            }
        }
        log::debug!(
            "Inspected {inspected} scans, found {} mass analyzers",
            state.mass_analyzers().count()
        );
        Ok(inspected)
    }

    fn instrument_model(&self) -> InstrumentModelType {
        let instrument = self.raw.instrument_data();
        let name = if instrument.name.is_empty() {
            &instrument.model
        } else {
            &instrument.name
        };
        parse_instrument_model(name)
    }

    fn file_description(&self) -> Result<FileDescription, RawFileError> {
        let path = self.raw.path();
        let mut description = FileDescription::default();
        description.add_param(MS1_SPECTRUM.into());
        description.add_param(MSN_SPECTRUM.into());

        let location = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut source = SourceFile {
            id: SOURCE_FILE_ID.to_string(),
            name: run_name(path),
            location: location.display().to_string(),
            ..Default::default()
        };
        source.add_param(THERMO_NATIVE_ID_FORMAT.into());
        source.add_param(THERMO_RAW_FORMAT.into());
        source.add_param(SHA1_CHECKSUM.with_value(checksum_file(path)?));
        description.source_files.push(source);
        Ok(description)
    }

    fn instrument_configurations(
        &self,
        state: &RunState,
        model: InstrumentModelType,
    ) -> Vec<InstrumentConfiguration> {
        let mut ionization: Vec<Param> = state.ionization_types().map(|i| i.to_param()).collect();
        if ionization.is_empty() {
            ionization.push(IonizationModeType::Any.to_param());
        }

        let mut analyzers: Vec<(MassAnalyzerType, String)> = state
            .mass_analyzers()
            .map(|(analyzer, id)| (*analyzer, id.to_string()))
            .collect();
        if analyzers.is_empty() {
            analyzers.push((
                MassAnalyzerType::Any,
                DEFAULT_INSTRUMENT_CONFIGURATION.to_string(),
            ));
        }

        analyzers
            .into_iter()
            .enumerate()
            .map(|(i, (analyzer, id))| {
                let mut config = InstrumentConfiguration {
                    id,
                    param_group_refs: vec![COMMON_INSTRUMENT_PARAMS.to_string()],
                    ..Default::default()
                };

                let mut source = Component::new(ComponentType::IonSource, 1);
                source.extend_params(ionization.iter().cloned());
                config.push(source);

                let mut mass_analyzer = Component::new(ComponentType::Analyzer, 2);
                mass_analyzer.add_param(analyzer.to_param());
                config.push(mass_analyzer);

                let mut detector = Component::new(ComponentType::Detector, 3);
                detector.add_param(detector_for_analyzer(model, i));
                config.push(detector);
                config
            })
            .collect()
    }

    /// Assemble the document header. Instrument configurations are
    /// discovered first when none are known, and are fixed afterwards.
    pub fn build(&self, state: &mut RunState) -> Result<MzMLMetadata, RawFileError> {
        if !state.has_configurations() {
            self.discover_instrument_configurations(state)?;
        }
        state.fix_configurations();

        let id = run_name(self.raw.path());
        let model = self.instrument_model();
        let instrument = self.raw.instrument_data();

        let mut group = ReferenceableParamGroup {
            id: COMMON_INSTRUMENT_PARAMS.to_string(),
            ..Default::default()
        };
        group.add_param(model.to_param());
        group.add_param(INSTRUMENT_SERIAL_NUMBER.with_value(&instrument.serial_number));

        let mut software = Software {
            id: self.software_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        };
        software.add_param(CUSTOM_SOFTWARE.with_value(&self.software_name));

        let mut method = ProcessingMethod {
            order: 0,
            software_reference: self.software_name.clone(),
            ..Default::default()
        };
        method.add_param(CONVERSION_TO_MZML.into());
        let mut data_processing = DataProcessing {
            id: self.data_processing_id(),
            ..Default::default()
        };
        data_processing.push(method);

        let run = MassSpectrometryRun::new(
            Some(id.clone()),
            Some(data_processing.id.clone()),
            Some(DEFAULT_INSTRUMENT_CONFIGURATION.to_string()),
            Some(SOURCE_FILE_ID.to_string()),
            self.raw.creation_date(),
        );

        Ok(MzMLMetadata {
            id,
            file_description: self.file_description()?,
            param_groups: vec![group],
            softwares: vec![software],
            instrument_configurations: self.instrument_configurations(state, model),
            data_processings: vec![data_processing],
            run,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::thermo::snapshot::{RawFileSnapshot, SnapshotRawFile};
    use crate::io::thermo::source::InstrumentData;
    use crate::io::thermo::spectrum::test::{ms1_scan, three_scan_run};
    use crate::params::ParamLike;

    fn write_snapshot(dir: &std::path::Path, snapshot: RawFileSnapshot) -> SnapshotRawFile {
        let path = dir.join("small.raw.json");
        snapshot.save(&path).unwrap();
        SnapshotRawFile::open_path(&path).unwrap()
    }

    #[test_log::test]
    fn test_build_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = three_scan_run();
        snapshot.instrument = InstrumentData {
            name: "Orbitrap Fusion Lumos".into(),
            serial_number: "FSN20000".into(),
            ..Default::default()
        };
        let raw = write_snapshot(dir.path(), snapshot);
        let mut state = RunState::new();
        let assembler = DocumentAssembler::new(&raw, "rawmzml");
        let metadata = assembler.build(&mut state).unwrap();

        assert_eq!(metadata.id, "small");
        assert_eq!(metadata.default_data_processing_id(), Some("rawmzmlProcessing"));
        let source = &metadata.file_description.source_files[0];
        assert_eq!(source.id, "RAW1");
        let checksum = source.get_param_by_accession("MS:1000569").unwrap();
        assert_eq!(checksum.value, checksum_file(raw.path()).unwrap());

        let group = &metadata.param_groups[0];
        assert_eq!(group.params[0].accession, Some(1002732));
        assert_eq!(group.params[1].value, "FSN20000");

        let configs = &metadata.instrument_configurations;
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].id, "IC1");
        assert_eq!(configs[1].id, "IC2");
        assert_eq!(
            configs[0].components[1].params[0].curie().as_deref(),
            Some("MS:1000079")
        );
        assert_eq!(configs[0].components[2].params[0].name(), "inductive detector");
        assert_eq!(configs[1].components[2].params[0].name(), "electron multiplier");
        assert_eq!(
            configs[1].components[0].params[0].curie().as_deref(),
            Some("MS:1000073")
        );
        assert_eq!(
            configs
                .iter()
                .map(|c| c.components.iter().map(|c| c.order).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            vec![vec![1, 2, 3], vec![1, 2, 3]]
        );

        // Analyzers seen later do not get their own configuration
        assert_eq!(state.mass_analyzers().count(), 2);
    }

    #[test]
    fn test_discovery_stops_at_msn() {
        let mut snapshot = three_scan_run();
        snapshot.scans[2].filter.mass_analyzer = MassAnalyzerType::TOFMS;
        let raw = SnapshotRawFile::new("small.raw.json".into(), snapshot);
        let mut state = RunState::new();
        let assembler = DocumentAssembler::new(&raw, DEFAULT_SOFTWARE_NAME);
        assert_eq!(assembler.discover_instrument_configurations(&mut state).unwrap(), 2);
        assert_eq!(state.mass_analyzers().count(), 2);
    }

    #[test]
    fn test_default_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = RawFileSnapshot {
            scans: vec![ms1_scan(1, 10.0, &[(100.0, 1.0)])],
            ..Default::default()
        };
        snapshot.run_header.first_spectrum = 1;
        snapshot.run_header.last_spectrum = 0;
        let raw = write_snapshot(dir.path(), snapshot);
        let mut state = RunState::new();
        state.fix_configurations();
        let metadata = DocumentAssembler::new(&raw, "rawmzml").build(&mut state).unwrap();
        let configs = &metadata.instrument_configurations;
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].id, "IC1");
        assert_eq!(configs[0].components[0].params[0].accession, Some(1000008));
        assert_eq!(configs[0].components[1].params[0].accession, Some(1000443));
        assert_eq!(
            metadata.param_groups[0].params[0].curie().as_deref(),
            Some("MS:1000483")
        );
    }
}
