//! A summary of a RAW run's acquisition metadata, written next to the
//! converted spectra as JSON or as `key=value` text.
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::io::thermo::{
    run_name, ActivationType, MSOrderType, RawFileAccess, RawFileError, ScanDataType, ScanTrailer,
    CHARGE_STATE,
};
use crate::params::ParamLike;

/// How the metadata summary is written, if at all
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    JSON,
    TXT,
    #[default]
    None,
}

impl MetadataFormat {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::JSON),
            1 => Some(Self::TXT),
            2 => Some(Self::None),
            _ => None,
        }
    }

    pub const fn extension(&self) -> Option<&'static str> {
        match self {
            Self::JSON => Some("json"),
            Self::TXT => Some("txt"),
            Self::None => None,
        }
    }

    /// `<output dir>/<run name>-metadata.<ext>`
    pub fn default_path(&self, output_directory: &Path, raw_path: &Path) -> Option<PathBuf> {
        self.extension().map(|ext| {
            output_directory.join(format!("{}-metadata.{ext}", run_name(raw_path)))
        })
    }
}

/// A controlled vocabulary term as written in the metadata summary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CVTerm {
    pub accession: String,
    pub cv_label: String,
    pub name: String,
    pub value: String,
}

impl CVTerm {
    pub fn new<V: ToString>(accession: &str, cv_label: &str, name: &str, value: V) -> Self {
        Self {
            accession: accession.to_string(),
            cv_label: cv_label.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunMetadata {
    pub file_properties: Vec<CVTerm>,
    pub instrument_properties: Vec<CVTerm>,
    pub ms_data: Vec<CVTerm>,
    pub scan_settings: Vec<CVTerm>,
    pub sample_data: Vec<CVTerm>,
}

fn fragmentation_term(activation: ActivationType) -> CVTerm {
    let label = match activation {
        ActivationType::CID => "CID",
        ActivationType::HCD => "HCD",
        ActivationType::ETD | ActivationType::NegativeElectronTransferDissociation => "ETD",
        ActivationType::ECD => {
            return CVTerm::new("MS:1000250", "MS", "electron capture dissociation", "ECD")
        }
        ActivationType::MultiPhotonDissociation => "MPD",
        other => {
            return CVTerm::new("MS:1000044", "MS", "dissociation method", format!("{other:?}"))
        }
    };
    let param = activation.to_param();
    CVTerm::new(
        &param.curie().unwrap_or_default(),
        "MS",
        param.name(),
        label,
    )
}

/// Running statistics over the scans of a run
#[derive(Debug, Clone)]
pub struct MetadataCollector {
    ms_orders: IndexMap<u8, usize>,
    time_range: Option<(f64, f64)>,
    precursor_mz_range: Option<(f64, f64)>,
    charge_range: Option<(i32, i32)>,
    fragmentation_types: IndexSet<CVTerm>,
    pub warnings: usize,
}

impl Default for MetadataCollector {
    fn default() -> Self {
        Self {
            ms_orders: IndexMap::new(),
            time_range: None,
            precursor_mz_range: None,
            charge_range: None,
            fragmentation_types: IndexSet::new(),
            warnings: 0,
        }
    }
}

fn extend_range<T: PartialOrd + Copy>(range: &mut Option<(T, T)>, value: T) {
    *range = match *range {
        None => Some((value, value)),
        Some((low, high)) => Some((
            if value < low { value } else { low },
            if value > high { value } else { high },
        )),
    }
}

impl MetadataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit every scan in the inclusive range
    pub fn collect<R: RawFileAccess>(
        &mut self,
        raw: &R,
        first_scan: i32,
        last_scan: i32,
    ) -> Result<(), RawFileError> {
        for scan_number in first_scan..=last_scan {
            let time = raw.retention_time(scan_number)?;
            let filter = raw.scan_filter(scan_number)?;
            *self.ms_orders.entry(filter.ms_order.ms_level()).or_default() += 1;
            extend_range(&mut self.time_range, time);

            if filter.ms_order != MSOrderType::Ms2 {
                continue;
            }
            let event = raw.scan_event(scan_number)?;
            match event.reaction(0) {
                Some(reaction) => {
                    self.fragmentation_types
                        .insert(fragmentation_term(reaction.activation_type));
                    if matches!(event.scan_data, ScanDataType::Centroid | ScanDataType::Profile) {
                        extend_range(&mut self.precursor_mz_range, reaction.precursor_mass);
                    }
                }
                None => {
                    log::warn!("No reaction found for scan {scan_number}");
                    self.warnings += 1;
                }
            }
            if matches!(event.scan_data, ScanDataType::Centroid | ScanDataType::Profile) {
                let trailer = ScanTrailer::new(raw.trailer_extra(scan_number)?.iter());
                if let Some(charge) = trailer.as_int(CHARGE_STATE) {
                    extend_range(&mut self.charge_range, charge);
                }
            }
        }
        Ok(())
    }

    pub fn spectrum_count(&self, ms_level: u8) -> usize {
        self.ms_orders.get(&ms_level).copied().unwrap_or_default()
    }

    /// Build the summary for `raw`, whose scans have already been collected
    pub fn summarize<R: RawFileAccess>(
        &self,
        raw: &R,
        first_scan: i32,
        last_scan: i32,
    ) -> RunMetadata {
        let mut metadata = RunMetadata::default();

        metadata.file_properties.push(CVTerm::new(
            "NCIT:C47922",
            "NCIT",
            "Pathname",
            raw.path().display(),
        ));
        if let Some(created) = raw.creation_date() {
            metadata.file_properties.push(CVTerm::new(
                "NCIT:C69199",
                "NCIT",
                "Content Creation Date",
                created.to_rfc3339(),
            ));
        }

        let instrument = raw.instrument_data();
        let props = &mut metadata.instrument_properties;
        props.push(CVTerm::new(
            "MS:1000494",
            "MS",
            "Thermo Scientific instrument model",
            &instrument.model,
        ));
        props.push(CVTerm::new("MS:1000496", "MS", "instrument attribute", &instrument.name));
        props.push(CVTerm::new(
            "MS:1000529",
            "MS",
            "instrument serial number",
            &instrument.serial_number,
        ));
        props.push(CVTerm::new(
            "NCIT:C111093",
            "NCIT",
            "Software Version",
            &instrument.software_version,
        ));
        if !instrument.hardware_version.is_empty() {
            props.push(CVTerm::new(
                "AFR:0001259",
                "AFO",
                "firmware version",
                &instrument.hardware_version,
            ));
        }

        let ms_data = &mut metadata.ms_data;
        for (level, accession) in [(1, "PRIDE:0000481"), (2, "PRIDE:0000482"), (3, "PRIDE:0000483")] {
            if let Some(count) = self.ms_orders.get(&level) {
                ms_data.push(CVTerm::new(
                    accession,
                    "PRIDE",
                    &format!("Number of MS{level} spectra"),
                    count,
                ));
            }
        }
        let (min_charge, max_charge) = self.charge_range.unwrap_or_default();
        let (min_time, max_time) = self.time_range.unwrap_or_default();
        let (min_mz, max_mz) = self.precursor_mz_range.unwrap_or_default();
        ms_data.push(CVTerm::new("PRIDE:0000472", "PRIDE", "MS min charge", min_charge));
        ms_data.push(CVTerm::new("PRIDE:0000473", "PRIDE", "MS max charge", max_charge));
        ms_data.push(CVTerm::new("PRIDE:0000474", "PRIDE", "MS min RT", min_time));
        ms_data.push(CVTerm::new("PRIDE:0000475", "PRIDE", "MS max RT", max_time));
        ms_data.push(CVTerm::new("PRIDE:0000476", "PRIDE", "MS min MZ", min_mz));
        ms_data.push(CVTerm::new("PRIDE:0000477", "PRIDE", "MS max MZ", max_mz));

        let header = raw.run_header();
        let settings = &mut metadata.scan_settings;
        settings.push(CVTerm::new("MS:1000016", "MS", "scan start time", header.start_time));
        settings.push(CVTerm::new(
            "MS:1000011",
            "MS",
            "mass resolution",
            header.mass_resolution,
        ));
        settings.push(CVTerm::new(
            "PRIDE:0000478",
            "PRIDE",
            "Number of scans",
            header.spectra_count,
        ));
        settings.push(CVTerm::new(
            "PRIDE:0000479",
            "PRIDE",
            "MS scan range",
            format!("{first_scan}:{last_scan}"),
        ));
        settings.push(CVTerm::new(
            "PRIDE:0000484",
            "PRIDE",
            "Retention time range",
            format!("{}:{}", header.start_time, header.end_time),
        ));
        settings.push(CVTerm::new(
            "PRIDE:0000485",
            "PRIDE",
            "Mz range",
            format!("{}:{}", header.low_mass, header.high_mass),
        ));
        settings.extend(self.fragmentation_types.iter().cloned());

        let sample = raw.sample_information();
        let data = &mut metadata.sample_data;
        let text_fields = [
            ("MS:1000002", "MS", "sample name", &sample.sample_name),
            ("MS:1000001", "MS", "sample number", &sample.sample_id),
            ("NCIT:C25284", "NCIT", "Type", &sample.sample_type),
            ("NCIT:C25393", "NCIT", "Comment", &sample.comment),
            ("NCIT:C41275", "NCIT", "Vial", &sample.vial),
        ];
        for (accession, cv, name, value) in text_fields {
            if !value.is_empty() && !(name == "Type" && value == "Unknown") {
                data.push(CVTerm::new(accession, cv, name, value));
            }
        }
        let numeric_fields = [
            ("MS:1000005", "MS", "sample volume", sample.sample_volume),
            ("AFR:0001577", "AFO", "injection volume setting", sample.injection_volume),
            ("NCIT:C43378", "NCIT", "Row", sample.row_number as f64),
            ("AFQ:0000178", "AFO", "dilution factor", sample.dilution_factor),
        ];
        for (accession, cv, name, value) in numeric_fields {
            if value != 0.0 {
                data.push(CVTerm::new(accession, cv, name, value));
            }
        }
        metadata
    }
}

/// Labels used for each term of the text summary
fn text_label(term: &CVTerm) -> &str {
    match term.name.as_str() {
        "Pathname" => "RAW file path",
        "Content Creation Date" => "Creation date",
        "instrument attribute" => "Instrument name",
        "firmware version" => "Firmware version",
        "scan start time" => "Scan start time",
        "MS scan range" => "Scan range",
        "Retention time range" => "Time range",
        "Mz range" => "Mass range",
        "sample name" => "Sample name",
        "sample number" => "Sample id",
        "Type" => "Sample type",
        "Comment" => "Sample comment",
        "Vial" => "Sample vial",
        "sample volume" => "Sample volume",
        "injection volume setting" => "Sample injection volume",
        "Row" => "Sample row number",
        "dilution factor" => "Sample dilution factor",
        name => name,
    }
}

impl RunMetadata {
    pub fn write_json<W: Write>(&self, writer: W) -> io::Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn write_text<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "#FileProperties")?;
        for term in self.file_properties.iter() {
            writeln!(writer, "{}={}", text_label(term), term.value)?;
        }

        writeln!(writer, "#InstrumentProperties")?;
        for term in self.instrument_properties.iter() {
            match term.name.as_str() {
                "Thermo Scientific instrument model" => writeln!(
                    writer,
                    "Instrument model=[{}, {}, {}, {}]",
                    term.cv_label, term.accession, term.name, term.value
                )?,
                "instrument serial number" => writeln!(
                    writer,
                    "Instrument serial number=[{}, {}, {}, {}]",
                    term.cv_label, term.accession, term.name, term.value
                )?,
                "Software Version" => writeln!(
                    writer,
                    "Software version=[{}, {}, {}, {}]",
                    term.cv_label, term.accession, term.name, term.value
                )?,
                _ => writeln!(writer, "{}={}", text_label(term), term.value)?,
            }
        }

        writeln!(writer, "#MsData")?;
        for term in self.ms_data.iter() {
            writeln!(writer, "{}={}", term.name, term.value)?;
        }

        writeln!(writer, "#ScanSettings")?;
        let mut fragmentation = Vec::new();
        for term in self.scan_settings.iter() {
            match term.accession.as_str() {
                "MS:1000011" => writeln!(
                    writer,
                    "Mass resolution=[{}, {}, {}, {}]",
                    term.cv_label, term.accession, term.name, term.value
                )?,
                "PRIDE:0000479" | "PRIDE:0000484" | "PRIDE:0000485" => writeln!(
                    writer,
                    "{}={}",
                    text_label(term),
                    term.value.replace(':', ";")
                )?,
                "MS:1000016" | "PRIDE:0000478" => {
                    writeln!(writer, "{}={}", text_label(term), term.value)?
                }
                _ => fragmentation.push(term.value.as_str()),
            }
        }
        writeln!(writer, "Fragmentation types={}", fragmentation.join(", "))?;

        writeln!(writer, "#SampleData")?;
        for term in self.sample_data.iter() {
            writeln!(writer, "{}={}", text_label(term), term.value)?;
        }
        Ok(())
    }

    pub fn write<W: Write>(&self, format: MetadataFormat, writer: W) -> io::Result<()> {
        match format {
            MetadataFormat::JSON => self.write_json(writer),
            MetadataFormat::TXT => self.write_text(writer),
            MetadataFormat::None => Ok(()),
        }
    }
}

/// Collect and write the metadata summary of a run, returning the number of
/// warnings raised while reading it
pub fn write_metadata<R: RawFileAccess, W: Write>(
    raw: &R,
    first_scan: i32,
    last_scan: i32,
    format: MetadataFormat,
    writer: W,
) -> Result<usize, RawFileError> {
    let mut collector = MetadataCollector::new();
    collector.collect(raw, first_scan, last_scan)?;
    let metadata = collector.summarize(raw, first_scan, last_scan);
    metadata.write(format, writer)?;
    Ok(collector.warnings)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::thermo::fixtures::{ms2_scan, three_scan_run};
    use crate::io::thermo::{InstrumentData, SampleInformation, SnapshotRawFile};

    fn raw_file() -> SnapshotRawFile {
        let mut snapshot = three_scan_run();
        snapshot.scans.push(ms2_scan(4, 700.0, 3, &[(200.0, 1.0)]));
        snapshot.instrument = InstrumentData {
            name: "Orbitrap Exploris 480".into(),
            model: "Orbitrap Exploris 480".into(),
            serial_number: "MA10000".into(),
            ..Default::default()
        };
        snapshot.sample = SampleInformation {
            sample_name: "HeLa".into(),
            sample_type: "Unknown".into(),
            sample_volume: 2.5,
            ..Default::default()
        };
        SnapshotRawFile::new("/data/small.raw.json".into(), snapshot)
    }

    #[test]
    fn test_collect() {
        let raw = raw_file();
        let mut collector = MetadataCollector::new();
        collector.collect(&raw, 1, 4).unwrap();
        assert_eq!(collector.spectrum_count(1), 2);
        assert_eq!(collector.spectrum_count(2), 2);
        assert_eq!(collector.spectrum_count(3), 0);
        assert_eq!(collector.charge_range, Some((2, 3)));
        assert_eq!(collector.precursor_mz_range, Some((500.0, 700.0)));
        assert_eq!(collector.fragmentation_types.len(), 1);
        assert_eq!(collector.warnings, 0);

        let metadata = collector.summarize(&raw, 1, 4);
        let ms2 = metadata
            .ms_data
            .iter()
            .find(|t| t.accession == "PRIDE:0000482")
            .unwrap();
        assert_eq!(ms2.value, "2");
        assert_eq!(metadata.sample_data.len(), 2);
        let cid = metadata.scan_settings.last().unwrap();
        assert_eq!(cid.accession, "MS:1000133");
        assert_eq!(cid.value, "CID");
    }

    #[test]
    fn test_json() {
        let raw = raw_file();
        let mut buffer = Vec::new();
        write_metadata(&raw, 1, 4, MetadataFormat::JSON, &mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        let files = value["FileProperties"].as_array().unwrap();
        assert_eq!(files[0]["accession"], "NCIT:C47922");
        assert_eq!(files[0]["cvLabel"], "NCIT");
        assert_eq!(files[0]["value"], "/data/small.raw.json");
        assert_eq!(value["InstrumentProperties"][2]["value"], "MA10000");
        assert!(value["MsData"].is_array());
        assert!(value["ScanSettings"].is_array());
        assert_eq!(value["SampleData"][0]["value"], "HeLa");
    }

    #[test]
    fn test_text() {
        let raw = raw_file();
        let mut buffer = Vec::new();
        write_metadata(&raw, 1, 4, MetadataFormat::TXT, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("#FileProperties\nRAW file path=/data/small.raw.json\n"));
        assert!(text.contains(
            "Instrument model=[MS, MS:1000494, Thermo Scientific instrument model, Orbitrap Exploris 480]\n"
        ));
        assert!(text.contains("Number of MS1 spectra=2\n"));
        assert!(text.contains("MS max charge=3\n"));
        assert!(text.contains("Scan range=1;4\n"));
        assert!(text.contains("Fragmentation types=CID\n"));
        assert!(text.contains("#SampleData\nSample name=HeLa\nSample volume=2.5\n"));
    }

    #[test]
    fn test_default_path() {
        let path = MetadataFormat::TXT.default_path(Path::new("/out"), Path::new("/in/run.raw"));
        assert_eq!(path, Some(PathBuf::from("/out/run-metadata.txt")));
        assert_eq!(MetadataFormat::None.default_path(Path::new("/out"), Path::new("a.raw")), None);
        assert_eq!(MetadataFormat::from_index(1), Some(MetadataFormat::TXT));
    }
}
