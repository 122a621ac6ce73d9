//! Turn one scan of a RAW file into a [`SpectrumRecord`].
//!
//! [`RunState`] carries what must be remembered between scans of the same run:
//! the instrument configurations discovered so far and the most recent scans
//! that later scans may name as their precursor. One state belongs to exactly
//! one conversion.
use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;

use crate::params::{ControlledVocabulary, Param, ParamCow, ParamDescribed, Unit};
use crate::spectrum::{
    Acquisition, Activation, ArrayType, BinaryArrayList, BinaryCompressionType, DataArray,
    IsolationWindow, Precursor, ScanEvent, ScanPolarity, ScanWindow, SelectedIon,
    SignalContinuity, SpectrumDescription, SpectrumRecord,
};

use super::source::{
    ActivationType, IonizationModeType, MassAnalyzerType, PolarityType, RawFileAccess,
    RawFileError, RawScanEvent, Reaction, ScanDataType, ScanFilter,
};
use super::trailer::{
    isolation_width_key, ScanTrailer, CHARGE_STATE, ION_INJECTION_TIME, MASTER_INDEX,
    MASTER_SCAN_NUMBER, MONOISOTOPIC_MZ,
};

const CV: ControlledVocabulary = ControlledVocabulary::MS;

pub const MS_LEVEL: ParamCow = CV.const_param_ident("ms level", 1000511);
pub const MS1_SPECTRUM: ParamCow = CV.const_param_ident("MS1 spectrum", 1000579);
pub const MSN_SPECTRUM: ParamCow = CV.const_param_ident("MSn spectrum", 1000580);
pub const TOTAL_ION_CURRENT: ParamCow = CV.const_param_ident("total ion current", 1000285);
pub const BASE_PEAK_MZ: ParamCow = CV.const_param_ident_unit("base peak m/z", 1000504, Unit::MZ);
pub const BASE_PEAK_INTENSITY: ParamCow =
    CV.const_param_ident_unit("base peak intensity", 1000505, Unit::DetectorCounts);
pub const LOWEST_OBSERVED_MZ: ParamCow =
    CV.const_param_ident_unit("lowest observed m/z", 1000528, Unit::MZ);
pub const HIGHEST_OBSERVED_MZ: ParamCow =
    CV.const_param_ident_unit("highest observed m/z", 1000527, Unit::MZ);
pub const SUPPLEMENTAL_COLLISION_ENERGY: ParamCow =
    CV.const_param_ident_unit("supplemental collision energy", 1002680, Unit::Electronvolt);
pub const SUPPLEMENTAL_BEAM_TYPE_CID: ParamCow =
    CV.const_param_ident("supplemental beam-type collision-induced dissociation", 1002678);

pub const MONOISOTOPIC_MZ_USER_PARAM: &str = "[Thermo Trailer Extra]Monoisotopic M/Z:";

/// Differences smaller than this are treated as zero
pub const ZERO_DELTA: f64 = 1e-4;

/// The native ID of a scan of the first MS controller
#[inline(always)]
pub fn native_id(scan_number: i32) -> String {
    format!("controllerType=0 controllerNumber=1 scan={scan_number}")
}

impl From<PolarityType> for ScanPolarity {
    fn from(value: PolarityType) -> Self {
        match value {
            PolarityType::Positive => ScanPolarity::Positive,
            PolarityType::Negative => ScanPolarity::Negative,
            PolarityType::Any => ScanPolarity::Unknown,
        }
    }
}

/// Choose the m/z reported as the selected ion.
///
/// The reaction's precursor mass is used unless the instrument reported a
/// distinct monoisotopic m/z that lies inside the isolation window. Narrow
/// (at most 2 m/z) or unknown isolation widths are widened to
/// `[precursor - 3.0, precursor + 2.5]`.
pub fn calculate_selected_ion_mz(
    precursor_mass: f64,
    monoisotopic_mz: Option<f64>,
    isolation_width: Option<f64>,
) -> f64 {
    let monoisotopic_mz = match monoisotopic_mz {
        Some(mz) if mz > ZERO_DELTA && (precursor_mass - mz).abs() > ZERO_DELTA => mz,
        _ => return precursor_mass,
    };

    let (lower, upper) = match isolation_width {
        Some(width) if width > 2.0 => {
            let half = width / 2.0;
            (precursor_mass - half, precursor_mass + half)
        }
        _ => (precursor_mass - 3.0, precursor_mass + 2.5),
    };

    if monoisotopic_mz >= lower && monoisotopic_mz <= upper {
        monoisotopic_mz
    } else {
        log::debug!(
            "Monoisotopic m/z {monoisotopic_mz} lies outside of the isolation window around {precursor_mass}"
        );
        precursor_mass
    }
}

/// The isolation width of an MSn scan, from its trailer or else from its
/// reaction. Widths below [`ZERO_DELTA`] count as unknown.
pub fn isolation_width(trailer: &ScanTrailer, ms_level: u8, reaction: &Reaction) -> Option<f64> {
    trailer
        .as_double(&isolation_width_key(ms_level))
        .filter(|w| *w >= ZERO_DELTA)
        .or(Some(reaction.isolation_width).filter(|w| *w >= ZERO_DELTA))
}

/// How peak data is chosen and encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumAssemblyOptions {
    pub compression: BinaryCompressionType,
    /// MS levels for which vendor centroids are not used
    pub no_peak_picking: BTreeSet<u8>,
    pub noise_data: bool,
    /// Centroid profile data that has no centroid stream
    pub exclude_profile: bool,
}

impl Default for SpectrumAssemblyOptions {
    fn default() -> Self {
        Self {
            compression: BinaryCompressionType::Zlib,
            no_peak_picking: BTreeSet::new(),
            noise_data: false,
            exclude_profile: false,
        }
    }
}

/// Per-run state shared by every scan of one conversion
#[derive(Debug, Clone)]
pub struct RunState {
    mass_analyzers: IndexMap<MassAnalyzerType, String>,
    ionization_types: IndexSet<IonizationModeType>,
    precursor_scans: IndexMap<String, i32>,
    last_ms1_scan: Option<i32>,
    precursor_chain: Regex,
    configurations_fixed: bool,
    pub warnings: usize,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            mass_analyzers: IndexMap::new(),
            ionization_types: IndexSet::new(),
            precursor_scans: IndexMap::new(),
            last_ms1_scan: None,
            precursor_chain: Regex::new(r"ms\d+ (.+?) \[").unwrap(),
            configurations_fixed: false,
            warnings: 0,
        }
    }

    pub fn mass_analyzers(&self) -> impl Iterator<Item = (&MassAnalyzerType, &str)> {
        self.mass_analyzers.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn ionization_types(&self) -> impl Iterator<Item = &IonizationModeType> {
        self.ionization_types.iter()
    }

    pub fn has_configurations(&self) -> bool {
        !self.mass_analyzers.is_empty()
    }

    /// Stop registering new analyzers and ionization modes, once the
    /// instrument configuration list has been written
    pub fn fix_configurations(&mut self) {
        self.configurations_fixed = true;
    }

    /// Record the analyzer and ionization mode of a scan, unless the
    /// configurations are fixed
    pub fn observe_filter(&mut self, filter: &ScanFilter) {
        if self.configurations_fixed {
            return;
        }
        if !self.mass_analyzers.contains_key(&filter.mass_analyzer) {
            let id = format!("IC{}", self.mass_analyzers.len() + 1);
            log::debug!("Registered mass analyzer {:?} as {id}", filter.mass_analyzer);
            self.mass_analyzers.insert(filter.mass_analyzer, id);
        }
        self.ionization_types.insert(filter.ionization_mode);
    }

    /// The instrument configuration a scan was acquired with. Analyzers first
    /// seen after the configurations were fixed use the default configuration.
    pub fn instrument_configuration_for(&mut self, filter: &ScanFilter) -> String {
        self.observe_filter(filter);
        match self.mass_analyzers.get(&filter.mass_analyzer) {
            Some(id) => id.clone(),
            None => {
                log::debug!(
                    "Mass analyzer {:?} was not seen before the instrument configurations were written",
                    filter.mass_analyzer
                );
                "IC1".to_string()
            }
        }
    }

    fn chain_of<'a>(&self, filter_string: &'a str) -> Option<&'a str> {
        self.precursor_chain
            .captures(filter_string)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Remember a scan so later scans can reference it as their precursor
    pub fn record_scan(&mut self, scan_number: i32, ms_level: u8, filter_string: &str) {
        if ms_level <= 1 {
            self.last_ms1_scan = Some(scan_number);
            self.precursor_scans.insert(String::new(), scan_number);
        } else if let Some(chain) = self.chain_of(filter_string) {
            let chain = chain.to_string();
            self.precursor_scans.shift_remove(&chain);
            self.precursor_scans.insert(chain, scan_number);
        }
    }

    /// Find the scan number of the precursor scan of an MSn scan.
    pub fn resolve_precursor_scan(
        &self,
        ms_level: u8,
        trailer: &ScanTrailer,
        filter_string: &str,
    ) -> Option<i32> {
        if let Some(master) = trailer
            .as_positive_int(MASTER_INDEX)
            .or_else(|| trailer.as_positive_int(MASTER_SCAN_NUMBER))
        {
            return Some(master);
        }

        match self.chain_of(filter_string) {
            Some(chain) => {
                let parts: Vec<&str> = chain.split(' ').collect();
                let mass_of = |part: &str| part.split('@').next().unwrap_or_default().to_string();
                let last_mass = parts.last().map(|p| mass_of(p)).unwrap_or_default();
                let mut last = parts.len();
                while last > 0 && mass_of(parts[last - 1]) == last_mass {
                    last -= 1;
                }
                let parent = parts[..last].join(" ");
                self.precursor_scans.get(&parent).copied()
            }
            None if ms_level == 2 => self.last_ms1_scan,
            None => None,
        }
    }
}

/// The peaks chosen for a spectrum and how they were obtained
#[derive(Debug, Default, Clone, PartialEq)]
struct PeakData {
    masses: Vec<f64>,
    intensities: Vec<f64>,
    continuity: SignalContinuity,
    base_peak: Option<(f64, f64)>,
    from_centroid_stream: bool,
}

/// Builds [`SpectrumRecord`]s from the scans of one RAW file
pub struct SpectrumAssembler<'a, R: RawFileAccess> {
    raw: &'a R,
    options: &'a SpectrumAssemblyOptions,
}

impl<'a, R: RawFileAccess> SpectrumAssembler<'a, R> {
    pub fn new(raw: &'a R, options: &'a SpectrumAssemblyOptions) -> Self {
        Self { raw, options }
    }

    pub fn options(&self) -> &SpectrumAssemblyOptions {
        self.options
    }

    fn read_trailer(&self, scan_number: i32, state: &mut RunState) -> ScanTrailer {
        match self.raw.trailer_extra(scan_number) {
            Ok(entries) => ScanTrailer::new(entries.iter()),
            Err(e) => {
                log::warn!("Cannot load trailer information for scan {scan_number}: {e}");
                state.warnings += 1;
                ScanTrailer::default()
            }
        }
    }

    fn select_peaks(
        &self,
        scan_number: i32,
        ms_level: u8,
        event: &RawScanEvent,
        base_peak_from_statistics: (f64, f64),
        is_centroid_scan: bool,
    ) -> Result<PeakData, RawFileError> {
        let pick = !self.options.no_peak_picking.contains(&ms_level);
        let centroids = self.raw.centroid_stream(scan_number)?;

        if !centroids.is_empty() && (event.scan_data == ScanDataType::Centroid || pick) {
            let base_peak = centroids.base_peak();
            return Ok(PeakData {
                masses: centroids.masses,
                intensities: centroids.intensities,
                continuity: SignalContinuity::Centroid,
                base_peak,
                from_centroid_stream: true,
            });
        }

        let (masses, intensities, continuity) =
            if event.scan_data == ScanDataType::Profile && pick && self.options.exclude_profile {
                let picked = self.raw.centroid_profile(scan_number)?;
                (picked.masses, picked.intensities, SignalContinuity::Centroid)
            } else {
                let segmented = self.raw.segmented_scan(scan_number)?;
                let continuity = match event.scan_data {
                    ScanDataType::Centroid => SignalContinuity::Centroid,
                    ScanDataType::Profile => SignalContinuity::Profile,
                    ScanDataType::Any if is_centroid_scan => SignalContinuity::Centroid,
                    ScanDataType::Any => SignalContinuity::Profile,
                };
                (segmented.positions, segmented.intensities, continuity)
            };

        Ok(PeakData {
            masses,
            intensities,
            continuity,
            base_peak: Some(base_peak_from_statistics),
            from_centroid_stream: false,
        })
    }

    fn build_activation(&self, event: &RawScanEvent, ms_level: u8) -> Activation {
        let mut activation = Activation::default();
        if let Some(reaction) = event.reaction(ms_level as usize - 2) {
            if reaction.collision_energy_valid {
                activation.energy = Some(reaction.collision_energy);
            }
            activation.add_param(reaction.activation_type.to_param());
        }

        if event.supplemental_activation {
            if let Some(reaction) = event.reaction(ms_level as usize - 1) {
                if reaction.collision_energy_valid {
                    activation.add_param(
                        SUPPLEMENTAL_COLLISION_ENERGY.with_value(reaction.collision_energy),
                    );
                }
                if reaction.activation_type == ActivationType::HCD {
                    activation.add_param(SUPPLEMENTAL_BEAM_TYPE_CID.into());
                }
                activation.add_param(reaction.activation_type.to_param());
            }
        }
        activation
    }

    fn build_precursor(
        &self,
        scan_number: i32,
        ms_level: u8,
        event: &RawScanEvent,
        trailer: &ScanTrailer,
        state: &mut RunState,
    ) -> Precursor {
        let precursor_scan = state.resolve_precursor_scan(ms_level, trailer, &event.filter_string);
        if precursor_scan.is_none() {
            log::warn!("Failed to find the precursor scan of scan {scan_number}");
            state.warnings += 1;
        }

        let charge = trailer.as_positive_int(CHARGE_STATE);
        let monoisotopic_mz = trailer.as_double(MONOISOTOPIC_MZ);

        let mut precursor = Precursor {
            precursor_id: precursor_scan.map(native_id),
            ion: SelectedIon {
                charge,
                ..Default::default()
            },
            activation: self.build_activation(event, ms_level),
            ..Default::default()
        };

        match event.reaction(ms_level as usize - 2) {
            Some(reaction) => {
                let width = isolation_width(trailer, ms_level, reaction);
                let selected_ion_mz =
                    calculate_selected_ion_mz(reaction.precursor_mass, monoisotopic_mz, width);
                precursor.ion.mz = Some(selected_ion_mz);
                precursor.isolation_window = IsolationWindow::from_width(
                    Some(reaction.precursor_mass),
                    width,
                    reaction.isolation_width_offset,
                );
            }
            None => {
                log::warn!(
                    "Scan {scan_number} is an MS{ms_level} scan but has no reaction {}",
                    ms_level - 2
                );
                state.warnings += 1;
            }
        }

        precursor
    }

    /// Assemble the spectrum for `scan_number`, written at position `index`.
    pub fn assemble(
        &self,
        scan_number: i32,
        index: usize,
        state: &mut RunState,
    ) -> Result<SpectrumRecord, RawFileError> {
        let statistics = self.raw.scan_statistics(scan_number)?;
        let filter = self.raw.scan_filter(scan_number)?;
        let event = self.raw.scan_event(scan_number)?;
        let retention_time = self.raw.retention_time(scan_number)?;
        let trailer = self.read_trailer(scan_number, state);

        let ms_level = filter.ms_order.ms_level();
        let configuration_id = state.instrument_configuration_for(&filter);

        let mut description = SpectrumDescription {
            id: native_id(scan_number),
            index,
            scan_number,
            ms_level,
            polarity: filter.polarity.into(),
            ..Default::default()
        };

        if ms_level > 1 {
            description.precursor =
                Some(self.build_precursor(scan_number, ms_level, &event, &trailer, state));
        }
        state.record_scan(scan_number, ms_level, &event.filter_string);

        let peaks = self.select_peaks(
            scan_number,
            ms_level,
            &event,
            (statistics.base_peak_mass, statistics.base_peak_intensity),
            statistics.is_centroid_scan,
        )?;
        description.signal_continuity = peaks.continuity;

        description.add_param(MS_LEVEL.with_value(ms_level));
        description.add_param(if ms_level > 1 { MSN_SPECTRUM } else { MS1_SPECTRUM }.into());
        if let Some(param) = description.polarity.to_param() {
            description.add_param(param.into());
        }
        if let Some(param) = description.signal_continuity.to_param() {
            description.add_param(param.into());
        }
        description.add_param(TOTAL_ION_CURRENT.with_value(statistics.tic));
        if let (Some(first), Some(last)) = (peaks.masses.first(), peaks.masses.last()) {
            if let Some((base_peak_mz, base_peak_intensity)) = peaks.base_peak {
                description.add_param(BASE_PEAK_MZ.with_value(base_peak_mz));
                description.add_param(BASE_PEAK_INTENSITY.with_value(base_peak_intensity));
            }
            description.add_param(LOWEST_OBSERVED_MZ.with_value(first));
            description.add_param(HIGHEST_OBSERVED_MZ.with_value(last));
        }

        let mut scan_event = ScanEvent {
            start_time: retention_time,
            filter_string: event.filter_string.clone(),
            injection_time: trailer.as_double(ION_INJECTION_TIME),
            scan_windows: vec![ScanWindow {
                lower_bound: statistics.low_mass,
                upper_bound: statistics.high_mass,
            }],
            instrument_configuration_id: configuration_id,
            params: Vec::new(),
        };
        if let Some(mz) = trailer.as_double(MONOISOTOPIC_MZ) {
            scan_event.add_param(
                Param::new_key_value(MONOISOTOPIC_MZ_USER_PARAM, mz).with_value_type("xsd:float"),
            );
        }
        description.acquisition = Acquisition {
            scans: vec![scan_event],
            params: Vec::new(),
        };

        let mut arrays = BinaryArrayList::new();
        let compression = self.options.compression;
        arrays.add(DataArray::new(ArrayType::MZArray, peaks.masses, compression));
        arrays.add(DataArray::new(
            ArrayType::IntensityArray,
            peaks.intensities,
            compression,
        ));

        if self.options.noise_data && peaks.from_centroid_stream {
            let noise = self.raw.noise_data(scan_number)?;
            if !noise.is_empty() {
                arrays.add(DataArray::new(
                    ArrayType::SampledNoiseMZArray,
                    noise.iter().map(|p| p.mass).collect(),
                    compression,
                ));
                arrays.add(DataArray::new(
                    ArrayType::SampledNoiseIntensityArray,
                    noise.iter().map(|p| p.noise).collect(),
                    compression,
                ));
                arrays.add(DataArray::new(
                    ArrayType::SampledNoiseBaselineArray,
                    noise.iter().map(|p| p.baseline).collect(),
                    compression,
                ));
            }
        }

        log::debug!(
            "Assembled scan {scan_number} (MS{ms_level}, {} peaks)",
            arrays.default_array_length()
        );
        Ok(SpectrumRecord::new(description, arrays))
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::io::thermo::snapshot::{RawFileSnapshot, ScanSnapshot, SnapshotRawFile};
    use crate::io::thermo::source::{
        CentroidStream, MSOrderType, NoisePacket, Reaction, ScanStatistics, SegmentedScan,
        TrailerEntry,
    };
    use crate::params::ParamLike;

    pub(crate) fn ms1_scan(scan_number: i32, tic: f64, peaks: &[(f64, f64)]) -> ScanSnapshot {
        ScanSnapshot {
            scan_number,
            retention_time: scan_number as f64 * 0.1,
            statistics: ScanStatistics {
                tic,
                base_peak_mass: peaks.first().map(|p| p.0).unwrap_or_default(),
                base_peak_intensity: peaks.first().map(|p| p.1).unwrap_or_default(),
                low_mass: 100.0,
                high_mass: 2000.0,
                is_centroid_scan: true,
            },
            filter: ScanFilter {
                ms_order: MSOrderType::Ms,
                polarity: PolarityType::Positive,
                mass_analyzer: MassAnalyzerType::FTMS,
                ionization_mode: IonizationModeType::ElectroSpray,
            },
            event: RawScanEvent {
                filter_string: "FTMS + p ESI Full ms [100.00-2000.00]".into(),
                scan_data: ScanDataType::Centroid,
                ..Default::default()
            },
            centroids: CentroidStream {
                masses: peaks.iter().map(|p| p.0).collect(),
                intensities: peaks.iter().map(|p| p.1).collect(),
                charges: vec![0.0; peaks.len()],
            },
            ..Default::default()
        }
    }

    pub(crate) fn ms2_scan(
        scan_number: i32,
        precursor_mass: f64,
        charge: i32,
        peaks: &[(f64, f64)],
    ) -> ScanSnapshot {
        let mut scan = ms1_scan(scan_number, 200.0, peaks);
        scan.filter.ms_order = MSOrderType::Ms2;
        scan.filter.mass_analyzer = MassAnalyzerType::ITMS;
        scan.event.filter_string =
            format!("ITMS + c ESI d w Full ms2 {precursor_mass:.2}@cid35.00 [50.00-1000.00]");
        scan.event.reactions = vec![Reaction {
            precursor_mass,
            collision_energy: 35.0,
            collision_energy_valid: true,
            isolation_width: 2.0,
            isolation_width_offset: 0.0,
            activation_type: ActivationType::CID,
        }];
        scan.trailer = vec![TrailerEntry::new(CHARGE_STATE, charge.to_string())];
        scan
    }

    pub(crate) fn three_scan_run() -> RawFileSnapshot {
        RawFileSnapshot {
            scans: vec![
                ms1_scan(1, 1000.0, &[(300.0, 10.0), (500.0, 100.0), (700.0, 20.0)]),
                ms2_scan(2, 500.0, 2, &[(150.0, 5.0), (250.0, 7.0)]),
                ms1_scan(3, 0.0, &[]),
            ],
            ..Default::default()
        }
    }

    fn assemble_all(
        raw: &SnapshotRawFile,
        options: &SpectrumAssemblyOptions,
    ) -> (Vec<SpectrumRecord>, RunState) {
        let assembler = SpectrumAssembler::new(raw, options);
        let mut state = RunState::new();
        let header = raw.run_header().clone();
        let records = (header.first_spectrum..=header.last_spectrum)
            .enumerate()
            .map(|(i, n)| assembler.assemble(n, i, &mut state).unwrap())
            .collect();
        (records, state)
    }

    #[test]
    fn test_selected_ion_mz() {
        assert_eq!(calculate_selected_ion_mz(500.0, Some(499.2), Some(1.0)), 499.2);
        assert_eq!(calculate_selected_ion_mz(500.0, Some(600.0), Some(1.0)), 500.0);
        assert_eq!(calculate_selected_ion_mz(500.0, None, Some(1.0)), 500.0);
        assert_eq!(calculate_selected_ion_mz(500.0, Some(0.0), None), 500.0);
        assert_eq!(calculate_selected_ion_mz(500.0, Some(497.5), None), 497.5);
        assert_eq!(calculate_selected_ion_mz(500.0, Some(496.9), None), 500.0);
        assert_eq!(calculate_selected_ion_mz(500.0, Some(502.6), Some(2.0)), 500.0);
        // Wide windows are taken as reported
        assert_eq!(calculate_selected_ion_mz(500.0, Some(503.0), Some(8.0)), 503.0);
        assert_eq!(calculate_selected_ion_mz(500.0, Some(497.0), Some(4.0)), 500.0);
    }

    #[test_log::test]
    fn test_precursor_presence() {
        let mut snapshot = RawFileSnapshot::default();
        for i in 0..6 {
            let n = i + 1;
            snapshot.scans.push(if i % 2 == 0 {
                ms1_scan(n, 100.0, &[(400.0, 1.0)])
            } else {
                ms2_scan(n, 400.0, 0, &[(200.0, 1.0)])
            });
        }
        let raw = SnapshotRawFile::new("alt.raw.json".into(), snapshot);
        let (records, state) = assemble_all(&raw, &SpectrumAssemblyOptions::default());
        for record in records.iter() {
            match record.ms_level() {
                1 => assert!(record.precursor().is_none()),
                _ => {
                    let precursor = record.precursor().unwrap();
                    let expected = native_id(record.description.scan_number - 1);
                    assert_eq!(precursor.precursor_id.as_deref(), Some(expected.as_str()));
                    // Zero charge is not reported
                    assert!(precursor.ion.charge.is_none());
                }
            }
        }
        assert_eq!(state.warnings, 0);
        assert_eq!(
            state.mass_analyzers().map(|(_, id)| id).collect::<Vec<_>>(),
            vec!["IC1", "IC2"]
        );
    }

    #[test]
    fn test_three_scan_records() {
        let raw = SnapshotRawFile::new("small.raw.json".into(), three_scan_run());
        let (records, _) = assemble_all(&raw, &SpectrumAssemblyOptions::default());
        assert_eq!(records.len(), 3);

        let ms1 = &records[0];
        assert_eq!(ms1.id(), "controllerType=0 controllerNumber=1 scan=1");
        assert_eq!(ms1.default_array_length(), 3);
        let names: Vec<&str> = ms1.description.params.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "ms level",
                "MS1 spectrum",
                "positive scan",
                "centroid spectrum",
                "total ion current",
                "base peak m/z",
                "base peak intensity",
                "lowest observed m/z",
                "highest observed m/z"
            ]
        );
        assert_eq!(
            ms1.description.get_param_by_name("base peak m/z").unwrap().value,
            "500"
        );
        assert_eq!(
            ms1.description.get_param_by_name("total ion current").unwrap().value,
            "1000"
        );

        let ms2 = &records[1];
        let precursor = ms2.precursor().unwrap();
        assert_eq!(precursor.precursor_id.as_deref(), Some(ms1.id()));
        assert_eq!(precursor.ion.mz, Some(500.0));
        assert_eq!(precursor.ion.charge, Some(2));
        assert_eq!(precursor.isolation_window.lower_offset, Some(1.0));
        assert_eq!(precursor.activation.energy, Some(35.0));
        assert_eq!(precursor.activation.params[0].accession, Some(1000133));
        assert_eq!(
            ms2.description.acquisition.first_scan().unwrap().instrument_configuration_id,
            "IC2"
        );

        let empty = &records[2];
        assert_eq!(empty.default_array_length(), 0);
        assert!(empty.arrays.is_empty());
        assert!(empty.description.get_param_by_name("base peak m/z").is_none());
        assert!(empty.description.get_param_by_name("total ion current").is_some());
    }

    #[test]
    fn test_centroid_vs_profile() {
        let mut profile = ms1_scan(1, 50.0, &[]);
        profile.event.scan_data = ScanDataType::Profile;
        profile.statistics.is_centroid_scan = false;
        profile.segmented = SegmentedScan {
            positions: vec![100.0, 100.1, 100.2, 100.3, 100.4],
            intensities: vec![0.0, 4.0, 9.0, 4.0, 0.0],
        };
        let mut snapshot = RawFileSnapshot {
            scans: vec![profile],
            ..Default::default()
        };
        let raw = SnapshotRawFile::new("profile.raw.json".into(), snapshot.clone());
        let (records, _) = assemble_all(&raw, &SpectrumAssemblyOptions::default());
        assert_eq!(records[0].signal_continuity(), SignalContinuity::Profile);
        assert_eq!(records[0].default_array_length(), 5);
        assert!(records[0]
            .description
            .get_param_by_accession("MS:1000128")
            .is_some());

        let options = SpectrumAssemblyOptions {
            exclude_profile: true,
            ..Default::default()
        };
        let (records, _) = assemble_all(&raw, &options);
        assert_eq!(records[0].signal_continuity(), SignalContinuity::Centroid);
        assert_eq!(records[0].default_array_length(), 1);

        // A centroid stream wins over profile data when peak picking is on
        snapshot.scans[0].centroids = CentroidStream {
            masses: vec![100.2],
            intensities: vec![9.0],
            charges: vec![],
        };
        snapshot.scans[0].noise = vec![NoisePacket {
            mass: 100.0,
            noise: 1.0,
            baseline: 0.5,
        }];
        let raw = SnapshotRawFile::new("profile.raw.json".into(), snapshot);
        let options = SpectrumAssemblyOptions {
            noise_data: true,
            ..Default::default()
        };
        let (records, _) = assemble_all(&raw, &options);
        assert_eq!(records[0].signal_continuity(), SignalContinuity::Centroid);
        assert_eq!(records[0].mzs(), &[100.2]);
        assert_eq!(records[0].arrays.len(), 5);
        assert!(records[0]
            .description
            .get_param_by_accession("MS:1000127")
            .is_some());

        let options = SpectrumAssemblyOptions {
            no_peak_picking: [1].into_iter().collect(),
            ..Default::default()
        };
        let (records, _) = assemble_all(&raw, &options);
        assert_eq!(records[0].signal_continuity(), SignalContinuity::Profile);
        assert_eq!(records[0].default_array_length(), 5);
    }

    #[test_log::test]
    fn test_missing_reaction() {
        let mut snapshot = three_scan_run();
        snapshot.scans[1].event.reactions.clear();
        let raw = SnapshotRawFile::new("noreaction.raw.json".into(), snapshot);
        let (records, state) = assemble_all(&raw, &SpectrumAssemblyOptions::default());
        let precursor = records[1].precursor().unwrap();
        assert!(precursor.ion.mz.is_none());
        assert!(precursor.isolation_window.target.is_none());
        assert!(precursor.activation.params.is_empty());
        assert_eq!(precursor.ion.charge, Some(2));
        assert_eq!(state.warnings, 1);
    }

    #[test]
    fn test_supplemental_activation_and_isolation() {
        let mut snapshot = three_scan_run();
        let scan = &mut snapshot.scans[1];
        scan.event.supplemental_activation = true;
        scan.event.reactions.push(Reaction {
            precursor_mass: 500.0,
            collision_energy: 20.0,
            collision_energy_valid: true,
            activation_type: ActivationType::HCD,
            ..Default::default()
        });
        scan.event.reactions[0].activation_type = ActivationType::ETD;
        scan.event.reactions[0].collision_energy_valid = false;
        scan.event.reactions[0].isolation_width_offset = 0.25;
        scan.trailer.push(TrailerEntry::new("MS2 Isolation Width:", "3.0"));
        scan.trailer.push(TrailerEntry::new(MONOISOTOPIC_MZ, "499.2"));
        let raw = SnapshotRawFile::new("supp.raw.json".into(), snapshot);
        let (records, _) = assemble_all(&raw, &SpectrumAssemblyOptions::default());

        let precursor = records[1].precursor().unwrap();
        assert!(precursor.activation.energy.is_none());
        let accessions: Vec<_> = precursor
            .activation
            .params
            .iter()
            .map(|p| p.curie().unwrap_or_default())
            .collect();
        assert_eq!(
            accessions,
            vec!["MS:1000598", "MS:1002680", "MS:1002678", "MS:1000422"]
        );
        assert_eq!(precursor.ion.mz, Some(499.2));
        assert_eq!(precursor.isolation_window.target, Some(500.0));
        assert_eq!(precursor.isolation_window.upper_offset, Some(1.75));
        assert_eq!(precursor.isolation_window.lower_offset, Some(1.25));

        let scan = records[1].description.acquisition.first_scan().unwrap();
        let user_param = scan.get_param_by_name(MONOISOTOPIC_MZ_USER_PARAM).unwrap();
        assert_eq!(user_param.value_type(), Some("xsd:float"));
    }

    #[test]
    fn test_isolation_target_is_precursor_mass() {
        let mut snapshot = three_scan_run();
        let scan = &mut snapshot.scans[1];
        scan.trailer.push(TrailerEntry::new("MS2 Isolation Width:", "3.0"));
        scan.trailer.push(TrailerEntry::new(MONOISOTOPIC_MZ, "499.2"));
        let raw = SnapshotRawFile::new("isolation.raw.json".into(), snapshot);
        let (records, _) = assemble_all(&raw, &SpectrumAssemblyOptions::default());

        let precursor = records[1].precursor().unwrap();
        assert_eq!(precursor.ion.mz, Some(499.2));
        let window = &precursor.isolation_window;
        assert_eq!(window.target, Some(500.0));
        assert_eq!(window.lower_offset, Some(1.5));
        assert_eq!(window.upper_offset, Some(1.5));
    }

    #[test]
    fn test_msn_precursor_chain() {
        let mut state = RunState::new();
        let trailer = ScanTrailer::default();
        state.record_scan(1, 1, "FTMS + p NSI Full ms [350.00-1500.00]");
        let ms2 = "FTMS + c NSI d Full ms2 500.00@cid35.00 [100.00-1000.00]";
        assert_eq!(state.resolve_precursor_scan(2, &trailer, ms2), Some(1));
        state.record_scan(2, 2, ms2);
        state.record_scan(3, 2, "FTMS + c NSI d Full ms2 600.00@cid35.00 [100.00-1000.00]");

        let ms3 = "ITMS + c NSI d Full ms3 500.00@cid35.00 300.00@hcd40.00 [80.00-600.00]";
        assert_eq!(state.resolve_precursor_scan(3, &trailer, ms3), Some(2));

        // Supplemental activations repeat the precursor mass
        let supplemental = "FTMS + c NSI d sa Full ms2 600.00@etd50.00 600.00@hcd20.00 [100.00-1000.00]";
        assert_eq!(state.resolve_precursor_scan(2, &trailer, supplemental), Some(1));

        let unknown = "ITMS + c NSI d Full ms3 700.00@cid35.00 300.00@hcd40.00 [80.00-600.00]";
        assert_eq!(state.resolve_precursor_scan(3, &trailer, unknown), None);

        let master = ScanTrailer::new([TrailerEntry::new(MASTER_INDEX, "42")].iter());
        assert_eq!(state.resolve_precursor_scan(3, &master, unknown), Some(42));
    }

    #[test]
    fn test_fixed_configurations() {
        let mut state = RunState::new();
        let ft = ScanFilter {
            mass_analyzer: MassAnalyzerType::FTMS,
            ..Default::default()
        };
        let it = ScanFilter {
            mass_analyzer: MassAnalyzerType::ITMS,
            ..Default::default()
        };
        assert_eq!(state.instrument_configuration_for(&ft), "IC1");
        state.fix_configurations();
        assert_eq!(state.instrument_configuration_for(&it), "IC1");
        assert_eq!(state.mass_analyzers().count(), 1);
    }
}
