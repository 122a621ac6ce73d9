//! A [`RawFileAccess`] implementation over a JSON capture of a whole run.
//!
//! A snapshot carries everything the converters ask of a RAW file: the run
//! header, instrument and sample descriptions, and for every scan its
//! statistics, filter, event, peak data and trailer. Snapshots are stored with
//! a `.raw.json` extension.
use std::fs;
use std::io::{prelude::*, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::source::{
    CentroidStream, ChromatogramTrace, Device, InstrumentData, NoisePacket, RawFileAccess,
    RawFileError, RawFileOpener, RawScanEvent, RunHeader, SampleInformation, ScanFilter,
    ScanStatistics, SegmentedScan, TraceType, TraceWindow, TrailerEntry,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSnapshot {
    pub scan_number: i32,
    /// Minutes
    pub retention_time: f64,
    pub statistics: ScanStatistics,
    pub filter: ScanFilter,
    pub event: RawScanEvent,
    pub centroids: CentroidStream,
    pub segmented: SegmentedScan,
    pub noise: Vec<NoisePacket>,
    pub trailer: Vec<TrailerEntry>,
}

impl ScanSnapshot {
    /// The summed intensity of the peaks inside the window's m/z range, read
    /// from the centroid stream when there is one
    pub fn signal_in(&self, window: &TraceWindow) -> f64 {
        let (masses, intensities) = if self.centroids.is_empty() {
            (&self.segmented.positions, &self.segmented.intensities)
        } else {
            (&self.centroids.masses, &self.centroids.intensities)
        };
        masses
            .iter()
            .zip(intensities.iter())
            .filter(|(mz, _)| window.contains_mz(**mz))
            .map(|(_, intensity)| *intensity)
            .sum()
    }
}

fn default_ms_instruments() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFileSnapshot {
    pub run_header: RunHeader,
    pub instrument: InstrumentData,
    pub sample: SampleInformation,
    pub creation_date: Option<DateTime<Utc>>,
    pub in_acquisition: bool,
    pub file_error: Option<String>,
    #[serde(default = "default_ms_instruments")]
    pub ms_instruments: usize,
    pub scans: Vec<ScanSnapshot>,
}

impl Default for RawFileSnapshot {
    fn default() -> Self {
        Self {
            run_header: RunHeader::default(),
            instrument: InstrumentData::default(),
            sample: SampleInformation::default(),
            creation_date: None,
            in_acquisition: false,
            file_error: None,
            ms_instruments: default_ms_instruments(),
            scans: Vec::new(),
        }
    }
}

impl RawFileSnapshot {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RawFileError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), RawFileError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), RawFileError> {
        let mut handle = BufWriter::new(fs::File::create(path)?);
        self.to_writer(&mut handle)?;
        handle.flush()?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SnapshotRawFile {
    path: PathBuf,
    run_header: RunHeader,
    instrument: InstrumentData,
    sample: SampleInformation,
    creation_date: Option<DateTime<Utc>>,
    in_acquisition: bool,
    file_error: Option<String>,
    ms_instruments: usize,
    selected: Option<(Device, usize)>,
    scans: IndexMap<i32, ScanSnapshot>,
}

impl SnapshotRawFile {
    /// Wrap a snapshot. A run header without a scan range is filled in from
    /// the scans themselves.
    pub fn new(path: PathBuf, snapshot: RawFileSnapshot) -> Self {
        let mut run_header = snapshot.run_header;
        let scans: IndexMap<i32, ScanSnapshot> = snapshot
            .scans
            .into_iter()
            .map(|s| (s.scan_number, s))
            .collect();

        if run_header.last_spectrum == 0 && !scans.is_empty() {
            run_header.first_spectrum = scans.keys().copied().min().unwrap_or_default();
            run_header.last_spectrum = scans.keys().copied().max().unwrap_or_default();
            run_header.spectra_count = scans.len() as i32;
            run_header.start_time = scans
                .values()
                .map(|s| s.retention_time)
                .fold(f64::INFINITY, f64::min);
            run_header.end_time = scans
                .values()
                .map(|s| s.retention_time)
                .fold(f64::NEG_INFINITY, f64::max);
            run_header.low_mass = scans
                .values()
                .map(|s| s.statistics.low_mass)
                .fold(f64::INFINITY, f64::min);
            run_header.high_mass = scans
                .values()
                .map(|s| s.statistics.high_mass)
                .fold(f64::NEG_INFINITY, f64::max);
        }

        Self {
            path,
            run_header,
            instrument: snapshot.instrument,
            sample: snapshot.sample,
            creation_date: snapshot.creation_date,
            in_acquisition: snapshot.in_acquisition,
            file_error: snapshot.file_error,
            ms_instruments: snapshot.ms_instruments,
            selected: None,
            scans,
        }
    }

    pub fn open_path(path: &Path) -> Result<Self, RawFileError> {
        if !path.exists() {
            return Err(RawFileError::NotFound(path.to_path_buf()));
        }
        let handle = fs::File::open(path).map_err(|e| RawFileError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let snapshot = RawFileSnapshot::from_reader(BufReader::new(handle))?;
        Ok(Self::new(path.to_path_buf(), snapshot))
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    fn get_scan(&self, scan_number: i32) -> Result<&ScanSnapshot, RawFileError> {
        self.scans
            .get(&scan_number)
            .ok_or(RawFileError::ScanNotFound(scan_number))
    }
}

impl RawFileAccess for SnapshotRawFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_error(&self) -> bool {
        self.file_error.is_some()
    }

    fn in_acquisition(&self) -> bool {
        self.in_acquisition
    }

    fn file_error(&self) -> Option<&str> {
        self.file_error.as_deref()
    }

    fn instrument_count(&self, device: Device) -> usize {
        match device {
            Device::MS => self.ms_instruments,
            _ => 0,
        }
    }

    fn select_instrument(&mut self, device: Device, number: usize) -> Result<(), RawFileError> {
        if number == 0 || number > self.instrument_count(device) {
            return Err(RawFileError::NoMsDevice(self.path.clone()));
        }
        self.selected = Some((device, number));
        Ok(())
    }

    fn run_header(&self) -> &RunHeader {
        &self.run_header
    }

    fn instrument_data(&self) -> &InstrumentData {
        &self.instrument
    }

    fn creation_date(&self) -> Option<DateTime<Utc>> {
        self.creation_date
    }

    fn sample_information(&self) -> &SampleInformation {
        &self.sample
    }

    fn scan_statistics(&self, scan_number: i32) -> Result<ScanStatistics, RawFileError> {
        Ok(self.get_scan(scan_number)?.statistics.clone())
    }

    fn centroid_stream(&self, scan_number: i32) -> Result<CentroidStream, RawFileError> {
        Ok(self.get_scan(scan_number)?.centroids.clone())
    }

    fn segmented_scan(&self, scan_number: i32) -> Result<SegmentedScan, RawFileError> {
        Ok(self.get_scan(scan_number)?.segmented.clone())
    }

    fn noise_data(&self, scan_number: i32) -> Result<Vec<NoisePacket>, RawFileError> {
        Ok(self.get_scan(scan_number)?.noise.clone())
    }

    fn scan_filter(&self, scan_number: i32) -> Result<ScanFilter, RawFileError> {
        Ok(self.get_scan(scan_number)?.filter)
    }

    fn scan_event(&self, scan_number: i32) -> Result<RawScanEvent, RawFileError> {
        Ok(self.get_scan(scan_number)?.event.clone())
    }

    fn trailer_extra(&self, scan_number: i32) -> Result<Vec<TrailerEntry>, RawFileError> {
        Ok(self.get_scan(scan_number)?.trailer.clone())
    }

    fn retention_time(&self, scan_number: i32) -> Result<f64, RawFileError> {
        Ok(self.get_scan(scan_number)?.retention_time)
    }

    fn chromatogram(
        &self,
        trace_type: TraceType,
        first_scan: i32,
        last_scan: i32,
        window: &TraceWindow,
    ) -> Result<Vec<ChromatogramTrace>, RawFileError> {
        let mut trace = ChromatogramTrace::default();
        for scan in self.scans.values().filter(|s| {
            s.scan_number >= first_scan
                && s.scan_number <= last_scan
                && window.contains_time(s.retention_time)
                && window.matches_scan(s.filter.ms_order, &s.event.filter_string)
        }) {
            trace.times.push(scan.retention_time);
            trace.intensities.push(match trace_type {
                TraceType::BasePeak => scan.statistics.base_peak_intensity,
                TraceType::TIC => scan.statistics.tic,
                TraceType::MassRange => scan.signal_in(window),
            });
        }
        Ok(vec![trace])
    }
}

/// Opens `*.raw.json` snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotOpener;

impl RawFileOpener for SnapshotOpener {
    type Reader = SnapshotRawFile;

    fn accepts(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase().ends_with(".raw.json"))
                .unwrap_or_default()
    }

    fn open(&self, path: &Path) -> Result<Self::Reader, RawFileError> {
        SnapshotRawFile::open_path(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::thermo::source::{MSOrderType, PolarityType};

    fn snapshot() -> RawFileSnapshot {
        let mut snapshot = RawFileSnapshot::default();
        for (i, level) in [1u8, 2, 1].into_iter().enumerate() {
            snapshot.scans.push(ScanSnapshot {
                scan_number: i as i32 + 1,
                retention_time: 0.5 * (i as f64 + 1.0),
                statistics: ScanStatistics {
                    tic: 100.0 * (i as f64 + 1.0),
                    base_peak_intensity: 10.0 * (i as f64 + 1.0),
                    low_mass: 100.0,
                    high_mass: 1500.0 + i as f64,
                    ..Default::default()
                },
                filter: ScanFilter {
                    ms_order: MSOrderType::from_level(level),
                    polarity: PolarityType::Positive,
                    ..Default::default()
                },
                ..Default::default()
            });
        }
        snapshot
    }

    #[test]
    fn test_header_from_scans() {
        let raw = SnapshotRawFile::new("test.raw.json".into(), snapshot());
        let header = raw.run_header();
        assert_eq!(header.first_spectrum, 1);
        assert_eq!(header.last_spectrum, 3);
        assert_eq!(header.spectra_count, 3);
        assert_eq!(header.end_time, 1.5);
        assert_eq!(header.high_mass, 1502.0);
        assert_eq!(raw.scan_filter(2).unwrap().ms_order, MSOrderType::Ms2);
        assert!(matches!(raw.scan_statistics(9), Err(RawFileError::ScanNotFound(9))));
    }

    #[test]
    fn test_select_and_chromatogram() {
        let mut raw = SnapshotRawFile::new("test.raw.json".into(), snapshot());
        assert_eq!(raw.instrument_count(Device::MS), 1);
        assert!(raw.select_instrument(Device::UV, 1).is_err());
        raw.select_instrument(Device::MS, 1).unwrap();
        let all = TraceWindow::default();
        let traces = raw.chromatogram(TraceType::BasePeak, 2, 3, &all).unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].intensities, vec![20.0, 30.0]);
        assert_eq!(traces[0].times, vec![1.0, 1.5]);
        let tic = raw.chromatogram(TraceType::TIC, 1, 3, &all).unwrap();
        assert_eq!(tic[0].intensities, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_mass_range_chromatogram() {
        let mut snapshot = snapshot();
        for scan in snapshot.scans.iter_mut() {
            scan.centroids = CentroidStream {
                masses: vec![400.0, 450.0, 600.0],
                intensities: vec![1.0, 2.0, scan.scan_number as f64],
                charges: Vec::new(),
            };
        }
        snapshot.scans[2].centroids = CentroidStream::default();
        snapshot.scans[2].segmented = SegmentedScan {
            positions: vec![449.9, 450.0, 450.1],
            intensities: vec![5.0, 10.0, 5.0],
        };
        let raw = SnapshotRawFile::new("test.raw.json".into(), snapshot);

        let window = TraceWindow::default().with_mass_range(440.0, 700.0).with_filter("ms");
        let traces = raw.chromatogram(TraceType::MassRange, 1, 3, &window).unwrap();
        assert_eq!(traces[0].times, vec![0.5, 1.5]);
        assert_eq!(traces[0].intensities, vec![3.0, 20.0]);

        let window = TraceWindow::default()
            .with_mass_range(300.0, 500.0)
            .with_time_range(0.9, 2.0);
        let traces = raw.chromatogram(TraceType::MassRange, 1, 3, &window).unwrap();
        assert_eq!(traces[0].times, vec![1.0, 1.5]);
        assert_eq!(traces[0].intensities, vec![3.0, 20.0]);

        let window = TraceWindow::default().with_time_range(5.0, 6.0);
        let traces = raw.chromatogram(TraceType::MassRange, 1, 3, &window).unwrap();
        assert!(traces[0].is_empty());
    }

    #[test]
    fn test_centroid_profile() {
        let mut snapshot = snapshot();
        snapshot.scans[0].segmented = SegmentedScan {
            positions: vec![200.0, 200.01, 200.02, 200.03, 200.04, 300.0, 300.01, 300.02, 300.03, 300.04],
            intensities: vec![1.0, 50.0, 200.0, 50.0, 1.0, 1.0, 20.0, 80.0, 20.0, 1.0],
        };
        let raw = SnapshotRawFile::new("test.raw.json".into(), snapshot);
        let picked = raw.centroid_profile(1).unwrap();
        assert_eq!(picked.len(), 2);
        assert!((picked.masses[0] - 200.02).abs() < 1e-3);
        assert!((picked.masses[1] - 300.02).abs() < 1e-3);
        assert!(picked.intensities[0] > picked.intensities[1]);
        assert!(picked.charges.is_empty());

        assert!(raw.centroid_profile(2).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.raw.json");
        snapshot().save(&path).unwrap();
        assert!(SnapshotOpener.accepts(&path));
        assert!(!SnapshotOpener.accepts(&dir.path().join("run.mzML")));
        let raw = SnapshotOpener.open(&path).unwrap();
        assert_eq!(raw.len(), 3);
        assert!(!raw.is_error());

        assert!(matches!(
            SnapshotOpener.open(&dir.path().join("missing.raw.json")),
            Err(RawFileError::NotFound(_))
        ));
        fs::write(dir.path().join("bad.raw.json"), b"{ not json").unwrap();
        assert!(matches!(
            SnapshotOpener.open(&dir.path().join("bad.raw.json")),
            Err(RawFileError::Snapshot(_))
        ));
    }
}
