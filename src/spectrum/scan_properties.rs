use crate::impl_param_described;
use crate::params::{ControlledVocabulary, ParamCow, ParamList};

/// The m/z interval isolated around a precursor ion, expressed as a target
/// and offsets on either side of it.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct IsolationWindow {
    /// Absent when the reaction describing the isolation could not be read
    pub target: Option<f64>,
    pub lower_offset: Option<f64>,
    pub upper_offset: Option<f64>,
}

impl IsolationWindow {
    /// Build a window from a total isolation width and an asymmetry offset reported by the
    /// instrument. `offset = width / 2 + isolation_offset` lies above the target,
    /// the remainder of the width lies below it.
    pub fn from_width(target: Option<f64>, width: Option<f64>, isolation_offset: f64) -> Self {
        match width {
            Some(width) => {
                let offset = width / 2.0 + isolation_offset;
                Self {
                    target,
                    lower_offset: Some(width - offset),
                    upper_offset: Some(offset),
                }
            }
            None => Self {
                target,
                lower_offset: None,
                upper_offset: None,
            },
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct ScanWindow {
    pub lower_bound: f64,
    pub upper_bound: f64,
}

pub type ScanWindowList = Vec<ScanWindow>;

#[derive(Default, Debug, Clone, PartialEq)]
/// Describes a single scan event. There is one event per spectrum.
pub struct ScanEvent {
    /// Retention time in minutes
    pub start_time: f64,
    pub filter_string: String,
    /// Ion injection time in milliseconds
    pub injection_time: Option<f64>,
    pub scan_windows: ScanWindowList,
    pub instrument_configuration_id: String,
    pub params: ParamList,
}

pub type ScanEventList = Vec<ScanEvent>;

#[derive(Default, Debug, Clone, PartialEq)]
/// Describe the series of acquisition events that constructed the spectrum
/// being described.
pub struct Acquisition {
    pub scans: ScanEventList,
    pub params: ParamList,
}

impl Acquisition {
    pub fn first_scan(&self) -> Option<&ScanEvent> {
        self.scans.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Describes a single selected ion from a precursor isolation
pub struct SelectedIon {
    /// The selected ion's m/z as reported, may not be the monoisotopic peak.
    pub mz: Option<f64>,
    /// The reported precursor ion's charge state, when positive
    pub charge: Option<i32>,
    pub params: ParamList,
}

#[derive(Debug, Default, Clone, PartialEq)]
/// Describes the activation used to dissociate the precursor ion. The
/// parameters are kept in the order they are written.
pub struct Activation {
    pub energy: Option<f64>,
    pub params: ParamList,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Precursor {
    /// The native ID of the spectrum the precursor was isolated from
    pub precursor_id: Option<String>,
    pub isolation_window: IsolationWindow,
    pub ion: SelectedIon,
    pub activation: Activation,
}

impl_param_described!(Acquisition, ScanEvent, SelectedIon, Activation);

/// The direction of the electric field used to accelerate ions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanPolarity {
    #[default]
    Unknown,
    Positive,
    Negative,
}

impl ScanPolarity {
    pub const fn to_param(&self) -> Option<ParamCow<'static>> {
        match self {
            ScanPolarity::Unknown => None,
            ScanPolarity::Positive => {
                Some(ControlledVocabulary::MS.const_param_ident("positive scan", 1000130))
            }
            ScanPolarity::Negative => {
                Some(ControlledVocabulary::MS.const_param_ident("negative scan", 1000129))
            }
        }
    }

    pub const fn sign(&self) -> char {
        match self {
            ScanPolarity::Negative => '-',
            _ => '+',
        }
    }
}

/// Whether the peak data are discrete peaks or a continuous signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum SignalContinuity {
    #[default]
    Unknown,
    Centroid,
    Profile,
}

impl SignalContinuity {
    pub const fn to_param(&self) -> Option<ParamCow<'static>> {
        match self {
            SignalContinuity::Unknown => None,
            SignalContinuity::Centroid => {
                Some(ControlledVocabulary::MS.const_param_ident("centroid spectrum", 1000127))
            }
            SignalContinuity::Profile => {
                Some(ControlledVocabulary::MS.const_param_ident("profile spectrum", 1000128))
            }
        }
    }
}

/// The metadata of a spectrum, everything but its peak arrays
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpectrumDescription {
    /// The native ID of the spectrum
    pub id: String,
    /// The 0-based position of the spectrum in the document
    pub index: usize,
    /// The scan number the spectrum was read from
    pub scan_number: i32,
    pub ms_level: u8,
    pub polarity: ScanPolarity,
    pub signal_continuity: SignalContinuity,
    /// Spectrum-level terms, in the order they are written
    pub params: ParamList,
    pub acquisition: Acquisition,
    pub precursor: Option<Precursor>,
}

impl_param_described!(SpectrumDescription);
