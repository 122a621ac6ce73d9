//! Instrument model and detector look up tables for Thermo instruments.
use std::fmt::Display;

use crate::params::{ControlledVocabulary, Param, ParamCow};

macro_rules! param {
    ($name:expr, $acc:expr) => {
        ControlledVocabulary::MS.const_param_ident($name, $acc)
    };
}

pub const GENERIC_THERMO_INSTRUMENT: ParamCow<'static> =
    param!("Thermo Fisher Scientific instrument model", 1000483);
pub const INDUCTIVE_DETECTOR: ParamCow<'static> = param!("inductive detector", 1000624);
pub const ELECTRON_MULTIPLIER: ParamCow<'static> = param!("electron multiplier", 1000253);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Contains,
}

#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentModelType {
    #[default]
    Unknown,

    LTQ,
    LXQ,
    LTQ_XL,
    LTQ_XL_ETD,
    LTQ_Velos,
    LTQ_Velos_ETD,
    MALDI_LTQ_XL,
    LTQ_FT,
    LTQ_FT_Ultra,
    LTQ_Orbitrap,
    LTQ_Orbitrap_Classic,
    LTQ_Orbitrap_Discovery,
    LTQ_Orbitrap_XL,
    LTQ_Orbitrap_XL_ETD,
    MALDI_LTQ_Orbitrap,
    LTQ_Orbitrap_Velos,
    LTQ_Orbitrap_Velos_Pro,
    LTQ_Orbitrap_Elite,
    Orbitrap_Fusion,
    Orbitrap_Fusion_ETD,
    Orbitrap_Fusion_Lumos,
    Orbitrap_Eclipse,
    Orbitrap_ID_X,
    Orbitrap_Exploris_120,
    Orbitrap_Exploris_240,
    Orbitrap_Exploris_480,
    Exactive,
    Exactive_Plus,
    Q_Exactive,
    Q_Exactive_Plus,
    Q_Exactive_HF,
    Q_Exactive_HF_X,
}

impl Display for InstrumentModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let k = format!("{:?}", self).replace("_", " ");
        write!(f, "{k}")
    }
}

impl InstrumentModelType {
    pub const fn to_param_const(self) -> ParamCow<'static> {
        match self {
            InstrumentModelType::Unknown => GENERIC_THERMO_INSTRUMENT,
            InstrumentModelType::LTQ => param!("LTQ", 1000447),
            InstrumentModelType::LXQ => param!("LXQ", 1000450),
            InstrumentModelType::LTQ_XL => param!("LTQ XL", 1000854),
            InstrumentModelType::LTQ_XL_ETD => param!("LTQ XL ETD", 1000638),
            InstrumentModelType::LTQ_Velos => param!("LTQ Velos", 1000855),
            InstrumentModelType::LTQ_Velos_ETD => param!("LTQ Velos ETD", 1000856),
            InstrumentModelType::MALDI_LTQ_XL => param!("MALDI LTQ XL", 1000642),
            InstrumentModelType::LTQ_FT => param!("LTQ FT", 1000448),
            InstrumentModelType::LTQ_FT_Ultra => param!("LTQ FT Ultra", 1000557),
            InstrumentModelType::LTQ_Orbitrap => param!("LTQ Orbitrap", 1000449),
            InstrumentModelType::LTQ_Orbitrap_Classic => param!("LTQ Orbitrap Classic", 1002835),
            InstrumentModelType::LTQ_Orbitrap_Discovery => {
                param!("LTQ Orbitrap Discovery", 1000555)
            }
            InstrumentModelType::LTQ_Orbitrap_XL => param!("LTQ Orbitrap XL", 1000556),
            InstrumentModelType::LTQ_Orbitrap_XL_ETD => param!("LTQ Orbitrap XL ETD", 1000639),
            InstrumentModelType::MALDI_LTQ_Orbitrap => param!("MALDI LTQ Orbitrap", 1000643),
            InstrumentModelType::LTQ_Orbitrap_Velos => param!("LTQ Orbitrap Velos", 1001742),
            InstrumentModelType::LTQ_Orbitrap_Velos_Pro => {
                param!("LTQ Orbitrap Velos Pro", 1003096)
            }
            InstrumentModelType::LTQ_Orbitrap_Elite => param!("LTQ Orbitrap Elite", 1001910),
            InstrumentModelType::Orbitrap_Fusion => param!("Orbitrap Fusion", 1002416),
            InstrumentModelType::Orbitrap_Fusion_ETD => param!("Orbitrap Fusion ETD", 1002417),
            InstrumentModelType::Orbitrap_Fusion_Lumos => param!("Orbitrap Fusion Lumos", 1002732),
            InstrumentModelType::Orbitrap_Eclipse => param!("Orbitrap Eclipse", 1003029),
            InstrumentModelType::Orbitrap_ID_X => param!("Orbitrap ID-X", 1003112),
            InstrumentModelType::Orbitrap_Exploris_120 => param!("Orbitrap Exploris 120", 1003095),
            InstrumentModelType::Orbitrap_Exploris_240 => param!("Orbitrap Exploris 240", 1003094),
            InstrumentModelType::Orbitrap_Exploris_480 => param!("Orbitrap Exploris 480", 1003028),
            InstrumentModelType::Exactive => param!("Exactive", 1000649),
            InstrumentModelType::Exactive_Plus => param!("Exactive Plus", 1002526),
            InstrumentModelType::Q_Exactive => param!("Q Exactive", 1001911),
            InstrumentModelType::Q_Exactive_Plus => param!("Q Exactive Plus", 1002634),
            InstrumentModelType::Q_Exactive_HF => param!("Q Exactive HF", 1002523),
            InstrumentModelType::Q_Exactive_HF_X => param!("Q Exactive HF-X", 1002877),
        }
    }

    pub fn to_param(self) -> Param {
        self.to_param_const().into()
    }
}

/// Upper-cased instrument names as the acquisition software reports them
static INSTRUMENT_MODEL_TYPE_MATCH: [(&str, InstrumentModelType); 37] = [
    ("LTQ FT", InstrumentModelType::LTQ_FT),
    ("LTQ FT ULTRA", InstrumentModelType::LTQ_FT_Ultra),
    ("LTQ ORBITRAP", InstrumentModelType::LTQ_Orbitrap),
    ("LTQ ORBITRAP CLASSIC", InstrumentModelType::LTQ_Orbitrap_Classic),
    ("LTQ ORBITRAP DISCOVERY", InstrumentModelType::LTQ_Orbitrap_Discovery),
    ("LTQ ORBITRAP XL", InstrumentModelType::LTQ_Orbitrap_XL),
    ("LTQ ORBITRAP XL ETD", InstrumentModelType::LTQ_Orbitrap_XL_ETD),
    ("MALDI LTQ ORBITRAP", InstrumentModelType::MALDI_LTQ_Orbitrap),
    ("LTQ ORBITRAP VELOS", InstrumentModelType::LTQ_Orbitrap_Velos),
    ("ORBITRAP VELOS", InstrumentModelType::LTQ_Orbitrap_Velos),
    ("LTQ ORBITRAP VELOS PRO", InstrumentModelType::LTQ_Orbitrap_Velos_Pro),
    ("ORBITRAP VELOS PRO", InstrumentModelType::LTQ_Orbitrap_Velos_Pro),
    ("LTQ ORBITRAP ELITE", InstrumentModelType::LTQ_Orbitrap_Elite),
    ("ORBITRAP ELITE", InstrumentModelType::LTQ_Orbitrap_Elite),
    ("LTQ", InstrumentModelType::LTQ),
    ("LXQ", InstrumentModelType::LXQ),
    ("LTQ XL", InstrumentModelType::LTQ_XL),
    ("LTQ XL ETD", InstrumentModelType::LTQ_XL_ETD),
    ("MALDI LTQ XL", InstrumentModelType::MALDI_LTQ_XL),
    ("LTQ VELOS", InstrumentModelType::LTQ_Velos),
    ("LTQ VELOS ETD", InstrumentModelType::LTQ_Velos_ETD),
    ("ORBITRAP FUSION", InstrumentModelType::Orbitrap_Fusion),
    ("ORBITRAP FUSION ETD", InstrumentModelType::Orbitrap_Fusion_ETD),
    ("ORBITRAP FUSION LUMOS", InstrumentModelType::Orbitrap_Fusion_Lumos),
    ("ORBITRAP ECLIPSE", InstrumentModelType::Orbitrap_Eclipse),
    ("ORBITRAP EXPLORIS 120", InstrumentModelType::Orbitrap_Exploris_120),
    ("ORBITRAP EXPLORIS 240", InstrumentModelType::Orbitrap_Exploris_240),
    ("ORBITRAP EXPLORIS 480", InstrumentModelType::Orbitrap_Exploris_480),
    ("EXACTIVE", InstrumentModelType::Exactive),
    ("EXACTIVE PLUS", InstrumentModelType::Exactive_Plus),
    ("Q EXACTIVE", InstrumentModelType::Q_Exactive),
    ("Q EXACTIVE ORBITRAP", InstrumentModelType::Q_Exactive),
    ("Q EXACTIVE PLUS ORBITRAP", InstrumentModelType::Q_Exactive_Plus),
    ("Q EXACTIVE HF", InstrumentModelType::Q_Exactive_HF),
    ("Q EXACTIVE HF-X", InstrumentModelType::Q_Exactive_HF_X),
    ("Q EXACTIVE PLUS", InstrumentModelType::Q_Exactive_Plus),
    ("ORBITRAP ID-X", InstrumentModelType::Orbitrap_ID_X),
];

/// Resolve an instrument name to a model.
///
/// An exact (case-insensitive) match wins, otherwise the longest table key
/// contained in the name is used. Names matching nothing resolve to
/// [`InstrumentModelType::Unknown`].
pub fn parse_instrument_model(instrument_model: &str) -> InstrumentModelType {
    let model_type = instrument_model.trim().to_uppercase();

    let mut best: Option<(&str, InstrumentModelType, MatchType)> = None;
    for (key, model_enum) in INSTRUMENT_MODEL_TYPE_MATCH.iter() {
        if **key == model_type {
            best = Some((key, *model_enum, MatchType::Exact));
            break;
        }
        if model_type.contains(key) && best.map_or(true, |(k, _, _)| k.len() < key.len()) {
            best = Some((key, *model_enum, MatchType::Contains));
        }
    }

    match best {
        Some((key, model_enum, match_type)) => {
            log::debug!(
                "Matched instrument model '{}' with pattern '{}' ({:?}) -> {:?}",
                instrument_model,
                key,
                match_type,
                model_enum
            );
            model_enum
        }
        None => {
            log::debug!("No instrument model matches '{instrument_model}', using the generic term");
            InstrumentModelType::Unknown
        }
    }
}

/// The detectors of an instrument, in the order its mass analyzers are
/// discovered. Models without a dedicated entry have a single inductive detector.
pub fn instrument_model_to_detector(model: InstrumentModelType) -> Vec<ParamCow<'static>> {
    match model {
        InstrumentModelType::LTQ_FT
        | InstrumentModelType::LTQ_FT_Ultra
        | InstrumentModelType::LTQ_Orbitrap
        | InstrumentModelType::LTQ_Orbitrap_Classic
        | InstrumentModelType::LTQ_Orbitrap_Discovery
        | InstrumentModelType::LTQ_Orbitrap_XL
        | InstrumentModelType::LTQ_Orbitrap_XL_ETD
        | InstrumentModelType::MALDI_LTQ_Orbitrap
        | InstrumentModelType::LTQ_Orbitrap_Velos
        | InstrumentModelType::LTQ_Orbitrap_Velos_Pro
        | InstrumentModelType::LTQ_Orbitrap_Elite
        | InstrumentModelType::Orbitrap_Fusion
        | InstrumentModelType::Orbitrap_Fusion_ETD
        | InstrumentModelType::Orbitrap_Fusion_Lumos
        | InstrumentModelType::Orbitrap_Eclipse
        | InstrumentModelType::Orbitrap_ID_X => {
            vec![INDUCTIVE_DETECTOR, ELECTRON_MULTIPLIER]
        }

        InstrumentModelType::Exactive
        | InstrumentModelType::Exactive_Plus
        | InstrumentModelType::Q_Exactive
        | InstrumentModelType::Q_Exactive_Plus
        | InstrumentModelType::Q_Exactive_HF
        | InstrumentModelType::Q_Exactive_HF_X
        | InstrumentModelType::Orbitrap_Exploris_120
        | InstrumentModelType::Orbitrap_Exploris_240
        | InstrumentModelType::Orbitrap_Exploris_480 => {
            vec![INDUCTIVE_DETECTOR]
        }

        InstrumentModelType::LTQ
        | InstrumentModelType::LXQ
        | InstrumentModelType::LTQ_XL
        | InstrumentModelType::LTQ_XL_ETD
        | InstrumentModelType::MALDI_LTQ_XL
        | InstrumentModelType::LTQ_Velos
        | InstrumentModelType::LTQ_Velos_ETD => {
            vec![ELECTRON_MULTIPLIER]
        }

        InstrumentModelType::Unknown => vec![INDUCTIVE_DETECTOR],
    }
}

/// The detector for the `analyzer_index`-th (0-based) analyzer of an instrument,
/// falling back to the generic instrument's detector past the end of the list.
pub fn detector_for_analyzer(model: InstrumentModelType, analyzer_index: usize) -> Param {
    let detectors = instrument_model_to_detector(model);
    match detectors.get(analyzer_index) {
        Some(detector) => detector.clone().into(),
        None => instrument_model_to_detector(InstrumentModelType::Unknown)
            .into_iter()
            .next()
            .unwrap_or(INDUCTIVE_DETECTOR)
            .into(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::ParamLike;

    #[test]
    fn test_parse_instrument_model() {
        assert_eq!(
            parse_instrument_model("LTQ Orbitrap"),
            InstrumentModelType::LTQ_Orbitrap
        );
        // Longest contained key wins
        assert_eq!(
            parse_instrument_model("LTQ Orbitrap XXL"),
            InstrumentModelType::LTQ_Orbitrap
        );
        assert_eq!(
            parse_instrument_model("Orbitrap Fusion Lumos Tribrid"),
            InstrumentModelType::Orbitrap_Fusion_Lumos
        );
        assert_eq!(
            parse_instrument_model("q exactive hf-x"),
            InstrumentModelType::Q_Exactive_HF_X
        );
        let unknown = parse_instrument_model("non existing model");
        assert_eq!(unknown, InstrumentModelType::Unknown);
        assert_eq!(unknown.to_param().curie().as_deref(), Some("MS:1000483"));
        assert_eq!(
            InstrumentModelType::LTQ_Orbitrap.to_param().curie().as_deref(),
            Some("MS:1000449")
        );
    }

    #[test]
    fn test_detectors() {
        let fusion = InstrumentModelType::Orbitrap_Fusion;
        assert_eq!(detector_for_analyzer(fusion, 0).accession, Some(1000624));
        assert_eq!(detector_for_analyzer(fusion, 1).accession, Some(1000253));
        assert_eq!(detector_for_analyzer(fusion, 2).accession, Some(1000624));

        let ltq = InstrumentModelType::LTQ;
        assert_eq!(detector_for_analyzer(ltq, 0).accession, Some(1000253));
        assert_eq!(detector_for_analyzer(ltq, 1).accession, Some(1000624));

        let unknown = InstrumentModelType::Unknown;
        assert_eq!(detector_for_analyzer(unknown, 0).name, "inductive detector");
    }
}
