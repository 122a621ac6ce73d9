//! Controlled vocabulary terms for the vendor's scan level enumerations.
//!
//! Every lookup is total. Values without a dedicated term map to the parent
//! term of their category.
use crate::params::{ControlledVocabulary, Param, ParamCow};

use super::source::{ActivationType, IonizationModeType, MassAnalyzerType};

const CV: ControlledVocabulary = ControlledVocabulary::MS;

pub const MASS_ANALYZER_TYPE: ParamCow<'static> = CV.const_param_ident("mass analyzer type", 1000443);
pub const IONIZATION_TYPE: ParamCow<'static> = CV.const_param_ident("ionization type", 1000008);
pub const DISSOCIATION_METHOD: ParamCow<'static> = CV.const_param_ident("dissociation method", 1000044);

impl MassAnalyzerType {
    pub const fn to_param_const(&self) -> ParamCow<'static> {
        match self {
            Self::FTMS => {
                CV.const_param_ident("fourier transform ion cyclotron resonance mass spectrometer", 1000079)
            }
            Self::ITMS => CV.const_param_ident("ion trap", 1000264),
            Self::Sector => CV.const_param_ident("magnetic sector", 1000080),
            Self::TOFMS => CV.const_param_ident("time-of-flight", 1000084),
            Self::TQMS | Self::SQMS => CV.const_param_ident("quadrupole", 1000081),
            Self::Any => MASS_ANALYZER_TYPE,
        }
    }

    pub fn to_param(&self) -> Param {
        self.to_param_const().into()
    }
}

impl IonizationModeType {
    pub const fn to_param_const(&self) -> ParamCow<'static> {
        match self {
            Self::ElectroSpray => CV.const_param_ident("electrospray ionization", 1000073),
            Self::GlowDischarge => CV.const_param_ident("glow discharge ionization", 1000259),
            Self::ChemicalIonization => CV.const_param_ident("chemical ionization", 1000071),
            Self::AtmosphericPressureChemicalIonization => {
                CV.const_param_ident("atmospheric pressure chemical ionization", 1000070)
            }
            Self::MatrixAssistedLaserDesorptionIonization => CV.const_param_ident(
                "atmospheric pressure matrix-assisted laser desorption ionization",
                1000239,
            ),
            Self::NanoSpray => CV.const_param_ident("nanoelectrospray", 1000398),
            _ => IONIZATION_TYPE,
        }
    }

    pub fn to_param(&self) -> Param {
        self.to_param_const().into()
    }
}

impl ActivationType {
    pub const fn to_param_const(&self) -> ParamCow<'static> {
        match self {
            Self::CID => CV.const_param_ident("collision-induced dissociation", 1000133),
            Self::HCD => CV.const_param_ident("beam-type collision-induced dissociation", 1000422),
            Self::ETD => CV.const_param_ident("electron transfer dissociation", 1000598),
            Self::MultiPhotonDissociation => CV.const_param_ident("photodissociation", 1000435),
            _ => DISSOCIATION_METHOD,
        }
    }

    pub fn to_param(&self) -> Param {
        self.to_param_const().into()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::ParamLike;

    #[test]
    fn test_analyzer_terms() {
        assert_eq!(MassAnalyzerType::FTMS.to_param().curie().as_deref(), Some("MS:1000079"));
        assert_eq!(MassAnalyzerType::ITMS.to_param_const().accession, Some(1000264));
        assert_eq!(
            MassAnalyzerType::TQMS.to_param_const(),
            MassAnalyzerType::SQMS.to_param_const()
        );
        assert_eq!(MassAnalyzerType::Any.to_param_const(), MASS_ANALYZER_TYPE);
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(IonizationModeType::NanoSpray.to_param_const().accession, Some(1000398));
        assert_eq!(IonizationModeType::ThermoSpray.to_param_const(), IONIZATION_TYPE);
        assert_eq!(ActivationType::HCD.to_param_const().accession, Some(1000422));
        assert_eq!(ActivationType::ECD.to_param_const(), DISSOCIATION_METHOD);
        assert_eq!(ActivationType::Any.to_param().curie().as_deref(), Some("MS:1000044"));
    }
}
