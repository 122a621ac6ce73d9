use std::borrow::Cow;
use std::fmt::Display;
use std::str::{self, FromStr};

pub fn curie_to_num(curie: &str) -> (Option<ControlledVocabulary>, Option<u32>) {
    let mut parts = curie.split(':');
    let prefix = parts
        .next()
        .and_then(|v| v.parse::<ControlledVocabulary>().ok())
        .and_then(|cv| cv.as_option());
    match parts.next().map(|k| k.parse()) {
        Some(Ok(v)) => (prefix, Some(v)),
        _ => (prefix, None),
    }
}

/// Common read access to controlled and uncontrolled parameters
pub trait ParamLike {
    fn name(&self) -> &str;
    fn value(&self) -> &str;
    fn accession(&self) -> Option<u32>;
    fn controlled_vocabulary(&self) -> Option<ControlledVocabulary>;
    fn unit(&self) -> Unit;

    /// The XSD type of an uncontrolled parameter's value, if one was declared
    fn value_type(&self) -> Option<&str> {
        None
    }

    fn coerce<T: str::FromStr>(&self) -> Result<T, T::Err> {
        self.value().parse::<T>()
    }

    fn is_controlled(&self) -> bool {
        self.accession().is_some()
    }

    fn curie(&self) -> Option<String> {
        match (self.controlled_vocabulary(), self.accession()) {
            (Some(cv), Some(acc)) => Some(format!("{}:{:07}", cv.prefix(), acc)),
            _ => None,
        }
    }
}

/// A parameter that may borrow its name and value, so that frequently used
/// terms can be declared as `const` values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamCow<'a> {
    pub name: Cow<'a, str>,
    pub value: Cow<'a, str>,
    pub accession: Option<u32>,
    pub controlled_vocabulary: Option<ControlledVocabulary>,
    pub unit: Unit,
}

impl<'a> ParamCow<'a> {
    pub const fn const_new(
        name: &'a str,
        value: &'a str,
        accession: Option<u32>,
        controlled_vocabulary: Option<ControlledVocabulary>,
        unit: Unit,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            value: Cow::Borrowed(value),
            accession,
            controlled_vocabulary,
            unit,
        }
    }

    /// Attach a value to a borrowed term, producing an owned [`Param`]
    pub fn with_value<V: ToString>(&self, value: V) -> Param {
        let mut param: Param = self.clone().into();
        param.value = value.to_string();
        param
    }
}

impl<'a> ParamLike for ParamCow<'a> {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> &str {
        &self.value
    }

    fn accession(&self) -> Option<u32> {
        self.accession
    }

    fn controlled_vocabulary(&self) -> Option<ControlledVocabulary> {
        self.controlled_vocabulary
    }

    fn unit(&self) -> Unit {
        self.unit
    }
}

impl<'a> From<ParamCow<'a>> for Param {
    fn from(value: ParamCow<'a>) -> Self {
        Param {
            name: value.name.into_owned(),
            value: value.value.into_owned(),
            accession: value.accession,
            controlled_vocabulary: value.controlled_vocabulary,
            unit: value.unit,
            value_type: None,
        }
    }
}

/// A controlled vocabulary term or a free-form user parameter, with an optional unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
    pub accession: Option<u32>,
    pub controlled_vocabulary: Option<ControlledVocabulary>,
    pub unit: Unit,
    pub value_type: Option<String>,
}

impl Param {
    pub fn new() -> Param {
        Param {
            ..Default::default()
        }
    }

    pub fn new_key_value<K: Into<String>, V: ToString>(name: K, value: V) -> Param {
        let mut inst = Self::new();
        inst.name = name.into();
        inst.value = value.to_string();
        inst
    }

    pub fn with_unit_t(mut self, unit: &Unit) -> Param {
        self.unit = *unit;
        self
    }

    pub fn with_value_type<S: Into<String>>(mut self, value_type: S) -> Param {
        self.value_type = Some(value_type.into());
        self
    }
}

impl ParamLike for Param {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> &str {
        &self.value
    }

    fn accession(&self) -> Option<u32> {
        self.accession
    }

    fn controlled_vocabulary(&self) -> Option<ControlledVocabulary> {
        self.controlled_vocabulary
    }

    fn unit(&self) -> Unit {
        self.unit
    }

    fn value_type(&self) -> Option<&str> {
        self.value_type.as_deref()
    }
}

impl<'a> PartialEq<ParamCow<'a>> for Param {
    fn eq(&self, other: &ParamCow<'a>) -> bool {
        self.controlled_vocabulary == other.controlled_vocabulary
            && self.accession == other.accession
            && self.name == other.name
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ControlledVocabulary {
    MS,
    UO,
    Unknown,
}

const MS_CV: &str = "MS";
const UO_CV: &str = "UO";
const UNKNOWN_CV: &str = "";

impl ControlledVocabulary {
    pub const fn prefix(&self) -> &'static str {
        match &self {
            Self::MS => MS_CV,
            Self::UO => UO_CV,
            Self::Unknown => UNKNOWN_CV,
        }
    }

    pub fn as_option(&self) -> Option<Self> {
        match self {
            Self::Unknown => None,
            _ => Some(*self),
        }
    }

    /// Build a borrowed term in this vocabulary without a value
    pub const fn const_param_ident(&self, name: &'static str, accession: u32) -> ParamCow<'static> {
        ParamCow::const_new(name, "", Some(accession), Some(*self), Unit::Unknown)
    }

    /// Build a borrowed term in this vocabulary without a value, but with a unit
    pub const fn const_param_ident_unit(
        &self,
        name: &'static str,
        accession: u32,
        unit: Unit,
    ) -> ParamCow<'static> {
        ParamCow::const_new(name, "", Some(accession), Some(*self), unit)
    }

    pub fn param<S: Into<String>>(&self, accession: u32, name: S) -> Param {
        let mut param = Param::new();
        param.controlled_vocabulary = Some(*self);
        param.name = name.into();
        param.accession = Some(accession);
        param
    }

    pub fn param_val<S: Into<String>, V: ToString>(
        &self,
        accession: u32,
        name: S,
        value: V,
    ) -> Param {
        let mut param = self.param(accession, name);
        param.value = value.to_string();
        param
    }
}

impl Display for ControlledVocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlledVocabularyResolutionError {
    #[error("Unrecognized controlled vocabulary {0}")]
    UnknownControlledVocabulary(String),
}

impl FromStr for ControlledVocabulary {
    type Err = ControlledVocabularyResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MS" | "PSI-MS" => Ok(Self::MS),
            "UO" => Ok(Self::UO),
            _ => Err(ControlledVocabularyResolutionError::UnknownControlledVocabulary(
                s.to_string(),
            )),
        }
    }
}

pub type ParamList = Vec<Param>;

pub trait ParamDescribed {
    fn params(&self) -> &ParamList;
    fn params_mut(&mut self) -> &mut ParamList;

    fn add_param(&mut self, param: Param) {
        self.params_mut().push(param);
    }

    fn extend_params<I: IntoIterator<Item = Param>>(&mut self, params: I) {
        self.params_mut().extend(params)
    }

    fn get_param_by_name(&self, name: &str) -> Option<&Param> {
        self.params().iter().find(|p| p.name == name)
    }

    fn get_param_by_accession(&self, accession: &str) -> Option<&Param> {
        let (cv, acc_num) = curie_to_num(accession);
        self.params()
            .iter()
            .find(|p| p.accession == acc_num && p.controlled_vocabulary == cv)
    }
}

#[macro_export]
macro_rules! impl_param_described {
    ($($t:ty), +) => {$(

        impl $crate::params::ParamDescribed for $t {
            fn params(&self) -> &$crate::params::ParamList {
                return &self.params
            }

            fn params_mut(&mut self) -> &mut $crate::params::ParamList {
                return &mut self.params
            }
        }
    )+};
}

/// Units that a term's value might have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Unit {
    // Mass
    MZ,
    Mass,

    // Time
    Minute,
    Second,
    Millisecond,

    // Intensity
    DetectorCounts,

    // Collision Energy
    Electronvolt,

    #[default]
    Unknown,
}

impl Unit {
    pub const fn for_param(&self) -> (&'static str, &'static str) {
        match self {
            Self::Millisecond => ("UO:0000028", "millisecond"),
            Self::Second => ("UO:0000010", "second"),
            Self::Minute => ("UO:0000031", "minute"),

            Self::MZ => ("MS:1000040", "m/z"),
            Self::Mass => ("UO:0000221", "dalton"),

            Self::DetectorCounts => ("MS:1000131", "number of detector counts"),

            Self::Electronvolt => ("UO:0000266", "electronvolt"),

            Self::Unknown => ("", ""),
        }
    }

    pub fn from_accession(acc: &str) -> Unit {
        match acc {
            "UO:0000028" => Self::Millisecond,
            "UO:0000010" => Self::Second,
            "UO:0000031" => Self::Minute,

            "MS:1000040" => Self::MZ,
            "UO:0000221" => Self::Mass,

            "MS:1000131" => Self::DetectorCounts,

            "UO:0000266" => Self::Electronvolt,
            _ => Unit::Unknown,
        }
    }

    /// The ontology the unit term itself is drawn from
    pub fn controlled_vocabulary(&self) -> Option<ControlledVocabulary> {
        let (acc, _) = self.for_param();
        acc.split(':').next().and_then(|p| p.parse().ok())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_curie() {
        let p = ControlledVocabulary::MS.param_val(1000511, "ms level", 2);
        assert_eq!(p.curie().as_deref(), Some("MS:1000511"));
        assert_eq!(p.coerce::<u8>().unwrap(), 2);
        let u = Param::new_key_value("foo", "bar");
        assert!(u.curie().is_none());
        assert!(!u.is_controlled());
        assert_eq!(curie_to_num("UO:0000031"), (Some(ControlledVocabulary::UO), Some(31)));
        assert_eq!(curie_to_num("XX:12"), (None, Some(12)));
    }

    #[test]
    fn test_const_params() {
        const MS_LEVEL: ParamCow = ControlledVocabulary::MS.const_param_ident("ms level", 1000511);
        let p = MS_LEVEL.with_value(1);
        assert_eq!(p, MS_LEVEL);
        assert_eq!(p.value, "1");
        assert_eq!(Unit::Minute.controlled_vocabulary(), Some(ControlledVocabulary::UO));
        assert_eq!(Unit::MZ.controlled_vocabulary(), Some(ControlledVocabulary::MS));
        assert_eq!(Unit::from_accession("UO:0000266"), Unit::Electronvolt);
    }

    #[test]
    fn test_described() {
        #[derive(Default)]
        struct Holder {
            params: ParamList,
        }
        impl_param_described!(Holder);
        let mut h = Holder::default();
        h.add_param(ControlledVocabulary::MS.param(1000579, "MS1 spectrum"));
        assert!(h.get_param_by_accession("MS:1000579").is_some());
        assert!(h.get_param_by_name("MS1 spectrum").is_some());
        assert!(h.get_param_by_accession("MS:1000580").is_none());
    }
}
