use crate::impl_param_described;
use crate::params::ParamList;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComponentType {
    Analyzer,
    IonSource,
    Detector,
    #[default]
    Unknown,
}

impl ComponentType {
    pub const fn tag_name(&self) -> Option<&'static str> {
        match self {
            ComponentType::Analyzer => Some("analyzer"),
            ComponentType::IonSource => Some("source"),
            ComponentType::Detector => Some("detector"),
            ComponentType::Unknown => None,
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub component_type: ComponentType,
    pub order: u8,
    pub params: ParamList,
}

impl Component {
    pub fn new(component_type: ComponentType, order: u8) -> Self {
        Self {
            component_type,
            order,
            params: ParamList::new(),
        }
    }
}

/// A named group of parameters shared by several elements, referenced by id
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ReferenceableParamGroup {
    pub id: String,
    pub params: ParamList,
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct InstrumentConfiguration {
    pub id: String,
    pub components: Vec<Component>,
    pub params: ParamList,
    /// Ids of [`ReferenceableParamGroup`]s this configuration includes
    pub param_group_refs: Vec<String>,
}

impl InstrumentConfiguration {
    pub fn push(&mut self, component: Component) {
        self.components.push(component)
    }
}

impl_param_described!(InstrumentConfiguration, Component, ReferenceableParamGroup);
