//! Per-channel property resolution.
//!
//! Every property of a synthesized field is looked up through the same
//! ordered stack of layers, highest precedence first:
//!
//! 1. explicit overrides: the profile's per-channel properties (raw name, then
//!    label), then the dtype/shape given with the request
//! 2. metadata the registry declares for the channel, then what its device
//!    pool reports
//! 3. profile-level defaults
//! 4. hard fallback
//!
//! The data-source element itself is not a layered property: a registry
//! declaration always wins, otherwise one is synthesized.

use super::nexus_path::{resolve_path, PathSegment};
use super::types::{nexus_type, STRING_DTYPE};
use super::ChannelSpec;
use crate::selection::Reachability;
use daq_selector_core::{
    ComponentDescription, DataSourceDefinition, Profile, Result, Strategy, DEFAULT_DYNAMIC_PATH,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One precedence layer; `None` defers to the next layer down.
#[derive(Debug, Clone, Default)]
pub(crate) struct PropertyLayer {
    pub nexus_path: Option<String>,
    pub link: Option<bool>,
    pub data_type: Option<String>,
    pub shape: Option<Vec<usize>>,
}

/// The four layers of one channel, highest precedence first.
#[derive(Debug, Clone)]
pub(crate) struct LayerStack {
    layers: [PropertyLayer; 4],
}

impl LayerStack {
    pub(crate) fn new(
        explicit: PropertyLayer,
        declared: PropertyLayer,
        defaults: PropertyLayer,
    ) -> Self {
        let fallback = PropertyLayer {
            nexus_path: Some(DEFAULT_DYNAMIC_PATH.to_string()),
            link: Some(false),
            data_type: Some(STRING_DTYPE.to_string()),
            shape: Some(Vec::new()),
        };
        Self {
            layers: [explicit, declared, defaults, fallback],
        }
    }

    /// First value `pick` finds, walking from the top layer down.
    pub(crate) fn lookup<T: Clone>(&self, pick: impl Fn(&PropertyLayer) -> Option<&T>) -> Option<T> {
        self.layers.iter().find_map(|layer| pick(layer)).cloned()
    }

    /// Every path candidate, top layer first.
    fn path_candidates(&self) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .filter_map(|layer| layer.nexus_path.as_deref())
    }
}

/// Type and shape a component declares for one of its data sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DeclaredMetadata {
    pub data_type: Option<String>,
    pub shape: Option<Vec<usize>>,
}

/// First usage of every data source that carries a type or shape.
pub(crate) fn declared_metadata(
    description: &ComponentDescription,
) -> BTreeMap<String, DeclaredMetadata> {
    let mut metadata = BTreeMap::new();
    let usages = description
        .values()
        .flat_map(|sources| sources.iter())
        .flat_map(|(name, usages)| usages.iter().map(move |usage| (name, usage)));
    for (name, usage) in usages {
        if usage.data_type.is_none() && usage.shape.is_none() {
            continue;
        }
        metadata
            .entry(name.clone())
            .or_insert_with(|| DeclaredMetadata {
                data_type: usage.data_type.clone(),
                shape: usage.shape.clone(),
            });
    }
    metadata
}

/// How the field's `<datasource>` element is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldSource {
    /// Verbatim registry body.
    Declared(String),
    Synthesized(DataSourceDefinition),
}

/// A channel with every property decided.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedField {
    pub channel: String,
    pub field_name: String,
    pub strategy: Strategy,
    pub nexus_type: &'static str,
    pub shape: Vec<usize>,
    pub path: Vec<PathSegment>,
    pub link: bool,
    pub source: FieldSource,
}

/// Shared inputs for resolving the channels of one request.
pub(crate) struct ChannelResolver<'a> {
    pub(crate) profile: &'a Profile,
    /// Data-source names the registry declares.
    pub(crate) declared: &'a BTreeSet<String>,
    /// Type and shape declared by the registry's components.
    pub(crate) metadata: &'a BTreeMap<String, DeclaredMetadata>,
    pub(crate) reach: &'a Reachability<'a>,
}

impl ChannelResolver<'_> {
    fn explicit_layer(&self, spec: &ChannelSpec) -> PropertyLayer {
        let props = self.profile.channel_properties();
        let name = spec.name.as_str();
        PropertyLayer {
            nexus_path: props.lookup(&props.nexus_path, name).cloned(),
            link: props.lookup(&props.link, name).copied(),
            data_type: props
                .lookup(&props.data_type, name)
                .cloned()
                .or_else(|| spec.dtype.clone()),
            shape: props
                .lookup(&props.shape, name)
                .cloned()
                .or_else(|| spec.shape.clone()),
        }
    }

    fn declared_layer(&self, spec: &ChannelSpec) -> PropertyLayer {
        let declared = self.metadata.get(&spec.name).cloned().unwrap_or_default();
        let pool = self.reach.channel(&spec.name);
        PropertyLayer {
            data_type: declared
                .data_type
                .or_else(|| pool.and_then(|channel| channel.data_type.clone())),
            shape: declared
                .shape
                .or_else(|| pool.map(|channel| channel.shape.clone())),
            ..Default::default()
        }
    }

    fn defaults_layer(&self, strategy: Strategy) -> PropertyLayer {
        PropertyLayer {
            nexus_path: Some(self.profile.default_dynamic_path().clone()),
            // init fields are only linked through an explicit override
            link: (strategy == Strategy::Step).then_some(*self.profile.default_dynamic_links()),
            ..Default::default()
        }
    }

    pub(crate) fn resolve(
        &self,
        spec: &ChannelSpec,
        strategy: Strategy,
        registry_body: impl FnOnce(&str) -> Result<String>,
    ) -> Result<ResolvedField> {
        let stack = LayerStack::new(
            self.explicit_layer(spec),
            self.declared_layer(spec),
            self.defaults_layer(strategy),
        );
        let data_type: String = stack
            .lookup(|l| l.data_type.as_ref())
            .unwrap_or_else(|| STRING_DTYPE.to_string());
        let shape: Vec<usize> = stack.lookup(|l| l.shape.as_ref()).unwrap_or_default();
        let link: bool = stack.lookup(|l| l.link.as_ref()).unwrap_or(false);
        let path = resolve_path(stack.path_candidates());

        let field_name = self
            .profile
            .channel_properties()
            .label_of(&spec.name)
            .map_or_else(|| spec.name.clone(), str::to_lowercase);

        let source = if self.declared.contains(&spec.name) {
            FieldSource::Declared(registry_body(&spec.name)?)
        } else {
            FieldSource::Synthesized(self.synthesize_source(&spec.name)?)
        };

        debug!(
            channel = %spec.name,
            field = %field_name,
            data_type = %data_type,
            ?shape,
            link,
            "resolved dynamic field"
        );
        Ok(ResolvedField {
            channel: spec.name.clone(),
            field_name,
            strategy,
            nexus_type: nexus_type(&data_type),
            shape,
            path,
            link,
            source,
        })
    }

    /// TANGO when the name answers as a live attribute, CLIENT otherwise.
    fn synthesize_source(&self, name: &str) -> Result<DataSourceDefinition> {
        Ok(match self.reach.attribute_address(name)? {
            Some(address) => match address.rsplit_once('/') {
                Some((device, attribute)) => DataSourceDefinition::tango(name, device, attribute),
                None => DataSourceDefinition::client(name, name),
            },
            None => DataSourceDefinition::client(name, name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_layers_in_order() {
        let stack = LayerStack::new(
            PropertyLayer {
                data_type: Some("int32".into()),
                ..Default::default()
            },
            PropertyLayer {
                data_type: Some("float64".into()),
                shape: Some(vec![2048]),
                ..Default::default()
            },
            PropertyLayer {
                link: Some(true),
                ..Default::default()
            },
        );
        assert_eq!(stack.lookup(|l| l.data_type.as_ref()).as_deref(), Some("int32"));
        assert_eq!(stack.lookup(|l| l.shape.as_ref()), Some(vec![2048]));
        assert_eq!(stack.lookup(|l| l.link.as_ref()), Some(true));
        assert_eq!(
            stack.lookup(|l| l.nexus_path.as_ref()).as_deref(),
            Some(DEFAULT_DYNAMIC_PATH)
        );
    }

    #[test]
    fn first_typed_usage_wins() {
        use daq_selector_core::{DataSourceKind, DataSourceUsage};

        let usage = |data_type: Option<&str>, shape: Option<Vec<usize>>| DataSourceUsage {
            strategy: Strategy::Step,
            kind: DataSourceKind::Client,
            record: "mca".into(),
            data_type: data_type.map(str::to_string),
            shape,
        };
        let mut description = ComponentDescription::new();
        description.entry("a_plain".into()).or_default().insert(
            "mca".into(),
            vec![usage(None, None)],
        );
        description.entry("b_typed".into()).or_default().insert(
            "mca".into(),
            vec![usage(Some("uint32"), Some(vec![2048]))],
        );
        description.entry("c_other".into()).or_default().insert(
            "mca".into(),
            vec![usage(Some("float64"), None)],
        );

        let metadata = declared_metadata(&description);
        assert_eq!(
            metadata["mca"],
            DeclaredMetadata {
                data_type: Some("uint32".into()),
                shape: Some(vec![2048]),
            }
        );
    }

    #[test]
    fn empty_layers_reach_fallback() {
        let stack = LayerStack::new(
            PropertyLayer::default(),
            PropertyLayer::default(),
            PropertyLayer::default(),
        );
        assert_eq!(stack.lookup(|l| l.data_type.as_ref()).as_deref(), Some("string"));
        assert_eq!(stack.lookup(|l| l.link.as_ref()), Some(false));
        assert_eq!(stack.lookup(|l| l.shape.as_ref()), Some(Vec::<usize>::new()));
    }
}
