//! Persisted acquisition profile.
//!
//! A [`Profile`] is the JSON document stored per acquisition-group name. It
//! holds the user's explicit selections, the recomputed preselection, the
//! per-channel overrides used by dynamic fragments and the references to the
//! remote services. Every field defaults, so a partially written or older
//! document loads as "not yet configured" for whatever is missing.
//!
//! Field access goes through generated getter/setter pairs; each setter
//! rewrites the in-memory document and nothing else. Persisting is an explicit
//! step performed by the session layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Schema version written into every profile.
pub const PROFILE_VERSION: &str = "3.0.0";

/// Default location of dynamically synthesized fields.
pub const DEFAULT_DYNAMIC_PATH: &str =
    "/$var.entryname#'scan'$var.serialno:NXentry/NXinstrument/collection";

/// Per-channel property overrides.
///
/// Each map is keyed by raw channel name or by the label assigned to the
/// channel; lookups try the raw name first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelProperties {
    /// Display labels.
    pub label: BTreeMap<String, String>,
    /// NeXus paths.
    pub nexus_path: BTreeMap<String, String>,
    /// Link flags.
    pub link: BTreeMap<String, bool>,
    /// Value types.
    pub data_type: BTreeMap<String, String>,
    /// Value shapes.
    pub shape: BTreeMap<String, Vec<usize>>,
}

/// The property maps of [`ChannelProperties`], addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelProperty {
    /// [`ChannelProperties::label`]
    Label,
    /// [`ChannelProperties::nexus_path`]
    NexusPath,
    /// [`ChannelProperties::link`]
    Link,
    /// [`ChannelProperties::data_type`]
    DataType,
    /// [`ChannelProperties::shape`]
    Shape,
}

impl ChannelProperties {
    /// Label assigned to `channel`, if any.
    pub fn label_of(&self, channel: &str) -> Option<&str> {
        self.label.get(channel).map(String::as_str)
    }

    /// Look `channel` up in `map`, then its assigned label.
    pub fn lookup<'a, T>(&self, map: &'a BTreeMap<String, T>, channel: &str) -> Option<&'a T> {
        map.get(channel)
            .or_else(|| self.label_of(channel).and_then(|label| map.get(label)))
    }

    /// Drop the `property` override stored for `channel`.
    pub fn clear(&mut self, property: ChannelProperty, channel: &str) {
        match property {
            ChannelProperty::Label => {
                self.label.remove(channel);
            }
            ChannelProperty::NexusPath => {
                self.nexus_path.remove(channel);
            }
            ChannelProperty::Link => {
                self.link.remove(channel);
            }
            ChannelProperty::DataType => {
                self.data_type.remove(channel);
            }
            ChannelProperty::Shape => {
                self.shape.remove(channel);
            }
        }
    }
}

/// Acquisition profile of one acquisition group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Profile {
    version: String,
    #[serde(rename = "MntGrp")]
    group: String,
    config_device: String,
    writer_device: String,
    #[serde(rename = "Door")]
    controller: String,
    component_selection: BTreeMap<String, bool>,
    component_preselection: BTreeMap<String, bool>,
    data_source_selection: BTreeMap<String, bool>,
    data_source_preselection: Vec<String>,
    optional_components: Vec<String>,
    init_data_sources: Vec<String>,
    unplotted_components: BTreeSet<String>,
    ordered_channels: Vec<String>,
    #[serde(rename = "Timer")]
    timers: Vec<String>,
    append_entry: bool,
    dynamic_components: bool,
    default_dynamic_links: bool,
    default_dynamic_path: String,
    channel_properties: ChannelProperties,
    user_data: BTreeMap<String, Value>,
    config_variables: BTreeMap<String, String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            version: PROFILE_VERSION.to_string(),
            group: String::new(),
            config_device: String::new(),
            writer_device: String::new(),
            controller: String::new(),
            component_selection: BTreeMap::new(),
            component_preselection: BTreeMap::new(),
            data_source_selection: BTreeMap::new(),
            data_source_preselection: Vec::new(),
            optional_components: Vec::new(),
            init_data_sources: Vec::new(),
            unplotted_components: BTreeSet::new(),
            ordered_channels: Vec::new(),
            timers: Vec::new(),
            append_entry: false,
            dynamic_components: true,
            default_dynamic_links: true,
            default_dynamic_path: DEFAULT_DYNAMIC_PATH.to_string(),
            channel_properties: ChannelProperties::default(),
            user_data: BTreeMap::new(),
            config_variables: BTreeMap::new(),
        }
    }
}

macro_rules! profile_accessors {
    ($($(#[$doc:meta])* $field:ident, $setter:ident, $mutator:ident : $ty:ty;)*) => {
        impl Profile {
            $(
                $(#[$doc])*
                pub fn $field(&self) -> &$ty {
                    &self.$field
                }

                #[doc = concat!("Replace `", stringify!($field), "`.")]
                pub fn $setter(&mut self, value: $ty) -> &mut Self {
                    self.$field = value;
                    self
                }

                #[doc = concat!("Mutable access to `", stringify!($field), "`.")]
                pub fn $mutator(&mut self) -> &mut $ty {
                    &mut self.$field
                }
            )*
        }
    };
}

profile_accessors! {
    /// Profile schema version.
    version, set_version, version_mut: String;
    /// Acquisition-group name the profile belongs to.
    group, set_group, group_mut: String;
    /// Address of the configuration registry.
    config_device, set_config_device, config_device_mut: String;
    /// Address of the data writer.
    writer_device, set_writer_device, writer_device_mut: String;
    /// Address of the acquisition controller.
    controller, set_controller, controller_mut: String;
    /// Explicit user selection of components.
    component_selection, set_component_selection, component_selection_mut: BTreeMap<String, bool>;
    /// Recomputed preselection of components.
    component_preselection, set_component_preselection, component_preselection_mut: BTreeMap<String, bool>;
    /// Explicit user selection of data sources.
    data_source_selection, set_data_source_selection, data_source_selection_mut: BTreeMap<String, bool>;
    /// Data-source names discovered from hardware.
    data_source_preselection, set_data_source_preselection, data_source_preselection_mut: Vec<String>;
    /// Components offered to the user but never auto-selected.
    optional_components, set_optional_components, optional_components_mut: Vec<String>;
    /// Data sources read once at scan start.
    init_data_sources, set_init_data_sources, init_data_sources_mut: Vec<String>;
    /// Components and channels excluded from plotting.
    unplotted_components, set_unplotted_components, unplotted_components_mut: BTreeSet<String>;
    /// Display and priority order of channels.
    ordered_channels, set_ordered_channels, ordered_channels_mut: Vec<String>;
    /// Declared timers; the first one is the primary timer.
    timers, set_timers, timers_mut: Vec<String>;
    /// Append scans to the current file entry.
    append_entry, set_append_entry, append_entry_mut: bool;
    /// Whether dynamic fragments are created for ad hoc channels.
    dynamic_components, set_dynamic_components, dynamic_components_mut: bool;
    /// Link dynamic STEP fields into `data:NXdata` by default.
    default_dynamic_links, set_default_dynamic_links, default_dynamic_links_mut: bool;
    /// NeXus path for dynamic fields without an override.
    default_dynamic_path, set_default_dynamic_path, default_dynamic_path_mut: String;
    /// Per-channel property overrides.
    channel_properties, set_channel_properties, channel_properties_mut: ChannelProperties;
    /// Free-form user metadata.
    user_data, set_user_data, user_data_mut: BTreeMap<String, Value>;
    /// Values substituted for `$var.NAME` tokens.
    config_variables, set_config_variables, config_variables_mut: BTreeMap<String, String>;
}

impl Profile {
    /// Fresh profile for `group` with every other field at its default.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }

    /// Explicitly select or deselect a component.
    pub fn select_component(&mut self, name: impl Into<String>, selected: bool) -> &mut Self {
        self.component_selection.insert(name.into(), selected);
        self
    }

    /// Explicitly select or deselect a data source.
    pub fn select_data_source(&mut self, name: impl Into<String>, selected: bool) -> &mut Self {
        self.data_source_selection.insert(name.into(), selected);
        self
    }

    /// Set one per-channel override; `None` clears it.
    pub fn set_channel_label(&mut self, channel: &str, label: Option<String>) -> &mut Self {
        match label {
            Some(label) => {
                self.channel_properties
                    .label
                    .insert(channel.to_string(), label);
            }
            None => self
                .channel_properties
                .clear(ChannelProperty::Label, channel),
        }
        self
    }

    /// Whether the stored schema version matches [`PROFILE_VERSION`].
    pub fn is_current_version(&self) -> bool {
        self.version == PROFILE_VERSION
    }

    /// Encode as the stored JSON document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode a stored document, degrading instead of failing.
    ///
    /// Unparseable text yields a default profile. Fields that are present but
    /// do not deserialize are dropped one by one and keep their defaults; each
    /// drop is logged.
    pub fn from_json_lossy(text: &str) -> Self {
        if let Ok(profile) = serde_json::from_str::<Profile>(text) {
            return profile;
        }
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(text) else {
            warn!("stored profile is not a JSON object; using defaults");
            return Self::default();
        };
        let mut merged = match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map,
            _ => return Self::default(),
        };
        for (key, value) in fields {
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value);
            if serde_json::from_value::<Profile>(Value::Object(candidate.clone())).is_ok() {
                merged = candidate;
            } else {
                warn!(field = %key, "discarding malformed profile field");
            }
        }
        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_dynamic_components() {
        let profile = Profile::new("mg1");
        assert_eq!(profile.group(), "mg1");
        assert!(*profile.dynamic_components());
        assert!(*profile.default_dynamic_links());
        assert_eq!(profile.default_dynamic_path(), DEFAULT_DYNAMIC_PATH);
        assert!(profile.is_current_version());
    }

    #[test]
    fn setters_chain_and_rewrite_fields() {
        let mut profile = Profile::default();
        profile
            .set_timers(vec!["ct01".into()])
            .set_append_entry(true)
            .select_component("slit1", true);
        assert_eq!(profile.timers(), &vec!["ct01".to_string()]);
        assert!(*profile.append_entry());
        assert_eq!(profile.component_selection().get("slit1"), Some(&true));
    }

    #[test]
    fn json_uses_stored_key_names() {
        let mut profile = Profile::new("mg1");
        profile.set_timers(vec!["ct01".into()]);
        let json: Value = serde_json::from_str(&profile.to_json().unwrap()).unwrap();
        assert_eq!(json["MntGrp"], "mg1");
        assert_eq!(json["Timer"][0], "ct01");
        assert!(json.get("ComponentSelection").is_some());
        assert!(json.get("DefaultDynamicPath").is_some());
    }

    #[test]
    fn missing_fields_default() {
        let profile = Profile::from_json_lossy(r#"{"MntGrp": "mg2"}"#);
        assert_eq!(profile.group(), "mg2");
        assert!(profile.component_selection().is_empty());
        assert!(*profile.dynamic_components());
    }

    #[test]
    fn malformed_field_is_dropped_others_kept() {
        let profile =
            Profile::from_json_lossy(r#"{"MntGrp": "mg3", "Timer": 17, "AppendEntry": true}"#);
        assert_eq!(profile.group(), "mg3");
        assert!(profile.timers().is_empty());
        assert!(*profile.append_entry());
    }

    #[test]
    fn garbage_yields_default() {
        assert_eq!(Profile::from_json_lossy("not json"), Profile::default());
    }

    #[test]
    fn channel_property_lookup_falls_back_to_label() {
        let mut props = ChannelProperties::default();
        props.label.insert("exp_c01".into(), "Counter1".into());
        props.data_type.insert("Counter1".into(), "int32".into());
        props.data_type.insert("exp_c02".into(), "float64".into());
        assert_eq!(
            props.lookup(&props.data_type, "exp_c01").map(String::as_str),
            Some("int32")
        );
        assert_eq!(
            props.lookup(&props.data_type, "exp_c02").map(String::as_str),
            Some("float64")
        );
        assert!(props.lookup(&props.shape, "exp_c01").is_none());
    }
}
