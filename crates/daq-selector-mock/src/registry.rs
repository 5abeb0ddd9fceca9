//! In-memory configuration registry.

use daq_selector_core::xml::{copy_definition_children, document_writer, finish, DEFINITION_TAG};
use daq_selector_core::{
    ComponentDescription, ConfigRegistry, DataSourceDefinition, DataSourceKind, DataSourceUsage,
    Result, SelectorError, Strategy,
};
use parking_lot::RwLock;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// A data-source reference declared by a mock component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentField {
    /// Referenced data-source name.
    pub data_source: String,
    /// Strategy the component reads it with.
    pub strategy: Strategy,
    /// Declared field type.
    #[serde(default)]
    pub data_type: Option<String>,
    /// Declared field shape.
    #[serde(default)]
    pub shape: Option<Vec<usize>>,
}

impl ComponentField {
    /// STEP reference to `data_source`.
    pub fn step(data_source: impl Into<String>) -> Self {
        Self::new(data_source, Strategy::Step)
    }

    /// Reference to `data_source` read with `strategy`.
    pub fn new(data_source: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            data_source: data_source.into(),
            strategy,
            data_type: None,
            shape: None,
        }
    }

    /// Declare type and shape on the field.
    pub fn with_type(mut self, data_type: impl Into<String>, shape: Vec<usize>) -> Self {
        self.data_type = Some(data_type.into());
        self.shape = Some(shape);
        self
    }
}

/// Structured definition of a mock component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Fields in document order.
    #[serde(default)]
    pub fields: Vec<ComponentField>,
}

impl ComponentSpec {
    /// Spec with `fields`.
    pub fn with_fields(fields: Vec<ComponentField>) -> Self {
        Self { fields }
    }

    /// Render the registry body of component `name`.
    pub fn to_xml(&self, name: &str) -> Result<String> {
        let mut writer = document_writer()?;
        writer.write_event(Event::Start(BytesStart::new(DEFINITION_TAG)))?;
        let mut group = BytesStart::new("group");
        group.push_attribute(("type", "NXcollection"));
        group.push_attribute(("name", name));
        writer.write_event(Event::Start(group))?;
        for field in &self.fields {
            let mut start = BytesStart::new("field");
            start.push_attribute(("name", field.data_source.as_str()));
            writer.write_event(Event::Start(start))?;
            let mut strategy = BytesStart::new("strategy");
            strategy.push_attribute(("mode", field.strategy.as_str()));
            writer.write_event(Event::Empty(strategy))?;
            let reference = format!("$datasources.{}", field.data_source);
            writer.write_event(Event::Text(BytesText::new(&reference)))?;
            writer.write_event(Event::End(BytesEnd::new("field")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("group")))?;
        writer.write_event(Event::End(BytesEnd::new(DEFINITION_TAG)))?;
        finish(writer)
    }
}

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) components: BTreeMap<String, ComponentSpec>,
    pub(crate) data_sources: BTreeMap<String, String>,
    pub(crate) mandatory: BTreeSet<String>,
    pub(crate) fragments: BTreeMap<String, String>,
    pub(crate) selections: BTreeMap<String, String>,
}

/// Configuration registry held entirely in memory.
///
/// Component bodies are rendered from [`ComponentSpec`]s on demand; data
/// sources are stored as their XML bodies.
#[derive(Debug, Default)]
pub struct MockRegistry {
    pub(crate) state: RwLock<RegistryState>,
}

impl MockRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add component `name`.
    pub fn with_component(self, name: &str, fields: Vec<ComponentField>) -> Self {
        self.add_component(name, ComponentSpec::with_fields(fields));
        self
    }

    /// Add component `name` and mark it mandatory.
    pub fn with_mandatory_component(self, name: &str, fields: Vec<ComponentField>) -> Self {
        self.add_component(name, ComponentSpec::with_fields(fields));
        self.state.write().mandatory.insert(name.to_string());
        self
    }

    /// Register `definition` as a data source.
    pub fn with_data_source(self, definition: DataSourceDefinition) -> Result<Self> {
        self.add_data_source(&definition)?;
        Ok(self)
    }

    /// Add or replace component `name`.
    pub fn add_component(&self, name: &str, spec: ComponentSpec) {
        self.state.write().components.insert(name.to_string(), spec);
    }

    /// Remove component `name`, mandatory or not.
    pub fn remove_component(&self, name: &str) {
        let mut state = self.state.write();
        state.components.remove(name);
        state.mandatory.remove(name);
    }

    /// Store the XML body of `definition`.
    pub fn add_data_source(&self, definition: &DataSourceDefinition) -> Result<()> {
        let body = definition.to_xml()?;
        self.add_data_source_body(&definition.name, body);
        Ok(())
    }

    /// Store a verbatim data-source body under `name`.
    pub fn add_data_source_body(&self, name: &str, body: String) {
        self.state.write().data_sources.insert(name.to_string(), body);
    }

    /// Names of the dynamic fragments currently registered.
    pub fn fragment_names(&self) -> Vec<String> {
        self.state.read().fragments.keys().cloned().collect()
    }

    /// Body of dynamic fragment `name`.
    pub fn fragment_body(&self, name: &str) -> Option<String> {
        self.state.read().fragments.get(name).cloned()
    }
}

impl ConfigRegistry for MockRegistry {
    fn list_components(&self) -> Result<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .components
            .keys()
            .chain(state.fragments.keys())
            .cloned()
            .collect())
    }

    fn list_data_sources(&self) -> Result<Vec<String>> {
        Ok(self.state.read().data_sources.keys().cloned().collect())
    }

    fn mandatory_components(&self) -> Result<Vec<String>> {
        Ok(self.state.read().mandatory.iter().cloned().collect())
    }

    fn fetch_component(&self, name: &str) -> Result<String> {
        let state = self.state.read();
        if let Some(body) = state.fragments.get(name) {
            return Ok(body.clone());
        }
        state
            .components
            .get(name)
            .ok_or_else(|| SelectorError::UnknownComponent {
                name: name.to_string(),
            })?
            .to_xml(name)
    }

    fn fetch_data_source(&self, name: &str) -> Result<String> {
        self.state
            .read()
            .data_sources
            .get(name)
            .cloned()
            .ok_or_else(|| SelectorError::UnknownDataSource {
                name: name.to_string(),
            })
    }

    fn describe(
        &self,
        components: &[String],
        strategy: Option<Strategy>,
        kind: Option<DataSourceKind>,
    ) -> Result<ComponentDescription> {
        let state = self.state.read();
        let mut description = ComponentDescription::new();
        for name in components {
            let Some(spec) = state.components.get(name) else {
                debug!(component = %name, "describe skips unknown component");
                continue;
            };
            let entry = description.entry(name.clone()).or_default();
            for field in &spec.fields {
                if strategy.is_some_and(|s| s != field.strategy) {
                    continue;
                }
                let Some(body) = state.data_sources.get(&field.data_source) else {
                    warn!(component = %name, data_source = %field.data_source, "component references an unregistered data source");
                    continue;
                };
                let definition = DataSourceDefinition::from_xml(body)?;
                let ds_kind = definition.source.kind();
                if kind.is_some_and(|k| k != ds_kind) {
                    continue;
                }
                entry
                    .entry(field.data_source.clone())
                    .or_default()
                    .push(DataSourceUsage {
                        strategy: field.strategy,
                        kind: ds_kind,
                        record: definition.source.record(),
                        data_type: field.data_type.clone(),
                        shape: field.shape.clone(),
                    });
            }
        }
        Ok(description)
    }

    fn merge(&self, components: &[String]) -> Result<String> {
        let bodies = components
            .iter()
            .map(|name| self.fetch_component(name))
            .collect::<Result<Vec<_>>>()?;
        let mut writer = document_writer()?;
        writer.write_event(Event::Start(BytesStart::new(DEFINITION_TAG)))?;
        for body in &bodies {
            copy_definition_children(body, &mut writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(DEFINITION_TAG)))?;
        finish(writer)
    }

    fn create_fragment(&self, name: &str, body: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.components.contains_key(name) || state.fragments.contains_key(name) {
            return Err(SelectorError::Registry(format!(
                "component '{name}' is already registered"
            )));
        }
        state.fragments.insert(name.to_string(), body.to_string());
        Ok(())
    }

    fn remove_fragment(&self, name: &str) -> Result<()> {
        self.state
            .write()
            .fragments
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SelectorError::UnknownFragment {
                name: name.to_string(),
            })
    }

    fn store_selection(&self, name: &str, document: &str) -> Result<()> {
        self.state
            .write()
            .selections
            .insert(name.to_string(), document.to_string());
        Ok(())
    }

    fn fetch_selection(&self, name: &str) -> Result<Option<String>> {
        Ok(self.state.read().selections.get(name).cloned())
    }

    fn delete_selection(&self, name: &str) -> Result<()> {
        self.state.write().selections.remove(name);
        Ok(())
    }

    fn list_selections(&self) -> Result<Vec<String>> {
        Ok(self.state.read().selections.keys().cloned().collect())
    }
}
