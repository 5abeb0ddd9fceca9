//! Recorded environment snapshots.
//!
//! A snapshot is one JSON file describing the registry, the device pools and
//! the live groups. The CLI and the integration tests run the selector against
//! a [`MockEnvironment`] built from such a file.

use crate::discovery::{MockDiscovery, PoolChannel};
use crate::live::MockLiveGroups;
use crate::registry::{ComponentSpec, MockRegistry};
use daq_selector_core::{DataSourceDefinition, GroupDescriptor, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Recorded state of the registry, the device pools and the live groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSnapshot {
    /// Component specs keyed by name.
    pub components: BTreeMap<String, ComponentSpec>,
    /// Components the registry always activates.
    pub mandatory_components: Vec<String>,
    /// Data-source definitions.
    pub data_sources: Vec<DataSourceDefinition>,
    /// Dynamic fragments registered at the time of the recording.
    pub fragments: BTreeMap<String, String>,
    /// Stored profiles keyed by group name.
    pub selections: BTreeMap<String, Value>,
    /// Channels with the pool they belong to.
    pub channels: Vec<PoolChannel>,
    /// Alias to hardware address.
    pub aliases: BTreeMap<String, String>,
    /// Reachable `device/attribute` addresses.
    pub attributes: Vec<String>,
    /// Live descriptors keyed by group.
    pub groups: BTreeMap<String, GroupDescriptor>,
    /// Group the runtime points at.
    pub active_group: Option<String>,
}

/// The three mock services sharing one recorded state.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    /// Shared registry handle.
    pub registry: Arc<MockRegistry>,
    /// Shared discovery handle.
    pub discovery: Arc<MockDiscovery>,
    /// Shared live-group handle.
    pub live: Arc<MockLiveGroups>,
}

impl MockEnvironment {
    /// Wrap the three mocks in shared handles.
    pub fn new(registry: MockRegistry, discovery: MockDiscovery, live: MockLiveGroups) -> Self {
        Self {
            registry: Arc::new(registry),
            discovery: Arc::new(discovery),
            live: Arc::new(live),
        }
    }

    /// Build the three mocks from `snapshot`.
    pub fn from_snapshot(snapshot: EnvironmentSnapshot) -> Result<Self> {
        let registry = MockRegistry::new();
        {
            let mut state = registry.state.write();
            state.components = snapshot.components;
            state.mandatory = snapshot.mandatory_components.into_iter().collect();
            state.fragments = snapshot.fragments;
            for (name, profile) in snapshot.selections {
                state.selections.insert(name, profile.to_string());
            }
        }
        for definition in &snapshot.data_sources {
            registry.add_data_source(definition)?;
        }

        let discovery = MockDiscovery::new();
        for channel in snapshot.channels {
            discovery.add_channel(&channel.pool, channel.info);
        }
        for address in &snapshot.attributes {
            discovery.add_attribute(address);
        }
        discovery.state.write().aliases = snapshot.aliases;

        let live = MockLiveGroups::new();
        {
            let mut state = live.state.write();
            state.groups = snapshot.groups;
            state.active = snapshot.active_group;
        }
        Ok(Self::new(registry, discovery, live))
    }

    /// Read a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let snapshot: EnvironmentSnapshot = serde_json::from_str(&text)?;
        info!(path = %path.display(), "loaded environment snapshot");
        Self::from_snapshot(snapshot)
    }

    /// Capture the current state of all three services.
    pub fn snapshot(&self) -> Result<EnvironmentSnapshot> {
        let registry = self.registry.state.read();
        let data_sources = registry
            .data_sources
            .values()
            .map(|body| DataSourceDefinition::from_xml(body))
            .collect::<Result<Vec<_>>>()?;
        let selections = registry
            .selections
            .iter()
            .map(|(name, text)| {
                let value = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()));
                (name.clone(), value)
            })
            .collect();
        let discovery = self.discovery.state.read();
        let live = self.live.state.read();
        Ok(EnvironmentSnapshot {
            components: registry.components.clone(),
            mandatory_components: registry.mandatory.iter().cloned().collect(),
            data_sources,
            fragments: registry.fragments.clone(),
            selections,
            channels: discovery.channels.clone(),
            aliases: discovery.aliases.clone(),
            attributes: discovery.attributes.iter().cloned().collect(),
            groups: live.groups.clone(),
            active_group: live.active.clone(),
        })
    }

    /// Write the current state to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.snapshot()?)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "saved environment snapshot");
        Ok(())
    }
}
