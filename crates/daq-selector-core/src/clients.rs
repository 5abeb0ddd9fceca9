//! Collaborator interfaces.
//!
//! The selector talks to three remote services. Each is a small synchronous
//! trait so the resolution logic can run against live services, recorded
//! snapshots or in-memory mocks alike:
//!
//! - [`ConfigRegistry`]: components, data sources, dynamic fragments and the
//!   stored profile documents.
//! - [`DeviceDiscovery`]: hardware channels of the device pools and alias
//!   resolution.
//! - [`LiveGroupStore`]: the live acquisition-group descriptors and the
//!   currently active group pointer.
//!
//! Every call blocks until the service answers. Nothing is cached between
//! calls; implementations are expected to reflect the current remote state.

use crate::datasource::{DataSourceKind, Strategy};
use crate::descriptor::GroupDescriptor;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One data-source reference inside a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceUsage {
    /// Strategy the component reads the data source with.
    pub strategy: Strategy,
    /// Kind of the referenced data source.
    pub kind: DataSourceKind,
    /// Canonical record (see [`crate::DataSource::record`]).
    pub record: String,
    /// Declared field type, when the component states one.
    #[serde(default)]
    pub data_type: Option<String>,
    /// Declared field shape, when the component states one.
    #[serde(default)]
    pub shape: Option<Vec<usize>>,
}

/// `component -> data source -> usages`, as returned by [`ConfigRegistry::describe`].
pub type ComponentDescription = BTreeMap<String, BTreeMap<String, Vec<DataSourceUsage>>>;

/// Device pools to enumerate and pools to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolFilter {
    /// Pools to query; empty means every known pool.
    #[serde(default)]
    pub pools: Vec<String>,
    /// Pools never queried, even when listed in `pools`.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl PoolFilter {
    /// Whether `pool` passes the filter.
    pub fn accepts(&self, pool: &str) -> bool {
        (self.pools.is_empty() || self.pools.iter().any(|p| p == pool))
            && !self.blacklist.iter().any(|p| p == pool)
    }
}

/// A hardware channel exposed by a device pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel name as known to the pool.
    pub name: String,
    /// Hardware address (device name) of the channel.
    pub address: String,
    /// Owning controller; `None` when the pool lost track of it.
    #[serde(default)]
    pub controller: Option<String>,
    /// Pool capability tags, e.g. `CTExpChannel`.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Value type reported by the pool.
    #[serde(default)]
    pub data_type: Option<String>,
    /// Value shape; empty for scalars.
    #[serde(default)]
    pub shape: Vec<usize>,
}

/// Query/command interface of the configuration registry.
pub trait ConfigRegistry: Send + Sync {
    /// Names of all registered components, dynamic fragments included.
    fn list_components(&self) -> Result<Vec<String>>;

    /// Names of all registered data sources.
    fn list_data_sources(&self) -> Result<Vec<String>>;

    /// Components the registry policy always activates.
    fn mandatory_components(&self) -> Result<Vec<String>>;

    /// XML body of component `name`.
    fn fetch_component(&self, name: &str) -> Result<String>;

    /// XML body of data source `name`.
    fn fetch_data_source(&self, name: &str) -> Result<String>;

    /// Data-source references of `components`, optionally filtered.
    ///
    /// Unknown component names are skipped.
    fn describe(
        &self,
        components: &[String],
        strategy: Option<Strategy>,
        kind: Option<DataSourceKind>,
    ) -> Result<ComponentDescription>;

    /// Materialize one composite document from the named components.
    fn merge(&self, components: &[String]) -> Result<String>;

    /// Register a dynamic fragment.
    fn create_fragment(&self, name: &str, body: &str) -> Result<()>;

    /// Delete dynamic fragment `name`; fails for names never created.
    fn remove_fragment(&self, name: &str) -> Result<()>;

    /// Persist a profile document under an acquisition-group name.
    fn store_selection(&self, name: &str, document: &str) -> Result<()>;

    /// Stored profile document of group `name`.
    fn fetch_selection(&self, name: &str) -> Result<Option<String>>;

    /// Forget the stored profile of group `name`.
    fn delete_selection(&self, name: &str) -> Result<()>;

    /// Group names with a stored profile.
    fn list_selections(&self) -> Result<Vec<String>>;
}

/// Hardware channel enumeration and reachability.
pub trait DeviceDiscovery: Send + Sync {
    /// Channels of every pool accepted by `filter`, in pool order.
    fn list_channels(&self, filter: &PoolFilter) -> Result<Vec<ChannelInfo>>;

    /// Hardware address behind an alias.
    fn resolve_alias(&self, name: &str) -> Result<Option<String>>;

    /// Whether a `device/attribute` address answers.
    fn attribute_exists(&self, address: &str) -> Result<bool>;
}

/// Read/write access to the live acquisition-group descriptors.
pub trait LiveGroupStore: Send + Sync {
    /// Descriptor of group `name`, if it exists.
    fn read_group(&self, name: &str) -> Result<Option<GroupDescriptor>>;

    /// Create or replace the descriptor of group `name`.
    fn write_group(&self, name: &str, descriptor: &GroupDescriptor) -> Result<()>;

    /// Remove group `name`; clears the active pointer when it named it.
    fn delete_group(&self, name: &str) -> Result<()>;

    /// Group the acquisition runtime currently points at.
    fn active_group(&self) -> Result<Option<String>>;

    /// Point the acquisition runtime at group `name`.
    fn set_active_group(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_filter_honours_blacklist() {
        let filter = PoolFilter {
            pools: vec![],
            blacklist: vec!["pool_old".into()],
        };
        assert!(filter.accepts("pool1"));
        assert!(!filter.accepts("pool_old"));

        let only = PoolFilter {
            pools: vec!["pool1".into()],
            blacklist: vec![],
        };
        assert!(only.accepts("pool1"));
        assert!(!only.accepts("pool2"));
    }
}
