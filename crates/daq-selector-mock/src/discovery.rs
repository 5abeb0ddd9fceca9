//! Simulated device pools.

use daq_selector_core::{ChannelInfo, DeviceDiscovery, PoolFilter, Result, TangoAddress};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A channel together with the pool that exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolChannel {
    /// Pool the channel belongs to.
    pub pool: String,
    /// Channel as the pool reports it.
    #[serde(flatten)]
    pub info: ChannelInfo,
}

#[derive(Debug, Default)]
pub(crate) struct DiscoveryState {
    pub(crate) channels: Vec<PoolChannel>,
    pub(crate) aliases: BTreeMap<String, String>,
    /// Reachable `device/attribute` addresses, lowercased.
    pub(crate) attributes: BTreeSet<String>,
}

/// Device discovery backed by a fixed channel list.
///
/// Every pool channel answers on its `Value` attribute and doubles as an
/// alias of its own address, as pool elements do on a real control system.
#[derive(Debug, Default)]
pub struct MockDiscovery {
    pub(crate) state: RwLock<DiscoveryState>,
}

impl MockDiscovery {
    /// Discovery without pools.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a counter-like channel owned by `controller`.
    pub fn with_channel(self, pool: &str, name: &str, address: &str, controller: &str) -> Self {
        self.add_channel(
            pool,
            ChannelInfo {
                name: name.to_string(),
                address: address.to_string(),
                controller: Some(controller.to_string()),
                capabilities: vec!["CTExpChannel".to_string()],
                data_type: Some("float64".to_string()),
                shape: Vec::new(),
            },
        );
        self
    }

    /// Register `alias` for `address`.
    pub fn with_alias(self, alias: &str, address: &str) -> Self {
        self.state
            .write()
            .aliases
            .insert(alias.to_string(), address.to_string());
        self
    }

    /// Mark `device/attribute` as reachable.
    pub fn with_attribute(self, address: &str) -> Self {
        self.add_attribute(address);
        self
    }

    /// Add or replace a channel of `pool`.
    pub fn add_channel(&self, pool: &str, info: ChannelInfo) {
        let mut state = self.state.write();
        state.channels.retain(|c| c.info.name != info.name);
        state.channels.push(PoolChannel {
            pool: pool.to_string(),
            info,
        });
    }

    /// Drop channel `name` from every pool.
    pub fn remove_channel(&self, name: &str) {
        self.state.write().channels.retain(|c| c.info.name != name);
    }

    /// Mark `device/attribute` as reachable.
    pub fn add_attribute(&self, address: &str) {
        let local = TangoAddress::parse(address).local().to_lowercase();
        self.state.write().attributes.insert(local);
    }
}

impl DeviceDiscovery for MockDiscovery {
    fn list_channels(&self, filter: &PoolFilter) -> Result<Vec<ChannelInfo>> {
        Ok(self
            .state
            .read()
            .channels
            .iter()
            .filter(|c| filter.accepts(&c.pool))
            .map(|c| c.info.clone())
            .collect())
    }

    fn resolve_alias(&self, name: &str) -> Result<Option<String>> {
        let state = self.state.read();
        if let Some(address) = state.aliases.get(name) {
            return Ok(Some(address.clone()));
        }
        Ok(state
            .channels
            .iter()
            .find(|c| c.info.name == name)
            .map(|c| c.info.address.clone()))
    }

    fn attribute_exists(&self, address: &str) -> Result<bool> {
        let parsed = TangoAddress::parse(address);
        let local = parsed.local().to_lowercase();
        let state = self.state.read();
        if state.attributes.contains(&local) {
            return Ok(true);
        }
        Ok(parsed.attribute.eq_ignore_ascii_case("value")
            && state
                .channels
                .iter()
                .any(|c| c.info.address.eq_ignore_ascii_case(&parsed.device)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> MockDiscovery {
        MockDiscovery::new()
            .with_channel("pool1", "exp_c01", "expchan/ctctrl01/1", "ctctrl01")
            .with_channel("pool2", "exp_c02", "expchan/ctctrl02/1", "ctctrl02")
            .with_alias("exp_mot01", "motor/motctrl01/1")
            .with_attribute("motor/motctrl01/1/Position")
    }

    #[test]
    fn filter_selects_pools() {
        let d = discovery();
        assert_eq!(d.list_channels(&PoolFilter::default()).unwrap().len(), 2);
        let filter = PoolFilter {
            pools: vec![],
            blacklist: vec!["pool2".into()],
        };
        let names: Vec<String> = d
            .list_channels(&filter)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["exp_c01"]);
    }

    #[test]
    fn channel_names_resolve_as_aliases() {
        let d = discovery();
        assert_eq!(
            d.resolve_alias("exp_c01").unwrap().as_deref(),
            Some("expchan/ctctrl01/1")
        );
        assert_eq!(
            d.resolve_alias("exp_mot01").unwrap().as_deref(),
            Some("motor/motctrl01/1")
        );
        assert!(d.resolve_alias("ghost").unwrap().is_none());
    }

    #[test]
    fn attributes_answer_case_insensitively() {
        let d = discovery();
        assert!(d.attribute_exists("motor/motctrl01/1/position").unwrap());
        assert!(d.attribute_exists("haso:10000/motor/motctrl01/1/Position").unwrap());
        assert!(d.attribute_exists("expchan/ctctrl01/1/Value").unwrap());
        assert!(!d.attribute_exists("expchan/ctctrl01/1/Position").unwrap());
        assert!(!d.attribute_exists("p09/none/1/Value").unwrap());
    }
}
