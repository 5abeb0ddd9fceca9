//! Hardware reachability checks used by the preselection.

use daq_selector_core::{
    ChannelInfo, DataSourceKind, DataSourceUsage, DeviceDiscovery, PoolFilter, Result,
    TangoAddress, UnresolvedReason,
};

/// One discovery listing plus alias/attribute lookups.
///
/// Built fresh for every top-level call; never kept between calls.
pub(crate) struct Reachability<'a> {
    discovery: &'a dyn DeviceDiscovery,
    channels: Vec<ChannelInfo>,
}

impl<'a> Reachability<'a> {
    pub(crate) fn scan(discovery: &'a dyn DeviceDiscovery, filter: &PoolFilter) -> Result<Self> {
        Ok(Self {
            discovery,
            channels: discovery.list_channels(filter)?,
        })
    }

    pub(crate) fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub(crate) fn channel(&self, name: &str) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Why `usage` cannot be satisfied, or `None` when it can.
    pub(crate) fn check(&self, usage: &DataSourceUsage) -> Result<Option<UnresolvedReason>> {
        let reachable = match usage.kind {
            DataSourceKind::Tango => self.tango_reachable(&usage.record)?,
            DataSourceKind::Client => self.client_discovered(&usage.record)?,
            _ => return Ok(None),
        };
        if reachable {
            return Ok(None);
        }
        let record = usage.record.clone();
        Ok(Some(match usage.kind {
            DataSourceKind::Tango => UnresolvedReason::TangoUnreachable { record },
            _ => UnresolvedReason::ClientNotDiscovered { record },
        }))
    }

    /// A `device/attribute` record answers, directly or through a device alias.
    pub(crate) fn tango_reachable(&self, record: &str) -> Result<bool> {
        let address = TangoAddress::parse(record);
        if address.device.is_empty() || address.attribute.is_empty() {
            return Ok(false);
        }
        if self.discovery.attribute_exists(record)? {
            return Ok(true);
        }
        if address.is_alias() {
            if let Some(device) = self.discovery.resolve_alias(&address.device)? {
                return self
                    .discovery
                    .attribute_exists(&format!("{device}/{}", address.attribute));
            }
        }
        Ok(false)
    }

    /// A client record names a discovered channel, directly or through an alias.
    pub(crate) fn client_discovered(&self, record: &str) -> Result<bool> {
        if self.channel(record).is_some() {
            return Ok(true);
        }
        Ok(match self.discovery.resolve_alias(record)? {
            Some(address) => self.channels.iter().any(|c| c.address == address),
            None => false,
        })
    }

    /// Tango attribute address a channel name stands for, if it answers.
    ///
    /// Pool channels and bare device aliases read their `Value` attribute.
    pub(crate) fn attribute_address(&self, name: &str) -> Result<Option<String>> {
        let device = match self.channel(name) {
            Some(channel) => Some(channel.address.clone()),
            None => self.discovery.resolve_alias(name)?,
        };
        let Some(device) = device else {
            return Ok(None);
        };
        let address = match device.split('/').filter(|s| !s.is_empty()).count() {
            3 => format!("{device}/Value"),
            4 => device,
            _ => return Ok(None),
        };
        Ok(self
            .discovery
            .attribute_exists(&address)?
            .then_some(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_selector_core::Strategy;
    use daq_selector_mock::MockDiscovery;

    fn usage(kind: DataSourceKind, record: &str) -> DataSourceUsage {
        DataSourceUsage {
            strategy: Strategy::Step,
            kind,
            record: record.into(),
            data_type: None,
            shape: None,
        }
    }

    #[test]
    fn tango_through_alias() {
        let discovery = MockDiscovery::new()
            .with_alias("exp_mot01", "motor/motctrl01/1")
            .with_attribute("motor/motctrl01/1/Position");
        let reach = Reachability::scan(&discovery, &PoolFilter::default()).unwrap();
        assert!(reach.tango_reachable("exp_mot01/Position").unwrap());
        assert!(reach.tango_reachable("motor/motctrl01/1/Position").unwrap());
        assert!(!reach.tango_reachable("Position").unwrap());
        assert!(!reach.tango_reachable("exp_mot02/Position").unwrap());
    }

    #[test]
    fn client_records_must_be_discovered() {
        let discovery = MockDiscovery::new()
            .with_channel("pool1", "exp_c01", "expchan/ctctrl01/1", "ctctrl01")
            .with_alias("counter1", "expchan/ctctrl01/1");
        let reach = Reachability::scan(&discovery, &PoolFilter::default()).unwrap();
        assert!(reach.check(&usage(DataSourceKind::Client, "exp_c01")).unwrap().is_none());
        assert!(reach.check(&usage(DataSourceKind::Client, "counter1")).unwrap().is_none());
        assert_eq!(
            reach.check(&usage(DataSourceKind::Client, "ghost")).unwrap(),
            Some(UnresolvedReason::ClientNotDiscovered {
                record: "ghost".into()
            })
        );
        assert!(reach.check(&usage(DataSourceKind::Db, "SELECT 1")).unwrap().is_none());
    }

    #[test]
    fn attribute_address_of_pool_channel() {
        let discovery = MockDiscovery::new()
            .with_channel("pool1", "exp_c01", "expchan/ctctrl01/1", "ctctrl01")
            .with_alias("beam", "pet/beam/1/Current")
            .with_attribute("pet/beam/1/Current");
        let reach = Reachability::scan(&discovery, &PoolFilter::default()).unwrap();
        assert_eq!(
            reach.attribute_address("exp_c01").unwrap().as_deref(),
            Some("expchan/ctctrl01/1/Value")
        );
        assert_eq!(
            reach.attribute_address("beam").unwrap().as_deref(),
            Some("pet/beam/1/Current")
        );
        assert!(reach.attribute_address("ds1").unwrap().is_none());
    }
}
