//! In-memory live acquisition groups.

use daq_selector_core::{GroupDescriptor, LiveGroupStore, Result, SelectorError};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub(crate) struct LiveState {
    pub(crate) groups: BTreeMap<String, GroupDescriptor>,
    pub(crate) active: Option<String>,
    writes: usize,
    /// Error injection: reject every write while set.
    reject_writes: bool,
}

/// Live group store that counts writes so tests can assert "nothing was written".
#[derive(Debug, Default)]
pub struct MockLiveGroups {
    pub(crate) state: RwLock<LiveState>,
}

impl MockLiveGroups {
    /// Store without groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed group `name`.
    pub fn with_group(self, name: &str, descriptor: GroupDescriptor) -> Self {
        self.state.write().groups.insert(name.to_string(), descriptor);
        self
    }

    /// Seed the active-group pointer.
    pub fn with_active(self, name: &str) -> Self {
        self.state.write().active = Some(name.to_string());
        self
    }

    /// Number of successful [`LiveGroupStore::write_group`] calls so far.
    pub fn write_count(&self) -> usize {
        self.state.read().writes
    }

    /// Make [`LiveGroupStore::write_group`] fail until switched off again.
    pub fn set_reject_writes(&self, reject: bool) {
        self.state.write().reject_writes = reject;
    }

    /// Names of the stored groups.
    pub fn group_names(&self) -> Vec<String> {
        self.state.read().groups.keys().cloned().collect()
    }
}

impl LiveGroupStore for MockLiveGroups {
    fn read_group(&self, name: &str) -> Result<Option<GroupDescriptor>> {
        Ok(self.state.read().groups.get(name).cloned())
    }

    fn write_group(&self, name: &str, descriptor: &GroupDescriptor) -> Result<()> {
        if name.trim().is_empty() {
            return Err(SelectorError::LiveGroup(
                "cannot write a group without a name".into(),
            ));
        }
        let mut state = self.state.write();
        if state.reject_writes {
            return Err(SelectorError::LiveGroup(format!(
                "write of group '{name}' rejected"
            )));
        }
        state.groups.insert(name.to_string(), descriptor.clone());
        state.writes += 1;
        Ok(())
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        state.groups.remove(name);
        if state.active.as_deref() == Some(name) {
            state.active = None;
        }
        Ok(())
    }

    fn active_group(&self) -> Result<Option<String>> {
        Ok(self.state.read().active.clone())
    }

    fn set_active_group(&self, name: &str) -> Result<()> {
        self.state.write().active = Some(name.to_string());
        Ok(())
    }
}
