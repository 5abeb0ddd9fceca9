//! Profile persistence.
//!
//! A [`ProfileSession`] loads, stores and deletes the profile documents kept
//! in the configuration registry, one per acquisition-group name. It holds no
//! profile itself: every call reads or writes the registry and hands the
//! caller an owned [`Profile`] to mutate and pass on.
//!
//! The group a call refers to is picked by a fallback chain: the explicit
//! name, then the group the acquisition runtime currently points at, then the
//! configured default.

use crate::config::SelectorConfig;
use daq_selector_core::{
    ConfigRegistry, LiveGroupStore, Profile, Result, SelectorError, PROFILE_VERSION,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loads and stores profiles through the configuration registry.
pub struct ProfileSession {
    registry: Arc<dyn ConfigRegistry>,
    live: Arc<dyn LiveGroupStore>,
    default_group: String,
}

impl ProfileSession {
    /// Session storing through `registry`; `live` supplies the active group.
    pub fn new(
        registry: Arc<dyn ConfigRegistry>,
        live: Arc<dyn LiveGroupStore>,
        config: &SelectorConfig,
    ) -> Self {
        Self {
            registry,
            live,
            default_group: config.default_group.clone(),
        }
    }

    /// Pick the acquisition-group name a call refers to.
    pub fn resolve_group_name(&self, name: Option<&str>) -> Result<String> {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        if let Some(active) = self.live.active_group()?.filter(|n| !n.trim().is_empty()) {
            debug!(group = %active, "using the active acquisition group");
            return Ok(active);
        }
        Ok(self.default_group.clone())
    }

    /// Stored profile of the resolved group, or a fresh one with defaults.
    pub fn load(&self, name: Option<&str>) -> Result<Profile> {
        let group = self.resolve_group_name(name)?;
        match self.fetch(&group)? {
            Some(profile) => Ok(profile),
            None => {
                info!(group = %group, "no stored profile; starting from defaults");
                Ok(Profile::new(group))
            }
        }
    }

    /// Decode the stored profile of `name`, if there is one.
    ///
    /// Missing or malformed fields fall back to their defaults. Documents of an
    /// older schema version are upgraded in memory.
    pub fn fetch(&self, name: &str) -> Result<Option<Profile>> {
        let Some(text) = self.registry.fetch_selection(name)? else {
            return Ok(None);
        };
        let mut profile = Profile::from_json_lossy(&text);
        if profile.group().is_empty() {
            profile.set_group(name.to_string());
        }
        if !profile.is_current_version() {
            warn!(
                group = %name,
                found = %profile.version(),
                current = PROFILE_VERSION,
                "upgrading stored profile to the current schema version"
            );
            profile.set_version(PROFILE_VERSION.to_string());
        }
        Ok(Some(profile))
    }

    /// Store `profile` under its group name.
    pub fn save(&self, profile: &Profile) -> Result<()> {
        if profile.group().trim().is_empty() {
            return Err(SelectorError::Configuration(
                "cannot store a profile without an acquisition group".into(),
            ));
        }
        self.registry
            .store_selection(profile.group(), &profile.to_json()?)?;
        info!(group = %profile.group(), "profile stored");
        Ok(())
    }

    /// Remove the stored profile and the live group of `name`.
    pub fn delete(&self, name: &str) -> Result<()> {
        self.registry.delete_selection(name)?;
        self.live.delete_group(name)?;
        info!(group = %name, "profile and acquisition group deleted");
        Ok(())
    }

    /// Group names with a stored profile.
    pub fn available_profiles(&self) -> Result<Vec<String>> {
        self.registry.list_selections()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_selector_mock::{MockLiveGroups, MockRegistry};

    fn session(live: MockLiveGroups) -> (Arc<MockRegistry>, ProfileSession) {
        let registry = Arc::new(MockRegistry::new());
        let session = ProfileSession::new(
            registry.clone(),
            Arc::new(live),
            &SelectorConfig::default(),
        );
        (registry, session)
    }

    #[test]
    fn group_name_fallback_chain() {
        let (_, plain) = session(MockLiveGroups::new());
        assert_eq!(plain.resolve_group_name(Some("mg1")).unwrap(), "mg1");
        assert_eq!(plain.resolve_group_name(None).unwrap(), "nxsmntgrp");
        assert_eq!(plain.resolve_group_name(Some("  ")).unwrap(), "nxsmntgrp");

        let (_, active) = session(MockLiveGroups::new().with_active("mg_active"));
        assert_eq!(active.resolve_group_name(None).unwrap(), "mg_active");
    }

    #[test]
    fn old_version_is_upgraded() {
        let (registry, session) = session(MockLiveGroups::new());
        registry
            .store_selection("mg1", r#"{"Version": "2.0.0", "AppendEntry": true}"#)
            .unwrap();
        let profile = session.fetch("mg1").unwrap().unwrap();
        assert!(profile.is_current_version());
        assert_eq!(profile.group(), "mg1");
        assert!(*profile.append_entry());
    }

    #[test]
    fn save_requires_group() {
        let (_, session) = session(MockLiveGroups::new());
        assert!(session.save(&Profile::default()).is_err());
    }
}
