//! Acquisition-Group Synchronizer
//!
//! Keeps the live hardware group descriptor of an acquisition group in line
//! with its profile:
//!
//! - [`GroupSynchronizer::build_target`] computes the descriptor the profile
//!   asks for (channel order, controller grouping, timers, plot visibility)
//! - [`GroupSynchronizer::is_group_updated`] compares it with the live one
//! - [`GroupSynchronizer::update_group`] pushes it and stores the profile
//! - [`GroupSynchronizer::import_group`] and [`GroupSynchronizer::switch_profile`]
//!   re-anchor on another group
//!
//! Each group moves `Unsynced -> Computing -> Synced` on a successful push and
//! drops back to `Unsynced` as soon as the profile or the live descriptor
//! differs from what was pushed. Hard failures (a channel without controller,
//! no usable timer) abort a push before anything is written.

mod import;
mod state;
mod target;

pub use state::SyncState;
pub use target::TargetGroup;

use crate::config::SelectorConfig;
use crate::selection::SelectionResolver;
use crate::session::ProfileSession;
use daq_selector_core::{
    ConfigRegistry, DeviceDiscovery, GroupDescriptor, LiveGroupStore, Profile, Result,
    SelectorError,
};
use similar::TextDiff;
use state::{fingerprint, SyncRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Keeps live acquisition groups in line with their profiles.
pub struct GroupSynchronizer {
    resolver: SelectionResolver,
    session: ProfileSession,
    registry: Arc<dyn ConfigRegistry>,
    live: Arc<dyn LiveGroupStore>,
    records: BTreeMap<String, SyncRecord>,
}

impl GroupSynchronizer {
    /// Synchronizer over the three collaborators.
    pub fn new(
        registry: Arc<dyn ConfigRegistry>,
        discovery: Arc<dyn DeviceDiscovery>,
        live: Arc<dyn LiveGroupStore>,
        config: &SelectorConfig,
    ) -> Self {
        Self {
            resolver: SelectionResolver::new(registry.clone(), discovery, config),
            session: ProfileSession::new(registry.clone(), live.clone(), config),
            registry,
            live,
            records: BTreeMap::new(),
        }
    }

    /// Resolver used to build targets.
    pub fn resolver(&self) -> &SelectionResolver {
        &self.resolver
    }

    /// Session that stores pushed profiles.
    pub fn session(&self) -> &ProfileSession {
        &self.session
    }

    /// The descriptor `profile` asks for. Reads only.
    pub fn build_target(&self, profile: &Profile) -> Result<TargetGroup> {
        target::build_target(&self.resolver, self.registry.as_ref(), profile)
    }

    /// Target of `profile`, or the reason no descriptor can be pushed for it.
    ///
    /// Missing controllers and timers only fail [`Self::update_group`]; the
    /// read-only checks report them as drift.
    fn checked_target(
        &self,
        profile: &Profile,
    ) -> Result<std::result::Result<TargetGroup, SelectorError>> {
        match self.build_target(profile) {
            Ok(target) => Ok(Ok(target)),
            Err(
                err @ (SelectorError::MissingController { .. } | SelectorError::MissingTimer { .. }),
            ) => {
                debug!(error = %err, "target descriptor cannot be built");
                Ok(Err(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Whether the live descriptor already equals the target of `profile`.
    ///
    /// `false` when no target can be built for `profile`.
    pub fn is_group_updated(&self, profile: &Profile) -> Result<bool> {
        let Ok(target) = self.checked_target(profile)? else {
            return Ok(false);
        };
        let live = self.live.read_group(profile.group())?;
        Ok(live.as_ref() == Some(&target.descriptor))
    }

    /// Line diff of live against target descriptor; `None` when they agree.
    pub fn describe_drift(&self, profile: &Profile) -> Result<Option<String>> {
        let target = match self.checked_target(profile)? {
            Ok(target) => target,
            Err(err) => return Ok(Some(format!("target descriptor cannot be built: {err}\n"))),
        };
        let live = self.live.read_group(profile.group())?;
        if live.as_ref() == Some(&target.descriptor) {
            return Ok(None);
        }
        let old = match &live {
            Some(descriptor) => serde_json::to_string_pretty(descriptor)?,
            None => String::new(),
        };
        let new = serde_json::to_string_pretty(&target.descriptor)?;
        let diff = TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header("live", "target")
            .to_string();
        Ok(Some(diff))
    }

    /// Push the target descriptor of `profile` and store the profile.
    ///
    /// Unplotted timers are deselected in `profile` once the push succeeded;
    /// on failure `profile` is left as it was.
    #[instrument(skip_all, fields(group = %profile.group()))]
    pub fn update_group(&mut self, profile: &mut Profile) -> Result<GroupDescriptor> {
        let group = profile.group().clone();
        self.records.entry(group.clone()).or_default().state = SyncState::Computing;

        let target = match self.build_target(profile) {
            Ok(target) => target,
            Err(err) => {
                self.records.entry(group.clone()).or_default().state = SyncState::Unsynced;
                warn!(error = %err, "acquisition group left unchanged");
                return Err(err);
            }
        };
        let mut staged = profile.clone();
        for channel in &target.demoted {
            staged.select_data_source(channel.clone(), false);
        }
        if !target.unresolved.is_empty() {
            warn!(channels = ?target.unresolved, "channels missing from live hardware");
        }

        let pushed = self
            .live
            .write_group(&group, &target.descriptor)
            .and_then(|()| self.session.save(&staged));
        if let Err(err) = pushed {
            self.records.entry(group).or_default().state = SyncState::Unsynced;
            warn!(error = %err, "acquisition group push failed");
            return Err(err);
        }
        *profile = staged;

        let record = self.records.entry(group.clone()).or_default();
        record.fingerprint = Some(fingerprint(profile, Some(&target.descriptor))?);
        record.state = SyncState::Synced;
        info!(
            group = %group,
            controllers = target.descriptor.controllers.len(),
            timer = %target.descriptor.timer,
            "acquisition group updated"
        );
        Ok(target.descriptor)
    }

    /// Current state of the group of `profile`.
    pub fn state(&self, profile: &Profile) -> Result<SyncState> {
        let Some(record) = self.records.get(profile.group()) else {
            return Ok(SyncState::Unsynced);
        };
        if record.state != SyncState::Synced {
            return Ok(record.state);
        }
        let live = self.live.read_group(profile.group())?;
        let current = fingerprint(profile, live.as_ref())?;
        Ok(if record.fingerprint.as_deref() == Some(current.as_str()) {
            SyncState::Synced
        } else {
            SyncState::Unsynced
        })
    }

    /// Rebuild a profile from the live descriptor of group `name`.
    pub fn import_group(&self, name: &str) -> Result<Profile> {
        let descriptor = self.live.read_group(name)?.ok_or_else(|| {
            SelectorError::LiveGroup(format!("acquisition group '{name}' does not exist"))
        })?;
        let declared: BTreeSet<String> = self.registry.list_data_sources()?.into_iter().collect();
        let profile = import::profile_from_descriptor(name, &descriptor, &declared);
        info!(group = %name, channels = profile.ordered_channels().len(), "imported live acquisition group");
        Ok(profile)
    }

    /// Push the profile of group `name` and make it the active group.
    ///
    /// The active group stays unchanged when the push fails.
    ///
    /// The incoming profile is the stored one, else the one imported from its
    /// live descriptor, else a fresh one. It keeps its own timers and order;
    /// data sources active in `current` stay active unless the incoming
    /// profile decides them explicitly.
    pub fn switch_profile(&mut self, current: &Profile, name: &str) -> Result<Profile> {
        let mut incoming = match self.session.fetch(name)? {
            Some(profile) => profile,
            None if self.live.read_group(name)?.is_some() => self.import_group(name)?,
            None => Profile::new(name),
        };
        let carried: Vec<String> = current
            .data_source_selection()
            .iter()
            .filter(|(ds, on)| **on && !incoming.data_source_selection().contains_key(*ds))
            .map(|(ds, _)| ds.clone())
            .collect();
        for ds in carried {
            incoming.select_data_source(ds, true);
        }

        info!(from = %current.group(), to = %name, "switching acquisition group");
        self.update_group(&mut incoming)?;
        self.live.set_active_group(name)?;
        Ok(incoming)
    }
}
