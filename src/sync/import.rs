//! Reverse mapping of a live descriptor into a profile.

use daq_selector_core::{GroupDescriptor, Profile};
use std::collections::BTreeSet;

/// Abstract selection described by `descriptor`.
///
/// A channel is selected when it is a declared data source with a non-zero
/// plot type; every other channel is recorded as deselected.
pub(crate) fn profile_from_descriptor(
    group: &str,
    descriptor: &GroupDescriptor,
    declared: &BTreeSet<String>,
) -> Profile {
    let mut profile = Profile::new(group);
    let mut ordered = Vec::new();
    let mut timers = Vec::new();

    for timer in descriptor.timer_addresses() {
        if let Some(entry) = descriptor.channel_by_address(&timer) {
            timers.push(entry.name.clone());
        }
    }

    for (_, channel) in descriptor.channels() {
        let active = declared.contains(&channel.name) && channel.plot_type != 0;
        profile.select_data_source(channel.name.clone(), active);
        ordered.push(channel.name.clone());
        if !channel.label.is_empty() && channel.label != channel.name {
            profile.set_channel_label(&channel.name, Some(channel.label.clone()));
        }
        if !channel.nexus_path.is_empty() {
            profile
                .channel_properties_mut()
                .nexus_path
                .insert(channel.name.clone(), channel.nexus_path.clone());
        }
    }

    profile.set_ordered_channels(ordered).set_timers(timers);
    profile
}
