//! Target descriptor construction.

use crate::selection::{Reachability, SelectionResolver};
use daq_selector_core::{
    ChannelEntry, ConfigRegistry, ControllerEntry, DataSource, DataSourceDefinition,
    GroupDescriptor, Profile, Result, SelectorError, UnitEntry, DEFAULT_UNIT, TANGO_CONTROLLER,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Data type reported for channels whose hardware does not state one.
const DEFAULT_DATA_TYPE: &str = "float64";

/// The descriptor a profile asks for, with what had to be left out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGroup {
    /// Descriptor to push.
    pub descriptor: GroupDescriptor,
    /// Channels kept in the selection but absent from live hardware.
    pub unresolved: Vec<String>,
    /// Unplotted timers whose selection flag must be cleared.
    pub demoted: Vec<String>,
}

/// A channel resolved against live hardware.
struct Placed {
    name: String,
    controller: String,
    address: String,
    data_type: String,
    shape: Vec<usize>,
}

/// Resolve `name` to its controller and address.
///
/// `Ok(None)` when nothing in the live environment backs the name.
fn place(
    name: &str,
    reach: &Reachability<'_>,
    registry: &dyn ConfigRegistry,
    declared: &BTreeSet<String>,
) -> Result<Option<Placed>> {
    if let Some(channel) = reach.channel(name) {
        let controller = channel
            .controller
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SelectorError::MissingController {
                channel: name.to_string(),
            })?;
        return Ok(Some(Placed {
            name: name.to_string(),
            controller,
            address: channel.address.clone(),
            data_type: channel
                .data_type
                .clone()
                .unwrap_or_else(|| DEFAULT_DATA_TYPE.to_string()),
            shape: channel.shape.clone(),
        }));
    }
    if !declared.contains(name) {
        return Ok(None);
    }
    let definition = DataSourceDefinition::from_xml(&registry.fetch_data_source(name)?)?;
    if !matches!(definition.source, DataSource::Tango { .. }) {
        return Ok(None);
    }
    let record = definition.source.record();
    if !reach.tango_reachable(&record)? {
        return Ok(None);
    }
    Ok(Some(Placed {
        name: name.to_string(),
        controller: TANGO_CONTROLLER.to_string(),
        address: format!("tango://{record}"),
        data_type: DEFAULT_DATA_TYPE.to_string(),
        shape: Vec::new(),
    }))
}

/// Plot type and axes by rank.
pub(crate) fn plot_layout(shape: &[usize]) -> (u8, Vec<String>) {
    match shape.len() {
        0 => (1, vec!["<mov>".to_string()]),
        1 => (1, vec!["<idx>".to_string()]),
        _ => (2, vec!["<idx>".to_string(), "<idx>".to_string()]),
    }
}

/// Build the target descriptor of `profile` without touching live state.
pub(crate) fn build_target(
    resolver: &SelectionResolver,
    registry: &dyn ConfigRegistry,
    profile: &Profile,
) -> Result<TargetGroup> {
    let reach = resolver.scan()?;
    let channels = resolver.ordered_channel_set(profile, &reach)?;
    let owners = resolver.step_dependencies(profile)?;
    let declared: BTreeSet<String> = registry.list_data_sources()?.into_iter().collect();

    let mut placed = Vec::with_capacity(channels.len());
    let mut unresolved = Vec::new();
    for name in &channels {
        match place(name, &reach, registry, &declared)? {
            Some(p) => placed.push(p),
            None => {
                warn!(channel = %name, "channel not found in live hardware; leaving it out of the group");
                unresolved.push(name.clone());
            }
        }
    }

    let group = profile.group().clone();
    let mut descriptor = GroupDescriptor {
        label: group.clone(),
        ..Default::default()
    };
    if placed.is_empty() {
        return Ok(TargetGroup {
            descriptor,
            unresolved,
            demoted: Vec::new(),
        });
    }

    // controller -> timer address, first declared timer per controller wins
    let mut controller_timers: BTreeMap<&str, &str> = BTreeMap::new();
    let mut primary: Option<&str> = None;
    for timer in profile.timers() {
        let Some(p) = placed
            .iter()
            .find(|p| &p.name == timer && p.controller != TANGO_CONTROLLER)
        else {
            warn!(timer = %timer, "declared timer cannot be used");
            continue;
        };
        primary.get_or_insert(p.address.as_str());
        controller_timers
            .entry(p.controller.as_str())
            .or_insert(p.address.as_str());
    }
    let primary = primary.ok_or_else(|| SelectorError::MissingTimer {
        group: group.clone(),
    })?;
    descriptor.timer = primary.to_string();
    descriptor.monitor = primary.to_string();

    let active_timers: BTreeSet<&str> = controller_timers.values().copied().collect();
    let props = profile.channel_properties();
    let unplotted = profile.unplotted_components();
    let mut demoted = Vec::new();

    for (index, p) in placed.iter().enumerate() {
        let hidden = unplotted.contains(&p.name)
            || owners
                .get(&p.name)
                .is_some_and(|components| components.iter().any(|c| unplotted.contains(c)));
        let (mut plot_type, mut plot_axes) = plot_layout(&p.shape);
        if hidden {
            plot_type = 0;
            plot_axes.clear();
            if active_timers.contains(p.address.as_str()) || p.address == primary {
                debug!(channel = %p.name, "unplotted timer demoted");
                demoted.push(p.name.clone());
            }
        }
        let entry = ChannelEntry {
            name: p.name.clone(),
            full_name: p.address.clone(),
            label: props
                .label_of(&p.name)
                .map_or_else(|| p.name.clone(), str::to_string),
            data_type: p.data_type.clone(),
            data_units: String::new(),
            shape: p.shape.clone(),
            enabled: true,
            output: true,
            plot_type,
            plot_axes,
            index,
            nexus_path: props
                .lookup(&props.nexus_path, &p.name)
                .cloned()
                .unwrap_or_default(),
        };
        let timer = controller_timers
            .get(p.controller.as_str())
            .copied()
            .unwrap_or(primary);
        let unit = descriptor
            .controllers
            .entry(p.controller.clone())
            .or_insert_with(ControllerEntry::default)
            .units
            .entry(DEFAULT_UNIT.to_string())
            .or_insert_with(|| UnitEntry {
                monitor: timer.to_string(),
                timer: timer.to_string(),
                ..Default::default()
            });
        unit.channels.insert(p.address.clone(), entry);
    }

    Ok(TargetGroup {
        descriptor,
        unresolved,
        demoted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_layout_by_rank() {
        assert_eq!(plot_layout(&[]), (1, vec!["<mov>".to_string()]));
        assert_eq!(plot_layout(&[2048]), (1, vec!["<idx>".to_string()]));
        assert_eq!(plot_layout(&[512, 512]).0, 2);
    }
}
