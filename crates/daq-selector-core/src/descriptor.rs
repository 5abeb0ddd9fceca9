//! Live hardware group descriptor.
//!
//! The JSON shape consumed by the acquisition runtime:
//!
//! ```json
//! {
//!   "label": "mg1", "monitor": "expchan/ctctrl01/1", "timer": "expchan/ctctrl01/1",
//!   "controllers": {
//!     "ctctrl01": { "units": { "0": {
//!       "channels": { "expchan/ctctrl01/1": { "name": "ct01", ... } },
//!       "monitor": "expchan/ctctrl01/1", "timer": "expchan/ctctrl01/1",
//!       "id": 0, "trigger_type": 0
//!     } } }
//!   }
//! }
//! ```
//!
//! Structural comparison is plain `PartialEq`; all maps are ordered so two
//! descriptors built from the same inputs compare and serialize identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the single acquisition unit every controller carries.
pub const DEFAULT_UNIT: &str = "0";

/// Controller name used for channels that are plain Tango attributes.
pub const TANGO_CONTROLLER: &str = "__tango__";

/// Live descriptor of one acquisition group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    /// Group name shown to the user.
    pub label: String,
    /// Address of the group monitor channel.
    pub monitor: String,
    /// Address of the primary timer.
    pub timer: String,
    /// Controllers keyed by name.
    #[serde(default)]
    pub controllers: BTreeMap<String, ControllerEntry>,
}

/// Units of one controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerEntry {
    /// Units keyed by unit id; a single `"0"` unit in practice.
    #[serde(default)]
    pub units: BTreeMap<String, UnitEntry>,
}

/// One controller unit with its timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    /// Channels keyed by hardware address.
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelEntry>,
    /// Address of the unit monitor.
    pub monitor: String,
    /// Address of the unit timer.
    pub timer: String,
    /// Unit id.
    #[serde(default)]
    pub id: u32,
    /// Trigger type; 0 is software triggering.
    #[serde(default)]
    pub trigger_type: u32,
}

/// One channel as the acquisition runtime sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelEntry {
    /// Channel name.
    pub name: String,
    /// Hardware address, `tango://` prefixed for plain attributes.
    pub full_name: String,
    /// Display label.
    pub label: String,
    /// Canonical value type.
    pub data_type: String,
    /// Physical unit, empty when unknown.
    pub data_units: String,
    /// Value shape; empty for scalars.
    pub shape: Vec<usize>,
    /// Whether the channel is acquired.
    pub enabled: bool,
    /// Whether the writer stores the channel.
    pub output: bool,
    /// 0 hides the channel from plots.
    pub plot_type: u8,
    /// Plot axes, `<mov>` or `<idx>`.
    pub plot_axes: Vec<String>,
    /// Position in the channel order.
    pub index: usize,
    /// Field path in the written file; empty for the default.
    pub nexus_path: String,
}

impl GroupDescriptor {
    /// All channel entries with their controller name, ordered by `index`.
    pub fn channels(&self) -> Vec<(&str, &ChannelEntry)> {
        let mut all: Vec<(&str, &ChannelEntry)> = self
            .controllers
            .iter()
            .flat_map(|(ctrl, entry)| {
                entry
                    .units
                    .values()
                    .flat_map(move |unit| unit.channels.values().map(move |ch| (ctrl.as_str(), ch)))
            })
            .collect();
        all.sort_by_key(|(_, ch)| ch.index);
        all
    }

    /// Timer addresses of every unit, primary timer first, without duplicates.
    pub fn timer_addresses(&self) -> Vec<String> {
        let mut timers = Vec::new();
        if !self.timer.is_empty() {
            timers.push(self.timer.clone());
        }
        for unit in self.controllers.values().flat_map(|c| c.units.values()) {
            if !unit.timer.is_empty() && !timers.contains(&unit.timer) {
                timers.push(unit.timer.clone());
            }
        }
        timers
    }

    /// Find a channel entry by its address.
    pub fn channel_by_address(&self, address: &str) -> Option<&ChannelEntry> {
        self.controllers
            .values()
            .flat_map(|c| c.units.values())
            .find_map(|unit| unit.channels.get(address))
    }

    /// Whether no controller is present.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
