//! `daq-selector-core`
//!
//! Core types for acquisition profiles in rust-daq.
//!
//! This crate provides the shared vocabulary of the selector: the persisted
//! [`Profile`] document, the data-source model, the live group descriptor, the
//! collaborator traits for the configuration registry, device discovery and the
//! live acquisition groups, and the [`SelectorError`] type.
//!
//! ## Key Types
//!
//! - [`Profile`]: persisted selection state of one acquisition group
//! - [`DataSource`]: closed enum over TANGO / CLIENT / DB / PYEVAL sources
//! - [`GroupDescriptor`]: live hardware group layout (controllers, units, channels)
//! - [`ConfigRegistry`], [`DeviceDiscovery`], [`LiveGroupStore`]: remote services
//! - [`ResolutionError`]: an unresolvable reference, recorded rather than raised

pub mod clients;
pub mod datasource;
pub mod descriptor;
pub mod error;
pub mod profile;
pub mod xml;

pub use clients::{
    ChannelInfo, ComponentDescription, ConfigRegistry, DataSourceUsage, DeviceDiscovery,
    LiveGroupStore, PoolFilter,
};
pub use datasource::{
    DataSource, DataSourceDefinition, DataSourceKind, Strategy, TangoAddress, DEFAULT_TANGO_PORT,
    UNNAMED_DATA_SOURCE,
};
pub use descriptor::{
    ChannelEntry, ControllerEntry, GroupDescriptor, UnitEntry, DEFAULT_UNIT, TANGO_CONTROLLER,
};
pub use error::{Result, SelectorError};
pub use profile::{
    ChannelProperties, ChannelProperty, Profile, DEFAULT_DYNAMIC_PATH, PROFILE_VERSION,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a reference could not be satisfied by the current hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnresolvedReason {
    /// The component is not registered.
    UnknownComponent,
    /// A Tango record whose device or attribute does not answer.
    TangoUnreachable {
        /// Canonical Tango record.
        record: String,
    },
    /// A client record with no matching discovered channel.
    ClientNotDiscovered {
        /// Client record name.
        record: String,
    },
}

/// An unresolvable component or data-source reference.
///
/// These accumulate in a list returned to the caller; they never abort a
/// resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionError {
    /// Component whose dependency failed; empty for standalone data sources.
    pub component: String,
    /// Empty when the component itself is unknown.
    pub data_source: String,
    /// Why the data source is unresolved.
    pub reason: UnresolvedReason,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            UnresolvedReason::UnknownComponent => {
                write!(f, "component '{}' is not registered", self.component)
            }
            UnresolvedReason::TangoUnreachable { record } => write!(
                f,
                "component '{}': data source '{}' ({record}) cannot be reached",
                self.component, self.data_source
            ),
            UnresolvedReason::ClientNotDiscovered { record } => write!(
                f,
                "component '{}': data source '{}' ({record}) is not a discovered channel",
                self.component, self.data_source
            ),
        }
    }
}
