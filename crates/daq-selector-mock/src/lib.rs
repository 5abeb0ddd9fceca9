//! Mock collaborators for the rust-daq profile selector
//!
//! This crate provides in-memory stand-ins for the three remote services the
//! selector depends on, so profiles can be resolved and synchronized without a
//! control system.
//!
//! # Available Mocks
//!
//! - [`MockRegistry`] - configuration registry with components, data sources,
//!   dynamic fragments and stored profiles
//! - [`MockDiscovery`] - device pools with channels, aliases and reachable attributes
//! - [`MockLiveGroups`] - live acquisition-group descriptors and the active-group pointer
//! - [`MockEnvironment`] - all three, loadable from an [`EnvironmentSnapshot`] JSON file
//!
//! ```rust,ignore
//! use daq_selector_mock::{ComponentField, MockDiscovery, MockEnvironment, MockLiveGroups, MockRegistry};
//!
//! let registry = MockRegistry::new().with_component("slit1", vec![ComponentField::step("sl1_left")]);
//! let discovery = MockDiscovery::new().with_channel("pool1", "ct01", "expchan/ct/1", "ctctrl");
//! let env = MockEnvironment::new(registry, discovery, MockLiveGroups::new());
//! ```

mod discovery;
mod live;
mod registry;
mod snapshot;

pub use discovery::{MockDiscovery, PoolChannel};
pub use live::MockLiveGroups;
pub use registry::{ComponentField, ComponentSpec, MockRegistry};
pub use snapshot::{EnvironmentSnapshot, MockEnvironment};
