//! # rust-daq Acquisition Profile Selector
//!
//! This crate decides, for one acquisition group, which configuration
//! components and data sources take part in a scan, and keeps the live
//! hardware group consistent with that decision. The persisted state is a
//! [`Profile`]; everything else is computed from it against three remote
//! collaborators (configuration registry, device discovery, live groups)
//! declared in `daq-selector-core`.
//!
//! ## Crate Structure
//!
//! - **`config`**: selector settings loaded with `figment` from TOML and
//!   `DAQ_SELECTOR_*` environment variables. See `config::SelectorConfig`.
//! - **`logging`**: `tracing-subscriber` initialization (pretty, compact, JSON).
//! - **`session`**: load, store and delete profiles per acquisition group.
//! - **`selection`**: the selection resolver. Computes active components and
//!   data sources, preselection flags, and descriptive queries.
//! - **`synthesis`**: the dynamic fragment synthesizer. Builds configuration
//!   documents for arbitrary channel lists and manages their lifetime.
//! - **`sync`**: the acquisition-group synchronizer. Builds, compares, pushes
//!   and imports live group descriptors.

pub mod config;
pub mod logging;
pub mod selection;
pub mod session;
pub mod synthesis;
pub mod sync;

pub use config::SelectorConfig;
pub use selection::{ClientSource, DataSourceSummary, SelectionResolver};
pub use session::ProfileSession;
pub use synthesis::{ChannelSpec, FragmentHandle, FragmentRequest, FragmentSynthesizer};
pub use sync::{GroupSynchronizer, SyncState, TargetGroup};

pub use daq_selector_core::{
    GroupDescriptor, Profile, ResolutionError, Result, SelectorError, UnresolvedReason,
};
