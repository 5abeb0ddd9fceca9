//! Dynamic Fragment Synthesizer
//!
//! Builds ad hoc configuration documents for arbitrary channel lists and
//! manages their lifetime in the configuration registry.
//!
//! Each requested channel becomes one `<field>` whose type, shape, NeXus
//! path and link flag are resolved through the precedence layers in
//! [`layers`]. The resulting tree is written by [`document`]. Published
//! fragments occupy slots of a [`FragmentArena`](fragments::FragmentArena);
//! callers keep a [`FragmentHandle`] and read the registry name from it.

mod document;
mod fragments;
mod layers;
pub mod nexus_path;
pub mod types;

pub use fragments::FragmentHandle;

use crate::config::SelectorConfig;
use crate::selection::Reachability;
use daq_selector_core::{
    ConfigRegistry, DeviceDiscovery, PoolFilter, Profile, Result, Strategy,
};
use fragments::FragmentArena;
use layers::{declared_metadata, ChannelResolver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// One requested channel: a bare name or a name with type hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawChannelSpec")]
pub struct ChannelSpec {
    /// Channel name.
    pub name: String,
    /// Value type hint.
    pub dtype: Option<String>,
    /// Shape hint.
    pub shape: Option<Vec<usize>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChannelSpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        dtype: Option<String>,
        #[serde(default)]
        shape: Option<Vec<usize>>,
    },
}

impl From<RawChannelSpec> for ChannelSpec {
    fn from(raw: RawChannelSpec) -> Self {
        match raw {
            RawChannelSpec::Name(name) => Self::named(name),
            RawChannelSpec::Full { name, dtype, shape } => Self { name, dtype, shape },
        }
    }
}

impl ChannelSpec {
    /// Spec without hints.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: None,
            shape: None,
        }
    }

    /// Spec with type and shape hints.
    pub fn typed(name: impl Into<String>, dtype: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            dtype: Some(dtype.into()),
            shape: Some(shape),
        }
    }
}

impl From<&str> for ChannelSpec {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

/// Channels of one fragment, split by read strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentRequest {
    /// Channels read every step.
    pub step: Vec<ChannelSpec>,
    /// Channels read once at start.
    pub init: Vec<ChannelSpec>,
}

impl FragmentRequest {
    /// STEP-only request from plain channel names.
    pub fn step<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            step: names.into_iter().map(ChannelSpec::named).collect(),
            init: Vec::new(),
        }
    }

    /// Add INIT channels from plain names.
    pub fn with_init<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.init.extend(names.into_iter().map(ChannelSpec::named));
        self
    }

    /// Whether neither set names a channel.
    pub fn is_empty(&self) -> bool {
        self.step.is_empty() && self.init.is_empty()
    }
}

/// Builds dynamic fragments and tracks the ones it published.
pub struct FragmentSynthesizer {
    registry: Arc<dyn ConfigRegistry>,
    discovery: Arc<dyn DeviceDiscovery>,
    pool_filter: PoolFilter,
    arena: FragmentArena,
}

impl FragmentSynthesizer {
    /// Synthesizer with the configured pools and fragment base name.
    pub fn new(
        registry: Arc<dyn ConfigRegistry>,
        discovery: Arc<dyn DeviceDiscovery>,
        config: &SelectorConfig,
    ) -> Self {
        Self {
            registry,
            discovery,
            pool_filter: config.pool_filter(),
            arena: FragmentArena::new(config.fragment_base_name.clone()),
        }
    }

    /// Build the fragment document for `request` without publishing it.
    ///
    /// An empty request yields an empty `<definition/>` document.
    pub fn synthesize(&self, profile: &Profile, request: &FragmentRequest) -> Result<String> {
        if request.is_empty() {
            return document::render(&[]);
        }
        let declared: BTreeSet<String> = self.registry.list_data_sources()?.into_iter().collect();
        let components = self.registry.list_components()?;
        let metadata = declared_metadata(&self.registry.describe(&components, None, None)?);
        let reach = Reachability::scan(self.discovery.as_ref(), &self.pool_filter)?;
        let resolver = ChannelResolver {
            profile,
            declared: &declared,
            metadata: &metadata,
            reach: &reach,
        };

        let requested = request
            .step
            .iter()
            .map(|spec| (spec, Strategy::Step))
            .chain(request.init.iter().map(|spec| (spec, Strategy::Init)));
        let mut fields = Vec::new();
        for (spec, strategy) in requested {
            let field = resolver.resolve(spec, strategy, |name| {
                self.registry.fetch_data_source(name)
            })?;
            fields.push(field);
        }
        document::render(&fields)
    }

    /// Synthesize and publish a fragment under the first free name.
    #[instrument(skip_all, fields(group = %profile.group()))]
    pub fn create_fragment(
        &mut self,
        profile: &Profile,
        request: &FragmentRequest,
    ) -> Result<FragmentHandle> {
        let body = self.synthesize(profile, request)?;
        let taken: BTreeSet<String> = self.registry.list_components()?.into_iter().collect();
        let (slot, name) = self.arena.next_free(&taken);
        self.registry.create_fragment(&name, &body)?;
        info!(fragment = %name, channels = request.step.len() + request.init.len(), "dynamic fragment created");
        Ok(self.arena.occupy(slot))
    }

    /// Registry name of a live fragment.
    pub fn fragment_name(&self, handle: FragmentHandle) -> Option<String> {
        self.arena.name(handle)
    }

    /// Names of the fragments this synthesizer created and has not removed.
    pub fn live_fragments(&self) -> Vec<String> {
        self.arena.live_names()
    }

    /// Delete the fragment registered as `name`.
    ///
    /// Fails with [`daq_selector_core::SelectorError::UnknownFragment`] for a
    /// name that was never created.
    pub fn remove_fragment(&mut self, name: &str) -> Result<()> {
        self.registry.remove_fragment(name)?;
        self.arena.release(name);
        info!(fragment = %name, "dynamic fragment removed");
        Ok(())
    }

    /// Delete the fragment behind `handle`.
    pub fn remove(&mut self, handle: FragmentHandle) -> Result<()> {
        match self.arena.name(handle) {
            Some(name) => self.remove_fragment(&name),
            None => Err(daq_selector_core::SelectorError::UnknownFragment {
                name: format!("{handle:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_specs_accept_names_and_objects() {
        let request: FragmentRequest = serde_json::from_str(
            r#"{"step": ["ds1", {"name": "img", "dtype": "uint16", "shape": [512, 512]}], "init": ["temp"]}"#,
        )
        .unwrap();
        assert_eq!(request.step[0], ChannelSpec::named("ds1"));
        assert_eq!(
            request.step[1],
            ChannelSpec::typed("img", "uint16", vec![512, 512])
        );
        assert_eq!(request.init, vec![ChannelSpec::named("temp")]);
    }

    #[test]
    fn empty_request() {
        assert!(FragmentRequest::default().is_empty());
        assert!(!FragmentRequest::step(["a"]).is_empty());
        assert!(!FragmentRequest::default().with_init(["b"]).is_empty());
    }
}
