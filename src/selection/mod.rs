//! Selection Resolver
//!
//! Computes which components and data sources a [`Profile`] activates and
//! which of its references the present hardware cannot satisfy.
//!
//! The active component set is
//!
//! ```text
//! components = mandatory ∪ {c : selection[c]} ∪ {c : preselection[c]}
//! ```
//!
//! and the active data sources are the STEP dependencies of those components
//! plus the explicitly selected standalone data sources. Unknown or
//! unreachable references never raise: they turn into `false` preselection
//! entries and [`ResolutionError`] values returned to the caller.
//!
//! Every call queries the collaborators afresh; nothing is cached between
//! calls.

mod reachability;

pub(crate) use reachability::Reachability;

use crate::config::SelectorConfig;
use daq_selector_core::{
    ComponentDescription, ConfigRegistry, DataSourceDefinition, DataSourceKind, DeviceDiscovery,
    PoolFilter, Profile, ResolutionError, Result, SelectorError, Strategy, UnresolvedReason,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

/// `$var.NAME` tokens in client records.
static CONFIG_VARIABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$var\.([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid config variable regex")
});

/// A CLIENT data source referenced by an active component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSource {
    /// Component the source belongs to.
    pub component: String,
    /// Referenced data-source name.
    pub data_source: String,
    /// Strategy of the reference.
    pub strategy: Strategy,
    /// Record with config variables substituted.
    pub record: String,
}

/// `(name, kind, record)` of one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceSummary {
    /// Data-source name, or a placeholder for unnamed ones.
    pub name: String,
    /// Data-source kind.
    pub kind: DataSourceKind,
    /// Canonical record.
    pub record: String,
}

/// Computes active components and data sources of a profile.
pub struct SelectionResolver {
    registry: Arc<dyn ConfigRegistry>,
    discovery: Arc<dyn DeviceDiscovery>,
    pool_filter: PoolFilter,
    default_preselected: Vec<String>,
}

impl SelectionResolver {
    /// Resolver over `registry` and `discovery`, filtered by the configured pools.
    pub fn new(
        registry: Arc<dyn ConfigRegistry>,
        discovery: Arc<dyn DeviceDiscovery>,
        config: &SelectorConfig,
    ) -> Self {
        Self {
            registry,
            discovery,
            pool_filter: config.pool_filter(),
            default_preselected: config.default_preselected_components.clone(),
        }
    }

    /// Pool filter handed to discovery.
    pub fn pool_filter(&self) -> &PoolFilter {
        &self.pool_filter
    }

    /// One discovery listing for the duration of a single operation.
    pub(crate) fn scan(&self) -> Result<Reachability<'_>> {
        Reachability::scan(self.discovery.as_ref(), &self.pool_filter)
    }

    /// Recompute the preselection of the components already listed in it.
    ///
    /// Components the user explicitly deselected are left untouched. A
    /// component explicitly selected stays `true` even when unresolved, but
    /// its unresolved dependencies are still reported.
    #[instrument(skip_all, fields(group = %profile.group()))]
    pub fn preselect_components(&self, profile: &mut Profile) -> Result<Vec<ResolutionError>> {
        let candidates: Vec<String> = profile.component_preselection().keys().cloned().collect();
        let seed = profile.component_preselection().clone();
        let (preselection, errors) = self.compute_preselection(profile, &candidates, seed)?;
        profile.set_component_preselection(preselection);
        Ok(errors)
    }

    /// Recompute the preselection from the configured default list.
    ///
    /// The result replaces the stored preselection; prior entries are dropped.
    #[instrument(skip_all, fields(group = %profile.group()))]
    pub fn reset_preselected_components(
        &self,
        profile: &mut Profile,
    ) -> Result<Vec<ResolutionError>> {
        let (preselection, errors) =
            self.compute_preselection(profile, &self.default_preselected, BTreeMap::new())?;
        profile.set_component_preselection(preselection);
        Ok(errors)
    }

    fn compute_preselection(
        &self,
        profile: &Profile,
        candidates: &[String],
        mut preselection: BTreeMap<String, bool>,
    ) -> Result<(BTreeMap<String, bool>, Vec<ResolutionError>)> {
        let forced = profile.component_selection();
        let pending: Vec<String> = candidates
            .iter()
            .filter(|name| forced.get(*name) != Some(&false))
            .cloned()
            .collect();
        if pending.is_empty() {
            return Ok((preselection, Vec::new()));
        }

        let known: BTreeSet<String> = self.registry.list_components()?.into_iter().collect();
        let description = self
            .registry
            .describe(&pending, Some(Strategy::Step), None)?;
        let reach = self.scan()?;

        let mut errors = Vec::new();
        for name in &pending {
            let satisfied = if known.contains(name) {
                let unresolved = self.unresolved_dependencies(name, &description, &reach)?;
                let satisfied = unresolved.is_empty();
                errors.extend(unresolved);
                satisfied
            } else {
                warn!(component = %name, "preselected component is not registered");
                errors.push(ResolutionError {
                    component: name.clone(),
                    data_source: String::new(),
                    reason: UnresolvedReason::UnknownComponent,
                });
                false
            };
            let value = forced.get(name).copied().unwrap_or(satisfied);
            debug!(component = %name, satisfied, value, "preselection");
            preselection.insert(name.clone(), value);
        }
        Ok((preselection, errors))
    }

    fn unresolved_dependencies(
        &self,
        component: &str,
        description: &ComponentDescription,
        reach: &Reachability<'_>,
    ) -> Result<Vec<ResolutionError>> {
        let mut unresolved = Vec::new();
        let Some(dependencies) = description.get(component) else {
            return Ok(unresolved);
        };
        for (data_source, usages) in dependencies {
            let Some(usage) = usages.iter().find(|u| u.kind.is_hardware_backed()) else {
                continue;
            };
            if let Some(reason) = reach.check(usage)? {
                warn!(component, data_source = %data_source, record = %usage.record, "unresolved data source");
                unresolved.push(ResolutionError {
                    component: component.to_string(),
                    data_source: data_source.clone(),
                    reason,
                });
            }
        }
        Ok(unresolved)
    }

    /// Components the registry always activates.
    pub fn mandatory_components(&self) -> Result<Vec<String>> {
        self.registry.mandatory_components()
    }

    /// All registered components, dynamic fragments included.
    pub fn available_components(&self) -> Result<Vec<String>> {
        self.registry.list_components()
    }

    /// All registered data sources.
    pub fn available_data_sources(&self) -> Result<Vec<String>> {
        self.registry.list_data_sources()
    }

    /// Components explicitly selected by the user.
    pub fn selected_components(&self, profile: &Profile) -> BTreeSet<String> {
        enabled(profile.component_selection())
    }

    /// Components currently preselected.
    pub fn preselected_components(&self, profile: &Profile) -> BTreeSet<String> {
        enabled(profile.component_preselection())
    }

    /// The active component set.
    pub fn components(&self, profile: &Profile) -> Result<BTreeSet<String>> {
        let mut components: BTreeSet<String> =
            self.mandatory_components()?.into_iter().collect();
        components.extend(self.selected_components(profile));
        components.extend(self.preselected_components(profile));
        Ok(components)
    }

    /// STEP data sources of the active components, each with the components using it.
    pub fn step_dependencies(&self, profile: &Profile) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let components: Vec<String> = self.components(profile)?.into_iter().collect();
        let description = self
            .registry
            .describe(&components, Some(Strategy::Step), None)?;
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (component, sources) in description {
            for data_source in sources.into_keys() {
                dependencies
                    .entry(data_source)
                    .or_default()
                    .insert(component.clone());
            }
        }
        Ok(dependencies)
    }

    /// STEP dependencies of the active components.
    pub fn component_data_sources(&self, profile: &Profile) -> Result<BTreeSet<String>> {
        Ok(self.step_dependencies(profile)?.into_keys().collect())
    }

    /// Explicitly selected data sources that no active component already brings in.
    pub fn selected_data_sources(&self, profile: &Profile) -> Result<BTreeSet<String>> {
        let from_components = self.component_data_sources(profile)?;
        Ok(enabled(profile.data_source_selection())
            .into_iter()
            .filter(|name| !from_components.contains(name))
            .collect())
    }

    /// All active data sources.
    pub fn data_sources(&self, profile: &Profile) -> Result<BTreeSet<String>> {
        let mut all = self.component_data_sources(profile)?;
        all.extend(self.selected_data_sources(profile)?);
        Ok(all)
    }

    /// Describe the active components, with config variables substituted in client records.
    pub fn component_description(
        &self,
        profile: &Profile,
        strategy: Option<Strategy>,
        kind: Option<DataSourceKind>,
    ) -> Result<ComponentDescription> {
        let components: Vec<String> = self.components(profile)?.into_iter().collect();
        let mut description = self.registry.describe(&components, strategy, kind)?;
        for usage in description
            .values_mut()
            .flat_map(|sources| sources.values_mut())
            .flatten()
            .filter(|usage| usage.kind == DataSourceKind::Client)
        {
            usage.record = substitute_variables(&usage.record, profile.config_variables());
        }
        Ok(description)
    }

    /// CLIENT data sources of `components`, or of the active set when `None`.
    pub fn component_client_sources(
        &self,
        profile: &Profile,
        components: Option<&[String]>,
    ) -> Result<Vec<ClientSource>> {
        let names: Vec<String> = match components {
            Some(names) => names.to_vec(),
            None => self.components(profile)?.into_iter().collect(),
        };
        let description = self
            .registry
            .describe(&names, None, Some(DataSourceKind::Client))?;
        let mut sources = Vec::new();
        for (component, data_sources) in description {
            for (data_source, usages) in data_sources {
                for usage in usages {
                    sources.push(ClientSource {
                        component: component.clone(),
                        data_source: data_source.clone(),
                        strategy: usage.strategy,
                        record: substitute_variables(&usage.record, profile.config_variables()),
                    });
                }
            }
        }
        Ok(sources)
    }

    /// Summaries of the named data sources; names that cannot be fetched are skipped.
    pub fn data_source_description(&self, names: &[String]) -> Result<Vec<DataSourceSummary>> {
        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            let body = match self.registry.fetch_data_source(name) {
                Ok(body) => body,
                Err(SelectorError::UnknownDataSource { .. }) => {
                    warn!(data_source = %name, "skipping unregistered data source");
                    continue;
                }
                Err(err) => return Err(err),
            };
            match DataSourceDefinition::from_xml(&body) {
                Ok(definition) => summaries.push(DataSourceSummary {
                    name: definition.display_name().to_string(),
                    kind: definition.source.kind(),
                    record: definition.source.record(),
                }),
                Err(err) => warn!(data_source = %name, error = %err, "malformed data source body"),
            }
        }
        Ok(summaries)
    }

    /// Composite writer document of the active components plus `extra`.
    ///
    /// Names the registry does not know are left out.
    pub fn writer_configuration(&self, profile: &Profile, extra: &[String]) -> Result<String> {
        let known: BTreeSet<String> = self.registry.list_components()?.into_iter().collect();
        let mut names: Vec<String> = Vec::new();
        for name in self.components(profile)?.into_iter().chain(extra.iter().cloned()) {
            if names.contains(&name) {
                continue;
            }
            if known.contains(&name) {
                names.push(name);
            } else {
                warn!(component = %name, "leaving unregistered component out of the writer configuration");
            }
        }
        self.registry.merge(&names)
    }

    /// Every channel the profile puts into its acquisition group, in display order.
    ///
    /// Active data sources and declared timers; preferred order first, then
    /// discovery order, then the rest alphabetically.
    pub fn channel_set(&self, profile: &Profile) -> Result<Vec<String>> {
        let reach = self.scan()?;
        self.ordered_channel_set(profile, &reach)
    }

    /// [`Self::channel_set`] against an existing discovery scan.
    pub(crate) fn ordered_channel_set(
        &self,
        profile: &Profile,
        reach: &Reachability<'_>,
    ) -> Result<Vec<String>> {
        let mut wanted = self.data_sources(profile)?;
        wanted.extend(profile.timers().iter().filter(|t| !t.is_empty()).cloned());

        let mut ordered: Vec<String> = Vec::with_capacity(wanted.len());
        let discovered = reach.channels().iter().map(|c| &c.name);
        for name in profile
            .ordered_channels()
            .iter()
            .chain(discovered)
            .chain(wanted.iter())
        {
            if wanted.contains(name) && !ordered.contains(name) {
                ordered.push(name.clone());
            }
        }
        Ok(ordered)
    }
}

fn enabled(map: &BTreeMap<String, bool>) -> BTreeSet<String> {
    map.iter()
        .filter(|(_, on)| **on)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Replace `$var.NAME` with the config variable `NAME`; unknown names stay as written.
pub fn substitute_variables(record: &str, variables: &BTreeMap<String, String>) -> String {
    CONFIG_VARIABLE_REGEX
        .replace_all(record, |caps: &regex::Captures<'_>| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
