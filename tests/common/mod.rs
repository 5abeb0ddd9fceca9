//! Shared beamline fixture for the integration tests.
#![allow(dead_code)]

use daq_selector::{FragmentSynthesizer, GroupSynchronizer, SelectionResolver, SelectorConfig};
use daq_selector_core::{DataSourceDefinition, Strategy};
use daq_selector_mock::{ComponentField, MockDiscovery, MockEnvironment, MockLiveGroups, MockRegistry};

pub const CT01: &str = "expchan/ctctrl01/1";
pub const CT02: &str = "expchan/ctctrl01/2";
pub const CT03: &str = "expchan/ctctrl02/1";

/// Two counter controllers, one reachable motor attribute and a handful of
/// components, one of which (`mycp3`) points at a device that does not exist.
pub fn beamline() -> MockEnvironment {
    let registry = MockRegistry::new()
        .with_mandatory_component(
            "default",
            vec![ComponentField::new("start_time", Strategy::Init)],
        )
        .with_component(
            "slit1",
            vec![ComponentField::step("sl1_left"), ComponentField::step("sl1_right")],
        )
        .with_component(
            "counters",
            vec![ComponentField::step("ct01"), ComponentField::step("ct02")],
        )
        .with_component("mycp3", vec![ComponentField::step("ds_nodev")])
        .with_component(
            "env",
            vec![
                ComponentField::step("sample_temp"),
                ComponentField::new("beam_energy", Strategy::Init),
            ],
        );
    for definition in [
        DataSourceDefinition::client("start_time", "start_time"),
        DataSourceDefinition::tango("sl1_left", "motor/motctrl01/1", "Position"),
        DataSourceDefinition::tango("sl1_right", "motor/motctrl01/2", "Position"),
        DataSourceDefinition::client("ct01", "ct01"),
        DataSourceDefinition::client("ct02", "ct02"),
        DataSourceDefinition::client("ct03", "ct03"),
        DataSourceDefinition::tango("ds_nodev", "", "Position"),
        DataSourceDefinition::client("sample_temp", "temp_$var.sample"),
        DataSourceDefinition::client("beam_energy", "energy"),
    ] {
        registry.add_data_source(&definition).unwrap();
    }

    let discovery = MockDiscovery::new()
        .with_channel("pool1", "ct01", CT01, "ctctrl01")
        .with_channel("pool1", "ct02", CT02, "ctctrl01")
        .with_channel("pool1", "ct03", CT03, "ctctrl02")
        .with_attribute("motor/motctrl01/1/Position");

    MockEnvironment::new(registry, discovery, MockLiveGroups::new())
}

pub fn resolver(env: &MockEnvironment) -> SelectionResolver {
    resolver_with(env, &SelectorConfig::default())
}

pub fn resolver_with(env: &MockEnvironment, config: &SelectorConfig) -> SelectionResolver {
    SelectionResolver::new(env.registry.clone(), env.discovery.clone(), config)
}

pub fn synthesizer(env: &MockEnvironment) -> FragmentSynthesizer {
    FragmentSynthesizer::new(
        env.registry.clone(),
        env.discovery.clone(),
        &SelectorConfig::default(),
    )
}

pub fn synchronizer(env: &MockEnvironment) -> GroupSynchronizer {
    GroupSynchronizer::new(
        env.registry.clone(),
        env.discovery.clone(),
        env.live.clone(),
        &SelectorConfig::default(),
    )
}
