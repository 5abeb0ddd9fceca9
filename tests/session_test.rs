//! Profile persistence through the configuration registry.

mod common;

use common::{beamline, synchronizer};
use daq_selector::{ProfileSession, SelectorConfig};
use daq_selector_core::{ConfigRegistry, LiveGroupStore, Profile, PROFILE_VERSION};
use serde_json::json;

fn session(env: &daq_selector_mock::MockEnvironment) -> ProfileSession {
    ProfileSession::new(env.registry.clone(), env.live.clone(), &SelectorConfig::default())
}

fn populated_profile() -> Profile {
    let mut profile = Profile::new("mg1");
    profile
        .select_component("slit1", true)
        .select_data_source("ct01", true)
        .set_timers(vec!["ct01".into(), "ct03".into()])
        .set_ordered_channels(vec!["ct03".into(), "ct01".into()])
        .set_init_data_sources(vec!["start_time".into()])
        .set_append_entry(true)
        .set_default_dynamic_links(false)
        .set_channel_label("ct01", Some("Monitor".into()));
    profile
        .user_data_mut()
        .insert("sample".into(), json!({"name": "water", "mass": 1.5}));
    profile
        .config_variables_mut()
        .insert("entryname".into(), "scan".into());
    profile.unplotted_components_mut().insert("slit1".into());
    profile
}

#[test]
fn save_then_fetch_round_trips() {
    let env = beamline();
    let session = session(&env);
    let profile = populated_profile();

    session.save(&profile).unwrap();
    let fetched = session.fetch("mg1").unwrap().unwrap();

    assert_eq!(fetched, profile);
    assert_eq!(session.available_profiles().unwrap(), vec!["mg1"]);
}

#[test]
fn load_falls_back_to_defaults() {
    let env = beamline();
    let session = session(&env);

    let fresh = session.load(None).unwrap();
    assert_eq!(fresh.group(), "nxsmntgrp");
    assert_eq!(fresh.version(), PROFILE_VERSION);

    env.live.set_active_group("mg_active").unwrap();
    assert_eq!(session.load(None).unwrap().group(), "mg_active");
    assert_eq!(session.load(Some("mg2")).unwrap().group(), "mg2");
}

#[test]
fn malformed_fields_are_defaulted() {
    let env = beamline();
    let session = session(&env);
    env.registry
        .store_selection(
            "mg1",
            r#"{"MntGrp": "mg1", "Timer": 42, "AppendEntry": true, "ComponentSelection": "oops"}"#,
        )
        .unwrap();

    let profile = session.fetch("mg1").unwrap().unwrap();

    assert!(profile.timers().is_empty());
    assert!(profile.component_selection().is_empty());
    assert!(*profile.append_entry());
    assert!(*profile.dynamic_components());
}

#[test]
fn non_object_document_yields_a_fresh_profile() {
    let env = beamline();
    let session = session(&env);
    env.registry.store_selection("mg1", "[1, 2, 3]").unwrap();

    let profile = session.fetch("mg1").unwrap().unwrap();

    assert_eq!(profile.group(), "mg1");
    assert_eq!(profile, Profile::new("mg1"));
}

#[test]
fn delete_removes_profile_and_live_group() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut profile = Profile::new("mg1");
    profile
        .select_data_source("ct01", true)
        .set_timers(vec!["ct01".into()]);
    sync.update_group(&mut profile).unwrap();
    assert!(env.live.read_group("mg1").unwrap().is_some());

    sync.session().delete("mg1").unwrap();

    assert!(sync.session().fetch("mg1").unwrap().is_none());
    assert!(env.live.read_group("mg1").unwrap().is_none());
}
