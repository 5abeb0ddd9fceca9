//! Acquisition-group synchronization against the mock beamline.

mod common;

use common::{beamline, synchronizer, CT01, CT02, CT03};
use daq_selector::SyncState;
use daq_selector_core::{
    ChannelInfo, ConfigRegistry, LiveGroupStore, Profile, SelectorError, DEFAULT_UNIT,
};

fn counting_profile(group: &str, channels: &[&str], timer: &str) -> Profile {
    let mut profile = Profile::new(group);
    for channel in channels {
        profile.select_data_source(channel.to_string(), true);
    }
    profile.set_timers(vec![timer.to_string()]);
    profile
}

#[test]
fn switching_groups_moves_timer_and_monitor() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut group_a = counting_profile("mgA", &["ct01"], "ct01");
    let group_b = counting_profile("mgB", &["ct03"], "ct03");
    sync.session().save(&group_b).unwrap();

    sync.update_group(&mut group_a).unwrap();
    let live_a = env.live.read_group("mgA").unwrap().unwrap();
    assert_eq!(live_a.timer, CT01);

    let incoming = sync.switch_profile(&group_a, "mgB").unwrap();

    let live_b = env.live.read_group("mgB").unwrap().unwrap();
    assert_eq!(live_b.timer, CT03);
    assert_eq!(live_b.monitor, CT03);
    assert_eq!(env.live.active_group().unwrap().as_deref(), Some("mgB"));
    assert_eq!(incoming.timers(), &vec!["ct03".to_string()]);
    // ct01 was active in mgA and mgB does not mention it
    assert_eq!(incoming.data_source_selection().get("ct01"), Some(&true));
    assert!(live_b.channel_by_address(CT01).is_some());
    assert_eq!(live_b.controllers["ctctrl02"].units[DEFAULT_UNIT].timer, CT03);
    // ctctrl01 declares no timer of its own and falls back to the primary one
    assert_eq!(live_b.controllers["ctctrl01"].units[DEFAULT_UNIT].timer, CT03);
}

#[test]
fn incoming_profile_decides_its_own_channels() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let group_a = counting_profile("mgA", &["ct01", "ct02"], "ct01");
    let mut group_b = counting_profile("mgB", &["ct03"], "ct03");
    group_b.select_data_source("ct02", false);
    sync.session().save(&group_b).unwrap();

    let incoming = sync.switch_profile(&group_a, "mgB").unwrap();

    assert_eq!(incoming.data_source_selection().get("ct01"), Some(&true));
    assert_eq!(incoming.data_source_selection().get("ct02"), Some(&false));
    let live = env.live.read_group("mgB").unwrap().unwrap();
    assert!(live.channel_by_address(CT02).is_none());
}

#[test]
fn switching_without_stored_profile_imports_the_live_group() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut group_a = counting_profile("mgA", &["ct01", "ct02"], "ct01");
    sync.update_group(&mut group_a).unwrap();
    env.registry.delete_selection("mgA").unwrap();

    let group_b = Profile::new("mgB");
    let incoming = sync.switch_profile(&group_b, "mgA").unwrap();

    assert_eq!(incoming.group(), "mgA");
    assert_eq!(incoming.timers(), &vec!["ct01".to_string()]);
    assert_eq!(incoming.data_source_selection().get("ct02"), Some(&true));
    assert!(sync.session().fetch("mgA").unwrap().is_some());
}

#[test]
fn failed_switch_keeps_the_active_group() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut group_a = counting_profile("mgA", &["ct01"], "ct01");
    sync.update_group(&mut group_a).unwrap();
    env.live.set_active_group("mgA").unwrap();

    // a fresh group has no timer to drive the carried-over channel
    let err = sync.switch_profile(&group_a, "mgNew").unwrap_err();

    assert!(matches!(err, SelectorError::MissingTimer { .. }));
    assert_eq!(env.live.active_group().unwrap().as_deref(), Some("mgA"));
    assert!(env.live.read_group("mgNew").unwrap().is_none());
}

#[test]
fn channel_without_controller_aborts_the_push() {
    let env = beamline();
    env.discovery.add_channel(
        "pool1",
        ChannelInfo {
            name: "orphan".into(),
            address: "expchan/lost/1".into(),
            controller: None,
            capabilities: vec!["CTExpChannel".into()],
            data_type: None,
            shape: Vec::new(),
        },
    );
    let mut sync = synchronizer(&env);
    let mut profile = counting_profile("mg1", &["ct01", "orphan"], "ct01");

    let err = sync.update_group(&mut profile).unwrap_err();

    assert!(matches!(
        err,
        SelectorError::MissingController { ref channel } if channel == "orphan"
    ));
    assert_eq!(env.live.write_count(), 0);
    assert!(sync.session().fetch("mg1").unwrap().is_none());
    assert_eq!(sync.state(&profile).unwrap(), SyncState::Unsynced);
}

#[test]
fn unpushable_profile_reads_as_out_of_date() {
    let env = beamline();
    let sync = synchronizer(&env);
    let mut profile = Profile::new("mg1");
    profile.select_data_source("ct01", true);

    assert!(!sync.is_group_updated(&profile).unwrap());
    let drift = sync.describe_drift(&profile).unwrap().unwrap();
    assert!(drift.contains("mg1"));
    assert_eq!(env.live.write_count(), 0);
}

#[test]
fn failed_push_keeps_the_profile_as_it_was() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut profile = counting_profile("mg1", &["ct01", "ct02"], "ct01");
    profile.unplotted_components_mut().insert("ct01".into());
    env.live.set_reject_writes(true);

    let err = sync.update_group(&mut profile).unwrap_err();

    assert!(matches!(err, SelectorError::LiveGroup(_)));
    assert_eq!(profile.data_source_selection().get("ct01"), Some(&true));
    assert!(sync.session().fetch("mg1").unwrap().is_none());
    assert_eq!(sync.state(&profile).unwrap(), SyncState::Unsynced);

    env.live.set_reject_writes(false);
    sync.update_group(&mut profile).unwrap();
    assert_eq!(profile.data_source_selection().get("ct01"), Some(&false));
}

#[test]
fn empty_profile_pushes_an_empty_group() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut profile = Profile::new("mg1");

    let descriptor = sync.update_group(&mut profile).unwrap();

    assert_eq!(descriptor.label, "mg1");
    assert!(descriptor.controllers.is_empty());
    assert_eq!(env.live.write_count(), 1);
}

#[test]
fn group_update_tracks_profile_and_live_changes() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut profile = counting_profile("mg1", &["ct01"], "ct01");

    assert!(!sync.is_group_updated(&profile).unwrap());
    assert_eq!(sync.state(&profile).unwrap(), SyncState::Unsynced);

    sync.update_group(&mut profile).unwrap();
    assert!(sync.is_group_updated(&profile).unwrap());
    assert_eq!(sync.state(&profile).unwrap(), SyncState::Synced);
    let writes = env.live.write_count();

    // checking is free of side effects
    assert!(sync.is_group_updated(&profile).unwrap());
    assert_eq!(env.live.write_count(), writes);

    let mut changed = profile.clone();
    changed.select_data_source("ct02", true);
    assert!(!sync.is_group_updated(&changed).unwrap());
    assert_eq!(sync.state(&changed).unwrap(), SyncState::Unsynced);

    let mut tampered = env.live.read_group("mg1").unwrap().unwrap();
    tampered.timer = CT02.to_string();
    env.live.write_group("mg1", &tampered).unwrap();
    assert!(!sync.is_group_updated(&profile).unwrap());
    assert_eq!(sync.state(&profile).unwrap(), SyncState::Unsynced);

    sync.update_group(&mut profile).unwrap();
    assert_eq!(sync.state(&profile).unwrap(), SyncState::Synced);
}

#[test]
fn unplotted_timer_is_demoted() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut profile = counting_profile("mg1", &["ct01", "ct02"], "ct01");
    profile
        .unplotted_components_mut()
        .extend(["ct01".to_string(), "ct02".to_string()]);

    let descriptor = sync.update_group(&mut profile).unwrap();

    assert_eq!(descriptor.timer, CT01);
    let ct01 = descriptor.channel_by_address(CT01).unwrap();
    let ct02 = descriptor.channel_by_address(CT02).unwrap();
    assert_eq!(ct01.plot_type, 0);
    assert_eq!(ct02.plot_type, 0);
    assert!(ct02.plot_axes.is_empty());
    assert_eq!(profile.data_source_selection().get("ct01"), Some(&false));
    assert_eq!(profile.data_source_selection().get("ct02"), Some(&true));

    let stored = sync.session().fetch("mg1").unwrap().unwrap();
    assert_eq!(stored.data_source_selection().get("ct01"), Some(&false));
}

#[test]
fn unplotted_component_hides_its_channels() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut profile = counting_profile("mg1", &["ct03"], "ct03");
    profile.select_component("counters", true);
    profile.unplotted_components_mut().insert("counters".into());

    let descriptor = sync.update_group(&mut profile).unwrap();

    assert_eq!(descriptor.channel_by_address(CT01).unwrap().plot_type, 0);
    assert_eq!(descriptor.channel_by_address(CT02).unwrap().plot_type, 0);
    let ct03 = descriptor.channel_by_address(CT03).unwrap();
    assert_eq!(ct03.plot_type, 1);
    assert_eq!(ct03.plot_axes, vec!["<mov>".to_string()]);
}

#[test]
fn channel_indices_follow_preferred_order() {
    let env = beamline();
    let sync = synchronizer(&env);
    let mut profile = counting_profile("mg1", &["ct01", "ct02", "ct03"], "ct01");
    profile.set_ordered_channels(vec!["ct03".into(), "ct02".into()]);

    let target = sync.build_target(&profile).unwrap();

    let descriptor = &target.descriptor;
    assert_eq!(descriptor.channel_by_address(CT03).unwrap().index, 0);
    assert_eq!(descriptor.channel_by_address(CT02).unwrap().index, 1);
    assert_eq!(descriptor.channel_by_address(CT01).unwrap().index, 2);
    assert_eq!(env.live.write_count(), 0);
}

#[test]
fn vanished_channels_stay_selected_but_leave_the_group() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut profile = counting_profile("mg1", &["ct01", "ct02"], "ct01");
    profile.select_component("slit1", true);
    env.discovery.remove_channel("ct02");

    let target = sync.build_target(&profile).unwrap();
    assert_eq!(target.unresolved, vec!["ct02".to_string(), "sl1_right".to_string()]);

    let descriptor = sync.update_group(&mut profile).unwrap();
    assert!(descriptor.channel_by_address(CT02).is_none());
    assert!(descriptor
        .channel_by_address("tango://motor/motctrl01/1/Position")
        .is_some());
    assert_eq!(profile.data_source_selection().get("ct02"), Some(&true));
}

#[test]
fn import_reads_labels_and_selection() {
    let env = beamline();
    let mut sync = synchronizer(&env);
    let mut profile = counting_profile("mg1", &["ct01", "ct02"], "ct01");
    profile.set_channel_label("ct02", Some("Diode".into()));
    profile.unplotted_components_mut().insert("ct02".into());
    sync.update_group(&mut profile).unwrap();

    let imported = sync.import_group("mg1").unwrap();

    assert_eq!(imported.timers(), &vec!["ct01".to_string()]);
    assert_eq!(imported.data_source_selection().get("ct01"), Some(&true));
    // hidden channels come back deselected
    assert_eq!(imported.data_source_selection().get("ct02"), Some(&false));
    assert_eq!(imported.channel_properties().label_of("ct02"), Some("Diode"));

    assert!(matches!(
        sync.import_group("missing"),
        Err(SelectorError::LiveGroup(_))
    ));
}
