//! Loading selector settings from TOML files.

use anyhow::Result;
use daq_selector::config::SelectorConfig;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_missing_file_uses_defaults() -> Result<()> {
    let dir = tempdir()?;
    let config = SelectorConfig::load_from(dir.path().join("absent.toml"))?;
    assert_eq!(config, SelectorConfig::default());
    Ok(())
}

#[test]
fn test_file_overrides_defaults() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("selector.toml");
    fs::write(
        &path,
        r#"
default_group = "mg_p09"
default_preselected_components = ["slit1", "counters"]
pool_blacklist = ["pool_old"]
log_level = "debug"
"#,
    )?;

    let config = SelectorConfig::load_from(&path)?;

    assert_eq!(config.default_group, "mg_p09");
    assert_eq!(
        config.default_preselected_components,
        vec!["slit1".to_string(), "counters".to_string()]
    );
    assert!(!config.pool_filter().accepts("pool_old"));
    assert_eq!(config.fragment_base_name, "__dynamic_component__");
    assert!(config.validate().is_ok());
    Ok(())
}

#[test]
fn test_invalid_values_fail_validation() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("selector.toml");
    fs::write(&path, "log_level = \"chatty\"\nfragment_base_name = \"\"\n")?;

    let config = SelectorConfig::load_from(&path)?;
    let err = config.validate().unwrap_err();
    assert!(err.contains("fragment_base_name"));
    Ok(())
}

#[test]
fn test_wrong_types_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("selector.toml");
    fs::write(&path, "pools = \"pool1\"\n")?;

    assert!(SelectorConfig::load_from(&path).is_err());
    Ok(())
}
