//! Integration tests for Settings config loading with layered merge semantics.
//!
//! Each layer replaces only the values it specifies:
//! defaults → global → local `.stackgraph.toml` → `--config` file → env vars.
//!
//! Note: These tests rely on no global config and no other `STACKGRAPH_*`
//! variables being present, so they effectively test local config merging
//! with defaults. Only `STACKGRAPH_OUTPUT__COLOR` is set, to `true`, which
//! every other test here expects anyway.

use std::fs;

use rstest::rstest;
use tempfile::TempDir;

use stackgraph::application::services::engine_for;
use stackgraph::config::{local_config_path, Settings};

#[test]
fn given_local_config_when_load_then_overrides_only_specified_values() {
    // Arrange: manifest directory with a local config disabling one rule
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".stackgraph.toml"),
        "[rules]\ndetach_association = false\n",
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(dir.path()), None).expect("load settings");

    // Assert
    assert!(!settings.rules.detach_association);
    assert!(settings.rules.service_association_edges, "default kept");
    assert!(settings.output.color, "default kept");
}

#[test]
fn given_no_local_config_when_load_then_defaults() {
    let dir = TempDir::new().unwrap();

    let settings = Settings::load(Some(dir.path()), None).expect("load settings");

    assert_eq!(settings, Settings::default());
}

#[test]
fn given_local_and_extra_file_when_merging_then_extra_file_wins() {
    // Arrange
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "[output]\nshow_waves = true\ncolor = false\n",
    )
    .unwrap();
    let extra = dir.path().join("ci.toml");
    fs::write(&extra, "[output]\ncolor = true\n").unwrap();

    // Act
    let settings = Settings::load(Some(dir.path()), Some(&extra)).expect("load settings");

    // Assert
    assert!(settings.output.show_waves, "from local config");
    assert!(settings.output.color, "extra file wins over local config");
}

#[test]
fn given_extra_file_and_env_var_when_load_then_env_wins() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let extra = dir.path().join("ci.toml");
    fs::write(&extra, "[output]\ncolor = false\nshow_waves = true\n").unwrap();
    std::env::set_var("STACKGRAPH_OUTPUT__COLOR", "true");

    // Act
    let settings = Settings::load(Some(dir.path()), Some(&extra));
    std::env::remove_var("STACKGRAPH_OUTPUT__COLOR");

    // Assert
    let settings = settings.expect("load settings");
    assert!(settings.output.color, "env var wins over extra file");
    assert!(settings.output.show_waves, "from extra file");
}

#[test]
fn given_missing_extra_file_when_merging_then_unchanged() {
    let dir = TempDir::new().unwrap();

    let settings = Settings::default()
        .merge_file(&dir.path().join("absent.toml"))
        .unwrap();

    assert_eq!(settings, Settings::default());
}

#[rstest]
#[case::not_toml("[rules\n")]
#[case::wrong_type("[rules]\ndetach_association = \"sometimes\"\n")]
fn given_malformed_local_config_when_load_then_config_error(#[case] content: &str) {
    // Arrange
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), content).unwrap();

    // Act
    let err = Settings::load(Some(dir.path()), None).unwrap_err();

    // Assert
    assert!(err.to_string().starts_with("config error"), "{}", err);
    assert!(err.to_string().contains(".stackgraph.toml"), "{}", err);
}

#[test]
fn given_rules_from_local_config_when_building_engine_then_only_enabled_rules() {
    // Arrange
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "[rules]\nservice_association_edges = false\n",
    )
    .unwrap();
    let settings = Settings::load(Some(dir.path()), None).unwrap();

    // Act
    let engine = engine_for(&settings.rules);

    // Assert
    assert_eq!(engine.names(), vec!["detach-association"]);
}

#[test]
fn given_settings_when_rendering_toml_then_contains_sections() {
    let rendered = Settings::default().to_toml().unwrap();

    assert!(rendered.contains("[rules]"));
    assert!(rendered.contains("detach_association = true"));
    assert!(rendered.contains("[output]"));
}
