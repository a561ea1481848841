//! Integration tests for Settings loading with layered precedence:
//! defaults, then global file, then local `.fixtree.toml`, then `FIXTREE_*` env vars.
//!
//! Global configs live in temp directories; the user's real global config is never read.

use std::fs;

use tempfile::TempDir;

use fixtree::application::ApplicationError;
use fixtree::config::{local_config_path, Settings};

fn write_global(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("fixtree.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn given_only_global_when_loading_then_global_overrides_defaults() {
    // Arrange
    let global_dir = TempDir::new().unwrap();
    let global = write_global(
        &global_dir,
        r#"
[generation]
null_inject = 0.5
default_max_size = 6
"#,
    );

    // Act
    let settings = Settings::load_from(Some(&global), None).expect("load settings");

    // Assert
    assert_eq!(settings.generation.null_inject, 0.5);
    assert_eq!(settings.generation.default_max_size, 6);
    assert_eq!(settings.validation.max_attempts, 10);
}

#[test]
fn given_local_seed_when_loading_then_seed_is_set() {
    // Arrange
    let global_dir = TempDir::new().unwrap();
    let global = write_global(&global_dir, "[generation]\nseed = 1\n");
    let local_dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(local_dir.path()),
        "[generation]\nseed = 99\n[validation]\nvalid_only = false\n",
    )
    .unwrap();

    // Act
    let settings = Settings::load_from(Some(&global), Some(local_dir.path())).unwrap();

    // Assert
    assert_eq!(settings.generation.seed, Some(99));
    assert!(!settings.validation.valid_only);
}

#[test]
fn given_missing_files_when_loading_then_defaults() {
    let empty = TempDir::new().unwrap();
    let missing = empty.path().join("nope.toml");

    let settings = Settings::load_from(Some(&missing), Some(empty.path())).unwrap();

    assert_eq!(settings.generation.default_min_size, 0);
    assert_eq!(settings.validation.max_attempts, 10);
}

#[test]
fn given_local_with_invalid_values_when_loading_then_config_error() {
    let local_dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(local_dir.path()),
        "[generation]\ndefault_min_size = 5\ndefault_max_size = 2\n",
    )
    .unwrap();

    let err = Settings::load_from(None, Some(local_dir.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }));
}

#[test]
fn given_env_var_when_loading_then_env_wins_over_files() {
    // Arrange
    let local_dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(local_dir.path()),
        "[generation]\npost_condition_attempts = 7\n",
    )
    .unwrap();
    std::env::set_var("FIXTREE_GENERATION__POST_CONDITION_ATTEMPTS", "3");

    // Act
    let settings = Settings::load_from(None, Some(local_dir.path()));
    std::env::remove_var("FIXTREE_GENERATION__POST_CONDITION_ATTEMPTS");

    // Assert
    assert_eq!(settings.unwrap().generation.post_condition_attempts, 3);
}
