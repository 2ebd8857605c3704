//! Tests that exercise the crate's public re-exports.

use std::ffi::OsString;

use lantern_config::{Config, LogLevel};
use rstest::rstest;

use crate::{
    BootstrapFailure, BootstrapState, ConfigLoader, EarlyExit, FailureKind, StaticConfigLoader,
    SystemConfigLoader,
};

#[rstest]
fn static_loader_ignores_arguments() {
    let config = Config {
        log_level: Some("warn".to_owned()),
        ..Config::default()
    };
    let loader = StaticConfigLoader::new(config.clone());

    let loaded = loader
        .load(&[OsString::from("lantern"), OsString::from("--log-level")])
        .expect("static loader never fails");

    assert_eq!(loaded, config);
}

#[rstest]
fn system_loader_reads_configuration_flags() {
    let arguments = [
        OsString::from("lantern"),
        OsString::from("--log-level"),
        OsString::from("error"),
        OsString::from("--skip-update-check"),
    ];

    let config = SystemConfigLoader
        .load(&arguments)
        .expect("configuration should load");

    assert_eq!(config.log_level().value(), LogLevel::Error);
    assert!(config.skip_update_check);
}

#[rstest]
#[case(BootstrapState::ComponentsInitialized, "ComponentsInitialized")]
#[case(BootstrapState::FatalFallback, "FatalFallback")]
fn states_display_their_names(#[case] state: BootstrapState, #[case] expected: &str) {
    assert_eq!(state.to_string(), expected);
}

#[rstest]
fn failures_display_only_their_message() {
    let failure = BootstrapFailure::new(FailureKind::Interface, "no display");

    assert_eq!(failure.to_string(), "no display");
    assert_eq!(failure.kind().to_string(), "interface");
    assert_eq!(EarlyExit::UpdatePending.to_string(), "update_pending");
}
