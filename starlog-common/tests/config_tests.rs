//! Unit tests for root folder resolution
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.
//! Tests that manipulate STARLOG_ROOT_FOLDER are marked with #[serial].

use serial_test::serial;
use starlog_common::config::{default_root_folder, resolve_root_folder};
use std::env;
use std::path::PathBuf;

const ENV_VAR: &str = "STARLOG_ROOT_FOLDER";

#[test]
#[serial]
fn cli_argument_wins_over_environment() {
    env::set_var(ENV_VAR, "/tmp/from-env");
    let resolved = resolve_root_folder(Some("/tmp/from-cli"), ENV_VAR).expect("resolve");
    env::remove_var(ENV_VAR);

    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));
}

#[test]
#[serial]
fn environment_used_when_no_cli_argument() {
    env::set_var(ENV_VAR, "/tmp/from-env");
    let resolved = resolve_root_folder(None, ENV_VAR).expect("resolve");
    env::remove_var(ENV_VAR);

    assert_eq!(resolved, PathBuf::from("/tmp/from-env"));
}

#[test]
#[serial]
fn falls_back_to_compiled_default() {
    env::remove_var(ENV_VAR);
    let resolved = resolve_root_folder(None, ENV_VAR).expect("resolve");

    // Either the compiled default or a config file the host happens to
    // have; in a clean environment they coincide.
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
fn compiled_default_is_nonempty() {
    assert!(!default_root_folder().as_os_str().is_empty());
}
