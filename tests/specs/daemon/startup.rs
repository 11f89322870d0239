//! Daemon startup specs
//!
//! Startup failures must leave a trace in the daemon log and exit non-zero.

use crate::prelude::*;

#[test]
fn corrupt_log_aborts_startup() {
    let temp = Project::empty();
    temp.file(LOG_FILE, "1\t2\ta\t1\n1\t2\tb\t2\n");

    temp.tkvd().fails();

    let log = temp.read("state/daemon.log");
    assert!(log.contains("--- tkvd: starting (pid: "), "{log}");
    assert!(log.contains("ERROR Failed to start daemon"), "{log}");
    assert!(!temp.state_dir().join("daemon.pid").exists());
}

#[test]
fn unknown_flag_is_rejected() {
    let temp = Project::empty();

    temp.tkvd()
        .args(&["--frobnicate"])
        .fails()
        .stderr_has("unknown flag");
}

#[test]
fn missing_config_file_is_rejected() {
    let temp = Project::empty();

    temp.tkvd()
        .args(&["--verify", "nope.toml"])
        .fails()
        .stderr_has("nope.toml");
}

#[test]
fn invalid_config_is_rejected() {
    let temp = Project::empty();
    temp.file("tkv.toml", "queue_capacity = 0\n");

    temp.tkvd()
        .args(&["--verify", "tkv.toml"])
        .fails()
        .stderr_has("queue_capacity");
}
