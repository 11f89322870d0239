//! Log verification specs
//!
//! `tkvd --verify` replays the configured log and reports what it found.

use crate::prelude::*;

#[test]
fn verify_empty_log() {
    let temp = Project::empty();

    temp.tkvd()
        .args(&["--verify"])
        .passes()
        .stdout_has("Replayed 0 events (last sequence 0)")
        .stdout_has("Keys: 0");
}

#[test]
fn verify_counts_events_and_keys() {
    let temp = Project::empty();
    temp.file(LOG_FILE, "1\t2\ta\t1\n2\t1\tb\t\n3\t2\ta\t2\n4\t2\tc\thello world\n");

    temp.tkvd()
        .args(&["--verify"])
        .passes()
        .stdout_has("Replayed 4 events (last sequence 4)")
        .stdout_has("Keys: 2");
}

#[test]
fn verify_does_not_modify_log() {
    let temp = Project::empty();
    let contents = "1\t2\ta\t1\n2\t2\tb\t2\n";
    temp.file(LOG_FILE, contents);

    temp.tkvd().args(&["--verify"]).passes();

    assert_eq!(temp.read(LOG_FILE), contents);
}

#[test]
fn verify_reports_corrupt_line() {
    let temp = Project::empty();
    temp.file(LOG_FILE, "1\t2\ta\t1\nnot a record\n");

    temp.tkvd()
        .args(&["--verify"])
        .fails()
        .stderr_has("line 2");
}

#[test]
fn verify_reports_out_of_sequence_record() {
    let temp = Project::empty();
    temp.file(LOG_FILE, "2\t2\ta\t1\n1\t2\tb\t2\n");

    temp.tkvd()
        .args(&["--verify"])
        .fails()
        .stderr_has("out of sequence");
}

#[test]
fn verify_sqlite_backend_from_config_file() {
    let temp = Project::empty();
    temp.file("tkv.toml", "[backend]\nkind = \"sqlite\"\n");

    temp.tkvd()
        .args(&["--verify", "tkv.toml"])
        .passes()
        .stdout_has("Replayed 0 events");
    assert!(temp.state_dir().join("transactions.db").exists());
}

#[test]
fn verify_missing_directory_fails() {
    let temp = Project::empty();
    temp.file(
        "tkv.toml",
        "[backend]\nkind = \"file\"\npath = \"missing/transactions.log\"\n",
    );

    temp.tkvd()
        .args(&["--verify", "tkv.toml"])
        .fails()
        .stderr_has("cannot open transaction log");
}

#[test]
fn verify_unreachable_postgres_fails() {
    let temp = Project::empty();
    temp.file(
        "tkv.toml",
        "[backend]\nkind = \"postgres\"\nhost = \"/nonexistent/tkv-socket-dir\"\n\
         dbname = \"kv\"\nuser = \"tkv\"\npassword = \"hunter2\"\n",
    );

    temp.tkvd()
        .args(&["--verify", "tkv.toml"])
        .fails()
        .stderr_has("database error")
        .stderr_lacks("hunter2");
}
