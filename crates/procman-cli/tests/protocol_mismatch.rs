//! A worker that echoes the wrong byte after `start` must make the
//! simulator exit non-zero with a single diagnostic line and no further
//! transcript progress.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

/// A deliberately broken worker: reads the `start` payload and echoes a
/// fixed, always-wrong byte instead of `BE(t)[3]`.
const BROKEN_WORKER_SCRIPT: &str = "#!/bin/sh\nhead -c 4 >/dev/null\nprintf '\\377'\nsleep 5\n";

#[test]
fn protocol_mismatch_exits_nonzero_with_single_diagnostic_line() {
    let run_dir = tempfile::tempdir().unwrap();

    let script_path = run_dir.path().join("process");
    fs::File::create(&script_path)
        .unwrap()
        .write_all(BROKEN_WORKER_SCRIPT.as_bytes())
        .unwrap();
    let mut perms = fs::metadata(&script_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms).unwrap();

    let descriptor_path = run_dir.path().join("procs.txt");
    fs::File::create(&descriptor_path)
        .unwrap()
        .write_all(b"0 P1 6 100\n")
        .unwrap();

    let mut cmd = Command::cargo_bin("procman").unwrap();
    cmd.current_dir(run_dir.path())
        .arg("-f")
        .arg(&descriptor_path)
        .arg("-s")
        .arg("sjf")
        .arg("-m")
        .arg("infinite")
        .arg("-q")
        .arg("1");

    cmd.assert()
        .failure()
        // the RUNNING line is emitted before `start(t)` is invoked, so it
        // reaches stdout, but nothing past the mismatch ever does.
        .stdout(contains("0,RUNNING,process_name=P1,remaining_time=6"))
        .stdout(contains("FINISHED").not())
        .stdout(contains("Makespan").not())
        .stderr(contains("procman:"))
        .stderr(contains("echoed byte"));
}
